// 基本的なデータ型と物理定数
pub mod common;

// 検出器・イベント処理のインターフェース（trait）定義
pub mod traits;

// ヒットとステップ点
pub mod hit;

// 検出器・粒子源・ビームライン
pub mod drift_chamber;
pub mod generator;
pub mod beamline;

// 便利な re-export
pub use common::*;
pub use traits::*;
pub use hit::{DriftChamberHit, HitCollectionError, StepPoint};
pub use drift_chamber::{ChamberStats, DriftChamber, RejectReason};
pub use generator::{DistributionError, PrimaryGenerator, PrimaryVertex, ProtonDistribution, ProtonSample};
pub use beamline::Beamline;
