use crate::models::common::{ParticleKind, ThreeVector};

/// ドリフトチェンバーのヒット
///
/// 一次（parent_id == 0）の荷電陽子が有感領域を横切ったときにのみ作られ、
/// 作成後は変更されません。
#[derive(Debug, Clone, PartialEq)]
pub struct DriftChamberHit {
    /// ヒットを生成した検出器面のID
    pub layer_id: i32,
    /// 検出器ローカル座標での位置（mm）
    pub local_position: ThreeVector,
    /// ワールド座標での位置（mm）
    pub global_position: ThreeVector,
    /// ヒット点での運動量（MeV/c）
    pub momentum: ThreeVector,
    /// ヒット点での偏極
    pub polarization: ThreeVector,
    /// 絶対時刻（ns）
    pub time: f64,
    pub track_id: i32,
    pub parent_id: i32,
    pub particle_id: i32,
}

impl DriftChamberHit {
    /// テストや外部データ用に運動量だけを持つヒットを作成
    pub fn with_momentum(layer_id: i32, momentum: ThreeVector) -> Self {
        Self {
            layer_id,
            local_position: ThreeVector::zero(),
            global_position: ThreeVector::zero(),
            momentum,
            polarization: ThreeVector::zero(),
            time: 0.0,
            track_id: 1,
            parent_id: 0,
            particle_id: ParticleKind::Proton.pdg_code(),
        }
    }
}

/// 有感領域の横断点（トランスポートから検出器に渡される1ステップ分の情報）
#[derive(Debug, Clone, PartialEq)]
pub struct StepPoint {
    pub track_id: i32,
    pub parent_id: i32,
    pub particle: ParticleKind,
    /// 横断した検出器面の名前（"dcin" / "dcout"）
    pub volume: String,
    pub position: ThreeVector,
    pub momentum: ThreeVector,
    pub polarization: ThreeVector,
    pub global_time: f64,
}

/// ヒットコレクション取得エラー
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HitCollectionError {
    /// このイベントのヒットコレクションが見つからない
    #[error("hits collection {detector} of event {event_id} not found")]
    MissingHitCollection { detector: String, event_id: u64 },
}
