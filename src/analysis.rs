//! # Analysis モジュール
//!
//! ラン終了後にイベントツリーを読み直し、dcout の先頭ヒットの運動量から
//! 運動量・極角・方位角の分布を作るオフライン解析です。
//! 極角が 20度 < θ < 60度 のイベントは `_selected` ヒストグラムにも詰めます。

use tracing::info;

use crate::histogram::{AnalysisError, AnalysisManager, Axis, NTuple};
use crate::models::traits::IMetricSink;
use crate::throttle::is_decade_milestone;

/// 選択範囲（度）
pub const THETA_SELECTION_DEG: (f64, f64) = (20.0, 60.0);

pub mod names {
    pub const MOMENTUM: &str = "momentum";
    pub const THETA: &str = "theta";
    pub const PHI: &str = "phi";
    pub const MOMENTUM_SELECTED: &str = "momentum_selected";
    pub const THETA_SELECTED: &str = "theta_selected";
    pub const PHI_SELECTED: &str = "phi_selected";
    pub const MOMENTUM_VS_THETA: &str = "momentum_vs_theta";
}

/// 1イベント分の運動学量
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackKinematics {
    /// 運動量の大きさ（MeV/c）
    pub momentum: f64,
    /// 極角（度）
    pub theta: f64,
    /// 方位角（度）。y軸から x軸に向かって測る
    pub phi: f64,
}

impl TrackKinematics {
    pub fn from_components(px: f64, py: f64, pz: f64) -> Self {
        let momentum = (px * px + py * py + pz * pz).sqrt();
        let theta = (px * px + py * py).sqrt().atan2(pz).to_degrees();
        let phi = px.atan2(py).to_degrees();
        Self { momentum, theta, phi }
    }

    pub fn is_selected(&self) -> bool {
        THETA_SELECTION_DEG.0 < self.theta && self.theta < THETA_SELECTION_DEG.1
    }
}

/// オフライン解析の結果
#[derive(Debug)]
pub struct OfflineAnalysis {
    pub histograms: AnalysisManager,
    pub processed: usize,
    pub selected: usize,
    /// dcout にヒットがなく読み飛ばした行
    pub skipped: usize,
}

fn book() -> Result<AnalysisManager, AnalysisError> {
    let mut manager = AnalysisManager::new();
    let momentum = Axis::new(200, 0.0, 200.0);
    let theta = Axis::new(180, 0.0, 180.0);
    let phi = Axis::new(180, -180.0, 180.0);

    manager.create_h1(names::MOMENTUM, "momentum;p (MeV/c);counts", momentum)?;
    manager.create_h1(names::THETA, "theta;theta (deg.);counts", theta)?;
    manager.create_h1(names::PHI, "phi;phi (deg.);counts", phi)?;
    manager.create_h1(names::MOMENTUM_SELECTED, "momentum;p (MeV/c);counts", momentum)?;
    manager.create_h1(names::THETA_SELECTED, "theta;theta (deg.);counts", theta)?;
    manager.create_h1(names::PHI_SELECTED, "phi;phi (deg.);counts", phi)?;
    manager.create_h2(names::MOMENTUM_VS_THETA, "momentum vs. theta;p (MeV/c);theta (deg.)", momentum, theta)?;
    Ok(manager)
}

/// イベントツリーの dcout 運動量を解析
pub fn analyze(tree: &NTuple) -> Result<OfflineAnalysis, AnalysisError> {
    let mut histograms = book()?;
    let column = |name: &str| {
        tree.column_id(name)
            .ok_or_else(|| AnalysisError::UnknownColumnName(format!("{}/{}", tree.name, name)))
    };
    let nhit = column("dcout_nhit")?;
    let px = column("dcout_momentum_x")?;
    let py = column("dcout_momentum_y")?;
    let pz = column("dcout_momentum_z")?;

    let mut processed = 0;
    let mut selected = 0;
    let mut skipped = 0;

    for (index, row) in tree.rows.iter().enumerate() {
        let entry = index as u64 + 1;
        if is_decade_milestone(entry) {
            info!(">> {}", entry);
        }

        if row[nhit] < 1.0 {
            skipped += 1;
            continue;
        }

        let kinematics = TrackKinematics::from_components(row[px], row[py], row[pz]);
        histograms.fill_h1(names::MOMENTUM, kinematics.momentum)?;
        histograms.fill_h1(names::THETA, kinematics.theta)?;
        histograms.fill_h1(names::PHI, kinematics.phi)?;
        histograms.fill_h2(names::MOMENTUM_VS_THETA, kinematics.momentum, kinematics.theta)?;

        if kinematics.is_selected() {
            histograms.fill_h1(names::MOMENTUM_SELECTED, kinematics.momentum)?;
            histograms.fill_h1(names::THETA_SELECTED, kinematics.theta)?;
            histograms.fill_h1(names::PHI_SELECTED, kinematics.phi)?;
            selected += 1;
        }
        processed += 1;
    }

    info!(processed, selected, skipped, "offline analysis finished");
    Ok(OfflineAnalysis { histograms, processed, selected, skipped })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run_action::event_tree;

    fn push_row(tree: &mut NTuple, nhit: f64, p: [f64; 3]) {
        let base = tree.column_id("dcout_nhit").unwrap();
        tree.set(base, nhit).unwrap();
        for (i, value) in p.iter().enumerate() {
            tree.set(base + 4 + i, *value).unwrap();
        }
        tree.commit();
    }

    #[test]
    fn test_kinematics() {
        let k = TrackKinematics::from_components(0.0, 100.0, 100.0);
        assert!((k.momentum - 141.421_356).abs() < 1e-5);
        assert!((k.theta - 45.0).abs() < 1e-9);
        assert_eq!(k.phi, 0.0);
        assert!(k.is_selected());

        let k = TrackKinematics::from_components(1.0, 0.0, 0.0);
        assert!((k.phi - 90.0).abs() < 1e-9);
        assert!(!k.is_selected());
    }

    #[test]
    fn test_selection_and_skip() {
        let mut tree = event_tree();
        push_row(&mut tree, 1.0, [0.0, 0.0, 150.0]);
        push_row(&mut tree, 1.0, [0.0, 100.0, 100.0]);
        push_row(&mut tree, 0.0, [0.0, 0.0, 0.0]);

        let result = analyze(&tree).unwrap();
        assert_eq!(result.processed, 2);
        assert_eq!(result.selected, 1);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.histograms.h1(names::THETA).unwrap().entries, 2);
        assert_eq!(result.histograms.h1(names::THETA_SELECTED).unwrap().entries, 1);
        assert_eq!(result.histograms.h2(names::MOMENTUM_VS_THETA).unwrap().entries, 2);
    }
}
