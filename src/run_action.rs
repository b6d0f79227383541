//! # Run Action モジュール
//!
//! ランの開始・終了処理を提供します。ヒストグラムとイベントツリー（ntuple）の
//! 予約、乱数シードの記録、ラン終了時のまとめの作成を担当します。

use serde::Serialize;
use tracing::info;

use crate::histogram::{AnalysisError, AnalysisManager, AnalysisSummary, Column, ColumnKind, NTuple};
use crate::models::drift_chamber::ChamberStats;
use crate::scenario::HistogramsConfig;

/// ヒストグラム名
pub mod names {
    pub const DCIN_NUMHIT: &str = "dcin_numhit";
    pub const DCOUT_NUMHIT: &str = "dcout_numhit";
    pub const DCIN_DIRECTION: &str = "dcin_direction";
    pub const DCOUT_DIRECTION: &str = "dcout_direction";
    pub const DCIN_HITPOSITION_XY: &str = "dcin_hitposition_xy";
    pub const DCOUT_HITPOSITION_XY: &str = "dcout_hitposition_xy";
    pub const ANALYSIS_THETA: &str = "analysis_theta";
    pub const ANALYSIS_THETA_X: &str = "analysis_theta_x";
    pub const ANALYSIS_THETA_Y: &str = "analysis_theta_y";
    pub const ANALYSIS_PHI: &str = "analysis_phi";
    pub const ANALYSIS_COSPHI: &str = "analysis_cosphi";
    pub const ANALYSIS_SINPHI: &str = "analysis_sinphi";
    pub const ANALYSIS_THETA_VS_COSPHI: &str = "analysis_theta_vs_cosphi";
    pub const ANALYSIS_THETA_VS_SINPHI: &str = "analysis_theta_vs_sinphi";

    pub const EVENT_TREE: &str = "EventTree";
}

/// イベントツリーのカラム順
///
/// 検出器ごとに ヒット数, 位置 x/y/z, 運動量 x/y/z の7カラムで、
/// dcin が 0..7、dcout が 7..14 を占めます。
pub const COLUMNS_PER_CHAMBER: usize = 7;

/// 検出器ごとのカラム名の接尾辞
const COLUMN_SUFFIXES: [(&str, ColumnKind); COLUMNS_PER_CHAMBER] = [
    ("nhit", ColumnKind::Int),
    ("position_x", ColumnKind::Float),
    ("position_y", ColumnKind::Float),
    ("position_z", ColumnKind::Float),
    ("momentum_x", ColumnKind::Float),
    ("momentum_y", ColumnKind::Float),
    ("momentum_z", ColumnKind::Float),
];

/// 検出器名の順（カラムの並びと一致）
pub const CHAMBER_PREFIXES: [&str; 2] = ["dcin", "dcout"];

/// イベントツリーを作成
pub fn event_tree() -> NTuple {
    let columns = CHAMBER_PREFIXES
        .iter()
        .flat_map(|prefix| {
            COLUMN_SUFFIXES.iter().map(move |(suffix, kind)| Column {
                name: format!("{}_{}", prefix, suffix),
                kind: *kind,
            })
        })
        .collect();
    NTuple::new(names::EVENT_TREE, "Event Tree", columns)
}

/// ラン終了時のまとめ
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub events: u64,
    pub seed: u64,
    pub missing_collections: u64,
    pub skipped_fills: u64,
    pub dcin: ChamberSummary,
    pub dcout: ChamberSummary,
    pub analysis: AnalysisSummary,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ChamberSummary {
    pub steps_seen: u64,
    pub hits_recorded: u64,
    pub rejected: u64,
}

impl From<&ChamberStats> for ChamberSummary {
    fn from(stats: &ChamberStats) -> Self {
        Self {
            steps_seen: stats.steps_seen,
            hits_recorded: stats.hits_recorded,
            rejected: stats.rejected_neutral
                + stats.rejected_not_proton
                + stats.rejected_secondary
                + stats.rejected_acceptance,
        }
    }
}

/// ランの開始・終了処理
#[derive(Debug, Clone)]
pub struct RunAction {
    histograms: HistogramsConfig,
}

impl RunAction {
    pub fn new(histograms: HistogramsConfig) -> Self {
        Self { histograms }
    }

    /// ヒストグラムとイベントツリーを予約した AnalysisManager を作成
    pub fn book(&self) -> Result<AnalysisManager, AnalysisError> {
        let mut manager = AnalysisManager::new();

        for h in &self.histograms.h1 {
            manager.create_h1(&h.name, &h.title, h.axis())?;
        }
        for h in &self.histograms.h2 {
            manager.create_h2(&h.name, &h.title, h.x, h.y)?;
        }
        manager.create_ntuple(event_tree());

        Ok(manager)
    }

    /// ラン開始時の処理
    pub fn begin_of_run(&self, seed: u64) -> Result<AnalysisManager, AnalysisError> {
        info!(seed, "begin of run");
        let manager = self.book()?;
        info!(
            "booked {} 1D / {} 2D histograms and ntuple {}",
            self.histograms.h1.len(),
            self.histograms.h2.len(),
            names::EVENT_TREE
        );
        Ok(manager)
    }

    /// ラン終了時の処理
    pub fn end_of_run(&self, summary: &RunSummary) {
        info!(
            events = summary.events,
            rows = summary.analysis.ntuple_rows,
            missing_collections = summary.missing_collections,
            skipped_fills = summary.skipped_fills,
            "end of run"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_tree_layout() {
        let tree = event_tree();
        let names: Vec<&str> = tree.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names.len(), 14);
        assert_eq!(names[0], "dcin_nhit");
        assert_eq!(names[6], "dcin_momentum_z");
        assert_eq!(names[7], "dcout_nhit");
        assert_eq!(names[13], "dcout_momentum_z");
        assert_eq!(tree.columns[7].kind, ColumnKind::Int);
        assert_eq!(tree.columns[8].kind, ColumnKind::Float);
    }

    #[test]
    fn test_default_booking() {
        let manager = RunAction::new(HistogramsConfig::default()).book().unwrap();
        for name in [
            names::DCIN_NUMHIT,
            names::DCOUT_NUMHIT,
            names::DCIN_DIRECTION,
            names::DCOUT_DIRECTION,
            names::ANALYSIS_THETA,
            names::ANALYSIS_THETA_X,
            names::ANALYSIS_THETA_Y,
            names::ANALYSIS_PHI,
            names::ANALYSIS_COSPHI,
            names::ANALYSIS_SINPHI,
        ] {
            assert!(manager.h1(name).is_some(), "{} not booked", name);
        }
        for name in [
            names::DCIN_HITPOSITION_XY,
            names::DCOUT_HITPOSITION_XY,
            names::ANALYSIS_THETA_VS_COSPHI,
            names::ANALYSIS_THETA_VS_SINPHI,
        ] {
            assert!(manager.h2(name).is_some(), "{} not booked", name);
        }
        assert_eq!(manager.ntuple().unwrap().rows.len(), 0);
    }

    #[test]
    fn test_duplicate_booking_fails() {
        let mut config = HistogramsConfig::default();
        config.h1.push(config.h1[0].clone());
        assert!(matches!(
            RunAction::new(config).book(),
            Err(AnalysisError::DuplicateHistogram(_))
        ));
    }
}
