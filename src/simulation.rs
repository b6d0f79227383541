//! # Simulation モジュール
//!
//! イベントループを回すシミュレーションドライバーを提供します。
//!
//! 1イベントごとに、以下の順序で処理が実行されます：
//!
//! 1. **イベント開始**: 各ドリフトチェンバーのヒットコレクションを作り直す
//! 2. **一次粒子生成**: 陽子ガン（または注入された運動量分布）から陽子を1つ生成
//! 3. **輸送**: ビームラインを進め、検出器面の横断点を各チェンバーに渡す
//! 4. **イベント終了**: イベントアクションがヒット列を解析する
//!
//! イベントは1つずつ順番に処理され、イベント間で共有される可変状態は
//! イベントアクションの表示間隔と AnalysisManager だけです。
//!
//! ## 使用例
//!
//! ```no_run
//! use protonpol::scenario::ScenarioConfig;
//! use protonpol::simulation::SimulationEngine;
//!
//! let config = ScenarioConfig::from_file("scenarios/default.yaml")?;
//! let mut engine = SimulationEngine::new(config, 1);
//! engine.initialize()?;
//! let summary = engine.run()?;
//! println!("{} events", summary.events);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info};

use crate::event_action::EventAction;
use crate::histogram::AnalysisManager;
use crate::models::{Beamline, DriftChamber, IEventAction, PrimaryGenerator, ProtonDistribution};
use crate::run_action::{RunAction, RunSummary};
use crate::scenario::ScenarioConfig;

/// dcin と dcout の検出器面ID
const DCIN_LAYER: i32 = 0;
const DCOUT_LAYER: i32 = 1;

pub struct SimulationEngine {
    pub event_count: u64,
    pub seed: u64,

    pub dcin: DriftChamber,
    pub dcout: DriftChamber,
    pub generator: PrimaryGenerator,
    pub beamline: Beamline,
    pub event_action: EventAction,
    pub run_action: RunAction,
    pub analysis: Option<AnalysisManager>,

    pub scenario_config: ScenarioConfig,
    pub verbose_level: u8,
    rng: StdRng,
}

impl SimulationEngine {
    pub fn new(scenario: ScenarioConfig, verbose_level: u8) -> Self {
        let beamline_config = &scenario.beamline;

        let mut dcin = DriftChamber::new("dcin", DCIN_LAYER, beamline_config.dcin_z_mm, beamline_config.half_width_mm);
        dcin.enabled = beamline_config.dcin_enabled;
        let mut dcout = DriftChamber::new("dcout", DCOUT_LAYER, beamline_config.dcout_z_mm, beamline_config.half_width_mm);
        dcout.enabled = beamline_config.dcout_enabled;

        Self {
            event_count: scenario.run.events,
            seed: scenario.run.seed,
            dcin,
            dcout,
            generator: PrimaryGenerator::new(&scenario.gun, None),
            beamline: Beamline::new(beamline_config),
            event_action: EventAction::new(),
            run_action: RunAction::new(scenario.histograms.clone()),
            analysis: None,
            rng: StdRng::seed_from_u64(scenario.run.seed),
            scenario_config: scenario,
            verbose_level,
        }
    }

    /// 運動量分布ファイルの読み込みとヒストグラムの予約
    pub fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if self.verbose_level > 0 {
            info!("シミュレーションエンジンを初期化中...");
        }

        if let Some(path) = &self.scenario_config.gun.distribution_file {
            let distribution = ProtonDistribution::from_file(path)?;
            self.generator = PrimaryGenerator::new(&self.scenario_config.gun, Some(distribution));
        }

        self.dcin.reset_stats();
        self.dcout.reset_stats();
        self.event_action.begin_of_run();
        self.rng = StdRng::seed_from_u64(self.seed);
        self.analysis = Some(self.run_action.begin_of_run(self.seed)?);

        if self.verbose_level > 0 {
            info!("初期化完了:");
            info!("  イベント数: {}", self.event_count);
            info!("  dcin: z = {:.1} mm (有効: {})", self.dcin.center.z, self.dcin.enabled);
            info!("  dcout: z = {:.1} mm (有効: {})", self.dcout.center.z, self.dcout.enabled);
            info!("  運動量分布: {}", if self.generator.has_distribution() { "ファイル" } else { "ガン" });
        }

        Ok(())
    }

    /// 全イベントを処理してランのまとめを返す
    pub fn run(&mut self) -> Result<RunSummary, Box<dyn std::error::Error>> {
        let mut analysis = self.analysis.take().ok_or("simulation engine is not initialized")?;

        info!("=== ラン開始 ({} イベント) ===", self.event_count);
        for event_id in 0..self.event_count {
            self.process_event(event_id, &mut analysis);
        }

        let stats = self.event_action.stats();
        let summary = RunSummary {
            events: stats.events,
            seed: self.seed,
            missing_collections: stats.missing_collections,
            skipped_fills: stats.skipped_fills(),
            dcin: self.dcin.stats().into(),
            dcout: self.dcout.stats().into(),
            analysis: analysis.summary(),
        };
        self.run_action.end_of_run(&summary);
        info!("=== ラン終了 ===");

        self.analysis = Some(analysis);
        Ok(summary)
    }

    fn process_event(&mut self, event_id: u64, analysis: &mut AnalysisManager) {
        self.event_action.on_event_start(event_id);
        self.dcin.begin_event(event_id);
        self.dcout.begin_event(event_id);

        let vertex = self.generator.generate_primary(&mut self.rng);
        let steps = self.beamline.transport(&vertex, &mut self.rng);

        for step in &steps {
            let chamber = match step.volume.as_str() {
                "dcin" => &mut self.dcin,
                "dcout" => &mut self.dcout,
                _ => continue,
            };
            if let Err(reason) = chamber.process_step(step) {
                if self.verbose_level > 2 {
                    debug!(event_id, volume = %step.volume, ?reason, "step not recorded");
                }
            }
        }

        self.event_action.on_event_end(event_id, &self.dcin, &self.dcout, analysis);
    }

    /// ラン後の解析結果
    pub fn analysis(&self) -> Option<&AnalysisManager> {
        self.analysis.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run_action::names;

    fn scenario(events: u64) -> ScenarioConfig {
        let mut config = ScenarioConfig::default();
        config.run.events = events;
        config
    }

    #[test]
    fn test_run_requires_initialize() {
        let mut engine = SimulationEngine::new(scenario(10), 0);
        assert!(engine.run().is_err());
    }

    #[test]
    fn test_one_row_per_event_and_counts_match_hits() {
        let mut engine = SimulationEngine::new(scenario(200), 0);
        engine.initialize().unwrap();
        let summary = engine.run().unwrap();

        assert_eq!(summary.events, 200);
        assert_eq!(summary.analysis.ntuple_rows, 200);

        let analysis = engine.analysis().unwrap();
        for (name, recorded) in [
            (names::DCIN_NUMHIT, summary.dcin.hits_recorded),
            (names::DCOUT_NUMHIT, summary.dcout.hits_recorded),
        ] {
            let h = analysis.h1(name).unwrap();
            let total: u64 = h.counts.iter().enumerate().map(|(bin, count)| bin as u64 * count).sum();
            assert_eq!(h.overflow, 0);
            assert_eq!(total, recorded, "{}", name);
        }
        // 二次粒子は記録されない
        assert!(summary.dcout.rejected > 0);
    }

    #[test]
    fn test_same_seed_same_result() {
        let mut first = SimulationEngine::new(scenario(50), 0);
        first.initialize().unwrap();
        first.run().unwrap();

        let mut second = SimulationEngine::new(scenario(50), 0);
        second.initialize().unwrap();
        second.run().unwrap();

        assert_eq!(
            first.analysis().unwrap().h1(names::ANALYSIS_THETA),
            second.analysis().unwrap().h1(names::ANALYSIS_THETA)
        );
    }

    #[test]
    fn test_disabled_chamber_is_reported_missing() {
        let mut config = scenario(30);
        config.beamline.dcout_enabled = false;
        let mut engine = SimulationEngine::new(config, 0);
        engine.initialize().unwrap();
        let summary = engine.run().unwrap();

        assert_eq!(summary.missing_collections, 30);
        assert_eq!(summary.analysis.ntuple_rows, 30);
        let analysis = engine.analysis().unwrap();
        assert_eq!(analysis.h1(names::DCOUT_NUMHIT).unwrap().entries, 0);
        assert_eq!(analysis.h1(names::ANALYSIS_THETA).unwrap().entries, 0);
        assert_eq!(analysis.h1(names::DCIN_NUMHIT).unwrap().entries, 30);
    }

    #[test]
    fn test_distribution_scenario_loads_samples() {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("scenarios").join("distribution.yaml");
        let mut config = ScenarioConfig::from_file(path).unwrap();
        config.run.events = 20;
        let mut engine = SimulationEngine::new(config, 0);
        engine.initialize().unwrap();
        assert!(engine.generator.has_distribution());

        let summary = engine.run().unwrap();
        assert_eq!(summary.analysis.ntuple_rows, 20);
    }
}
