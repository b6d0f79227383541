use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::histogram::Axis;
use crate::run_action::names;

/// シナリオメタデータ
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScenarioMeta {
    pub version: String,
    pub name: String,
    pub description: String,
}

impl Default for ScenarioMeta {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: "default".to_string(),
            description: "200 MeV/c proton beam through dcin / target / dcout".to_string(),
        }
    }
}

/// ラン設定
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RunConfig {
    pub events: u64,
    pub seed: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self { events: 1000, seed: 12345 }
    }
}

/// 一次粒子（陽子ガン）の設定
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GunConfig {
    pub momentum_mev: f64,
    pub momentum_sigma_mev: f64,
    pub position_mm: [f64; 3],
    pub direction: [f64; 3],
    pub polarization: [f64; 3],
    /// 運動量分布ファイル（YAML）。指定時はガンの運動量より優先
    pub distribution_file: Option<PathBuf>,
}

impl Default for GunConfig {
    fn default() -> Self {
        Self {
            momentum_mev: 200.0,
            momentum_sigma_mev: 0.0,
            position_mm: [0.0, 0.0, -50.0],
            direction: [0.0, 0.0, 1.0],
            polarization: [0.0, 1.0, 0.0],
            distribution_file: None,
        }
    }
}

/// ビームライン（検出器面と標的）の設定
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BeamlineConfig {
    pub dcin_z_mm: f64,
    pub target_z_mm: f64,
    pub dcout_z_mm: f64,
    /// チェンバー有感領域の半幅（x, y 共通）
    pub half_width_mm: f64,
    /// 標的での射影散乱角の標準偏差（度）
    pub scatter_sigma_deg: f64,
    /// dcout を一次陽子がもう一度横切る確率
    pub double_hit_probability: f64,
    /// dcout を二次粒子（電子・ガンマ）が横切る確率
    pub secondary_probability: f64,
    pub dcin_enabled: bool,
    pub dcout_enabled: bool,
}

impl Default for BeamlineConfig {
    fn default() -> Self {
        Self {
            dcin_z_mm: -20.0,
            target_z_mm: 0.0,
            dcout_z_mm: 40.0,
            half_width_mm: 100.0,
            scatter_sigma_deg: 5.0,
            double_hit_probability: 0.02,
            secondary_probability: 0.05,
            dcin_enabled: true,
            dcout_enabled: true,
        }
    }
}

/// 1次元ヒストグラムの定義
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct H1Config {
    pub name: String,
    pub title: String,
    pub bins: usize,
    pub min: f64,
    pub max: f64,
}

impl H1Config {
    fn new(name: &str, title: &str, bins: usize, min: f64, max: f64) -> Self {
        Self { name: name.to_string(), title: title.to_string(), bins, min, max }
    }

    pub fn axis(&self) -> Axis {
        Axis::new(self.bins, self.min, self.max)
    }
}

/// 2次元ヒストグラムの定義
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct H2Config {
    pub name: String,
    pub title: String,
    pub x: Axis,
    pub y: Axis,
}

/// ヒストグラム定義一式
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HistogramsConfig {
    pub h1: Vec<H1Config>,
    pub h2: Vec<H2Config>,
}

impl Default for HistogramsConfig {
    fn default() -> Self {
        let position = Axis::new(50, -100.0, 100.0);
        let theta = Axis::new(180, 0.0, 180.0);
        let unit = Axis::new(200, -1.0, 1.0);
        Self {
            h1: vec![
                H1Config::new(names::DCIN_NUMHIT, "dcin : number of hits", 10, 0.0, 10.0),
                H1Config::new(names::DCOUT_NUMHIT, "dcout : number of hits", 10, 0.0, 10.0),
                H1Config::new(names::DCIN_DIRECTION, "dcin : direction", 180, 0.0, 180.0),
                H1Config::new(names::DCOUT_DIRECTION, "dcout : direction", 180, 0.0, 180.0),
                H1Config::new(names::ANALYSIS_THETA, "analysis : theta", 180, 0.0, 180.0),
                H1Config::new(names::ANALYSIS_THETA_X, "analysis : theta (x-z plane)", 360, -180.0, 180.0),
                H1Config::new(names::ANALYSIS_THETA_Y, "analysis : theta (y-z plane)", 360, -180.0, 180.0),
                H1Config::new(names::ANALYSIS_PHI, "analysis : phi", 360, -180.0, 180.0),
                H1Config::new(names::ANALYSIS_COSPHI, "analysis : cos(phi)", 200, -1.0, 1.0),
                H1Config::new(names::ANALYSIS_SINPHI, "analysis : sin(phi)", 200, -1.0, 1.0),
            ],
            h2: vec![
                H2Config {
                    name: names::DCIN_HITPOSITION_XY.to_string(),
                    title: "dcin : hit position on x-y plane;x;y".to_string(),
                    x: position,
                    y: position,
                },
                H2Config {
                    name: names::DCOUT_HITPOSITION_XY.to_string(),
                    title: "dcout : hit position on x-y plane;x;y".to_string(),
                    x: position,
                    y: position,
                },
                H2Config {
                    name: names::ANALYSIS_THETA_VS_COSPHI.to_string(),
                    title: "analysis : theta vs. cos(phi)".to_string(),
                    x: theta,
                    y: unit,
                },
                H2Config {
                    name: names::ANALYSIS_THETA_VS_SINPHI.to_string(),
                    title: "analysis : theta vs. sin(phi)".to_string(),
                    x: theta,
                    y: unit,
                },
            ],
        }
    }
}

/// 出力設定
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub summary_file: Option<PathBuf>,
}

/// 完全なシナリオ設定
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub meta: ScenarioMeta,
    pub run: RunConfig,
    pub gun: GunConfig,
    pub beamline: BeamlineConfig,
    pub histograms: HistogramsConfig,
    pub output: OutputConfig,
}

impl ScenarioConfig {
    /// YAMLファイルからシナリオ設定を読み込み
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.to_path_buf()));
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| ScenarioError::IoError(path.to_path_buf(), e))?;

        let mut config = Self::from_yaml_str(&contents)
            .map_err(|e| match e {
                ScenarioError::ParseError(_, err) => ScenarioError::ParseError(path.to_path_buf(), err),
                other => other,
            })?;

        // 相対パスはシナリオファイルのディレクトリから解決する
        if let (Some(file), Some(dir)) = (config.gun.distribution_file.as_mut(), path.parent()) {
            if file.is_relative() {
                *file = dir.join(&*file);
            }
        }

        Ok(config)
    }

    /// YAML文字列から読み込み（検証込み）
    pub fn from_yaml_str(contents: &str) -> Result<Self, ScenarioError> {
        let config: ScenarioConfig = serde_yaml::from_str(contents)
            .map_err(|e| ScenarioError::ParseError(PathBuf::from("<string>"), e))?;
        config.validate()?;
        Ok(config)
    }

    /// 設定の基本的な検証
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.run.events == 0 {
            return Err(ScenarioError::ValidationError("events must be positive".to_string()));
        }

        let gun = &self.gun;
        if gun.momentum_mev < 0.0 || !gun.momentum_mev.is_finite() {
            return Err(ScenarioError::ValidationError("momentum_mev must be >= 0".to_string()));
        }
        if gun.momentum_sigma_mev < 0.0 {
            return Err(ScenarioError::ValidationError("momentum_sigma_mev must be >= 0".to_string()));
        }
        // ビームは +z 方向に進む
        if gun.direction[2] <= 0.0 {
            return Err(ScenarioError::ValidationError("gun direction must have a positive z component".to_string()));
        }

        let beamline = &self.beamline;
        if !(gun.position_mm[2] < beamline.dcin_z_mm
            && beamline.dcin_z_mm < beamline.target_z_mm
            && beamline.target_z_mm < beamline.dcout_z_mm)
        {
            return Err(ScenarioError::ValidationError(format!(
                "planes must be ordered gun ({}) < dcin ({}) < target ({}) < dcout ({})",
                gun.position_mm[2], beamline.dcin_z_mm, beamline.target_z_mm, beamline.dcout_z_mm
            )));
        }
        if beamline.half_width_mm <= 0.0 {
            return Err(ScenarioError::ValidationError("half_width_mm must be positive".to_string()));
        }
        if beamline.scatter_sigma_deg < 0.0 {
            return Err(ScenarioError::ValidationError("scatter_sigma_deg must be >= 0".to_string()));
        }
        for (name, p) in [
            ("double_hit_probability", beamline.double_hit_probability),
            ("secondary_probability", beamline.secondary_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(ScenarioError::ValidationError(format!("{} must be within [0, 1], got {}", name, p)));
            }
        }

        for h in &self.histograms.h1 {
            h.axis()
                .validate(&h.name)
                .map_err(|e| ScenarioError::ValidationError(e.to_string()))?;
        }
        for h in &self.histograms.h2 {
            h.x.validate(&h.name)
                .and_then(|_| h.y.validate(&h.name))
                .map_err(|e| ScenarioError::ValidationError(e.to_string()))?;
        }

        Ok(())
    }

    /// シナリオの概要を表示
    pub fn print_summary(&self) {
        println!("=== シナリオ情報 ===");
        println!("名前: {}", self.meta.name);
        println!("説明: {}", self.meta.description);
        println!("バージョン: {}", self.meta.version);
        println!();

        println!("=== ラン設定 ===");
        println!("イベント数: {}", self.run.events);
        println!("シード値: {}", self.run.seed);
        println!();

        println!("=== 一次粒子 ===");
        println!("運動量: {:.1} MeV/c (σ = {:.1})", self.gun.momentum_mev, self.gun.momentum_sigma_mev);
        println!("位置: {:?} mm", self.gun.position_mm);
        if let Some(file) = &self.gun.distribution_file {
            println!("分布ファイル: {}", file.display());
        }
        println!();

        println!("=== ビームライン ===");
        println!("dcin: z = {:.1} mm{}", self.beamline.dcin_z_mm, if self.beamline.dcin_enabled { "" } else { " (無効)" });
        println!("標的: z = {:.1} mm (σθ = {:.2}度)", self.beamline.target_z_mm, self.beamline.scatter_sigma_deg);
        println!("dcout: z = {:.1} mm{}", self.beamline.dcout_z_mm, if self.beamline.dcout_enabled { "" } else { " (無効)" });
        println!();

        println!("=== 解析 ===");
        println!("1次元ヒストグラム: {}個", self.histograms.h1.len());
        println!("2次元ヒストグラム: {}個", self.histograms.h2.len());
    }
}

/// シナリオ読み込みエラー
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("シナリオファイルが見つかりません: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("ファイル読み込みエラー {}: {}", .0.display(), .1)]
    IoError(PathBuf, #[source] std::io::Error),
    #[error("YAML解析エラー {}: {}", .0.display(), .1)]
    ParseError(PathBuf, #[source] serde_yaml::Error),
    #[error("設定検証エラー: {0}")]
    ValidationError(String),
}
