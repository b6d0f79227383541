use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::models::common::{kinetic_energy, ParticleKind, ThreeVector};
use crate::scenario::GunConfig;

/// 運動量分布の1サンプル
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProtonSample {
    /// 運動量（MeV/c）
    pub momentum: [f64; 3],
    /// 反応面の法線（偏極方向として使う）
    #[serde(default)]
    pub normal: [f64; 3],
    /// 反応面を決めるときの基準ベクトル（解析用にそのまま運ぶ）
    #[serde(default)]
    pub reference: Option<[f64; 3]>,
}

/// 分布ファイル読み込みエラー
#[derive(Debug, thiserror::Error)]
pub enum DistributionError {
    #[error("distribution file {}: {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),
    #[error("distribution file {}: {}", .0.display(), .1)]
    Parse(PathBuf, #[source] serde_yaml::Error),
    #[error("distribution has no samples")]
    Empty,
}

/// 外部から与えられる陽子の運動量分布
///
/// サンプルを先頭から順に返し、末尾に達したら先頭に戻ります。
/// 一次粒子生成器が所有し、構築時に注入されます。
#[derive(Debug, Clone)]
pub struct ProtonDistribution {
    samples: Vec<ProtonSample>,
    next_index: usize,
}

impl ProtonDistribution {
    pub fn new(samples: Vec<ProtonSample>) -> Result<Self, DistributionError> {
        if samples.is_empty() {
            return Err(DistributionError::Empty);
        }
        Ok(Self { samples, next_index: 0 })
    }

    /// YAMLのサンプル列を読み込み
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, DistributionError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| DistributionError::Io(path.to_path_buf(), e))?;
        let samples: Vec<ProtonSample> =
            serde_yaml::from_str(&contents).map_err(|e| DistributionError::Parse(path.to_path_buf(), e))?;
        let distribution = Self::new(samples)?;

        info!("reading distribution file {}: {} entries", path.display(), distribution.len());
        Ok(distribution)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// 次のサンプルを取り出す（末尾の次は先頭）
    pub fn generate(&mut self) -> ProtonSample {
        if self.next_index >= self.samples.len() {
            self.next_index = 0;
        }
        let sample = self.samples[self.next_index];
        self.next_index += 1;
        sample
    }
}

/// 1イベント分の一次粒子
#[derive(Debug, Clone, PartialEq)]
pub struct PrimaryVertex {
    pub particle: ParticleKind,
    pub position: ThreeVector,
    pub momentum: ThreeVector,
    pub polarization: ThreeVector,
    pub kinetic_energy: f64,
    /// 分布サンプルの基準ベクトル（ガンのときは None）
    pub reference: Option<ThreeVector>,
}

/// 一次粒子生成器（陽子ガン）
#[derive(Debug, Clone)]
pub struct PrimaryGenerator {
    pub momentum: f64,
    pub momentum_sigma: f64,
    pub position: ThreeVector,
    pub direction: ThreeVector,
    pub polarization: ThreeVector,
    distribution: Option<ProtonDistribution>,
}

impl PrimaryGenerator {
    pub fn new(config: &GunConfig, distribution: Option<ProtonDistribution>) -> Self {
        Self {
            momentum: config.momentum_mev,
            momentum_sigma: config.momentum_sigma_mev,
            position: ThreeVector::from(config.position_mm),
            direction: ThreeVector::from(config.direction).unit(),
            polarization: ThreeVector::from(config.polarization),
            distribution,
        }
    }

    pub fn has_distribution(&self) -> bool {
        self.distribution.is_some()
    }

    /// 一次粒子を1つ生成
    pub fn generate_primary<R: Rng + ?Sized>(&mut self, rng: &mut R) -> PrimaryVertex {
        let particle = ParticleKind::Proton;

        let (momentum, polarization, reference) = match self.distribution.as_mut() {
            Some(distribution) => {
                let sample = distribution.generate();
                let normal = ThreeVector::from(sample.normal);
                let polarization = if normal.is_zero() { self.polarization } else { normal.unit() };
                (ThreeVector::from(sample.momentum), polarization, sample.reference.map(ThreeVector::from))
            }
            None => {
                let magnitude = if self.momentum_sigma > 0.0 {
                    match Normal::new(self.momentum, self.momentum_sigma) {
                        Ok(normal) => normal.sample(rng).max(0.0),
                        Err(_) => self.momentum,
                    }
                } else {
                    self.momentum
                };
                (self.direction * magnitude, self.polarization, None)
            }
        };

        let ekin = kinetic_energy(momentum.mag(), particle.mass_mev());
        debug!(p = momentum.mag(), ekin, "primary proton generated");

        PrimaryVertex {
            particle,
            position: self.position,
            momentum,
            polarization,
            kinetic_energy: ekin,
            reference,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn sample(pz: f64) -> ProtonSample {
        ProtonSample { momentum: [0.0, 0.0, pz], normal: [0.0, 0.0, 0.0], reference: None }
    }

    #[test]
    fn test_distribution_wraps_around() {
        let mut distribution = ProtonDistribution::new(vec![sample(1.0), sample(2.0)]).unwrap();
        let drawn: Vec<f64> = (0..5).map(|_| distribution.generate().momentum[2]).collect();
        assert_eq!(drawn, vec![1.0, 2.0, 1.0, 2.0, 1.0]);
    }

    #[test]
    fn test_empty_distribution_is_rejected() {
        assert!(matches!(ProtonDistribution::new(Vec::new()), Err(DistributionError::Empty)));
    }

    #[test]
    fn test_default_gun() {
        let mut generator = PrimaryGenerator::new(&GunConfig::default(), None);
        let mut rng = StdRng::seed_from_u64(1);
        let vertex = generator.generate_primary(&mut rng);

        assert_eq!(vertex.momentum, ThreeVector::new(0.0, 0.0, 200.0));
        assert_eq!(vertex.position, ThreeVector::new(0.0, 0.0, -50.0));
        assert_eq!(vertex.polarization, ThreeVector::new(0.0, 1.0, 0.0));
        assert!((vertex.kinetic_energy - 21.08).abs() < 0.01);
    }

    #[test]
    fn test_distribution_overrides_gun() {
        let samples = vec![ProtonSample {
            momentum: [10.0, 0.0, 150.0],
            normal: [2.0, 0.0, 0.0],
            reference: Some([0.0, 0.0, 1.0]),
        }];
        let distribution = ProtonDistribution::new(samples).unwrap();
        let mut generator = PrimaryGenerator::new(&GunConfig::default(), Some(distribution));
        let mut rng = StdRng::seed_from_u64(1);
        let vertex = generator.generate_primary(&mut rng);

        assert_eq!(vertex.momentum, ThreeVector::new(10.0, 0.0, 150.0));
        assert_eq!(vertex.polarization, ThreeVector::new(1.0, 0.0, 0.0));
        assert_eq!(vertex.reference, Some(ThreeVector::new(0.0, 0.0, 1.0)));
    }

    #[test]
    fn test_momentum_spread_is_non_negative() {
        let config = GunConfig { momentum_sigma_mev: 50.0, ..GunConfig::default() };
        let mut generator = PrimaryGenerator::new(&config, None);
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let vertex = generator.generate_primary(&mut rng);
            assert!(vertex.momentum.z >= 0.0);
        }
    }

    #[test]
    fn test_sample_fields_are_optional_in_yaml() {
        let yaml = "- momentum: [1.0, 2.0, 3.0]\n- momentum: [0.0, 0.0, 5.0]\n  normal: [0.0, 1.0, 0.0]\n  reference: [0.0, 0.0, 1.0]\n";
        let samples: Vec<ProtonSample> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(samples[0].normal, [0.0, 0.0, 0.0]);
        assert_eq!(samples[0].reference, None);
        assert_eq!(samples[1].reference, Some([0.0, 0.0, 1.0]));
    }
}
