use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::models::{
    common::{beta, constants, ParticleKind, ThreeVector},
    generator::PrimaryVertex,
    hit::StepPoint,
};
use crate::scenario::BeamlineConfig;

/// 直線飛行と標的での一回散乱だけを扱う簡易トランスポート
///
/// 一次陽子を dcin → 標的 → dcout と進め、各検出器面の横断点を
/// [`StepPoint`] として返します。検出器側で有感面の判定を行うため、
/// アクセプタンス外の横断もそのまま返します。
#[derive(Debug, Clone)]
pub struct Beamline {
    pub dcin_z: f64,
    pub target_z: f64,
    pub dcout_z: f64,
    scatter: Option<Normal<f64>>,
    double_hit_probability: f64,
    secondary_probability: f64,
}

impl Beamline {
    pub fn new(config: &BeamlineConfig) -> Self {
        let scatter = if config.scatter_sigma_deg > 0.0 {
            Normal::new(0.0, config.scatter_sigma_deg.to_radians()).ok()
        } else {
            None
        };

        Self {
            dcin_z: config.dcin_z_mm,
            target_z: config.target_z_mm,
            dcout_z: config.dcout_z_mm,
            scatter,
            double_hit_probability: config.double_hit_probability,
            secondary_probability: config.secondary_probability,
        }
    }

    /// 一次粒子を輸送し、検出器面の横断点を時刻順に返す
    pub fn transport<R: Rng + ?Sized>(&self, vertex: &PrimaryVertex, rng: &mut R) -> Vec<StepPoint> {
        let mut steps = Vec::new();
        let particle = vertex.particle;
        let speed = beta(vertex.momentum.mag(), particle.mass_mev()) * constants::SPEED_OF_LIGHT_MM_PER_NS;

        // 前進しない粒子は検出器に届かない
        if vertex.momentum.z <= 0.0 || speed <= 0.0 {
            return steps;
        }

        let mut track = Track {
            position: vertex.position,
            momentum: vertex.momentum,
            time: 0.0,
            speed,
        };

        track.propagate_to(self.dcin_z);
        steps.push(track.step(1, 0, particle, "dcin", vertex.polarization));

        track.propagate_to(self.target_z);
        track.momentum = self.scatter(track.momentum, rng);
        if track.momentum.z <= 0.0 {
            return steps;
        }

        track.propagate_to(self.dcout_z);
        steps.push(track.step(1, 0, particle, "dcout", vertex.polarization));

        // チェンバー内で再散乱してもう一度横切る
        if rng.gen_bool(self.double_hit_probability) {
            let mut rescattered = track.clone();
            rescattered.momentum = self.scatter(track.momentum, rng);
            rescattered.position = rescattered.position + rescattered.momentum.unit() * 0.5;
            rescattered.time += 0.5 / rescattered.speed;
            steps.push(rescattered.step(1, 0, particle, "dcout", vertex.polarization));
        }

        // 標的で生じた二次粒子
        if rng.gen_bool(self.secondary_probability) {
            steps.push(track.step(2, 1, ParticleKind::Electron, "dcout", ThreeVector::zero()));
            steps.push(track.step(3, 1, ParticleKind::Gamma, "dcout", ThreeVector::zero()));
        }

        steps
    }

    /// 2つの射影面それぞれにガウス分布の散乱角を与える
    fn scatter<R: Rng + ?Sized>(&self, momentum: ThreeVector, rng: &mut R) -> ThreeVector {
        let Some(normal) = self.scatter.as_ref() else {
            return momentum;
        };
        let theta_x: f64 = normal.sample(rng);
        let theta_y: f64 = normal.sample(rng);

        let direction = momentum.unit();
        let kicked = ThreeVector::new(
            direction.x + theta_x.tan(),
            direction.y + theta_y.tan(),
            direction.z,
        );
        kicked.unit() * momentum.mag()
    }
}

#[derive(Debug, Clone)]
struct Track {
    position: ThreeVector,
    momentum: ThreeVector,
    time: f64,
    speed: f64,
}

impl Track {
    /// 直線でz面まで進める
    fn propagate_to(&mut self, z: f64) {
        let direction = self.momentum.unit();
        if direction.z <= 0.0 {
            return;
        }
        let path = (z - self.position.z) / direction.z;
        if path <= 0.0 {
            return;
        }
        self.position = self.position + direction * path;
        self.time += path / self.speed;
    }

    fn step(
        &self,
        track_id: i32,
        parent_id: i32,
        particle: ParticleKind,
        volume: &str,
        polarization: ThreeVector,
    ) -> StepPoint {
        StepPoint {
            track_id,
            parent_id,
            particle,
            volume: volume.to_string(),
            position: self.position,
            momentum: self.momentum,
            polarization,
            global_time: self.time,
        }
    }
}
