use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// 3次元ベクトル（位置 mm / 運動量 MeV/c / 偏極）
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ThreeVector {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl ThreeVector {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// ベクトルの大きさ
    pub fn mag(&self) -> f64 {
        self.mag2().sqrt()
    }

    /// 大きさの二乗
    pub fn mag2(&self) -> f64 {
        self.x.powi(2) + self.y.powi(2) + self.z.powi(2)
    }

    /// z軸に垂直な成分の大きさ
    pub fn perp(&self) -> f64 {
        (self.x.powi(2) + self.y.powi(2)).sqrt()
    }

    pub fn dot(&self, other: &ThreeVector) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: &ThreeVector) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// 最大の成分の絶対値で割ったベクトル（向きだけを保ち、大きさの二乗が溢れない）
    ///
    /// ゼロベクトルや非有限の成分を含む場合は `None`。
    pub fn scaled(&self) -> Option<Self> {
        let scale = self.x.abs().max(self.y.abs()).max(self.z.abs());
        if scale == 0.0 || !scale.is_finite() || self.x.is_nan() || self.y.is_nan() || self.z.is_nan() {
            return None;
        }
        Some(Self::new(self.x / scale, self.y / scale, self.z / scale))
    }

    /// 単位ベクトル化（ゼロベクトルはそのまま返す）
    pub fn unit(&self) -> Self {
        let mag = self.mag();
        if mag > 0.0 {
            Self::new(self.x / mag, self.y / mag, self.z / mag)
        } else {
            *self
        }
    }

    /// 極角 θ（z軸＝ビーム軸からの角度、度）
    pub fn theta_deg(&self) -> f64 {
        self.perp().atan2(self.z).to_degrees()
    }

    /// Y成分を0にしたベクトル（xz平面への射影）
    pub fn without_y(&self) -> Self {
        Self::new(self.x, 0.0, self.z)
    }

    /// X成分を0にしたベクトル（yz平面への射影）
    pub fn without_x(&self) -> Self {
        Self::new(0.0, self.y, self.z)
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }
}

impl Add for ThreeVector {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl Sub for ThreeVector {
    type Output = Self;

    fn sub(self, other: Self) -> Self::Output {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl Mul<f64> for ThreeVector {
    type Output = Self;

    fn mul(self, scalar: f64) -> Self::Output {
        Self::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }
}

impl From<[f64; 3]> for ThreeVector {
    fn from(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

/// 粒子の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticleKind {
    Proton,
    Electron,
    Gamma,
}

impl ParticleKind {
    /// PDGエンコーディング
    pub fn pdg_code(&self) -> i32 {
        match self {
            ParticleKind::Proton => 2212,
            ParticleKind::Electron => 11,
            ParticleKind::Gamma => 22,
        }
    }

    /// 電荷（素電荷単位）
    pub fn charge(&self) -> f64 {
        match self {
            ParticleKind::Proton => 1.0,
            ParticleKind::Electron => -1.0,
            ParticleKind::Gamma => 0.0,
        }
    }

    /// 静止質量（MeV/c²）
    pub fn mass_mev(&self) -> f64 {
        match self {
            ParticleKind::Proton => constants::PROTON_MASS_MEV,
            ParticleKind::Electron => constants::ELECTRON_MASS_MEV,
            ParticleKind::Gamma => 0.0,
        }
    }
}

/// 物理定数
pub mod constants {
    /// 陽子質量（MeV/c²）
    pub const PROTON_MASS_MEV: f64 = 938.272;
    /// 電子質量（MeV/c²）
    pub const ELECTRON_MASS_MEV: f64 = 0.510_999;
    /// 光速（mm/ns）
    pub const SPEED_OF_LIGHT_MM_PER_NS: f64 = 299.792_458;
    /// 陽子のPDGコード
    pub const PROTON_PDG: i32 = 2212;
}

/// 運動量と質量から運動エネルギーを計算（MeV）
pub fn kinetic_energy(momentum_mev: f64, mass_mev: f64) -> f64 {
    (momentum_mev.powi(2) + mass_mev.powi(2)).sqrt() - mass_mev
}

/// 運動量と質量から速度 β = p/E を計算
pub fn beta(momentum_mev: f64, mass_mev: f64) -> f64 {
    let energy = (momentum_mev.powi(2) + mass_mev.powi(2)).sqrt();
    if energy > 0.0 { momentum_mev / energy } else { 0.0 }
}
