//! # Kinematics モジュール
//!
//! ドリフトチェンバーのヒットから導出する物理量（方向角・散乱角）の計算を提供します。
//!
//! すべて純粋関数で、ゼロ運動量や符号が決まらないケースは
//! [`KinematicsError`] として呼び出し側に返します。NaN を返すことはありません。

use crate::models::common::ThreeVector;

/// 導出量の計算エラー
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum KinematicsError {
    /// 大きさ0の運動量ベクトルが角度計算に渡された
    #[error("degenerate momentum: zero-magnitude vector in angle computation")]
    DegenerateMomentum,
    /// 射影角の符号が決まらない（pDown と pUp の該当成分が等しい）
    #[error("indeterminate sign: momentum component difference is exactly zero")]
    IndeterminateSign,
}

/// 射影面
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// Y成分を0にした xz 平面（左右の散乱）
    Xz,
    /// X成分を0にした yz 平面（上下の散乱）
    Yz,
}

/// 運動量の極角（度）
pub fn polar_angle_deg(momentum: &ThreeVector) -> Result<f64, KinematicsError> {
    if momentum.is_zero() {
        return Err(KinematicsError::DegenerateMomentum);
    }
    Ok(momentum.theta_deg())
}

/// 2つのベクトルのなす角（度、[0, 180]）
///
/// `atan2(|a×b|, a·b)` で計算するため、平行なベクトルではちょうど0になります。
pub fn opening_angle_deg(a: &ThreeVector, b: &ThreeVector) -> Result<f64, KinematicsError> {
    let (cross, dot) = cross_and_dot(a, b)?;
    Ok(cross.mag().atan2(dot).to_degrees())
}

/// 大きさを揃えたベクトル同士の外積と内積
fn cross_and_dot(a: &ThreeVector, b: &ThreeVector) -> Result<(ThreeVector, f64), KinematicsError> {
    let (Some(a), Some(b)) = (a.scaled(), b.scaled()) else {
        return Err(KinematicsError::DegenerateMomentum);
    };
    Ok((a.cross(&b), a.dot(&b)))
}

/// 上流と下流の運動量の間の散乱角（度）
pub fn scattering_angle_deg(p_up: &ThreeVector, p_down: &ThreeVector) -> Result<f64, KinematicsError> {
    opening_angle_deg(p_up, p_down)
}

/// 射影面での符号付き散乱角（度、[-180, 180]）
///
/// 符号は下流と上流の運動量の差（xz なら x 成分、yz なら y 成分）で決まります。
/// 差がちょうど0のとき、射影どうしが同じ向き（外積0かつ内積正）なら 0.0 を返し、
/// そうでなければ [`KinematicsError::IndeterminateSign`] を返します。
pub fn signed_projected_angle_deg(
    p_up: &ThreeVector,
    p_down: &ThreeVector,
    projection: Projection,
) -> Result<f64, KinematicsError> {
    let (up, down, diff) = match projection {
        Projection::Xz => (p_up.without_y(), p_down.without_y(), p_down.x - p_up.x),
        Projection::Yz => (p_up.without_x(), p_down.without_x(), p_down.y - p_up.y),
    };

    let (cross, dot) = cross_and_dot(&up, &down)?;

    if diff == 0.0 {
        if cross.is_zero() && dot > 0.0 {
            return Ok(0.0);
        }
        return Err(KinematicsError::IndeterminateSign);
    }

    Ok(cross.mag().atan2(dot).to_degrees() * diff.signum())
}

/// ビーム軸（z軸）まわりの方位角
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Azimuth {
    /// +y から +x に向かって測った角度（度、(-180, 180]）
    pub phi: f64,
    pub cos_phi: f64,
    pub sin_phi: f64,
}

impl Azimuth {
    /// 横方向成分がない（ビーム軸に平行またはゼロ）場合は `None`
    pub fn of(momentum: &ThreeVector) -> Option<Self> {
        let perp = momentum.x.hypot(momentum.y);
        if perp == 0.0 || !perp.is_finite() {
            return None;
        }
        Some(Self {
            phi: momentum.x.atan2(momentum.y).to_degrees(),
            cos_phi: momentum.y / perp,
            sin_phi: momentum.x / perp,
        })
    }
}

/// 1ペア（上流の代表ヒットと下流ヒット1つ）から得られる散乱角
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScatteringAngles {
    pub theta: Result<f64, KinematicsError>,
    pub theta_x: Result<f64, KinematicsError>,
    pub theta_y: Result<f64, KinematicsError>,
    /// 下流運動量の方位角
    pub azimuth: Option<Azimuth>,
}

impl ScatteringAngles {
    pub fn compute(p_up: &ThreeVector, p_down: &ThreeVector) -> Self {
        Self {
            theta: scattering_angle_deg(p_up, p_down),
            theta_x: signed_projected_angle_deg(p_up, p_down, Projection::Xz),
            theta_y: signed_projected_angle_deg(p_up, p_down, Projection::Yz),
            azimuth: Azimuth::of(p_down),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(x: f64, y: f64, z: f64) -> ThreeVector {
        ThreeVector::new(x, y, z)
    }

    #[test]
    fn test_parallel_momenta_give_zero_angle() {
        let angle = scattering_angle_deg(&v(0.0, 0.0, 1.0), &v(0.0, 0.0, 1.0)).unwrap();
        assert_eq!(angle, 0.0);
    }

    #[test]
    fn test_perpendicular_momenta_give_right_angle() {
        let angle = scattering_angle_deg(&v(0.0, 0.0, 1.0), &v(1.0, 0.0, 0.0)).unwrap();
        assert!((angle - 90.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_momentum_is_degenerate() {
        assert_eq!(
            scattering_angle_deg(&v(0.0, 0.0, 0.0), &v(0.0, 0.0, 1.0)),
            Err(KinematicsError::DegenerateMomentum)
        );
        assert_eq!(polar_angle_deg(&v(0.0, 0.0, 0.0)), Err(KinematicsError::DegenerateMomentum));
    }

    #[test]
    fn test_angle_stays_in_range() {
        let pairs = [
            (v(0.0, 0.0, 200.0), v(0.0, 0.0, -200.0)),
            (v(1e-9, 0.0, 1.0), v(1e-9, 0.0, 1.0)),
            (v(3.0, -4.0, 12.0), v(-5.0, 2.0, 1.0)),
            (v(0.1, 0.1, 0.1), v(100.0, 100.0, 100.0)),
        ];
        for (a, b) in pairs {
            let angle = scattering_angle_deg(&a, &b).unwrap();
            assert!((0.0..=180.0).contains(&angle), "angle {} out of range", angle);
        }
    }

    #[test]
    fn test_signed_angle_follows_component_difference() {
        let up = v(0.0, 0.0, 1.0);
        let left = signed_projected_angle_deg(&up, &v(1.0, 0.0, 1.0), Projection::Xz).unwrap();
        let right = signed_projected_angle_deg(&up, &v(-1.0, 0.0, 1.0), Projection::Xz).unwrap();
        assert!((left - 45.0).abs() < 1e-9);
        assert!((right + 45.0).abs() < 1e-9);

        let down = signed_projected_angle_deg(&up, &v(0.0, -1.0, 1.0), Projection::Yz).unwrap();
        assert!((down + 45.0).abs() < 1e-9);
    }

    #[test]
    fn test_projection_ignores_other_axis() {
        // y成分はxz射影に影響しない
        let up = v(0.0, 5.0, 1.0);
        let angle = signed_projected_angle_deg(&up, &v(1.0, -7.0, 1.0), Projection::Xz).unwrap();
        assert!((angle - 45.0).abs() < 1e-9);
    }

    #[test]
    fn test_equal_component_with_zero_angle_is_zero() {
        let up = v(0.0, 0.0, 1.0);
        assert_eq!(signed_projected_angle_deg(&up, &up, Projection::Xz), Ok(0.0));
        assert_eq!(signed_projected_angle_deg(&up, &up, Projection::Yz), Ok(0.0));
    }

    #[test]
    fn test_equal_component_with_nonzero_angle_is_indeterminate() {
        let up = v(1.0, 0.0, 1.0);
        let down = v(1.0, 0.0, 2.0);
        assert_eq!(
            signed_projected_angle_deg(&up, &down, Projection::Xz),
            Err(KinematicsError::IndeterminateSign)
        );
    }

    #[test]
    fn test_projection_onto_zero_is_degenerate() {
        // y軸方向の運動量は xz 平面に射影すると0になる
        let up = v(0.0, 1.0, 0.0);
        let down = v(1.0, 0.0, 1.0);
        assert_eq!(
            signed_projected_angle_deg(&up, &down, Projection::Xz),
            Err(KinematicsError::DegenerateMomentum)
        );
    }

    #[test]
    fn test_parallel_off_axis_momenta() {
        for p in [v(10.0, 0.0, 195.0), v(3.0, 0.0, 7.0), v(-8.0, 6.0, 190.0)] {
            let angles = ScatteringAngles::compute(&p, &p);
            assert_eq!(angles.theta, Ok(0.0));
            assert_eq!(angles.theta_x, Ok(0.0));
            assert_eq!(angles.theta_y, Ok(0.0));
        }
        // 大きさが違っても向きが同じなら0
        assert_eq!(scattering_angle_deg(&v(3.0, 0.0, 7.0), &v(6.0, 0.0, 14.0)), Ok(0.0));
    }

    #[test]
    fn test_identical_projection_is_zero() {
        // xz 射影は同一、y だけが違う
        let angles = ScatteringAngles::compute(&v(1.0, 0.0, 1.0), &v(1.0, 5.0, 1.0));
        assert_eq!(angles.theta_x, Ok(0.0));
        assert!(angles.theta_y.unwrap() > 0.0);
    }

    #[test]
    fn test_antiparallel_projection_is_indeterminate() {
        assert_eq!(
            signed_projected_angle_deg(&v(0.0, 0.0, 1.0), &v(0.0, 0.0, -1.0), Projection::Xz),
            Err(KinematicsError::IndeterminateSign)
        );
    }

    #[test]
    fn test_huge_momenta_are_not_degenerate() {
        let angle = scattering_angle_deg(&v(0.0, 0.0, 1e300), &v(1e300, 0.0, 1e300)).unwrap();
        assert!((angle - 45.0).abs() < 1e-9);
        assert_eq!(
            scattering_angle_deg(&v(f64::NAN, 0.0, 1.0), &v(0.0, 0.0, 1.0)),
            Err(KinematicsError::DegenerateMomentum)
        );
    }

    #[test]
    fn test_azimuth_measured_from_y_axis() {
        let up = Azimuth::of(&v(0.0, 10.0, 100.0)).unwrap();
        assert_eq!(up.phi, 0.0);
        assert_eq!((up.cos_phi, up.sin_phi), (1.0, 0.0));

        let left = Azimuth::of(&v(3.0, 0.0, 100.0)).unwrap();
        assert!((left.phi - 90.0).abs() < 1e-12);
        assert_eq!((left.cos_phi, left.sin_phi), (0.0, 1.0));

        let diagonal = Azimuth::of(&v(-1.0, -1.0, 1.0)).unwrap();
        assert!((diagonal.phi + 135.0).abs() < 1e-12);
        assert!((diagonal.cos_phi.powi(2) + diagonal.sin_phi.powi(2) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_azimuth_undefined_on_beam_axis() {
        assert_eq!(Azimuth::of(&v(0.0, 0.0, 1.0)), None);
        assert_eq!(Azimuth::of(&v(0.0, 0.0, 0.0)), None);
    }
}
