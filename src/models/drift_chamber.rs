use crate::models::{
    common::{constants, ThreeVector},
    hit::{DriftChamberHit, HitCollectionError, StepPoint},
    traits::IHitSource,
};

/// ドリフトチェンバー（有感検出器）
///
/// 有感面を横切った粒子のうち、一次（parent_id == 0）の荷電陽子だけを
/// ヒットとして記録します。ヒットコレクションはイベントごとに作り直されます。
#[derive(Debug, Clone)]
pub struct DriftChamber {
    /// 検出器名（"dcin" / "dcout"）
    pub name: String,
    /// 検出器面のID（コピー番号）
    pub layer_id: i32,
    /// チェンバー中心（ワールド座標、mm）
    pub center: ThreeVector,
    /// 有感領域の半幅（mm）
    pub half_width: f64,
    /// 無効化されたチェンバーはコレクションを作らない
    pub enabled: bool,
    /// 現在のイベントのヒットコレクション
    collection: Option<HitCollection>,
    /// ラン全体の統計
    stats: ChamberStats,
}

#[derive(Debug, Clone)]
struct HitCollection {
    event_id: u64,
    hits: Vec<DriftChamberHit>,
}

/// ステップを記録しなかった理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Neutral,
    NotProton,
    Secondary,
    OutsideAcceptance,
    OtherVolume,
}

/// チェンバーの統計情報
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChamberStats {
    pub steps_seen: u64,
    pub hits_recorded: u64,
    pub rejected_neutral: u64,
    pub rejected_not_proton: u64,
    pub rejected_secondary: u64,
    pub rejected_acceptance: u64,
}

impl DriftChamber {
    /// 新しいチェンバーを作成
    ///
    /// # 引数
    ///
    /// * `name` - ヒットコレクション名にも使われる検出器名
    /// * `layer_id` - 検出器面のID
    /// * `z` - 検出器面のz位置（mm）
    /// * `half_width` - 有感領域の半幅（mm）
    pub fn new(name: &str, layer_id: i32, z: f64, half_width: f64) -> Self {
        Self {
            name: name.to_string(),
            layer_id,
            center: ThreeVector::new(0.0, 0.0, z),
            half_width,
            enabled: true,
            collection: None,
            stats: ChamberStats::default(),
        }
    }

    /// イベント開始時にヒットコレクションを作り直す
    pub fn begin_event(&mut self, event_id: u64) {
        self.collection = if self.enabled {
            Some(HitCollection { event_id, hits: Vec::new() })
        } else {
            None
        };
    }

    /// 1ステップ分の横断を処理
    ///
    /// 記録した場合は `Ok(())`、記録しなかった場合はその理由を返します。
    pub fn process_step(&mut self, step: &StepPoint) -> Result<(), RejectReason> {
        if step.volume != self.name {
            return Err(RejectReason::OtherVolume);
        }
        self.stats.steps_seen += 1;

        if step.particle.charge() == 0.0 {
            self.stats.rejected_neutral += 1;
            return Err(RejectReason::Neutral);
        }
        if step.particle.pdg_code() != constants::PROTON_PDG {
            self.stats.rejected_not_proton += 1;
            return Err(RejectReason::NotProton);
        }
        if step.parent_id != 0 {
            self.stats.rejected_secondary += 1;
            return Err(RejectReason::Secondary);
        }

        let local_position = step.position - self.center;
        if local_position.x.abs() > self.half_width || local_position.y.abs() > self.half_width {
            self.stats.rejected_acceptance += 1;
            return Err(RejectReason::OutsideAcceptance);
        }

        let hit = DriftChamberHit {
            layer_id: self.layer_id,
            local_position,
            global_position: step.position,
            momentum: step.momentum,
            polarization: step.polarization,
            time: step.global_time,
            track_id: step.track_id,
            parent_id: step.parent_id,
            particle_id: step.particle.pdg_code(),
        };

        // 無効化されたチェンバーはコレクションがないので記録しない
        if let Some(collection) = self.collection.as_mut() {
            collection.hits.push(hit);
            self.stats.hits_recorded += 1;
        }
        Ok(())
    }

    pub fn stats(&self) -> &ChamberStats {
        &self.stats
    }

    /// ラン開始時の初期化
    pub fn reset_stats(&mut self) {
        self.stats = ChamberStats::default();
        self.collection = None;
    }
}

impl IHitSource for DriftChamber {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve(&self, event_id: u64) -> Result<&[DriftChamberHit], HitCollectionError> {
        match &self.collection {
            Some(collection) if collection.event_id == event_id => Ok(&collection.hits),
            _ => Err(HitCollectionError::MissingHitCollection {
                detector: format!("{}/dc_hitcollection", self.name),
                event_id,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::common::ParticleKind;

    fn step(particle: ParticleKind, parent_id: i32, x: f64) -> StepPoint {
        StepPoint {
            track_id: if parent_id == 0 { 1 } else { 2 },
            parent_id,
            particle,
            volume: "dcout".to_string(),
            position: ThreeVector::new(x, 0.0, 40.0),
            momentum: ThreeVector::new(0.0, 0.0, 200.0),
            polarization: ThreeVector::new(0.0, 1.0, 0.0),
            global_time: 1.0,
        }
    }

    #[test]
    fn test_only_primary_charged_protons_make_hits() {
        let mut chamber = DriftChamber::new("dcout", 1, 40.0, 100.0);
        chamber.begin_event(0);

        assert_eq!(chamber.process_step(&step(ParticleKind::Proton, 0, 1.0)), Ok(()));
        assert_eq!(chamber.process_step(&step(ParticleKind::Gamma, 1, 0.0)), Err(RejectReason::Neutral));
        assert_eq!(chamber.process_step(&step(ParticleKind::Electron, 1, 0.0)), Err(RejectReason::NotProton));
        assert_eq!(chamber.process_step(&step(ParticleKind::Proton, 1, 0.0)), Err(RejectReason::Secondary));
        assert_eq!(
            chamber.process_step(&step(ParticleKind::Proton, 0, 150.0)),
            Err(RejectReason::OutsideAcceptance)
        );

        let hits = chamber.resolve(0).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].local_position, ThreeVector::new(1.0, 0.0, 0.0));
        assert_eq!(hits[0].global_position, ThreeVector::new(1.0, 0.0, 40.0));
        assert_eq!(hits[0].particle_id, 2212);
        assert_eq!(chamber.stats().steps_seen, 5);
        assert_eq!(chamber.stats().hits_recorded, 1);
    }

    #[test]
    fn test_other_volume_is_ignored() {
        let mut chamber = DriftChamber::new("dcin", 0, -20.0, 100.0);
        chamber.begin_event(0);
        assert_eq!(
            chamber.process_step(&step(ParticleKind::Proton, 0, 0.0)),
            Err(RejectReason::OtherVolume)
        );
        assert_eq!(chamber.stats().steps_seen, 0);
    }

    #[test]
    fn test_collection_is_per_event() {
        let mut chamber = DriftChamber::new("dcout", 1, 40.0, 100.0);
        chamber.begin_event(3);
        chamber.process_step(&step(ParticleKind::Proton, 0, 0.0)).unwrap();
        assert!(chamber.resolve(2).is_err());

        chamber.begin_event(4);
        assert!(chamber.resolve(4).unwrap().is_empty());
    }

    #[test]
    fn test_disabled_chamber_has_no_collection() {
        let mut chamber = DriftChamber::new("dcout", 1, 40.0, 100.0);
        chamber.enabled = false;
        chamber.begin_event(0);
        chamber.process_step(&step(ParticleKind::Proton, 0, 0.0)).unwrap();

        let err = chamber.resolve(0).unwrap_err();
        assert_eq!(
            err,
            HitCollectionError::MissingHitCollection {
                detector: "dcout/dc_hitcollection".to_string(),
                event_id: 0
            }
        );
        assert_eq!(chamber.stats().hits_recorded, 0);
    }
}
