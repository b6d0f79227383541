//! # Event Action モジュール
//!
//! 1イベントごとに上流（dcin）と下流（dcout）のドリフトチェンバーのヒット列を
//! 受け取り、ヒストグラムへの詰め込み、イベントツリーの1行、間引かれた
//! 診断出力を行います。
//!
//! ## 処理順序
//!
//! 1. **ヒット数**: 各検出器のヒット数をヒストグラムに詰める（0でも詰める）
//! 2. **ヒットごと**: 運動量の極角と、ローカル座標の (x, y) を詰める
//! 3. **ペア解析**: 両方にヒットがあるとき、dcin の先頭ヒットを固定し、
//!    dcout のすべてのヒットとの散乱角（3次元・xz射影・yz射影）と、
//!    dcout 運動量のビーム軸まわりの方位角 φ（cos φ, sin φ と θ との相関も）を詰める
//! 4. **イベントツリー**: 各検出器の先頭ヒットの情報を書き、必ず1行確定する
//! 5. **診断出力**: 表示間隔に当たるイベントでヒット数を出力し、間隔を更新する
//!
//! ヒットコレクションが取得できない検出器は、そのイベントでは一切の
//! ヒストグラムを更新せず、警告を出して処理を続けます。

use tracing::{debug, info, trace, warn};

use crate::histogram::AnalysisError;
use crate::kinematics::{polar_angle_deg, Azimuth, KinematicsError, ScatteringAngles};
use crate::models::hit::DriftChamberHit;
use crate::models::traits::{IEventAction, IHitSource, IMetricSink};
use crate::run_action::{names, COLUMNS_PER_CHAMBER};
use crate::throttle::PrintThrottle;

/// 検出器ごとのヒストグラム名とカラム位置
struct ChamberSlot {
    /// 診断出力での番号（1始まり）
    number: usize,
    numhit: &'static str,
    direction: &'static str,
    position: &'static str,
    first_column: usize,
}

const DCIN: ChamberSlot = ChamberSlot {
    number: 1,
    numhit: names::DCIN_NUMHIT,
    direction: names::DCIN_DIRECTION,
    position: names::DCIN_HITPOSITION_XY,
    first_column: 0,
};

const DCOUT: ChamberSlot = ChamberSlot {
    number: 2,
    numhit: names::DCOUT_NUMHIT,
    direction: names::DCOUT_DIRECTION,
    position: names::DCOUT_HITPOSITION_XY,
    first_column: COLUMNS_PER_CHAMBER,
};

/// 1イベントの処理結果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventSummary {
    pub event_id: u64,
    /// ヒット数（コレクションが取得できなかった場合は None）
    pub dcin_hits: Option<usize>,
    pub dcout_hits: Option<usize>,
    pub theta_fills: usize,
    pub theta_x_fills: usize,
    pub theta_y_fills: usize,
    pub phi_fills: usize,
    /// 導出量が計算できずに見送った詰め込みの数
    pub skipped_fills: usize,
    /// 診断出力を行ったかどうか
    pub printed: bool,
}

/// ラン全体の統計
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventActionStats {
    pub events: u64,
    pub missing_collections: u64,
    pub degenerate_momenta: u64,
    pub indeterminate_signs: u64,
    /// ビーム軸に平行で方位角が決まらなかったペア
    pub undefined_azimuths: u64,
    pub sink_errors: u64,
}

impl EventActionStats {
    pub fn skipped_fills(&self) -> u64 {
        self.degenerate_momenta + self.indeterminate_signs
    }
}

/// イベントアクション（イベント単位の解析）
#[derive(Debug, Default)]
pub struct EventAction {
    throttle: PrintThrottle,
    stats: EventActionStats,
    last_summary: Option<EventSummary>,
}

impl EventAction {
    pub fn new() -> Self {
        Self::default()
    }

    /// ラン開始時の初期化（表示間隔を1に戻す）
    pub fn begin_of_run(&mut self) {
        self.throttle.reset();
        self.stats = EventActionStats::default();
        self.last_summary = None;
    }

    pub fn print_interval(&self) -> u64 {
        self.throttle.interval()
    }

    pub fn stats(&self) -> &EventActionStats {
        &self.stats
    }

    pub fn last_summary(&self) -> Option<&EventSummary> {
        self.last_summary.as_ref()
    }

    /// 両検出器のヒット列が揃っている場合のイベント処理
    pub fn on_event(
        &mut self,
        event_id: u64,
        upstream: &[DriftChamberHit],
        downstream: &[DriftChamberHit],
        sink: &mut dyn IMetricSink,
    ) -> EventSummary {
        self.process(event_id, Some(upstream), Some(downstream), sink)
    }

    /// 検出器からヒット列を取得してイベントを処理
    pub fn end_of_event(
        &mut self,
        event_id: u64,
        dcin: &dyn IHitSource,
        dcout: &dyn IHitSource,
        sink: &mut dyn IMetricSink,
    ) -> EventSummary {
        let upstream = self.resolve(dcin, event_id);
        let downstream = self.resolve(dcout, event_id);
        self.process(event_id, upstream, downstream, sink)
    }

    fn resolve<'a>(&mut self, source: &'a dyn IHitSource, event_id: u64) -> Option<&'a [DriftChamberHit]> {
        match source.resolve(event_id) {
            Ok(hits) => Some(hits),
            Err(err) => {
                self.stats.missing_collections += 1;
                warn!(detector = source.name(), event_id, "{}", err);
                None
            }
        }
    }

    fn process(
        &mut self,
        event_id: u64,
        upstream: Option<&[DriftChamberHit]>,
        downstream: Option<&[DriftChamberHit]>,
        sink: &mut dyn IMetricSink,
    ) -> EventSummary {
        let mut summary = EventSummary {
            event_id,
            dcin_hits: upstream.map(<[_]>::len),
            dcout_hits: downstream.map(<[_]>::len),
            ..EventSummary::default()
        };

        // ヒット数とヒットごとの量
        for (slot, hits) in [(&DCIN, upstream), (&DCOUT, downstream)] {
            if let Some(hits) = hits {
                self.fill_chamber(slot, hits, sink, &mut summary);
            }
        }

        // ペア解析: dcin の先頭ヒットを基準に dcout の全ヒット
        if let (Some([reference, ..]), Some(downstream)) = (upstream, downstream) {
            for hit in downstream {
                self.fill_pair(reference, hit, sink, &mut summary);
            }
        }

        // イベントツリー
        for (slot, hits) in [(&DCIN, upstream), (&DCOUT, downstream)] {
            if let Some(hits) = hits {
                self.write_columns(slot, hits, sink);
            }
        }
        let committed = sink.commit_row();
        self.check(committed);

        // 診断出力
        if self.throttle.should_print(event_id) {
            summary.printed = true;
            for line in diagnostic_lines(summary.dcin_hits, summary.dcout_hits) {
                info!("{}", line);
            }
        }
        self.throttle.advance(event_id);
        self.stats.events += 1;

        trace!(?summary, "event processed");
        self.last_summary = Some(summary.clone());
        summary
    }

    fn fill_chamber(
        &mut self,
        slot: &ChamberSlot,
        hits: &[DriftChamberHit],
        sink: &mut dyn IMetricSink,
        summary: &mut EventSummary,
    ) {
        let counted = sink.fill_h1(slot.numhit, hits.len() as f64);
        self.check(counted);

        for hit in hits {
            match polar_angle_deg(&hit.momentum) {
                Ok(direction) => {
                    let filled = sink.fill_h1(slot.direction, direction);
                    self.check(filled);
                }
                Err(err) => self.skip(err, slot.direction, summary),
            }
            let filled = sink.fill_h2(slot.position, hit.local_position.x, hit.local_position.y);
            self.check(filled);
        }
    }

    fn fill_pair(
        &mut self,
        reference: &DriftChamberHit,
        hit: &DriftChamberHit,
        sink: &mut dyn IMetricSink,
        summary: &mut EventSummary,
    ) {
        let angles = ScatteringAngles::compute(&reference.momentum, &hit.momentum);

        match angles.theta {
            Ok(theta) => {
                let filled = sink.fill_h1(names::ANALYSIS_THETA, theta);
                self.check(filled);
                summary.theta_fills += 1;
            }
            Err(err) => self.skip(err, names::ANALYSIS_THETA, summary),
        }
        match angles.theta_x {
            Ok(theta_x) => {
                let filled = sink.fill_h1(names::ANALYSIS_THETA_X, theta_x);
                self.check(filled);
                summary.theta_x_fills += 1;
            }
            Err(err) => self.skip(err, names::ANALYSIS_THETA_X, summary),
        }
        match angles.theta_y {
            Ok(theta_y) => {
                let filled = sink.fill_h1(names::ANALYSIS_THETA_Y, theta_y);
                self.check(filled);
                summary.theta_y_fills += 1;
            }
            Err(err) => self.skip(err, names::ANALYSIS_THETA_Y, summary),
        }

        match angles.azimuth {
            Some(azimuth) => self.fill_azimuth(&azimuth, angles.theta.ok(), sink, summary),
            None => {
                self.stats.undefined_azimuths += 1;
                trace!(event_id = summary.event_id, "azimuth undefined for track along the beam axis");
            }
        }
    }

    fn fill_azimuth(
        &mut self,
        azimuth: &Azimuth,
        theta: Option<f64>,
        sink: &mut dyn IMetricSink,
        summary: &mut EventSummary,
    ) {
        let filled = sink.fill_h1(names::ANALYSIS_PHI, azimuth.phi);
        self.check(filled);
        let filled = sink.fill_h1(names::ANALYSIS_COSPHI, azimuth.cos_phi);
        self.check(filled);
        let filled = sink.fill_h1(names::ANALYSIS_SINPHI, azimuth.sin_phi);
        self.check(filled);
        if let Some(theta) = theta {
            let filled = sink.fill_h2(names::ANALYSIS_THETA_VS_COSPHI, theta, azimuth.cos_phi);
            self.check(filled);
            let filled = sink.fill_h2(names::ANALYSIS_THETA_VS_SINPHI, theta, azimuth.sin_phi);
            self.check(filled);
        }
        summary.phi_fills += 1;
    }

    fn write_columns(&mut self, slot: &ChamberSlot, hits: &[DriftChamberHit], sink: &mut dyn IMetricSink) {
        let Some(first) = hits.first() else {
            return;
        };
        let values = [
            hits.len() as f64,
            first.global_position.x,
            first.global_position.y,
            first.global_position.z,
            first.momentum.x,
            first.momentum.y,
            first.momentum.z,
        ];
        for (offset, value) in values.into_iter().enumerate() {
            let written = sink.set_column(slot.first_column + offset, value);
            self.check(written);
        }
    }

    fn skip(&mut self, err: KinematicsError, histogram: &str, summary: &mut EventSummary) {
        match err {
            KinematicsError::DegenerateMomentum => self.stats.degenerate_momenta += 1,
            KinematicsError::IndeterminateSign => self.stats.indeterminate_signs += 1,
        }
        summary.skipped_fills += 1;
        debug!(event_id = summary.event_id, histogram, "fill skipped: {}", err);
    }

    fn check(&mut self, result: Result<(), AnalysisError>) {
        if let Err(err) = result {
            self.stats.sink_errors += 1;
            warn!("analysis sink rejected a fill: {}", err);
        }
    }
}

/// 診断出力の1行
pub fn diagnostic_line(chamber_number: usize, hits: usize) -> String {
    format!("Drift Chamber {} has {} hits.", chamber_number, hits)
}

/// 診断出力の行（コレクションが取得できなかった検出器は出力しない）
pub fn diagnostic_lines(upstream: Option<usize>, downstream: Option<usize>) -> Vec<String> {
    [(DCIN.number, upstream), (DCOUT.number, downstream)]
        .into_iter()
        .filter_map(|(number, hits)| hits.map(|hits| diagnostic_line(number, hits)))
        .collect()
}

impl IEventAction for EventAction {
    fn on_event_start(&mut self, event_id: u64) {
        trace!(event_id, "begin of event");
    }

    fn on_event_end(
        &mut self,
        event_id: u64,
        dcin: &dyn IHitSource,
        dcout: &dyn IHitSource,
        sink: &mut dyn IMetricSink,
    ) {
        self.end_of_event(event_id, dcin, dcout, sink);
    }
}
