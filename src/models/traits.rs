use crate::histogram::AnalysisError;
use crate::models::hit::{DriftChamberHit, HitCollectionError};

/// 1イベント分のヒット列を提供するインターフェース（検出器ごとに1つ）
pub trait IHitSource {
    /// 検出器名の取得
    fn name(&self) -> &str;

    /// 指定イベントのヒット列を取得
    ///
    /// ヒットは粒子が有感領域を横切った順に並び、先頭が代表ヒットになります。
    fn resolve(&self, event_id: u64) -> Result<&[DriftChamberHit], HitCollectionError>;
}

/// ヒストグラムとntupleの書き込み先
pub trait IMetricSink {
    /// 1次元ヒストグラムへの詰め込み
    fn fill_h1(&mut self, name: &str, value: f64) -> Result<(), AnalysisError>;

    /// 2次元ヒストグラムへの詰め込み
    fn fill_h2(&mut self, name: &str, x: f64, y: f64) -> Result<(), AnalysisError>;

    /// 現在の行のカラムに値を設定
    fn set_column(&mut self, column_id: usize, value: f64) -> Result<(), AnalysisError>;

    /// 現在の行を確定して次の行を開始
    fn commit_row(&mut self) -> Result<(), AnalysisError>;
}

/// ドライバーがイベントの開始・終了時に呼び出すフック
pub trait IEventAction {
    /// イベント開始時の処理
    fn on_event_start(&mut self, event_id: u64);

    /// イベント終了時の処理
    fn on_event_end(
        &mut self,
        event_id: u64,
        dcin: &dyn IHitSource,
        dcout: &dyn IHitSource,
        sink: &mut dyn IMetricSink,
    );
}
