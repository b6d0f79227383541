//! # Histogram モジュール
//!
//! イベントごとの解析結果を蓄積するメモリ上のヒストグラムとntupleを提供します。
//!
//! [`AnalysisManager`] は名前でヒストグラムを管理し、[`IMetricSink`] を実装して
//! イベントアクションからの書き込みを受け付けます。ファイルへの永続化は
//! 行わず、ラン終了時に [`AnalysisManager::summary`] で内容を取り出します。

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::models::traits::IMetricSink;

/// ヒストグラム・ntuple操作のエラー
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalysisError {
    #[error("unknown histogram: {0}")]
    UnknownHistogram(String),
    #[error("histogram already booked: {0}")]
    DuplicateHistogram(String),
    #[error("unknown ntuple column id: {0}")]
    UnknownColumn(usize),
    #[error("unknown ntuple column: {0}")]
    UnknownColumnName(String),
    #[error("column {name} is integer, got non-integral value {value}")]
    ColumnTypeMismatch { name: String, value: f64 },
    #[error("invalid binning for {name}: {reason}")]
    InvalidBinning { name: String, reason: String },
    #[error("ntuple has not been booked")]
    NoNtuple,
}

/// 1軸のビン定義
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub bins: usize,
    pub min: f64,
    pub max: f64,
}

impl Axis {
    pub fn new(bins: usize, min: f64, max: f64) -> Self {
        Self { bins, min, max }
    }

    pub fn validate(&self, name: &str) -> Result<(), AnalysisError> {
        if self.bins == 0 {
            return Err(AnalysisError::InvalidBinning {
                name: name.to_string(),
                reason: "bins must be positive".to_string(),
            });
        }
        // NaN の端点も弾く
        if self.min.partial_cmp(&self.max) != Some(Ordering::Less) {
            return Err(AnalysisError::InvalidBinning {
                name: name.to_string(),
                reason: format!("min {} must be below max {}", self.min, self.max),
            });
        }
        Ok(())
    }

    pub fn bin_width(&self) -> f64 {
        (self.max - self.min) / self.bins as f64
    }

    /// 値が入るビン（範囲外は `Err(Underflow/Overflow)`）
    fn locate(&self, value: f64) -> Result<usize, OutOfRange> {
        if value < self.min {
            return Err(OutOfRange::Underflow);
        }
        if value >= self.max {
            return Err(OutOfRange::Overflow);
        }
        let index = ((value - self.min) / self.bin_width()) as usize;
        // 上端ぎりぎりの丸め対策
        Ok(index.min(self.bins - 1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum OutOfRange {
    Underflow,
    Overflow,
}

/// 1次元ヒストグラム
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram1D {
    pub name: String,
    pub title: String,
    pub axis: Axis,
    pub counts: Vec<u64>,
    pub underflow: u64,
    pub overflow: u64,
    /// 範囲外を含む詰め込み回数
    pub entries: u64,
    /// NaN のため捨てた回数
    pub nan_rejected: u64,
    #[serde(skip)]
    sum_in_range: f64,
}

impl Histogram1D {
    pub fn new(name: &str, title: &str, axis: Axis) -> Result<Self, AnalysisError> {
        axis.validate(name)?;
        Ok(Self {
            name: name.to_string(),
            title: title.to_string(),
            axis,
            counts: vec![0; axis.bins],
            underflow: 0,
            overflow: 0,
            entries: 0,
            nan_rejected: 0,
            sum_in_range: 0.0,
        })
    }

    pub fn fill(&mut self, value: f64) {
        if value.is_nan() {
            self.nan_rejected += 1;
            return;
        }
        self.entries += 1;
        match self.axis.locate(value) {
            Ok(bin) => {
                self.counts[bin] += 1;
                self.sum_in_range += value;
            }
            Err(OutOfRange::Underflow) => self.underflow += 1,
            Err(OutOfRange::Overflow) => self.overflow += 1,
        }
    }

    /// 範囲内の詰め込み回数
    pub fn in_range(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// 範囲内の値の平均
    pub fn mean(&self) -> Option<f64> {
        let n = self.in_range();
        if n == 0 { None } else { Some(self.sum_in_range / n as f64) }
    }

    /// 値を含むビンのカウント
    pub fn count_at(&self, value: f64) -> Option<u64> {
        self.axis.locate(value).ok().map(|bin| self.counts[bin])
    }
}

/// 2次元ヒストグラム
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram2D {
    pub name: String,
    pub title: String,
    pub x_axis: Axis,
    pub y_axis: Axis,
    /// 行優先（y が外側、x が内側）
    pub counts: Vec<u64>,
    pub out_of_range: u64,
    pub entries: u64,
    pub nan_rejected: u64,
}

impl Histogram2D {
    pub fn new(name: &str, title: &str, x_axis: Axis, y_axis: Axis) -> Result<Self, AnalysisError> {
        x_axis.validate(name)?;
        y_axis.validate(name)?;
        Ok(Self {
            name: name.to_string(),
            title: title.to_string(),
            x_axis,
            y_axis,
            counts: vec![0; x_axis.bins * y_axis.bins],
            out_of_range: 0,
            entries: 0,
            nan_rejected: 0,
        })
    }

    pub fn fill(&mut self, x: f64, y: f64) {
        if x.is_nan() || y.is_nan() {
            self.nan_rejected += 1;
            return;
        }
        self.entries += 1;
        match (self.x_axis.locate(x), self.y_axis.locate(y)) {
            (Ok(ix), Ok(iy)) => self.counts[iy * self.x_axis.bins + ix] += 1,
            _ => self.out_of_range += 1,
        }
    }

    pub fn in_range(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn count_at(&self, x: f64, y: f64) -> Option<u64> {
        match (self.x_axis.locate(x), self.y_axis.locate(y)) {
            (Ok(ix), Ok(iy)) => Some(self.counts[iy * self.x_axis.bins + ix]),
            _ => None,
        }
    }
}

/// ntupleカラムの型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    Int,
    Float,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

/// 1イベント1行のフラットなテーブル
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NTuple {
    pub name: String,
    pub title: String,
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<f64>>,
    #[serde(skip)]
    pending: Vec<f64>,
}

impl NTuple {
    pub fn new(name: &str, title: &str, columns: Vec<Column>) -> Self {
        let pending = vec![0.0; columns.len()];
        Self {
            name: name.to_string(),
            title: title.to_string(),
            columns,
            rows: Vec::new(),
            pending,
        }
    }

    pub fn column_id(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn set(&mut self, column_id: usize, value: f64) -> Result<(), AnalysisError> {
        let column = self.columns.get(column_id).ok_or(AnalysisError::UnknownColumn(column_id))?;
        if column.kind == ColumnKind::Int && value.fract() != 0.0 {
            return Err(AnalysisError::ColumnTypeMismatch {
                name: column.name.clone(),
                value,
            });
        }
        self.pending[column_id] = value;
        Ok(())
    }

    /// 現在の行を確定し、未設定カラムを既定値0に戻す
    pub fn commit(&mut self) {
        let row = std::mem::replace(&mut self.pending, vec![0.0; self.columns.len()]);
        self.rows.push(row);
    }

    /// 行を名前付きで取り出すための補助
    pub fn value(&self, row: usize, column: &str) -> Option<f64> {
        let id = self.column_id(column)?;
        self.rows.get(row).map(|r| r[id])
    }
}

/// ヒストグラムとntupleの管理
#[derive(Debug, Default)]
pub struct AnalysisManager {
    h1: BTreeMap<String, Histogram1D>,
    h2: BTreeMap<String, Histogram2D>,
    ntuple: Option<NTuple>,
}

impl AnalysisManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_h1(&mut self, name: &str, title: &str, axis: Axis) -> Result<(), AnalysisError> {
        if self.h1.contains_key(name) || self.h2.contains_key(name) {
            return Err(AnalysisError::DuplicateHistogram(name.to_string()));
        }
        self.h1.insert(name.to_string(), Histogram1D::new(name, title, axis)?);
        Ok(())
    }

    pub fn create_h2(
        &mut self,
        name: &str,
        title: &str,
        x_axis: Axis,
        y_axis: Axis,
    ) -> Result<(), AnalysisError> {
        if self.h1.contains_key(name) || self.h2.contains_key(name) {
            return Err(AnalysisError::DuplicateHistogram(name.to_string()));
        }
        self.h2.insert(name.to_string(), Histogram2D::new(name, title, x_axis, y_axis)?);
        Ok(())
    }

    pub fn create_ntuple(&mut self, ntuple: NTuple) {
        self.ntuple = Some(ntuple);
    }

    pub fn h1(&self, name: &str) -> Option<&Histogram1D> {
        self.h1.get(name)
    }

    pub fn h2(&self, name: &str) -> Option<&Histogram2D> {
        self.h2.get(name)
    }

    pub fn ntuple(&self) -> Option<&NTuple> {
        self.ntuple.as_ref()
    }

    pub fn h1_names(&self) -> impl Iterator<Item = &str> {
        self.h1.keys().map(String::as_str)
    }

    /// ラン終了時の内容のスナップショット
    pub fn summary(&self) -> AnalysisSummary {
        AnalysisSummary {
            h1: self.h1.values().cloned().collect(),
            h2: self.h2.values().cloned().collect(),
            ntuple_rows: self.ntuple.as_ref().map_or(0, |n| n.rows.len()),
        }
    }
}

impl IMetricSink for AnalysisManager {
    fn fill_h1(&mut self, name: &str, value: f64) -> Result<(), AnalysisError> {
        let histogram = self
            .h1
            .get_mut(name)
            .ok_or_else(|| AnalysisError::UnknownHistogram(name.to_string()))?;
        histogram.fill(value);
        Ok(())
    }

    fn fill_h2(&mut self, name: &str, x: f64, y: f64) -> Result<(), AnalysisError> {
        let histogram = self
            .h2
            .get_mut(name)
            .ok_or_else(|| AnalysisError::UnknownHistogram(name.to_string()))?;
        histogram.fill(x, y);
        Ok(())
    }

    fn set_column(&mut self, column_id: usize, value: f64) -> Result<(), AnalysisError> {
        self.ntuple.as_mut().ok_or(AnalysisError::NoNtuple)?.set(column_id, value)
    }

    fn commit_row(&mut self) -> Result<(), AnalysisError> {
        self.ntuple.as_mut().ok_or(AnalysisError::NoNtuple)?.commit();
        Ok(())
    }
}

/// 解析結果のまとめ（YAML出力用）
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisSummary {
    pub h1: Vec<Histogram1D>,
    pub h2: Vec<Histogram2D>,
    pub ntuple_rows: usize,
}
