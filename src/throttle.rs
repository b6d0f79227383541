//! 進行状況表示の間引き
//!
//! イベント番号が 10, 100, 1000, ... を超えるたびに表示間隔を
//! その閾値まで広げます。間隔は単調非減少で、新しいランが始まるまで
//! リセットされません。

/// `n` 以下で最大の10のべき乗（`n == 0` のときは1）
pub fn decade_floor(n: u64) -> u64 {
    let mut decade = 1u64;
    while let Some(next) = decade.checked_mul(10) {
        if next > n {
            break;
        }
        decade = next;
    }
    decade
}

/// `n` が 1..9, 10, 20, ..., 90, 100, 200, ... のいずれかかどうか
pub fn is_decade_milestone(n: u64) -> bool {
    n > 0 && n % decade_floor(n) == 0
}

/// 診断出力の間引き状態
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintThrottle {
    print_interval: u64,
}

impl Default for PrintThrottle {
    fn default() -> Self {
        Self::new()
    }
}

impl PrintThrottle {
    pub fn new() -> Self {
        Self { print_interval: 1 }
    }

    /// 現在の表示間隔
    pub fn interval(&self) -> u64 {
        self.print_interval
    }

    /// このイベントで診断出力を行うかどうか
    pub fn should_print(&self, event_id: u64) -> bool {
        event_id > 0 && event_id % self.print_interval == 0
    }

    /// イベント処理後に表示間隔を更新
    pub fn advance(&mut self, event_id: u64) {
        self.print_interval = self.print_interval.max(decade_floor(event_id));
    }

    /// ラン開始時のリセット
    pub fn reset(&mut self) {
        self.print_interval = 1;
    }
}
