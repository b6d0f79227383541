//! 陽子散乱角シミュレーションと解析
//!
//! 2枚のドリフトチェンバー（dcin, dcout）で陽子の飛跡を記録し、
//! イベントごとに散乱角のヒストグラムとイベントツリーを作ります。

pub mod analysis;
pub mod event_action;
pub mod histogram;
pub mod kinematics;
pub mod logging;
pub mod models;
pub mod run_action;
pub mod scenario;
pub mod simulation;
pub mod throttle;
