//! ディスパッチパイプライン（生リクエスト → ハンドラ → 送信用レスポンス）

pub mod builtin;
pub mod pipeline;
pub mod stats;

pub use stats::{RequestStats, StatsSnapshot};
