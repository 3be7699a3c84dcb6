//! リクエスト統計（ディスパッチ間で共有される唯一の可変状態）

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use serde::Serialize;

use crate::common::is_success;

/// 統計のスナップショット
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub total_requests: u64,
    pub success_requests: u64,
    pub error_requests: u64,
    pub status_codes: BTreeMap<u16, u64>,
    pub methods: BTreeMap<String, u64>,
    /// マッチしたルートパターンごとの件数
    pub paths: BTreeMap<String, u64>,
    /// 平均応答時間（ミリ秒）
    pub average_response_time: f64,
}

/// リクエスト統計
///
/// 1つのMutexで記録全体を保護し、更新とスナップショットの間だけ保持する。
#[derive(Debug, Default)]
pub struct RequestStats {
    inner: Mutex<StatsSnapshot>,
}

impl RequestStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StatsSnapshot> {
        // ポイズン時もそのまま記録を続ける
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 完了したリクエストを1件記録する
    ///
    /// 400未満は成功、それ以外はエラーとして数える。
    pub fn record(&self, method: &str, path: &str, status: u16, elapsed: Duration) {
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        let mut stats = self.lock();

        stats.total_requests += 1;
        if is_success(status) {
            stats.success_requests += 1;
        } else {
            stats.error_requests += 1;
        }
        *stats.status_codes.entry(status).or_insert(0) += 1;
        *stats.methods.entry(method.to_string()).or_insert(0) += 1;
        *stats.paths.entry(path.to_string()).or_insert(0) += 1;

        // 逐次平均
        let n = stats.total_requests as f64;
        stats.average_response_time += (elapsed_ms - stats.average_response_time) / n;
    }

    /// 一貫したスナップショットを取得
    pub fn snapshot(&self) -> StatsSnapshot {
        self.lock().clone()
    }

    /// 全カウンタを初期化
    pub fn reset(&self) {
        *self.lock() = StatsSnapshot::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_record_counts() {
        let stats = RequestStats::new();
        stats.record("GET", "/a", 200, Duration::from_millis(10));
        stats.record("GET", "/a", 404, Duration::from_millis(30));
        stats.record("POST", "/b", 500, Duration::from_millis(20));

        let snap = stats.snapshot();
        assert_eq!(snap.total_requests, 3);
        assert_eq!(snap.success_requests, 1);
        assert_eq!(snap.error_requests, 2);
        assert_eq!(snap.status_codes.get(&404), Some(&1));
        assert_eq!(snap.methods.get("GET"), Some(&2));
        assert_eq!(snap.paths.get("/b"), Some(&1));
        assert!((snap.average_response_time - 20.0).abs() < 1e-6);
    }

    #[test]
    fn test_redirect_counts_as_success() {
        let stats = RequestStats::new();
        stats.record("GET", "/old", 302, Duration::ZERO);
        assert_eq!(stats.snapshot().success_requests, 1);
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let stats = RequestStats::new();
        stats.record("GET", "/", 200, Duration::ZERO);
        let value = serde_json::to_value(stats.snapshot()).unwrap();
        assert_eq!(value["totalRequests"], 1);
        assert_eq!(value["successRequests"], 1);
        assert_eq!(value["errorRequests"], 0);
        assert_eq!(value["statusCodes"]["200"], 1);
        assert!(value.get("averageResponseTime").is_some());
    }

    #[test]
    fn test_reset() {
        let stats = RequestStats::new();
        stats.record("GET", "/", 200, Duration::ZERO);
        stats.reset();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn test_concurrent_records_are_not_lost() {
        let stats = Arc::new(RequestStats::new());
        let threads: Vec<_> = (0..8)
            .map(|t| {
                let stats = Arc::clone(&stats);
                std::thread::spawn(move || {
                    for i in 0..250 {
                        let status = if (t + i) % 3 == 0 { 500 } else { 200 };
                        stats.record("GET", "/load", status, Duration::from_micros(50));
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        let snap = stats.snapshot();
        assert_eq!(snap.total_requests, 2000);
        assert_eq!(snap.total_requests, snap.success_requests + snap.error_requests);
        assert_eq!(snap.paths.get("/load"), Some(&2000));
    }
}
