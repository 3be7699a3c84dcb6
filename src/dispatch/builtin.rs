//! 組み込みエンドポイント（ヘルスチェック・メトリクス）

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::json;

use crate::common::response::timestamp_now;
use crate::common::{Handler, Method, Request, Response};
use crate::error::Error;
use crate::handler::RoutePattern;
use super::stats::RequestStats;

pub const DEFAULT_HEALTH_PATH: &str = "/health";
pub const DEFAULT_METRICS_PATH: &str = "/metrics";

/// `GET /health`: `{status, uptime, timestamp, activeConnections}`
pub struct HealthHandler {
    pattern: RoutePattern,
    started_at: Instant,
    active_connections: Arc<AtomicUsize>,
}

impl HealthHandler {
    pub fn try_new(path: &str, started_at: Instant, active_connections: Arc<AtomicUsize>) -> Result<Self, Error> {
        Ok(Self {
            pattern: RoutePattern::parse(path)?,
            started_at,
            active_connections,
        })
    }
}

#[async_trait]
impl Handler for HealthHandler {
    fn matches(&self, method: Method, path: &str) -> Option<HashMap<String, String>> {
        if method != Method::GET {
            return None;
        }
        self.pattern.match_path(path)
    }

    fn path_pattern(&self) -> &str {
        self.pattern.as_str()
    }

    async fn handle(&self, _req: &Request, res: &mut Response) -> Result<(), Error> {
        res.no_cache().json(&json!({
            "status": "healthy",
            "uptime": self.started_at.elapsed().as_secs_f64(),
            "timestamp": timestamp_now(),
            "activeConnections": self.active_connections.load(Ordering::SeqCst),
        }))?;
        Ok(())
    }
}

/// `GET /metrics`: 統計スナップショット全体
pub struct MetricsHandler {
    pattern: RoutePattern,
    stats: Arc<RequestStats>,
}

impl MetricsHandler {
    pub fn try_new(path: &str, stats: Arc<RequestStats>) -> Result<Self, Error> {
        Ok(Self {
            pattern: RoutePattern::parse(path)?,
            stats,
        })
    }
}

#[async_trait]
impl Handler for MetricsHandler {
    fn matches(&self, method: Method, path: &str) -> Option<HashMap<String, String>> {
        if method != Method::GET {
            return None;
        }
        self.pattern.match_path(path)
    }

    fn path_pattern(&self) -> &str {
        self.pattern.as_str()
    }

    async fn handle(&self, _req: &Request, res: &mut Response) -> Result<(), Error> {
        res.no_cache().json(&self.stats.snapshot())?;
        Ok(())
    }
}
