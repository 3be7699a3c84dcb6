use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::FutureExt;
use log::{debug, error, info, warn};
use serde_json::Value;

use crate::common::{Method, RawRequest, Request, Response, WireResponse};
use crate::error::Error;
use crate::RouteBridge;

/// 処理中リクエスト数のカウンタ（スコープを抜けると減算）
struct ConnectionGuard<'a>(&'a AtomicUsize);

impl<'a> ConnectionGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for ConnectionGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// 統計でルート外のリクエストをまとめるキー
const UNMATCHED_ROUTE: &str = "<unmatched>";
/// 統計で未知のメソッドをまとめるキー
const UNKNOWN_METHOD: &str = "OTHER";

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl RouteBridge {
    /// 生リクエストを1件処理して送信用レスポンスを返す
    ///
    /// どの失敗経路でも整形済みのレスポンスを返し、統計は必ず1回だけ記録する。
    pub async fn dispatch(&self, raw: RawRequest) -> WireResponse {
        let _guard = ConnectionGuard::enter(&self.active_connections);
        let started = std::time::Instant::now();
        let method_label = raw
            .method
            .parse::<Method>()
            .map(|m| m.as_str())
            .unwrap_or(UNKNOWN_METHOD);
        let request_line = format!("{} {}", raw.method, raw.path);

        let mut res = Response::new();
        // 統計はマッチしたルートパターン単位で数える
        let mut route_label = None;
        match Request::from_raw(raw, &self.config) {
            Ok(mut req) => {
                self.apply_common_headers(&req, &mut res);
                route_label = self.process(&mut req, &mut res).await;
            }
            Err(e) => {
                warn!("Rejected request {}: {}", request_line, e);
                self.apply_powered_by(&mut res);
                self.write_error(&mut res, &e);
            }
        }

        if self.config.security_headers {
            res.security_headers();
        }

        let elapsed = started.elapsed();
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        res.set_header("X-Response-Time", format!("{:.3}ms", elapsed_ms));
        res.server_timing("total", elapsed_ms, None);

        let path_label = route_label.as_deref().unwrap_or(UNMATCHED_ROUTE);
        self.stats.record(method_label, path_label, res.status_code(), elapsed);
        info!("{} {} {:.3}ms", request_line, res.status_code(), elapsed_ms);

        res.into_wire()
    }

    /// フック・ルーティング・ハンドラ実行
    ///
    /// ハンドラにマッチした場合はそのルートパターンを返す。
    async fn process(&self, req: &mut Request, res: &mut Response) -> Option<String> {
        // CORSプリフライトはここで終了
        if self.config.cors.is_some() && req.method == Method::OPTIONS {
            debug!("CORS preflight for {}", req.path);
            res.status(204);
            if let Err(e) = res.end(None) {
                warn!("Failed to end preflight response: {}", e);
            }
            return None;
        }

        for middleware in &self.middlewares {
            if let Err(e) = middleware.before(req, res).await {
                error!("Middleware error: {}", e);
                self.reset_with_error(req, res, &e);
                return None;
            }
            if res.is_ended() {
                debug!("Middleware ended the response; skipping routing for {}", req.path);
                break;
            }
        }

        let matched = if res.is_ended() { None } else { self.route(req, res).await };

        for middleware in &self.middlewares {
            if let Err(e) = middleware.after(req, res).await {
                error!("Middleware error in post-processing: {}", e);
                self.reset_with_error(req, res, &e);
                return matched;
            }
        }
        matched
    }

    /// 登録順に照合し、最初にマッチしたハンドラを実行
    async fn route(&self, req: &mut Request, res: &mut Response) -> Option<String> {
        let (handler, params) = match self.find_handler(req.method, &req.path) {
            Some(found) => found,
            None => {
                debug!("Route not found: {} {}", req.method, req.path);
                let e = Error::RouteNotFound(format!("{} {}", req.method, req.path));
                self.write_error(res, &e);
                return None;
            }
        };

        let pattern = handler.path_pattern().to_string();
        req.set_params(params);
        let req: &Request = req;
        let outcome = AssertUnwindSafe(handler.handle(req, res)).catch_unwind().await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!("Handler error for {} {}: {}", req.method, req.path, e);
                self.reset_with_error(req, res, &e);
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!("Handler panicked for {} {}: {}", req.method, req.path, message);
                self.reset_with_error(req, res, &Error::InternalServerError(message));
            }
        }
        Some(pattern)
    }

    fn apply_powered_by(&self, res: &mut Response) {
        if let Some(powered_by) = &self.config.powered_by {
            res.set_header("X-Powered-By", powered_by.as_str());
        }
    }

    /// 全レスポンスに付与するヘッダー
    fn apply_common_headers(&self, req: &Request, res: &mut Response) {
        self.apply_powered_by(res);
        res.set_header("X-Request-ID", req.request_id.as_str());
        if let Some(cors) = &self.config.cors {
            res.cors(cors);
        }
    }

    /// 途中まで組み立てたレスポンスを破棄してエラー応答に置き換える
    fn reset_with_error(&self, req: &Request, res: &mut Response, e: &Error) {
        *res = Response::new();
        self.apply_common_headers(req, res);
        self.write_error(res, e);
    }

    /// エラー応答を書き込む
    ///
    /// 4xxは常に、5xxは `expose_error_details` 有効時のみ `details` にエラー内容を含める。
    fn write_error(&self, res: &mut Response, e: &Error) {
        let status = e.status_code();
        let details = if status < 500 || self.config.expose_error_details {
            Some(Value::String(e.to_string()))
        } else {
            None
        };
        if let Err(write_err) = res.error(status, e.public_message(), details) {
            error!("Failed to write error response: {}", write_err);
        }
    }
}
