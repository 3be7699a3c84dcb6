//! RouteBridge: 任意のHTTPトランスポートの上で動く宣言的ルーティングライブラリ
//!
//! 生のリクエストを正規化した `Request` に変換し、登録順にルートを照合して
//! ハンドラが組み立てた `Response` をトランスポート向けの形式に戻す。

pub mod common;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handler;

#[cfg(feature = "server")]
pub mod server;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::debug;

pub use common::{
    Cookie, CookieOptions, CorsOptions, Handler, Headers, Method, Middleware, RawRequest,
    Request, Response, SameSite, SseEvent, WireResponse,
};
pub use config::AppConfig;
pub use dispatch::{RequestStats, StatsSnapshot};
pub use error::Error;
pub use handler::{HandlerFuture, MethodFilter, RoutePattern};

use dispatch::builtin::{HealthHandler, MetricsHandler, DEFAULT_HEALTH_PATH, DEFAULT_METRICS_PATH};
use handler::{AsyncRouteHandler, RouteHandler};

/// リクエストを処理するアプリケーションを構築するためのビルダー
pub struct RouteBridgeBuilder {
    handlers: Vec<Box<dyn Handler>>,
    middlewares: Vec<Box<dyn Middleware>>,
    config: AppConfig,
    stats: Arc<RequestStats>,
    health_path: Option<String>,
    metrics_path: Option<String>,
    /// 最初に発生した登録エラー（build時に返す）
    pending_error: Option<Error>,
}

impl Default for RouteBridgeBuilder {
    fn default() -> Self {
        Self {
            handlers: Vec::new(),
            middlewares: Vec::new(),
            config: AppConfig::from_env(),
            stats: Arc::new(RequestStats::new()),
            health_path: None,
            metrics_path: None,
            pending_error: None,
        }
    }
}

impl RouteBridgeBuilder {
    /// 新しいRouteBridgeBuilderインスタンスを作成（設定は環境変数から）
    pub fn new() -> Self {
        Self::default()
    }

    /// ハンドラを追加（登録順に照合される）
    pub fn handler<H>(mut self, handler: H) -> Self
    where
        H: Handler + 'static,
    {
        debug!("Route #{} registered: {}", self.handlers.len(), handler.path_pattern());
        self.handlers.push(Box::new(handler));
        self
    }

    /// 生成に失敗しうるハンドラを追加（エラーはbuild時に返す）
    pub fn try_handler<H>(self, handler: Result<H, Error>) -> Self
    where
        H: Handler + 'static,
    {
        match handler {
            Ok(h) => self.handler(h),
            Err(e) => self.fail(e),
        }
    }

    fn fail(mut self, error: Error) -> Self {
        log::error!("Route registration failed: {}", error);
        if self.pending_error.is_none() {
            self.pending_error = Some(error);
        }
        self
    }

    /// 同期ハンドラ関数でルートを登録
    pub fn route<F>(self, method: impl Into<MethodFilter>, path: &str, handler_fn: F) -> Self
    where
        F: Fn(&Request, &mut Response) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.try_handler(RouteHandler::try_new(method, path, handler_fn))
    }

    /// 非同期ハンドラ関数でルートを登録
    pub fn async_route<F>(self, method: impl Into<MethodFilter>, path: &str, handler_fn: F) -> Self
    where
        F: for<'a> Fn(&'a Request, &'a mut Response) -> HandlerFuture<'a> + Send + Sync + 'static,
    {
        self.try_handler(AsyncRouteHandler::try_new(method, path, handler_fn))
    }

    pub fn get<F>(self, path: &str, handler_fn: F) -> Self
    where
        F: Fn(&Request, &mut Response) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.route(Method::GET, path, handler_fn)
    }

    pub fn post<F>(self, path: &str, handler_fn: F) -> Self
    where
        F: Fn(&Request, &mut Response) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.route(Method::POST, path, handler_fn)
    }

    pub fn put<F>(self, path: &str, handler_fn: F) -> Self
    where
        F: Fn(&Request, &mut Response) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.route(Method::PUT, path, handler_fn)
    }

    pub fn patch<F>(self, path: &str, handler_fn: F) -> Self
    where
        F: Fn(&Request, &mut Response) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.route(Method::PATCH, path, handler_fn)
    }

    pub fn delete<F>(self, path: &str, handler_fn: F) -> Self
    where
        F: Fn(&Request, &mut Response) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.route(Method::DELETE, path, handler_fn)
    }

    pub fn options<F>(self, path: &str, handler_fn: F) -> Self
    where
        F: Fn(&Request, &mut Response) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.route(Method::OPTIONS, path, handler_fn)
    }

    /// HEAD以外の全メソッドで受け付けるルートを登録
    pub fn all<F>(self, path: &str, handler_fn: F) -> Self
    where
        F: Fn(&Request, &mut Response) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.route(MethodFilter::All, path, handler_fn)
    }

    /// ミドルウェアを追加
    pub fn middleware<M>(mut self, middleware: M) -> Self
    where
        M: Middleware + 'static,
    {
        self.middlewares.push(Box::new(middleware));
        self
    }

    /// 設定を差し替える
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    /// 統計の記録先を共有する
    pub fn stats(mut self, stats: Arc<RequestStats>) -> Self {
        self.stats = stats;
        self
    }

    /// `GET /health` を有効化
    pub fn health_endpoint(mut self) -> Self {
        self.health_path = Some(DEFAULT_HEALTH_PATH.to_string());
        self
    }

    /// `GET /metrics` を有効化
    pub fn metrics_endpoint(mut self) -> Self {
        self.metrics_path = Some(DEFAULT_METRICS_PATH.to_string());
        self
    }

    /// アプリケーションをビルドして返却
    ///
    /// 組み込みエンドポイントはユーザー定義ルートの後ろに登録される。
    pub fn build(self) -> Result<RouteBridge, Error> {
        if let Some(error) = self.pending_error {
            return Err(error);
        }

        let started_at = Instant::now();
        let active_connections = Arc::new(AtomicUsize::new(0));
        let mut handlers = self.handlers;

        if let Some(path) = &self.health_path {
            handlers.push(Box::new(HealthHandler::try_new(path, started_at, Arc::clone(&active_connections))?));
        }
        if let Some(path) = &self.metrics_path {
            handlers.push(Box::new(MetricsHandler::try_new(path, Arc::clone(&self.stats))?));
        }

        Ok(RouteBridge {
            handlers,
            middlewares: self.middlewares,
            config: self.config,
            stats: self.stats,
            active_connections,
            started_at,
        })
    }
}

/// リクエストを処理するアプリケーション
///
/// 構築後のルート表は読み取り専用で、複数タスクから同時に `dispatch` できる。
pub struct RouteBridge {
    pub(crate) handlers: Vec<Box<dyn Handler>>,
    pub(crate) middlewares: Vec<Box<dyn Middleware>>,
    pub(crate) config: AppConfig,
    pub(crate) stats: Arc<RequestStats>,
    pub(crate) active_connections: Arc<AtomicUsize>,
    started_at: Instant,
}

impl RouteBridge {
    /// 新しいRouteBridgeBuilderインスタンスを作成
    pub fn builder() -> RouteBridgeBuilder {
        RouteBridgeBuilder::new()
    }

    /// メソッドとパスに最初にマッチするハンドラとルートパラメータを取得
    pub fn find_handler(
        &self,
        method: Method,
        path: &str,
    ) -> Option<(&dyn Handler, std::collections::HashMap<String, String>)> {
        self.handlers
            .iter()
            .find_map(|handler| handler.matches(method, path).map(|params| (handler.as_ref(), params)))
    }

    /// ミドルウェアのリストを取得
    pub fn middlewares(&self) -> &[Box<dyn Middleware>] {
        &self.middlewares
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// 統計の共有ハンドル
    pub fn stats(&self) -> Arc<RequestStats> {
        Arc::clone(&self.stats)
    }

    /// 処理中のリクエスト数
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::SeqCst)
    }

    /// 起動からの経過時間
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}
