use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use futures::future::BoxFuture;
use log::debug;
#[cfg(debug_assertions)]
use log::info;

use crate::common::{Handler, Method, Request, Response};
use crate::error::Error;

use super::pattern::RoutePattern;

/// 非同期ハンドラー関数が返すFuture
pub type HandlerFuture<'a> = BoxFuture<'a, Result<(), Error>>;

/// ルートが受け付けるメソッド
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodFilter {
    /// 単一メソッド
    Only(Method),
    /// `Method::ROUTABLE` のすべて（HEADは含まない）
    All,
}

impl MethodFilter {
    pub fn accepts(&self, method: Method) -> bool {
        match self {
            MethodFilter::Only(m) => *m == method,
            MethodFilter::All => Method::ROUTABLE.contains(&method),
        }
    }
}

impl fmt::Display for MethodFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodFilter::Only(m) => write!(f, "{}", m),
            MethodFilter::All => f.write_str("ALL"),
        }
    }
}

impl From<Method> for MethodFilter {
    fn from(method: Method) -> Self {
        MethodFilter::Only(method)
    }
}

fn log_registration(kind: &str, method: MethodFilter, pattern: &RoutePattern) {
    // 開発時はinfo、本番相当ではdebugに落とす
    #[cfg(debug_assertions)]
    info!("Registering {} for {} with pattern: {}", kind, method, pattern.as_str());
    #[cfg(not(debug_assertions))]
    debug!("Registering {} for {} with pattern: {}", kind, method, pattern.as_str());
}

fn match_route(
    filter: MethodFilter,
    pattern: &RoutePattern,
    method: Method,
    path: &str,
) -> Option<HashMap<String, String>> {
    if !filter.accepts(method) {
        return None;
    }
    let params = pattern.match_path(path);
    debug!(
        "Path matching: {} against pattern {}: {}",
        path,
        pattern.as_str(),
        params.is_some()
    );
    params
}

/// ルートハンドラー（同期関数）
pub struct RouteHandler<F>
where
    F: Fn(&Request, &mut Response) -> Result<(), Error> + Send + Sync + 'static,
{
    /// 受け付けるメソッド
    pub method: MethodFilter,
    /// ルートパターン
    pub pattern: RoutePattern,
    /// ハンドラー関数
    pub handler_fn: F,
}

impl<F> RouteHandler<F>
where
    F: Fn(&Request, &mut Response) -> Result<(), Error> + Send + Sync + 'static,
{
    /// 新しいRouteHandlerを作成（パターンが不正ならエラー）
    pub fn try_new(
        method: impl Into<MethodFilter>,
        path_pattern: &str,
        handler_fn: F,
    ) -> Result<Self, Error> {
        let method = method.into();
        let pattern = RoutePattern::parse(path_pattern)?;
        log_registration("handler", method, &pattern);
        Ok(Self { method, pattern, handler_fn })
    }
}

/// 非同期ルートハンドラー
pub struct AsyncRouteHandler<F>
where
    F: for<'a> Fn(&'a Request, &'a mut Response) -> HandlerFuture<'a> + Send + Sync + 'static,
{
    /// 受け付けるメソッド
    pub method: MethodFilter,
    /// ルートパターン
    pub pattern: RoutePattern,
    /// 非同期ハンドラー関数
    pub handler_fn: F,
}

impl<F> AsyncRouteHandler<F>
where
    F: for<'a> Fn(&'a Request, &'a mut Response) -> HandlerFuture<'a> + Send + Sync + 'static,
{
    /// 新しいAsyncRouteHandlerを作成（パターンが不正ならエラー）
    pub fn try_new(
        method: impl Into<MethodFilter>,
        path_pattern: &str,
        handler_fn: F,
    ) -> Result<Self, Error> {
        let method = method.into();
        let pattern = RoutePattern::parse(path_pattern)?;
        log_registration("async handler", method, &pattern);
        Ok(Self { method, pattern, handler_fn })
    }
}

#[async_trait]
impl<F> Handler for RouteHandler<F>
where
    F: Fn(&Request, &mut Response) -> Result<(), Error> + Send + Sync + 'static,
{
    fn matches(&self, method: Method, path: &str) -> Option<HashMap<String, String>> {
        match_route(self.method, &self.pattern, method, path)
    }

    fn path_pattern(&self) -> &str {
        self.pattern.as_str()
    }

    async fn handle(&self, req: &Request, res: &mut Response) -> Result<(), Error> {
        (self.handler_fn)(req, res)
    }
}

#[async_trait]
impl<F> Handler for AsyncRouteHandler<F>
where
    F: for<'a> Fn(&'a Request, &'a mut Response) -> HandlerFuture<'a> + Send + Sync + 'static,
{
    fn matches(&self, method: Method, path: &str) -> Option<HashMap<String, String>> {
        match_route(self.method, &self.pattern, method, path)
    }

    fn path_pattern(&self) -> &str {
        self.pattern.as_str()
    }

    async fn handle(&self, req: &Request, res: &mut Response) -> Result<(), Error> {
        (self.handler_fn)(req, res).await
    }
}
