use crate::common::{Method, Request, Response};
use crate::error::Error;

use super::core::{AsyncRouteHandler, HandlerFuture, MethodFilter, RouteHandler};

// 同期ハンドラーのビルダーを生成する
macro_rules! sync_builder {
    ($(#[$doc:meta])* $name:ident, $filter:expr) => {
        $(#[$doc])*
        pub fn $name<F>(path: &str, handler: F) -> Result<RouteHandler<F>, Error>
        where
            F: Fn(&Request, &mut Response) -> Result<(), Error> + Send + Sync + 'static,
        {
            RouteHandler::try_new($filter, path, handler)
        }
    };
}

// 非同期ハンドラーのビルダーを生成する
macro_rules! async_builder {
    ($(#[$doc:meta])* $name:ident, $filter:expr) => {
        $(#[$doc])*
        pub fn $name<F>(path: &str, handler: F) -> Result<AsyncRouteHandler<F>, Error>
        where
            F: for<'a> Fn(&'a Request, &'a mut Response) -> HandlerFuture<'a> + Send + Sync + 'static,
        {
            AsyncRouteHandler::try_new($filter, path, handler)
        }
    };
}

sync_builder!(
    /// GETハンドラーを作成
    get, Method::GET
);
sync_builder!(
    /// POSTハンドラーを作成
    post, Method::POST
);
sync_builder!(
    /// PUTハンドラーを作成
    put, Method::PUT
);
sync_builder!(
    /// PATCHハンドラーを作成
    patch, Method::PATCH
);
sync_builder!(
    /// DELETEハンドラーを作成
    delete, Method::DELETE
);
sync_builder!(
    /// OPTIONSハンドラーを作成
    options, Method::OPTIONS
);
sync_builder!(
    /// HEADハンドラーを作成
    head, Method::HEAD
);
sync_builder!(
    /// HEAD以外の全メソッドを受け付けるハンドラーを作成
    all, MethodFilter::All
);

async_builder!(
    /// 非同期GETハンドラーを作成
    async_get, Method::GET
);
async_builder!(
    /// 非同期POSTハンドラーを作成
    async_post, Method::POST
);
async_builder!(
    /// 非同期PUTハンドラーを作成
    async_put, Method::PUT
);
async_builder!(
    /// 非同期PATCHハンドラーを作成
    async_patch, Method::PATCH
);
async_builder!(
    /// 非同期DELETEハンドラーを作成
    async_delete, Method::DELETE
);
async_builder!(
    /// 非同期OPTIONSハンドラーを作成
    async_options, Method::OPTIONS
);
async_builder!(
    /// HEAD以外の全メソッドを受け付ける非同期ハンドラーを作成
    async_all, MethodFilter::All
);
