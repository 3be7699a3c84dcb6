//! ハンドラーの実装（分割モジュール）

pub mod pattern;
pub mod core;
pub mod builders;

pub use pattern::RoutePattern;
pub use self::core::{AsyncRouteHandler, HandlerFuture, MethodFilter, RouteHandler};
pub use builders::{
    get, async_get,
    post, async_post,
    put, async_put,
    patch, async_patch,
    delete, async_delete,
    options, async_options,
    head,
    all, async_all,
};
