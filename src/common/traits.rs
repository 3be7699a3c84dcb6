//! コアトレイト定義（Handler、Middleware）

use std::collections::HashMap;
use async_trait::async_trait;
use crate::error::Error;
use super::http::Method;
use super::request::Request;
use super::response::Response;

/// ハンドラーの特性
#[async_trait]
pub trait Handler: Send + Sync {
    /// メソッドとパスがこのハンドラにマッチすればルートパラメータを返す
    fn matches(&self, method: Method, path: &str) -> Option<HashMap<String, String>>;

    /// ハンドラに関連付けられたパスパターン文字列を取得
    fn path_pattern(&self) -> &str;

    /// リクエストを処理（レスポンスは引数に書き込む）
    async fn handle(&self, req: &Request, res: &mut Response) -> Result<(), Error>;
}

/// ミドルウェアの特性
///
/// `before` はルーティング前に登録順で実行される。
/// `res.end()` した場合はルーティングとハンドラをスキップする。
#[async_trait]
pub trait Middleware: Send + Sync {
    /// ルーティング前の処理
    async fn before(&self, _req: &mut Request, _res: &mut Response) -> Result<(), Error> {
        Ok(())
    }

    /// ハンドラ実行後の処理
    async fn after(&self, _req: &Request, _res: &mut Response) -> Result<(), Error> {
        Ok(())
    }
}
