//! エラー型の定義

use thiserror::Error;

/// アプリケーションのエラー型
#[derive(Error, Debug)]
pub enum Error {
    /// リクエストのルーティングエラー
    #[error("Route not found: {0}")]
    RouteNotFound(String),

    /// 未対応のHTTPメソッド
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    /// 無効なリクエストボディ
    #[error("Invalid request body: {0}")]
    InvalidRequestBody(String),

    /// リクエストボディのサイズ超過
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// レスポンスのシリアライズエラー
    #[error("Failed to serialize response: {0}")]
    ResponseSerializationError(String),

    /// end()済みのレスポンスへの書き込み
    #[error("Response already ended: {0}")]
    ResponseEnded(String),

    /// ミドルウェアエラー
    #[error("Middleware error: {0}")]
    MiddlewareError(String),

    /// 内部サーバーエラー
    #[error("Internal server error: {0}")]
    InternalServerError(String),

    /// 設定エラー
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// 認証エラー
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// 認可エラー
    #[error("Authorization error: {0}")]
    AuthorizationError(String),

    /// 無効なヘッダー
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// 無効なクッキー
    #[error("Invalid cookie: {0}")]
    InvalidCookie(String),

    /// 無効なルートパターン
    #[error("Invalid route pattern: {0}")]
    InvalidRoutePattern(String),
}

impl Error {
    /// エラーからHTTPステータスコードを取得
    pub fn status_code(&self) -> u16 {
        match self {
            Error::RouteNotFound(_) => 404,
            Error::MethodNotAllowed(_) => 405,
            Error::InvalidRequestBody(_) => 400,
            Error::PayloadTooLarge(_) => 413,
            Error::ResponseSerializationError(_) => 500,
            Error::ResponseEnded(_) => 500,
            Error::MiddlewareError(_) => 500,
            Error::InternalServerError(_) => 500,
            Error::ConfigurationError(_) => 500,
            Error::AuthenticationError(_) => 401,
            Error::AuthorizationError(_) => 403,
            Error::InvalidHeader(_) => 400,
            Error::InvalidCookie(_) => 400,
            Error::InvalidRoutePattern(_) => 500,
        }
    }

    /// クライアントに返す定型メッセージ
    pub fn public_message(&self) -> &'static str {
        match self.status_code() {
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            413 => "Payload Too Large",
            _ => "Internal Server Error",
        }
    }
}
