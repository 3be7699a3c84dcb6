//! HTTP関連の基本型

use std::fmt;
use std::str::FromStr;

/// HTTPメソッド
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum Method {
    GET,
    POST,
    PUT,
    DELETE,
    PATCH,
    HEAD,
    OPTIONS,
}

impl Method {
    /// `ALL` ルートがカバーするメソッド
    pub const ROUTABLE: [Method; 6] = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::PATCH => "PATCH",
            Method::HEAD => "HEAD",
            Method::OPTIONS => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = crate::error::Error;

    /// 文字列からMethodに変換（大文字小文字は区別しない）
    fn from_str(method: &str) -> Result<Self, Self::Err> {
        match method.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::GET),
            "POST" => Ok(Method::POST),
            "PUT" => Ok(Method::PUT),
            "DELETE" => Ok(Method::DELETE),
            "PATCH" => Ok(Method::PATCH),
            "HEAD" => Ok(Method::HEAD),
            "OPTIONS" => Ok(Method::OPTIONS),
            other => Err(crate::error::Error::MethodNotAllowed(other.to_string())),
        }
    }
}

/// ステータスコードの理由句を取得（不明なコードは "Unknown"）
pub fn status_text(code: u16) -> &'static str {
    ::http::StatusCode::from_u16(code)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown")
}

/// 成功ステータスかどうか判定
pub fn is_success(code: u16) -> bool {
    (200..400).contains(&code)
}
