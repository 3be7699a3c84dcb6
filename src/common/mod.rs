//! 共通モジュール（リクエスト/レスポンスの正規化）

pub mod utils;
pub mod headers;
pub mod cookie;
pub mod mime;
pub mod body;
pub mod http;
pub mod wire;
pub mod request;
pub mod response;
pub mod traits;

pub use utils::{percent_decode, percent_decode_path, percent_encode, parse_query_string, build_query_string, normalize_path};
pub use headers::Headers;
pub use cookie::{Cookie, CookieOptions, SameSite, parse_cookies};
pub use mime::mime_from_path;
pub use http::{Method, status_text, is_success};
pub use wire::{RawRequest, WireResponse};
pub use request::Request;
pub use response::{CorsOptions, Response, SseEvent};
pub use traits::{Handler, Middleware};
