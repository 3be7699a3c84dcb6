//! レスポンスの組み立て（ステータス・ヘッダー・ボディの蓄積）

use std::fs;
use std::path::Path;
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::error::Error;
use super::cookie::{Cookie, CookieOptions};
use super::headers::Headers;
use super::http::status_text;
use super::mime::mime_from_path;
use super::utils::validate_header;
use super::wire::WireResponse;

pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
pub const TEXT_HTML: &str = "text/html; charset=utf-8";
pub const APPLICATION_JSON: &str = "application/json; charset=utf-8";
pub const APPLICATION_XML: &str = "application/xml; charset=utf-8";
pub const APPLICATION_JAVASCRIPT: &str = "application/javascript; charset=utf-8";
pub const TEXT_CSV: &str = "text/csv; charset=utf-8";
pub const TEXT_EVENT_STREAM: &str = "text/event-stream";

/// sendFileで付与するキャッシュ期間（秒）
const FILE_CACHE_SECONDS: u64 = 3600;

/// CORSヘッダーの設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsOptions {
    pub origin: String,
    pub methods: String,
    pub headers: String,
    pub credentials: bool,
    /// プリフライト結果のキャッシュ期間（秒）
    pub max_age: u64,
}

impl Default for CorsOptions {
    fn default() -> Self {
        Self {
            origin: "*".to_string(),
            methods: "GET, POST, PUT, PATCH, DELETE, OPTIONS".to_string(),
            headers: "Content-Type, Authorization, X-Requested-With".to_string(),
            credentials: false,
            max_age: 86400,
        }
    }
}

impl CorsOptions {
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    pub fn with_credentials(mut self, credentials: bool) -> Self {
        self.credentials = credentials;
        self
    }
}

/// Server-Sent Eventsの1イベント
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub id: Option<String>,
    pub event: Option<String>,
    pub data: String,
    pub retry: Option<u64>,
}

impl SseEvent {
    pub fn new(data: impl Into<String>) -> Self {
        Self { data: data.into(), ..Default::default() }
    }

    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    fn encode(&self, out: &mut String) {
        if let Some(id) = &self.id {
            out.push_str(&format!("id: {}\n", id));
        }
        if let Some(event) = &self.event {
            out.push_str(&format!("event: {}\n", event));
        }
        if let Some(retry) = self.retry {
            out.push_str(&format!("retry: {}\n", retry));
        }
        for line in self.data.split('\n') {
            out.push_str(&format!("data: {}\n", line));
        }
        out.push('\n');
    }
}

/// 現在時刻（ISO-8601、ミリ秒精度、`Z` 付き）
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// HTTP日付形式（IMF-fixdate）
pub fn http_date(time: DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// HTTPレスポンス
///
/// ハンドラーに `&mut Response` として渡され、状態を蓄積する。
/// `end()` 後のボディ変更は `Error::ResponseEnded` を返して無視する。
/// ステータスとヘッダーは `end()` 後も変更できる。
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    headers: Headers,
    body: Vec<u8>,
    ended: bool,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    /// 新しいレスポンスを作成（200, text/plain）
    pub fn new() -> Self {
        let mut headers = Headers::new();
        headers.insert("Content-Type", TEXT_PLAIN);
        Self {
            status: 200,
            headers,
            body: Vec::new(),
            ended: false,
        }
    }

    // ------------------------------------------------------------------
    // 状態の参照
    // ------------------------------------------------------------------

    pub fn status_code(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// ヘッダー値を取得（大文字小文字は区別しない）
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Content-Typeヘッダーの値
    pub fn content_type(&self) -> &str {
        self.headers.get("Content-Type").unwrap_or("")
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// ボディをUTF-8文字列として取得
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    // ------------------------------------------------------------------
    // ステータス・ヘッダー
    // ------------------------------------------------------------------

    /// ステータスコードを設定
    pub fn status(&mut self, code: u16) -> &mut Self {
        self.status = code;
        self
    }

    /// ヘッダーを設定（不正な名前/値は無視）
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let name = name.into();
        let value = value.into();
        match validate_header(&name, &value) {
            Ok(()) => self.headers.insert(name, value),
            Err(e) => log::warn!("Response::set_header ignored: {}", e),
        }
        self
    }

    /// ヘッダーを別行として追加
    pub fn append_header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let name = name.into();
        let value = value.into();
        match validate_header(&name, &value) {
            Ok(()) => self.headers.append(name, value),
            Err(e) => log::warn!("Response::append_header ignored: {}", e),
        }
        self
    }

    pub fn remove_header(&mut self, name: &str) -> &mut Self {
        if name.eq_ignore_ascii_case("Content-Type") {
            log::warn!("Response::remove_header ignored for Content-Type");
        } else {
            self.headers.remove(name);
        }
        self
    }

    /// Content-Typeを設定
    pub fn set_content_type(&mut self, mime: impl Into<String>) -> &mut Self {
        self.set_header("Content-Type", mime)
    }

    /// Varyにフィールドを追加（重複は無視）
    pub fn vary(&mut self, field: &str) -> &mut Self {
        let current = self.headers.get("Vary").unwrap_or("").to_string();
        let exists = current.split(',').any(|f| f.trim().eq_ignore_ascii_case(field));
        if !exists {
            let value = if current.is_empty() { field.to_string() } else { format!("{}, {}", current, field) };
            self.set_header("Vary", value);
        }
        self
    }

    pub fn location(&mut self, url: &str) -> &mut Self {
        self.set_header("Location", url)
    }

    /// Linkヘッダーを設定（`<href>; rel="rel"` をカンマ区切り）
    pub fn links(&mut self, links: &[(&str, &str)]) -> &mut Self {
        let value = links
            .iter()
            .map(|(rel, href)| format!("<{}>; rel=\"{}\"", href, rel))
            .collect::<Vec<_>>()
            .join(", ");
        self.set_header("Link", value)
    }

    pub fn etag(&mut self, etag: &str) -> &mut Self {
        self.set_header("ETag", etag)
    }

    pub fn last_modified(&mut self, value: &str) -> &mut Self {
        self.set_header("Last-Modified", value)
    }

    /// Server-Timingにメトリクスを追加
    pub fn server_timing(&mut self, name: &str, duration_ms: f64, description: Option<&str>) -> &mut Self {
        let mut entry = format!("{};dur={:.3}", name, duration_ms);
        if let Some(desc) = description {
            entry.push_str(&format!(";desc=\"{}\"", desc));
        }
        self.append_header("Server-Timing", entry)
    }

    // ------------------------------------------------------------------
    // 定型ヘッダー
    // ------------------------------------------------------------------

    /// CORSヘッダーを付与
    pub fn cors(&mut self, options: &CorsOptions) -> &mut Self {
        self.set_header("Access-Control-Allow-Origin", options.origin.as_str());
        self.set_header("Access-Control-Allow-Methods", options.methods.as_str());
        self.set_header("Access-Control-Allow-Headers", options.headers.as_str());
        self.set_header("Access-Control-Max-Age", options.max_age.to_string());
        if options.credentials {
            self.set_header("Access-Control-Allow-Credentials", "true");
        }
        self
    }

    /// 標準的なセキュリティヘッダーを一括追加
    pub fn security_headers(&mut self) -> &mut Self {
        self.set_header("X-Content-Type-Options", "nosniff");
        self.set_header("X-Frame-Options", "DENY");
        self.set_header("X-XSS-Protection", "1; mode=block");
        self.set_header("Strict-Transport-Security", "max-age=31536000; includeSubDomains");
        self.set_header("Referrer-Policy", "strict-origin-when-cross-origin");
        self
    }

    /// 公開キャッシュを許可
    pub fn cache(&mut self, max_age_seconds: u64) -> &mut Self {
        self.set_header("Cache-Control", format!("public, max-age={}", max_age_seconds))
    }

    /// キャッシュを禁止
    pub fn no_cache(&mut self) -> &mut Self {
        self.set_header("Cache-Control", "no-store, no-cache, must-revalidate, proxy-revalidate");
        self.set_header("Pragma", "no-cache");
        self.set_header("Expires", "0")
    }

    /// レート制限の状態をヘッダーで通知
    pub fn rate_limit(&mut self, limit: u64, remaining: u64, reset: u64) -> &mut Self {
        self.set_header("X-RateLimit-Limit", limit.to_string());
        self.set_header("X-RateLimit-Remaining", remaining.to_string());
        self.set_header("X-RateLimit-Reset", reset.to_string())
    }

    /// ダウンロードとして扱わせる
    pub fn attachment(&mut self, filename: &str) -> &mut Self {
        let safe: String = filename.chars().filter(|c| *c != '"' && *c != '\\').collect();
        if safe.is_empty() {
            self.set_header("Content-Disposition", "attachment")
        } else {
            self.set_header("Content-Disposition", format!("attachment; filename=\"{}\"", safe))
        }
    }

    /// Set-Cookieを追加（1クッキー1行）
    pub fn cookie(&mut self, name: &str, value: &str, options: &CookieOptions) -> Result<&mut Self, Error> {
        let cookie = Cookie::try_new(name, value, options.clone())?;
        self.headers.append("Set-Cookie", cookie.to_header_value());
        Ok(self)
    }

    /// クッキーを削除（空値・過去日付・Max-Age=0）
    pub fn clear_cookie(&mut self, name: &str, options: &CookieOptions) -> Result<&mut Self, Error> {
        let cookie = Cookie::expired(name, options.clone())?;
        self.headers.append("Set-Cookie", cookie.to_header_value());
        Ok(self)
    }

    // ------------------------------------------------------------------
    // ボディ
    // ------------------------------------------------------------------

    fn ensure_writable(&self, operation: &str) -> Result<(), Error> {
        if self.ended {
            log::warn!("Response::{} called after end()", operation);
            return Err(Error::ResponseEnded(format!("{} after end()", operation)));
        }
        Ok(())
    }

    fn set_body(&mut self, operation: &str, body: Vec<u8>, mime: &str) -> Result<&mut Self, Error> {
        self.ensure_writable(operation)?;
        validate_header("Content-Type", mime)?;
        self.body = body;
        self.headers.insert("Content-Type", mime);
        Ok(self)
    }

    /// テキストを送信
    pub fn send(&mut self, text: impl Into<String>) -> Result<&mut Self, Error> {
        self.set_body("send", text.into().into_bytes(), TEXT_PLAIN)
    }

    /// バイト列を送信（Content-Typeは変更しない）
    pub fn send_bytes(&mut self, bytes: impl Into<Vec<u8>>) -> Result<&mut Self, Error> {
        self.ensure_writable("send_bytes")?;
        self.body = bytes.into();
        Ok(self)
    }

    pub fn text(&mut self, text: impl Into<String>) -> Result<&mut Self, Error> {
        self.set_body("text", text.into().into_bytes(), TEXT_PLAIN)
    }

    pub fn html(&mut self, html: impl Into<String>) -> Result<&mut Self, Error> {
        self.set_body("html", html.into().into_bytes(), TEXT_HTML)
    }

    pub fn xml(&mut self, xml: impl Into<String>) -> Result<&mut Self, Error> {
        self.set_body("xml", xml.into().into_bytes(), APPLICATION_XML)
    }

    /// JSONをボディとして設定
    pub fn json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<&mut Self, Error> {
        self.ensure_writable("json")?;
        let body = serde_json::to_vec(value)
            .map_err(|e| Error::ResponseSerializationError(e.to_string()))?;
        self.set_body("json", body, APPLICATION_JSON)
    }

    /// ステータスを設定してからJSONを送信
    pub fn json_with_status<T: Serialize + ?Sized>(&mut self, code: u16, value: &T) -> Result<&mut Self, Error> {
        self.ensure_writable("json_with_status")?;
        self.status(code);
        self.json(value)
    }

    /// JSONPとして送信（コールバック名は英数字と `_$.` のみ許可）
    pub fn jsonp<T: Serialize + ?Sized>(&mut self, callback: &str, value: &T) -> Result<&mut Self, Error> {
        self.ensure_writable("jsonp")?;
        let valid = !callback.is_empty()
            && callback.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.'));
        let callback = if valid { callback } else { "callback" };
        let payload = serde_json::to_string(value)
            .map_err(|e| Error::ResponseSerializationError(e.to_string()))?;
        self.set_header("X-Content-Type-Options", "nosniff");
        self.set_body("jsonp", format!("/**/ typeof {0} === 'function' && {0}({1});", callback, payload).into_bytes(), APPLICATION_JAVASCRIPT)
    }

    /// CSVとして送信（ファイル名指定時は添付扱い）
    pub fn csv(&mut self, rows: &[Vec<String>], filename: Option<&str>) -> Result<&mut Self, Error> {
        self.ensure_writable("csv")?;
        let mut out = String::new();
        for row in rows {
            let line = row.iter().map(|field| escape_csv_field(field)).collect::<Vec<_>>().join(",");
            out.push_str(&line);
            out.push_str("\r\n");
        }
        if let Some(name) = filename {
            self.attachment(name);
        }
        self.set_body("csv", out.into_bytes(), TEXT_CSV)
    }

    /// Server-Sent Eventsとして送信
    pub fn sse(&mut self, events: &[SseEvent]) -> Result<&mut Self, Error> {
        self.ensure_writable("sse")?;
        let mut out = String::new();
        for event in events {
            event.encode(&mut out);
        }
        self.set_header("Cache-Control", "no-cache");
        self.set_header("Connection", "keep-alive");
        self.set_body("sse", out.into_bytes(), TEXT_EVENT_STREAM)
    }

    /// ボディにチャンクを追記
    pub fn write(&mut self, chunk: impl AsRef<[u8]>) -> Result<&mut Self, Error> {
        self.ensure_writable("write")?;
        self.body.extend_from_slice(chunk.as_ref());
        Ok(self)
    }

    /// ステータスコードと理由句をテキストで送信（例: "404 Not Found"）
    pub fn send_status(&mut self, code: u16) -> Result<&mut Self, Error> {
        self.ensure_writable("send_status")?;
        self.status(code);
        self.set_body("send_status", format!("{} {}", code, status_text(code)).into_bytes(), TEXT_PLAIN)
    }

    /// リダイレクト（既定は302）
    pub fn redirect(&mut self, url: &str, code: Option<u16>) -> Result<&mut Self, Error> {
        self.ensure_writable("redirect")?;
        self.status(code.unwrap_or(302));
        self.location(url);
        self.set_body("redirect", format!("Redirecting to: {}", url).into_bytes(), TEXT_PLAIN)
    }

    // ------------------------------------------------------------------
    // 定型エンベロープ
    // ------------------------------------------------------------------

    /// エラー応答 `{error, status, message, details?, timestamp}`
    pub fn error(&mut self, code: u16, message: &str, details: Option<Value>) -> Result<&mut Self, Error> {
        self.ensure_writable("error")?;
        let mut envelope = Map::new();
        envelope.insert("error".into(), Value::Bool(true));
        envelope.insert("status".into(), json!(code));
        envelope.insert("message".into(), Value::String(message.to_string()));
        if let Some(details) = details {
            envelope.insert("details".into(), details);
        }
        envelope.insert("timestamp".into(), Value::String(timestamp_now()));
        self.json_with_status(code, &Value::Object(envelope))
    }

    /// 成功応答 `{success, message, data}`
    pub fn success<T: Serialize + ?Sized>(&mut self, data: &T, message: Option<&str>) -> Result<&mut Self, Error> {
        self.ensure_writable("success")?;
        let data = serde_json::to_value(data)
            .map_err(|e| Error::ResponseSerializationError(e.to_string()))?;
        self.json(&json!({
            "success": true,
            "message": message.unwrap_or("Success"),
            "data": data,
        }))
    }

    /// ページング応答
    ///
    /// `totalPages` は切り上げ除算（limitが0なら0ページ）。
    pub fn paginate<T: Serialize>(&mut self, items: &[T], page: u64, limit: u64, total: u64) -> Result<&mut Self, Error> {
        self.ensure_writable("paginate")?;
        let total_pages = if limit == 0 { 0 } else { total / limit + u64::from(total % limit != 0) };
        let data = serde_json::to_value(items)
            .map_err(|e| Error::ResponseSerializationError(e.to_string()))?;
        self.json(&json!({
            "success": true,
            "data": data,
            "pagination": {
                "page": page,
                "limit": limit,
                "total": total,
                "totalPages": total_pages,
                "hasNext": page < total_pages,
                "hasPrev": page > 1,
            }
        }))
    }

    // ------------------------------------------------------------------
    // ファイル
    // ------------------------------------------------------------------

    /// ファイルを送信する
    ///
    /// 読み込めない場合は404と "File Not Found" を設定して `Ok(false)` を返す。
    /// MIMEタイプ未指定時は拡張子から推定する。
    pub fn send_file(&mut self, path: &str, mime: Option<&str>) -> Result<bool, Error> {
        self.ensure_writable("send_file")?;
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("send_file could not read {}: {}", path, e);
                self.status(404);
                self.set_body("send_file", b"File Not Found".to_vec(), TEXT_PLAIN)?;
                return Ok(false);
            }
        };

        let mime = mime.unwrap_or_else(|| mime_from_path(path));
        let len = bytes.len();
        self.set_body("send_file", bytes, mime)?;
        self.cache(FILE_CACHE_SECONDS);
        self.set_header("Content-Length", len.to_string());
        if let Ok(modified) = fs::metadata(path).and_then(|m| m.modified()) {
            self.last_modified(&http_date(DateTime::<Utc>::from(modified)));
        }
        Ok(true)
    }

    /// ファイルを添付として送信する（ファイル名省略時はパスのファイル名）
    pub fn download(&mut self, path: &str, filename: Option<&str>) -> Result<bool, Error> {
        if !self.send_file(path, None)? {
            return Ok(false);
        }
        let name = filename
            .map(str::to_string)
            .or_else(|| Path::new(path).file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_default();
        self.attachment(&name);
        Ok(true)
    }

    // ------------------------------------------------------------------
    // 終了・変換
    // ------------------------------------------------------------------

    /// レスポンスを終了する（データ指定時はボディを上書き）
    pub fn end(&mut self, data: Option<&str>) -> Result<&mut Self, Error> {
        match data {
            Some(data) if !data.is_empty() => {
                self.ensure_writable("end")?;
                self.body = data.as_bytes().to_vec();
            }
            _ => {}
        }
        self.ended = true;
        Ok(self)
    }

    /// トランスポートに渡す形式に変換
    pub fn into_wire(self) -> WireResponse {
        let content_type = self.content_type().to_string();
        WireResponse {
            status: self.status,
            headers: self.headers.to_pairs(),
            body: Bytes::from(self.body),
            content_type,
        }
    }
}

/// CSVフィールドのエスケープ（区切り文字や引用符を含む場合は引用）
fn escape_csv_field(field: &str) -> String {
    if field.contains(|c: char| matches!(c, ',' | '"' | '\n' | '\r')) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body_json(res: &Response) -> Value {
        serde_json::from_slice(res.body()).unwrap()
    }

    #[test]
    fn test_defaults() {
        let res = Response::new();
        assert_eq!(res.status_code(), 200);
        assert_eq!(res.content_type(), TEXT_PLAIN);
        assert!(res.body().is_empty());
        assert!(!res.is_ended());
    }

    #[test]
    fn test_content_type_follows_body_setters() {
        let mut res = Response::new();
        res.html("<h1>hi</h1>").unwrap();
        assert_eq!(res.header("content-type"), Some(TEXT_HTML));
        res.xml("<a/>").unwrap();
        assert_eq!(res.content_type(), APPLICATION_XML);
        res.set_content_type("image/png");
        assert_eq!(res.header("Content-Type"), Some("image/png"));
        res.send_bytes(vec![1, 2, 3]).unwrap();
        assert_eq!(res.content_type(), "image/png");
        res.remove_header("content-type");
        assert_eq!(res.content_type(), "image/png");
    }

    #[test]
    fn test_json_and_status_overload() {
        let mut res = Response::new();
        res.json_with_status(201, &json!({"id": 1})).unwrap();
        assert_eq!(res.status_code(), 201);
        assert_eq!(res.content_type(), APPLICATION_JSON);
        assert_eq!(body_json(&res), json!({"id": 1}));
    }

    #[test]
    fn test_error_envelope() {
        let mut res = Response::new();
        res.error(422, "Validation failed", Some(json!({"field": "email"}))).unwrap();
        assert_eq!(res.status_code(), 422);

        let body = body_json(&res);
        assert_eq!(body["error"], json!(true));
        assert_eq!(body["status"], json!(422));
        assert_eq!(body["message"], json!("Validation failed"));
        assert_eq!(body["details"], json!({"field": "email"}));

        let ts = body["timestamp"].as_str().unwrap();
        assert!(ts.ends_with('Z'));
        // 2024-01-01T00:00:00.000Z
        assert_eq!(ts.len(), 24);
        assert!(DateTime::parse_from_rfc3339(ts).is_ok());
    }

    #[test]
    fn test_error_envelope_without_details() {
        let mut res = Response::new();
        res.error(404, "Not Found", None).unwrap();
        assert!(body_json(&res).get("details").is_none());
    }

    #[test]
    fn test_success_envelope() {
        let mut res = Response::new();
        res.success(&json!({"id": 3}), None).unwrap();
        assert_eq!(body_json(&res), json!({"success": true, "message": "Success", "data": {"id": 3}}));

        let mut res = Response::new();
        res.success(&vec![1, 2], Some("Created")).unwrap();
        assert_eq!(body_json(&res)["message"], json!("Created"));
    }

    #[test]
    fn test_paginate() {
        let mut res = Response::new();
        let items = vec!["a", "b"];
        res.paginate(&items, 2, 10, 25).unwrap();
        let body = body_json(&res);
        assert_eq!(body["data"], json!(["a", "b"]));
        assert_eq!(body["pagination"], json!({
            "page": 2, "limit": 10, "total": 25,
            "totalPages": 3, "hasNext": true, "hasPrev": true
        }));
    }

    #[test]
    fn test_paginate_boundaries() {
        let mut res = Response::new();
        res.paginate::<u8>(&[], 1, 10, 30).unwrap();
        let p = &body_json(&res)["pagination"];
        assert_eq!(p["totalPages"], json!(3));
        assert_eq!(p["hasPrev"], json!(false));

        let mut res = Response::new();
        res.paginate::<u8>(&[], 3, 10, 30).unwrap();
        assert_eq!(body_json(&res)["pagination"]["hasNext"], json!(false));

        let mut res = Response::new();
        res.paginate::<u8>(&[], 1, 0, 30).unwrap();
        assert_eq!(body_json(&res)["pagination"]["totalPages"], json!(0));
    }

    #[test]
    fn test_paginate_huge_total() {
        let mut res = Response::new();
        res.paginate::<u8>(&[], 1, 10, u64::MAX).unwrap();
        let p = &body_json(&res)["pagination"];
        assert_eq!(p["totalPages"], json!(u64::MAX / 10 + 1));
        assert_eq!(p["hasNext"], json!(true));

        let mut res = Response::new();
        res.paginate::<u8>(&[], 1, u64::MAX, u64::MAX).unwrap();
        assert_eq!(body_json(&res)["pagination"]["totalPages"], json!(1));
    }

    #[test]
    fn test_cookies_are_separate_lines() {
        let mut res = Response::new();
        res.cookie("a", "1", &CookieOptions::default()).unwrap();
        res.cookie("b", "2", &CookieOptions::default().with_max_age(60)).unwrap();
        res.clear_cookie("old", &CookieOptions::default()).unwrap();

        let lines = res.headers().get_all("Set-Cookie");
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "a=1; Path=/; HttpOnly; SameSite=Lax");
        assert_eq!(lines[1], "b=2; Max-Age=60; Path=/; HttpOnly; SameSite=Lax");
        assert!(lines[2].starts_with("old=; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Max-Age=0"));
        assert!(res.cookie("bad name", "v", &CookieOptions::default()).is_err());
    }

    #[test]
    fn test_declarative_header_setters() {
        let mut res = Response::new();
        res.cors(&CorsOptions::default().with_credentials(true))
            .security_headers()
            .rate_limit(100, 99, 60)
            .attachment("report.pdf");

        assert_eq!(res.header("Access-Control-Allow-Origin"), Some("*"));
        assert_eq!(res.header("Access-Control-Allow-Methods"), Some("GET, POST, PUT, PATCH, DELETE, OPTIONS"));
        assert_eq!(res.header("Access-Control-Allow-Credentials"), Some("true"));
        assert_eq!(res.header("Access-Control-Max-Age"), Some("86400"));
        assert_eq!(res.header("X-Content-Type-Options"), Some("nosniff"));
        assert_eq!(res.header("X-Frame-Options"), Some("DENY"));
        assert_eq!(res.header("X-XSS-Protection"), Some("1; mode=block"));
        assert_eq!(res.header("Strict-Transport-Security"), Some("max-age=31536000; includeSubDomains"));
        assert_eq!(res.header("Referrer-Policy"), Some("strict-origin-when-cross-origin"));
        assert_eq!(res.header("X-RateLimit-Limit"), Some("100"));
        assert_eq!(res.header("X-RateLimit-Remaining"), Some("99"));
        assert_eq!(res.header("X-RateLimit-Reset"), Some("60"));
        assert_eq!(res.header("Content-Disposition"), Some("attachment; filename=\"report.pdf\""));
    }

    #[test]
    fn test_cache_headers() {
        let mut res = Response::new();
        res.cache(600);
        assert_eq!(res.header("Cache-Control"), Some("public, max-age=600"));
        res.no_cache();
        assert_eq!(res.header("Cache-Control"), Some("no-store, no-cache, must-revalidate, proxy-revalidate"));
        assert_eq!(res.header("Pragma"), Some("no-cache"));
        assert_eq!(res.header("Expires"), Some("0"));
    }

    #[test]
    fn test_invalid_header_is_ignored() {
        let mut res = Response::new();
        res.set_header("X-Good", "value").set_header("X-Evil", "evil\nvalue");
        assert_eq!(res.header("X-Good"), Some("value"));
        assert!(res.header("X-Evil").is_none());
    }

    #[test]
    fn test_end_then_write_is_rejected() {
        let mut res = Response::new();
        res.send("first").unwrap();
        res.end(None).unwrap();
        assert!(res.is_ended());

        assert!(matches!(res.send("second"), Err(Error::ResponseEnded(_))));
        assert!(matches!(res.json(&json!({})), Err(Error::ResponseEnded(_))));
        assert!(matches!(res.end(Some("third")), Err(Error::ResponseEnded(_))));
        assert_eq!(res.body_text(), "first");

        // ヘッダーは変更可能
        res.set_header("X-After", "ok");
        assert_eq!(res.header("X-After"), Some("ok"));
        assert!(res.end(None).is_ok());
    }

    #[test]
    fn test_end_with_data_overwrites() {
        let mut res = Response::new();
        res.send("draft").unwrap();
        res.end(Some("final")).unwrap();
        assert_eq!(res.body_text(), "final");

        let mut res = Response::new();
        res.send("keep").unwrap();
        res.end(Some("")).unwrap();
        assert_eq!(res.body_text(), "keep");
    }

    #[test]
    fn test_send_status_and_redirect() {
        let mut res = Response::new();
        res.send_status(404).unwrap();
        assert_eq!(res.status_code(), 404);
        assert_eq!(res.body_text(), "404 Not Found");

        let mut res = Response::new();
        res.redirect("/login", None).unwrap();
        assert_eq!(res.status_code(), 302);
        assert_eq!(res.header("Location"), Some("/login"));
        assert_eq!(res.body_text(), "Redirecting to: /login");
    }

    #[test]
    fn test_jsonp_sanitizes_callback() {
        let mut res = Response::new();
        res.jsonp("cb", &json!({"a": 1})).unwrap();
        assert_eq!(res.body_text(), "/**/ typeof cb === 'function' && cb({\"a\":1});");
        assert_eq!(res.content_type(), APPLICATION_JAVASCRIPT);

        let mut res = Response::new();
        res.jsonp("alert(1)//", &json!(1)).unwrap();
        assert!(res.body_text().contains("callback(1)"));
    }

    #[test]
    fn test_csv() {
        let mut res = Response::new();
        let rows = vec![
            vec!["name".to_string(), "note".to_string()],
            vec!["alice".to_string(), "says \"hi\", twice".to_string()],
        ];
        res.csv(&rows, Some("people.csv")).unwrap();
        assert_eq!(res.body_text(), "name,note\r\nalice,\"says \"\"hi\"\", twice\"\r\n");
        assert_eq!(res.content_type(), TEXT_CSV);
        assert_eq!(res.header("Content-Disposition"), Some("attachment; filename=\"people.csv\""));
    }

    #[test]
    fn test_sse() {
        let mut res = Response::new();
        res.sse(&[
            SseEvent::new("hello").with_event("greeting").with_id("1"),
            SseEvent::new("line1\nline2"),
        ]).unwrap();
        assert_eq!(
            res.body_text(),
            "id: 1\nevent: greeting\ndata: hello\n\ndata: line1\ndata: line2\n\n"
        );
        assert_eq!(res.content_type(), TEXT_EVENT_STREAM);
        assert_eq!(res.header("Cache-Control"), Some("no-cache"));
    }

    #[test]
    fn test_write_appends() {
        let mut res = Response::new();
        res.write("a").unwrap().write(b"b").unwrap();
        assert_eq!(res.body_text(), "ab");
    }

    #[test]
    fn test_misc_headers() {
        let mut res = Response::new();
        res.vary("Accept").vary("accept").vary("Origin");
        assert_eq!(res.header("Vary"), Some("Accept, Origin"));

        res.links(&[("next", "/page/2"), ("last", "/page/9")]);
        assert_eq!(res.header("Link"), Some("</page/2>; rel=\"next\", </page/9>; rel=\"last\""));

        res.server_timing("db", 12.5, Some("query"));
        assert_eq!(res.header("Server-Timing"), Some("db;dur=12.500;desc=\"query\""));
    }

    fn temp_file(name: &str, contents: &[u8]) -> String {
        let dir = std::env::temp_dir().join(format!("routebridge-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_send_file() {
        let path = temp_file("page.html", b"<p>hi</p>");
        let mut res = Response::new();
        assert!(res.send_file(&path, None).unwrap());
        assert_eq!(res.status_code(), 200);
        assert_eq!(res.body_text(), "<p>hi</p>");
        assert_eq!(res.content_type(), TEXT_HTML);
        assert_eq!(res.header("Cache-Control"), Some("public, max-age=3600"));
        assert_eq!(res.header("Content-Length"), Some("9"));
        assert!(res.header("Last-Modified").unwrap().ends_with("GMT"));

        let mut res = Response::new();
        let path = temp_file("blob.unknownext", b"\x00\x01");
        assert!(res.send_file(&path, None).unwrap());
        assert_eq!(res.content_type(), "application/octet-stream");

        let mut res = Response::new();
        assert!(res.send_file(&path, Some("image/png")).unwrap());
        assert_eq!(res.content_type(), "image/png");
    }

    #[test]
    fn test_send_file_rejects_invalid_mime() {
        let path = temp_file("note.txt", b"note");
        let mut res = Response::new();
        let result = res.send_file(&path, Some("text/plain\r\nInjected: 1"));
        assert!(matches!(result, Err(Error::InvalidHeader(_))));
        assert!(res.header("Injected").is_none());
        assert!(res.body().is_empty());
        assert!(!res.content_type().contains('\n'));
    }

    #[test]
    fn test_send_file_missing() {
        let mut res = Response::new();
        assert!(!res.send_file("/definitely/not/here.txt", None).unwrap());
        assert_eq!(res.status_code(), 404);
        assert_eq!(res.body_text(), "File Not Found");
    }

    #[test]
    fn test_download() {
        let path = temp_file("data.txt", b"payload");
        let mut res = Response::new();
        assert!(res.download(&path, None).unwrap());
        assert_eq!(res.header("Content-Disposition"), Some("attachment; filename=\"data.txt\""));

        let mut res = Response::new();
        assert!(res.download(&path, Some("renamed.txt")).unwrap());
        assert_eq!(res.header("Content-Disposition"), Some("attachment; filename=\"renamed.txt\""));

        let mut res = Response::new();
        assert!(!res.download("/missing/file", None).unwrap());
        assert!(res.header("Content-Disposition").is_none());
    }

    #[test]
    fn test_into_wire() {
        let mut res = Response::new();
        res.status(201).set_header("X-A", "1");
        res.cookie("a", "1", &CookieOptions::default()).unwrap();
        res.cookie("b", "2", &CookieOptions::default()).unwrap();
        res.json(&json!({"ok": true})).unwrap();

        let wire = res.into_wire();
        assert_eq!(wire.status, 201);
        assert_eq!(wire.content_type, APPLICATION_JSON);
        assert_eq!(wire.body_text(), "{\"ok\":true}");
        let cookies: Vec<&String> = wire.headers.iter().filter(|(k, _)| k == "Set-Cookie").map(|(_, v)| v).collect();
        assert_eq!(cookies.len(), 2);
        assert_eq!(wire.header("x-a"), Some("1"));
    }
}
