//! 正規化されたHTTPリクエスト

use std::collections::HashMap;
use std::time::{Duration, Instant};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::config::AppConfig;
use crate::error::Error;
use super::body::{decompress_gzip, parse_body};
use super::cookie::parse_cookies;
use super::headers::Headers;
use super::http::Method;
use super::utils::{is_header_value_valid, normalize_path, parse_query_string};
use super::wire::RawRequest;

/// 実クライアントIPを探すヘッダー（優先順）
const REAL_IP_HEADERS: [&str; 5] = [
    "X-Real-IP",
    "X-Forwarded-For",
    "CF-Connecting-IP",
    "True-Client-IP",
    "X-Client-IP",
];

const MAX_REQUEST_ID_LEN: usize = 128;

/// HTTPリクエスト
///
/// ハンドラーには `&Request` として渡され、構築後は変更されない。
/// ルートパラメータのみマッチ時にディスパッチ側が設定する。
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTPメソッド
    pub method: Method,
    /// 正規化済みパス（ルート以外は末尾の `/` を持たない）
    pub path: String,
    /// 受信したままのURL（クエリ文字列を含む）
    pub original_url: String,
    /// "http" または "https"
    pub protocol: String,
    /// ポートを除いたホスト名
    pub hostname: String,
    /// ルートパラメータ
    pub params: HashMap<String, String>,
    /// デコード済みクエリパラメータ
    pub query: HashMap<String, String>,
    /// HTTPヘッダー
    pub headers: Headers,
    pub cookies: HashMap<String, String>,
    /// リクエストボディ（gzipは解凍済み）
    pub body: Vec<u8>,
    /// 構造化ボディ（JSON/フォーム以外や解析失敗時は空オブジェクト）
    pub parsed_body: Value,
    /// 解決済みのクライアントIP
    pub ip: String,
    /// X-Forwarded-Forのチェーン（プロキシ信頼時のみ）
    pub ips: Vec<String>,
    pub secure: bool,
    pub request_id: String,
    pub start_time: Instant,
    pub received_at: DateTime<Utc>,
    remote_addr: String,
    tls: bool,
    trust_proxy: bool,
}

impl Request {
    /// 新しいリクエストを作成
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let path = path.into();
        let mut request = Self {
            method,
            path: normalize_path(&path),
            original_url: path,
            protocol: "http".to_string(),
            hostname: String::new(),
            params: HashMap::new(),
            query: HashMap::new(),
            headers: Headers::new(),
            cookies: HashMap::new(),
            body: Vec::new(),
            parsed_body: Value::Object(Map::new()),
            ip: String::new(),
            ips: Vec::new(),
            secure: false,
            request_id: String::new(),
            start_time: Instant::now(),
            received_at: Utc::now(),
            remote_addr: String::new(),
            tls: false,
            trust_proxy: false,
        };
        request.refresh_derived();
        request
    }

    /// トランスポートから受け取った生リクエストを正規化する
    pub fn from_raw(raw: RawRequest, config: &AppConfig) -> Result<Self, Error> {
        let method: Method = raw.method.parse()?;

        if raw.body.len() > config.max_body_size {
            return Err(Error::PayloadTooLarge(format!(
                "Request body size {} bytes exceeds maximum allowed size {} bytes",
                raw.body.len(),
                config.max_body_size
            )));
        }

        let original_url = raw.original_url();
        let mut headers = Headers::new();
        for (name, value) in raw.headers {
            if !is_header_value_valid(&value) {
                log::warn!("Dropping inbound header with invalid value: {}", name);
                continue;
            }
            headers.insert(name, value);
        }

        let gzipped = headers
            .get("Content-Encoding")
            .map(|v| v.trim().eq_ignore_ascii_case("gzip"))
            .unwrap_or(false);
        let body = if gzipped && !raw.body.is_empty() {
            decompress_gzip(&raw.body, config.max_body_size)?
        } else {
            raw.body
        };

        let mut request = Self::new(method, raw.path);
        request.original_url = original_url;
        request.query = parse_query_string(&raw.query_string);
        request.headers = headers;
        request.body = body;
        request.remote_addr = raw.remote_addr;
        request.trust_proxy = config.trust_proxy;
        request.tls = raw.tls;
        request.refresh_derived();
        Ok(request)
    }

    /// クエリパラメータを追加
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// ルートパラメータを追加
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// ヘッダーを追加（CRLF等を含む値は無視）
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        if is_header_value_valid(&value) {
            self.headers.insert(key, value);
            self.refresh_derived();
        } else {
            log::warn!("Request::with_header rejected invalid value for {}", key);
        }
        self
    }

    /// ボディを追加
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self.refresh_derived();
        self
    }

    /// 接続元アドレスを設定
    pub fn with_remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = addr.into();
        self.refresh_derived();
        self
    }

    /// プロキシヘッダーを信頼するかを設定
    pub fn with_trust_proxy(mut self, trust: bool) -> Self {
        self.trust_proxy = trust;
        self.refresh_derived();
        self
    }

    /// ヘッダー・ボディから派生する値を計算し直す
    fn refresh_derived(&mut self) {
        self.cookies = self.headers.get("Cookie").map(parse_cookies).unwrap_or_default();
        self.parsed_body = parse_body(self.headers.get("Content-Type").unwrap_or(""), &self.body);

        let forwarded_proto = if self.trust_proxy {
            self.headers
                .get("X-Forwarded-Proto")
                .and_then(|v| v.split(',').next())
                .map(|v| v.trim().to_ascii_lowercase())
        } else {
            None
        };
        self.protocol = match forwarded_proto {
            Some(proto) if proto == "https" || proto == "http" => proto,
            _ if self.tls => "https".to_string(),
            _ => "http".to_string(),
        };
        self.secure = self.protocol == "https";

        let host = if self.trust_proxy {
            self.headers.get("X-Forwarded-Host").or_else(|| self.headers.get("Host"))
        } else {
            self.headers.get("Host")
        };
        self.hostname = host.map(strip_port).unwrap_or_default();

        self.ip.clear();
        self.ips.clear();
        if self.trust_proxy {
            self.ip = self.proxy_header_ip().unwrap_or_default();
            self.parse_forwarded_ips();
        }
        if self.ip.is_empty() {
            self.ip = self.remote_addr.clone();
        }

        self.request_id = match self.headers.get("X-Request-ID") {
            Some(id) if !id.trim().is_empty() && id.len() <= MAX_REQUEST_ID_LEN => id.trim().to_string(),
            _ if !self.request_id.is_empty() => std::mem::take(&mut self.request_id),
            _ => uuid::Uuid::new_v4().to_string(),
        };
    }

    /// ルートパラメータを設定（ディスパッチ時のみ）
    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }

    /// ルートパラメータを取得
    pub fn get_param<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.params.get(key).map(String::as_str).unwrap_or(default)
    }

    /// クエリパラメータを取得
    pub fn get_query<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.query.get(key).map(String::as_str).unwrap_or(default)
    }

    /// クッキーを取得
    pub fn get_cookie<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.cookies.get(key).map(String::as_str).unwrap_or(default)
    }

    /// ヘッダーを取得（大文字小文字は区別しない）
    pub fn get_header<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.headers.get(key).unwrap_or(default)
    }

    /// Content-Typeのメディアタイプ部分（`;` 以降を除く）
    pub fn content_type(&self) -> &str {
        self.get_header("Content-Type", "").split(';').next().unwrap_or("").trim()
    }

    /// Acceptヘッダーが指定タイプ（または `*/*`）を含むか
    pub fn accepts(&self, mime: &str) -> bool {
        let accept = self.get_header("Accept", "");
        accept.contains(mime) || accept.contains("*/*")
    }

    /// モバイル端末からのリクエストか（User-Agentによる簡易判定）
    pub fn is_mobile(&self) -> bool {
        let ua = self.user_agent().to_ascii_lowercase();
        ["mobile", "android", "iphone"].iter().any(|needle| ua.contains(needle))
    }

    /// XMLHttpRequestからのリクエストか
    pub fn is_ajax(&self) -> bool {
        self.get_header("X-Requested-With", "").eq_ignore_ascii_case("XMLHttpRequest")
    }

    pub fn user_agent(&self) -> &str {
        self.get_header("User-Agent", "")
    }

    /// プロキシヘッダーから得たクライアントIP
    fn proxy_header_ip(&self) -> Option<String> {
        REAL_IP_HEADERS.iter().find_map(|name| {
            let value = self.headers.get(name)?;
            let first = if name.eq_ignore_ascii_case("X-Forwarded-For") {
                value.split(',').next().unwrap_or("")
            } else {
                value
            };
            let first = first.trim();
            (!first.is_empty()).then(|| first.to_string())
        })
    }

    /// 実クライアントIPを取得
    ///
    /// X-Real-IP, X-Forwarded-For（先頭のみ）, CF-Connecting-IP, True-Client-IP,
    /// X-Client-IP の順に調べ、どれもなければ接続元アドレスを返す。
    pub fn get_real_ip(&self) -> String {
        self.proxy_header_ip().unwrap_or_else(|| self.remote_addr.clone())
    }

    /// X-Forwarded-Forを分解して `ips` に格納する
    ///
    /// `ip` が未設定なら先頭のエントリを元のクライアントとして扱う。
    pub fn parse_forwarded_ips(&mut self) {
        self.ips = self
            .headers
            .get("X-Forwarded-For")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        if self.ip.is_empty() {
            if let Some(first) = self.ips.first() {
                self.ip = first.clone();
            }
        }
    }

    /// キャッシュが新鮮か（条件付きヘッダーとの完全一致で判定）
    pub fn is_fresh(&self, etag: &str, last_modified: Option<&str>) -> bool {
        if self.headers.get("If-None-Match") == Some(etag) {
            return true;
        }
        match last_modified {
            Some(lm) => self.headers.get("If-Modified-Since") == Some(lm),
            None => false,
        }
    }

    /// JSONボディがオブジェクトで、指定フィールドを全て含むか
    pub fn validate_json(&self, required_fields: &[&str]) -> bool {
        match &self.parsed_body {
            Value::Object(map) => required_fields.iter().all(|f| map.contains_key(*f)),
            _ => false,
        }
    }

    /// ボディ・ルートパラメータ・クエリをまとめたデータ
    ///
    /// ボディ < ルートパラメータの順に上書きし、クエリは未設定のキーだけ補う。
    pub fn get_all_data(&self) -> Map<String, Value> {
        let mut data = match &self.parsed_body {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        for (k, v) in &self.params {
            data.insert(k.clone(), Value::String(v.clone()));
        }
        for (k, v) in &self.query {
            if !data.contains_key(k) {
                data.insert(k.clone(), Value::String(v.clone()));
            }
        }
        data
    }

    /// ボディをJSONとして型付きでパース
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        if self.body.is_empty() {
            return Err(Error::InvalidRequestBody("No request body".to_string()));
        }
        serde_json::from_slice(&self.body).map_err(|e| Error::InvalidRequestBody(e.to_string()))
    }

    /// `Authorization: Bearer <token>` のトークン
    pub fn bearer_token(&self) -> Option<&str> {
        let auth = self.headers.get("Authorization")?;
        let (scheme, token) = auth.trim().split_once(' ')?;
        if scheme.eq_ignore_ascii_case("Bearer") && !token.trim().is_empty() {
            Some(token.trim())
        } else {
            None
        }
    }

    /// `Authorization: Basic <base64>` のユーザー名とパスワード
    pub fn basic_auth(&self) -> Option<(String, String)> {
        let auth = self.headers.get("Authorization")?;
        let (scheme, encoded) = auth.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("Basic") {
            return None;
        }
        let decoded = base64::decode(encoded.trim()).ok()?;
        let text = String::from_utf8(decoded).ok()?;
        let (user, pass) = text.split_once(':')?;
        Some((user.to_string(), pass.to_string()))
    }

    /// 受信からの経過時間
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// 接続元アドレス（プロキシ解決前）
    pub fn remote_addr(&self) -> &str {
        &self.remote_addr
    }
}

/// `host:port` からホスト部分を取り出す（IPv6リテラルにも対応）
fn strip_port(host: &str) -> String {
    let host = host.trim();
    if let Some(rest) = host.strip_prefix('[') {
        return rest.split(']').next().unwrap_or("").to_string();
    }
    host.split(':').next().unwrap_or("").to_string()
}
