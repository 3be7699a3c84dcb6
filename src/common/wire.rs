//! トランスポートとの境界で受け渡す型

use bytes::Bytes;

/// トランスポートから受け取る生のリクエスト
#[derive(Debug, Clone, Default)]
pub struct RawRequest {
    /// HTTPメソッド（文字列のまま）
    pub method: String,
    /// リクエストパス（`?` 以降を含んでもよい）
    pub path: String,
    /// 生のクエリ文字列（`?` は含まない）
    pub query_string: String,
    /// 受信順のヘッダー
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// 接続元アドレス
    pub remote_addr: String,
    /// TLS終端済みの接続か
    pub tls: bool,
}

impl RawRequest {
    /// 新しい生リクエストを作成（パス中の `?` 以降はクエリ文字列として扱う）
    pub fn new(method: impl Into<String>, target: impl Into<String>) -> Self {
        let target = target.into();
        let (path, query_string) = match target.split_once('?') {
            Some((p, q)) => (p.to_string(), q.to_string()),
            None => (target, String::new()),
        };
        Self {
            method: method.into(),
            path,
            query_string,
            ..Default::default()
        }
    }

    /// ヘッダーを追加
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// ボディを追加
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// 接続元アドレスを設定
    pub fn with_remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = addr.into();
        self
    }

    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    /// 元のURL（パス + クエリ文字列）
    pub fn original_url(&self) -> String {
        if self.query_string.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.query_string)
        }
    }
}

/// トランスポートに返すレスポンス
#[derive(Debug, Clone)]
pub struct WireResponse {
    pub status: u16,
    /// 1行1エントリのヘッダー（Set-Cookieは行ごとに分かれる）
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub content_type: String,
}

impl WireResponse {
    /// 最初に見つかったヘッダー値（大文字小文字は区別しない）
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// ボディをUTF-8文字列として取得
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
