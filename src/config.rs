//! アプリケーション設定（環境変数からの読み込み）

use std::env;
use crate::common::response::CorsOptions;

/// リクエストボディの既定の最大サイズ（5MB）
pub const DEFAULT_MAX_BODY_SIZE: usize = 5 * 1024 * 1024;

/// X-Powered-Byの既定値
pub const DEFAULT_POWERED_BY: &str = "routebridge";

/// ディスパッチ全体に関わる設定
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// リクエストボディの最大サイズ（バイト）
    pub max_body_size: usize,
    /// X-Forwarded-* 等のプロキシヘッダーを信頼するか
    pub trust_proxy: bool,
    /// CORS設定（Noneなら無効）
    pub cors: Option<CorsOptions>,
    /// X-Powered-Byの値（Noneなら出力しない）
    pub powered_by: Option<String>,
    /// ハンドラーエラーの詳細を500レスポンスに含めるか
    pub expose_error_details: bool,
    /// 全レスポンスにセキュリティヘッダーを付与するか
    pub security_headers: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            trust_proxy: false,
            cors: None,
            powered_by: Some(DEFAULT_POWERED_BY.to_string()),
            expose_error_details: false,
            security_headers: false,
        }
    }
}

impl AppConfig {
    /// 環境変数から設定を読み込む
    ///
    /// 不正な値は無視して既定値を使う。
    /// - `ROUTEBRIDGE_MAX_BODY_SIZE`
    /// - `ROUTEBRIDGE_TRUST_PROXY`
    /// - `ROUTEBRIDGE_CORS_ORIGIN`（設定時のみCORSを有効化）
    /// - `ROUTEBRIDGE_POWERED_BY`（空文字で無効化）
    /// - `ROUTEBRIDGE_EXPOSE_ERROR_DETAILS`
    /// - `ROUTEBRIDGE_SECURITY_HEADERS`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_body_size: get_max_body_size(),
            trust_proxy: env_bool("ROUTEBRIDGE_TRUST_PROXY").unwrap_or(defaults.trust_proxy),
            cors: env::var("ROUTEBRIDGE_CORS_ORIGIN")
                .ok()
                .filter(|origin| !origin.trim().is_empty())
                .map(|origin| CorsOptions::default().with_origin(origin.trim())),
            powered_by: match env::var("ROUTEBRIDGE_POWERED_BY") {
                Ok(v) if v.trim().is_empty() => None,
                Ok(v) => Some(v.trim().to_string()),
                Err(_) => defaults.powered_by,
            },
            expose_error_details: env_bool("ROUTEBRIDGE_EXPOSE_ERROR_DETAILS")
                .unwrap_or(defaults.expose_error_details),
            security_headers: env_bool("ROUTEBRIDGE_SECURITY_HEADERS").unwrap_or(defaults.security_headers),
        }
    }

    /// CORSを有効化
    pub fn with_cors(mut self, cors: CorsOptions) -> Self {
        self.cors = Some(cors);
        self
    }

    pub fn with_trust_proxy(mut self, trust: bool) -> Self {
        self.trust_proxy = trust;
        self
    }

    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }
}

/// リクエストボディの最大サイズ（バイト）を取得する
/// 優先順位: 環境変数 `ROUTEBRIDGE_MAX_BODY_SIZE` -> デフォルト 5MB
pub fn get_max_body_size() -> usize {
    env::var("ROUTEBRIDGE_MAX_BODY_SIZE")
        .ok()
        .and_then(|s| s.trim().parse::<usize>().ok())
        .unwrap_or(DEFAULT_MAX_BODY_SIZE)
}

/// 真偽値の環境変数を解釈（1/true/yes/on, 0/false/no/off）
fn env_bool(key: &str) -> Option<bool> {
    let value = env::var(key).ok()?;
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        other => {
            log::warn!("Ignoring invalid boolean value for {}: {:?}", key, other);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use temp_env::with_vars;

    const ALL_VARS: [&str; 6] = [
        "ROUTEBRIDGE_MAX_BODY_SIZE",
        "ROUTEBRIDGE_TRUST_PROXY",
        "ROUTEBRIDGE_CORS_ORIGIN",
        "ROUTEBRIDGE_POWERED_BY",
        "ROUTEBRIDGE_EXPOSE_ERROR_DETAILS",
        "ROUTEBRIDGE_SECURITY_HEADERS",
    ];

    #[test]
    fn test_defaults_without_env() {
        with_vars(ALL_VARS.map(|k| (k, None::<&str>)), || {
            let config = AppConfig::from_env();
            assert_eq!(config.max_body_size, 5 * 1024 * 1024);
            assert!(!config.trust_proxy);
            assert!(config.cors.is_none());
            assert_eq!(config.powered_by.as_deref(), Some("routebridge"));
            assert!(!config.expose_error_details);
            assert!(!config.security_headers);
        });
    }

    #[test]
    fn test_values_from_env() {
        with_vars([
            ("ROUTEBRIDGE_MAX_BODY_SIZE", Some("1048576")),
            ("ROUTEBRIDGE_TRUST_PROXY", Some("true")),
            ("ROUTEBRIDGE_CORS_ORIGIN", Some("https://app.example.com")),
            ("ROUTEBRIDGE_POWERED_BY", Some("")),
            ("ROUTEBRIDGE_EXPOSE_ERROR_DETAILS", Some("1")),
            ("ROUTEBRIDGE_SECURITY_HEADERS", Some("on")),
        ], || {
            let config = AppConfig::from_env();
            assert_eq!(config.max_body_size, 1048576);
            assert!(config.trust_proxy);
            assert_eq!(config.cors.map(|c| c.origin), Some("https://app.example.com".to_string()));
            assert!(config.powered_by.is_none());
            assert!(config.expose_error_details);
            assert!(config.security_headers);
        });
    }

    #[test]
    fn test_invalid_values_fall_back() {
        with_vars([
            ("ROUTEBRIDGE_MAX_BODY_SIZE", Some("lots")),
            ("ROUTEBRIDGE_TRUST_PROXY", Some("maybe")),
        ], || {
            let config = AppConfig::from_env();
            assert_eq!(config.max_body_size, DEFAULT_MAX_BODY_SIZE);
            assert!(!config.trust_proxy);
        });
    }
}
