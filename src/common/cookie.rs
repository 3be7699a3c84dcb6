//! HTTPクッキー関連の実装

use std::collections::HashMap;
use std::fmt;
use chrono::{DateTime, TimeZone, Utc};
use crate::error::Error;
use super::utils::{validate_cookie_name_value, is_header_value_valid};

/// SameSite属性
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SameSite::Strict => write!(f, "Strict"),
            SameSite::Lax => write!(f, "Lax"),
            SameSite::None => write!(f, "None"),
        }
    }
}

/// Set-Cookieの属性
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieOptions {
    /// Max-Age（秒）
    pub max_age: Option<i64>,
    pub domain: Option<String>,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
    pub expires: Option<DateTime<Utc>>,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            max_age: None,
            domain: None,
            path: "/".to_string(),
            secure: false,
            http_only: true,
            same_site: Some(SameSite::Lax),
            expires: None,
        }
    }
}

impl CookieOptions {
    /// 最大年齢（秒）を設定
    pub fn with_max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    /// ドメインを設定
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// パスを設定
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// セキュアフラグを設定
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// HttpOnlyフラグを設定
    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// SameSite属性を設定
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    /// 有効期限を設定
    pub fn with_expires(mut self, expires: DateTime<Utc>) -> Self {
        self.expires = Some(expires);
        self
    }
}

/// HTTPクッキー
#[derive(Debug, Clone)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub options: CookieOptions,
}

impl Cookie {
    /// 新しいクッキーをResultで作成（無効な文字は拒否）
    pub fn try_new(name: impl Into<String>, value: impl Into<String>, options: CookieOptions) -> Result<Self, Error> {
        let n = name.into();
        let v = value.into();
        validate_cookie_name_value(&n, &v)?;
        Ok(Self { name: n, value: v, options })
    }

    /// 削除用のクッキー（空値・過去日付・Max-Age=0）
    pub fn expired(name: impl Into<String>, options: CookieOptions) -> Result<Self, Error> {
        let epoch = Utc.timestamp_opt(0, 0).single().unwrap_or_default();
        Self::try_new(name, "", options.with_max_age(0).with_expires(epoch))
    }

    /// Set-Cookieヘッダー値を生成
    ///
    /// 形式: `name=value[; Expires=..][; Max-Age=n][; Domain=d][; Path=p][; Secure][; HttpOnly][; SameSite=s]`
    pub fn to_header_value(&self) -> String {
        let opts = &self.options;
        let mut cookie_str = format!("{}={}", self.name, self.value);

        if let Some(expires) = &opts.expires {
            cookie_str.push_str(&format!("; Expires={}", expires.format("%a, %d %b %Y %H:%M:%S GMT")));
        }

        if let Some(max_age) = opts.max_age {
            cookie_str.push_str(&format!("; Max-Age={}", max_age));
        }

        if let Some(domain) = &opts.domain {
            if is_header_value_valid(domain) && !domain.contains(';') {
                cookie_str.push_str(&format!("; Domain={}", domain));
            } else {
                log::warn!("Cookie::to_header_value skipped invalid Domain value: {:?}", domain);
            }
        }

        if !opts.path.is_empty() {
            if is_header_value_valid(&opts.path) && !opts.path.contains(';') {
                cookie_str.push_str(&format!("; Path={}", opts.path));
            } else {
                log::warn!("Cookie::to_header_value skipped invalid Path value: {:?}", opts.path);
            }
        }

        if opts.secure {
            cookie_str.push_str("; Secure");
        }

        if opts.http_only {
            cookie_str.push_str("; HttpOnly");
        }

        if let Some(same_site) = &opts.same_site {
            cookie_str.push_str(&format!("; SameSite={}", same_site));
        }

        cookie_str
    }
}

/// Cookieヘッダーを名前→値のマップに変換
///
/// `;` で分割し前後の空白を除去、最初の `=` で名前と値に分ける。
/// `=` のないペアは無視する。
pub fn parse_cookies(header: &str) -> HashMap<String, String> {
    header
        .split(';')
        .map(str::trim)
        .filter_map(|pair| pair.split_once('='))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .filter(|(name, _)| !name.is_empty())
        .collect()
}
