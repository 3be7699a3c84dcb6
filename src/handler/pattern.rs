//! ルートパターン（`/users/:id` 形式）の解析とマッチング

use std::collections::{HashMap, HashSet};
use log::warn;
use crate::common::{normalize_path, percent_decode_path};
use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// 解析済みのルートパターン
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
}

/// パスをセグメントに分割（ルート `/` は0セグメント）
fn split_segments(path: &str) -> Vec<&str> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if trimmed.is_empty() {
        Vec::new()
    } else {
        trimmed.split('/').collect()
    }
}

impl RoutePattern {
    /// パターン文字列を検証して解析する
    ///
    /// - `/` で始まること
    /// - 空セグメント（`//`）を含まないこと
    /// - プレースホルダ名が空でなく、重複しないこと
    ///
    /// 末尾の `/` は取り除かれる。
    pub fn parse(pattern: &str) -> Result<Self, Error> {
        if !pattern.starts_with('/') {
            return Err(Error::InvalidRoutePattern(format!(
                "Route pattern must start with '/': {:?}", pattern
            )));
        }

        let normalized = normalize_path(pattern);
        if normalized != pattern {
            warn!("Route pattern '{}' normalized to '{}'", pattern, normalized);
        }

        let mut names = HashSet::new();
        let mut segments = Vec::new();
        for seg in split_segments(&normalized) {
            if seg.is_empty() {
                return Err(Error::InvalidRoutePattern(format!(
                    "Route pattern contains an empty segment: {:?}", pattern
                )));
            }
            match seg.strip_prefix(':') {
                Some("") => {
                    return Err(Error::InvalidRoutePattern(format!(
                        "Placeholder without a name in {:?}", pattern
                    )));
                }
                Some(name) => {
                    if !names.insert(name.to_string()) {
                        return Err(Error::InvalidRoutePattern(format!(
                            "Duplicate placeholder ':{}' in {:?}", name, pattern
                        )));
                    }
                    segments.push(Segment::Param(name.to_string()));
                }
                None => segments.push(Segment::Literal(seg.to_string())),
            }
        }

        Ok(Self { raw: normalized, segments })
    }

    /// 正規化済みのパターン文字列
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// プレースホルダ名（左から順）
    pub fn param_names(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Param(name) => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// パスにマッチすればルートパラメータを返す
    ///
    /// セグメント数が一致しない場合はマッチしない。
    /// プレースホルダは空でない任意の値にマッチし、値は `%XY` をデコードして返す。
    pub fn match_path(&self, path: &str) -> Option<HashMap<String, String>> {
        let parts = split_segments(path);
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(lit) if lit == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(_) if part.is_empty() => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), percent_decode_path(part));
                }
            }
        }
        Some(params)
    }
}
