//! リクエストボディの分類とデコード

use std::io::Read;
use flate2::read::GzDecoder;
use serde_json::{Map, Value};
use crate::error::Error;
use super::utils::parse_query_string;

/// Content-TypeがJSONを示すか（`application/json` を含むか）
pub fn is_json_content_type(ct: &str) -> bool {
    ct.to_ascii_lowercase().contains("application/json")
}

/// Content-TypeがURLエンコードされたフォームを示すか
pub fn is_form_content_type(ct: &str) -> bool {
    ct.to_ascii_lowercase().contains("application/x-www-form-urlencoded")
}

/// JSONとしてパースを試みる
///
/// 先頭の空白以外の文字が `{` か `[` の場合のみパースする。
fn try_parse_json(body: &[u8]) -> Option<Value> {
    let first = body.iter().find(|b| !b.is_ascii_whitespace())?;
    if *first != b'{' && *first != b'[' {
        return None;
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("Malformed JSON body ignored: {}", e);
            None
        }
    }
}

/// ボディをContent-Typeに応じて構造化データに変換する
///
/// 失敗した場合や対象外のContent-Typeでは常に空オブジェクトを返す。
pub fn parse_body(content_type: &str, body: &[u8]) -> Value {
    if body.is_empty() {
        return Value::Object(Map::new());
    }

    if is_json_content_type(content_type) {
        return try_parse_json(body).unwrap_or_else(|| Value::Object(Map::new()));
    }

    if is_form_content_type(content_type) {
        let text = String::from_utf8_lossy(body);
        let map: Map<String, Value> = parse_query_string(&text)
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        return Value::Object(map);
    }

    Value::Object(Map::new())
}

/// gzip圧縮されたボディを解凍する（解凍後のサイズ上限付き）
pub fn decompress_gzip(body: &[u8], max_size: usize) -> Result<Vec<u8>, Error> {
    let decoder = GzDecoder::new(body);
    let mut out = Vec::new();
    decoder
        .take((max_size as u64).saturating_add(1))
        .read_to_end(&mut out)
        .map_err(|e| Error::InvalidRequestBody(format!("Failed to decompress gzip body: {}", e)))?;
    if out.len() > max_size {
        return Err(Error::PayloadTooLarge(format!(
            "Decompressed body exceeds maximum allowed size {} bytes",
            max_size
        )));
    }
    Ok(out)
}
