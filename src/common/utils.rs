//! 共通ユーティリティ関数群（URLエンコード/デコード、クエリ解析、値の検証 等）

use std::collections::HashMap;
use crate::error::Error;

/// URLエンコーディングのデコード関数
///
/// `%XY` を1バイトに、`+` を空白に変換する。16進数として解釈できない
/// エスケープや末尾の不完全な `%` はそのまま残す。
pub fn percent_decode(input: &str) -> String {
    decode_escapes(input, true)
}

/// パスセグメント用のデコード（`+` は変換しない）
pub fn percent_decode_path(input: &str) -> String {
    decode_escapes(input, false)
}

fn decode_escapes(input: &str, plus_as_space: bool) -> String {
    let bytes = input.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(h), Some(l)) = (from_hex(bytes[i + 1]), from_hex(bytes[i + 2])) {
                result.push(h * 16 + l);
                i += 3;
                continue;
            }
        } else if plus_as_space && bytes[i] == b'+' {
            result.push(b' ');
            i += 1;
            continue;
        }
        result.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&result).into_owned()
}

/// 16進数文字をバイト値に変換するヘルパー関数
fn from_hex(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// URLエンコーディング（RFC 3986 の非予約文字以外を `%XY` に変換）
pub fn percent_encode(input: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(input.len());
    for &b in input.as_bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') {
            out.push(b as char);
        } else {
            out.push('%');
            out.push(HEX[(b >> 4) as usize] as char);
            out.push(HEX[(b & 0x0F) as usize] as char);
        }
    }
    out
}

/// クエリ文字列をパースしてURLデコードを行う共通関数
///
/// `=` を含まないペアは捨てる。同じキーが複数回現れた場合は最後の値が残る。
pub fn parse_query_string(query_string: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();

    if query_string.is_empty() {
        return params;
    }

    for pair in query_string.split('&') {
        if let Some((key, value)) = pair.split_once('=') {
            params.insert(percent_decode(key), percent_decode(value));
        }
    }

    params
}

/// キーと値のペアからクエリ文字列を組み立てる（キー順でソート）
pub fn build_query_string(params: &HashMap<String, String>) -> String {
    let mut keys: Vec<&String> = params.keys().collect();
    keys.sort();
    keys.into_iter()
        .map(|k| format!("{}={}", percent_encode(k), percent_encode(&params[k])))
        .collect::<Vec<_>>()
        .join("&")
}

/// パスを正規化（末尾の `/` を除去、ただしルートはそのまま）
pub fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// ヘッダー値に使用可能な文字かを判定（CRLF・制御文字を拒否）
pub fn is_header_value_valid(value: &str) -> bool {
    // タブは許容し、その他の制御文字(0x00-0x1F, 0x7F)とCR/LFを拒否する
    value.chars().all(|c| {
        let code = c as u32;
        c == '\t' || (code >= 0x20 && code != 0x7F)
    })
}

/// ヘッダー名が安全なトークンかを判定
pub fn is_header_name_valid(name: &str) -> bool {
    if name.is_empty() { return false; }
    // token = 1*tchar, tchar = "!#$%&'*+-.^_`|~" or DIGIT or ALPHA
    name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '!'|'#'|'$'|'%'|'&'|'\''|'*'|'+'|'-'|'.'|'^'|'_'|'`'|'|'|'~'))
}

/// Cookie名が安全なトークンか（RFC6265準拠の簡易版）
pub fn is_cookie_name_valid(name: &str) -> bool {
    if name.is_empty() { return false; }
    const FORBIDDEN: &[char] = &['(',')','<','>','@',',',';',':','\\','"','/','[',']','?','{','}','=',' ','\t','\r','\n'];
    name.chars().all(|c| c.is_ascii() && !c.is_ascii_control() && !FORBIDDEN.contains(&c))
}

/// Cookie値が安全か（RFC6265 cookie-octetの簡易版）
/// 許容: 0x21, 0x23-0x2B, 0x2D-0x3A, 0x3C-0x5B, 0x5D-0x7E
pub fn is_cookie_value_valid(value: &str) -> bool {
    value.chars().all(|c| {
        let b = c as u32;
        matches!(b,
            0x21 |
            0x23..=0x2B |
            0x2D..=0x3A |
            0x3C..=0x5B |
            0x5D..=0x7E
        )
    })
}

/// ヘルパー: 無効なヘッダー名/値ならErrorを返す
pub fn validate_header(name: &str, value: &str) -> Result<(), Error> {
    if !is_header_name_valid(name) {
        return Err(Error::InvalidHeader(format!("header name {:?} is not a valid token", name)));
    }
    if !is_header_value_valid(value) {
        return Err(Error::InvalidHeader(format!("value of {} contains control/CRLF characters", name)));
    }
    Ok(())
}

/// ヘルパー: 無効なCookie名/値ならErrorを返す
pub fn validate_cookie_name_value(name: &str, value: &str) -> Result<(), Error> {
    if !is_cookie_name_valid(name) {
        return Err(Error::InvalidCookie("cookie name contains invalid characters".into()));
    }
    if !is_cookie_value_valid(value) {
        return Err(Error::InvalidCookie("cookie value contains invalid characters".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_string() {
        let query = "name=John&age=30&city=Tokyo";
        let params = parse_query_string(query);

        assert_eq!(params.get("name"), Some(&"John".to_string()));
        assert_eq!(params.get("age"), Some(&"30".to_string()));
        assert_eq!(params.get("city"), Some(&"Tokyo".to_string()));
    }

    #[test]
    fn test_parse_query_string_url_encoding() {
        // URLエンコードされたクエリ文字列
        let query = "name=%E3%81%82%E3%81%84%E3%81%86%E3%81%88%E3%81%8A&city=Tokyo%20Station&lang=ja%2Den";
        let params = parse_query_string(query);

        // "あいうえお"（UTF-8でURLエンコード）
        assert_eq!(params.get("name"), Some(&"あいうえお".to_string()));
        assert_eq!(params.get("city"), Some(&"Tokyo Station".to_string()));
        assert_eq!(params.get("lang"), Some(&"ja-en".to_string()));
    }

    #[test]
    fn test_parse_query_string_edge_cases() {
        // `=` のないペアは捨てる
        let params = parse_query_string("flag&a=1&&b=");
        assert_eq!(params.len(), 2);
        assert_eq!(params.get("a"), Some(&"1".to_string()));
        assert_eq!(params.get("b"), Some(&"".to_string()));
        assert!(params.get("flag").is_none());

        // 最初の `=` で分割する
        let params = parse_query_string("expr=a=b");
        assert_eq!(params.get("expr"), Some(&"a=b".to_string()));

        // 重複キーは最後の値
        let params = parse_query_string("k=1&k=2&k=3");
        assert_eq!(params.get("k"), Some(&"3".to_string()));
    }

    #[test]
    fn test_percent_decode() {
        assert_eq!(percent_decode("Hello%20World"), "Hello World");
        assert_eq!(percent_decode("test%2Bvalue"), "test+value");
        assert_eq!(percent_decode("normal"), "normal");
        assert_eq!(percent_decode("plus+space"), "plus space");
        assert_eq!(percent_decode("%E3%81%82%E3%81%84%E3%81%86%E3%81%88%E3%81%8A"), "あいうえお");
    }

    #[test]
    fn test_percent_decode_malformed_passthrough() {
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("abc%4"), "abc%4");
        assert_eq!(percent_decode("%zzok"), "%zzok");
        assert_eq!(percent_decode("%41"), "A");
    }

    #[test]
    fn test_percent_decode_path_keeps_plus() {
        assert_eq!(percent_decode_path("J%C3%BCrgen%20X"), "Jürgen X");
        assert_eq!(percent_decode_path("a+b"), "a+b");
        assert_eq!(percent_decode_path("50%"), "50%");
    }

    #[test]
    fn test_percent_encode_roundtrip() {
        for s in ["hello world", "a&b=c", "100%", "日本語", "~-._", "+plus+"] {
            assert_eq!(percent_decode(&percent_encode(s)), s);
        }
        assert_eq!(percent_encode("a b"), "a%20b");
    }

    #[test]
    fn test_query_string_reencode_roundtrip() {
        let original = parse_query_string("q=rust+lang&page=2&tag=a%26b");
        let rebuilt = parse_query_string(&build_query_string(&original));
        assert_eq!(original, rebuilt);
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("/user/"), "/user");
        assert_eq!(normalize_path("/user//"), "/user");
        assert_eq!(normalize_path("/a/b"), "/a/b");
    }
}
