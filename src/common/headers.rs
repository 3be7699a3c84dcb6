//! 大文字小文字を区別しないヘッダーマップ

use std::collections::HashMap;

/// 1つのヘッダー名に紐づく値（元の表記を保持）
#[derive(Debug, Clone, PartialEq, Eq)]
struct HeaderEntry {
    name: String,
    values: Vec<String>,
}

/// HTTPヘッダーのコレクション
///
/// 内部では小文字化したキーで索引し、シリアライズ時は最初に登録された
/// 名前の表記を使う。`insert` は既存の値を置き換え（後勝ち）、`append` は
/// 別行として値を追加する。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: HashMap<String, HeaderEntry>,
    order: Vec<String>,
}

impl Headers {
    /// 空のヘッダーマップを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 値を設定（同名の既存値は全て置き換える）
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let key = name.to_ascii_lowercase();
        match self.entries.get_mut(&key) {
            Some(entry) => {
                entry.values.clear();
                entry.values.push(value.into());
            }
            None => {
                self.order.push(key.clone());
                self.entries.insert(key, HeaderEntry { name, values: vec![value.into()] });
            }
        }
    }

    /// 値を追加（同名ヘッダーを別行として保持）
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let key = name.to_ascii_lowercase();
        match self.entries.get_mut(&key) {
            Some(entry) => entry.values.push(value.into()),
            None => {
                self.order.push(key.clone());
                self.entries.insert(key, HeaderEntry { name, values: vec![value.into()] });
            }
        }
    }

    /// 最初の値を取得
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .and_then(|entry| entry.values.first())
            .map(String::as_str)
    }

    /// 全ての値を取得
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(|entry| entry.values.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    /// ヘッダーを削除し、値を返す
    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        let key = name.to_ascii_lowercase();
        let removed = self.entries.remove(&key)?;
        self.order.retain(|k| k != &key);
        Some(removed.values)
    }

    /// ヘッダー名の種類数
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 登録順に (名前, 値) を列挙する。複数値は1行ずつ返す
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.order.iter().filter_map(move |key| self.entries.get(key)).flat_map(|entry| {
            entry.values.iter().map(move |v| (entry.name.as_str(), v.as_str()))
        })
    }

    /// (名前, 値) の一覧に変換
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        self.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    /// 受信ヘッダーの取り込み。重複行は後勝ち
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}
