//! 階層名（iname）の操作
//!
//! パスは `local.this.i1.data` のように区切り文字で連結されたセグメント列です。
//! セグメント数をパスの深さと呼びます。

use std::cmp::Ordering;

/// パスの区切り文字
pub const SEPARATOR: char = '.';

/// パスをセグメントに分割する
pub fn split(path: &str) -> Vec<&str> {
    if path.is_empty() {
        return Vec::new();
    }
    path.split(SEPARATOR).collect()
}

/// セグメントを連結してパスにする
pub fn join<S: AsRef<str>>(segments: &[S]) -> String {
    let mut path = String::new();
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 {
            path.push(SEPARATOR);
        }
        path.push_str(segment.as_ref());
    }
    path
}

/// 親パスの下に子セグメントを連結する
pub fn child(parent: &str, segment: &str) -> String {
    if parent.is_empty() {
        segment.to_string()
    } else {
        format!("{}{}{}", parent, SEPARATOR, segment)
    }
}

/// 親パスを取得する（トップレベルなら None）
pub fn parent(path: &str) -> Option<&str> {
    path.rfind(SEPARATOR).map(|pos| &path[..pos])
}

/// パスの深さ（セグメント数）
pub fn depth(path: &str) -> usize {
    if path.is_empty() {
        0
    } else {
        path.matches(SEPARATOR).count() + 1
    }
}

/// パス自身を含むすべての祖先パスを浅い順に返す
///
/// `a.b.c` に対して `a`, `a.b`, `a.b.c` を返します。
pub fn ancestors(path: &str) -> impl Iterator<Item = &str> {
    path.match_indices(SEPARATOR)
        .map(move |(pos, _)| &path[..pos])
        .chain(std::iter::once(path).filter(|p| !p.is_empty()))
}

/// 深さ付きのパス
///
/// 深さの昇順、同じ深さではパス文字列の辞書順に並びます。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathEntry {
    pub depth: usize,
    pub path: String,
}

impl PathEntry {
    /// パスから作成する
    pub fn new(path: &str) -> Self {
        Self {
            depth: depth(path),
            path: path.to_string(),
        }
    }
}

impl Ord for PathEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.depth
            .cmp(&other.depth)
            .then_with(|| self.path.cmp(&other.path))
    }
}

impl PartialOrd for PathEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_join_round_trip() {
        for path in ["local", "local.this.i1.data", "local.arr.0"] {
            assert_eq!(join(&split(path)), path);
        }
        assert!(split("").is_empty());
        assert_eq!(join::<&str>(&[]), "");
    }

    #[test]
    fn test_parent_and_depth() {
        assert_eq!(parent("local.this.i1"), Some("local.this"));
        assert_eq!(parent("local"), None);
        assert_eq!(depth("local.this.i1"), 3);
        assert_eq!(depth("local"), 1);
        assert_eq!(depth(""), 0);
        assert_eq!(child("local", "x"), "local.x");
        assert_eq!(child("", "x"), "x");
    }

    #[test]
    fn test_ancestors() {
        let all: Vec<_> = ancestors("a.b.c").collect();
        assert_eq!(all, vec!["a", "a.b", "a.b.c"]);
        assert_eq!(ancestors("a").collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(ancestors("").count(), 0);
    }

    #[test]
    fn test_entry_ordering() {
        let mut entries = vec![
            PathEntry::new("a.b.d"),
            PathEntry::new("z"),
            PathEntry::new("a.b"),
            PathEntry::new("a"),
            PathEntry::new("a.b.c"),
        ];
        entries.sort();
        let paths: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["a", "z", "a.b", "a.b.c", "a.b.d"]);
    }
}
