//! パース関連のユーティリティ関数

use anyhow::Result;

/// スレッドIDやフレーム番号などの数値をパース
///
/// 16進数（0xプレフィックス付き）または10進数をサポート
///
/// # Examples
/// ```
/// use symgroup_core::parse::parse_index;
///
/// assert_eq!(parse_index("0x1a").unwrap(), 0x1a);
/// assert_eq!(parse_index("12").unwrap(), 12);
/// ```
pub fn parse_index(s: &str) -> Result<usize> {
    let s = s.trim();

    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        usize::from_str_radix(hex, 16)
            .map_err(|e| anyhow::anyhow!("Invalid hexadecimal number '{}': {}", s, e))
    } else {
        s.parse::<usize>()
            .map_err(|e| anyhow::anyhow!("Invalid number '{}': {}", s, e))
    }
}

/// カンマ区切りのパスリストを分割する（空要素は無視）
///
/// # Examples
/// ```
/// use symgroup_core::parse::parse_path_list;
///
/// assert_eq!(parse_path_list("local.a, local.b"), vec!["local.a", "local.b"]);
/// ```
pub fn parse_path_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}
