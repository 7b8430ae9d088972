//! ウォッチ式のパース
//!
//! `name`、`name[3]`、`a.b[2].c` の形式をサポートします。

use regex::Regex;

/// ウォッチ式の1要素
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprSegment {
    /// メンバまたは変数名
    Member(String),
    /// 配列添字
    Index(usize),
}

/// パース済みウォッチ式
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchExpr {
    segments: Vec<ExprSegment>,
}

impl WatchExpr {
    /// 式の要素を取得する
    pub fn segments(&self) -> &[ExprSegment] {
        &self.segments
    }
}

/// ウォッチ式パーサ
pub struct WatchExprParser {
    /// 式全体の形式
    expr_pattern: Regex,
    /// 添字またはメンバ名
    token_pattern: Regex,
    /// 型名として受け付ける文字列
    type_pattern: Regex,
}

impl WatchExprParser {
    /// パーサを作成する
    pub fn new() -> anyhow::Result<Self> {
        let expr_pattern = Regex::new(r"^[A-Za-z_]\w*(?:\[\d+\]|\.[A-Za-z_]\w*)*$")?;
        let token_pattern = Regex::new(r"\[(\d+)\]|([A-Za-z_]\w*)")?;
        let type_pattern = Regex::new(r"^[A-Za-z_][\w:<>,\s\*&]*(?:\[\d*\])*$")?;

        Ok(Self {
            expr_pattern,
            token_pattern,
            type_pattern,
        })
    }

    /// 式をパースする
    ///
    /// # Examples
    /// ```
    /// use symgroup_engine::{ExprSegment, WatchExprParser};
    ///
    /// let parser = WatchExprParser::new().unwrap();
    /// let expr = parser.parse("arr[1]").unwrap();
    /// assert_eq!(expr.segments()[1], ExprSegment::Index(1));
    /// ```
    pub fn parse(&self, text: &str) -> Option<WatchExpr> {
        let text = text.trim();
        if !self.expr_pattern.is_match(text) {
            return None;
        }

        let mut segments = Vec::new();
        for caps in self.token_pattern.captures_iter(text) {
            if let Some(index) = caps.get(1) {
                segments.push(ExprSegment::Index(index.as_str().parse().ok()?));
            } else if let Some(name) = caps.get(2) {
                segments.push(ExprSegment::Member(name.as_str().to_string()));
            }
        }
        Some(WatchExpr { segments })
    }

    /// 型名として妥当かどうか
    pub fn is_type_name(&self, text: &str) -> bool {
        self.type_pattern.is_match(text.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_name() {
        let parser = WatchExprParser::new().unwrap();
        let expr = parser.parse("counter").unwrap();
        assert_eq!(expr.segments(), &[ExprSegment::Member("counter".into())]);
    }

    #[test]
    fn test_parse_nested() {
        let parser = WatchExprParser::new().unwrap();
        let expr = parser.parse("this.items[2].data").unwrap();
        assert_eq!(
            expr.segments(),
            &[
                ExprSegment::Member("this".into()),
                ExprSegment::Member("items".into()),
                ExprSegment::Index(2),
                ExprSegment::Member("data".into()),
            ]
        );
    }

    #[test]
    fn test_parse_invalid() {
        let parser = WatchExprParser::new().unwrap();
        assert!(parser.parse("").is_none());
        assert!(parser.parse("1abc").is_none());
        assert!(parser.parse("a[").is_none());
        assert!(parser.parse("a..b").is_none());
        assert!(parser.parse("a + b").is_none());
    }

    #[test]
    fn test_type_names() {
        let parser = WatchExprParser::new().unwrap();
        assert!(parser.is_type_name("int"));
        assert!(parser.is_type_name("QList<int> *"));
        assert!(parser.is_type_name("std::map<int, char>"));
        assert!(parser.is_type_name("char [16]"));
        assert!(!parser.is_type_name(""));
        assert!(!parser.is_type_name("42"));
        assert!(!parser.is_type_name("int;"));
    }
}
