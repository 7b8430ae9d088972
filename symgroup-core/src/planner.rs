//! 展開計画
//!
//! 任意のパス集合から、すべてのパスとその祖先を展開するための順序付きリストを作ります
//! （`mkdir -p` と同じ考え方）。`local.this.i1.data,local.this.i2` は
//! `local, local.this, local.this.i1, local.this.i2, local.this.i1.data` になります。

use crate::path::{self, PathEntry};
use std::collections::BTreeSet;

/// 重複を除いた深さ順の展開計画
#[derive(Debug, Clone, Default)]
pub struct ExpansionPlan {
    entries: BTreeSet<PathEntry>,
}

impl ExpansionPlan {
    /// パス集合から計画を作成する
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries = BTreeSet::new();
        for p in paths {
            for ancestor in path::ancestors(p.as_ref()) {
                entries.insert(PathEntry::new(ancestor));
            }
        }
        Self { entries }
    }

    /// 展開するパスを順に返す
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.path.as_str())
    }

    /// 計画に含まれるパスの数
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ancestor_closure_ordered() {
        let plan = ExpansionPlan::new(["local.this.i1.data", "local.this.i2"]);
        let order: Vec<_> = plan.iter().collect();
        assert_eq!(
            order,
            vec![
                "local",
                "local.this",
                "local.this.i1",
                "local.this.i2",
                "local.this.i1.data",
            ]
        );
    }

    #[test]
    fn test_shared_prefixes_once() {
        let plan = ExpansionPlan::new(["a.b.c", "a.b.d", "a.b.c"]);
        let order: Vec<_> = plan.iter().collect();
        assert_eq!(order, vec!["a", "a.b", "a.b.c", "a.b.d"]);
    }

    #[test]
    fn test_out_of_order_input_is_deterministic() {
        let forward = ExpansionPlan::new(["x.y", "a.b", "a"]);
        let backward = ExpansionPlan::new(["a", "a.b", "x.y"]);
        assert_eq!(
            forward.iter().collect::<Vec<_>>(),
            backward.iter().collect::<Vec<_>>()
        );
        assert_eq!(forward.len(), 4);
    }

    #[test]
    fn test_empty() {
        let plan = ExpansionPlan::new(Vec::<String>::new());
        assert!(plan.is_empty());
    }
}
