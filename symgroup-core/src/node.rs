//! シンボルツリーのノード
//!
//! ノードはアリーナ（[`NodeTree`]）に格納され、[`NodeId`] で参照されます。
//! 親は子を排他的に所有し、子から親へは ID による非所有の逆参照を持ちます。
//! ノードの完全パスは保持せず、親をたどって毎回組み立てます。

use crate::dumper::{ChildSnapshot, ComplexDumper, NodeSnapshot};
use crate::errors::{SymbolGroupError, Result};
use crate::group::get_symbol_parameters;
use crate::path;
use bitflags::bitflags;
use std::collections::HashSet;
use std::fmt;
use symgroup_engine::{EngineCall, EngineError, SymbolGroupBackend, SymbolParameters};
use tracing::{debug, trace};

/// ノードID（アリーナ内の位置）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

bitflags! {
    /// ノードの状態フラグ
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct NodeFlags: u8 {
        /// 子ノードを取得済み
        const EXPANDED = 1 << 0;
        /// 複合ダンパーのためだけに展開された
        const EXPANDED_BY_DUMPER = 1 << 1;
        /// 未初期化（表示用のヒント）
        const UNINITIALIZED = 1 << 2;
    }
}

impl fmt::Display for NodeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, flag) in [
            ("expanded", NodeFlags::EXPANDED),
            ("dumper", NodeFlags::EXPANDED_BY_DUMPER),
            ("uninitialized", NodeFlags::UNINITIALIZED),
        ] {
            if self.contains(flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// エンジンのシンボルに対応するデータ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolData {
    /// 現在のシンボルテーブル内のインデックス
    pub index: usize,
    pub parameters: SymbolParameters,
    /// エンジン側で展開済みで、後続ノードのインデックスをずらし終えている
    pub engine_expanded: bool,
}

impl SymbolData {
    /// エンジン側では未展開のシンボル
    pub fn new(index: usize, parameters: SymbolParameters) -> Self {
        Self {
            index,
            parameters,
            engine_expanded: false,
        }
    }
}

/// ノードの種類
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// 合成されたルート（エンジンのインデックスを持たない）
    Root,
    /// エンジンのシンボル
    Symbol(SymbolData),
    /// 別のノードへの参照（所有しない）
    Reference(NodeId),
}

/// ツリーのノード
#[derive(Debug, Clone)]
pub struct Node {
    name: String,
    iname: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    flags: NodeFlags,
    kind: NodeKind,
    dumper_value: Option<String>,
    /// ウォッチとして追加されたときの名前式
    watch_expression: Option<String>,
}

impl Node {
    /// 表示名
    pub fn name(&self) -> &str {
        &self.name
    }

    /// パスのセグメント名
    pub fn iname(&self) -> &str {
        &self.iname
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn flags(&self) -> NodeFlags {
        self.flags
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// 複合ダンパーの出力
    pub fn dumper_value(&self) -> Option<&str> {
        self.dumper_value.as_deref()
    }

    /// ウォッチとして追加されたノードなら、その名前式
    pub fn watch_expression(&self) -> Option<&str> {
        self.watch_expression.as_deref()
    }

    pub(crate) fn set_watch_expression(&mut self, expression: &str) {
        self.watch_expression = Some(expression.to_string());
    }

    pub fn as_symbol(&self) -> Option<&SymbolData> {
        match &self.kind {
            NodeKind::Symbol(data) => Some(data),
            _ => None,
        }
    }

    /// シンボルテーブル内のインデックス（ルートと参照は None）
    pub fn index(&self) -> Option<usize> {
        self.as_symbol().map(|s| s.index)
    }

    pub fn is_root(&self) -> bool {
        matches!(self.kind, NodeKind::Root)
    }

    pub fn is_reference(&self) -> bool {
        matches!(self.kind, NodeKind::Reference(_))
    }

    pub fn is_expanded(&self) -> bool {
        self.flags.contains(NodeFlags::EXPANDED)
    }

    /// フロントエンドから見て展開されているか
    ///
    /// ダンパーのためだけに展開されたノードは折りたたまれているものとして扱います。
    pub fn is_shown_expanded(&self) -> bool {
        self.is_expanded() && !self.flags.contains(NodeFlags::EXPANDED_BY_DUMPER)
    }

    /// エンジンが報告した子要素数（未展開なら見積もり）
    pub fn sub_elements(&self) -> usize {
        self.as_symbol()
            .map(|s| s.parameters.sub_elements)
            .unwrap_or(self.children.len())
    }

    /// 子要素を持ち、まだ展開されていないか
    pub fn can_expand(&self) -> bool {
        match &self.kind {
            NodeKind::Symbol(data) => !self.is_expanded() && data.parameters.has_sub_elements(),
            _ => false,
        }
    }

    pub fn add_flags(&mut self, flags: NodeFlags) {
        self.flags.insert(flags);
    }

    pub fn clear_flags(&mut self, flags: NodeFlags) {
        self.flags.remove(flags);
    }
}

/// エンジンのシンボル名からパスのセグメント名を作る
///
/// 配列要素 `[3]` は `3` に、名前に含まれる区切り文字は `@` に置き換えます。
pub fn iname_from_symbol_name(name: &str) -> String {
    let name = name.trim();
    let name = match name.strip_prefix('[').and_then(|n| n.strip_suffix(']')) {
        Some(inner) if !inner.is_empty() => inner,
        _ => name,
    };
    if name.is_empty() {
        return "<unnamed>".to_string();
    }
    name.replace(path::SEPARATOR, "@")
}

/// ノードのアリーナ
///
/// ノードは削除されず、ツリー全体と一緒に破棄されます。
#[derive(Debug, Clone)]
pub struct NodeTree {
    nodes: Vec<Node>,
}

impl NodeTree {
    /// ルートだけを持つツリーを作成する
    pub fn new(root_name: &str) -> Self {
        let root = Node {
            name: root_name.to_string(),
            iname: root_name.to_string(),
            parent: None,
            children: Vec::new(),
            flags: NodeFlags::empty(),
            kind: NodeKind::Root,
            dumper_value: None,
            watch_expression: None,
        };
        Self { nodes: vec![root] }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// ノード数（ルートを含む）
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// ノードの完全パスを組み立てる
    pub fn full_path(&self, id: NodeId) -> String {
        let mut segments = Vec::new();
        let mut current = Some(id);
        while let Some(c) = current {
            let node = self.node(c);
            segments.push(node.iname());
            current = node.parent;
        }
        segments.reverse();
        path::join(&segments)
    }

    /// 参照をたどって実体のノードを返す（実体ならそのまま）
    pub fn resolve_reference(&self, id: NodeId) -> NodeId {
        let mut current = id;
        // 参照先は実体に限られるが、念のため回数を制限する
        for _ in 0..self.nodes.len() {
            match self.node(current).kind {
                NodeKind::Reference(target) => current = target,
                _ => return current,
            }
        }
        current
    }

    /// `ancestor` が `id` 自身またはその祖先か
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(c) = current {
            if c == ancestor {
                return true;
            }
            current = self.node(c).parent;
        }
        false
    }

    /// 兄弟間で重複しないセグメント名を作る（`x`, `x#2`, `x#3`, ...）
    pub fn unique_iname(&self, parent: NodeId, candidate: &str) -> String {
        let taken: HashSet<&str> = self
            .node(parent)
            .children
            .iter()
            .map(|c| self.node(*c).iname())
            .collect();
        if !taken.contains(candidate) {
            return candidate.to_string();
        }
        (2..)
            .map(|k| format!("{}#{}", candidate, k))
            .find(|name| !taken.contains(name.as_str()))
            .unwrap_or_else(|| candidate.to_string())
    }

    /// 親の子として、名前の重複を解決した上でノードを追加する
    pub(crate) fn push_child(
        &mut self,
        parent: NodeId,
        name: String,
        iname: &str,
        kind: NodeKind,
    ) -> NodeId {
        let iname = self.unique_iname(parent, iname);
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            name,
            iname,
            parent: Some(parent),
            children: Vec::new(),
            flags: NodeFlags::empty(),
            kind,
            dumper_value: None,
            watch_expression: None,
        });
        self.node_mut(parent).children.push(id);
        id
    }

    /// 取得したシンボルパラメータから子ノードを受け取った順に作成し、親を展開済みにする
    ///
    /// `start` は最初のパラメータのテーブル内インデックスです。トップレベル以外の
    /// パラメータ（既に展開済みのシンボルの子）は位置を数えるだけで、ノードにはしません。
    pub fn add_children<B: SymbolGroupBackend + ?Sized>(
        &mut self,
        parent: NodeId,
        start: usize,
        parameters: &[SymbolParameters],
        backend: &B,
    ) -> Result<()> {
        let direct_parent = self.node(parent).index();

        // 名前の取得に失敗してもツリーを中途半端にしないよう、先にすべて取得する
        let mut pending = Vec::with_capacity(parameters.len());
        for (offset, params) in parameters.iter().enumerate() {
            if params.parent_symbol != direct_parent {
                continue;
            }
            let index = start + offset;
            let name = backend.symbol_name(index)?;
            pending.push((index, name, params.clone()));
        }

        for (index, name, params) in pending {
            let iname = iname_from_symbol_name(&name);
            self.push_child(
                parent,
                name,
                &iname,
                NodeKind::Symbol(SymbolData::new(index, params)),
            );
        }
        self.node_mut(parent).add_flags(NodeFlags::EXPANDED);
        Ok(())
    }

    /// `after` より後ろのインデックスを持つシンボルノードを `delta` だけずらす
    fn shift_indices(&mut self, after: usize, delta: usize) {
        if delta == 0 {
            return;
        }
        for node in &mut self.nodes {
            if let NodeKind::Symbol(data) = &mut node.kind {
                if data.index > after {
                    data.index += delta;
                }
            }
        }
    }

    /// ノードを展開する
    ///
    /// 展開済みなら何もしません。エンジンが挿入した子要素の数は、展開後に読み直した
    /// このシンボル自身のパラメータから取ります。後続ノードのインデックスは
    /// `engine_expanded` を立てるのと同時に一度だけずらすので、以降のどの呼び出しが
    /// 失敗しても、同じノードの展開を再試行できます。
    pub fn expand<B: SymbolGroupBackend + ?Sized>(&mut self, id: NodeId, backend: &mut B) -> Result<()> {
        let node = self.node(id);
        if node.is_expanded() {
            return Ok(());
        }
        let data = match &node.kind {
            NodeKind::Symbol(data) => data.clone(),
            NodeKind::Root => {
                self.node_mut(id).add_flags(NodeFlags::EXPANDED);
                return Ok(());
            }
            NodeKind::Reference(_) => {
                return Err(SymbolGroupError::WrongKind {
                    operation: "expand",
                    path: self.full_path(id),
                })
            }
        };

        if !data.engine_expanded && !data.parameters.has_sub_elements() {
            self.node_mut(id).add_flags(NodeFlags::EXPANDED);
            return Ok(());
        }

        let index = data.index;
        let hint = data.parameters.sub_elements;
        let parameters = if data.engine_expanded {
            data.parameters
        } else {
            // 既に展開済みのシンボルに対する再展開はエンジン側で何もしない
            backend.expand_symbol(index, true)?;
            let refreshed = get_symbol_parameters(backend, index, 1)?
                .into_iter()
                .next()
                .ok_or_else(|| {
                    EngineError::new(
                        EngineCall::GetSymbolParameters,
                        format!("No parameters for expanded symbol {}", index),
                    )
                })?;
            let inserted = if refreshed.is_expanded() {
                refreshed.sub_elements
            } else {
                0
            };
            self.shift_indices(index, inserted);
            if let NodeKind::Symbol(data) = &mut self.node_mut(id).kind {
                data.parameters = refreshed.clone();
                data.engine_expanded = true;
            }
            refreshed
        };

        let children = get_symbol_parameters(backend, index + 1, parameters.sub_elements)?;
        trace!(
            "Expanding {} at index {}: hint {}, fetched {}",
            self.full_path(id),
            index,
            hint,
            children.len()
        );

        self.add_children(id, index + 1, &children, backend)?;
        debug!("Expanded {} ({} children)", self.full_path(id), self.node(id).children.len());
        Ok(())
    }

    /// 未展開ノードの型を再解釈する
    pub fn type_cast<B: SymbolGroupBackend + ?Sized>(
        &mut self,
        id: NodeId,
        backend: &mut B,
        desired_type: &str,
    ) -> Result<()> {
        let node = self.node(id);
        let index = match &node.kind {
            NodeKind::Symbol(data) => data.index,
            NodeKind::Root => return Err(SymbolGroupError::RootNode { operation: "cast" }),
            NodeKind::Reference(_) => {
                return Err(SymbolGroupError::WrongKind {
                    operation: "typeCast",
                    path: self.full_path(id),
                })
            }
        };
        let engine_expanded = node.as_symbol().is_some_and(|d| d.engine_expanded);
        if node.is_expanded() || engine_expanded {
            return Err(SymbolGroupError::AlreadyExpanded(self.full_path(id)));
        }

        backend.output_as_type(index, desired_type)?;
        // 型が変わると子要素数も変わりうる
        if let Some(params) = get_symbol_parameters(backend, index, 1)?.into_iter().next() {
            if let NodeKind::Symbol(data) = &mut self.node_mut(id).kind {
                data.parameters = params;
            }
        }
        Ok(())
    }

    /// ダンパーに渡すスナップショットを作る
    pub fn snapshot<B: SymbolGroupBackend + ?Sized>(&self, id: NodeId, backend: &B) -> Result<NodeSnapshot> {
        let target = self.resolve_reference(id);
        let node = self.node(target);
        let (type_name, value) = self.read_type_and_value(target, backend)?;

        let mut children = Vec::with_capacity(node.children.len());
        for child in &node.children {
            let (type_name, value) = self.read_type_and_value(self.resolve_reference(*child), backend)?;
            children.push(ChildSnapshot {
                iname: self.node(*child).iname().to_string(),
                type_name,
                value,
            });
        }

        Ok(NodeSnapshot {
            iname: node.iname().to_string(),
            type_name,
            value,
            children,
        })
    }

    /// ノードの型名と値をエンジンから読む（ルートは空）
    pub fn read_type_and_value<B: SymbolGroupBackend + ?Sized>(
        &self,
        id: NodeId,
        backend: &B,
    ) -> Result<(String, String)> {
        match self.node(id).index() {
            Some(index) => Ok((backend.type_name(index)?, backend.value_text(index)?)),
            None => Ok((String::new(), String::new())),
        }
    }

    /// 展開済みノードに対して複合ダンパーを実行し、出力を表示用に保持する
    pub fn run_complex_dumpers<B: SymbolGroupBackend + ?Sized>(
        &mut self,
        id: NodeId,
        dumpers: &[Box<dyn ComplexDumper>],
        backend: &B,
    ) -> Result<()> {
        let target = self.resolve_reference(id);
        if !self.node(target).is_expanded() || dumpers.is_empty() || self.node(target).is_root() {
            return Ok(());
        }

        let snapshot = self.snapshot(target, backend)?;
        let outputs: Vec<String> = dumpers
            .iter()
            .filter_map(|d| {
                let out = d.dump(&snapshot);
                if out.is_some() {
                    trace!("Dumper '{}' matched {}", d.name(), snapshot.iname);
                }
                out
            })
            .collect();
        self.node_mut(target).dumper_value = if outputs.is_empty() {
            None
        } else {
            Some(outputs.join(" "))
        };
        Ok(())
    }

    /// ノードを展開してから複合ダンパーを実行する
    ///
    /// この呼び出しで初めて展開されたノードには `EXPANDED_BY_DUMPER` を付けます。
    pub fn expand_run_complex_dumpers<B: SymbolGroupBackend + ?Sized>(
        &mut self,
        id: NodeId,
        dumpers: &[Box<dyn ComplexDumper>],
        backend: &mut B,
    ) -> Result<()> {
        if !self.node(id).is_expanded() {
            self.expand(id, backend)?;
            self.node_mut(id).add_flags(NodeFlags::EXPANDED_BY_DUMPER);
        }
        self.run_complex_dumpers(id, dumpers, backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use symgroup_engine::SymbolFlags;

    fn params(sub_elements: usize) -> SymbolParameters {
        SymbolParameters {
            parent_symbol: None,
            sub_elements,
            flags: SymbolFlags::empty(),
        }
    }

    fn symbol(tree: &mut NodeTree, parent: NodeId, name: &str, index: usize, sub: usize) -> NodeId {
        tree.push_child(
            parent,
            name.to_string(),
            &iname_from_symbol_name(name),
            NodeKind::Symbol(SymbolData::new(index, params(sub))),
        )
    }

    #[test]
    fn test_iname_from_symbol_name() {
        assert_eq!(iname_from_symbol_name("[2]"), "2");
        assert_eq!(iname_from_symbol_name("this"), "this");
        assert_eq!(iname_from_symbol_name("a.b"), "a@b");
        assert_eq!(iname_from_symbol_name("[]"), "[]");
        assert_eq!(iname_from_symbol_name(""), "<unnamed>");
    }

    #[test]
    fn test_full_path_is_derived() {
        let mut tree = NodeTree::new("local");
        let root = tree.root();
        let this = symbol(&mut tree, root, "this", 0, 1);
        let i1 = symbol(&mut tree, this, "i1", 1, 0);
        assert_eq!(tree.full_path(root), "local");
        assert_eq!(tree.full_path(i1), "local.this.i1");
        assert_eq!(tree.node(i1).parent(), Some(this));
    }

    #[test]
    fn test_sibling_inames_unique() {
        let mut tree = NodeTree::new("local");
        let root = tree.root();
        let a = symbol(&mut tree, root, "x", 0, 0);
        let b = symbol(&mut tree, root, "x", 1, 0);
        let c = symbol(&mut tree, root, "x", 2, 0);
        assert_eq!(tree.node(a).iname(), "x");
        assert_eq!(tree.node(b).iname(), "x#2");
        assert_eq!(tree.node(c).iname(), "x#3");
        assert_eq!(tree.node(b).name(), "x");
    }

    #[test]
    fn test_can_expand() {
        let mut tree = NodeTree::new("local");
        let root = tree.root();
        let leaf = symbol(&mut tree, root, "x", 0, 0);
        let arr = symbol(&mut tree, root, "arr", 1, 3);
        assert!(!tree.node(leaf).can_expand());
        assert!(tree.node(arr).can_expand());
        assert!(!tree.node(root).can_expand());
        tree.node_mut(arr).add_flags(NodeFlags::EXPANDED);
        assert!(!tree.node(arr).can_expand());
    }

    #[test]
    fn test_resolve_reference() {
        let mut tree = NodeTree::new("local");
        let root = tree.root();
        let x = symbol(&mut tree, root, "x", 0, 0);
        let alias = tree.push_child(root, "alias".into(), "alias", NodeKind::Reference(x));
        assert_eq!(tree.resolve_reference(alias), x);
        assert_eq!(tree.resolve_reference(x), x);
        assert!(tree.node(alias).is_reference());
        assert!(!tree.node(alias).can_expand());
    }

    #[test]
    fn test_flags_display() {
        assert_eq!(NodeFlags::empty().to_string(), "");
        assert_eq!(
            (NodeFlags::EXPANDED | NodeFlags::UNINITIALIZED).to_string(),
            "expanded|uninitialized"
        );
    }
}
