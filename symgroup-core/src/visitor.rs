//! ツリーの走査とシリアライズ
//!
//! 走査はノード自身の子の順序（エンジンが返した順序）で行います。フロントエンドは
//! 繰り返しのダンプ間で位置を対応付けるため、この順序は変えてはいけません。

use crate::errors::Result;
use crate::node::{Node, NodeId, NodeTree};
use crate::path;
use bitflags::bitflags;
use symgroup_engine::SymbolGroupBackend;

bitflags! {
    /// ダンプのオプション
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct DumpParameters: u32 {
        /// 人間向けの改行とインデントを入れる
        const HUMAN_READABLE = 1 << 0;
        /// 複合ダンパーを実行し、その出力を値に追記する
        const COMPLEX_DUMPERS = 1 << 1;
    }
}

impl DumpParameters {
    pub fn human_readable(&self) -> bool {
        self.contains(DumpParameters::HUMAN_READABLE)
    }

    pub fn complex_dumpers(&self) -> bool {
        self.contains(DumpParameters::COMPLEX_DUMPERS)
    }
}

/// 走査中の1ノード分の情報
pub struct NodeRecord<'a> {
    pub id: NodeId,
    pub node: &'a Node,
    /// 参照を解決した実体（実体ノードなら `node` と同じ）
    pub target: &'a Node,
    pub path: &'a str,
    pub type_name: String,
    pub value: String,
    pub child_count: usize,
    /// 子ノードを続けて走査するか
    pub children_shown: bool,
    /// 兄弟の中での位置
    pub child: usize,
    pub depth: usize,
}

/// ノードごとの書式化を行うビジター
pub trait NodeVisitor {
    fn visit(&mut self, record: &NodeRecord<'_>);

    /// ノードの子の走査が終わった後に呼ばれる
    fn children_visited(&mut self, _record: &NodeRecord<'_>) {}
}

/// ノードとその子孫を走査する
pub fn accept<B, V>(
    tree: &NodeTree,
    backend: &B,
    id: NodeId,
    path: &str,
    child: usize,
    depth: usize,
    visitor: &mut V,
) -> Result<()>
where
    B: SymbolGroupBackend + ?Sized,
    V: NodeVisitor + ?Sized,
{
    let mut active = Vec::new();
    accept_node(tree, backend, id, path, child, depth, visitor, &mut active)
}

/// 親の子を順に走査する（親自身は訪問しない）
pub fn accept_children<B, V>(
    tree: &NodeTree,
    backend: &B,
    parent: NodeId,
    parent_path: &str,
    depth: usize,
    visitor: &mut V,
) -> Result<()>
where
    B: SymbolGroupBackend + ?Sized,
    V: NodeVisitor + ?Sized,
{
    let mut active = vec![tree.resolve_reference(parent)];
    walk_children(tree, backend, parent, parent_path, depth, visitor, &mut active)
}

#[allow(clippy::too_many_arguments)]
fn accept_node<B, V>(
    tree: &NodeTree,
    backend: &B,
    id: NodeId,
    path: &str,
    child: usize,
    depth: usize,
    visitor: &mut V,
    active: &mut Vec<NodeId>,
) -> Result<()>
where
    B: SymbolGroupBackend + ?Sized,
    V: NodeVisitor + ?Sized,
{
    let node = tree.node(id);
    let target_id = tree.resolve_reference(id);
    let target = tree.node(target_id);
    let (type_name, value) = tree.read_type_and_value(target_id, backend)?;

    // 参照経由で祖先に戻る場合は子をたどらない
    let cyclic = active.contains(&target_id);
    let child_count = if target.is_shown_expanded() {
        target.children().len()
    } else {
        target.sub_elements()
    };

    let record = NodeRecord {
        id,
        node,
        target,
        path,
        type_name,
        value,
        child_count,
        children_shown: target.is_shown_expanded() && !cyclic,
        child,
        depth,
    };

    visitor.visit(&record);
    if record.children_shown {
        active.push(target_id);
        walk_children(tree, backend, target_id, path, depth + 1, visitor, active)?;
        active.pop();
    }
    visitor.children_visited(&record);
    Ok(())
}

fn walk_children<B, V>(
    tree: &NodeTree,
    backend: &B,
    parent: NodeId,
    parent_path: &str,
    depth: usize,
    visitor: &mut V,
    active: &mut Vec<NodeId>,
) -> Result<()>
where
    B: SymbolGroupBackend + ?Sized,
    V: NodeVisitor + ?Sized,
{
    let parent = tree.resolve_reference(parent);
    for (position, child) in tree.node(parent).children().iter().enumerate() {
        let child_path = path::child(parent_path, tree.node(*child).iname());
        accept_node(tree, backend, *child, &child_path, position, depth, visitor, active)?;
    }
    Ok(())
}

fn push_field(out: &mut String, key: &str, value: &str) {
    out.push_str(key);
    out.push_str("=\"");
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out.push('"');
}

fn flags_text(record: &NodeRecord<'_>) -> String {
    let mut text = (record.node.flags() | record.target.flags()).to_string();
    if record.node.is_reference() {
        if !text.is_empty() {
            text.push('|');
        }
        text.push_str("reference");
    }
    text
}

/// 機械可読のレコード形式で出力するビジター
///
/// 1ノードにつき `{name="..",iname="..",type="..",value="..",numchild="..",flags=".."}` を出力し、
/// 展開済みのノードには `children=[...]` を続けます。
pub struct DumpVisitor {
    out: String,
    params: DumpParameters,
}

impl DumpVisitor {
    pub fn new(params: DumpParameters) -> Self {
        Self {
            out: String::new(),
            params,
        }
    }

    pub fn into_string(self) -> String {
        self.out
    }

    fn indent(&mut self, depth: usize) {
        if self.params.human_readable() {
            self.out.push('\n');
            self.out.push_str(&"  ".repeat(depth));
        }
    }
}

impl NodeVisitor for DumpVisitor {
    fn visit(&mut self, record: &NodeRecord<'_>) {
        if record.child > 0 {
            self.out.push(',');
        }
        self.indent(record.depth);

        let mut value = record.value.clone();
        if self.params.complex_dumpers() {
            if let Some(extra) = record.target.dumper_value() {
                if !value.is_empty() {
                    value.push(' ');
                }
                value.push_str(extra);
            }
        }

        self.out.push('{');
        push_field(&mut self.out, "name", record.node.name());
        self.out.push(',');
        push_field(&mut self.out, "iname", record.path);
        self.out.push(',');
        push_field(&mut self.out, "type", &record.type_name);
        self.out.push(',');
        push_field(&mut self.out, "value", &value);
        self.out.push(',');
        push_field(&mut self.out, "numchild", &record.child_count.to_string());
        self.out.push(',');
        push_field(&mut self.out, "flags", &flags_text(record));
        if record.children_shown {
            self.out.push_str(",children=[");
        }
    }

    fn children_visited(&mut self, record: &NodeRecord<'_>) {
        if record.children_shown {
            if record.child_count > 0 {
                self.indent(record.depth);
            }
            self.out.push(']');
        }
        self.out.push('}');
    }
}

/// 診断用の詳細な1行表示を出力するビジター
pub struct DebugVisitor {
    out: String,
    verbosity: u32,
}

impl DebugVisitor {
    pub fn new(verbosity: u32) -> Self {
        Self {
            out: String::new(),
            verbosity,
        }
    }

    pub fn into_string(self) -> String {
        self.out
    }
}

impl NodeVisitor for DebugVisitor {
    fn visit(&mut self, record: &NodeRecord<'_>) {
        let line = &mut self.out;
        line.push_str(&format!(
            "{}/{} {} \"{}\"",
            record.depth,
            record.child,
            record.path,
            record.node.name()
        ));
        if record.node.is_reference() {
            line.push_str(&format!(" -> \"{}\"", record.target.name()));
        }
        if let Some(index) = record.target.index() {
            line.push_str(&format!(" [{}]", index));
        }
        line.push_str(&format!(
            " {} = {} ({} children)",
            record.type_name, record.value, record.child_count
        ));

        let flags = flags_text(record);
        if !flags.is_empty() {
            line.push_str(&format!(" flags={}", flags));
        }
        if self.verbosity > 0 {
            if let Some(symbol) = record.target.as_symbol() {
                line.push_str(&format!(
                    " sub_elements={} engine_flags={:?}",
                    symbol.parameters.sub_elements, symbol.parameters.flags
                ));
            }
        }
        if self.verbosity > 1 {
            line.push_str(&format!(" id={}", record.id));
            if let Some(extra) = record.target.dumper_value() {
                line.push_str(&format!(" dumper=\"{}\"", extra));
            }
        }
        line.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_field_escapes() {
        let mut out = String::new();
        push_field(&mut out, "value", "say \"hi\"\\\n");
        assert_eq!(out, r#"value="say \"hi\"\\\n""#);
    }

    #[test]
    fn test_dump_parameters() {
        let params = DumpParameters::HUMAN_READABLE;
        assert!(params.human_readable());
        assert!(!params.complex_dumpers());
        assert!(!DumpParameters::default().human_readable());
    }
}
