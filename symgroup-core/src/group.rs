//! シンボルグループ（シンボルツリー）
//!
//! 1つの（スレッド, スタックフレーム）に対するエンジンのシンボルグループと、
//! 合成ルートから始まる展開済みノードのツリーを保持します。
//! `local.this.i1.data` のようなパスでノードを検索・展開・キャスト・代入・ダンプします。
//!
//! ノードが持つインデックスはこのグループのハンドルに対してのみ有効です。
//! フレームやスレッドが変わったら、グループごと作り直します。

use crate::dumper::ComplexDumper;
use crate::errors::{AssignFailure, Result, SymbolGroupError};
use crate::node::{NodeFlags, NodeId, NodeKind, NodeTree, Node, SymbolData};
use crate::path;
use crate::planner::ExpansionPlan;
use crate::visitor::{self, DebugVisitor, DumpParameters, DumpVisitor, NodeVisitor};
use std::collections::HashSet;
use symgroup_engine::{
    DebugEngine, EngineCall, EngineError, SymbolGroupBackend, SymbolParameters, ThreadId,
};
use tracing::{debug, trace, warn};

/// ルートノードの既定の名前
pub const DEFAULT_ROOT_NAME: &str = "local";

/// シンボルグループの設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolGroupOptions {
    /// ルートノードの名前（パスの先頭セグメント）
    pub root_name: String,
    /// 診断出力の詳細度
    pub verbosity: u32,
}

impl Default for SymbolGroupOptions {
    fn default() -> Self {
        Self {
            root_name: DEFAULT_ROOT_NAME.to_string(),
            verbosity: 0,
        }
    }
}

/// 一括展開の結果
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// 展開を試みたパスの数（祖先を含む）
    pub attempted: usize,
    /// 成功したパスの数
    pub succeeded: usize,
    pub errors: Vec<SymbolGroupError>,
}

impl BatchOutcome {
    /// すべて成功したか
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    /// 失敗したパスのエラーを `", "` で連結したメッセージ
    pub fn error_message(&self) -> Option<String> {
        if self.errors.is_empty() {
            return None;
        }
        Some(
            self.errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        )
    }
}

/// シンボルパラメータを取得する
///
/// 子要素数は見積もりで大きすぎることがあるため、テーブルのシンボル総数で切り詰めます。
/// `count` が 0 ならエンジンを呼ばずに空を返します。
pub fn get_symbol_parameters<B: SymbolGroupBackend + ?Sized>(
    backend: &B,
    start: usize,
    count: usize,
) -> Result<Vec<SymbolParameters>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    let total = backend.symbol_count()?;
    if start >= total {
        return Err(EngineError::new(
            EngineCall::GetSymbolParameters,
            format!("Start parameter {} beyond total {}.", start, total),
        )
        .into());
    }
    let count = count.min(total - start);
    Ok(backend.symbol_parameters(start, count)?)
}

/// シンボルグループ
///
/// エンジンのハンドル `G` を1つだけ所有し、グループが drop されるときに一度だけ解放します。
/// 複数の呼び出し元から同時に変更することは想定していません。
pub struct SymbolGroup<G: SymbolGroupBackend> {
    backend: G,
    tree: NodeTree,
    thread: ThreadId,
    frame: usize,
    options: SymbolGroupOptions,
    dumpers: Vec<Box<dyn ComplexDumper>>,
}

impl<G: SymbolGroupBackend> SymbolGroup<G> {
    /// 指定スレッドのフレームに対するシンボルグループを作成する
    ///
    /// スタックトレースを取得し、ローカル変数のシンボルグループを取得してからスコープを
    /// フレームに設定し、そのフレームを反映するようにシンボルグループを取り直します。
    /// 途中で失敗した場合、取得済みのハンドルはその場で解放されます。
    pub fn create<E>(engine: &mut E, thread: ThreadId, frame: usize, options: SymbolGroupOptions) -> Result<Self>
    where
        E: DebugEngine<Group = G>,
    {
        let frame_count = frame + 1;
        let frames = engine.stack_trace(thread, frame_count)?;
        if frames.len() < frame_count {
            return Err(SymbolGroupError::FrameUnavailable {
                frame,
                obtained: frames.len(),
            });
        }

        let backend = engine.scope_symbol_group(None)?;
        engine.set_scope(&frames[frame])?;
        // 現在のフレームで取り直す
        let backend = engine.scope_symbol_group(Some(backend))?;

        let total = backend.symbol_count()?;
        let parameters = get_symbol_parameters(&backend, 0, total)?;

        let mut tree = NodeTree::new(&options.root_name);
        let root = tree.root();
        tree.add_children(root, 0, &parameters, &backend)?;

        debug!(
            "Created symbol group for thread {} frame {} ({}): {} top-level symbols",
            thread,
            frame,
            frames[frame].function,
            tree.node(root).children().len()
        );

        Ok(Self {
            backend,
            tree,
            thread,
            frame,
            options,
            dumpers: Vec::new(),
        })
    }

    pub fn thread_id(&self) -> ThreadId {
        self.thread
    }

    pub fn frame(&self) -> usize {
        self.frame
    }

    pub fn tree(&self) -> &NodeTree {
        &self.tree
    }

    pub fn root(&self) -> NodeId {
        self.tree.root()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        self.tree.node(id)
    }

    pub fn full_path(&self, id: NodeId) -> String {
        self.tree.full_path(id)
    }

    /// エンジンのハンドルへの参照を取得する
    pub fn backend(&self) -> &G {
        &self.backend
    }

    /// 複合ダンパーを登録する（登録順に実行される）
    pub fn register_dumper(&mut self, dumper: Box<dyn ComplexDumper>) {
        self.dumpers.push(dumper);
    }

    /// パスからノードを検索する
    ///
    /// ルートのパスはそのまま一致させ、それ以外はルートの子から1階層ずつセグメントを
    /// 照合します。各階層は線形探索です（シンボルグループは浅く小さいため）。
    pub fn find(&self, iname: &str) -> Option<NodeId> {
        let found = self.find_impl(iname);
        if self.options.verbosity > 1 {
            trace!("SymbolGroup::find {} -> {:?}", iname, found);
        }
        found
    }

    fn find_impl(&self, iname: &str) -> Option<NodeId> {
        if iname.is_empty() {
            return None;
        }
        let root = self.tree.root();
        if iname == self.tree.node(root).iname() {
            return Some(root);
        }

        let segments = path::split(iname);
        let (first, rest) = segments.split_first()?;
        if *first != self.tree.node(root).iname() {
            return None;
        }

        let mut current = root;
        for segment in rest {
            let parent = self.tree.resolve_reference(current);
            current = *self
                .tree
                .node(parent)
                .children()
                .iter()
                .find(|c| self.tree.node(**c).iname() == *segment)?;
        }
        Some(current)
    }

    /// 展開対象のノードを検索する（参照は実体に解決する）
    fn find_node_for_expansion(&self, iname: &str) -> Result<NodeId> {
        let id = self
            .find(iname)
            .ok_or_else(|| SymbolGroupError::NotFound(iname.to_string()))?;
        let resolved = self.tree.resolve_reference(id);
        if self.tree.node(resolved).is_reference() {
            return Err(SymbolGroupError::WrongKind {
                operation: "expand",
                path: iname.to_string(),
            });
        }
        Ok(resolved)
    }

    /// 1つのノードを展開する（親は表示済みである必要がある。`mkdir` に相当）
    ///
    /// ルートは常に展開済みとして成功します。
    pub fn expand(&mut self, iname: &str) -> Result<()> {
        let id = self.find_node_for_expansion(iname)?;
        if id == self.tree.root() {
            return Ok(());
        }
        self.tree.expand(id, &mut self.backend)?;
        // フロントエンドからの展開要求
        self.tree
            .node_mut(id)
            .clear_flags(NodeFlags::EXPANDED_BY_DUMPER);
        Ok(())
    }

    /// ノードを展開して複合ダンパーを実行する
    pub fn expand_run_complex_dumpers(&mut self, iname: &str) -> Result<()> {
        let id = self.find_node_for_expansion(iname)?;
        if id == self.tree.root() {
            return Ok(());
        }
        self.tree
            .expand_run_complex_dumpers(id, &self.dumpers, &mut self.backend)
    }

    /// パスのリストをすべての祖先を含めて展開する（`mkdir -p` に相当）
    ///
    /// 祖先を深さ順に1回ずつ展開します。あるパスの失敗で残りを中断することはなく、
    /// 成功数とすべてのエラーを返します。
    pub fn expand_list<S: AsRef<str>>(&mut self, inames: &[S]) -> BatchOutcome {
        self.expand_batch(inames, Self::expand)
    }

    /// パスのリストを展開し、それぞれで複合ダンパーを実行する
    pub fn expand_list_run_complex_dumpers<S: AsRef<str>>(&mut self, inames: &[S]) -> BatchOutcome {
        self.expand_batch(inames, Self::expand_run_complex_dumpers)
    }

    fn expand_batch<S, F>(&mut self, inames: &[S], mut expand: F) -> BatchOutcome
    where
        S: AsRef<str>,
        F: FnMut(&mut Self, &str) -> Result<()>,
    {
        let mut outcome = BatchOutcome::default();
        if inames.is_empty() {
            return outcome;
        }

        let plan = ExpansionPlan::new(inames);
        for iname in plan.iter() {
            outcome.attempted += 1;
            match expand(self, iname) {
                Ok(()) => outcome.succeeded += 1,
                Err(e) => {
                    warn!("Failed to expand {}: {}", iname, e);
                    outcome.errors.push(e);
                }
            }
        }
        outcome
    }

    /// 未展開ノードの型をキャストする
    pub fn type_cast(&mut self, iname: &str, desired_type: &str) -> Result<()> {
        let id = self
            .find(iname)
            .ok_or_else(|| SymbolGroupError::NotFound(iname.to_string()))?;
        self.tree.type_cast(id, &mut self.backend, desired_type)
    }

    /// ノードに値を代入する
    pub fn assign(&mut self, iname: &str, value: &str) -> Result<()> {
        let failure = |reason| SymbolGroupError::Assign {
            path: iname.to_string(),
            value: value.to_string(),
            reason,
        };

        let id = self.find(iname).ok_or_else(|| failure(AssignFailure::NoSuchNode))?;
        let index = match self.tree.node(id).kind() {
            NodeKind::Symbol(data) => data.index,
            NodeKind::Root => return Err(failure(AssignFailure::RootNode)),
            NodeKind::Reference(_) => return Err(failure(AssignFailure::InvalidNodeType)),
        };

        self.backend
            .write_symbol(index, value)
            .map_err(|e| failure(AssignFailure::Engine(e)))?;
        debug!("Assigned '{}' to {} (index {})", value, iname, index);
        Ok(())
    }

    /// 名前式（`myarray[1]` など）からトップレベルのシンボルを追加する
    ///
    /// `iname` はルートの子のセグメント名、または `<root>.<segment>` 形式のパスです。
    /// 空なら式からセグメント名を作ります。同じセグメント名のノードが同じ式のウォッチなら
    /// それを返し、別の式のウォッチや通常のシンボルなら WrongKind エラーにします。
    pub fn add_symbol(&mut self, expression: &str, iname: &str) -> Result<NodeId> {
        let root = self.tree.root();
        let segment = if iname.is_empty() {
            expression.trim().replace(path::SEPARATOR, "@")
        } else {
            match path::parent(iname) {
                None => iname.to_string(),
                Some(parent) if parent == self.tree.node(root).iname() => {
                    iname[parent.len() + 1..].to_string()
                }
                Some(parent) => return Err(SymbolGroupError::NotFound(parent.to_string())),
            }
        };

        let expression = expression.trim();
        if let Some(existing) = self
            .tree
            .node(root)
            .children()
            .iter()
            .copied()
            .find(|c| self.tree.node(*c).iname() == segment)
        {
            // 同じ式のウォッチだけを再利用する
            if self.tree.node(existing).watch_expression() == Some(expression) {
                return Ok(existing);
            }
            return Err(SymbolGroupError::WrongKind {
                operation: "addSymbol",
                path: self.tree.full_path(existing),
            });
        }

        let index = self.backend.add_symbol(expression)?;
        let parameters = get_symbol_parameters(&self.backend, index, 1)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                EngineError::new(
                    EngineCall::GetSymbolParameters,
                    format!("No parameters for added symbol {}", index),
                )
            })?;
        let id = self.tree.push_child(
            root,
            expression.to_string(),
            &segment,
            NodeKind::Symbol(SymbolData::new(index, parameters)),
        );
        self.tree.node_mut(id).set_watch_expression(expression);
        debug!("Added symbol '{}' as {} (index {})", expression, self.tree.full_path(id), index);
        Ok(id)
    }

    /// 展開済みノードの子として、別の実体ノードへの参照を追加する
    ///
    /// 参照先は親自身やその祖先であってはなりません。
    pub fn add_reference(&mut self, parent_iname: &str, name: &str, target_iname: &str) -> Result<NodeId> {
        let parent = self
            .find(parent_iname)
            .ok_or_else(|| SymbolGroupError::NotFound(parent_iname.to_string()))?;
        let target = self
            .find(target_iname)
            .ok_or_else(|| SymbolGroupError::NotFound(target_iname.to_string()))?;
        let parent = self.tree.resolve_reference(parent);
        let target = self.tree.resolve_reference(target);

        let parent_node = self.tree.node(parent);
        let wrong_kind = || SymbolGroupError::WrongKind {
            operation: "addReference",
            path: target_iname.to_string(),
        };
        if !parent_node.is_root() && !parent_node.is_shown_expanded() {
            return Err(SymbolGroupError::WrongKind {
                operation: "addReference",
                path: parent_iname.to_string(),
            });
        }
        if self.tree.node(target).as_symbol().is_none() || self.tree.is_ancestor_or_self(target, parent) {
            return Err(wrong_kind());
        }

        let iname = crate::node::iname_from_symbol_name(name);
        Ok(self
            .tree
            .push_child(parent, name.to_string(), &iname, NodeKind::Reference(target)))
    }

    /// トップレベルのノードのうち、パスが含まれるものを未初期化にする
    pub fn mark_uninitialized<S: AsRef<str>>(&mut self, inames: &[S]) {
        if inames.is_empty() {
            return;
        }
        let wanted: HashSet<&str> = inames.iter().map(|s| s.as_ref()).collect();
        let root = self.tree.root();
        let children = self.tree.node(root).children().to_vec();
        for child in children {
            if wanted.contains(self.tree.full_path(child).as_str()) {
                self.tree.node_mut(child).add_flags(NodeFlags::UNINITIALIZED);
            }
        }
    }

    /// ツリー全体を走査する
    pub fn accept<V: NodeVisitor + ?Sized>(&self, visitor: &mut V) -> Result<()> {
        let root = self.tree.root();
        let root_path = self.tree.node(root).iname().to_string();
        visitor::accept_children(&self.tree, &self.backend, root, &root_path, 0, visitor)
    }

    /// ツリー全体をダンプする
    pub fn dump(&self, params: DumpParameters) -> Result<String> {
        let mut visitor = DumpVisitor::new(params);
        self.accept(&mut visitor)?;

        let mut out = String::new();
        if params.human_readable() {
            out.push('\n');
        }
        out.push('[');
        out.push_str(&visitor.into_string());
        out.push(']');
        Ok(out)
    }

    /// ノードを必要なら展開してからダンプする
    ///
    /// 失敗した場合、途中まで組み立てたレコードは返しません。
    pub fn dump_path(&mut self, iname: &str, params: DumpParameters) -> Result<String> {
        let id = self
            .find(iname)
            .ok_or_else(|| SymbolGroupError::NotFound(iname.to_string()))?;
        if id == self.tree.root() {
            return self.dump(params);
        }

        if self.tree.node(id).as_symbol().is_some() {
            if self.tree.node(id).is_expanded() {
                // ウォッチモデルからの展開要求として扱う
                self.tree
                    .node_mut(id)
                    .clear_flags(NodeFlags::EXPANDED_BY_DUMPER);
            } else {
                self.tree.expand(id, &mut self.backend)?;
            }
            if params.complex_dumpers() {
                self.tree
                    .run_complex_dumpers(id, &self.dumpers, &self.backend)?;
            }
        }

        let mut visitor = DumpVisitor::new(params);
        visitor::accept(&self.tree, &self.backend, id, iname, 0, 0, &mut visitor)?;

        let mut out = String::new();
        if params.human_readable() {
            out.push('\n');
        }
        out.push('[');
        out.push_str(&visitor.into_string());
        out.push(']');
        Ok(out)
    }

    /// 診断用の詳細表示（`iname` が空ならツリー全体）
    pub fn debug(&self, iname: &str, verbosity: u32) -> String {
        let mut out = String::from("\n");
        let mut visitor = DebugVisitor::new(verbosity);

        let result = if iname.is_empty() {
            self.accept(&mut visitor)
        } else {
            match self.find(iname) {
                Some(id) => visitor::accept(&self.tree, &self.backend, id, iname, 0, 0, &mut visitor),
                None => Err(SymbolGroupError::NotFound(iname.to_string())),
            }
        };

        out.push_str(&visitor.into_string());
        if let Err(e) = result {
            out.push_str(&e.to_string());
        }
        out
    }
}
