//! スクリプト化されたデバッグエンジン
//!
//! メモリ上のフレーム記述からフラットなシンボルテーブルを再現します。
//! 展開時の子要素の挿入とインデックスのずれ、見積もりの子要素数、
//! 呼び出しごとの失敗注入、ハンドルの解放回数の記録をサポートします。

use crate::expr::{ExprSegment, WatchExprParser};
use crate::{
    DebugEngine, EngineCall, EngineError, Result, StackFrame, SymbolFlags, SymbolGroupBackend,
    SymbolParameters, ThreadId,
};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use tracing::{debug, trace};

/// シンボルの記述
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolSpec {
    pub name: String,
    pub type_name: String,
    pub value: String,
    pub read_only: bool,
    /// 未展開時に報告する子要素数の見積もり（None なら実際の子の数）
    pub sub_elements_hint: Option<usize>,
    pub children: Vec<SymbolSpec>,
}

impl SymbolSpec {
    /// 子を持たないシンボルを作成する
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            value: value.into(),
            read_only: false,
            sub_elements_hint: None,
            children: Vec::new(),
        }
    }

    /// 配列シンボルを作成する（子の名前は `[0]`, `[1]`, ...）
    pub fn array(name: impl Into<String>, element_type: &str, values: &[&str]) -> Self {
        let children = values
            .iter()
            .enumerate()
            .map(|(i, v)| SymbolSpec::new(format!("[{}]", i), element_type, *v))
            .collect();
        let type_name = format!("{} [{}]", element_type, values.len());
        let value = format!("0x{:x}", 0x1000 + values.len());
        SymbolSpec::new(name, type_name, value).with_children(children)
    }

    /// 子を設定する
    pub fn with_children(mut self, children: Vec<SymbolSpec>) -> Self {
        self.children = children;
        self
    }

    /// 書き込み不可にする
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// 未展開時の子要素数の見積もりを設定する
    pub fn with_sub_elements_hint(mut self, hint: usize) -> Self {
        self.sub_elements_hint = Some(hint);
        self
    }

    fn child(&self, name: &str) -> Option<&SymbolSpec> {
        self.children.iter().find(|c| c.name == name)
    }
}

/// スタックフレームの記述
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSpec {
    pub function: String,
    pub instruction_offset: u64,
    pub locals: Vec<SymbolSpec>,
}

impl FrameSpec {
    /// フレーム記述を作成する
    pub fn new(function: impl Into<String>, instruction_offset: u64, locals: Vec<SymbolSpec>) -> Self {
        Self {
            function: function.into(),
            instruction_offset,
            locals,
        }
    }
}

/// エンジン全体の共有状態
#[derive(Default)]
struct EngineState {
    threads: BTreeMap<ThreadId, Vec<FrameSpec>>,
    scope: Option<(ThreadId, usize)>,
    failures: HashMap<EngineCall, String>,
    /// 次の1回だけ失敗させる呼び出し
    one_shot: HashMap<EngineCall, String>,
    /// (契機, 対象, 原因): 契機の呼び出しの後で対象を1回だけ失敗させる
    armed: Vec<(EngineCall, EngineCall, String)>,
    calls: Vec<EngineCall>,
    live_groups: usize,
    released_groups: usize,
}

impl EngineState {
    /// 呼び出しを記録し、失敗が注入されていればエラーを返す
    fn enter(&mut self, call: EngineCall) -> Result<()> {
        self.calls.push(call);
        let cause = match self.failures.get(&call) {
            Some(cause) => Some(cause.clone()),
            None => self.one_shot.remove(&call),
        };

        let (fired, waiting): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.armed).into_iter().partition(|(trigger, _, _)| *trigger == call);
        self.armed = waiting;
        for (_, target, message) in fired {
            self.one_shot.insert(target, message);
        }

        match cause {
            Some(cause) => {
                debug!("Injected failure for {}: {}", call, cause);
                Err(EngineError::new(call, cause))
            }
            None => Ok(()),
        }
    }

    /// 現在のスコープのローカル変数
    fn scope_locals(&self) -> Vec<SymbolSpec> {
        let frame = match self.scope {
            Some((thread, frame)) => self.threads.get(&thread).and_then(|f| f.get(frame)),
            None => self.threads.values().next().and_then(|f| f.first()),
        };
        frame.map(|f| f.locals.clone()).unwrap_or_default()
    }
}

/// スクリプト化されたデバッグエンジン
pub struct ScriptedEngine {
    state: Rc<RefCell<EngineState>>,
    parser: Rc<WatchExprParser>,
}

impl ScriptedEngine {
    /// スレッドを持たない空のエンジンを作成する
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            state: Rc::new(RefCell::new(EngineState::default())),
            parser: Rc::new(WatchExprParser::new()?),
        })
    }

    /// スレッドとそのスタック（フレーム0が最内）を追加する
    pub fn add_thread(&mut self, thread: ThreadId, frames: Vec<FrameSpec>) {
        self.state.borrow_mut().threads.insert(thread, frames);
    }

    /// スレッドを追加したエンジンを返す
    pub fn with_thread(mut self, thread: ThreadId, frames: Vec<FrameSpec>) -> Self {
        self.add_thread(thread, frames);
        self
    }

    /// 指定した呼び出しが以後常に失敗するようにする
    pub fn fail_on(&self, call: EngineCall, cause: impl Into<String>) {
        self.state.borrow_mut().failures.insert(call, cause.into());
    }

    /// 指定した呼び出しの次の1回だけを失敗させる
    pub fn fail_once(&self, call: EngineCall, cause: impl Into<String>) {
        self.state.borrow_mut().one_shot.insert(call, cause.into());
    }

    /// `trigger` が呼ばれた直後の `call` を1回だけ失敗させる
    pub fn fail_once_after(&self, trigger: EngineCall, call: EngineCall, cause: impl Into<String>) {
        self.state
            .borrow_mut()
            .armed
            .push((trigger, call, cause.into()));
    }

    /// 注入した失敗を取り消す
    pub fn clear_failure(&self, call: EngineCall) {
        let mut state = self.state.borrow_mut();
        state.failures.remove(&call);
        state.one_shot.remove(&call);
        state.armed.retain(|(_, target, _)| *target != call);
    }

    /// 注入したすべての失敗を取り消す
    pub fn clear_failures(&self) {
        let mut state = self.state.borrow_mut();
        state.failures.clear();
        state.one_shot.clear();
        state.armed.clear();
    }

    /// 指定した呼び出しが行われた回数
    pub fn call_count(&self, call: EngineCall) -> usize {
        self.state.borrow().calls.iter().filter(|c| **c == call).count()
    }

    /// 呼び出し履歴を消去する
    pub fn reset_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    /// 解放されていないシンボルグループの数
    pub fn live_groups(&self) -> usize {
        self.state.borrow().live_groups
    }

    /// 解放されたシンボルグループの数
    pub fn released_groups(&self) -> usize {
        self.state.borrow().released_groups
    }

    /// 現在のスコープ（スレッド, フレーム番号）
    pub fn scope(&self) -> Option<(ThreadId, usize)> {
        self.state.borrow().scope
    }
}

impl DebugEngine for ScriptedEngine {
    type Group = ScriptedGroup;

    fn stack_trace(&mut self, thread: ThreadId, frame_count: usize) -> Result<Vec<StackFrame>> {
        let mut state = self.state.borrow_mut();
        state.enter(EngineCall::GetStackTrace)?;

        let frames = state.threads.get(&thread).ok_or_else(|| {
            EngineError::new(EngineCall::GetStackTrace, format!("Unknown thread {}", thread))
        })?;

        Ok(frames
            .iter()
            .take(frame_count)
            .enumerate()
            .map(|(i, f)| StackFrame {
                thread,
                frame_number: i,
                instruction_offset: f.instruction_offset,
                function: f.function.clone(),
            })
            .collect())
    }

    fn scope_symbol_group(&mut self, reuse: Option<ScriptedGroup>) -> Result<ScriptedGroup> {
        let locals = {
            let mut state = self.state.borrow_mut();
            state.enter(EngineCall::GetScopeSymbolGroup)?;
            state.scope_locals()
        };

        let entries = locals.into_iter().map(|spec| Entry::new(spec, None)).collect();
        match reuse {
            Some(mut group) => {
                trace!("Refreshing symbol group with current scope");
                group.entries = entries;
                Ok(group)
            }
            None => {
                self.state.borrow_mut().live_groups += 1;
                Ok(ScriptedGroup {
                    state: Rc::clone(&self.state),
                    parser: Rc::clone(&self.parser),
                    entries,
                })
            }
        }
    }

    fn set_scope(&mut self, frame: &StackFrame) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.enter(EngineCall::SetScope)?;

        let valid = state
            .threads
            .get(&frame.thread)
            .map(|frames| frame.frame_number < frames.len())
            .unwrap_or(false);
        if !valid {
            return Err(EngineError::new(
                EngineCall::SetScope,
                format!("Invalid frame {} of thread {}", frame.frame_number, frame.thread),
            ));
        }
        state.scope = Some((frame.thread, frame.frame_number));
        Ok(())
    }
}

/// テーブルの1行
#[derive(Debug, Clone)]
struct Entry {
    spec: SymbolSpec,
    name: String,
    type_name: String,
    value: String,
    parent: Option<usize>,
    expanded: bool,
}

impl Entry {
    fn new(spec: SymbolSpec, parent: Option<usize>) -> Self {
        Self {
            name: spec.name.clone(),
            type_name: spec.type_name.clone(),
            value: spec.value.clone(),
            parent,
            expanded: false,
            spec,
        }
    }

    fn parameters(&self) -> SymbolParameters {
        let mut flags = SymbolFlags::empty();
        if self.expanded {
            flags |= SymbolFlags::EXPANDED;
        }
        if self.spec.read_only {
            flags |= SymbolFlags::READ_ONLY;
        }
        if self.type_name.trim_end().ends_with(']') {
            flags |= SymbolFlags::IS_ARRAY;
        }
        if self.parent.is_none() {
            flags |= SymbolFlags::IS_LOCAL;
        }

        let sub_elements = if self.expanded {
            self.spec.children.len()
        } else {
            self.spec.sub_elements_hint.unwrap_or(self.spec.children.len())
        };

        SymbolParameters {
            parent_symbol: self.parent,
            sub_elements,
            flags,
        }
    }
}

/// スクリプト化されたシンボルグループ
///
/// drop されるとエンジンの解放カウンタを更新します。
pub struct ScriptedGroup {
    state: Rc<RefCell<EngineState>>,
    parser: Rc<WatchExprParser>,
    entries: Vec<Entry>,
}

impl ScriptedGroup {
    fn enter(&self, call: EngineCall) -> Result<()> {
        self.state.borrow_mut().enter(call)
    }

    fn entry(&self, call: EngineCall, index: usize) -> Result<&Entry> {
        self.entries.get(index).ok_or_else(|| {
            EngineError::new(
                call,
                format!("Invalid index {} (symbol count {})", index, self.entries.len()),
            )
        })
    }

    fn entry_mut(&mut self, call: EngineCall, index: usize) -> Result<&mut Entry> {
        let count = self.entries.len();
        self.entries.get_mut(index).ok_or_else(|| {
            EngineError::new(call, format!("Invalid index {} (symbol count {})", index, count))
        })
    }

    /// `index` の子孫が連続して並ぶ範囲の終端（排他的）
    fn descendants_end(&self, index: usize) -> usize {
        let mut end = index + 1;
        while end < self.entries.len() {
            let mut ancestor = self.entries[end].parent;
            let mut is_descendant = false;
            while let Some(p) = ancestor {
                if p == index {
                    is_descendant = true;
                    break;
                }
                ancestor = self.entries[p].parent;
            }
            if !is_descendant {
                break;
            }
            end += 1;
        }
        end
    }

    /// `from` 以降の行について、`pivot` より後ろを指す親インデックスをずらす
    fn shift_parents(&mut self, from: usize, pivot: usize, delta: isize) {
        for entry in self.entries.iter_mut().skip(from) {
            if let Some(p) = entry.parent {
                if p > pivot {
                    entry.parent = Some((p as isize + delta) as usize);
                }
            }
        }
    }

    fn resolve_expression(&self, expression: &str) -> Option<SymbolSpec> {
        let expr = self.parser.parse(expression)?;
        let (first, rest) = expr.segments().split_first()?;
        let ExprSegment::Member(name) = first else {
            return None;
        };

        let mut current = &self
            .entries
            .iter()
            .find(|e| e.parent.is_none() && e.name == *name)?
            .spec;
        for segment in rest {
            current = match segment {
                ExprSegment::Member(m) => current.child(m)?,
                ExprSegment::Index(i) => current.child(&format!("[{}]", i))?,
            };
        }
        Some(current.clone())
    }
}

impl SymbolGroupBackend for ScriptedGroup {
    fn symbol_count(&self) -> Result<usize> {
        self.enter(EngineCall::GetNumberSymbols)?;
        Ok(self.entries.len())
    }

    fn symbol_parameters(&self, start: usize, count: usize) -> Result<Vec<SymbolParameters>> {
        self.enter(EngineCall::GetSymbolParameters)?;
        if count == 0 {
            return Ok(Vec::new());
        }
        if start >= self.entries.len() {
            return Err(EngineError::new(
                EngineCall::GetSymbolParameters,
                format!("Start {} beyond symbol count {}", start, self.entries.len()),
            ));
        }
        let end = (start + count).min(self.entries.len());
        Ok(self.entries[start..end].iter().map(Entry::parameters).collect())
    }

    fn expand_symbol(&mut self, index: usize, expand: bool) -> Result<()> {
        self.enter(EngineCall::ExpandSymbol)?;
        let entry = self.entry(EngineCall::ExpandSymbol, index)?;
        if entry.expanded == expand {
            return Ok(());
        }

        if expand {
            let children: Vec<Entry> = entry
                .spec
                .children
                .iter()
                .cloned()
                .map(|spec| Entry::new(spec, Some(index)))
                .collect();
            let inserted = children.len();
            self.entries.splice(index + 1..index + 1, children);
            self.shift_parents(index + 1 + inserted, index, inserted as isize);
            trace!("Expanded symbol {} with {} children", index, inserted);
        } else {
            let end = self.descendants_end(index);
            let removed = end - index - 1;
            self.entries.drain(index + 1..end);
            self.shift_parents(index + 1, index, -(removed as isize));
            trace!("Collapsed symbol {} removing {} symbols", index, removed);
        }
        self.entries[index].expanded = expand;
        Ok(())
    }

    fn symbol_name(&self, index: usize) -> Result<String> {
        self.enter(EngineCall::GetSymbolName)?;
        Ok(self.entry(EngineCall::GetSymbolName, index)?.name.clone())
    }

    fn type_name(&self, index: usize) -> Result<String> {
        self.enter(EngineCall::GetSymbolTypeName)?;
        Ok(self.entry(EngineCall::GetSymbolTypeName, index)?.type_name.clone())
    }

    fn value_text(&self, index: usize) -> Result<String> {
        self.enter(EngineCall::GetSymbolValueText)?;
        Ok(self.entry(EngineCall::GetSymbolValueText, index)?.value.clone())
    }

    fn write_symbol(&mut self, index: usize, value: &str) -> Result<()> {
        self.enter(EngineCall::WriteSymbol)?;
        let entry = self.entry_mut(EngineCall::WriteSymbol, index)?;
        if entry.spec.read_only {
            return Err(EngineError::new(
                EngineCall::WriteSymbol,
                format!("Symbol '{}' is read-only", entry.name),
            ));
        }
        entry.value = value.trim().to_string();
        Ok(())
    }

    fn output_as_type(&mut self, index: usize, type_name: &str) -> Result<()> {
        self.enter(EngineCall::OutputAsType)?;
        if !self.parser.is_type_name(type_name) {
            return Err(EngineError::new(
                EngineCall::OutputAsType,
                format!("Invalid type '{}'", type_name),
            ));
        }
        let entry = self.entry_mut(EngineCall::OutputAsType, index)?;
        if entry.expanded {
            return Err(EngineError::new(
                EngineCall::OutputAsType,
                format!("Symbol '{}' is expanded", entry.name),
            ));
        }
        entry.type_name = type_name.trim().to_string();
        Ok(())
    }

    fn add_symbol(&mut self, expression: &str) -> Result<usize> {
        self.enter(EngineCall::AddSymbol)?;
        let mut spec = self.resolve_expression(expression).ok_or_else(|| {
            EngineError::new(
                EngineCall::AddSymbol,
                format!("Unable to resolve expression '{}'", expression),
            )
        })?;
        spec.name = expression.trim().to_string();
        self.entries.push(Entry::new(spec, None));
        Ok(self.entries.len() - 1)
    }
}

impl Drop for ScriptedGroup {
    fn drop(&mut self) {
        let mut state = self.state.borrow_mut();
        state.live_groups = state.live_groups.saturating_sub(1);
        state.released_groups += 1;
        debug!("Released symbol group ({} live)", state.live_groups);
    }
}
