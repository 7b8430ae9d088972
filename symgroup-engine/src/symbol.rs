//! シンボルテーブルのレコード型

use bitflags::bitflags;

/// スレッドID
pub type ThreadId = u32;

bitflags! {
    /// エンジンが報告するシンボルのフラグ
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct SymbolFlags: u32 {
        /// 子要素がテーブルに展開済み
        const EXPANDED = 1 << 0;
        /// 値の書き込み不可
        const READ_ONLY = 1 << 1;
        /// 配列
        const IS_ARRAY = 1 << 2;
        /// 関数引数
        const IS_ARGUMENT = 1 << 3;
        /// ローカル変数
        const IS_LOCAL = 1 << 4;
    }
}

/// 1シンボル分のパラメータ
///
/// `sub_elements` は未展開のシンボルでは見積もり値であり、実際の子の数より
/// 大きいことがあります。正確な値はテーブル全体のシンボル数と突き合わせて使います。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolParameters {
    /// 親シンボルのインデックス（トップレベルは None）
    pub parent_symbol: Option<usize>,
    /// 子要素の数
    pub sub_elements: usize,
    pub flags: SymbolFlags,
}

impl SymbolParameters {
    /// 子要素を持つかどうか
    pub fn has_sub_elements(&self) -> bool {
        self.sub_elements > 0
    }

    /// 展開済みかどうか
    pub fn is_expanded(&self) -> bool {
        self.flags.contains(SymbolFlags::EXPANDED)
    }
}

/// スタックフレーム
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub thread: ThreadId,
    /// フレーム番号（0 が最内）
    pub frame_number: usize,
    pub instruction_offset: u64,
    pub function: String,
}
