//! デバッグエンジンのトレイト
//!
//! 実際のデバッグエンジン（リモートの場合もある）はどの呼び出しでも失敗しうるため、
//! すべてのメソッドが [`crate::Result`] を返します。再試行は呼び出し側の責任です。

use crate::{Result, StackFrame, SymbolParameters, ThreadId};

/// デバッグエンジン（制御とシンボルスコープ）
pub trait DebugEngine {
    /// シンボルグループのハンドル型
    ///
    /// ハンドルは所有される値であり、drop された時点でエンジン側の資源を解放します。
    type Group: SymbolGroupBackend;

    /// 指定スレッドのスタックトレースを最大 `frame_count` フレーム取得する
    fn stack_trace(&mut self, thread: ThreadId, frame_count: usize) -> Result<Vec<StackFrame>>;

    /// 現在のスコープのローカル変数シンボルグループを取得する
    ///
    /// `reuse` に既存のハンドルを渡すと、そのハンドルを現在のスコープで再構築して返します。
    fn scope_symbol_group(&mut self, reuse: Option<Self::Group>) -> Result<Self::Group>;

    /// 現在のスコープを指定フレームに設定する
    fn set_scope(&mut self, frame: &StackFrame) -> Result<()>;
}

/// シンボルグループ（フラットなシンボルテーブル）へのハンドル
///
/// シンボル `i` を展開すると、その子要素がインデックス `i+1` 以降に挿入され、
/// 後続のシンボルのインデックスは子要素の数だけずれます。
pub trait SymbolGroupBackend {
    /// テーブル内のシンボル総数
    fn symbol_count(&self) -> Result<usize>;

    /// `start` から `count` 個のシンボルパラメータを取得する
    fn symbol_parameters(&self, start: usize, count: usize) -> Result<Vec<SymbolParameters>>;

    /// シンボルを展開（`expand == false` なら折りたたみ）する
    fn expand_symbol(&mut self, index: usize, expand: bool) -> Result<()>;

    /// シンボル名を取得する
    fn symbol_name(&self, index: usize) -> Result<String>;

    /// 型名を取得する
    fn type_name(&self, index: usize) -> Result<String>;

    /// 値のテキスト表現を取得する
    fn value_text(&self, index: usize) -> Result<String>;

    /// 値を書き込む
    fn write_symbol(&mut self, index: usize, value: &str) -> Result<()>;

    /// シンボルの静的型を再解釈する
    fn output_as_type(&mut self, index: usize, type_name: &str) -> Result<()>;

    /// 名前式からシンボルを末尾に追加し、そのインデックスを返す
    fn add_symbol(&mut self, expression: &str) -> Result<usize>;
}
