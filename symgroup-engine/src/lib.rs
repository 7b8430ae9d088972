//! symgroup デバッグエンジン境界
//!
//! このクレートは、ネイティブデバッグエンジンのシンボル/スコープ/スタックAPIを
//! 抽象化するトレイトと、テストやCLIで使うスクリプト化されたエンジン実装を提供します。
//! エンジンのシンボルテーブルはインデックスでアドレスされるフラットな列です。

pub mod engine;
pub mod error;
pub mod expr;
pub mod scripted;
pub mod symbol;

pub use engine::{DebugEngine, SymbolGroupBackend};
pub use error::{EngineCall, EngineError};
pub use expr::{ExprSegment, WatchExpr, WatchExprParser};
pub use scripted::{FrameSpec, ScriptedEngine, ScriptedGroup, SymbolSpec};
pub use symbol::{StackFrame, SymbolFlags, SymbolParameters, ThreadId};

/// エンジン呼び出しの結果型
pub type Result<T> = std::result::Result<T, EngineError>;
