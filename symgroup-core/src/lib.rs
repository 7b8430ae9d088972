//! symgroup シンボルツリーエンジン
//!
//! このクレートは、デバッグエンジンのフラットなシンボルテーブルの上に、
//! 階層名（`local.this.i1.data`）でアドレスできるノードのツリーを構築します。
//! ノードの展開・型キャスト・値の代入・ウォッチ式の追加と、フロントエンド向けの
//! レコード形式へのシリアライズを提供します。

pub mod command;
pub mod dumper;
pub mod errors;
pub mod group;
pub mod node;
pub mod parse;
pub mod path;
pub mod planner;
pub mod visitor;

pub use command::Command;
pub use dumper::{ChildSnapshot, ComplexDumper, ContainerDumper, ContainerKind, NodeSnapshot};
pub use errors::{AssignFailure, ErrorKind, SymbolGroupError};
pub use group::{get_symbol_parameters, BatchOutcome, SymbolGroup, SymbolGroupOptions, DEFAULT_ROOT_NAME};
pub use node::{Node, NodeFlags, NodeId, NodeKind, NodeTree, SymbolData};
pub use planner::ExpansionPlan;
pub use visitor::{DebugVisitor, DumpParameters, DumpVisitor, NodeRecord, NodeVisitor};

// 他のクレートから使用するために再エクスポート
pub use symgroup_engine::{DebugEngine, EngineCall, EngineError, SymbolGroupBackend, ThreadId};

/// シンボルツリー操作の結果型
pub type Result<T> = errors::Result<T>;
