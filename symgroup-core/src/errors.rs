//! シンボルツリー操作のエラー

use std::fmt;
use symgroup_engine::EngineError;
use thiserror::Error;

/// シンボルツリー操作の結果型
pub type Result<T> = std::result::Result<T, SymbolGroupError>;

/// エラーの分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// パスに一致するノードがない
    NotFound,
    /// ルートや参照ノードなど、操作対象にできない種類のノード
    WrongKind,
    /// エンジン呼び出しの失敗
    Engine,
    /// 展開済みノードへの型キャスト
    AlreadyExpanded,
}

/// 値の代入に失敗した理由
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignFailure {
    NoSuchNode,
    InvalidNodeType,
    RootNode,
    Engine(EngineError),
}

impl fmt::Display for AssignFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssignFailure::NoSuchNode => f.write_str("No such node"),
            AssignFailure::InvalidNodeType => f.write_str("Invalid node type"),
            AssignFailure::RootNode => f.write_str("Cannot assign to root node"),
            AssignFailure::Engine(e) => write!(f, "{}", e),
        }
    }
}

/// シンボルツリー操作のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymbolGroupError {
    #[error("Node '{0}' not found.")]
    NotFound(String),

    #[error("Node type error in {operation}: {path}")]
    WrongKind { operation: &'static str, path: String },

    #[error("Cannot {operation} root node")]
    RootNode { operation: &'static str },

    #[error("Cannot cast expanded node '{0}'")]
    AlreadyExpanded(String),

    #[error("Unable to assign '{value}' to '{path}': {reason}")]
    Assign {
        path: String,
        value: String,
        reason: AssignFailure,
    },

    #[error("Unable to obtain frame {frame} ({obtained}).")]
    FrameUnavailable { frame: usize, obtained: usize },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl SymbolGroupError {
    /// エラーの分類を取得する
    pub fn kind(&self) -> ErrorKind {
        match self {
            SymbolGroupError::NotFound(_) => ErrorKind::NotFound,
            SymbolGroupError::WrongKind { .. } | SymbolGroupError::RootNode { .. } => {
                ErrorKind::WrongKind
            }
            SymbolGroupError::AlreadyExpanded(_) => ErrorKind::AlreadyExpanded,
            SymbolGroupError::Assign { reason, .. } => match reason {
                AssignFailure::NoSuchNode => ErrorKind::NotFound,
                AssignFailure::InvalidNodeType | AssignFailure::RootNode => ErrorKind::WrongKind,
                AssignFailure::Engine(_) => ErrorKind::Engine,
            },
            SymbolGroupError::FrameUnavailable { .. } | SymbolGroupError::Engine(_) => {
                ErrorKind::Engine
            }
        }
    }
}
