//! エンジン呼び出しのエラー

use std::fmt;
use thiserror::Error;

/// 失敗しうるエンジン呼び出しの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineCall {
    GetStackTrace,
    GetScopeSymbolGroup,
    SetScope,
    GetNumberSymbols,
    GetSymbolParameters,
    ExpandSymbol,
    GetSymbolName,
    GetSymbolTypeName,
    GetSymbolValueText,
    WriteSymbol,
    OutputAsType,
    AddSymbol,
}

impl EngineCall {
    /// エンジンAPI上の呼び出し名
    pub fn name(&self) -> &'static str {
        match self {
            EngineCall::GetStackTrace => "GetStackTrace",
            EngineCall::GetScopeSymbolGroup => "GetScopeSymbolGroup2",
            EngineCall::SetScope => "SetScope",
            EngineCall::GetNumberSymbols => "GetNumberSymbols",
            EngineCall::GetSymbolParameters => "GetSymbolParameters",
            EngineCall::ExpandSymbol => "ExpandSymbol",
            EngineCall::GetSymbolName => "GetSymbolName",
            EngineCall::GetSymbolTypeName => "GetSymbolTypeName",
            EngineCall::GetSymbolValueText => "GetSymbolValueText",
            EngineCall::WriteSymbol => "WriteSymbol",
            EngineCall::OutputAsType => "OutputAsType",
            EngineCall::AddSymbol => "AddSymbol",
        }
    }
}

impl fmt::Display for EngineCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// エンジン呼び出しの失敗
///
/// 失敗した呼び出し名と、エンジンが報告した人間向けの原因文字列を保持します。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{call} failed: {cause}")]
pub struct EngineError {
    pub call: EngineCall,
    pub cause: String,
}

impl EngineError {
    /// エラーを作成する
    pub fn new(call: EngineCall, cause: impl Into<String>) -> Self {
        Self {
            call,
            cause: cause.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_message() {
        let err = EngineError::new(EngineCall::WriteSymbol, "target not stopped");
        assert_eq!(err.to_string(), "WriteSymbol failed: target not stopped");

        let err = EngineError::new(EngineCall::GetScopeSymbolGroup, "no scope");
        assert_eq!(err.to_string(), "GetScopeSymbolGroup2 failed: no scope");
    }
}
