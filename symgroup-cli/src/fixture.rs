//! JSON フィクスチャの読み込み
//!
//! スレッド・スタックフレーム・フレームごとのシンボルツリーを記述した JSON を
//! スクリプト化されたエンジンに変換します。

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use symgroup_engine::{FrameSpec, ScriptedEngine, SymbolSpec, ThreadId};

#[derive(Debug, Deserialize)]
pub struct Fixture {
    pub threads: Vec<ThreadFixture>,
}

#[derive(Debug, Deserialize)]
pub struct ThreadFixture {
    pub id: ThreadId,
    /// フレーム0が最内
    pub frames: Vec<FrameFixture>,
}

#[derive(Debug, Deserialize)]
pub struct FrameFixture {
    pub function: String,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub locals: Vec<SymbolFixture>,
}

#[derive(Debug, Deserialize)]
pub struct SymbolFixture {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub read_only: bool,
    /// 未展開時に報告する子要素数（省略時は実際の子の数）
    #[serde(default)]
    pub sub_elements: Option<usize>,
    #[serde(default)]
    pub children: Vec<SymbolFixture>,
}

impl SymbolFixture {
    fn into_spec(self) -> SymbolSpec {
        let children = self.children.into_iter().map(SymbolFixture::into_spec).collect();
        let mut spec = SymbolSpec::new(self.name, self.type_name, self.value).with_children(children);
        if self.read_only {
            spec = spec.read_only();
        }
        if let Some(hint) = self.sub_elements {
            spec = spec.with_sub_elements_hint(hint);
        }
        spec
    }
}

impl Fixture {
    /// ファイルから読み込む
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("Invalid fixture {}", path.display()))
    }

    /// JSON 文字列から読み込む
    pub fn from_json(text: &str) -> Result<Self> {
        let fixture: Fixture = serde_json::from_str(text)?;
        if fixture.threads.is_empty() {
            anyhow::bail!("Fixture has no threads");
        }
        Ok(fixture)
    }

    /// スクリプト化されたエンジンを作成する
    pub fn into_engine(self) -> Result<ScriptedEngine> {
        let mut engine = ScriptedEngine::new()?;
        for thread in self.threads {
            let frames = thread
                .frames
                .into_iter()
                .map(|f| {
                    let locals = f.locals.into_iter().map(SymbolFixture::into_spec).collect();
                    FrameSpec::new(f.function, f.offset, locals)
                })
                .collect();
            engine.add_thread(thread.id, frames);
        }
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use symgroup_engine::{DebugEngine, SymbolGroupBackend};

    const SAMPLE: &str = r#"{
        "threads": [{
            "id": 3,
            "frames": [{
                "function": "main",
                "offset": 4198400,
                "locals": [
                    {"name": "x", "type": "int", "value": "1"},
                    {"name": "p", "type": "Point", "value": "{...}", "read_only": true,
                     "children": [{"name": "x", "type": "int", "value": "0"}]}
                ]
            }]
        }]
    }"#;

    #[test]
    fn test_load_fixture() {
        let fixture = Fixture::from_json(SAMPLE).unwrap();
        assert_eq!(fixture.threads[0].id, 3);
        assert_eq!(fixture.threads[0].frames[0].locals.len(), 2);

        let mut engine = fixture.into_engine().unwrap();
        let frames = engine.stack_trace(3, 5).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].instruction_offset, 4198400);

        let group = engine.scope_symbol_group(None).unwrap();
        assert_eq!(group.symbol_count().unwrap(), 2);
        assert_eq!(group.symbol_parameters(1, 1).unwrap()[0].sub_elements, 1);
    }

    #[test]
    fn test_invalid_fixture() {
        assert!(Fixture::from_json("{}").is_err());
        assert!(Fixture::from_json(r#"{"threads": []}"#).is_err());
        assert!(Fixture::from_json(r#"{"threads": [{"id": 1, "frames": [{"locals": []}]}]}"#).is_err());
    }
}
