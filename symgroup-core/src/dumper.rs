//! 複合ダンパー
//!
//! 展開済みノードの子要素を見て、ノードの表示値を補強する拡張ポイントです。
//! ダンパーはツリーの形を変えず、同じ入力に対して同じ結果を返さなければなりません。

/// 子要素のスナップショット
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildSnapshot {
    pub iname: String,
    pub type_name: String,
    pub value: String,
}

/// ダンパーに渡すノードのスナップショット
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSnapshot {
    pub iname: String,
    pub type_name: String,
    pub value: String,
    pub children: Vec<ChildSnapshot>,
}

/// 複合ダンパー
pub trait ComplexDumper {
    /// ダンパー名（診断用）
    fn name(&self) -> &str;

    /// ノードの値に追記するテキストを返す。対象外なら None
    fn dump(&self, node: &NodeSnapshot) -> Option<String>;
}

/// 型名から判定したコンテナの種類
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerKind {
    /// `int [3]` / `int[3]`
    Array { element_type: String, len: usize },
    /// `Vec<T>` / `std::vector<T>`
    Vec { element_type: String },
    /// `Option<T>`
    Option { inner_type: String },
    /// その他
    Other,
}

impl ContainerKind {
    /// 型名からコンテナの種類を判定する
    pub fn from_type_name(type_name: &str) -> Self {
        let type_name = type_name.trim();

        if let Some((element_type, len)) = Self::extract_array(type_name) {
            return ContainerKind::Array { element_type, len };
        }

        if let Some(element_type) = Self::extract_generic_argument(type_name, &["Vec<", "vector<"]) {
            return ContainerKind::Vec { element_type };
        }

        if let Some(inner_type) = Self::extract_generic_argument(type_name, &["Option<"]) {
            return ContainerKind::Option { inner_type };
        }

        ContainerKind::Other
    }

    /// `T [n]` の要素型と長さを抽出
    fn extract_array(type_name: &str) -> Option<(String, usize)> {
        if !type_name.ends_with(']') {
            return None;
        }
        let open = type_name.rfind('[')?;
        let len = type_name[open + 1..type_name.len() - 1].trim().parse().ok()?;
        let element_type = type_name[..open].trim();
        if element_type.is_empty() {
            return None;
        }
        Some((element_type.to_string(), len))
    }

    /// `alloc::vec::Vec<i32>` のように、最後の `::` 以降が接頭辞に一致する型の引数を抽出
    fn extract_generic_argument(type_name: &str, prefixes: &[&str]) -> Option<String> {
        let open = type_name.find('<')?;
        let base = match type_name[..open].rfind("::") {
            Some(pos) => &type_name[pos + 2..],
            None => type_name,
        };
        if !prefixes.iter().any(|p| base.starts_with(p)) {
            return None;
        }
        let close = type_name.rfind('>')?;
        if close <= open {
            return None;
        }
        Some(type_name[open + 1..close].trim().to_string())
    }
}

/// 配列・Vec・Option の子要素を `[v0, v1, ...]` の形で要約するダンパー
pub struct ContainerDumper {
    /// 表示する最大要素数
    max_elements: usize,
}

impl ContainerDumper {
    /// 新しいダンパーを作成する
    pub fn new(max_elements: usize) -> Self {
        Self { max_elements }
    }

    fn summarize(&self, children: &[ChildSnapshot]) -> String {
        let mut out = String::from("[");
        for (i, child) in children.iter().take(self.max_elements).enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(&child.value);
        }
        if children.len() > self.max_elements {
            out.push_str(", ...");
        }
        out.push(']');
        out
    }
}

impl Default for ContainerDumper {
    fn default() -> Self {
        Self::new(16)
    }
}

impl ComplexDumper for ContainerDumper {
    fn name(&self) -> &str {
        "container"
    }

    fn dump(&self, node: &NodeSnapshot) -> Option<String> {
        match ContainerKind::from_type_name(&node.type_name) {
            ContainerKind::Array { .. } | ContainerKind::Vec { .. } => {
                Some(self.summarize(&node.children))
            }
            ContainerKind::Option { .. } => Some(match node.children.first() {
                Some(inner) => format!("Some({})", inner.value),
                None => "None".to_string(),
            }),
            ContainerKind::Other => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(type_name: &str, values: &[&str]) -> NodeSnapshot {
        NodeSnapshot {
            iname: "v".into(),
            type_name: type_name.into(),
            value: "0x1000".into(),
            children: values
                .iter()
                .enumerate()
                .map(|(i, v)| ChildSnapshot {
                    iname: i.to_string(),
                    type_name: "int".into(),
                    value: v.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_container_kind() {
        assert_eq!(
            ContainerKind::from_type_name("int [3]"),
            ContainerKind::Array {
                element_type: "int".into(),
                len: 3
            }
        );
        assert_eq!(
            ContainerKind::from_type_name("alloc::vec::Vec<i32>"),
            ContainerKind::Vec {
                element_type: "i32".into()
            }
        );
        assert_eq!(
            ContainerKind::from_type_name("std::vector<std::pair<int,int>>"),
            ContainerKind::Vec {
                element_type: "std::pair<int,int>".into()
            }
        );
        assert_eq!(
            ContainerKind::from_type_name("core::option::Option<u8>"),
            ContainerKind::Option {
                inner_type: "u8".into()
            }
        );
        assert_eq!(ContainerKind::from_type_name("int"), ContainerKind::Other);
        assert_eq!(ContainerKind::from_type_name("MyVec<int>"), ContainerKind::Other);
    }

    #[test]
    fn test_container_dumper_summary() {
        let dumper = ContainerDumper::new(2);
        assert_eq!(
            dumper.dump(&snapshot("int [3]", &["1", "2", "3"])),
            Some("[1, 2, ...]".into())
        );
        assert_eq!(dumper.dump(&snapshot("int [0]", &[])), Some("[]".into()));
        assert_eq!(
            dumper.dump(&snapshot("Option<int>", &["7"])),
            Some("Some(7)".into())
        );
        assert_eq!(dumper.dump(&snapshot("double", &[])), None);
    }
}
