//! フロントエンドのコマンド

use crate::parse::{parse_index, parse_path_list};

/// フロントエンドのコマンド
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// スレッドとフレームを選択してシンボルグループを作り直す
    Frame { thread: u32, frame: usize },
    /// パスのリストを祖先を含めて展開
    Expand(Vec<String>),
    /// 展開して複合ダンパーを実行
    Dumpers(Vec<String>),
    /// 未展開ノードの型キャスト
    Cast { path: String, type_name: String },
    /// 値の代入
    Assign { path: String, value: String },
    /// 名前式からウォッチシンボルを追加
    Watch { expression: String, path: Option<String> },
    /// トップレベルのノードを未初期化にする
    Uninit(Vec<String>),
    /// ツリー全体またはノードのダンプ
    Dump(Option<String>),
    /// 診断用の詳細表示
    Debug { path: Option<String>, verbosity: u32 },
    /// ヘルプ表示
    Help,
    /// 終了
    Quit,
}

impl Command {
    /// コマンド文字列をパースする
    pub fn parse(input: &str) -> Option<Self> {
        let parts: Vec<&str> = input.split_whitespace().collect();
        if parts.is_empty() {
            return None;
        }

        match parts[0] {
            "frame" | "f" => match parts.len() {
                2 => Some(Command::Frame {
                    thread: 0,
                    frame: parse_index(parts[1]).ok()?,
                }),
                3 => Some(Command::Frame {
                    thread: u32::try_from(parse_index(parts[1]).ok()?).ok()?,
                    frame: parse_index(parts[2]).ok()?,
                }),
                _ => None,
            },
            "expand" | "e" => Self::path_list(&parts).map(Command::Expand),
            "dumpers" => Self::path_list(&parts).map(Command::Dumpers),
            "cast" => {
                if parts.len() > 2 {
                    Some(Command::Cast {
                        path: parts[1].to_string(),
                        type_name: parts[2..].join(" "),
                    })
                } else {
                    None
                }
            }
            "assign" | "set" => {
                if parts.len() > 2 {
                    Some(Command::Assign {
                        path: parts[1].to_string(),
                        value: parts[2..].join(" "),
                    })
                } else {
                    None
                }
            }
            "watch" | "w" => match parts.len() {
                2 => Some(Command::Watch {
                    expression: parts[1].to_string(),
                    path: None,
                }),
                3 => Some(Command::Watch {
                    expression: parts[1].to_string(),
                    path: Some(parts[2].to_string()),
                }),
                _ => None,
            },
            "uninit" => Self::path_list(&parts).map(Command::Uninit),
            "dump" | "d" => match parts.len() {
                1 => Some(Command::Dump(None)),
                2 => Some(Command::Dump(Some(parts[1].to_string()))),
                _ => None,
            },
            "debug" => match parts.len() {
                1 => Some(Command::Debug {
                    path: None,
                    verbosity: 0,
                }),
                2 => match parts[1].parse::<u32>() {
                    Ok(verbosity) => Some(Command::Debug {
                        path: None,
                        verbosity,
                    }),
                    Err(_) => Some(Command::Debug {
                        path: Some(parts[1].to_string()),
                        verbosity: 0,
                    }),
                },
                3 => Some(Command::Debug {
                    path: Some(parts[1].to_string()),
                    verbosity: parts[2].parse().ok()?,
                }),
                _ => None,
            },
            "help" | "h" | "?" => Some(Command::Help),
            "quit" | "q" | "exit" => Some(Command::Quit),
            _ => None,
        }
    }

    fn path_list(parts: &[&str]) -> Option<Vec<String>> {
        let paths = parse_path_list(&parts[1..].join(""));
        if paths.is_empty() {
            None
        } else {
            Some(paths)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            Command::parse("frame 1 2"),
            Some(Command::Frame { thread: 1, frame: 2 })
        );
        assert_eq!(
            Command::parse("f 3"),
            Some(Command::Frame { thread: 0, frame: 3 })
        );
        assert_eq!(
            Command::parse("expand local.a, local.b.c"),
            Some(Command::Expand(vec!["local.a".into(), "local.b.c".into()]))
        );
        assert_eq!(Command::parse("dump"), Some(Command::Dump(None)));
        assert_eq!(Command::parse("quit"), Some(Command::Quit));
        assert_eq!(Command::parse("help"), Some(Command::Help));
    }

    #[test]
    fn test_parse_cast_and_assign() {
        assert_eq!(
            Command::parse("cast local.p unsigned int *"),
            Some(Command::Cast {
                path: "local.p".into(),
                type_name: "unsigned int *".into()
            })
        );
        assert_eq!(
            Command::parse("assign local.x 42"),
            Some(Command::Assign {
                path: "local.x".into(),
                value: "42".into()
            })
        );
        assert_eq!(Command::parse("assign local.x"), None);
    }

    #[test]
    fn test_parse_debug() {
        assert_eq!(
            Command::parse("debug 2"),
            Some(Command::Debug {
                path: None,
                verbosity: 2
            })
        );
        assert_eq!(
            Command::parse("debug local.arr 1"),
            Some(Command::Debug {
                path: Some("local.arr".into()),
                verbosity: 1
            })
        );
    }

    #[test]
    fn test_parse_invalid() {
        assert_eq!(Command::parse(""), None);
        assert_eq!(Command::parse("expand"), None);
        assert_eq!(Command::parse("frame x"), None);
        assert_eq!(Command::parse("bogus"), None);
    }
}
