//! シンボルグループの検索・展開・代入・ダンプの統合テスト

use symgroup_core::{
    DumpParameters, EngineCall, ErrorKind, SymbolGroup, SymbolGroupBackend, SymbolGroupError,
    SymbolGroupOptions,
};
use symgroup_engine::{FrameSpec, ScriptedEngine, ScriptedGroup, SymbolSpec};

fn engine() -> ScriptedEngine {
    ScriptedEngine::new()
        .expect("Failed to create scripted engine")
        .with_thread(
            1,
            vec![
                FrameSpec::new(
                    "main",
                    0x401000,
                    vec![
                        SymbolSpec::new("x", "int", "1"),
                        SymbolSpec::array("arr", "int", &["10", "20", "30"]),
                        SymbolSpec::new("y", "double", "2.5"),
                    ],
                ),
                FrameSpec::new("start", 0x400100, vec![SymbolSpec::new("argc", "int", "3")]),
            ],
        )
}

fn create(engine: &mut ScriptedEngine) -> SymbolGroup<ScriptedGroup> {
    SymbolGroup::create(engine, 1, 0, SymbolGroupOptions::default())
        .expect("Failed to create symbol group")
}

/// ノードの現在の値をエンジンから読む
fn value_of(group: &SymbolGroup<ScriptedGroup>, path: &str) -> String {
    let id = group.find(path).expect("node not found");
    let index = group.node(id).index().expect("not a symbol node");
    group.backend().value_text(index).expect("value read failed")
}

#[test]
fn test_find_expand_dump_assign() {
    let mut engine = engine();
    let mut group = create(&mut engine);

    assert!(group.find("local.arr").is_some());
    assert!(group.find("local.arr.0").is_none());

    let outcome = group.expand_list(&["local.arr"]);
    assert!(outcome.is_complete());
    for path in ["local.arr.0", "local.arr.1", "local.arr.2"] {
        assert!(group.find(path).is_some(), "{} should exist", path);
    }

    let dump = group.dump(DumpParameters::empty()).expect("dump failed");
    assert_eq!(
        dump,
        concat!(
            "[",
            r#"{name="x",iname="local.x",type="int",value="1",numchild="0",flags=""},"#,
            r#"{name="arr",iname="local.arr",type="int [3]",value="0x1003",numchild="3",flags="expanded",children=["#,
            r#"{name="[0]",iname="local.arr.0",type="int",value="10",numchild="0",flags=""},"#,
            r#"{name="[1]",iname="local.arr.1",type="int",value="20",numchild="0",flags=""},"#,
            r#"{name="[2]",iname="local.arr.2",type="int",value="30",numchild="0",flags=""}"#,
            "]},",
            r#"{name="y",iname="local.y",type="double",value="2.5",numchild="0",flags=""}"#,
            "]"
        )
    );

    group.assign("local.arr.1", "25").expect("assign failed");
    let dump = group
        .dump_path("local.arr.1", DumpParameters::empty())
        .expect("dump_path failed");
    assert_eq!(
        dump,
        r#"[{name="[1]",iname="local.arr.1",type="int",value="25",numchild="0",flags="expanded",children=[]}]"#
    );
}

#[test]
fn test_find_round_trips_full_path() {
    let mut engine = engine();
    let mut group = create(&mut engine);
    group.expand("local.arr").expect("expand failed");

    let root = group.root();
    assert_eq!(group.find("local"), Some(root));
    for child in group.node(group.find("local.arr").unwrap()).children().to_vec() {
        let path = group.full_path(child);
        assert_eq!(group.find(&path), Some(child));
    }

    assert!(group.find("").is_none());
    assert!(group.find("other.x").is_none());
    assert!(group.find("local.x.y").is_none());
}

#[test]
fn test_root_name_option() {
    let mut engine = engine();
    let options = SymbolGroupOptions {
        root_name: "locals".into(),
        verbosity: 2,
    };
    let group = SymbolGroup::create(&mut engine, 1, 0, options).expect("create failed");
    assert!(group.find("locals.x").is_some());
    assert!(group.find("local.x").is_none());
}

#[test]
fn test_create_selects_frame() {
    let mut engine = engine();
    let group = SymbolGroup::create(&mut engine, 1, 1, SymbolGroupOptions::default())
        .expect("create failed");
    assert_eq!(group.frame(), 1);
    assert_eq!(group.thread_id(), 1);
    assert!(group.find("local.argc").is_some());
    assert!(group.find("local.x").is_none());
    assert_eq!(engine.scope(), Some((1, 1)));
}

#[test]
fn test_frame_unavailable() {
    let mut engine = engine();
    let err = SymbolGroup::create(&mut engine, 1, 5, SymbolGroupOptions::default())
        .err()
        .expect("create should fail");
    assert_eq!(err, SymbolGroupError::FrameUnavailable { frame: 5, obtained: 2 });
    assert_eq!(err.to_string(), "Unable to obtain frame 5 (2).");
    assert_eq!(engine.live_groups(), 0);
}

#[test]
fn test_handle_released_once() {
    let mut engine = engine();
    let group = create(&mut engine);
    assert_eq!(engine.live_groups(), 1);
    drop(group);
    assert_eq!(engine.live_groups(), 0);
    assert_eq!(engine.released_groups(), 1);
}

#[test]
fn test_handle_released_when_create_fails() {
    let mut engine = engine();
    engine.fail_on(EngineCall::SetScope, "no such frame");
    let err = SymbolGroup::create(&mut engine, 1, 0, SymbolGroupOptions::default())
        .err()
        .expect("create should fail");
    assert_eq!(err.kind(), ErrorKind::Engine);
    assert_eq!(engine.live_groups(), 0);
    assert_eq!(engine.released_groups(), 1);
}

#[test]
fn test_type_cast() {
    let mut engine = engine();
    let mut group = create(&mut engine);

    group.type_cast("local.x", "unsigned int").expect("cast failed");
    let id = group.find("local.x").unwrap();
    let index = group.node(id).index().unwrap();
    assert_eq!(group.backend().type_name(index).unwrap(), "unsigned int");

    group.expand("local.arr").expect("expand failed");
    engine.reset_calls();
    let err = group.type_cast("local.arr", "long [3]").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExpanded);
    // 展開済みノードのキャストはエンジンに届かない
    assert_eq!(engine.call_count(EngineCall::OutputAsType), 0);
    let arr = group.find("local.arr").unwrap();
    let index = group.node(arr).index().unwrap();
    assert_eq!(group.backend().type_name(index).unwrap(), "int [3]");
    assert_eq!(group.node(arr).children().len(), 3);

    let err = group.type_cast("local", "int").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::WrongKind);
    assert_eq!(err.to_string(), "Cannot cast root node");

    let err = group.type_cast("local.nope", "int").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_assign_errors_do_not_touch_engine() {
    let mut engine = engine();
    let mut group = create(&mut engine);
    engine.reset_calls();

    let err = group.assign("local.nope", "1").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.to_string(), "Unable to assign '1' to 'local.nope': No such node");

    let err = group.assign("local", "1").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::WrongKind);
    assert_eq!(err.to_string(), "Unable to assign '1' to 'local': Cannot assign to root node");

    assert_eq!(engine.call_count(EngineCall::WriteSymbol), 0);
}

#[test]
fn test_assign_engine_failure() {
    let mut engine = engine();
    let mut group = create(&mut engine);
    engine.fail_on(EngineCall::WriteSymbol, "target running");

    let err = group.assign("local.x", "7").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Engine);
    assert_eq!(
        err.to_string(),
        "Unable to assign '7' to 'local.x': WriteSymbol failed: target running"
    );

    engine.clear_failures();
    group.assign("local.x", "7").expect("assign failed");
    assert_eq!(value_of(&group, "local.x"), "7");
}

#[test]
fn test_dump_path_expands_node() {
    let mut engine = engine();
    let mut group = create(&mut engine);

    let dump = group
        .dump_path("local.arr", DumpParameters::empty())
        .expect("dump_path failed");
    assert!(dump.starts_with(r#"[{name="arr",iname="local.arr""#));
    assert!(dump.contains(r#"children=[{name="[0]",iname="local.arr.0""#));
    assert!(group.node(group.find("local.arr").unwrap()).is_expanded());

    let err = group
        .dump_path("local.nope", DumpParameters::empty())
        .unwrap_err();
    assert_eq!(err.to_string(), "Node 'local.nope' not found.");

    // ルートのパスはツリー全体と同じ
    let whole = group.dump(DumpParameters::empty()).unwrap();
    let root = group.dump_path("local", DumpParameters::empty()).unwrap();
    assert_eq!(whole, root);
}

#[test]
fn test_human_readable_dump() {
    let mut engine = engine();
    let mut group = create(&mut engine);
    group.expand("local.arr").unwrap();

    let dump = group.dump(DumpParameters::HUMAN_READABLE).unwrap();
    assert!(dump.starts_with("\n[\n{name=\"x\""));
    assert!(dump.contains("\n  {name=\"[0]\""));
    assert!(dump.ends_with("}]"));
}

#[test]
fn test_mark_uninitialized() {
    let mut engine = engine();
    let mut group = create(&mut engine);
    group.expand("local.arr").unwrap();

    group.mark_uninitialized(&["local.x", "local.arr.0"]);
    let x = group.find("local.x").unwrap();
    let first = group.find("local.arr.0").unwrap();
    assert_eq!(group.node(x).flags().to_string(), "uninitialized");
    assert!(group.node(first).flags().is_empty());

    let dump = group.dump(DumpParameters::empty()).unwrap();
    assert!(dump.contains(r#"iname="local.x",type="int",value="1",numchild="0",flags="uninitialized""#));
}

#[test]
fn test_debug_output() {
    let mut engine = engine();
    let mut group = create(&mut engine);
    group.expand("local.arr").unwrap();

    let text = group.debug("", 0);
    assert!(text.starts_with('\n'));
    assert!(text.contains("local.arr.2"));
    assert_eq!(text.lines().filter(|l| !l.is_empty()).count(), 6);

    let text = group.debug("local.missing", 1);
    assert!(text.ends_with("Node 'local.missing' not found."));
}
