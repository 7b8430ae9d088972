//! symgroup CLI - コマンドラインインターフェース
//!
//! JSON フィクスチャで記述したデバッグ対象に対して、シンボルツリーを
//! 対話的に展開・ダンプする REPL です。

mod fixture;

use anyhow::Result;
use clap::Parser;
use fixture::Fixture;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use symgroup_core::{
    BatchOutcome, Command, ContainerDumper, DumpParameters, SymbolGroup, SymbolGroupOptions,
    ThreadId,
};
use symgroup_engine::{ScriptedEngine, ScriptedGroup};
use tracing_subscriber::EnvFilter;

/// symgroup - debugger symbol tree explorer
#[derive(Parser)]
#[command(name = "symgroup")]
#[command(version = "0.1.0")]
#[command(about = "Browse a debugger symbol tree by hierarchical names", long_about = None)]
struct Cli {
    /// Path to the JSON fixture describing threads, frames and locals
    fixture: PathBuf,

    /// Thread to inspect (defaults to the first thread in the fixture)
    #[arg(short, long)]
    thread: Option<ThreadId>,

    /// Stack frame number (0 is the innermost frame)
    #[arg(short, long, default_value_t = 0)]
    frame: usize,

    /// Name of the root node
    #[arg(long, default_value = symgroup_core::DEFAULT_ROOT_NAME)]
    root: String,

    /// Diagnostic verbosity for lookups and the debug command
    #[arg(short, long, default_value_t = 0)]
    verbosity: u32,

    /// Pretty-print dumps with newlines and indentation
    #[arg(long)]
    human: bool,
}

/// REPL のセッション状態
struct Session {
    engine: ScriptedEngine,
    group: Option<SymbolGroup<ScriptedGroup>>,
    options: SymbolGroupOptions,
    params: DumpParameters,
}

impl Session {
    /// スレッドとフレームを選択し直す
    ///
    /// 古いシンボルグループのインデックスは新しいフレームでは無効なので、先に解放します。
    fn select_frame(&mut self, thread: ThreadId, frame: usize) -> Result<()> {
        self.group = None;
        let mut group = SymbolGroup::create(&mut self.engine, thread, frame, self.options.clone())?;
        group.register_dumper(Box::new(ContainerDumper::default()));
        println!(
            "Thread {} frame {}: {} symbols",
            thread,
            frame,
            group.node(group.root()).children().len()
        );
        self.group = Some(group);
        Ok(())
    }

    fn group_mut(&mut self) -> Result<&mut SymbolGroup<ScriptedGroup>> {
        self.group
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("No frame selected. Use 'frame <thread> <n>' first."))
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    println!("symgroup - Debugger Symbol Tree");
    println!("Version 0.1.0");
    println!();

    let cli = Cli::parse();
    let mut session = init_session(cli)?;
    run_repl(&mut session)?;

    Ok(())
}

/// フィクスチャを読み込んで最初のフレームを選択する
fn init_session(cli: Cli) -> Result<Session> {
    println!("Loading fixture: {}", cli.fixture.display());
    let fixture = Fixture::load(&cli.fixture)?;
    let default_thread = fixture.threads.first().map(|t| t.id).unwrap_or_default();
    let engine = fixture.into_engine()?;

    let mut params = DumpParameters::COMPLEX_DUMPERS;
    if cli.human {
        params |= DumpParameters::HUMAN_READABLE;
    }

    let mut session = Session {
        engine,
        group: None,
        options: SymbolGroupOptions {
            root_name: cli.root,
            verbosity: cli.verbosity,
        },
        params,
    };
    session.select_frame(cli.thread.unwrap_or(default_thread), cli.frame)?;
    println!();

    Ok(session)
}

/// REPLループを実行する
fn run_repl(session: &mut Session) -> Result<()> {
    println!("Type 'help' for available commands, 'quit' to exit.");
    println!();

    let mut rl = DefaultEditor::new()?;

    loop {
        let readline = rl.readline("(symgroup) ");
        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                rl.add_history_entry(line)?;

                match handle_command(session, line) {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => eprintln!("Error: {}", e),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}

/// コマンドを処理する。終了する場合は false
fn handle_command(session: &mut Session, line: &str) -> Result<bool> {
    let Some(command) = Command::parse(line) else {
        println!("Unknown command: {}", line);
        println!("Type 'help' for available commands.");
        return Ok(true);
    };

    match command {
        Command::Help => print_help(),
        Command::Quit => {
            println!("Goodbye!");
            return Ok(false);
        }
        Command::Frame { thread, frame } => session.select_frame(thread, frame)?,
        Command::Expand(paths) => {
            let outcome = session.group_mut()?.expand_list(&paths);
            print_outcome("Expanded", &outcome);
        }
        Command::Dumpers(paths) => {
            let outcome = session.group_mut()?.expand_list_run_complex_dumpers(&paths);
            print_outcome("Ran dumpers on", &outcome);
        }
        Command::Cast { path, type_name } => {
            session.group_mut()?.type_cast(&path, &type_name)?;
            println!("Cast {} to '{}'", path, type_name);
        }
        Command::Assign { path, value } => {
            session.group_mut()?.assign(&path, &value)?;
            println!("Assigned '{}' to {}", value, path);
        }
        Command::Watch { expression, path } => handle_watch(session, &expression, path.as_deref())?,
        Command::Uninit(paths) => {
            session.group_mut()?.mark_uninitialized(&paths);
        }
        Command::Dump(path) => handle_dump(session, path.as_deref())?,
        Command::Debug { path, verbosity } => {
            let group = session.group_mut()?;
            println!("{}", group.debug(path.as_deref().unwrap_or(""), verbosity));
        }
    }

    Ok(true)
}

fn print_outcome(action: &str, outcome: &BatchOutcome) {
    println!("{} {}/{} nodes", action, outcome.succeeded, outcome.attempted);
    if let Some(message) = outcome.error_message() {
        println!("Error: {}", message);
    }
}

/// Watchコマンドを処理する
fn handle_watch(session: &mut Session, expression: &str, path: Option<&str>) -> Result<()> {
    let group = session.group_mut()?;
    let id = group.add_symbol(expression, path.unwrap_or(""))?;
    println!("Watching '{}' as {}", expression, group.full_path(id));
    Ok(())
}

/// Dumpコマンドを処理する
fn handle_dump(session: &mut Session, path: Option<&str>) -> Result<()> {
    let params = session.params;
    let group = session.group_mut()?;
    let output = match path {
        Some(path) => group.dump_path(path, params)?,
        None => group.dump(params)?,
    };
    println!("{}", output);
    Ok(())
}

fn print_help() {
    println!("Available commands:");
    println!();
    println!("  help                   - Show this help message");
    println!("  quit/exit/q            - Exit");
    println!();
    println!("Scope commands:");
    println!("  frame <thread> <n>     - Select a stack frame and rebuild the tree");
    println!();
    println!("Tree commands:");
    println!("  expand <path>[,...]    - Expand nodes and all their ancestors");
    println!("  dumpers <path>[,...]   - Expand nodes and run complex dumpers");
    println!("  cast <path> <type>     - Reinterpret an unexpanded node as another type");
    println!("  assign <path> <value>  - Write a new value to a node");
    println!("  watch <expr> [<path>]  - Add a top-level symbol for a name expression");
    println!("  uninit <path>[,...]    - Mark top-level nodes as uninitialized");
    println!("  dump [<path>]          - Dump the tree or one node");
    println!("  debug [<path>] [n]     - Show diagnostic details");
    println!();
    println!("Examples:");
    println!("  expand local.this.items");
    println!("  cast local.p Derived *");
    println!("  assign local.arr.1 25");
    println!("  watch arr[2]");
    println!("  dump local.arr");
}
