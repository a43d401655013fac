//! End to end tests on real files
//!
//! Each test writes a small include graph into a temporary directory, resolves it from disk and checks the resolved
//! model or the printed text. Absolute paths in printed banners are replaced by `[dir]`.
use std::path::{Path, PathBuf};
use ttcfg::fs::StdFileSystem;
use ttcfg::printer::{PrintMode, PrintOptions};
use ttcfg::resolver::{Environment, IncludeGraphResolver, ProcessingError, ResolveOptions, ResolvedGraph};

const MAIN: &str = r#"// main configuration
[DEFINE]
PORT := 9000
GREETING := "hello"

[ORDERED_INCLUDE]
"ordered/first.cfg"

[INCLUDE]
"common.cfg"

[MAIN_CONTROLLER]
TCPPort := $PORT + 1

[EXECUTE]
Main.tc_main
"#;

const FIRST: &str = r#"[MODULE_PARAMETERS]
Main.greeting := $GREETING & " world"
[ORDERED_INCLUDE]
"../common.cfg"
"#;

const COMMON: &str = r#"[INCLUDE]
"main.cfg"
[EXECUTE]
Common.tc_common
"#;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("TTCFG_LOG"))
        .with_test_writer()
        .try_init();
}

struct Workspace {
    dir: tempfile::TempDir,
}

impl Workspace {
    fn new(files: &[(&str, &str)]) -> Self {
        init_logging();
        let dir = tempfile::tempdir().expect("temp dir");
        for (name, text) in files {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).expect("create dir");
            }
            std::fs::write(path, text).expect("write file");
        }
        Self { dir }
    }

    fn root(&self) -> PathBuf {
        self.dir.path().canonicalize().expect("canonical temp dir")
    }

    fn resolve(&self, file: &str, environment: Environment) -> ResolvedGraph {
        IncludeGraphResolver::new(&StdFileSystem)
            .with_options(ResolveOptions { environment })
            .resolve(&self.dir.path().join(file))
            .expect("resolved")
    }

    fn print(&self, graph: &ResolvedGraph, mode: PrintMode) -> String {
        let printed = ttcfg::printer::print(
            graph,
            PrintOptions {
                mode,
                ..PrintOptions::default()
            },
        )
        .expect("printed");

        printed
            .text
            .replace(&self.root().display().to_string(), "[dir]")
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(self.root())
            .unwrap_or(path)
            .display()
            .to_string()
    }
}

fn example() -> Workspace {
    Workspace::new(&[
        ("main.cfg", MAIN),
        ("ordered/first.cfg", FIRST),
        ("common.cfg", COMMON),
    ])
}

#[test]
fn resolves_the_whole_graph() {
    let workspace = example();
    let graph = workspace.resolve("main.cfg", Environment::Empty);

    let files: Vec<_> = graph
        .files()
        .map(|(path, _)| workspace.relative(path))
        .collect();
    assert_eq!(files, vec!["main.cfg", "ordered/first.cfg", "common.cfg"]);

    let execute: Vec<_> = graph.execute_list().iter().map(ToString::to_string).collect();
    assert_eq!(execute, vec!["Main.tc_main", "Common.tc_common"]);

    assert_eq!(graph.handlers().main_controller.tcp_port, Some(9001));
    assert_eq!(
        graph.handlers().module_parameters[0].value,
        ttcfg::value::Value::from("hello world")
    );
    assert!(graph.warnings().is_empty(), "{:?}", graph.warnings());
    assert!(!graph.is_erroneous());
}

#[test]
fn row_printing() {
    let workspace = example();
    let graph = workspace.resolve("main.cfg", Environment::Empty);

    insta::assert_snapshot!(workspace.print(&graph, PrintMode::Row), @r###"
    // main configuration
    [DEFINE]
    PORT := 9000
    GREETING := "hello"

    [ORDERED_INCLUDE]

    [INCLUDE]

    [MAIN_CONTROLLER]
    TCPPort := 9000 + 1

    [EXECUTE]
    Main.tc_main

    //This part was originally found in file: [dir]/ordered/first.cfg
    [MODULE_PARAMETERS]
    Main.greeting := "hello" & " world"
    [ORDERED_INCLUDE]

    //End of file: [dir]/ordered/first.cfg

    //This part was originally found in file: [dir]/common.cfg
    [INCLUDE]
    [EXECUTE]
    Common.tc_common

    //End of file: [dir]/common.cfg
    "###);
}

#[test]
fn nested_printing() {
    let workspace = example();
    let graph = workspace.resolve("main.cfg", Environment::Empty);
    let text = workspace.print(&graph, PrintMode::Nested);

    let position = |needle: &str| {
        text.find(needle)
            .unwrap_or_else(|| panic!("{needle:?} missing from:\n{text}"))
    };

    // first.cfg is inlined at its reference, common.cfg inside first.cfg
    assert!(position("[ORDERED_INCLUDE]\n//This part was originally found in file: [dir]/ordered/first.cfg") < position("[MAIN_CONTROLLER]"));
    assert!(position("file: [dir]/ordered/first.cfg") < position("file: [dir]/common.cfg"));
    assert!(position("//End of file: [dir]/common.cfg") < position("//End of file: [dir]/ordered/first.cfg"));

    for banner in ["found in file: [dir]/common.cfg", "Common.tc_common", "Main.greeting"] {
        assert_eq!(text.matches(banner).count(), 1, "{banner}");
    }
}

#[test]
fn raw_printing_round_trips() {
    let workspace = example();
    let graph = workspace.resolve("main.cfg", Environment::Empty);
    assert_eq!(workspace.print(&graph, PrintMode::Raw), MAIN);
}

#[test]
fn environment_fallback_and_unresolved_macros() {
    let workspace = Workspace::new(&[(
        "env.cfg",
        "[MODULE_PARAMETERS]\nhome := \"$TTCFG_TEST_HOME\"\nuser := $TTCFG_TEST_NOBODY\n",
    )]);

    let mut environment = indexmap::IndexMap::new();
    environment.insert("TTCFG_TEST_HOME".to_string(), "/home/tester".to_string());
    let graph = workspace.resolve("env.cfg", Environment::Explicit(environment));

    assert_eq!(graph.macros().lookup("TTCFG_TEST_HOME"), Some("/home/tester"));
    assert_eq!(graph.macros().lookup("TTCFG_TEST_NOBODY"), None);

    let printed = ttcfg::printer::print(
        &graph,
        PrintOptions {
            mode: PrintMode::Row,
            ..PrintOptions::default()
        },
    )
    .expect("printed");

    assert_eq!(
        printed.text,
        "[MODULE_PARAMETERS]\nhome := \"$TTCFG_TEST_HOME\"\nuser := \n"
    );
    assert_eq!(printed.warnings.len(), 1);
    assert_eq!(printed.warnings[0].message, "macro `TTCFG_TEST_NOBODY` is not defined");
}

#[test]
fn unreadable_include_is_a_processing_error() {
    let workspace = Workspace::new(&[
        ("main.cfg", "[INCLUDE]\n\"folder\"\n\"other.cfg\"\n"),
        ("folder/placeholder.cfg", ""),
        ("other.cfg", "[EXECUTE]\nOther\n"),
    ]);

    let graph = workspace.resolve("main.cfg", Environment::Empty);
    assert!(graph.is_erroneous());
    assert!(matches!(
        graph.processing_errors(),
        [ProcessingError::UnreadableFile { path, .. }] if path.ends_with("folder")
    ));

    let execute: Vec<_> = graph.execute_list().iter().map(ToString::to_string).collect();
    assert_eq!(execute, vec!["Other"]);

    let root = graph.root_file().expect("root file");
    assert_eq!(root.includes[0].resolved, None);
    assert!(root.includes[1].resolved.is_some());
}

#[test]
fn missing_root_file() {
    init_logging();
    let dir = tempfile::tempdir().expect("temp dir");
    let result = IncludeGraphResolver::new(&StdFileSystem).resolve(&dir.path().join("nope.cfg"));

    let error = result.expect_err("must fail");
    assert!(error.to_string().starts_with("cannot read root file"), "{error}");
}
