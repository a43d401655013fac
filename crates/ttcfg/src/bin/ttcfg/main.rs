mod cli;

use std::path::Path;
use ttcfg::fs::{FileSystem, StdFileSystem};
use ttcfg::printer::PrintOptions;
use ttcfg::resolver::{Environment, IncludeGraphResolver, ResolveOptions, ResolvedGraph};

fn main() {
    use clap::Parser;
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("TTCFG_LOG"))
        .with_writer(std::io::stderr)
        .init();

    for new_path in cli.directory.iter() {
        match new_path.canonicalize() {
            Err(e) => {
                eprintln!(
                    "Failed to resolve path for -C/--directory {}\n{}",
                    new_path.display(),
                    e
                );
                std::process::exit(1);
            }
            Ok(cwd) => {
                if let Err(err) = std::env::set_current_dir(&cwd) {
                    eprintln!("Failed to set work directory to {}\n{}", cwd.display(), err,);
                    std::process::exit(1);
                }

                tracing::info!(directory=%cwd.display(), "Changed working directory");
            }
        }
    }

    let command_result = match cli.command {
        cli::Command::Resolve(resolve_cli) => resolve(resolve_cli),
        cli::Command::Print(print_cli) => print(print_cli),
        cli::Command::Dev(dev_cli) => dev(dev_cli),
    };

    if let Err(e) = command_result {
        for error in e.chain() {
            eprintln!("{error}")
        }
        std::process::exit(1);
    }
}

pub fn resolve(cli: cli::ResolveCommand) -> anyhow::Result<()> {
    let graph = load(&cli.input)?;
    report(&graph);

    match cli.output.format {
        cli::OutputFormat::Yaml => serde_yaml::to_writer(std::io::stdout(), &graph.summary())?,
        cli::OutputFormat::Json => serde_json::to_writer_pretty(std::io::stdout(), &graph.summary())?,
    };

    anyhow::ensure!(!graph.is_erroneous(), "{} could not be resolved cleanly", graph.root().display());
    Ok(())
}

pub fn print(cli: cli::PrintCommand) -> anyhow::Result<()> {
    let graph = load(&cli.input)?;
    report(&graph);

    let printed = ttcfg::printer::print(
        &graph,
        PrintOptions {
            mode: cli.mode,
            hidden_tokens: !cli.no_hidden,
            disallowed: cli.skip,
        },
    )?;

    for warning in &printed.warnings {
        eprintln!("{warning}");
    }
    print!("{}", printed.text);
    Ok(())
}

fn load(input: &cli::InputArgs) -> anyhow::Result<ResolvedGraph> {
    let environment = if input.no_env {
        Environment::Empty
    } else {
        Environment::Process
    };

    let graph = IncludeGraphResolver::new(&StdFileSystem)
        .with_options(ResolveOptions { environment })
        .resolve(&input.file)?;

    Ok(graph)
}

/// Diagnostics of the whole graph on stderr
fn report(graph: &ResolvedGraph) {
    for warning in graph.warnings() {
        eprintln!("{warning}");
    }
    for error in graph.processing_errors() {
        eprintln!("error: {error}");
    }
    for exception in graph.exceptions() {
        eprintln!("error: {exception}: {}", exception.source);
    }
}

/// (ttcfg-)developer utilities
///
/// A quick way to expose internal structures for debugging purposes
pub fn dev(cli: cli::DevCommand) -> anyhow::Result<()> {
    use cli::DevSubCommand::*;

    let read = |file: &Path| -> anyhow::Result<String> { Ok(StdFileSystem.read_utf8(file)?) };

    match cli.command {
        Tokens { file } => {
            let (tokens, markers) = ttcfg::syntax::lex(&read(&file)?);
            for token in tokens.iter() {
                println!(
                    "{}:{}..{} {:?} {:?}",
                    token.line, token.start, token.end, token.kind, token.text
                );
            }
            for marker in markers {
                eprintln!("{marker}");
            }
        }
        Intervals { file } => {
            let intervals = ttcfg::interval::detect_intervals(&read(&file)?);
            serde_yaml::to_writer(std::io::stdout(), &intervals)?;
        }
        Tree { file } => {
            let result = ttcfg::analyzer::FileAnalyzer::default().analyze_text(Some(&file), &read(&file)?);
            println!("{:#?}", result.tree);
        }
    }

    Ok(())
}
