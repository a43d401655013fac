//! ttcfg cli interface

use clap::{Parser, Subcommand, ValueEnum};
use std::fmt::Formatter;
use std::path::PathBuf;
use ttcfg::printer::PrintMode;
use ttcfg::section::SectionKind;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Change the work directory
    ///
    /// Can be specified multiple times. Note that all
    /// paths on the way to the final path must exist.
    ///
    /// This is equivalent to running { cd <directory>; ttcfg ... }
    #[clap(short = 'C', long = "directory", global(true))]
    pub directory: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve a configuration file and its includes
    ///
    /// Prints macros, execute list and section contents. Diagnostics go to stderr.
    Resolve(ResolveCommand),

    /// Print a configuration file as one stream
    Print(PrintCommand),

    /// Print debug information for development
    Dev(DevCommand),
}

#[derive(Parser, Debug)]
pub struct InputArgs {
    /// Root configuration file
    pub file: PathBuf,

    /// Do not fall back to environment variables for undefined macros
    #[clap(long = "no-env")]
    pub no_env: bool,
}

#[derive(Parser, Debug)]
pub struct ResolveCommand {
    #[clap(flatten)]
    pub input: InputArgs,

    #[clap(flatten)]
    pub output: OutputArgs,
}

#[derive(Parser, Debug)]
pub struct PrintCommand {
    #[clap(flatten)]
    pub input: InputArgs,

    #[arg(short = 'm', long = "mode", value_enum, default_value_t = PrintMode::Row)]
    pub mode: PrintMode,

    /// Leave out a section, can be repeated
    #[arg(short = 's', long = "skip", value_enum)]
    pub skip: Vec<SectionKind>,

    /// Drop comments and collapse whitespace
    #[arg(long = "no-hidden")]
    pub no_hidden: bool,
}

#[derive(Parser, Debug)]
pub struct OutputArgs {
    #[arg(short = 'F', long = "output-format", default_value_t)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Default, Debug)]
pub enum OutputFormat {
    Json,
    #[default]
    Yaml,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Yaml => f.write_str("yaml"),
        }
    }
}

#[derive(Parser, Debug)]
pub struct DevCommand {
    #[command(subcommand)]
    pub command: DevSubCommand,
}

#[derive(Subcommand, Debug)]
pub enum DevSubCommand {
    /// Token stream of a single file
    Tokens { file: PathBuf },
    /// Lexical intervals of a single file
    Intervals { file: PathBuf },
    /// Parse tree of a single file
    Tree { file: PathBuf },
}
