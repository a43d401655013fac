//! # ttcfg - TTCN-3 configuration file resolution
//!
//! Parses `.cfg` files, follows their includes, resolves macros and evaluates expressions so the result can be handed
//! to a test executor, or printed back as one flat configuration.
//!
//! ## Introduction for developers
//!
//! Read this to understand how `ttcfg` works internally.
//!
//! ### Configuration file terms
//!
//! In cfg terms...
//! - a file is a list of `sections`, each starting with a `[HEADER]` at the beginning of a line
//! - ...most sections are a list of `entries`: `key := value` (or `key &= value` to append)
//! - `[INCLUDE]` and `[ORDERED_INCLUDE]` sections list quoted file names
//! - `[EXECUTE]` lists `module` or `module.testcase` items
//! - `[DEFINE]` entries are `macros`, referenced as `$name`, `${name}` or `${name, type}`
//!
//! This is a valid cfg file:
//! ```text
//! // single line comments work like this
//! # ...or like this
//!
//! /* multi-line
//! comments
//! also work */
//!
//! [DEFINE]
//! BASE_PORT := 9000
//! HOST := "localhost"
//!
//! [INCLUDE]
//! "common.cfg"
//!
//! [MAIN_CONTROLLER]
//! LocalAddress := $HOST
//! TCPPort := $BASE_PORT + 34
//!
//! [EXECUTE]
//! MyModule.tc_smoke
//! ```
//!
//! ### Analyzing files
//!
//! see [analyzer::FileAnalyzer]
//!
//! A [syntax::Grammar] turns text into a [syntax::TokenStream] (whitespace and comments included, on a hidden
//! channel) and a [syntax::ParseTree]. The analyzer walks the tree once and keeps everything else as source text:
//! macro definitions, include file names, execute items and raw section entries. Lexer and parser problems become
//! [diagnostics::Marker]s, never errors.
//!
//! ### Resolving the include graph
//!
//! see [resolver::IncludeGraphResolver]
//!
//! Starting at the root file, included files are resolved relative to the including file ([fs::FileSystem]) and
//! analyzed breadth first, each one exactly once. Afterwards
//!
//! - all `[DEFINE]` sections are merged into one [macros::MacroTable], in discovery order
//! - macro values referring to other macros are expanded, complete expressions are folded (`1 + 2` becomes `3`)
//! - [handlers::SectionHandlers] are built from the remaining sections, with macros substituted and expressions
//!   evaluated ([expr], [numeric::NumericValue])
//!
//! The outcome is a [resolver::ResolvedGraph] owned by the caller.
//!
//! ### Printing
//!
//! see [printer]
//!
//! The printer walks the parse trees again and emits text: raw, with included files appended ("row"), or with
//! ordered includes inlined ("nested").
//!
//! ### Incremental re-lexing
//!
//! [interval::detect_intervals] splits a file into nested intervals (sections, blocks, comments) so an editor can
//! re-lex only the interval enclosing an edit.
//!
pub mod analyzer;
pub mod diagnostics;
pub mod expr;
pub mod fs;
pub mod handlers;
pub mod interval;
pub mod macros;
pub mod numeric;
pub mod printer;
pub mod resolver;
pub mod section;
pub mod span;
pub mod syntax;
pub mod value;
