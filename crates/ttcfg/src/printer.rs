//! reconstruct configuration text from a resolved include graph
//!
//! - [PrintMode::Raw] reprints the root file as written. With hidden tokens enabled the output is byte for byte
//!   identical to the input.
//! - [PrintMode::Row] substitutes macros and appends every included file after the root file, in discovery order,
//!   each wrapped in banner comments.
//! - [PrintMode::Nested] substitutes macros and replaces each `[ORDERED_INCLUDE]` reference by the referenced file,
//!   recursively. A file reachable through several references is inlined at the first one only. Files only reached
//!   through `[INCLUDE]` are appended as in row mode.
use crate::analyzer::FileResult;
use crate::diagnostics::Marker;
use crate::resolver::ResolvedGraph;
use crate::section::SectionKind;
use crate::syntax::{NodeId, RuleKind};
use indexmap::IndexSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum PrintMode {
    #[default]
    Raw,
    Row,
    Nested,
}

#[derive(Debug, Clone)]
pub struct PrintOptions {
    pub mode: PrintMode,
    /// Emit whitespace and comments; when disabled each run of them collapses to one separator
    pub hidden_tokens: bool,
    /// Sections left out of the output
    pub disallowed: Vec<SectionKind>,
}

impl Default for PrintOptions {
    fn default() -> Self {
        Self {
            mode: PrintMode::Raw,
            hidden_tokens: true,
            disallowed: Vec::new(),
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum PrintError {
    /// An include points at a file the resolver never recorded
    #[error("{} is not part of the resolved include graph", .0.display())]
    MissingFile(PathBuf),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Printed {
    pub text: String,
    /// unresolved macros
    pub warnings: Vec<Marker>,
}

pub fn print(graph: &ResolvedGraph, options: PrintOptions) -> Result<Printed, PrintError> {
    ConfigPrinter::new(graph, options).print()
}

pub struct ConfigPrinter<'g> {
    graph: &'g ResolvedGraph,
    options: PrintOptions,
    /// files not printed yet
    to_resolve: IndexSet<PathBuf>,
    output: String,
    warnings: Vec<Marker>,
}

impl<'g> ConfigPrinter<'g> {
    pub fn new(graph: &'g ResolvedGraph, options: PrintOptions) -> Self {
        Self {
            graph,
            options,
            to_resolve: graph.files().map(|(path, _)| path.to_path_buf()).collect(),
            output: String::new(),
            warnings: Vec::new(),
        }
    }

    pub fn print(mut self) -> Result<Printed, PrintError> {
        let graph = self.graph;
        let root = graph.root();
        self.to_resolve.shift_remove(root);
        self.print_file(root, true)?;

        if self.options.mode != PrintMode::Raw {
            for (path, _) in graph.files() {
                if self.to_resolve.shift_remove(path) {
                    self.print_with_banner(path)?;
                }
            }
        }

        Ok(Printed {
            text: self.output,
            warnings: self.warnings,
        })
    }

    fn print_with_banner(&mut self, path: &Path) -> Result<(), PrintError> {
        tracing::debug!(path = %path.display(), "printing included file");
        self.output.push_str(&format!(
            "\n//This part was originally found in file: {}\n",
            path.display()
        ));
        // no leading whitespace right after the banner
        self.print_file(path, false)?;
        self.output
            .push_str(&format!("\n//End of file: {}\n", path.display()));
        Ok(())
    }

    fn print_file(&mut self, path: &Path, leading_hidden: bool) -> Result<(), PrintError> {
        let graph = self.graph;
        let file = graph
            .file(path)
            .ok_or_else(|| PrintError::MissingFile(path.to_path_buf()))?;

        let mut emit_hidden = leading_hidden;
        self.node(file, file.tree.root(), &mut emit_hidden)
    }

    fn node(&mut self, file: &'g FileResult, id: NodeId, emit_hidden: &mut bool) -> Result<(), PrintError> {
        match file.tree.rule_kind(id) {
            Some(RuleKind::Section(kind)) if self.options.disallowed.contains(&kind) => {
                return Ok(());
            }
            Some(RuleKind::IncludeFile) if self.options.mode != PrintMode::Raw => {
                return self.include(file, id);
            }
            _ => {}
        }

        if let Some(token) = file.tree.terminal_token(id) {
            self.terminal(file, token, emit_hidden);
            return Ok(());
        }

        for child in file.tree.children(id) {
            self.node(file, *child, emit_hidden)?;
        }
        Ok(())
    }

    fn terminal(&mut self, file: &FileResult, index: usize, emit_hidden: &mut bool) {
        if *emit_hidden {
            let hidden = file.tokens.hidden_before(index);
            if self.options.hidden_tokens {
                for token in hidden {
                    self.output.push_str(&token.text);
                }
            } else if hidden.iter().any(|token| token.text.contains('\n')) {
                self.output.push('\n');
            } else if !hidden.is_empty() {
                self.output.push(' ');
            }
        }
        *emit_hidden = true;

        let token = file.tokens.get(index);
        if self.options.mode == PrintMode::Raw {
            self.output.push_str(&token.text);
            return;
        }

        let Some(reference) = token.macro_reference() else {
            self.output.push_str(&token.text);
            return;
        };

        let macros = self.graph.macros();
        let value = match reference.type_name {
            Some(_) => macros.lookup_typed(reference.name),
            None => macros.lookup(reference.name),
        };

        match value {
            Some(value) => self.output.push_str(value),
            None => self.warnings.push(Marker::warning(
                format!("macro `{}` is not defined", reference.name),
                token.span(file.path.as_deref()),
            )),
        }
    }

    /// Quoted file name of an include section; only nested `[ORDERED_INCLUDE]` references produce text
    fn include(&mut self, file: &'g FileResult, id: NodeId) -> Result<(), PrintError> {
        if self.options.mode != PrintMode::Nested {
            return Ok(());
        }

        let (token, _) = file.tree.token_range(id);
        let Some(include) = file
            .includes
            .iter()
            .find(|include| include.token == token && include.kind == SectionKind::OrderedInclude)
        else {
            return Ok(());
        };

        let Some(target) = &include.resolved else {
            return Ok(());
        };

        if self.to_resolve.shift_remove(target) {
            self.print_with_banner(target)
        } else {
            tracing::debug!(path = %target.display(), "already printed");
            Ok(())
        }
    }
}
