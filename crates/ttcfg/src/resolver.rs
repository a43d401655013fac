//! include graph resolution
//!
//! [IncludeGraphResolver::resolve] walks the include graph of a root file breadth first. Each file is analyzed at
//! most once, no matter how many files include it, so cycles and diamonds terminate. The results are folded into a
//! [ResolvedGraph]:
//!
//! - one macro table, merged in discovery order (later files win the value, every definition site is kept)
//! - one execute list, concatenated in discovery order
//! - typed section handlers, built after macro resolution
//!
//! A file that cannot be found or read is recorded as a [ProcessingError] and its branch of the graph is dropped; only
//! an unreadable root file aborts the run.
use crate::analyzer::{ExecuteItem, FileAnalyzer, FileResult};
use crate::diagnostics::Marker;
use crate::expr::{self, Evaluated};
use crate::fs::{FileSystem, LoadError};
use crate::handlers::{EvaluationError, SectionHandlers};
use crate::macros::MacroTable;
use crate::span::SourceSpan;
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

/// Where undefined macro names are looked up
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Environment {
    /// variables of the running process
    #[default]
    Process,
    Empty,
    Explicit(IndexMap<String, String>),
}

impl Environment {
    pub fn variables(&self) -> IndexMap<String, String> {
        match self {
            Environment::Process => std::env::vars().collect(),
            Environment::Empty => IndexMap::new(),
            Environment::Explicit(variables) => variables.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    pub environment: Environment,
}

#[derive(thiserror::Error, Debug)]
pub enum ResolveError {
    #[error("cannot read root file {}", .0.display())]
    RootUnreadable(PathBuf, #[source] LoadError),
}

/// A file of the graph that could not be processed
#[derive(thiserror::Error, Debug)]
pub enum ProcessingError {
    #[error("{span}: cannot resolve included file `{raw}`")]
    UnresolvableInclude { raw: String, span: SourceSpan },
    #[error("cannot read {}", path.display())]
    UnreadableFile {
        path: PathBuf,
        #[source]
        source: LoadError,
    },
}

pub struct IncludeGraphResolver<'fs> {
    fs: &'fs dyn FileSystem,
    analyzer: FileAnalyzer,
    options: ResolveOptions,
}

impl<'fs> IncludeGraphResolver<'fs> {
    pub fn new(fs: &'fs dyn FileSystem) -> Self {
        Self {
            fs,
            analyzer: FileAnalyzer::default(),
            options: ResolveOptions::default(),
        }
    }

    pub fn with_analyzer(mut self, analyzer: FileAnalyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn with_options(mut self, options: ResolveOptions) -> Self {
        self.options = options;
        self
    }

    pub fn resolve(&self, root: &Path) -> Result<ResolvedGraph, ResolveError> {
        let root = self
            .fs
            .canonicalize(root)
            .map_err(|source| ResolveError::RootUnreadable(root.to_path_buf(), source))?;

        let mut files: IndexMap<PathBuf, FileResult> = IndexMap::new();
        let mut warnings = Vec::new();
        let mut processing_errors = Vec::new();

        let mut queue = VecDeque::from([root.clone()]);
        let mut processed = IndexSet::new();

        while let Some(path) = queue.pop_front() {
            if !processed.insert(path.clone()) {
                tracing::debug!(path = %path.display(), "already processed");
                continue;
            }

            let mut file = match self.analyzer.analyze_file(self.fs, &path) {
                Ok(file) => file,
                Err(source) if path == root => {
                    return Err(ResolveError::RootUnreadable(path, source));
                }
                Err(source) => {
                    tracing::warn!(path = %path.display(), %source, "cannot read included file");
                    processing_errors.push(ProcessingError::UnreadableFile { path, source });
                    continue;
                }
            };

            for include in &mut file.includes {
                match self.fs.resolve(&path, &include.raw) {
                    Some(target) => {
                        tracing::debug!(from = %path.display(), to = %target.display(), "queue include");
                        include.resolved = Some(target.clone());
                        queue.push_back(target);
                    }
                    None => {
                        let message = format!("cannot resolve included file `{}`", include.raw);
                        warnings.push(Marker::error(message, include.span.clone()));
                        processing_errors.push(ProcessingError::UnresolvableInclude {
                            raw: include.raw.clone(),
                            span: include.span.clone(),
                        });
                    }
                }
            }

            files.insert(path, file);
        }

        // references to files that turned out to be unreadable lead nowhere
        let known: HashSet<PathBuf> = files.keys().cloned().collect();
        for file in files.values_mut() {
            for include in &mut file.includes {
                if include.resolved.as_ref().is_some_and(|target| !known.contains(target)) {
                    include.resolved = None;
                }
            }
        }

        Ok(ResolvedGraph::fold(
            root,
            files,
            warnings,
            processing_errors,
            &self.options,
        ))
    }
}

/// Everything known about one include graph
#[derive(Debug)]
pub struct ResolvedGraph {
    root: PathBuf,
    files: IndexMap<PathBuf, FileResult>,
    macros: MacroTable,
    execute_list: Vec<ExecuteItem>,
    handlers: SectionHandlers,
    warnings: Vec<Marker>,
    processing_errors: Vec<ProcessingError>,
    exceptions: Vec<EvaluationError>,
    log_file_defined: bool,
    local_address: Option<String>,
}

impl ResolvedGraph {
    fn fold(
        root: PathBuf,
        files: IndexMap<PathBuf, FileResult>,
        resolve_warnings: Vec<Marker>,
        processing_errors: Vec<ProcessingError>,
        options: &ResolveOptions,
    ) -> Self {
        let mut warnings: Vec<Marker> = files
            .values()
            .flat_map(|file| file.warnings.iter().cloned())
            .collect();
        warnings.extend(resolve_warnings);

        let mut macros = MacroTable::with_environment(options.environment.variables());
        for file in files.values() {
            macros.merge(&file.defines);
        }
        warnings.extend(macros.redefinition_warnings());
        warnings.extend(macros.expand_all());

        let execute_list = files
            .values()
            .flat_map(|file| file.execute_items.iter().cloned())
            .collect();

        let log_file = files.values().find(|file| file.log_file_defined);
        let local_address = log_file
            .and_then(|file| file.local_address.as_deref())
            .map(|raw| resolve_text(raw, &macros));

        let built = SectionHandlers::build(files.values(), &macros);
        warnings.extend(built.warnings);

        tracing::info!(
            files = files.len(),
            macros = macros.len(),
            warnings = warnings.len(),
            "include graph resolved"
        );

        Self {
            root,
            log_file_defined: log_file.is_some(),
            local_address,
            files,
            macros,
            execute_list,
            handlers: built.handlers,
            warnings,
            processing_errors,
            exceptions: built.errors,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn root_file(&self) -> Option<&FileResult> {
        self.files.get(&self.root)
    }

    /// Analyzed files in discovery order
    pub fn files(&self) -> impl Iterator<Item = (&Path, &FileResult)> {
        self.files.iter().map(|(path, file)| (path.as_path(), file))
    }

    pub fn file(&self, path: &Path) -> Option<&FileResult> {
        self.files.get(path)
    }

    pub fn macros(&self) -> &MacroTable {
        &self.macros
    }

    pub fn execute_list(&self) -> &[ExecuteItem] {
        &self.execute_list
    }

    pub fn handlers(&self) -> &SectionHandlers {
        &self.handlers
    }

    pub fn warnings(&self) -> &[Marker] {
        &self.warnings
    }

    pub fn processing_errors(&self) -> &[ProcessingError] {
        &self.processing_errors
    }

    pub fn exceptions(&self) -> &[EvaluationError] {
        &self.exceptions
    }

    pub fn log_file_defined(&self) -> bool {
        self.log_file_defined
    }

    /// `LocalAddress` of the first file that defines a log file
    pub fn local_address(&self) -> Option<&str> {
        self.local_address.as_deref()
    }

    pub fn is_erroneous(&self) -> bool {
        !self.processing_errors.is_empty() || !self.exceptions.is_empty()
    }

    pub fn summary(&self) -> Summary<'_> {
        Summary {
            root: &self.root,
            files: self.files.keys().map(PathBuf::as_path).collect(),
            macros: self
                .macros
                .definitions()
                .map(|(name, definition)| (name, definition.value.as_str()))
                .collect(),
            execute: self.execute_list.iter().map(ToString::to_string).collect(),
            handlers: &self.handlers,
            log_file_defined: self.log_file_defined,
            local_address: self.local_address(),
            warnings: self.warnings.iter().map(ToString::to_string).collect(),
            errors: self
                .processing_errors
                .iter()
                .map(ToString::to_string)
                .chain(self.exceptions.iter().map(|error| format!("{error}: {}", error.source)))
                .collect(),
            erroneous: self.is_erroneous(),
        }
    }
}

/// Serializable overview of a [ResolvedGraph]
#[derive(Debug, Serialize)]
pub struct Summary<'g> {
    pub root: &'g Path,
    pub files: Vec<&'g Path>,
    pub macros: IndexMap<&'g str, &'g str>,
    pub execute: Vec<String>,
    #[serde(flatten)]
    pub handlers: &'g SectionHandlers,
    pub log_file_defined: bool,
    pub local_address: Option<&'g str>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub erroneous: bool,
}

/// Substitute macros in a raw value and unquote it if it is a string expression
fn resolve_text(raw: &str, macros: &MacroTable) -> String {
    let substituted = expr::substitute(raw, macros);
    match expr::evaluate_text(&substituted.text) {
        Ok(Some(Evaluated::Text(text))) => text,
        _ => substituted.text.trim().to_string(),
    }
}
