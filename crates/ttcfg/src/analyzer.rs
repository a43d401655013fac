//! single file analysis
//!
//! [FileAnalyzer] lexes and parses one file with its [Grammar] and walks the parse tree once to collect everything the
//! resolver needs: macro definitions, include references, execute items and the raw entries of every other section.
//! Nothing here looks at other files; values are kept as source text until the resolver has the merged macro table.
use crate::diagnostics::Marker;
use crate::expr;
use crate::fs::{FileSystem, LoadError};
use crate::interval::{IntervalDetector, IntervalTree};
use crate::macros::MacroTable;
use crate::section::SectionKind;
use crate::span::SourceSpan;
use crate::syntax::{self, CfgGrammar, Grammar, NodeId, ParseTree, RuleKind, TokenKind, TokenStream};
use indexmap::IndexMap;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// A quoted file name inside `[INCLUDE]` or `[ORDERED_INCLUDE]`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncludeRef {
    /// file name with the quotes removed
    pub raw: String,
    pub kind: SectionKind,
    /// index of the string token
    pub token: usize,
    pub span: SourceSpan,
    /// canonical path, filled in by the resolver
    pub resolved: Option<PathBuf>,
}

/// `module` or `module.testcase` from `[EXECUTE]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, derive_new::new)]
pub struct ExecuteItem {
    pub module: String,
    pub testcase: Option<String>,
}

impl std::fmt::Display for ExecuteItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.testcase {
            Some(testcase) => write!(f, "{}.{testcase}", self.module),
            None => f.write_str(&self.module),
        }
    }
}

/// `key := value` (or `key &= value`) as written
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawEntry {
    pub key: String,
    pub value: String,
    /// `&=` instead of `:=`
    pub append: bool,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub path: Option<PathBuf>,
    #[serde(skip)]
    pub tokens: TokenStream,
    #[serde(skip)]
    pub tree: ParseTree,
    #[serde(skip)]
    pub intervals: IntervalTree,
    pub warnings: Vec<Marker>,
    pub defines: MacroTable,
    pub includes: Vec<IncludeRef>,
    pub execute_items: Vec<ExecuteItem>,
    /// entries of every section that is neither `[DEFINE]`, an include nor `[EXECUTE]`
    pub entries: IndexMap<SectionKind, Vec<RawEntry>>,
    pub log_file_defined: bool,
    /// raw `LocalAddress` value of `[MAIN_CONTROLLER]`
    pub local_address: Option<String>,
}

impl FileResult {
    pub fn entries(&self, kind: SectionKind) -> &[RawEntry] {
        self.entries.get(&kind).map_or(&[], Vec::as_slice)
    }

    pub fn has_errors(&self) -> bool {
        self.warnings.iter().any(Marker::is_error)
    }
}

pub struct FileAnalyzer {
    grammar: Box<dyn Grammar>,
}

impl Default for FileAnalyzer {
    fn default() -> Self {
        Self::new(CfgGrammar)
    }
}

impl std::fmt::Debug for FileAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileAnalyzer").finish_non_exhaustive()
    }
}

impl FileAnalyzer {
    /// Analyze files with `grammar` instead of [CfgGrammar]
    pub fn new(grammar: impl Grammar + 'static) -> Self {
        Self {
            grammar: Box::new(grammar),
        }
    }

    /// Read and analyze `path`
    ///
    /// An unreadable file is an error for this file only.
    pub fn analyze_file(&self, fs: &dyn FileSystem, path: &Path) -> Result<FileResult, LoadError> {
        tracing::info!(path = %path.display(), "loading file");
        let text = fs.read_utf8(path)?;
        Ok(self.analyze_text(Some(path), &text))
    }

    /// Analyze an in-memory buffer
    pub fn analyze_text(&self, path: Option<&Path>, text: &str) -> FileResult {
        let (tokens, lexer_markers) = self.grammar.lex(text);
        let (tree, parser_markers) = self.grammar.parse(&tokens);
        let intervals = IntervalDetector::detect(text, &tokens);

        let warnings = merge_markers(lexer_markers, parser_markers)
            .into_iter()
            .map(|marker| Marker {
                span: marker.span.in_file(path),
                ..marker
            })
            .collect();

        let mut result = FileResult {
            path: path.map(Path::to_path_buf),
            tokens,
            tree,
            intervals,
            warnings,
            defines: MacroTable::default(),
            includes: Vec::new(),
            execute_items: Vec::new(),
            entries: IndexMap::new(),
            log_file_defined: false,
            local_address: None,
        };

        let walker = Walker {
            path,
            tokens: &result.tokens,
            tree: &result.tree,
        };
        let collected = walker.collect(&mut result.defines);
        collected.apply(&mut result);

        tracing::debug!(
            path = ?path,
            defines = result.defines.len(),
            includes = result.includes.len(),
            warnings = result.warnings.len(),
            "file analyzed"
        );
        result
    }
}

/// Lexer markers first; a side without markers contributes nothing
fn merge_markers(lexer: Vec<Marker>, parser: Vec<Marker>) -> Vec<Marker> {
    match (lexer.is_empty(), parser.is_empty()) {
        (_, true) => lexer,
        (true, false) => parser,
        (false, false) => {
            let mut merged = lexer;
            merged.extend(parser);
            merged
        }
    }
}

#[derive(Default)]
struct Collected {
    warnings: Vec<Marker>,
    includes: Vec<IncludeRef>,
    execute_items: Vec<ExecuteItem>,
    entries: IndexMap<SectionKind, Vec<RawEntry>>,
    log_file_defined: bool,
    local_address: Option<String>,
}

impl Collected {
    fn apply(self, result: &mut FileResult) {
        result.warnings.extend(self.warnings);
        result.includes = self.includes;
        result.execute_items = self.execute_items;
        result.entries = self.entries;
        result.log_file_defined = self.log_file_defined;
        result.local_address = self.local_address;
    }
}

struct Walker<'a> {
    path: Option<&'a Path>,
    tokens: &'a TokenStream,
    tree: &'a ParseTree,
}

impl<'a> Walker<'a> {
    fn collect(&self, defines: &mut MacroTable) -> Collected {
        let mut collected = Collected::default();

        for (section, kind) in self.tree.sections() {
            match kind {
                SectionKind::Define => self.defines(section, defines, &mut collected),
                SectionKind::Include | SectionKind::OrderedInclude => {
                    self.includes(section, kind, &mut collected)
                }
                SectionKind::Execute => self.execute(section, &mut collected),
                SectionKind::Unknown => {}
                _ => self.entries(section, kind, &mut collected),
            }
        }

        collected
    }

    fn span(&self, id: NodeId) -> SourceSpan {
        let (start, stop) = self.tree.token_range(id);
        let first = self.tokens.get(start);
        let last = self.tokens.get(stop);
        SourceSpan::new(self.path.map(Path::to_path_buf), first.line, first.start, last.end)
    }

    /// Key, operator and value of an entry; `None` when the value is missing
    fn entry(&self, entry: NodeId) -> Option<RawEntry> {
        let key = self.tree.child_rules(entry, RuleKind::Key).next()?;
        let value = self.tree.child_rules(entry, RuleKind::Value).next()?;

        let key_text: String = self
            .tree
            .children(key)
            .iter()
            .filter_map(|child| self.tree.terminal_token(*child))
            .map(|token| self.tokens.get(token).text.as_str())
            .collect();

        let append = self
            .tree
            .children(entry)
            .iter()
            .filter_map(|child| self.tree.terminal_token(*child))
            .any(|token| self.tokens.get(token).kind == TokenKind::ConcatAssign);

        Some(RawEntry {
            key: key_text,
            value: self.tree.text(value, self.tokens).trim().to_string(),
            append,
            span: self.span(entry),
        })
    }

    fn defines(&self, section: NodeId, defines: &mut MacroTable, collected: &mut Collected) {
        for entry in self.tree.child_rules(section, RuleKind::Entry) {
            let Some(raw) = self.entry(entry) else {
                continue;
            };

            if !syntax::is_identifier(&raw.key) {
                collected.warnings.push(Marker::warning(
                    format!("`{}` is not a valid macro name", raw.key),
                    raw.span,
                ));
                continue;
            }

            if raw.append {
                defines.append(raw.key, raw.value, raw.span);
            } else {
                defines.define(raw.key, raw.value, raw.span);
            }
        }
    }

    fn includes(&self, section: NodeId, kind: SectionKind, collected: &mut Collected) {
        for file in self.tree.child_rules(section, RuleKind::IncludeFile) {
            let (token, _) = self.tree.token_range(file);
            let text = &self.tokens.get(token).text;

            collected.includes.push(IncludeRef {
                raw: expr::unquote(text),
                kind,
                token,
                span: self.span(file),
                resolved: None,
            });
        }
    }

    fn execute(&self, section: NodeId, collected: &mut Collected) {
        for item in self.tree.child_rules(section, RuleKind::ExecuteItem) {
            let identifiers: Vec<&str> = self
                .tree
                .children(item)
                .iter()
                .filter_map(|child| self.tree.terminal_token(*child))
                .map(|token| self.tokens.get(token))
                .filter(|token| token.kind == TokenKind::Identifier)
                .map(|token| token.text.as_str())
                .collect();

            if let [module, rest @ ..] = identifiers.as_slice() {
                collected.execute_items.push(ExecuteItem::new(
                    module.to_string(),
                    rest.first().map(|testcase| testcase.to_string()),
                ));
            }
        }
    }

    fn entries(&self, section: NodeId, kind: SectionKind, collected: &mut Collected) {
        for entry in self.tree.child_rules(section, RuleKind::Entry) {
            let Some(raw) = self.entry(entry) else {
                continue;
            };

            match kind {
                SectionKind::Logging if last_segment(&raw.key).eq_ignore_ascii_case("LogFile") => {
                    collected.log_file_defined = true;
                }
                SectionKind::MainController if raw.key.eq_ignore_ascii_case("LocalAddress") => {
                    collected.local_address = Some(raw.value.clone());
                }
                _ => {}
            }

            collected.entries.entry(kind).or_default().push(raw);
        }
    }
}

/// Part of a dotted key after the last `.`
pub(crate) fn last_segment(key: &str) -> &str {
    key.rsplit('.').next().unwrap_or(key)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fs::MemoryFileSystem;
    use pretty_assertions::assert_eq;

    fn analyze(text: &str) -> FileResult {
        FileAnalyzer::default().analyze_text(Some(Path::new("/t.cfg")), text)
    }

    #[test]
    fn collects_everything() {
        let result = analyze(
            r#"[DEFINE]
PORT := 9000
NAME := "x"
NAME &= "y"
[INCLUDE]
"a.cfg"
[ORDERED_INCLUDE]
"b.cfg"
[EXECUTE]
m.tc1
other;
[MAIN_CONTROLLER]
localaddress := 127.0.0.1
TCPPort := $PORT
[LOGGING]
*.LogFile := "out.log"
"#,
        );

        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
        assert_eq!(result.defines.lookup("PORT"), Some("9000"));
        assert_eq!(result.defines.lookup("NAME"), Some("\"x\" & \"y\""));

        let includes: Vec<_> = result
            .includes
            .iter()
            .map(|include| (include.raw.as_str(), include.kind))
            .collect();
        assert_eq!(
            includes,
            vec![("a.cfg", SectionKind::Include), ("b.cfg", SectionKind::OrderedInclude)]
        );

        assert_eq!(
            result.execute_items,
            vec![
                ExecuteItem::new("m".into(), Some("tc1".into())),
                ExecuteItem::new("other".into(), None),
            ]
        );

        assert_eq!(result.local_address.as_deref(), Some("127.0.0.1"));
        assert!(result.log_file_defined);

        let controller: Vec<_> = result
            .entries(SectionKind::MainController)
            .iter()
            .map(|entry| (entry.key.as_str(), entry.value.as_str()))
            .collect();
        assert_eq!(
            controller,
            vec![("localaddress", "127.0.0.1"), ("TCPPort", "$PORT")]
        );
        assert!(result.entries(SectionKind::Groups).is_empty());
    }

    #[test]
    fn markers_are_attributed_to_the_file() {
        let result = analyze("[DEFINE]\nA := \"open\n[NOPE]\n");

        let messages: Vec<_> = result
            .warnings
            .iter()
            .map(|marker| (marker.message.as_str(), marker.span.file()))
            .collect();
        assert!(!messages.is_empty());
        assert!(messages
            .iter()
            .all(|(_, file)| *file == Some(Path::new("/t.cfg"))));
        assert!(result.has_errors());
    }

    #[test]
    fn marker_merge_order() {
        let lexer = vec![Marker::error("lex", SourceSpan::unknown())];
        let parser = vec![Marker::error("parse", SourceSpan::unknown())];

        let messages = |markers: Vec<Marker>| -> Vec<String> {
            markers.into_iter().map(|marker| marker.message).collect()
        };

        assert_eq!(messages(merge_markers(lexer.clone(), parser.clone())), vec!["lex", "parse"]);
        assert_eq!(messages(merge_markers(Vec::new(), parser)), vec!["parse"]);
        assert_eq!(messages(merge_markers(lexer, Vec::new())), vec!["lex"]);
        assert!(merge_markers(Vec::new(), Vec::new()).is_empty());
    }

    #[test]
    fn invalid_macro_name() {
        let result = analyze("[DEFINE]\n*.x := 1\n");
        assert_eq!(result.defines.len(), 0);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].message, "`*.x` is not a valid macro name");
    }

    #[test]
    fn unreadable_file() {
        let fs = MemoryFileSystem::default();
        let result = FileAnalyzer::default().analyze_file(&fs, Path::new("/missing.cfg"));
        assert!(matches!(result, Err(LoadError::Io(_))));
    }
}
