//! recursive descent parser producing a [ParseTree]
//!
//! Only default-channel tokens are looked at. Every one of them is attached to the tree (unparseable runs are
//! wrapped in [RuleKind::Error] nodes), so the tree always covers the whole token stream.
use super::token::{TokenKind, TokenStream};
use super::tree::{NodeId, ParseTree, RuleKind};
use super::MAX_NESTING;
use crate::diagnostics::Marker;
use crate::section::SectionKind;

pub fn parse(tokens: &TokenStream) -> (ParseTree, Vec<Marker>) {
    let significant: Vec<usize> = tokens.significant().collect();
    let first = significant.first().copied().unwrap_or(0);

    let mut parser = Parser {
        tokens,
        significant,
        pos: 0,
        last: first,
        tree: ParseTree::new(RuleKind::ConfigFile, first),
        markers: Vec::new(),
    };

    parser.file();
    (parser.tree, parser.markers)
}

struct Parser<'t> {
    tokens: &'t TokenStream,
    /// default-channel token indices, ends with Eof
    significant: Vec<usize>,
    /// position in `significant`
    pos: usize,
    /// last attached token index
    last: usize,
    tree: ParseTree,
    markers: Vec<Marker>,
}

impl<'t> Parser<'t> {
    fn kind_at(&self, offset: usize) -> TokenKind {
        self.significant
            .get(self.pos + offset)
            .map_or(TokenKind::Eof, |index| self.tokens.get(*index).kind)
    }

    fn kind(&self) -> TokenKind {
        self.kind_at(0)
    }

    fn current(&self) -> usize {
        self.significant
            .get(self.pos)
            .or(self.significant.last())
            .copied()
            .unwrap_or(0)
    }

    /// Whether the token at `offset` directly follows the one before it, without hidden tokens in between
    fn touches_previous(&self, offset: usize) -> bool {
        let (Some(previous), Some(current)) = (
            offset
                .checked_sub(1)
                .and_then(|previous| self.significant.get(self.pos + previous)),
            self.significant.get(self.pos + offset),
        ) else {
            return false;
        };

        self.tokens.get(*previous).end == self.tokens.get(*current).start
    }

    fn at_boundary(&self) -> bool {
        matches!(self.kind(), TokenKind::SectionHeader | TokenKind::Eof)
    }

    /// Attach the current token to `parent` and advance
    fn bump(&mut self, parent: NodeId) {
        let token = self.current();
        self.tree.push_terminal(parent, token);
        self.last = token;
        self.pos += 1;
    }

    fn report(&mut self, message: impl Into<String>) {
        let token = self.tokens.get(self.current());
        // the lexer already reported its own error tokens
        if token.kind != TokenKind::Error {
            self.markers.push(Marker::error(message, token.span(None)));
        }
    }

    fn file(&mut self) {
        let root = self.tree.root();

        while self.kind() != TokenKind::Eof {
            if self.kind() == TokenKind::SectionHeader {
                self.section(root);
            } else {
                self.report("content outside of any section");
                self.recover(root, Self::at_boundary);
            }
        }

        self.bump(root);
        self.tree.close_rule(root, self.last);
    }

    /// Wrap tokens in an error node until `stop` holds (always consumes at least one token)
    fn recover(&mut self, parent: NodeId, stop: impl Fn(&Self) -> bool) -> NodeId {
        let error = self.tree.open_rule(parent, RuleKind::Error, self.current());
        self.bump(error);

        while !self.at_boundary() && !stop(&*self) {
            self.bump(error);
        }

        self.tree.close_rule(error, self.last);
        error
    }

    fn section(&mut self, parent: NodeId) {
        let header = self.tokens.get(self.current());
        let kind = SectionKind::from_header(&header.text);
        if kind == SectionKind::Unknown {
            let message = format!("unknown section {}", header.text);
            self.report(message);
        }

        let section = self
            .tree
            .open_rule(parent, RuleKind::Section(kind), self.current());
        self.bump(section);

        while !self.at_boundary() {
            match kind {
                SectionKind::Include | SectionKind::OrderedInclude => self.include_file(section),
                SectionKind::Execute => self.execute_item(section),
                _ => self.entry(section),
            }
        }

        self.tree.close_rule(section, self.last);
    }

    fn include_file(&mut self, section: NodeId) {
        match self.kind() {
            TokenKind::String => {
                let file = self
                    .tree
                    .open_rule(section, RuleKind::IncludeFile, self.current());
                self.bump(file);
                self.tree.close_rule(file, self.last);
            }
            _ => {
                self.report("expected a quoted file name");
                self.recover(section, |parser| parser.kind() == TokenKind::String);
            }
        }
    }

    fn execute_item(&mut self, section: NodeId) {
        if self.kind() != TokenKind::Identifier {
            self.report("expected `module` or `module.testcase`");
            self.recover(section, |parser| parser.kind() == TokenKind::Identifier);
            return;
        }

        let item = self
            .tree
            .open_rule(section, RuleKind::ExecuteItem, self.current());
        self.bump(item);

        if self.kind() == TokenKind::Dot && self.kind_at(1) == TokenKind::Identifier {
            self.bump(item);
            self.bump(item);
        }

        if self.kind() == TokenKind::Semicolon {
            self.bump(item);
        }

        self.tree.close_rule(item, self.last);
    }

    /// Number of key tokens if an entry (`key :=` or `key &=`) starts here
    fn entry_key_len(&self) -> Option<usize> {
        if !matches!(
            self.kind(),
            TokenKind::Identifier | TokenKind::Star | TokenKind::Macro | TokenKind::TypedMacro
        ) {
            return None;
        }

        // key parts are written without spaces between them (`*.comp.param`, `a[1]`)
        let mut len = 1;
        while self.touches_previous(len)
            && matches!(
                self.kind_at(len),
                TokenKind::Identifier
                    | TokenKind::Star
                    | TokenKind::Dot
                    | TokenKind::Macro
                    | TokenKind::TypedMacro
                    | TokenKind::Integer
                    | TokenKind::LeftBracket
                    | TokenKind::RightBracket
                    | TokenKind::Minus
            )
        {
            len += 1;
        }

        matches!(
            self.kind_at(len),
            TokenKind::Assign | TokenKind::ConcatAssign
        )
        .then_some(len)
    }

    fn entry(&mut self, section: NodeId) {
        let Some(key_len) = self.entry_key_len() else {
            self.report("expected `name := value`");
            let error = self.recover(section, |parser| {
                parser.kind() == TokenKind::Semicolon || parser.entry_key_len().is_some()
            });
            // swallow the `;` that ended recovery
            if self.kind() == TokenKind::Semicolon {
                self.bump(error);
                self.tree.close_rule(error, self.last);
            }
            return;
        };

        let entry = self.tree.open_rule(section, RuleKind::Entry, self.current());
        let key = self.tree.open_rule(entry, RuleKind::Key, self.current());
        for _ in 0..key_len {
            self.bump(key);
        }
        self.tree.close_rule(key, self.last);

        // assignment operator
        self.bump(entry);

        if self.at_value_end(false) {
            self.report("missing value");
        } else {
            self.value(entry);
        }

        if self.kind() == TokenKind::Semicolon {
            self.bump(entry);
        }

        self.tree.close_rule(entry, self.last);
    }

    fn at_value_end(&self, consumed_any: bool) -> bool {
        self.at_boundary()
            || self.kind() == TokenKind::Semicolon
            || (consumed_any && self.entry_key_len().is_some())
    }

    fn value(&mut self, entry: NodeId) {
        let value = self.tree.open_rule(entry, RuleKind::Value, self.current());
        let mut consumed_any = false;

        while !self.at_value_end(consumed_any) {
            match self.kind() {
                TokenKind::LeftBrace => self.aggregate(value, 1),
                TokenKind::RightBrace => {
                    self.report("unmatched `}`");
                    self.bump(value);
                }
                _ => self.bump(value),
            }
            consumed_any = true;
        }

        self.tree.close_rule(value, self.last);
    }

    fn aggregate(&mut self, parent: NodeId, depth: usize) {
        if depth > MAX_NESTING {
            self.report(format!("`{{` nested deeper than {MAX_NESTING} levels"));
            self.skip_aggregate(parent);
            return;
        }

        let aggregate = self
            .tree
            .open_rule(parent, RuleKind::Aggregate, self.current());
        self.bump(aggregate);

        loop {
            match self.kind() {
                TokenKind::RightBrace => {
                    self.bump(aggregate);
                    break;
                }
                TokenKind::LeftBrace => self.aggregate(aggregate, depth + 1),
                TokenKind::SectionHeader | TokenKind::Eof => {
                    self.report("unclosed `{`");
                    break;
                }
                _ => self.bump(aggregate),
            }
        }

        self.tree.close_rule(aggregate, self.last);
    }

    /// Wrap a whole `{ ... }` in one flat error node
    fn skip_aggregate(&mut self, parent: NodeId) {
        let error = self.tree.open_rule(parent, RuleKind::Error, self.current());
        let mut open = 0usize;

        while !self.at_boundary() {
            match self.kind() {
                TokenKind::LeftBrace => open += 1,
                TokenKind::RightBrace => open = open.saturating_sub(1),
                _ => {}
            }
            self.bump(error);

            if open == 0 {
                break;
            }
        }

        self.tree.close_rule(error, self.last);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::syntax::lexer::lex;
    use pretty_assertions::assert_eq;

    fn parse_text(text: &str) -> (TokenStream, ParseTree, Vec<Marker>) {
        let (tokens, lex_markers) = lex(text);
        assert!(lex_markers.is_empty(), "{lex_markers:?}");
        let (tree, markers) = parse(&tokens);
        (tokens, tree, markers)
    }

    /// Concatenate all terminals in tree order, hidden tokens included
    fn reprint(tokens: &TokenStream, tree: &ParseTree, id: NodeId, out: &mut String) {
        if let Some(token) = tree.terminal_token(id) {
            for hidden in tokens.hidden_before(token) {
                out.push_str(&hidden.text);
            }
            out.push_str(&tokens.get(token).text);
        }
        for child in tree.children(id) {
            reprint(tokens, tree, *child, out);
        }
    }

    #[test]
    fn sections_and_entries() {
        let text = "[DEFINE]\nA := 1 + 2\nB := { x := 1, y := \"z\" };\n[EXECUTE]\nm.tc;\nm\n";
        let (tokens, tree, markers) = parse_text(text);
        assert!(markers.is_empty(), "{markers:?}");

        let sections: Vec<_> = tree.sections().map(|(_, kind)| kind).collect();
        assert_eq!(sections, vec![SectionKind::Define, SectionKind::Execute]);

        let (define, _) = tree.sections().next().expect("define section");
        let entries: Vec<_> = tree.child_rules(define, RuleKind::Entry).collect();
        assert_eq!(entries.len(), 2);

        let values: Vec<_> = entries
            .iter()
            .map(|entry| {
                let value = tree
                    .child_rules(*entry, RuleKind::Value)
                    .next()
                    .expect("value");
                tree.text(value, &tokens)
            })
            .collect();
        assert_eq!(values, vec!["1 + 2", "{ x := 1, y := \"z\" }"]);

        let (execute, _) = tree.sections().nth(1).expect("execute section");
        let items: Vec<_> = tree
            .child_rules(execute, RuleKind::ExecuteItem)
            .map(|item| tree.text(item, &tokens))
            .collect();
        assert_eq!(items, vec!["m.tc;", "m"]);
    }

    #[test]
    fn entries_without_semicolons() {
        let (tokens, tree, markers) =
            parse_text("[MODULE_PARAMETERS]\na := 1\n*.b := $X\nc &= \"s\"\n");
        assert!(markers.is_empty(), "{markers:?}");

        let (section, _) = tree.sections().next().expect("section");
        let keys: Vec<_> = tree
            .child_rules(section, RuleKind::Entry)
            .map(|entry| {
                let key = tree.child_rules(entry, RuleKind::Key).next().expect("key");
                tree.text(key, &tokens)
            })
            .collect();
        assert_eq!(keys, vec!["a", "*.b", "c"]);
    }

    #[test]
    fn includes() {
        let (tokens, tree, markers) = parse_text("[INCLUDE]\n\"a.cfg\"\n\"b.cfg\"\n");
        assert!(markers.is_empty(), "{markers:?}");

        let (section, kind) = tree.sections().next().expect("section");
        assert_eq!(kind, SectionKind::Include);
        let files: Vec<_> = tree
            .child_rules(section, RuleKind::IncludeFile)
            .map(|file| tree.text(file, &tokens))
            .collect();
        assert_eq!(files, vec!["\"a.cfg\"", "\"b.cfg\""]);
    }

    #[test]
    fn deep_aggregates_become_one_error_node() {
        let depth = MAX_NESTING + 50;
        let text = format!(
            "[MODULE_PARAMETERS]\np := {}1{};\nq := 2\n",
            "{".repeat(depth),
            "}".repeat(depth)
        );
        let (tokens, tree, markers) = parse_text(&text);

        let messages: Vec<_> = markers.iter().map(|marker| marker.message.as_str()).collect();
        assert_eq!(messages, vec!["`{` nested deeper than 128 levels"]);

        let (section, _) = tree.sections().next().expect("section");
        assert_eq!(tree.child_rules(section, RuleKind::Entry).count(), 2);

        let mut out = String::new();
        reprint(&tokens, &tree, tree.root(), &mut out);
        assert_eq!(out, text);
    }

    #[test]
    fn errors_are_recovered_losslessly() {
        let text = "x := 1\n[NOPE]\n  := 3;\n[MAIN_CONTROLLER]\nTCPPort := ;\nKillTimer := { 1\n";
        let (tokens, tree, markers) = parse_text(text);

        let messages: Vec<_> = markers.iter().map(|marker| marker.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "content outside of any section",
                "unknown section [NOPE]",
                "expected `name := value`",
                "missing value",
                "unclosed `{`",
            ]
        );

        let mut out = String::new();
        reprint(&tokens, &tree, tree.root(), &mut out);
        assert_eq!(out, text);
    }
}
