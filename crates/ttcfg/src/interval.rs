//! lexical intervals for incremental re-lexing
//!
//! An [IntervalTree] partitions one file into nested intervals: the whole file, each section, and the structural
//! blocks (`{ ... }`, `( ... )`, multi-line comments) inside them. After a local edit an editor only needs to
//! re-lex the smallest interval enclosing the edit ([IntervalTree::enclosing]).
//!
//! Intervals are stored in an arena; the detector keeps its open intervals as a stack of indices.
use crate::section::SectionKind;
use crate::syntax::{self, TokenKind, TokenStream};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct IntervalId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum IntervalType {
    Root,
    Section,
    Brace,
    Parenthesis,
    Comment,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntervalNode {
    pub parent: Option<IntervalId>,
    pub interval_type: IntervalType,
    pub kind: SectionKind,
    pub start_offset: usize,
    pub start_line: usize,
    /// inclusive
    pub end_offset: usize,
    pub end_line: usize,
    pub erroneous: bool,
    pub children: Vec<IntervalId>,
}

impl IntervalNode {
    /// Not a recognized section: a block, a comment or a section with an unknown header
    pub fn is_structural(&self) -> bool {
        self.kind == SectionKind::Unknown
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntervalTree {
    nodes: Vec<IntervalNode>,
}

impl IntervalTree {
    pub fn root(&self) -> IntervalId {
        IntervalId(0)
    }

    pub fn node(&self, id: IntervalId) -> &IntervalNode {
        &self.nodes[id.0]
    }

    pub fn children(&self, id: IntervalId) -> &[IntervalId] {
        &self.node(id).children
    }

    pub fn iter(&self) -> impl Iterator<Item = (IntervalId, &IntervalNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (IntervalId(index), node))
    }

    /// Smallest interval containing the byte range `start..end`
    pub fn enclosing(&self, start: usize, end: usize) -> IntervalId {
        let mut current = self.root();

        'descend: loop {
            for child in self.children(current) {
                let node = self.node(*child);
                if node.start_offset <= start && end <= node.end_offset + 1 {
                    current = *child;
                    continue 'descend;
                }
            }
            return current;
        }
    }
}

/// Builds an [IntervalTree] while walking a file's tokens
#[derive(Debug)]
pub struct IntervalDetector {
    nodes: Vec<IntervalNode>,
    stack: Vec<IntervalId>,
    file_length: usize,
    last_line: usize,
}

impl IntervalDetector {
    pub fn new(file_length: usize, last_line: usize) -> Self {
        let root = IntervalNode {
            parent: None,
            interval_type: IntervalType::Root,
            kind: SectionKind::Unknown,
            start_offset: 0,
            start_line: 1,
            end_offset: file_length.saturating_sub(1),
            end_line: last_line,
            erroneous: false,
            children: Vec::new(),
        };

        Self {
            nodes: vec![root],
            stack: vec![IntervalId(0)],
            file_length,
            last_line,
        }
    }

    /// Interval currently open at the top of the stack
    pub fn current(&self) -> IntervalId {
        *self.stack.last().unwrap_or(&IntervalId(0))
    }

    /// Open a child of the current interval and make it current
    pub fn push_interval(
        &mut self,
        offset: usize,
        line: usize,
        interval_type: IntervalType,
        kind: SectionKind,
    ) -> IntervalId {
        let parent = self.current();
        let id = IntervalId(self.nodes.len());

        self.nodes.push(IntervalNode {
            parent: Some(parent),
            interval_type,
            kind,
            start_offset: offset,
            start_line: line,
            end_offset: offset,
            end_line: line,
            erroneous: false,
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        self.stack.push(id);

        tracing::trace!(?id, ?interval_type, %kind, offset, "push interval");
        id
    }

    /// Close the current interval at `offset` (inclusive); the root is never popped
    pub fn pop_interval(&mut self, offset: usize, line: usize) {
        if self.stack.len() <= 1 {
            return;
        }

        if let Some(id) = self.stack.pop() {
            let node = &mut self.nodes[id.0];
            node.end_offset = offset.max(node.start_offset);
            node.end_line = line.max(node.start_line);
            tracing::trace!(?id, offset, "pop interval");
        }
    }

    pub fn mark_current_erroneous(&mut self) {
        let current = self.current();
        self.nodes[current.0].erroneous = true;
    }

    /// Force-close everything still open at end of file
    ///
    /// Open structural intervals are marked erroneous.
    pub fn handle_final_correction(&mut self) {
        while self.stack.len() > 1 {
            if self.nodes[self.current().0].is_structural() {
                self.mark_current_erroneous();
            }
            self.pop_interval(self.file_length.saturating_sub(1), self.last_line);
        }
    }

    pub fn finish(mut self) -> IntervalTree {
        self.handle_final_correction();
        IntervalTree { nodes: self.nodes }
    }

    /// Run the detector over an already lexed file
    pub fn detect(text: &str, tokens: &TokenStream) -> IntervalTree {
        let lines = LineIndex::new(text);
        let mut detector = IntervalDetector::new(text.len(), lines.line_of(text.len()));

        for token in tokens.iter() {
            match token.kind {
                TokenKind::SectionHeader => {
                    detector.close_section(token.start, &lines);
                    let kind = SectionKind::from_header(&token.text);
                    detector.push_interval(token.start, token.line, IntervalType::Section, kind);
                }
                TokenKind::LeftBrace => {
                    detector.push_interval(
                        token.start,
                        token.line,
                        IntervalType::Brace,
                        SectionKind::Unknown,
                    );
                }
                TokenKind::LeftParen => {
                    detector.push_interval(
                        token.start,
                        token.line,
                        IntervalType::Parenthesis,
                        SectionKind::Unknown,
                    );
                }
                TokenKind::RightBrace => detector.close(IntervalType::Brace, token.start, token.line),
                TokenKind::RightParen => {
                    detector.close(IntervalType::Parenthesis, token.start, token.line)
                }
                TokenKind::BlockComment if token.text.contains('\n') => {
                    detector.push_interval(
                        token.start,
                        token.line,
                        IntervalType::Comment,
                        SectionKind::Unknown,
                    );
                    let last = token.end.saturating_sub(1);
                    detector.pop_interval(last, lines.line_of(last));
                }
                _ => {}
            }
        }

        detector.finish()
    }

    /// Close the structural interval of `interval_type` ending at `offset`
    fn close(&mut self, interval_type: IntervalType, offset: usize, line: usize) {
        if self.nodes[self.current().0].interval_type == interval_type {
            self.pop_interval(offset, line);
        } else {
            // stray closing delimiter
            self.mark_current_erroneous();
        }
    }

    /// End whatever is open before a new section header at `offset`
    fn close_section(&mut self, offset: usize, lines: &LineIndex) {
        let last = offset.saturating_sub(1);
        while self.stack.len() > 1 {
            if self.nodes[self.current().0].is_structural() {
                self.mark_current_erroneous();
            }
            self.pop_interval(last, lines.line_of(last));
        }
    }
}

/// Intervals of `text`, lexed with the built-in grammar
pub fn detect_intervals(text: &str) -> IntervalTree {
    let (tokens, _) = syntax::lex(text);
    IntervalDetector::detect(text, &tokens)
}

struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(text.match_indices('\n').map(|(index, _)| index + 1));
        Self { line_starts }
    }

    /// 1-based line of a byte offset
    fn line_of(&self, offset: usize) -> usize {
        self.line_starts.partition_point(|start| *start <= offset).max(1)
    }
}
