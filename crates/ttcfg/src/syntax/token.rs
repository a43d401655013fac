//! tokens and token streams
use crate::span::SourceSpan;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenKind {
    Whitespace,
    LineComment,
    BlockComment,
    /// `[NAME]` at the start of a line
    SectionHeader,
    Identifier,
    Integer,
    Float,
    String,
    /// `'0101'B`, `'FF'H`, `'00'O`
    BitString,
    /// `$name` or `${name}`
    Macro,
    /// `${name, type}`
    TypedMacro,
    Assign,
    ConcatAssign,
    Concat,
    Plus,
    Minus,
    Star,
    Slash,
    Dot,
    Comma,
    Semicolon,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    LeftParen,
    RightParen,
    /// Any other ASCII punctuation (`|`, `?`, `!`, ...)
    Symbol,
    Error,
    Eof,
}

/// Tokens on the hidden channel are kept for reprinting but skipped by the parser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Channel {
    Default,
    Hidden,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// 1-based line of the first character
    pub line: usize,
    /// Byte offset of the first character
    pub start: usize,
    /// Byte offset after the last character
    pub end: usize,
    pub channel: Channel,
}

impl Token {
    pub fn is_hidden(&self) -> bool {
        self.channel == Channel::Hidden
    }

    pub fn is_macro(&self) -> bool {
        matches!(self.kind, TokenKind::Macro | TokenKind::TypedMacro)
    }

    pub fn span(&self, file: Option<&Path>) -> SourceSpan {
        SourceSpan::new(file.map(Path::to_path_buf), self.line, self.start, self.end)
    }

    /// Name (and declared type) of a macro token
    pub fn macro_reference(&self) -> Option<MacroReference<'_>> {
        if !self.is_macro() {
            return None;
        }

        let body = self.text.strip_prefix('$')?;
        let body = match body.strip_prefix('{') {
            Some(braced) => braced.strip_suffix('}')?,
            None => body,
        };

        let (name, type_name) = match body.split_once(',') {
            Some((name, type_name)) => (name.trim(), Some(type_name.trim())),
            None => (body.trim(), None),
        };

        Some(MacroReference { name, type_name })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacroReference<'t> {
    pub name: &'t str,
    /// Advisory only, never checked against the value
    pub type_name: Option<&'t str>,
}

/// All tokens of one text, hidden ones included, terminated by [TokenKind::Eof]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TokenStream {
    tokens: Vec<Token>,
}

impl TokenStream {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens }
    }

    pub fn get(&self, index: usize) -> &Token {
        &self.tokens[index]
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter()
    }

    /// Indices of all tokens on the default channel
    pub fn significant(&self) -> impl Iterator<Item = usize> + '_ {
        self.tokens
            .iter()
            .enumerate()
            .filter(|(_, token)| !token.is_hidden())
            .map(|(index, _)| index)
    }

    /// Hidden tokens directly preceding `index` (back to the previous default-channel token)
    pub fn hidden_before(&self, index: usize) -> &[Token] {
        let first = self.tokens[..index]
            .iter()
            .rposition(|token| !token.is_hidden())
            .map_or(0, |previous| previous + 1);

        &self.tokens[first..index]
    }

    /// Source text from token `start` through token `stop`, hidden tokens included
    pub fn text(&self, start: usize, stop: usize) -> String {
        if stop < start {
            return String::new();
        }

        self.tokens[start..=stop]
            .iter()
            .map(|token| token.text.as_str())
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn macro_token(kind: TokenKind, text: &str) -> Token {
        Token {
            kind,
            text: text.to_string(),
            line: 1,
            start: 0,
            end: text.len(),
            channel: Channel::Default,
        }
    }

    #[test]
    fn macro_references() {
        let cases = [
            (TokenKind::Macro, "$name", "name", None),
            (TokenKind::Macro, "${ name }", "name", None),
            (TokenKind::TypedMacro, "${name, integer}", "name", Some("integer")),
            (TokenKind::TypedMacro, "${name,charstring}", "name", Some("charstring")),
        ];

        for (kind, text, name, type_name) in cases {
            let token = macro_token(kind, text);
            assert_eq!(
                token.macro_reference(),
                Some(MacroReference { name, type_name }),
                "{text}"
            );
        }

        assert_eq!(macro_token(TokenKind::Identifier, "name").macro_reference(), None);
    }
}
