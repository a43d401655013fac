//! configuration file lexer
//!
//! Single pass, no backtracking beyond a few characters of lookahead. Every byte of the input ends up in exactly one
//! token, so concatenating all token texts reproduces the input.
use super::token::{Channel, Token, TokenKind, TokenStream};
use crate::diagnostics::Marker;

pub fn lex(text: &str) -> (TokenStream, Vec<Marker>) {
    let mut lexer = Lexer {
        text,
        pos: 0,
        line: 1,
        tokens: Vec::new(),
        markers: Vec::new(),
    };

    lexer.run();
    (TokenStream::new(lexer.tokens), lexer.markers)
}

struct Lexer<'a> {
    text: &'a str,
    pos: usize,
    line: usize,
    tokens: Vec<Token>,
    markers: Vec<Marker>,
}

impl<'a> Lexer<'a> {
    fn run(&mut self) {
        while let Some(c) = self.peek() {
            let start = self.pos;

            match c {
                c if c.is_whitespace() => {
                    self.eat_while(char::is_whitespace);
                    self.push(TokenKind::Whitespace, start);
                }
                '/' if self.peek_at(1) == Some('/') => self.line_comment(start),
                '#' => self.line_comment(start),
                '/' if self.peek_at(1) == Some('*') => self.block_comment(start),
                '[' => match self.section_header_len() {
                    Some(len) => {
                        self.pos += len;
                        self.push(TokenKind::SectionHeader, start);
                    }
                    None => self.single(TokenKind::LeftBracket),
                },
                '"' => self.string(start),
                '\'' => self.bit_string(start),
                '$' => self.macro_reference(start),
                ':' if self.peek_at(1) == Some('=') => self.double(TokenKind::Assign),
                '&' if self.peek_at(1) == Some('=') => self.double(TokenKind::ConcatAssign),
                '&' => self.single(TokenKind::Concat),
                '+' => self.single(TokenKind::Plus),
                '-' => self.single(TokenKind::Minus),
                '*' => self.single(TokenKind::Star),
                '/' => self.single(TokenKind::Slash),
                '.' => self.single(TokenKind::Dot),
                ',' => self.single(TokenKind::Comma),
                ';' => self.single(TokenKind::Semicolon),
                '{' => self.single(TokenKind::LeftBrace),
                '}' => self.single(TokenKind::RightBrace),
                ']' => self.single(TokenKind::RightBracket),
                '(' => self.single(TokenKind::LeftParen),
                ')' => self.single(TokenKind::RightParen),
                c if c.is_ascii_digit() => self.number(start),
                c if c.is_alphabetic() || c == '_' => {
                    self.eat_while(|c| c.is_alphanumeric() || c == '_');
                    self.push(TokenKind::Identifier, start);
                }
                c if c.is_ascii_punctuation() => self.single(TokenKind::Symbol),
                c => {
                    self.bump();
                    self.error(start, format!("unexpected character {c:?}"));
                }
            }
        }

        self.push(TokenKind::Eof, self.pos);
    }

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.text[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat_while(&mut self, predicate: impl Fn(char) -> bool) {
        while self.peek().is_some_and(&predicate) {
            self.bump();
        }
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        let channel = match kind {
            TokenKind::Whitespace | TokenKind::LineComment | TokenKind::BlockComment => {
                Channel::Hidden
            }
            _ => Channel::Default,
        };

        let text = &self.text[start..self.pos];
        self.tokens.push(Token {
            kind,
            text: text.to_string(),
            line: self.line,
            start,
            end: self.pos,
            channel,
        });
        self.line += text.matches('\n').count();
    }

    fn single(&mut self, kind: TokenKind) {
        let start = self.pos;
        self.bump();
        self.push(kind, start);
    }

    fn double(&mut self, kind: TokenKind) {
        let start = self.pos;
        self.bump();
        self.bump();
        self.push(kind, start);
    }

    /// Emit an [TokenKind::Error] token covering `start..pos` and report it
    fn error(&mut self, start: usize, message: String) {
        let line = self.line;
        self.push(TokenKind::Error, start);
        self.markers.push(Marker::error(
            message,
            crate::span::SourceSpan::new(None, line, start, self.pos),
        ));
    }

    fn line_comment(&mut self, start: usize) {
        self.eat_while(|c| c != '\n');
        self.push(TokenKind::LineComment, start);
    }

    fn block_comment(&mut self, start: usize) {
        self.pos += 2;
        match self.text[self.pos..].find("*/") {
            Some(end) => {
                self.pos += end + 2;
                self.push(TokenKind::BlockComment, start);
            }
            None => {
                self.pos = self.text.len();
                self.error(start, "unterminated block comment".to_string());
            }
        }
    }

    /// Length of a `[NAME]` header starting at `pos`, if there is one
    ///
    /// Headers must be the first thing on their line, which keeps `a[INDEX]` style values apart.
    fn section_header_len(&self) -> Option<usize> {
        let line_start = self.text[..self.pos].rfind('\n').map_or(0, |i| i + 1);
        if !self.text[line_start..self.pos].trim().is_empty() {
            return None;
        }

        let rest = &self.text[self.pos + 1..];
        let name_len = rest
            .find(|c: char| !(c.is_ascii_uppercase() || c == '_'))
            .unwrap_or(rest.len());

        let starts_with_letter = rest.starts_with(|c: char| c.is_ascii_uppercase());
        if starts_with_letter && rest[name_len..].starts_with(']') {
            Some(name_len + 2)
        } else {
            None
        }
    }

    fn string(&mut self, start: usize) {
        self.bump();
        loop {
            match self.bump() {
                None => {
                    self.error(start, "unterminated string literal".to_string());
                    return;
                }
                Some('\\') => {
                    self.bump();
                }
                // "" is an escaped quote
                Some('"') if self.peek() == Some('"') => {
                    self.bump();
                }
                Some('"') => break,
                Some(_) => {}
            }
        }

        self.push(TokenKind::String, start);
    }

    fn bit_string(&mut self, start: usize) {
        self.bump();
        self.eat_while(|c| c != '\'' && c != '\n');

        if self.peek() != Some('\'') {
            self.error(start, "unterminated bit string literal".to_string());
            return;
        }

        self.bump();
        if matches!(self.peek(), Some('B' | 'H' | 'O')) {
            self.bump();
        }
        self.push(TokenKind::BitString, start);
    }

    fn macro_reference(&mut self, start: usize) {
        self.bump();

        if self.peek() == Some('{') {
            let Some(close) = self.text[self.pos..].find(['}', '\n']) else {
                self.pos = self.text.len();
                self.error(start, "unterminated macro reference".to_string());
                return;
            };

            self.pos += close;
            if self.peek() != Some('}') {
                self.error(start, "unterminated macro reference".to_string());
                return;
            }
            self.bump();

            let body = &self.text[start + 2..self.pos - 1];
            let (name, kind) = match body.split_once(',') {
                Some((name, _type)) => (name, TokenKind::TypedMacro),
                None => (body, TokenKind::Macro),
            };

            if !is_identifier(name.trim()) {
                self.error(start, format!("invalid macro name {:?}", name.trim()));
                return;
            }

            self.push(kind, start);
            return;
        }

        if self.peek().is_some_and(|c| c.is_alphabetic() || c == '_') {
            self.eat_while(|c| c.is_alphanumeric() || c == '_');
            self.push(TokenKind::Macro, start);
        } else {
            self.error(start, "`$` must be followed by a macro name".to_string());
        }
    }

    fn number(&mut self, start: usize) {
        let mut kind = TokenKind::Integer;
        self.eat_while(|c| c.is_ascii_digit());

        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            kind = TokenKind::Float;
            self.bump();
            self.eat_while(|c| c.is_ascii_digit());
        }

        if matches!(self.peek(), Some('e' | 'E')) {
            let exponent_digit_at = match self.peek_at(1) {
                Some('+' | '-') => 2,
                _ => 1,
            };

            if self
                .peek_at(exponent_digit_at)
                .is_some_and(|c| c.is_ascii_digit())
            {
                kind = TokenKind::Float;
                self.pos += exponent_digit_at;
                self.eat_while(|c| c.is_ascii_digit());
            }
        }

        self.push(kind, start);
    }
}

pub(crate) fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(text: &str) -> Vec<TokenKind> {
        let (tokens, markers) = lex(text);
        assert!(markers.is_empty(), "{markers:?}");
        tokens
            .iter()
            .filter(|token| !token.is_hidden())
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn lossless() {
        let text = "[DEFINE]\n// comment\nA := 1 + 2.5 /* block */\n# hash\nB := \"x\\\"y\" & $A\n";
        let (tokens, _) = lex(text);
        let joined: String = tokens.iter().map(|token| token.text.as_str()).collect();
        assert_eq!(joined, text);
        assert_eq!(tokens.get(tokens.len() - 1).kind, TokenKind::Eof);
    }

    #[test]
    fn entries() {
        use TokenKind::*;
        assert_eq!(
            kinds("[MODULE_PARAMETERS]\nm.p := ${X, integer} * -3e2;"),
            vec![
                SectionHeader,
                Identifier,
                Dot,
                Identifier,
                Assign,
                TypedMacro,
                Star,
                Minus,
                Float,
                Semicolon,
                Eof
            ]
        );
    }

    #[test]
    fn header_only_at_line_start() {
        use TokenKind::*;
        assert_eq!(
            kinds("a[IDX] := '0101'B"),
            vec![Identifier, LeftBracket, Identifier, RightBracket, Assign, BitString, Eof]
        );
    }

    #[test]
    fn numbers() {
        use TokenKind::*;
        assert_eq!(kinds("1 1.5 1e3 1.5E-2 7."), vec![Integer, Float, Float, Float, Integer, Dot, Eof]);
    }

    #[test]
    fn line_numbers() {
        let (tokens, _) = lex("[A]\n\n  x := 1");
        let x = tokens.iter().find(|token| token.text == "x").expect("x token");
        assert_eq!(x.line, 3);
        assert_eq!(x.start, 7);
    }

    #[test]
    fn errors_are_reported_and_kept() {
        let (tokens, markers) = lex("a := \"open");
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].message, "unterminated string literal");
        assert!(tokens.iter().any(|token| token.kind == TokenKind::Error));

        let (_, markers) = lex("$ x");
        assert_eq!(markers.len(), 1);
    }
}
