//! macro substitution and expression evaluation on raw value text
//!
//! ```text
//! expr    := concat
//! concat  := sum ("&" sum)*
//! sum     := term (("+" | "-") term)*
//! term    := unary (("*" | "/") unary)*
//! unary   := ("-" | "+") unary | primary
//! primary := integer | float | string | "(" expr ")"
//! ```
//!
//! Values using anything else (identifiers, aggregates, bit strings, ...) are not expressions and are left alone.
use crate::macros::MacroTable;
use crate::numeric::{NumericError, NumericValue};
use crate::syntax::{self, Token, TokenKind, MAX_NESTING};

/// Result of a successful evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluated {
    Number(NumericValue),
    /// string contents, unquoted and unescaped
    Text(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error(transparent)]
    Numeric(#[from] NumericError),
    #[error("operator `{operator}` cannot be applied to {lhs} and {rhs}")]
    TypeMismatch {
        operator: &'static str,
        lhs: &'static str,
        rhs: &'static str,
    },
    #[error("malformed expression")]
    Malformed,
    #[error("expression nested deeper than {} levels", MAX_NESTING)]
    TooDeep,
}

impl Evaluated {
    /// Canonical config-file text
    pub fn to_literal(&self) -> String {
        match self {
            Evaluated::Number(number) => number.to_string(),
            Evaluated::Text(text) => quote(text),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Evaluated::Number(_) => "a number",
            Evaluated::Text(_) => "a string",
        }
    }
}

/// Text with every macro reference replaced
#[derive(Debug, Clone, PartialEq)]
pub struct Substituted {
    pub text: String,
    /// names that had no binding and were replaced by nothing
    pub unresolved: Vec<String>,
}

/// Replace `$name`, `${name}` and `${name, type}` by their values
///
/// References inside comments are left untouched.
pub fn substitute(text: &str, macros: &MacroTable) -> Substituted {
    let (tokens, _) = syntax::lex(text);
    let mut result = Substituted {
        text: String::with_capacity(text.len()),
        unresolved: Vec::new(),
    };

    for token in tokens.iter() {
        let Some(reference) = token.macro_reference().filter(|_| !token.is_hidden()) else {
            result.text.push_str(&token.text);
            continue;
        };

        let value = match reference.type_name {
            Some(_) => macros.lookup_typed(reference.name),
            None => macros.lookup(reference.name),
        };

        match value {
            Some(value) => result.text.push_str(value),
            None => result.unresolved.push(reference.name.to_string()),
        }
    }

    tracing::trace!(from = text, to = %result.text, "substituted");
    result
}

/// Evaluate `text` if it is an expression
///
/// `Ok(None)` means the text is not an expression and should be used verbatim.
pub fn evaluate_text(text: &str) -> Result<Option<Evaluated>, ExprError> {
    let (tokens, markers) = syntax::lex(text);
    if !markers.is_empty() {
        return Ok(None);
    }

    let significant: Vec<&Token> = tokens
        .iter()
        .filter(|token| !token.is_hidden() && token.kind != TokenKind::Eof)
        .collect();

    evaluate(&significant)
}

pub fn evaluate(tokens: &[&Token]) -> Result<Option<Evaluated>, ExprError> {
    let is_expression = !tokens.is_empty()
        && tokens.iter().all(|token| {
            matches!(
                token.kind,
                TokenKind::Integer
                    | TokenKind::Float
                    | TokenKind::String
                    | TokenKind::Plus
                    | TokenKind::Minus
                    | TokenKind::Star
                    | TokenKind::Slash
                    | TokenKind::Concat
                    | TokenKind::LeftParen
                    | TokenKind::RightParen
            )
        });

    if !is_expression {
        return Ok(None);
    }

    let mut evaluator = Evaluator {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = evaluator.expression()?;

    if evaluator.pos != tokens.len() {
        return Err(ExprError::Malformed);
    }

    Ok(Some(value))
}

struct Evaluator<'a, 't> {
    tokens: &'a [&'t Token],
    pos: usize,
    /// open parentheses and unary operators
    depth: usize,
}

impl<'a, 't> Evaluator<'a, 't> {
    fn peek(&self) -> Option<TokenKind> {
        self.tokens.get(self.pos).map(|token| token.kind)
    }

    fn advance(&mut self) -> Option<&'t Token> {
        let token = self.tokens.get(self.pos).copied();
        self.pos += 1;
        token
    }

    fn nested(
        &mut self,
        inner: impl FnOnce(&mut Self) -> Result<Evaluated, ExprError>,
    ) -> Result<Evaluated, ExprError> {
        if self.depth >= MAX_NESTING {
            return Err(ExprError::TooDeep);
        }

        self.depth += 1;
        let value = inner(self);
        self.depth -= 1;
        value
    }

    fn expression(&mut self) -> Result<Evaluated, ExprError> {
        let mut lhs = self.sum()?;

        while self.peek() == Some(TokenKind::Concat) {
            self.pos += 1;
            let rhs = self.sum()?;
            lhs = match (lhs, rhs) {
                (Evaluated::Text(mut lhs), Evaluated::Text(rhs)) => {
                    lhs.push_str(&rhs);
                    Evaluated::Text(lhs)
                }
                (lhs, rhs) => return Err(mismatch("&", &lhs, &rhs)),
            };
        }

        Ok(lhs)
    }

    fn sum(&mut self) -> Result<Evaluated, ExprError> {
        let mut lhs = self.term()?;

        while let Some(operator @ (TokenKind::Plus | TokenKind::Minus)) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            let symbol = if operator == TokenKind::Plus { "+" } else { "-" };
            let (lhs_number, rhs_number) = numbers(symbol, &mut lhs, &rhs)?;

            if operator == TokenKind::Plus {
                lhs_number.add(rhs_number);
            } else {
                lhs_number.sub(rhs_number);
            }
        }

        Ok(lhs)
    }

    fn term(&mut self) -> Result<Evaluated, ExprError> {
        let mut lhs = self.unary()?;

        while let Some(operator @ (TokenKind::Star | TokenKind::Slash)) = self.peek() {
            self.pos += 1;
            let rhs = self.unary()?;
            let symbol = if operator == TokenKind::Star { "*" } else { "/" };
            let (lhs_number, rhs_number) = numbers(symbol, &mut lhs, &rhs)?;

            if operator == TokenKind::Star {
                lhs_number.mul(rhs_number);
            } else {
                lhs_number.div(rhs_number)?;
            }
        }

        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Evaluated, ExprError> {
        match self.peek() {
            Some(TokenKind::Minus) => {
                self.pos += 1;
                match self.nested(Self::unary)? {
                    Evaluated::Number(mut number) => {
                        number.mul_int(-1);
                        Ok(Evaluated::Number(number))
                    }
                    Evaluated::Text(_) => Err(ExprError::TypeMismatch {
                        operator: "-",
                        lhs: "nothing",
                        rhs: "a string",
                    }),
                }
            }
            Some(TokenKind::Plus) => {
                self.pos += 1;
                self.nested(Self::unary)
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<Evaluated, ExprError> {
        let token = self.advance().ok_or(ExprError::Malformed)?;

        match token.kind {
            TokenKind::Integer | TokenKind::Float => {
                Ok(Evaluated::Number(token.text.parse::<NumericValue>()?))
            }
            TokenKind::String => Ok(Evaluated::Text(unquote(&token.text))),
            TokenKind::LeftParen => {
                let inner = self.nested(Self::expression)?;
                match self.advance() {
                    Some(close) if close.kind == TokenKind::RightParen => Ok(inner),
                    _ => Err(ExprError::Malformed),
                }
            }
            _ => Err(ExprError::Malformed),
        }
    }
}

fn numbers<'v>(
    operator: &'static str,
    lhs: &'v mut Evaluated,
    rhs: &'v Evaluated,
) -> Result<(&'v mut NumericValue, &'v NumericValue), ExprError> {
    match (lhs, rhs) {
        (Evaluated::Number(lhs), Evaluated::Number(rhs)) => Ok((lhs, rhs)),
        (lhs, rhs) => Err(mismatch(operator, lhs, rhs)),
    }
}

fn mismatch(operator: &'static str, lhs: &Evaluated, rhs: &Evaluated) -> ExprError {
    ExprError::TypeMismatch {
        operator,
        lhs: lhs.type_name(),
        rhs: rhs.type_name(),
    }
}

/// Contents of a string literal token
pub fn unquote(literal: &str) -> String {
    let inner = literal
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(literal);

    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('n') => result.push('\n'),
                Some('t') => result.push('\t'),
                Some(other) => result.push(other),
                None => result.push('\\'),
            },
            '"' if chars.peek() == Some(&'"') => {
                chars.next();
                result.push('"');
            }
            c => result.push(c),
        }
    }

    result
}

pub fn quote(text: &str) -> String {
    let mut result = String::with_capacity(text.len() + 2);
    result.push('"');
    for c in text.chars() {
        match c {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            '\n' => result.push_str("\\n"),
            '\t' => result.push_str("\\t"),
            c => result.push(c),
        }
    }
    result.push('"');
    result
}
