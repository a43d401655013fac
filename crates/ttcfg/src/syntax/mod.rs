//! lexer and parser for configuration files
//!
//! The rest of the crate only talks to a [Grammar]: something that turns text into a [TokenStream] and a token
//! stream into a [ParseTree]. [CfgGrammar] is the built-in implementation.
mod lexer;
mod parser;
mod token;
mod tree;

pub(crate) use lexer::is_identifier;
pub use token::{Channel, MacroReference, Token, TokenKind, TokenStream};
pub use tree::{Node, NodeData, NodeId, ParseTree, RuleKind};

use crate::diagnostics::Marker;

/// Deepest nesting of parentheses, aggregates and macro references that is followed
pub const MAX_NESTING: usize = 128;

/// Source of tokens and parse trees
///
/// Only whole files go through the grammar given to [crate::analyzer::FileAnalyzer]. Macro values and expressions
/// are re-lexed with the built-in grammar ([lex]), so a custom grammar has to produce the same value tokens.
pub trait Grammar {
    fn lex(&self, text: &str) -> (TokenStream, Vec<Marker>);
    fn parse(&self, tokens: &TokenStream) -> (ParseTree, Vec<Marker>);
}

/// Hand written grammar for TTCN-3 style `.cfg` files
#[derive(Debug, Default, Clone, Copy)]
pub struct CfgGrammar;

impl Grammar for CfgGrammar {
    fn lex(&self, text: &str) -> (TokenStream, Vec<Marker>) {
        lexer::lex(text)
    }

    fn parse(&self, tokens: &TokenStream) -> (ParseTree, Vec<Marker>) {
        parser::parse(tokens)
    }
}

/// Tokenize with the built-in grammar
pub fn lex(text: &str) -> (TokenStream, Vec<Marker>) {
    lexer::lex(text)
}
