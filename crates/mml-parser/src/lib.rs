pub mod ast;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::{IdentifierRef, Literal, Node, PresetDecl, Script};
pub use lexer::lex;
pub use parser::parse;
pub use token::{Keyword, Operator, Token, TokenKind};

use mml_core::MmlError;

pub fn parse_source(source: &str) -> Result<Script, MmlError> {
    let tokens = lex(source)?;
    parse(&tokens)
}
