//! Parser for loopjit source fragments.
//!
//! A fragment is one function whose body calls the recognized array
//! operations with inline lambdas:
//!
//! ```text
//! fn sum_array(a) {
//!     map(|x| x * 2, a);
//!     elementwise(|x, y| x + y, a, a);
//!     return reduce(|x, y| x + y, map(|x| x / 4, a));
//! }
//! ```
//!
//! The result is an untyped [`FunctionDef`]; types are attached later from
//! the call-site signature.

mod lexer;
mod parser;

use loopjit_ir::{FunctionDef, Span};

pub use lexer::{lex, Token, TokenKind};
pub use parser::Parser;

/// Error produced while lexing or parsing a fragment.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unrecognized character")]
    InvalidToken { span: Span },
    #[error("expected {expected}, found `{found}`")]
    UnexpectedToken {
        expected: &'static str,
        found: String,
        span: Span,
    },
    #[error("expected {expected}, found end of input")]
    UnexpectedEof { expected: &'static str, span: Span },
    #[error("integer literal `{text}` does not fit in 64 bits")]
    InvalidLiteral { text: String, span: Span },
    #[error("left-hand side of `=` must be a name or an element access")]
    InvalidAssignTarget { span: Span },
    #[error("unexpected input after the function body")]
    TrailingInput { span: Span },
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::InvalidToken { span }
            | ParseError::UnexpectedToken { span, .. }
            | ParseError::UnexpectedEof { span, .. }
            | ParseError::InvalidLiteral { span, .. }
            | ParseError::InvalidAssignTarget { span }
            | ParseError::TrailingInput { span } => *span,
        }
    }
}

/// Parse a source fragment containing exactly one function.
pub fn parse_function(source: &str) -> Result<FunctionDef, ParseError> {
    let tokens = lex(source)?;
    let mut parser = Parser::new(source, &tokens);
    let function = parser.function()?;
    parser.expect_end()?;
    Ok(function)
}
