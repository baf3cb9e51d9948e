use crate::parser::Keyword;
use std::fmt;
use thiserror::Error;

/// Number of arguments a procedure accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    #[must_use]
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exactly(n) => count == n,
            Arity::AtLeast(n) => count >= n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exactly(n) => write!(f, "{n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyntaxError {
    #[error("Syntax Error: unexpected end of input")]
    UnexpectedEof,
    #[error("Syntax Error: Line {line}: missing closing parenthesis")]
    MissingCloseParen { line: usize },
    #[error("Syntax Error: Line {line}: unexpected ')'")]
    UnexpectedCloseParen { line: usize },
    #[error("Syntax Error: Line {line}: unterminated string literal")]
    UnterminatedString { line: usize },
    #[error("Syntax Error: Line {line}: malformed number literal '{text}'")]
    MalformedNumber { text: String, line: usize },
    #[error("Syntax Error: Line {line}: unexpected input after expression")]
    TrailingInput { line: usize },
    #[error("Syntax Error: wrong number of arguments to '{0}'")]
    FormArity(Keyword),
    #[error("Syntax Error: cannot assign to a literal in '{0}'")]
    NotASymbol(Keyword),
    #[error("Syntax Error: lambda parameters must be symbols, got {0}")]
    BadParameter(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error("'{0}' is not defined")]
    UndefinedSymbol(String),
    #[error("Type Error: '{procedure}' received {received}, expected {expected}")]
    Type {
        procedure: String,
        expected: &'static str,
        received: &'static str,
    },
    #[error("Arity Error: '{procedure}' expects {expected} argument(s), got {actual}")]
    Arity {
        procedure: String,
        expected: Arity,
        actual: usize,
    },
    #[error("{0} is not callable")]
    NotCallable(String),
}

#[derive(Debug, PartialEq, Error)]
pub enum Error {
    #[error("Error (I/O): {0}")]
    Io(String),
    #[error("Error (parsing): {0}")]
    Parse(#[from] SyntaxError),
    #[error("Error (eval): {0}")]
    Eval(#[from] EvalError),
}
