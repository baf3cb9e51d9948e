//! A small Lisp: scanner, reader, lexically scoped environments and a
//! recursive evaluator with type-checked builtins.

pub mod errors;
pub mod parser;
pub mod run;
pub mod scanner;
pub mod treewalk;
#[cfg(feature = "web")]
pub mod web;

pub use errors::{Arity, Error, EvalError, SyntaxError};
pub use parser::{parse, parse_program, Expr, Keyword};
pub use scanner::{scan, Token, TokenKind};
pub use treewalk::{apply, eval, new_env, Environment};
