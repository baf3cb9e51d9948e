use crate::errors::SyntaxError;
use crate::scanner::{Scanner, Token, TokenKind};
use crate::treewalk::builtin::NativeProcedure;
use crate::treewalk::Closure;
use internment::Intern;
use std::fmt;
use std::iter::Peekable;
use std::rc::Rc;
use std::str::FromStr;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Keyword {
    Quote,
    If,
    Define,
    Set,
    Lambda,
    Begin,
}

impl FromStr for Keyword {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "quote" => Ok(Keyword::Quote),
            "if" => Ok(Keyword::If),
            "define" => Ok(Keyword::Define),
            "set!" => Ok(Keyword::Set),
            "lambda" => Ok(Keyword::Lambda),
            "begin" => Ok(Keyword::Begin),
            _ => Err(format!("Not a keyword: {s}")),
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Keyword::Quote => write!(f, "quote"),
            Keyword::If => write!(f, "if"),
            Keyword::Define => write!(f, "define"),
            Keyword::Set => write!(f, "set!"),
            Keyword::Lambda => write!(f, "lambda"),
            Keyword::Begin => write!(f, "begin"),
        }
    }
}

/// A program tree node, which is also the runtime value type.
#[derive(Debug, Clone, Default)]
pub enum Expr {
    Number(f64),
    Symbol(Intern<String>),
    Str(Rc<String>),
    Bool(bool),
    List(Vec<Expr>),
    Closure(Rc<Closure>),
    Native(Rc<NativeProcedure>),
    /// Result of forms that produce nothing to print, such as `define`.
    #[default]
    Unspecified,
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Expr::Number(a), Expr::Number(b)) => a == b,
            (Expr::Symbol(a), Expr::Symbol(b)) => a == b,
            (Expr::Str(a), Expr::Str(b)) => a == b,
            (Expr::Bool(a), Expr::Bool(b)) => a == b,
            (Expr::List(a), Expr::List(b)) => a == b,
            (Expr::Closure(a), Expr::Closure(b)) => Rc::ptr_eq(a, b),
            (Expr::Native(a), Expr::Native(b)) => Rc::ptr_eq(a, b),
            (Expr::Unspecified, Expr::Unspecified) => true,
            _ => false,
        }
    }
}

impl Expr {
    #[must_use]
    pub fn symbol(name: &str) -> Self {
        Expr::Symbol(Intern::new(name.to_string()))
    }

    #[must_use]
    pub fn string(text: &str) -> Self {
        Expr::Str(Rc::new(text.to_string()))
    }

    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::Number(_) => "Number",
            Expr::Symbol(_) => "Symbol",
            Expr::Str(_) => "String",
            Expr::Bool(_) => "Boolean",
            Expr::List(_) => "List",
            Expr::Closure(_) | Expr::Native(_) => "Procedure",
            Expr::Unspecified => "Unspecified",
        }
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(v) => write!(f, "{v}"),
            Expr::Symbol(s) => write!(f, "{s}"),
            Expr::Str(v) => write!(f, "\"{}\"", escape(v)),
            Expr::Bool(v) => write!(f, "{}", if *v { "#t" } else { "#f" }),
            Expr::List(v) => {
                write!(f, "(")?;
                if let Some((first, rest)) = v.split_first() {
                    write!(f, "{first}")?;
                    for el in rest {
                        write!(f, " {el}")?;
                    }
                }
                write!(f, ")")
            }
            Expr::Closure(_) => write!(f, "#[closure]"),
            Expr::Native(proc) => write!(f, "#[built-in procedure {}]", proc.name()),
            Expr::Unspecified => Ok(()),
        }
    }
}

/// Builds expression trees from the token stream of a [`Scanner`].
pub struct Reader<'a> {
    tokens: Peekable<Scanner<'a>>,
}

impl<'a> Reader<'a> {
    #[must_use]
    pub fn new(source: &'a str) -> Self {
        Reader {
            tokens: Scanner::new(source).peekable(),
        }
    }

    /// True once only a clean end of input remains.
    pub fn at_end(&mut self) -> bool {
        match self.tokens.peek() {
            None => true,
            Some(token) => token.kind == TokenKind::Eof && token.text.is_empty(),
        }
    }

    pub fn read_expression(&mut self) -> Result<Expr, SyntaxError> {
        let Some(token) = self.tokens.next() else {
            return Err(SyntaxError::UnexpectedEof);
        };
        match token.kind {
            TokenKind::OpenParen => self.read_list(token.line),
            TokenKind::CloseParen => Err(SyntaxError::UnexpectedCloseParen { line: token.line }),
            TokenKind::Eof => Err(end_of_input(&token)),
            _ => read_atom(token),
        }
    }

    fn read_list(&mut self, open_line: usize) -> Result<Expr, SyntaxError> {
        let mut items = Vec::new();
        loop {
            let next = self
                .tokens
                .peek()
                .map(|t| (t.kind, t.line, t.text.starts_with('"')));
            match next {
                Some((TokenKind::CloseParen, _, _)) => {
                    self.tokens.next();
                    return Ok(Expr::List(items));
                }
                Some((TokenKind::Eof, line, true)) => {
                    return Err(SyntaxError::UnterminatedString { line })
                }
                Some((TokenKind::Eof, _, false)) | None => {
                    return Err(SyntaxError::MissingCloseParen { line: open_line })
                }
                Some(_) => items.push(self.read_expression()?),
            }
        }
    }
}

fn end_of_input(token: &Token) -> SyntaxError {
    if token.text.starts_with('"') {
        SyntaxError::UnterminatedString { line: token.line }
    } else {
        SyntaxError::UnexpectedEof
    }
}

fn read_atom(token: Token) -> Result<Expr, SyntaxError> {
    match token.kind {
        TokenKind::StringLiteral => Ok(Expr::Str(Rc::new(unescape(&token.text)))),
        TokenKind::NumberLiteral => match token.text.parse::<f64>() {
            Ok(num) => Ok(Expr::Number(num)),
            Err(_) => Err(SyntaxError::MalformedNumber {
                text: token.text,
                line: token.line,
            }),
        },
        _ => Ok(match token.text.as_str() {
            "#t" => Expr::Bool(true),
            "#f" => Expr::Bool(false),
            _ => Expr::Symbol(Intern::new(token.text)),
        }),
    }
}

/// Reads exactly one expression from `code`.
pub fn parse(code: &str) -> Result<Expr, SyntaxError> {
    let mut reader = Reader::new(code);
    if reader.at_end() {
        return Err(SyntaxError::UnexpectedEof);
    }
    let expr = reader.read_expression()?;
    if reader.at_end() {
        return Ok(expr);
    }
    let line = reader.tokens.peek().map_or(0, |t| t.line);
    reader.read_expression()?;
    Err(SyntaxError::TrailingInput { line })
}

/// Reads every top-level expression in `code`.
pub fn parse_program(code: &str) -> Result<Vec<Expr>, SyntaxError> {
    let mut reader = Reader::new(code);
    let mut expressions = Vec::new();
    while !reader.at_end() {
        expressions.push(reader.read_expression()?);
    }
    Ok(expressions)
}
