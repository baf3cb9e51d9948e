use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    OpenParen,
    CloseParen,
    Symbol,
    NumberLiteral,
    StringLiteral,
    Comment,
    NewLine,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub line: usize,
    pub kind: TokenKind,
    pub text: String,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Eof => write!(f, "<EOF>"),
            TokenKind::NewLine => write!(f, "<NewLine>"),
            TokenKind::OpenParen => write!(f, "<Open Paren>"),
            TokenKind::CloseParen => write!(f, "<Close Paren>"),
            kind => write!(f, "<{kind:?}: {}>", self.text),
        }
    }
}

/// Lexical states. Each one consumes code points and names its successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    Space,
    Comment,
    Str,
    Number,
    Fraction,
    Symbol,
}

/// Hand-rolled state machine over the code points of `input`.
///
/// Iterating yields every token up to and including the final `Eof`. Newlines
/// and comments are tracked for line numbers but never handed out.
pub struct Scanner<'a> {
    input: &'a str,
    start: usize,
    pos: usize,
    width: usize,
    line: usize,
    token_line: usize,
    state: Option<State>,
    pending: Option<Token>,
}

impl<'a> Scanner<'a> {
    #[must_use]
    pub fn new(input: &'a str) -> Self {
        Scanner {
            input,
            start: 0,
            pos: 0,
            width: 0,
            line: 1,
            token_line: 1,
            state: Some(State::Start),
            pending: None,
        }
    }

    fn next_char(&mut self) -> Option<char> {
        let Some(c) = self.input[self.pos..].chars().next() else {
            self.width = 0;
            return None;
        };
        self.width = c.len_utf8();
        self.pos += self.width;
        Some(c)
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn backup(&mut self) {
        self.pos -= self.width;
        self.width = 0;
    }

    fn ignore(&mut self) {
        self.start = self.pos;
    }

    fn emit(&mut self, kind: TokenKind) {
        self.emit_span(kind, self.start, self.pos);
    }

    fn emit_span(&mut self, kind: TokenKind, from: usize, to: usize) {
        self.pending = Some(Token {
            line: self.token_line,
            kind,
            text: self.input[from..to].to_string(),
        });
        self.start = self.pos;
    }

    fn step(&mut self, state: State) -> Option<State> {
        match state {
            State::Start => self.lex_start(),
            State::Space => self.lex_space(),
            State::Comment => self.lex_comment(),
            State::Str => self.lex_string(),
            State::Number => self.lex_number(),
            State::Fraction => self.lex_fraction(),
            State::Symbol => self.lex_symbol(),
        }
    }

    fn lex_start(&mut self) -> Option<State> {
        self.token_line = self.line;
        let Some(c) = self.next_char() else {
            self.emit(TokenKind::Eof);
            return None;
        };
        let next = match c {
            '\n' => {
                self.emit(TokenKind::NewLine);
                self.line += 1;
                State::Start
            }
            c if c.is_whitespace() => State::Space,
            '(' => {
                self.emit(TokenKind::OpenParen);
                State::Start
            }
            ')' => {
                self.emit(TokenKind::CloseParen);
                State::Start
            }
            ';' => State::Comment,
            '"' => State::Str,
            '.' if self.peek().is_some_and(|n| n.is_ascii_digit()) => State::Fraction,
            '-' if self.peek().is_some_and(|n| n.is_ascii_digit() || n == '.') => State::Number,
            c if c.is_ascii_digit() => State::Number,
            _ => State::Symbol,
        };
        Some(next)
    }

    fn lex_space(&mut self) -> Option<State> {
        while self.peek().is_some_and(|c| c.is_whitespace() && c != '\n') {
            self.next_char();
        }
        self.ignore();
        Some(State::Start)
    }

    fn lex_comment(&mut self) -> Option<State> {
        while self.peek().is_some_and(|c| c != '\n') {
            self.next_char();
        }
        self.emit(TokenKind::Comment);
        Some(State::Start)
    }

    fn lex_string(&mut self) -> Option<State> {
        match self.next_char() {
            Some('"') => {
                // drop both quotes from the token text
                self.emit_span(TokenKind::StringLiteral, self.start + 1, self.pos - 1);
                Some(State::Start)
            }
            Some('\\') => {
                if self.next_char() == Some('\n') {
                    self.line += 1;
                }
                Some(State::Str)
            }
            Some('\n') => {
                self.line += 1;
                Some(State::Str)
            }
            Some(_) => Some(State::Str),
            None => {
                // the text keeps its opening quote so readers can tell this
                // apart from a clean end of input
                self.emit(TokenKind::Eof);
                None
            }
        }
    }

    fn lex_number(&mut self) -> Option<State> {
        match self.next_char() {
            Some(c) if c.is_ascii_digit() => Some(State::Number),
            Some('.') => Some(State::Fraction),
            _ => {
                self.backup();
                self.emit(TokenKind::NumberLiteral);
                Some(State::Start)
            }
        }
    }

    fn lex_fraction(&mut self) -> Option<State> {
        match self.next_char() {
            Some(c) if c.is_ascii_digit() => Some(State::Fraction),
            _ => {
                self.backup();
                self.emit(TokenKind::NumberLiteral);
                Some(State::Start)
            }
        }
    }

    fn lex_symbol(&mut self) -> Option<State> {
        match self.next_char() {
            Some(c) if is_delimiter(c) => {
                self.backup();
                self.emit(TokenKind::Symbol);
                Some(State::Start)
            }
            Some(_) => Some(State::Symbol),
            None => {
                self.emit(TokenKind::Symbol);
                Some(State::Start)
            }
        }
    }
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '"' | ';')
}

impl Iterator for Scanner<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(token) = self.pending.take() {
                match token.kind {
                    TokenKind::NewLine | TokenKind::Comment => continue,
                    _ => return Some(token),
                }
            }
            let state = self.state?;
            self.state = self.step(state);
        }
    }
}

/// Scans all of `source`, ending with an `Eof` token.
#[must_use]
pub fn scan(source: &str) -> Vec<Token> {
    Scanner::new(source).collect()
}
