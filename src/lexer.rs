use crate::error::{Error, Span};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenKind {
    // Literals
    Number,
    Identifier,

    // Single-character tokens
    Plus,
    Minus,
    Multiply,
    Divide,
    Power,
    #[serde(rename = "LPAREN")]
    LParen,
    #[serde(rename = "RPAREN")]
    RParen,
    Assign,

    // Special
    Eof,
}

impl TokenKind {
    pub fn name(&self) -> &'static str {
        match self {
            TokenKind::Number => "NUMBER",
            TokenKind::Identifier => "IDENTIFIER",
            TokenKind::Plus => "PLUS",
            TokenKind::Minus => "MINUS",
            TokenKind::Multiply => "MULTIPLY",
            TokenKind::Divide => "DIVIDE",
            TokenKind::Power => "POWER",
            TokenKind::LParen => "LPAREN",
            TokenKind::RParen => "RPAREN",
            TokenKind::Assign => "ASSIGN",
            TokenKind::Eof => "EOF",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Payload of a token: the parsed number for `NUMBER`, otherwise the text
/// (identifier name, operator symbol, or `EOF`).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TokenValue {
    Number(f64),
    Text(String),
}

impl fmt::Display for TokenValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TokenValue::Number(n) => write!(f, "{}", n),
            TokenValue::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub value: TokenValue,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, value: TokenValue, span: Span) -> Self {
        Self { kind, value, span }
    }

    /// Character offset where the token starts.
    pub fn position(&self) -> usize {
        self.span.start
    }

    pub fn number(&self) -> Option<f64> {
        match self.value {
            TokenValue::Number(n) => Some(n),
            TokenValue::Text(_) => None,
        }
    }

    pub fn text(&self) -> &str {
        match &self.value {
            TokenValue::Text(s) => s,
            TokenValue::Number(_) => "",
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            TokenKind::Number | TokenKind::Identifier => {
                write!(f, "{}({})@{}", self.kind, self.value, self.position())
            }
            _ => write!(f, "{}@{}", self.kind, self.position()),
        }
    }
}

/// Single pass scanner with one character of lookahead. Offsets are counted
/// in characters, so the `EOF` position equals the input's character length.
pub struct Lexer {
    source: Vec<char>,
    tokens: Vec<Token>,
    start: usize,
    current: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.chars().collect(),
            tokens: Vec::new(),
            start: 0,
            current: 0,
        }
    }

    /// Scan the whole input. Either every token up to and including `EOF`
    /// is returned, or the first lexical error and nothing else.
    pub fn scan_tokens(mut self) -> Result<Vec<Token>, Error> {
        while !self.is_at_end() {
            self.start = self.current;
            self.scan_token()?;
        }

        self.tokens.push(Token::new(
            TokenKind::Eof,
            TokenValue::Text("EOF".to_string()),
            Span::new(self.current, self.current),
        ));

        Ok(self.tokens)
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn scan_token(&mut self) -> Result<(), Error> {
        let c = self.advance();

        match c {
            '+' => self.add_symbol(TokenKind::Plus),
            '-' => self.add_symbol(TokenKind::Minus),
            '*' => self.add_symbol(TokenKind::Multiply),
            '/' => self.add_symbol(TokenKind::Divide),
            '^' => self.add_symbol(TokenKind::Power),
            '(' => self.add_symbol(TokenKind::LParen),
            ')' => self.add_symbol(TokenKind::RParen),
            '=' => self.add_symbol(TokenKind::Assign),
            c if c.is_whitespace() => {}
            c if c.is_ascii_digit() || c == '.' => self.number()?,
            c if c.is_ascii_alphabetic() || c == '_' => self.identifier(),
            _ => {
                return Err(Error::InvalidCharacter {
                    ch: c,
                    span: Span::single(self.start),
                });
            }
        }

        Ok(())
    }

    fn advance(&mut self) -> char {
        let c = self.peek();
        if !self.is_at_end() {
            self.current += 1;
        }
        c
    }

    fn peek(&self) -> char {
        self.source.get(self.current).copied().unwrap_or('\0')
    }

    fn lexeme(&self) -> String {
        self.source[self.start..self.current].iter().collect()
    }

    fn number(&mut self) -> Result<(), Error> {
        while self.peek().is_ascii_digit() || self.peek() == '.' {
            self.advance();
        }

        // The scan is greedy over digits and dots, so "1.2.3" or a lone "."
        // reach this point and are rejected rather than truncated.
        let text = self.lexeme();
        let value = text.parse::<f64>().map_err(|_| Error::MalformedNumber {
            text: text.clone(),
            span: Span::new(self.start, self.current),
        })?;

        self.add_token(TokenKind::Number, TokenValue::Number(value));
        Ok(())
    }

    fn identifier(&mut self) {
        while self.peek().is_ascii_alphanumeric() || self.peek() == '_' {
            self.advance();
        }

        let text = self.lexeme();
        self.add_token(TokenKind::Identifier, TokenValue::Text(text));
    }

    fn add_symbol(&mut self, kind: TokenKind) {
        let text = self.lexeme();
        self.add_token(kind, TokenValue::Text(text));
    }

    fn add_token(&mut self, kind: TokenKind, value: TokenValue) {
        self.tokens.push(Token::new(
            kind,
            value,
            Span::new(self.start, self.current),
        ));
    }
}

/// Convenience wrapper around [`Lexer::scan_tokens`].
pub fn tokenize(source: &str) -> Result<Vec<Token>, Error> {
    let tokens = Lexer::new(source).scan_tokens()?;
    tracing::debug!(count = tokens.len(), "tokenized input");
    Ok(tokens)
}
