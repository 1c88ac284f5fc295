use ariadne::{Color, Fmt, Label, Report, ReportKind, Source};
use serde::Serialize;

use crate::lexer::TokenKind;

/// Character offsets into the source text, end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn single(pos: usize) -> Self {
        Self {
            start: pos,
            end: pos + 1,
        }
    }
}

/// Which stage of the pipeline rejected the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    Lexical,
    Syntax,
    Runtime,
    /// Parser and code generator disagree about the tree; never user error.
    Internal,
    /// A textual instruction stream supplied from outside could not be read.
    Bytecode,
}

impl ErrorKind {
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::Lexical => "Lexical Error",
            ErrorKind::Syntax => "Parse Error",
            ErrorKind::Runtime => "Runtime Error",
            ErrorKind::Internal => "Internal Error",
            ErrorKind::Bytecode => "Bytecode Error",
        }
    }

    fn color(&self) -> Color {
        match self {
            ErrorKind::Lexical => Color::Red,
            ErrorKind::Syntax => Color::Yellow,
            ErrorKind::Runtime => Color::Magenta,
            ErrorKind::Internal | ErrorKind::Bytecode => Color::Blue,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Invalid character '{ch}' at position {}", .span.start)]
    InvalidCharacter { ch: char, span: Span },

    #[error("Malformed number '{text}' at position {}", .span.start)]
    MalformedNumber { text: String, span: Span },

    #[error("Unexpected token {found} at position {}", .span.start)]
    UnexpectedToken { found: TokenKind, span: Span },

    #[error("Expected {expected}, got {found} at position {}", .span.start)]
    ExpectedTokenMismatch {
        expected: TokenKind,
        found: TokenKind,
        span: Span,
    },

    #[error("Expression nested deeper than {limit} levels at position {}", .span.start)]
    NestingTooDeep { limit: usize, span: Span },

    #[error("Undefined variable: {name}")]
    UndefinedVariable { name: String },

    #[error("Stack underflow: {opcode} needs {needed} operand(s), found {available}")]
    StackUnderflow {
        opcode: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Invalid stack state after execution: expected 1 value, found {depth}")]
    InvalidFinalState { depth: usize },

    #[error("Unknown operator '{symbol}' at position {}", .span.start)]
    UnknownOperator { symbol: String, span: Span },

    #[error("Malformed instruction '{text}': {reason}")]
    MalformedInstruction { text: String, reason: String },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidCharacter { .. } | Error::MalformedNumber { .. } => ErrorKind::Lexical,
            Error::UnexpectedToken { .. }
            | Error::ExpectedTokenMismatch { .. }
            | Error::NestingTooDeep { .. } => ErrorKind::Syntax,
            Error::UndefinedVariable { .. }
            | Error::StackUnderflow { .. }
            | Error::DivisionByZero
            | Error::InvalidFinalState { .. } => ErrorKind::Runtime,
            Error::UnknownOperator { .. } => ErrorKind::Internal,
            Error::MalformedInstruction { .. } => ErrorKind::Bytecode,
        }
    }

    /// Source location, when the failure can be tied to one.
    pub fn span(&self) -> Option<Span> {
        match self {
            Error::InvalidCharacter { span, .. }
            | Error::MalformedNumber { span, .. }
            | Error::UnexpectedToken { span, .. }
            | Error::ExpectedTokenMismatch { span, .. }
            | Error::NestingTooDeep { span, .. }
            | Error::UnknownOperator { span, .. } => Some(*span),
            _ => None,
        }
    }

    pub fn help(&self) -> Option<String> {
        match self {
            Error::InvalidCharacter { .. } => Some(
                "Only numbers, identifiers, whitespace and the symbols + - * / ^ ( ) = are allowed."
                    .to_string(),
            ),
            Error::MalformedNumber { .. } => Some(
                "A number may contain at most one '.' and at least one digit. Example: 3.14"
                    .to_string(),
            ),
            Error::UnexpectedToken {
                found: TokenKind::Eof,
                ..
            } => Some("Reached end of input while expecting an expression.".to_string()),
            Error::UnexpectedToken {
                found: TokenKind::Assign,
                ..
            } => Some("Assignment is not supported; write a single expression.".to_string()),
            Error::UnexpectedToken {
                found: TokenKind::RParen,
                ..
            } => Some("Found ')' without matching '('. Check for unbalanced parentheses.".to_string()),
            Error::ExpectedTokenMismatch {
                expected: TokenKind::RParen,
                ..
            } => Some(
                "Every opening parenthesis '(' must have a matching closing parenthesis ')'."
                    .to_string(),
            ),
            Error::NestingTooDeep { .. } => Some(
                "Remove redundant parentheses or repeated signs.".to_string(),
            ),
            Error::UndefinedVariable { name } => Some(format!(
                "Seed a value for '{}' before running, e.g. --var {}=1",
                name, name
            )),
            _ => None,
        }
    }

    /// Print an ariadne diagnostic for this error against `source` to stderr.
    pub fn report(&self, source: &str, filename: Option<&str>) -> std::io::Result<()> {
        let filename = filename.unwrap_or("<input>");
        let kind = self.kind();
        let color = kind.color();

        // Runtime failures have no token to point at; label the whole input.
        let span = self.span().unwrap_or_else(|| whole_source(source));
        let message = self.to_string();

        let mut report_builder = Report::build(ReportKind::Error, filename, span.start)
            .with_message(format!("{}: {}", kind.label().fg(color), message))
            .with_label(
                Label::new((filename, span.start..span.end))
                    .with_message(&message)
                    .with_color(color),
            );

        if let Some(help_text) = self.help() {
            report_builder =
                report_builder.with_note(format!("{}: {}", "help".fg(Color::Cyan), help_text));
        }

        report_builder
            .finish()
            .eprint((filename, Source::from(source)))
    }
}

/// An empty source still gets a one character label so ariadne renders it.
fn whole_source(source: &str) -> Span {
    match source.chars().count() {
        0 => Span::single(0),
        len => Span::new(0, len),
    }
}

/// Flat view of an error for JSON consumers.
#[derive(Serialize)]
struct ErrorSummary {
    kind: ErrorKind,
    message: String,
    span: Option<Span>,
}

pub(crate) fn serialize_error<S: serde::Serializer>(
    error: &Option<Error>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    error
        .as_ref()
        .map(|error| ErrorSummary {
            kind: error.kind(),
            message: error.to_string(),
            span: error.span(),
        })
        .serialize(serializer)
}
