use crate::error::{Error, Span};
use crate::lexer::{Token, TokenKind};
use serde::Serialize;
use std::fmt;

/// Expression tree produced by the parser. Every child is owned by exactly
/// one parent and the tree is never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Expr {
    #[serde(rename = "NUMBER")]
    Number { value: f64, span: Span },
    #[serde(rename = "IDENTIFIER")]
    Identifier { name: String, span: Span },
    #[serde(rename = "BINARY_OP")]
    Binary {
        left: Box<Expr>,
        operator: BinaryOp,
        right: Box<Expr>,
        span: Span,
    },
    /// Unary nodes only have a right-hand side.
    #[serde(rename = "UNARY_OP")]
    Unary {
        operator: UnaryOp,
        #[serde(rename = "right")]
        operand: Box<Expr>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> &Span {
        match self {
            Expr::Number { span, .. } => span,
            Expr::Identifier { span, .. } => span,
            Expr::Binary { span, .. } => span,
            Expr::Unary { span, .. } => span,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Expr::Number { .. } => "NUMBER",
            Expr::Identifier { .. } => "IDENTIFIER",
            Expr::Binary { .. } => "BINARY_OP",
            Expr::Unary { .. } => "UNARY_OP",
        }
    }

    /// Indented rendering with one node per line, in the shape the
    /// visualizer's tree panel draws.
    pub fn tree(&self) -> String {
        let mut out = String::new();
        self.write_tree(&mut out, "", "");
        out
    }

    fn write_tree(&self, out: &mut String, lead: &str, indent: &str) {
        out.push_str(lead);
        out.push_str(self.type_name());
        out.push(' ');
        match self {
            Expr::Number { value, .. } => out.push_str(&value.to_string()),
            Expr::Identifier { name, .. } => out.push_str(name),
            Expr::Binary { operator, .. } => out.push_str(operator.symbol()),
            Expr::Unary { operator, .. } => out.push_str(operator.symbol()),
        }
        out.push('\n');

        match self {
            Expr::Binary { left, right, .. } => {
                left.write_tree(out, &format!("{}├─ left: ", indent), &format!("{}│  ", indent));
                right.write_tree(out, &format!("{}└─ right: ", indent), &format!("{}   ", indent));
            }
            Expr::Unary { operand, .. } => {
                operand.write_tree(
                    out,
                    &format!("{}└─ operand: ", indent),
                    &format!("{}   ", indent),
                );
            }
            Expr::Number { .. } | Expr::Identifier { .. } => {}
        }
    }
}

/// Compact s-expression form, e.g. `(+ 5 (* 3 2))`.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expr::Number { value, .. } => write!(f, "{}", value),
            Expr::Identifier { name, .. } => write!(f, "{}", name),
            Expr::Binary {
                left,
                operator,
                right,
                ..
            } => write!(f, "({} {} {})", operator, left, right),
            Expr::Unary {
                operator, operand, ..
            } => write!(f, "({} {})", operator, operand),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOp {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Subtract,
    #[serde(rename = "*")]
    Multiply,
    #[serde(rename = "/")]
    Divide,
    #[serde(rename = "^")]
    Power,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Power => "^",
        }
    }

    /// Map an operator token to its binary operator.
    pub fn from_token(token: &Token) -> Result<Self, Error> {
        match token.kind {
            TokenKind::Plus => Ok(BinaryOp::Add),
            TokenKind::Minus => Ok(BinaryOp::Subtract),
            TokenKind::Multiply => Ok(BinaryOp::Multiply),
            TokenKind::Divide => Ok(BinaryOp::Divide),
            TokenKind::Power => Ok(BinaryOp::Power),
            _ => Err(unknown_operator(token)),
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOp {
    #[serde(rename = "+")]
    Plus,
    #[serde(rename = "-")]
    Negate,
}

impl UnaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Plus => "+",
            UnaryOp::Negate => "-",
        }
    }

    pub fn from_token(token: &Token) -> Result<Self, Error> {
        match token.kind {
            TokenKind::Plus => Ok(UnaryOp::Plus),
            TokenKind::Minus => Ok(UnaryOp::Negate),
            _ => Err(unknown_operator(token)),
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

fn unknown_operator(token: &Token) -> Error {
    Error::UnknownOperator {
        symbol: token.value.to_string(),
        span: token.span,
    }
}
