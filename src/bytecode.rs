use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::error::Error;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// One stack machine instruction. A program is a plain `Vec<Instruction>`
/// executed front to back; there are no jumps or labels.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Push(f64),
    Load(String),
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Neg,
}

impl Instruction {
    pub fn opcode(&self) -> &'static str {
        match self {
            Instruction::Push(_) => "PUSH",
            Instruction::Load(_) => "LOAD",
            Instruction::Add => "ADD",
            Instruction::Sub => "SUB",
            Instruction::Mul => "MUL",
            Instruction::Div => "DIV",
            Instruction::Pow => "POW",
            Instruction::Neg => "NEG",
        }
    }

    pub fn binary(operator: BinaryOp) -> Self {
        match operator {
            BinaryOp::Add => Instruction::Add,
            BinaryOp::Subtract => Instruction::Sub,
            BinaryOp::Multiply => Instruction::Mul,
            BinaryOp::Divide => Instruction::Div,
            BinaryOp::Power => Instruction::Pow,
        }
    }
}

/// Textual form: `OPCODE` or `OPCODE operand`, space separated.
impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Instruction::Push(value) => write!(f, "PUSH {}", value),
            Instruction::Load(name) => write!(f, "LOAD {}", name),
            other => f.write_str(other.opcode()),
        }
    }
}

impl FromStr for Instruction {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let malformed = |reason: &str| Error::MalformedInstruction {
            text: text.to_string(),
            reason: reason.to_string(),
        };

        let mut parts = text.split_whitespace();
        let opcode = parts.next().ok_or_else(|| malformed("empty instruction"))?;
        let operand = parts.next();
        if parts.next().is_some() {
            return Err(malformed("too many operands"));
        }

        let instruction = match (opcode, operand) {
            ("PUSH", Some(value)) => Instruction::Push(
                value
                    .parse::<f64>()
                    .ok()
                    .filter(|value| value.is_finite())
                    .ok_or_else(|| malformed("operand is not a number"))?,
            ),
            ("LOAD", Some(name)) => Instruction::Load(name.to_string()),
            ("PUSH", None) | ("LOAD", None) => return Err(malformed("missing operand")),
            ("ADD", None) => Instruction::Add,
            ("SUB", None) => Instruction::Sub,
            ("MUL", None) => Instruction::Mul,
            ("DIV", None) => Instruction::Div,
            ("POW", None) => Instruction::Pow,
            ("NEG", None) => Instruction::Neg,
            ("ADD" | "SUB" | "MUL" | "DIV" | "POW" | "NEG", Some(_)) => {
                return Err(malformed("opcode takes no operand"))
            }
            _ => return Err(malformed("unknown opcode")),
        };

        Ok(instruction)
    }
}

impl Serialize for Instruction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Read an externally supplied program, one instruction per non-blank line.
pub fn parse_program(text: &str) -> Result<Vec<Instruction>, Error> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.parse::<Instruction>())
        .collect()
}

/// Post-order walk of the tree: both operands are emitted before the
/// operator, so the right operand ends up on top of the stack.
#[derive(Default)]
pub struct CodeGenerator {
    instructions: Vec<Instruction>,
}

impl CodeGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generate(&mut self, expr: &Expr) -> Vec<Instruction> {
        self.instructions.clear();
        self.visit(expr);
        std::mem::take(&mut self.instructions)
    }

    fn visit(&mut self, expr: &Expr) {
        match expr {
            Expr::Number { value, .. } => self.emit(Instruction::Push(*value)),
            Expr::Identifier { name, .. } => self.emit(Instruction::Load(name.clone())),
            Expr::Binary {
                left,
                operator,
                right,
                ..
            } => {
                self.visit(left);
                self.visit(right);
                self.emit(Instruction::binary(*operator));
            }
            Expr::Unary {
                operator, operand, ..
            } => {
                self.visit(operand);
                match operator {
                    // Unary plus is the identity.
                    UnaryOp::Plus => {}
                    UnaryOp::Negate => self.emit(Instruction::Neg),
                }
            }
        }
    }

    fn emit(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }
}

/// Compile an expression tree into a linear instruction sequence.
pub fn generate(expr: &Expr) -> Vec<Instruction> {
    let instructions = CodeGenerator::new().generate(expr);
    tracing::debug!(count = instructions.len(), "generated bytecode");
    instructions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn textual_form() {
        assert_eq!(Instruction::Push(5.0).to_string(), "PUSH 5");
        assert_eq!(Instruction::Push(2.5).to_string(), "PUSH 2.5");
        assert_eq!(Instruction::Load("x".to_string()).to_string(), "LOAD x");
        assert_eq!(Instruction::Neg.to_string(), "NEG");
    }

    #[test]
    fn reads_external_instructions() {
        assert_eq!("PUSH 4".parse::<Instruction>(), Ok(Instruction::Push(4.0)));
        assert_eq!(
            "LOAD rate".parse::<Instruction>(),
            Ok(Instruction::Load("rate".to_string()))
        );
        assert_eq!("  POW ".parse::<Instruction>(), Ok(Instruction::Pow));
    }

    #[test]
    fn rejects_malformed_instructions() {
        for text in ["", "JMP 3", "PUSH", "PUSH x", "ADD 1", "LOAD a b", "push 1"] {
            let error = text.parse::<Instruction>().unwrap_err();
            assert!(
                matches!(error, Error::MalformedInstruction { .. }),
                "{:?} gave {:?}",
                text,
                error
            );
        }
    }

    #[test]
    fn push_operand_must_be_finite() {
        for text in ["PUSH NaN", "PUSH inf", "PUSH -infinity", "PUSH 1e999"] {
            assert_eq!(
                text.parse::<Instruction>(),
                Err(Error::MalformedInstruction {
                    text: text.to_string(),
                    reason: "operand is not a number".to_string(),
                }),
                "{}",
                text
            );
        }
        assert_eq!("PUSH 1e3".parse::<Instruction>(), Ok(Instruction::Push(1000.0)));
    }

    #[test]
    fn program_skips_blank_lines() {
        let program = parse_program("PUSH 1\n\n  PUSH 2\nADD\n").unwrap();
        assert_eq!(
            program,
            vec![Instruction::Push(1.0), Instruction::Push(2.0), Instruction::Add]
        );
    }
}
