// stackvm: arithmetic expression compiler and stack machine
//
// Source text goes through tokenizer, recursive descent parser and code
// generator; the resulting instructions run on a plain evaluator and on a
// stepping evaluator that records a replayable trace.

// Public modules
pub mod ast;
pub mod bytecode;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod pipeline;
pub mod repl;
pub mod runner;
pub mod vm;

// Re-export commonly used items
pub use ast::{BinaryOp, Expr, UnaryOp};
pub use bytecode::{generate, CodeGenerator, Instruction};
pub use error::{Error, ErrorKind, Span};
pub use lexer::{tokenize, Lexer, Token, TokenKind, TokenValue};
pub use parser::{parse, Parser};
pub use pipeline::{compile, Compilation, Pipeline};
pub use vm::{evaluate, evaluate_with_trace, ExecutionStep, ExecutionTrace, TraceCursor, VirtualMachine};
