use crate::ast::Expr;
use crate::bytecode::{self, Instruction};
use crate::error::Error;
use crate::lexer::{self, Token};
use crate::parser;
use crate::vm::{ExecutionTrace, VirtualMachine};
use serde::Serialize;
use std::collections::HashMap;

/// Everything one compilation request produced, stage by stage. Stages after
/// the first failure are left empty, except that a runtime failure still
/// comes with its truncated trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Compilation {
    pub tokens: Vec<Token>,
    pub ast: Option<Expr>,
    pub bytecode: Vec<Instruction>,
    pub result: Option<f64>,
    pub execution: Option<ExecutionTrace>,
    #[serde(serialize_with = "crate::error::serialize_error")]
    pub error: Option<Error>,
}

impl Compilation {
    fn failed(error: Error) -> Self {
        Self {
            tokens: Vec::new(),
            ast: None,
            bytecode: Vec::new(),
            result: None,
            execution: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Runs source text through tokenizer, parser, code generator and both
/// evaluators. Holds only the variable seed; every request gets a fresh
/// machine.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    variables: HashMap<String, f64>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_variables(variables: HashMap<String, f64>) -> Self {
        Self { variables }
    }

    pub fn variables(&self) -> &HashMap<String, f64> {
        &self.variables
    }

    pub fn compile(&self, source: &str) -> Compilation {
        let tokens = match lexer::tokenize(source) {
            Ok(tokens) => tokens,
            Err(error) => return Compilation::failed(error),
        };

        let ast = match parser::parse(&tokens) {
            Ok(ast) => ast,
            Err(error) => {
                return Compilation {
                    tokens,
                    ..Compilation::failed(error)
                }
            }
        };

        let bytecode = bytecode::generate(&ast);
        let (result, execution, error) = self.execute(&bytecode);

        Compilation {
            tokens,
            ast: Some(ast),
            bytecode,
            result,
            execution: Some(execution),
            error,
        }
    }

    /// Evaluate an already compiled program, e.g. one read from text.
    pub fn execute(
        &self,
        bytecode: &[Instruction],
    ) -> (Option<f64>, ExecutionTrace, Option<Error>) {
        let (result, error) = match VirtualMachine::with_variables(self.variables.clone())
            .evaluate(bytecode)
        {
            Ok(value) => (Some(value), None),
            Err(error) => (None, Some(error)),
        };
        let execution =
            VirtualMachine::with_variables(self.variables.clone()).evaluate_with_trace(bytecode);

        (result, execution, error)
    }
}

/// Compile and run `source` with an empty variable table.
pub fn compile(source: &str) -> Compilation {
    Pipeline::new().compile(source)
}
