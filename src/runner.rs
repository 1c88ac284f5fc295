use crate::bytecode::{self, Instruction};
use crate::error::Error;
use crate::lexer::Token;
use crate::pipeline::{Compilation, Pipeline};
use crate::vm::ExecutionTrace;

/// Which stages to print for a request, and how.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub show_tokens: bool,
    pub show_ast: bool,
    pub show_bytecode: bool,
    pub show_trace: bool,
    pub json: bool,
}

/// Compile and run one expression, printing the requested stages.
/// Returns whether the request succeeded.
pub fn run(pipeline: &Pipeline, source: &str, filename: Option<&str>, options: &RunOptions) -> bool {
    let compilation = pipeline.compile(source);

    if options.json {
        print_json(&compilation);
    } else {
        print_compilation(&compilation, options);
    }

    report_failure(compilation.error.as_ref(), source, filename)
}

/// Evaluate an instruction listing (one instruction per line) directly.
pub fn run_bytecode(
    pipeline: &Pipeline,
    listing: &str,
    filename: Option<&str>,
    options: &RunOptions,
) -> bool {
    let program = match bytecode::parse_program(listing) {
        Ok(program) => program,
        Err(error) => return report_failure(Some(&error), listing, filename),
    };

    let (result, execution, error) = pipeline.execute(&program);
    let compilation = Compilation {
        tokens: Vec::new(),
        ast: None,
        bytecode: program,
        result,
        execution: Some(execution),
        error,
    };

    if options.json {
        print_json(&compilation);
    } else {
        print_compilation(&compilation, options);
    }

    // Runtime errors have no source span, so the listing stands in as source.
    report_failure(compilation.error.as_ref(), listing, filename)
}

/// Diagnostics go to stderr, so JSON on stdout stays parseable.
fn report_failure(error: Option<&Error>, source: &str, filename: Option<&str>) -> bool {
    let Some(error) = error else {
        return true;
    };

    tracing::warn!(kind = ?error.kind(), %error, "request failed");
    if let Err(io_error) = error.report(source, filename) {
        tracing::debug!(%io_error, "could not render diagnostic");
        eprintln!("Error: {}", error);
    }
    false
}

fn print_json(compilation: &Compilation) {
    match serde_json::to_string_pretty(compilation) {
        Ok(json) => println!("{}", json),
        Err(error) => eprintln!("Error serializing result: {}", error),
    }
}

fn print_compilation(compilation: &Compilation, options: &RunOptions) {
    if options.show_tokens && !compilation.tokens.is_empty() {
        println!("Tokens:");
        println!("{}", format_tokens(&compilation.tokens));
        println!();
    }

    if options.show_ast {
        if let Some(ast) = &compilation.ast {
            println!("Syntax tree:");
            print!("{}", ast.tree());
            println!();
        }
    }

    if options.show_bytecode && !compilation.bytecode.is_empty() {
        println!("Bytecode:");
        print!("{}", format_bytecode(&compilation.bytecode));
        println!();
    }

    if options.show_trace {
        if let Some(trace) = &compilation.execution {
            println!("Execution:");
            print!("{}", format_trace(trace));
            println!();
        }
    }

    if let Some(result) = compilation.result {
        println!("{}", result);
    }
}

pub fn format_tokens(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(Token::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn format_bytecode(bytecode: &[Instruction]) -> String {
    let mut out = String::new();
    for (index, instruction) in bytecode.iter().enumerate() {
        out.push_str(&format!("{:>4}  {}\n", index, instruction));
    }
    out
}

pub fn format_stack(stack: &[f64]) -> String {
    let values: Vec<String> = stack.iter().map(f64::to_string).collect();
    format!("[{}]", values.join(", "))
}

pub fn format_trace(trace: &ExecutionTrace) -> String {
    let mut out = String::new();
    for step in &trace.steps {
        out.push_str(&format!(
            "{:>4}  {:<12} {:>16} -> {:<16} {}\n",
            step.instruction_index,
            step.instruction.to_string(),
            format_stack(&step.stack_before),
            format_stack(&step.stack_after),
            step.description
        ));
    }
    out
}
