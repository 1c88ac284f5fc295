use clap::{Arg, ArgAction, ArgMatches, Command};
use stackvm::pipeline::Pipeline;
use stackvm::repl;
use stackvm::runner::{self, RunOptions};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();

    let variables = match parse_variables(&matches) {
        Ok(variables) => variables,
        Err(message) => {
            eprintln!("Error: {}", message);
            std::process::exit(2);
        }
    };
    let pipeline = Pipeline::with_variables(variables);

    let options = RunOptions {
        show_tokens: matches.get_flag("tokens"),
        show_ast: matches.get_flag("ast"),
        show_bytecode: matches.get_flag("bytecode"),
        show_trace: matches.get_flag("trace"),
        json: matches.get_flag("json"),
    };

    let succeeded = if let Some(expr) = matches.get_one::<String>("expr") {
        runner::run(&pipeline, expr, None, &options)
    } else if let Some(file_path) = matches.get_one::<String>("file") {
        let source = read_file(file_path);
        runner::run(&pipeline, &source, Some(file_path), &options)
    } else if let Some(file_path) = matches.get_one::<String>("program") {
        let listing = read_file(file_path);
        runner::run_bytecode(&pipeline, &listing, Some(file_path), &options)
    } else {
        repl::start(&pipeline, options);
        true
    };

    if !succeeded {
        std::process::exit(1);
    }
}

fn cli() -> Command {
    Command::new("stackvm")
        .about("Compiles arithmetic expressions to stack machine bytecode and runs them")
        .arg(
            Arg::new("expr")
                .help("The expression to compile and run")
                .value_name("EXPR")
                .index(1),
        )
        .arg(
            Arg::new("file")
                .short('f')
                .long("file")
                .help("Read the expression from a file")
                .value_name("FILE")
                .conflicts_with("expr"),
        )
        .arg(
            Arg::new("program")
                .long("program")
                .help("Run an instruction listing, one instruction per line")
                .value_name("FILE")
                .conflicts_with_all(["expr", "file"]),
        )
        .arg(
            Arg::new("interactive")
                .short('i')
                .long("interactive")
                .help("Start in interactive REPL mode")
                .action(ArgAction::SetTrue)
                .conflicts_with_all(["expr", "file", "program"]),
        )
        .arg(
            Arg::new("var")
                .long("var")
                .help("Seed a variable, e.g. --var x=2 (repeatable)")
                .value_name("NAME=VALUE")
                .action(ArgAction::Append),
        )
        .arg(flag("tokens", "Print the token sequence"))
        .arg(flag("ast", "Print the syntax tree"))
        .arg(flag("bytecode", "Print the generated instructions"))
        .arg(flag("trace", "Print the step-by-step execution trace"))
        .arg(flag("json", "Print every stage as JSON"))
}

fn flag(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .help(help)
        .action(ArgAction::SetTrue)
}

fn parse_variables(matches: &ArgMatches) -> Result<HashMap<String, f64>, String> {
    let mut variables = HashMap::new();

    for binding in matches.get_many::<String>("var").into_iter().flatten() {
        let (name, value) = binding
            .split_once('=')
            .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", binding))?;
        let name = name.trim();
        let valid_name = name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid_name {
            return Err(format!("'{}' is not a valid variable name", name));
        }
        let value = value
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("'{}' is not a number", value.trim()))?;
        variables.insert(name.to_string(), value);
    }

    Ok(variables)
}

fn read_file(path: &str) -> String {
    let path = Path::new(path);

    if !path.exists() {
        eprintln!("Error: File '{}' not found", path.display());
        std::process::exit(1);
    }

    match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error reading file '{}': {}", path.display(), e);
            std::process::exit(1);
        }
    }
}
