use crate::pipeline::Pipeline;
use crate::runner::{self, RunOptions};
use std::io::{self, Write};

/// Interactive loop. Each line is an independent request: nothing computed
/// for one line is visible to the next.
pub fn start(pipeline: &Pipeline, mut options: RunOptions) {
    println!("stackvm v{}", env!("CARGO_PKG_VERSION"));
    println!("Type an arithmetic expression, ':help' for commands, 'exit' to quit");
    println!();

    loop {
        print!("> ");
        if let Err(error) = io::stdout().flush() {
            eprintln!("Error writing prompt: {}", error);
            break;
        }

        let mut line = String::new();
        match io::stdin().read_line(&mut line) {
            Ok(0) => {
                // EOF reached (Ctrl+D or piped input ended)
                println!();
                break;
            }
            Ok(_) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "exit" || line == "quit" {
                    println!("Goodbye!");
                    break;
                }

                if let Some(command) = line.strip_prefix(':') {
                    run_command(command, pipeline, &mut options);
                } else {
                    runner::run(pipeline, line, None, &options);
                }
            }
            Err(error) => {
                eprintln!("Error reading input: {}", error);
                break;
            }
        }
    }
}

fn run_command(command: &str, pipeline: &Pipeline, options: &mut RunOptions) {
    let flag = match command {
        "tokens" => &mut options.show_tokens,
        "ast" => &mut options.show_ast,
        "bytecode" => &mut options.show_bytecode,
        "trace" => &mut options.show_trace,
        "json" => &mut options.json,
        "vars" => {
            let mut names: Vec<_> = pipeline.variables().iter().collect();
            names.sort_by(|a, b| a.0.cmp(b.0));
            if names.is_empty() {
                println!("(no variables)");
            }
            for (name, value) in names {
                println!("{} = {}", name, value);
            }
            return;
        }
        "help" => {
            println!(":tokens :ast :bytecode :trace :json   toggle what is printed");
            println!(":vars                                 list seeded variables");
            return;
        }
        other => {
            eprintln!("Unknown command ':{}'. Try ':help'.", other);
            return;
        }
    };

    *flag = !*flag;
    println!("{} {}", command, if *flag { "on" } else { "off" });
}
