// End to end behavior of tokenize -> parse -> generate -> evaluate.

use pretty_assertions::assert_eq;
use stackvm::runner::format_tokens;
use stackvm::{compile, evaluate, generate, parse, tokenize, Error, ErrorKind, Pipeline, TokenKind};
use std::collections::HashMap;

fn tree(source: &str) -> String {
    let tokens = tokenize(source).unwrap();
    parse(&tokens).unwrap().to_string()
}

fn bytecode(source: &str) -> Vec<String> {
    let tokens = tokenize(source).unwrap();
    let ast = parse(&tokens).unwrap();
    generate(&ast).iter().map(ToString::to_string).collect()
}

fn eval(source: &str) -> Result<f64, Error> {
    let tokens = tokenize(source)?;
    let ast = parse(&tokens)?;
    evaluate(&generate(&ast))
}

#[test]
fn tokenizes_the_reference_expression() {
    let tokens = tokenize("5 + 3 * 2").unwrap();
    assert_eq!(
        format_tokens(&tokens),
        "NUMBER(5)@0 PLUS@2 NUMBER(3)@4 MULTIPLY@6 NUMBER(2)@8 EOF@9"
    );
    assert_eq!(tokens[0].number(), Some(5.0));
    assert_eq!(tokens[1].text(), "+");
}

#[test]
fn every_token_stream_ends_in_one_eof() {
    for source in ["", "1", "  x  ", "a = (b)"] {
        let tokens = tokenize(source).unwrap();
        let eofs = tokens.iter().filter(|t| t.kind == TokenKind::Eof).count();
        assert_eq!(eofs, 1, "{:?}", source);
        let last = tokens.last().unwrap();
        assert_eq!(last.kind, TokenKind::Eof);
        assert_eq!(last.position(), source.chars().count());
    }
}

#[test]
fn identifiers_and_assign_are_tokenized() {
    let tokens = tokenize("total_2 = x").unwrap();
    assert_eq!(format_tokens(&tokens), "IDENTIFIER(total_2)@0 ASSIGN@8 IDENTIFIER(x)@10 EOF@11");
}

#[test]
fn lexical_failure_yields_no_tokens() {
    assert_eq!(
        tokenize("1 + 2 # 3"),
        Err(Error::InvalidCharacter {
            ch: '#',
            span: stackvm::Span::single(6)
        })
    );
}

#[test]
fn malformed_numbers_are_rejected() {
    let error = tokenize("1.2.3").unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Lexical);
    assert!(matches!(error, Error::MalformedNumber { ref text, .. } if text == "1.2.3"));
}

#[test]
fn precedence_and_associativity() {
    assert_eq!(tree("5 + 3 * 2"), "(+ 5 (* 3 2))");
    assert_eq!(tree("(5 + 3) * 2"), "(* (+ 5 3) 2)");
    assert_eq!(tree("1 - 2 - 3"), "(- (- 1 2) 3)");
    assert_eq!(tree("8 / 4 / 2"), "(/ (/ 8 4) 2)");
    assert_eq!(tree("2 * -3"), "(* 2 (- 3))");
    assert_eq!(tree("-2 ^ 2"), "(- (^ 2 2))");
}

#[test]
fn unary_chains_nest_to_the_right() {
    assert_eq!(tree("--x"), "(- (- x))");
    assert_eq!(tree("-+-1"), "(- (+ (- 1)))");
    assert_eq!(tree("-(2+3)"), "(- (+ 2 3))");
}

#[test]
fn exponentiation_is_left_associative() {
    // Regression guard: power chains fold to the left, (2^3)^2, not 2^(3^2).
    assert_eq!(tree("2 ^ 3 ^ 2"), "(^ (^ 2 3) 2)");
    assert_eq!(eval("2 ^ 3 ^ 2"), Ok(64.0));
}

#[test]
fn nesting_is_bounded_by_the_parser() {
    assert_eq!(eval(&("-".repeat(256) + "2")), Ok(2.0));
    let mixed = "(".repeat(128) + &"-".repeat(128) + "3" + &")".repeat(128);
    assert_eq!(eval(&mixed), Ok(3.0));

    let runaway = "-(".repeat(50_000) + "1" + &")".repeat(50_000);
    let compilation = compile(&runaway);
    assert_eq!(
        compilation.error,
        Some(Error::NestingTooDeep {
            limit: stackvm::parser::MAX_NESTING,
            span: stackvm::Span::single(257)
        })
    );
    assert_eq!(compilation.error.as_ref().map(Error::kind), Some(ErrorKind::Syntax));
    assert_eq!(compilation.tokens.len(), 150_002);
    assert!(compilation.ast.is_none());
}

#[test]
fn generates_post_order_bytecode() {
    assert_eq!(bytecode("5 + 3 * 2"), vec!["PUSH 5", "PUSH 3", "PUSH 2", "MUL", "ADD"]);
    assert_eq!(bytecode("x - 1.5"), vec!["LOAD x", "PUSH 1.5", "SUB"]);
    assert_eq!(bytecode("-(2+3)"), vec!["PUSH 2", "PUSH 3", "ADD", "NEG"]);
}

#[test]
fn unary_plus_emits_nothing() {
    assert_eq!(bytecode("+5"), vec!["PUSH 5"]);
    assert_eq!(bytecode("+-+4"), vec!["PUSH 4", "NEG"]);
}

#[test]
fn evaluates_like_ordinary_arithmetic() {
    let cases = [
        ("5 + 3 * 2", 11.0),
        ("(1 + 2) * 3", 9.0),
        ("10 - 4 - 3", 3.0),
        ("8 / 2 / 2", 2.0),
        ("-(2+3)", -5.0),
        ("--3", 3.0),
        ("-2 ^ 2", -4.0),
        ("2 ^ (-1)", 0.5),
        ("7 / 2", 3.5),
        ("(((4)))", 4.0),
    ];

    for (source, expected) in cases {
        assert_eq!(eval(source), Ok(expected), "{}", source);
    }
}

#[test]
fn runtime_errors_surface_from_the_pipeline() {
    assert_eq!(eval("4 / (2 - 2)"), Err(Error::DivisionByZero));
    assert_eq!(
        eval("y * 2"),
        Err(Error::UndefinedVariable {
            name: "y".to_string()
        })
    );
}

#[test]
fn stages_are_idempotent() {
    let source = "3 * (x - -1) ^ 2";
    assert_eq!(tokenize(source), tokenize(source));
    assert_eq!(tree(source), tree(source));
    assert_eq!(bytecode(source), bytecode(source));

    let pipeline = Pipeline::with_variables(HashMap::from([("x".to_string(), 2.0)]));
    let first = pipeline.compile(source);
    let second = pipeline.compile(source);
    assert_eq!(first, second);
    assert_eq!(first.result, Some(27.0));
}

#[test]
fn compilation_keeps_stages_up_to_the_failure() {
    let lexical = compile("1 $ 2");
    assert!(lexical.tokens.is_empty());
    assert!(lexical.ast.is_none());
    assert!(matches!(lexical.error, Some(Error::InvalidCharacter { ch: '$', .. })));

    let syntax = compile("1 +");
    assert_eq!(syntax.tokens.len(), 3);
    assert!(syntax.ast.is_none());
    assert!(syntax.bytecode.is_empty());
    assert!(syntax.execution.is_none());
    assert_eq!(syntax.error.as_ref().map(Error::kind), Some(ErrorKind::Syntax));

    let runtime = compile("1 / 0");
    assert!(runtime.ast.is_some());
    assert_eq!(runtime.bytecode.len(), 3);
    assert_eq!(runtime.result, None);
    assert_eq!(runtime.error, Some(Error::DivisionByZero));
    let trace = runtime.execution.expect("runtime failures still produce a trace");
    assert_eq!(trace.len(), 3);
    assert!(trace.halted);
    assert_eq!(trace.steps[2].description, "Error: Division by zero");
}

#[test]
fn successful_compilation_carries_every_stage() {
    let compilation = compile("5 + 3 * 2");
    assert!(compilation.is_success());
    assert_eq!(compilation.tokens.len(), 6);
    assert_eq!(compilation.bytecode.len(), 5);
    assert_eq!(compilation.result, Some(11.0));

    let trace = compilation.execution.unwrap();
    assert_eq!(trace.len(), 5);
    assert_eq!(trace.result, Some(11.0));
    assert_eq!(trace.steps[3].description, "Calculate 3 * 2 = 6");
    assert_eq!(trace.steps[4].description, "Calculate 5 + 6 = 11");
}

#[test]
fn seeded_variables_are_loaded() {
    let pipeline = Pipeline::with_variables(HashMap::from([
        ("rate".to_string(), 0.5),
        ("hours".to_string(), 8.0),
    ]));
    let compilation = pipeline.compile("rate * hours");
    assert_eq!(compilation.result, Some(4.0));
    assert_eq!(
        compilation.execution.unwrap().steps[1].description,
        "Load variable hours value 8"
    );

    // The seed is not shared with a pipeline that never received it.
    assert!(compile("rate * hours").error.is_some());
}

#[test]
fn compilation_serializes_for_visualizers() {
    let json = serde_json::to_value(compile("1 + 2")).unwrap();

    assert_eq!(json["tokens"][0]["kind"], "NUMBER");
    assert_eq!(json["tokens"][1]["kind"], "PLUS");
    assert_eq!(json["tokens"][1]["value"], "+");
    assert_eq!(json["ast"]["type"], "BINARY_OP");
    assert_eq!(json["ast"]["operator"], "+");
    assert_eq!(json["bytecode"][2], "ADD");
    assert_eq!(json["result"], 3.0);
    assert_eq!(json["execution"]["steps"][2]["instructionIndex"], 2);
    assert_eq!(json["execution"]["isComplete"], true);
    assert!(json["error"].is_null());

    let failed = serde_json::to_value(compile("1 +")).unwrap();
    assert_eq!(failed["error"]["kind"], "Syntax");
    assert_eq!(failed["error"]["span"]["start"], 3);
}
