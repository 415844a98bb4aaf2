mod test_util;

use tarry_lang::backend::error::EvalError;
use tarry_lang::backend::object::Value;
use tarry_lang::backend::ExecuteReturn;
use test_util::{compare_test_eq, program, run_scripted};

#[test]
fn run_fib_test() {
    let run = run_scripted(&program("fib"), &[]);
    assert!(matches!(run.result, ExecuteReturn::Return(Value::Null)));
    compare_test_eq(&run.output, "run", "fib")
}

#[test]
fn run_error_test() {
    let run = run_scripted(&program("errors"), &[]);
    assert!(matches!(run.result, ExecuteReturn::Return(_)));
    compare_test_eq(&run.output, "run", "errors")
}

#[test]
fn last_value_is_the_result() {
    let run = run_scripted("let x = 6; f(y) { return y * 7; } f(x);", &[]);
    assert!(matches!(run.result, ExecuteReturn::Return(Value::Integer(42))));
}

#[test]
fn uncaught_failures_surface() {
    let run = run_scripted("println(\"before\"); missing + 1; println(\"after\");", &[]);
    assert_eq!(run.output, "before\n");
    assert!(matches!(
        run.result,
        ExecuteReturn::Error(EvalError::Undeclared(ref name)) if name == "missing"
    ));

    let run = run_scripted("throw(1, \"loose\");", &[]);
    assert!(matches!(run.result, ExecuteReturn::Error(EvalError::NoCatch(_))));
}

#[test]
fn syntax_errors_carry_context() {
    let run = run_scripted("let = 4;", &[]);
    match run.result {
        ExecuteReturn::Error(EvalError::Syntax(ctx)) => {
            assert_eq!(ctx.file_name, "test.tarry");
            assert_eq!(ctx.line_num, 1);
        }
        other => panic!("expected a syntax error, got {:?}", other),
    }
}

#[test]
fn quit_stops_the_program() {
    let run = run_scripted("println(1); quit(3); println(2);", &[]);
    assert_eq!(run.output, "1\n");
    assert!(matches!(run.result, ExecuteReturn::Quit(3)));
}

#[test]
fn arity_is_checked() {
    let run = run_scripted("f(a, b) { a; } f(1);", &[]);
    assert!(matches!(
        run.result,
        ExecuteReturn::Error(EvalError::Arity { actual: 1, .. })
    ));
}
