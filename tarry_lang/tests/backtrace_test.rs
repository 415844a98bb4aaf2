mod test_util;

use tarry_lang::backend::backtrace::{Backtrace, Row};
use tarry_lang::backend::error::EvalError;
use tarry_lang::backend::object::Value;
use test_util::{compare_test_eq, program, run_scripted};

fn report(value: &Value) -> &Backtrace {
    match value {
        Value::Backtrace(report) => report,
        other => panic!("expected a backtrace, got {:?}", other),
    }
}

#[test]
fn scenario() {
    let run = run_scripted(&program("scenario"), &["backtrace(null, false);", "resume();"]);
    compare_test_eq(report(run.reply(0)), "backtrace", "scenario");
}

#[test]
fn pending_call() {
    let run = run_scripted(
        &program("pending"),
        &["backtrace();", "backtrace(2);", "resume();"],
    );
    compare_test_eq(report(run.reply(0)), "backtrace", "pending");
    // the pending frame has no level of its own
    assert_eq!(run.reply(1), &Value::Null);
}

#[test]
fn truncated() {
    let run = run_scripted(
        &program("countdown"),
        &["backtrace(null, 2);", "backtrace(null, false);", "resume();"],
    );
    let short = report(run.reply(0));
    compare_test_eq(short, "backtrace", "truncated");

    let full = report(run.reply(1));
    assert_eq!(full.rows.len(), 5);
    assert!(!full.rows.contains(&Row::More));
    assert_eq!(&short.rows[1..], &full.rows[3..]);

    // exactly at the limit nothing is cut
    let run = run_scripted(&program("countdown"), &["backtrace(null, 5);", "resume();"]);
    assert_eq!(report(run.reply(0)), full);
}

#[test]
fn brief() {
    let run = run_scripted(&program("countdown"), &["backtrace(null, null, true);", "resume();"]);
    let rows = &report(run.reply(0)).rows;
    assert_eq!(rows, &vec![Row::Label("down".to_string()); 5]);
    assert_eq!(report(run.reply(0)).to_string(), "[down, down, down, down, down]");
}

#[test]
fn frame_selection() {
    let run = run_scripted(
        &program("countdown"),
        &[
            "backtrace(down) == backtrace(1);",
            "backtrace(1) == backtrace(2);",
            "running(backtrace(0));",
            "backtrace(6);",
            "backtrace(println);",
            "resume();",
        ],
    );
    assert_eq!(run.reply(0), &Value::Boolean(true));
    assert_eq!(run.reply(1), &Value::Boolean(false));
    assert_eq!(run.reply(2), &Value::Boolean(true));
    assert_eq!(run.reply(3), &Value::Null);
    assert_eq!(run.reply(4), &Value::Null);
    assert_eq!(run.unread, 0);
}

#[test]
fn outside_a_session() {
    let source = "f(x) { return backtrace(null, null, true); } f(1);";
    let run = run_scripted(source, &[]);
    match run.result {
        tarry_lang::backend::ExecuteReturn::Return(value) => {
            assert_eq!(report(&value).to_string(), "[f]")
        }
        other => panic!("program did not return normally: {:?}", other),
    }
}

#[test]
fn rejects_bad_arguments() {
    let run = run_scripted(
        "breakpoint();",
        &["backtrace(-1);", "backtrace(null, true);", "backtrace(null, null, 1);", "resume();"],
    );
    for index in 0..3 {
        assert!(
            matches!(
                run.transcript[index].reply,
                tarry_lang::backend::console::Reply::Error(EvalError::ArgType { index: i, .. })
                    if i == index
            ),
            "line {} gave {:?}",
            index,
            run.transcript[index].reply
        );
    }
}
