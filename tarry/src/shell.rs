use shrust::{ExecError, Shell, ShellIO};
use std::io::Write;
use tarry_lang::backend::console::session::{self, SessionStep};
use tarry_lang::backend::console::{Console, SessionOutcome};
use tarry_lang::backend::debug::ResumeInstruction;
use tarry_lang::backend::error::EvalError;
use tarry_lang::backend::object::Value;
use tarry_lang::backend::ExecutionState;

/// Interactive console on stdin/stdout, one shell per session.
#[derive(Debug, Default)]
pub struct ShellConsole;

struct SessionData<'s, 'a> {
    state: &'s mut ExecutionState<'a>,
    outcome: Option<SessionOutcome>,
}

type ShellResult = Result<(), ExecError>;

fn say(io: &mut ShellIO, args: std::fmt::Arguments<'_>) -> ShellResult {
    io.write_fmt(args)
        .and_then(|_| io.write_all(b"\n"))
        .map_err(|err| ExecError::Other(Box::new(err)))
}

/// Evaluate `source` and report the result. Ends the shell loop once the
/// input resumes or exits the program.
fn run_line(io: &mut ShellIO, data: &mut SessionData<'_, '_>, source: &str) -> ShellResult {
    match session::evaluate(data.state, source) {
        SessionStep::Continue(Value::Backtrace(report)) => say(io, format_args!("{:#}", report)),
        SessionStep::Continue(value) => say(io, format_args!("{}", value)),
        SessionStep::Failed(err) => say(io, format_args!("error: {}", err)),
        SessionStep::Finished(outcome) => {
            data.outcome = Some(outcome);
            Err(ExecError::Quit)
        }
    }
}

impl Console for ShellConsole {
    fn run(&self, state: &mut ExecutionState<'_>) -> Result<SessionOutcome, EvalError> {
        let depth = state.debug().depth();
        info!("entering session {}, type help for commands", depth);

        let mut shell = Shell::new(SessionData {
            state,
            outcome: None,
        });
        shell.new_command("eval", "evaluate a statement", 1, |io, data, args| {
            run_line(io, data, &args.join(" "))
        });
        shell.new_command_noargs("bt", "show the suspended call stack", |io, data| {
            run_line(io, data, "backtrace();")
        });
        shell.new_command_noargs("bt-all", "show every frame on the stack", |io, data| {
            run_line(io, data, "backtrace(null, false);")
        });
        shell.new_command_noargs("resume", "continue the program", |io, data| {
            run_line(io, data, "resume();")
        });
        shell.new_command_noargs("step", "run one statement, then stop again", |io, data| {
            run_line(io, data, "step();")
        });
        shell.new_command("exit", "end the program with a status code", 1, |io, data, args| {
            let code = args[0]
                .parse::<i32>()
                .map_err(|err| ExecError::Other(Box::new(err)))?;
            run_line(io, data, &format!("quit({});", code))
        });

        shell.run_loop(&mut ShellIO::default());

        // End of input or the shell's own quit command resumes.
        let outcome = shell.data().outcome.take();
        Ok(outcome.unwrap_or_else(|| {
            debug!("session {} closed without a command, resuming", depth);
            SessionOutcome::Resume(ResumeInstruction::resume())
        }))
    }
}
