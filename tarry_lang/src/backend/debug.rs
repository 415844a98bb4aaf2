//! Breakpoints, pauses and the resume protocol.
//!
//! A breakpoint hands control to the configured console. The console ends
//! the session in exactly one of two ways: an exit code, which unwinds the
//! whole program as `Escape::Quit`, or a [`ResumeInstruction`], which the
//! suspended native applies before returning to its caller. `resume` and
//! `step` raise `Escape::Resume` from inside the session; nothing but the
//! session entry point converts it back into an instruction.
//!
//! A session is open from the moment its console starts until the console
//! returns. Resuming and terminating are not states of their own: they are
//! the `Escape::Resume` and `Escape::Quit` values travelling back to the
//! call that suspended, and to `startup`, respectively.

use std::collections::HashMap;

use anymap::AnyMap;

use crate::parser::ast::Block;

use super::argparse;
use super::console::SessionOutcome;
use super::error::{DebugError, EvalError, EvalResult, Escape};
use super::object::{NativeCall, NativeFn, NativeFnHandle, Output, Value};
use super::step::{self, StepHook};
use super::{ExecutionState, Scope};

#[derive(Debug)]
pub enum ResumeMode {
    /// Finish the suspended call the way it would have finished on its own.
    Default,
    Evaluate(Block),
    Value(Value),
    /// Resume as `Default`, then suspend again after one evaluator step.
    Step(StepHook),
}

/// Which call an instruction unwinds to. Only the suspended call itself is
/// supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeTarget {
    Breakpoint,
}

#[derive(Debug)]
pub struct ResumeInstruction {
    pub mode: ResumeMode,
    pub target: ResumeTarget,
}

impl ResumeInstruction {
    pub fn resume() -> Self {
        Self::with_mode(ResumeMode::Default)
    }

    pub fn evaluate(code: Block) -> Self {
        Self::with_mode(ResumeMode::Evaluate(code))
    }

    pub fn value(value: Value) -> Self {
        Self::with_mode(ResumeMode::Value(value))
    }

    pub fn step(hook: StepHook) -> Self {
        Self::with_mode(ResumeMode::Step(hook))
    }

    fn with_mode(mode: ResumeMode) -> Self {
        ResumeInstruction {
            mode,
            target: ResumeTarget::Breakpoint,
        }
    }
}

/// Identity of the natives the debugger and backtraces treat specially.
#[derive(Debug, Clone, Copy)]
pub struct Markers {
    pub breakpoint: NativeFnHandle,
    pub pause: NativeFnHandle,
    pub console: NativeFnHandle,
    pub interrupt: NativeFnHandle,
}

impl Markers {
    /// Natives that must never show up in a backtrace.
    pub fn is_hidden(&self, callable: &Value) -> bool {
        matches!(callable, Value::Native(handle) if *handle == self.console || *handle == self.interrupt)
    }

    pub fn is_console(&self, callable: &Value) -> bool {
        matches!(callable, Value::Native(handle) if *handle == self.console)
    }

    pub fn is_suspension(&self, callable: &Value) -> bool {
        matches!(callable, Value::Native(handle) if *handle == self.breakpoint || *handle == self.pause)
    }
}

#[derive(Debug)]
pub struct DebugState {
    pub markers: Markers,
    /// Open sessions, innermost last. Each holds the scope of the call
    /// that opened it; input typed into the session runs there.
    sessions: Vec<Scope>,
    pub(crate) hook: Option<StepHook>,
}

impl DebugState {
    /// Number of sessions currently open, counting nested ones. Zero
    /// while the program runs undisturbed.
    pub fn depth(&self) -> usize {
        self.sessions.len()
    }

    /// Scope for input to the innermost session, the top level if none.
    pub fn scope(&self) -> Scope {
        self.sessions.last().copied().flatten()
    }

    pub fn hook_outstanding(&self) -> bool {
        self.hook.is_some()
    }

    fn open(&mut self, scope: Scope) {
        self.sessions.push(scope);
    }

    fn close(&mut self) {
        self.sessions.pop();
    }
}

pub fn register(
    builtins: &mut HashMap<String, Value>,
    registry: &mut Vec<(&'static str, NativeFn)>,
    data_map: &mut AnyMap,
) {
    let markers = Markers {
        breakpoint: Value::native_fn_handle("breakpoint", breakpoint, registry),
        pause: Value::native_fn_handle("pause", pause, registry),
        console: Value::native_fn_handle("console", console, registry),
        interrupt: Value::native_fn_handle("interrupt", interrupt, registry),
    };
    builtins.insert("breakpoint".to_string(), Value::Native(markers.breakpoint));
    builtins.insert("pause".to_string(), Value::Native(markers.pause));
    builtins.insert("console".to_string(), Value::Native(markers.console));
    builtins.insert("interrupt".to_string(), Value::Native(markers.interrupt));
    builtins.insert("resume".to_string(), Value::native_fn("resume", resume, registry));
    builtins.insert(
        "resume_with".to_string(),
        Value::native_fn("resume_with", resume_with, registry),
    );
    builtins.insert("step".to_string(), Value::native_fn("step", single_step, registry));

    data_map.insert(DebugState {
        markers,
        sessions: Vec::new(),
        hook: None,
    });
}

/// Run the console for one session opened at `scope`.
///
/// The session always evaluates with the default step function. When it
/// ends, a hook that is still outstanding is re-armed; otherwise whatever
/// step function was active before comes back.
fn run_session(
    state: &mut ExecutionState<'_>,
    scope: Scope,
) -> Result<SessionOutcome, EvalError> {
    state.debug_mut().open(scope);
    let saved = state.replace_step_fn(step::default_step);

    let console = state.console();
    let outcome = console.run(state);

    let restored = if state.debug().hook_outstanding() {
        step::step_once
    } else {
        saved
    };
    state.replace_step_fn(restored);
    state.debug_mut().close();
    outcome
}

/// Hand control to the console until it resumes or exits.
pub(crate) fn suspend(
    state: &mut ExecutionState<'_>,
    call: &NativeCall,
) -> EvalResult<ResumeInstruction> {
    let console_handle = state.debug().markers.console;
    let depth = state.debug().depth() + 1;
    debug!("{} suspended, session depth {}", call.name, depth);

    let outcome = state.enter(Value::Native(console_handle), |state, _| {
        run_session(state, call.scope)
    });
    match outcome {
        Ok(SessionOutcome::Exit(code)) => {
            debug!("session {} terminating with {}", depth, code);
            Err(Escape::Quit(code))
        }
        Ok(SessionOutcome::Resume(instruction)) => {
            debug!("session {} resuming: {:?}", depth, instruction.mode);
            Ok(instruction)
        }
        Err(err) => {
            warn!("error escaped the session at {}: {}", call.name, err);
            Err(Escape::Fail(err))
        }
    }
}

/// Apply the parts of an instruction shared by every suspension point.
/// Returns the mode with any step hook already installed.
fn settle(state: &mut ExecutionState<'_>, instruction: ResumeInstruction) -> EvalResult<ResumeMode> {
    let ResumeInstruction { mode, target } = instruction;
    match target {
        ResumeTarget::Breakpoint => {}
    }
    match mode {
        ResumeMode::Step(hook) => {
            step::install(state, hook)?;
            Ok(ResumeMode::Default)
        }
        mode => Ok(mode),
    }
}

fn breakpoint(state: &mut ExecutionState<'_>, call: NativeCall) -> EvalResult<Output> {
    argparse::validate_num_args(call.name, 0..=0, call.args.len())?;
    let instruction = suspend(state, &call)?;
    match settle(state, instruction)? {
        ResumeMode::Default | ResumeMode::Step(_) => Ok(Output::Invisible),
        ResumeMode::Evaluate(_) | ResumeMode::Value(_) => {
            Err(DebugError::BreakpointPayload.into())
        }
    }
}

/// Fired by the step hook. Suspends like `breakpoint` but backtraces skip
/// it.
fn interrupt(state: &mut ExecutionState<'_>, call: NativeCall) -> EvalResult<Output> {
    breakpoint(state, call)
}

fn pause(state: &mut ExecutionState<'_>, mut call: NativeCall) -> EvalResult<Output> {
    let args = std::mem::take(&mut call.args);
    let default: Block = argparse::parse1(call.name, args)?;
    let instruction = suspend(state, &call)?;
    let value = match settle(state, instruction)? {
        ResumeMode::Default | ResumeMode::Step(_) => state.eval_block(call.scope, &default)?,
        ResumeMode::Evaluate(code) => state.eval_block(call.scope, &code)?,
        ResumeMode::Value(value) => Some(value),
    };
    Ok(value.unwrap_or(Value::Null).into())
}

fn resume(_: &mut ExecutionState<'_>, call: NativeCall) -> EvalResult<Output> {
    let code: Option<Block> = argparse::parse_option(call.name, call.args)?;
    let instruction = match code {
        Some(code) => ResumeInstruction::evaluate(code),
        None => ResumeInstruction::resume(),
    };
    Err(Escape::Resume(instruction))
}

fn resume_with(_: &mut ExecutionState<'_>, call: NativeCall) -> EvalResult<Output> {
    let value: Value = argparse::parse1(call.name, call.args)?;
    Err(Escape::Resume(ResumeInstruction::value(value)))
}

fn single_step(_: &mut ExecutionState<'_>, call: NativeCall) -> EvalResult<Output> {
    let count: Option<i64> = argparse::parse_option(call.name, call.args)?;
    match count.unwrap_or(1) {
        1 => Err(Escape::Resume(ResumeInstruction::step(StepHook::once()))),
        count => Err(DebugError::StepCount(count).into()),
    }
}

/// Open a session directly. Nothing catches its resume instruction, so it
/// keeps unwinding past this call.
fn console(state: &mut ExecutionState<'_>, call: NativeCall) -> EvalResult<Output> {
    argparse::parse0(call.name, call.args)?;
    match run_session(state, call.scope)? {
        SessionOutcome::Exit(code) => Err(Escape::Quit(code)),
        SessionOutcome::Resume(instruction) => Err(Escape::Resume(instruction)),
    }
}
