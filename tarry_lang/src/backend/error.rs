use std::{fmt, io, rc::Rc};

use thiserror::Error;

use crate::context::ErrorContext;

use super::debug::ResumeInstruction;
use super::object::Value;

/// Misuse of the breakpoint protocol, reported at the offending call.
#[derive(Debug, Error)]
pub enum DebugError {
    #[error("breakpoint is invisible, can't resume with a value (use pause)")]
    BreakpointPayload,
    #[error("step is just getting started, only a count of 1 works (got {0})")]
    StepCount(i64),
    #[error("a step hook is already outstanding")]
    HookOutstanding,
    #[error("resume has no paused call to return to")]
    Unpaused,
}

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("{0}")]
    Syntax(ErrorContext),
    #[error("undeclared variable \"{0}\"")]
    Undeclared(String),
    #[error("{0} is not callable")]
    NotCallable(&'static str),
    #[error("{name} expects {expected} arguments, got {actual}")]
    Arity {
        name: String,
        expected: String,
        actual: usize,
    },
    #[error("argument {index} to {name} cannot be {found}")]
    ArgType {
        name: String,
        index: usize,
        found: &'static str,
    },
    #[error("expression produced no value")]
    Invisible,
    #[error("cannot apply {op} to {lhs} and {rhs}")]
    Operands {
        op: &'static str,
        lhs: &'static str,
        rhs: &'static str,
    },
    #[error("cannot negate {0}")]
    Negate(&'static str),
    #[error("condition must be Boolean, got {0}")]
    Condition(&'static str),
    #[error("integer overflow")]
    Overflow,
    #[error("divide by zero")]
    DivideByZero,
    #[error("frame has already returned")]
    StaleFrame,
    #[error("no catch for throw {0}")]
    NoCatch(String),
    #[error("I/O failure: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Debug(#[from] DebugError),
}

/// Every way evaluation can leave the normal path. Control transfers and
/// failures are distinct variants so catchers match on type, never on names.
#[derive(Debug)]
pub enum Escape {
    /// Raised by `resume` and `step`; only a suspended breakpoint or pause
    /// receives it.
    Resume(ResumeInstruction),
    Quit(i32),
    Throw {
        name: Option<Rc<str>>,
        value: Value,
    },
    Return(Value),
    Fail(EvalError),
}

pub type EvalResult<T> = Result<T, Escape>;

impl From<EvalError> for Escape {
    fn from(err: EvalError) -> Self {
        Escape::Fail(err)
    }
}

impl From<DebugError> for Escape {
    fn from(err: DebugError) -> Self {
        Escape::Fail(err.into())
    }
}

impl From<io::Error> for Escape {
    fn from(err: io::Error) -> Self {
        Escape::Fail(err.into())
    }
}

impl Escape {
    /// The failure this escape becomes once nothing is left to catch it.
    pub fn into_uncaught(self) -> EvalError {
        match self {
            Escape::Fail(err) => err,
            Escape::Resume(_) => DebugError::Unpaused.into(),
            Escape::Throw { name, value } => EvalError::NoCatch(describe_throw(&name, &value)),
            Escape::Return(_) => EvalError::NoCatch("return".to_string()),
            Escape::Quit(code) => EvalError::NoCatch(format!("quit({})", code)),
        }
    }
}

fn describe_throw(name: &Option<Rc<str>>, value: &Value) -> String {
    match name {
        Some(name) => format!("{} ({})", name, value),
        None => value.to_string(),
    }
}

impl fmt::Display for Escape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Escape::Resume(instruction) => write!(f, "resume {:?}", instruction.mode),
            Escape::Quit(code) => write!(f, "quit {}", code),
            Escape::Throw { name, value } => write!(f, "throw {}", describe_throw(name, value)),
            Escape::Return(value) => write!(f, "return {}", value),
            Escape::Fail(err) => write!(f, "error: {}", err),
        }
    }
}
