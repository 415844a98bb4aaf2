//! Session front ends that a breakpoint hands control to.

use std::cell::RefCell;
use std::collections::VecDeque;

use super::debug::ResumeInstruction;
use super::error::EvalError;
use super::object::Value;
use super::ExecutionState;

/// How a session ended.
#[derive(Debug)]
pub enum SessionOutcome {
    Exit(i32),
    Resume(ResumeInstruction),
}

/// An interactive session. `run` returns once the user resumes or exits;
/// errors in evaluated input are normally reported and swallowed by the
/// console itself. An error it does return fails the suspended call.
pub trait Console {
    fn run(&self, state: &mut ExecutionState<'_>) -> Result<SessionOutcome, EvalError>;
}

pub mod session {
    use crate::backend::error::{EvalError, Escape};
    use crate::backend::object::Value;
    use crate::backend::ExecutionState;
    use crate::parser;

    use super::SessionOutcome;

    pub const SOURCE_NAME: &str = "<console>";

    #[derive(Debug)]
    pub enum SessionStep {
        Continue(Value),
        Failed(EvalError),
        Finished(SessionOutcome),
    }

    /// Evaluate one piece of session input in the scope of the suspended
    /// call.
    pub fn evaluate(state: &mut ExecutionState<'_>, source: &str) -> SessionStep {
        let block = match parser::parse(source, SOURCE_NAME) {
            Ok(block) => block,
            Err(err) => return SessionStep::Failed(EvalError::Syntax(err)),
        };
        let scope = state.debug().scope();
        match state.eval_block(scope, &block) {
            Ok(value) => SessionStep::Continue(value.unwrap_or(Value::Null)),
            Err(Escape::Return(value)) => SessionStep::Continue(value),
            Err(Escape::Resume(instruction)) => {
                SessionStep::Finished(SessionOutcome::Resume(instruction))
            }
            Err(Escape::Quit(code)) => SessionStep::Finished(SessionOutcome::Exit(code)),
            Err(escape) => SessionStep::Failed(escape.into_uncaught()),
        }
    }
}

use self::session::SessionStep;

#[derive(Debug)]
pub enum Reply {
    Value(Value),
    Error(EvalError),
    /// The line ended the session.
    Finished,
}

#[derive(Debug)]
pub struct SessionEntry {
    pub depth: usize,
    pub source: String,
    pub reply: Reply,
}

/// Plays back queued lines of input, one per evaluation, and keeps a
/// transcript. Nested sessions draw from the same queue.
#[derive(Debug, Default)]
pub struct ScriptedConsole {
    script: RefCell<VecDeque<String>>,
    transcript: RefCell<Vec<SessionEntry>>,
    propagate_errors: bool,
}

impl ScriptedConsole {
    pub fn new<I>(script: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        ScriptedConsole {
            script: RefCell::new(script.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    /// Hand errors from evaluated lines back to the suspended call instead
    /// of recording them.
    pub fn propagate_errors(mut self) -> Self {
        self.propagate_errors = true;
        self
    }

    pub fn remaining(&self) -> usize {
        self.script.borrow().len()
    }

    /// Entries in the order their lines were read.
    pub fn take_transcript(&self) -> Vec<SessionEntry> {
        self.transcript.take()
    }

    fn record(&self, depth: usize, source: String) -> usize {
        let mut transcript = self.transcript.borrow_mut();
        transcript.push(SessionEntry {
            depth,
            source,
            reply: Reply::Finished,
        });
        transcript.len() - 1
    }

    fn answer(&self, index: usize, reply: Reply) {
        self.transcript.borrow_mut()[index].reply = reply;
    }
}

impl Console for ScriptedConsole {
    fn run(&self, state: &mut ExecutionState<'_>) -> Result<SessionOutcome, EvalError> {
        let depth = state.debug().depth();
        loop {
            let next = self.script.borrow_mut().pop_front();
            let line = match next {
                Some(line) => line,
                None => {
                    warn!("script exhausted in session {}, resuming", depth);
                    return Ok(SessionOutcome::Resume(ResumeInstruction::resume()));
                }
            };
            debug!("session {} > {}", depth, line);
            let index = self.record(depth, line.clone());
            match session::evaluate(state, &line) {
                SessionStep::Continue(value) => self.answer(index, Reply::Value(value)),
                SessionStep::Failed(err) if self.propagate_errors => return Err(err),
                SessionStep::Failed(err) => self.answer(index, Reply::Error(err)),
                SessionStep::Finished(outcome) => return Ok(outcome),
            }
        }
    }
}

/// Used when nothing else is configured. Breakpoints log and carry on.
#[derive(Debug, Default)]
pub struct NullConsole;

impl Console for NullConsole {
    fn run(&self, state: &mut ExecutionState<'_>) -> Result<SessionOutcome, EvalError> {
        warn!(
            "breakpoint hit with no console attached (session {}), resuming",
            state.debug().depth()
        );
        Ok(SessionOutcome::Resume(ResumeInstruction::resume()))
    }
}
