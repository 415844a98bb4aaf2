//! Single stepping.
//!
//! A step request resumes normally but leaves a [`StepHook`] behind. While
//! the hook is outstanding the evaluator runs statements through
//! [`step_once`], which disarms itself before doing anything else, runs one
//! statement and then suspends again through the `interrupt` native.

use crate::parser::ast::Statement;

use super::error::{DebugError, EvalResult};
use super::object::Value;
use super::{ExecutionState, Scope};

/// Token for the one step that may be outstanding at a time. Installing it
/// hands it to the debugger; the hook gives it up the moment it fires.
#[derive(Debug)]
pub struct StepHook {
    _private: (),
}

impl StepHook {
    pub(crate) fn once() -> Self {
        StepHook { _private: () }
    }
}

pub fn default_step(
    state: &mut ExecutionState<'_>,
    scope: Scope,
    statement: &Statement,
) -> EvalResult<Option<Value>> {
    state.exec(scope, statement)
}

pub(crate) fn install(state: &mut ExecutionState<'_>, hook: StepHook) -> EvalResult<()> {
    let debug = state.debug_mut();
    if debug.hook.is_some() {
        return Err(DebugError::HookOutstanding.into());
    }
    debug.hook = Some(hook);
    state.replace_step_fn(step_once);
    debug!("step hook installed");
    Ok(())
}

pub fn step_once(
    state: &mut ExecutionState<'_>,
    scope: Scope,
    statement: &Statement,
) -> EvalResult<Option<Value>> {
    state.replace_step_fn(default_step);
    if let Some(hook) = state.debug_mut().hook.take() {
        debug!("step hook fired");
        drop(hook);
    }

    // Held until the interrupt returns, then handed back or re-raised.
    let stepped = default_step(state, scope, statement);

    let pending_top = state
        .stack
        .top()
        .map_or(false, |id| state.stack.frame(id).is_pending());
    let safe_parent = if pending_top {
        Some(state.stack.push_ephemeral())
    } else {
        None
    };
    let interrupt = state.debug().markers.interrupt;
    let interrupted = state.call_native(interrupt, scope);
    if let Some(id) = safe_parent {
        state.stack.pop(id);
    }

    interrupted?;
    stepped
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::backend::backtrace::Row;
    use crate::backend::console::{Reply, ScriptedConsole};
    use crate::backend::error::{EvalError, Escape};
    use crate::backend::ExecContext;
    use crate::parser::parse;

    fn state_with(console: &Rc<ScriptedConsole>) -> ExecutionState<'static> {
        ExecutionState::new(ExecContext {
            stream: None,
            console: Some(console.clone()),
        })
    }

    #[test]
    fn hook_fires_once_and_disarms() {
        let console = Rc::new(ScriptedConsole::new(vec!["resume();", "resume();"]));
        let mut state = state_with(&console);
        install(&mut state, StepHook::once()).unwrap();
        assert!(state.debug().hook_outstanding());

        let program = parse("let x = 1; x = x + 1; x;", "test").unwrap();
        let result = state.eval_block(None, &program).unwrap();

        assert_eq!(result, Some(Value::Integer(2)));
        assert!(!state.debug().hook_outstanding());
        assert_eq!(state.debug().depth(), 0);
        let transcript = console.take_transcript();
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript[0].depth, 1);
        assert!(matches!(transcript[0].reply, Reply::Finished));
        assert_eq!(console.remaining(), 1);
    }

    #[test]
    fn second_install_is_refused() {
        let console = Rc::new(ScriptedConsole::new(Vec::<String>::new()));
        let mut state = state_with(&console);
        install(&mut state, StepHook::once()).unwrap();
        let err = install(&mut state, StepHook::once()).unwrap_err();
        assert!(matches!(
            err,
            Escape::Fail(EvalError::Debug(DebugError::HookOutstanding))
        ));
    }

    #[test]
    fn pending_top_gets_an_ephemeral_parent() {
        let console = Rc::new(ScriptedConsole::new(vec!["backtrace(null, false, true);"]));
        let mut state = state_with(&console);
        let pending = state.stack.push(Value::Null, Some("half-called".to_string()), 1);
        install(&mut state, StepHook::once()).unwrap();

        let program = parse("1;", "test").unwrap();
        let stepped = step_once(&mut state, None, &program[0]).unwrap();
        assert_eq!(stepped, Some(Value::Integer(1)));

        let transcript = console.take_transcript();
        match &transcript[0].reply {
            Reply::Value(Value::Backtrace(report)) => {
                assert_eq!(report.rows, vec![Row::Label("half-called".to_string())]);
            }
            other => panic!("expected a backtrace, got {:?}", other),
        }

        // ephemeral parent and interrupt record are both gone again
        assert_eq!(state.stack.top(), Some(pending));
        assert_eq!(state.stack.depth(), 1);
        state.stack.pop(pending);
    }
}
