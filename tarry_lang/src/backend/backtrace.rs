//! Stack inspection.
//!
//! Frames are numbered from the innermost call outward, starting at 1. The
//! debugger's own frames never appear: the console and interrupt natives
//! are skipped outright, and a breakpoint or pause at the very top of the
//! walk gets no row of its own. It can still be selected as level 0.
//!
//! Called from inside a console session, the walk begins below the
//! innermost session entry, so the session's own calls are not listed.

use std::collections::HashMap;
use std::fmt::{self, Display, Formatter, Write};
use std::rc::Rc;

use anymap::AnyMap;
use pad_adapter::PadAdapter;
use serde::{Deserialize, Serialize};

use super::debug::Markers;
use super::error::{EvalError, EvalResult};
use super::frame::{CallStack, Frame, FrameHandle, FrameId};
use super::object::{NativeCall, NativeFn, Output, Value};
use super::{argparse, ExecutionState};

pub const DEFAULT_LIMIT: usize = 20;

const ANONYMOUS: &str = "<anonymous>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ordinal {
    Number(usize),
    /// Still collecting its arguments.
    Pending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRow {
    pub ordinal: Ordinal,
    pub label: Option<String>,
    /// Rendered arguments, `None` for slots not yet filled.
    pub args: Vec<Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Row {
    Frame(FrameRow),
    /// Brief rows carry only the callable's label.
    Label(String),
    /// The listing was cut off at its limit.
    More,
}

/// Rows ordered outermost call first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backtrace {
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    All,
    Level(usize),
    Callable(Value),
}

#[derive(Debug, PartialEq)]
pub enum Found {
    Report(Backtrace),
    Frame(FrameHandle),
    NotFound,
}

/// Walk from `start` toward the outermost call. `limit` of `None` lists
/// every frame.
pub fn backtrace(
    stack: &mut CallStack,
    markers: &Markers,
    start: Option<FrameId>,
    selector: &Selector,
    limit: Option<usize>,
    brief: bool,
) -> Found {
    let mut rows = Vec::new();
    let mut number = 0;
    let mut first = true;
    let mut next = start;

    while let Some(id) = next {
        let frame = stack.frame(id);
        next = frame.parent();
        if frame.is_ephemeral() || markers.is_hidden(frame.callable()) {
            continue;
        }

        if std::mem::take(&mut first)
            && markers.is_suspension(frame.callable())
            && !frame.is_pending()
        {
            if *selector == Selector::Level(0) {
                return Found::Frame(stack.reify(id));
            }
            continue;
        }

        let ordinal = if frame.is_pending() {
            Ordinal::Pending
        } else {
            number += 1;
            Ordinal::Number(number)
        };

        let selected = match selector {
            Selector::All => false,
            Selector::Level(level) => ordinal == Ordinal::Number(*level),
            Selector::Callable(callable) => frame.callable() == callable,
        };
        if selected {
            return Found::Frame(stack.reify(id));
        }
        if *selector != Selector::All {
            continue;
        }

        if limit == Some(rows.len()) {
            rows.push(Row::More);
            break;
        }
        rows.push(make_row(frame, ordinal, brief));
    }

    match selector {
        Selector::All => {
            rows.reverse();
            Found::Report(Backtrace { rows })
        }
        _ => Found::NotFound,
    }
}

fn make_row(frame: &Frame, ordinal: Ordinal, brief: bool) -> Row {
    let label = frame.label().map(str::to_string);
    if brief {
        return Row::Label(label.unwrap_or_else(|| ANONYMOUS.to_string()));
    }
    let args = frame
        .args()
        .iter()
        .map(|slot| slot.as_ref().map(Value::to_string))
        .collect();
    Row::Frame(FrameRow {
        ordinal,
        label,
        args,
    })
}

impl Display for Ordinal {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Ordinal::Number(number) => write!(f, "{}", number),
            Ordinal::Pending => write!(f, "*"),
        }
    }
}

impl Display for Row {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Row::Frame(row) => {
                write!(f, "{} {}(", row.ordinal, row.label.as_deref().unwrap_or(ANONYMOUS))?;
                for (index, arg) in row.args.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg.as_deref().unwrap_or("?"))?;
                }
                write!(f, ")")
            }
            Row::Label(label) => write!(f, "{}", label),
            Row::More => write!(f, "+ more"),
        }
    }
}

impl Display for Backtrace {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if !f.alternate() {
            let rows = self.rows.iter().map(Row::to_string).collect::<Vec<_>>();
            return write!(f, "[{}]", rows.join(", "));
        }
        writeln!(f, "Backtrace:")?;
        let mut pad = PadAdapter::with_padding(f, "    ");
        for row in &self.rows {
            writeln!(pad, "{}", row)?;
        }
        Ok(())
    }
}

pub fn register(
    builtins: &mut HashMap<String, Value>,
    registry: &mut Vec<(&'static str, NativeFn)>,
    _: &mut AnyMap,
) {
    builtins.insert(
        "backtrace".to_string(),
        Value::native_fn("backtrace", backtrace_native, registry),
    );
}

fn backtrace_native(state: &mut ExecutionState<'_>, call: NativeCall) -> EvalResult<Output> {
    let NativeCall {
        frame, args, name, ..
    } = call;
    argparse::validate_num_args(name, 0..=3, args.len())?;
    let mut args = args.into_iter();
    let wrong = |index: usize, value: &Value| EvalError::ArgType {
        name: name.to_string(),
        index,
        found: value.type_string(),
    };

    let selector = match args.next().unwrap_or(Value::Null) {
        Value::Null => Selector::All,
        Value::Integer(level) if level >= 0 => Selector::Level(level as usize),
        callable if callable.is_callable() => Selector::Callable(callable),
        other => return Err(wrong(0, &other).into()),
    };
    let limit = match args.next().unwrap_or(Value::Null) {
        Value::Null => Some(DEFAULT_LIMIT),
        Value::Integer(limit) if limit >= 0 => Some(limit as usize),
        Value::Boolean(false) => None,
        other => return Err(wrong(1, &other).into()),
    };
    let brief = match args.next().unwrap_or(Value::Null) {
        Value::Null => false,
        Value::Boolean(brief) => brief,
        other => return Err(wrong(2, &other).into()),
    };

    let markers = state.debug().markers;
    let caller = state.stack.frame(frame).parent();
    // Inside a session, describe the suspended program rather than the
    // session's own calls.
    let start = state
        .stack
        .walk(caller)
        .find(|(_, frame)| markers.is_console(frame.callable()))
        .map_or(caller, |(id, _)| Some(id));
    let found = backtrace(&mut state.stack, &markers, start, &selector, limit, brief);
    let value = match found {
        Found::Report(report) => Value::Backtrace(Rc::new(report)),
        Found::Frame(handle) => Value::Frame(handle),
        Found::NotFound => Value::Null,
    };
    Ok(value.into())
}
