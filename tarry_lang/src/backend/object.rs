use std::convert::TryFrom;
use std::fmt::{self, Debug, Display, Formatter};
use std::rc::Rc;

use crate::parser::ast::{Block, FunctionDef};

use super::backtrace::Backtrace;
use super::error::{EvalError, EvalResult};
use super::frame::{FrameHandle, FrameId};
use super::{ExecutionState, Scope};

pub type NativeFn = fn(&mut ExecutionState<'_>, NativeCall) -> EvalResult<Output>;

pub type NativeFnHandle = usize;

/// What a native receives when it is dispatched.
#[derive(Debug)]
pub struct NativeCall {
    /// The native's own activation record.
    pub frame: FrameId,
    /// Scope of the caller, where code blocks handed to the native run.
    pub scope: Scope,
    pub args: Vec<Value>,
    pub name: &'static str,
}

/// Result of a native. `Invisible` leaves the surrounding block's last
/// value untouched.
#[derive(Debug)]
pub enum Output {
    Value(Value),
    Invisible,
}

impl From<Value> for Output {
    fn from(value: Value) -> Self {
        Output::Value(value)
    }
}

#[derive(Clone)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    String(Rc<str>),
    Block(Block),
    Function(Rc<FunctionDef>),
    Native(NativeFnHandle),
    Frame(FrameHandle),
    Error(Rc<EvalError>),
    Backtrace(Rc<Backtrace>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(lhs), Value::Boolean(rhs)) => lhs == rhs,
            (Value::Integer(lhs), Value::Integer(rhs)) => lhs == rhs,
            (Value::String(lhs), Value::String(rhs)) => lhs == rhs,
            (Value::Block(lhs), Value::Block(rhs)) => Rc::ptr_eq(lhs, rhs),
            (Value::Function(lhs), Value::Function(rhs)) => Rc::ptr_eq(lhs, rhs),
            (Value::Native(lhs), Value::Native(rhs)) => lhs == rhs,
            (Value::Frame(lhs), Value::Frame(rhs)) => lhs == rhs,
            (Value::Error(lhs), Value::Error(rhs)) => Rc::ptr_eq(lhs, rhs),
            (Value::Backtrace(lhs), Value::Backtrace(rhs)) => lhs == rhs,
            _ => false,
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.debug_tuple("Null").finish(),
            Value::Boolean(val) => f.debug_tuple("Boolean").field(val).finish(),
            Value::Integer(val) => f.debug_tuple("Integer").field(val).finish(),
            Value::String(val) => f.debug_tuple("String").field(&&**val).finish(),
            Value::Block(block) => f
                .debug_struct("Block")
                .field("statements", &block.len())
                .finish(),
            Value::Function(function) => f
                .debug_struct("Function")
                .field("name", &function.name)
                .field("params", &function.params)
                .finish_non_exhaustive(),
            Value::Native(handle) => f.debug_tuple("Native").field(handle).finish(),
            Value::Frame(handle) => f.debug_tuple("Frame").field(handle).finish(),
            Value::Error(err) => f.debug_tuple("Error").field(err).finish(),
            Value::Backtrace(report) => f.debug_tuple("Backtrace").field(report).finish(),
        }
    }
}

macro_rules! value_try_from {
    ($datatype:ty, $enumval:path) => {
        impl TryFrom<Value> for $datatype {
            type Error = &'static str;
            fn try_from(value: Value) -> Result<Self, Self::Error> {
                if let $enumval(value) = value {
                    Ok(value)
                } else {
                    Err(concat!("Value is not a ", stringify!($enumval)))
                }
            }
        }

        impl TryFrom<Value> for Option<$datatype> {
            type Error = &'static str;
            fn try_from(value: Value) -> Result<Self, Self::Error> {
                match value {
                    Value::Null => Ok(None),
                    $enumval(value) => Ok(Some(value)),
                    _ => Err(concat!("Value is not a ", stringify!($enumval))),
                }
            }
        }
    };
}

value_try_from!(bool, Value::Boolean);
value_try_from!(i64, Value::Integer);
value_try_from!(Rc<str>, Value::String);
value_try_from!(Block, Value::Block);
value_try_from!(FrameHandle, Value::Frame);

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(val) => write!(f, "{}", val),
            Value::Integer(val) => write!(f, "{}", val),
            Value::String(val) => write!(f, "{}", val),
            Value::Block(_) => write!(f, "{{...}}"),
            Value::Function(function) => write!(f, "{}({})", function.name, function.params.join(", ")),
            Value::Native(handle) => write!(f, "native #{}", handle),
            Value::Frame(handle) => write!(f, "{}", handle),
            Value::Error(err) => write!(f, "error: {}", err),
            Value::Backtrace(report) => write!(f, "{}", report),
        }
    }
}

impl Value {
    pub fn type_string(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Boolean(_) => "Boolean",
            Value::Integer(_) => "Integer",
            Value::String(_) => "String",
            Value::Block(_) => "Block",
            Value::Function(_) => "Function",
            Value::Native(_) => "Native_Function",
            Value::Frame(_) => "Frame",
            Value::Error(_) => "Error",
            Value::Backtrace(_) => "Backtrace",
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_) | Value::Native(_))
    }

    pub fn native_fn(
        name: &'static str,
        function: NativeFn,
        registry: &mut Vec<(&'static str, NativeFn)>,
    ) -> Self {
        Value::Native(Value::native_fn_handle(name, function, registry))
    }

    pub fn native_fn_handle(
        name: &'static str,
        function: NativeFn,
        registry: &mut Vec<(&'static str, NativeFn)>,
    ) -> NativeFnHandle {
        let index = registry.len();
        registry.push((name, function));
        index
    }
}
