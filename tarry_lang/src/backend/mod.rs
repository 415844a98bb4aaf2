use std::{collections::HashMap, env, io, io::Write, rc::Rc};

use anymap::AnyMap;

use crate::parser::{self, ast::*};

use std::fmt::{self, Debug, Formatter};

pub mod object;
pub mod argparse;
pub mod backtrace;
pub mod builtins;
pub mod console;
pub mod debug;
pub mod error;
pub mod frame;
pub mod step;

use self::console::{Console, NullConsole};
use self::debug::DebugState;
use self::error::{EvalError, EvalResult, Escape};
use self::frame::{CallStack, FrameId};
use self::object::{NativeCall, NativeFn, Output, Value};

/// Where a statement runs: inside an activation record, or at the top level
/// where only globals are visible.
pub type Scope = Option<FrameId>;

/// The function the evaluator calls to run one statement. Swapped at
/// runtime by the step hook.
pub type StepFn = fn(&mut ExecutionState<'_>, Scope, &Statement) -> EvalResult<Option<Value>>;

pub struct ExecContext<'a> {
    pub stream: Option<&'a mut dyn io::Write>,
    pub console: Option<Rc<dyn Console + 'a>>,
}

impl<'a> Default for ExecContext<'a> {
    fn default() -> Self {
        ExecContext {
            stream: None,
            console: None,
        }
    }
}

pub struct ExecutionState<'a> {
    stack: CallStack,
    globals: HashMap<String, Value>,
    builtin_data: AnyMap,
    registry: Vec<(&'static str, NativeFn)>,
    step_fn: StepFn,
    stream: Box<dyn io::Write + 'a>,
    console: Rc<dyn Console + 'a>,
    trace: bool,
}

impl<'a> Debug for ExecutionState<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionState")
            .field("depth", &self.stack.depth())
            .field("top", &self.stack.top())
            .field("globals", &self.globals.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub enum ExecuteReturn {
    Return(Value),
    Quit(i32),
    Error(EvalError),
}

pub fn startup(program: Block, ctx: ExecContext<'_>) -> ExecuteReturn {
    let mut state = ExecutionState::new(ctx);
    let result = state.eval_block(None, &program);
    debug!("program finished with {} records left", state.stack.depth());
    match result {
        Ok(value) => ExecuteReturn::Return(value.unwrap_or(Value::Null)),
        Err(Escape::Return(value)) => ExecuteReturn::Return(value),
        Err(Escape::Quit(code)) => ExecuteReturn::Quit(code),
        Err(escape) => ExecuteReturn::Error(escape.into_uncaught()),
    }
}

/// Parse and run a whole source file.
pub fn run_source(source: &str, file_name: &str, ctx: ExecContext<'_>) -> ExecuteReturn {
    match parser::parse(source, file_name) {
        Ok(program) => startup(program, ctx),
        Err(err) => ExecuteReturn::Error(EvalError::Syntax(err)),
    }
}

impl<'a> ExecutionState<'a> {
    pub fn new(ctx: ExecContext<'a>) -> Self {
        let mut registry = Vec::new();
        let (globals, builtin_data) = builtins::get_builtins(&mut registry);

        let ExecContext { stream, console } = ctx;
        let stream: Box<dyn io::Write + 'a> = match stream {
            Some(stream) => Box::new(stream),
            None => Box::new(io::stdout()),
        };
        let console = console.unwrap_or_else(|| Rc::new(NullConsole));

        ExecutionState {
            stack: CallStack::new(),
            globals,
            builtin_data,
            registry,
            step_fn: step::default_step,
            stream,
            console,
            trace: env::var("TARRY_TRACE").is_ok(),
        }
    }

    pub fn debug(&self) -> &DebugState {
        self.builtin_data
            .get::<DebugState>()
            .expect("Debug Builtin not Initialized")
    }

    pub(crate) fn debug_mut(&mut self) -> &mut DebugState {
        self.builtin_data
            .get_mut::<DebugState>()
            .expect("Debug Builtin not Initialized")
    }

    pub fn native_name(&self, handle: object::NativeFnHandle) -> &'static str {
        self.registry[handle].0
    }

    pub(crate) fn console(&self) -> Rc<dyn Console + 'a> {
        self.console.clone()
    }

    /// Install `step_fn`, returning the one it replaces.
    pub(crate) fn replace_step_fn(&mut self, step_fn: StepFn) -> StepFn {
        std::mem::replace(&mut self.step_fn, step_fn)
    }

    /// Run a block statement by statement. The result is the value of the
    /// last statement that produced one.
    pub fn eval_block(&mut self, scope: Scope, block: &[Statement]) -> EvalResult<Option<Value>> {
        let mut last = None;
        for statement in block {
            if self.trace {
                trace!("step at depth {}: {:?}", self.stack.depth(), statement);
            }
            let step = self.step_fn;
            if let Some(value) = step(self, scope, statement)? {
                last = Some(value);
            }
        }
        Ok(last)
    }

    fn exec(&mut self, scope: Scope, statement: &Statement) -> EvalResult<Option<Value>> {
        match statement {
            Statement::Expr(expr) => self.eval(scope, expr),
            Statement::Let { name, value } => {
                let value = self.eval_value(scope, value)?;
                self.declare(scope, name.clone(), value);
                Ok(None)
            }
            Statement::Assign { name, value } => {
                let value = self.eval_value(scope, value)?;
                self.assign(scope, name, value)?;
                Ok(None)
            }
            Statement::Function(def) => {
                self.declare(scope, def.name.clone(), Value::Function(def.clone()));
                Ok(None)
            }
            Statement::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval_value(scope, expr)?,
                    None => Value::Null,
                };
                Err(Escape::Return(value))
            }
            Statement::If {
                condition,
                then,
                otherwise,
            } => match self.eval_value(scope, condition)? {
                Value::Boolean(true) => self.eval_block(scope, then),
                Value::Boolean(false) => match otherwise {
                    Some(otherwise) => self.eval_block(scope, otherwise),
                    None => Ok(None),
                },
                other => Err(EvalError::Condition(other.type_string()).into()),
            },
            Statement::Empty => Ok(None),
        }
    }

    fn declare(&mut self, scope: Scope, name: String, value: Value) {
        match scope {
            Some(id) => self.stack.frame_mut(id).declare(name, value),
            None => {
                self.globals.insert(name, value);
            }
        }
    }

    fn assign(&mut self, scope: Scope, name: &str, value: Value) -> EvalResult<()> {
        let local = scope
            .and_then(|id| self.stack.get_mut(id))
            .and_then(|frame| frame.local_mut(name));
        let slot = match local {
            Some(slot) => slot,
            None => self
                .globals
                .get_mut(name)
                .ok_or_else(|| EvalError::Undeclared(name.to_string()))?,
        };
        *slot = value;
        Ok(())
    }

    fn lookup(&self, scope: Scope, name: &str) -> EvalResult<Value> {
        scope
            .and_then(|id| self.stack.get(id))
            .and_then(|frame| frame.local(name))
            .or_else(|| self.globals.get(name))
            .cloned()
            .ok_or_else(|| EvalError::Undeclared(name.to_string()).into())
    }

    pub fn eval(&mut self, scope: Scope, expr: &Expr) -> EvalResult<Option<Value>> {
        let value = match expr {
            Expr::Literal(literal) => match literal {
                Literal::Integer(value) => Value::Integer(*value),
                Literal::String(value) => Value::String(value.as_str().into()),
                Literal::Boolean(value) => Value::Boolean(*value),
                Literal::Null => Value::Null,
            },
            Expr::Reference(name) => self.lookup(scope, name)?,
            Expr::Block(block) => Value::Block(block.clone()),
            Expr::Call { callee, args } => return self.eval_call(scope, callee, args),
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.eval_value(scope, lhs)?;
                let rhs = self.eval_value(scope, rhs)?;
                binary(*op, lhs, rhs)?
            }
            Expr::Negate(operand) => match self.eval_value(scope, operand)? {
                Value::Integer(value) => {
                    Value::Integer(value.checked_neg().ok_or(EvalError::Overflow)?)
                }
                other => return Err(EvalError::Negate(other.type_string()).into()),
            },
        };
        Ok(Some(value))
    }

    /// Evaluate an expression whose value is used. Invisible results are an
    /// error here.
    pub fn eval_value(&mut self, scope: Scope, expr: &Expr) -> EvalResult<Value> {
        self.eval(scope, expr)?
            .ok_or_else(|| EvalError::Invisible.into())
    }

    fn eval_call(&mut self, scope: Scope, callee: &Expr, args: &[Expr]) -> EvalResult<Option<Value>> {
        let function = self.eval_value(scope, callee)?;
        let label = match &function {
            Value::Function(def) => def.name.clone(),
            Value::Native(handle) => self.native_name(*handle).to_string(),
            other => return Err(EvalError::NotCallable(other.type_string()).into()),
        };
        let id = self.stack.push(function.clone(), Some(label), args.len());
        let result = self.collect_and_dispatch(id, scope, function, args);
        self.stack.pop(id);
        result
    }

    fn collect_and_dispatch(
        &mut self,
        id: FrameId,
        scope: Scope,
        function: Value,
        args: &[Expr],
    ) -> EvalResult<Option<Value>> {
        let mut values = Vec::with_capacity(args.len());
        for (slot, arg) in args.iter().enumerate() {
            let value = self.eval_value(scope, arg)?;
            self.stack.fulfill(id, slot, value.clone());
            values.push(value);
        }
        self.stack.finish_args(id);
        self.dispatch(id, scope, function, values)
    }

    fn dispatch(
        &mut self,
        id: FrameId,
        scope: Scope,
        function: Value,
        args: Vec<Value>,
    ) -> EvalResult<Option<Value>> {
        match function {
            Value::Function(def) => {
                if def.params.len() != args.len() {
                    return Err(EvalError::Arity {
                        name: def.name.clone(),
                        expected: def.params.len().to_string(),
                        actual: args.len(),
                    }
                    .into());
                }
                let frame = self.stack.frame_mut(id);
                for (param, value) in def.params.iter().zip(args) {
                    frame.declare(param.clone(), value);
                }
                match self.eval_block(Some(id), &def.body) {
                    Ok(value) => Ok(Some(value.unwrap_or(Value::Null))),
                    Err(Escape::Return(value)) => Ok(Some(value)),
                    Err(escape) => Err(escape),
                }
            }
            Value::Native(handle) => {
                let (name, native) = self.registry[handle];
                let call = NativeCall {
                    frame: id,
                    scope,
                    args,
                    name,
                };
                match native(self, call)? {
                    Output::Value(value) => Ok(Some(value)),
                    Output::Invisible => Ok(None),
                }
            }
            other => Err(EvalError::NotCallable(other.type_string()).into()),
        }
    }

    /// Push a zero-argument activation for `callable`, run `body` inside it
    /// and pop it again.
    pub(crate) fn enter<T>(
        &mut self,
        callable: Value,
        body: impl FnOnce(&mut Self, FrameId) -> T,
    ) -> T {
        let label = match &callable {
            Value::Native(handle) => Some(self.native_name(*handle).to_string()),
            Value::Function(def) => Some(def.name.clone()),
            _ => None,
        };
        let id = self.stack.push(callable, label, 0);
        self.stack.finish_args(id);
        let result = body(self, id);
        self.stack.pop(id);
        result
    }

    /// Call a native with no arguments on behalf of the runtime.
    pub(crate) fn call_native(
        &mut self,
        handle: object::NativeFnHandle,
        scope: Scope,
    ) -> EvalResult<Option<Value>> {
        let callable = Value::Native(handle);
        self.enter(callable.clone(), |state, id| {
            state.dispatch(id, scope, callable, Vec::new())
        })
    }

    pub(crate) fn write_out(&mut self, text: fmt::Arguments<'_>) -> io::Result<()> {
        self.stream.write_fmt(text)
    }
}

fn binary(op: BinaryOp, lhs: Value, rhs: Value) -> EvalResult<Value> {
    let value = match (op, &lhs, &rhs) {
        (BinaryOp::Eq, _, _) => Value::Boolean(lhs == rhs),
        (BinaryOp::NotEq, _, _) => Value::Boolean(lhs != rhs),
        (BinaryOp::Add, Value::String(l), Value::String(r)) => {
            Value::String(format!("{}{}", l, r).into())
        }
        (_, Value::Integer(l), Value::Integer(r)) => integer_op(op, *l, *r)?,
        (BinaryOp::Less, Value::String(l), Value::String(r)) => Value::Boolean(l < r),
        (BinaryOp::LessEq, Value::String(l), Value::String(r)) => Value::Boolean(l <= r),
        (BinaryOp::Greater, Value::String(l), Value::String(r)) => Value::Boolean(l > r),
        (BinaryOp::GreaterEq, Value::String(l), Value::String(r)) => Value::Boolean(l >= r),
        _ => {
            return Err(EvalError::Operands {
                op: op.symbol(),
                lhs: lhs.type_string(),
                rhs: rhs.type_string(),
            }
            .into())
        }
    };
    Ok(value)
}

fn integer_op(op: BinaryOp, lhs: i64, rhs: i64) -> EvalResult<Value> {
    let checked = |result: Option<i64>| result.map(Value::Integer).ok_or(EvalError::Overflow);
    let value = match op {
        BinaryOp::Add => checked(lhs.checked_add(rhs))?,
        BinaryOp::Sub => checked(lhs.checked_sub(rhs))?,
        BinaryOp::Mul => checked(lhs.checked_mul(rhs))?,
        BinaryOp::Div => {
            if rhs == 0 {
                return Err(EvalError::DivideByZero.into());
            }
            checked(lhs.checked_div(rhs))?
        }
        BinaryOp::Eq => Value::Boolean(lhs == rhs),
        BinaryOp::NotEq => Value::Boolean(lhs != rhs),
        BinaryOp::Less => Value::Boolean(lhs < rhs),
        BinaryOp::LessEq => Value::Boolean(lhs <= rhs),
        BinaryOp::Greater => Value::Boolean(lhs > rhs),
        BinaryOp::GreaterEq => Value::Boolean(lhs >= rhs),
    };
    Ok(value)
}
