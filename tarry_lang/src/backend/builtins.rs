use super::{
    argparse, backtrace, debug,
    error::{EvalError, EvalResult, Escape},
    frame::FrameHandle,
    object::{NativeCall, NativeFn, Output, Value},
    ExecutionState,
};
use crate::parser::ast::Block;
use anymap::AnyMap;
use std::{collections::HashMap, convert::TryFrom, rc::Rc};

pub fn get_builtins(registry: &mut Vec<(&'static str, NativeFn)>) -> (HashMap<String, Value>, AnyMap) {
    let mut map = HashMap::new();
    let mut data_map = AnyMap::new();
    let natives: [(&'static str, NativeFn); 8] = [
        ("print", print),
        ("println", println),
        ("throw", throw),
        ("catch", catch),
        ("trap", trap),
        ("quit", quit),
        ("running", running),
        ("pending", pending),
    ];
    for (name, function) in natives {
        map.insert(name.to_string(), Value::native_fn(name, function, registry));
    }

    debug::register(&mut map, registry, &mut data_map);
    backtrace::register(&mut map, registry, &mut data_map);

    (map, data_map)
}

fn print(st: &mut ExecutionState<'_>, call: NativeCall) -> EvalResult<Output> {
    for value in call.args.into_iter() {
        st.write_out(format_args!("{}", value))?;
    }
    Ok(Value::Null.into())
}

fn println(st: &mut ExecutionState<'_>, call: NativeCall) -> EvalResult<Output> {
    for value in call.args.into_iter() {
        st.write_out(format_args!("{}", value))?;
    }
    st.write_out(format_args!("\n"))?;
    Ok(Value::Null.into())
}

fn throw(_: &mut ExecutionState<'_>, call: NativeCall) -> EvalResult<Output> {
    let (value, name): (Value, Option<Rc<str>>) = argparse::parse1_option(call.name, call.args)?;
    Err(Escape::Throw { name, value })
}

/// Run a block, catching throws. With a name only throws of that name are
/// caught. Resume and quit requests always pass through.
fn catch(st: &mut ExecutionState<'_>, call: NativeCall) -> EvalResult<Output> {
    let (block, wanted): (Block, Option<Rc<str>>) = argparse::parse1_option(call.name, call.args)?;
    match st.eval_block(call.scope, &block) {
        Ok(value) => Ok(value.unwrap_or(Value::Null).into()),
        Err(Escape::Throw { name, value }) if wanted.is_none() || name == wanted => {
            Ok(value.into())
        }
        Err(escape) => Err(escape),
    }
}

/// Run a block, turning a failure into an error value.
fn trap(st: &mut ExecutionState<'_>, call: NativeCall) -> EvalResult<Output> {
    let block: Block = argparse::parse1(call.name, call.args)?;
    match st.eval_block(call.scope, &block) {
        Ok(value) => Ok(value.unwrap_or(Value::Null).into()),
        Err(Escape::Fail(err)) => Ok(Value::Error(Rc::new(err)).into()),
        Err(escape) => Err(escape),
    }
}

fn quit(_: &mut ExecutionState<'_>, call: NativeCall) -> EvalResult<Output> {
    let code: Option<i64> = argparse::parse_option(call.name, call.args)?;
    let code = code.unwrap_or(0);
    let code = i32::try_from(code).map_err(|_| EvalError::ArgType {
        name: call.name.to_string(),
        index: 0,
        found: "out of range Integer",
    })?;
    Err(Escape::Quit(code))
}

/// Whether a reified frame's call is still in progress.
fn running(st: &mut ExecutionState<'_>, call: NativeCall) -> EvalResult<Output> {
    let handle: FrameHandle = argparse::parse1(call.name, call.args)?;
    Ok(Value::Boolean(st.stack.resolve(handle).is_some()).into())
}

/// Whether a reified frame is still collecting its arguments.
fn pending(st: &mut ExecutionState<'_>, call: NativeCall) -> EvalResult<Output> {
    let handle: FrameHandle = argparse::parse1(call.name, call.args)?;
    let frame = st.stack.resolve(handle).ok_or(EvalError::StaleFrame)?;
    Ok(Value::Boolean(frame.is_pending()).into())
}
