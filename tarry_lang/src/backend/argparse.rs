use super::error::EvalError;
use super::object::Value;
use std::{convert::TryFrom, ops::RangeInclusive};

pub fn validate_num_args(
    name: &str,
    expected: RangeInclusive<usize>,
    actual: usize,
) -> Result<(), EvalError> {
    if expected.contains(&actual) {
        return Ok(());
    }
    let expected = if expected.start() == expected.end() {
        expected.start().to_string()
    } else {
        format!("{} to {}", expected.start(), expected.end())
    };
    Err(EvalError::Arity {
        name: name.to_string(),
        expected,
        actual,
    })
}

pub fn convert_arg<T: TryFrom<Value>>(
    name: &str,
    value: Value,
    arg_index: usize,
) -> Result<T, EvalError> {
    let found = value.type_string();
    T::try_from(value).map_err(|_| EvalError::ArgType {
        name: name.to_string(),
        index: arg_index,
        found,
    })
}

pub fn parse_option<A>(name: &str, args: Vec<Value>) -> Result<Option<A>, EvalError>
where
    A: TryFrom<Value>,
{
    validate_num_args(name, 0..=1, args.len())?;
    args.into_iter()
        .next()
        .map(|value| convert_arg(name, value, 0))
        .transpose()
}

pub fn parse0(name: &str, args: Vec<Value>) -> Result<(), EvalError> {
    validate_num_args(name, 0..=0, args.len())
}

pub fn parse1<A>(name: &str, args: Vec<Value>) -> Result<A, EvalError>
where
    A: TryFrom<Value>,
{
    validate_num_args(name, 1..=1, args.len())?;
    let mut arg_iter = args.into_iter();
    let arg0 = arg_iter.next().unwrap_or(Value::Null);
    convert_arg(name, arg0, 0)
}

/// One required argument followed by an optional one.
pub fn parse1_option<A, B>(name: &str, args: Vec<Value>) -> Result<(A, Option<B>), EvalError>
where
    A: TryFrom<Value>,
    B: TryFrom<Value>,
{
    validate_num_args(name, 1..=2, args.len())?;
    let mut arg_iter = args.into_iter();
    let arg0 = arg_iter.next().unwrap_or(Value::Null);
    let arg0 = convert_arg(name, arg0, 0)?;
    let arg1 = arg_iter
        .next()
        .map(|value| convert_arg(name, value, 1))
        .transpose()?;
    Ok((arg0, arg1))
}
