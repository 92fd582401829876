//! Logic, equality, literal constructors, logging and assertions.

use super::BuiltinOp;
use super::params::{optional_param, param};
use crate::evaluator::Evaluator;
use crate::transfer::{Outcome, all_of, equal, narrow, truthiness, type_predicate};
use crate::types::Type;
use crate::value::{Object, Value};
use crate::{Arity, Error};
use log::{debug, info};

fn not(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    Ok(truthiness(param(args, 0, "not")?).not().to_value())
}

fn boolean(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    Ok(truthiness(param(args, 0, "boolean")?).to_value())
}

/// Every adjacent pair is equal
fn all_equal(args: &[Value]) -> Outcome {
    all_of(args.windows(2).map(|pair| equal(&pair[0], &pair[1])))
}

fn equals(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    Ok(all_equal(args).to_value())
}

fn not_equals(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    Ok(all_equal(args).not().to_value())
}

/// Same value: collections by reference, everything else by value
fn identical(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    let a: &Value = param(args, 0, "identical?")?;
    let b: &Value = param(args, 1, "identical?")?;
    let same = match (a, b) {
        (Value::Array(x), Value::Array(y)) => x.ptr_eq(y),
        (Value::Object(x), Value::Object(y)) => x.ptr_eq(y),
        _ => a == b,
    };
    Ok(Value::Boolean(same))
}

fn array(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    Ok(Value::array(args.iter().cloned()))
}

/// `(object k1 v1 k2 v2 ...)`; later keys win. An abstract key leaves only the shape.
fn object(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    if args.len() % 2 != 0 {
        return Err(Error::EvalError(format!(
            "object expects key/value pairs, got {} arguments",
            args.len()
        )));
    }
    let mut entries = Object::new();
    let mut abstract_key = false;
    for pair in args.chunks(2) {
        match &pair[0] {
            Value::String(key) => {
                entries.insert(key.clone(), pair[1].clone());
            }
            Value::Type(t) => {
                narrow(t, &Type::STRING, "object key")?;
                abstract_key = true;
            }
            other => {
                return Err(Error::TypeError(format!(
                    "object keys must be strings, got {other}"
                )));
            }
        }
    }
    if abstract_key {
        return Ok(Value::Type(Type::NON_EMPTY_OBJECT));
    }
    Ok(Value::Object(entries))
}

fn log_line(args: &[Value]) -> String {
    args.iter()
        .map(Value::to_plain_string)
        .collect::<Vec<_>>()
        .join(" ")
}

fn write(args: &[Value], evaluator: &Evaluator) -> Result<Value, Error> {
    if !evaluator.is_type_mode() {
        info!(target: "lits::write", "{}", log_line(args));
    }
    Ok(args.last().cloned().unwrap_or(Value::Nil))
}

fn debug_op(args: &[Value], evaluator: &Evaluator) -> Result<Value, Error> {
    if !evaluator.is_type_mode() {
        debug!(target: "lits::debug", "{}", log_line(args));
    }
    Ok(args.last().cloned().unwrap_or(Value::Nil))
}

/// Fails with the user message (or `default`) when the assertion cannot hold.
/// An undecided assertion may hold and passes.
fn check(
    outcome: Outcome,
    args: &[Value],
    message_index: usize,
    name: &str,
    default: impl FnOnce() -> String,
) -> Result<(), Error> {
    if outcome.can_be_true {
        return Ok(());
    }
    let message: Option<&str> = optional_param(args, message_index, name)?;
    Err(Error::UserError(
        message.map_or_else(default, str::to_owned),
    ))
}

/// Returns the value, narrowed to its truthy part when abstract
fn assert(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    let value: &Value = param(args, 0, "assert")?;
    check(truthiness(value), args, 1, "assert", || {
        format!("Assertion failed: {value} is falsy")
    })?;
    Ok(match value {
        Value::Type(t) => Value::Type(t.and(&Type::TRUTHY)),
        other => other.clone(),
    })
}

fn assert_equal(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    check(equal(&args[0], &args[1]), args, 2, "assert=", || {
        format!("Assertion failed: expected {} to equal {}", args[0], args[1])
    })?;
    Ok(Value::Nil)
}

fn assert_not_equal(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    check(equal(&args[0], &args[1]).not(), args, 2, "assert-not=", || {
        format!("Assertion failed: expected {} not to equal {}", args[0], args[1])
    })?;
    Ok(Value::Nil)
}

/// Declares a one-value assertion from an outcome test
macro_rules! value_assertions {
    ($($name:literal => $fn_name:ident($test:expr, $expected:literal)),* $(,)?) => {
        $(
            fn $fn_name(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
                let value: &Value = param(args, 0, $name)?;
                let test: fn(&Value) -> Outcome = $test;
                check(test(value), args, 1, $name, || {
                    format!("Assertion failed: expected {value} to be {}", $expected)
                })?;
                Ok(Value::Nil)
            }
        )*

        fn assertion_ops() -> Vec<BuiltinOp> {
            vec![$(BuiltinOp::native($name, Arity::Range(1, 2), $fn_name)),*]
        }
    };
}

value_assertions! {
    "assert-true" => assert_true(|v| type_predicate(v, &Type::TRUE), "true"),
    "assert-false" => assert_false(|v| type_predicate(v, &Type::FALSE), "false"),
    "assert-nil" => assert_nil(|v| type_predicate(v, &Type::NIL), "nil"),
    "assert-truthy" => assert_truthy(truthiness, "truthy"),
    "assert-falsy" => assert_falsy(|v| truthiness(v).not(), "falsy"),
}

type_predicates! {
    "nil?" => is_nil(Type::NIL),
    "boolean?" => is_boolean(Type::BOOLEAN),
    "true?" => is_true(Type::TRUE),
    "false?" => is_false(Type::FALSE),
    "string?" => is_string(Type::STRING),
    "array?" => is_array(Type::ARRAY),
    "object?" => is_object(Type::OBJECT),
    "regexp?" => is_regexp(Type::REGEXP),
    "function?" => is_function(Type::FUNCTION),
    "coll?" => is_coll(Type::COLLECTION),
    "seq?" => is_seq(Type::SEQUENCE),
    "empty?" => is_empty(Type::EMPTY_COLLECTION.or(&Type::NIL)),
    "not-empty?" => is_not_empty(Type::NON_EMPTY_COLLECTION),
}

pub(super) fn ops() -> Vec<BuiltinOp> {
    let mut ops = vec![
        BuiltinOp::native("not", Arity::Exact(1), not),
        BuiltinOp::native("boolean", Arity::Exact(1), boolean),
        BuiltinOp::native("=", Arity::AtLeast(1), equals),
        BuiltinOp::native("not=", Arity::AtLeast(1), not_equals),
        BuiltinOp::declared("identical?", Arity::Exact(2), identical, Type::BOOLEAN),
        BuiltinOp::native("array", Arity::Any, array),
        BuiltinOp::native("object", Arity::Any, object),
        BuiltinOp::native("write!", Arity::Any, write),
        BuiltinOp::native("debug!", Arity::Any, debug_op),
        BuiltinOp::native("assert", Arity::Range(1, 2), assert),
        BuiltinOp::native("assert=", Arity::Range(2, 3), assert_equal),
        BuiltinOp::native("assert-not=", Arity::Range(2, 3), assert_not_equal),
    ];
    ops.extend(assertion_ops());
    ops.extend(predicate_ops());
    ops
}
