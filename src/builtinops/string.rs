//! String and regular expression built-ins.
//!
//! None of these inspect abstract operands; all are registered as declared, so any
//! abstract argument answers with the declared result type.

use super::BuiltinOp;
use super::params::{Pattern, optional_param, param};
use crate::evaluator::Evaluator;
use crate::types::Type;
use crate::value::{Array, RegularExpression, Value};
use crate::{Arity, Error};

fn str_op(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    Ok(Value::String(args.iter().map(Value::to_plain_string).collect()))
}

/// `(subs s start end?)` over characters, bounds clamped to the length
fn subs(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    let s: &str = param(args, 0, "subs")?;
    let len = s.chars().count();
    let start = param::<usize>(args, 1, "subs")?.min(len);
    let end = optional_param::<usize>(args, 2, "subs")?.map_or(len, |end| end.min(len));
    if start >= end {
        return Ok(Value::from(""));
    }
    Ok(Value::String(s.chars().skip(start).take(end - start).collect()))
}

fn upper_case(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    Ok(Value::String(param::<&str>(args, 0, "upper-case")?.to_uppercase()))
}

fn lower_case(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    Ok(Value::String(param::<&str>(args, 0, "lower-case")?.to_lowercase()))
}

fn trim(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    Ok(Value::from(param::<&str>(args, 0, "trim")?.trim()))
}

fn join(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    let items: &Array = param(args, 0, "join")?;
    let separator: &str = optional_param(args, 1, "join")?.unwrap_or("");
    let parts: Vec<String> = items.iter().map(Value::to_plain_string).collect();
    Ok(Value::String(parts.join(separator)))
}

fn string_repeat(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    let s: &str = param(args, 0, "string-repeat")?;
    let count: usize = param(args, 1, "string-repeat")?;
    Ok(Value::String(s.repeat(count)))
}

/// Replaces the first match, or every match of a regexp with the `g` flag
fn replace(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    let s: &str = param(args, 0, "replace")?;
    let replacement: &str = param(args, 2, "replace")?;
    let replaced = match param::<Pattern>(args, 1, "replace")? {
        Pattern::Literal(literal) => s.replacen(literal, replacement, 1),
        Pattern::Regexp(regexp) if regexp.is_global() => {
            regexp.regex().replace_all(s, replacement).into_owned()
        }
        Pattern::Regexp(regexp) => regexp.regex().replace(s, replacement).into_owned(),
    };
    Ok(Value::String(replaced))
}

fn replace_all(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    let s: &str = param(args, 0, "replace-all")?;
    let replacement: &str = param(args, 2, "replace-all")?;
    let replaced = match param::<Pattern>(args, 1, "replace-all")? {
        Pattern::Literal(literal) => s.replace(literal, replacement),
        Pattern::Regexp(regexp) => regexp.regex().replace_all(s, replacement).into_owned(),
    };
    Ok(Value::String(replaced))
}

/// Splits on a literal or a regexp; the empty separator splits into characters
fn split(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    let s: &str = param(args, 0, "split")?;
    let parts: Vec<Value> = match param::<Pattern>(args, 1, "split")? {
        Pattern::Literal("") => s.chars().map(|c| Value::String(c.to_string())).collect(),
        Pattern::Literal(separator) => s.split(separator).map(Value::from).collect(),
        Pattern::Regexp(regexp) => regexp.regex().split(s).map(Value::from).collect(),
    };
    Ok(Value::array(parts))
}

fn starts_with(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    let s: &str = param(args, 0, "starts-with?")?;
    let prefix: &str = param(args, 1, "starts-with?")?;
    Ok(Value::Boolean(s.starts_with(prefix)))
}

fn ends_with(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    let s: &str = param(args, 0, "ends-with?")?;
    let suffix: &str = param(args, 1, "ends-with?")?;
    Ok(Value::Boolean(s.ends_with(suffix)))
}

/// Parses a number, surrounding whitespace ignored
fn number(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    let s: &str = param(args, 0, "number")?;
    s.trim()
        .parse::<f64>()
        .map(Value::Number)
        .map_err(|_| Error::EvalError(format!("number: cannot parse \"{s}\" as a number")))
}

fn regexp(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    let source: &str = param(args, 0, "regexp")?;
    let flags: &str = optional_param(args, 1, "regexp")?.unwrap_or("");
    RegularExpression::new(source, flags).map(Value::Regexp)
}

/// The whole match followed by its groups, unmatched groups nil; nil without a match
fn match_op(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    let regexp: &RegularExpression = param(args, 0, "match")?;
    let s: &str = param(args, 1, "match")?;
    Ok(match regexp.regex().captures(s) {
        Some(captures) => Value::array(
            captures
                .iter()
                .map(|group| group.map_or(Value::Nil, |m| Value::from(m.as_str()))),
        ),
        None => Value::Nil,
    })
}

pub(super) fn ops() -> Vec<BuiltinOp> {
    vec![
        BuiltinOp::declared("str", Arity::Any, str_op, Type::STRING),
        BuiltinOp::declared("subs", Arity::Range(2, 3), subs, Type::STRING),
        BuiltinOp::declared("upper-case", Arity::Exact(1), upper_case, Type::STRING),
        BuiltinOp::declared("lower-case", Arity::Exact(1), lower_case, Type::STRING),
        BuiltinOp::declared("trim", Arity::Exact(1), trim, Type::STRING),
        BuiltinOp::declared("join", Arity::Range(1, 2), join, Type::STRING),
        BuiltinOp::declared("string-repeat", Arity::Exact(2), string_repeat, Type::STRING),
        BuiltinOp::declared("replace", Arity::Exact(3), replace, Type::STRING),
        BuiltinOp::declared("replace-all", Arity::Exact(3), replace_all, Type::STRING),
        BuiltinOp::declared("split", Arity::Exact(2), split, Type::ARRAY),
        BuiltinOp::declared("starts-with?", Arity::Exact(2), starts_with, Type::BOOLEAN),
        BuiltinOp::declared("ends-with?", Arity::Exact(2), ends_with, Type::BOOLEAN),
        BuiltinOp::declared("number", Arity::Exact(1), number, Type::NUMBER.or(&Type::NAN)),
        BuiltinOp::declared("regexp", Arity::Range(1, 2), regexp, Type::REGEXP),
        BuiltinOp::declared("match", Arity::Exact(2), match_op, Type::ARRAY.or(&Type::NIL)),
    ]
}
