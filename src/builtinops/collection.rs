//! Collection built-ins: lookup, update, membership and quantifiers.
//!
//! Lookups and updates run through the collection transfer functions and work on
//! abstract collections. Quantifiers call their predicate through the evaluator, so an
//! undecided predicate result makes the whole answer undecided.

use super::BuiltinOp;
use super::params::{optional_param, param};
use crate::evaluator::Evaluator;
use crate::transfer::collection::{self, Emptiness, elements, emptiness};
use crate::transfer::{Outcome, narrow, truthiness};
use crate::types::Type;
use crate::value::{Array, Object, Value};
use crate::{Arity, Error};

fn get(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    let coll: &Value = param(args, 0, "get")?;
    let key: &Value = param(args, 1, "get")?;
    collection::get(coll, key, optional_param(args, 2, "get")?)
}

/// Key path argument: an array of keys, or nil for the empty path
fn key_path(path: &Value, what: &str) -> Result<Option<Vec<Value>>, Error> {
    match path {
        Value::Nil => Ok(Some(Vec::new())),
        Value::Array(keys) => Ok(Some(keys.iter().cloned().collect())),
        Value::Type(t) => narrow(t, &Type::ARRAY.or(&Type::NIL), what).map(|_| None),
        other => Err(Error::TypeError(format!(
            "{what} expects an array of keys, got {other}"
        ))),
    }
}

fn get_in(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    let coll: &Value = param(args, 0, "get-in")?;
    let default = optional_param(args, 2, "get-in")?;
    match key_path(param(args, 1, "get-in")?, "get-in")? {
        Some(path) => collection::get_in(coll, &path, default),
        None => Ok(Value::Type(Type::UNKNOWN)),
    }
}

fn assoc(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    let coll: &Value = param(args, 0, "assoc")?;
    let key: &Value = param(args, 1, "assoc")?;
    let value: &Value = param(args, 2, "assoc")?;
    collection::assoc(coll, key, value.clone())
}

fn assoc_in(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    let coll: &Value = param(args, 0, "assoc-in")?;
    let value: &Value = param(args, 2, "assoc-in")?;
    match key_path(param(args, 1, "assoc-in")?, "assoc-in")? {
        Some(path) => collection::assoc_in(coll, &path, value.clone()),
        None => collection::assoc(coll, &Value::Type(Type::UNKNOWN), value.clone()),
    }
}

/// `(update coll key f & args)`: assoc the result of calling `f` on the old value
fn update(args: &[Value], evaluator: &Evaluator) -> Result<Value, Error> {
    let coll: &Value = param(args, 0, "update")?;
    let key: &Value = param(args, 1, "update")?;
    let function: &Value = param(args, 2, "update")?;
    let mut call_args = vec![collection::get(coll, key, None)?];
    call_args.extend(args[3..].iter().cloned());
    let updated = evaluator.call_function(function, call_args)?;
    collection::assoc(coll, key, updated)
}

fn concat(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    collection::concat(args)
}

fn count(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    collection::count(param(args, 0, "count")?)
}

fn contains(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    let outcome = collection::contains(param(args, 0, "contains?")?, param(args, 1, "contains?")?)?;
    Ok(outcome.to_value())
}

fn has(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    Ok(collection::has(param(args, 0, "has?")?, param(args, 1, "has?")?)?.to_value())
}

fn has_some(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    let outcome = collection::has_some(param(args, 0, "has-some?")?, param(args, 1, "has-some?")?)?;
    Ok(outcome.to_value())
}

fn has_every(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    let outcome =
        collection::has_every(param(args, 0, "has-every?")?, param(args, 1, "has-every?")?)?;
    Ok(outcome.to_value())
}

/// Whether `(pred x)` holds for every (`all`) or some element of the collection
fn quantify(args: &[Value], evaluator: &Evaluator, name: &str, all: bool) -> Result<Outcome, Error> {
    let predicate: &Value = param(args, 0, name)?;
    let coll: &Value = param(args, 1, name)?;
    let vacuous = Outcome::from_bool(all);
    match (coll, emptiness(coll, name)?) {
        (_, Emptiness::Empty) => Ok(vacuous),
        (Value::Type(_), _) => Ok(Outcome::EITHER),
        _ => {
            let mut outcome = vacuous;
            for item in elements(coll) {
                let result = truthiness(&evaluator.call_function(predicate, vec![item])?);
                outcome = if all {
                    outcome.and(result)
                } else {
                    outcome.or(result)
                };
                let decided = if all {
                    !outcome.can_be_true
                } else {
                    !outcome.can_be_false
                };
                if decided {
                    break;
                }
            }
            Ok(outcome)
        }
    }
}

fn every(args: &[Value], evaluator: &Evaluator) -> Result<Value, Error> {
    Ok(quantify(args, evaluator, "every?", true)?.to_value())
}

fn any(args: &[Value], evaluator: &Evaluator) -> Result<Value, Error> {
    Ok(quantify(args, evaluator, "any?", false)?.to_value())
}

fn not_any(args: &[Value], evaluator: &Evaluator) -> Result<Value, Error> {
    Ok(quantify(args, evaluator, "not-any?", false)?.not().to_value())
}

fn not_every(args: &[Value], evaluator: &Evaluator) -> Result<Value, Error> {
    Ok(quantify(args, evaluator, "not-every?", true)?.not().to_value())
}

fn keys(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    let entries: &Object = param(args, 0, "keys")?;
    Ok(Value::array(entries.keys().cloned().map(Value::String)))
}

fn vals(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    let entries: &Object = param(args, 0, "vals")?;
    Ok(Value::array(entries.values().cloned()))
}

fn entries(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    let entries: &Object = param(args, 0, "entries")?;
    Ok(Value::array(entries.iter().map(|(k, v)| {
        Value::array([Value::String(k.clone()), v.clone()])
    })))
}

fn dissoc(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    let entries: &Object = param(args, 0, "dissoc")?;
    let key: &str = param(args, 1, "dissoc")?;
    Ok(Value::Object(entries.without(key)))
}

/// Objects merged left to right; nil arguments are skipped
fn merge(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    let mut merged = Object::new();
    for (i, arg) in args.iter().enumerate() {
        if arg.is_nil() {
            continue;
        }
        let entries: &Object = param(args, i, "merge")?;
        for (k, v) in entries {
            merged.insert(k.clone(), v.clone());
        }
    }
    Ok(Value::Object(merged))
}

fn zipmap(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    let keys: &Array = param(args, 0, "zipmap")?;
    let values: &Array = param(args, 1, "zipmap")?;
    let mut result = Object::new();
    for (key, value) in keys.iter().zip(values.iter()) {
        let Value::String(key) = key else {
            return Err(Error::TypeError(format!(
                "zipmap expects string keys, got {key}"
            )));
        };
        result.insert(key.clone(), value.clone());
    }
    Ok(Value::Object(result))
}

pub(super) fn ops() -> Vec<BuiltinOp> {
    vec![
        BuiltinOp::native("get", Arity::Range(2, 3), get),
        BuiltinOp::native("get-in", Arity::Range(2, 3), get_in),
        BuiltinOp::native("assoc", Arity::Exact(3), assoc),
        BuiltinOp::native("assoc-in", Arity::Exact(3), assoc_in),
        BuiltinOp::native("update", Arity::AtLeast(3), update),
        BuiltinOp::native("concat", Arity::Any, concat),
        BuiltinOp::native("count", Arity::Exact(1), count),
        BuiltinOp::native("contains?", Arity::Exact(2), contains),
        BuiltinOp::native("has?", Arity::Exact(2), has),
        BuiltinOp::native("has-some?", Arity::Exact(2), has_some),
        BuiltinOp::native("has-every?", Arity::Exact(2), has_every),
        BuiltinOp::native("every?", Arity::Exact(2), every),
        BuiltinOp::native("any?", Arity::Exact(2), any),
        BuiltinOp::native("not-any?", Arity::Exact(2), not_any),
        BuiltinOp::native("not-every?", Arity::Exact(2), not_every),
        BuiltinOp::structural("keys", Arity::Exact(1), keys, Type::ARRAY),
        BuiltinOp::structural("vals", Arity::Exact(1), vals, Type::ARRAY),
        BuiltinOp::structural("entries", Arity::Exact(1), entries, Type::ARRAY),
        BuiltinOp::structural("dissoc", Arity::Exact(2), dissoc, Type::OBJECT),
        BuiltinOp::structural("merge", Arity::Any, merge, Type::OBJECT),
        BuiltinOp::declared("zipmap", Arity::Exact(2), zipmap, Type::OBJECT),
    ]
}
