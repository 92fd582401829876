//! Collection transfer functions.
//!
//! Lookups dispatch on the collection: arrays and strings take numeric indices, objects
//! take string keys, and `nil` behaves as an empty collection. Negative and fractional
//! indices are never found. Abstract collections are split into their emptiness and kind
//! bits; an element read from an abstract non-empty collection is `unknown` (strings
//! yield a single-character string).

use super::{Outcome, all_of, any_of, equal, join, narrow};
use crate::Error;
use crate::types::Type;
use crate::value::{Array, Object, Value, number_to_string};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emptiness {
    Empty,
    NonEmpty,
    Unknown,
}

fn collection_or_nil() -> Type {
    Type::COLLECTION.or(&Type::NIL)
}

/// Whether a collection (or nil) is empty
pub fn emptiness(value: &Value, what: &str) -> Result<Emptiness, Error> {
    let empty = |is_empty: bool| {
        if is_empty {
            Emptiness::Empty
        } else {
            Emptiness::NonEmpty
        }
    };
    match value {
        Value::Nil => Ok(Emptiness::Empty),
        Value::String(s) => Ok(empty(s.is_empty())),
        Value::Array(items) => Ok(empty(items.is_empty())),
        Value::Object(entries) => Ok(empty(entries.is_empty())),
        Value::Type(t) => {
            let t = narrow(t, &collection_or_nil(), what)?;
            if t.is(&Type::EMPTY_COLLECTION.or(&Type::NIL)) {
                Ok(Emptiness::Empty)
            } else if t.is(&Type::NON_EMPTY_COLLECTION) {
                Ok(Emptiness::NonEmpty)
            } else {
                Ok(Emptiness::Unknown)
            }
        }
        other => Err(not_a_collection(what, other)),
    }
}

fn not_a_collection(what: &str, value: &Value) -> Error {
    Error::TypeError(format!("{what} expects a collection, got {value}"))
}

/// Position for a numeric index: integral and not negative (`-0` is index 0)
pub(crate) fn as_index(n: f64) -> Option<usize> {
    (n.is_finite() && n.fract() == 0.0 && n >= 0.0).then_some(n as usize)
}

fn char_at(s: &str, i: usize) -> Option<Value> {
    s.chars().nth(i).map(|c| Value::String(c.to_string()))
}

/// Elements of a concrete collection; string characters become one-character strings
pub(crate) fn elements(coll: &Value) -> Vec<Value> {
    match coll {
        Value::String(s) => s.chars().map(|c| Value::String(c.to_string())).collect(),
        Value::Array(items) => items.iter().cloned().collect(),
        Value::Object(entries) => entries.values().cloned().collect(),
        _ => Vec::new(),
    }
}

pub fn count(coll: &Value) -> Result<Value, Error> {
    match coll {
        Value::Nil => Ok(Value::Number(0.0)),
        Value::String(s) => Ok(Value::from(s.chars().count())),
        Value::Array(items) => Ok(Value::from(items.len())),
        Value::Object(entries) => Ok(Value::from(entries.len())),
        Value::Type(_) => Ok(match emptiness(coll, "count")? {
            Emptiness::Empty => Value::Number(0.0),
            Emptiness::NonEmpty => Value::Type(Type::POSITIVE_INTEGER),
            Emptiness::Unknown => Value::Type(Type::POSITIVE_ZERO.or(&Type::POSITIVE_INTEGER)),
        }),
        other => Err(not_a_collection("count", other)),
    }
}

/// Every possible result of reading `key` from `coll`; `None` stands for "not found"
pub fn lookup(coll: &Value, key: &Value) -> Result<Vec<Option<Value>>, Error> {
    match (coll, key) {
        (Value::Nil, _) => Ok(vec![None]),
        (Value::Type(t), _) => abstract_lookup(t),
        (Value::Array(items), Value::Number(n)) => {
            Ok(vec![as_index(*n).and_then(|i| items.get(i).cloned())])
        }
        (Value::String(s), Value::Number(n)) => Ok(vec![as_index(*n).and_then(|i| char_at(s, i))]),
        (Value::Object(entries), Value::String(k)) => Ok(vec![entries.get(k).cloned()]),
        (Value::Array(_) | Value::String(_), Value::Type(t)) => {
            let index = narrow(t, &Type::NUMBER, "index")?;
            Ok(candidates(elements(coll), &index))
        }
        (Value::Object(entries), Value::Type(t)) => {
            narrow(t, &Type::STRING, "key")?;
            let mut found: Vec<Option<Value>> = entries.values().cloned().map(Some).collect();
            found.push(None);
            Ok(found)
        }
        (Value::Array(_) | Value::String(_), other) => Err(Error::TypeError(format!(
            "index must be a number, got {other}"
        ))),
        (Value::Object(_), other) => Err(Error::TypeError(format!(
            "object key must be a string, got {other}"
        ))),
        (other, _) => Err(not_a_collection("get", other)),
    }
}

/// Elements an abstract index may select, plus "not found" unless the index must be 0
/// and the collection is not empty
fn candidates(elements: Vec<Value>, index: &Type) -> Vec<Option<Value>> {
    if !index.intersects(&Type::ZERO.or(&Type::POSITIVE_INTEGER)) {
        return vec![None];
    }
    let always_found = index.is(&Type::ZERO) && !elements.is_empty();
    let mut found: Vec<Option<Value>> = if index.is(&Type::ZERO) {
        elements.into_iter().take(1).map(Some).collect()
    } else {
        elements.into_iter().map(Some).collect()
    };
    if !always_found {
        found.push(None);
    }
    found
}

fn abstract_lookup(t: &Type) -> Result<Vec<Option<Value>>, Error> {
    let t = narrow(t, &collection_or_nil(), "get")?;
    let mut found = Vec::new();
    if t.intersects(&Type::EMPTY_COLLECTION.or(&Type::NIL)) {
        found.push(None);
    }
    if t.intersects(&Type::NON_EMPTY_STRING) {
        found.push(Some(Value::Type(Type::NON_EMPTY_STRING)));
        found.push(None);
    }
    if t.intersects(&Type::NON_EMPTY_ARRAY.or(&Type::NON_EMPTY_OBJECT)) {
        found.push(Some(Value::Type(Type::UNKNOWN)));
        found.push(None);
    }
    Ok(found)
}

fn unique(found: Vec<Option<Value>>) -> Vec<Option<Value>> {
    let mut distinct: Vec<Option<Value>> = Vec::with_capacity(found.len());
    for candidate in found {
        let seen = distinct.iter().any(|d| match (d, &candidate) {
            (Some(a), Some(b)) => a.is_identical(b),
            (None, None) => true,
            _ => false,
        });
        if !seen {
            distinct.push(candidate);
        }
    }
    distinct
}

fn or_default(found: Vec<Option<Value>>, default: Option<&Value>) -> Value {
    let fallback = default.cloned().unwrap_or(Value::Nil);
    let results: Vec<Value> = found
        .into_iter()
        .map(|value| value.unwrap_or_else(|| fallback.clone()))
        .collect();
    join(&results)
}

/// `(get coll key default?)`
pub fn get(coll: &Value, key: &Value, default: Option<&Value>) -> Result<Value, Error> {
    Ok(or_default(lookup(coll, key)?, default))
}

/// `(get-in coll path default?)`. A step into a non-collection or with a key of the
/// wrong kind is "not found".
pub fn get_in(coll: &Value, path: &[Value], default: Option<&Value>) -> Result<Value, Error> {
    let mut current = vec![Some(coll.clone())];
    for key in path {
        let mut next = Vec::new();
        for candidate in current {
            match candidate {
                Some(value) => next.extend(lookup(&value, key).unwrap_or_else(|_| vec![None])),
                None => next.push(None),
            }
        }
        current = unique(next);
    }
    Ok(or_default(current, default))
}

fn assoc_index(n: f64, len: usize, what: &str) -> Result<usize, Error> {
    match as_index(n) {
        Some(i) if i <= len => Ok(i),
        _ => Err(Error::EvalError(format!(
            "Index {} is out of bounds for {what} of length {len}",
            number_to_string(n)
        ))),
    }
}

/// `(assoc coll key value)`. Arrays and strings accept `0 <= key <= length`, where
/// `length` appends.
pub fn assoc(coll: &Value, key: &Value, value: Value) -> Result<Value, Error> {
    match (coll, key) {
        (Value::Type(_), _) | (_, Value::Type(_)) => abstract_assoc(coll, &value),
        (Value::String(_), _) if matches!(value, Value::Type(_)) => abstract_assoc(coll, &value),
        (Value::Array(items), Value::Number(n)) => {
            let i = assoc_index(*n, items.len(), "array")?;
            let mut items: Array = items.clone();
            if i == items.len() {
                items.push_back(value);
            } else {
                items.set(i, value);
            }
            Ok(Value::Array(items))
        }
        (Value::String(s), Value::Number(n)) => {
            let ch = match &value {
                Value::String(v) if v.chars().count() == 1 => v.clone(),
                other => {
                    return Err(Error::TypeError(format!(
                        "assoc on a string expects a single character, got {other}"
                    )));
                }
            };
            let mut chars: Vec<String> = s.chars().map(String::from).collect();
            let i = assoc_index(*n, chars.len(), "string")?;
            if i == chars.len() {
                chars.push(ch);
            } else {
                chars[i] = ch;
            }
            Ok(Value::String(chars.concat()))
        }
        (Value::Object(entries), Value::String(k)) => {
            Ok(Value::Object(entries.update(k.clone(), value)))
        }
        (Value::Array(_) | Value::String(_), other) => Err(Error::TypeError(format!(
            "index must be a number, got {other}"
        ))),
        (Value::Object(_), other) => Err(Error::TypeError(format!(
            "object key must be a string, got {other}"
        ))),
        (other, _) => Err(not_a_collection("assoc", other)),
    }
}

/// Assigning into any collection leaves it non-empty and of the same kind
fn abstract_assoc(coll: &Value, value: &Value) -> Result<Value, Error> {
    let t = narrow(&Type::of(coll), &Type::COLLECTION, "assoc")?;
    let mut kinds = Vec::new();
    if t.intersects(&Type::STRING) && Type::of(value).intersects(&Type::NON_EMPTY_STRING) {
        kinds.push(Type::NON_EMPTY_STRING);
    }
    if t.intersects(&Type::ARRAY) {
        kinds.push(Type::NON_EMPTY_ARRAY);
    }
    if t.intersects(&Type::OBJECT) {
        kinds.push(Type::NON_EMPTY_OBJECT);
    }
    if kinds.is_empty() {
        return Err(Error::TypeError(format!(
            "assoc on a string expects a single character, got {value}"
        )));
    }
    Ok(Value::Type(Type::or_all(&kinds)))
}

/// `(assoc-in coll path value)`. Missing intermediate collections are created: an
/// array when the next key is a number, an object otherwise.
pub fn assoc_in(coll: &Value, path: &[Value], value: Value) -> Result<Value, Error> {
    match path {
        [] => Err(Error::EvalError("assoc-in expects a non-empty key path".to_owned())),
        [key] => assoc(coll, key, value),
        [key, rest @ ..] => {
            let numeric_next = match &rest[0] {
                Value::Number(_) => true,
                Value::Type(t) => t.is(&Type::NUMBER),
                _ => false,
            };
            let fresh = if numeric_next {
                Value::Array(Array::new())
            } else {
                Value::Object(Object::new())
            };
            let children: Vec<Value> = lookup(coll, key)?
                .into_iter()
                .map(|found| match found {
                    Some(Value::Nil) | None => fresh.clone(),
                    Some(child) => child,
                })
                .collect();
            let updated = assoc_in(&join(&children), rest, value)?;
            assoc(coll, key, updated)
        }
    }
}

/// `(concat ...)`: all strings, all arrays, or all objects (merged left to right)
pub fn concat(args: &[Value]) -> Result<Value, Error> {
    let Some(first) = args.first() else {
        return Ok(Value::Array(Array::new()));
    };
    if args.iter().any(|arg| matches!(arg, Value::Type(_))) {
        return abstract_concat(args);
    }
    let mismatch = |other: &Value| {
        Error::TypeError(format!(
            "concat expects arguments of one collection kind, got {} and {}",
            first.type_name(),
            other.type_name()
        ))
    };
    match first {
        Value::String(_) => {
            let mut result = String::new();
            for arg in args {
                match arg {
                    Value::String(s) => result.push_str(s),
                    other => return Err(mismatch(other)),
                }
            }
            Ok(Value::String(result))
        }
        Value::Array(_) => {
            let mut result = Array::new();
            for arg in args {
                match arg {
                    Value::Array(items) => result.append(items.clone()),
                    other => return Err(mismatch(other)),
                }
            }
            Ok(Value::Array(result))
        }
        Value::Object(_) => {
            let mut result = Object::new();
            for arg in args {
                match arg {
                    Value::Object(entries) => {
                        for (k, v) in entries {
                            result.insert(k.clone(), v.clone());
                        }
                    }
                    other => return Err(mismatch(other)),
                }
            }
            Ok(Value::Object(result))
        }
        other => Err(not_a_collection("concat", other)),
    }
}

fn abstract_concat(args: &[Value]) -> Result<Value, Error> {
    let kinds = [
        (Type::EMPTY_STRING, Type::NON_EMPTY_STRING),
        (Type::EMPTY_ARRAY, Type::NON_EMPTY_ARRAY),
        (Type::EMPTY_OBJECT, Type::NON_EMPTY_OBJECT),
    ];
    let mut results = Vec::new();
    for (empty, non_empty) in kinds {
        let whole = empty.or(&non_empty);
        let arg_types: Vec<Type> = args.iter().map(|arg| Type::of(arg).and(&whole)).collect();
        if arg_types.iter().any(Type::is_never) {
            continue;
        }
        if arg_types.iter().any(|t| t.is(&non_empty)) {
            results.push(non_empty);
        } else if arg_types.iter().all(|t| t.is(&empty)) {
            results.push(empty);
        } else {
            results.push(whole);
        }
    }
    if results.is_empty() {
        return Err(Error::TypeError(
            "concat expects arguments of one collection kind".to_owned(),
        ));
    }
    Ok(Value::Type(Type::or_all(&results)))
}

fn unless_empty(coll: &Value, what: &str) -> Result<Outcome, Error> {
    Ok(match emptiness(coll, what)? {
        Emptiness::Empty => Outcome::FALSE,
        _ => Outcome::EITHER,
    })
}

/// `(contains? coll key)`: whether the index or key is present
pub fn contains(coll: &Value, key: &Value) -> Result<Outcome, Error> {
    match (coll, key) {
        (Value::Nil, _) => Ok(Outcome::FALSE),
        (Value::Type(_), _) => unless_empty(coll, "contains?"),
        (Value::Array(items), Value::Number(n)) => {
            Ok(Outcome::from_bool(as_index(*n).is_some_and(|i| i < items.len())))
        }
        (Value::String(s), Value::Number(n)) => Ok(Outcome::from_bool(
            as_index(*n).is_some_and(|i| i < s.chars().count()),
        )),
        (Value::Object(entries), Value::String(k)) => Ok(Outcome::from_bool(entries.contains_key(k))),
        (Value::Array(_) | Value::String(_) | Value::Object(_), Value::Type(_)) => {
            unless_empty(coll, "contains?")
        }
        (Value::Array(_) | Value::String(_) | Value::Object(_), _) => Ok(Outcome::FALSE),
        (other, _) => Err(not_a_collection("contains?", other)),
    }
}

/// `(has? coll value)`: element of an array, value of an object, substring of a string
pub fn has(coll: &Value, value: &Value) -> Result<Outcome, Error> {
    match coll {
        Value::Nil => Ok(Outcome::FALSE),
        Value::Type(_) => unless_empty(coll, "has?"),
        Value::Array(items) => Ok(any_of(items.iter().map(|item| equal(item, value)))),
        Value::Object(entries) => Ok(any_of(entries.values().map(|item| equal(item, value)))),
        Value::String(s) => Ok(match value {
            Value::String(sub) => Outcome::from_bool(s.contains(sub.as_str())),
            Value::Type(t) if t.intersects(&Type::STRING) => Outcome::EITHER,
            _ => Outcome::FALSE,
        }),
        other => Err(not_a_collection("has?", other)),
    }
}

fn candidate_values<'a>(values: &'a Value, what: &str) -> Result<Option<&'a Array>, Error> {
    match values {
        Value::Array(items) => Ok(Some(items)),
        Value::Type(t) => narrow(t, &Type::ARRAY, what).map(|_| None),
        other => Err(Error::TypeError(format!(
            "{what} expects an array of candidates, got {other}"
        ))),
    }
}

/// `(has-some? coll values)`
pub fn has_some(coll: &Value, values: &Value) -> Result<Outcome, Error> {
    match candidate_values(values, "has-some?")? {
        Some(items) => items
            .iter()
            .map(|v| has(coll, v))
            .collect::<Result<Vec<_>, _>>()
            .map(any_of),
        None => Ok(Outcome::EITHER),
    }
}

/// `(has-every? coll values)`
pub fn has_every(coll: &Value, values: &Value) -> Result<Outcome, Error> {
    match candidate_values(values, "has-every?")? {
        Some(items) => items
            .iter()
            .map(|v| has(coll, v))
            .collect::<Result<Vec<_>, _>>()
            .map(all_of),
        None => Ok(Outcome::EITHER),
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;

    fn arr(items: Vec<Value>) -> Value {
        Value::array(items)
    }

    #[test]
    fn test_get_concrete() {
        let v = Value::from([1, 2, 3]);
        let x = Value::from("x");
        let test_cases = vec![
            (get(&v, &Value::from(0), None), Value::from(1)),
            (get(&v, &Value::from(-1), None), Value::Nil),
            (get(&v, &Value::from(-1), Some(&x)), x.clone()),
            (get(&v, &Value::Number(0.5), Some(&x)), x.clone()),
            (get(&v, &Value::from(3), None), Value::Nil),
            (get(&v, &Value::Number(-0.0), None), Value::from(1)),
            (get(&Value::from("abc"), &Value::from(1), None), Value::from("b")),
            (
                get(&Value::object([("a", Value::from(1))]), &Value::from("a"), None),
                Value::from(1),
            ),
            (get(&Value::Nil, &Value::from("a"), Some(&x)), x.clone()),
        ];
        for (i, (actual, expected)) in test_cases.into_iter().enumerate() {
            assert_eq!(actual.unwrap(), expected, "Test case {} failed", i + 1);
        }
        assert!(get(&v, &Value::from("a"), None).is_err());
        assert!(get(&Value::from(1), &Value::from(0), None).is_err());
    }

    #[test]
    fn test_get_abstract() {
        // An abstract index selects any element or misses
        let v = Value::from([1, 2]);
        assert_eq!(
            get(&v, &Value::Type(Type::INTEGER), None).unwrap(),
            Value::Type(Type::POSITIVE_INTEGER.or(&Type::NIL))
        );
        // Index zero of a non-empty array is always found
        assert_eq!(get(&v, &Value::Type(Type::ZERO), None).unwrap(), Value::from(1));
        assert_eq!(
            get(&Value::Type(Type::EMPTY_ARRAY), &Value::from(0), Some(&Value::from(7))).unwrap(),
            Value::from(7)
        );
        assert_eq!(
            get(&Value::Type(Type::ARRAY), &Value::from(0), None).unwrap(),
            Value::Type(Type::UNKNOWN)
        );
    }

    #[test]
    fn test_get_in() {
        let data = Value::object([("a", arr(vec![Value::object([("b", Value::from(5))])]))]);
        let path = |keys: Vec<Value>| keys;
        assert_eq!(
            get_in(&data, &path(vec!["a".into(), 0.into(), "b".into()]), None).unwrap(),
            Value::from(5)
        );
        assert_eq!(
            get_in(&data, &path(vec!["a".into(), 1.into()]), Some(&Value::from("d"))).unwrap(),
            Value::from("d")
        );
        assert_eq!(
            get_in(&data, &path(vec!["a".into(), 0.into(), "b".into(), "c".into()]), None).unwrap(),
            Value::Nil
        );
    }

    #[test]
    fn test_assoc() {
        let v = Value::from([1, 2, 3]);
        assert_eq!(
            assoc(&v, &Value::from(3), Value::from("4")).unwrap(),
            arr(vec![1.into(), 2.into(), 3.into(), "4".into()])
        );
        assert_eq!(
            assoc(&v, &Value::from(0), Value::from(9)).unwrap(),
            Value::from([9, 2, 3])
        );
        assert!(assoc(&v, &Value::from(4), Value::from("4")).is_err());
        assert!(assoc(&v, &Value::from(-1), Value::from("4")).is_err());
        // The input is never changed
        assert_eq!(v, Value::from([1, 2, 3]));

        assert_eq!(
            assoc(&Value::from("abc"), &Value::from(1), Value::from("X")).unwrap(),
            Value::from("aXc")
        );
        assert!(assoc(&Value::from("abc"), &Value::from(1), Value::from("XY")).is_err());
        assert_eq!(
            assoc(&Value::object(Vec::<(String, Value)>::new()), &Value::from("a"), Value::from(0))
                .unwrap(),
            Value::object([("a", Value::from(0))])
        );
        assert_eq!(
            assoc(&Value::Type(Type::SEQUENCE), &Value::from(0), Value::from(1)).unwrap(),
            Value::Type(Type::NON_EMPTY_ARRAY)
        );
    }

    #[test]
    fn test_assoc_in_creates_missing_levels() {
        let empty = Value::object(Vec::<(String, Value)>::new());
        let result = assoc_in(&empty, &[Value::from("a"), Value::from(0)], Value::from(1)).unwrap();
        assert_eq!(result, Value::object([("a", Value::from([1]))]));
        let result = assoc_in(&empty, &[Value::from("a"), Value::from("b")], Value::from(1)).unwrap();
        assert_eq!(
            result,
            Value::object([("a", Value::object([("b", Value::from(1))]))])
        );
    }

    #[test]
    fn test_concat_and_count() {
        assert_eq!(concat(&[]).unwrap(), arr(vec![]));
        assert_eq!(
            concat(&[Value::from("ab"), Value::from("c")]).unwrap(),
            Value::from("abc")
        );
        assert_eq!(
            concat(&[Value::from([1]), Value::from([2, 3])]).unwrap(),
            Value::from([1, 2, 3])
        );
        assert!(concat(&[Value::from([1]), Value::from("a")]).is_err());
        assert_eq!(
            concat(&[Value::Type(Type::ARRAY), Value::from([1])]).unwrap(),
            Value::Type(Type::NON_EMPTY_ARRAY)
        );
        assert_eq!(
            concat(&[Value::Type(Type::STRING.or(&Type::ARRAY)), Value::from("")]).unwrap(),
            Value::Type(Type::STRING)
        );

        assert_eq!(count(&Value::from("héllo")).unwrap(), Value::from(5));
        assert_eq!(count(&Value::Nil).unwrap(), Value::from(0));
        assert_eq!(
            count(&Value::Type(Type::NON_EMPTY_ARRAY)).unwrap(),
            Value::Type(Type::POSITIVE_INTEGER)
        );
        assert!(count(&Value::from(1)).is_err());
    }

    #[test]
    fn test_membership() {
        let v = Value::from([1, 2, 3]);
        assert_eq!(contains(&v, &Value::from(2)).unwrap(), Outcome::TRUE);
        assert_eq!(contains(&v, &Value::from(3)).unwrap(), Outcome::FALSE);
        assert_eq!(has(&v, &Value::from(3)).unwrap(), Outcome::TRUE);
        assert_eq!(has(&v, &Value::Type(Type::STRING)).unwrap(), Outcome::FALSE);
        assert_eq!(has(&v, &Value::Type(Type::INTEGER)).unwrap(), Outcome::EITHER);
        assert_eq!(has(&Value::from("hello"), &Value::from("ell")).unwrap(), Outcome::TRUE);
        assert_eq!(
            has_some(&v, &Value::from([7, 3])).unwrap(),
            Outcome::TRUE
        );
        assert_eq!(
            has_every(&v, &Value::from([1, 7])).unwrap(),
            Outcome::FALSE
        );
        assert_eq!(
            contains(&Value::Type(Type::EMPTY_OBJECT), &Value::from("a")).unwrap(),
            Outcome::FALSE
        );
    }
}
