//! Sequence built-ins over arrays and strings.
//!
//! Element access runs through the collection transfer functions. The rebuilding
//! operations (`rest`, `take`, `map`, `sort` and friends) are registered as structural
//! or declared: an abstract sequence answers with the declared result type, while
//! abstract elements inside a concrete array travel through unchanged.

use super::BuiltinOp;
use super::params::{Seq, optional_param, param};
use crate::evaluator::Evaluator;
use crate::transfer::collection::{self, as_index};
use crate::transfer::{equal, join, narrow};
use crate::types::Type;
use crate::value::{Array, Value};
use crate::{Arity, Error};
use std::cmp::Ordering;

/// The sequence argument at `index`, accepting abstract sequences
fn sequence_arg<'a>(args: &'a [Value], index: usize, name: &str) -> Result<&'a Value, Error> {
    let value: &Value = param(args, index, name)?;
    if let Value::Type(t) = value {
        narrow(t, &Type::SEQUENCE.or(&Type::NIL), name)?;
    } else {
        param::<Seq>(args, index, name)?;
    }
    Ok(value)
}

fn first(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    collection::get(sequence_arg(args, 0, "first")?, &Value::Number(0.0), None)
}

fn second(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    collection::get(sequence_arg(args, 0, "second")?, &Value::Number(1.0), None)
}

fn last(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    let seq = sequence_arg(args, 0, "last")?;
    if let Value::Type(_) = seq {
        return collection::get(seq, &Value::Number(0.0), None);
    }
    match param::<Seq>(args, 0, "last")?.len() {
        0 => Ok(Value::Nil),
        len => collection::get(seq, &Value::from(len - 1), None),
    }
}

fn nth(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    let seq = sequence_arg(args, 0, "nth")?;
    let index: &Value = param(args, 1, "nth")?;
    collection::get(seq, index, optional_param(args, 2, "nth")?)
}

fn rest(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    let seq: Seq = param(args, 0, "rest")?;
    Ok(seq.rebuild(seq.items().into_iter().skip(1).collect()))
}

/// Like `rest`, but nil instead of an empty sequence
fn next(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    let seq: Seq = param(args, 0, "next")?;
    if seq.len() <= 1 {
        return Ok(Value::Nil);
    }
    Ok(seq.rebuild(seq.items().into_iter().skip(1).collect()))
}

fn push(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    let items: &Array = param(args, 0, "push")?;
    let mut items = items.clone();
    items.extend(args[1..].iter().cloned());
    Ok(Value::Array(items))
}

fn cons(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    let head: &Value = param(args, 0, "cons")?;
    let items: &Array = param(args, 1, "cons")?;
    let mut items = items.clone();
    items.push_front(head.clone());
    Ok(Value::Array(items))
}

/// Reversal keeps both kind and emptiness, so abstract sequences keep their type
fn reverse(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    if let Value::Type(t) = sequence_arg(args, 0, "reverse")? {
        let t = t.and(&Type::SEQUENCE.or(&Type::NIL));
        let reversed = if t.intersects(&Type::NIL) {
            t.exclude(&Type::NIL).or(&Type::EMPTY_ARRAY)
        } else {
            t
        };
        return Ok(Value::Type(reversed));
    }
    let seq: Seq = param(args, 0, "reverse")?;
    let mut items = seq.items();
    items.reverse();
    Ok(seq.rebuild(items))
}

/// Why a sort could not produce a concrete order
enum SortFailure {
    Undecided,
    Error(Error),
}

impl From<Error> for SortFailure {
    fn from(err: Error) -> Self {
        SortFailure::Error(err)
    }
}

type Comparator<'a> = dyn FnMut(&Value, &Value) -> Result<Ordering, SortFailure> + 'a;

/// Stable merge sort with a fallible comparator
fn merge_sort(mut items: Vec<Value>, compare: &mut Comparator<'_>) -> Result<Vec<Value>, SortFailure> {
    if items.len() <= 1 {
        return Ok(items);
    }
    let right = items.split_off(items.len() / 2);
    let left = merge_sort(items, compare)?;
    let right = merge_sort(right, compare)?;

    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    while let (Some(l), Some(r)) = (left.peek(), right.peek()) {
        let next = if compare(r, l)? == Ordering::Less {
            right.next()
        } else {
            left.next()
        };
        merged.extend(next);
    }
    merged.extend(left);
    merged.extend(right);
    Ok(merged)
}

/// Natural order: numbers numerically, strings lexicographically
fn natural_order(a: &Value, b: &Value) -> Result<Ordering, SortFailure> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => Ok(x.partial_cmp(y).unwrap_or(Ordering::Equal)),
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        (Value::Type(_), _) | (_, Value::Type(_)) => Err(SortFailure::Undecided),
        _ => Err(SortFailure::Error(Error::TypeError(format!(
            "cannot compare {a} with {b}"
        )))),
    }
}

/// Order from a user comparator returning a negative, zero or positive number
fn comparator_order(
    evaluator: &Evaluator,
    comparator: &Value,
    a: &Value,
    b: &Value,
) -> Result<Ordering, SortFailure> {
    match evaluator.call_function(comparator, vec![a.clone(), b.clone()])? {
        Value::Number(n) if n < 0.0 => Ok(Ordering::Less),
        Value::Number(n) if n > 0.0 => Ok(Ordering::Greater),
        Value::Number(_) => Ok(Ordering::Equal),
        Value::Type(_) => Err(SortFailure::Undecided),
        other => Err(SortFailure::Error(Error::TypeError(format!(
            "comparator must return a number, got {other}"
        )))),
    }
}

/// Finish a sort: an undecided order still yields an array of the same emptiness
fn sorted(result: Result<Vec<Value>, SortFailure>, len: usize) -> Result<Value, Error> {
    match result {
        Ok(items) => Ok(Value::array(items)),
        Err(SortFailure::Undecided) if len == 0 => Ok(Value::Type(Type::EMPTY_ARRAY)),
        Err(SortFailure::Undecided) => Ok(Value::Type(Type::NON_EMPTY_ARRAY)),
        Err(SortFailure::Error(err)) => Err(err),
    }
}

/// `(sort coll)` or `(sort comparator coll)`
fn sort(args: &[Value], evaluator: &Evaluator) -> Result<Value, Error> {
    let (comparator, items): (Option<&Value>, Seq) = match args {
        [_] => (None, param(args, 0, "sort")?),
        _ => (Some(param(args, 0, "sort")?), param(args, 1, "sort")?),
    };
    let items = items.items();
    let len = items.len();
    let result = match comparator {
        None => merge_sort(items, &mut natural_order),
        Some(comparator) => merge_sort(items, &mut |a: &Value, b: &Value| {
            comparator_order(evaluator, comparator, a, b)
        }),
    };
    sorted(result, len)
}

/// `(sort-by keyfn coll)` or `(sort-by keyfn comparator coll)`
fn sort_by(args: &[Value], evaluator: &Evaluator) -> Result<Value, Error> {
    let key_fn: &Value = param(args, 0, "sort-by")?;
    let (comparator, items): (Option<&Value>, Seq) = match args {
        [_, _] => (None, param(args, 1, "sort-by")?),
        _ => (Some(param(args, 1, "sort-by")?), param(args, 2, "sort-by")?),
    };
    let items = items.items();
    let len = items.len();
    let mut keyed = Vec::with_capacity(len);
    for item in items {
        let key = evaluator.call_function(key_fn, vec![item.clone()])?;
        keyed.push(Value::array([key, item]));
    }
    let key_of = |pair: &Value| match pair {
        Value::Array(pair) => pair.front().cloned().unwrap_or(Value::Nil),
        other => other.clone(),
    };
    let result = match comparator {
        None => merge_sort(keyed, &mut |a: &Value, b: &Value| {
            natural_order(&key_of(a), &key_of(b))
        }),
        Some(comparator) => merge_sort(keyed, &mut |a: &Value, b: &Value| {
            comparator_order(evaluator, comparator, &key_of(a), &key_of(b))
        }),
    };
    let result = result.map(|pairs| {
        pairs
            .into_iter()
            .map(|pair| match pair {
                Value::Array(pair) => pair.back().cloned().unwrap_or(Value::Nil),
                other => other,
            })
            .collect()
    });
    sorted(result, len)
}

/// `(map f coll & colls)`: stops at the shortest collection
fn map(args: &[Value], evaluator: &Evaluator) -> Result<Value, Error> {
    let function: &Value = param(args, 0, "map")?;
    let columns = (1..args.len())
        .map(|i| param::<Seq>(args, i, "map").map(Seq::items))
        .collect::<Result<Vec<_>, _>>()?;
    let len = columns.iter().map(Vec::len).min().unwrap_or(0);
    let mut results = Vec::with_capacity(len);
    for i in 0..len {
        let call_args = columns.iter().map(|column| column[i].clone()).collect();
        results.push(evaluator.call_function(function, call_args)?);
    }
    Ok(Value::array(results))
}

/// Elements whose predicate result is `keep`; `None` when some result is undecided
fn select(
    args: &[Value],
    evaluator: &Evaluator,
    name: &str,
    keep: bool,
) -> Result<Option<Vec<Value>>, Error> {
    let predicate: &Value = param(args, 0, name)?;
    let seq: Seq = param(args, 1, name)?;
    let mut selected = Vec::new();
    for item in seq.items() {
        match evaluator.call_function(predicate, vec![item.clone()])?.truthiness() {
            Some(truthy) if truthy == keep => selected.push(item),
            Some(_) => {}
            None => return Ok(None),
        }
    }
    Ok(Some(selected))
}

fn filter(args: &[Value], evaluator: &Evaluator) -> Result<Value, Error> {
    Ok(select(args, evaluator, "filter", true)?
        .map_or(Value::Type(Type::ARRAY), Value::array))
}

fn remove(args: &[Value], evaluator: &Evaluator) -> Result<Value, Error> {
    Ok(select(args, evaluator, "remove", false)?
        .map_or(Value::Type(Type::ARRAY), Value::array))
}

/// `(reduce f coll)` or `(reduce f init coll)`; an empty collection without an initial
/// value calls `f` with no arguments
fn reduce(args: &[Value], evaluator: &Evaluator) -> Result<Value, Error> {
    let function: &Value = param(args, 0, "reduce")?;
    let (init, seq): (Option<&Value>, Seq) = match args {
        [_, _] => (None, param(args, 1, "reduce")?),
        _ => (Some(param(args, 1, "reduce")?), param(args, 2, "reduce")?),
    };
    let mut items = seq.items().into_iter();
    let mut acc = match init {
        Some(init) => init.clone(),
        None => match items.next() {
            Some(first) => first,
            None => return evaluator.call_function(function, Vec::new()),
        },
    };
    for item in items {
        acc = evaluator.call_function(function, vec![acc, item])?;
    }
    Ok(acc)
}

/// `(range end)`, `(range start end)` or `(range start end step)`
fn range(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    let numbers = (0..args.len())
        .map(|i| param::<f64>(args, i, "range"))
        .collect::<Result<Vec<_>, _>>()?;
    let (start, end, step) = match numbers.as_slice() {
        [end] => (0.0, *end, 1.0),
        [start, end] => (*start, *end, 1.0),
        [start, end, step] => (*start, *end, *step),
        _ => return Err(Error::arity_error(Arity::Range(1, 3), numbers.len())),
    };
    if step == 0.0 || !step.is_finite() || !start.is_finite() || !end.is_finite() {
        return Err(Error::EvalError(format!(
            "range expects finite bounds and a non-zero step, got step {step}"
        )));
    }
    let mut items = Array::new();
    let mut i = 0.0;
    loop {
        let x = start + i * step;
        if (step > 0.0 && x >= end) || (step < 0.0 && x <= end) {
            break;
        }
        items.push_back(Value::Number(x));
        i += 1.0;
    }
    Ok(Value::Array(items))
}

fn repeat(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    let count: usize = param(args, 0, "repeat")?;
    let value: &Value = param(args, 1, "repeat")?;
    Ok(Value::array(std::iter::repeat_n(value.clone(), count)))
}

fn take(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    let count: usize = param(args, 0, "take")?;
    let seq: Seq = param(args, 1, "take")?;
    Ok(seq.rebuild(seq.items().into_iter().take(count).collect()))
}

fn drop(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    let count: usize = param(args, 0, "drop")?;
    let seq: Seq = param(args, 1, "drop")?;
    Ok(seq.rebuild(seq.items().into_iter().skip(count).collect()))
}

/// Length of the prefix whose predicate results are truthy; `None` if undecided
fn prefix_len(args: &[Value], evaluator: &Evaluator, name: &str) -> Result<Option<usize>, Error> {
    let predicate: &Value = param(args, 0, name)?;
    let seq: Seq = param(args, 1, name)?;
    for (i, item) in seq.items().into_iter().enumerate() {
        match evaluator.call_function(predicate, vec![item])?.truthiness() {
            Some(true) => {}
            Some(false) => return Ok(Some(i)),
            None => return Ok(None),
        }
    }
    Ok(Some(seq.len()))
}

fn take_while(args: &[Value], evaluator: &Evaluator) -> Result<Value, Error> {
    let seq: Seq = param(args, 1, "take-while")?;
    Ok(match prefix_len(args, evaluator, "take-while")? {
        Some(n) => seq.rebuild(seq.items().into_iter().take(n).collect()),
        None => Value::Type(Type::SEQUENCE),
    })
}

fn drop_while(args: &[Value], evaluator: &Evaluator) -> Result<Value, Error> {
    let seq: Seq = param(args, 1, "drop-while")?;
    Ok(match prefix_len(args, evaluator, "drop-while")? {
        Some(n) => seq.rebuild(seq.items().into_iter().skip(n).collect()),
        None => Value::Type(Type::SEQUENCE),
    })
}

/// Position of an element in an array or of a substring in a string, or nil
fn index_of(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    let needle: &Value = param(args, 1, "index-of")?;
    let position = match param::<Seq>(args, 0, "index-of")? {
        Seq::Nil => None,
        Seq::Array(items) => items.iter().position(|item| item == needle),
        Seq::String(s) => {
            let sub: &str = param(args, 1, "index-of")?;
            s.find(sub).map(|byte| s[..byte].chars().count())
        }
    };
    Ok(position.map_or(Value::Nil, Value::from))
}

/// First element whose predicate result is truthy, or nil
fn some(args: &[Value], evaluator: &Evaluator) -> Result<Value, Error> {
    let predicate: &Value = param(args, 0, "some")?;
    let seq: Seq = param(args, 1, "some")?;
    let mut candidates = Vec::new();
    for item in seq.items() {
        match evaluator.call_function(predicate, vec![item.clone()])?.truthiness() {
            Some(true) => {
                candidates.push(item);
                return Ok(join(&candidates));
            }
            Some(false) => {}
            None => candidates.push(item),
        }
    }
    candidates.push(Value::Nil);
    Ok(join(&candidates))
}

/// Slice bound with negative positions counted from the end, clamped to the length
fn slice_bound(bound: f64, len: usize) -> usize {
    let bound = bound.trunc();
    if bound < 0.0 {
        len.saturating_sub(as_index(-bound).unwrap_or(usize::MAX))
    } else {
        as_index(bound).map_or(len, |i| i.min(len))
    }
}

/// `(slice seq start? end?)`
fn slice(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    let seq: Seq = param(args, 0, "slice")?;
    let len = seq.len();
    let start = optional_param::<f64>(args, 1, "slice")?.map_or(0, |s| slice_bound(s, len));
    let end = optional_param::<f64>(args, 2, "slice")?.map_or(len, |e| slice_bound(e, len));
    let items = seq.items();
    let selected = if start < end {
        items[start..end].to_vec()
    } else {
        Vec::new()
    };
    Ok(seq.rebuild(selected))
}

fn distinct(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    let items: &Array = param(args, 0, "distinct")?;
    let mut unique: Vec<Value> = Vec::new();
    for item in items {
        if !unique.iter().any(|seen| equal(seen, item).can_be_true) {
            unique.push(item.clone());
        }
    }
    Ok(Value::array(unique))
}

fn flatten_into(value: &Value, out: &mut Array) {
    match value {
        Value::Array(items) => items.iter().for_each(|item| flatten_into(item, out)),
        other => out.push_back(other.clone()),
    }
}

/// Deeply flattened array; a non-array flattens to the empty array
fn flatten(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    let mut out = Array::new();
    if let Value::Array(_) = param::<&Value>(args, 0, "flatten")? {
        flatten_into(&args[0], &mut out);
    }
    Ok(Value::Array(out))
}

pub(super) fn ops() -> Vec<BuiltinOp> {
    let seq_or_nil = Type::SEQUENCE.or(&Type::NIL);
    vec![
        BuiltinOp::native("first", Arity::Exact(1), first),
        BuiltinOp::native("second", Arity::Exact(1), second),
        BuiltinOp::native("last", Arity::Exact(1), last),
        BuiltinOp::native("nth", Arity::Range(2, 3), nth),
        BuiltinOp::native("reverse", Arity::Exact(1), reverse),
        BuiltinOp::structural("rest", Arity::Exact(1), rest, Type::SEQUENCE),
        BuiltinOp::structural("next", Arity::Exact(1), next, seq_or_nil),
        BuiltinOp::structural("push", Arity::AtLeast(2), push, Type::NON_EMPTY_ARRAY),
        BuiltinOp::structural("cons", Arity::Exact(2), cons, Type::NON_EMPTY_ARRAY),
        BuiltinOp::declared("sort", Arity::Range(1, 2), sort, Type::ARRAY),
        BuiltinOp::declared("sort-by", Arity::Range(2, 3), sort_by, Type::ARRAY),
        BuiltinOp::structural("map", Arity::AtLeast(2), map, Type::ARRAY),
        BuiltinOp::structural("filter", Arity::Exact(2), filter, Type::ARRAY),
        BuiltinOp::structural("remove", Arity::Exact(2), remove, Type::ARRAY),
        BuiltinOp::structural("reduce", Arity::Range(2, 3), reduce, Type::UNKNOWN),
        BuiltinOp::declared("range", Arity::Range(1, 3), range, Type::ARRAY),
        BuiltinOp::structural("repeat", Arity::Exact(2), repeat, Type::ARRAY),
        BuiltinOp::structural("take", Arity::Exact(2), take, Type::SEQUENCE),
        BuiltinOp::structural("drop", Arity::Exact(2), drop, Type::SEQUENCE),
        BuiltinOp::structural("take-while", Arity::Exact(2), take_while, Type::SEQUENCE),
        BuiltinOp::structural("drop-while", Arity::Exact(2), drop_while, Type::SEQUENCE),
        BuiltinOp::declared(
            "index-of",
            Arity::Exact(2),
            index_of,
            Type::POSITIVE_ZERO.or(&Type::POSITIVE_INTEGER).or(&Type::NIL),
        ),
        BuiltinOp::structural("some", Arity::Exact(2), some, Type::UNKNOWN),
        BuiltinOp::structural("slice", Arity::Range(1, 3), slice, Type::SEQUENCE),
        BuiltinOp::declared("distinct", Arity::Exact(1), distinct, Type::ARRAY),
        BuiltinOp::declared("flatten", Arity::Exact(1), flatten, Type::ARRAY),
    ]
}
