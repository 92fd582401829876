//! Typed access to built-in arguments.
//!
//! Built-ins receive their evaluated arguments as a slice of [`Value`]s. `FromParam`
//! turns one slot into a strongly-typed parameter (borrowing where it can), and
//! [`param`] reports a uniform type error naming the operation and argument position
//! when the slot has the wrong shape. All supported parameter types are declared here so
//! they are easy to audit.

use crate::Error;
use crate::transfer::{Num, numeric_type};
use crate::value::{Array, Object, RegularExpression, Value};

/// Conversion of one argument slot into a parameter type
pub(crate) trait FromParam<'a>: Sized {
    /// Describes the accepted shapes in error messages
    const EXPECTED: &'static str;

    fn from_param(value: &'a Value) -> Option<Self>;
}

impl<'a> FromParam<'a> for &'a Value {
    const EXPECTED: &'static str = "a value";

    fn from_param(value: &'a Value) -> Option<Self> {
        Some(value)
    }
}

impl FromParam<'_> for f64 {
    const EXPECTED: &'static str = "a number";

    fn from_param(value: &Value) -> Option<Self> {
        value.as_number()
    }
}

/// Non-negative integral count or index
impl FromParam<'_> for usize {
    const EXPECTED: &'static str = "a non-negative integer";

    fn from_param(value: &Value) -> Option<Self> {
        value
            .as_number()
            .and_then(crate::transfer::collection::as_index)
    }
}

impl<'a> FromParam<'a> for &'a str {
    const EXPECTED: &'static str = "a string";

    fn from_param(value: &'a Value) -> Option<Self> {
        value.as_str()
    }
}

impl<'a> FromParam<'a> for &'a Array {
    const EXPECTED: &'static str = "an array";

    fn from_param(value: &'a Value) -> Option<Self> {
        match value {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }
}

impl<'a> FromParam<'a> for &'a Object {
    const EXPECTED: &'static str = "an object";

    fn from_param(value: &'a Value) -> Option<Self> {
        match value {
            Value::Object(entries) => Some(entries),
            _ => None,
        }
    }
}

impl<'a> FromParam<'a> for &'a RegularExpression {
    const EXPECTED: &'static str = "a regexp";

    fn from_param(value: &'a Value) -> Option<Self> {
        match value {
            Value::Regexp(regexp) => Some(regexp),
            _ => None,
        }
    }
}

/// A number, or a type narrowed to its numeric part
impl FromParam<'_> for Num {
    const EXPECTED: &'static str = "a number";

    fn from_param(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Some(Num::Concrete(*n)),
            Value::Type(t) => {
                let narrowed = t.and(&numeric_type());
                (!narrowed.is_never()).then_some(Num::Abstract(narrowed))
            }
            _ => None,
        }
    }
}

/// Sequences: strings, arrays and nil (an empty sequence)
#[derive(Debug, Clone, Copy)]
pub(crate) enum Seq<'a> {
    Nil,
    String(&'a str),
    Array(&'a Array),
}

impl<'a> FromParam<'a> for Seq<'a> {
    const EXPECTED: &'static str = "a string or an array";

    fn from_param(value: &'a Value) -> Option<Self> {
        match value {
            Value::Nil => Some(Seq::Nil),
            Value::String(s) => Some(Seq::String(s)),
            Value::Array(items) => Some(Seq::Array(items)),
            _ => None,
        }
    }
}

impl Seq<'_> {
    /// The elements, string characters as one-character strings
    pub(crate) fn items(self) -> Vec<Value> {
        match self {
            Seq::Nil => Vec::new(),
            Seq::String(s) => s.chars().map(|c| Value::String(c.to_string())).collect(),
            Seq::Array(items) => items.iter().cloned().collect(),
        }
    }

    pub(crate) fn len(self) -> usize {
        match self {
            Seq::Nil => 0,
            Seq::String(s) => s.chars().count(),
            Seq::Array(items) => items.len(),
        }
    }

    /// The same kind of sequence built from `items`. Nil rebuilds as an array.
    pub(crate) fn rebuild(self, items: Vec<Value>) -> Value {
        match self {
            Seq::String(_) => Value::String(items.iter().map(Value::to_plain_string).collect()),
            Seq::Nil | Seq::Array(_) => Value::array(items),
        }
    }
}

/// Search patterns: a literal string or a regular expression
#[derive(Debug, Clone, Copy)]
pub(crate) enum Pattern<'a> {
    Literal(&'a str),
    Regexp(&'a RegularExpression),
}

impl<'a> FromParam<'a> for Pattern<'a> {
    const EXPECTED: &'static str = "a string or a regexp";

    fn from_param(value: &'a Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Pattern::Literal(s)),
            Value::Regexp(regexp) => Some(Pattern::Regexp(regexp)),
            _ => None,
        }
    }
}

/// Argument `index` of the operation `op`, converted to `T`
pub(crate) fn param<'a, T: FromParam<'a>>(
    args: &'a [Value],
    index: usize,
    op: &str,
) -> Result<T, Error> {
    let value = args.get(index).ok_or_else(|| {
        Error::EvalError(format!("{op}: missing argument {}", index + 1))
    })?;
    T::from_param(value).ok_or_else(|| {
        Error::TypeError(format!(
            "{op} expects {} as argument {}, got {value}",
            T::EXPECTED,
            index + 1
        ))
    })
}

/// Like [`param`], but `None` when the argument is absent
pub(crate) fn optional_param<'a, T: FromParam<'a>>(
    args: &'a [Value],
    index: usize,
    op: &str,
) -> Result<Option<T>, Error> {
    if index < args.len() {
        param(args, index, op).map(Some)
    } else {
        Ok(None)
    }
}

/// Every argument as a numeric operand
pub(crate) fn nums(args: &[Value], op: &str) -> Result<Vec<Num>, Error> {
    args.iter().map(|arg| Num::from_value(arg, op)).collect()
}
