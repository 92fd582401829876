//! Run-time values.
//!
//! [`Value`] covers every shape a Lits program can produce: nil, booleans, IEEE numbers,
//! strings, persistent arrays and objects, regular expressions and functions. During type
//! evaluation a value may also be a [`Type`], standing in for every value of that type.
//!
//! Arrays and objects are `im` persistent collections, so updating one never mutates
//! values that share structure with it.

use crate::Error;
use crate::ast::FunctionDefinition;
use crate::builtinops::BuiltinOp;
use crate::context::ContextStack;
use crate::types::Type;
use regex::Regex;
use std::fmt;
use std::rc::Rc;

pub type Array = im::Vector<Value>;
pub type Object = im::OrdMap<String, Value>;

#[derive(Clone)]
pub enum Value {
    Nil,
    Boolean(bool),
    Number(f64),
    String(String),
    Array(Array),
    Object(Object),
    Regexp(RegularExpression),
    Function(Rc<LitsFunction>),
    /// Abstract stand-in for every value of the type, only seen in type evaluation
    Type(Type),
}

/// A compiled regular expression remembering its source and flags
#[derive(Clone)]
pub struct RegularExpression {
    source: String,
    flags: String,
    regex: Regex,
}

impl RegularExpression {
    /// Supported flags: `i` (case-insensitive), `m` (multi-line), `s` (dot matches
    /// newline) and `g` (global, used by `replace`).
    pub fn new(source: &str, flags: &str) -> Result<Self, Error> {
        let mut inline = String::new();
        for flag in flags.chars() {
            match flag {
                'i' | 'm' | 's' => {
                    if !inline.contains(flag) {
                        inline.push(flag);
                    }
                }
                'g' => {}
                other => {
                    return Err(Error::EvalError(format!(
                        "Invalid regexp flag '{other}' in \"{flags}\""
                    )));
                }
            }
        }

        let pattern = if inline.is_empty() {
            source.to_owned()
        } else {
            format!("(?{inline}){source}")
        };
        let regex = Regex::new(&pattern)
            .map_err(|e| Error::EvalError(format!("Invalid regexp \"{source}\": {e}")))?;

        Ok(RegularExpression {
            source: source.to_owned(),
            flags: flags.to_owned(),
            regex,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn flags(&self) -> &str {
        &self.flags
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    pub fn is_global(&self) -> bool {
        self.flags.contains('g')
    }
}

impl PartialEq for RegularExpression {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.flags == other.flags
    }
}

impl fmt::Debug for RegularExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Regexp(#\"{}\"{})", self.source, self.flags)
    }
}

/// Every callable shape
pub enum LitsFunction {
    /// A `fn`/`defn` closure over the stack it was created in
    UserDefined {
        definition: Rc<FunctionDefinition>,
        captured: ContextStack,
    },
    Builtin(&'static BuiltinOp),
    Partial {
        function: Value,
        args: Vec<Value>,
    },
    /// Right-to-left composition
    Comp(Vec<Value>),
    Constantly(Value),
    Juxt(Vec<Value>),
    Complement(Value),
    EveryPred(Vec<Value>),
    SomePred(Vec<Value>),
    /// Replaces nil arguments by the defaults before calling
    Fnil {
        function: Value,
        defaults: Vec<Value>,
    },
}

impl LitsFunction {
    pub fn name(&self) -> String {
        match self {
            LitsFunction::UserDefined { definition, .. } => definition
                .name
                .clone()
                .unwrap_or_else(|| "anonymous".to_owned()),
            LitsFunction::Builtin(op) => op.name.to_owned(),
            LitsFunction::Partial { .. } => "partial".to_owned(),
            LitsFunction::Comp(_) => "comp".to_owned(),
            LitsFunction::Constantly(_) => "constantly".to_owned(),
            LitsFunction::Juxt(_) => "juxt".to_owned(),
            LitsFunction::Complement(_) => "complement".to_owned(),
            LitsFunction::EveryPred(_) => "every-pred".to_owned(),
            LitsFunction::SomePred(_) => "some-pred".to_owned(),
            LitsFunction::Fnil { .. } => "fnil".to_owned(),
        }
    }
}

impl fmt::Debug for LitsFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({})", self.name())
    }
}

impl Value {
    pub fn array<I: IntoIterator<Item = Value>>(items: I) -> Value {
        Value::Array(items.into_iter().collect())
    }

    pub fn object<S: Into<String>, I: IntoIterator<Item = (S, Value)>>(entries: I) -> Value {
        Value::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn function(f: LitsFunction) -> Value {
        Value::Function(Rc::new(f))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Regexp(_) => "regexp",
            Value::Function(_) => "function",
            Value::Type(_) => "type",
        }
    }

    /// Falsy values are nil, false, both zeros, NaN and the empty string.
    /// `None` for a [`Value::Type`] that admits both outcomes.
    pub fn truthiness(&self) -> Option<bool> {
        match self {
            Value::Nil => Some(false),
            Value::Boolean(b) => Some(*b),
            Value::Number(n) => Some(*n != 0.0 && !n.is_nan()),
            Value::String(s) => Some(!s.is_empty()),
            Value::Type(t) => {
                if t.is(&Type::FALSY) {
                    Some(false)
                } else if t.is(&Type::TRUTHY) {
                    Some(true)
                } else {
                    None
                }
            }
            Value::Array(_) | Value::Object(_) | Value::Regexp(_) | Value::Function(_) => {
                Some(true)
            }
        }
    }

    /// Concrete truthiness; abstract values count as truthy only if they must be
    pub fn is_truthy(&self) -> bool {
        self.truthiness().unwrap_or(false)
    }

    /// Whether the value is, or contains, an abstract [`Value::Type`]
    pub fn contains_type(&self) -> bool {
        match self {
            Value::Type(_) => true,
            Value::Array(items) => items.iter().any(Value::contains_type),
            Value::Object(entries) => entries.values().any(Value::contains_type),
            _ => false,
        }
    }

    /// Equality that also tells `0` from `-0`, so merging identical values never loses
    /// a sign. Every NaN is identical to every other.
    pub fn is_identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => {
                a.to_bits() == b.to_bits() || (a.is_nan() && b.is_nan())
            }
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.is_identical(y))
            }
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|((ka, va), (kb, vb))| ka == kb && va.is_identical(vb))
            }
            _ => self == other,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Rendering used by `str` and `write!`: strings unquoted, nil empty
    pub fn to_plain_string(&self) -> String {
        match self {
            Value::Nil => String::new(),
            Value::String(s) => s.clone(),
            Value::Number(n) => number_to_string(*n),
            other => other.to_string(),
        }
    }
}

/// Number rendering shared by `str` and the printer
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_owned()
    } else if n == f64::INFINITY {
        "Infinity".to_owned()
    } else if n == f64::NEG_INFINITY {
        "-Infinity".to_owned()
    } else if n == 0.0 {
        "0".to_owned()
    } else {
        format!("{n}")
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Regexp(a), Value::Regexp(b)) => a == b,
            // Functions compare by identity
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Type(a), Value::Type(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "Nil"),
            Value::Boolean(b) => write!(f, "Boolean({b})"),
            Value::Number(n) => write!(f, "Number({n:?})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Array(items) => f.debug_list().entries(items.iter()).finish(),
            Value::Object(entries) => f.debug_map().entries(entries.iter()).finish(),
            Value::Regexp(r) => write!(f, "{r:?}"),
            Value::Function(func) => write!(f, "{func:?}"),
            Value::Type(t) => write!(f, "Type({t})"),
        }
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    write!(f, "\"")?;
    for ch in s.chars() {
        match ch {
            '"' => write!(f, "\\\"")?,
            '\\' => write!(f, "\\\\")?,
            '\n' => write!(f, "\\n")?,
            '\t' => write!(f, "\\t")?,
            '\r' => write!(f, "\\r")?,
            c => write!(f, "{c}")?,
        }
    }
    write!(f, "\"")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{}", number_to_string(*n)),
            Value::String(s) => write_quoted(f, s),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Object(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write_quoted(f, key)?;
                    write!(f, " {value}")?;
                }
                write!(f, "}}")
            }
            Value::Regexp(r) => write!(f, "#\"{}\"{}", r.source, r.flags),
            Value::Function(func) => write!(f, "<function {}>", func.name()),
            Value::Type(t) => write!(f, "{t}"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Number(f64::from(n))
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<Type> for Value {
    fn from(t: Type) -> Self {
        Value::Type(t)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::Array(arr.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Nil, Into::into)
    }
}

#[cfg(feature = "json")]
impl From<&serde_json::Value> for Value {
    fn from(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Nil,
            serde_json::Value::Bool(b) => Value::Boolean(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => Value::Array(items.iter().map(Value::from).collect()),
            serde_json::Value::Object(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

#[cfg(feature = "json")]
impl TryFrom<&Value> for serde_json::Value {
    type Error = Error;

    fn try_from(value: &Value) -> Result<Self, Error> {
        match value {
            Value::Nil => Ok(serde_json::Value::Null),
            Value::Boolean(b) => Ok(serde_json::Value::Bool(*b)),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() <= crate::ast::MAX_SAFE_INTEGER {
                    Ok(serde_json::Value::from(*n as i64))
                } else {
                    serde_json::Number::from_f64(*n)
                        .map(serde_json::Value::Number)
                        .ok_or_else(|| {
                            Error::TypeError(format!(
                                "{} has no JSON representation",
                                number_to_string(*n)
                            ))
                        })
                }
            }
            Value::String(s) => Ok(serde_json::Value::String(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(serde_json::Value::try_from)
                .collect::<Result<Vec<_>, _>>()
                .map(serde_json::Value::Array),
            Value::Object(entries) => entries
                .iter()
                .map(|(k, v)| Ok((k.clone(), serde_json::Value::try_from(v)?)))
                .collect::<Result<serde_json::Map<_, _>, Error>>()
                .map(serde_json::Value::Object),
            other => Err(Error::TypeError(format!(
                "{} values have no JSON representation",
                other.type_name()
            ))),
        }
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        let test_cases = vec![
            (Value::Nil, Some(false)),
            (Value::Boolean(false), Some(false)),
            (Value::from(0), Some(false)),
            (Value::Number(-0.0), Some(false)),
            (Value::Number(f64::NAN), Some(false)),
            (Value::from(""), Some(false)),
            (Value::from(1), Some(true)),
            (Value::from(" "), Some(true)),
            (Value::array(vec![]), Some(true)),
            (Value::object(Vec::<(String, Value)>::new()), Some(true)),
            (Value::Type(Type::ZERO), Some(false)),
            (Value::Type(Type::NON_EMPTY_STRING), Some(true)),
            (Value::Type(Type::NUMBER), None),
        ];

        for (i, (value, expected)) in test_cases.iter().enumerate() {
            assert_eq!(value.truthiness(), *expected, "Test case {} failed", i + 1);
        }
    }

    #[test]
    fn test_display() {
        let test_cases = vec![
            (Value::from(3), "3"),
            (Value::Number(-0.0), "0"),
            (Value::Number(2.5), "2.5"),
            (Value::Number(f64::NEG_INFINITY), "-Infinity"),
            (Value::from("a\"b"), "\"a\\\"b\""),
            (Value::from([1, 2, 3]), "[1 2 3]"),
            (Value::object([("a", Value::from(0))]), "{\"a\" 0}"),
            (
                Value::Regexp(RegularExpression::new("a+", "gi").unwrap()),
                "#\"a+\"gi",
            ),
        ];

        for (value, expected) in test_cases {
            assert_eq!(value.to_string(), expected);
        }
        assert_eq!(Value::Nil.to_plain_string(), "");
        assert_eq!(Value::from("plain").to_plain_string(), "plain");
    }

    #[test]
    fn test_structural_equality() {
        assert_eq!(Value::from([1, 2]), Value::array(vec![1.into(), 2.into()]));
        assert_eq!(Value::Number(0.0), Value::Number(-0.0));
        assert_ne!(Value::Number(f64::NAN), Value::Number(f64::NAN));
        assert_ne!(Value::from(1), Value::from("1"));
    }

    #[test]
    fn test_regexp_flags() {
        let re = RegularExpression::new("abc", "i").unwrap();
        assert!(re.regex().is_match("xABCx"));
        assert!(!re.is_global());
        assert!(RegularExpression::new("abc", "x").is_err());
        assert!(RegularExpression::new("(", "").is_err());
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_json_conversion() {
        let json = serde_json::json!({"a": [1, 2.5, null, true], "b": "s"});
        let value = Value::from(&json);
        assert_eq!(
            value,
            Value::object([
                (
                    "a",
                    Value::array(vec![
                        1.into(),
                        Value::Number(2.5),
                        Value::Nil,
                        true.into()
                    ])
                ),
                ("b", "s".into()),
            ])
        );
        assert_eq!(serde_json::Value::try_from(&value).unwrap(), json);
        assert!(serde_json::Value::try_from(&Value::Number(f64::NAN)).is_err());
    }
}
