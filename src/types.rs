//! The type lattice used by type evaluation.
//!
//! A [`Type`] is a set of value shapes, represented as a bitmask over twenty atomic
//! shape bits ([`TypeBits`]). Every run-time value belongs to exactly one atomic shape:
//!
//! ```text
//! nil  nan  true  false
//! positive-zero  negative-zero  positive-integer  negative-integer
//! positive-non-integer  negative-non-integer  positive-infinity  negative-infinity
//! empty-string  non-empty-string  empty-array  non-empty-array
//! empty-object  non-empty-object  regexp  function
//! ```
//!
//! Named types such as `number`, `integer` or `collection` are fixed unions of these bits.
//! Function-shaped types may additionally carry a return type, which is tracked
//! covariantly by the set operations.

use crate::Error;
use crate::value::Value;
use bitflags::bitflags;
use std::fmt;

bitflags! {
    /// Atomic value-shape bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct TypeBits: u32 {
        const NIL = 1 << 0;
        const NAN = 1 << 1;
        const TRUE = 1 << 2;
        const FALSE = 1 << 3;
        const POSITIVE_ZERO = 1 << 4;
        const NEGATIVE_ZERO = 1 << 5;
        const POSITIVE_INTEGER = 1 << 6;
        const NEGATIVE_INTEGER = 1 << 7;
        const POSITIVE_NON_INTEGER = 1 << 8;
        const NEGATIVE_NON_INTEGER = 1 << 9;
        const POSITIVE_INFINITY = 1 << 10;
        const NEGATIVE_INFINITY = 1 << 11;
        const EMPTY_STRING = 1 << 12;
        const NON_EMPTY_STRING = 1 << 13;
        const EMPTY_ARRAY = 1 << 14;
        const NON_EMPTY_ARRAY = 1 << 15;
        const EMPTY_OBJECT = 1 << 16;
        const NON_EMPTY_OBJECT = 1 << 17;
        const REGEXP = 1 << 18;
        const FUNCTION = 1 << 19;
    }
}

/// Number of atomic bits, used when rendering the raw bitmask
const ATOMIC_BIT_COUNT: usize = 20;

macro_rules! bits {
    ($($flag:ident)|+) => {
        0 $(| TypeBits::$flag.bits())+
    };
}

const ZERO_BITS: u32 = bits!(POSITIVE_ZERO | NEGATIVE_ZERO);
const INTEGER_BITS: u32 = ZERO_BITS | bits!(POSITIVE_INTEGER | NEGATIVE_INTEGER);
const NON_INTEGER_BITS: u32 = bits!(POSITIVE_NON_INTEGER | NEGATIVE_NON_INTEGER);
const INFINITY_BITS: u32 = bits!(POSITIVE_INFINITY | NEGATIVE_INFINITY);
const POSITIVE_NUMBER_BITS: u32 =
    bits!(POSITIVE_INTEGER | POSITIVE_NON_INTEGER | POSITIVE_INFINITY);
const NEGATIVE_NUMBER_BITS: u32 =
    bits!(NEGATIVE_INTEGER | NEGATIVE_NON_INTEGER | NEGATIVE_INFINITY);
const NON_ZERO_NUMBER_BITS: u32 = POSITIVE_NUMBER_BITS | NEGATIVE_NUMBER_BITS;
const FINITE_NUMBER_BITS: u32 = INTEGER_BITS | NON_INTEGER_BITS;
const NUMBER_BITS: u32 = ZERO_BITS | NON_ZERO_NUMBER_BITS;
const STRING_BITS: u32 = bits!(EMPTY_STRING | NON_EMPTY_STRING);
const ARRAY_BITS: u32 = bits!(EMPTY_ARRAY | NON_EMPTY_ARRAY);
const OBJECT_BITS: u32 = bits!(EMPTY_OBJECT | NON_EMPTY_OBJECT);
const SEQUENCE_BITS: u32 = STRING_BITS | ARRAY_BITS;
const COLLECTION_BITS: u32 = SEQUENCE_BITS | OBJECT_BITS;
const EMPTY_COLLECTION_BITS: u32 = bits!(EMPTY_STRING | EMPTY_ARRAY | EMPTY_OBJECT);
const NON_EMPTY_COLLECTION_BITS: u32 = bits!(NON_EMPTY_STRING | NON_EMPTY_ARRAY | NON_EMPTY_OBJECT);
const FALSY_BITS: u32 = bits!(NIL | FALSE | NAN | EMPTY_STRING) | ZERO_BITS;
const UNKNOWN_BITS: u32 = TypeBits::all().bits();
const TRUTHY_BITS: u32 = UNKNOWN_BITS & !FALSY_BITS;

/// A set of possible value shapes.
///
/// Two types are equal iff their bitmasks are equal and, for function-shaped types,
/// their return types are equal. An absent return type means "any return".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Type {
    bits: TypeBits,
    return_type: Option<Box<Type>>,
}

const fn named(bits: u32) -> Type {
    Type {
        bits: TypeBits::from_bits_retain(bits),
        return_type: None,
    }
}

impl Type {
    pub const NEVER: Type = named(0);
    pub const UNKNOWN: Type = named(UNKNOWN_BITS);

    pub const NIL: Type = named(bits!(NIL));
    pub const NAN: Type = named(bits!(NAN));
    pub const TRUE: Type = named(bits!(TRUE));
    pub const FALSE: Type = named(bits!(FALSE));
    pub const BOOLEAN: Type = named(bits!(TRUE | FALSE));

    pub const POSITIVE_ZERO: Type = named(bits!(POSITIVE_ZERO));
    pub const NEGATIVE_ZERO: Type = named(bits!(NEGATIVE_ZERO));
    pub const ZERO: Type = named(ZERO_BITS);
    pub const POSITIVE_INTEGER: Type = named(bits!(POSITIVE_INTEGER));
    pub const NEGATIVE_INTEGER: Type = named(bits!(NEGATIVE_INTEGER));
    pub const INTEGER: Type = named(INTEGER_BITS);
    pub const POSITIVE_NON_INTEGER: Type = named(bits!(POSITIVE_NON_INTEGER));
    pub const NEGATIVE_NON_INTEGER: Type = named(bits!(NEGATIVE_NON_INTEGER));
    pub const NON_INTEGER: Type = named(NON_INTEGER_BITS);
    pub const POSITIVE_INFINITY: Type = named(bits!(POSITIVE_INFINITY));
    pub const NEGATIVE_INFINITY: Type = named(bits!(NEGATIVE_INFINITY));
    pub const INFINITY: Type = named(INFINITY_BITS);
    pub const POSITIVE_NUMBER: Type = named(POSITIVE_NUMBER_BITS);
    pub const NEGATIVE_NUMBER: Type = named(NEGATIVE_NUMBER_BITS);
    pub const NON_ZERO_NUMBER: Type = named(NON_ZERO_NUMBER_BITS);
    pub const FINITE_NUMBER: Type = named(FINITE_NUMBER_BITS);
    /// Every numeric shape except `nan`
    pub const NUMBER: Type = named(NUMBER_BITS);

    pub const EMPTY_STRING: Type = named(bits!(EMPTY_STRING));
    pub const NON_EMPTY_STRING: Type = named(bits!(NON_EMPTY_STRING));
    pub const STRING: Type = named(STRING_BITS);
    pub const EMPTY_ARRAY: Type = named(bits!(EMPTY_ARRAY));
    pub const NON_EMPTY_ARRAY: Type = named(bits!(NON_EMPTY_ARRAY));
    pub const ARRAY: Type = named(ARRAY_BITS);
    pub const EMPTY_OBJECT: Type = named(bits!(EMPTY_OBJECT));
    pub const NON_EMPTY_OBJECT: Type = named(bits!(NON_EMPTY_OBJECT));
    pub const OBJECT: Type = named(OBJECT_BITS);
    pub const SEQUENCE: Type = named(SEQUENCE_BITS);
    pub const COLLECTION: Type = named(COLLECTION_BITS);
    pub const EMPTY_COLLECTION: Type = named(EMPTY_COLLECTION_BITS);
    pub const NON_EMPTY_COLLECTION: Type = named(NON_EMPTY_COLLECTION_BITS);

    pub const REGEXP: Type = named(bits!(REGEXP));
    /// Function with an unknown return type
    pub const FUNCTION: Type = named(bits!(FUNCTION));

    pub const FALSY: Type = named(FALSY_BITS);
    pub const TRUTHY: Type = named(TRUTHY_BITS);
}

/// Every named type, atomic names first.
const NAMED_TYPES: &[(&str, u32)] = &[
    ("never", 0),
    ("nil", bits!(NIL)),
    ("nan", bits!(NAN)),
    ("true", bits!(TRUE)),
    ("false", bits!(FALSE)),
    ("positive-zero", bits!(POSITIVE_ZERO)),
    ("negative-zero", bits!(NEGATIVE_ZERO)),
    ("positive-integer", bits!(POSITIVE_INTEGER)),
    ("negative-integer", bits!(NEGATIVE_INTEGER)),
    ("positive-non-integer", bits!(POSITIVE_NON_INTEGER)),
    ("negative-non-integer", bits!(NEGATIVE_NON_INTEGER)),
    ("positive-infinity", bits!(POSITIVE_INFINITY)),
    ("negative-infinity", bits!(NEGATIVE_INFINITY)),
    ("empty-string", bits!(EMPTY_STRING)),
    ("non-empty-string", bits!(NON_EMPTY_STRING)),
    ("empty-array", bits!(EMPTY_ARRAY)),
    ("non-empty-array", bits!(NON_EMPTY_ARRAY)),
    ("empty-object", bits!(EMPTY_OBJECT)),
    ("non-empty-object", bits!(NON_EMPTY_OBJECT)),
    ("regexp", bits!(REGEXP)),
    ("function", bits!(FUNCTION)),
    ("unknown", UNKNOWN_BITS),
    ("boolean", bits!(TRUE | FALSE)),
    ("zero", ZERO_BITS),
    ("integer", INTEGER_BITS),
    ("non-integer", NON_INTEGER_BITS),
    ("infinity", INFINITY_BITS),
    ("positive-number", POSITIVE_NUMBER_BITS),
    ("negative-number", NEGATIVE_NUMBER_BITS),
    ("non-zero-number", NON_ZERO_NUMBER_BITS),
    ("finite-number", FINITE_NUMBER_BITS),
    ("number", NUMBER_BITS),
    ("string", STRING_BITS),
    ("array", ARRAY_BITS),
    ("object", OBJECT_BITS),
    ("sequence", SEQUENCE_BITS),
    ("collection", COLLECTION_BITS),
    ("empty-collection", EMPTY_COLLECTION_BITS),
    ("non-empty-collection", NON_EMPTY_COLLECTION_BITS),
    ("falsy", FALSY_BITS),
    ("truthy", TRUTHY_BITS),
];

/// Composite names tried, in order, when decomposing an unnamed union.
const COVER_ORDER: &[&str] = &[
    "falsy",
    "truthy",
    "collection",
    "number",
    "sequence",
    "finite-number",
    "non-zero-number",
    "positive-number",
    "negative-number",
    "integer",
    "non-integer",
    "infinity",
    "zero",
    "string",
    "array",
    "object",
    "empty-collection",
    "non-empty-collection",
    "boolean",
];

/// Sign-paired numeric bits swapped by [`Type::negate_number`]
const SIGNED_PAIRS: [(TypeBits, TypeBits); 4] = [
    (TypeBits::POSITIVE_ZERO, TypeBits::NEGATIVE_ZERO),
    (TypeBits::POSITIVE_INTEGER, TypeBits::NEGATIVE_INTEGER),
    (TypeBits::POSITIVE_NON_INTEGER, TypeBits::NEGATIVE_NON_INTEGER),
    (TypeBits::POSITIVE_INFINITY, TypeBits::NEGATIVE_INFINITY),
];

fn bits_named(name: &str) -> Option<u32> {
    NAMED_TYPES
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, bits)| *bits)
}

impl Type {
    /// Type from raw bits. Function-shaped types get an unknown return type.
    pub fn new(bits: TypeBits) -> Type {
        Type {
            bits,
            return_type: None,
        }
    }

    /// A function whose calls produce values of `return_type`
    pub fn function_returning(return_type: Type) -> Type {
        Type {
            bits: TypeBits::FUNCTION,
            return_type: Some(Box::new(return_type)),
        }
    }

    fn normalized(bits: TypeBits, return_type: Option<Box<Type>>) -> Type {
        let return_type = if bits.contains(TypeBits::FUNCTION) {
            return_type
        } else {
            None
        };
        Type { bits, return_type }
    }

    /// Look up a named type such as `"number"` or `"non-empty-array"`
    pub fn named(name: &str) -> Option<Type> {
        bits_named(name).map(|bits| Type::new(TypeBits::from_bits_retain(bits)))
    }

    pub fn bits(&self) -> TypeBits {
        self.bits
    }

    /// Declared return type of a function-shaped type, `None` meaning "any"
    pub fn return_type(&self) -> Option<&Type> {
        self.return_type.as_deref()
    }

    /// Classify a concrete value into its single atomic type
    pub fn of(value: &Value) -> Type {
        match value {
            Value::Nil => Type::NIL,
            Value::Boolean(true) => Type::TRUE,
            Value::Boolean(false) => Type::FALSE,
            Value::Number(n) => Type::of_number(*n),
            Value::String(s) if s.is_empty() => Type::EMPTY_STRING,
            Value::String(_) => Type::NON_EMPTY_STRING,
            Value::Array(items) if items.is_empty() => Type::EMPTY_ARRAY,
            Value::Array(_) => Type::NON_EMPTY_ARRAY,
            Value::Object(entries) if entries.is_empty() => Type::EMPTY_OBJECT,
            Value::Object(_) => Type::NON_EMPTY_OBJECT,
            Value::Regexp(_) => Type::REGEXP,
            Value::Function(_) => Type::FUNCTION,
            Value::Type(t) => t.clone(),
        }
    }

    /// Classify a number, keeping the sign of zero apart
    pub fn of_number(n: f64) -> Type {
        if n.is_nan() {
            Type::NAN
        } else if n == 0.0 {
            if n.is_sign_negative() {
                Type::NEGATIVE_ZERO
            } else {
                Type::POSITIVE_ZERO
            }
        } else if n.is_infinite() {
            if n > 0.0 {
                Type::POSITIVE_INFINITY
            } else {
                Type::NEGATIVE_INFINITY
            }
        } else if n.fract() == 0.0 {
            if n > 0.0 {
                Type::POSITIVE_INTEGER
            } else {
                Type::NEGATIVE_INTEGER
            }
        } else if n > 0.0 {
            Type::POSITIVE_NON_INTEGER
        } else {
            Type::NEGATIVE_NON_INTEGER
        }
    }

    /// Union of all operands
    pub fn or_all<'a, I>(types: I) -> Type
    where
        I: IntoIterator<Item = &'a Type>,
    {
        let mut bits = TypeBits::empty();
        let mut function_seen = false;
        // Becomes None as soon as one function-shaped operand returns "anything"
        let mut return_types: Option<Vec<&Type>> = Some(Vec::new());

        for t in types {
            bits |= t.bits;
            if t.bits.contains(TypeBits::FUNCTION) {
                function_seen = true;
                match (&mut return_types, &t.return_type) {
                    (Some(list), Some(r)) => list.push(r),
                    _ => return_types = None,
                }
            }
        }

        let return_type = match return_types {
            Some(list) if function_seen => Some(Box::new(Type::or_all(list))),
            _ => None,
        };
        Type::normalized(bits, return_type)
    }

    /// Intersection of all operands. The intersection of nothing is `unknown`.
    pub fn and_all<'a, I>(types: I) -> Type
    where
        I: IntoIterator<Item = &'a Type>,
    {
        let mut iter = types.into_iter();
        let Some(first) = iter.next() else {
            return Type::UNKNOWN;
        };

        let mut bits = first.bits;
        let mut return_types: Vec<&Type> = first.return_type.as_deref().into_iter().collect();
        for t in iter {
            bits &= t.bits;
            if let Some(r) = &t.return_type {
                return_types.push(r);
            }
        }

        if !bits.contains(TypeBits::FUNCTION) || return_types.is_empty() {
            return Type::normalized(bits, None);
        }

        let return_type = Type::and_all(return_types);
        if return_type.is_never() {
            bits.remove(TypeBits::FUNCTION);
            Type::normalized(bits, None)
        } else {
            Type::normalized(bits, Some(Box::new(return_type)))
        }
    }

    pub fn or(&self, other: &Type) -> Type {
        Type::or_all([self, other])
    }

    pub fn and(&self, other: &Type) -> Type {
        Type::and_all([self, other])
    }

    /// Remove every shape of `other` from `self`
    pub fn exclude(&self, other: &Type) -> Type {
        let mut bits = self.bits - other.bits;
        let mut return_type = self.return_type.clone();

        if self.bits.contains(TypeBits::FUNCTION) && other.bits.contains(TypeBits::FUNCTION) {
            match (&self.return_type, &other.return_type) {
                // `other` covers every function
                (_, None) => return_type = None,
                (Some(own), Some(excluded)) => {
                    let remaining = own.exclude(excluded);
                    if remaining.is_never() {
                        bits.remove(TypeBits::FUNCTION);
                        return_type = None;
                    } else {
                        bits.insert(TypeBits::FUNCTION);
                        return_type = Some(Box::new(remaining));
                    }
                }
                (None, Some(_)) => {
                    bits.insert(TypeBits::FUNCTION);
                    return_type = None;
                }
            }
        }

        Type::normalized(bits, return_type)
    }

    /// Left fold of [`Type::exclude`]
    pub fn exclude_all<'a, I>(&self, others: I) -> Type
    where
        I: IntoIterator<Item = &'a Type>,
    {
        others
            .into_iter()
            .fold(self.clone(), |acc, other| acc.exclude(other))
    }

    /// Subtype test. `never` is a subtype of every type.
    pub fn is(&self, other: &Type) -> bool {
        if self.bits.is_empty() {
            return true;
        }
        if !self.bits.intersects(other.bits) || !(self.bits - other.bits).is_empty() {
            return false;
        }
        if self.bits.contains(TypeBits::FUNCTION)
            && let Some(required) = &other.return_type
        {
            return match &self.return_type {
                Some(own) => own.is(required),
                None => false,
            };
        }
        true
    }

    pub fn equals(&self, other: &Type) -> bool {
        self == other
    }

    pub fn intersects(&self, other: &Type) -> bool {
        !self.and(other).is_never()
    }

    pub fn is_never(&self) -> bool {
        self.bits.is_empty()
    }

    /// True iff the bitmask is not exactly one of the named types
    pub fn is_union_type(&self) -> bool {
        !NAMED_TYPES.iter().any(|(_, bits)| *bits == self.bits.bits())
    }

    /// True iff the shapes include every bit of `bits`
    pub fn contains(&self, bits: TypeBits) -> bool {
        self.bits.contains(bits)
    }

    /// True iff the shapes include any bit of `bits`
    pub fn has_any(&self, bits: TypeBits) -> bool {
        self.bits.intersects(bits)
    }

    /// Swap each signed numeric bit with its opposite, unless both are present
    pub fn negate_number(&self) -> Type {
        let mut bits = self.bits;
        for (positive, negative) in SIGNED_PAIRS {
            if self.bits.contains(positive) != self.bits.contains(negative) {
                bits.toggle(positive | negative);
            }
        }
        Type::normalized(bits, self.return_type.clone())
    }

    /// Static subtype assertion used by type evaluation of built-ins
    pub fn assert_is(&self, required: &Type, what: &str) -> Result<(), Error> {
        if self.is(required) {
            Ok(())
        } else {
            Err(Error::TypeError(format!(
                "{what}: expected {}, got {}",
                required.describe(),
                self.describe()
            )))
        }
    }

    /// Names of the bitmask, without the raw bits
    pub fn describe(&self) -> String {
        let raw = self.bits.bits();
        let mut text = match NAMED_TYPES.iter().find(|(_, bits)| *bits == raw) {
            Some((name, _)) => (*name).to_owned(),
            None => self.cover_names().join("|"),
        };
        if let Some(return_type) = &self.return_type {
            text.push_str(&format!(" -> ({})", return_type.describe()));
        }
        text
    }

    /// Greedy decomposition into named composites followed by the leftover atomic bits
    fn cover_names(&self) -> Vec<&'static str> {
        let mut remaining = self.bits.bits();
        let mut names = Vec::new();
        for name in COVER_ORDER {
            if let Some(bits) = bits_named(name)
                && bits & remaining == bits
            {
                names.push(*name);
                remaining &= !bits;
            }
        }
        for (name, flag) in TypeBits::all().iter_names() {
            if flag.bits() & remaining != 0 {
                names.push(atomic_name(name));
            }
        }
        names
    }
}

/// Lisp-case name of an atomic flag (`POSITIVE_ZERO` -> `positive-zero`)
fn atomic_name(flag_name: &str) -> &'static str {
    NAMED_TYPES
        .iter()
        .find(|(name, _)| {
            name.len() == flag_name.len()
                && name
                    .chars()
                    .zip(flag_name.chars())
                    .all(|(a, b)| a == b.to_ascii_lowercase() || (a == '-' && b == '_'))
        })
        .map_or("unknown", |(name, _)| *name)
}

fn grouped_binary(bits: u32) -> String {
    let digits = format!("{bits:0width$b}", width = ATOMIC_BIT_COUNT);
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 4);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 4 == 0 {
            grouped.push('_');
        }
        grouped.push(c);
    }
    grouped
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw = self.bits.bits();
        write!(f, "{} <{} = {raw}>", self.describe(), grouped_binary(raw))
    }
}

impl From<TypeBits> for Type {
    fn from(bits: TypeBits) -> Self {
        Type::new(bits)
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;

    fn names_of(t: &Type) -> Vec<String> {
        t.describe().split('|').map(str::to_owned).collect()
    }

    #[test]
    fn test_of_classifies_numbers() {
        let test_cases = vec![
            (0.0, Type::POSITIVE_ZERO),
            (-0.0, Type::NEGATIVE_ZERO),
            (3.0, Type::POSITIVE_INTEGER),
            (-3.0, Type::NEGATIVE_INTEGER),
            (0.5, Type::POSITIVE_NON_INTEGER),
            (-1.25, Type::NEGATIVE_NON_INTEGER),
            (f64::INFINITY, Type::POSITIVE_INFINITY),
            (f64::NEG_INFINITY, Type::NEGATIVE_INFINITY),
            (f64::NAN, Type::NAN),
            (9007199254740991.0, Type::POSITIVE_INTEGER),
        ];
        for (n, expected) in test_cases {
            assert_eq!(Type::of_number(n), expected, "classifying {n}");
        }
    }

    #[test]
    fn test_of_classifies_values() {
        assert_eq!(Type::of(&Value::Nil), Type::NIL);
        assert_eq!(Type::of(&Value::from("")), Type::EMPTY_STRING);
        assert_eq!(Type::of(&Value::from("a")), Type::NON_EMPTY_STRING);
        assert_eq!(Type::of(&Value::array(vec![])), Type::EMPTY_ARRAY);
        assert_eq!(
            Type::of(&Value::array(vec![Value::Nil])),
            Type::NON_EMPTY_ARRAY
        );
        assert_eq!(Type::of(&Value::Boolean(false)), Type::FALSE);
        assert_eq!(Type::of(&Value::Type(Type::INTEGER)), Type::INTEGER);
    }

    #[test]
    fn test_named_constants_print_single_name() {
        for (name, bits) in NAMED_TYPES {
            let t = Type::new(TypeBits::from_bits_retain(*bits));
            assert_eq!(t.describe(), *name);
            assert!(!t.is_union_type(), "{name} should not be a union type");
            let printed = t.to_string();
            assert!(printed.starts_with(&format!("{name} <")), "{printed}");
            assert!(printed.ends_with(&format!("= {bits}>")), "{printed}");
        }
    }

    #[test]
    fn test_unions_decompose_into_named_types() {
        let test_cases = vec![
            (Type::STRING.or(&Type::OBJECT), vec!["string", "object"]),
            (Type::NUMBER.or(&Type::NIL), vec!["number", "nil"]),
            (
                Type::POSITIVE_INTEGER.or(&Type::NEGATIVE_INTEGER),
                vec!["positive-integer", "negative-integer"],
            ),
            (
                Type::INTEGER.or(&Type::STRING).or(&Type::NAN),
                vec!["integer", "string", "nan"],
            ),
            (
                Type::ZERO.or(&Type::POSITIVE_INFINITY),
                vec!["zero", "positive-infinity"],
            ),
            (Type::TRUTHY.or(&Type::NIL), vec!["truthy", "nil"]),
            (
                Type::FALSY.or(&Type::REGEXP),
                vec!["falsy", "regexp"],
            ),
        ];
        for (t, expected) in test_cases {
            assert!(t.is_union_type(), "{t} should be a union");
            assert_eq!(names_of(&t), expected);
        }
    }

    #[test]
    fn test_raw_bits_rendering() {
        assert_eq!(Type::NIL.to_string(), "nil <0000_0000_0000_0000_0001 = 1>");
        assert_eq!(
            Type::FUNCTION.to_string(),
            "function <1000_0000_0000_0000_0000 = 524288>"
        );
    }

    #[test]
    fn test_subtyping() {
        assert!(Type::POSITIVE_INTEGER.is(&Type::INTEGER));
        assert!(Type::INTEGER.is(&Type::NUMBER));
        assert!(!Type::NUMBER.is(&Type::INTEGER));
        assert!(!Type::NAN.is(&Type::NUMBER));
        assert!(Type::ZERO.is(&Type::FALSY));
        assert!(Type::NON_EMPTY_ARRAY.is(&Type::TRUTHY));
        assert!(Type::EMPTY_ARRAY.is(&Type::TRUTHY));
        assert!(Type::NEVER.is(&Type::NIL));
        assert!(!Type::STRING.is(&Type::NEVER));
    }

    #[test]
    fn test_function_return_types() {
        let returns_int = Type::function_returning(Type::INTEGER);
        let returns_num = Type::function_returning(Type::NUMBER);
        let returns_str = Type::function_returning(Type::STRING);

        assert!(returns_int.is(&returns_num));
        assert!(!returns_num.is(&returns_int));
        assert!(returns_int.is(&Type::FUNCTION));
        assert!(!Type::FUNCTION.is(&returns_int));

        // Union of return types when every operand declares one
        let either = returns_int.or(&returns_str);
        assert_eq!(either.return_type(), Some(&Type::INTEGER.or(&Type::STRING)));
        // An undeclared return type widens the union to "any"
        assert_eq!(returns_int.or(&Type::FUNCTION).return_type(), None);

        // Disjoint return types leave no function at all
        let both = returns_int.and(&returns_str);
        assert!(both.is_never());
        assert_eq!(returns_int.and(&returns_num), returns_int);

        // A non-function operand leaves the function bit untouched
        let with_nil = returns_int.or(&Type::NIL);
        assert_eq!(with_nil.exclude(&Type::NIL), returns_int);
        assert_eq!(
            returns_num.exclude(&returns_int).return_type(),
            Some(&Type::NUMBER.exclude(&Type::INTEGER))
        );
        assert!(returns_int.exclude(&Type::FUNCTION).is_never());
    }

    #[test]
    fn test_negate_number() {
        assert_eq!(Type::INTEGER.negate_number(), Type::INTEGER);
        assert_eq!(
            Type::POSITIVE_NUMBER.negate_number(),
            Type::NEGATIVE_NUMBER
        );
        let mixed = Type::POSITIVE_ZERO
            .or(&Type::NEGATIVE_INTEGER)
            .or(&Type::POSITIVE_NON_INTEGER)
            .or(&Type::STRING);
        let negated = mixed.negate_number();
        assert_eq!(
            negated,
            Type::NEGATIVE_ZERO
                .or(&Type::POSITIVE_INTEGER)
                .or(&Type::NEGATIVE_NON_INTEGER)
                .or(&Type::STRING)
        );
        assert_eq!(negated.negate_number(), mixed);
    }

    #[test]
    fn test_named_lookup() {
        assert_eq!(Type::named("number").unwrap(), Type::NUMBER);
        assert_eq!(Type::named("truthy").unwrap(), Type::TRUTHY);
        assert!(Type::named("no-such-type").is_none());
    }
}
