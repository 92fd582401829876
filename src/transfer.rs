//! Dual-mode transfer functions.
//!
//! Every built-in operation that takes part in type evaluation is written once against
//! operands that are either concrete or abstract. All-concrete operands produce exactly
//! the native result. As soon as one operand is a [`Type`], the operation case-splits on
//! the atomic bits of its operands and returns the union of the per-case results.
//!
//! The two paths agree: for any concrete inputs matching the abstract inputs, the type of
//! the concrete result is a subtype of the abstract result.

pub mod collection;
pub mod numeric;

use crate::Error;
use crate::types::{Type, TypeBits};
use crate::value::Value;

pub use numeric::{BinaryOp, Comparison, NumAtom, Sign, UnaryOp};

/// Numeric operand: a native number or an abstract numeric type
#[derive(Debug, Clone, PartialEq)]
pub enum Num {
    Concrete(f64),
    Abstract(Type),
}

/// Every numeric shape, `nan` included
pub(crate) fn numeric_type() -> Type {
    Type::NUMBER.or(&Type::NAN)
}

/// The part of `t` that `what` accepts. Fails when nothing is left.
pub(crate) fn narrow(t: &Type, accepted: &Type, what: &str) -> Result<Type, Error> {
    let narrowed = t.and(accepted);
    if narrowed.is_never() {
        Err(Error::TypeError(format!(
            "{what} expects {}, got {}",
            accepted.describe(),
            t.describe()
        )))
    } else {
        Ok(narrowed)
    }
}

impl Num {
    /// Accept a number or a type, narrowing the type to its numeric part.
    /// Fails when no numeric value fits.
    pub fn from_value(value: &Value, what: &str) -> Result<Num, Error> {
        match value {
            Value::Number(n) => Ok(Num::Concrete(*n)),
            Value::Type(t) => narrow(t, &numeric_type(), what).map(Num::Abstract),
            other => Err(Error::TypeError(format!(
                "{what} expects a number, got {other}"
            ))),
        }
    }

    pub fn to_type(&self) -> Type {
        match self {
            Num::Concrete(n) => Type::of_number(*n),
            Num::Abstract(t) => t.clone(),
        }
    }

    pub fn is_abstract(&self) -> bool {
        matches!(self, Num::Abstract(_))
    }
}

impl From<Num> for Value {
    fn from(num: Num) -> Self {
        match num {
            Num::Concrete(n) => Value::Number(n),
            Num::Abstract(t) => Value::Type(t),
        }
    }
}

/// Possible results of a boolean-valued operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Outcome {
    pub can_be_true: bool,
    pub can_be_false: bool,
}

impl Outcome {
    pub const TRUE: Outcome = Outcome {
        can_be_true: true,
        can_be_false: false,
    };
    pub const FALSE: Outcome = Outcome {
        can_be_true: false,
        can_be_false: true,
    };
    pub const EITHER: Outcome = Outcome {
        can_be_true: true,
        can_be_false: true,
    };

    pub fn from_bool(b: bool) -> Outcome {
        if b { Outcome::TRUE } else { Outcome::FALSE }
    }

    pub fn union(self, other: Outcome) -> Outcome {
        Outcome {
            can_be_true: self.can_be_true || other.can_be_true,
            can_be_false: self.can_be_false || other.can_be_false,
        }
    }

    /// Disjunction: false only if both are
    pub fn or(self, other: Outcome) -> Outcome {
        Outcome {
            can_be_true: self.can_be_true || other.can_be_true,
            can_be_false: self.can_be_false && other.can_be_false,
        }
    }

    /// Conjunction: true only if both are
    pub fn and(self, other: Outcome) -> Outcome {
        Outcome {
            can_be_true: self.can_be_true && other.can_be_true,
            can_be_false: self.can_be_false || other.can_be_false,
        }
    }

    pub fn not(self) -> Outcome {
        Outcome {
            can_be_true: self.can_be_false,
            can_be_false: self.can_be_true,
        }
    }

    /// A decided outcome becomes a concrete boolean, an undecided one a type
    pub fn to_value(self) -> Value {
        match (self.can_be_true, self.can_be_false) {
            (true, false) => Value::Boolean(true),
            (false, true) => Value::Boolean(false),
            (true, true) => Value::Type(Type::BOOLEAN),
            (false, false) => Value::Type(Type::NEVER),
        }
    }
}

/// Truthiness of a value as an outcome
pub fn truthiness(value: &Value) -> Outcome {
    match value.truthiness() {
        Some(b) => Outcome::from_bool(b),
        None => Outcome::EITHER,
    }
}

/// True if any outcome may be; false only if all must be
pub fn any_of(outcomes: impl IntoIterator<Item = Outcome>) -> Outcome {
    outcomes.into_iter().fold(Outcome::FALSE, Outcome::or)
}

/// True only if every outcome must be
pub fn all_of(outcomes: impl IntoIterator<Item = Outcome>) -> Outcome {
    outcomes.into_iter().fold(Outcome::TRUE, Outcome::and)
}

/// Least upper bound of several results. Identical values stay concrete, and `never`
/// (an unreachable branch) contributes nothing.
pub fn join(values: &[Value]) -> Value {
    let reachable: Vec<&Value> = values
        .iter()
        .filter(|v| !matches!(v, Value::Type(t) if t.is_never()))
        .collect();
    match reachable.as_slice() {
        [] => Value::Type(Type::NEVER),
        [first, rest @ ..] if rest.iter().all(|v| v.is_identical(first)) => (*first).clone(),
        _ => {
            let types: Vec<Type> = reachable.iter().map(|v| Type::of(v)).collect();
            Value::Type(Type::or_all(&types))
        }
    }
}

/// Concrete values use structural equality. Abstract operands are compared by shape:
/// disjoint shapes are never equal, identical single-value shapes always are.
pub fn equal(a: &Value, b: &Value) -> Outcome {
    if !a.contains_type() && !b.contains_type() {
        return Outcome::from_bool(a == b);
    }

    let ta = merge_zeros(Type::of(a));
    let tb = merge_zeros(Type::of(b));
    let ta_comparable = ta.exclude(&Type::NAN);
    let tb_comparable = tb.exclude(&Type::NAN);

    if !ta_comparable.intersects(&tb_comparable) {
        return Outcome::FALSE;
    }
    if ta == tb && ta == ta_comparable && is_single_value(&ta) {
        return Outcome::TRUE;
    }
    Outcome::EITHER
}

/// `0` and `-0` are equal, so equality sees a single zero shape
fn merge_zeros(t: Type) -> Type {
    if t.has_any(TypeBits::POSITIVE_ZERO | TypeBits::NEGATIVE_ZERO) {
        t.exclude(&Type::ZERO).or(&Type::POSITIVE_ZERO)
    } else {
        t
    }
}

/// Shapes inhabited by exactly one value (up to equality)
fn is_single_value(t: &Type) -> bool {
    [
        Type::NIL,
        Type::TRUE,
        Type::FALSE,
        Type::POSITIVE_ZERO,
        Type::POSITIVE_INFINITY,
        Type::NEGATIVE_INFINITY,
        Type::EMPTY_STRING,
        Type::EMPTY_ARRAY,
        Type::EMPTY_OBJECT,
    ]
    .iter()
    .any(|single| single == t)
}

/// Membership test of a value in a predicate type
pub fn type_predicate(value: &Value, predicate: &Type) -> Outcome {
    let t = Type::of(value);
    if t.is(predicate) {
        Outcome::TRUE
    } else if !t.intersects(predicate) {
        Outcome::FALSE
    } else {
        Outcome::EITHER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join() {
        assert_eq!(join(&[Value::from(1), Value::from(1)]), Value::from(1));
        assert_eq!(
            join(&[Value::from(1), Value::from(-2)]),
            Value::Type(Type::POSITIVE_INTEGER.or(&Type::NEGATIVE_INTEGER))
        );
        assert_eq!(
            join(&[Value::from("a"), Value::Type(Type::NIL)]),
            Value::Type(Type::NON_EMPTY_STRING.or(&Type::NIL))
        );
        assert_eq!(join(&[]), Value::Type(Type::NEVER));
        // Signed zeros are equal but not interchangeable
        assert_eq!(
            join(&[Value::Number(0.0), Value::Number(-0.0)]),
            Value::Type(Type::ZERO)
        );
        assert_eq!(
            join(&[Value::Number(f64::NAN), Value::Number(f64::NAN)]).as_number().map(f64::is_nan),
            Some(true)
        );
        assert_eq!(
            join(&[Value::Type(Type::NEVER), Value::from(3)]),
            Value::from(3)
        );
    }

    #[test]
    fn test_equality_outcomes() {
        let test_cases = vec![
            (Value::from(1), Value::from(1), Outcome::TRUE),
            (Value::Number(0.0), Value::Number(-0.0), Outcome::TRUE),
            (Value::Type(Type::ZERO), Value::from(0), Outcome::TRUE),
            (Value::Type(Type::STRING), Value::from(1), Outcome::FALSE),
            (Value::Type(Type::NAN), Value::Type(Type::NAN), Outcome::FALSE),
            (Value::Type(Type::NIL), Value::Nil, Outcome::TRUE),
            (Value::Type(Type::INTEGER), Value::from(3), Outcome::EITHER),
            (
                Value::Type(Type::NUMBER.or(&Type::NAN)),
                Value::Type(Type::POSITIVE_INFINITY),
                Outcome::EITHER,
            ),
        ];
        for (i, (a, b, expected)) in test_cases.iter().enumerate() {
            assert_eq!(equal(a, b), *expected, "Test case {} failed", i + 1);
        }
    }

    #[test]
    fn test_type_predicate() {
        assert_eq!(
            type_predicate(&Value::Type(Type::POSITIVE_INTEGER), &Type::NUMBER),
            Outcome::TRUE
        );
        assert_eq!(
            type_predicate(&Value::Type(Type::STRING), &Type::NUMBER),
            Outcome::FALSE
        );
        assert_eq!(
            type_predicate(&Value::Type(Type::UNKNOWN), &Type::NUMBER),
            Outcome::EITHER
        );
        assert_eq!(type_predicate(&Value::Nil, &Type::NIL), Outcome::TRUE);
    }

    #[test]
    fn test_outcome_values() {
        assert_eq!(Outcome::TRUE.to_value(), Value::Boolean(true));
        assert_eq!(Outcome::EITHER.to_value(), Value::Type(Type::BOOLEAN));
        assert_eq!(Outcome::TRUE.and(Outcome::EITHER), Outcome::EITHER);
        assert_eq!(Outcome::FALSE.and(Outcome::EITHER), Outcome::FALSE);
        assert_eq!(Outcome::EITHER.not(), Outcome::EITHER);
    }
}
