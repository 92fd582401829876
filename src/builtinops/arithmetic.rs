//! Arithmetic, math functions, numeric comparison and numeric predicates.
//!
//! All of these are native: their operands go through the dual-mode transfer functions,
//! so abstract operands produce a sound result type instead of an error.

use super::BuiltinOp;
use super::params::{nums, optional_param, param};
use crate::evaluator::Evaluator;
use crate::transfer::collection::as_index;
use crate::transfer::numeric::{self, js_round};
use crate::transfer::{BinaryOp, Comparison, Num, Outcome, numeric_type};
use crate::types::{Type, TypeBits};
use crate::value::Value;
use crate::{Arity, Error};
use std::cmp::Ordering;

fn add(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    Ok(numeric::sum(&nums(args, "+")?).into())
}

fn subtract(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    Ok(numeric::difference(&nums(args, "-")?).into())
}

fn multiply(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    Ok(numeric::product(&nums(args, "*")?).into())
}

fn divide(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    Ok(numeric::quotient(&nums(args, "/")?).into())
}

fn min(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    Ok(numeric::extremum(BinaryOp::Min, &nums(args, "min")?)?.into())
}

fn max(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    Ok(numeric::extremum(BinaryOp::Max, &nums(args, "max")?)?.into())
}

fn binary(args: &[Value], name: &str, op: BinaryOp) -> Result<Value, Error> {
    let a: Num = Num::from_value(param(args, 0, name)?, name)?;
    let b: Num = Num::from_value(param(args, 1, name)?, name)?;
    Ok(op.apply(&a, &b).into())
}

fn quot(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    binary(args, "quot", BinaryOp::Quot)
}

fn modulo(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    binary(args, "mod", BinaryOp::Mod)
}

fn rem(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    binary(args, "rem", BinaryOp::Rem)
}

fn pow(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    binary(args, "pow", BinaryOp::Pow)
}

// Macro to generate the single-operand math functions
macro_rules! unary_ops {
    ($($name:literal => $fn_name:ident($op:ident)),* $(,)?) => {
        $(
            fn $fn_name(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
                let x = Num::from_value(param(args, 0, $name)?, $name)?;
                Ok(numeric::UnaryOp::$op.apply(&x).into())
            }
        )*

        fn unary_ops() -> Vec<BuiltinOp> {
            vec![$(BuiltinOp::native($name, Arity::Exact(1), $fn_name)),*]
        }
    };
}

unary_ops! {
    "inc" => inc(Inc),
    "dec" => dec(Dec),
    "abs" => abs(Abs),
    "sign" => sign(Sign),
    "floor" => floor(Floor),
    "ceil" => ceil(Ceil),
    "trunc" => trunc(Trunc),
    "sqrt" => sqrt(Sqrt),
    "cbrt" => cbrt(Cbrt),
    "exp" => exp(Exp),
    "log" => log(Log),
    "log2" => log2(Log2),
    "log10" => log10(Log10),
    "sin" => sin(Sin),
    "cos" => cos(Cos),
    "tan" => tan(Tan),
    "asin" => asin(Asin),
    "acos" => acos(Acos),
    "atan" => atan(Atan),
    "sinh" => sinh(Sinh),
    "cosh" => cosh(Cosh),
    "tanh" => tanh(Tanh),
    "asinh" => asinh(Asinh),
    "acosh" => acosh(Acosh),
    "atanh" => atanh(Atanh),
}

/// `(round x)` rounds half up; `(round x decimals)` keeps that many decimals
fn round(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    let x = Num::from_value(param(args, 0, "round")?, "round")?;
    let Some(decimals) = optional_param::<&Value>(args, 1, "round")? else {
        return Ok(numeric::UnaryOp::Round.apply(&x).into());
    };
    match (x, Num::from_value(decimals, "round")?) {
        (Num::Concrete(x), Num::Concrete(d)) => {
            let d = as_index(d).ok_or_else(|| {
                Error::TypeError(format!(
                    "round expects a non-negative integer number of decimals, got {decimals}"
                ))
            })?;
            let factor = 10f64.powi(i32::try_from(d).unwrap_or(i32::MAX));
            Ok(Value::Number(js_round(x * factor) / factor))
        }
        (x, _) => Ok(Value::Type(rounded_to_decimals(&x.to_type()))),
    }
}

/// Rounding to some decimals keeps the sign class: a finite number either survives as a
/// finite number of the same sign or collapses to the zero of its sign.
fn rounded_to_decimals(t: &Type) -> Type {
    let mut result = t.and(&Type::NAN.or(&Type::INFINITY).or(&Type::ZERO));
    if t.has_any(TypeBits::POSITIVE_INTEGER | TypeBits::POSITIVE_NON_INTEGER) {
        result = result.or(&Type::new(
            TypeBits::POSITIVE_ZERO | TypeBits::POSITIVE_INTEGER | TypeBits::POSITIVE_NON_INTEGER,
        ));
    }
    if t.has_any(TypeBits::NEGATIVE_INTEGER | TypeBits::NEGATIVE_NON_INTEGER) {
        result = result.or(&Type::new(
            TypeBits::NEGATIVE_ZERO | TypeBits::NEGATIVE_INTEGER | TypeBits::NEGATIVE_NON_INTEGER,
        ));
    }
    result
}

// Macro to generate the chained numeric comparisons
macro_rules! comparisons {
    ($($name:literal => $fn_name:ident($cmp:ident)),* $(,)?) => {
        $(
            fn $fn_name(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
                Ok(Comparison::$cmp.chain(&nums(args, $name)?).to_value())
            }
        )*

        fn comparison_ops() -> Vec<BuiltinOp> {
            vec![$(BuiltinOp::native($name, Arity::AtLeast(1), $fn_name)),*]
        }
    };
}

comparisons! {
    "<" => less(Less),
    "<=" => less_or_equal(LessOrEqual),
    ">" => greater(Greater),
    ">=" => greater_or_equal(GreaterOrEqual),
}

/// Three-way comparison of two numbers or two strings: -1, 0 or 1
fn compare(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    let ordering = match (param::<&Value>(args, 0, "compare")?, param::<&Value>(args, 1, "compare")?) {
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (a, b) => {
            return Err(Error::TypeError(format!(
                "compare expects two numbers or two strings, got {a} and {b}"
            )));
        }
    };
    Ok(Value::Number(match ordering {
        Ordering::Less => -1.0,
        Ordering::Equal => 0.0,
        Ordering::Greater => 1.0,
    }))
}

fn parity(args: &[Value], name: &str, even: bool) -> Result<Value, Error> {
    let outcome = match Num::from_value(param(args, 0, name)?, name)? {
        Num::Concrete(n) => {
            let integral = n.is_finite() && n.fract() == 0.0;
            Outcome::from_bool(integral && ((n % 2.0 == 0.0) == even))
        }
        Num::Abstract(t) if even => {
            if t.is(&Type::ZERO) {
                Outcome::TRUE
            } else if !t.intersects(&Type::INTEGER) {
                Outcome::FALSE
            } else {
                Outcome::EITHER
            }
        }
        Num::Abstract(t) => {
            if t.has_any(TypeBits::POSITIVE_INTEGER | TypeBits::NEGATIVE_INTEGER) {
                Outcome::EITHER
            } else {
                Outcome::FALSE
            }
        }
    };
    Ok(outcome.to_value())
}

fn is_even(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    parity(args, "even?", true)
}

fn is_odd(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    parity(args, "odd?", false)
}

type_predicates! {
    "number?" => is_number(numeric_type()),
    "integer?" => is_integer(Type::INTEGER),
    "zero?" => is_zero(Type::ZERO),
    "pos?" => is_positive(Type::POSITIVE_NUMBER),
    "neg?" => is_negative(Type::NEGATIVE_NUMBER),
    "finite?" => is_finite(Type::FINITE_NUMBER),
    "nan?" => is_nan(Type::NAN),
    "positive-infinity?" => is_positive_infinity(Type::POSITIVE_INFINITY),
    "negative-infinity?" => is_negative_infinity(Type::NEGATIVE_INFINITY),
}

pub(super) fn ops() -> Vec<BuiltinOp> {
    let mut ops = vec![
        BuiltinOp::native("+", Arity::Any, add),
        BuiltinOp::native("-", Arity::Any, subtract),
        BuiltinOp::native("*", Arity::Any, multiply),
        BuiltinOp::native("/", Arity::Any, divide),
        BuiltinOp::native("quot", Arity::Exact(2), quot),
        BuiltinOp::native("mod", Arity::Exact(2), modulo),
        BuiltinOp::native("rem", Arity::Exact(2), rem),
        BuiltinOp::native("pow", Arity::Exact(2), pow),
        BuiltinOp::native("min", Arity::AtLeast(1), min),
        BuiltinOp::native("max", Arity::AtLeast(1), max),
        BuiltinOp::native("round", Arity::Range(1, 2), round),
        BuiltinOp::declared(
            "compare",
            Arity::Exact(2),
            compare,
            Type::new(
                TypeBits::NEGATIVE_INTEGER | TypeBits::POSITIVE_ZERO | TypeBits::POSITIVE_INTEGER,
            ),
        ),
        BuiltinOp::native("even?", Arity::Exact(1), is_even),
        BuiltinOp::native("odd?", Arity::Exact(1), is_odd),
    ];
    ops.extend(unary_ops());
    ops.extend(comparison_ops());
    ops.extend(predicate_ops());
    ops
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::builtinops::{call_builtin, find_builtin_op};

    fn ty(t: Type) -> Value {
        Value::Type(t)
    }

    #[test]
    #[expect(clippy::too_many_lines)] // Comprehensive test coverage is intentionally thorough
    fn test_arithmetic_builtins() {
        let test_cases: Vec<(&str, Vec<Value>, Option<Value>)> = vec![
            ("+", vec![], Some(Value::from(0))),
            ("+", vec![1.into(), 2.into(), 3.into(), 4.into()], Some(Value::from(10))),
            ("-", vec![], Some(Value::from(0))),
            ("-", vec![5.into()], Some(Value::from(-5))),
            ("-", vec![10.into(), 3.into(), 2.into()], Some(Value::from(5))),
            ("*", vec![], Some(Value::from(1))),
            ("*", vec![2.into(), 3.into()], Some(Value::from(6))),
            ("/", vec![2.into()], Some(Value::from(0.5))),
            ("/", vec![1.into(), 0.into()], Some(Value::Number(f64::INFINITY))),
            ("quot", vec![7.into(), 2.into()], Some(Value::from(3))),
            ("quot", vec![(-7).into(), 2.into()], Some(Value::from(-3))),
            ("mod", vec![(-7).into(), 2.into()], Some(Value::from(1))),
            ("rem", vec![(-7).into(), 2.into()], Some(Value::from(-1))),
            ("pow", vec![2.into(), 10.into()], Some(Value::from(1024))),
            ("min", vec![3.into(), 1.into(), 2.into()], Some(Value::from(1))),
            ("max", vec![3.into(), 1.into(), 2.into()], Some(Value::from(3))),
            ("inc", vec![1.into()], Some(Value::from(2))),
            ("dec", vec![1.into()], Some(Value::from(0))),
            ("abs", vec![(-3).into()], Some(Value::from(3))),
            ("sign", vec![(-3).into()], Some(Value::from(-1))),
            ("round", vec![2.5.into()], Some(Value::from(3))),
            ("round", vec![(-2.5).into()], Some(Value::Number(-2.0))),
            ("round", vec![1.2345.into(), 2.into()], Some(Value::from(1.23))),
            ("floor", vec![1.7.into()], Some(Value::from(1))),
            ("ceil", vec![1.2.into()], Some(Value::from(2))),
            ("trunc", vec![(-1.7).into()], Some(Value::from(-1))),
            ("sqrt", vec![9.into()], Some(Value::from(3))),
            ("<", vec![1.into(), 2.into(), 3.into()], Some(Value::from(true))),
            ("<", vec![1.into(), 3.into(), 2.into()], Some(Value::from(false))),
            ("<=", vec![1.into(), 1.into()], Some(Value::from(true))),
            (">", vec![1.into()], Some(Value::from(true))),
            (">=", vec![Value::Number(f64::NAN), 1.into()], Some(Value::from(false))),
            ("compare", vec![1.into(), 2.into()], Some(Value::from(-1))),
            ("compare", vec!["b".into(), "a".into()], Some(Value::from(1))),
            ("even?", vec![0.into()], Some(Value::from(true))),
            ("even?", vec![3.into()], Some(Value::from(false))),
            ("odd?", vec![(-3).into()], Some(Value::from(true))),
            ("odd?", vec![1.5.into()], Some(Value::from(false))),
            ("number?", vec![Value::Number(f64::NAN)], Some(Value::from(true))),
            ("number?", vec!["1".into()], Some(Value::from(false))),
            ("integer?", vec![(-0.0).into()], Some(Value::from(true))),
            ("zero?", vec![(-0.0).into()], Some(Value::from(true))),
            ("pos?", vec![0.into()], Some(Value::from(false))),
            ("neg?", vec![Value::Number(f64::NEG_INFINITY)], Some(Value::from(true))),
            ("finite?", vec![Value::Number(f64::INFINITY)], Some(Value::from(false))),
            // Errors
            ("+", vec![1.into(), "a".into()], None),
            ("inc", vec![Value::Nil], None),
            ("round", vec![1.into(), (-1).into()], None),
            ("compare", vec![1.into(), "a".into()], None),
            ("min", vec!["a".into()], None),
        ];

        for (i, (name, args, expected)) in test_cases.into_iter().enumerate() {
            let result = call_builtin(name, &args);
            match expected {
                Some(expected) => assert_eq!(
                    result.unwrap(),
                    expected,
                    "Test case {} failed: ({name} {args:?})",
                    i + 1
                ),
                None => assert!(
                    result.is_err(),
                    "Test case {} failed: ({name} {args:?}) should error",
                    i + 1
                ),
            }
        }
    }

    #[test]
    fn test_abstract_arithmetic_builtins() {
        let positive_int = ty(Type::POSITIVE_INTEGER);
        let test_cases: Vec<(&str, Vec<Value>, Value)> = vec![
            ("+", vec![positive_int.clone(), 1.into()], ty(Type::POSITIVE_INTEGER)),
            ("inc", vec![ty(Type::POSITIVE_ZERO)], ty(Type::POSITIVE_INTEGER)),
            ("<", vec![positive_int.clone(), 0.into()], Value::from(false)),
            ("<", vec![positive_int.clone(), 5.into()], ty(Type::BOOLEAN)),
            ("zero?", vec![positive_int.clone()], Value::from(false)),
            ("integer?", vec![positive_int.clone()], Value::from(true)),
            ("even?", vec![ty(Type::ZERO)], Value::from(true)),
            ("even?", vec![positive_int.clone()], ty(Type::BOOLEAN)),
            ("odd?", vec![ty(Type::NON_INTEGER)], Value::from(false)),
            ("number?", vec![ty(Type::UNKNOWN)], ty(Type::BOOLEAN)),
            ("compare", vec![positive_int.clone(), 1.into()], {
                let op = find_builtin_op("compare").unwrap();
                ty(op.returns.clone())
            }),
        ];

        for (i, (name, args, expected)) in test_cases.into_iter().enumerate() {
            let result = call_builtin(name, &args).unwrap();
            assert_eq!(result, expected, "Test case {} failed: ({name} {args:?})", i + 1);
        }

        // A string type has no numeric part left
        assert!(call_builtin("+", &[ty(Type::STRING), 1.into()]).is_err());

        // Rounding to decimals keeps sign classes
        let rounded = call_builtin("round", &[ty(Type::POSITIVE_NON_INTEGER), 2.into()]).unwrap();
        let Value::Type(t) = rounded else {
            panic!("expected a type")
        };
        assert!(Type::POSITIVE_ZERO.is(&t));
        assert!(!t.intersects(&Type::NEGATIVE_NUMBER));
    }
}
