//! Built-in function registry.
//!
//! Every built-in is registered once, with its name, arity and the way it takes part in
//! type evaluation:
//!
//! ```text
//! (+ x 1)          ; native:      computes the result type from the operand types
//! (rest x)         ; structural:  an abstract argument yields the declared result type,
//!                  ;              abstract elements inside concrete arguments are fine
//! (str "a" x)      ; declared:    any abstract value, however deep, yields the
//!                  ;              declared result type
//! ```
//!
//! Special forms control the evaluation of their operands and are handled by the
//! evaluator, not by this registry.
//!
//! ## Adding New Operations
//!
//! 1. Implement the function with the signature `fn(&[Value], &Evaluator) -> Result<Value, Error>`
//!    in the submodule of its family
//! 2. Add a `BuiltinOp` entry to that submodule's `ops()`
//! 3. If it does not handle abstract operands itself, register it as `structural` or
//!    `declared` with a sound result type

/// Declares predicates answering membership in a type, registered as native built-ins
/// by the generated `predicate_ops()`
macro_rules! type_predicates {
    ($($name:literal => $fn_name:ident($predicate:expr)),* $(,)?) => {
        $(
            fn $fn_name(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
                let value: &Value = param(args, 0, $name)?;
                Ok(crate::transfer::type_predicate(value, &$predicate).to_value())
            }
        )*

        fn predicate_ops() -> Vec<BuiltinOp> {
            vec![$(BuiltinOp::native($name, Arity::Exact(1), $fn_name)),*]
        }
    };
}

mod arithmetic;
mod collection;
mod functional;
mod misc;
pub(crate) mod params;
mod sequence;
mod string;

use crate::evaluator::Evaluator;
use crate::types::Type;
use crate::value::{LitsFunction, Value};
use crate::{Arity, Error};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::LazyLock;

/// Canonical built-in function signature. Arguments are already evaluated and the
/// arity has been validated.
pub type BuiltinFn = fn(&[Value], &Evaluator) -> Result<Value, Error>;

/// How a built-in treats abstract arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeMode {
    /// Handles concrete and abstract operands itself
    Native,
    /// A top-level abstract argument yields the declared result type
    Structural,
    /// Any abstract value among the arguments yields the declared result type
    Declared,
}

/// Definition of a built-in operation
pub struct BuiltinOp {
    pub name: &'static str,
    pub arity: Arity,
    pub op: BuiltinFn,
    /// Result type used when the operation is not run on abstract arguments
    pub returns: Type,
    pub mode: TypeMode,
}

impl BuiltinOp {
    pub(crate) fn native(name: &'static str, arity: Arity, op: BuiltinFn) -> Self {
        BuiltinOp {
            name,
            arity,
            op,
            returns: Type::UNKNOWN,
            mode: TypeMode::Native,
        }
    }

    pub(crate) fn structural(name: &'static str, arity: Arity, op: BuiltinFn, returns: Type) -> Self {
        BuiltinOp {
            name,
            arity,
            op,
            returns,
            mode: TypeMode::Structural,
        }
    }

    pub(crate) fn declared(name: &'static str, arity: Arity, op: BuiltinFn, returns: Type) -> Self {
        BuiltinOp {
            name,
            arity,
            op,
            returns,
            mode: TypeMode::Declared,
        }
    }

    /// Whether `args` must be answered by the declared result type instead of running
    pub(crate) fn answers_declared(&self, args: &[Value]) -> bool {
        match self.mode {
            TypeMode::Native => false,
            TypeMode::Structural => args.iter().any(|arg| matches!(arg, Value::Type(_))),
            TypeMode::Declared => args.iter().any(Value::contains_type),
        }
    }

    pub(crate) fn validate_arity(&self, arg_count: usize) -> Result<(), Error> {
        self.arity
            .validate(arg_count)
            .map_err(|_| Error::arity_error_with_expr(self.arity, arg_count, self.name.to_owned()))
    }
}

impl PartialEq for BuiltinOp {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Debug for BuiltinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltinOp")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

/// Global registry of all built-in operations, grouped by family
static BUILTIN_OPS: LazyLock<Vec<BuiltinOp>> = LazyLock::new(|| {
    let mut ops = Vec::new();
    ops.extend(arithmetic::ops());
    ops.extend(collection::ops());
    ops.extend(sequence::ops());
    ops.extend(string::ops());
    ops.extend(functional::ops());
    ops.extend(misc::ops());
    ops
});

/// Lazy static map from name to BuiltinOp (private - use find_builtin_op)
static BUILTIN_BY_NAME: LazyLock<HashMap<&'static str, &'static BuiltinOp>> = LazyLock::new(|| {
    let ops: &'static [BuiltinOp] = BUILTIN_OPS.as_slice();
    ops.iter().map(|op| (op.name, op)).collect()
});

/// All builtin operations, in registration order
pub fn get_builtin_ops() -> &'static [BuiltinOp] {
    BUILTIN_OPS.as_slice()
}

pub fn find_builtin_op(name: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_BY_NAME.get(name).copied()
}

pub fn is_builtin_name(name: &str) -> bool {
    BUILTIN_BY_NAME.contains_key(name)
}

/// The builtin as a first-class function value
pub(crate) fn builtin_function(op: &'static BuiltinOp) -> Value {
    Value::Function(Rc::new(LitsFunction::Builtin(op)))
}

/// Invoke a builtin by name with a concrete-mode evaluator
#[cfg(test)]
pub(crate) fn call_builtin(name: &str, args: &[Value]) -> Result<Value, Error> {
    let op = find_builtin_op(name).ok_or_else(|| Error::UndefinedSymbol(name.to_owned()))?;
    crate::evaluator::Evaluator::new(crate::evaluator::EvaluationMode::Concrete)
        .call_builtin(op, args.to_vec())
}
