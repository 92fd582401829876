//! Higher-order built-ins building new function values.
//!
//! The constructors only capture their arguments; calling the resulting functions is the
//! evaluator's job (see `Evaluator::call_function`).

use super::BuiltinOp;
use super::params::param;
use crate::evaluator::Evaluator;
use crate::types::Type;
use crate::value::{LitsFunction, Value};
use crate::{Arity, Error};

/// `(apply f args... coll)`: the last argument supplies the remaining arguments
fn apply(args: &[Value], evaluator: &Evaluator) -> Result<Value, Error> {
    let function: &Value = param(args, 0, "apply")?;
    let last = args.len() - 1;
    let mut call_args: Vec<Value> = args[1..last].to_vec();
    match &args[last] {
        Value::Nil => {}
        Value::Array(items) => call_args.extend(items.iter().cloned()),
        other => {
            return Err(Error::TypeError(format!(
                "apply expects an array as its last argument, got {other}"
            )));
        }
    }
    evaluator.call_function(function, call_args)
}

fn identity(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    param::<&Value>(args, 0, "identity").cloned()
}

fn partial(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    Ok(Value::function(LitsFunction::Partial {
        function: args[0].clone(),
        args: args[1..].to_vec(),
    }))
}

fn comp(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    Ok(Value::function(LitsFunction::Comp(args.to_vec())))
}

fn constantly(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    Ok(Value::function(LitsFunction::Constantly(args[0].clone())))
}

fn juxt(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    Ok(Value::function(LitsFunction::Juxt(args.to_vec())))
}

fn complement(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    Ok(Value::function(LitsFunction::Complement(args[0].clone())))
}

fn every_pred(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    Ok(Value::function(LitsFunction::EveryPred(args.to_vec())))
}

fn some_pred(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    Ok(Value::function(LitsFunction::SomePred(args.to_vec())))
}

fn fnil(args: &[Value], _: &Evaluator) -> Result<Value, Error> {
    Ok(Value::function(LitsFunction::Fnil {
        function: args[0].clone(),
        defaults: args[1..].to_vec(),
    }))
}

pub(super) fn ops() -> Vec<BuiltinOp> {
    vec![
        BuiltinOp::structural("apply", Arity::AtLeast(2), apply, Type::UNKNOWN),
        BuiltinOp::native("identity", Arity::Exact(1), identity),
        BuiltinOp::native("partial", Arity::AtLeast(1), partial),
        BuiltinOp::native("comp", Arity::Any, comp),
        BuiltinOp::native("constantly", Arity::Exact(1), constantly),
        BuiltinOp::native("juxt", Arity::AtLeast(1), juxt),
        BuiltinOp::native("complement", Arity::Exact(1), complement),
        BuiltinOp::native("every-pred", Arity::AtLeast(1), every_pred),
        BuiltinOp::native("some-pred", Arity::AtLeast(1), some_pred),
        BuiltinOp::native("fnil", Arity::AtLeast(2), fnil),
    ]
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::builtinops::{builtin_function, call_builtin, find_builtin_op};
    use crate::evaluator::EvaluationMode;

    fn func(name: &str) -> Value {
        builtin_function(find_builtin_op(name).unwrap())
    }

    fn call(function: &Value, args: Vec<Value>) -> Result<Value, Error> {
        Evaluator::new(EvaluationMode::Concrete).call_function(function, args)
    }

    #[test]
    fn test_apply() {
        let args = vec![func("+"), 1.into(), 2.into(), Value::from([3, 4])];
        assert_eq!(call_builtin("apply", &args).unwrap(), Value::from(10));
        assert_eq!(
            call_builtin("apply", &[func("+"), Value::Nil]).unwrap(),
            Value::from(0)
        );
        assert!(call_builtin("apply", &[func("+"), 1.into()]).is_err());
    }

    #[test]
    fn test_function_constructors() {
        let add_ten = call_builtin("partial", &[func("+"), 10.into()]).unwrap();
        assert_eq!(call(&add_ten, vec![5.into()]).unwrap(), Value::from(15));

        // Right to left: increment, then stringify
        let inc_str = call_builtin("comp", &[func("str"), func("inc")]).unwrap();
        assert_eq!(call(&inc_str, vec![1.into()]).unwrap(), Value::from("2"));
        let id = call_builtin("comp", &[]).unwrap();
        assert_eq!(call(&id, vec!["x".into()]).unwrap(), Value::from("x"));

        let always = call_builtin("constantly", &[7.into()]).unwrap();
        assert_eq!(call(&always, vec![1.into(), 2.into()]).unwrap(), Value::from(7));

        let stats = call_builtin("juxt", &[func("min"), func("max")]).unwrap();
        assert_eq!(
            call(&stats, vec![3.into(), 1.into(), 2.into()]).unwrap(),
            Value::from([1, 3])
        );

        let not_zero = call_builtin("complement", &[func("zero?")]).unwrap();
        assert_eq!(call(&not_zero, vec![0.into()]).unwrap(), Value::from(false));

        let pos_even = call_builtin("every-pred", &[func("pos?"), func("even?")]).unwrap();
        assert_eq!(call(&pos_even, vec![4.into()]).unwrap(), Value::from(true));
        assert_eq!(call(&pos_even, vec![3.into()]).unwrap(), Value::from(false));

        let zero_or_neg = call_builtin("some-pred", &[func("zero?"), func("neg?")]).unwrap();
        assert_eq!(call(&zero_or_neg, vec![(-2).into()]).unwrap(), Value::from(true));
        assert_eq!(call(&zero_or_neg, vec![2.into()]).unwrap(), Value::from(false));

        let safe_inc = call_builtin("fnil", &[func("inc"), 0.into()]).unwrap();
        assert_eq!(call(&safe_inc, vec![Value::Nil]).unwrap(), Value::from(1));
        assert_eq!(call(&safe_inc, vec![5.into()]).unwrap(), Value::from(6));
    }

    #[test]
    fn test_abstract_function_calls() {
        let add_ten = call_builtin("partial", &[func("+"), 10.into()]).unwrap();
        let typed = Evaluator::new(EvaluationMode::Type)
            .call_function(&add_ten, vec![Value::Type(Type::POSITIVE_INTEGER)])
            .unwrap();
        assert_eq!(typed, Value::Type(Type::POSITIVE_INTEGER));
        assert_eq!(
            call_builtin("apply", &[func("+"), Value::Type(Type::ARRAY)]).unwrap(),
            Value::Type(Type::UNKNOWN)
        );
    }
}
