//! Evaluation of the special expressions.
//!
//! Each form decides which of its operands run. Forms that branch go through
//! [`Evaluator::select`], so in type mode an undecided test takes every branch and joins
//! the results.

use super::{Evaluator, Unwind, join_outcomes};
use crate::Error;
use crate::ast::{
    Binding, CondClause, Conditional, FunctionDefinition, LoopBinding, Node, ReservedName,
    SpecialExpression,
};
use crate::builtinops::is_builtin_name;
use crate::context::{Context, ContextStack};
use crate::transfer::join;
use crate::types::Type;
use crate::value::{LitsFunction, Value};
use log::info;
use std::rc::Rc;
use std::time::Instant;

/// How iterating one `for`/`doseq` level ended
enum Flow {
    Continue,
    /// A binding collection was empty; the whole comprehension stops
    Abort,
    /// A collection or condition was abstract
    Abstract,
}

impl Evaluator {
    pub(super) fn evaluate_special(
        &self,
        special: &SpecialExpression,
        stack: &ContextStack,
    ) -> Result<Value, Unwind> {
        match special {
            SpecialExpression::And(operands) => self.evaluate_logical(operands, stack, true),
            SpecialExpression::Or(operands) => self.evaluate_logical(operands, stack, false),
            SpecialExpression::Coalesce { value, default } => {
                self.evaluate_coalesce(value, default.as_ref(), stack)
            }
            SpecialExpression::Cond(clauses) => self.evaluate_cond(clauses, stack),
            SpecialExpression::If(conditional) => self.evaluate_if(conditional, stack, false),
            SpecialExpression::IfNot(conditional) => self.evaluate_if(conditional, stack, true),
            SpecialExpression::IfLet {
                binding,
                then,
                otherwise,
            } => {
                let value = self.evaluate(&binding.value, stack)?;
                self.select(
                    &value,
                    || self.evaluate(then, &bind_truthy(stack, binding, &value)),
                    || self.evaluate_optional(otherwise.as_ref(), stack),
                )
            }
            SpecialExpression::When { test, body } => {
                let test = self.evaluate(test, stack)?;
                self.select(&test, || self.evaluate_body(body, stack), || Ok(Value::Nil))
            }
            SpecialExpression::WhenNot { test, body } => {
                let test = self.evaluate(test, stack)?;
                self.select(&test, || Ok(Value::Nil), || self.evaluate_body(body, stack))
            }
            SpecialExpression::WhenLet { binding, body } => {
                let value = self.evaluate(&binding.value, stack)?;
                self.select(
                    &value,
                    || self.evaluate_body(body, &bind_truthy(stack, binding, &value)),
                    || Ok(Value::Nil),
                )
            }
            SpecialExpression::WhenFirst { binding, body } => {
                self.evaluate_when_first(binding, body, stack)
            }
            SpecialExpression::Let { bindings, body } => {
                let stack = self.bind_sequentially(bindings, stack)?;
                self.evaluate_body(body, &stack)
            }
            SpecialExpression::Loop { bindings, body } => self.evaluate_loop(bindings, body, stack),
            SpecialExpression::Recur(params) => {
                let args = params
                    .iter()
                    .map(|param| self.evaluate(param, stack))
                    .collect::<Result<Vec<_>, _>>()?;
                if self.is_type_mode() {
                    Ok(self.record_recur(args)?)
                } else {
                    Err(Unwind::Recur(args))
                }
            }
            SpecialExpression::Do(body) => self.evaluate_body(body, &stack.with_context(Context::new())),
            SpecialExpression::Def { name, value } => {
                let value = self.evaluate(value, stack)?;
                stack.define_global(name.clone(), value.clone());
                Ok(value)
            }
            SpecialExpression::Defn(definition) => {
                let name = definition
                    .name
                    .clone()
                    .ok_or_else(|| Error::EvalError("defn requires a name".to_owned()))?;
                let function = closure(definition, stack);
                stack.define_global(name, function.clone());
                Ok(function)
            }
            SpecialExpression::Fn(definition) => Ok(closure(definition, stack)),
            SpecialExpression::For { bindings, body } => {
                let mut results = Vec::new();
                match self.iterate(bindings, stack, body, Some(&mut results))? {
                    Flow::Abstract => Ok(Value::Type(Type::ARRAY)),
                    Flow::Continue | Flow::Abort => Ok(Value::array(results)),
                }
            }
            SpecialExpression::Doseq { bindings, body } => {
                self.iterate(bindings, stack, body, None)?;
                Ok(Value::Nil)
            }
            SpecialExpression::Throw(message) => {
                let message = self.evaluate(message, stack)?;
                Err(Unwind::Error(Error::UserError(message.to_plain_string())))
            }
            SpecialExpression::Try {
                body,
                error_name,
                handler,
            } => self.evaluate_try(body, error_name.as_deref(), handler, stack),
            SpecialExpression::Time(body) => {
                let start = Instant::now();
                let value = self.evaluate(body, stack)?;
                if !self.is_type_mode() {
                    info!(target: "lits::time", "Elapsed time: {} ms", start.elapsed().as_millis());
                }
                Ok(value)
            }
            SpecialExpression::Declared(name) => Ok(Value::Boolean(
                stack.is_bound(name)
                    || is_builtin_name(name)
                    || ReservedName::from_name(name).is_some(),
            )),
        }
    }

    fn evaluate_optional(&self, node: Option<&Node>, stack: &ContextStack) -> Result<Value, Unwind> {
        node.map_or(Ok(Value::Nil), |node| self.evaluate(node, stack))
    }

    /// `and` (`is_and`) or `or`. An operand that decides the result ends evaluation; an
    /// undecided one contributes its deciding part and evaluation continues.
    fn evaluate_logical(&self, operands: &[Node], stack: &ContextStack, is_and: bool) -> Result<Value, Unwind> {
        let Some((last, init)) = operands.split_last() else {
            return Ok(Value::Boolean(is_and));
        };
        let deciding = if is_and { Type::FALSY } else { Type::TRUTHY };
        let mut contributions = Vec::new();
        let mut _undecided = Vec::new();
        let finish = |contributions: &mut Vec<Value>, next: Result<Value, Unwind>| match next {
            Ok(value) => {
                contributions.push(value);
                Ok(join(contributions))
            }
            // A later failure only removes the paths that reached it
            Err(_) if !contributions.is_empty() => Ok(join(contributions)),
            Err(err) => Err(err),
        };

        for operand in init {
            let value = match self.evaluate(operand, stack) {
                Ok(value) => value,
                err => return finish(&mut contributions, err),
            };
            match value.truthiness() {
                Some(truthy) if truthy != is_and => return finish(&mut contributions, Ok(value)),
                Some(_) => {}
                None => {
                    if let Value::Type(t) = &value {
                        contributions.push(Value::Type(t.and(&deciding)));
                    }
                    _undecided.push(self.undecided_branch());
                }
            }
        }
        let last = self.evaluate(last, stack);
        finish(&mut contributions, last)
    }

    /// `(?? value default)`: the default replaces nil
    fn evaluate_coalesce(&self, value: &Node, default: Option<&Node>, stack: &ContextStack) -> Result<Value, Unwind> {
        let value = self.evaluate(value, stack)?;
        match &value {
            Value::Nil => self.evaluate_optional(default, stack),
            Value::Type(t) if t.is(&Type::NIL) => self.evaluate_optional(default, stack),
            Value::Type(t) if t.intersects(&Type::NIL) => {
                let present = Value::Type(t.exclude(&Type::NIL));
                let _undecided = self.undecided_branch();
                join_outcomes(vec![Ok(present), self.evaluate_optional(default, stack)])
            }
            _ => Ok(value),
        }
    }

    fn evaluate_cond(&self, clauses: &[CondClause], stack: &ContextStack) -> Result<Value, Unwind> {
        let Some((clause, rest)) = clauses.split_first() else {
            return Ok(Value::Nil);
        };
        let test = self.evaluate(&clause.test, stack)?;
        self.select(
            &test,
            || self.evaluate(&clause.form, stack),
            || self.evaluate_cond(rest, stack),
        )
    }

    fn evaluate_if(&self, conditional: &Conditional, stack: &ContextStack, negate: bool) -> Result<Value, Unwind> {
        let test = self.evaluate(&conditional.test, stack)?;
        let then = || self.evaluate(&conditional.then, stack);
        let otherwise = || self.evaluate_optional(conditional.otherwise.as_ref(), stack);
        if negate {
            self.select(&test, otherwise, then)
        } else {
            self.select(&test, then, otherwise)
        }
    }

    fn evaluate_when_first(&self, binding: &Binding, body: &[Node], stack: &ContextStack) -> Result<Value, Unwind> {
        let coll = self.evaluate(&binding.value, stack)?;
        let first = match comprehension_elements(&coll)? {
            Some(items) => match items.into_iter().next() {
                Some(first) => first,
                None => return Ok(Value::Nil),
            },
            None => abstract_element(&coll),
        };
        let bound = |first: Value| {
            let mut context = Context::new();
            context.define(binding.name.clone(), first);
            stack.with_context(context)
        };
        match &coll {
            Value::Type(t) if !t.is(&Type::NON_EMPTY_COLLECTION) => {
                let _undecided = self.undecided_branch();
                join_outcomes(vec![self.evaluate_body(body, &bound(first)), Ok(Value::Nil)])
            }
            _ => self.evaluate_body(body, &bound(first)),
        }
    }

    /// `let` bindings see the ones before them
    fn bind_sequentially(&self, bindings: &[Binding], stack: &ContextStack) -> Result<ContextStack, Unwind> {
        let mut context = Context::new();
        for binding in bindings {
            let value = self.evaluate(&binding.value, &stack.with_context(context.clone()))?;
            context.define(binding.name.clone(), value);
        }
        Ok(stack.with_context(context))
    }

    fn evaluate_loop(&self, bindings: &[Binding], body: &[Node], stack: &ContextStack) -> Result<Value, Unwind> {
        let mut context = Context::new();
        let mut initial = Vec::with_capacity(bindings.len());
        for binding in bindings {
            let value = self.evaluate(&binding.value, &stack.with_context(context.clone()))?;
            context.define(binding.name.clone(), value.clone());
            initial.push(value);
        }
        let bind = |args: Vec<Value>| -> Result<ContextStack, Error> {
            if args.len() != bindings.len() {
                return Err(Error::arity_error_with_expr(
                    crate::Arity::Exact(bindings.len()),
                    args.len(),
                    "recur".to_owned(),
                ));
            }
            let context: Context = bindings
                .iter()
                .map(|binding| binding.name.clone())
                .zip(args)
                .collect();
            Ok(stack.with_context(context))
        };
        Ok(self.solve(initial, &bind, body)?)
    }

    /// Run the levels of a `for`/`doseq`, pushing body values to `results` when collecting
    fn iterate(
        &self,
        levels: &[LoopBinding],
        stack: &ContextStack,
        body: &Node,
        mut results: Option<&mut Vec<Value>>,
    ) -> Result<Flow, Unwind> {
        let Some((level, inner)) = levels.split_first() else {
            let value = self.evaluate(body, stack)?;
            if let Some(results) = results {
                results.push(value);
            }
            return Ok(Flow::Continue);
        };

        let coll = self.evaluate(&level.binding.value, stack)?;
        let Some(items) = comprehension_elements(&coll)? else {
            return Ok(Flow::Abstract);
        };
        if items.is_empty() {
            return Ok(Flow::Abort);
        }

        for item in items {
            let mut context = Context::new();
            context.define(level.binding.name.clone(), item);
            let mut scope = stack.with_context(context);
            for binding in &level.lets {
                let value = self.evaluate(&binding.value, &scope)?;
                let mut context = Context::new();
                context.define(binding.name.clone(), value);
                scope = scope.with_context(context);
            }
            if let Some(condition) = &level.while_ {
                match self.evaluate(condition, &scope)?.truthiness() {
                    Some(true) => {}
                    Some(false) => break,
                    None => return Ok(Flow::Abstract),
                }
            }
            if let Some(condition) = &level.when {
                match self.evaluate(condition, &scope)?.truthiness() {
                    Some(true) => {}
                    Some(false) => continue,
                    None => return Ok(Flow::Abstract),
                }
            }
            match self.iterate(inner, &scope, body, results.as_deref_mut())? {
                Flow::Continue => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Continue)
    }

    fn evaluate_try(
        &self,
        body: &Node,
        error_name: Option<&str>,
        handler: &Node,
        stack: &ContextStack,
    ) -> Result<Value, Unwind> {
        let handle = |message: Value| {
            let mut context = Context::new();
            if let Some(name) = error_name {
                context.define(name, Value::object([("message", message)]));
            }
            self.evaluate(handler, &stack.with_context(context))
        };
        match self.evaluate(body, stack) {
            Ok(value) if self.is_type_mode() => {
                let _undecided = self.undecided_branch();
                join_outcomes(vec![Ok(value), handle(Value::Type(Type::STRING))])
            }
            Ok(value) => Ok(value),
            Err(Unwind::Error(err)) if *err.root() != Error::RecurOutsideTail => {
                if self.is_type_mode() {
                    handle(Value::Type(Type::STRING))
                } else {
                    handle(Value::String(err.root().to_string()))
                }
            }
            Err(unwind) => Err(unwind),
        }
    }
}

fn closure(definition: &Rc<FunctionDefinition>, stack: &ContextStack) -> Value {
    Value::function(LitsFunction::UserDefined {
        definition: Rc::clone(definition),
        captured: stack.clone(),
    })
}

/// Bind the value of an `if-let`/`when-let` on its truthy path
fn bind_truthy(stack: &ContextStack, binding: &Binding, value: &Value) -> ContextStack {
    let value = match value {
        Value::Type(t) => Value::Type(t.and(&Type::TRUTHY)),
        other => other.clone(),
    };
    let mut context = Context::new();
    context.define(binding.name.clone(), value);
    stack.with_context(context)
}

/// What a comprehension iterates: characters of a string, array items, `[key value]`
/// entries of an object, nothing for nil. `None` for an abstract collection.
fn comprehension_elements(coll: &Value) -> Result<Option<Vec<Value>>, Error> {
    match coll {
        Value::Nil => Ok(Some(Vec::new())),
        Value::String(s) => Ok(Some(s.chars().map(|c| Value::String(c.to_string())).collect())),
        Value::Array(items) => Ok(Some(items.iter().cloned().collect())),
        Value::Object(entries) => Ok(Some(
            entries
                .iter()
                .map(|(key, value)| Value::array([Value::from(key.as_str()), value.clone()]))
                .collect(),
        )),
        Value::Type(t) if t.intersects(&Type::COLLECTION.or(&Type::NIL)) => Ok(None),
        other => Err(Error::TypeError(format!("expected a collection, got {other}"))),
    }
}

/// An element of an abstract collection
fn abstract_element(coll: &Value) -> Value {
    match coll {
        Value::Type(t) if t.is(&Type::STRING.or(&Type::NIL)) => Value::Type(Type::NON_EMPTY_STRING),
        _ => Value::Type(Type::UNKNOWN),
    }
}

#[cfg(all(test, feature = "reader"))]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use crate::evaluator::{Params, get_data_type};
    use crate::parser::parse;
    use crate::types::Type;
    use crate::value::Value;

    fn type_of(source: &str, bindings: &[(&str, Type)]) -> Type {
        let params = Params {
            globals: bindings
                .iter()
                .map(|(name, t)| (*name, Value::Type(t.clone())))
                .collect(),
            ..Params::default()
        };
        get_data_type(&parse(source).unwrap(), &params).unwrap()
    }

    #[test]
    fn test_abstract_special_forms() {
        let string_or_nil = Type::STRING.or(&Type::NIL);
        let test_cases: Vec<(&str, Vec<(&str, Type)>, Type)> = vec![
            ("(and)", vec![], Type::TRUE),
            ("(or)", vec![], Type::FALSE),
            ("(and x 1)", vec![("x", Type::BOOLEAN)], Type::FALSE.or(&Type::POSITIVE_INTEGER)),
            ("(or x 1)", vec![("x", Type::BOOLEAN)], Type::TRUE.or(&Type::POSITIVE_INTEGER)),
            ("(?? x \"\")", vec![("x", string_or_nil.clone())], Type::STRING),
            ("(?? x)", vec![("x", Type::NIL)], Type::NIL),
            ("(cond x 1 :else \"a\")", vec![("x", Type::BOOLEAN)], Type::POSITIVE_INTEGER.or(&Type::NON_EMPTY_STRING)),
            ("(if-let [s x] s 0)", vec![("x", string_or_nil.clone())], Type::NON_EMPTY_STRING.or(&Type::POSITIVE_ZERO)),
            ("(when-let [s x] (count s))", vec![("x", string_or_nil.clone())], Type::POSITIVE_INTEGER.or(&Type::NIL)),
            ("(when x 1)", vec![("x", Type::TRUE)], Type::POSITIVE_INTEGER),
            ("(when-not x 1)", vec![("x", Type::TRUE)], Type::NIL),
            ("(for [c x] 1)", vec![("x", Type::ARRAY)], Type::ARRAY),
            ("(doseq [c x] 1)", vec![("x", Type::ARRAY)], Type::NIL),
            ("(for [c [1 2]] (inc c))", vec![], Type::NON_EMPTY_ARRAY),
            ("(try (throw x) (catch e (:message e)))", vec![("x", Type::STRING)], Type::STRING),
            ("(try 1 (catch e 2))", vec![], Type::POSITIVE_INTEGER),
            ("(let [y (inc x)] (+ y 1))", vec![("x", Type::POSITIVE_INTEGER)], Type::POSITIVE_INTEGER),
            ("(let [y (inc x)] (+ y y))", vec![("x", Type::POSITIVE_INTEGER)], Type::POSITIVE_INTEGER.or(&Type::POSITIVE_INFINITY)),
        ];

        for (i, (source, bindings, expected)) in test_cases.into_iter().enumerate() {
            let actual = type_of(source, &bindings);
            assert_eq!(actual, expected, "Test case {} failed: {source}", i + 1);
        }
    }

    #[test]
    fn test_abstract_recursion_is_bounded() {
        let result = type_of(
            "(do (defn walk [n] (if (> n 0) (walk (dec n)) :done)) (walk x))",
            &[("x", Type::INTEGER)],
        );
        assert!(Type::NON_EMPTY_STRING.is(&result), "{result}");

        let result = type_of(
            "(loop [acc [] i x] (if (> i 0) (recur (push acc i) (dec i)) acc))",
            &[("x", Type::INTEGER)],
        );
        assert_eq!(result, Type::ARRAY);
    }
}
