//! The evaluation engine.
//!
//! One [`Evaluator`] walks the AST in either of two modes. In [`EvaluationMode::Concrete`]
//! it computes the value of a program. In [`EvaluationMode::Type`] the context holds
//! [`Type`]s and every operation computes a sound over-approximation of its result:
//!
//! - a test whose truthiness is undecided evaluates both branches and joins them, a
//!   branch that raises contributes nothing unless every branch raises
//! - `loop` and function bodies that `recur` are solved by widening the binding types
//!   until they stop changing
//! - a user function re-entered with abstract arguments answers `unknown`
//!
//! `recur` travels as [`Unwind::Recur`] in concrete mode and is caught by the innermost
//! `loop` or function call, which rebinds and restarts without growing the native stack.
//! It is never visible to `try`.

mod special_forms;

use crate::ast::{Ast, FunctionDefinition, FunctionOverload, Node, NodeKind, NormalExpression, Operator};
use crate::builtinops::{BuiltinOp, builtin_function, find_builtin_op};
use crate::context::{Context, ContextStack};
use crate::transfer::{Outcome, all_of, any_of, collection, join, truthiness};
use crate::types::Type;
use crate::value::{LitsFunction, Value};
use crate::{Arity, Error, MAX_CALL_DEPTH, MAX_FIXPOINT_ITERATIONS};
use log::{debug, trace};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Host-supplied bindings for one evaluation
#[derive(Debug, Clone, Default)]
pub struct Params {
    /// Bindings visible to the whole program, just inside the global context
    pub globals: Context,
    /// Additional scopes, innermost first
    pub contexts: Vec<Context>,
    /// Shared global context written by `def`/`defn`. A fresh one is used when absent.
    pub global_context: Option<Rc<RefCell<Context>>>,
}

impl Params {
    pub(crate) fn stack(&self) -> ContextStack {
        let global = self
            .global_context
            .clone()
            .unwrap_or_else(|| Rc::new(RefCell::new(Context::new())));
        self.contexts.iter().rev().fold(
            ContextStack::new(global).with_context(self.globals.clone()),
            |stack, context| stack.with_context(context.clone()),
        )
    }

    /// The same bindings with every value replaced by its type. The global context is
    /// copied, so type evaluation never writes to the host's context.
    fn to_types(&self) -> Params {
        let to_type = |value: &Value| Value::Type(Type::of(value));
        Params {
            globals: self.globals.map_values(to_type),
            contexts: self
                .contexts
                .iter()
                .map(|context| context.map_values(to_type))
                .collect(),
            global_context: self
                .global_context
                .as_ref()
                .map(|global| Rc::new(RefCell::new(global.borrow().map_values(to_type)))),
        }
    }
}

/// Run a program and return the value of its last top-level form
pub fn run(ast: &Ast, params: &Params) -> Result<Value, Error> {
    debug!("run: {} top-level forms", ast.body.len());
    Evaluator::new(EvaluationMode::Concrete).evaluate_ast(ast, &params.stack())
}

/// Compute the type of every value the program may produce for inputs of the types
/// of `params`
pub fn get_data_type(ast: &Ast, params: &Params) -> Result<Type, Error> {
    debug!("get_data_type: {} top-level forms", ast.body.len());
    let params = params.to_types();
    let value = Evaluator::new(EvaluationMode::Type).evaluate_ast(ast, &params.stack())?;
    Ok(Type::of(&value))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationMode {
    Concrete,
    Type,
}

/// Non-local exits of [`Evaluator::evaluate`]
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Unwind {
    Error(Error),
    /// New arguments for the innermost `loop` or function frame
    Recur(Vec<Value>),
}

impl From<Error> for Unwind {
    fn from(err: Error) -> Self {
        Unwind::Error(err)
    }
}

impl Unwind {
    /// A recur signal that escaped every frame is an error
    pub(crate) fn into_error(self) -> Error {
        match self {
            Unwind::Error(err) => err,
            Unwind::Recur(_) => Error::RecurOutsideTail,
        }
    }
}

/// Remaining native stack below which evaluation moves to a fresh segment
const STACK_RED_ZONE: usize = 128 * 1024;
/// Size of each extra stack segment
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

/// Decrements a counter when dropped
struct CounterGuard<'a>(&'a Cell<usize>);

impl Drop for CounterGuard<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get().saturating_sub(1));
    }
}

/// Pops the innermost active function when dropped
struct ActiveGuard<'a>(&'a RefCell<Vec<ActiveCall>>);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.borrow_mut().pop();
    }
}

/// A user function being evaluated, with the undecided-branch depth at its entry
#[derive(Debug, Clone, Copy)]
struct ActiveCall {
    function: *const LitsFunction,
    undecided: usize,
}

pub struct Evaluator {
    mode: EvaluationMode,
    depth: Cell<usize>,
    /// Number of enclosing branches taken on an undecided test
    undecided: Cell<usize>,
    active: RefCell<Vec<ActiveCall>>,
    /// Type mode: the `recur` arguments seen by each enclosing `loop`/function frame
    recur_frames: RefCell<Vec<Vec<Vec<Value>>>>,
}

impl Evaluator {
    pub fn new(mode: EvaluationMode) -> Self {
        Evaluator {
            mode,
            depth: Cell::new(0),
            undecided: Cell::new(0),
            active: RefCell::new(Vec::new()),
            recur_frames: RefCell::new(Vec::new()),
        }
    }

    pub fn mode(&self) -> EvaluationMode {
        self.mode
    }

    pub fn is_type_mode(&self) -> bool {
        self.mode == EvaluationMode::Type
    }

    fn enter_call(&self) -> Result<CounterGuard<'_>, Error> {
        let depth = self.depth.get();
        if depth >= MAX_CALL_DEPTH {
            return Err(Error::EvalError(format!(
                "Call depth limit exceeded (max: {MAX_CALL_DEPTH})"
            )));
        }
        self.depth.set(depth + 1);
        Ok(CounterGuard(&self.depth))
    }

    /// Marks evaluation inside a branch whose test is undecided
    fn undecided_branch(&self) -> CounterGuard<'_> {
        self.undecided.set(self.undecided.get() + 1);
        CounterGuard(&self.undecided)
    }

    /// Evaluate every top-level form in order, returning the last value
    pub fn evaluate_ast(&self, ast: &Ast, stack: &ContextStack) -> Result<Value, Error> {
        self.evaluate_body(&ast.body, stack)
            .map_err(Unwind::into_error)
    }

    pub(crate) fn evaluate(&self, node: &Node, stack: &ContextStack) -> Result<Value, Unwind> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.evaluate_node(node, stack))
    }

    fn evaluate_node(&self, node: &Node, stack: &ContextStack) -> Result<Value, Unwind> {
        let result = match &node.kind {
            NodeKind::Number(n) => Ok(Value::Number(*n)),
            NodeKind::String(s) => Ok(Value::String(s.clone())),
            NodeKind::ReservedName(reserved) => Ok(reserved.value()),
            NodeKind::Name(name) => self.lookup(name, stack).map_err(Unwind::from),
            NodeKind::Modifier(modifier) => Err(Unwind::from(Error::EvalError(format!(
                "{} is only allowed in binding vectors",
                modifier.name()
            )))),
            NodeKind::NormalExpression(expression) => self.evaluate_call(expression, stack),
            NodeKind::SpecialExpression(special) => self.evaluate_special(special, stack),
        };
        result.map_err(|unwind| match unwind {
            Unwind::Error(err) => Unwind::Error(err.at(node.location.as_ref())),
            recur => recur,
        })
    }

    /// Evaluate forms in order; the empty body is nil
    pub(crate) fn evaluate_body(&self, body: &[Node], stack: &ContextStack) -> Result<Value, Unwind> {
        let mut result = Value::Nil;
        for node in body {
            result = self.evaluate(node, stack)?;
        }
        Ok(result)
    }

    fn lookup(&self, name: &str, stack: &ContextStack) -> Result<Value, Error> {
        if let Some(value) = stack.lookup(name) {
            return Ok(value);
        }
        find_builtin_op(name)
            .map(builtin_function)
            .ok_or_else(|| Error::UndefinedSymbol(name.to_owned()))
    }

    fn evaluate_call(&self, expression: &NormalExpression, stack: &ContextStack) -> Result<Value, Unwind> {
        let function = match &expression.operator {
            Operator::Name(name) => self.lookup(name, stack)?,
            Operator::Expression(node) => self.evaluate(node, stack)?,
        };
        check_call_arity(&function, expression.params.len())?;
        let args = expression
            .params
            .iter()
            .map(|param| self.evaluate(param, stack))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.call_function(&function, args)?)
    }

    /// Invoke a builtin: validate the arity, then either answer the declared result type
    /// or run the operation
    pub(crate) fn call_builtin(&self, op: &'static BuiltinOp, args: Vec<Value>) -> Result<Value, Error> {
        op.validate_arity(args.len())?;
        if op.answers_declared(&args) {
            return Ok(Value::Type(op.returns.clone()));
        }
        (op.op)(&args, self)
    }

    /// Call anything callable with already evaluated arguments.
    ///
    /// Besides functions, strings and numbers look themselves up in their argument
    /// (`(:a obj)`, `(0 arr)`) and arrays and objects look up their argument
    /// (`(arr 0)`, `(obj "a")`).
    pub fn call_function(&self, function: &Value, args: Vec<Value>) -> Result<Value, Error> {
        match function {
            Value::Function(f) => self.call_lits_function(f, args),
            Value::String(_) | Value::Number(_) => {
                Arity::Range(1, 2)
                    .validate(args.len())
                    .map_err(|_| Error::arity_error_with_expr(Arity::Range(1, 2), args.len(), function.to_string()))?;
                collection::get(&args[0], function, args.get(1))
            }
            Value::Array(_) | Value::Object(_) => {
                Arity::Exact(1)
                    .validate(args.len())
                    .map_err(|_| Error::arity_error_with_expr(Arity::Exact(1), args.len(), function.to_string()))?;
                collection::get(function, &args[0], None)
            }
            Value::Type(t) => call_abstract(t),
            other => Err(Error::TypeError(format!("{other} is not a function"))),
        }
    }

    fn call_lits_function(&self, function: &Rc<LitsFunction>, args: Vec<Value>) -> Result<Value, Error> {
        let _depth = self.enter_call()?;
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.dispatch_call(function, args))
    }

    fn dispatch_call(&self, function: &Rc<LitsFunction>, args: Vec<Value>) -> Result<Value, Error> {
        match &**function {
            LitsFunction::Builtin(op) => self.call_builtin(op, args),
            LitsFunction::UserDefined {
                definition,
                captured,
            } => self.call_user(function, definition, captured, args),
            LitsFunction::Partial {
                function,
                args: bound,
            } => {
                let mut all = bound.clone();
                all.extend(args);
                self.call_function(function, all)
            }
            LitsFunction::Comp(functions) => {
                let Some((innermost, outer)) = functions.split_last() else {
                    Arity::Exact(1)
                        .validate(args.len())
                        .map_err(|_| Error::arity_error_with_expr(Arity::Exact(1), args.len(), "comp".to_owned()))?;
                    return Ok(args.into_iter().next().unwrap_or(Value::Nil));
                };
                let mut value = self.call_function(innermost, args)?;
                for f in outer.iter().rev() {
                    value = self.call_function(f, vec![value])?;
                }
                Ok(value)
            }
            LitsFunction::Constantly(value) => Ok(value.clone()),
            LitsFunction::Juxt(functions) => functions
                .iter()
                .map(|f| self.call_function(f, args.clone()))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::array),
            LitsFunction::Complement(f) => Ok(truthiness(&self.call_function(f, args)?).not().to_value()),
            LitsFunction::EveryPred(predicates) => self.combine_predicates(predicates, &args, true),
            LitsFunction::SomePred(predicates) => self.combine_predicates(predicates, &args, false),
            LitsFunction::Fnil { function, defaults } => {
                let args = args
                    .into_iter()
                    .enumerate()
                    .map(|(i, arg)| match (arg, defaults.get(i)) {
                        (Value::Nil, Some(default)) => default.clone(),
                        (Value::Type(t), Some(default)) if t.intersects(&Type::NIL) => {
                            join(&[Value::Type(t.exclude(&Type::NIL)), default.clone()])
                        }
                        (arg, _) => arg,
                    })
                    .collect();
                self.call_function(function, args)
            }
        }
    }

    /// `every-pred` (`all`) or `some-pred`: every predicate applied to every argument,
    /// stopping once the answer is decided
    fn combine_predicates(&self, predicates: &[Value], args: &[Value], all: bool) -> Result<Value, Error> {
        let decisive = if all { Outcome::FALSE } else { Outcome::TRUE };
        let mut outcomes = Vec::new();
        for predicate in predicates {
            for arg in args {
                let outcome = truthiness(&self.call_function(predicate, vec![arg.clone()])?);
                if outcome == decisive {
                    return Ok(outcome.to_value());
                }
                outcomes.push(outcome);
            }
        }
        let combined = if all { all_of(outcomes) } else { any_of(outcomes) };
        Ok(combined.to_value())
    }

    fn call_user(
        &self,
        function: &Rc<LitsFunction>,
        definition: &FunctionDefinition,
        captured: &ContextStack,
        args: Vec<Value>,
    ) -> Result<Value, Error> {
        let overload = definition
            .overloads
            .iter()
            .find(|overload| overload.arity().accepts(args.len()))
            .ok_or_else(|| definition_arity_error(definition, args.len()))?;

        let key = Rc::as_ptr(function);
        if self.is_type_mode() && self.is_reentrant(key, &args) {
            trace!("re-entrant call of {} answers unknown", function.name());
            return Ok(Value::Type(Type::UNKNOWN));
        }
        self.active.borrow_mut().push(ActiveCall {
            function: key,
            undecided: self.undecided.get(),
        });
        let _active = ActiveGuard(&self.active);

        let own_value = Value::Function(Rc::clone(function));
        let names: Vec<&String> = overload.params.iter().chain(overload.rest.as_ref()).collect();
        let bind = |frame: Vec<Value>| -> Result<ContextStack, Error> {
            if frame.len() != names.len() {
                return Err(Error::arity_error_with_expr(
                    Arity::Exact(names.len()),
                    frame.len(),
                    "recur".to_owned(),
                ));
            }
            let mut context = Context::new();
            if let Some(name) = &definition.name {
                context.define(name.clone(), own_value.clone());
            }
            for (name, value) in names.iter().zip(frame) {
                context.define((*name).clone(), value);
            }
            Ok(captured.with_context(context))
        };
        self.solve(pack_arguments(overload, args), &bind, &overload.body)
    }

    /// A call of an active function whose arguments are abstract, or that was reached
    /// through an undecided branch since it was entered, could recurse without bound
    fn is_reentrant(&self, key: *const LitsFunction, args: &[Value]) -> bool {
        let active = self.active.borrow();
        let Some(entry) = active.iter().rev().find(|call| call.function == key) else {
            return false;
        };
        args.iter().any(Value::contains_type) || self.undecided.get() > entry.undecided
    }

    /// Evaluate a `loop` or function body bound by `bind`, restarting on `recur`.
    ///
    /// Concrete mode trampolines. Type mode collects the `recur` arguments of one pass
    /// and widens the bindings with them until they are stable; after
    /// `MAX_FIXPOINT_ITERATIONS` rounds every binding becomes `unknown`.
    pub(crate) fn solve(
        &self,
        initial: Vec<Value>,
        bind: &dyn Fn(Vec<Value>) -> Result<ContextStack, Error>,
        body: &[Node],
    ) -> Result<Value, Error> {
        if !self.is_type_mode() {
            let mut args = initial;
            loop {
                let stack = bind(args)?;
                match self.evaluate_body(body, &stack) {
                    Ok(value) => return Ok(value),
                    Err(Unwind::Recur(next)) => {
                        trace!("recur with {} arguments", next.len());
                        args = next;
                    }
                    Err(Unwind::Error(err)) => return Err(err),
                }
            }
        }

        let arity = initial.len();
        let mut state = initial;
        let mut widened = false;
        let mut rounds = 0;
        while rounds < MAX_FIXPOINT_ITERATIONS {
            let (result, recurs) = self.evaluate_frame(bind, body, state.clone())?;
            let (matching, mismatched): (Vec<_>, Vec<_>) =
                recurs.into_iter().partition(|args| args.len() == arity);
            let result = with_unknown_if(result, !mismatched.is_empty());
            if matching.is_empty() {
                return result;
            }

            let reachable = matches!(&result, Ok(value) if !is_never(value));
            if let [next] = matching.as_slice()
                && !reachable
                && !widened
                && !next.iter().any(Value::contains_type)
            {
                state = next.clone();
                continue;
            }

            let next_state: Vec<Value> = (0..arity)
                .map(|i| {
                    let mut types = vec![Type::of(&state[i])];
                    types.extend(matching.iter().map(|args| Type::of(&args[i])));
                    Value::Type(Type::or_all(&types))
                })
                .collect();
            if widened && next_state == state {
                return result;
            }
            trace!("widening recur bindings, round {}", rounds + 1);
            state = next_state;
            widened = true;
            rounds += 1;
        }

        debug!("no fixpoint after {MAX_FIXPOINT_ITERATIONS} rounds, binding unknown");
        let unknown = vec![Value::Type(Type::UNKNOWN); arity];
        let (result, recurs) = self.evaluate_frame(bind, body, unknown)?;
        with_unknown_if(result, recurs.iter().any(|args| args.len() != arity))
    }

    /// One type-mode pass over a body, returning its result and the collected recurs
    fn evaluate_frame(
        &self,
        bind: &dyn Fn(Vec<Value>) -> Result<ContextStack, Error>,
        body: &[Node],
        state: Vec<Value>,
    ) -> Result<(Result<Value, Error>, Vec<Vec<Value>>), Error> {
        let stack = bind(state)?;
        self.recur_frames.borrow_mut().push(Vec::new());
        let result = self.evaluate_body(body, &stack).map_err(Unwind::into_error);
        let recurs = self.recur_frames.borrow_mut().pop().unwrap_or_default();
        Ok((result, recurs))
    }

    /// Type mode: record a `recur` in the innermost frame. It produces no value.
    pub(crate) fn record_recur(&self, args: Vec<Value>) -> Result<Value, Error> {
        let mut frames = self.recur_frames.borrow_mut();
        let frame = frames.last_mut().ok_or(Error::RecurOutsideTail)?;
        frame.push(args);
        Ok(Value::Type(Type::NEVER))
    }

    /// Pick a branch by the truthiness of `test`. An undecided test takes both.
    pub(crate) fn select(
        &self,
        test: &Value,
        then: impl FnOnce() -> Result<Value, Unwind>,
        otherwise: impl FnOnce() -> Result<Value, Unwind>,
    ) -> Result<Value, Unwind> {
        match test.truthiness() {
            Some(true) => then(),
            Some(false) => otherwise(),
            None => {
                let _undecided = self.undecided_branch();
                let taken = then();
                let not_taken = otherwise();
                join_outcomes(vec![taken, not_taken])
            }
        }
    }
}

/// Join of the branches that did not raise; the first error when all of them raised
pub(crate) fn join_outcomes(outcomes: Vec<Result<Value, Unwind>>) -> Result<Value, Unwind> {
    let mut values = Vec::new();
    let mut first_error = None;
    for outcome in outcomes {
        match outcome {
            Ok(value) => values.push(value),
            Err(err) => {
                first_error.get_or_insert(err);
            }
        }
    }
    match first_error {
        Some(err) if values.is_empty() => Err(err),
        _ => Ok(join(&values)),
    }
}

fn is_never(value: &Value) -> bool {
    matches!(value, Value::Type(t) if t.is_never())
}

fn with_unknown_if(result: Result<Value, Error>, unknown: bool) -> Result<Value, Error> {
    if !unknown {
        return result;
    }
    Ok(match result {
        Ok(value) => join(&[value, Value::Type(Type::UNKNOWN)]),
        Err(_) => Value::Type(Type::UNKNOWN),
    })
}

/// Calling an abstract value: a function type yields its return type
fn call_abstract(t: &Type) -> Result<Value, Error> {
    let callable = Type::FUNCTION
        .or(&Type::STRING)
        .or(&Type::NUMBER)
        .or(&Type::ARRAY)
        .or(&Type::OBJECT);
    if t.is(&Type::FUNCTION) {
        Ok(Value::Type(t.return_type().cloned().unwrap_or(Type::UNKNOWN)))
    } else if t.intersects(&callable) {
        Ok(Value::Type(Type::UNKNOWN))
    } else {
        Err(Error::TypeError(format!("{} is not callable", t.describe())))
    }
}

/// Positional arguments followed by the rest array, one slot per bound name
fn pack_arguments(overload: &FunctionOverload, args: Vec<Value>) -> Vec<Value> {
    let mut args = args.into_iter();
    let mut frame: Vec<Value> = args.by_ref().take(overload.params.len()).collect();
    if overload.rest.is_some() {
        frame.push(Value::array(args));
    }
    frame
}

fn definition_arity(definition: &FunctionDefinition) -> Arity {
    let min = definition
        .overloads
        .iter()
        .map(|overload| overload.params.len())
        .min()
        .unwrap_or(0);
    let max = definition
        .overloads
        .iter()
        .map(|overload| overload.params.len())
        .max()
        .unwrap_or(0);
    if definition.overloads.iter().any(|overload| overload.rest.is_some()) {
        Arity::AtLeast(min)
    } else if min == max {
        Arity::Exact(min)
    } else {
        Arity::Range(min, max)
    }
}

fn definition_arity_error(definition: &FunctionDefinition, got: usize) -> Error {
    let name = definition
        .name
        .clone()
        .unwrap_or_else(|| "anonymous function".to_owned());
    Error::arity_error_with_expr(definition_arity(definition), got, name)
}

/// Arity of a call is checked before its arguments are evaluated
fn check_call_arity(function: &Value, count: usize) -> Result<(), Error> {
    let Value::Function(f) = function else {
        return Ok(());
    };
    match &**f {
        LitsFunction::Builtin(op) => op.validate_arity(count),
        LitsFunction::UserDefined { definition, .. } => {
            if definition
                .overloads
                .iter()
                .any(|overload| overload.arity().accepts(count))
            {
                Ok(())
            } else {
                Err(definition_arity_error(definition, count))
            }
        }
        _ => Ok(()),
    }
}

#[cfg(all(test, feature = "reader"))]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::parser::parse;

    /// Test result variants for comprehensive testing
    #[derive(Debug)]
    enum TestResult {
        EvalResult(Value),           // Evaluation should succeed with this value
        SpecificError(&'static str), // Evaluation should fail with error containing this string
        Error,                       // Evaluation should fail (any error)
    }
    use TestResult::*;

    /// Test environment containing test cases that share a global context
    struct TestEnvironment(Vec<(&'static str, TestResult)>);

    /// Micro-helper for success cases in comprehensive tests
    fn success<T: Into<Value>>(value: T) -> TestResult {
        EvalResult(value.into())
    }

    /// Execute a single test case with detailed error reporting
    fn execute_test_case(input: &str, expected: &TestResult, params: &Params, test_id: &str) {
        let ast = match parse(input) {
            Ok(ast) => ast,
            Err(parse_err) => {
                panic!("{test_id}: unexpected parse error for '{input}': {parse_err:?}");
            }
        };

        match (run(&ast, params), expected) {
            (Ok(actual), EvalResult(expected_val)) => {
                assert_eq!(
                    actual, *expected_val,
                    "{test_id}: expected {expected_val:?}, got {actual:?} for '{input}'"
                );
            }
            (Err(_), Error) => {} // Expected generic error
            (Err(e), SpecificError(expected_text)) => {
                let error_msg = format!("{e}");
                assert!(
                    error_msg.contains(expected_text),
                    "{test_id}: error should contain '{expected_text}', got: {error_msg}"
                );
            }
            (Ok(actual), Error) => {
                panic!("{test_id}: expected error for '{input}', got {actual:?}");
            }
            (Ok(actual), SpecificError(expected_text)) => {
                panic!("{test_id}: expected error containing '{expected_text}', got {actual:?}");
            }
            (Err(err), EvalResult(expected_val)) => {
                panic!("{test_id}: expected {expected_val:?} for '{input}', got error {err:?}");
            }
        }
    }

    fn run_comprehensive_tests(test_cases: Vec<(&str, TestResult)>) {
        for (i, (input, expected)) in test_cases.iter().enumerate() {
            let test_id = format!("#{}", i + 1);
            execute_test_case(input, expected, &Params::default(), &test_id);
        }
    }

    /// Run tests in isolated environments with a shared global context
    fn run_tests_in_environment(test_environments: Vec<TestEnvironment>) {
        for (env_idx, TestEnvironment(test_cases)) in test_environments.iter().enumerate() {
            let params = Params {
                global_context: Some(Rc::new(RefCell::new(Context::new()))),
                ..Params::default()
            };
            for (test_idx, (input, expected)) in test_cases.iter().enumerate() {
                let test_id = format!("Environment #{} test #{}", env_idx + 1, test_idx + 1);
                execute_test_case(input, expected, &params, &test_id);
            }
        }
    }

    fn type_of(source: &str) -> Type {
        get_data_type(&parse(source).unwrap(), &Params::default()).unwrap()
    }

    #[test]
    #[expect(clippy::too_many_lines)] // Comprehensive test coverage is intentionally thorough
    fn test_comprehensive_operations_data_driven() {
        let test_cases = vec![
            // === LITERALS AND NAMES ===
            ("42", success(42)),
            ("-0.5", success(-0.5)),
            ("\"hello\"", success("hello")),
            (":kw", success("kw")),
            ("nil", success(Value::Nil)),
            ("true", success(true)),
            ("[1 2 (+ 1 2)]", success([1, 2, 3])),
            ("{:a 1 :b [2]}", success(Value::object([
                ("a", Value::from(1)),
                ("b", Value::from([2])),
            ]))),
            ("undefined-name", SpecificError("Undefined symbol 'undefined-name'")),
            ("1 2 3", success(3)),
            // === CALLS ===
            ("(+ 1 2 3 4)", success(10)),
            ("((if true + *) 2 3)", success(5)),
            ("((fn [x] (* x x)) 4)", success(16)),
            ("(:a {:a 1})", success(1)),
            ("(:b {:a 1} 0)", success(0)),
            ("(1 [10 20])", success(20)),
            ("([10 20] 0)", success(10)),
            ("({:a 1} :a)", success(1)),
            ("(nil 1)", Error),
            ("(inc)", SpecificError("inc: expected 1 arguments, got 0")),
            // Arity is checked before the arguments are evaluated
            ("((fn [x] x) 1 (throw \"boom\"))", SpecificError("ArityError")),
            // === COLLECTIONS ===
            ("(get [1 2 3] -1)", success(Value::Nil)),
            ("(get [1 2 3] -1 \"x\")", success("x")),
            ("(assoc [1 2 3] 3 \"4\")", success(Value::array([1.into(), 2.into(), 3.into(), "4".into()]))),
            ("(assoc [1 2 3] 4 \"4\")", Error),
            ("(update {} :a (fn [v] 0))", success(Value::object([("a", Value::from(0))]))),
            // === LOGIC ===
            ("(and)", success(true)),
            ("(and 1 2)", success(2)),
            ("(and 1 nil 2)", success(Value::Nil)),
            ("(or)", success(false)),
            ("(or nil 0 \"\" :x)", success("x")),
            ("(or nil false)", success(false)),
            ("(?? nil 5)", success(5)),
            ("(?? false 5)", success(false)),
            ("(?? nil)", success(Value::Nil)),
            // === CONDITIONALS ===
            ("(if 0 :yes :no)", success("no")),
            ("(if [] :yes :no)", success("yes")),
            ("(if NaN :yes)", success(Value::Nil)),
            ("(if-not nil 1 2)", success(1)),
            ("(cond false 1 (= 1 1) 2 :else 3)", success(2)),
            ("(cond false 1)", success(Value::Nil)),
            ("(when true 1 2)", success(2)),
            ("(when false 1)", success(Value::Nil)),
            ("(when-not false 1)", success(1)),
            ("(if-let [x (get {:a 5} :a)] (inc x) :none)", success(6)),
            ("(if-let [x (get {:a 5} :b)] (inc x) :none)", success("none")),
            ("(when-let [x 0] :never)", success(Value::Nil)),
            ("(when-first [x [7 8]] (* x 2))", success(14)),
            ("(when-first [x []] :never)", success(Value::Nil)),
            // === BINDINGS ===
            ("(let [a 1 b (+ a 1)] (* a b))", success(2)),
            ("(let [a 1] (let [a 2] a))", success(2)),
            ("(let [a 1] (let [b 2]) a)", success(1)),
            ("(do 1 2 3)", success(3)),
            ("(do)", success(Value::Nil)),
            ("(declared? +)", success(true)),
            ("(declared? no-such-thing)", success(false)),
            ("(let [x 1] (declared? x))", success(true)),
            // === LOOPS ===
            ("(loop [i 0 acc []] (if (< i 3) (recur (inc i) (push acc i)) acc))", success([0, 1, 2])),
            ("(loop [n 10000 acc 0] (if (zero? n) acc (recur (dec n) (+ acc n))))", success(50_005_000)),
            ("(for [x [1 2] y [10 20]] (+ x y))", success([11, 21, 12, 22])),
            ("(for [x [1 2] y [10 20]] [x y])", success(Value::array([
                Value::from([1, 10]),
                Value::from([1, 20]),
                Value::from([2, 10]),
                Value::from([2, 20]),
            ]))),
            ("(for [x [1 2 3 4] &when (odd? x)] x)", success([1, 3])),
            ("(for [x [1 2 3 4] &while (< x 3)] x)", success([1, 2])),
            ("(for [x [1 2] &let [y (* x 10)]] y)", success([10, 20])),
            ("(for [x [1 2] y []] x)", success(Value::array([]))),
            ("(for [x [1 2] y (if (= x 1) [:a] [])] [x y])", success(Value::array([
                Value::array([1.into(), "a".into()]),
            ]))),
            ("(for [e {:a 1}] e)", success(Value::array([Value::array(["a".into(), 1.into()])]))),
            ("(for [c \"ab\"] c)", success(["a", "b"])),
            ("(doseq [x [1 2]] x)", success(Value::Nil)),
            ("(recur 1)", SpecificError("recur")),
            // === FUNCTIONS ===
            ("((fn [& xs] xs) 1 2)", success([1, 2])),
            ("((fn [a & xs] [a xs]) 1)", success(Value::array([1.into(), Value::array([])]))),
            ("((fn ([a] a) ([a b] (+ a b))) 1 2)", success(3)),
            ("((fn [a] a))", SpecificError("ArityError")),
            ("(map #(* %1 2) [1 2 3])", success([2, 4, 6])),
            ("(map (fn [x] (inc x)) [1 2])", success([2, 3])),
            ("(reduce + [1 2 3])", success(6)),
            ("((fn [n acc] (if (zero? n) acc (recur (dec n) (* acc n)))) 5 1)", success(120)),
            // === ERRORS ===
            ("(throw \"boom\")", SpecificError("boom")),
            ("(try (throw \"boom\") (catch e (:message e)))", success("boom")),
            ("(try (+ 1 :a) (catch e :caught))", success("caught")),
            ("(try 1 (catch e 2))", success(1)),
            ("(try (undefined-fn) (catch :handled))", success("handled")),
            // recur is not an error and passes through try
            ("(try (recur 1) (catch e :caught))", SpecificError("recur")),
            ("(time! (+ 1 2))", success(3)),
        ];

        run_comprehensive_tests(test_cases);
    }

    #[test]
    fn test_definitions_share_global_context() {
        let test_environments = vec![
            TestEnvironment(vec![
                ("(def x 10)", success(10)),
                ("(+ x 1)", success(11)),
                ("(def x (* x 2))", success(20)),
                ("x", success(20)),
            ]),
            TestEnvironment(vec![
                ("(defn fact [n] (if (<= n 1) 1 (* n (fact (dec n)))))", Error),
                ("(fact 5)", success(120)),
                ("(defn is-even [n] (if (zero? n) true (is-odd (dec n))))", Error),
                ("(defn is-odd [n] (if (zero? n) false (is-even (dec n))))", Error),
                ("(is-even 10)", success(true)),
                ("(is-odd 7)", success(true)),
            ]),
            TestEnvironment(vec![
                // Closures capture the stack they were created in
                ("(defn make-adder [n] (fn [x] (+ x n)))", Error),
                ("(def add5 (make-adder 5))", Error),
                ("(add5 1)", success(6)),
                ("(let [n 100] (add5 1))", success(6)),
                ("(map (make-adder 1) [1 2])", success([2, 3])),
            ]),
        ];

        // Definitions of functions evaluate to the function itself, which has no
        // literal to compare against
        for (env_idx, TestEnvironment(test_cases)) in test_environments.iter().enumerate() {
            let params = Params {
                global_context: Some(Rc::new(RefCell::new(Context::new()))),
                ..Params::default()
            };
            for (test_idx, (input, expected)) in test_cases.iter().enumerate() {
                let test_id = format!("Environment #{} test #{}", env_idx + 1, test_idx + 1);
                match expected {
                    Error => {
                        let defined = run(&parse(input).unwrap(), &params).unwrap();
                        assert!(
                            matches!(defined, Value::Function(_)),
                            "{test_id}: {input} should define a function, got {defined:?}"
                        );
                    }
                    _ => execute_test_case(input, expected, &params, &test_id),
                }
            }
        }
    }

    #[test]
    fn test_host_params() {
        let params = Params {
            globals: [("x", Value::from(41))].into_iter().collect(),
            contexts: vec![
                [("y", Value::from(2))].into_iter().collect(),
                [("y", Value::from(100)), ("z", Value::from(3))].into_iter().collect(),
            ],
            global_context: None,
        };
        let ast = parse("[(+ x 1) y z]").unwrap();
        assert_eq!(run(&ast, &params).unwrap(), Value::from([42, 2, 3]));
        assert_eq!(
            get_data_type(&parse("(+ x 1)").unwrap(), &params).unwrap(),
            Type::POSITIVE_INTEGER
        );
    }

    #[test]
    fn test_type_evaluation() {
        let int_params = Params {
            globals: [("n", Value::Type(Type::INTEGER)), ("s", Value::Type(Type::STRING))]
                .into_iter()
                .collect(),
            ..Params::default()
        };
        let type_with = |source: &str| get_data_type(&parse(source).unwrap(), &int_params).unwrap();

        assert_eq!(type_of("(+ 1 2)"), Type::POSITIVE_INTEGER);
        assert_eq!(type_of("\"a\""), Type::NON_EMPTY_STRING);
        assert_eq!(type_with("(if (zero? n) :zero 0)"), Type::NON_EMPTY_STRING.or(&Type::POSITIVE_ZERO));
        assert_eq!(type_with("(and (pos? n) n)"), Type::FALSE.or(&Type::POSITIVE_INTEGER));
        assert_eq!(type_with("(or s nil)"), Type::NON_EMPTY_STRING.or(&Type::NIL));
        assert_eq!(type_with("(?? (get {:a 1} s) 2)"), Type::POSITIVE_INTEGER);
        assert_eq!(type_with("(str s n)"), Type::STRING);
        // A raising branch contributes nothing
        assert_eq!(type_with("(if (zero? n) (throw \"zero\") n)"), Type::INTEGER);
        // Loops reach a fixpoint
        assert_eq!(type_with("(loop [i n] (if (> i 0) (recur (dec i)) i))"), Type::INTEGER);
        assert_eq!(
            type_with("(loop [i 0 acc \"\"] (if (< i n) (recur (inc i) (str acc i)) acc))"),
            Type::STRING
        );
        // Concrete loops still run concretely
        assert_eq!(type_of("(loop [i 0] (if (< i 3) (recur (inc i)) i))"), Type::POSITIVE_INTEGER);
        // Recursive functions terminate with a sound answer
        let fact = type_with("(do (defn fact [k] (if (<= k 1) 1 (* k (fact (dec k))))) (fact n))");
        assert!(Type::POSITIVE_INTEGER.is(&fact), "{fact}");
        // Calling a function type yields its return type
        assert_eq!(
            Evaluator::new(EvaluationMode::Type)
                .call_function(&Value::Type(Type::function_returning(Type::STRING)), vec![])
                .unwrap(),
            Value::Type(Type::STRING)
        );
        // Type evaluation never writes to the host's global context
        let global = Rc::new(RefCell::new(Context::new()));
        let params = Params {
            global_context: Some(Rc::clone(&global)),
            ..Params::default()
        };
        get_data_type(&parse("(def y 1)").unwrap(), &params).unwrap();
        assert!(!global.borrow().contains("y"));
    }

    #[test]
    fn test_evaluation_depth_limit() {
        let depth_test_environments = vec![TestEnvironment(vec![
            ("(do (defn make-deep [d] (if (= d 0) 42 (+ 1 (make-deep (- d 1))))) (make-deep 10))", success(52)),
            // Ordinary non-tail recursion is limited by call depth, not expression nesting
            ("(make-deep 1500)", success(1542)),
            ("(make-deep 5000)", SpecificError("depth")),
            // Deep chains of composed functions are calls too
            ("((reduce (fn [f g] (comp f g)) (repeat 3000 inc)) 0)", SpecificError("depth")),
            // Loops are not recursive and run in constant depth
            ("(loop [i 0] (if (< i 5000) (recur (inc i)) i))", success(5000)),
        ])];

        run_tests_in_environment(depth_test_environments);
    }
}
