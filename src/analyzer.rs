//! Static analysis over the AST.
//!
//! - [`find_unresolved_symbols`] reports every name that is neither bound, a built-in
//!   nor a reserved name, walking binding forms the way evaluation scopes them
//! - [`calculate_outcomes`] lists the syntactically distinct nodes a branching
//!   expression may reduce to, deciding tests that can be computed statically

use crate::ast::{
    Ast, Binding, CondClause, FunctionDefinition, LoopBinding, Node, NodeKind, NormalExpression,
    Operator, ReservedName, SourceLocation, SpecialExpression, num, string,
};
use crate::builtinops::is_builtin_name;
use crate::evaluator::{Params, run};
use crate::context::ContextStack;
use crate::value::{LitsFunction, Value};
use crate::MAX_OUTCOMES;
use log::debug;
use std::cell::RefCell;
use std::collections::HashSet;

type Scope = im::HashSet<String>;

#[derive(Debug, Clone, PartialEq)]
pub struct UnresolvedSymbol {
    pub symbol: String,
    /// Present when the AST was parsed with debug info
    pub location: Option<SourceLocation>,
}

/// Every use of a name that cannot be resolved, in source order
pub fn find_unresolved_symbols(ast: &Ast, params: &Params) -> Vec<UnresolvedSymbol> {
    let resolver = Resolver {
        global: RefCell::new(params.stack().names()),
        unresolved: RefCell::new(Vec::new()),
    };
    let scope = Scope::new();
    for node in &ast.body {
        resolver.walk(node, &scope);
    }
    resolver.unresolved.into_inner()
}

struct Resolver {
    /// Host bindings and everything `def`/`defn` has declared so far
    global: RefCell<HashSet<String>>,
    unresolved: RefCell<Vec<UnresolvedSymbol>>,
}

impl Resolver {
    fn check(&self, name: &str, location: Option<&SourceLocation>, scope: &Scope) {
        let resolved = scope.contains(name)
            || self.global.borrow().contains(name)
            || is_builtin_name(name)
            || ReservedName::from_name(name).is_some();
        if !resolved {
            self.unresolved.borrow_mut().push(UnresolvedSymbol {
                symbol: name.to_owned(),
                location: location.cloned(),
            });
        }
    }

    fn walk_all(&self, nodes: &[Node], scope: &Scope) {
        for node in nodes {
            self.walk(node, scope);
        }
    }

    /// Walk `let`-style bindings, each seeing the ones before it
    fn bind(&self, bindings: &[Binding], scope: &Scope) -> Scope {
        bindings.iter().fold(scope.clone(), |scope, binding| {
            self.walk(&binding.value, &scope);
            scope.update(binding.name.clone())
        })
    }

    fn walk_function(&self, definition: &FunctionDefinition, scope: &Scope) {
        for overload in &definition.overloads {
            let mut inner = scope.clone();
            inner.extend(definition.name.iter().cloned());
            inner.extend(overload.params.iter().cloned());
            inner.extend(overload.rest.iter().cloned());
            self.walk_all(&overload.body, &inner);
        }
    }

    fn walk_loop_bindings(&self, levels: &[LoopBinding], scope: &Scope) -> Scope {
        levels.iter().fold(scope.clone(), |scope, level| {
            self.walk(&level.binding.value, &scope);
            let scope = self.bind(&level.lets, &scope.update(level.binding.name.clone()));
            for condition in level.while_.iter().chain(&level.when) {
                self.walk(condition, &scope);
            }
            scope
        })
    }

    fn walk(&self, node: &Node, scope: &Scope) {
        match &node.kind {
            NodeKind::Number(_) | NodeKind::String(_) | NodeKind::ReservedName(_) | NodeKind::Modifier(_) => {}
            NodeKind::Name(name) => self.check(name, node.location.as_ref(), scope),
            NodeKind::NormalExpression(NormalExpression { operator, params }) => {
                match operator {
                    Operator::Name(name) => self.check(name, node.location.as_ref(), scope),
                    Operator::Expression(operator) => self.walk(operator, scope),
                }
                self.walk_all(params, scope);
            }
            NodeKind::SpecialExpression(special) => self.walk_special(special, scope),
        }
    }

    fn walk_special(&self, special: &SpecialExpression, scope: &Scope) {
        match special {
            SpecialExpression::And(nodes)
            | SpecialExpression::Or(nodes)
            | SpecialExpression::Recur(nodes)
            | SpecialExpression::Do(nodes) => self.walk_all(nodes, scope),
            SpecialExpression::Coalesce { value, default } => {
                self.walk(value, scope);
                self.walk_all(default.as_slice(), scope);
            }
            SpecialExpression::Cond(clauses) => {
                for CondClause { test, form } in clauses {
                    self.walk(test, scope);
                    self.walk(form, scope);
                }
            }
            SpecialExpression::If(c) | SpecialExpression::IfNot(c) => {
                self.walk(&c.test, scope);
                self.walk(&c.then, scope);
                self.walk_all(c.otherwise.as_slice(), scope);
            }
            SpecialExpression::IfLet {
                binding,
                then,
                otherwise,
            } => {
                self.walk(&binding.value, scope);
                self.walk(then, &scope.update(binding.name.clone()));
                self.walk_all(otherwise.as_slice(), scope);
            }
            SpecialExpression::When { test, body } | SpecialExpression::WhenNot { test, body } => {
                self.walk(test, scope);
                self.walk_all(body, scope);
            }
            SpecialExpression::WhenLet { binding, body } | SpecialExpression::WhenFirst { binding, body } => {
                self.walk(&binding.value, scope);
                self.walk_all(body, &scope.update(binding.name.clone()));
            }
            SpecialExpression::Let { bindings, body } | SpecialExpression::Loop { bindings, body } => {
                let inner = self.bind(bindings, scope);
                self.walk_all(body, &inner);
            }
            SpecialExpression::Def { name, value } => {
                self.walk(value, scope);
                self.global.borrow_mut().insert(name.clone());
            }
            SpecialExpression::Defn(definition) => {
                if let Some(name) = &definition.name {
                    self.global.borrow_mut().insert(name.clone());
                }
                self.walk_function(definition, scope);
            }
            SpecialExpression::Fn(definition) => self.walk_function(definition, scope),
            SpecialExpression::For { bindings, body } | SpecialExpression::Doseq { bindings, body } => {
                let inner = self.walk_loop_bindings(bindings, scope);
                self.walk(body, &inner);
            }
            SpecialExpression::Throw(node) | SpecialExpression::Time(node) => self.walk(node, scope),
            SpecialExpression::Try {
                body,
                error_name,
                handler,
            } => {
                self.walk(body, scope);
                let mut inner = scope.clone();
                inner.extend(error_name.iter().cloned());
                self.walk(handler, &inner);
            }
            SpecialExpression::Declared(_) => {}
        }
    }
}

/// The distinct nodes `node` may reduce to, or `None` when there are more than
/// `MAX_OUTCOMES` of them.
///
/// A test built only from literals, bound data and effect-free built-in calls is
/// decided by its value. Any other test keeps every branch, including the implicit
/// nil of a missing else, and is never evaluated.
pub fn calculate_outcomes(node: &Node, params: &Params) -> Option<Vec<Node>> {
    let outcomes = Outcomes {
        params: params.clone(),
        stack: params.stack(),
    }
    .outcomes(node);
    if outcomes.is_none() {
        debug!("more than {MAX_OUTCOMES} outcomes, giving up");
    }
    outcomes
}

struct Outcomes {
    params: Params,
    stack: ContextStack,
}

/// Built-ins whose calls are observable
const EFFECTFUL_BUILTINS: &[&str] = &["write!", "debug!"];

/// Data that cannot run user code when a built-in calls or walks it
fn is_inert(value: &Value) -> bool {
    match value {
        Value::Function(function) => {
            matches!(function.as_ref(), LitsFunction::Builtin(op) if !EFFECTFUL_BUILTINS.contains(&op.name))
        }
        Value::Array(items) => items.iter().all(is_inert),
        Value::Object(entries) => entries.values().all(is_inert),
        _ => true,
    }
}

fn nil_node() -> Node {
    Node::new(NodeKind::ReservedName(ReservedName::Nil))
}

/// Keep the first of every syntactically equal node
fn distinct(nodes: Vec<Node>) -> Option<Vec<Node>> {
    let mut seen = HashSet::new();
    let nodes: Vec<Node> = nodes
        .into_iter()
        .filter(|node| seen.insert(node.to_string()))
        .collect();
    (nodes.len() <= MAX_OUTCOMES).then_some(nodes)
}

/// A literal for a statically computed value, when one exists
fn literal(value: &Value) -> Option<Node> {
    match value {
        Value::Nil => Some(nil_node()),
        Value::Boolean(true) => Some(Node::new(NodeKind::ReservedName(ReservedName::True))),
        Value::Boolean(false) => Some(Node::new(NodeKind::ReservedName(ReservedName::False))),
        Value::Number(n) => Some(num(*n)),
        Value::String(s) => Some(string(s.clone())),
        _ => None,
    }
}

impl Outcomes {
    /// Whether a name refers to inert data or an effect-free built-in
    fn is_inert_name(&self, name: &str) -> bool {
        match self.stack.lookup(name) {
            Some(value) => is_inert(&value),
            None => {
                (is_builtin_name(name) && !EFFECTFUL_BUILTINS.contains(&name))
                    || ReservedName::from_name(name).is_some()
            }
        }
    }

    /// Whether evaluating `node` terminates without effects: no user functions,
    /// loops, definitions or logging
    fn is_pure(&self, node: &Node) -> bool {
        match &node.kind {
            NodeKind::Number(_) | NodeKind::String(_) | NodeKind::ReservedName(_) => true,
            NodeKind::Name(name) => self.is_inert_name(name),
            NodeKind::Modifier(_) => false,
            NodeKind::NormalExpression(NormalExpression {
                operator: Operator::Name(name),
                params,
            }) => self.is_inert_name(name) && self.all_pure(params),
            NodeKind::NormalExpression(_) => false,
            NodeKind::SpecialExpression(special) => match &**special {
                SpecialExpression::And(nodes)
                | SpecialExpression::Or(nodes)
                | SpecialExpression::Do(nodes) => self.all_pure(nodes),
                SpecialExpression::If(c) | SpecialExpression::IfNot(c) => {
                    self.is_pure(&c.test)
                        && self.is_pure(&c.then)
                        && self.all_pure(c.otherwise.as_slice())
                }
                SpecialExpression::When { test, body } | SpecialExpression::WhenNot { test, body } => {
                    self.is_pure(test) && self.all_pure(body)
                }
                SpecialExpression::Cond(clauses) => clauses
                    .iter()
                    .all(|clause| self.is_pure(&clause.test) && self.is_pure(&clause.form)),
                SpecialExpression::Coalesce { value, default } => {
                    self.is_pure(value) && self.all_pure(default.as_slice())
                }
                SpecialExpression::Declared(_) => true,
                _ => false,
            },
        }
    }

    fn all_pure(&self, nodes: &[Node]) -> bool {
        nodes.iter().all(|node| self.is_pure(node))
    }

    /// The value of a pure node that can be computed without host input
    fn static_value(&self, node: &Node) -> Option<Value> {
        let ast = Ast::new(vec![node.clone()]);
        if !self.is_pure(node) || !find_unresolved_symbols(&ast, &self.params).is_empty() {
            return None;
        }
        run(&ast, &self.params).ok()
    }

    fn static_truthiness(&self, node: &Node) -> Option<bool> {
        self.static_value(node).and_then(|value| value.truthiness())
    }

    fn outcomes(&self, node: &Node) -> Option<Vec<Node>> {
        match &node.kind {
            NodeKind::NormalExpression(expression) => self.call_outcomes(node, expression),
            NodeKind::SpecialExpression(special) => self.special_outcomes(node, special),
            _ => Some(vec![node.clone()]),
        }
    }

    fn optional_outcomes(&self, node: Option<&Node>) -> Option<Vec<Node>> {
        node.map_or_else(|| Some(vec![nil_node()]), |node| self.outcomes(node))
    }

    /// Outcomes of a body: the last form varies, the ones before it are kept
    fn body_outcomes(&self, body: &[Node]) -> Option<Vec<Node>> {
        match body {
            [] => Some(vec![nil_node()]),
            [only] => self.outcomes(only),
            [init @ .., last] => distinct(
                self.outcomes(last)?
                    .into_iter()
                    .map(|outcome| {
                        let mut nodes = init.to_vec();
                        nodes.push(outcome);
                        Node::special(SpecialExpression::Do(nodes))
                    })
                    .collect(),
            ),
        }
    }

    /// Cross product of the operator and parameter outcomes
    fn call_outcomes(&self, node: &Node, expression: &NormalExpression) -> Option<Vec<Node>> {
        let operators = match &expression.operator {
            Operator::Name(name) => vec![Operator::Name(name.clone())],
            Operator::Expression(operator) => self
                .outcomes(operator)?
                .into_iter()
                .map(|outcome| Operator::Expression(Box::new(outcome)))
                .collect(),
        };
        let mut combinations: Vec<Vec<Node>> = vec![Vec::new()];
        for param in &expression.params {
            let outcomes = self.outcomes(param)?;
            combinations = combinations
                .into_iter()
                .flat_map(|prefix| {
                    outcomes.iter().map(move |outcome| {
                        let mut params = prefix.clone();
                        params.push(outcome.clone());
                        params
                    })
                })
                .collect();
            if combinations.len() * operators.len() > MAX_OUTCOMES {
                return None;
            }
        }
        distinct(
            operators
                .iter()
                .flat_map(|operator| {
                    combinations.iter().map(move |params| Node {
                        kind: NodeKind::NormalExpression(NormalExpression {
                            operator: operator.clone(),
                            params: params.clone(),
                        }),
                        location: node.location.clone(),
                    })
                })
                .collect(),
        )
    }

    /// Every outcome of `test` picks a branch when it is static, both otherwise
    fn branch_outcomes(
        &self,
        test: &Node,
        then: &dyn Fn() -> Option<Vec<Node>>,
        otherwise: &dyn Fn() -> Option<Vec<Node>>,
    ) -> Option<Vec<Node>> {
        let mut result = Vec::new();
        for outcome in self.outcomes(test)? {
            match self.static_truthiness(&outcome) {
                Some(true) => result.extend(then()?),
                Some(false) => result.extend(otherwise()?),
                None => {
                    result.extend(then()?);
                    result.extend(otherwise()?);
                }
            }
            if result.len() > MAX_OUTCOMES * 2 {
                return None;
            }
        }
        distinct(result)
    }

    /// `and` (`is_and`) or `or`: each operand outcome either ends the expression or
    /// passes on to the remaining operands
    fn logical_outcomes(&self, operands: &[Node], is_and: bool) -> Option<Vec<Node>> {
        let Some((first, rest)) = operands.split_first() else {
            return Some(vec![literal(&Value::Boolean(is_and))?]);
        };
        if rest.is_empty() {
            return self.outcomes(first);
        }
        let remaining = || self.logical_outcomes(rest, is_and);
        let mut result = Vec::new();
        for outcome in self.outcomes(first)? {
            match self.static_truthiness(&outcome) {
                Some(truthy) if truthy == is_and => result.extend(remaining()?),
                Some(_) => result.push(outcome),
                None => {
                    result.push(outcome);
                    result.extend(remaining()?);
                }
            }
            if result.len() > MAX_OUTCOMES * 2 {
                return None;
            }
        }
        distinct(result)
    }

    fn cond_outcomes(&self, clauses: &[CondClause]) -> Option<Vec<Node>> {
        let Some((clause, rest)) = clauses.split_first() else {
            return Some(vec![nil_node()]);
        };
        self.branch_outcomes(
            &clause.test,
            &|| self.outcomes(&clause.form),
            &|| self.cond_outcomes(rest),
        )
    }

    fn special_outcomes(&self, node: &Node, special: &SpecialExpression) -> Option<Vec<Node>> {
        match special {
            SpecialExpression::If(c) => self.branch_outcomes(
                &c.test,
                &|| self.outcomes(&c.then),
                &|| self.optional_outcomes(c.otherwise.as_ref()),
            ),
            SpecialExpression::IfNot(c) => self.branch_outcomes(
                &c.test,
                &|| self.optional_outcomes(c.otherwise.as_ref()),
                &|| self.outcomes(&c.then),
            ),
            SpecialExpression::When { test, body } => self.branch_outcomes(
                test,
                &|| self.body_outcomes(body),
                &|| Some(vec![nil_node()]),
            ),
            SpecialExpression::WhenNot { test, body } => self.branch_outcomes(
                test,
                &|| Some(vec![nil_node()]),
                &|| self.body_outcomes(body),
            ),
            SpecialExpression::Cond(clauses) => self.cond_outcomes(clauses),
            SpecialExpression::And(operands) => self.logical_outcomes(operands, true),
            SpecialExpression::Or(operands) => self.logical_outcomes(operands, false),
            SpecialExpression::Coalesce { value, default } => {
                let mut result = Vec::new();
                for outcome in self.outcomes(value)? {
                    match self.static_value(&outcome) {
                        Some(Value::Nil) => result.extend(self.optional_outcomes(default.as_ref())?),
                        Some(_) => result.push(outcome),
                        None => {
                            result.push(outcome);
                            result.extend(self.optional_outcomes(default.as_ref())?);
                        }
                    }
                }
                distinct(result)
            }
            SpecialExpression::Declared(_) => {
                let decided = self.static_value(node).as_ref().and_then(literal);
                Some(vec![decided.unwrap_or_else(|| node.clone())])
            }
            _ => Some(vec![node.clone()]),
        }
    }
}

#[cfg(all(test, feature = "reader"))]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::context::Context;
    use std::rc::Rc;
    use crate::parser::{ParseConfig, parse, parse_with_config};

    fn unresolved(source: &str, params: &Params) -> Vec<String> {
        find_unresolved_symbols(&parse(source).unwrap(), params)
            .into_iter()
            .map(|u| u.symbol)
            .collect()
    }

    fn outcomes(source: &str, params: &Params) -> Option<Vec<String>> {
        let ast = parse(source).unwrap();
        calculate_outcomes(&ast.body[0], params)
            .map(|nodes| nodes.iter().map(ToString::to_string).collect())
    }

    #[test]
    fn test_find_unresolved_symbols() {
        let params = Params {
            globals: [("host", Value::from(1))].into_iter().collect(),
            ..Params::default()
        };
        let test_cases: Vec<(&str, Vec<&str>)> = vec![
            ("(+ x 1)", vec!["x"]),
            ("(+ host 1)", vec![]),
            ("(let [x 1 y x] (+ x y z))", vec!["z"]),
            ("(let [y x x 1] y)", vec!["x"]),
            ("(defn f [a] (f a))", vec![]),
            ("(fn [a & more] [a more b])", vec!["b"]),
            ("(for [x xs &let [y x] &when (odd? y)] [x y z])", vec!["xs", "z"]),
            ("(try (foo) (catch e (:message e)))", vec!["foo"]),
            ("(try 1 (catch e2 e))", vec!["e"]),
            ("(def a 1) (+ a b)", vec!["b"]),
            ("(def a a)", vec!["a"]),
            ("(if-let [v x] v v)", vec!["x", "v"]),
            ("(declared? anything)", vec![]),
            ("(unknown-fn nil true PI)", vec!["unknown-fn"]),
            ("((fn [f] (f)) g)", vec!["g"]),
            ("(loop [i 0] (if (< i n) (recur (inc i)) i))", vec!["n"]),
        ];

        for (i, (source, expected)) in test_cases.into_iter().enumerate() {
            assert_eq!(unresolved(source, &params), expected, "Test case {} failed: {source}", i + 1);
        }
    }

    #[test]
    fn test_unresolved_symbol_locations() {
        let ast = parse_with_config("(do\n  (inc missing))", ParseConfig { debug: true }).unwrap();
        let found = find_unresolved_symbols(&ast, &Params::default());
        assert_eq!(found.len(), 1);
        let location = found[0].location.clone().unwrap();
        assert_eq!((location.line, location.column), (2, 8));
    }

    #[test]
    fn test_calculate_outcomes() {
        let params = Params {
            globals: [("on", Value::from(true))].into_iter().collect(),
            ..Params::default()
        };
        let test_cases: Vec<(&str, Vec<&str>)> = vec![
            ("42", vec!["42"]),
            ("(if true 1 2)", vec!["1"]),
            ("(if x 1 2)", vec!["1", "2"]),
            ("(if x 1)", vec!["1", "nil"]),
            ("(if on 1 2)", vec!["1"]),
            ("(if-not x 1 2)", vec!["2", "1"]),
            ("(if x 1 1)", vec!["1"]),
            ("(if (if x true false) 1 2)", vec!["1", "2"]),
            ("(+ (if x 1 2) (if y 3 4))", vec!["(+ 1 3)", "(+ 1 4)", "(+ 2 3)", "(+ 2 4)"]),
            ("(cond false 1 x 2 :else 3)", vec!["2", "3"]),
            ("(cond x 1)", vec!["1", "nil"]),
            ("(when x 1 2)", vec!["(do 1 2)", "nil"]),
            ("(when-not (= 1 1) 1)", vec!["nil"]),
            ("(and)", vec!["true"]),
            ("(and 1 x)", vec!["x"]),
            ("(and 0 x)", vec!["0"]),
            ("(or x 2)", vec!["x", "2"]),
            ("(or nil false)", vec!["false"]),
            ("(?? nil 5)", vec!["5"]),
            ("(?? x 5)", vec!["x", "5"]),
            ("(declared? +)", vec!["true"]),
            ("(declared? qqq)", vec!["false"]),
            ("(let [a 1] a)", vec!["(let [a 1] a)"]),
        ];

        for (i, (source, expected)) in test_cases.into_iter().enumerate() {
            assert_eq!(
                outcomes(source, &params).unwrap(),
                expected,
                "Test case {} failed: {source}",
                i + 1
            );
        }
    }

    #[test]
    fn test_outcome_limit() {
        let source = format!("(+ {})", "(if x 1 2) ".repeat(9));
        assert_eq!(outcomes(&source, &Params::default()), None);
        let source = format!("(+ {})", "(if x 1 2) ".repeat(8));
        assert_eq!(outcomes(&source, &Params::default()).unwrap().len(), 256);
    }

    #[test]
    fn test_effectful_tests_are_not_evaluated() {
        let global = Rc::new(RefCell::new(Context::new()));
        let params = Params {
            global_context: Some(Rc::clone(&global)),
            ..Params::default()
        };
        crate::run_source("(defn spin [] (loop [] (recur)))", &params).unwrap();

        let test_cases: Vec<(&str, Vec<&str>)> = vec![
            ("(if (def z 1) :a :b)", vec!["\"a\"", "\"b\""]),
            ("(if (loop [] (recur)) 1 2)", vec!["1", "2"]),
            ("(if (spin) 1 2)", vec!["1", "2"]),
            ("(if (map spin [1]) 1 2)", vec!["1", "2"]),
            ("(if ((fn [] true)) 1 2)", vec!["1", "2"]),
            ("(if (write! 0) 1 2)", vec!["1", "2"]),
            ("(when (let [a 1] a) 1)", vec!["1", "nil"]),
            // Effect-free built-ins on data are still decided
            ("(if (map inc [1]) 1 2)", vec!["1"]),
            ("(if (and (< 1 2) (empty? [])) 1 2)", vec!["1"]),
        ];
        for (i, (source, expected)) in test_cases.into_iter().enumerate() {
            assert_eq!(
                outcomes(source, &params).unwrap(),
                expected,
                "Test case {} failed: {source}",
                i + 1
            );
        }
        assert!(!global.borrow().contains("z"));
    }
}
