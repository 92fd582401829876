//! This module defines the Abstract Syntax Tree consumed by the evaluator and the
//! analyzer. The reader produces [`Node`]s; every node is one of a handful of
//! [`NodeKind`]s: literals, names, reserved names, binding modifiers, normal
//! expressions (operator plus ordered parameters) and special expressions, the latter
//! being the language's control forms with their own form-specific fields.
//!
//! Nodes are immutable once built. Ergonomic builders such as [`num`], [`name`] and
//! [`call`] are provided for constructing trees in code and tests; [`fmt::Display`]
//! renders a node back in source form.

use crate::Arity;
use crate::value::Value;
use std::fmt;
use std::rc::Rc;

/// Largest integer exactly representable by an `f64`
pub const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;
pub const MIN_SAFE_INTEGER: f64 = -9_007_199_254_740_991.0;

/// Position of a node in the source text, captured when parsing with debug info
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    /// 1-based line
    pub line: usize,
    /// 1-based column
    pub column: usize,
    /// The source line the node starts on
    pub code: String,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}: {}", self.line, self.column, self.code)
    }
}

/// A parsed program: the top-level nodes, evaluated in order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Ast {
    pub body: Vec<Node>,
    /// Whether nodes carry source locations
    pub has_debug_data: bool,
}

impl Ast {
    pub fn new(body: Vec<Node>) -> Self {
        Ast {
            body,
            has_debug_data: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub location: Option<SourceLocation>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Number(f64),
    String(String),
    Name(String),
    /// `&`, `&let`, `&when` or `&while`; only meaningful inside binding vectors
    Modifier(Modifier),
    ReservedName(ReservedName),
    NormalExpression(NormalExpression),
    SpecialExpression(Box<SpecialExpression>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Rest,
    Let,
    When,
    While,
}

impl Modifier {
    pub fn from_name(name: &str) -> Option<Modifier> {
        match name {
            "&" => Some(Modifier::Rest),
            "&let" => Some(Modifier::Let),
            "&when" => Some(Modifier::When),
            "&while" => Some(Modifier::While),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Modifier::Rest => "&",
            Modifier::Let => "&let",
            Modifier::When => "&when",
            Modifier::While => "&while",
        }
    }
}

/// Names with a fixed value that can never be rebound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservedName {
    True,
    False,
    Nil,
    Null,
    NaN,
    PositiveInfinity,
    NegativeInfinity,
    MaxSafeInteger,
    MinSafeInteger,
    Pi,
    E,
}

impl ReservedName {
    pub const ALL: [ReservedName; 11] = [
        ReservedName::True,
        ReservedName::False,
        ReservedName::Nil,
        ReservedName::Null,
        ReservedName::NaN,
        ReservedName::PositiveInfinity,
        ReservedName::NegativeInfinity,
        ReservedName::MaxSafeInteger,
        ReservedName::MinSafeInteger,
        ReservedName::Pi,
        ReservedName::E,
    ];

    pub fn from_name(name: &str) -> Option<ReservedName> {
        ReservedName::ALL.into_iter().find(|r| r.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            ReservedName::True => "true",
            ReservedName::False => "false",
            ReservedName::Nil => "nil",
            ReservedName::Null => "null",
            ReservedName::NaN => "NaN",
            ReservedName::PositiveInfinity => "POSITIVE_INFINITY",
            ReservedName::NegativeInfinity => "NEGATIVE_INFINITY",
            ReservedName::MaxSafeInteger => "MAX_SAFE_INTEGER",
            ReservedName::MinSafeInteger => "MIN_SAFE_INTEGER",
            ReservedName::Pi => "PI",
            ReservedName::E => "E",
        }
    }

    pub fn value(self) -> Value {
        match self {
            ReservedName::True => Value::Boolean(true),
            ReservedName::False => Value::Boolean(false),
            ReservedName::Nil | ReservedName::Null => Value::Nil,
            ReservedName::NaN => Value::Number(f64::NAN),
            ReservedName::PositiveInfinity => Value::Number(f64::INFINITY),
            ReservedName::NegativeInfinity => Value::Number(f64::NEG_INFINITY),
            ReservedName::MaxSafeInteger => Value::Number(MAX_SAFE_INTEGER),
            ReservedName::MinSafeInteger => Value::Number(MIN_SAFE_INTEGER),
            ReservedName::Pi => Value::Number(std::f64::consts::PI),
            ReservedName::E => Value::Number(std::f64::consts::E),
        }
    }
}

/// A call: the operator is either a plain name or an arbitrary inner expression
#[derive(Debug, Clone, PartialEq)]
pub struct NormalExpression {
    pub operator: Operator,
    pub params: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    Name(String),
    Expression(Box<Node>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub name: String,
    pub value: Node,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CondClause {
    pub test: Node,
    pub form: Node,
}

/// One arity of a user-defined function
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionOverload {
    pub params: Vec<String>,
    /// Name bound to the remaining arguments, from `[a b & more]`
    pub rest: Option<String>,
    pub body: Vec<Node>,
}

impl FunctionOverload {
    pub fn arity(&self) -> Arity {
        match self.rest {
            Some(_) => Arity::AtLeast(self.params.len()),
            None => Arity::Exact(self.params.len()),
        }
    }
}

/// Shared between the AST and every closure created from it
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDefinition {
    pub name: Option<String>,
    pub overloads: Vec<FunctionOverload>,
}

/// A `for`/`doseq` binding with its trailing modifiers
#[derive(Debug, Clone, PartialEq)]
pub struct LoopBinding {
    pub binding: Binding,
    pub lets: Vec<Binding>,
    pub when: Option<Node>,
    pub while_: Option<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Conditional {
    pub test: Node,
    pub then: Node,
    pub otherwise: Option<Node>,
}

/// The control forms. Each is parsed, evaluated and analyzed by its own rules.
#[derive(Debug, Clone, PartialEq)]
pub enum SpecialExpression {
    And(Vec<Node>),
    Or(Vec<Node>),
    /// `(?? value default)`: `value` unless it is nil
    Coalesce {
        value: Node,
        default: Option<Node>,
    },
    Cond(Vec<CondClause>),
    If(Conditional),
    IfNot(Conditional),
    IfLet {
        binding: Binding,
        then: Node,
        otherwise: Option<Node>,
    },
    When {
        test: Node,
        body: Vec<Node>,
    },
    WhenNot {
        test: Node,
        body: Vec<Node>,
    },
    WhenLet {
        binding: Binding,
        body: Vec<Node>,
    },
    WhenFirst {
        binding: Binding,
        body: Vec<Node>,
    },
    Let {
        bindings: Vec<Binding>,
        body: Vec<Node>,
    },
    Loop {
        bindings: Vec<Binding>,
        body: Vec<Node>,
    },
    Recur(Vec<Node>),
    Do(Vec<Node>),
    Def {
        name: String,
        value: Node,
    },
    Defn(Rc<FunctionDefinition>),
    Fn(Rc<FunctionDefinition>),
    For {
        bindings: Vec<LoopBinding>,
        body: Node,
    },
    Doseq {
        bindings: Vec<LoopBinding>,
        body: Node,
    },
    Throw(Node),
    Try {
        body: Node,
        error_name: Option<String>,
        handler: Node,
    },
    Time(Node),
    Declared(String),
}

impl SpecialExpression {
    pub const NAMES: [&'static str; 24] = [
        "and",
        "or",
        "??",
        "cond",
        "if",
        "if-not",
        "if-let",
        "when",
        "when-not",
        "when-let",
        "when-first",
        "let",
        "loop",
        "recur",
        "do",
        "def",
        "defn",
        "fn",
        "for",
        "doseq",
        "throw",
        "try",
        "time!",
        "declared?",
    ];

    pub fn is_special_name(name: &str) -> bool {
        Self::NAMES.contains(&name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            SpecialExpression::And(_) => "and",
            SpecialExpression::Or(_) => "or",
            SpecialExpression::Coalesce { .. } => "??",
            SpecialExpression::Cond(_) => "cond",
            SpecialExpression::If(_) => "if",
            SpecialExpression::IfNot(_) => "if-not",
            SpecialExpression::IfLet { .. } => "if-let",
            SpecialExpression::When { .. } => "when",
            SpecialExpression::WhenNot { .. } => "when-not",
            SpecialExpression::WhenLet { .. } => "when-let",
            SpecialExpression::WhenFirst { .. } => "when-first",
            SpecialExpression::Let { .. } => "let",
            SpecialExpression::Loop { .. } => "loop",
            SpecialExpression::Recur(_) => "recur",
            SpecialExpression::Do(_) => "do",
            SpecialExpression::Def { .. } => "def",
            SpecialExpression::Defn(_) => "defn",
            SpecialExpression::Fn(_) => "fn",
            SpecialExpression::For { .. } => "for",
            SpecialExpression::Doseq { .. } => "doseq",
            SpecialExpression::Throw(_) => "throw",
            SpecialExpression::Try { .. } => "try",
            SpecialExpression::Time(_) => "time!",
            SpecialExpression::Declared(_) => "declared?",
        }
    }
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Node {
            kind,
            location: None,
        }
    }

    pub fn with_location(mut self, location: Option<SourceLocation>) -> Self {
        self.location = location;
        self
    }

    pub fn special(expression: SpecialExpression) -> Self {
        Node::new(NodeKind::SpecialExpression(Box::new(expression)))
    }

    /// The operator name of a normal expression called by name
    pub fn operator_name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::NormalExpression(NormalExpression {
                operator: Operator::Name(name),
                ..
            }) => Some(name),
            _ => None,
        }
    }
}

/// Helper for building number literal nodes
pub fn num(n: f64) -> Node {
    Node::new(NodeKind::Number(n))
}

/// Helper for building string literal nodes
pub fn string<S: Into<String>>(s: S) -> Node {
    Node::new(NodeKind::String(s.into()))
}

/// Helper for building name nodes, resolving reserved names
pub fn name<S: AsRef<str>>(name: S) -> Node {
    let name = name.as_ref();
    match ReservedName::from_name(name) {
        Some(reserved) => Node::new(NodeKind::ReservedName(reserved)),
        None => Node::new(NodeKind::Name(name.to_owned())),
    }
}

/// Helper for building a call of a named operator
pub fn call<S: Into<String>>(operator: S, params: Vec<Node>) -> Node {
    Node::new(NodeKind::NormalExpression(NormalExpression {
        operator: Operator::Name(operator.into()),
        params,
    }))
}

/// Helper for building a call whose operator is itself an expression
pub fn call_expression(operator: Node, params: Vec<Node>) -> Node {
    Node::new(NodeKind::NormalExpression(NormalExpression {
        operator: Operator::Expression(Box::new(operator)),
        params,
    }))
}

fn write_string_literal(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
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

pub(crate) fn format_number(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    if n.is_nan() {
        write!(f, "NaN")
    } else if n == f64::INFINITY {
        write!(f, "POSITIVE_INFINITY")
    } else if n == f64::NEG_INFINITY {
        write!(f, "NEGATIVE_INFINITY")
    } else if n == 0.0 && n.is_sign_negative() {
        write!(f, "-0")
    } else {
        write!(f, "{n}")
    }
}

fn write_nodes(f: &mut fmt::Formatter<'_>, nodes: &[Node]) -> fmt::Result {
    for node in nodes {
        write!(f, " {node}")?;
    }
    Ok(())
}

fn write_bindings(f: &mut fmt::Formatter<'_>, bindings: &[Binding]) -> fmt::Result {
    write!(f, "[")?;
    for (i, binding) in bindings.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{} {}", binding.name, binding.value)?;
    }
    write!(f, "]")
}

fn write_loop_bindings(f: &mut fmt::Formatter<'_>, bindings: &[LoopBinding]) -> fmt::Result {
    write!(f, "[")?;
    for (i, lb) in bindings.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{} {}", lb.binding.name, lb.binding.value)?;
        if !lb.lets.is_empty() {
            write!(f, " &let ")?;
            write_bindings(f, &lb.lets)?;
        }
        if let Some(when) = &lb.when {
            write!(f, " &when {when}")?;
        }
        if let Some(while_) = &lb.while_ {
            write!(f, " &while {while_}")?;
        }
    }
    write!(f, "]")
}

fn write_overloads(f: &mut fmt::Formatter<'_>, def: &FunctionDefinition) -> fmt::Result {
    let single = def.overloads.len() == 1;
    for overload in &def.overloads {
        write!(f, " ")?;
        if !single {
            write!(f, "(")?;
        }
        write!(f, "[{}", overload.params.join(" "))?;
        if let Some(rest) = &overload.rest {
            if !overload.params.is_empty() {
                write!(f, " ")?;
            }
            write!(f, "& {rest}")?;
        }
        write!(f, "]")?;
        write_nodes(f, &overload.body)?;
        if !single {
            write!(f, ")")?;
        }
    }
    Ok(())
}

impl fmt::Display for SpecialExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.name())?;
        match self {
            SpecialExpression::And(nodes)
            | SpecialExpression::Or(nodes)
            | SpecialExpression::Recur(nodes)
            | SpecialExpression::Do(nodes) => write_nodes(f, nodes)?,
            SpecialExpression::Coalesce { value, default } => {
                write!(f, " {value}")?;
                if let Some(default) = default {
                    write!(f, " {default}")?;
                }
            }
            SpecialExpression::Cond(clauses) => {
                for clause in clauses {
                    write!(f, " {} {}", clause.test, clause.form)?;
                }
            }
            SpecialExpression::If(c) | SpecialExpression::IfNot(c) => {
                write!(f, " {} {}", c.test, c.then)?;
                if let Some(otherwise) = &c.otherwise {
                    write!(f, " {otherwise}")?;
                }
            }
            SpecialExpression::IfLet {
                binding,
                then,
                otherwise,
            } => {
                write!(f, " ")?;
                write_bindings(f, std::slice::from_ref(binding))?;
                write!(f, " {then}")?;
                if let Some(otherwise) = otherwise {
                    write!(f, " {otherwise}")?;
                }
            }
            SpecialExpression::When { test, body } | SpecialExpression::WhenNot { test, body } => {
                write!(f, " {test}")?;
                write_nodes(f, body)?;
            }
            SpecialExpression::WhenLet { binding, body }
            | SpecialExpression::WhenFirst { binding, body } => {
                write!(f, " ")?;
                write_bindings(f, std::slice::from_ref(binding))?;
                write_nodes(f, body)?;
            }
            SpecialExpression::Let { bindings, body } | SpecialExpression::Loop { bindings, body } => {
                write!(f, " ")?;
                write_bindings(f, bindings)?;
                write_nodes(f, body)?;
            }
            SpecialExpression::Def { name, value } => write!(f, " {name} {value}")?,
            SpecialExpression::Defn(def) => {
                if let Some(name) = &def.name {
                    write!(f, " {name}")?;
                }
                write_overloads(f, def)?;
            }
            SpecialExpression::Fn(def) => write_overloads(f, def)?,
            SpecialExpression::For { bindings, body } | SpecialExpression::Doseq { bindings, body } => {
                write!(f, " ")?;
                write_loop_bindings(f, bindings)?;
                write!(f, " {body}")?;
            }
            SpecialExpression::Throw(node) | SpecialExpression::Time(node) => {
                write!(f, " {node}")?;
            }
            SpecialExpression::Try {
                body,
                error_name,
                handler,
            } => {
                write!(f, " {body} (catch")?;
                if let Some(error_name) = error_name {
                    write!(f, " {error_name}")?;
                }
                write!(f, " {handler})")?;
            }
            SpecialExpression::Declared(name) => write!(f, " {name}")?,
        }
        write!(f, ")")
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NodeKind::Number(n) => format_number(f, *n),
            NodeKind::String(s) => write_string_literal(f, s),
            NodeKind::Name(name) => write!(f, "{name}"),
            NodeKind::Modifier(modifier) => write!(f, "{}", modifier.name()),
            NodeKind::ReservedName(reserved) => write!(f, "{}", reserved.name()),
            NodeKind::NormalExpression(NormalExpression { operator, params }) => {
                match operator {
                    Operator::Name(name) => write!(f, "({name}")?,
                    Operator::Expression(node) => write!(f, "({node}")?,
                }
                write_nodes(f, params)?;
                write!(f, ")")
            }
            NodeKind::SpecialExpression(special) => write!(f, "{special}"),
        }
    }
}
