//! Lits - embeddable expression language with static type inference
//!
//! This crate provides a small, dynamically typed, S-expression language together with
//! a static type layer that computes a sound over-approximation of the values a program
//! may produce, without running it.
//!
//! ## Two evaluation modes
//!
//! The same evaluator runs in two modes:
//!
//! ```text
//! (+ x 1)        ; run:            x = 41           => 42
//! (+ x 1)        ; get_data_type:  x : integer      => integer
//! ```
//!
//! In type mode every context entry holds a [`types::Type`] instead of a concrete value,
//! and every built-in operation computes a result `Type` by case-splitting on the atomic
//! bits of its operands. For any concrete inputs matching the abstract inputs, the type
//! of the concrete result is always a subtype of the abstract result.
//!
//! ## Language sketch
//!
//! ```text
//! (defn fact [n] (if (<= n 1) 1 (* n (fact (dec n)))))
//! (for [x [1 2] y [10 20]] (+ x y))          ; => [11 21 12 22]
//! (loop [i 0 acc []] (if (< i 3) (recur (inc i) (push acc i)) acc))
//! (update {} :a (fn [v] 0))                  ; => {"a" 0}
//! ```
//!
//! ## Modules
//!
//! - `types`: the bitmask type lattice
//! - `transfer`: dual-mode (concrete/abstract) transfer functions
//! - `value`: run-time values and function shapes
//! - `ast`: the AST node model
//! - `context`: persistent context stacks
//! - `evaluator`: the evaluation engine and special forms
//! - `builtinops`: the built-in function registry
//! - `analyzer`: unresolved-symbol detection and outcome enumeration
//! - `reader` / `parser`: source text to AST (feature `reader`)

use std::fmt;

/// Maximum nesting depth accepted by the reader
pub const MAX_PARSE_DEPTH: usize = 64;

/// Maximum number of nested function calls. The native stack grows on demand, so this
/// only stops runaway recursion; the language imposes no step budget of its own.
pub const MAX_CALL_DEPTH: usize = 2_000;

/// Maximum number of outcome programs the analyzer enumerates before giving up
pub const MAX_OUTCOMES: usize = 256;

/// Number of widening rounds type evaluation spends on a `loop` or recursive function
/// body before it gives up on precision and binds every parameter to `unknown`.
pub const MAX_FIXPOINT_ITERATIONS: usize = 16;

/// Categorizes the different kinds of parsing errors.
#[derive(Debug, PartialEq, Clone)]
pub enum ParseErrorKind {
    /// Invalid or unexpected syntax (bad tokens, malformed expressions)
    InvalidSyntax,
    /// Input ended before the expression was complete (EOF, unterminated string, unclosed parens)
    Incomplete,
    /// Expression nesting exceeded the maximum parse depth
    TooDeeplyNested,
    /// A special form whose structure is invalid (e.g. `let` without a binding vector)
    InvalidSpecialForm,
}

/// A structured error providing detailed information about a parsing failure.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Context snippet from the input showing where the error occurred (max 100 chars)
    pub context: Option<String>,
    /// The problematic token or character encountered, if identifiable
    pub found: Option<String>,
}

impl ParseError {
    /// Create a ParseError with all fields
    pub fn new(
        kind: ParseErrorKind,
        message: impl Into<String>,
        context: Option<String>,
        found: Option<String>,
    ) -> Self {
        ParseError {
            kind,
            message: message.into(),
            context,
            found,
        }
    }

    /// Create a simple ParseError with a kind and message but no context
    pub fn from_message(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, None, None)
    }

    /// Create a ParseError with context extracted from input at a given offset
    pub fn with_context(
        kind: ParseErrorKind,
        message: impl Into<String>,
        input: &str,
        error_offset: usize,
    ) -> Self {
        const MAX_CONTEXT: usize = 100;

        let context_start = error_offset.saturating_sub(20);
        let context_str: String = input
            .chars()
            .skip(context_start)
            .take(MAX_CONTEXT)
            .collect();

        let mut display_context = String::new();
        if context_start > 0 {
            display_context.push_str("[...]");
        }
        display_context.push_str(&context_str);
        if context_start + context_str.len() < input.len() {
            display_context.push_str("[...]");
        }

        let display_context = display_context.replace('\n', "\\n").replace('\r', "");
        let found = input.chars().skip(error_offset).take(10).collect::<String>();
        let found = (!found.is_empty()).then_some(found);

        Self::new(kind, message, Some(display_context), found)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParseError: {}", self.message)?;
        if let Some(found) = &self.found {
            write!(f, "\nFound: {found}")?;
        }
        if let Some(context) = &self.context {
            write!(f, "\nContext: {context}")?;
        }
        Ok(())
    }
}

/// Number of arguments accepted by a function or special form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Range(usize, usize),
    Any,
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match *self {
            Arity::Exact(n) => count == n,
            Arity::AtLeast(n) => count >= n,
            Arity::Range(min, max) => (min..=max).contains(&count),
            Arity::Any => true,
        }
    }

    /// Check an argument count against this arity
    pub fn validate(&self, count: usize) -> Result<(), Error> {
        if self.accepts(count) {
            Ok(())
        } else {
            Err(Error::arity_error(*self, count))
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
            Arity::Range(min, max) => write!(f, "{min} to {max}"),
            Arity::Any => write!(f, "any number of"),
        }
    }
}

fn arity_message(expected: &Arity, got: &usize, expression: &Option<String>) -> String {
    match expression {
        Some(expr) => format!("ArityError: {expr}: expected {expected} arguments, got {got}"),
        None => format!("ArityError: expected {expected} arguments but got {got}"),
    }
}

/// Error types for the interpreter
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    ParseError(ParseError),
    /// An identifier that is neither bound, a built-in, nor a reserved name
    #[error("Undefined symbol '{0}'")]
    UndefinedSymbol(String),
    #[error("{}", arity_message(.expected, .got, .expression))]
    ArityError {
        expected: Arity,
        got: usize,
        expression: Option<String>,
    },
    /// A concrete argument of the wrong shape, or a failed static subtype assertion
    #[error("Type error: {0}")]
    TypeError(String),
    #[error("EvaluationError: {0}")]
    EvalError(String),
    /// Raised by `throw` and the `assert*` family
    #[error("{0}")]
    UserError(String),
    /// A `recur` signal that escaped every `loop` and function frame
    #[error("recur is only allowed in tail position of a loop or function body")]
    RecurOutsideTail,
    #[error("{error}\n  at {location}")]
    Located {
        error: Box<Error>,
        location: ast::SourceLocation,
    },
}

impl Error {
    /// Create an ArityError without expression context
    pub fn arity_error(expected: Arity, got: usize) -> Self {
        Error::ArityError {
            expected,
            got,
            expression: None,
        }
    }

    /// Create an ArityError with expression context
    pub fn arity_error_with_expr(expected: Arity, got: usize, expression: String) -> Self {
        Error::ArityError {
            expected,
            got,
            expression: Some(expression),
        }
    }

    /// The error with any location wrappers removed
    pub fn root(&self) -> &Error {
        match self {
            Error::Located { error, .. } => error.root(),
            other => other,
        }
    }

    /// Source location of the innermost located wrapper, if any
    pub fn location(&self) -> Option<&ast::SourceLocation> {
        match self {
            Error::Located { error, location } => error.location().or(Some(location)),
            _ => None,
        }
    }

    /// Attach a source location unless one is already present
    pub(crate) fn at(self, location: Option<&ast::SourceLocation>) -> Self {
        match (self, location) {
            (err @ Error::Located { .. }, _) | (err @ Error::RecurOutsideTail, _) => err,
            (err, Some(location)) => Error::Located {
                error: Box::new(err),
                location: location.clone(),
            },
            (err, None) => err,
        }
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::ParseError(err)
    }
}

pub mod analyzer;
pub mod ast;
pub mod builtinops;
pub mod context;
pub mod evaluator;
pub mod transfer;
pub mod types;
pub mod value;

#[cfg(feature = "reader")]
pub mod parser;
#[cfg(feature = "reader")]
pub mod reader;

pub use context::{Context, ContextStack};
pub use evaluator::{Params, get_data_type, run};
pub use types::Type;
pub use value::Value;

/// Parse and run a program in one step
#[cfg(feature = "reader")]
pub fn run_source(source: &str, params: &Params) -> Result<Value, Error> {
    let ast = parser::parse(source)?;
    run(&ast, params)
}

/// Parse a program and compute the type of the values it may produce
#[cfg(feature = "reader")]
pub fn data_type_of_source(source: &str, params: &Params) -> Result<Type, Error> {
    let ast = parser::parse(source)?;
    get_data_type(&ast, params)
}
