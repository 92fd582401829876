//! Turns [`Form`]s into the AST.
//!
//! Literal sugar is rewritten into ordinary calls (`[1 2]` becomes `(array 1 2)`,
//! `{:a 1}` becomes `(object "a" 1)`, `#"a+"` becomes `(regexp "a+")`) and the function
//! shorthand `#(+ %1 %2)` becomes `(fn [%1 %2] (+ %1 %2))`. Special forms are checked
//! for their structure here, so the evaluator never sees a malformed one.

use crate::ast::{
    Ast, Binding, CondClause, Conditional, FunctionDefinition, FunctionOverload, LoopBinding,
    Modifier, Node, NodeKind, ReservedName, SourceLocation, SpecialExpression, call,
    call_expression, num, string,
};
use crate::reader::{Form, FormKind, read};
use crate::{Arity, Error, ParseError, ParseErrorKind};
use log::trace;
use std::cell::Cell;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, Default)]
pub struct ParseConfig {
    /// Attach a [`SourceLocation`] to every node
    pub debug: bool,
}

/// Parse a program without source locations
pub fn parse(source: &str) -> Result<Ast, Error> {
    parse_with_config(source, ParseConfig::default())
}

pub fn parse_with_config(source: &str, config: ParseConfig) -> Result<Ast, Error> {
    let forms = read(source)?;
    trace!("parsing {} top-level forms", forms.len());
    let parser = Parser {
        source,
        config,
        in_shorthand: Cell::new(false),
    };
    let body = forms
        .iter()
        .map(|form| parser.node(form))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Ast {
        body,
        has_debug_data: config.debug,
    })
}

struct Parser<'a> {
    source: &'a str,
    config: ParseConfig,
    in_shorthand: Cell<bool>,
}

/// `%` and `%n` inside a function shorthand
fn shorthand_index(symbol: &str) -> Option<usize> {
    match symbol.strip_prefix('%')? {
        "" => Some(1),
        digits => digits.parse().ok().filter(|n| *n > 0),
    }
}

/// Highest argument index used by a shorthand body
fn shorthand_arity(forms: &[Form]) -> usize {
    forms
        .iter()
        .map(|form| match &form.kind {
            FormKind::Symbol(symbol) => shorthand_index(symbol).unwrap_or(0),
            FormKind::List(items) | FormKind::Array(items) | FormKind::Object(items) => {
                shorthand_arity(items)
            }
            _ => 0,
        })
        .max()
        .unwrap_or(0)
}

fn is_symbol(form: &Form, name: &str) -> bool {
    matches!(&form.kind, FormKind::Symbol(s) if s == name)
}

impl Parser<'_> {
    fn location(&self, offset: usize) -> SourceLocation {
        let before = &self.source[..offset];
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        let code = self.source[line_start..].lines().next().unwrap_or("").to_owned();
        SourceLocation {
            line: before.matches('\n').count() + 1,
            column: before[line_start..].chars().count() + 1,
            code,
        }
    }

    fn located(&self, node: Node, form: &Form) -> Node {
        if self.config.debug {
            node.with_location(Some(self.location(form.offset)))
        } else {
            node
        }
    }

    fn invalid(&self, form: &Form, message: impl Into<String>) -> Error {
        let position = self.source[..form.offset].chars().count();
        Error::ParseError(ParseError::with_context(
            ParseErrorKind::InvalidSpecialForm,
            message,
            self.source,
            position,
        ))
    }

    fn nodes(&self, forms: &[Form]) -> Result<Vec<Node>, Error> {
        forms.iter().map(|form| self.node(form)).collect()
    }

    fn node(&self, form: &Form) -> Result<Node, Error> {
        let node = match &form.kind {
            FormKind::Number(n) => num(*n),
            FormKind::String(s) | FormKind::Keyword(s) => string(s.clone()),
            FormKind::Symbol(symbol) => self.symbol(symbol),
            FormKind::Array(items) => call("array", self.nodes(items)?),
            FormKind::Object(items) => {
                if items.len() % 2 != 0 {
                    return Err(self.invalid(form, "object literal needs an even number of forms"));
                }
                call("object", self.nodes(items)?)
            }
            FormKind::Regexp { source, flags } => {
                let mut params = vec![string(source.clone())];
                if !flags.is_empty() {
                    params.push(string(flags.clone()));
                }
                call("regexp", params)
            }
            FormKind::FnShorthand(items) => self.shorthand(form, items)?,
            FormKind::List(items) => self.list(form, items)?,
        };
        Ok(self.located(node, form))
    }

    fn symbol(&self, symbol: &str) -> Node {
        if let Some(reserved) = ReservedName::from_name(symbol) {
            return Node::new(NodeKind::ReservedName(reserved));
        }
        if let Some(modifier) = Modifier::from_name(symbol) {
            return Node::new(NodeKind::Modifier(modifier));
        }
        if self.in_shorthand.get() && symbol == "%" {
            return Node::new(NodeKind::Name("%1".to_owned()));
        }
        Node::new(NodeKind::Name(symbol.to_owned()))
    }

    fn shorthand(&self, form: &Form, items: &[Form]) -> Result<Node, Error> {
        if self.in_shorthand.get() {
            return Err(self.invalid(form, "function shorthands cannot be nested"));
        }
        if items.is_empty() {
            return Err(self.invalid(form, "empty function shorthand"));
        }
        self.in_shorthand.set(true);
        let body = self.list(form, items);
        self.in_shorthand.set(false);
        let params = (1..=shorthand_arity(items)).map(|i| format!("%{i}")).collect();
        Ok(Node::special(SpecialExpression::Fn(Rc::new(FunctionDefinition {
            name: None,
            overloads: vec![FunctionOverload {
                params,
                rest: None,
                body: vec![self.located(body?, form)],
            }],
        }))))
    }

    fn list(&self, form: &Form, items: &[Form]) -> Result<Node, Error> {
        let Some((first, args)) = items.split_first() else {
            return Err(self.invalid(form, "empty list"));
        };
        match &first.kind {
            FormKind::Symbol(name) if SpecialExpression::is_special_name(name) => {
                let special = self.special(form, name, args)?;
                Ok(Node::special(special))
            }
            FormKind::Symbol(name) if ReservedName::from_name(name).is_none() => {
                Ok(call(name.clone(), self.nodes(args)?))
            }
            _ => Ok(call_expression(self.node(first)?, self.nodes(args)?)),
        }
    }

    fn expect_args(&self, form: &Form, name: &str, args: &[Form], arity: Arity) -> Result<(), Error> {
        if arity.accepts(args.len()) {
            Ok(())
        } else {
            Err(self.invalid(
                form,
                format!("{name}: expected {arity} arguments, got {}", args.len()),
            ))
        }
    }

    fn special(&self, form: &Form, name: &str, args: &[Form]) -> Result<SpecialExpression, Error> {
        let special = match name {
            "and" => SpecialExpression::And(self.nodes(args)?),
            "or" => SpecialExpression::Or(self.nodes(args)?),
            "??" => {
                self.expect_args(form, name, args, Arity::Range(1, 2))?;
                SpecialExpression::Coalesce {
                    value: self.node(&args[0])?,
                    default: args.get(1).map(|arg| self.node(arg)).transpose()?,
                }
            }
            "cond" => {
                if args.len() % 2 != 0 {
                    return Err(self.invalid(form, "cond needs test/form pairs"));
                }
                SpecialExpression::Cond(
                    args.chunks(2)
                        .map(|pair| {
                            Ok(CondClause {
                                test: self.node(&pair[0])?,
                                form: self.node(&pair[1])?,
                            })
                        })
                        .collect::<Result<_, Error>>()?,
                )
            }
            "if" | "if-not" => {
                self.expect_args(form, name, args, Arity::Range(2, 3))?;
                let conditional = Conditional {
                    test: self.node(&args[0])?,
                    then: self.node(&args[1])?,
                    otherwise: args.get(2).map(|arg| self.node(arg)).transpose()?,
                };
                if name == "if" {
                    SpecialExpression::If(conditional)
                } else {
                    SpecialExpression::IfNot(conditional)
                }
            }
            "if-let" => {
                self.expect_args(form, name, args, Arity::Range(2, 3))?;
                SpecialExpression::IfLet {
                    binding: self.single_binding(&args[0], name)?,
                    then: self.node(&args[1])?,
                    otherwise: args.get(2).map(|arg| self.node(arg)).transpose()?,
                }
            }
            "when" | "when-not" => {
                self.expect_args(form, name, args, Arity::AtLeast(1))?;
                let test = self.node(&args[0])?;
                let body = self.nodes(&args[1..])?;
                if name == "when" {
                    SpecialExpression::When { test, body }
                } else {
                    SpecialExpression::WhenNot { test, body }
                }
            }
            "when-let" | "when-first" => {
                self.expect_args(form, name, args, Arity::AtLeast(1))?;
                let binding = self.single_binding(&args[0], name)?;
                let body = self.nodes(&args[1..])?;
                if name == "when-let" {
                    SpecialExpression::WhenLet { binding, body }
                } else {
                    SpecialExpression::WhenFirst { binding, body }
                }
            }
            "let" | "loop" => {
                self.expect_args(form, name, args, Arity::AtLeast(1))?;
                let bindings = self.bindings(&args[0], name)?;
                let body = self.nodes(&args[1..])?;
                if name == "let" {
                    SpecialExpression::Let { bindings, body }
                } else {
                    SpecialExpression::Loop { bindings, body }
                }
            }
            "recur" => SpecialExpression::Recur(self.nodes(args)?),
            "do" => SpecialExpression::Do(self.nodes(args)?),
            "def" => {
                self.expect_args(form, name, args, Arity::Exact(2))?;
                SpecialExpression::Def {
                    name: self.binding_name(&args[0])?,
                    value: self.node(&args[1])?,
                }
            }
            "defn" => {
                self.expect_args(form, name, args, Arity::AtLeast(2))?;
                let function_name = self.binding_name(&args[0])?;
                SpecialExpression::Defn(self.function(form, Some(function_name), &args[1..])?)
            }
            "fn" => {
                self.expect_args(form, name, args, Arity::AtLeast(1))?;
                SpecialExpression::Fn(self.function(form, None, args)?)
            }
            "for" | "doseq" => {
                self.expect_args(form, name, args, Arity::Exact(2))?;
                let bindings = self.loop_bindings(&args[0], name)?;
                let body = self.node(&args[1])?;
                if name == "for" {
                    SpecialExpression::For { bindings, body }
                } else {
                    SpecialExpression::Doseq { bindings, body }
                }
            }
            "throw" => {
                self.expect_args(form, name, args, Arity::Exact(1))?;
                SpecialExpression::Throw(self.node(&args[0])?)
            }
            "try" => {
                self.expect_args(form, name, args, Arity::Exact(2))?;
                self.try_catch(&args[0], &args[1])?
            }
            "time!" => {
                self.expect_args(form, name, args, Arity::Exact(1))?;
                SpecialExpression::Time(self.node(&args[0])?)
            }
            "declared?" => {
                self.expect_args(form, name, args, Arity::Exact(1))?;
                match &args[0].kind {
                    FormKind::Symbol(symbol) => SpecialExpression::Declared(symbol.clone()),
                    _ => return Err(self.invalid(&args[0], "declared? expects a name")),
                }
            }
            other => return Err(self.invalid(form, format!("unknown special form {other}"))),
        };
        Ok(special)
    }

    /// A name that may be bound: no reserved name, special form or modifier
    fn binding_name(&self, form: &Form) -> Result<String, Error> {
        let FormKind::Symbol(symbol) = &form.kind else {
            return Err(self.invalid(form, "expected a name"));
        };
        if ReservedName::from_name(symbol).is_some() {
            return Err(self.invalid(form, format!("cannot bind reserved name {symbol}")));
        }
        if SpecialExpression::is_special_name(symbol) {
            return Err(self.invalid(form, format!("cannot bind special form name {symbol}")));
        }
        if symbol.starts_with('&') {
            return Err(self.invalid(form, format!("cannot bind modifier {symbol}")));
        }
        Ok(symbol.clone())
    }

    fn binding_pairs(&self, pairs: &[Form]) -> Result<Vec<Binding>, Error> {
        pairs
            .chunks(2)
            .map(|pair| {
                Ok(Binding {
                    name: self.binding_name(&pair[0])?,
                    value: self.node(&pair[1])?,
                })
            })
            .collect()
    }

    /// `[name value ...]`
    fn bindings(&self, form: &Form, what: &str) -> Result<Vec<Binding>, Error> {
        match &form.kind {
            FormKind::Array(items) if items.len() % 2 == 0 => self.binding_pairs(items),
            _ => Err(self.invalid(form, format!("{what} expects a vector of name/value pairs"))),
        }
    }

    /// `[name value]`
    fn single_binding(&self, form: &Form, what: &str) -> Result<Binding, Error> {
        match &form.kind {
            FormKind::Array(items) if items.len() == 2 => {
                Ok(self.binding_pairs(items)?.remove(0))
            }
            _ => Err(self.invalid(form, format!("{what} expects a single [name value] binding"))),
        }
    }

    /// `[x xs &let [y (f x)] &while (g y) &when (h y) ...]`
    fn loop_bindings(&self, form: &Form, what: &str) -> Result<Vec<LoopBinding>, Error> {
        let FormKind::Array(items) = &form.kind else {
            return Err(self.invalid(form, format!("{what} expects a binding vector")));
        };
        if items.is_empty() {
            return Err(self.invalid(form, format!("{what} needs at least one binding")));
        }
        let mut levels: Vec<LoopBinding> = Vec::new();
        let mut rest = items.as_slice();
        while let Some((head, tail)) = rest.split_first() {
            let Some((argument, tail)) = tail.split_first() else {
                return Err(self.invalid(head, format!("{what}: binding is missing its value")));
            };
            rest = tail;
            let modifier = match &head.kind {
                FormKind::Symbol(symbol) => Modifier::from_name(symbol),
                _ => None,
            };
            match modifier {
                None => levels.push(LoopBinding {
                    binding: Binding {
                        name: self.binding_name(head)?,
                        value: self.node(argument)?,
                    },
                    lets: Vec::new(),
                    when: None,
                    while_: None,
                }),
                Some(modifier) => {
                    let Some(level) = levels.last_mut() else {
                        return Err(self.invalid(head, format!("{what}: modifier before any binding")));
                    };
                    match modifier {
                        Modifier::Let => level.lets.extend(self.bindings(argument, "&let")?),
                        Modifier::When if level.when.is_none() => level.when = Some(self.node(argument)?),
                        Modifier::While if level.while_.is_none() => {
                            level.while_ = Some(self.node(argument)?);
                        }
                        _ => {
                            return Err(self.invalid(
                                head,
                                format!("{what}: unexpected modifier {}", modifier.name()),
                            ));
                        }
                    }
                }
            }
        }
        Ok(levels)
    }

    /// `[a b & rest]`
    fn parameters(&self, form: &Form) -> Result<(Vec<String>, Option<String>), Error> {
        let FormKind::Array(items) = &form.kind else {
            return Err(self.invalid(form, "expected a parameter vector"));
        };
        let mut params = Vec::new();
        let mut iter = items.iter();
        while let Some(item) = iter.next() {
            if is_symbol(item, "&") {
                let rest = match (iter.next(), iter.next()) {
                    (Some(rest), None) => self.binding_name(rest)?,
                    _ => return Err(self.invalid(item, "& must be followed by exactly one name")),
                };
                return Ok((params, Some(rest)));
            }
            let param = self.binding_name(item)?;
            if params.contains(&param) {
                return Err(self.invalid(item, format!("duplicate parameter {param}")));
            }
            params.push(param);
        }
        Ok((params, None))
    }

    /// `[params] body...` or `([params] body...)+`
    fn function(
        &self,
        form: &Form,
        name: Option<String>,
        args: &[Form],
    ) -> Result<Rc<FunctionDefinition>, Error> {
        let overloads = match args.first().map(|arg| &arg.kind) {
            Some(FormKind::Array(_)) => vec![self.overload(&args[0], &args[1..])?],
            _ => args
                .iter()
                .map(|arg| match &arg.kind {
                    FormKind::List(items) if !items.is_empty() => self.overload(&items[0], &items[1..]),
                    _ => Err(self.invalid(arg, "expected ([params] body...)")),
                })
                .collect::<Result<Vec<_>, _>>()?,
        };
        if overloads.is_empty() {
            return Err(self.invalid(form, "function without parameters"));
        }
        for (i, overload) in overloads.iter().enumerate() {
            let clashes = overloads[..i].iter().any(|other| {
                other.params.len() == overload.params.len() || (other.rest.is_some() && overload.rest.is_some())
            });
            if clashes {
                return Err(self.invalid(form, "overloads must differ in arity"));
            }
        }
        Ok(Rc::new(FunctionDefinition { name, overloads }))
    }

    fn overload(&self, params: &Form, body: &[Form]) -> Result<FunctionOverload, Error> {
        let (params, rest) = self.parameters(params)?;
        Ok(FunctionOverload {
            params,
            rest,
            body: self.nodes(body)?,
        })
    }

    /// `(try body (catch name handler))`; the name may be left out
    fn try_catch(&self, body: &Form, catch: &Form) -> Result<SpecialExpression, Error> {
        let (error_name, handler) = match &catch.kind {
            FormKind::List(items) if !items.is_empty() && is_symbol(&items[0], "catch") => {
                match &items[1..] {
                    [handler] => (None, handler),
                    [name, handler] => (Some(self.binding_name(name)?), handler),
                    _ => return Err(self.invalid(catch, "catch expects (catch name handler)")),
                }
            }
            _ => return Err(self.invalid(catch, "try expects a (catch ...) clause")),
        };
        Ok(SpecialExpression::Try {
            body: self.node(body)?,
            error_name,
            handler: self.node(handler)?,
        })
    }
}
