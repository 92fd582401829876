//! Persistent scoping for the evaluator.
//!
//! A [`ContextStack`] is an immutable chain of [`Context`]s, innermost first, in front of
//! one shared global context. Pushing a scope with [`ContextStack::with_context`] returns a
//! new stack; the receiver is never changed, so closures can hold on to the exact stack
//! they were created in. Only `def`/`defn` write, and they write to the global context.

use crate::value::Value;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub struct ContextEntry {
    pub value: Value,
}

/// One scope: a mapping from unique names to entries
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Context {
    bindings: HashMap<String, ContextEntry>,
}

impl Context {
    pub fn new() -> Self {
        Context::default()
    }

    pub fn define<S: Into<String>>(&mut self, name: S, value: Value) {
        self.bindings.insert(name.into(), ContextEntry { value });
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name).map(|entry| &entry.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.bindings.iter().map(|(name, entry)| (name, &entry.value))
    }

    /// The same names with every value passed through `f`
    pub fn map_values(&self, f: impl Fn(&Value) -> Value) -> Context {
        Context {
            bindings: self
                .bindings
                .iter()
                .map(|(name, entry)| {
                    (
                        name.clone(),
                        ContextEntry {
                            value: f(&entry.value),
                        },
                    )
                })
                .collect(),
        }
    }
}

impl<S: Into<String>> FromIterator<(S, Value)> for Context {
    fn from_iter<I: IntoIterator<Item = (S, Value)>>(iter: I) -> Self {
        let mut context = Context::new();
        for (name, value) in iter {
            context.define(name, value);
        }
        context
    }
}

#[derive(Debug)]
struct Frame {
    context: Context,
    parent: Option<Rc<Frame>>,
}

/// Chain of scopes, innermost first, ending in the shared global context
#[derive(Clone)]
pub struct ContextStack {
    frames: Option<Rc<Frame>>,
    global: Rc<RefCell<Context>>,
}

impl ContextStack {
    pub fn new(global: Rc<RefCell<Context>>) -> Self {
        ContextStack {
            frames: None,
            global,
        }
    }

    /// A new stack with `context` as its innermost scope
    pub fn with_context(&self, context: Context) -> ContextStack {
        ContextStack {
            frames: Some(Rc::new(Frame {
                context,
                parent: self.frames.clone(),
            })),
            global: Rc::clone(&self.global),
        }
    }

    fn frames(&self) -> impl Iterator<Item = &Frame> {
        std::iter::successors(self.frames.as_deref(), |frame| frame.parent.as_deref())
    }

    /// Innermost binding of `name`, falling back to the global context
    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.frames()
            .find_map(|frame| frame.context.get(name).cloned())
            .or_else(|| self.global.borrow().get(name).cloned())
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.frames().any(|frame| frame.context.contains(name))
            || self.global.borrow().contains(name)
    }

    /// Write to the shared global context, visible through every stack that shares it
    pub fn define_global<S: Into<String>>(&self, name: S, value: Value) {
        self.global.borrow_mut().define(name, value);
    }

    pub fn global(&self) -> Rc<RefCell<Context>> {
        Rc::clone(&self.global)
    }

    /// Every name bound anywhere in the stack
    pub fn names(&self) -> HashSet<String> {
        let mut names: HashSet<String> = self.global.borrow().iter().map(|(n, _)| n.clone()).collect();
        for frame in self.frames() {
            names.extend(frame.context.iter().map(|(n, _)| n.clone()));
        }
        names
    }

    /// Number of scopes in front of the global context
    pub fn depth(&self) -> usize {
        self.frames().count()
    }
}

impl Default for ContextStack {
    fn default() -> Self {
        ContextStack::new(Rc::new(RefCell::new(Context::new())))
    }
}

impl fmt::Debug for ContextStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContextStack(depth={})", self.depth())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_innermost_binding_wins() {
        let stack = ContextStack::default();
        stack.define_global("x", Value::from(1));
        assert_eq!(stack.lookup("x"), Some(Value::from(1)));

        let inner = stack.with_context([("x", Value::from(2))].into_iter().collect());
        let innermost = inner.with_context([("y", Value::from(3))].into_iter().collect());
        assert_eq!(innermost.lookup("x"), Some(Value::from(2)));
        assert_eq!(innermost.lookup("y"), Some(Value::from(3)));
        assert_eq!(innermost.depth(), 2);

        // The outer stack never sees the pushed scopes
        assert_eq!(stack.lookup("x"), Some(Value::from(1)));
        assert_eq!(stack.lookup("y"), None);
        assert!(!stack.is_bound("y"));
    }

    #[test]
    fn test_global_writes_are_shared() {
        let stack = ContextStack::default();
        let captured = stack.with_context(Context::new());
        stack.define_global("late", Value::from("defined later"));
        assert_eq!(captured.lookup("late"), Some(Value::from("defined later")));
        assert!(captured.names().contains("late"));
    }
}
