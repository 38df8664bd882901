//! Lexical scopes.
//!
//! An [`Environment`] maps names to values for one scope and links to the
//! scope that encloses it.  Scopes are shared through `Rc<RefCell<_>>`: every
//! closure created while a scope is active keeps it alive, and a mutation made
//! through one holder is seen by all of them.
//!
//! Two ways of addressing a name exist.  The dynamic one (`get`, `assign`,
//! `is_defined`, `is_initialized`) searches outward from a scope and is only
//! used against the global scope.  The static one (`get_at`, `assign_at`)
//! walks a resolver‑computed number of parent links and touches exactly that
//! scope, which keeps closures correct when a name is shadowed after capture.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::trace;

use crate::value::Value;

/// Shared handle to a scope.
pub type EnvRef = Rc<RefCell<Environment>>;

/// Contents of one name slot.
#[derive(Debug, Clone)]
pub enum Binding {
    /// Declared by `var x;` and not assigned yet.
    Uninitialized,

    Value(Value),
}

#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Binding>,
    enclosing: Option<EnvRef>,
}

impl Environment {
    /// The global scope: no parent.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enclosing(enclosing: EnvRef) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Wrap into a shared handle.
    pub fn into_ref(self) -> EnvRef {
        Rc::new(RefCell::new(self))
    }

    /// Bind `name` in this scope to the uninitialized sentinel.
    pub fn declare(&mut self, name: &str) {
        trace!("declare '{}'", name);

        self.values.insert(name.to_owned(), Binding::Uninitialized);
    }

    /// Bind `name` in this scope, replacing any earlier binding (or sentinel).
    pub fn define(&mut self, name: &str, value: Value) {
        trace!("define '{}' = {}", name, value);

        self.values.insert(name.to_owned(), Binding::Value(value));
    }

    /// Is `name` bound here or in any enclosing scope?
    pub fn is_defined(&self, name: &str) -> bool {
        if self.values.contains_key(name) {
            return true;
        }

        match &self.enclosing {
            Some(parent) => parent.borrow().is_defined(name),
            None => false,
        }
    }

    /// Does the nearest binding of `name` hold a value?
    pub fn is_initialized(&self, name: &str) -> bool {
        match self.get(name) {
            Some(Binding::Value(_)) => true,
            Some(Binding::Uninitialized) | None => false,
        }
    }

    /// The nearest binding of `name`, searching outward.
    pub fn get(&self, name: &str) -> Option<Binding> {
        if let Some(binding) = self.values.get(name) {
            return Some(binding.clone());
        }

        self.enclosing
            .as_ref()
            .and_then(|parent| parent.borrow().get(name))
    }

    /// Overwrite the nearest existing binding of `name`.
    ///
    /// Returns `false` when no scope in the chain holds the name, in which case
    /// nothing is written.  Callers check existence first.
    pub fn assign(&mut self, name: &str, value: Value) -> bool {
        if let Some(slot) = self.values.get_mut(name) {
            *slot = Binding::Value(value);
            return true;
        }

        match &self.enclosing {
            Some(parent) => parent.borrow_mut().assign(name, value),
            None => false,
        }
    }

    /// Follow exactly `distance` parent links from `env`.
    ///
    /// `None` means the chain is shorter than `distance`, which a correct
    /// resolver never produces.
    pub fn ancestor(env: &EnvRef, distance: usize) -> Option<EnvRef> {
        let mut current: EnvRef = Rc::clone(env);

        for _ in 0..distance {
            let parent: EnvRef = current.borrow().enclosing.clone()?;
            current = parent;
        }

        Some(current)
    }

    /// The binding of `name` in exactly the scope `distance` links up.
    pub fn get_at(env: &EnvRef, distance: usize, name: &str) -> Option<Binding> {
        let scope: EnvRef = Self::ancestor(env, distance)?;
        let binding: Option<Binding> = scope.borrow().values.get(name).cloned();

        binding
    }

    /// `ancestor(distance).define(name, value)`.  Returns `false` if the chain
    /// is too short.
    pub fn assign_at(env: &EnvRef, distance: usize, name: &str, value: Value) -> bool {
        match Self::ancestor(env, distance) {
            Some(scope) => {
                scope.borrow_mut().define(name, value);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn number(binding: Option<Binding>) -> Option<f64> {
        match binding {
            Some(Binding::Value(Value::Number(n))) => Some(n),
            _ => None,
        }
    }

    #[test]
    fn declare_then_define_initializes() {
        let mut env = Environment::new();
        env.declare("a");

        assert!(env.is_defined("a"));
        assert!(!env.is_initialized("a"));

        env.define("a", Value::Number(1.0));
        assert!(env.is_initialized("a"));
        assert_eq!(number(env.get("a")), Some(1.0));
    }

    #[test]
    fn lookup_walks_to_parent() {
        let global = Environment::new().into_ref();
        global.borrow_mut().define("a", Value::Number(1.0));

        let inner = Environment::with_enclosing(Rc::clone(&global));
        assert!(inner.is_defined("a"));
        assert_eq!(number(inner.get("a")), Some(1.0));
        assert!(!inner.is_defined("b"));
        assert!(inner.get("b").is_none());
    }

    #[test]
    fn assign_writes_nearest_holder() {
        let global = Environment::new().into_ref();
        global.borrow_mut().define("a", Value::Number(1.0));

        let mut inner = Environment::with_enclosing(Rc::clone(&global));
        assert!(inner.assign("a", Value::Number(2.0)));
        assert_eq!(number(global.borrow().get("a")), Some(2.0));
    }

    #[test]
    fn assign_to_missing_global_is_a_no_op() {
        let mut global = Environment::new();

        assert!(!global.assign("missing", Value::Nil));
        assert!(!global.is_defined("missing"));
    }

    #[test]
    fn distance_addressing_ignores_shadowing() {
        let global = Environment::new().into_ref();
        global.borrow_mut().define("a", Value::Number(1.0));

        let block = Environment::with_enclosing(Rc::clone(&global)).into_ref();
        block.borrow_mut().define("a", Value::Number(2.0));

        let inner = Environment::with_enclosing(Rc::clone(&block)).into_ref();

        assert_eq!(number(Environment::get_at(&inner, 1, "a")), Some(2.0));
        assert_eq!(number(Environment::get_at(&inner, 2, "a")), Some(1.0));
        assert!(Environment::get_at(&inner, 0, "a").is_none());

        assert!(Environment::assign_at(&inner, 2, "a", Value::Number(3.0)));
        assert_eq!(number(global.borrow().get("a")), Some(3.0));
        assert_eq!(number(block.borrow().get("a")), Some(2.0));
    }

    #[test]
    fn ancestor_past_global_is_none() {
        let global = Environment::new().into_ref();
        let inner = Environment::with_enclosing(Rc::clone(&global)).into_ref();

        assert!(Environment::ancestor(&inner, 1).is_some());
        assert!(Environment::ancestor(&inner, 2).is_none());
    }
}
