use std::collections::HashMap;

use crate::ValueMap;

/// Anything the evaluator can resolve identifiers against.
pub trait VariableSource {
    fn get_variable(&self, name: &str) -> Option<f64>;
}

impl VariableSource for ValueMap {
    fn get_variable(&self, name: &str) -> Option<f64> {
        self.get(name).copied()
    }
}

impl VariableSource for HashMap<String, f64> {
    fn get_variable(&self, name: &str) -> Option<f64> {
        self.get(name).copied()
    }
}

/// A single scope level: the values written during one recalculation pass.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    variables: ValueMap,
}

impl Scope {
    pub fn new() -> Self {
        Scope::default()
    }

    pub fn get_variable(&self, name: &str) -> Option<f64> {
        self.variables.get(name).copied()
    }

    pub fn set_variable(&mut self, name: &str, value: f64) {
        self.variables.insert(name.to_string(), value);
    }

    pub fn into_values(self) -> ValueMap {
        self.variables
    }
}

/// A stack of scopes layered over a read-only base map (the input values).
/// Lookups search from the innermost scope outward, then fall back to the base.
#[derive(Debug)]
pub struct Environment<'a> {
    base: &'a ValueMap,
    scopes: Vec<Scope>,
}

impl<'a> Environment<'a> {
    pub fn new(base: &'a ValueMap) -> Self {
        Environment {
            base,
            scopes: Vec::new(),
        }
    }

    pub fn push_scope(&mut self, scope: Scope) {
        self.scopes.push(scope);
    }

    pub fn pop_scope(&mut self) -> Option<Scope> {
        self.scopes.pop()
    }

    /// Set a variable in the innermost scope, opening one if the stack is empty.
    pub fn set_variable(&mut self, name: &str, value: f64) {
        if self.scopes.is_empty() {
            self.scopes.push(Scope::new());
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.set_variable(name, value);
        }
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.get_variable(name).is_some()
    }
}

impl VariableSource for Environment<'_> {
    fn get_variable(&self, name: &str) -> Option<f64> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get_variable(name))
            .or_else(|| self.base.get(name).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_scopes_shadow_the_base() {
        let base = ValueMap::from([("x".to_string(), 1.0), ("y".to_string(), 2.0)]);
        let mut env = Environment::new(&base);
        assert_eq!(env.get_variable("x"), Some(1.0));

        env.push_scope(Scope::new());
        env.set_variable("x", 10.0);
        env.set_variable("z", 3.0);
        assert_eq!(env.get_variable("x"), Some(10.0));
        assert_eq!(env.get_variable("y"), Some(2.0));
        assert!(env.has_variable("z"));
        assert!(!env.has_variable("w"));

        let scope = env.pop_scope().unwrap();
        assert_eq!(env.get_variable("x"), Some(1.0));
        assert_eq!(env.get_variable("z"), None);
        assert_eq!(scope.into_values().len(), 2);
    }

    #[test]
    fn set_without_scope_opens_one() {
        let base = ValueMap::new();
        let mut env = Environment::new(&base);
        env.set_variable("a", 5.0);
        assert_eq!(env.get_variable("a"), Some(5.0));
        assert!(base.is_empty());
    }
}
