use std::{cell::RefCell, collections::HashMap, rc::Rc};

use crate::lexer::Token;

use super::{RuntimeError, Value};

/// Environments are shared: every closure keeps its captured frame alive,
/// and many children can point at one ancestor.
pub type EnvRef = Rc<RefCell<Environment>>;

/// A single environment frame: name bindings plus a link to the enclosing
/// frame. Lookups that are not covered by the resolver's side table walk the
/// parent chain; resolved lookups jump straight to the recorded ancestor.
#[derive(Default, Debug)]
pub struct Environment {
    values: HashMap<String, Value>,
    parent: Option<EnvRef>,
}

impl Environment {
    pub fn global() -> EnvRef {
        Rc::new(RefCell::new(Self::default()))
    }

    pub fn with_parent(parent: EnvRef) -> EnvRef {
        Rc::new(RefCell::new(Self {
            values: HashMap::new(),
            parent: Some(parent),
        }))
    }

    /// Bind a name in this frame, shadowing any outer binding.
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    /// Walk-up lookup, used for names the resolver left to the globals.
    pub fn get(&self, name: &Token) -> Result<Value, RuntimeError> {
        if let Some(value) = self.values.get(&name.lexeme) {
            return Ok(value.clone());
        }

        if let Some(parent) = &self.parent {
            return parent.borrow().get(name);
        }

        Err(RuntimeError::new(
            name,
            format!("Undefined variable '{}'.", name.lexeme),
        ))
    }

    /// Walk-up assignment. Assignment never creates a binding; the name must
    /// already exist somewhere on the chain.
    pub fn assign(&mut self, name: &Token, value: Value) -> Result<(), RuntimeError> {
        if self.values.contains_key(&name.lexeme) {
            self.values.insert(name.lexeme.clone(), value);
            return Ok(());
        }

        if let Some(parent) = &self.parent {
            return parent.borrow_mut().assign(name, value);
        }

        Err(RuntimeError::new(
            name,
            format!("Undefined variable '{}'.", name.lexeme),
        ))
    }

    /// Read a name at an exact distance up the chain.
    pub fn get_at(env: &EnvRef, distance: usize, name: &Token) -> Result<Value, RuntimeError> {
        Self::ancestor(env, distance)
            .and_then(|ancestor| ancestor.borrow().values.get(&name.lexeme).cloned())
            .ok_or_else(|| {
                RuntimeError::new(name, format!("Undefined variable '{}'.", name.lexeme))
            })
    }

    /// Like [`Environment::get_at`] for the interpreter's own bindings
    /// (`this`, `super`), which have no source token.
    pub fn get_at_name(env: &EnvRef, distance: usize, name: &str) -> Option<Value> {
        Self::ancestor(env, distance).and_then(|ancestor| ancestor.borrow().values.get(name).cloned())
    }

    /// Assign a name at an exact distance up the chain.
    pub fn assign_at(
        env: &EnvRef,
        distance: usize,
        name: &Token,
        value: Value,
    ) -> Result<(), RuntimeError> {
        let Some(ancestor) = Self::ancestor(env, distance) else {
            return Err(RuntimeError::new(
                name,
                format!("Undefined variable '{}'.", name.lexeme),
            ));
        };

        ancestor.borrow_mut().values.insert(name.lexeme.clone(), value);
        Ok(())
    }

    fn ancestor(env: &EnvRef, distance: usize) -> Option<EnvRef> {
        let mut current = Rc::clone(env);

        for _ in 0..distance {
            let parent = current.borrow().parent.clone()?;
            current = parent;
        }

        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use crate::lexer::TokenKind;

    use super::*;

    fn token(name: &str) -> Token {
        Token::new(TokenKind::Identifier, name, 1)
    }

    #[test]
    fn test_define_and_get() {
        let env = Environment::global();
        env.borrow_mut().define("a", Value::Number(1.0));

        assert_eq!(env.borrow().get(&token("a")), Ok(Value::Number(1.0)));
    }

    #[test]
    fn test_get_walks_the_parent_chain() {
        let parent = Environment::global();
        parent.borrow_mut().define("a", Value::Number(1.0));
        let child = Environment::with_parent(Rc::clone(&parent));

        assert_eq!(child.borrow().get(&token("a")), Ok(Value::Number(1.0)));
    }

    #[test]
    fn test_get_undefined() {
        let env = Environment::global();

        let error = env.borrow().get(&token("missing")).unwrap_err();
        assert_eq!(error.message, "Undefined variable 'missing'.");
    }

    #[test]
    fn test_assign_updates_the_declaring_frame() {
        let parent = Environment::global();
        parent.borrow_mut().define("a", Value::Number(1.0));
        let child = Environment::with_parent(Rc::clone(&parent));

        child
            .borrow_mut()
            .assign(&token("a"), Value::Number(2.0))
            .unwrap();

        assert_eq!(parent.borrow().get(&token("a")), Ok(Value::Number(2.0)));
    }

    #[test]
    fn test_assign_never_creates_bindings() {
        let env = Environment::global();

        let error = env
            .borrow_mut()
            .assign(&token("a"), Value::Null)
            .unwrap_err();
        assert_eq!(error.message, "Undefined variable 'a'.");
    }

    #[test]
    fn test_get_at_skips_shadowing_frames() {
        let grandparent = Environment::global();
        grandparent.borrow_mut().define("a", Value::Number(1.0));
        let parent = Environment::with_parent(Rc::clone(&grandparent));
        parent.borrow_mut().define("a", Value::Number(2.0));
        let child = Environment::with_parent(Rc::clone(&parent));

        assert_eq!(
            Environment::get_at(&child, 2, &token("a")),
            Ok(Value::Number(1.0))
        );
        assert_eq!(
            Environment::get_at(&child, 1, &token("a")),
            Ok(Value::Number(2.0))
        );
    }

    #[test]
    fn test_assign_at_targets_the_exact_frame() {
        let parent = Environment::global();
        parent.borrow_mut().define("a", Value::Number(1.0));
        let child = Environment::with_parent(Rc::clone(&parent));

        Environment::assign_at(&child, 1, &token("a"), Value::Number(3.0)).unwrap();

        assert_eq!(parent.borrow().get(&token("a")), Ok(Value::Number(3.0)));
    }
}
