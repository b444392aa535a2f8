use std::cell::RefCell;
use std::fmt::{self, Display};
use std::rc::Rc;

use crate::parser::ast::FunctionDecl;

use super::class::{LoxClass, LoxInstance};
use super::environment::{EnvRef, Environment};
use super::{Flow, Interpreter, RuntimeError, Value};

/// Anything invocable at runtime: user functions, classes used as
/// constructors, and host natives. A closed enum keeps call dispatch
/// exhaustive.
#[derive(Debug, Clone)]
pub enum Callable {
    Function(Rc<LoxFunction>),
    Class(Rc<LoxClass>),
    Native(Rc<NativeFunction>),
}

impl Callable {
    pub fn arity(&self) -> usize {
        match self {
            Callable::Function(function) => function.arity(),
            Callable::Class(class) => class.arity(),
            Callable::Native(native) => native.arity,
        }
    }

    pub fn call(
        &self,
        interpreter: &mut Interpreter,
        arguments: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        match self {
            Callable::Function(function) => function.call(interpreter, arguments),
            Callable::Class(class) => LoxClass::instantiate(class, interpreter, arguments),
            Callable::Native(native) => Ok((native.func)(&arguments)),
        }
    }

    /// Identity comparison; callables never compare by structure.
    pub fn ptr_eq(&self, other: &Callable) -> bool {
        match (self, other) {
            (Callable::Function(left), Callable::Function(right)) => Rc::ptr_eq(left, right),
            (Callable::Class(left), Callable::Class(right)) => Rc::ptr_eq(left, right),
            (Callable::Native(left), Callable::Native(right)) => Rc::ptr_eq(left, right),
            _ => false,
        }
    }
}

impl Display for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Function(function) => {
                write!(f, "<fn {}>", function.declaration.name.lexeme)
            }
            Callable::Class(class) => write!(f, "<class {}>", class.name),
            Callable::Native(_) => f.write_str("<native fn>"),
        }
    }
}

/// A user function: the declaration node paired with the environment
/// captured at the declaration site.
#[derive(Debug)]
pub struct LoxFunction {
    pub declaration: Rc<FunctionDecl>,
    pub closure: EnvRef,
    pub is_initializer: bool,
}

impl LoxFunction {
    pub fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    /// A bound method is a fresh function whose closure has exactly one
    /// extra frame binding `this`. The original closure is never mutated.
    pub fn bind(&self, instance: Rc<RefCell<LoxInstance>>) -> LoxFunction {
        let environment = Environment::with_parent(Rc::clone(&self.closure));
        environment
            .borrow_mut()
            .define("this", Value::Instance(instance));

        LoxFunction {
            declaration: Rc::clone(&self.declaration),
            closure: environment,
            is_initializer: self.is_initializer,
        }
    }

    pub fn call(
        &self,
        interpreter: &mut Interpreter,
        arguments: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let environment = Environment::with_parent(Rc::clone(&self.closure));
        for (param, argument) in self.declaration.params.iter().zip(arguments) {
            environment.borrow_mut().define(&param.lexeme, argument);
        }

        let flow = interpreter.execute_block(&self.declaration.body, environment)?;

        // an initializer always hands back its instance, even on a bare return
        if self.is_initializer {
            return Ok(Environment::get_at_name(&self.closure, 0, "this").unwrap_or(Value::Null));
        }

        match flow {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Null),
        }
    }
}

/// A host function exposed to programs. Arity is fixed at construction.
#[derive(Debug)]
pub struct NativeFunction {
    pub name: String,
    pub arity: usize,
    pub func: fn(&[Value]) -> Value,
}
