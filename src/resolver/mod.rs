mod scope;

pub use self::scope::*;

use std::collections::HashMap;
use std::rc::Rc;
use std::{error::Error, fmt::Display};

use crate::interpreter::INITIALIZER;
use crate::lexer::Token;
use crate::parser::ast::{Expr, FunctionDecl, NodeId, Stmt, SuperclassRef};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverError {
    pub message: String,
    pub line: usize,
    pub lexeme: String,
}

impl Display for ResolverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[line {}] Resolve error at '{}': {}",
            self.line, self.lexeme, self.message
        )
    }
}

impl Error for ResolverError {}

/// What kind of function body we are currently resolving. Guards `return`
/// placement and distinguishes initializers from plain methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FunctionContext {
    None,
    Function,
    Method,
    Initializer,
}

/// Whether we are inside a class body, and if so whether it has a
/// superclass. Guards `this` and `super`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClassContext {
    None,
    Class,
    Subclass,
}

/// The resolution pass: a single AST walk that computes, for every binding
/// expression, the number of environment hops between its use site and its
/// declaration. The result is a side table the interpreter consults on each
/// variable access; names missing from it resolve in globals.
///
/// Static errors are collected and resolution continues, so one pass reports
/// everything it can find.
pub struct Resolver {
    scopes: ScopeStack,
    locals: HashMap<NodeId, usize>,
    errors: Vec<ResolverError>,
    current_function: FunctionContext,
    current_class: ClassContext,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    pub fn new() -> Self {
        Self {
            scopes: ScopeStack::default(),
            locals: HashMap::new(),
            errors: Vec::new(),
            current_function: FunctionContext::None,
            current_class: ClassContext::None,
        }
    }

    pub fn resolve(mut self, statements: &[Stmt]) -> (HashMap<NodeId, usize>, Vec<ResolverError>) {
        for statement in statements {
            self.resolve_stmt(statement);
        }

        (self.locals, self.errors)
    }

    fn resolve_stmt(&mut self, statement: &Stmt) {
        match statement {
            Stmt::Expression { expr } | Stmt::Print { expr } => self.resolve_expr(expr),
            Stmt::Var { name, initializer } => self.resolve_var_stmt(name, initializer.as_ref()),
            Stmt::Block { statements } => {
                self.scopes.push();
                for statement in statements {
                    self.resolve_stmt(statement);
                }
                self.scopes.pop();
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(else_branch);
                }
            }
            Stmt::While { condition, body } => {
                self.resolve_expr(condition);
                self.resolve_stmt(body);
            }
            Stmt::Function { declaration } => {
                self.declare(&declaration.name);
                self.scopes.define(&declaration.name.lexeme);
                self.resolve_function(declaration, FunctionContext::Function);
            }
            Stmt::Return { keyword, value } => self.resolve_return_stmt(keyword, value.as_ref()),
            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.resolve_class_stmt(name, superclass.as_ref(), methods),
        }
    }

    fn resolve_var_stmt(&mut self, name: &Token, initializer: Option<&Expr>) {
        self.declare(name);
        if let Some(initializer) = initializer {
            self.resolve_expr(initializer);
        }
        self.scopes.define(&name.lexeme);
    }

    fn resolve_return_stmt(&mut self, keyword: &Token, value: Option<&Expr>) {
        if self.current_function == FunctionContext::None {
            self.error(keyword, "Can't return from top-level code.");
        }

        if let Some(value) = value {
            if self.current_function == FunctionContext::Initializer {
                self.error(keyword, "Can't return a value from constructor.");
            }
            self.resolve_expr(value);
        }
    }

    fn resolve_class_stmt(
        &mut self,
        name: &Token,
        superclass: Option<&SuperclassRef>,
        methods: &[Rc<FunctionDecl>],
    ) {
        let enclosing_class = self.current_class;
        self.current_class = ClassContext::Class;

        self.declare(name);
        self.scopes.define(&name.lexeme);

        if let Some(superclass) = superclass {
            if superclass.name.lexeme == name.lexeme {
                self.error(&superclass.name, "A class can't inherit from itself.");
            }

            self.current_class = ClassContext::Subclass;
            self.resolve_local(superclass.id, &superclass.name.lexeme);

            // the superclass lives in its own scope so methods of different
            // classes never share a `super` binding
            self.scopes.push();
            self.scopes.define("super");
        }

        self.scopes.push();
        self.scopes.define("this");

        for method in methods {
            let context = if method.name.lexeme == INITIALIZER {
                FunctionContext::Initializer
            } else {
                FunctionContext::Method
            };
            self.resolve_function(method, context);
        }

        self.scopes.pop();

        if superclass.is_some() {
            self.scopes.pop();
        }

        self.current_class = enclosing_class;
    }

    fn resolve_function(&mut self, declaration: &FunctionDecl, context: FunctionContext) {
        let enclosing_function = self.current_function;
        self.current_function = context;

        self.scopes.push();
        for param in &declaration.params {
            self.declare(param);
            self.scopes.define(&param.lexeme);
        }
        for statement in &declaration.body {
            self.resolve_stmt(statement);
        }
        self.scopes.pop();

        self.current_function = enclosing_function;
    }

    fn resolve_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal { .. } => {}
            Expr::Grouping { inner } => self.resolve_expr(inner),
            Expr::Unary { right, .. } => self.resolve_expr(right),
            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }
            Expr::Variable { id, name } => {
                if self.scopes.is_unfinished(&name.lexeme) {
                    self.error(name, "Can't read local variable in its own initializer.");
                }
                self.resolve_local(*id, &name.lexeme);
            }
            Expr::Assignment { id, name, value } => {
                self.resolve_expr(value);
                self.resolve_local(*id, &name.lexeme);
            }
            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);
                for argument in arguments {
                    self.resolve_expr(argument);
                }
            }
            Expr::PropertyGet { object, .. } => self.resolve_expr(object),
            Expr::PropertySet { object, value, .. } => {
                self.resolve_expr(value);
                self.resolve_expr(object);
            }
            Expr::This { id, keyword } => {
                if self.current_class == ClassContext::None {
                    self.error(keyword, "Can't use 'this' outside of a class.");
                    return;
                }
                self.resolve_local(*id, &keyword.lexeme);
            }
            Expr::Super { id, keyword, .. } => {
                match self.current_class {
                    ClassContext::None => {
                        self.error(keyword, "Can't use 'super' outside of a class.");
                    }
                    ClassContext::Class => {
                        self.error(keyword, "Can't use 'super' in a class with no superclass.");
                    }
                    ClassContext::Subclass => {}
                }
                self.resolve_local(*id, &keyword.lexeme);
            }
        }
    }

    /// Search the scope stack from innermost outward and record the hop
    /// count. Names found in no frame are left to the globals.
    fn resolve_local(&mut self, id: NodeId, name: &str) {
        if let Some(depth) = self.scopes.depth_of(name) {
            self.locals.insert(id, depth);
        }
    }

    fn declare(&mut self, name: &Token) {
        if !self.scopes.declare(&name.lexeme) {
            self.error(name, "Already a variable with this name in this scope.");
        }
    }

    fn error(&mut self, token: &Token, message: impl Into<String>) {
        self.errors.push(ResolverError {
            message: message.into(),
            line: token.line,
            lexeme: token.lexeme.clone(),
        });
    }
}
