use std::rc::Rc;

use crate::lexer::Token;

use super::{Expr, NodeId};

/// A named function: a `fun` declaration or a class method. Shared behind an
/// `Rc` because every closure over the function holds on to the same node.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: Token,
    pub params: Vec<Token>,
    pub body: Vec<Stmt>,
}

/// The superclass clause of a class declaration. It is read like a variable
/// use, so it carries its own identity for the resolver.
#[derive(Debug, Clone, PartialEq)]
pub struct SuperclassRef {
    pub id: NodeId,
    pub name: Token,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expression {
        expr: Expr,
    },
    Print {
        expr: Expr,
    },
    Var {
        name: Token,
        initializer: Option<Expr>,
    },
    Block {
        statements: Vec<Stmt>,
    },
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
    },
    Function {
        declaration: Rc<FunctionDecl>,
    },
    Return {
        keyword: Token,
        value: Option<Expr>,
    },
    Class {
        name: Token,
        superclass: Option<SuperclassRef>,
        methods: Vec<Rc<FunctionDecl>>,
    },
}

impl From<FunctionDecl> for Stmt {
    fn from(value: FunctionDecl) -> Self {
        Stmt::Function {
            declaration: Rc::new(value),
        }
    }
}
