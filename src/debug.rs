//! Human-readable dumps of the token stream and the AST, shown by the
//! driver when `--debug` is set.

use std::fmt::Write;

use crate::lexer::Token;
use crate::parser::ast::{Expr, FunctionDecl, LiteralValue, Stmt};

pub fn dump_tokens(tokens: &[Token]) -> String {
    let mut out = String::from("Tokens generated from source:\n");

    for token in tokens {
        let _ = writeln!(out, "  [line {}] {}", token.line, token);
    }

    out
}

pub fn dump_ast(statements: &[Stmt]) -> String {
    let mut out = String::from("Ast generated from tokens:\n");

    for statement in statements {
        fmt_stmt(statement, 1, &mut out);
    }

    out
}

fn indent(depth: usize, out: &mut String) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn fmt_stmt(statement: &Stmt, depth: usize, out: &mut String) {
    indent(depth, out);

    match statement {
        Stmt::Expression { expr } => {
            out.push_str("expression\n");
            fmt_expr(expr, depth + 1, out);
        }
        Stmt::Print { expr } => {
            out.push_str("print\n");
            fmt_expr(expr, depth + 1, out);
        }
        Stmt::Var { name, initializer } => {
            let _ = writeln!(out, "var '{}'", name.lexeme);
            if let Some(initializer) = initializer {
                fmt_expr(initializer, depth + 1, out);
            }
        }
        Stmt::Block { statements } => {
            out.push_str("block\n");
            for statement in statements {
                fmt_stmt(statement, depth + 1, out);
            }
        }
        Stmt::If {
            condition,
            then_branch,
            else_branch,
        } => {
            out.push_str("if\n");
            fmt_expr(condition, depth + 1, out);
            fmt_stmt(then_branch, depth + 1, out);
            if let Some(else_branch) = else_branch {
                indent(depth, out);
                out.push_str("else\n");
                fmt_stmt(else_branch, depth + 1, out);
            }
        }
        Stmt::While { condition, body } => {
            out.push_str("while\n");
            fmt_expr(condition, depth + 1, out);
            fmt_stmt(body, depth + 1, out);
        }
        Stmt::Function { declaration } => fmt_function(declaration, depth, out),
        Stmt::Return { value, .. } => {
            out.push_str("return\n");
            if let Some(value) = value {
                fmt_expr(value, depth + 1, out);
            }
        }
        Stmt::Class {
            name,
            superclass,
            methods,
        } => {
            match superclass {
                Some(superclass) => {
                    let _ = writeln!(out, "class '{}' < '{}'", name.lexeme, superclass.name.lexeme);
                }
                None => {
                    let _ = writeln!(out, "class '{}'", name.lexeme);
                }
            }
            for method in methods {
                fmt_function(method, depth + 1, out);
            }
        }
    }
}

fn fmt_function(declaration: &FunctionDecl, depth: usize, out: &mut String) {
    indent(depth, out);

    let params = declaration
        .params
        .iter()
        .map(|param| param.lexeme.clone())
        .collect::<Vec<_>>()
        .join(", ");
    let _ = writeln!(out, "fun '{}' ({params})", declaration.name.lexeme);

    for statement in &declaration.body {
        fmt_stmt(statement, depth + 1, out);
    }
}

fn fmt_expr(expr: &Expr, depth: usize, out: &mut String) {
    indent(depth, out);

    match expr {
        Expr::Literal { value } => {
            let rendered = match value {
                LiteralValue::Null => "null".to_string(),
                LiteralValue::Boolean(value) => value.to_string(),
                LiteralValue::Number(value) => value.to_string(),
                LiteralValue::String(value) => format!("\"{value}\""),
            };
            let _ = writeln!(out, "literal {rendered}");
        }
        Expr::Grouping { inner } => {
            out.push_str("grouping\n");
            fmt_expr(inner, depth + 1, out);
        }
        Expr::Unary { operator, right } => {
            let _ = writeln!(out, "unary '{}'", operator.lexeme);
            fmt_expr(right, depth + 1, out);
        }
        Expr::Binary {
            left,
            operator,
            right,
        }
        | Expr::Logical {
            left,
            operator,
            right,
        } => {
            let _ = writeln!(out, "binary '{}'", operator.lexeme);
            fmt_expr(left, depth + 1, out);
            fmt_expr(right, depth + 1, out);
        }
        Expr::Variable { name, .. } => {
            let _ = writeln!(out, "variable '{}'", name.lexeme);
        }
        Expr::Assignment { name, value, .. } => {
            let _ = writeln!(out, "assign '{}'", name.lexeme);
            fmt_expr(value, depth + 1, out);
        }
        Expr::Call {
            callee, arguments, ..
        } => {
            out.push_str("call\n");
            fmt_expr(callee, depth + 1, out);
            for argument in arguments {
                fmt_expr(argument, depth + 1, out);
            }
        }
        Expr::PropertyGet { object, name } => {
            let _ = writeln!(out, "get '{}'", name.lexeme);
            fmt_expr(object, depth + 1, out);
        }
        Expr::PropertySet {
            object,
            name,
            value,
        } => {
            let _ = writeln!(out, "set '{}'", name.lexeme);
            fmt_expr(object, depth + 1, out);
            fmt_expr(value, depth + 1, out);
        }
        Expr::This { .. } => {
            out.push_str("this\n");
        }
        Expr::Super { method, .. } => {
            let _ = writeln!(out, "super '{}'", method.lexeme);
        }
    }
}
