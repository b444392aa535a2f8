pub mod ast;

use std::rc::Rc;
use std::{error::Error, fmt::Display};

use crate::lexer::{Literal, Token, TokenKind, Tokens};

use self::ast::{Expr, FunctionDecl, LiteralValue, NodeId, Stmt, SuperclassRef};

/// Functions and calls take at most this many parameters/arguments.
const MAX_ARITY: usize = 255;

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub token: Token,
}

impl ParseError {
    fn new(token: &Token, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            token: token.clone(),
        }
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.token.kind == TokenKind::Eof {
            write!(
                f,
                "[line {}] Parse error at end: {}",
                self.token.line, self.message
            )
        } else {
            write!(
                f,
                "[line {}] Parse error at {:?} '{}': {}",
                self.token.line, self.token.kind, self.token.lexeme, self.message
            )
        }
    }
}

impl Error for ParseError {}

type PResult<T> = Result<T, ParseError>;

/// Recursive-descent parser over the token stream. One token of lookahead is
/// enough for the whole grammar. Errors are collected across statements: a
/// failed declaration synchronizes to the next statement boundary and
/// parsing continues, so one run reports as many problems as possible.
pub struct Parser {
    tokens: Tokens,
    errors: Vec<ParseError>,
}

impl Parser {
    pub fn new(tokens: impl Into<Tokens>) -> Self {
        Self {
            tokens: tokens.into(),
            errors: vec![],
        }
    }

    pub fn parse(mut self) -> (Vec<Stmt>, Vec<ParseError>) {
        let mut statements = vec![];

        while !self.tokens.is_at_end() {
            match self.declaration() {
                Ok(statement) => statements.push(statement),
                Err(error) => {
                    self.errors.push(error);
                    self.synchronize();
                }
            }
        }

        (statements, self.errors)
    }

    fn declaration(&mut self) -> PResult<Stmt> {
        if self.match_token(TokenKind::Class) {
            return self.class_declaration();
        }
        if self.match_token(TokenKind::Fun) {
            return Ok(self.function("function")?.into());
        }
        if self.match_token(TokenKind::Var) {
            return self.var_declaration();
        }

        self.statement()
    }

    fn class_declaration(&mut self) -> PResult<Stmt> {
        let name = self.expect(TokenKind::Identifier, "Expect class name.")?;

        let superclass = if self.match_token(TokenKind::Less) {
            let name = self.expect(TokenKind::Identifier, "Expect superclass name.")?;
            Some(SuperclassRef {
                id: NodeId::fresh(),
                name,
            })
        } else {
            None
        };

        self.expect(TokenKind::LeftBrace, "Expect '{' before class body.")?;

        let mut methods = vec![];
        while !self.tokens.check(TokenKind::RightBrace) && !self.tokens.is_at_end() {
            methods.push(Rc::new(self.function("method")?));
        }

        self.expect(TokenKind::RightBrace, "Expect '}' after class body.")?;

        Ok(Stmt::Class {
            name,
            superclass,
            methods,
        })
    }

    fn function(&mut self, kind: &str) -> PResult<FunctionDecl> {
        let name = self.expect(TokenKind::Identifier, format!("Expect {kind} name."))?;
        self.expect(TokenKind::LeftParen, format!("Expect '(' after {kind} name."))?;

        let mut params = vec![];
        if !self.tokens.check(TokenKind::RightParen) {
            loop {
                if params.len() >= MAX_ARITY {
                    self.errors.push(ParseError::new(
                        self.tokens.peek(),
                        "Can't have more than 255 parameters.",
                    ));
                }
                params.push(self.expect(TokenKind::Identifier, "Expect parameter name.")?);

                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RightParen, "Expect ')' after parameters.")?;

        self.expect(TokenKind::LeftBrace, format!("Expect '{{' before {kind} body."))?;
        let body = self.block()?;

        Ok(FunctionDecl { name, params, body })
    }

    fn var_declaration(&mut self) -> PResult<Stmt> {
        let name = self.expect(TokenKind::Identifier, "Expect variable name.")?;

        let initializer = if self.match_token(TokenKind::Equal) {
            Some(self.expression()?)
        } else {
            None
        };

        self.expect(TokenKind::Semicolon, "Expect ';' after variable declaration.")?;

        Ok(Stmt::Var { name, initializer })
    }

    fn statement(&mut self) -> PResult<Stmt> {
        if self.match_token(TokenKind::For) {
            return self.for_statement();
        }
        if self.match_token(TokenKind::If) {
            return self.if_statement();
        }
        if self.match_token(TokenKind::Print) {
            return self.print_statement();
        }
        if self.match_token(TokenKind::Return) {
            return self.return_statement();
        }
        if self.match_token(TokenKind::While) {
            return self.while_statement();
        }
        if self.match_token(TokenKind::LeftBrace) {
            return Ok(Stmt::Block {
                statements: self.block()?,
            });
        }

        self.expression_statement()
    }

    /// `for` has no runtime representation of its own. It desugars into a
    /// while loop, with the initializer hoisted into an enclosing block and
    /// the increment appended after the body.
    fn for_statement(&mut self) -> PResult<Stmt> {
        self.expect(TokenKind::LeftParen, "Expect '(' after 'for'.")?;

        let initializer = if self.match_token(TokenKind::Semicolon) {
            None
        } else if self.match_token(TokenKind::Var) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if self.tokens.check(TokenKind::Semicolon) {
            Expr::Literal {
                value: LiteralValue::Boolean(true),
            }
        } else {
            self.expression()?
        };
        self.expect(TokenKind::Semicolon, "Expect ';' after loop condition.")?;

        let increment = if self.tokens.check(TokenKind::RightParen) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect(TokenKind::RightParen, "Expect ')' after for clauses.")?;

        let mut body = self.statement()?;

        if let Some(increment) = increment {
            body = Stmt::Block {
                statements: vec![body, Stmt::Expression { expr: increment }],
            };
        }

        body = Stmt::While {
            condition,
            body: Box::new(body),
        };

        if let Some(initializer) = initializer {
            body = Stmt::Block {
                statements: vec![initializer, body],
            };
        }

        Ok(body)
    }

    fn if_statement(&mut self) -> PResult<Stmt> {
        self.expect(TokenKind::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.expect(TokenKind::RightParen, "Expect ')' after condition.")?;

        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.match_token(TokenKind::Else) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn print_statement(&mut self) -> PResult<Stmt> {
        let expr = self.expression()?;
        self.expect(TokenKind::Semicolon, "Expect ';' after value")?;
        Ok(Stmt::Print { expr })
    }

    fn return_statement(&mut self) -> PResult<Stmt> {
        let keyword = self.tokens.previous().clone();

        let value = if self.tokens.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };

        self.expect(TokenKind::Semicolon, "Expect ';' after return value.")?;

        Ok(Stmt::Return { keyword, value })
    }

    fn while_statement(&mut self) -> PResult<Stmt> {
        self.expect(TokenKind::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.expect(TokenKind::RightParen, "Expect ')' after condition.")?;

        let body = Box::new(self.statement()?);

        Ok(Stmt::While { condition, body })
    }

    fn block(&mut self) -> PResult<Vec<Stmt>> {
        let mut statements = vec![];

        while !self.tokens.check(TokenKind::RightBrace) && !self.tokens.is_at_end() {
            statements.push(self.declaration()?);
        }

        self.expect(TokenKind::RightBrace, "Expect '}' after block.")?;

        Ok(statements)
    }

    fn expression_statement(&mut self) -> PResult<Stmt> {
        let expr = self.expression()?;
        self.expect(TokenKind::Semicolon, "Expect ';' after expression")?;
        Ok(Stmt::Expression { expr })
    }

    fn expression(&mut self) -> PResult<Expr> {
        self.assignment()
    }

    /// Assignment parses its target as a normal expression first, then
    /// converts it once the `=` shows up. Only variable reads and property
    /// reads make valid targets.
    fn assignment(&mut self) -> PResult<Expr> {
        let expr = self.or()?;

        if self.match_token(TokenKind::Equal) {
            let equals = self.tokens.previous().clone();
            let value = Box::new(self.assignment()?);

            return match expr {
                Expr::Variable { name, .. } => Ok(Expr::Assignment {
                    id: NodeId::fresh(),
                    name,
                    value,
                }),
                Expr::PropertyGet { object, name } => {
                    Ok(Expr::PropertySet {
                        object,
                        name,
                        value,
                    })
                }
                _ => Err(ParseError::new(&equals, "Invalid assignment target.")),
            };
        }

        Ok(expr)
    }

    fn or(&mut self) -> PResult<Expr> {
        let mut expr = self.and()?;

        while self.match_token(TokenKind::Or) {
            let operator = self.tokens.previous().clone();
            let right = self.and()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn and(&mut self) -> PResult<Expr> {
        let mut expr = self.equality()?;

        while self.match_token(TokenKind::And) {
            let operator = self.tokens.previous().clone();
            let right = self.equality()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn equality(&mut self) -> PResult<Expr> {
        self.binary(
            &[TokenKind::BangEqual, TokenKind::EqualEqual],
            Self::comparison,
        )
    }

    fn comparison(&mut self) -> PResult<Expr> {
        self.binary(
            &[
                TokenKind::Greater,
                TokenKind::GreaterEqual,
                TokenKind::Less,
                TokenKind::LessEqual,
            ],
            Self::term,
        )
    }

    fn term(&mut self) -> PResult<Expr> {
        self.binary(&[TokenKind::Minus, TokenKind::Plus], Self::factor)
    }

    fn factor(&mut self) -> PResult<Expr> {
        self.binary(&[TokenKind::Slash, TokenKind::Star], Self::unary)
    }

    /// Left-associative binary operator tier: parse the next-higher tier,
    /// then fold as long as one of the given operators follows.
    fn binary(
        &mut self,
        operators: &[TokenKind],
        mut operand: impl FnMut(&mut Self) -> PResult<Expr>,
    ) -> PResult<Expr> {
        let mut expr = operand(self)?;

        while self.match_any(operators) {
            let operator = self.tokens.previous().clone();
            let right = operand(self)?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn unary(&mut self) -> PResult<Expr> {
        if self.match_any(&[TokenKind::Bang, TokenKind::Minus]) {
            let operator = self.tokens.previous().clone();
            let right = self.unary()?;
            return Ok(Expr::Unary {
                operator,
                right: Box::new(right),
            });
        }

        self.call()
    }

    fn call(&mut self) -> PResult<Expr> {
        let mut expr = self.primary()?;

        loop {
            if self.match_token(TokenKind::LeftParen) {
                expr = self.finish_call(expr)?;
            } else if self.match_token(TokenKind::Dot) {
                let name = self.expect(TokenKind::Identifier, "Expect property name after '.'.")?;
                expr = Expr::PropertyGet {
                    object: Box::new(expr),
                    name,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> PResult<Expr> {
        let mut arguments = vec![];

        if !self.tokens.check(TokenKind::RightParen) {
            loop {
                if arguments.len() >= MAX_ARITY {
                    self.errors.push(ParseError::new(
                        self.tokens.peek(),
                        "Can't have more than 255 arguments.",
                    ));
                }
                arguments.push(self.expression()?);

                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }

        let paren = self.expect(TokenKind::RightParen, "Expect ')' after arguments.")?;

        Ok(Expr::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        })
    }

    fn primary(&mut self) -> PResult<Expr> {
        if self.match_token(TokenKind::False) {
            return Ok(Expr::Literal {
                value: LiteralValue::Boolean(false),
            });
        }
        if self.match_token(TokenKind::True) {
            return Ok(Expr::Literal {
                value: LiteralValue::Boolean(true),
            });
        }
        if self.match_token(TokenKind::Null) {
            return Ok(Expr::Literal {
                value: LiteralValue::Null,
            });
        }

        if self.match_token(TokenKind::Number) {
            let token = self.tokens.previous().clone();
            let Some(Literal::Number(value)) = token.literal.clone() else {
                return Err(ParseError::new(&token, "Malformed number literal."));
            };
            return Ok(Expr::Literal {
                value: LiteralValue::Number(value),
            });
        }

        if self.match_token(TokenKind::String) {
            let token = self.tokens.previous().clone();
            let Some(Literal::String(value)) = token.literal.clone() else {
                return Err(ParseError::new(&token, "Malformed string literal."));
            };
            return Ok(Expr::Literal {
                value: LiteralValue::String(value),
            });
        }

        if self.match_token(TokenKind::This) {
            return Ok(Expr::This {
                id: NodeId::fresh(),
                keyword: self.tokens.previous().clone(),
            });
        }

        if self.match_token(TokenKind::Super) {
            let keyword = self.tokens.previous().clone();
            self.expect(TokenKind::Dot, "Expect '.' after 'super'.")?;
            let method = self.expect(TokenKind::Identifier, "Expect superclass method name.")?;
            return Ok(Expr::Super {
                id: NodeId::fresh(),
                keyword,
                method,
            });
        }

        if self.match_token(TokenKind::Identifier) {
            return Ok(Expr::variable(self.tokens.previous().clone()));
        }

        if self.match_token(TokenKind::LeftParen) {
            let inner = self.expression()?;
            self.expect(TokenKind::RightParen, "Expect ')' after expression.")?;
            return Ok(Expr::Grouping {
                inner: Box::new(inner),
            });
        }

        Err(ParseError::new(self.tokens.peek(), "Expect expression."))
    }

    fn match_token(&mut self, kind: TokenKind) -> bool {
        if self.tokens.check(kind) {
            self.tokens.advance();
            return true;
        }

        false
    }

    fn match_any(&mut self, kinds: &[TokenKind]) -> bool {
        kinds.iter().any(|kind| self.match_token(*kind))
    }

    fn expect(&mut self, kind: TokenKind, message: impl Into<String>) -> PResult<Token> {
        if self.tokens.check(kind) {
            return Ok(self.tokens.advance());
        }

        Err(ParseError::new(self.tokens.peek(), message))
    }

    /// Panic-mode recovery: discard tokens until just after a semicolon or
    /// just before a token that can begin a statement.
    fn synchronize(&mut self) {
        self.tokens.advance();

        while !self.tokens.is_at_end() {
            if self.tokens.previous().kind == TokenKind::Semicolon {
                return;
            }

            match self.tokens.peek().kind {
                TokenKind::Class
                | TokenKind::Fun
                | TokenKind::Var
                | TokenKind::For
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Print
                | TokenKind::Return => return,
                _ => {
                    self.tokens.advance();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::lexer::Lexer;

    use super::*;

    fn parse(source: &str) -> (Vec<Stmt>, Vec<ParseError>) {
        let (tokens, errors) = Lexer::new(source).lex();
        assert_eq!(errors, vec![]);
        Parser::new(tokens).parse()
    }

    fn parse_clean(source: &str) -> Vec<Stmt> {
        let (statements, errors) = parse(source);
        assert_eq!(errors, vec![]);
        statements
    }

    #[test]
    fn test_parse_print_statement() {
        let statements = parse_clean("print 42;");

        assert!(matches!(
            statements.as_slice(),
            [Stmt::Print {
                expr: Expr::Literal {
                    value: LiteralValue::Number(_)
                }
            }]
        ));
    }

    #[test]
    fn test_parse_precedence() {
        let statements = parse_clean("print 1 + 2 * 3;");

        let [Stmt::Print {
            expr: Expr::Binary { left, operator, right },
        }] = statements.as_slice()
        else {
            panic!("expected a print of a binary expression");
        };

        assert_eq!(operator.kind, TokenKind::Plus);
        assert!(matches!(
            left.as_ref(),
            Expr::Literal {
                value: LiteralValue::Number(_)
            }
        ));
        assert!(matches!(right.as_ref(), Expr::Binary { operator, .. } if operator.kind == TokenKind::Star));
    }

    #[test]
    fn test_parse_assignment_converts_variable() {
        let statements = parse_clean("a = 1;");

        assert!(matches!(
            statements.as_slice(),
            [Stmt::Expression {
                expr: Expr::Assignment { .. }
            }]
        ));
    }

    #[test]
    fn test_parse_assignment_converts_property() {
        let statements = parse_clean("a.b = 1;");

        assert!(matches!(
            statements.as_slice(),
            [Stmt::Expression {
                expr: Expr::PropertySet { .. }
            }]
        ));
    }

    #[test]
    fn test_parse_invalid_assignment_target() {
        let (_, errors) = parse("1 + 2 = 3;");

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Invalid assignment target.");
        assert_eq!(errors[0].token.kind, TokenKind::Equal);
    }

    #[test]
    fn test_parse_for_desugars_to_while() {
        let statements = parse_clean("for (var i = 0; i < 3; i = i + 1) print i;");

        let [Stmt::Block { statements }] = statements.as_slice() else {
            panic!("expected the initializer block");
        };
        assert!(matches!(statements[0], Stmt::Var { .. }));

        let Stmt::While { body, .. } = &statements[1] else {
            panic!("expected the desugared while loop");
        };
        let Stmt::Block { statements } = body.as_ref() else {
            panic!("expected the increment block");
        };
        assert!(matches!(statements[0], Stmt::Print { .. }));
        assert!(matches!(statements[1], Stmt::Expression { .. }));
    }

    #[test]
    fn test_parse_for_without_condition_loops_on_true() {
        let statements = parse_clean("for (;;) print 1;");

        assert!(matches!(
            statements.as_slice(),
            [Stmt::While {
                condition: Expr::Literal {
                    value: LiteralValue::Boolean(true)
                },
                ..
            }]
        ));
    }

    #[test]
    fn test_parse_class_declaration() {
        let statements = parse_clean("class B < A { init(x) {} get() { return this.x; } }");

        let [Stmt::Class {
            name,
            superclass,
            methods,
        }] = statements.as_slice()
        else {
            panic!("expected a class declaration");
        };

        assert_eq!(name.lexeme, "B");
        assert_eq!(
            superclass.as_ref().map(|superclass| superclass.name.lexeme.as_str()),
            Some("A")
        );
        assert_eq!(methods.len(), 2);
        assert_eq!(methods[0].name.lexeme, "init");
        assert_eq!(methods[1].name.lexeme, "get");
    }

    #[test]
    fn test_parse_super_expression() {
        let statements = parse_clean("class B < A { get() { return super.get; } }");

        let [Stmt::Class { methods, .. }] = statements.as_slice() else {
            panic!("expected a class declaration");
        };
        let [Stmt::Return {
            value: Some(Expr::Super { method, .. }),
            ..
        }] = methods[0].body.as_slice()
        else {
            panic!("expected a super expression in the method body");
        };
        assert_eq!(method.lexeme, "get");
    }

    #[test]
    fn test_parse_too_many_arguments() {
        let arguments = vec!["0"; 256].join(", ");
        let (_, errors) = parse(&format!("f({arguments});"));

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Can't have more than 255 arguments.");
    }

    #[test]
    fn test_parse_too_many_parameters() {
        let params = (0..256).map(|i| format!("p{i}")).collect::<Vec<_>>().join(", ");
        let (_, errors) = parse(&format!("fun f({params}) {{}}"));

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Can't have more than 255 parameters.");
    }

    #[test]
    fn test_parse_recovers_after_error() {
        let (statements, errors) = parse("print 1 print 2; print 3;");

        // the broken statement is dropped, the rest of the program survives
        assert_eq!(errors.len(), 1);
        assert_eq!(statements.len(), 1);
        assert!(matches!(statements[0], Stmt::Print { .. }));
    }

    #[test]
    fn test_parse_missing_expression() {
        let (_, errors) = parse("print ;");

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Expect expression.");
    }
}
