mod class;
mod environment;
mod function;
mod value;

pub use self::class::*;
pub use self::environment::*;
pub use self::function::*;
pub use self::value::*;

use std::collections::HashMap;
use std::rc::Rc;
use std::time::Instant;
use std::{error::Error, fmt::Display};

use once_cell::sync::Lazy;

use crate::lexer::{Token, TokenKind};
use crate::parser::ast::{Expr, FunctionDecl, LiteralValue, NodeId, Stmt, SuperclassRef};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeError {
    pub message: String,
    pub line: usize,
    pub lexeme: String,
}

impl RuntimeError {
    pub fn new(token: &Token, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: token.line,
            lexeme: token.lexeme.clone(),
        }
    }
}

impl Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[line {}] Runtime error at '{}': {}",
            self.line, self.lexeme, self.message
        )
    }
}

impl Error for RuntimeError {}

/// Outcome of executing a statement. `return` is ordinary control flow, not
/// an error: it unwinds block execution until the nearest call frame picks
/// the value up.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal,
    Return(Value),
}

/// Base of the monotonic clock exposed as the `clock` native.
static CLOCK_EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

fn clock(_: &[Value]) -> Value {
    Value::Number(CLOCK_EPOCH.elapsed().as_secs_f64())
}

/// The tree-walking evaluator. Holds the globals, the environment that is
/// current while walking, and the resolver's side table. Every variable
/// access goes through the side table: a recorded distance addresses an
/// exact ancestor environment, everything else falls back to globals.
pub struct Interpreter {
    globals: EnvRef,
    environment: EnvRef,
    locals: HashMap<NodeId, usize>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        let globals = Environment::global();

        globals.borrow_mut().define(
            "clock",
            Value::Callable(Callable::Native(Rc::new(NativeFunction {
                name: "clock".to_string(),
                arity: 0,
                func: clock,
            }))),
        );

        Self {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
        }
    }

    /// Take over the side table of a finished resolution pass. Merging is
    /// additive so a REPL can keep feeding one interpreter.
    pub fn resolve(&mut self, locals: HashMap<NodeId, usize>) {
        self.locals.extend(locals);
    }

    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<(), RuntimeError> {
        for statement in statements {
            self.execute(statement)?;
        }

        Ok(())
    }

    fn execute(&mut self, statement: &Stmt) -> Result<Flow, RuntimeError> {
        match statement {
            Stmt::Expression { expr } => {
                self.evaluate(expr)?;
                Ok(Flow::Normal)
            }
            Stmt::Print { expr } => {
                let value = self.evaluate(expr)?;
                println!("{value}");
                Ok(Flow::Normal)
            }
            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Null,
                };
                self.environment.borrow_mut().define(&name.lexeme, value);
                Ok(Flow::Normal)
            }
            Stmt::Block { statements } => {
                let environment = Environment::with_parent(Rc::clone(&self.environment));
                self.execute_block(statements, environment)
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    if let flow @ Flow::Return(_) = self.execute(body)? {
                        return Ok(flow);
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Function { declaration } => {
                let function = LoxFunction {
                    declaration: Rc::clone(declaration),
                    closure: Rc::clone(&self.environment),
                    is_initializer: false,
                };
                self.environment.borrow_mut().define(
                    &declaration.name.lexeme,
                    Value::Callable(Callable::Function(Rc::new(function))),
                );
                Ok(Flow::Normal)
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Null,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.execute_class(name, superclass.as_ref(), methods),
        }
    }

    /// Run statements in the given environment, restoring the previous one
    /// on every exit path: fall-through, `return`, and runtime error alike.
    pub(crate) fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: EnvRef,
    ) -> Result<Flow, RuntimeError> {
        let previous = Rc::clone(&self.environment);
        self.environment = environment;

        let mut result = Ok(Flow::Normal);
        for statement in statements {
            result = self.execute(statement);
            if !matches!(result, Ok(Flow::Normal)) {
                break;
            }
        }

        self.environment = previous;
        result
    }

    fn execute_class(
        &mut self,
        name: &Token,
        superclass: Option<&SuperclassRef>,
        methods: &[Rc<FunctionDecl>],
    ) -> Result<Flow, RuntimeError> {
        let superclass = match superclass {
            Some(reference) => {
                let value = self.lookup_variable(reference.id, &reference.name)?;
                let Value::Callable(Callable::Class(class)) = value else {
                    return Err(RuntimeError::new(
                        &reference.name,
                        "Superclass must be a class.",
                    ));
                };
                Some(class)
            }
            None => None,
        };

        // forward declaration so methods may refer to the class by name
        self.environment.borrow_mut().define(&name.lexeme, Value::Null);

        let previous = Rc::clone(&self.environment);
        if let Some(superclass) = &superclass {
            let environment = Environment::with_parent(Rc::clone(&self.environment));
            environment.borrow_mut().define(
                "super",
                Value::Callable(Callable::Class(Rc::clone(superclass))),
            );
            self.environment = environment;
        }

        let mut table = HashMap::new();
        for method in methods {
            let function = LoxFunction {
                declaration: Rc::clone(method),
                closure: Rc::clone(&self.environment),
                is_initializer: method.name.lexeme == INITIALIZER,
            };
            table.insert(method.name.lexeme.clone(), Rc::new(function));
        }

        let class = LoxClass {
            name: name.lexeme.clone(),
            superclass,
            methods: table,
        };

        self.environment = previous;
        self.environment
            .borrow_mut()
            .assign(name, Value::Callable(Callable::Class(Rc::new(class))))?;

        Ok(Flow::Normal)
    }

    fn evaluate(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Literal { value } => Ok(match value {
                LiteralValue::Null => Value::Null,
                LiteralValue::Boolean(value) => Value::Boolean(*value),
                LiteralValue::Number(value) => Value::Number(*value),
                LiteralValue::String(value) => Value::String(value.clone()),
            }),
            Expr::Grouping { inner } => self.evaluate(inner),
            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),
            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),
            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;

                // short circuit: hand back the deciding operand itself
                if operator.kind == TokenKind::Or {
                    if left.is_truthy() {
                        return Ok(left);
                    }
                } else if !left.is_truthy() {
                    return Ok(left);
                }

                self.evaluate(right)
            }
            Expr::Variable { id, name } => self.lookup_variable(*id, name),
            Expr::Assignment { id, name, value } => {
                let value = self.evaluate(value)?;

                match self.locals.get(id) {
                    Some(distance) => {
                        Environment::assign_at(&self.environment, *distance, name, value.clone())?;
                    }
                    None => self.globals.borrow_mut().assign(name, value.clone())?,
                }

                Ok(value)
            }
            Expr::Call {
                callee,
                paren,
                arguments,
            } => self.evaluate_call(callee, paren, arguments),
            Expr::PropertyGet { object, name } => {
                let Value::Instance(instance) = self.evaluate(object)? else {
                    return Err(RuntimeError::new(name, "Only instances have properties."));
                };

                LoxInstance::get_property(&instance, name)
            }
            Expr::PropertySet {
                object,
                name,
                value,
            } => {
                let Value::Instance(instance) = self.evaluate(object)? else {
                    return Err(RuntimeError::new(name, "Only instances have fields."));
                };

                let value = self.evaluate(value)?;
                instance.borrow_mut().set_property(name, value.clone());
                Ok(value)
            }
            Expr::This { id, keyword } => self.lookup_variable(*id, keyword),
            Expr::Super {
                id,
                keyword,
                method,
            } => self.evaluate_super(*id, keyword, method),
        }
    }

    fn evaluate_unary(&mut self, operator: &Token, right: &Expr) -> Result<Value, RuntimeError> {
        let right = self.evaluate(right)?;

        match operator.kind {
            TokenKind::Bang => Ok(Value::Boolean(!right.is_truthy())),
            TokenKind::Minus => {
                let Value::Number(value) = right else {
                    return Err(RuntimeError::new(operator, "Operand must be a number."));
                };
                Ok(Value::Number(-value))
            }
            _ => Err(RuntimeError::new(
                operator,
                format!("Invalid unary operator '{}'.", operator.lexeme),
            )),
        }
    }

    fn evaluate_binary(
        &mut self,
        left: &Expr,
        operator: &Token,
        right: &Expr,
    ) -> Result<Value, RuntimeError> {
        let left = self.evaluate(left)?;
        let right = self.evaluate(right)?;

        match operator.kind {
            TokenKind::Plus => match (left, right) {
                (Value::Number(left), Value::Number(right)) => Ok(Value::Number(left + right)),
                (Value::String(left), Value::String(right)) => {
                    Ok(Value::String(format!("{left}{right}")))
                }
                _ => Err(RuntimeError::new(
                    operator,
                    "Operands must be two numbers or two strings.",
                )),
            },
            TokenKind::Minus => {
                let (left, right) = Self::numeric_operands(operator, left, right)?;
                Ok(Value::Number(left - right))
            }
            TokenKind::Star => {
                let (left, right) = Self::numeric_operands(operator, left, right)?;
                Ok(Value::Number(left * right))
            }
            TokenKind::Slash => {
                // division by zero follows IEEE-754, no error
                let (left, right) = Self::numeric_operands(operator, left, right)?;
                Ok(Value::Number(left / right))
            }
            TokenKind::Greater => {
                let (left, right) = Self::numeric_operands(operator, left, right)?;
                Ok(Value::Boolean(left > right))
            }
            TokenKind::GreaterEqual => {
                let (left, right) = Self::numeric_operands(operator, left, right)?;
                Ok(Value::Boolean(left >= right))
            }
            TokenKind::Less => {
                let (left, right) = Self::numeric_operands(operator, left, right)?;
                Ok(Value::Boolean(left < right))
            }
            TokenKind::LessEqual => {
                let (left, right) = Self::numeric_operands(operator, left, right)?;
                Ok(Value::Boolean(left <= right))
            }
            TokenKind::EqualEqual => Ok(Value::Boolean(left == right)),
            TokenKind::BangEqual => Ok(Value::Boolean(left != right)),
            _ => Err(RuntimeError::new(
                operator,
                format!("Invalid binary operator '{}'.", operator.lexeme),
            )),
        }
    }

    fn evaluate_call(
        &mut self,
        callee: &Expr,
        paren: &Token,
        arguments: &[Expr],
    ) -> Result<Value, RuntimeError> {
        let callee = self.evaluate(callee)?;

        // arguments evaluate strictly left to right, before the arity check
        let mut values = Vec::with_capacity(arguments.len());
        for argument in arguments {
            values.push(self.evaluate(argument)?);
        }

        let Value::Callable(callable) = callee else {
            return Err(RuntimeError::new(
                paren,
                "Can only call functions and classes.",
            ));
        };

        if values.len() != callable.arity() {
            return Err(RuntimeError::new(
                paren,
                format!(
                    "Expected {} arguments but got {}.",
                    callable.arity(),
                    values.len()
                ),
            ));
        }

        callable.call(self, values)
    }

    fn evaluate_super(
        &mut self,
        id: NodeId,
        keyword: &Token,
        method: &Token,
    ) -> Result<Value, RuntimeError> {
        let Some(distance) = self.locals.get(&id).copied() else {
            return Err(RuntimeError::new(
                keyword,
                "Can't use 'super' outside of a class.",
            ));
        };

        let superclass = Environment::get_at_name(&self.environment, distance, "super");
        let Some(Value::Callable(Callable::Class(superclass))) = superclass else {
            return Err(RuntimeError::new(
                keyword,
                "Can't use 'super' outside of a class.",
            ));
        };

        // `this` always sits one environment below the `super` frame
        let object = Environment::get_at_name(&self.environment, distance - 1, "this");
        let Some(Value::Instance(object)) = object else {
            return Err(RuntimeError::new(
                keyword,
                "Can't use 'super' outside of a class.",
            ));
        };

        let Some(found) = superclass.find_method(&method.lexeme) else {
            return Err(RuntimeError::new(
                method,
                format!("Undefined property '{}'.", method.lexeme),
            ));
        };

        Ok(Value::Callable(Callable::Function(Rc::new(
            found.bind(object),
        ))))
    }

    fn lookup_variable(&self, id: NodeId, name: &Token) -> Result<Value, RuntimeError> {
        match self.locals.get(&id) {
            Some(distance) => Environment::get_at(&self.environment, *distance, name),
            None => self.globals.borrow().get(name),
        }
    }

    fn numeric_operands(
        operator: &Token,
        left: Value,
        right: Value,
    ) -> Result<(f64, f64), RuntimeError> {
        match (left, right) {
            (Value::Number(left), Value::Number(right)) => Ok((left, right)),
            _ => Err(RuntimeError::new(operator, "Operands must be numbers.")),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use crate::resolver::Resolver;

    use super::*;

    /// Run a program and read one of its globals back out.
    fn global_of(source: &str, name: &str) -> Result<Value, RuntimeError> {
        let (tokens, errors) = Lexer::new(source).lex();
        assert_eq!(errors, vec![]);
        let (statements, errors) = Parser::new(tokens).parse();
        assert_eq!(errors, vec![]);
        let (locals, errors) = Resolver::new().resolve(&statements);
        assert_eq!(errors, vec![]);

        let mut interpreter = Interpreter::new();
        interpreter.resolve(locals);
        interpreter.interpret(&statements)?;

        let token = Token::new(TokenKind::Identifier, name, 1);
        let value = interpreter.globals.borrow().get(&token)?;
        Ok(value)
    }

    fn eval(source: &str) -> Result<Value, RuntimeError> {
        global_of(&format!("var result = {source};"), "result")
    }

    #[test]
    fn test_arithmetic_precedence() {
        assert_eq!(eval("1 + 2 * 3"), Ok(Value::Number(7.0)));
        assert_eq!(eval("(1 + 2) * 3"), Ok(Value::Number(9.0)));
        assert_eq!(eval("-6 / 2 - 1"), Ok(Value::Number(-4.0)));
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(
            eval("\"foo\" + \"bar\""),
            Ok(Value::String("foobar".to_string()))
        );
    }

    #[test]
    fn test_plus_with_mixed_operands() {
        let error = eval("\"foo\" + 1").unwrap_err();
        assert_eq!(error.message, "Operands must be two numbers or two strings.");
    }

    #[test]
    fn test_unary_minus_requires_number() {
        let error = eval("-\"foo\"").unwrap_err();
        assert_eq!(error.message, "Operand must be a number.");
    }

    #[test]
    fn test_comparison_and_equality() {
        assert_eq!(eval("1 < 2"), Ok(Value::Boolean(true)));
        assert_eq!(eval("2 <= 1"), Ok(Value::Boolean(false)));
        assert_eq!(eval("1 == 1"), Ok(Value::Boolean(true)));
        assert_eq!(eval("1 != 2"), Ok(Value::Boolean(true)));
        assert_eq!(eval("null == null"), Ok(Value::Boolean(true)));
        assert_eq!(eval("0 == \"0\""), Ok(Value::Boolean(false)));
    }

    #[test]
    fn test_division_by_zero_is_ieee() {
        assert_eq!(eval("1 / 0"), Ok(Value::Number(f64::INFINITY)));
    }

    #[test]
    fn test_logical_operators_return_operands() {
        assert_eq!(eval("null or 2"), Ok(Value::Number(2.0)));
        assert_eq!(eval("1 or 2"), Ok(Value::Number(1.0)));
        assert_eq!(eval("null and 2"), Ok(Value::Null));
        assert_eq!(eval("1 and 2"), Ok(Value::Number(2.0)));
    }

    #[test]
    fn test_logical_operators_short_circuit() {
        let source = "var a = 1; var ignored = false and (a = 2); var touched = true and (a = 3);";

        assert_eq!(global_of(source, "a"), Ok(Value::Number(3.0)));
    }

    #[test]
    fn test_assignment_returns_the_value() {
        assert_eq!(
            global_of("var a = 1; var result = a = 2;", "result"),
            Ok(Value::Number(2.0))
        );
    }

    #[test]
    fn test_undefined_variable() {
        let error = eval("missing").unwrap_err();
        assert_eq!(error.message, "Undefined variable 'missing'.");
    }

    #[test]
    fn test_closures_capture_their_environment() {
        let source = "
            fun makeCounter() {
                var i = 0;
                fun count() { i = i + 1; return i; }
                return count;
            }
            var c = makeCounter();
            var result = c() + c() * 10 + c() * 100;
        ";

        assert_eq!(global_of(source, "result"), Ok(Value::Number(321.0)));
    }

    #[test]
    fn test_counters_are_independent() {
        let source = "
            fun makeCounter() {
                var i = 0;
                fun count() { i = i + 1; return i; }
                return count;
            }
            var a = makeCounter();
            var b = makeCounter();
            a(); a();
            var result = a() * 10 + b();
        ";

        assert_eq!(global_of(source, "result"), Ok(Value::Number(31.0)));
    }

    #[test]
    fn test_return_unwinds_nested_blocks() {
        let source = "
            fun find() {
                var i = 0;
                while (true) {
                    {
                        if (i == 3) { return i; }
                    }
                    i = i + 1;
                }
            }
            var result = find();
        ";

        assert_eq!(global_of(source, "result"), Ok(Value::Number(3.0)));
    }

    #[test]
    fn test_function_without_return_yields_null() {
        assert_eq!(
            global_of("fun noop() {} var result = noop();", "result"),
            Ok(Value::Null)
        );
    }

    #[test]
    fn test_recursion() {
        let source = "
            fun fib(n) {
                if (n < 2) { return n; }
                return fib(n - 1) + fib(n - 2);
            }
            var result = fib(12);
        ";

        assert_eq!(global_of(source, "result"), Ok(Value::Number(144.0)));
    }

    #[test]
    fn test_for_loop_desugaring_runs() {
        let source = "
            var sum = 0;
            for (var i = 1; i <= 4; i = i + 1) { sum = sum + i; }
        ";

        assert_eq!(global_of(source, "sum"), Ok(Value::Number(10.0)));
    }

    #[test]
    fn test_calling_a_non_callable() {
        let error = global_of("var a = 1; a();", "a").unwrap_err();
        assert_eq!(error.message, "Can only call functions and classes.");
    }

    #[test]
    fn test_arity_mismatch() {
        let error = global_of("fun f(a, b) {} f(1);", "f").unwrap_err();
        assert_eq!(error.message, "Expected 2 arguments but got 1.");
    }

    #[test]
    fn test_class_fields_and_methods() {
        let source = "
            class Greeter {
                hello() { return \"hi \" + this.name; }
            }
            var g = Greeter();
            g.name = \"world\";
            var result = g.hello();
        ";

        assert_eq!(
            global_of(source, "result"),
            Ok(Value::String("hi world".to_string()))
        );
    }

    #[test]
    fn test_initializer_runs_on_construction() {
        let source = "
            class Point {
                init(x, y) { this.x = x; this.y = y; }
            }
            var p = Point(3, 4);
            var result = p.x * 10 + p.y;
        ";

        assert_eq!(global_of(source, "result"), Ok(Value::Number(34.0)));
    }

    #[test]
    fn test_initializer_returns_the_instance() {
        let source = "
            class A { init() {} }
            var a = A();
            var result = a.init() == a;
        ";

        assert_eq!(global_of(source, "result"), Ok(Value::Boolean(true)));
    }

    #[test]
    fn test_class_arity_follows_initializer() {
        let error = global_of("class P { init(x) {} } P();", "P").unwrap_err();
        assert_eq!(error.message, "Expected 1 arguments but got 0.");
    }

    #[test]
    fn test_undefined_property() {
        let error = global_of("class A {} var a = A(); a.missing;", "a").unwrap_err();
        assert_eq!(error.message, "Undefined property 'missing'.");
    }

    #[test]
    fn test_property_access_on_non_instance() {
        let error = global_of("var a = 1; a.field;", "a").unwrap_err();
        assert_eq!(error.message, "Only instances have properties.");
    }

    #[test]
    fn test_inheritance_and_super() {
        let source = "
            class A { greet() { return \"A\"; } }
            class B < A { greet() { return super.greet() + \"B\"; } }
            var result = B().greet();
        ";

        assert_eq!(
            global_of(source, "result"),
            Ok(Value::String("AB".to_string()))
        );
    }

    #[test]
    fn test_methods_are_inherited() {
        let source = "
            class A { greet() { return \"A\"; } }
            class B < A {}
            var result = B().greet();
        ";

        assert_eq!(
            global_of(source, "result"),
            Ok(Value::String("A".to_string()))
        );
    }

    #[test]
    fn test_superclass_must_be_a_class() {
        let error = global_of("var A = 1; class B < A {}", "A").unwrap_err();
        assert_eq!(error.message, "Superclass must be a class.");
    }

    #[test]
    fn test_fields_shadow_methods() {
        let source = "
            class A { f() { return \"method\"; } }
            var a = A();
            fun other() { return \"field\"; }
            a.f = other;
            var result = a.f();
        ";

        assert_eq!(
            global_of(source, "result"),
            Ok(Value::String("field".to_string()))
        );
    }

    #[test]
    fn test_bound_methods_remember_their_instance() {
        let source = "
            class A {
                init(tag) { this.tag = tag; }
                show() { return this.tag; }
            }
            var a = A(\"first\");
            var m = a.show;
            var result = m();
        ";

        assert_eq!(
            global_of(source, "result"),
            Ok(Value::String("first".to_string()))
        );
    }

    #[test]
    fn test_clock_is_seeded() {
        assert_eq!(eval("clock() >= 0"), Ok(Value::Boolean(true)));
    }

    #[test]
    fn test_block_environment_is_restored_after_error() {
        let source = "var a = 1; { var a = 2; missing; }";

        let (tokens, _) = Lexer::new(source).lex();
        let (statements, _) = Parser::new(tokens).parse();
        let (locals, _) = Resolver::new().resolve(&statements);

        let mut interpreter = Interpreter::new();
        interpreter.resolve(locals);
        assert!(interpreter.interpret(&statements).is_err());

        // the failed block did not leak its environment
        assert!(Rc::ptr_eq(&interpreter.environment, &interpreter.globals));
    }
}
