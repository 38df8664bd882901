//! Tree‑walking evaluator.
//!
//! Statements run for their effects and yield a [`Flow`]; `return` is carried
//! outward as `Flow::Return` through blocks, branches and loops until the
//! enclosing call consumes it.  Runtime errors travel separately, as `Err`,
//! and stop the current run.

use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use chrono::Utc;
use log::{debug, info};

use crate::ast::{ClassDecl, Expr, ExprId, LiteralValue, Stmt};
use crate::environment::{Binding, EnvRef, Environment};
use crate::error::{LoxError, Result};
use crate::object::{Class, Function, Instance};
use crate::token::{Token, TokenType};
use crate::value::{NativeFn, NativeFunction, Value};

/// Resolver side‑table: reference node → number of scopes to walk out.
/// A node with no entry is a global.
pub type Locals = HashMap<ExprId, usize>;

/// How a statement finished.
#[derive(Debug, Clone)]
pub enum Flow {
    Normal,
    Return(Value),
}

pub struct Interpreter {
    globals: EnvRef,
    environment: EnvRef,
    locals: Locals,
    natives: Vec<Rc<NativeFunction>>,
    out: Box<dyn Write>,
    /// Line of the innermost call in progress, for errors raised by natives.
    call_line: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// An interpreter printing to stdout, with `clock` pre‑registered.
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// An interpreter printing to `out`, with `clock` pre‑registered.
    pub fn with_output(out: Box<dyn Write>) -> Self {
        info!("Initializing Interpreter");

        let globals: EnvRef = Environment::new().into_ref();

        let mut interpreter = Self {
            environment: Rc::clone(&globals),
            globals,
            locals: Locals::new(),
            natives: Vec::new(),
            out,
            call_line: 0,
        };

        interpreter.define_native("clock", 0, clock);
        interpreter
    }

    /// Register a host function in the global scope.  Registrations survive
    /// [`reset_globals`](Interpreter::reset_globals).
    pub fn define_native(&mut self, name: &str, arity: usize, func: NativeFn) {
        debug!("Defining native function '{}'", name);

        let native = Rc::new(NativeFunction {
            name: name.to_owned(),
            arity,
            func,
        });

        self.globals
            .borrow_mut()
            .define(name, Value::NativeFunction(Rc::clone(&native)));
        self.natives.push(native);
    }

    /// Replace the global scope with a fresh one holding only the natives.
    /// The resolver side‑table is kept, so an already resolved tree can run again.
    pub fn reset_globals(&mut self) {
        info!("Resetting global scope");

        let globals: EnvRef = Environment::new().into_ref();

        for native in &self.natives {
            globals
                .borrow_mut()
                .define(&native.name, Value::NativeFunction(Rc::clone(native)));
        }

        self.environment = Rc::clone(&globals);
        self.globals = globals;
    }

    pub fn globals(&self) -> &EnvRef {
        &self.globals
    }

    /// Merge a resolver side‑table into the one used for lookups.
    ///
    /// Entries are never removed: a closure created by an earlier run may
    /// still execute nodes resolved then, and an already resolved tree may be
    /// executed again.  The table therefore grows with every run, which for a
    /// REPL session is one small entry per local reference typed.
    pub fn resolve(&mut self, locals: Locals) {
        debug!("Recording {} resolved reference(s)", locals.len());

        self.locals.extend(locals);
    }

    /// Execute a program, stopping at the first runtime error.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<()> {
        info!("Interpreting {} statements", statements.len());

        for stmt in statements {
            self.execute(stmt)?;
        }

        self.out.flush()?;

        info!("Interpretation completed successfully");

        Ok(())
    }

    // ───────────────────────── statements ─────────────────────────

    pub fn execute(&mut self, stmt: &Stmt) -> Result<Flow> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
            }

            Stmt::Print(expr) => {
                let value: Value = self.evaluate(expr)?;
                writeln!(self.out, "{}", value)?;
            }

            Stmt::Var { name, initializer } => match initializer {
                Some(expr) => {
                    let value: Value = self.evaluate(expr)?;
                    self.environment.borrow_mut().define(&name.lexeme, value);
                }
                None => self.environment.borrow_mut().declare(&name.lexeme),
            },

            Stmt::Block(statements) => {
                let scope: EnvRef =
                    Environment::with_enclosing(Rc::clone(&self.environment)).into_ref();

                return self.execute_block(statements, scope);
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    return self.execute(then_branch);
                } else if let Some(else_branch) = else_branch {
                    return self.execute(else_branch);
                }
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    if let Flow::Return(value) = self.execute(body)? {
                        return Ok(Flow::Return(value));
                    }
                }
            }

            Stmt::Function(declaration) => {
                debug!("Defining function '{}'", declaration.name.lexeme);

                let function = Function::new(
                    Rc::clone(declaration),
                    Rc::clone(&self.environment),
                    false,
                );

                self.environment
                    .borrow_mut()
                    .define(&declaration.name.lexeme, Value::Function(Rc::new(function)));
            }

            Stmt::Return { value, .. } => {
                let value: Value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                return Ok(Flow::Return(value));
            }

            Stmt::Class(declaration) => self.execute_class(declaration)?,
        }

        Ok(Flow::Normal)
    }

    /// Run `statements` inside `scope`, restoring the current scope afterwards
    /// whatever the outcome.
    pub fn execute_block(&mut self, statements: &[Stmt], scope: EnvRef) -> Result<Flow> {
        let previous: EnvRef = std::mem::replace(&mut self.environment, scope);

        let mut result: Result<Flow> = Ok(Flow::Normal);

        for stmt in statements {
            match self.execute(stmt) {
                Ok(Flow::Normal) => {}
                other => {
                    result = other;
                    break;
                }
            }
        }

        self.environment = previous;

        result
    }

    fn execute_class(&mut self, declaration: &ClassDecl) -> Result<()> {
        let name: &str = &declaration.name.lexeme;

        debug!("Defining class '{}'", name);

        let superclass: Option<Rc<Class>> = match &declaration.superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),
                _ => {
                    let token: &Token = match expr {
                        Expr::Variable { name, .. } => name,
                        _ => &declaration.name,
                    };

                    return Err(LoxError::runtime(token, "Superclass must be a class."));
                }
            },
            None => None,
        };

        self.environment.borrow_mut().declare(name);

        // Methods of a subclass close over an extra scope holding `super`.
        let method_scope: EnvRef = match &superclass {
            Some(superclass) => {
                let mut scope = Environment::with_enclosing(Rc::clone(&self.environment));
                scope.define("super", Value::Class(Rc::clone(superclass)));
                scope.into_ref()
            }
            None => Rc::clone(&self.environment),
        };

        let methods: HashMap<String, Rc<Function>> = declaration
            .methods
            .iter()
            .map(|method| {
                let is_initializer: bool = method.name.lexeme == "init";
                let function =
                    Function::new(Rc::clone(method), Rc::clone(&method_scope), is_initializer);

                (method.name.lexeme.clone(), Rc::new(function))
            })
            .collect();

        let class = Class::new(name.to_owned(), superclass, methods);

        self.environment
            .borrow_mut()
            .define(name, Value::Class(Rc::new(class)));

        Ok(())
    }

    // ───────────────────────── expressions ────────────────────────

    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::from(s.as_str()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => {
                let right: Value = self.evaluate(right)?;

                match (&operator.token_type, right) {
                    (TokenType::BANG, value) => Ok(Value::Bool(!value.is_truthy())),
                    (TokenType::MINUS, Value::Number(n)) => Ok(Value::Number(-n)),
                    (TokenType::MINUS, _) => {
                        Err(LoxError::runtime(operator, "Operand must be a number."))
                    }
                    _ => Err(LoxError::runtime(operator, "Invalid unary operator.")),
                }
            }

            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left: Value = self.evaluate(left)?;
                let right: Value = self.evaluate(right)?;

                binary(operator, left, right)
            }

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left: Value = self.evaluate(left)?;

                let short_circuit: bool = if operator.token_type == TokenType::OR {
                    left.is_truthy()
                } else {
                    !left.is_truthy()
                };

                if short_circuit {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Variable { id, name } => self.look_up_variable(*id, name),

            Expr::Assign { id, name, value } => {
                let value: Value = self.evaluate(value)?;

                match self.locals.get(id) {
                    Some(&distance) => {
                        if !Environment::assign_at(
                            &self.environment,
                            distance,
                            &name.lexeme,
                            value.clone(),
                        ) {
                            return Err(undefined_variable(name));
                        }
                    }
                    None => {
                        let mut globals = self.globals.borrow_mut();

                        if !globals.is_defined(&name.lexeme) {
                            return Err(undefined_variable(name));
                        }

                        globals.assign(&name.lexeme, value.clone());
                    }
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee: Value = self.evaluate(callee)?;

                let mut values: Vec<Value> = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    values.push(self.evaluate(argument)?);
                }

                let Some(callable) = callee.as_callable() else {
                    return Err(LoxError::runtime(
                        paren,
                        "Can only call functions and classes.",
                    ));
                };

                if values.len() != callable.arity() {
                    return Err(LoxError::runtime(
                        paren,
                        format!(
                            "Expected {} arguments but got {}.",
                            callable.arity(),
                            values.len()
                        ),
                    ));
                }

                let outer_line: usize = std::mem::replace(&mut self.call_line, paren.line);
                let result: Result<Value> = callable.call(self, values);
                self.call_line = outer_line;

                result
            }

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => Instance::get(&instance, &name.lexeme)
                    .ok_or_else(|| undefined_property(name)),
                _ => Err(LoxError::runtime(name, "Only instances have properties.")),
            },

            Expr::Set {
                object,
                name,
                value,
            } => {
                let Value::Instance(instance) = self.evaluate(object)? else {
                    return Err(LoxError::runtime(name, "Only instances have fields."));
                };

                let value: Value = self.evaluate(value)?;
                instance.borrow_mut().set(&name.lexeme, value.clone());

                Ok(value)
            }

            Expr::This { id, keyword } => self.look_up_variable(*id, keyword),

            Expr::Super {
                id,
                keyword,
                method,
            } => self.evaluate_super(*id, keyword, method),
        }
    }

    /// `super.method`: search starts at the superclass of the class whose body
    /// contains this expression, and the result is bound to the current `this`.
    fn evaluate_super(&mut self, id: ExprId, keyword: &Token, method: &Token) -> Result<Value> {
        let Some(&distance) = self.locals.get(&id) else {
            return Err(LoxError::runtime(keyword, "Can't use 'super' here."));
        };

        let superclass: Rc<Class> = match Environment::get_at(&self.environment, distance, "super")
        {
            Some(Binding::Value(Value::Class(class))) => class,
            _ => return Err(LoxError::runtime(keyword, "Superclass must be a class.")),
        };

        // `this` lives in the scope just inside the one holding `super`.
        let this: Value = match distance
            .checked_sub(1)
            .and_then(|d| Environment::get_at(&self.environment, d, "this"))
        {
            Some(Binding::Value(this)) => this,
            _ => return Err(LoxError::runtime(keyword, "Can't use 'super' here.")),
        };

        let function: Rc<Function> = superclass
            .find_method(&method.lexeme)
            .ok_or_else(|| undefined_property(method))?;

        Ok(Value::Function(Rc::new(function.bind(this))))
    }

    fn look_up_variable(&self, id: ExprId, name: &Token) -> Result<Value> {
        let binding: Option<Binding> = match self.locals.get(&id) {
            Some(&distance) => Environment::get_at(&self.environment, distance, &name.lexeme),
            None => self.globals.borrow().get(&name.lexeme),
        };

        match binding {
            Some(Binding::Value(value)) => Ok(value),
            Some(Binding::Uninitialized) => Err(LoxError::runtime(
                name,
                format!("Uninitialized variable '{}'.", name.lexeme),
            )),
            None => Err(undefined_variable(name)),
        }
    }

    /// Error raised by a native function, located at the call in progress.
    pub fn native_error(&self, name: &str, message: String) -> LoxError {
        LoxError::Runtime {
            message: format!("{}: {}", name, message),
            line: self.call_line,
        }
    }
}

fn undefined_variable(name: &Token) -> LoxError {
    LoxError::runtime(name, format!("Undefined variable '{}'.", name.lexeme))
}

fn undefined_property(name: &Token) -> LoxError {
    LoxError::runtime(name, format!("Undefined property '{}'.", name.lexeme))
}

fn binary(operator: &Token, left: Value, right: Value) -> Result<Value> {
    use crate::value::Value::Number as N;

    let numbers_only = || LoxError::runtime(operator, "Operands must be numbers.");

    match &operator.token_type {
        TokenType::PLUS => match (left, right) {
            (N(a), N(b)) => Ok(N(a + b)),
            (Value::String(a), Value::String(b)) => Ok(Value::from(format!("{}{}", a, b))),
            _ => Err(LoxError::runtime(
                operator,
                "Operands must be two numbers or two strings.",
            )),
        },

        TokenType::EQUAL_EQUAL => Ok(Value::Bool(left == right)),
        TokenType::BANG_EQUAL => Ok(Value::Bool(left != right)),

        op => {
            let (N(a), N(b)) = (left, right) else {
                return Err(numbers_only());
            };

            match op {
                TokenType::MINUS => Ok(N(a - b)),
                TokenType::STAR => Ok(N(a * b)),
                TokenType::SLASH => Ok(N(a / b)),
                TokenType::GREATER => Ok(Value::Bool(a > b)),
                TokenType::GREATER_EQUAL => Ok(Value::Bool(a >= b)),
                TokenType::LESS => Ok(Value::Bool(a < b)),
                TokenType::LESS_EQUAL => Ok(Value::Bool(a <= b)),
                _ => Err(LoxError::runtime(operator, "Invalid binary operator.")),
            }
        }
    }
}

/// `clock()`: seconds since the Unix epoch.
fn clock(_args: &[Value]) -> std::result::Result<Value, String> {
    let micros: i64 = Utc::now().timestamp_micros();

    Ok(Value::Number(micros as f64 / 1_000_000.0))
}
