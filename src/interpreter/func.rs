use std::cell::RefCell;
use std::fmt::{self, Debug, Display};
use std::rc::Rc;

use crate::ast::FunctionDecl;
use crate::object::Object;

use super::class::{Class, Instance};
use super::context::{Context, SharedContext};
use super::error::RuntimeError;
use super::Interpreter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallableKind {
    Function,
    Class,
}

/// Anything that can sit on the left of `(...)`: user functions, lambdas,
/// native functions, classes, and bound native methods.
pub trait Callable: Debug + Display {
    fn call(
        &self,
        interpreter: &mut Interpreter,
        arguments: Vec<Object>,
    ) -> Result<Object, RuntimeError>;

    /// Declared parameter count; -1 means variadic.
    fn arity(&self) -> i32;

    fn required_params(&self) -> usize;

    /// A new callable whose scope binds `this`; `None` when the callable
    /// cannot be bound (lambdas, free native functions).
    fn bind_this(&self, instance: Rc<RefCell<Instance>>) -> Option<Rc<dyn Callable>>;

    fn name(&self) -> String;

    fn kind(&self) -> CallableKind {
        CallableKind::Function
    }

    /// The class `super` resolves against while this callable runs.
    fn owned_super(&self) -> Option<Rc<Class>> {
        None
    }

    fn as_class(&self) -> Option<Rc<Class>> {
        None
    }
}

/// A user-declared function or method. Default-argument values are
/// evaluated exactly once, at construction, in the then-current context.
#[derive(Debug)]
pub struct Function {
    decl: Rc<FunctionDecl>,
    defaults: Vec<Object>,
    closure: SharedContext,
    belonging: Option<Rc<Class>>,
}

impl Function {
    pub fn new(
        decl: Rc<FunctionDecl>,
        closure: SharedContext,
        belonging: Option<Rc<Class>>,
        interpreter: &mut Interpreter,
    ) -> Result<Self, RuntimeError> {
        let mut defaults = Vec::with_capacity(decl.defaults.len());
        for expr in &decl.defaults {
            defaults.push(interpreter.evaluate_expr(expr)?);
        }

        Ok(Self {
            decl,
            defaults,
            closure,
            belonging,
        })
    }
}

impl Callable for Function {
    fn call(
        &self,
        interpreter: &mut Interpreter,
        arguments: Vec<Object>,
    ) -> Result<Object, RuntimeError> {
        // Every call gets a fresh frame under the closure; otherwise
        // recursive calls would clobber each other's parameters.
        let frame = Context::with_parent(self.closure.clone()).as_shared();
        bind_arguments(&frame, &self.decl.params, &self.defaults, &arguments);

        interpreter.run_function_body(&self.decl.body, frame)
    }

    fn arity(&self) -> i32 {
        self.decl.params.len() as i32
    }

    fn required_params(&self) -> usize {
        self.decl.params.len() - self.defaults.len()
    }

    fn bind_this(&self, instance: Rc<RefCell<Instance>>) -> Option<Rc<dyn Callable>> {
        let env = Context::with_parent(self.closure.clone()).as_shared();
        env.borrow_mut().set("this", Object::Instance(instance));

        // Defaults travel along; they were already evaluated once.
        Some(Rc::new(Function {
            decl: self.decl.clone(),
            defaults: self.defaults.clone(),
            closure: env,
            belonging: self.belonging.clone(),
        }))
    }

    fn name(&self) -> String {
        self.decl
            .name
            .as_ref()
            .map(|t| t.lexeme.clone())
            .unwrap_or_else(|| "anonymous".to_owned())
    }

    fn owned_super(&self) -> Option<Rc<Class>> {
        self.belonging.as_ref().and_then(|c| c.superclass.clone())
    }
}

impl Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<function {}>", self.name())
    }
}

/// An anonymous function. Unlike a `Function` it can never bind `this`.
#[derive(Debug)]
pub struct Lambda {
    decl: Rc<FunctionDecl>,
    defaults: Vec<Object>,
    closure: SharedContext,
}

impl Lambda {
    pub fn new(
        decl: Rc<FunctionDecl>,
        closure: SharedContext,
        interpreter: &mut Interpreter,
    ) -> Result<Self, RuntimeError> {
        let mut defaults = Vec::with_capacity(decl.defaults.len());
        for expr in &decl.defaults {
            defaults.push(interpreter.evaluate_expr(expr)?);
        }

        Ok(Self {
            decl,
            defaults,
            closure,
        })
    }
}

impl Callable for Lambda {
    fn call(
        &self,
        interpreter: &mut Interpreter,
        arguments: Vec<Object>,
    ) -> Result<Object, RuntimeError> {
        let frame = Context::with_parent(self.closure.clone()).as_shared();
        bind_arguments(&frame, &self.decl.params, &self.defaults, &arguments);

        interpreter.run_function_body(&self.decl.body, frame)
    }

    fn arity(&self) -> i32 {
        self.decl.params.len() as i32
    }

    fn required_params(&self) -> usize {
        self.decl.params.len() - self.defaults.len()
    }

    fn bind_this(&self, _instance: Rc<RefCell<Instance>>) -> Option<Rc<dyn Callable>> {
        None
    }

    fn name(&self) -> String {
        "anonymous".to_owned()
    }
}

impl Display for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<anonymous function>")
    }
}

/// Binds positional arguments, then fills the remaining parameters from
/// the stored defaults, tail-aligned: the last `arity - |args|` defaults
/// are the ones used.
fn bind_arguments(
    frame: &SharedContext,
    params: &[crate::token::Token],
    defaults: &[Object],
    arguments: &[Object],
) {
    let mut frame = frame.borrow_mut();

    for (param, arg) in params.iter().zip(arguments) {
        frame.set(&param.lexeme, arg.clone());
    }

    if arguments.len() < params.len() {
        let missing = params.len() - arguments.len();
        let fill = &defaults[defaults.len() - missing..];
        for (param, default) in params[arguments.len()..].iter().zip(fill) {
            frame.set(&param.lexeme, default.clone());
        }
    }
}
