use std::cell::RefCell;
use std::fmt::{self, Display};
use std::io::Read;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::object::Object;

use super::class::Instance;
use super::error::RuntimeError;
use super::func::{Callable, CallableKind};
use super::Interpreter;

pub type NativeFn = fn(&mut Interpreter, Vec<Object>) -> Result<Object, RuntimeError>;

/// A host function exposed to scripts. Arity -1 means variadic.
#[derive(Debug)]
pub struct NativeFunction {
    name: &'static str,
    arity: i32,
    optional: usize,
    func: NativeFn,
}

impl NativeFunction {
    pub fn new(name: &'static str, arity: i32, optional: usize, func: NativeFn) -> Self {
        Self {
            name,
            arity,
            optional,
            func,
        }
    }
}

impl Callable for NativeFunction {
    fn call(
        &self,
        interpreter: &mut Interpreter,
        arguments: Vec<Object>,
    ) -> Result<Object, RuntimeError> {
        (self.func)(interpreter, arguments)
    }

    fn arity(&self) -> i32 {
        self.arity
    }

    fn required_params(&self) -> usize {
        (self.arity.max(0) as usize).saturating_sub(self.optional)
    }

    fn bind_this(&self, _instance: Rc<RefCell<Instance>>) -> Option<Rc<dyn Callable>> {
        None
    }

    fn name(&self) -> String {
        self.name.to_owned()
    }
}

impl Display for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native function {}>", self.name)
    }
}

/// The preset functions loaded at interpreter startup.
pub fn all() -> Vec<Rc<dyn Callable>> {
    vec![
        Rc::new(NativeFunction::new("clock", 0, 0, clock)),
        Rc::new(NativeFunction::new("str", 1, 0, str_of)),
        Rc::new(NativeFunction::new("typeof", 1, 0, type_of)),
        Rc::new(NativeFunction::new("print", -1, 0, print)),
        Rc::new(NativeFunction::new("getc", 0, 0, getc)),
        Rc::new(NativeFunction::new("chr", 1, 0, chr)),
        Rc::new(NativeFunction::new("exit", 1, 0, exit)),
        Rc::new(NativeFunction::new("getattr", 3, 1, getattr)),
    ]
}

fn clock(_interpreter: &mut Interpreter, _args: Vec<Object>) -> Result<Object, RuntimeError> {
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backward");

    Ok(Object::Number(since_epoch.as_millis() as f64))
}

fn str_of(interpreter: &mut Interpreter, args: Vec<Object>) -> Result<Object, RuntimeError> {
    interpreter.stringify(&args[0]).map(Object::Str)
}

fn type_of(_interpreter: &mut Interpreter, args: Vec<Object>) -> Result<Object, RuntimeError> {
    let name = match &args[0] {
        Object::Callable(callable) => match callable.kind() {
            CallableKind::Class => "Class".to_owned(),
            CallableKind::Function => "Function".to_owned(),
        },
        Object::Instance(instance) => instance.borrow().class.name.clone(),
        other => other.type_name().to_owned(),
    };

    Ok(Object::Str(name))
}

fn print(interpreter: &mut Interpreter, args: Vec<Object>) -> Result<Object, RuntimeError> {
    let mut parts = Vec::with_capacity(args.len());
    for arg in &args {
        parts.push(interpreter.stringify(arg)?);
    }

    println!("{}", parts.join(" "));
    Ok(Object::Nil)
}

fn getc(_interpreter: &mut Interpreter, _args: Vec<Object>) -> Result<Object, RuntimeError> {
    let byte = std::io::stdin()
        .bytes()
        .next()
        .and_then(|b| b.ok())
        .map(|b| b as f64)
        .unwrap_or(-1.0);

    Ok(Object::Number(byte))
}

fn chr(interpreter: &mut Interpreter, args: Vec<Object>) -> Result<Object, RuntimeError> {
    match args[0].number() {
        Some(n) => Ok(Object::Str(((n as u8) as char).to_string())),
        None => Err(interpreter.error("chr() expects a number")),
    }
}

fn exit(interpreter: &mut Interpreter, args: Vec<Object>) -> Result<Object, RuntimeError> {
    match args[0].number() {
        Some(code) => std::process::exit(code as i32),
        None => Err(interpreter.error("exit() expects a number")),
    }
}

fn getattr(interpreter: &mut Interpreter, args: Vec<Object>) -> Result<Object, RuntimeError> {
    let instance = match &args[0] {
        Object::Instance(instance) => instance.clone(),
        _ => return Ok(Object::Nil),
    };

    let name = interpreter.stringify(&args[1])?;
    let attr = {
        let borrowed = instance.borrow();
        borrowed.get(&name, &instance)
    };

    if matches!(attr, Object::Nil) {
        if let Some(default) = args.get(2) {
            return Ok(default.clone());
        }
    }

    Ok(attr)
}
