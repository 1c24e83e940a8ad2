use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::{self, Display};
use std::rc::Rc;

use rand::Rng;

use crate::object::{repeat_string, Object};

use super::class::{Class, Instance};
use super::context::{Context, SharedContext};
use super::error::RuntimeError;
use super::func::{Callable, CallableKind};
use super::meta_list::{is_meta_list, with_meta_list, MetaList};
use super::Interpreter;

pub type NativeMethodFn = fn(&mut Interpreter, Vec<Object>) -> Result<Object, RuntimeError>;

/// A host function that runs with a bound context carrying `this`.
#[derive(Debug)]
pub struct NativeMethod {
    func: NativeMethodFn,
    arity: i32,
    optional: usize,
    context: Option<SharedContext>,
}

impl NativeMethod {
    fn new(func: NativeMethodFn, arity: i32, optional: usize) -> Rc<dyn Callable> {
        Rc::new(Self {
            func,
            arity,
            optional,
            context: None,
        })
    }
}

impl Callable for NativeMethod {
    fn call(
        &self,
        interpreter: &mut Interpreter,
        arguments: Vec<Object>,
    ) -> Result<Object, RuntimeError> {
        match &self.context {
            Some(context) => {
                let prev = std::mem::replace(&mut interpreter.context, context.clone());
                let result = (self.func)(interpreter, arguments);
                interpreter.context = prev;
                result
            }
            None => (self.func)(interpreter, arguments),
        }
    }

    fn arity(&self) -> i32 {
        self.arity
    }

    fn required_params(&self) -> usize {
        (self.arity.max(0) as usize).saturating_sub(self.optional)
    }

    fn bind_this(&self, instance: Rc<RefCell<Instance>>) -> Option<Rc<dyn Callable>> {
        let env = match &self.context {
            Some(parent) => Context::with_parent(parent.clone()),
            None => Context::new(),
        }
        .as_shared();
        env.borrow_mut().set("this", Object::Instance(instance));

        Some(Rc::new(NativeMethod {
            func: self.func,
            arity: self.arity,
            optional: self.optional,
            context: Some(env),
        }))
    }

    fn name(&self) -> String {
        "native method".to_owned()
    }
}

impl Display for NativeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native method>")
    }
}

pub fn class_name(obj: &Object) -> String {
    match obj {
        Object::Instance(instance) => instance.borrow().class.name.clone(),
        _ => String::new(),
    }
}

pub fn belongs_to(obj: &Object, expected: &str) -> bool {
    class_name(obj) == expected
}

/// `this` of the currently-running native method.
fn this_instance(interpreter: &Interpreter) -> Result<Rc<RefCell<Instance>>, RuntimeError> {
    match interpreter.context.borrow().get("this") {
        Some(Object::Instance(instance)) => Ok(instance),
        _ => Err(interpreter.error("Native method called without a bound instance")),
    }
}

fn this_field(interpreter: &Interpreter, field: &str) -> Result<Object, RuntimeError> {
    let instance = this_instance(interpreter)?;
    let value = instance.borrow().fields.get(field).cloned();
    value.ok_or_else(|| interpreter.error(format!("Native instance is missing its '{field}' field")))
}

// ---------------------------------------------------------------------
// String
// ---------------------------------------------------------------------

/// The String and List class objects are per-thread singletons so that
/// class-membership checks hold across every instance.
pub fn string_class() -> Rc<Class> {
    thread_local! {
        static SINGLETON: Rc<Class> = build_string_class();
    }
    SINGLETON.with(|c| c.clone())
}

fn build_string_class() -> Rc<Class> {
    let class = Rc::new(Class::native(
        "String",
        HashMap::from([("str".to_owned(), "string")]),
    ));

    class.define_method("init", NativeMethod::new(string_init, 1, 0));
    class.define_method("length", NativeMethod::new(string_length, 0, 0));
    class.define_method("trim", NativeMethod::new(string_trim, 0, 0));
    class.define_method("split", NativeMethod::new(string_split, 1, 0));
    class.define_method("__add__", NativeMethod::new(string_add, 1, 0));
    class.define_method("__mul__", NativeMethod::new(string_mul, 1, 0));
    class.define_method("__equal__", NativeMethod::new(string_equal, 1, 0));

    class
}

pub fn instantiate_string(value: impl Into<String>) -> Object {
    let instance = Rc::new(RefCell::new(Instance::new(string_class())));
    instance.borrow_mut().set("str", Object::Str(value.into()));

    Object::Instance(instance)
}

fn string_init(interpreter: &mut Interpreter, args: Vec<Object>) -> Result<Object, RuntimeError> {
    let text = interpreter.stringify(&args[0])?;
    let instance = this_instance(interpreter)?;
    instance.borrow_mut().set("str", Object::Str(text));

    Ok(Object::Nil)
}

fn string_length(interpreter: &mut Interpreter, _args: Vec<Object>) -> Result<Object, RuntimeError> {
    let text = this_field(interpreter, "str")?;
    Ok(Object::Number(
        text.string().unwrap_or_default().len() as f64
    ))
}

fn string_trim(interpreter: &mut Interpreter, _args: Vec<Object>) -> Result<Object, RuntimeError> {
    let text = this_field(interpreter, "str")?;
    Ok(instantiate_string(
        text.string().unwrap_or_default().trim(),
    ))
}

fn string_split(interpreter: &mut Interpreter, args: Vec<Object>) -> Result<Object, RuntimeError> {
    let delim = match args[0].string() {
        Some(d) => d,
        None => return Err(interpreter.error("Expecting a string delim to split string")),
    };

    let text = this_field(interpreter, "str")?.string().unwrap_or_default();
    let parts: Vec<Object> = text
        .split(delim.as_str())
        .map(|part| Object::Str(part.to_owned()))
        .collect();

    Ok(instantiate_list(parts))
}

fn string_add(interpreter: &mut Interpreter, args: Vec<Object>) -> Result<Object, RuntimeError> {
    let lhs = this_field(interpreter, "str")?.string().unwrap_or_default();

    let rhs = match &args[0] {
        Object::Str(s) => s.clone(),
        other if belongs_to(other, "String") => match other {
            Object::Instance(instance) => instance
                .borrow()
                .fields
                .get("str")
                .and_then(|o| o.string())
                .unwrap_or_default(),
            _ => unreachable!(),
        },
        other => {
            return Err(interpreter.error(format!(
                "Illegal operator '+' for operands InstanceOf(String) and type({})",
                other.type_name()
            )))
        }
    };

    Ok(instantiate_string(format!("{lhs}{rhs}")))
}

fn string_mul(interpreter: &mut Interpreter, args: Vec<Object>) -> Result<Object, RuntimeError> {
    let lhs = this_field(interpreter, "str")?.string().unwrap_or_default();

    match args[0].number() {
        Some(times) => Ok(instantiate_string(repeat_string(&lhs, times))),
        None => Err(interpreter.error(format!(
            "Illegal operator '*' for operands InstanceOf(String) and type({})",
            args[0].type_name()
        ))),
    }
}

fn string_equal(interpreter: &mut Interpreter, args: Vec<Object>) -> Result<Object, RuntimeError> {
    if !belongs_to(&args[0], "String") {
        return Ok(Object::Boolean(false));
    }

    let lhs = this_field(interpreter, "str")?;
    let rhs = match &args[0] {
        Object::Instance(instance) => instance.borrow().fields.get("str").cloned(),
        _ => None,
    };

    Ok(Object::Boolean(Some(lhs) == rhs))
}

// ---------------------------------------------------------------------
// List
// ---------------------------------------------------------------------

pub fn list_class() -> Rc<Class> {
    thread_local! {
        static SINGLETON: Rc<Class> = build_list_class();
    }
    SINGLETON.with(|c| c.clone())
}

fn build_list_class() -> Rc<Class> {
    // The backing store hides behind a field name scripts cannot spell.
    let class = Rc::new(Class::native(
        "List",
        HashMap::from([("@items".to_owned(), "container")]),
    ));

    class.define_method("init", NativeMethod::new(list_init, -1, 0));
    class.define_method("length", NativeMethod::new(list_length, 0, 0));
    class.define_method("append", NativeMethod::new(list_append, 1, 0));
    class.define_method("pop", NativeMethod::new(list_pop, 0, 0));
    class.define_method("remove", NativeMethod::new(list_remove, 1, 0));
    class.define_method("unshift", NativeMethod::new(list_unshift, 1, 0));
    class.define_method("indexOf", NativeMethod::new(list_index_of, 2, 1));
    class.define_method("lastIndexOf", NativeMethod::new(list_last_index_of, 2, 1));
    class.define_method("reduce", NativeMethod::new(list_reduce, 1, 0));
    class.define_method("map", NativeMethod::new(list_map, 1, 0));
    class.define_method("slice", NativeMethod::new(list_slice, 2, 0));
    class.define_method("reverse", NativeMethod::new(list_reverse, 0, 0));
    class.define_method("__equal__", NativeMethod::new(list_equal, 1, 0));
    class.define_method("__repr__", NativeMethod::new(list_repr, 0, 0));

    class
}

pub fn instantiate_list(items: Vec<Object>) -> Object {
    let instance = Rc::new(RefCell::new(Instance::new(list_class())));
    instance.borrow_mut().set(
        "@items",
        Object::Container(Rc::new(RefCell::new(MetaList::new(items)))),
    );

    Object::Instance(instance)
}

fn this_items(interpreter: &Interpreter) -> Result<Object, RuntimeError> {
    this_field(interpreter, "@items")
}

/// Snapshot of the backing items; taken so no borrow is held while the
/// interpreter re-enters script code.
fn items_snapshot(interpreter: &Interpreter) -> Result<Vec<Object>, RuntimeError> {
    let items = this_items(interpreter)?;
    with_meta_list(&items, |list| list.items.clone())
        .ok_or_else(|| interpreter.error("List instance is missing its backing store"))
}

fn list_init(interpreter: &mut Interpreter, args: Vec<Object>) -> Result<Object, RuntimeError> {
    let instance = this_instance(interpreter)?;

    if args.len() == 1 && is_meta_list(&args[0]) {
        instance.borrow_mut().set("@items", args[0].clone());
        return Ok(Object::Nil);
    }

    instance.borrow_mut().set(
        "@items",
        Object::Container(Rc::new(RefCell::new(MetaList::new(args)))),
    );

    Ok(Object::Nil)
}

fn list_length(interpreter: &mut Interpreter, _args: Vec<Object>) -> Result<Object, RuntimeError> {
    let items = this_items(interpreter)?;
    let length = with_meta_list(&items, |list| list.items.len())
        .ok_or_else(|| interpreter.error("List instance is missing its backing store"))?;

    Ok(Object::Number(length as f64))
}

fn list_append(interpreter: &mut Interpreter, args: Vec<Object>) -> Result<Object, RuntimeError> {
    let items = this_items(interpreter)?;
    with_meta_list(&items, |list| list.items.push(args[0].clone()));

    Ok(Object::Nil)
}

fn list_pop(interpreter: &mut Interpreter, _args: Vec<Object>) -> Result<Object, RuntimeError> {
    let items = this_items(interpreter)?;
    match with_meta_list(&items, |list| list.items.pop()).flatten() {
        Some(value) => Ok(value),
        None => Err(interpreter.error("Poping from empty List")),
    }
}

fn list_remove(interpreter: &mut Interpreter, args: Vec<Object>) -> Result<Object, RuntimeError> {
    let snapshot = items_snapshot(interpreter)?;
    let items = this_items(interpreter)?;

    for (i, item) in snapshot.iter().enumerate() {
        if interpreter.objects_equal(item, &args[0])? {
            with_meta_list(&items, |list| {
                if i < list.items.len() {
                    list.items.remove(i);
                }
            });
            break;
        }
    }

    Ok(Object::Nil)
}

fn list_unshift(interpreter: &mut Interpreter, args: Vec<Object>) -> Result<Object, RuntimeError> {
    let items = this_items(interpreter)?;
    with_meta_list(&items, |list| list.items.insert(0, args[0].clone()));

    Ok(Object::Nil)
}

fn list_index_of(interpreter: &mut Interpreter, args: Vec<Object>) -> Result<Object, RuntimeError> {
    let from = match args.get(1) {
        Some(arg) => arg
            .number()
            .ok_or_else(|| interpreter.error("argument fromIndex must be a number"))?
            as i64,
        None => 0,
    };

    let snapshot = items_snapshot(interpreter)?;
    let from = normalize_or_error(interpreter, snapshot.len(), from)?;

    for (i, item) in snapshot.iter().enumerate().skip(from) {
        if interpreter.objects_equal(item, &args[0])? {
            return Ok(Object::Number(i as f64));
        }
    }

    Ok(Object::Number(-1.0))
}

fn list_last_index_of(
    interpreter: &mut Interpreter,
    args: Vec<Object>,
) -> Result<Object, RuntimeError> {
    let from = match args.get(1) {
        Some(arg) => arg
            .number()
            .ok_or_else(|| interpreter.error("argument fromIndex must be a number"))?
            as i64,
        None => 0,
    };

    let snapshot = items_snapshot(interpreter)?;
    // fromIndex counts skipped elements from the tail.
    let skip = normalize_or_error(interpreter, snapshot.len(), from)?;

    for i in (0..snapshot.len().saturating_sub(skip)).rev() {
        if interpreter.objects_equal(&snapshot[i], &args[0])? {
            return Ok(Object::Number(i as f64));
        }
    }

    Ok(Object::Number(-1.0))
}

fn list_reduce(interpreter: &mut Interpreter, args: Vec<Object>) -> Result<Object, RuntimeError> {
    let func = expect_function(interpreter, &args[0], 2, "reduce")?;
    let snapshot = items_snapshot(interpreter)?;

    match snapshot.len() {
        0 => Ok(Object::Nil),
        1 => Ok(snapshot[0].clone()),
        _ => {
            let mut reduction =
                func.call(interpreter, vec![snapshot[0].clone(), snapshot[1].clone()])?;
            for item in &snapshot[2..] {
                reduction = func.call(interpreter, vec![reduction, item.clone()])?;
            }
            Ok(reduction)
        }
    }
}

fn list_map(interpreter: &mut Interpreter, args: Vec<Object>) -> Result<Object, RuntimeError> {
    let func = expect_function(interpreter, &args[0], 1, "map")?;
    let snapshot = items_snapshot(interpreter)?;

    let mut mapped = Vec::with_capacity(snapshot.len());
    for item in snapshot {
        mapped.push(func.call(interpreter, vec![item])?);
    }

    Ok(instantiate_list(mapped))
}

fn list_slice(interpreter: &mut Interpreter, args: Vec<Object>) -> Result<Object, RuntimeError> {
    let (from, end) = match (args[0].number(), args[1].number()) {
        (Some(from), Some(end)) => (from as i64, end as i64),
        _ => return Err(interpreter.error("range should be represented using Number")),
    };

    let snapshot = items_snapshot(interpreter)?;
    let from = normalize_or_error(interpreter, snapshot.len(), from)?;
    let end = normalize_or_error(interpreter, snapshot.len(), end)?;
    if from > end {
        return Err(interpreter.error("invalid range of List"));
    }

    Ok(instantiate_list(snapshot[from..end].to_vec()))
}

fn list_reverse(interpreter: &mut Interpreter, _args: Vec<Object>) -> Result<Object, RuntimeError> {
    let items = this_items(interpreter)?;
    with_meta_list(&items, |list| list.items.reverse());

    Ok(Object::Nil)
}

fn list_equal(interpreter: &mut Interpreter, args: Vec<Object>) -> Result<Object, RuntimeError> {
    if !belongs_to(&args[0], "List") {
        return Ok(Object::Boolean(false));
    }

    let lhs_items = this_items(interpreter)?;
    let rhs_items = match &args[0] {
        Object::Instance(instance) => instance.borrow().fields.get("@items").cloned(),
        _ => None,
    };
    let rhs_items = match rhs_items {
        Some(items) => items,
        None => return Ok(Object::Boolean(false)),
    };

    // The same backing store is trivially equal.
    if lhs_items == rhs_items {
        return Ok(Object::Boolean(true));
    }

    let lhs = with_meta_list(&lhs_items, |list| list.items.clone());
    let rhs = with_meta_list(&rhs_items, |list| list.items.clone());
    let (lhs, rhs) = match (lhs, rhs) {
        (Some(lhs), Some(rhs)) => (lhs, rhs),
        _ => return Ok(Object::Boolean(false)),
    };

    if lhs.len() != rhs.len() {
        return Ok(Object::Boolean(false));
    }

    for (a, b) in lhs.iter().zip(&rhs) {
        // A list that contains itself never compares equal; this also
        // stops the recursion.
        if list_backing(a).map(|c| c == lhs_items).unwrap_or(false) {
            return Ok(Object::Boolean(false));
        }

        if !interpreter.objects_equal(a, b)? {
            return Ok(Object::Boolean(false));
        }
    }

    Ok(Object::Boolean(true))
}

fn list_repr(interpreter: &mut Interpreter, _args: Vec<Object>) -> Result<Object, RuntimeError> {
    let items = this_items(interpreter)?;
    interpreter.stringify(&items).map(Object::Str)
}

/// The `@items` container of a List instance, if `obj` is one.
pub fn list_backing(obj: &Object) -> Option<Object> {
    if !belongs_to(obj, "List") {
        return None;
    }

    match obj {
        Object::Instance(instance) => instance.borrow().fields.get("@items").cloned(),
        _ => None,
    }
}

fn normalize_or_error(
    interpreter: &Interpreter,
    len: usize,
    index: i64,
) -> Result<usize, RuntimeError> {
    let index = if index < 0 { len as i64 + index } else { index };

    if index >= 0 && index <= len as i64 {
        Ok(index as usize)
    } else {
        Err(interpreter.error("List index out of bound"))
    }
}

fn expect_function(
    interpreter: &Interpreter,
    arg: &Object,
    arity: i32,
    operation: &str,
) -> Result<Rc<dyn Callable>, RuntimeError> {
    match arg {
        Object::Callable(callable)
            if callable.kind() == CallableKind::Function && callable.arity() == arity =>
        {
            Ok(callable.clone())
        }
        _ => Err(interpreter.error(format!(
            "Expecting a function with {} parameter(s) to {}",
            arity, operation
        ))),
    }
}

// ---------------------------------------------------------------------
// Math
// ---------------------------------------------------------------------

/// The `Math` global: a singleton instance carrying constants as fields
/// and the usual numeric helpers as methods. Every method yields `Nil`
/// on non-numeric input.
pub fn math_instance() -> Object {
    let class = Rc::new(Class::native("Mathematics", HashMap::new()));

    class.define_method("abs", NativeMethod::new(math_abs, 1, 0));
    class.define_method("round", NativeMethod::new(math_round, 1, 0));
    class.define_method("floor", NativeMethod::new(math_floor, 1, 0));
    class.define_method("ceil", NativeMethod::new(math_ceil, 1, 0));
    class.define_method("pow", NativeMethod::new(math_pow, 2, 0));
    class.define_method("sqrt", NativeMethod::new(math_sqrt, 1, 0));
    class.define_method("exp", NativeMethod::new(math_exp, 1, 0));
    class.define_method("sin", NativeMethod::new(math_sin, 1, 0));
    class.define_method("cos", NativeMethod::new(math_cos, 1, 0));
    class.define_method("tan", NativeMethod::new(math_tan, 1, 0));
    class.define_method("log", NativeMethod::new(math_log, 1, 0));
    class.define_method("log2", NativeMethod::new(math_log2, 1, 0));
    class.define_method("min", NativeMethod::new(math_min, -1, 0));
    class.define_method("max", NativeMethod::new(math_max, -1, 0));
    class.define_method("random", NativeMethod::new(math_random, 0, 0));

    let mut instance = Instance::new(class);
    // Constants bypass set(): Mathematics declares no writable fields.
    instance
        .fields
        .insert("PI".to_owned(), Object::Number(std::f64::consts::PI));
    instance
        .fields
        .insert("E".to_owned(), Object::Number(std::f64::consts::E));
    instance
        .fields
        .insert("LN2".to_owned(), Object::Number(std::f64::consts::LN_2));
    instance
        .fields
        .insert("LN10".to_owned(), Object::Number(std::f64::consts::LN_10));
    instance.fields.insert(
        "LOG2E".to_owned(),
        Object::Number(std::f64::consts::LOG2_E),
    );
    instance.fields.insert(
        "LOG10E".to_owned(),
        Object::Number(std::f64::consts::LOG10_E),
    );

    Object::Instance(Rc::new(RefCell::new(instance)))
}

fn unary_math(args: &[Object], f: impl FnOnce(f64) -> f64) -> Object {
    match args[0].number() {
        Some(n) => Object::Number(f(n)),
        None => Object::Nil,
    }
}

fn math_abs(_i: &mut Interpreter, args: Vec<Object>) -> Result<Object, RuntimeError> {
    Ok(unary_math(&args, f64::abs))
}

fn math_round(_i: &mut Interpreter, args: Vec<Object>) -> Result<Object, RuntimeError> {
    Ok(unary_math(&args, f64::round))
}

fn math_floor(_i: &mut Interpreter, args: Vec<Object>) -> Result<Object, RuntimeError> {
    Ok(unary_math(&args, f64::floor))
}

fn math_ceil(_i: &mut Interpreter, args: Vec<Object>) -> Result<Object, RuntimeError> {
    Ok(unary_math(&args, f64::ceil))
}

fn math_pow(_i: &mut Interpreter, args: Vec<Object>) -> Result<Object, RuntimeError> {
    match (args[0].number(), args[1].number()) {
        (Some(base), Some(power)) => Ok(Object::Number(base.powf(power))),
        _ => Ok(Object::Nil),
    }
}

fn math_sqrt(_i: &mut Interpreter, args: Vec<Object>) -> Result<Object, RuntimeError> {
    match args[0].number() {
        Some(n) if n >= 0.0 => Ok(Object::Number(n.sqrt())),
        _ => Ok(Object::Nil),
    }
}

fn math_exp(_i: &mut Interpreter, args: Vec<Object>) -> Result<Object, RuntimeError> {
    Ok(unary_math(&args, f64::exp))
}

fn math_sin(_i: &mut Interpreter, args: Vec<Object>) -> Result<Object, RuntimeError> {
    Ok(unary_math(&args, f64::sin))
}

fn math_cos(_i: &mut Interpreter, args: Vec<Object>) -> Result<Object, RuntimeError> {
    Ok(unary_math(&args, f64::cos))
}

fn math_tan(_i: &mut Interpreter, args: Vec<Object>) -> Result<Object, RuntimeError> {
    Ok(unary_math(&args, f64::tan))
}

fn math_log(_i: &mut Interpreter, args: Vec<Object>) -> Result<Object, RuntimeError> {
    Ok(unary_math(&args, f64::ln))
}

fn math_log2(_i: &mut Interpreter, args: Vec<Object>) -> Result<Object, RuntimeError> {
    Ok(unary_math(&args, f64::log2))
}

fn fold_numbers(args: &[Object], f: impl Fn(f64, f64) -> f64) -> Object {
    let mut numbers = Vec::with_capacity(args.len());
    for arg in args {
        match arg.number() {
            Some(n) => numbers.push(n),
            None => return Object::Nil,
        }
    }

    match numbers.split_first() {
        Some((first, rest)) => Object::Number(rest.iter().fold(*first, |acc, n| f(acc, *n))),
        None => Object::Nil,
    }
}

fn math_min(_i: &mut Interpreter, args: Vec<Object>) -> Result<Object, RuntimeError> {
    Ok(fold_numbers(&args, f64::min))
}

fn math_max(_i: &mut Interpreter, args: Vec<Object>) -> Result<Object, RuntimeError> {
    Ok(fold_numbers(&args, f64::max))
}

fn math_random(_i: &mut Interpreter, _args: Vec<Object>) -> Result<Object, RuntimeError> {
    Ok(Object::Number(rand::thread_rng().gen::<f64>()))
}
