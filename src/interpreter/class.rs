use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Display};
use std::rc::Rc;

use crate::object::Object;

use super::error::RuntimeError;
use super::func::{Callable, CallableKind};
use super::Interpreter;

/// Method names with operator or lifecycle meaning. They are looked up
/// only on the receiving class, never on its superclasses.
pub const RESERVED_METHODS: [&str; 8] = [
    "__add__", "__sub__", "__mul__", "__div__", "__mod__", "__equal__", "__repr__", "__del__",
];

#[derive(Debug)]
pub struct Class {
    pub name: String,
    // Methods land after the class object exists, so they can close over
    // the class itself.
    pub methods: RefCell<BTreeMap<String, Rc<dyn Callable>>>,
    pub superclass: Option<Rc<Class>>,
    pub is_native: bool,
    // For native classes: writable field names and the value kind each
    // accepts.
    pub allowed_fields: HashMap<String, &'static str>,
}

impl Class {
    pub fn new(name: impl Into<String>, superclass: Option<Rc<Class>>) -> Self {
        Self {
            name: name.into(),
            methods: RefCell::new(BTreeMap::new()),
            superclass,
            is_native: false,
            allowed_fields: HashMap::new(),
        }
    }

    pub fn native(name: impl Into<String>, allowed_fields: HashMap<String, &'static str>) -> Self {
        Self {
            name: name.into(),
            methods: RefCell::new(BTreeMap::new()),
            superclass: None,
            is_native: true,
            allowed_fields,
        }
    }

    pub fn define_method(&self, name: &str, method: Rc<dyn Callable>) {
        self.methods.borrow_mut().insert(name.to_owned(), method);
    }

    pub fn find_method(&self, name: &str) -> Option<Rc<dyn Callable>> {
        if let Some(method) = self.methods.borrow().get(name) {
            return Some(method.clone());
        }

        // Reserved methods belong to the defining class alone.
        if RESERVED_METHODS.contains(&name) {
            return None;
        }

        self.superclass.as_ref().and_then(|s| s.find_method(name))
    }

    pub fn has_destructor(&self) -> bool {
        let mut class = Some(self);
        while let Some(c) = class {
            if c.methods.borrow().contains_key("__del__") {
                return true;
            }
            class = c.superclass.as_deref();
        }

        false
    }
}

/// The callable face of a class: calling it constructs an instance.
#[derive(Debug, Clone)]
pub struct ClassObject(pub Rc<Class>);

impl Callable for ClassObject {
    fn call(
        &self,
        interpreter: &mut Interpreter,
        arguments: Vec<Object>,
    ) -> Result<Object, RuntimeError> {
        let instance = Rc::new(RefCell::new(Instance::new(self.0.clone())));

        if let Some(initializer) = self.0.find_method("init") {
            if let Some(bound) = initializer.bind_this(instance.clone()) {
                bound.call(interpreter, arguments)?;
            }
        }

        Ok(Object::Instance(instance))
    }

    fn arity(&self) -> i32 {
        self.0.find_method("init").map(|i| i.arity()).unwrap_or(0)
    }

    fn required_params(&self) -> usize {
        self.0
            .find_method("init")
            .map(|i| i.required_params())
            .unwrap_or(0)
    }

    fn bind_this(&self, _instance: Rc<RefCell<Instance>>) -> Option<Rc<dyn Callable>> {
        Some(Rc::new(self.clone()))
    }

    fn name(&self) -> String {
        self.0.name.clone()
    }

    fn kind(&self) -> CallableKind {
        CallableKind::Class
    }

    fn owned_super(&self) -> Option<Rc<Class>> {
        self.0.superclass.clone()
    }

    fn as_class(&self) -> Option<Rc<Class>> {
        Some(self.0.clone())
    }
}

impl Display for ClassObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Class {}>", self.0.name)
    }
}

#[derive(Debug)]
pub struct Instance {
    pub class: Rc<Class>,
    pub fields: HashMap<String, Object>,
    // Set on the resurrected copy handed to __del__, so finalization
    // cannot re-queue itself.
    finalizing: bool,
}

impl Instance {
    pub fn new(class: Rc<Class>) -> Self {
        Self {
            class,
            fields: HashMap::new(),
            finalizing: false,
        }
    }

    /// Fields first, then class methods bound to this instance. Missing
    /// properties are `Nil`, not an error.
    pub fn get(&self, name: &str, self_rc: &Rc<RefCell<Instance>>) -> Object {
        if let Some(value) = self.fields.get(name) {
            return value.clone();
        }

        if let Some(method) = self.class.find_method(name) {
            if let Some(bound) = method.bind_this(self_rc.clone()) {
                return Object::Callable(bound);
            }
        }

        Object::Nil
    }

    /// Native classes accept only their declared fields with the declared
    /// value kind; anything else is dropped without an error. User
    /// classes accept everything.
    pub fn set(&mut self, name: &str, value: Object) {
        if self.class.is_native {
            match self.class.allowed_fields.get(name) {
                None => return,
                Some(expected) if *expected != value.type_name() => return,
                Some(_) => {}
            }
        }

        self.fields.insert(name.to_owned(), value);
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        if self.finalizing || !self.class.has_destructor() {
            return;
        }

        // The dying instance is moved onto the pending queue; the
        // interpreter drains it at the next statement boundary and binds
        // `this` to the resurrected copy.
        let revived = Instance {
            class: self.class.clone(),
            fields: std::mem::take(&mut self.fields),
            finalizing: true,
        };
        enqueue_destructor(Rc::new(RefCell::new(revived)));
    }
}

thread_local! {
    static PENDING_DESTRUCTORS: RefCell<Vec<Rc<RefCell<Instance>>>> =
        RefCell::new(Vec::new());
}

fn enqueue_destructor(instance: Rc<RefCell<Instance>>) {
    PENDING_DESTRUCTORS.with(|q| q.borrow_mut().push(instance));
}

pub(super) fn take_pending_destructors() -> Vec<Rc<RefCell<Instance>>> {
    PENDING_DESTRUCTORS.with(|q| std::mem::take(&mut *q.borrow_mut()))
}
