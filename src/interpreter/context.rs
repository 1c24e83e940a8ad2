use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::object::Object;

pub type SharedContext = Rc<RefCell<Context>>;

/// A frame of name → value bindings with an optional parent. The chain
/// roots at the preset context (built-ins) with the global context as its
/// child; blocks, calls and `for` statements push further children.
#[derive(Debug, Default)]
pub struct Context {
    pub parent: Option<SharedContext>,
    pub variables: HashMap<String, Object>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parent(parent: SharedContext) -> Self {
        Self {
            parent: Some(parent),
            ..Default::default()
        }
    }

    pub fn as_shared(self) -> SharedContext {
        Rc::new(RefCell::new(self))
    }

    /// Declares in this context, shadowing any outer binding.
    pub fn set(&mut self, name: &str, value: Object) {
        self.variables.insert(name.to_owned(), value);
    }

    /// `None` means the name is missing everywhere — distinct from a
    /// stored nil.
    pub fn get(&self, name: &str) -> Option<Object> {
        if let Some(value) = self.variables.get(name) {
            return Some(value.clone());
        }

        self.parent.as_ref().and_then(|p| p.borrow().get(name))
    }

    /// Walks up until a binding is found and replaces it. Assigning to an
    /// unbound name is a silent no-op.
    pub fn change(&mut self, name: &str, value: Object) {
        if let Some(slot) = self.variables.get_mut(name) {
            *slot = value;
            return;
        }

        if let Some(parent) = &self.parent {
            parent.borrow_mut().change(name, value);
        }
    }

    /// Reads from exactly the context `distance` hops up; no further walk.
    pub fn get_at(context: &SharedContext, name: &str, distance: i32) -> Option<Object> {
        let target = Self::ancestor(context, distance);
        let value = target.borrow().variables.get(name).cloned();
        value
    }

    pub fn change_at(context: &SharedContext, name: &str, value: Object, distance: i32) {
        let target = Self::ancestor(context, distance);
        let mut target = target.borrow_mut();
        if let Some(slot) = target.variables.get_mut(name) {
            *slot = value;
        }
    }

    fn ancestor(context: &SharedContext, distance: i32) -> SharedContext {
        let mut current = context.clone();
        for _ in 0..distance {
            let parent = current
                .borrow()
                .parent
                .clone()
                .expect("resolver produced an invalid scope distance");
            current = parent;
        }

        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_declares_in_the_innermost_context() {
        let root = Context::new().as_shared();
        root.borrow_mut().set("a", Object::Number(1.0));

        let child = Context::with_parent(root.clone()).as_shared();
        child.borrow_mut().set("a", Object::Number(2.0));

        assert_eq!(child.borrow().get("a"), Some(Object::Number(2.0)));
        assert_eq!(root.borrow().get("a"), Some(Object::Number(1.0)));
    }

    #[test]
    fn change_walks_up_to_the_binding() {
        let root = Context::new().as_shared();
        root.borrow_mut().set("a", Object::Number(1.0));

        let child = Context::with_parent(root.clone()).as_shared();
        child.borrow_mut().change("a", Object::Number(5.0));

        assert_eq!(root.borrow().get("a"), Some(Object::Number(5.0)));
    }

    #[test]
    fn change_of_unbound_name_is_a_silent_no_op() {
        let root = Context::new().as_shared();
        let child = Context::with_parent(root.clone()).as_shared();

        child.borrow_mut().change("ghost", Object::Number(1.0));
        assert_eq!(child.borrow().get("ghost"), None);
        assert_eq!(root.borrow().get("ghost"), None);
    }

    #[test]
    fn get_at_reads_only_the_addressed_frame() {
        let root = Context::new().as_shared();
        root.borrow_mut().set("a", Object::Number(1.0));
        let mid = Context::with_parent(root.clone()).as_shared();
        let leaf = Context::with_parent(mid.clone()).as_shared();

        assert_eq!(
            Context::get_at(&leaf, "a", 2),
            Some(Object::Number(1.0))
        );
        // The middle frame has no binding, and get_at does not keep
        // walking.
        assert_eq!(Context::get_at(&leaf, "a", 1), None);
    }
}
