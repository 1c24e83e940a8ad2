use std::collections::HashMap;

use crate::object::Object;

/// The global bindings left behind by running a file once, cached by the
/// resolved absolute path.
#[derive(Debug, Default)]
pub struct Module {
    values: HashMap<String, Object>,
}

impl Module {
    pub fn new(values: HashMap<String, Object>) -> Self {
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<Object> {
        self.values.get(name).cloned()
    }

    pub fn values(&self) -> impl Iterator<Item = (&String, &Object)> {
        self.values.iter()
    }
}
