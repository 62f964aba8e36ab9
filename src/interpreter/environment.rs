use rustc_hash::FxHashMap;

use super::Value;

/// Variable bindings of a single program run.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    variables: FxHashMap<String, Value>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Binds `name`, replacing any previous value and its type.
    pub fn assign(&mut self, name: String, value: Value) -> Option<Value> {
        self.variables.insert(name, value)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}
