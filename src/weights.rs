//! Priority weights per object type.

use std::collections::HashMap;

/// Maps an object path to an integer priority. Unmapped paths weigh 0.
#[derive(Debug, Clone, Default)]
pub struct WeightTable {
    rules: HashMap<String, i32>,
}

impl WeightTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn weight_of(&self, path: &str) -> i32 {
        self.rules.get(path).copied().unwrap_or(0)
    }

    /// Insert or replace a rule, returning the previous weight.
    pub fn set(&mut self, path: impl Into<String>, weight: i32) -> Option<i32> {
        self.rules.insert(path.into(), weight)
    }

    pub fn remove(&mut self, path: &str) -> Option<i32> {
        self.rules.remove(path)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl From<HashMap<String, i32>> for WeightTable {
    fn from(rules: HashMap<String, i32>) -> Self {
        Self { rules }
    }
}
