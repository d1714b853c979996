// Named cell slot: one schema field plus the value staged for the next row.
use crate::core::value::{Value, ValueType};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Column {
    name: String,
    value: Value,
}

impl Column {
    /// Creates a column with no value staged.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Value::None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn value_type(&self) -> ValueType {
        self.value.value_type()
    }

    pub fn set_none(&mut self) {
        self.value = Value::None;
    }

    pub fn set_int(&mut self, value: i64) {
        self.value = Value::Int(value);
    }

    pub fn set_float(&mut self, value: f64) {
        self.value = Value::Float(value);
    }

    pub fn set_string(&mut self, value: &str) {
        // Reuse the held buffer when the column already stages text.
        match &mut self.value {
            Value::Str(held) => {
                held.clear();
                held.push_str(value);
            }
            other => *other = Value::Str(value.to_string()),
        }
    }

    /// Stages `value` regardless of its tag.
    pub fn set(&mut self, value: impl Into<Value>) {
        self.value = value.into();
    }

    /// Removes the staged value and returns it, leaving `none`.
    pub fn take(&mut self) -> Value {
        std::mem::take(&mut self.value)
    }
}
