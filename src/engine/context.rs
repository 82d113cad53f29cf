// ABOUTME: Prime context describing one fail-closed interpolation request
// ABOUTME: Carries the source text, the interpolate flag, purpose locals and naming overrides

use crate::template::{Locals, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct PrimeContext {
    pub source: String,
    /// `false` returns the source unmodified without compiling it
    pub interpolate: bool,
    /// Purpose-specific locals, lowest priority in the render scope
    pub context: Locals,
    pub exec_fn_name: Option<String>,
    pub local_var_name: Option<String>,
    pub self_ref_key_name: Option<String>,
}

impl PrimeContext {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            interpolate: true,
            context: Locals::new(),
            exec_fn_name: None,
            local_var_name: None,
            self_ref_key_name: None,
        }
    }

    pub fn with_context(mut self, context: Locals) -> Self {
        self.context = context;
        self
    }

    pub fn with_local(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(name.into(), value.into());
        self
    }

    pub fn without_interpolation(mut self) -> Self {
        self.interpolate = false;
        self
    }

    /// The value bound under the self-reference name
    pub fn self_value(&self) -> Value {
        let mut record = Locals::new();
        record.insert("source".to_string(), Value::from(self.source.as_str()));
        record.insert("interpolate".to_string(), Value::Bool(self.interpolate));
        for (key, value) in &self.context {
            record.entry(key.clone()).or_insert_with(|| value.clone());
        }
        Value::Object(record)
    }
}
