use serde::Serialize;

/// A single scalar cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    /// Narrow an untyped text cell: empty is null, then bool, int, float, text.
    pub fn infer(raw: &str) -> Value {
        if raw.is_empty() {
            return Value::Null;
        }
        if let Ok(b) = raw.parse::<bool>() {
            return Value::Bool(b);
        }
        if let Ok(i) = raw.parse::<i64>() {
            return Value::Int(i);
        }
        // Reject "inf"/"nan" spellings; those are almost always text.
        if let Ok(f) = raw.parse::<f64>()
            && f.is_finite()
        {
            return Value::Float(f);
        }
        Value::Str(raw.to_owned())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// JSON form used on the wire. Non-finite floats become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.clone()),
        }
    }
}

/// An ordered field mapping tagged with its position in the input.
///
/// Records are immutable once read; batching and dispatch only move them.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    sequence_index: usize,
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new(sequence_index: usize, fields: Vec<(String, Value)>) -> Self {
        Self {
            sequence_index,
            fields,
        }
    }

    /// 0-based position in the source sequence.
    pub fn sequence_index(&self) -> usize {
        self.sequence_index
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields as a JSON object, preserving source order.
    pub fn to_json_object(&self) -> serde_json::Map<String, serde_json::Value> {
        self.fields
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect()
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
