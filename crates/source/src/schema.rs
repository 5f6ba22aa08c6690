use std::{fmt, fs, path::Path, str::FromStr};

use crate::{
    error::{FieldProblem, MalformedRecordError, SourceError},
    record::Value,
};

/// Declared type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Int,
    Float,
    Bool,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::String => "string",
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::Bool => "bool",
        };
        f.write_str(name)
    }
}

impl FromStr for FieldType {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "string" | "str" => Ok(FieldType::String),
            "int" | "integer" => Ok(FieldType::Int),
            "float" | "number" => Ok(FieldType::Float),
            "bool" | "boolean" => Ok(FieldType::Bool),
            other => Err(SourceError::Schema(format!("unknown field type {other:?}"))),
        }
    }
}

impl FieldType {
    /// Convert `value` to this type, or `None` if it cannot represent it.
    ///
    /// Text is parsed (CSV cells arrive as text); typed JSON values must
    /// already match, except that ints widen to floats.
    fn coerce(self, value: &Value) -> Option<Value> {
        match (self, value) {
            (FieldType::String, Value::Str(_)) => Some(value.clone()),

            (FieldType::Int, Value::Int(_)) => Some(value.clone()),
            (FieldType::Int, Value::Str(s)) => s.trim().parse::<i64>().ok().map(Value::Int),

            (FieldType::Float, Value::Float(_)) => Some(value.clone()),
            (FieldType::Float, Value::Int(i)) => Some(Value::Float(*i as f64)),
            (FieldType::Float, Value::Str(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(Value::Float),

            (FieldType::Bool, Value::Bool(_)) => Some(value.clone()),
            (FieldType::Bool, Value::Str(s)) => {
                s.trim().to_ascii_lowercase().parse::<bool>().ok().map(Value::Bool)
            }

            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub ty: FieldType,
    pub required: bool,
}

/// Declared fields a record must carry.
///
/// Parsed from a JSON object mapping field name to type name, where a
/// trailing `?` marks the field optional:
///
/// ```json
/// { "id": "int", "email": "string", "score": "float?" }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<FieldSpec>,
}

impl Schema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn load(path: &Path) -> Result<Self, SourceError> {
        let text = fs::read_to_string(path).map_err(|source| SourceError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, SourceError> {
        let root: serde_json::Value = serde_json::from_str(text)?;
        let obj = root
            .as_object()
            .ok_or_else(|| SourceError::Schema("schema must be a JSON object".into()))?;

        let mut fields = Vec::with_capacity(obj.len());
        for (name, decl) in obj {
            let decl = decl.as_str().ok_or_else(|| {
                SourceError::Schema(format!("type of field {name:?} must be a string"))
            })?;
            let (decl, required) = match decl.strip_suffix('?') {
                Some(base) => (base, false),
                None => (decl, true),
            };
            fields.push(FieldSpec {
                name: name.clone(),
                ty: decl.parse()?,
                required,
            });
        }

        Ok(Self { fields })
    }

    /// Validate and coerce one decoded record.
    ///
    /// Declared fields are checked and converted; undeclared text fields are
    /// narrowed with [`Value::infer`] when `infer` is set. Field order is kept.
    pub fn apply(
        &self,
        sequence_index: usize,
        mut fields: Vec<(String, Value)>,
        infer: bool,
    ) -> Result<Vec<(String, Value)>, MalformedRecordError> {
        for spec in &self.fields {
            let present = fields
                .iter()
                .any(|(name, value)| name == &spec.name && !value.is_null());
            if spec.required && !present {
                return Err(MalformedRecordError::new(
                    sequence_index,
                    &spec.name,
                    FieldProblem::Missing,
                ));
            }
        }

        for (name, value) in fields.iter_mut() {
            if value.is_null() {
                continue;
            }
            match self.get(name) {
                Some(spec) => {
                    let coerced = spec.ty.coerce(value).ok_or_else(|| {
                        MalformedRecordError::new(
                            sequence_index,
                            name.as_str(),
                            FieldProblem::WrongType {
                                expected: spec.ty,
                                found: value.kind(),
                                raw: raw_text(value),
                            },
                        )
                    })?;
                    *value = coerced;
                }
                None if infer => {
                    if let Value::Str(s) = value {
                        let narrowed = Value::infer(s);
                        *value = narrowed;
                    }
                }
                None => {}
            }
        }

        Ok(fields)
    }
}

fn raw_text(value: &Value) -> String {
    match value {
        Value::Str(s) => s.clone(),
        other => other.to_json().to_string(),
    }
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
