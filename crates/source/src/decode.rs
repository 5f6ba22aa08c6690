use std::{io::Read, path::Path, str::FromStr};

use crate::{
    error::{FieldProblem, MalformedRecordError, SourceError},
    record::Value,
};

/// One decoded row before schema checks: ordered name/value pairs.
pub type RawRecord = Vec<(String, Value)>;

/// Lazy stream of decoded rows.
pub type RawRows = Box<dyn Iterator<Item = Result<RawRecord, SourceError>> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    Json,
}

impl InputFormat {
    /// Pick a format from the file extension, case-insensitively.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(InputFormat::Csv),
            "json" => Some(InputFormat::Json),
            _ => None,
        }
    }
}

impl FromStr for InputFormat {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(InputFormat::Csv),
            "json" => Ok(InputFormat::Json),
            other => Err(SourceError::UnsupportedFormat(other.to_owned())),
        }
    }
}

/// Decode CSV with a header row. Every cell stays text; empty cells are null.
///
/// Rows are read one at a time as the iterator is driven.
pub fn csv_rows<R>(reader: R) -> Result<RawRows, SourceError>
where
    R: Read + Send + 'static,
{
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_owned).collect();

    let rows = rdr.into_records().map(move |row| {
        let row = row?;
        Ok(headers
            .iter()
            .cloned()
            .zip(row.iter().map(|cell| {
                if cell.is_empty() {
                    Value::Null
                } else {
                    Value::Str(cell.to_owned())
                }
            }))
            .collect())
    });

    Ok(Box::new(rows))
}

/// Decode a top-level JSON array of flat objects.
///
/// The document is parsed up front; conversion to [`RawRecord`] is lazy.
pub fn json_rows<R: Read>(reader: R) -> Result<RawRows, SourceError> {
    let root: serde_json::Value = serde_json::from_reader(reader)?;

    let items = match root {
        serde_json::Value::Array(items) => items,
        other => return Err(SourceError::NotAnArray(json_kind(&other))),
    };

    let rows = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| json_object_to_row(index, item));

    Ok(Box::new(rows))
}

fn json_object_to_row(index: usize, item: serde_json::Value) -> Result<RawRecord, SourceError> {
    let serde_json::Value::Object(obj) = item else {
        return Err(MalformedRecordError::new(index, "", FieldProblem::NotAnObject).into());
    };

    let mut row = Vec::with_capacity(obj.len());
    for (name, value) in obj {
        let value = match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            // Integers outside i64 keep their exact text.
            serde_json::Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => Value::Int(i),
                (None, Some(f)) if n.is_f64() => Value::Float(f),
                _ => Value::Str(n.to_string()),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                return Err(MalformedRecordError::new(index, name, FieldProblem::NotScalar).into());
            }
        };
        row.push((name, value));
    }

    Ok(row)
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

#[cfg(test)]
#[path = "decode_tests.rs"]
mod tests;
