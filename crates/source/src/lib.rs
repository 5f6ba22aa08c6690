mod config;
mod decode;
mod error;
mod reader;
mod record;
mod schema;

pub use config::DEFAULT_INFER_CSV_SCALARS;
pub use decode::{InputFormat, RawRecord, RawRows, csv_rows, json_rows};
pub use error::{FieldProblem, MalformedRecordError, SourceError};
pub use reader::{FileRecords, RecordSource, open_records};
pub use record::{Record, Value};
pub use schema::{FieldSpec, FieldType, Schema};
