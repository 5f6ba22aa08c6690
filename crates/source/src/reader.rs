use std::{fs::File, io::BufReader, path::Path};

use log::{debug, warn};

use crate::{
    config::DEFAULT_INFER_CSV_SCALARS,
    decode::{InputFormat, RawRecord, RawRows, csv_rows, json_rows},
    error::SourceError,
    record::Record,
    schema::Schema,
};

/// Lazy, one-pass, fail-fast stream of [`Record`]s.
///
/// Sequence indices are assigned in input order starting at 0. After the
/// first error the stream is exhausted: a malformed row means the input
/// file is corrupt, so nothing after it is trusted.
pub struct RecordSource<I> {
    rows: I,
    schema: Schema,
    infer: bool,
    next_index: usize,
    failed: bool,
}

pub type FileRecords = RecordSource<RawRows>;

impl<I> RecordSource<I>
where
    I: Iterator<Item = Result<RawRecord, SourceError>>,
{
    pub fn new(rows: I, schema: Option<Schema>) -> Self {
        Self {
            rows,
            schema: schema.unwrap_or_default(),
            infer: false,
            next_index: 0,
            failed: false,
        }
    }

    /// Narrow undeclared text fields to bool/int/float.
    pub fn infer_scalars(mut self, infer: bool) -> Self {
        self.infer = infer;
        self
    }

    /// Number of records handed out so far.
    pub fn position(&self) -> usize {
        self.next_index
    }
}

impl<I> Iterator for RecordSource<I>
where
    I: Iterator<Item = Result<RawRecord, SourceError>>,
{
    type Item = Result<Record, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let index = self.next_index;
        let result = match self.rows.next()? {
            Ok(raw) => self
                .schema
                .apply(index, raw, self.infer)
                .map(|fields| Record::new(index, fields))
                .map_err(SourceError::from),
            Err(e) => Err(e),
        };

        match &result {
            Ok(_) => self.next_index += 1,
            Err(e) => {
                warn!("[source] stopping at record {index}: {e}");
                self.failed = true;
            }
        }

        Some(result)
    }
}

/// Open `path` and stream its records.
///
/// `format` overrides detection by extension.
pub fn open_records(
    path: &Path,
    format: Option<InputFormat>,
    schema: Option<Schema>,
) -> Result<FileRecords, SourceError> {
    let format = match format.or_else(|| InputFormat::from_path(path)) {
        Some(f) => f,
        None => return Err(SourceError::UnknownFormat(path.to_path_buf())),
    };

    let file = File::open(path).map_err(|source| SourceError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);

    debug!("[source] reading {} as {:?}", path.display(), format);

    let source = match format {
        InputFormat::Csv => {
            RecordSource::new(csv_rows(reader)?, schema).infer_scalars(DEFAULT_INFER_CSV_SCALARS)
        }
        InputFormat::Json => RecordSource::new(json_rows(reader)?, schema),
    };

    Ok(source)
}

#[cfg(test)]
#[path = "reader_tests.rs"]
mod tests;
