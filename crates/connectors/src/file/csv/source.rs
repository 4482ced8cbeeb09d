use crate::file::csv::error::FileError;
use chrono::{DateTime, NaiveDateTime, Utc};
use model::{
    core::{data_type::LogicalType, schema::Schema, value::Value},
    records::batch::{RecordBatch, Row},
};
use std::{fs::File, io::Read, path::Path};

/// Reads one CSV file as one upstream partition.
///
/// Empty fields become NULL. Values are parsed according to the schema.
pub struct CsvPartitionSource<R: Read = File> {
    partition_index: usize,
    schema: Schema,
    reader: csv::Reader<R>,
    record: csv::StringRecord,
    rows_read: u64,
}

impl CsvPartitionSource<File> {
    pub fn open(
        path: impl AsRef<Path>,
        partition_index: usize,
        schema: Schema,
        has_headers: bool,
    ) -> Result<Self, FileError> {
        let file = File::open(path)?;
        Ok(Self::from_reader(file, partition_index, schema, has_headers))
    }
}

impl<R: Read> CsvPartitionSource<R> {
    pub fn from_reader(reader: R, partition_index: usize, schema: Schema, has_headers: bool) -> Self {
        let reader = csv::ReaderBuilder::new()
            .has_headers(has_headers)
            .flexible(true)
            .from_reader(reader);
        Self {
            partition_index,
            schema,
            reader,
            record: csv::StringRecord::new(),
            rows_read: 0,
        }
    }

    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    /// Returns up to `batch_size` rows, or `None` once the file is exhausted.
    pub fn next_batch(&mut self, batch_size: usize) -> Result<Option<RecordBatch>, FileError> {
        let mut rows = Vec::with_capacity(batch_size);
        while rows.len() < batch_size.max(1) {
            if !self.reader.read_record(&mut self.record)? {
                break;
            }
            self.rows_read += 1;
            rows.push(self.parse_record()?);
        }

        if rows.is_empty() {
            Ok(None)
        } else {
            Ok(Some(RecordBatch::new(self.partition_index, rows)))
        }
    }

    fn parse_record(&self) -> Result<Row, FileError> {
        if self.record.len() != self.schema.len() {
            return Err(FileError::FieldCount {
                record: self.rows_read,
                expected: self.schema.len(),
                actual: self.record.len(),
            });
        }

        self.schema
            .columns()
            .iter()
            .zip(self.record.iter())
            .map(|(col, raw)| {
                parse_value(raw, col.logical_type).ok_or_else(|| FileError::InvalidValue {
                    record: self.rows_read,
                    column: col.name.clone(),
                    raw: raw.to_string(),
                    expected: col.logical_type.to_string(),
                })
            })
            .collect()
    }
}

fn parse_value(raw: &str, logical_type: LogicalType) -> Option<Value> {
    if raw.is_empty() {
        return Some(Value::Null);
    }

    match logical_type {
        LogicalType::Boolean => match raw.to_ascii_lowercase().as_str() {
            "true" | "t" | "1" | "yes" => Some(Value::Boolean(true)),
            "false" | "f" | "0" | "no" => Some(Value::Boolean(false)),
            _ => None,
        },
        LogicalType::Long => raw.trim().parse::<i64>().ok().map(Value::Long),
        LogicalType::Double => raw.trim().parse::<f64>().ok().map(Value::Double),
        LogicalType::String => Some(Value::String(raw.to_string())),
        LogicalType::Timestamp => parse_timestamp(raw.trim()).map(Value::Timestamp),
        LogicalType::Json => serde_json::from_str(raw).ok().map(Value::Json),
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::core::schema::Column;
    use std::io::Write;

    fn schema() -> Schema {
        Schema::new(vec![
            Column::new("id", LogicalType::Long),
            Column::new("name", LogicalType::String),
            Column::new("active", LogicalType::Boolean),
            Column::new("seen_at", LogicalType::Timestamp),
        ])
    }

    #[test]
    fn reads_file_in_batches() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "id,name,active,seen_at").unwrap();
        writeln!(file, "1,alice,true,2024-01-01 00:00:00").unwrap();
        writeln!(file, "2,,false,2024-01-01T10:00:00Z").unwrap();
        writeln!(file, "3,carol,,").unwrap();

        let mut source = CsvPartitionSource::open(file.path(), 4, schema(), true).unwrap();

        let first = source.next_batch(2).unwrap().unwrap();
        assert_eq!(first.partition_index, 4);
        assert_eq!(first.row_count(), 2);
        assert_eq!(first.rows[1][1], Value::Null);

        let second = source.next_batch(2).unwrap().unwrap();
        assert_eq!(second.row_count(), 1);
        assert_eq!(second.rows[0][2], Value::Null);

        assert!(source.next_batch(2).unwrap().is_none());
        assert_eq!(source.rows_read(), 3);
    }

    #[test]
    fn reports_bad_values_with_position() {
        let data = "x,bob,true,\n";
        let mut source = CsvPartitionSource::from_reader(data.as_bytes(), 0, schema(), false);
        let err = source.next_batch(10).unwrap_err();
        assert!(matches!(err, FileError::InvalidValue { record: 1, ref column, .. } if column == "id"));
    }

    #[test]
    fn reports_wrong_field_count() {
        let data = "1,bob\n";
        let mut source = CsvPartitionSource::from_reader(data.as_bytes(), 0, schema(), false);
        assert!(matches!(
            source.next_batch(10).unwrap_err(),
            FileError::FieldCount { expected: 4, actual: 2, .. }
        ));
    }
}
