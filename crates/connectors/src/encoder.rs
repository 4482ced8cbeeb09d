use crate::error::EncodeError;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use model::{core::value::Value, records::batch::RecordBatch};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f%:z";

/// Turns a batch into the byte format accepted by the load stream.
pub trait RowEncoder: Send + Sync {
    fn encode(&self, batch: &RecordBatch) -> Result<Bytes, EncodeError>;
}

/// Delimited text for `COPY ... DELIMITER '<d>' NULL ''`.
///
/// NULL is written as an empty field; the delimiter, backslash, CR and LF are
/// escaped with a backslash.
#[derive(Debug, Clone)]
pub struct DelimitedEncoder {
    delimiter: char,
    column_count: usize,
    timezone: Tz,
    load_time: Option<DateTime<Utc>>,
    csv_payload: bool,
}

impl DelimitedEncoder {
    pub fn new(delimiter: char, column_count: usize) -> Self {
        Self {
            delimiter,
            column_count,
            timezone: Tz::UTC,
            load_time: None,
            csv_payload: false,
        }
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    /// Appends `at` as a trailing value to every row.
    pub fn with_load_time(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.load_time = at;
        self
    }

    /// Treats the first value of each row as a pre-formatted line.
    pub fn with_csv_payload(mut self, enabled: bool) -> Self {
        self.csv_payload = enabled;
        self
    }

    fn format_timestamp(&self, ts: &DateTime<Utc>) -> String {
        ts.with_timezone(&self.timezone)
            .format(TIMESTAMP_FORMAT)
            .to_string()
    }

    fn push_escaped(&self, out: &mut String, text: &str) {
        for ch in text.chars() {
            if ch == self.delimiter || ch == '\\' || ch == '\n' || ch == '\r' {
                out.push('\\');
            }
            out.push(ch);
        }
    }

    fn push_value(&self, out: &mut String, value: &Value) {
        match value {
            Value::Null => {}
            Value::Boolean(v) => out.push_str(if *v { "true" } else { "false" }),
            Value::Long(v) => out.push_str(&v.to_string()),
            Value::Double(v) => out.push_str(&format_double(*v)),
            Value::String(s) => self.push_escaped(out, s),
            Value::Timestamp(ts) => out.push_str(&self.format_timestamp(ts)),
            Value::Json(v) => self.push_escaped(out, &v.to_string()),
        }
    }

    /// The payload line is written as is; only the load time is appended.
    fn encode_payload(&self, batch: &RecordBatch) -> Result<Bytes, EncodeError> {
        let load_time = self.load_time.as_ref().map(|ts| self.format_timestamp(ts));
        let mut out = String::new();
        for row in &batch.rows {
            match row.first() {
                Some(Value::String(line)) => out.push_str(line.trim_end_matches(['\r', '\n'])),
                Some(Value::Null) | None => {}
                Some(other) => return Err(EncodeError::InvalidPayload(format!("{other:?}"))),
            }
            if let Some(ts) = &load_time {
                out.push(self.delimiter);
                out.push_str(ts);
            }
            out.push('\n');
        }
        Ok(Bytes::from(out))
    }
}

impl RowEncoder for DelimitedEncoder {
    fn encode(&self, batch: &RecordBatch) -> Result<Bytes, EncodeError> {
        if self.csv_payload {
            return self.encode_payload(batch);
        }

        let load_time = self.load_time.as_ref().map(|ts| self.format_timestamp(ts));
        let mut out = String::with_capacity(batch.size_bytes() + batch.rows.len() * 8);

        for (idx, row) in batch.rows.iter().enumerate() {
            if row.len() != self.column_count {
                return Err(EncodeError::ColumnCount {
                    row: idx,
                    expected: self.column_count,
                    actual: row.len(),
                });
            }

            for (pos, value) in row.iter().enumerate() {
                if pos > 0 {
                    out.push(self.delimiter);
                }
                self.push_value(&mut out, value);
            }

            if let Some(ts) = &load_time {
                if self.column_count > 0 {
                    out.push(self.delimiter);
                }
                out.push_str(ts);
            }
            out.push('\n');
        }

        Ok(Bytes::from(out))
    }
}

fn format_double(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.is_infinite() {
        (if v > 0.0 { "Infinity" } else { "-Infinity" }).to_string()
    } else {
        ryu::Buffer::new().format_finite(v).to_string()
    }
}
