//! Header-typed CSV reader.
//!
//! An empty field is NULL for nullable columns. For non-nullable Utf8 it is
//! the empty string; for any other non-nullable column it is an error.
//! A column flagged constant must hold one value across the whole file.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use setflow_core::schema::{DataType, Field, Schema};
use setflow_core::types::{Column, RowBatch, Scalar};

use crate::error::{IoError, Result};

pub struct CsvReader<R: Read> {
    reader: csv::Reader<R>,
    header: Schema,
    record: csv::StringRecord,
    /// First value seen in each constant column.
    constants: Vec<Option<Scalar>>,
    exhausted: bool,
}

impl CsvReader<File> {
    /// Open a file whose first line is a header row.
    pub fn from_path(path: impl AsRef<Path>, header: Schema) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(file, header, true)
    }
}

impl<R: Read> CsvReader<R> {
    pub fn from_reader(reader: R, header: Schema, has_headers: bool) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(has_headers)
            .flexible(true)
            .from_reader(reader);
        if has_headers {
            let names = reader.headers()?;
            if names.len() != header.len() {
                return Err(IoError::Schema(format!(
                    "csv header has {} columns, expected {}",
                    names.len(),
                    header.len()
                )));
            }
        }
        let constants = vec![None; header.len()];
        Ok(Self {
            reader,
            header,
            record: csv::StringRecord::new(),
            constants,
            exhausted: false,
        })
    }

    pub fn header(&self) -> &Schema {
        &self.header
    }

    /// Read up to `max_rows` rows. `None` once the input is exhausted.
    pub fn next_batch(&mut self, max_rows: usize) -> Result<Option<RowBatch>> {
        if self.exhausted {
            return Ok(None);
        }
        let width = self.header.len();
        let mut values: Vec<Vec<Scalar>> = (0..width).map(|_| Vec::with_capacity(max_rows)).collect();
        let mut rows = 0;
        while rows < max_rows {
            if !self.reader.read_record(&mut self.record)? {
                self.exhausted = true;
                break;
            }
            let line = self.record.position().map(|p| p.line()).unwrap_or(0);
            if self.record.len() != width {
                return Err(IoError::Parse {
                    line,
                    column: String::new(),
                    msg: format!("expected {} fields, found {}", width, self.record.len()),
                });
            }
            let cells = self.header.fields.iter().zip(&self.record).zip(&mut self.constants);
            for (((field, text), seen), out) in cells.zip(&mut values) {
                let value = parse_scalar(text, field).map_err(|msg| IoError::Parse {
                    line,
                    column: field.name.clone(),
                    msg,
                })?;
                if field.constant {
                    match seen {
                        Some(first) if *first != value => {
                            return Err(IoError::Parse {
                                line,
                                column: field.name.clone(),
                                msg: format!("constant column holds {value:?} after {first:?}"),
                            });
                        }
                        Some(_) => {}
                        None => *seen = Some(value.clone()),
                    }
                }
                out.push(value);
            }
            rows += 1;
        }
        if rows == 0 {
            return Ok(None);
        }
        let columns = self
            .header
            .fields
            .iter()
            .zip(values)
            .map(|(field, values)| {
                let mut col = Column::new(field.name.clone(), values);
                col.constant = field.constant;
                col
            })
            .collect();
        Ok(Some(RowBatch { columns }))
    }

    /// Drain the reader into batches of at most `batch_rows` rows.
    pub fn read_all(mut self, batch_rows: usize) -> Result<Vec<RowBatch>> {
        let mut out = Vec::new();
        while let Some(batch) = self.next_batch(batch_rows)? {
            out.push(batch);
        }
        Ok(out)
    }
}

/// Read a whole CSV file (with a header row) into batches.
pub fn read_csv_path(path: impl AsRef<Path>, header: Schema, batch_rows: usize) -> Result<Vec<RowBatch>> {
    CsvReader::from_path(path, header)?.read_all(batch_rows)
}

/// Convert one CSV field to a value of `field`'s type.
pub fn parse_scalar(text: &str, field: &Field) -> std::result::Result<Scalar, String> {
    if text.is_empty() {
        if field.nullable {
            return Ok(Scalar::Null);
        }
        if field.data_type == DataType::Utf8 {
            return Ok(Scalar::Str(String::new()));
        }
        return Err("empty value in non-nullable column".into());
    }
    let t = text.trim();
    let bad = |e: &dyn std::fmt::Display| format!("cannot parse '{text}' as {:?}: {e}", field.data_type);
    let v = match field.data_type {
        DataType::Boolean => match t.to_ascii_lowercase().as_str() {
            "true" | "t" | "1" => Scalar::Bool(true),
            "false" | "f" | "0" => Scalar::Bool(false),
            _ => return Err(bad(&"expected true/false")),
        },
        DataType::Int32 => Scalar::I32(t.parse().map_err(|e| bad(&e))?),
        DataType::Int64 => Scalar::I64(t.parse().map_err(|e| bad(&e))?),
        DataType::Float32 => Scalar::F32(t.parse().map_err(|e| bad(&e))?),
        DataType::Float64 => Scalar::F64(t.parse().map_err(|e| bad(&e))?),
        DataType::Date64 => Scalar::Date64(t.parse().map_err(|e| bad(&e))?),
        DataType::Decimal128 => Scalar::Decimal128(t.parse().map_err(|e| bad(&e))?),
        DataType::Utf8 => Scalar::Str(text.to_string()),
        DataType::Binary => Scalar::Bin(text.as_bytes().to_vec()),
    };
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> Schema {
        Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, true),
            Field::new("score", DataType::Float64, true),
        ])
    }

    #[test]
    fn chunks_rows_into_bounded_batches() {
        let data = "id,name,score\n1,a,0.5\n2,,\n3,c,-1\n";
        let batches = CsvReader::from_reader(data.as_bytes(), header(), true)
            .unwrap()
            .read_all(2)
            .unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].num_rows(), 2);
        assert_eq!(batches[1].num_rows(), 1);
        assert_eq!(batches[0].columns[1].values[1], Scalar::Null);
        assert_eq!(batches[0].columns[2].values[1], Scalar::Null);
        assert_eq!(batches[1].columns[0].values[0], Scalar::I64(3));
    }

    #[test]
    fn empty_file_yields_no_batches() {
        let mut r = CsvReader::from_reader("id,name,score\n".as_bytes(), header(), true).unwrap();
        assert!(r.next_batch(10).unwrap().is_none());
        assert!(r.next_batch(10).unwrap().is_none());
    }

    #[test]
    fn constant_flag_is_carried_to_columns() {
        let h = Schema::new(vec![
            Field::new("id", DataType::Int32, false),
            Field::new("src", DataType::Utf8, false).with_constant(true),
        ]);
        let batch = CsvReader::from_reader("1,x\n2,x\n".as_bytes(), h, false)
            .unwrap()
            .next_batch(10)
            .unwrap()
            .unwrap();
        assert!(!batch.columns[0].constant);
        assert!(batch.columns[1].constant);
    }

    #[test]
    fn constant_column_must_not_vary_across_batches() {
        let h = Schema::new(vec![
            Field::new("id", DataType::Int32, false),
            Field::new("src", DataType::Utf8, false).with_constant(true),
        ]);
        let mut r = CsvReader::from_reader("id,src\n1,x\n2,x\n3,y\n".as_bytes(), h, true).unwrap();
        assert_eq!(r.next_batch(2).unwrap().unwrap().num_rows(), 2);
        match r.next_batch(2).unwrap_err() {
            IoError::Parse { line, column, .. } => {
                assert_eq!(line, 4);
                assert_eq!(column, "src");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn bad_values_report_line_and_column() {
        let data = "id,name,score\n1,a,0.5\nx,b,1\n";
        let err = CsvReader::from_reader(data.as_bytes(), header(), true)
            .unwrap()
            .read_all(10)
            .unwrap_err();
        match err {
            IoError::Parse { line, column, .. } => {
                assert_eq!(line, 3);
                assert_eq!(column, "id");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn header_width_must_match() {
        let res = CsvReader::from_reader("id,name\n".as_bytes(), header(), true);
        assert!(matches!(res, Err(IoError::Schema(_))));
    }

    #[test]
    fn empty_non_nullable_field() {
        let s = Field::new("s", DataType::Utf8, false);
        assert_eq!(parse_scalar("", &s), Ok(Scalar::Str(String::new())));
        let i = Field::new("i", DataType::Int64, false);
        assert!(parse_scalar("", &i).is_err());
        let b = Field::new("b", DataType::Boolean, false);
        assert_eq!(parse_scalar("TRUE", &b), Ok(Scalar::Bool(true)));
    }
}
