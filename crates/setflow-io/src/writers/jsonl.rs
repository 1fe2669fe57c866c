//! Streaming NDJSON writer.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde_json::{Map, Value};

use setflow_core::types::{RowBatch, Scalar};

use crate::error::Result;

pub struct JsonlWriter<W: Write> {
    writer: BufWriter<W>,
    rows_written: u64,
}

impl JsonlWriter<File> {
    pub fn to_path(path: impl AsRef<Path>) -> Result<Self> {
        let f = File::create(path)?;
        Ok(Self::to_writer(f))
    }
}

impl<W: Write> JsonlWriter<W> {
    pub fn to_writer(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
            rows_written: 0,
        }
    }

    /// Write a batch as one JSON object per row.
    pub fn write_batch(&mut self, batch: &RowBatch) -> Result<()> {
        for r in 0..batch.num_rows() {
            let mut obj = Map::with_capacity(batch.num_columns());
            for col in &batch.columns {
                obj.insert(col.name.clone(), scalar_to_json(&col.values[r]));
            }
            serde_json::to_writer(&mut self.writer, &obj)?;
            self.writer.write_all(b"\n")?;
            self.rows_written += 1;
        }
        Ok(())
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    pub fn finish(mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

fn scalar_to_json(v: &Scalar) -> Value {
    match v {
        Scalar::Null => Value::Null,
        Scalar::Bool(b) => Value::Bool(*b),
        Scalar::I32(i) => Value::from(*i),
        Scalar::I64(i) | Scalar::Date64(i) => Value::from(*i),
        Scalar::F32(f) => Value::from(f64::from(*f)),
        Scalar::F64(f) => Value::from(*f),
        // i128 has no lossless JSON number form.
        Scalar::Decimal128(d) => Value::String(d.to_string()),
        Scalar::Str(s) => Value::String(s.clone()),
        Scalar::Bin(b) => Value::Array(b.iter().map(|x| Value::from(*x)).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use setflow_core::types::Column;

    #[test]
    fn one_object_per_row() {
        let batch = RowBatch {
            columns: vec![
                Column::new("id", vec![Scalar::I64(1), Scalar::I64(2)]),
                Column::new("v", vec![Scalar::Null, Scalar::F64(0.5)]),
            ],
        };
        let mut buf = Vec::new();
        {
            let mut w = JsonlWriter::to_writer(&mut buf);
            w.write_batch(&batch).unwrap();
            w.finish().unwrap();
        }
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["id"], Value::from(1));
        assert_eq!(lines[0]["v"], Value::Null);
        assert_eq!(lines[1]["v"], Value::from(0.5));
    }
}
