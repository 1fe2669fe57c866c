//! CSV writer for result batches.

use std::borrow::Cow;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use setflow_core::schema::Schema;
use setflow_core::types::{RowBatch, Scalar};

use crate::error::Result;

pub struct CsvWriter<W: Write> {
    writer: csv::Writer<W>,
    rows_written: u64,
}

impl CsvWriter<File> {
    pub fn to_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::to_writer(file))
    }
}

impl<W: Write> CsvWriter<W> {
    pub fn to_writer(writer: W) -> Self {
        Self {
            writer: csv::WriterBuilder::new().has_headers(false).from_writer(writer),
            rows_written: 0,
        }
    }

    /// Write the column names as the first record.
    pub fn write_header(&mut self, header: &Schema) -> Result<()> {
        self.writer
            .write_record(header.fields.iter().map(|f| f.name.as_str()))?;
        Ok(())
    }

    /// Append every row of `batch`. Zero-row batches write nothing.
    pub fn write_batch(&mut self, batch: &RowBatch) -> Result<()> {
        for row in 0..batch.num_rows() {
            self.writer
                .write_record(batch.columns.iter().map(|c| scalar_text(&c.values[row]).into_owned()))?;
            self.rows_written += 1;
        }
        Ok(())
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Flush buffered records.
    pub fn finish(mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Text form of a value; NULL is the empty field.
pub fn scalar_text(v: &Scalar) -> Cow<'_, str> {
    match v {
        Scalar::Null => Cow::Borrowed(""),
        Scalar::Bool(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
        Scalar::I32(i) => Cow::Owned(i.to_string()),
        Scalar::I64(i) | Scalar::Date64(i) => Cow::Owned(i.to_string()),
        Scalar::F32(f) => Cow::Owned(f.to_string()),
        Scalar::F64(f) => Cow::Owned(f.to_string()),
        Scalar::Decimal128(d) => Cow::Owned(d.to_string()),
        Scalar::Str(s) => Cow::Borrowed(s.as_str()),
        Scalar::Bin(b) => String::from_utf8_lossy(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use setflow_core::schema::{DataType, Field};
    use setflow_core::types::Column;

    #[test]
    fn writes_header_then_rows() {
        let header = Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, true),
        ]);
        let batch = RowBatch {
            columns: vec![
                Column::new("id", vec![Scalar::I64(1), Scalar::I64(2)]),
                Column::new("name", vec![Scalar::Str("a,b".into()), Scalar::Null]),
            ],
        };
        let mut buf = Vec::new();
        {
            let mut w = CsvWriter::to_writer(&mut buf);
            w.write_header(&header).unwrap();
            w.write_batch(&batch.empty_like()).unwrap();
            w.write_batch(&batch).unwrap();
            assert_eq!(w.rows_written(), 2);
            w.finish().unwrap();
        }
        assert_eq!(String::from_utf8(buf).unwrap(), "id,name\n1,\"a,b\"\n2,\n");
    }
}
