//! Key extraction: which columns of a stream form the set-membership key.
//!
//! Constant columns carry no discriminating information and are skipped.
//! The decision is structural (the header's `constant` flag), never a
//! comparison of runtime values.

use setflow_core::schema::{DataType, Schema};
use setflow_core::types::{RowBatch, Scalar};

use crate::traits::OpError;

/// One participating key column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyColumn {
    pub position: usize,
    pub data_type: DataType,
    pub nullable: bool,
}

/// The key column set of one operator, fixed at construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySpec {
    columns: Vec<KeyColumn>,
}

impl KeySpec {
    /// Select key columns from a header. Named headers resolve each name to
    /// its first position; anonymous headers are walked by position.
    pub fn from_header(header: &Schema) -> Self {
        let names = header.names();
        let num_columns = if names.is_empty() {
            header.len()
        } else {
            names.len()
        };

        let mut columns = Vec::with_capacity(num_columns);
        for i in 0..num_columns {
            let pos = if names.is_empty() {
                i
            } else {
                header.index_of(names[i]).unwrap_or(i)
            };
            let Some(field) = header.field(pos) else {
                continue;
            };
            if field.constant {
                continue;
            }
            columns.push(KeyColumn {
                position: pos,
                data_type: field.data_type,
                nullable: field.nullable,
            });
        }
        Self { columns }
    }

    pub fn columns(&self) -> &[KeyColumn] {
        &self.columns
    }

    pub fn positions(&self) -> Vec<usize> {
        self.columns.iter().map(|c| c.position).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Borrow the key columns of `batch` for one insert/lookup pass.
    pub fn views<'a>(&self, batch: &'a RowBatch) -> Result<Vec<&'a [Scalar]>, OpError> {
        let rows = batch.num_rows();
        self.columns
            .iter()
            .map(|k| {
                let col = batch.column(k.position).ok_or_else(|| {
                    OpError::Schema(format!(
                        "key column {} missing from a batch of {} columns",
                        k.position,
                        batch.num_columns()
                    ))
                })?;
                if col.len() != rows {
                    return Err(OpError::Schema(format!(
                        "key column '{}' has {} rows, batch has {}",
                        col.name,
                        col.len(),
                        rows
                    )));
                }
                Ok(col.as_slice())
            })
            .collect()
    }
}
