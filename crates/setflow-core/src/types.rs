//! Lightweight value/column/batch types used on every port.
//!
//! Columns hold `Vec<Scalar>`; this keeps core free of Arrow while still
//! giving operators borrowed, read-only slices (`&[Scalar]`) to hash from.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schema::{DataType, Field, Schema};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Str(String),
    Bin(Vec<u8>),
    /// Milliseconds since the Unix epoch.
    Date64(i64),
    /// Unscaled decimal value; the scale lives in the column's metadata.
    Decimal128(i128),
}

impl Scalar {
    /// Logical type of the value, `None` for `Null`.
    pub fn data_type(&self) -> Option<DataType> {
        let t = match self {
            Scalar::Null => return None,
            Scalar::Bool(_) => DataType::Boolean,
            Scalar::I32(_) => DataType::Int32,
            Scalar::I64(_) => DataType::Int64,
            Scalar::F32(_) => DataType::Float32,
            Scalar::F64(_) => DataType::Float64,
            Scalar::Str(_) => DataType::Utf8,
            Scalar::Bin(_) => DataType::Binary,
            Scalar::Date64(_) => DataType::Date64,
            Scalar::Decimal128(_) => DataType::Decimal128,
        };
        Some(t)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }
}

/// One column of a batch. `constant` marks a structurally constant column:
/// the planner declared it carries a single value, so it is stored repeated
/// and excluded from set keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Scalar>,
    #[serde(default)]
    pub constant: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Scalar>) -> Self {
        Self {
            name: name.into(),
            values,
            constant: false,
        }
    }

    /// A constant column holding `value` for `len` rows.
    pub fn constant(name: impl Into<String>, value: Scalar, len: usize) -> Self {
        Self {
            name: name.into(),
            values: vec![value; len],
            constant: true,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Borrowed view used by key extraction; valid for one pass.
    pub fn as_slice(&self) -> &[Scalar] {
        &self.values
    }

    fn empty_like(&self) -> Column {
        Column {
            name: self.name.clone(),
            values: Vec::new(),
            constant: self.constant,
        }
    }
}

/// Columnar batch flowing through ports. All columns have the same length.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RowBatch {
    pub columns: Vec<Column>,
}

impl RowBatch {
    /// Build a batch, rejecting columns of unequal length.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let batch = Self { columns };
        batch.validate()?;
        Ok(batch)
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map(|c| c.len()).unwrap_or(0)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    pub fn column(&self, idx: usize) -> Option<&Column> {
        self.columns.get(idx)
    }

    pub fn validate(&self) -> Result<()> {
        let rows = self.num_rows();
        for col in &self.columns {
            if col.len() != rows {
                return Err(Error::Shape(format!(
                    "column '{}' has {} rows, expected {}",
                    col.name,
                    col.len(),
                    rows
                )));
            }
        }
        Ok(())
    }

    /// Header describing this batch. Types come from the first non-null
    /// value of each column; all-null columns are reported as nullable Utf8.
    pub fn infer_schema(&self) -> Schema {
        let fields = self
            .columns
            .iter()
            .map(|c| {
                let data_type = c
                    .values
                    .iter()
                    .find_map(Scalar::data_type)
                    .unwrap_or(DataType::Utf8);
                let nullable = c.values.iter().any(Scalar::is_null) || c.values.is_empty();
                Field::new(c.name.clone(), data_type, nullable).with_constant(c.constant)
            })
            .collect();
        Schema::new(fields)
    }

    /// Same column structure, zero rows.
    pub fn empty_like(&self) -> RowBatch {
        RowBatch {
            columns: self.columns.iter().map(Column::empty_like).collect(),
        }
    }

    /// Keep the rows whose mask entry is `true`, preserving their order.
    pub fn filter(&self, mask: &[bool]) -> Result<RowBatch> {
        self.check_mask(mask)?;
        let kept = selected_count(mask);
        let columns = self
            .columns
            .iter()
            .map(|col| {
                let mut values = Vec::with_capacity(kept);
                values.extend(
                    col.values
                        .iter()
                        .zip(mask)
                        .filter(|(_, keep)| **keep)
                        .map(|(v, _)| v.clone()),
                );
                Column {
                    name: col.name.clone(),
                    values,
                    constant: col.constant,
                }
            })
            .collect();
        Ok(RowBatch { columns })
    }

    /// Consuming variant of [`RowBatch::filter`]; moves surviving values
    /// instead of cloning them.
    pub fn into_filtered(self, mask: &[bool]) -> Result<RowBatch> {
        self.check_mask(mask)?;
        let kept = selected_count(mask);
        if kept == mask.len() {
            return Ok(self);
        }
        let columns = self
            .columns
            .into_iter()
            .map(|col| {
                let mut values = Vec::with_capacity(kept);
                values.extend(
                    col.values
                        .into_iter()
                        .zip(mask)
                        .filter(|(_, keep)| **keep)
                        .map(|(v, _)| v),
                );
                Column {
                    name: col.name,
                    values,
                    constant: col.constant,
                }
            })
            .collect();
        Ok(RowBatch { columns })
    }

    fn check_mask(&self, mask: &[bool]) -> Result<()> {
        if mask.len() != self.num_rows() {
            return Err(Error::Shape(format!(
                "filter mask has {} entries for a batch of {} rows",
                mask.len(),
                self.num_rows()
            )));
        }
        Ok(())
    }
}

/// Number of `true` entries in a filter mask.
pub fn selected_count(mask: &[bool]) -> usize {
    mask.iter().filter(|keep| **keep).count()
}
