//! Logical header types. Pure data; no Arrow dependency here.
//!
//! A `Schema` doubles as the *header* of a batch stream: the ordered list of
//! columns every batch on a port carries. Both operands of a set operation
//! share one header after the planner has unified them.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    Int32,
    Int64,
    Float32,
    Float64,
    Utf8,
    Binary,
    Date64,
    Decimal128,
}

impl DataType {
    /// Width in bytes of one value when the type is stored fixed-width,
    /// `None` for variable-length types.
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            DataType::Boolean => Some(1),
            DataType::Int32 | DataType::Float32 => Some(4),
            DataType::Int64 | DataType::Float64 | DataType::Date64 => Some(8),
            DataType::Decimal128 => Some(16),
            DataType::Utf8 | DataType::Binary => None,
        }
    }

    pub fn is_fixed_width(self) -> bool {
        self.fixed_width().is_some()
    }

    pub fn is_variable_width(self) -> bool {
        matches!(self, DataType::Utf8 | DataType::Binary)
    }

    /// Parse the names accepted in YAML documents and CLI flags.
    pub fn parse(s: &str) -> Option<Self> {
        let t = match s {
            "Boolean" | "bool" => DataType::Boolean,
            "Int32" | "i32" => DataType::Int32,
            "Int64" | "i64" => DataType::Int64,
            "Float32" | "f32" => DataType::Float32,
            "Float64" | "f64" => DataType::Float64,
            "Utf8" | "string" | "str" => DataType::Utf8,
            "Binary" | "bytes" => DataType::Binary,
            "Date64" | "date" => DataType::Date64,
            "Decimal128" | "decimal" => DataType::Decimal128,
            _ => return None,
        };
        Some(t)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    /// Column is structurally constant: every batch carries one value
    /// repeated for all rows. Constant columns never take part in keys.
    #[serde(default)]
    pub constant: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
            constant: false,
        }
    }

    pub fn with_constant(mut self, constant: bool) -> Self {
        self.constant = constant;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn field(&self, idx: usize) -> Option<&Field> {
        self.fields.get(idx)
    }

    /// Position of the first field called `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Column names in order. Empty when every field is unnamed, which makes
    /// callers fall back to positional addressing.
    pub fn names(&self) -> Vec<&str> {
        if self.fields.iter().all(|f| f.name.is_empty()) {
            return Vec::new();
        }
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }
}
