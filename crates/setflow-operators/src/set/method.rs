//! Key encoding strategies and the rule that picks one.

use std::fmt;

use serde::{Deserialize, Serialize};

use setflow_core::schema::DataType;

use crate::keys::KeySpec;

/// Closed set of key encodings. All of them give identical insert/lookup
/// semantics; they differ only in how a composite key is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SetMethod {
    /// No key columns: every row has the same (empty) key.
    Unit,
    /// One non-nullable fixed-width key of at most 8 bytes.
    Key64,
    /// One Utf8/Binary key.
    KeyString,
    /// Fixed-width keys packed (with a null bitmap) into 16 bytes.
    Keys128,
    /// Fixed-width keys packed (with a null bitmap) into 32 bytes.
    Keys256,
    /// 128-bit digest of a serialized row; used for everything else.
    Hashed,
}

impl SetMethod {
    pub fn name(self) -> &'static str {
        match self {
            SetMethod::Unit => "unit",
            SetMethod::Key64 => "key64",
            SetMethod::KeyString => "key_string",
            SetMethod::Keys128 => "keys128",
            SetMethod::Keys256 => "keys256",
            SetMethod::Hashed => "hashed",
        }
    }

    /// Rough bytes one stored key costs, hash-table overhead included.
    pub(crate) fn entry_bytes(self) -> usize {
        match self {
            SetMethod::Unit => 0,
            SetMethod::Key64 => 16,
            SetMethod::KeyString => 32,
            SetMethod::Keys128 | SetMethod::Hashed => 24,
            SetMethod::Keys256 => 40,
        }
    }
}

impl fmt::Display for SetMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pick the encoding for a key column set. Deterministic in the key types,
/// widths and nullability.
pub fn choose_method(keys: &KeySpec) -> SetMethod {
    let cols = keys.columns();
    if cols.is_empty() {
        return SetMethod::Unit;
    }

    if let [only] = cols {
        if only.data_type.is_variable_width() {
            return SetMethod::KeyString;
        }
        if !only.nullable && only.data_type.fixed_width().is_some_and(|w| w <= 8) {
            return SetMethod::Key64;
        }
    }

    match packed_width(keys) {
        Some(w) if w <= 16 => SetMethod::Keys128,
        Some(w) if w <= 32 => SetMethod::Keys256,
        _ => SetMethod::Hashed,
    }
}

/// Bytes needed to pack all keys plus their null bitmap, `None` when any key
/// is variable-width.
pub(crate) fn packed_width(keys: &KeySpec) -> Option<usize> {
    let mut total = null_bitmap_bytes(keys);
    for k in keys.columns() {
        total = total.saturating_add(k.data_type.fixed_width()?);
    }
    Some(total)
}

pub(crate) fn null_bitmap_bytes(keys: &KeySpec) -> usize {
    let nullable = keys.columns().iter().filter(|k| k.nullable).count();
    nullable.div_ceil(8)
}

/// Byte layout of a packed fixed-width key.
#[derive(Debug, Clone)]
pub(crate) struct FixedLayout {
    pub(crate) slots: Vec<Slot>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Slot {
    pub(crate) data_type: DataType,
    pub(crate) offset: usize,
    pub(crate) width: usize,
    /// Bit in the leading null bitmap; `None` for non-nullable keys.
    pub(crate) null_bit: Option<usize>,
}

impl FixedLayout {
    pub(crate) fn new(keys: &KeySpec) -> Option<Self> {
        let mut offset = null_bitmap_bytes(keys);
        let mut next_bit = 0;
        let mut slots = Vec::with_capacity(keys.len());
        for k in keys.columns() {
            let width = k.data_type.fixed_width()?;
            let null_bit = if k.nullable {
                next_bit += 1;
                Some(next_bit - 1)
            } else {
                None
            };
            slots.push(Slot {
                data_type: k.data_type,
                offset,
                width,
                null_bit,
            });
            offset += width;
        }
        Some(Self { slots })
    }
}
