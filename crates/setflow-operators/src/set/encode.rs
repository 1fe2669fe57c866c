//! Row-to-key encoders for each set method.
//!
//! Floats are canonicalised before encoding: `-0.0` becomes `0.0` and every
//! NaN becomes one NaN, so equal keys always produce equal bytes.

use setflow_core::schema::DataType;
use setflow_core::types::Scalar;

use super::method::FixedLayout;
use crate::keys::KeyColumn;
use crate::traits::OpError;

/// Largest packed key (see `SetMethod::Keys256`).
pub(crate) const MAX_PACKED: usize = 32;

fn canonical_f32(v: f32) -> u32 {
    if v.is_nan() {
        f32::NAN.to_bits()
    } else if v == 0.0 {
        0
    } else {
        v.to_bits()
    }
}

fn canonical_f64(v: f64) -> u64 {
    if v.is_nan() {
        f64::NAN.to_bits()
    } else if v == 0.0 {
        0
    } else {
        v.to_bits()
    }
}

fn mismatch(data_type: DataType, value: &Scalar) -> OpError {
    if value.is_null() {
        OpError::Schema(format!("NULL in non-nullable {data_type:?} key column"))
    } else {
        OpError::Schema(format!("{value:?} in {data_type:?} key column"))
    }
}

/// Encode a non-null fixed-width value of at most 8 bytes.
pub(crate) fn key_u64(value: &Scalar, data_type: DataType) -> Result<u64, OpError> {
    let v = match (data_type, value) {
        (DataType::Boolean, Scalar::Bool(b)) => u64::from(*b),
        (DataType::Int32, Scalar::I32(v)) => u64::from(*v as u32),
        (DataType::Int64, Scalar::I64(v)) => *v as u64,
        (DataType::Date64, Scalar::Date64(v)) => *v as u64,
        (DataType::Float32, Scalar::F32(v)) => u64::from(canonical_f32(*v)),
        (DataType::Float64, Scalar::F64(v)) => canonical_f64(*v),
        _ => return Err(mismatch(data_type, value)),
    };
    Ok(v)
}

/// Bytes of a string/binary key; `None` for NULL.
pub(crate) fn key_bytes(value: &Scalar, data_type: DataType) -> Result<Option<&[u8]>, OpError> {
    match (data_type, value) {
        (_, Scalar::Null) => Ok(None),
        (DataType::Utf8, Scalar::Str(s)) => Ok(Some(s.as_bytes())),
        (DataType::Binary, Scalar::Bin(b)) => Ok(Some(b.as_slice())),
        _ => Err(mismatch(data_type, value)),
    }
}

fn write_fixed(value: &Scalar, data_type: DataType, out: &mut [u8]) -> Result<(), OpError> {
    match (data_type, value) {
        (DataType::Boolean, Scalar::Bool(b)) => out[0] = u8::from(*b),
        (DataType::Int32, Scalar::I32(v)) => out.copy_from_slice(&v.to_le_bytes()),
        (DataType::Int64, Scalar::I64(v)) | (DataType::Date64, Scalar::Date64(v)) => {
            out.copy_from_slice(&v.to_le_bytes())
        }
        (DataType::Float32, Scalar::F32(v)) => {
            out.copy_from_slice(&canonical_f32(*v).to_le_bytes())
        }
        (DataType::Float64, Scalar::F64(v)) => {
            out.copy_from_slice(&canonical_f64(*v).to_le_bytes())
        }
        (DataType::Decimal128, Scalar::Decimal128(v)) => out.copy_from_slice(&v.to_le_bytes()),
        _ => return Err(mismatch(data_type, value)),
    }
    Ok(())
}

/// Pack row `row` of the key views into `buf` following `layout`.
pub(crate) fn pack_row(
    layout: &FixedLayout,
    views: &[&[Scalar]],
    row: usize,
    buf: &mut [u8; MAX_PACKED],
) -> Result<(), OpError> {
    buf.fill(0);
    for (slot, col) in layout.slots.iter().zip(views) {
        let value = &col[row];
        if value.is_null() {
            if let Some(bit) = slot.null_bit {
                buf[bit / 8] |= 1 << (bit % 8);
                continue;
            }
        }
        write_fixed(
            value,
            slot.data_type,
            &mut buf[slot.offset..slot.offset + slot.width],
        )?;
    }
    Ok(())
}

pub(crate) fn packed_u128(buf: &[u8; MAX_PACKED]) -> u128 {
    let mut lo = [0u8; 16];
    lo.copy_from_slice(&buf[..16]);
    u128::from_le_bytes(lo)
}

pub(crate) fn packed_u256(buf: &[u8; MAX_PACKED]) -> [u64; 4] {
    let mut out = [0u64; 4];
    for (word, chunk) in out.iter_mut().zip(buf.chunks_exact(8)) {
        let mut b = [0u8; 8];
        b.copy_from_slice(chunk);
        *word = u64::from_le_bytes(b);
    }
    out
}

/// Self-delimiting encoding of one value: a type tag, then the payload
/// (length-prefixed for variable-width values).
fn serialize_value(value: &Scalar, out: &mut Vec<u8>) {
    match value {
        Scalar::Null => out.push(0),
        Scalar::Bool(b) => {
            out.push(1);
            out.push(u8::from(*b));
        }
        Scalar::I32(v) => {
            out.push(2);
            out.extend_from_slice(&v.to_le_bytes());
        }
        Scalar::I64(v) => {
            out.push(3);
            out.extend_from_slice(&v.to_le_bytes());
        }
        Scalar::F32(v) => {
            out.push(4);
            out.extend_from_slice(&canonical_f32(*v).to_le_bytes());
        }
        Scalar::F64(v) => {
            out.push(5);
            out.extend_from_slice(&canonical_f64(*v).to_le_bytes());
        }
        Scalar::Str(s) => {
            out.push(6);
            out.extend_from_slice(&(s.len() as u64).to_le_bytes());
            out.extend_from_slice(s.as_bytes());
        }
        Scalar::Bin(b) => {
            out.push(7);
            out.extend_from_slice(&(b.len() as u64).to_le_bytes());
            out.extend_from_slice(b);
        }
        Scalar::Date64(v) => {
            out.push(8);
            out.extend_from_slice(&v.to_le_bytes());
        }
        Scalar::Decimal128(v) => {
            out.push(9);
            out.extend_from_slice(&v.to_le_bytes());
        }
    }
}

/// 128-bit blake3 digest of row `row` across all key views. `scratch` is
/// reused between rows to avoid reallocating. Each value must have its key
/// column's declared type; NULL is accepted only in nullable columns.
pub(crate) fn hashed_row(
    keys: &[KeyColumn],
    views: &[&[Scalar]],
    row: usize,
    scratch: &mut Vec<u8>,
) -> Result<u128, OpError> {
    scratch.clear();
    for (key, col) in keys.iter().zip(views) {
        let value = &col[row];
        match value.data_type() {
            None if key.nullable => {}
            Some(t) if t == key.data_type => {}
            _ => return Err(mismatch(key.data_type, value)),
        }
        serialize_value(value, scratch);
    }
    let digest = blake3::hash(scratch);
    let mut lo = [0u8; 16];
    lo.copy_from_slice(&digest.as_bytes()[..16]);
    Ok(u128::from_le_bytes(lo))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_zero_and_nan_are_canonical() {
        assert_eq!(
            key_u64(&Scalar::F64(-0.0), DataType::Float64).unwrap(),
            key_u64(&Scalar::F64(0.0), DataType::Float64).unwrap()
        );
        assert_eq!(
            key_u64(&Scalar::F32(f32::NAN), DataType::Float32).unwrap(),
            key_u64(&Scalar::F32(-f32::NAN), DataType::Float32).unwrap()
        );
    }

    #[test]
    fn i32_keys_are_zero_extended() {
        let a = key_u64(&Scalar::I32(-1), DataType::Int32).unwrap();
        assert_eq!(a, u64::from(u32::MAX));
    }

    #[test]
    fn type_mismatch_is_schema_error() {
        assert!(matches!(
            key_u64(&Scalar::Str("x".into()), DataType::Int64),
            Err(OpError::Schema(_))
        ));
        assert!(matches!(
            key_u64(&Scalar::Null, DataType::Int64),
            Err(OpError::Schema(_))
        ));
    }

    #[test]
    fn serialized_rows_are_self_delimiting() {
        let a_col: Vec<Scalar> = vec![Scalar::Str("ab".into())];
        let b_col: Vec<Scalar> = vec![Scalar::Str("c".into())];
        let c_col: Vec<Scalar> = vec![Scalar::Str("a".into())];
        let d_col: Vec<Scalar> = vec![Scalar::Str("bc".into())];
        let keys = [utf8_key(0), utf8_key(1)];
        let mut scratch = Vec::new();
        let left = hashed_row(&keys, &[a_col.as_slice(), b_col.as_slice()], 0, &mut scratch).unwrap();
        let right = hashed_row(&keys, &[c_col.as_slice(), d_col.as_slice()], 0, &mut scratch).unwrap();
        assert_ne!(left, right);
    }

    fn utf8_key(position: usize) -> KeyColumn {
        KeyColumn {
            position,
            data_type: DataType::Utf8,
            nullable: false,
        }
    }

    #[test]
    fn hashed_rows_check_declared_types() {
        let keys = [
            KeyColumn {
                position: 0,
                data_type: DataType::Int64,
                nullable: false,
            },
            utf8_key(1),
        ];
        let ids = vec![Scalar::I64(1), Scalar::I32(1), Scalar::Null];
        let names = vec![Scalar::Str("a".into()); 3];
        let views = [ids.as_slice(), names.as_slice()];
        let mut scratch = Vec::new();
        assert!(hashed_row(&keys, &views, 0, &mut scratch).is_ok());
        assert!(matches!(
            hashed_row(&keys, &views, 1, &mut scratch),
            Err(OpError::Schema(_))
        ));
        assert!(matches!(
            hashed_row(&keys, &views, 2, &mut scratch),
            Err(OpError::Schema(_))
        ));
    }

    #[test]
    fn null_and_zero_pack_differently() {
        use setflow_core::schema::{Field, Schema};
        let keys = crate::keys::KeySpec::from_header(&Schema::new(vec![Field::new(
            "a",
            DataType::Int64,
            true,
        )]));
        let layout = FixedLayout::new(&keys).unwrap();
        let col = vec![Scalar::Null, Scalar::I64(0)];
        let mut a = [0u8; MAX_PACKED];
        let mut b = [0u8; MAX_PACKED];
        pack_row(&layout, &[col.as_slice()], 0, &mut a).unwrap();
        pack_row(&layout, &[col.as_slice()], 1, &mut b).unwrap();
        assert_ne!(packed_u128(&a), packed_u128(&b));
    }
}
