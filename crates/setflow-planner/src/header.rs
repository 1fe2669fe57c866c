//! Header unification for set operands.
//!
//! Operands must agree on column count and per-position type. Names are
//! taken from the first operand. A column is nullable if any operand's is,
//! and constant only if every operand declares it constant.

use setflow_core::schema::{Field, Schema};

use crate::error::{PlanError, Result};

pub fn common_header(headers: &[Schema]) -> Result<Schema> {
    let Some((first, rest)) = headers.split_first() else {
        return Err(PlanError::HeaderMismatch("no operand headers".into()));
    };

    let mut fields: Vec<Field> = first.fields.clone();
    for (n, header) in rest.iter().enumerate() {
        if header.len() != fields.len() {
            return Err(PlanError::HeaderMismatch(format!(
                "operand {} has {} columns, operand 0 has {}",
                n + 1,
                header.len(),
                fields.len()
            )));
        }
        for (pos, (acc, other)) in fields.iter_mut().zip(&header.fields).enumerate() {
            if acc.data_type != other.data_type {
                return Err(PlanError::HeaderMismatch(format!(
                    "column {} ('{}'): {:?} in operand 0, {:?} in operand {}",
                    pos,
                    acc.name,
                    acc.data_type,
                    other.data_type,
                    n + 1
                )));
            }
            acc.nullable |= other.nullable;
            acc.constant &= other.constant;
        }
    }
    Ok(Schema::new(fields))
}

#[cfg(test)]
mod tests {
    use super::*;
    use setflow_core::schema::DataType;

    #[test]
    fn unifies_flags_and_keeps_first_names() {
        let a = Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("k", DataType::Utf8, false).with_constant(true),
        ]);
        let b = Schema::new(vec![
            Field::new("other_id", DataType::Int64, true),
            Field::new("kk", DataType::Utf8, false),
        ]);
        let h = common_header(&[a, b]).unwrap();
        assert_eq!(h.fields[0].name, "id");
        assert!(h.fields[0].nullable);
        assert!(!h.fields[1].constant);
    }

    #[test]
    fn constant_survives_when_all_agree() {
        let a = Schema::new(vec![Field::new("k", DataType::Int32, false).with_constant(true)]);
        let h = common_header(&[a.clone(), a]).unwrap();
        assert!(h.fields[0].constant);
    }

    #[test]
    fn rejects_count_and_type_mismatch() {
        let a = Schema::new(vec![Field::new("x", DataType::Int64, false)]);
        let b = Schema::new(vec![Field::new("x", DataType::Float64, false)]);
        let c = Schema::new(vec![]);
        assert!(matches!(common_header(&[a.clone(), b]), Err(PlanError::HeaderMismatch(_))));
        assert!(matches!(common_header(&[a, c]), Err(PlanError::HeaderMismatch(_))));
        assert!(matches!(common_header(&[]), Err(PlanError::HeaderMismatch(_))));
    }
}
