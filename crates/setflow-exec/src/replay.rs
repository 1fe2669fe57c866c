//! Plan fingerprints for reproducible runs.
//!
//! The fingerprint is a blake3 digest of the serialized `SetPlan`, so two
//! runs of the same query over the same catalog report the same hash.

use setflow_planner::SetPlan;

use crate::ExecError;

/// Hex blake3 digest of the plan.
pub fn plan_fingerprint(plan: &SetPlan) -> Result<String, ExecError> {
    let bytes = serde_json::to_vec(plan).map_err(|e| ExecError::Hash(e.to_string()))?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use setflow_core::schema::{DataType, Field, Schema};
    use setflow_planner::{parse_set_query, plan_set_query, Catalog};

    fn plan(q: &str) -> SetPlan {
        let mut c = Catalog::new();
        let h = Schema::new(vec![Field::new("x", DataType::Int32, false)]);
        c.insert("a".into(), h.clone());
        c.insert("b".into(), h);
        plan_set_query(&parse_set_query(q).unwrap(), &c).unwrap()
    }

    #[test]
    fn fingerprint_is_stable_and_mode_sensitive() {
        let a = plan_fingerprint(&plan("a EXCEPT b")).unwrap();
        assert_eq!(a, plan_fingerprint(&plan("a except b")).unwrap());
        assert_ne!(a, plan_fingerprint(&plan("a INTERSECT b")).unwrap());
        assert_eq!(a.len(), 64);
    }
}
