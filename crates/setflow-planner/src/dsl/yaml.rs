//! YAML query documents.
//!
//! Example:
//! ```yaml
//! config: { mem_cap_bytes: 1048576, batch_rows: 4096 }
//! relations:
//!   - name: a
//!     source: "data/a.csv"
//!     schema:
//!       - {name: "id",  type: "Int64"}
//!       - {name: "tag", type: "Utf8", nullable: true}
//!   - name: b
//!     source: "data/b.csv"
//!     schema: [ {name: "id", type: "Int64"}, {name: "tag", type: "Utf8"} ]
//! query: "a EXCEPT b"
//! ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use setflow_core::config::EngineConfig;
use setflow_core::schema::{DataType, Field, Schema};

use crate::ast::SetExpr;
use crate::error::{PlanError, Result};
use crate::lower::{plan_set_query, Catalog, SetPlan};
use crate::parser::parse_set_query;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryDoc {
    #[serde(default)]
    pub config: Option<QueryConfig>,
    pub relations: Vec<RelationDef>,
    pub query: String,
}

/// Per-document overrides of the engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueryConfig {
    pub mem_cap_bytes: Option<usize>,
    pub batch_rows: Option<usize>,
    pub max_idle_passes: Option<usize>,
}

impl QueryConfig {
    /// Overwrite the fields this document sets.
    pub fn apply_to(&self, cfg: &mut EngineConfig) {
        if let Some(v) = self.mem_cap_bytes {
            cfg.mem_cap_bytes = v;
        }
        if let Some(v) = self.batch_rows {
            cfg.batch_rows = v;
        }
        if let Some(v) = self.max_idle_passes {
            cfg.max_idle_passes = v;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationDef {
    pub name: String,
    /// Path of the CSV file backing the relation.
    pub source: String,
    pub schema: Vec<FieldDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub constant: bool,
}

fn to_schema(relation: &str, fields: &[FieldDef]) -> Result<Schema> {
    let fields = fields
        .iter()
        .map(|f| {
            let data_type = DataType::parse(&f.data_type).ok_or_else(|| {
                PlanError::Document(format!(
                    "relation '{relation}': column '{}' has unknown type '{}'",
                    f.name, f.data_type
                ))
            })?;
            Ok(Field::new(f.name.clone(), data_type, f.nullable).with_constant(f.constant))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Schema::new(fields))
}

/// A relation resolved from the document.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationSource {
    pub name: String,
    pub source: String,
    pub header: Schema,
}

#[derive(Debug, Clone)]
pub struct ParsedQuery {
    pub expr: SetExpr,
    pub plan: SetPlan,
    pub relations: Vec<RelationSource>,
    pub config: QueryConfig,
}

impl ParsedQuery {
    pub fn relation(&self, name: &str) -> Option<&RelationSource> {
        self.relations.iter().find(|r| r.name == name)
    }
}

/// Parse a YAML document and plan its query.
pub fn parse_yaml_query(yaml_src: &str) -> Result<ParsedQuery> {
    let doc: QueryDoc = serde_yaml::from_str(yaml_src)?;

    let mut seen = BTreeSet::new();
    let mut catalog = Catalog::new();
    let mut relations = Vec::with_capacity(doc.relations.len());
    for rel in &doc.relations {
        if !seen.insert(rel.name.as_str()) {
            return Err(PlanError::Document(format!(
                "relation '{}' is defined twice",
                rel.name
            )));
        }
        let header = to_schema(&rel.name, &rel.schema)?;
        catalog.insert(rel.name.clone(), header.clone());
        relations.push(RelationSource {
            name: rel.name.clone(),
            source: rel.source.clone(),
            header,
        });
    }

    let expr = parse_set_query(&doc.query)?;
    let plan = plan_set_query(&expr, &catalog)?;
    for rel in &mut relations {
        if let Some(node) = plan.sources.iter().find(|s| s.relation == rel.name) {
            for (field, planned) in rel.header.fields.iter_mut().zip(&node.header.fields) {
                field.nullable = planned.nullable;
            }
        }
    }
    Ok(ParsedQuery {
        expr,
        plan,
        relations,
        config: doc.config.unwrap_or_default(),
    })
}
