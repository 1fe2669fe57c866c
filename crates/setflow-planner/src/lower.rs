//! Lowering a `SetExpr` to a wired chain of set operators.
//!
//! Every relation occurrence becomes its own source, every binary node one
//! operator. Operators are listed in post-order so each one's inputs are
//! defined before it.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use setflow_core::id::{NodeId, OpId};
use setflow_core::schema::Schema;
use setflow_operators::SetMode;

use crate::ast::SetExpr;
use crate::error::{PlanError, Result};
use crate::header::common_header;

/// Relation name → header.
pub type Catalog = BTreeMap<String, Schema>;

/// Where an operator input (or the plan output) comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanInput {
    Source(NodeId),
    Op(OpId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceNode {
    pub id: NodeId,
    pub relation: String,
    pub header: Schema,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetOpNode {
    pub op_id: OpId,
    pub mode: SetMode,
    pub left: PlanInput,
    pub right: PlanInput,
    /// Unified header of both operands.
    pub header: Schema,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetPlan {
    pub sources: Vec<SourceNode>,
    /// Post-order: inputs precede their consumers.
    pub ops: Vec<SetOpNode>,
    pub root: PlanInput,
    pub header: Schema,
}

impl SetPlan {
    pub fn source(&self, id: NodeId) -> Option<&SourceNode> {
        self.sources.iter().find(|s| s.id == id)
    }

    /// Human-readable operator tree, root first.
    pub fn explain(&self) -> String {
        let mut out = String::new();
        self.explain_input(self.root, 0, &mut out);
        out
    }

    fn explain_input(&self, input: PlanInput, depth: usize, out: &mut String) {
        let indent = "  ".repeat(depth);
        match input {
            PlanInput::Source(id) => {
                let name = self.source(id).map(|s| s.relation.as_str()).unwrap_or("?");
                let _ = writeln!(out, "{indent}Source {name} [{id}]");
            }
            PlanInput::Op(op_id) => {
                let Some(op) = self.ops.iter().find(|o| o.op_id == op_id) else {
                    let _ = writeln!(out, "{indent}? [{op_id}]");
                    return;
                };
                let keys = op.header.fields.iter().filter(|f| !f.constant).count();
                let _ = writeln!(
                    out,
                    "{indent}{} [{op_id}] columns={} key_columns={}",
                    op.mode,
                    op.header.len(),
                    keys
                );
                self.explain_input(op.left, depth + 1, out);
                self.explain_input(op.right, depth + 1, out);
            }
        }
    }
}

struct Lowering<'a> {
    catalog: &'a Catalog,
    sources: Vec<SourceNode>,
    ops: Vec<SetOpNode>,
}

impl Lowering<'_> {
    fn lower(&mut self, expr: &SetExpr) -> Result<(PlanInput, Schema)> {
        match expr {
            SetExpr::Relation(name) => {
                let header = self
                    .catalog
                    .get(name)
                    .ok_or_else(|| PlanError::UnknownRelation(name.clone()))?
                    .clone();
                let id = NodeId::new(self.sources.len() as u64);
                self.sources.push(SourceNode {
                    id,
                    relation: name.clone(),
                    header: header.clone(),
                });
                Ok((PlanInput::Source(id), header))
            }
            SetExpr::Binary { op, left, right } => {
                let (left_in, left_header) = self.lower(left)?;
                let (right_in, right_header) = self.lower(right)?;
                let header = common_header(&[left_header, right_header])?;
                let op_id = OpId::new(self.ops.len() as u64);
                self.ops.push(SetOpNode {
                    op_id,
                    mode: *op,
                    left: left_in,
                    right: right_in,
                    header: header.clone(),
                });
                Ok((PlanInput::Op(op_id), header))
            }
        }
    }
}

/// Resolve relations and unify headers for every binary node.
pub fn plan_set_query(expr: &SetExpr, catalog: &Catalog) -> Result<SetPlan> {
    let mut lowering = Lowering {
        catalog,
        sources: Vec::new(),
        ops: Vec::new(),
    };
    let (root, header) = lowering.lower(expr)?;

    // Every input decodes with the query-wide nullability, so an empty field
    // reads the same way whichever relation it came from.
    let nodes = lowering.sources.iter_mut().map(|s| &mut s.header);
    for node_header in nodes.chain(lowering.ops.iter_mut().map(|o| &mut o.header)) {
        for (field, unified) in node_header.fields.iter_mut().zip(&header.fields) {
            field.nullable = unified.nullable;
        }
    }
    Ok(SetPlan {
        sources: lowering.sources,
        ops: lowering.ops,
        root,
        header,
    })
}
