#![forbid(unsafe_code)]
//! setflow-planner: set query text → expression tree → wired operator chain.
//!
//! Design:
//! - `parser` turns `A INTERSECT B EXCEPT C` into a left-associative
//!   `SetExpr`.
//! - `header` unifies operand headers (count and per-position types).
//! - `lower` assigns source/operator ids and produces a post-order `SetPlan`
//!   the executor instantiates node by node.
//! - `dsl::yaml` reads query documents naming CSV relations.
//!
//! NOTE: No IO here; relation sources are carried as paths only.

pub mod ast;
pub mod dsl;
pub mod error;
pub mod header;
pub mod lower;
pub mod parser;

pub use ast::SetExpr;
pub use dsl::yaml::{parse_yaml_query, ParsedQuery, QueryConfig, RelationSource};
pub use error::{PlanError, Result};
pub use header::common_header;
pub use lower::{plan_set_query, Catalog, PlanInput, SetOpNode, SetPlan, SourceNode};
pub use parser::parse_set_query;
