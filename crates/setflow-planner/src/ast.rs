//! Set-expression tree produced by the parser.

use std::fmt;

use serde::{Deserialize, Serialize};

use setflow_operators::SetMode;

/// `A INTERSECT B EXCEPT C` parses to `Binary(Binary(A, B), C)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetExpr {
    Relation(String),
    Binary {
        op: SetMode,
        left: Box<SetExpr>,
        right: Box<SetExpr>,
    },
}

impl SetExpr {
    pub fn relation(name: impl Into<String>) -> Self {
        SetExpr::Relation(name.into())
    }

    pub fn binary(op: SetMode, left: SetExpr, right: SetExpr) -> Self {
        SetExpr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Relation names in left-to-right order, repeats included.
    pub fn relations(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_relations(&mut out);
        out
    }

    fn collect_relations<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            SetExpr::Relation(name) => out.push(name),
            SetExpr::Binary { left, right, .. } => {
                left.collect_relations(out);
                right.collect_relations(out);
            }
        }
    }

    /// Number of binary nodes (one operator each).
    pub fn operator_count(&self) -> usize {
        match self {
            SetExpr::Relation(_) => 0,
            SetExpr::Binary { left, right, .. } => 1 + left.operator_count() + right.operator_count(),
        }
    }
}

impl fmt::Display for SetExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetExpr::Relation(name) => f.write_str(name),
            SetExpr::Binary { op, left, right } => {
                write!(f, "{left} {op} ")?;
                match right.as_ref() {
                    SetExpr::Binary { .. } => write!(f, "({right})"),
                    SetExpr::Relation(_) => write!(f, "{right}"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_parenthesises_right_nesting_only() {
        let left_deep = SetExpr::binary(
            SetMode::Except,
            SetExpr::binary(SetMode::Intersect, SetExpr::relation("a"), SetExpr::relation("b")),
            SetExpr::relation("c"),
        );
        assert_eq!(left_deep.to_string(), "a INTERSECT b EXCEPT c");

        let right_deep = SetExpr::binary(
            SetMode::Except,
            SetExpr::relation("a"),
            SetExpr::binary(SetMode::Except, SetExpr::relation("b"), SetExpr::relation("a")),
        );
        assert_eq!(right_deep.to_string(), "a EXCEPT (b EXCEPT a)");
        assert_eq!(right_deep.relations(), vec!["a", "b", "a"]);
        assert_eq!(right_deep.operator_count(), 2);
    }
}
