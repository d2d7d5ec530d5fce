//! Inspectable structural form of a specification tree.
//!
//! Compiled predicates cannot be translated to another execution target,
//! so every specification also exposes this tagged AST. External
//! translators (query builders, filter generators) walk it without ever
//! touching the compiled closures.

use serde::{Deserialize, Serialize};

/// Translation-facing payload carried by a leaf node.
///
/// The `field`/`operator`/`operand` triple is optional; a leaf built from
/// an arbitrary closure may only carry a human-readable label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeafDescription {
    /// Human-readable label for the predicate.
    pub label: String,
    /// The entity field the predicate inspects, if declared.
    pub field: Option<String>,
    /// The comparison operator (e.g., "gt", "eq"), if declared.
    pub operator: Option<String>,
    /// The comparison operand, if declared.
    pub operand: Option<serde_json::Value>,
}

impl LeafDescription {
    /// Creates a description with just a label.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    /// Sets the inspected field.
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Sets the comparison operator.
    #[must_use]
    pub fn with_operator(mut self, operator: impl Into<String>) -> Self {
        self.operator = Some(operator.into());
        self
    }

    /// Sets the comparison operand.
    #[must_use]
    pub fn with_operand(mut self, operand: serde_json::Value) -> Self {
        self.operand = Some(operand);
        self
    }
}

/// The structural form of a specification tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpecAst {
    /// An atomic predicate with its translation payload.
    Leaf {
        /// The leaf's translation-facing description.
        description: LeafDescription,
    },
    /// Logical conjunction of two subtrees.
    And {
        /// Left operand, evaluated first.
        left: Box<SpecAst>,
        /// Right operand, skipped when the left is false.
        right: Box<SpecAst>,
    },
    /// Logical disjunction of two subtrees.
    Or {
        /// Left operand, evaluated first.
        left: Box<SpecAst>,
        /// Right operand, skipped when the left is true.
        right: Box<SpecAst>,
    },
    /// Logical negation of a subtree.
    Not {
        /// The negated subtree.
        inner: Box<SpecAst>,
    },
}

impl SpecAst {
    /// Returns the node kind as a string.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Leaf { .. } => "leaf",
            Self::And { .. } => "and",
            Self::Or { .. } => "or",
            Self::Not { .. } => "not",
        }
    }

    /// Counts the leaves in the tree.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        match self {
            Self::Leaf { .. } => 1,
            Self::And { left, right } | Self::Or { left, right } => {
                left.leaf_count() + right.leaf_count()
            }
            Self::Not { inner } => inner.leaf_count(),
        }
    }

    /// Collects the leaf descriptions in left-to-right order.
    #[must_use]
    pub fn leaves(&self) -> Vec<&LeafDescription> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a LeafDescription>) {
        match self {
            Self::Leaf { description } => out.push(description),
            Self::And { left, right } | Self::Or { left, right } => {
                left.collect_leaves(out);
                right.collect_leaves(out);
            }
            Self::Not { inner } => inner.collect_leaves(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(label: &str) -> SpecAst {
        SpecAst::Leaf {
            description: LeafDescription::new(label),
        }
    }

    #[test]
    fn test_leaf_description_builder() {
        let desc = LeafDescription::new("amount > 100")
            .with_field("amount")
            .with_operator("gt")
            .with_operand(serde_json::json!(100));

        assert_eq!(desc.label, "amount > 100");
        assert_eq!(desc.field.as_deref(), Some("amount"));
        assert_eq!(desc.operator.as_deref(), Some("gt"));
        assert_eq!(desc.operand, Some(serde_json::json!(100)));
    }

    #[test]
    fn test_leaf_count_and_order() {
        let ast = SpecAst::And {
            left: Box::new(leaf("a")),
            right: Box::new(SpecAst::Not {
                inner: Box::new(SpecAst::Or {
                    left: Box::new(leaf("b")),
                    right: Box::new(leaf("c")),
                }),
            }),
        };

        assert_eq!(ast.leaf_count(), 3);
        let labels: Vec<_> = ast.leaves().iter().map(|d| d.label.as_str()).collect();
        assert_eq!(labels, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_ast_serialization_tags_kind() {
        let ast = SpecAst::Not {
            inner: Box::new(leaf("inner")),
        };

        let json = serde_json::to_value(&ast).unwrap();
        assert_eq!(json["kind"], "not");
        assert_eq!(json["inner"]["kind"], "leaf");
        assert_eq!(json["inner"]["description"]["label"], "inner");
    }
}
