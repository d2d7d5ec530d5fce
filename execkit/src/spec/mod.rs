//! Composable boolean specifications over a typed entity.
//!
//! A [`Spec`] carries two representations of the same predicate: a
//! compiled closure used by [`evaluate`](Spec::evaluate), and a
//! structural [`SpecAst`] obtained from [`to_ast`](Spec::to_ast) for
//! external translation. Trees are immutable and `Arc`-shared, so a
//! partially composed specification can be reused in any number of
//! larger compositions.

mod ast;

pub use ast::{LeafDescription, SpecAst};

use std::fmt;
use std::sync::Arc;

type Predicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

enum SpecNode<T> {
    Leaf {
        predicate: Predicate<T>,
        description: LeafDescription,
    },
    And { left: Spec<T>, right: Spec<T> },
    Or { left: Spec<T>, right: Spec<T> },
    Not { inner: Spec<T> },
}

/// A composable boolean predicate over entities of type `T`.
pub struct Spec<T> {
    node: Arc<SpecNode<T>>,
}

impl<T> Clone for Spec<T> {
    fn clone(&self) -> Self {
        Self {
            node: Arc::clone(&self.node),
        }
    }
}

impl<T> Spec<T> {
    /// Creates an atomic specification from a predicate and its
    /// translation-facing description.
    pub fn new<F>(predicate: F, description: LeafDescription) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self {
            node: Arc::new(SpecNode::Leaf {
                predicate: Arc::new(predicate),
                description,
            }),
        }
    }

    /// Creates an atomic specification with only a label.
    pub fn atom<F>(predicate: F, label: impl Into<String>) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self::new(predicate, LeafDescription::new(label))
    }

    /// Conjunction. Neither input is consumed; both remain reusable.
    #[must_use]
    pub fn and(&self, other: &Self) -> Self {
        Self {
            node: Arc::new(SpecNode::And {
                left: self.clone(),
                right: other.clone(),
            }),
        }
    }

    /// Disjunction. Neither input is consumed; both remain reusable.
    #[must_use]
    pub fn or(&self, other: &Self) -> Self {
        Self {
            node: Arc::new(SpecNode::Or {
                left: self.clone(),
                right: other.clone(),
            }),
        }
    }

    /// Negation. The input remains reusable.
    #[must_use]
    pub fn negate(&self) -> Self {
        Self {
            node: Arc::new(SpecNode::Not {
                inner: self.clone(),
            }),
        }
    }

    /// Evaluates the tree against an entity.
    ///
    /// Evaluation short-circuits left-to-right: `and` skips its right
    /// child when the left is false, `or` skips it when the left is
    /// true. A panicking leaf predicate is not caught here.
    #[must_use]
    pub fn evaluate(&self, entity: &T) -> bool {
        match &*self.node {
            SpecNode::Leaf { predicate, .. } => predicate(entity),
            SpecNode::And { left, right } => left.evaluate(entity) && right.evaluate(entity),
            SpecNode::Or { left, right } => left.evaluate(entity) || right.evaluate(entity),
            SpecNode::Not { inner } => !inner.evaluate(entity),
        }
    }

    /// Returns the structural form of the tree.
    ///
    /// The AST exposes node kinds, children, and leaf descriptions so an
    /// external translator can rebuild the predicate in another
    /// representation without the compiled closures.
    #[must_use]
    pub fn to_ast(&self) -> SpecAst {
        match &*self.node {
            SpecNode::Leaf { description, .. } => SpecAst::Leaf {
                description: description.clone(),
            },
            SpecNode::And { left, right } => SpecAst::And {
                left: Box::new(left.to_ast()),
                right: Box::new(right.to_ast()),
            },
            SpecNode::Or { left, right } => SpecAst::Or {
                left: Box::new(left.to_ast()),
                right: Box::new(right.to_ast()),
            },
            SpecNode::Not { inner } => SpecAst::Not {
                inner: Box::new(inner.to_ast()),
            },
        }
    }
}

impl<T> fmt::Debug for Spec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spec").field("ast", &self.to_ast()).finish()
    }
}
