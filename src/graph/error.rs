//! Engine error kinds.
//!
//! Every error is local to the operation that raised it: the analytics
//! orchestrator records a failed metric and keeps computing the others.

use thiserror::Error;

use super::models::{GraphScope, RelationKind};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    /// A builder or the integrator received input of another relation kind.
    #[error("expected `{expected}` input, found `{found}`")]
    MismatchedRelationKind {
        expected: RelationKind,
        found: GraphScope,
    },

    /// The integrator got a relation graph with no configured coefficient.
    #[error("no coefficient configured for relation kind `{0}`")]
    UnknownRelationKind(RelationKind),

    #[error("coefficient for `{kind}` must be finite and non-negative, got {value}")]
    InvalidCoefficient { kind: RelationKind, value: f64 },

    #[error("event weight must be finite and non-negative, got {value}")]
    InvalidWeight { value: f64 },

    /// The graph lacks the structure a metric needs.
    #[error("{metric} requires {requirement}")]
    InsufficientData {
        metric: &'static str,
        requirement: &'static str,
    },

    /// An iterative algorithm hit its iteration cap.
    #[error("{algorithm} did not converge within {iterations} iterations")]
    NonConvergence {
        algorithm: &'static str,
        iterations: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = GraphError::MismatchedRelationKind {
            expected: RelationKind::Comment,
            found: GraphScope::Relation(RelationKind::Closure),
        };
        assert_eq!(err.to_string(), "expected `comment` input, found `closure`");

        let err = GraphError::UnknownRelationKind(RelationKind::ReviewMerge);
        assert_eq!(
            err.to_string(),
            "no coefficient configured for relation kind `review_merge`"
        );

        let err = GraphError::NonConvergence {
            algorithm: "pagerank",
            iterations: 3,
        };
        assert_eq!(err.to_string(), "pagerank did not converge within 3 iterations");
    }
}
