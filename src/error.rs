use serde::Serialize;
use thiserror::Error;

/// Errors raised while turning equations into threshold-gate circuits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SynthError {
    #[error("syntax error at position {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("alignment failed: {0}")]
    Alignment(String),

    #[error("no gate available for `{node}`")]
    NoGateAvailable { node: String },

    #[error("no polymorphic gate available for `{node}`")]
    NoPolymorphicGateAvailable { node: String },

    #[error("constraint violation: {}", join_violations(.0))]
    ConstraintViolation(Vec<Violation>),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("no valid candidate: {rejected} rejected, {branch_failures} failed branches")]
    NoValidCandidate {
        rejected: usize,
        branch_failures: usize,
    },

    #[error("invalid gate catalog: {0}")]
    Catalog(String),
}

impl SynthError {
    pub(crate) fn syntax(position: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            position,
            message: message.into(),
        }
    }

    /// Whether the error only eliminates one search branch.
    pub fn is_branch_local(&self) -> bool {
        matches!(
            self,
            Self::NoGateAvailable { .. } | Self::NoPolymorphicGateAvailable { .. }
        )
    }
}

/// A single structural bound broken by a candidate graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    TooFewGates { count: usize, min: usize },
    TooManyGates { count: usize, max: usize },
    Fanout { net: String, fanout: usize, max: usize },
    Depth { depth: usize, max: usize },
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooFewGates { count, min } => write!(f, "gate count {count} < {min}"),
            Self::TooManyGates { count, max } => write!(f, "gate count {count} > {max}"),
            Self::Fanout { net, fanout, max } => write!(f, "net {net} fanout {fanout} > {max}"),
            Self::Depth { depth, max } => write!(f, "depth {depth} > {max}"),
        }
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
