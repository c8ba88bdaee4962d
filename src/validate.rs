//! Structural constraint checks on candidate graphs.

use crate::{
    circuit::{CircuitGraph, Driver},
    config::Constraints,
    error::{SynthError, Violation},
};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", content = "violations", rename_all = "snake_case")]
pub enum Verdict {
    Accept,
    Reject(Vec<Violation>),
}

impl Verdict {
    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept)
    }

    pub fn violations(&self) -> &[Violation] {
        match self {
            Verdict::Accept => &[],
            Verdict::Reject(v) => v,
        }
    }

    pub fn into_result(self) -> Result<(), SynthError> {
        match self {
            Verdict::Accept => Ok(()),
            Verdict::Reject(v) => Err(SynthError::ConstraintViolation(v)),
        }
    }
}

/// Check `graph` against every bound and collect all violations.
///
/// A cyclic graph is an internal error, not a rejection.
pub fn validate(graph: &CircuitGraph, constraints: &Constraints) -> Result<Verdict, SynthError> {
    let depth = graph.depth()?;
    let mut violations = Vec::new();

    let count = graph.gate_count();
    if count < constraints.min_gates {
        violations.push(Violation::TooFewGates {
            count,
            min: constraints.min_gates,
        });
    }
    if let Some(max) = constraints.max_gates {
        if count > max {
            violations.push(Violation::TooManyGates { count, max });
        }
    }
    for net in graph.nets() {
        if net.driver == Driver::Reset {
            continue;
        }
        if net.fanout() > constraints.max_fanout {
            violations.push(Violation::Fanout {
                net: net.name.clone(),
                fanout: net.fanout(),
                max: constraints.max_fanout,
            });
        }
    }
    if depth > constraints.max_depth {
        violations.push(Violation::Depth {
            depth,
            max: constraints.max_depth,
        });
    }

    Ok(if violations.is_empty() {
        Verdict::Accept
    } else {
        Verdict::Reject(violations)
    })
}
