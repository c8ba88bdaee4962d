//! Cost evaluation and deterministic ranking of candidates.

use crate::{
    circuit::CircuitGraph,
    config::{Optimization, SynthConfig, Target, Weights},
    error::SynthError,
    validate::{validate, Verdict},
};
use serde::Serialize;
use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashSet},
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct Metrics {
    pub gate_count: usize,
    pub max_fanout: usize,
    pub depth: usize,
    pub area_cost: f64,
    pub delay_cost: f64,
    pub power_cost: f64,
    pub weighted_cost: f64,
}

impl Metrics {
    /// Measure `graph`. Absent gate attributes count as 1, so the delay cost of a graph
    /// without delay data is its depth.
    pub fn measure(graph: &CircuitGraph, weights: &Weights) -> Result<Self, SynthError> {
        let mut ans = Self {
            gate_count: graph.gate_count(),
            max_fanout: graph.max_fanout().0,
            depth: graph.depth()?,
            area_cost: graph.nodes().iter().map(|n| n.template.costs.area()).sum(),
            delay_cost: graph.longest_path(|n| n.template.costs.delay())?,
            power_cost: graph.nodes().iter().map(|n| n.template.costs.power()).sum(),
            weighted_cost: 0.,
        };
        ans.reweight(weights);
        Ok(ans)
    }

    pub fn reweight(&mut self, w: &Weights) {
        self.weighted_cost =
            w.area * self.area_cost + w.delay * self.delay_cost + w.power * self.power_cost;
    }

    /// The metric `target` asks to report.
    pub fn primary(&self, target: Target) -> f64 {
        match target {
            Target::Area => self.area_cost,
            Target::Delay => self.delay_cost,
            Target::Power => self.power_cost,
            Target::Balanced => self.weighted_cost,
        }
    }
}

/// A candidate graph with its metrics and validity verdict.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateResult {
    /// Structural key, see [`CircuitGraph::structural_key`].
    pub key: String,
    pub metrics: Metrics,
    #[serde(flatten)]
    pub verdict: Verdict,
    pub gates: BTreeMap<String, usize>,
    pub graph: CircuitGraph,
}

impl CandidateResult {
    /// Measure and validate `graph` under `config`.
    pub fn evaluate(graph: CircuitGraph, config: &SynthConfig) -> Result<Self, SynthError> {
        let metrics = Metrics::measure(&graph, &config.optimization.weights)?;
        let verdict = validate(&graph, &config.constraints)?;
        Ok(Self {
            key: graph.structural_key(),
            metrics,
            verdict,
            gates: graph.gate_histogram(),
            graph,
        })
    }

    pub fn is_valid(&self) -> bool {
        self.verdict.is_accept()
    }

    pub fn primary_metric(&self, target: Target) -> f64 {
        self.metrics.primary(target)
    }
}

/// Total order of candidates: weighted cost, gate count, depth, then structural key.
pub fn compare(a: &CandidateResult, b: &CandidateResult) -> Ordering {
    a.metrics
        .weighted_cost
        .total_cmp(&b.metrics.weighted_cost)
        .then_with(|| a.metrics.gate_count.cmp(&b.metrics.gate_count))
        .then_with(|| a.metrics.depth.cmp(&b.metrics.depth))
        .then_with(|| a.key.cmp(&b.key))
}

/// Drop structural duplicates (the first one seen stays), apply the weights of
/// `optimization` and sort ascending.
pub fn rank(candidates: Vec<CandidateResult>, optimization: &Optimization) -> Vec<CandidateResult> {
    let mut seen = HashSet::new();
    let mut ans: Vec<CandidateResult> = candidates
        .into_iter()
        .filter(|c| seen.insert(c.key.clone()))
        .collect();
    for c in ans.iter_mut() {
        c.metrics.reweight(&optimization.weights);
    }
    ans.sort_by(compare);
    ans
}

/// The best `n` of a ranked sequence.
pub fn select(mut ranked: Vec<CandidateResult>, n: usize) -> Vec<CandidateResult> {
    ranked.truncate(n);
    ranked
}
