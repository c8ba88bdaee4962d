//! Explicit, immutable run configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constraints {
    pub min_gates: usize,
    pub max_gates: Option<usize>,
    pub max_fanout: usize,
    pub max_depth: usize,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            min_gates: 1,
            max_gates: None,
            max_fanout: 4,
            max_depth: 10,
        }
    }
}

/// Metric surfaced as a candidate's primary metric.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
#[serde(rename_all = "snake_case")]
pub enum Target {
    #[default]
    Area,
    Delay,
    Power,
    Balanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weights {
    pub area: f64,
    pub delay: f64,
    pub power: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            area: 1.,
            delay: 0.5,
            power: 0.5,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Optimization {
    pub target: Target,
    pub weights: Weights,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatePreferences {
    /// Tried first at every node, in this order.
    pub preferred: Vec<String>,
    /// Never instantiated.
    pub avoid: Vec<String>,
}

impl GatePreferences {
    /// Sort rank of a gate: its position in `preferred`, or after all of them.
    pub fn rank(&self, name: &str) -> usize {
        self.preferred
            .iter()
            .position(|p| p == name)
            .unwrap_or(self.preferred.len())
    }

    pub fn is_avoided(&self, name: &str) -> bool {
        self.avoid.iter().any(|a| a == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolymorphicConfig {
    pub use_direct_mapping: bool,
    pub use_alternative_mapping: bool,
    pub required_gates: Vec<String>,
    pub alternative_gates: Vec<String>,
}

impl Default for PolymorphicConfig {
    fn default() -> Self {
        Self {
            use_direct_mapping: true,
            use_alternative_mapping: true,
            required_gates: Vec::new(),
            alternative_gates: Vec::new(),
        }
    }
}

impl PolymorphicConfig {
    /// Gate name lists to draw from, in priority order. An empty result means the whole
    /// polymorphic catalog.
    pub fn tiers(&self) -> Vec<&[String]> {
        let mut tiers = Vec::new();
        if self.use_direct_mapping && !self.required_gates.is_empty() {
            tiers.push(self.required_gates.as_slice());
        }
        if self.use_alternative_mapping && !self.alternative_gates.is_empty() {
            tiers.push(self.alternative_gates.as_slice());
        }
        tiers
    }
}

/// Bounds that keep a run finite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchBudget {
    /// Distinct graphs produced before the search stops.
    pub max_candidates: usize,
    /// Associative regroupings explored per equation.
    pub max_variants: usize,
    /// Cuts enumerated per subject node.
    pub max_cuts: usize,
    /// Node comparisons the aligner may spend.
    pub max_alignment_steps: usize,
    /// Widest input set whose graphs are simulated row by row against the equation.
    /// Wider graphs rely on per-node matching alone.
    pub max_verify_inputs: usize,
    /// Worker threads of a run; `None` runs on the global pool.
    pub num_threads: Option<usize>,
}

impl Default for SearchBudget {
    fn default() -> Self {
        Self {
            max_candidates: 512,
            max_variants: 64,
            max_cuts: 32,
            max_alignment_steps: 200_000,
            max_verify_inputs: 16,
            num_threads: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    pub num_circuits: usize,
    pub constraints: Constraints,
    pub optimization: Optimization,
    pub gates: GatePreferences,
    pub polymorphic: PolymorphicConfig,
    pub search: SearchBudget,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            num_circuits: 1,
            constraints: Constraints::default(),
            optimization: Optimization::default(),
            gates: GatePreferences::default(),
            polymorphic: PolymorphicConfig::default(),
            search: SearchBudget::default(),
        }
    }
}

/// The equation(s) to synthesize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EquationInput {
    Single {
        equation: String,
    },
    Polymorphic {
        hvdd_equation: String,
        lvdd_equation: String,
    },
}

impl EquationInput {
    pub fn single(equation: impl Into<String>) -> Self {
        Self::Single {
            equation: equation.into(),
        }
    }

    pub fn polymorphic(hvdd: impl Into<String>, lvdd: impl Into<String>) -> Self {
        Self::Polymorphic {
            hvdd_equation: hvdd.into(),
            lvdd_equation: lvdd.into(),
        }
    }

    pub fn is_polymorphic(&self) -> bool {
        matches!(self, Self::Polymorphic { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthRequest {
    #[serde(flatten)]
    pub input: EquationInput,
    #[serde(default)]
    pub config: SynthConfig,
}

impl SynthRequest {
    pub fn new(input: EquationInput, config: SynthConfig) -> Self {
        Self { input, config }
    }

    /// Read a request from already-loaded JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let request: Self =
            serde_json::from_str(text).context("failed to parse synthesis request")?;
        if request.config.num_circuits == 0 {
            anyhow::bail!("num_circuits must be at least 1");
        }
        Ok(request)
    }
}
