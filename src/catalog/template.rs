use crate::truth_table::TruthTable;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supply-voltage regime selecting a polymorphic gate's function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
#[serde(rename_all = "UPPERCASE")]
pub enum Domain {
    Hvdd,
    Lvdd,
}

impl Domain {
    pub const ALL: [Domain; 2] = [Domain::Hvdd, Domain::Lvdd];
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Hvdd => write!(f, "HVDD"),
            Domain::Lvdd => write!(f, "LVDD"),
        }
    }
}

/// Optional physical attributes of a gate; absent values count as 1.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GateCosts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<f64>,
}

impl GateCosts {
    pub fn with_area(area: f64) -> Self {
        Self {
            area: Some(area),
            ..Default::default()
        }
    }
}

/// Per-domain attributes. Plain gates carry the same values in both domains.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DomainCosts {
    pub hvdd: GateCosts,
    pub lvdd: GateCosts,
}

impl DomainCosts {
    pub fn uniform(costs: GateCosts) -> Self {
        Self {
            hvdd: costs,
            lvdd: costs,
        }
    }

    fn worst(&self, f: impl Fn(&GateCosts) -> Option<f64>) -> f64 {
        let h = f(&self.hvdd).unwrap_or(1.);
        let l = f(&self.lvdd).unwrap_or(1.);
        h.max(l)
    }

    /// Worst-case area over both domains.
    pub fn area(&self) -> f64 {
        self.worst(|c| c.area)
    }

    pub fn delay(&self) -> f64 {
        self.worst(|c| c.delay)
    }

    pub fn power(&self) -> f64 {
        self.worst(|c| c.power)
    }
}

/// Gate behavior as data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateFunction {
    Plain(TruthTable),
    Polymorphic {
        hvdd: TruthTable,
        lvdd: TruthTable,
        /// The gate has a reset/sleep input forcing the output to 0.
        has_reset: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct GateTemplate {
    pub name: String,
    pub function: GateFunction,
    pub costs: DomainCosts,
}

impl GateTemplate {
    pub fn plain(name: impl Into<String>, table: TruthTable) -> Self {
        Self {
            name: name.into(),
            function: GateFunction::Plain(table),
            costs: DomainCosts::default(),
        }
    }

    pub fn polymorphic(
        name: impl Into<String>,
        hvdd: TruthTable,
        lvdd: TruthTable,
        has_reset: bool,
    ) -> Self {
        Self {
            name: name.into(),
            function: GateFunction::Polymorphic {
                hvdd,
                lvdd,
                has_reset,
            },
            costs: DomainCosts::default(),
        }
    }

    pub fn with_costs(mut self, costs: DomainCosts) -> Self {
        self.costs = costs;
        self
    }

    /// Number of data inputs (the reset input is not counted).
    pub fn arity(&self) -> usize {
        match &self.function {
            GateFunction::Plain(t) => t.arity(),
            GateFunction::Polymorphic { hvdd, .. } => hvdd.arity(),
        }
    }

    pub fn is_polymorphic(&self) -> bool {
        matches!(self.function, GateFunction::Polymorphic { .. })
    }

    pub fn has_reset(&self) -> bool {
        matches!(
            self.function,
            GateFunction::Polymorphic {
                has_reset: true,
                ..
            }
        )
    }

    /// The function realized under `domain`. Plain gates ignore the domain.
    pub fn table(&self, domain: Domain) -> &TruthTable {
        match (&self.function, domain) {
            (GateFunction::Plain(t), _) => t,
            (GateFunction::Polymorphic { hvdd, .. }, Domain::Hvdd) => hvdd,
            (GateFunction::Polymorphic { lvdd, .. }, Domain::Lvdd) => lvdd,
        }
    }

    /// Steady-state output for `inputs` under `domain`, with the reset input asserted or not.
    pub fn eval(&self, inputs: &[bool], domain: Domain, reset: bool) -> bool {
        if reset && self.has_reset() {
            return false;
        }
        self.table(domain).eval(inputs)
    }
}
