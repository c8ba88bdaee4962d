//! The built-in MTNCL gate library.
//!
//! Threshold gates are described by their threshold and input weights; their
//! steady-state truth tables are generated from that description.

use super::{
    catalog::GateCatalog,
    template::{DomainCosts, GateCosts, GateTemplate},
};
use crate::truth_table::TruthTable;
use once_cell::sync::Lazy;

/// `(name, threshold, weights)` of every weighted threshold gate.
const THRESHOLD_GATES: &[(&str, u32, &[u32])] = &[
    ("TH12", 1, &[1, 1]),
    ("TH22", 2, &[1, 1]),
    ("TH13", 1, &[1, 1, 1]),
    ("TH23", 2, &[1, 1, 1]),
    ("TH33", 3, &[1, 1, 1]),
    ("TH23w2", 2, &[2, 1, 1]),
    ("TH33w2", 3, &[2, 1, 1]),
    ("TH14", 1, &[1, 1, 1, 1]),
    ("TH24", 2, &[1, 1, 1, 1]),
    ("TH34", 3, &[1, 1, 1, 1]),
    ("TH44", 4, &[1, 1, 1, 1]),
    ("TH24w2", 2, &[2, 1, 1, 1]),
    ("TH34w2", 3, &[2, 1, 1, 1]),
    ("TH44w2", 4, &[2, 1, 1, 1]),
    ("TH34w3", 3, &[3, 1, 1, 1]),
    ("TH44w3", 4, &[3, 1, 1, 1]),
    ("TH24w22", 2, &[2, 2, 1, 1]),
    ("TH34w22", 3, &[2, 2, 1, 1]),
    ("TH44w22", 4, &[2, 2, 1, 1]),
    ("TH54w22", 5, &[2, 2, 1, 1]),
    ("TH34w32", 3, &[3, 2, 1, 1]),
    ("TH54w32", 5, &[3, 2, 1, 1]),
    ("TH44w322", 4, &[3, 2, 2, 1]),
    ("TH54w322", 5, &[3, 2, 2, 1]),
];

/// `(name, hvdd gate, lvdd gate, transistor count)` of every polymorphic gate.
const POLYMORPHIC_GATES: &[(&str, &str, &str, Option<u32>)] = &[
    ("TH12m_TH22m", "TH12", "TH22", Some(14)),
    ("TH13m_TH23m", "TH13", "TH23", Some(16)),
    ("TH13m_TH33m", "TH13", "TH33", Some(16)),
    ("TH23m_TH33m", "TH23", "TH33", Some(16)),
    ("TH33w2m_TH33m", "TH33w2", "TH33", Some(16)),
    ("TH34m_TH44m", "TH34", "TH44", Some(18)),
    ("TH24w22m_TH24w2m", "TH24w22", "TH24w2", Some(18)),
    ("THxor0m_TH34w3m", "THxor0", "TH34w3", None),
    ("TH54w322m_TH44w22m", "TH54w322", "TH44w22", None),
];

/// Steady-state function of a named plain gate in the library.
fn plain_table(name: &str) -> Option<TruthTable> {
    if let Some((_, threshold, weights)) = THRESHOLD_GATES.iter().find(|(n, ..)| *n == name) {
        return Some(TruthTable::threshold(*threshold, weights));
    }
    let table = match name {
        "THxor0" => TruthTable::from_fn(4, |x| (x[0] && x[1]) || (x[2] && x[3])),
        "THand0" => TruthTable::from_fn(4, |x| (x[0] && x[1]) || (x[1] && x[2]) || (x[0] && x[3])),
        "TH24comp" => TruthTable::from_fn(4, |x| (x[0] || x[1]) && (x[2] || x[3])),
        "THXOR" => TruthTable::xor(2),
        _ => return None,
    };
    Some(table)
}

fn plain_templates() -> impl Iterator<Item = GateTemplate> {
    THRESHOLD_GATES
        .iter()
        .map(|(name, ..)| *name)
        .chain(["THxor0", "THand0", "TH24comp", "THXOR"])
        .filter_map(|name| Some(GateTemplate::plain(name, plain_table(name)?)))
}

fn polymorphic_templates() -> impl Iterator<Item = GateTemplate> {
    POLYMORPHIC_GATES
        .iter()
        .filter_map(|(name, hvdd, lvdd, transistors)| {
            let template =
                GateTemplate::polymorphic(*name, plain_table(hvdd)?, plain_table(lvdd)?, true);
            Some(match transistors {
                Some(n) => template.with_costs(DomainCosts::uniform(GateCosts::with_area(
                    f64::from(*n),
                ))),
                None => template,
            })
        })
}

/// Build a fresh catalog holding the whole built-in library.
pub fn standard_catalog() -> GateCatalog {
    let mut catalog = GateCatalog::new();
    for template in plain_templates().chain(polymorphic_templates()) {
        if let Err(e) = catalog.insert(template) {
            warn!("skip library gate: {e}");
        }
    }
    catalog
}

/// Shared instance of [`standard_catalog`].
pub static STANDARD_CATALOG: Lazy<GateCatalog> = Lazy::new(standard_catalog);
