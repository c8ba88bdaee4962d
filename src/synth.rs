//! Technology mapping of equations onto catalog gates.
//!
//! Every subject node is matched through its cuts: a cut's function is looked up in the
//! catalog, so a single gate may absorb several operators. The product of per-node choices
//! forms the candidate space, enumerated in priority order.

mod cover;
mod subject;

use crate::{
    align::AlignedPair,
    catalog::{Domain, GateCatalog, GateMatch},
    circuit::CircuitGraph,
    config::SynthConfig,
    error::SynthError,
    expr::{regroupings, Expr},
    utils::serialize_display,
};
use cover::{Choices, CoverSearch};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashSet;
use subject::{SubjectKind, SubjectTree};

/// A search branch eliminated by a missing gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchFailure {
    /// The equation variant the branch mapped.
    pub branch: String,
    #[serde(serialize_with = "serialize_display")]
    pub error: SynthError,
}

/// Distinct graphs found by one synthesis run, in emission order.
#[derive(Debug, Clone, Default)]
pub struct SynthOutcome {
    pub graphs: Vec<CircuitGraph>,
    pub branches: usize,
    pub branch_failures: Vec<BranchFailure>,
    /// Some part of the space was cut off by the search budget.
    pub truncated: bool,
}

enum Branch {
    Mapped {
        graphs: Vec<CircuitGraph>,
        truncated: bool,
    },
    Failed(BranchFailure),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Regular,
    Polymorphic,
}

pub struct Synthesizer<'a> {
    catalog: &'a GateCatalog,
    config: &'a SynthConfig,
}

impl<'a> Synthesizer<'a> {
    pub fn new(catalog: &'a GateCatalog, config: &'a SynthConfig) -> Self {
        Self { catalog, config }
    }

    /// Largest number of distinct graphs a run emits.
    fn limit(&self) -> usize {
        self.config
            .search
            .max_candidates
            .max(self.config.num_circuits)
    }

    /// Map `expr` onto plain gates.
    ///
    /// Each associative regrouping of the equation is an independent branch; branches run
    /// in parallel and are merged in regrouping order. Only a malformed graph is an error.
    pub fn synthesize(&self, expr: &Expr) -> Result<SynthOutcome, SynthError> {
        let cap = self.config.search.max_variants.max(1);
        let mut variants = regroupings(expr, cap + 1);
        let truncated = variants.len() > cap;
        variants.truncate(cap);
        info!("mapping {} variants of `{}`", variants.len(), expr);

        let branches = variants
            .par_iter()
            .map(|v| self.map_branch(&SubjectTree::from_expr(v), Mode::Regular))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.merge(branches, truncated))
    }

    /// Map an aligned pair onto polymorphic gates, one gate per aligned position group.
    pub fn synthesize_polymorphic(&self, pair: &AlignedPair) -> Result<SynthOutcome, SynthError> {
        for name in self.config.polymorphic.tiers().into_iter().flatten() {
            if !self.catalog.get(name).map_or(false, |t| t.is_polymorphic()) {
                warn!("`{name}` is not a polymorphic gate of the catalog");
            }
        }
        info!("mapping `{}` / `{}`", pair.hvdd, pair.lvdd);
        let branch = self.map_branch(&SubjectTree::from_pair(pair), Mode::Polymorphic)?;
        Ok(self.merge(vec![branch], false))
    }

    fn map_branch(&self, tree: &SubjectTree, mode: Mode) -> Result<Branch, SynthError> {
        let label = tree.node(tree.root()).label.clone();
        let max_arity = match mode {
            Mode::Regular => self.catalog.max_arity(),
            Mode::Polymorphic => self.catalog.max_polymorphic_arity(),
        };
        let (cuts, cuts_truncated) = tree.cuts(max_arity, self.config.search.max_cuts);
        let choices = self.choices(tree, &cuts, mode);
        let no_gate: fn(String) -> SynthError = match mode {
            Mode::Regular => |node| SynthError::NoGateAvailable { node },
            Mode::Polymorphic => |node| SynthError::NoPolymorphicGateAvailable { node },
        };
        let mut search = CoverSearch::new(tree, choices, no_gate, self.limit());
        match search.graphs() {
            Ok(graphs) => {
                debug!("branch `{}`: {} graphs", label, graphs.len());
                Ok(Branch::Mapped {
                    graphs,
                    truncated: cuts_truncated || search.truncated,
                })
            }
            Err(error) if error.is_branch_local() => {
                debug!("branch `{}` failed: {}", label, error);
                Ok(Branch::Failed(BranchFailure {
                    branch: label,
                    error,
                }))
            }
            Err(error) => Err(error),
        }
    }

    /// Usable gates of every node, ordered by preference rank, then gate name, then cut.
    fn choices(&self, tree: &SubjectTree, cuts: &[Vec<subject::Cut>], mode: Mode) -> Choices {
        let prefs = &self.config.gates;
        (0..tree.len())
            .map(|i| {
                if let SubjectKind::Leaf(_) = tree.node(i).kind {
                    return Vec::new();
                }
                let mut found: Vec<(usize, GateMatch)> = Vec::new();
                for (k, cut) in cuts[i].iter().enumerate() {
                    let matches = match mode {
                        Mode::Regular => self
                            .catalog
                            .matching_plain(&tree.cut_function(i, cut, Domain::Hvdd)),
                        Mode::Polymorphic => self.catalog.matching_polymorphic(
                            &tree.cut_function(i, cut, Domain::Hvdd),
                            &tree.cut_function(i, cut, Domain::Lvdd),
                        ),
                    };
                    found.extend(
                        matches
                            .iter()
                            .filter(|m| !prefs.is_avoided(&m.template.name))
                            .map(|m| (k, m.clone())),
                    );
                }
                if mode == Mode::Polymorphic {
                    found = self.first_tier(found);
                }
                found.sort_by(|(ka, a), (kb, b)| {
                    let (na, nb) = (&a.template.name, &b.template.name);
                    prefs
                        .rank(na)
                        .cmp(&prefs.rank(nb))
                        .then_with(|| na.cmp(nb))
                        .then_with(|| ka.cmp(kb))
                });
                trace!("node `{}`: {} choices", tree.node(i).label, found.len());
                found
                    .into_iter()
                    .map(|(k, m)| (cuts[i][k].clone(), m))
                    .collect()
            })
            .collect()
    }

    /// Keep the matches of the first configured gate list that has any.
    fn first_tier(&self, found: Vec<(usize, GateMatch)>) -> Vec<(usize, GateMatch)> {
        let tiers = self.config.polymorphic.tiers();
        if tiers.is_empty() {
            return found;
        }
        for tier in tiers {
            let kept: Vec<_> = found
                .iter()
                .filter(|(_, m)| tier.contains(&m.template.name))
                .cloned()
                .collect();
            if !kept.is_empty() {
                return kept;
            }
        }
        Vec::new()
    }

    fn merge(&self, branches: Vec<Branch>, mut truncated: bool) -> SynthOutcome {
        let limit = self.limit();
        let mut seen = HashSet::new();
        let mut outcome = SynthOutcome {
            branches: branches.len(),
            ..Default::default()
        };
        for branch in branches {
            match branch {
                Branch::Failed(failure) => outcome.branch_failures.push(failure),
                Branch::Mapped {
                    graphs,
                    truncated: t,
                } => {
                    truncated |= t;
                    for graph in graphs {
                        if !seen.insert(graph.structural_key()) {
                            continue;
                        }
                        if outcome.graphs.len() == limit {
                            truncated = true;
                            break;
                        }
                        outcome.graphs.push(graph);
                    }
                }
            }
        }
        outcome.truncated = truncated;
        info!(
            "{} distinct graphs from {} branches ({} failed{})",
            outcome.graphs.len(),
            outcome.branches,
            outcome.branch_failures.len(),
            if truncated { ", truncated" } else { "" }
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        align::align,
        catalog::GateTemplate,
        config::PolymorphicConfig,
        expr::{parse, Op},
        tests::{assert_equivalent, BASIC_CATALOG},
        STANDARD_CATALOG,
    };
    use once_cell::sync::Lazy;
    use proptest::prelude::*;

    /// The standard library plus a polymorphic gate for every pair of 2-input operators
    /// and every pair of 3-input AND/OR.
    static PAIR_CATALOG: Lazy<GateCatalog> = Lazy::new(|| {
        let mut templates: Vec<GateTemplate> =
            STANDARD_CATALOG.templates().map(|t| (**t).clone()).collect();
        let ops = [(Op::And, "AND"), (Op::Or, "OR"), (Op::Xor, "XOR")];
        for arity in [2, 3] {
            for (h, hn) in ops {
                for (l, ln) in ops {
                    if arity == 3 && (h == Op::Xor || l == Op::Xor) {
                        continue;
                    }
                    templates.push(GateTemplate::polymorphic(
                        format!("P_{hn}{arity}_{ln}{arity}"),
                        h.table(arity),
                        l.table(arity),
                        false,
                    ));
                }
            }
        }
        GateCatalog::from_templates(templates).unwrap()
    });

    fn keys(outcome: &SynthOutcome) -> Vec<String> {
        outcome.graphs.iter().map(|g| g.structural_key()).collect()
    }

    #[test]
    fn test_single_gate() {
        let config = SynthConfig::default();
        let s = Synthesizer::new(&BASIC_CATALOG, &config);
        let outcome = s.synthesize(&parse("A & B").unwrap()).unwrap();
        assert_eq!(vec!["TH22(A,B)"], keys(&outcome));
        assert!(!outcome.truncated);
        assert!(outcome.branch_failures.is_empty());
    }

    #[test]
    fn test_or3_variants() {
        let config = SynthConfig::default();
        let s = Synthesizer::new(&BASIC_CATALOG, &config);
        let outcome = s.synthesize(&parse("A + B + C").unwrap()).unwrap();
        assert_eq!(3, outcome.branches);
        let keys = keys(&outcome);
        assert_eq!("TH13(A,B,C)", keys[0]);
        assert_eq!(3, keys.len());
        assert!(keys.contains(&"TH12(A,TH12(B,C))".to_string()));
        assert!(keys.contains(&"TH12(TH12(A,B),C)".to_string()));
    }

    #[test]
    fn test_multi_node_match() {
        let config = SynthConfig::default();
        let s = Synthesizer::new(&STANDARD_CATALOG, &config);
        let expr = parse("(A & B) + (A & C) + (B & C)").unwrap();
        let outcome = s.synthesize(&expr).unwrap();
        let keys = keys(&outcome);
        assert!(keys.contains(&"TH23(A,B,C)".to_string()), "{keys:?}");
        for g in &outcome.graphs {
            assert_equivalent(&expr, g, Domain::Hvdd);
        }
    }

    #[test]
    fn test_preferences() {
        let mut config = SynthConfig::default();
        config.gates.preferred = vec!["TH12".into()];
        let s = Synthesizer::new(&BASIC_CATALOG, &config);
        let outcome = s.synthesize(&parse("A + B + C").unwrap()).unwrap();
        // the parsed ternary node has no TH12 cut, its regroupings lead with TH12
        assert_eq!("TH13(A,B,C)", keys(&outcome)[0]);
        assert_eq!("TH12(A,TH12(B,C))", keys(&outcome)[1]);

        config.gates.avoid = vec!["TH13".into()];
        let s = Synthesizer::new(&BASIC_CATALOG, &config);
        let outcome = s.synthesize(&parse("A + B + C").unwrap()).unwrap();
        assert_eq!(2, outcome.graphs.len());
        assert_eq!(1, outcome.branch_failures.len());
        assert!(keys(&outcome).iter().all(|k| !k.contains("TH13")));
    }

    #[test]
    fn test_no_gate_available() {
        let mut config = SynthConfig::default();
        config.gates.avoid = vec!["THXOR".into()];
        let s = Synthesizer::new(&BASIC_CATALOG, &config);
        let outcome = s.synthesize(&parse("A ^ B").unwrap()).unwrap();
        assert!(outcome.graphs.is_empty());
        assert_eq!(
            SynthError::NoGateAvailable {
                node: "A ^ B".into()
            },
            outcome.branch_failures[0].error
        );
    }

    #[test]
    fn test_budget() {
        let mut config = SynthConfig::default();
        config.search.max_candidates = 1;
        config.search.max_variants = 1;
        let s = Synthesizer::new(&BASIC_CATALOG, &config);
        let outcome = s.synthesize(&parse("A + B + C").unwrap()).unwrap();
        assert_eq!(1, outcome.branches);
        assert_eq!(1, outcome.graphs.len());
        assert!(outcome.truncated);
    }

    #[test]
    fn test_polymorphic() {
        let mut config = SynthConfig::default();
        config.polymorphic.required_gates = vec!["TH12m_TH22m".into()];
        let s = Synthesizer::new(&STANDARD_CATALOG, &config);
        let pair = align(&parse("A + B").unwrap(), &parse("A & B").unwrap(), 100).unwrap();
        let outcome = s.synthesize_polymorphic(&pair).unwrap();
        assert_eq!(vec!["TH12m_TH22m(A,B)"], keys(&outcome));
        let g = &outcome.graphs[0];
        assert!(g.reset().is_some());
        assert_equivalent(&pair.hvdd, g, Domain::Hvdd);
        assert_equivalent(&pair.lvdd, g, Domain::Lvdd);
    }

    #[test]
    fn test_polymorphic_tiers() {
        let pair = align(
            &parse("A + B + C").unwrap(),
            &parse("A & B & C").unwrap(),
            100,
        )
        .unwrap();
        let mut config = SynthConfig {
            polymorphic: PolymorphicConfig {
                required_gates: vec!["TH12m_TH22m".into()],
                alternative_gates: vec!["TH13m_TH33m".into()],
                ..Default::default()
            },
            ..Default::default()
        };
        let s = Synthesizer::new(&STANDARD_CATALOG, &config);
        let outcome = s.synthesize_polymorphic(&pair).unwrap();
        assert_eq!(vec!["TH13m_TH33m(A,B,C)"], keys(&outcome));

        config.polymorphic.use_alternative_mapping = false;
        let s = Synthesizer::new(&STANDARD_CATALOG, &config);
        let outcome = s.synthesize_polymorphic(&pair).unwrap();
        assert!(outcome.graphs.is_empty());
        assert!(matches!(
            outcome.branch_failures[0].error,
            SynthError::NoPolymorphicGateAvailable { .. }
        ));
    }

    fn arb_expr() -> impl Strategy<Value = Expr> {
        let leaf = prop::sample::select(vec!["A", "B", "C", "D"]).prop_map(Expr::var);
        leaf.prop_recursive(3, 10, 3, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 2..=3).prop_map(Expr::and),
                prop::collection::vec(inner.clone(), 2..=3).prop_map(Expr::or),
                (inner.clone(), inner).prop_map(|(l, r)| Expr::xor(l, r)),
            ]
        })
    }

    /// Swap AND with OR everywhere.
    fn mirror(e: &Expr) -> Expr {
        match e {
            Expr::Var(_) => e.clone(),
            Expr::And(list) => Expr::or(list.iter().map(mirror).collect()),
            Expr::Or(list) => Expr::and(list.iter().map(mirror).collect()),
            Expr::Xor(l, r) => Expr::xor(mirror(l), mirror(r)),
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]
        #[test]
        fn test_polymorphic_equivalent(hvdd in arb_expr()) {
            let lvdd = mirror(&hvdd);
            let pair = align(&hvdd, &lvdd, 200_000).unwrap();
            let mut config = SynthConfig::default();
            config.search.max_candidates = 16;
            let s = Synthesizer::new(&PAIR_CATALOG, &config);
            let outcome = s.synthesize_polymorphic(&pair).unwrap();
            prop_assert!(!outcome.graphs.is_empty());
            for g in &outcome.graphs {
                assert_equivalent(&hvdd, g, Domain::Hvdd);
                assert_equivalent(&lvdd, g, Domain::Lvdd);
            }
        }

        #[test]
        fn test_graphs_equivalent(expr in arb_expr()) {
            let mut config = SynthConfig::default();
            config.search.max_candidates = 16;
            config.search.max_variants = 4;
            let s = Synthesizer::new(&BASIC_CATALOG, &config);
            let outcome = s.synthesize(&expr).unwrap();
            let keys: HashSet<String> = outcome.graphs.iter().map(|g| g.structural_key()).collect();
            prop_assert_eq!(keys.len(), outcome.graphs.len());
            for g in &outcome.graphs {
                assert_equivalent(&expr, g, Domain::Hvdd);
            }
        }
    }
}
