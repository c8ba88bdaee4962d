//! One synthesis run, end to end.

use crate::{
    align::{align, AlignedPair},
    catalog::{Domain, GateCatalog},
    circuit::CircuitGraph,
    config::{EquationInput, SynthConfig, SynthRequest, Target},
    error::{SynthError, Violation},
    expr::{parse, Expr},
    rank::{rank, select, CandidateResult},
    synth::{BranchFailure, SynthOutcome, Synthesizer},
};
use anyhow::Context;
use rayon::prelude::*;
use serde::Serialize;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Regular,
    Polymorphic,
}

/// A candidate dropped by the validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub key: String,
    pub violations: Vec<Violation>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SynthReport {
    pub mode: Mode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aligned: Option<AlignedPair>,
    pub target: Target,
    /// Selected candidates, best first.
    pub candidates: Vec<CandidateResult>,
    pub requested: usize,
    pub found: usize,
    /// Fewer than `requested` valid candidates exist.
    pub exhausted: bool,
    /// The search budget cut part of the space.
    pub truncated: bool,
    pub rejections: Vec<Rejection>,
    pub branch_failures: Vec<BranchFailure>,
    #[serde(with = "crate::utils::serde_time")]
    pub elapsed: Duration,
}

impl SynthReport {
    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize synthesis report")
    }

    /// Primary metric of every selected candidate, in rank order.
    pub fn primary_metrics(&self) -> Vec<f64> {
        self.candidates
            .iter()
            .map(|c| c.primary_metric(self.target))
            .collect()
    }
}

/// Run the whole flow and report, even when no candidate survives.
///
/// Syntax and alignment errors, and any malformed graph, end the run with an error.
pub fn run(request: &SynthRequest, catalog: &GateCatalog) -> Result<SynthReport, SynthError> {
    match request.config.search.num_threads {
        Some(n) => rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build()
            .map_err(|e| SynthError::Internal(format!("failed to build worker pool: {e}")))?
            .install(|| run_in_pool(request, catalog)),
        None => run_in_pool(request, catalog),
    }
}

fn run_in_pool(request: &SynthRequest, catalog: &GateCatalog) -> Result<SynthReport, SynthError> {
    let begin = Instant::now();
    let config = &request.config;
    let synthesizer = Synthesizer::new(catalog, config);

    let (mode, aligned, targets, outcome) = match &request.input {
        EquationInput::Single { equation } => {
            let expr = parse(equation)?;
            let outcome = synthesizer.synthesize(&expr)?;
            (Mode::Regular, None, vec![(expr, Domain::Hvdd)], outcome)
        }
        EquationInput::Polymorphic {
            hvdd_equation,
            lvdd_equation,
        } => {
            let hvdd = parse(hvdd_equation)?;
            let lvdd = parse(lvdd_equation)?;
            let pair = align(&hvdd, &lvdd, config.search.max_alignment_steps)?;
            let outcome = synthesizer.synthesize_polymorphic(&pair)?;
            let targets = vec![(hvdd, Domain::Hvdd), (lvdd, Domain::Lvdd)];
            (Mode::Polymorphic, Some(pair), targets, outcome)
        }
    };
    let SynthOutcome {
        graphs,
        branch_failures,
        truncated,
        ..
    } = outcome;
    if graphs.first().map_or(false, |g| g.inputs().len() > config.search.max_verify_inputs) {
        debug!(
            "more than {} inputs, skipping exhaustive verification",
            config.search.max_verify_inputs
        );
    }

    let max_verify = config.search.max_verify_inputs;
    let evaluated = graphs
        .into_par_iter()
        .map(|g| {
            if g.inputs().len() <= max_verify {
                verify(&g, &targets)?;
            }
            CandidateResult::evaluate(g, config)
        })
        .collect::<Result<Vec<_>, _>>()?;
    let (valid, invalid): (Vec<_>, Vec<_>) = evaluated.into_iter().partition(|c| c.is_valid());
    let rejections: Vec<Rejection> = invalid
        .into_iter()
        .map(|c| Rejection {
            key: c.key,
            violations: c.verdict.violations().to_vec(),
        })
        .collect();
    for r in &rejections {
        let err = SynthError::ConstraintViolation(r.violations.clone());
        debug!("reject {}: {}", r.key, err);
    }

    let ranked = rank(valid, &config.optimization);
    let candidates = select(ranked, config.num_circuits);
    let found = candidates.len();
    let elapsed = Instant::now() - begin;
    info!(
        "{} of {} requested candidates, {} rejected, done in {:?}",
        found,
        config.num_circuits,
        rejections.len(),
        elapsed
    );
    Ok(SynthReport {
        mode,
        aligned,
        target: config.optimization.target,
        candidates,
        requested: config.num_circuits,
        found,
        exhausted: found < config.num_circuits,
        truncated,
        rejections,
        branch_failures,
        elapsed,
    })
}

/// Like [`run`], but a run without any valid candidate is an error.
pub fn generate(request: &SynthRequest, catalog: &GateCatalog) -> Result<SynthReport, SynthError> {
    let report = run(request, catalog)?;
    if report.candidates.is_empty() {
        return Err(SynthError::NoValidCandidate {
            rejected: report.rejections.len(),
            branch_failures: report.branch_failures.len(),
        });
    }
    Ok(report)
}

/// Synthesize a single equation with `config`.
pub fn generate_equation(
    equation: &str,
    config: SynthConfig,
    catalog: &GateCatalog,
) -> Result<SynthReport, SynthError> {
    generate(&SynthRequest::new(EquationInput::single(equation), config), catalog)
}

/// Exhaustively compare `graph` with every `(expression, domain)` target.
fn verify(graph: &CircuitGraph, targets: &[(Expr, Domain)]) -> Result<(), SynthError> {
    for (expr, domain) in targets {
        let expect = expr.truth_table(graph.inputs()).ok_or_else(|| {
            SynthError::Internal(format!("{} inputs are too many to verify", graph.inputs().len()))
        })?;
        if graph.truth_table(*domain)? != expect {
            return Err(SynthError::Internal(format!(
                "graph {} does not compute `{}` under {}",
                graph.structural_key(),
                expr,
                domain
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalog::GateTemplate,
        config::{Constraints, PolymorphicConfig},
        tests::{assert_equivalent, BASIC_CATALOG},
        truth_table::TruthTable,
        STANDARD_CATALOG,
    };

    #[test]
    fn test_and_maps_to_th22() {
        let _ = crate::utils::init_tracing_subscriber("debug");
        let report = generate_equation("A & B", SynthConfig::default(), &BASIC_CATALOG).unwrap();
        assert_eq!(Mode::Regular, report.mode);
        assert_eq!(1, report.found);
        assert!(!report.exhausted);
        let c = &report.candidates[0];
        assert_eq!("TH22(A,B)", c.key);
        assert_eq!(1, c.metrics.gate_count);
        assert_eq!(1, c.metrics.depth);

        let config = SynthConfig {
            num_circuits: 5,
            ..Default::default()
        };
        let report = generate_equation("A & B", config, &BASIC_CATALOG).unwrap();
        assert_eq!(1, report.found);
        assert_eq!(5, report.requested);
        assert!(report.exhausted);
    }

    #[test]
    fn test_or3_ranking() {
        let mut config = SynthConfig {
            num_circuits: 2,
            ..Default::default()
        };
        config.search.num_threads = Some(2);
        let report = generate_equation("A + B + C", config, &BASIC_CATALOG).unwrap();
        assert_eq!(2, report.found);
        let (first, second) = (&report.candidates[0], &report.candidates[1]);
        assert_eq!("TH13(A,B,C)", first.key);
        assert_eq!(1, first.metrics.gate_count);
        assert_eq!(2, second.metrics.gate_count);
        assert!(second.gates.get("TH12") == Some(&2));
        assert!(first.metrics.weighted_cost < second.metrics.weighted_cost);
        assert_eq!(vec![1., 2.], report.primary_metrics());
    }

    #[test]
    fn test_polymorphic_or_and() {
        let request = SynthRequest::new(
            EquationInput::polymorphic("A + B", "A & B"),
            SynthConfig {
                polymorphic: PolymorphicConfig {
                    required_gates: vec!["TH12m_TH22m".into()],
                    use_direct_mapping: true,
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        let report = generate(&request, &STANDARD_CATALOG).unwrap();
        assert_eq!(Mode::Polymorphic, report.mode);
        let aligned = report.aligned.as_ref().unwrap();
        assert_eq!(2, aligned.hvdd.arity());
        assert_eq!(1, report.found);
        let c = &report.candidates[0];
        assert_eq!(Some(&1), c.gates.get("TH12m_TH22m"));
        assert_equivalent(&parse("A + B").unwrap(), &c.graph, Domain::Hvdd);
        assert_equivalent(&parse("A & B").unwrap(), &c.graph, Domain::Lvdd);
        for row in 0..4usize {
            let (a, b) = (row & 1 == 1, row & 2 == 2);
            assert_eq!(a || b, c.graph.evaluate(&[a, b], Domain::Hvdd, false).unwrap());
            assert_eq!(a && b, c.graph.evaluate(&[a, b], Domain::Lvdd, false).unwrap());
        }
    }

    #[test]
    fn test_negation_rejected() {
        let err = generate_equation("A & !B", SynthConfig::default(), &BASIC_CATALOG).unwrap_err();
        assert!(matches!(err, SynthError::Syntax { .. }));
    }

    #[test]
    fn test_fanout_rejects_all() {
        let config = SynthConfig {
            num_circuits: 3,
            constraints: Constraints {
                max_fanout: 1,
                ..Default::default()
            },
            ..Default::default()
        };
        let request = SynthRequest::new(
            EquationInput::single("(A & B) + (A & C) + (A & D)"),
            config,
        );
        let report = run(&request, &BASIC_CATALOG).unwrap();
        assert!(report.candidates.is_empty());
        assert!(report.exhausted);
        assert!(!report.rejections.is_empty());
        for r in &report.rejections {
            assert!(r.violations.contains(&Violation::Fanout {
                net: "A".into(),
                fanout: 3,
                max: 1
            }));
        }
        let err = generate(&request, &BASIC_CATALOG).unwrap_err();
        assert!(matches!(err, SynthError::NoValidCandidate { rejected, .. } if rejected > 0));
    }

    #[test]
    fn test_alignment_failure() {
        let request = SynthRequest::new(
            EquationInput::polymorphic("A + B", "A & C"),
            SynthConfig::default(),
        );
        assert_eq!(
            SynthError::Alignment("no common structure".into()),
            generate(&request, &STANDARD_CATALOG).unwrap_err()
        );
    }

    #[test]
    fn test_no_gate_is_not_fatal() {
        let mut config = SynthConfig::default();
        config.gates.avoid = vec!["THXOR".into()];
        let err = generate_equation("A ^ B", config, &BASIC_CATALOG).unwrap_err();
        assert_eq!(
            SynthError::NoValidCandidate {
                rejected: 0,
                branch_failures: 1
            },
            err
        );
    }

    #[test]
    fn test_report_json() {
        let report = generate_equation("A & B", SynthConfig::default(), &BASIC_CATALOG).unwrap();
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!("regular", json["mode"]);
        assert_eq!("TH22(A,B)", json["candidates"][0]["key"]);
        assert_eq!("accept", json["candidates"][0]["verdict"]);
        assert_eq!("TH22", json["candidates"][0]["graph"]["nodes"][0]["gate"]);
        assert_eq!(1, json["found"]);
        assert!(json["elapsed"].is_f64());
    }

    #[test]
    fn test_repeated_operand() {
        for (equation, key) in [("A & A", "TH22(A,A)"), ("A + A", "TH12(A,A)")] {
            let report =
                generate_equation(equation, SynthConfig::default(), &BASIC_CATALOG).unwrap();
            let c = &report.candidates[0];
            assert_eq!(key, c.key);
            assert_eq!(&["A".to_string()], c.graph.inputs());
            assert_eq!(2, c.metrics.max_fanout);
        }
    }

    /// Balanced AND tree over `vars`, fully parenthesized.
    fn balanced_and(vars: &[String]) -> String {
        match vars {
            [v] => v.clone(),
            _ => {
                let (l, r) = vars.split_at(vars.len() / 2);
                format!("({} & {})", balanced_and(l), balanced_and(r))
            }
        }
    }

    #[test]
    fn test_wide_equation() {
        let vars: Vec<String> = (0..64).map(|i| format!("V{i}")).collect();
        let mut config = SynthConfig::default();
        config.search.max_variants = 1;
        config.search.max_candidates = 2;
        let report = generate_equation(&balanced_and(&vars), config, &BASIC_CATALOG).unwrap();
        assert!(report.found >= 1);
        let graph = &report.candidates[0].graph;
        assert_eq!(64, graph.inputs().len());
        assert!(graph.truth_table(Domain::Hvdd).is_err());

        let mut config = SynthConfig::default();
        config.search.max_verify_inputs = 4;
        let report = generate_equation(&balanced_and(&vars[..8]), config, &BASIC_CATALOG).unwrap();
        let graph = &report.candidates[0].graph;
        assert_equivalent(&parse(&balanced_and(&vars[..8])).unwrap(), graph, Domain::Hvdd);
    }

    #[test]
    fn test_polymorphic_wide_cluster() {
        let catalog = GateCatalog::from_templates([
            GateTemplate::polymorphic("P_OR2_OR2", TruthTable::or(2), TruthTable::or(2), false),
            GateTemplate::polymorphic("P_OR3_OR3", TruthTable::or(3), TruthTable::or(3), false),
            GateTemplate::polymorphic("P_AND2_OR2", TruthTable::and(2), TruthTable::or(2), false),
            GateTemplate::polymorphic("P_OR2_XOR2", TruthTable::or(2), TruthTable::xor(2), false),
        ])
        .unwrap();
        let (h, l) = (
            "(A + B + C) + (D + (E & F) + G)",
            "G ^ ((A + F + E) + B + (C + D))",
        );
        let request = SynthRequest::new(EquationInput::polymorphic(h, l), SynthConfig::default());
        let report = generate(&request, &catalog).unwrap();
        let aligned = report.aligned.as_ref().unwrap();
        fn narrow(e: &Expr) -> bool {
            e.is_var() || ((2..=3).contains(&e.arity()) && e.operands().into_iter().all(narrow))
        }
        assert!(narrow(&aligned.hvdd) && narrow(&aligned.lvdd));
        assert!(report.found >= 1);
        for c in &report.candidates {
            assert_equivalent(&parse(h).unwrap(), &c.graph, Domain::Hvdd);
            assert_equivalent(&parse(l).unwrap(), &c.graph, Domain::Lvdd);
        }
    }

    #[test]
    fn test_verify_catches_mismatch() {
        let report = generate_equation("A & B", SynthConfig::default(), &BASIC_CATALOG).unwrap();
        let graph = &report.candidates[0].graph;
        let targets = vec![(parse("A + B").unwrap(), Domain::Hvdd)];
        assert!(matches!(verify(graph, &targets), Err(SynthError::Internal(_))));
    }
}
