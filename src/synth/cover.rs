use super::subject::{Cut, CutInput, SubjectKind, SubjectTree};
use crate::{
    catalog::GateMatch,
    circuit::{CircuitGraph, GraphBuilder, NetId},
    error::SynthError,
};
use itertools::Itertools;
use std::sync::Arc;

/// One way to implement a subject node: a gate over a cut, with a cover for every
/// internal node on the cut.
#[derive(Debug)]
pub(crate) struct Cover {
    pub gate: GateMatch,
    pub cut: Cut,
    /// Parallel to `cut`; `Some` exactly for [`CutInput::Node`] inputs.
    pub inputs: Vec<Option<Arc<Cover>>>,
}

impl Cover {
    fn build(&self, b: &mut GraphBuilder) -> Result<NetId, SynthError> {
        let mut nets = Vec::with_capacity(self.cut.len());
        for (input, sub) in self.cut.iter().zip(&self.inputs) {
            let net = match (input, sub) {
                (CutInput::Var(name), _) => b
                    .input(name)
                    .ok_or_else(|| SynthError::Internal(format!("unknown input `{name}`")))?,
                (CutInput::Node(_), Some(sub)) => sub.build(b)?,
                (CutInput::Node(i), None) => {
                    return Err(SynthError::Internal(format!(
                        "subject node {i} has no cover"
                    )))
                }
            };
            nets.push(net);
        }
        let pins = self.gate.binding.iter().map(|&j| nets[j]).collect();
        b.add_node(self.gate.template.clone(), pins)
    }
}

/// Gate choices of every subject node, in priority order.
pub(crate) type Choices = Vec<Vec<(Cut, GateMatch)>>;

/// Memoized enumeration of covers, bottom-up over a subject tree.
pub(crate) struct CoverSearch<'a> {
    tree: &'a SubjectTree,
    choices: Choices,
    no_gate: fn(String) -> SynthError,
    cap: usize,
    memo: Vec<Option<Result<Arc<Vec<Arc<Cover>>>, SynthError>>>,
    pub truncated: bool,
}

impl<'a> CoverSearch<'a> {
    /// `no_gate` builds the branch error for a node without any usable gate.
    pub fn new(
        tree: &'a SubjectTree,
        choices: Choices,
        no_gate: fn(String) -> SynthError,
        cap: usize,
    ) -> Self {
        Self {
            tree,
            memo: vec![None; tree.len()],
            choices,
            no_gate,
            cap,
            truncated: false,
        }
    }

    /// Up to `cap` covers of node `i`, in the priority order of its choices.
    pub fn covers(&mut self, i: usize) -> Result<Arc<Vec<Arc<Cover>>>, SynthError> {
        if let Some(ans) = &self.memo[i] {
            return ans.clone();
        }
        let ans = self.enumerate(i);
        self.memo[i] = Some(ans.clone());
        ans
    }

    fn enumerate(&mut self, i: usize) -> Result<Arc<Vec<Arc<Cover>>>, SynthError> {
        let choices = self.choices[i].clone();
        if choices.is_empty() {
            return Err((self.no_gate)(self.tree.node(i).label.clone()));
        }
        let mut first_err = None;
        let mut ans = Vec::new();
        'choice: for (cut, gate) in choices {
            let mut options = Vec::with_capacity(cut.len());
            for input in &cut {
                options.push(match input {
                    CutInput::Var(_) => vec![None],
                    CutInput::Node(c) => match self.covers(*c) {
                        Ok(list) => list.iter().cloned().map(Some).collect(),
                        Err(e) => {
                            first_err.get_or_insert(e);
                            continue 'choice;
                        }
                    },
                });
            }
            for inputs in options.into_iter().multi_cartesian_product() {
                if ans.len() == self.cap {
                    self.truncated = true;
                    break 'choice;
                }
                ans.push(Arc::new(Cover {
                    gate: gate.clone(),
                    cut: cut.clone(),
                    inputs,
                }));
            }
        }
        if ans.is_empty() {
            let label = self.tree.node(i).label.clone();
            return Err(first_err.unwrap_or_else(|| (self.no_gate)(label)));
        }
        Ok(Arc::new(ans))
    }

    /// Circuit graphs of the root covers, in priority order.
    pub fn graphs(&mut self) -> Result<Vec<CircuitGraph>, SynthError> {
        let root = self.tree.root();
        let vars = self.tree.variables();
        if let SubjectKind::Leaf(name) = &self.tree.node(root).kind {
            let b = GraphBuilder::new(vars);
            let net = b
                .input(name)
                .ok_or_else(|| SynthError::Internal(format!("unknown input `{name}`")))?;
            return b.finish(net).map(|g| vec![g]);
        }
        let covers = self.covers(root)?;
        covers
            .iter()
            .map(|cover| {
                let mut b = GraphBuilder::new(vars.iter().cloned());
                let out = cover.build(&mut b)?;
                b.finish(out)
            })
            .collect()
    }
}
