use crate::{
    align::AlignedPair,
    catalog::Domain,
    expr::{Expr, Op},
    truth_table::TruthTable,
};
use itertools::Itertools;
use std::collections::{BTreeSet, HashSet};

/// A signal feeding a cut: a primary input, or the output of a subject node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum CutInput {
    Var(String),
    Node(usize),
}

/// Duplicate-free inputs of a cut, in order of first appearance.
pub(crate) type Cut = Vec<CutInput>;

#[derive(Debug, Clone)]
pub(crate) enum SubjectKind {
    Leaf(String),
    Gate {
        hvdd: Op,
        lvdd: Op,
        children: Vec<usize>,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct SubjectNode {
    pub kind: SubjectKind,
    /// Source text of the subtree, used in error reports.
    pub label: String,
}

/// The expression tree being mapped, stored in post-order: children precede parents.
///
/// A regular tree carries the same operator in both domains.
#[derive(Debug, Clone)]
pub(crate) struct SubjectTree {
    nodes: Vec<SubjectNode>,
}

impl SubjectTree {
    pub fn from_expr(e: &Expr) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.push(e, e);
        tree
    }

    /// Build from two trees of the same shape.
    pub fn from_pair(pair: &AlignedPair) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.push(&pair.hvdd, &pair.lvdd);
        tree
    }

    fn push(&mut self, h: &Expr, l: &Expr) -> usize {
        let label = if h == l {
            h.to_string()
        } else {
            format!("{h} / {l}")
        };
        let kind = match (h, l) {
            (Expr::Var(name), _) => SubjectKind::Leaf(name.clone()),
            _ => {
                let children = h
                    .operands()
                    .into_iter()
                    .zip(l.operands())
                    .map(|(hc, lc)| self.push(hc, lc))
                    .collect();
                SubjectKind::Gate {
                    hvdd: h.op().unwrap_or(Op::And),
                    lvdd: l.op().unwrap_or(Op::And),
                    children,
                }
            }
        };
        self.nodes.push(SubjectNode { kind, label });
        self.nodes.len() - 1
    }

    pub fn root(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn node(&self, i: usize) -> &SubjectNode {
        &self.nodes[i]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn variables(&self) -> BTreeSet<String> {
        self.nodes
            .iter()
            .filter_map(|n| match &n.kind {
                SubjectKind::Leaf(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    /// How node `i` appears when it feeds a cut.
    fn signal(&self, i: usize) -> CutInput {
        match &self.nodes[i].kind {
            SubjectKind::Leaf(name) => CutInput::Var(name.clone()),
            SubjectKind::Gate { .. } => CutInput::Node(i),
        }
    }

    /// Cuts of every gate node with at most `max_arity` inputs, at most `max_cuts` per
    /// node. The first cut of a node always reads its direct children, one input per
    /// operand even when operands repeat; wider cuts list each signal once.
    ///
    /// Returns the cuts and whether any node had more cuts than kept.
    pub fn cuts(&self, max_arity: usize, max_cuts: usize) -> (Vec<Vec<Cut>>, bool) {
        let mut ans: Vec<Vec<Cut>> = Vec::with_capacity(self.nodes.len());
        let mut truncated = false;
        for node in &self.nodes {
            let SubjectKind::Gate { children, .. } = &node.kind else {
                ans.push(Vec::new());
                continue;
            };
            let mut seen = HashSet::new();
            let mut cuts = Vec::new();
            let direct: Cut = children.iter().map(|&c| self.signal(c)).collect();
            if direct.len() <= max_arity && max_cuts > 0 {
                seen.insert(sorted(&direct));
                cuts.push(direct);
            }
            let choices = children.iter().map(|&c| {
                let mut options: Vec<Cut> = vec![vec![self.signal(c)]];
                options.extend(ans[c].iter().cloned());
                options
            });
            for parts in choices.multi_cartesian_product() {
                let mut cut: Cut = Vec::new();
                for input in parts.into_iter().flatten() {
                    if !cut.contains(&input) {
                        cut.push(input);
                    }
                }
                if cut.len() > max_arity || !seen.insert(sorted(&cut)) {
                    continue;
                }
                if cuts.len() == max_cuts {
                    truncated = true;
                    break;
                }
                cuts.push(cut);
            }
            ans.push(cuts);
        }
        (ans, truncated)
    }

    /// Function computed at node `i` in terms of the inputs of `cut`.
    ///
    /// The direct cut maps operand `p` to input `p`, so `A & A` reads two pins.
    pub fn cut_function(&self, i: usize, cut: &[CutInput], domain: Domain) -> TruthTable {
        if let SubjectKind::Gate { children, .. } = &self.nodes[i].kind {
            let direct = children.len() == cut.len()
                && children.iter().zip(cut).all(|(&c, input)| self.signal(c) == *input);
            if direct {
                return self.op(i, domain).table(cut.len());
            }
        }
        TruthTable::from_fn(cut.len(), |x| self.eval(i, cut, x, domain))
    }

    /// Operator of gate node `i` under `domain`.
    fn op(&self, i: usize, domain: Domain) -> Op {
        match &self.nodes[i].kind {
            SubjectKind::Gate { hvdd, lvdd, .. } => match domain {
                Domain::Hvdd => *hvdd,
                Domain::Lvdd => *lvdd,
            },
            SubjectKind::Leaf(_) => Op::And,
        }
    }

    fn eval(&self, i: usize, cut: &[CutInput], x: &[bool], domain: Domain) -> bool {
        if let Some(pos) = cut.iter().position(|c| *c == CutInput::Node(i)) {
            return x[pos];
        }
        match &self.nodes[i].kind {
            SubjectKind::Leaf(name) => cut
                .iter()
                .position(|c| matches!(c, CutInput::Var(v) if v == name))
                .map(|pos| x[pos])
                .unwrap_or(false),
            SubjectKind::Gate { children, .. } => self
                .op(i, domain)
                .apply(children.iter().map(|&c| self.eval(c, cut, x, domain))),
        }
    }
}

fn sorted(cut: &[CutInput]) -> Vec<CutInput> {
    let mut key = cut.to_vec();
    key.sort();
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{align::align, expr::parse};

    fn var(name: &str) -> CutInput {
        CutInput::Var(name.to_string())
    }

    #[test]
    fn test_post_order() {
        let tree = SubjectTree::from_expr(&parse("(A & B) + C").unwrap());
        assert_eq!(5, tree.len());
        assert_eq!("(A & B) + C", tree.node(tree.root()).label);
        assert_eq!(vec!["A", "B", "C"], tree.variables().into_iter().collect::<Vec<_>>());
    }

    #[test]
    fn test_cuts() {
        let tree = SubjectTree::from_expr(&parse("(A & B) + C").unwrap());
        let (cuts, truncated) = tree.cuts(4, 32);
        assert!(!truncated);
        let root = &cuts[tree.root()];
        assert_eq!(2, root.len());
        assert_eq!(vec![CutInput::Node(2), var("C")], root[0]);
        assert_eq!(vec![var("A"), var("B"), var("C")], root[1]);

        let (cuts, _) = tree.cuts(2, 32);
        assert_eq!(1, cuts[tree.root()].len());

        let (cuts, truncated) = tree.cuts(4, 1);
        assert!(truncated);
        assert_eq!(1, cuts[tree.root()].len());
    }

    #[test]
    fn test_shared_variable() {
        let tree = SubjectTree::from_expr(&parse("(A & B) + (A & C)").unwrap());
        let (cuts, _) = tree.cuts(4, 32);
        let widest = cuts[tree.root()].last().unwrap();
        assert_eq!(&vec![var("A"), var("B"), var("C")], widest);
        let f = tree.cut_function(tree.root(), widest, Domain::Hvdd);
        assert_eq!(
            TruthTable::from_fn(3, |x| (x[0] && x[1]) || (x[0] && x[2])),
            f
        );
    }

    #[test]
    fn test_repeated_operand() {
        let tree = SubjectTree::from_expr(&parse("A & A").unwrap());
        let (cuts, _) = tree.cuts(4, 32);
        let root = &cuts[tree.root()];
        assert_eq!(vec![var("A"), var("A")], root[0]);
        assert_eq!(TruthTable::and(2), tree.cut_function(tree.root(), &root[0], Domain::Hvdd));
        assert_eq!(vec![var("A")], root[1]);
        assert_eq!(
            TruthTable::from_fn(1, |x| x[0]),
            tree.cut_function(tree.root(), &root[1], Domain::Hvdd)
        );
    }

    #[test]
    fn test_pair_functions() {
        let pair = align(&parse("A + B").unwrap(), &parse("A & B").unwrap(), 100).unwrap();
        let tree = SubjectTree::from_pair(&pair);
        let (cuts, _) = tree.cuts(4, 32);
        let cut = &cuts[tree.root()][0];
        assert_eq!(TruthTable::or(2), tree.cut_function(tree.root(), cut, Domain::Hvdd));
        assert_eq!(TruthTable::and(2), tree.cut_function(tree.root(), cut, Domain::Lvdd));
        assert_eq!("A + B / A & B", tree.node(tree.root()).label);
    }
}
