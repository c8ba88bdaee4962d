//! Structural alignment of the HVDD and LVDD equations of a polymorphic circuit.
//!
//! Both trees may be rewritten by reordering operands and re-bracketing AND/OR chains,
//! never changing their boolean meaning, until they have the same shape. Operators at
//! aligned positions may differ.

use crate::{
    error::SynthError,
    expr::{Expr, Op},
    utils::serialize_display,
};
use itertools::Itertools;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlignedPair {
    #[serde(serialize_with = "serialize_display")]
    pub hvdd: Expr,
    #[serde(serialize_with = "serialize_display")]
    pub lvdd: Expr,
}

impl AlignedPair {
    /// Positionally consistent child pairs of the node pair at the root.
    pub fn children(&self) -> Vec<AlignedPair> {
        self.hvdd
            .operands()
            .into_iter()
            .zip(self.lvdd.operands())
            .map(|(h, l)| AlignedPair {
                hvdd: h.clone(),
                lvdd: l.clone(),
            })
            .collect()
    }
}

/// Find rewrites of `hvdd` and `lvdd` that share one tree shape.
///
/// The search gives up after `max_steps` node comparisons.
pub fn align(hvdd: &Expr, lvdd: &Expr, max_steps: usize) -> Result<AlignedPair, SynthError> {
    let mut aligner = Aligner {
        steps: 0,
        max_steps,
    };
    let ans = if leaves(hvdd) == leaves(lvdd) {
        aligner.align(hvdd, lvdd)
    } else {
        None
    };
    match ans {
        Some((h, l)) => {
            debug!("aligned in {} steps: `{}` / `{}`", aligner.steps, h, l);
            debug_assert!(h.same_shape(&l));
            Ok(AlignedPair { hvdd: h, lvdd: l })
        }
        None => {
            if aligner.steps > max_steps {
                warn!("alignment gave up after {max_steps} steps");
            }
            Err(SynthError::Alignment("no common structure".to_string()))
        }
    }
}

struct Aligner {
    steps: usize,
    max_steps: usize,
}

/// A candidate top-level split of a node: its operator and its children.
struct Shape {
    op: Op,
    children: Vec<Expr>,
}

impl Aligner {
    fn align(&mut self, h: &Expr, l: &Expr) -> Option<(Expr, Expr)> {
        self.steps += 1;
        if self.steps > self.max_steps {
            return None;
        }
        match (h, l) {
            (Expr::Var(a), Expr::Var(b)) => (a == b).then(|| (h.clone(), l.clone())),
            (Expr::Var(_), _) | (_, Expr::Var(_)) => None,
            _ => {
                let budget = self.max_steps - self.steps;
                let (hshapes, lshapes) = (shapes(h, budget), shapes(l, budget));
                if hshapes.is_empty() || lshapes.is_empty() {
                    return None;
                }
                // each side's first shape against every shape of the other, then the rest
                let order = (0..lshapes.len())
                    .map(|j| (0, j))
                    .chain((1..hshapes.len()).map(|i| (i, 0)))
                    .chain((1..hshapes.len()).cartesian_product(1..lshapes.len()));
                for (i, j) in order {
                    if let Some(ans) = self.align_children(&hshapes[i], &lshapes[j]) {
                        return Some(ans);
                    }
                    if self.steps > self.max_steps {
                        return None;
                    }
                }
                None
            }
        }
    }

    fn align_children(&mut self, hs: &Shape, ls: &Shape) -> Option<(Expr, Expr)> {
        let k = hs.children.len();
        if ls.children.len() != k {
            return None;
        }
        let hleaves: Vec<_> = hs.children.iter().map(leaves).collect();
        let lleaves: Vec<_> = ls.children.iter().map(leaves).collect();
        'perm: for perm in (0..k).permutations(k) {
            if (0..k).any(|i| hleaves[i] != lleaves[perm[i]]) {
                continue;
            }
            let mut hc = Vec::with_capacity(k);
            let mut lc = Vec::with_capacity(k);
            for (i, &j) in perm.iter().enumerate() {
                match self.align(&hs.children[i], &ls.children[j]) {
                    Some((a, b)) => {
                        hc.push(a);
                        lc.push(b);
                    }
                    None => continue 'perm,
                }
            }
            return Some((Expr::with_op(hs.op, hc), Expr::with_op(ls.op, lc)));
        }
        None
    }
}

/// Sorted leaf names, with repetition.
fn leaves(e: &Expr) -> Vec<String> {
    fn walk(e: &Expr, out: &mut Vec<String>) {
        match e {
            Expr::Var(name) => out.push(name.clone()),
            _ => e.operands().into_iter().for_each(|c| walk(c, out)),
        }
    }
    let mut out = Vec::new();
    walk(e, &mut out);
    out.sort();
    out
}

/// Top-level splits of `e` into 2 or 3 children: the parsed structure first, then every
/// grouping of its AND/OR cluster into 2 or 3 blocks.
///
/// A block of more than 3 operands is built as one wide node; it only ever shows up here
/// as a cluster to be split again, never as a parsed shape. At most `limit` shapes.
fn shapes(e: &Expr, limit: usize) -> Vec<Shape> {
    let Some(op) = e.op() else {
        return vec![];
    };
    let parsed: Vec<Expr> = e.operands().into_iter().cloned().collect();
    let mut ans = Vec::new();
    if parsed.len() <= 3 {
        ans.push(Shape {
            op,
            children: parsed.clone(),
        });
    }
    let Some((op, operands)) = e.cluster() else {
        return ans;
    };
    for k in 2..=operands.len().min(3) {
        for blocks in set_partitions(operands.len(), k, limit) {
            if ans.len() >= limit {
                return ans;
            }
            let children: Vec<Expr> = blocks
                .iter()
                .map(|block| match block.as_slice() {
                    [i] => operands[*i].clone(),
                    _ => Expr::with_op(op, block.iter().map(|&i| operands[i].clone()).collect()),
                })
                .collect();
            if children != parsed {
                ans.push(Shape { op, children });
            }
        }
    }
    ans
}

/// The first `limit` partitions of `0..n` into exactly `k` non-empty blocks, each block
/// in ascending order.
fn set_partitions(n: usize, k: usize, limit: usize) -> Vec<Vec<Vec<usize>>> {
    fn go(
        i: usize,
        (n, k, limit): (usize, usize, usize),
        blocks: &mut Vec<Vec<usize>>,
        out: &mut Vec<Vec<Vec<usize>>>,
    ) {
        if out.len() >= limit || n - i < k - blocks.len() {
            return;
        }
        if i == n {
            out.push(blocks.clone());
            return;
        }
        for b in 0..blocks.len() {
            blocks[b].push(i);
            go(i + 1, (n, k, limit), blocks, out);
            blocks[b].pop();
        }
        if blocks.len() < k {
            blocks.push(vec![i]);
            go(i + 1, (n, k, limit), blocks, out);
            blocks.pop();
        }
    }
    let mut out = Vec::new();
    go(0, (n, k, limit), &mut Vec::new(), &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parse;
    use proptest::prelude::*;

    const STEPS: usize = 200_000;

    /// Every operator node carries 2 or 3 operands.
    fn narrow(e: &Expr) -> bool {
        e.is_var() || ((2..=3).contains(&e.arity()) && e.operands().into_iter().all(narrow))
    }

    fn check(h: &str, l: &str) -> AlignedPair {
        let (he, le) = (parse(h).unwrap(), parse(l).unwrap());
        let pair = align(&he, &le, STEPS).unwrap();
        assert!(pair.hvdd.same_shape(&pair.lvdd));
        assert!(narrow(&pair.hvdd), "{}", pair.hvdd);
        assert!(narrow(&pair.lvdd), "{}", pair.lvdd);
        let vars: Vec<String> = he.variables().into_iter().collect();
        assert_eq!(he.truth_table(&vars), pair.hvdd.truth_table(&vars));
        assert_eq!(le.truth_table(&vars), pair.lvdd.truth_table(&vars));
        pair
    }

    #[test]
    fn test_trivial() {
        let pair = check("A + B", "A & B");
        assert_eq!("A + B", pair.hvdd.to_string());
        assert_eq!("A & B", pair.lvdd.to_string());
        assert_eq!(2, pair.children().len());
    }

    #[test]
    fn test_reorder() {
        let pair = check("A + B", "B & A");
        assert_eq!("A & B", pair.lvdd.to_string());
        check("(A & B) + C", "C & (B + A)");
        check("A ^ B", "B + A");
    }

    #[test]
    fn test_rebracket() {
        let pair = check("(A + B) + C", "A & (B & C)");
        assert_eq!("(A + B) + C", pair.hvdd.to_string());
        assert_eq!("(A & B) & C", pair.lvdd.to_string());
        check("A + B + C", "(A & B) + C");
        check("(A + B + C) + (D & E)", "(D + E) & (A & B & C)");
    }

    #[test]
    fn test_wide_cluster_split() {
        let pair = check(
            "(A + B + C) + (D + (E & F) + G)",
            "G ^ ((A + F + E) + B + (C + D))",
        );
        assert_eq!(2, pair.hvdd.arity());
        assert_eq!(Some(Op::Xor), pair.lvdd.op());
        check("(A + B) + (C + D) + (E + F)", "(A & B & C) & (D & E & F)");
    }

    #[test]
    fn test_no_common_structure() {
        for (h, l) in [
            ("A + B", "A & C"),
            ("A + B + C", "A & B"),
            ("A ^ B", "A + B + C"),
            ("(A ^ B) ^ C", "A ^ (B & C)"),
            ("(A & B) + (C & D)", "(A + C) & (B + D) & A"),
        ] {
            let err = align(&parse(h).unwrap(), &parse(l).unwrap(), STEPS).unwrap_err();
            assert_eq!(SynthError::Alignment("no common structure".into()), err);
        }
    }

    #[test]
    fn test_budget() {
        let h = parse("(A + B) + C").unwrap();
        let l = parse("A & (B & C)").unwrap();
        assert!(align(&h, &l, 1).is_err());
    }

    #[test]
    fn test_set_partitions() {
        assert_eq!(3, set_partitions(3, 2, usize::MAX).len());
        assert_eq!(1, set_partitions(3, 3, usize::MAX).len());
        assert_eq!(7, set_partitions(4, 2, usize::MAX).len());
        assert_eq!(6, set_partitions(4, 3, usize::MAX).len());
        assert_eq!(4, set_partitions(20, 3, 4).len());
        for p in set_partitions(5, 3, usize::MAX) {
            assert_eq!(3, p.len());
            assert_eq!(5, p.iter().map(Vec::len).sum::<usize>());
        }
    }

    fn arb_expr() -> impl Strategy<Value = Expr> {
        let leaf = prop::sample::select(vec!["A", "B", "C", "D"]).prop_map(Expr::var);
        leaf.prop_recursive(3, 12, 3, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 2..=3).prop_map(Expr::and),
                prop::collection::vec(inner.clone(), 2..=3).prop_map(Expr::or),
                (inner.clone(), inner).prop_map(|(l, r)| Expr::xor(l, r)),
            ]
        })
    }

    /// Swap AND with OR and reverse every operand list.
    fn mirror(e: &Expr) -> Expr {
        match e {
            Expr::Var(_) => e.clone(),
            Expr::And(list) => Expr::or(list.iter().rev().map(mirror).collect()),
            Expr::Or(list) => Expr::and(list.iter().rev().map(mirror).collect()),
            Expr::Xor(l, r) => Expr::xor(mirror(r), mirror(l)),
        }
    }

    /// Flatten every AND/OR cluster and nest it to the right in binary nodes.
    fn right_nested(e: &Expr) -> Expr {
        match e.cluster() {
            Some((op, operands)) => {
                let mut list: Vec<Expr> = operands.into_iter().map(right_nested).collect();
                let mut acc = list.pop().unwrap();
                while let Some(next) = list.pop() {
                    acc = Expr::with_op(op, vec![next, acc]);
                }
                acc
            }
            None => match e {
                Expr::Xor(l, r) => Expr::xor(right_nested(l), right_nested(r)),
                _ => e.clone(),
            },
        }
    }

    proptest! {
        #[test]
        fn test_align_rebracketed(h in arb_expr()) {
            let l = right_nested(&mirror(&h));
            let pair = align(&h, &l, STEPS).unwrap();
            prop_assert!(pair.hvdd.same_shape(&pair.lvdd));
            prop_assert!(narrow(&pair.hvdd));
            prop_assert!(narrow(&pair.lvdd));
            let vars: Vec<String> = h.variables().into_iter().collect();
            prop_assert_eq!(h.truth_table(&vars), pair.hvdd.truth_table(&vars));
            prop_assert_eq!(l.truth_table(&vars), pair.lvdd.truth_table(&vars));
        }

        #[test]
        fn test_align_mirror(h in arb_expr()) {
            let l = mirror(&h);
            let pair = align(&h, &l, STEPS).unwrap();
            prop_assert!(pair.hvdd.same_shape(&pair.lvdd));
            prop_assert!(narrow(&pair.hvdd) && narrow(&pair.lvdd));
            let vars: Vec<String> = h.variables().into_iter().collect();
            prop_assert_eq!(h.truth_table(&vars), pair.hvdd.truth_table(&vars));
            prop_assert_eq!(l.truth_table(&vars), pair.lvdd.truth_table(&vars));
        }
    }
}
