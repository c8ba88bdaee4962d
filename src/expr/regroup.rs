use super::{Expr, Op};
use itertools::Itertools;
use std::collections::HashSet;

impl Expr {
    /// Operands of the maximal same-operator AND/OR cluster rooted here, in order.
    ///
    /// `(A + B) + (C & D)` has cluster operands `[A, B, C & D]`.
    pub fn cluster(&self) -> Option<(Op, Vec<&Expr>)> {
        let op = match self {
            Expr::And(_) => Op::And,
            Expr::Or(_) => Op::Or,
            _ => return None,
        };
        let mut operands = Vec::new();
        self.collect_cluster(op, &mut operands);
        Some((op, operands))
    }

    fn collect_cluster<'a>(&'a self, op: Op, out: &mut Vec<&'a Expr>) {
        for c in self.operands() {
            if c.op() == Some(op) {
                c.collect_cluster(op, out);
            } else {
                out.push(c);
            }
        }
    }
}

/// All order-preserving trees of 2- and 3-input `op` nodes over `operands`.
pub fn bracketings(op: Op, operands: &[Expr], cap: usize) -> Vec<Expr> {
    if operands.len() == 1 {
        return vec![operands[0].clone()];
    }
    let mut ans = Vec::new();
    for parts in 2..=operands.len().min(3) {
        for sizes in compositions(operands.len(), parts) {
            let mut start = 0;
            let groups: Vec<Vec<Expr>> = sizes
                .iter()
                .map(|&len| {
                    let group = bracketings(op, &operands[start..start + len], cap);
                    start += len;
                    group
                })
                .collect();
            for children in groups.into_iter().multi_cartesian_product() {
                ans.push(Expr::with_op(op, children));
                if ans.len() >= cap {
                    return ans;
                }
            }
        }
    }
    ans
}

/// Ordered ways to write `n` as a sum of `parts` positive integers.
fn compositions(n: usize, parts: usize) -> Vec<Vec<usize>> {
    if parts == 1 {
        return vec![vec![n]];
    }
    (1..=n - (parts - 1))
        .flat_map(|first| {
            compositions(n - first, parts - 1).into_iter().map(move |mut rest| {
                rest.insert(0, first);
                rest
            })
        })
        .collect()
}

/// Associative regroupings of every AND/OR cluster in `expr`, the tree itself first.
///
/// Operand order is kept, so every variant computes the same function.
pub fn regroupings(expr: &Expr, cap: usize) -> Vec<Expr> {
    let mut seen = HashSet::new();
    let mut ans = vec![expr.clone()];
    seen.insert(expr.clone());
    for variant in regroup_inner(expr, cap) {
        if ans.len() >= cap {
            break;
        }
        if seen.insert(variant.clone()) {
            ans.push(variant);
        }
    }
    ans
}

fn regroup_inner(expr: &Expr, cap: usize) -> Vec<Expr> {
    match expr {
        Expr::Var(_) => vec![expr.clone()],
        Expr::Xor(l, r) => regroup_inner(l, cap)
            .into_iter()
            .cartesian_product(regroup_inner(r, cap))
            .take(cap)
            .map(|(l, r)| Expr::xor(l, r))
            .collect(),
        Expr::And(_) | Expr::Or(_) => {
            let Some((op, operands)) = expr.cluster() else {
                return vec![expr.clone()];
            };
            let mut ans = Vec::new();
            let choices = operands.iter().map(|e| regroup_inner(e, cap));
            for operands in choices.multi_cartesian_product() {
                for variant in bracketings(op, &operands, cap - ans.len()) {
                    ans.push(variant);
                }
                if ans.len() >= cap {
                    break;
                }
            }
            ans
        }
    }
}
