use crate::truth_table::{TruthTable, MAX_EXHAUSTIVE_INPUTS};
use ptree::{Style, TreeItem};
use serde::{Deserialize, Serialize};
use std::{borrow::Cow, collections::BTreeSet, fmt, io};

/// Boolean operator of an internal expression node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Op {
    And,
    Or,
    Xor,
}

impl Op {
    pub fn symbol(self) -> &'static str {
        match self {
            Op::And => "&",
            Op::Or => "+",
            Op::Xor => "^",
        }
    }

    /// Truth table of the operator applied to `arity` operands.
    pub fn table(self, arity: usize) -> TruthTable {
        match self {
            Op::And => TruthTable::and(arity),
            Op::Or => TruthTable::or(arity),
            Op::Xor => TruthTable::xor(arity),
        }
    }

    pub fn apply(self, values: impl IntoIterator<Item = bool>) -> bool {
        let mut values = values.into_iter();
        match self {
            Op::And => values.all(|v| v),
            Op::Or => values.any(|v| v),
            Op::Xor => values.fold(false, |acc, v| acc ^ v),
        }
    }
}

/// An immutable boolean expression tree.
///
/// `And`/`Or` nodes built by the parser carry 2 or 3 operands, `Xor` is binary.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Expr {
    Var(String),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Xor(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var(name.into())
    }

    pub fn and(operands: Vec<Expr>) -> Self {
        debug_assert!(operands.len() >= 2);
        Expr::And(operands)
    }

    pub fn or(operands: Vec<Expr>) -> Self {
        debug_assert!(operands.len() >= 2);
        Expr::Or(operands)
    }

    pub fn xor(lhs: Expr, rhs: Expr) -> Self {
        Expr::Xor(Box::new(lhs), Box::new(rhs))
    }

    /// Rebuild a node with `op` over `operands`.
    pub fn with_op(op: Op, mut operands: Vec<Expr>) -> Self {
        match op {
            Op::And => Expr::and(operands),
            Op::Or => Expr::or(operands),
            Op::Xor => {
                debug_assert_eq!(operands.len(), 2);
                let rhs = operands.pop().expect("binary xor");
                let lhs = operands.pop().expect("binary xor");
                Expr::xor(lhs, rhs)
            }
        }
    }

    pub fn op(&self) -> Option<Op> {
        match self {
            Expr::Var(_) => None,
            Expr::And(_) => Some(Op::And),
            Expr::Or(_) => Some(Op::Or),
            Expr::Xor(..) => Some(Op::Xor),
        }
    }

    pub fn operands(&self) -> Vec<&Expr> {
        match self {
            Expr::Var(_) => vec![],
            Expr::And(list) | Expr::Or(list) => list.iter().collect(),
            Expr::Xor(l, r) => vec![&**l, &**r],
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Expr::Var(_) => 0,
            Expr::And(list) | Expr::Or(list) => list.len(),
            Expr::Xor(..) => 2,
        }
    }

    pub fn is_var(&self) -> bool {
        matches!(self, Expr::Var(_))
    }

    /// Number of operator nodes.
    pub fn op_count(&self) -> usize {
        match self {
            Expr::Var(_) => 0,
            _ => 1 + self.operands().iter().map(|c| c.op_count()).sum::<usize>(),
        }
    }

    /// Return a set of all variables.
    pub fn variables(&self) -> BTreeSet<String> {
        let mut ans = BTreeSet::new();
        self.collect_variables(&mut ans);
        ans
    }

    fn collect_variables(&self, ans: &mut BTreeSet<String>) {
        match self {
            Expr::Var(name) => {
                ans.insert(name.clone());
            }
            _ => self
                .operands()
                .into_iter()
                .for_each(|c| c.collect_variables(ans)),
        }
    }

    /// Eval to TRUE or FALSE under `value`.
    pub fn eval<F>(&self, value: &F) -> bool
    where
        F: Fn(&str) -> bool,
    {
        match self {
            Expr::Var(name) => value(name),
            Expr::And(list) => list.iter().all(|e| e.eval(value)),
            Expr::Or(list) => list.iter().any(|e| e.eval(value)),
            Expr::Xor(l, r) => l.eval(value) ^ r.eval(value),
        }
    }

    /// Exhaustive truth table over `vars`; in row `i`, `vars[j]` takes bit `j` of `i`.
    ///
    /// `None` for more than [`MAX_EXHAUSTIVE_INPUTS`] variables.
    pub fn truth_table(&self, vars: &[String]) -> Option<Vec<bool>> {
        if vars.len() > MAX_EXHAUSTIVE_INPUTS {
            return None;
        }
        let rows = (0..1usize << vars.len())
            .map(|row| {
                self.eval(&|name: &str| {
                    vars.iter()
                        .position(|v| v == name)
                        .map(|j| (row >> j) & 1 == 1)
                        .unwrap_or(false)
                })
            })
            .collect();
        Some(rows)
    }

    /// Whether two trees share the same shape: the same arity at every position and the
    /// same variable at every leaf. Operators are ignored.
    pub fn same_shape(&self, other: &Expr) -> bool {
        match (self, other) {
            (Expr::Var(l), Expr::Var(r)) => l == r,
            (Expr::Var(_), _) | (_, Expr::Var(_)) => false,
            _ => {
                let (l, r) = (self.operands(), other.operands());
                l.len() == r.len() && l.iter().zip(r.iter()).all(|(a, b)| a.same_shape(b))
            }
        }
    }

    /// Render the tree with `ptree`.
    pub fn write_tree(&self) -> io::Result<String> {
        let mut out = Vec::new();
        ptree::write_tree(self, &mut out)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_var() {
            write!(f, "{self}")
        } else {
            write!(f, "({self})")
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Var(name) => write!(f, "{name}"),
            _ => {
                let op = self.op().map(Op::symbol).unwrap_or_default();
                for (i, c) in self.operands().into_iter().enumerate() {
                    if i != 0 {
                        write!(f, " {op} ")?;
                    }
                    c.fmt_operand(f)?;
                }
                Ok(())
            }
        }
    }
}

impl TreeItem for Expr {
    type Child = Self;

    fn write_self<W: io::Write>(&self, f: &mut W, style: &Style) -> io::Result<()> {
        match self {
            Expr::Var(name) => write!(f, "{}", style.paint(name)),
            Expr::And(_) => write!(f, "{}", style.paint("And")),
            Expr::Or(_) => write!(f, "{}", style.paint("Or")),
            Expr::Xor(..) => write!(f, "{}", style.paint("Xor")),
        }
    }

    fn children(&self) -> Cow<[Self::Child]> {
        match self {
            Expr::Var(_) => Cow::from(vec![]),
            Expr::And(list) | Expr::Or(list) => Cow::from(list),
            Expr::Xor(l, r) => Cow::from(vec![(**l).clone(), (**r).clone()]),
        }
    }
}
