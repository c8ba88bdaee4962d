use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest gate arity a template may have.
pub const MAX_ARITY: usize = 4;

/// Widest variable set whose rows are ever enumerated one by one.
pub const MAX_EXHAUSTIVE_INPUTS: usize = 24;

/// A complete truth table over at most [`MAX_ARITY`] inputs.
///
/// Row `i` assigns input `j` the value of bit `j` of `i`, so input 0 is the
/// least significant bit of the row index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TruthTable {
    arity: u8,
    bits: u16,
}

impl TruthTable {
    /// Build a table by evaluating `f` on every input assignment.
    pub fn from_fn(arity: usize, mut f: impl FnMut(&[bool]) -> bool) -> Self {
        assert!(arity <= MAX_ARITY, "arity {arity} exceeds {MAX_ARITY}");
        let mut bits = 0u16;
        let mut inputs = vec![false; arity];
        for row in 0..(1usize << arity) {
            for (j, v) in inputs.iter_mut().enumerate() {
                *v = (row >> j) & 1 == 1;
            }
            if f(&inputs) {
                bits |= 1 << row;
            }
        }
        Self {
            arity: arity as u8,
            bits,
        }
    }

    /// Build a table from explicit rows. Returns `None` if the row count is not a power of two
    /// matching an arity in `1..=MAX_ARITY`.
    pub fn from_rows(rows: &[bool]) -> Option<Self> {
        let arity = (1..=MAX_ARITY).find(|a| 1usize << a == rows.len())?;
        Some(Self::from_fn(arity, |inputs| {
            let row = inputs
                .iter()
                .enumerate()
                .fold(0usize, |acc, (j, &v)| acc | (usize::from(v) << j));
            rows[row]
        }))
    }

    /// Steady-state function of a weighted threshold gate: true when the weighted
    /// count of true inputs reaches `threshold`.
    pub fn threshold(threshold: u32, weights: &[u32]) -> Self {
        Self::from_fn(weights.len(), |inputs| {
            let sum: u32 = inputs
                .iter()
                .zip(weights)
                .map(|(&v, &w)| if v { w } else { 0 })
                .sum();
            sum >= threshold
        })
    }

    pub fn and(arity: usize) -> Self {
        Self::from_fn(arity, |inputs| inputs.iter().all(|&v| v))
    }

    pub fn or(arity: usize) -> Self {
        Self::from_fn(arity, |inputs| inputs.iter().any(|&v| v))
    }

    pub fn xor(arity: usize) -> Self {
        Self::from_fn(arity, |inputs| inputs.iter().filter(|&&v| v).count() % 2 == 1)
    }

    pub fn arity(&self) -> usize {
        self.arity as usize
    }

    pub fn bits(&self) -> u16 {
        self.bits
    }

    pub fn rows(&self) -> usize {
        1 << self.arity
    }

    /// Value of the table at `row`.
    pub fn get(&self, row: usize) -> bool {
        debug_assert!(row < self.rows());
        (self.bits >> row) & 1 == 1
    }

    /// Evaluate for an explicit input vector.
    pub fn eval(&self, inputs: &[bool]) -> bool {
        debug_assert_eq!(inputs.len(), self.arity());
        let row = inputs
            .iter()
            .enumerate()
            .fold(0usize, |acc, (j, &v)| acc | (usize::from(v) << j));
        self.get(row)
    }

    /// The table obtained by driving pin `p` from input `binding[p]`.
    pub fn rebind(&self, binding: &[usize]) -> Self {
        debug_assert_eq!(binding.len(), self.arity());
        Self::from_fn(self.arity(), |inputs| {
            let row = binding
                .iter()
                .enumerate()
                .fold(0usize, |acc, (pin, &src)| acc | (usize::from(inputs[src]) << pin));
            self.get(row)
        })
    }

    /// Smallest table among all input permutations. Two tables are equivalent up to
    /// input order iff their canonical forms are equal.
    pub fn canonical(&self) -> Self {
        (0..self.arity())
            .permutations(self.arity())
            .map(|perm| self.rebind(&perm))
            .min()
            .unwrap_or(*self)
    }

    /// Find a pin binding under which `self` (a gate function) computes `target`.
    ///
    /// The returned vector maps each pin to the target input it must be wired to.
    pub fn find_binding(&self, target: &TruthTable) -> Option<Vec<usize>> {
        if self.arity != target.arity {
            return None;
        }
        (0..self.arity())
            .permutations(self.arity())
            .find(|perm| self.rebind(perm) == *target)
    }

    /// Like [`find_binding`](Self::find_binding) but one binding must serve both tables.
    pub fn find_pair_binding(
        pair: (&TruthTable, &TruthTable),
        target: (&TruthTable, &TruthTable),
    ) -> Option<Vec<usize>> {
        let arity = pair.0.arity();
        if pair.1.arity() != arity || target.0.arity() != arity || target.1.arity() != arity {
            return None;
        }
        (0..arity)
            .permutations(arity)
            .find(|perm| pair.0.rebind(perm) == *target.0 && pair.1.rebind(perm) == *target.1)
    }

    /// Canonical form of a function pair under a shared input permutation.
    pub fn canonical_pair(a: &TruthTable, b: &TruthTable) -> (TruthTable, TruthTable) {
        debug_assert_eq!(a.arity, b.arity);
        (0..a.arity())
            .permutations(a.arity())
            .map(|perm| (a.rebind(&perm), b.rebind(&perm)))
            .min()
            .unwrap_or((*a, *b))
    }

    /// Whether the function depends on input `j`.
    pub fn depends_on(&self, j: usize) -> bool {
        (0..self.rows())
            .filter(|row| (row >> j) & 1 == 0)
            .any(|row| self.get(row) != self.get(row | (1 << j)))
    }
}

impl fmt::Display for TruthTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in (0..self.rows()).rev() {
            write!(f, "{}", u8::from(self.get(row)))?;
        }
        Ok(())
    }
}
