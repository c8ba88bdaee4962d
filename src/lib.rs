//! Synthesis of MTNCL threshold-gate circuits from boolean equations.
//!
//! A single equation is mapped onto plain threshold gates. A pair of equations, one per
//! supply domain, is first aligned into one shape and then mapped onto polymorphic gates
//! that compute the HVDD function at high supply and the LVDD function at low supply.

#[macro_use]
extern crate tracing;

pub mod align;
pub mod catalog;
pub mod circuit;
pub mod config;
pub mod error;
pub mod expr;
pub mod pipeline;
pub mod rank;
pub mod synth;
pub mod truth_table;
pub mod utils;
pub mod validate;


pub use align::{align, AlignedPair};
pub use catalog::{Domain, GateCatalog, GateTemplate, STANDARD_CATALOG};
pub use circuit::CircuitGraph;
pub use config::{EquationInput, SynthConfig, SynthRequest};
pub use error::{SynthError, Violation};
pub use expr::{parse, Expr};
pub use pipeline::{generate, generate_equation, run, SynthReport};
pub use rank::CandidateResult;
