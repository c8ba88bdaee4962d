//! Arena-based gate-level circuit graphs.

mod builder;
mod graph;

pub use builder::{GraphBuilder, RESET_NET};
pub use graph::{CircuitGraph, CircuitNode, Driver, Net, NetId, NodeId, Pin};
