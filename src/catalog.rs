//! Gate templates and the queryable catalog consumed by the synthesizer.
#![allow(clippy::module_inception)]

mod catalog;
pub mod library;
mod template;

pub use catalog::{CatalogSpec, GateCatalog, GateMatch, PlainGateSpec, PolymorphicGateSpec};
pub use library::{standard_catalog, STANDARD_CATALOG};
pub use template::{Domain, DomainCosts, GateCosts, GateFunction, GateTemplate};
