//! MATILDA Core - Approximate TGD discovery over relational databases
//!
//! This crate discovers tuple-generating dependencies — implication rules
//! of the shape `R1(x̄1) ∧ … ∧ Rk(x̄k) → ∃ȳ. S(z̄)` — that hold on a
//! concrete database instance with sufficient support and confidence.
//! Candidates are enumerated by a bounded walk over a join-compatibility
//! graph, measured by SQL counting, and pruned down to a ranked,
//! deduplicated rule set under a memory/time budget.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod catalog;
pub mod config;
pub mod demo;
pub mod discovery;
pub mod enumerate;
pub mod error;
pub mod graph;
pub mod monitor;
pub mod prune;
pub mod query;
pub mod report;
pub mod tgd;
pub mod validate;

pub use catalog::{Catalog, Column, DomainTag, Relation};
pub use config::Config;
pub use demo::{create_demo_database, DemoKind};
pub use discovery::{DiscoveryOutcome, DiscoveryRun, DiscoveryStats, RunStatus};
pub use enumerate::{CandidateEnumerator, EnumeratorLimits, SeedPolicy};
pub use error::{CancelReason, MatildaError, QueryErrorKind, Result};
pub use graph::ConstraintGraph;
pub use monitor::Monitor;
pub use prune::{AcceptedRule, PreFilter, RuleSink};
pub use query::{QueryEngine, SqliteEngine};
pub use report::{write_artifacts, ResultsDocument};
pub use tgd::{Atom, Fingerprint, Rule, Term, Var};
pub use validate::{TgdValidator, ValidatorConfig, Verdict};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
