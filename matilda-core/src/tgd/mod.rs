//! Rule intermediate representation for candidate TGDs
//!
//! Typed, hashable candidate rules plus the canonicalization machinery the
//! enumerator and deduper rely on:
//!
//! - **Types**: terms, atoms, rules with existential head variables
//! - **Canonical fingerprints**: invariant under variable renaming and
//!   atom reordering
//! - **Subsumption**: renaming-based generality ordering between rules

pub mod canonical;
pub mod subsumption;
pub mod types;

pub use canonical::{fingerprint, prefix_fingerprint, Fingerprint};
pub use subsumption::subsumes;
pub use types::{var_name, Atom, Rule, Term, Var};
