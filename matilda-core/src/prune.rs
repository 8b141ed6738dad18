//! Candidate pruning and accepted-rule deduplication
//!
//! Two-stage filter around the validator:
//!
//! - **Pre-validation** (`PreFilter`): syntactic checks that need no SQL —
//!   arity against the catalog, variable occurrence, the variable bound,
//!   and fingerprint-already-seen.
//! - **Post-validation** (`RuleSink`): threshold checks happen in the
//!   validator; the sink collapses isomorphic rules, drops candidates
//!   subsumed by an accepted rule, evicts accepted rules a more general
//!   newcomer subsumes, and keeps at most `top_k` rules ranked by
//!   `(confidence desc, support desc, size asc)`.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use ahash::RandomState;
use tracing::debug;

use crate::catalog::Catalog;
use crate::tgd::{fingerprint, subsumes, Fingerprint, Rule};
use crate::validate::Verdict;

/// Syntactic pre-validation filter
pub struct PreFilter<'a> {
    catalog: &'a Catalog,
    max_table: usize,
    max_vars: usize,
    seen: HashSet<Fingerprint, RandomState>,
}

impl<'a> PreFilter<'a> {
    /// Create a filter with the configured bounds
    pub fn new(catalog: &'a Catalog, max_table: usize, max_vars: usize) -> Self {
        PreFilter {
            catalog,
            max_table,
            max_vars,
            seen: HashSet::with_hasher(RandomState::new()),
        }
    }

    /// Whether the candidate is worth validating. Records the fingerprint,
    /// so an isomorphic successor is rejected.
    pub fn admit(&mut self, rule: &Rule) -> bool {
        if rule.atom_count() > self.max_table || rule.variables().len() > self.max_vars {
            return false;
        }
        if !rule.is_well_formed() {
            return false;
        }
        for atom in rule.body.iter().chain(rule.head.iter()) {
            match self.catalog.relation(&atom.relation) {
                Some(relation) if relation.arity() == atom.arity() => {}
                _ => return false,
            }
        }
        self.seen.insert(fingerprint(rule))
    }
}

/// A validated rule retained by the sink
#[derive(Debug, Clone)]
pub struct AcceptedRule {
    /// The rule itself
    pub rule: Rule,
    /// Canonical key
    pub fingerprint: Fingerprint,
    /// Body witnesses satisfying the head
    pub support: u64,
    /// `support / body_support`
    pub confidence: f64,
}

impl AcceptedRule {
    fn rank(&self, other: &AcceptedRule) -> Ordering {
        other
            .confidence
            .partial_cmp(&self.confidence)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.support.cmp(&self.support))
            .then_with(|| self.rule.atom_count().cmp(&other.rule.atom_count()))
            .then_with(|| self.fingerprint.cmp(&other.fingerprint))
    }
}

/// Deduplicating, ranked store of accepted rules
pub struct RuleSink {
    accepted: BTreeMap<Fingerprint, AcceptedRule>,
    top_k: usize,
}

impl RuleSink {
    /// Create a sink holding at most `top_k` rules (0 = unbounded)
    pub fn new(top_k: usize) -> Self {
        RuleSink {
            accepted: BTreeMap::new(),
            top_k,
        }
    }

    /// Number of retained rules
    pub fn len(&self) -> usize {
        self.accepted.len()
    }

    /// Whether the sink is empty
    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }

    /// Offer a validated rule. Returns true when the rule is retained.
    pub fn accept(&mut self, rule: Rule, verdict: &Verdict) -> bool {
        let key = fingerprint(&rule);
        if self.accepted.contains_key(&key) {
            return false;
        }
        if self.accepted.values().any(|a| subsumes(&a.rule, &rule)) {
            debug!(rule = %rule, "dropped: subsumed by an accepted rule");
            return false;
        }
        let evicted: Vec<Fingerprint> = self
            .accepted
            .values()
            .filter(|a| subsumes(&rule, &a.rule))
            .map(|a| a.fingerprint.clone())
            .collect();
        for fp in &evicted {
            self.accepted.remove(fp);
        }
        if !evicted.is_empty() {
            debug!(count = evicted.len(), "evicted rules subsumed by newcomer");
        }

        self.accepted.insert(
            key.clone(),
            AcceptedRule {
                rule,
                fingerprint: key,
                support: verdict.support,
                confidence: verdict.confidence,
            },
        );
        if self.top_k > 0 && self.accepted.len() > self.top_k {
            // Drop the worst-ranked rule to stay within capacity.
            if let Some(worst) = self
                .accepted
                .values()
                .max_by(|a, b| a.rank(b))
                .map(|a| a.fingerprint.clone())
            {
                self.accepted.remove(&worst);
            }
        }
        true
    }

    /// Retained rules in rank order
    pub fn ranked(&self) -> Vec<&AcceptedRule> {
        let mut out: Vec<&AcceptedRule> = self.accepted.values().collect();
        out.sort_by(|a, b| a.rank(b));
        out
    }

    /// Consume the sink, returning rules in rank order
    pub fn into_ranked(self) -> Vec<AcceptedRule> {
        let mut out: Vec<AcceptedRule> = self.accepted.into_values().collect();
        out.sort_by(|a, b| a.rank(b));
        out
    }
}
