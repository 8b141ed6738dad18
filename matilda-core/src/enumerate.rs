//! Candidate rule enumeration
//!
//! Produces a lazy sequence of candidate TGDs by a bounded depth-first
//! walk over the constraint graph:
//!
//! 1. Seed a singleton chain per relation (deterministic catalog order).
//! 2. Extend a chain by picking a variable occurrence and following a
//!    constraint-graph edge from its column to a compatible column of the
//!    next relation, which joins the fresh atom on that variable.
//! 3. Close every chain of length ≥ 2 into a candidate: the most recently
//!    added atom becomes the head, earlier atoms the body, body-only
//!    singleton variables become anonymous, and fresh head variables
//!    become existentials.
//!
//! Enumeration order is fully determined by relation order, neighbor
//! order, and DFS, so the candidate stream is reproducible. The working
//! set stays bounded at O(depth) because candidates are pulled one at a
//! time.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use ahash::RandomState;
use tracing::trace;

use crate::catalog::Catalog;
use crate::graph::ConstraintGraph;
use crate::monitor::Monitor;
use crate::tgd::{prefix_fingerprint, Atom, Fingerprint, Rule, Term, Var};

/// Which relations seed the search
#[derive(Debug, Clone, Default)]
pub enum SeedPolicy {
    /// Every catalog relation seeds a chain
    #[default]
    AllRelations,
    /// Only the listed relations seed chains
    Relations(Vec<String>),
}

/// Search bounds for the enumerator
#[derive(Debug, Clone, Copy)]
pub struct EnumeratorLimits {
    /// Maximum atoms per rule (body + head)
    pub max_table: usize,
    /// Maximum distinct named variables per rule
    pub max_vars: usize,
}

/// A partial join chain during DFS
struct Chain {
    atoms: Vec<Atom>,
    next_var: u32,
}

/// Lazy, deterministic candidate stream
pub struct CandidateEnumerator<'a> {
    catalog: &'a Catalog,
    graph: &'a ConstraintGraph,
    limits: EnumeratorLimits,
    monitor: Arc<Monitor>,
    stack: Vec<Chain>,
    seen_prefixes: HashSet<Fingerprint, RandomState>,
}

impl<'a> CandidateEnumerator<'a> {
    /// Create an enumerator seeded per the given policy
    pub fn new(
        catalog: &'a Catalog,
        graph: &'a ConstraintGraph,
        limits: EnumeratorLimits,
        seed_policy: SeedPolicy,
        monitor: Arc<Monitor>,
    ) -> Self {
        let mut seen_prefixes = HashSet::with_hasher(RandomState::new());
        let mut seeds: Vec<Chain> = Vec::new();
        for relation in catalog.relations() {
            let selected = match &seed_policy {
                SeedPolicy::AllRelations => true,
                SeedPolicy::Relations(names) => names.iter().any(|n| n == &relation.name),
            };
            if !selected {
                continue;
            }
            let terms: Vec<Term> = (0..relation.arity() as u32).map(Term::var).collect();
            let atoms = vec![Atom::new(relation.name.clone(), terms)];
            seen_prefixes.insert(prefix_fingerprint(&atoms));
            seeds.push(Chain {
                atoms,
                next_var: relation.arity() as u32,
            });
        }
        // LIFO stack: reverse so the first relation is explored first.
        seeds.reverse();
        CandidateEnumerator {
            catalog,
            graph,
            limits,
            monitor,
            stack: seeds,
            seen_prefixes,
        }
    }

    /// Variables occurring at least twice across the chain; these survive
    /// anonymization no matter how the chain is closed
    fn shared_var_count(atoms: &[Atom]) -> usize {
        let mut occurrences: HashMap<Var, usize> = HashMap::new();
        for atom in atoms {
            for (_, v) in atom.variable_positions() {
                *occurrences.entry(v).or_insert(0) += 1;
            }
        }
        occurrences.values().filter(|&&n| n >= 2).count()
    }

    /// All one-step extensions of a chain, in deterministic order
    fn extensions(&mut self, chain: &Chain) -> Vec<Chain> {
        let mut out = Vec::new();
        for atom in &chain.atoms {
            for (pos, var) in atom.variable_positions() {
                for (neighbor, weight) in self.graph.neighbors(&atom.relation, pos) {
                    let Some(relation) = self.catalog.relation(&neighbor.relation) else {
                        continue;
                    };
                    let mut next_var = chain.next_var;
                    let terms: Vec<Term> = (0..relation.arity())
                        .map(|i| {
                            if i == neighbor.column {
                                Term::Var(var)
                            } else {
                                let term = Term::var(next_var);
                                next_var += 1;
                                term
                            }
                        })
                        .collect();
                    let mut atoms = chain.atoms.clone();
                    atoms.push(Atom {
                        relation: Arc::clone(&neighbor.relation),
                        terms,
                    });

                    if Self::shared_var_count(&atoms) > self.limits.max_vars {
                        continue;
                    }
                    // Collapse isomorphic DFS prefixes.
                    if !self.seen_prefixes.insert(prefix_fingerprint(&atoms)) {
                        continue;
                    }
                    trace!(len = atoms.len(), weight, "chain extended");
                    out.push(Chain { atoms, next_var });
                }
            }
        }
        out
    }

    /// Close a chain: last atom becomes the head, the rest the body
    fn close(&self, chain: &Chain) -> Option<Rule> {
        let (head_atom, body_atoms) = chain.atoms.split_last()?;
        if body_atoms.is_empty() {
            return None;
        }

        let mut occurrences: HashMap<Var, usize> = HashMap::new();
        for atom in &chain.atoms {
            for (_, v) in atom.variable_positions() {
                *occurrences.entry(v).or_insert(0) += 1;
            }
        }

        // Body-only singletons carry no constraint; rewrite them to `_`.
        let body: Vec<Atom> = body_atoms
            .iter()
            .map(|atom| Atom {
                relation: Arc::clone(&atom.relation),
                terms: atom
                    .terms
                    .iter()
                    .map(|term| match term {
                        Term::Var(v) if occurrences[v] == 1 => Term::Anonymous,
                        other => *other,
                    })
                    .collect(),
            })
            .collect();

        let rule = Rule::new(body, vec![head_atom.clone()]);
        if rule.variables().len() > self.limits.max_vars {
            return None;
        }
        if Self::is_trivial(&rule) {
            return None;
        }
        Some(rule)
    }

    /// A candidate is a tautology when its head imposes no variable
    /// constraint beyond what some body atom already states
    fn is_trivial(rule: &Rule) -> bool {
        rule.head.iter().all(|head| {
            rule.body.iter().any(|body| {
                head.relation == body.relation
                    && head.arity() == body.arity()
                    && head.terms.iter().zip(&body.terms).all(|(ht, bt)| match ht {
                        Term::Anonymous => true,
                        Term::Var(v) if rule.existentials.contains(v) => true,
                        Term::Var(_) => ht == bt,
                    })
            })
        })
    }
}

impl Iterator for CandidateEnumerator<'_> {
    type Item = Rule;

    fn next(&mut self) -> Option<Rule> {
        loop {
            if self.monitor.is_cancelled() {
                return None;
            }
            let chain = self.stack.pop()?;

            // Children first onto the stack (reversed for in-order DFS),
            // then the chain's own candidate is emitted.
            if chain.atoms.len() < self.limits.max_table {
                let mut children = self.extensions(&chain);
                children.reverse();
                self.stack.append(&mut children);
            }
            if chain.atoms.len() >= 2 {
                if let Some(rule) = self.close(&chain) {
                    return Some(rule);
                }
            }
        }
    }
}
