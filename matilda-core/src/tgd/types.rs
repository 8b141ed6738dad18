//! Core TGD data structures
//!
//! This module defines the fundamental types for candidate
//! tuple-generating dependencies:
//! - Terms (variables and anonymous positions)
//! - Atoms (a relation applied to a term vector)
//! - Rules (body implies existentially quantified head)
//!
//! Design principles:
//! - Closed sum types, no runtime type tags
//! - Arc-based relation names for cheap candidate cloning
//! - Rule-scoped variable identifiers

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// A rule-scoped variable identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Var(pub u32);

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// A term in a TGD atom (variable or anonymous position)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Term {
    /// Named variable shared across positions
    Var(Var),
    /// Anonymous "don't care" position, never shared
    Anonymous,
}

impl Term {
    /// Create a variable term
    pub fn var(id: u32) -> Self {
        Term::Var(Var(id))
    }

    /// Check if term is a variable
    pub fn is_variable(&self) -> bool {
        matches!(self, Term::Var(_))
    }

    /// Get the variable if this is one
    pub fn as_var(&self) -> Option<Var> {
        match self {
            Term::Var(v) => Some(*v),
            Term::Anonymous => None,
        }
    }
}

/// An atom: a relation applied to a vector of terms
///
/// Polarity is always positive; the term vector length must equal the
/// relation arity for the atom to be well-formed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Atom {
    /// Relation name
    pub relation: Arc<str>,
    /// Terms, one per column
    pub terms: Vec<Term>,
}

impl Atom {
    /// Create a new atom
    pub fn new(relation: impl Into<String>, terms: Vec<Term>) -> Self {
        Atom {
            relation: Arc::from(relation.into().into_boxed_str()),
            terms,
        }
    }

    /// Get the arity (number of terms)
    pub fn arity(&self) -> usize {
        self.terms.len()
    }

    /// Variables of this atom with their positions
    pub fn variable_positions(&self) -> impl Iterator<Item = (usize, Var)> + '_ {
        self.terms
            .iter()
            .enumerate()
            .filter_map(|(i, t)| t.as_var().map(|v| (i, v)))
    }

    /// All distinct variables of this atom
    pub fn variables(&self) -> BTreeSet<Var> {
        self.terms.iter().filter_map(|t| t.as_var()).collect()
    }
}

/// A candidate TGD: body atoms imply existentially quantified head atoms
///
/// Invariants:
/// - body and head are non-empty
/// - every head variable appears in the body unless listed in `existentials`
/// - every named variable occurs in at least two positions, or is an
///   existential of the head
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Body atoms (conjunction)
    pub body: Vec<Atom>,
    /// Head atoms (conjunction)
    pub head: Vec<Atom>,
    /// Head variables with no body occurrence
    pub existentials: BTreeSet<Var>,
}

/// Display-name alphabet for canonical variable indices
const VAR_NAMES: [&str; 14] = [
    "x", "y", "z", "w", "u", "v", "s", "t", "p", "q", "r", "m", "n", "o",
];

/// Human-readable name for the i-th variable of a rule
pub fn var_name(index: usize) -> String {
    match VAR_NAMES.get(index) {
        Some(name) => (*name).to_string(),
        None => format!("v{}", index),
    }
}

impl Rule {
    /// Create a new rule; existentials are derived as the head variables
    /// absent from the body
    pub fn new(body: Vec<Atom>, head: Vec<Atom>) -> Self {
        let body_vars: BTreeSet<Var> = body.iter().flat_map(|a| a.variables()).collect();
        let existentials = head
            .iter()
            .flat_map(|a| a.variables())
            .filter(|v| !body_vars.contains(v))
            .collect();
        Rule {
            body,
            head,
            existentials,
        }
    }

    /// Total number of atoms (body + head)
    pub fn atom_count(&self) -> usize {
        self.body.len() + self.head.len()
    }

    /// All distinct named variables
    pub fn variables(&self) -> BTreeSet<Var> {
        self.body
            .iter()
            .chain(self.head.iter())
            .flat_map(|a| a.variables())
            .collect()
    }

    /// Distinct variables of the body alone
    pub fn body_variables(&self) -> BTreeSet<Var> {
        self.body.iter().flat_map(|a| a.variables()).collect()
    }

    /// Variables shared between body and head
    pub fn frontier_variables(&self) -> BTreeSet<Var> {
        let body = self.body_variables();
        self.head
            .iter()
            .flat_map(|a| a.variables())
            .filter(|v| body.contains(v))
            .collect()
    }

    /// Check the structural invariants of a candidate TGD
    pub fn is_well_formed(&self) -> bool {
        if self.body.is_empty() || self.head.is_empty() {
            return false;
        }
        let body_vars = self.body_variables();
        // Head variables are either frontier or declared existential.
        for atom in &self.head {
            for v in atom.variables() {
                if !body_vars.contains(&v) && !self.existentials.contains(&v) {
                    return false;
                }
            }
        }
        // Existentials must not leak into the body.
        if self.existentials.iter().any(|v| body_vars.contains(v)) {
            return false;
        }
        // Named variables occur at least twice, or are existential.
        let mut occurrences: std::collections::HashMap<Var, usize> =
            std::collections::HashMap::new();
        for atom in self.body.iter().chain(self.head.iter()) {
            for (_, v) in atom.variable_positions() {
                *occurrences.entry(v).or_insert(0) += 1;
            }
        }
        occurrences
            .iter()
            .all(|(v, n)| *n >= 2 || self.existentials.contains(v))
    }

    /// Assign display names to variables in first-occurrence order
    /// (body first, then head)
    fn display_names(&self) -> std::collections::HashMap<Var, String> {
        let mut names = std::collections::HashMap::new();
        let mut next = 0usize;
        for atom in self.body.iter().chain(self.head.iter()) {
            for (_, v) in atom.variable_positions() {
                names.entry(v).or_insert_with(|| {
                    let name = var_name(next);
                    next += 1;
                    name
                });
            }
        }
        names
    }

    fn render_atom(atom: &Atom, names: &std::collections::HashMap<Var, String>) -> String {
        let terms: Vec<String> = atom
            .terms
            .iter()
            .map(|t| match t {
                Term::Var(v) => names[v].clone(),
                Term::Anonymous => "_".to_string(),
            })
            .collect();
        format!("{}({})", atom.relation, terms.join(", "))
    }

    /// Body atoms rendered with the rule's display names
    pub fn body_strings(&self) -> Vec<String> {
        let names = self.display_names();
        self.body
            .iter()
            .map(|a| Self::render_atom(a, &names))
            .collect()
    }

    /// Head atoms rendered with the rule's display names
    pub fn head_strings(&self) -> Vec<String> {
        let names = self.display_names();
        self.head
            .iter()
            .map(|a| Self::render_atom(a, &names))
            .collect()
    }

    /// The full logical form, e.g. `R1(x, y) ∧ R2(y, _, z) → ∃w. R3(z, w)`
    pub fn tgd_string(&self) -> String {
        let names = self.display_names();
        let body = self
            .body
            .iter()
            .map(|a| Self::render_atom(a, &names))
            .collect::<Vec<_>>()
            .join(" ∧ ");
        let head = self
            .head
            .iter()
            .map(|a| Self::render_atom(a, &names))
            .collect::<Vec<_>>()
            .join(" ∧ ");
        if self.existentials.is_empty() {
            format!("{} → {}", body, head)
        } else {
            // Existentials listed in head first-occurrence order.
            let mut listed = Vec::new();
            for atom in &self.head {
                for (_, v) in atom.variable_positions() {
                    if self.existentials.contains(&v) && !listed.contains(&v) {
                        listed.push(v);
                    }
                }
            }
            let quantified = listed
                .iter()
                .map(|v| names[v].clone())
                .collect::<Vec<_>>()
                .join(",");
            format!("{} → ∃{}. {}", body, quantified, head)
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tgd_string())
    }
}
