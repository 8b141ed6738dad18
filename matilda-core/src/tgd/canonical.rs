//! Canonical rule fingerprints
//!
//! A fingerprint is a canonical string form of a rule, invariant under
//! variable renaming and atom reordering. Two rules with equal fingerprints
//! are isomorphic and collapse to one candidate.
//!
//! Atom order and variable names are both free, so the canonical form is
//! the lexicographic minimum over admissible atom orderings of the rendering
//! where variables are renumbered by first occurrence. Orderings are
//! constrained to respect the `(relation, arity)` sort, which caps the
//! permutation search at the largest run of same-relation atoms; rule sizes
//! are bounded by `max_table`, so the search stays tiny.

use std::collections::HashMap;
use std::fmt;

use super::types::{Atom, Rule, Term, Var};

/// Canonical hashable key for a rule, invariant under variable renaming
/// and atom reordering
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// The canonical rendering backing this fingerprint
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fingerprint of a complete rule
pub fn fingerprint(rule: &Rule) -> Fingerprint {
    Fingerprint(canonical_render(&rule.body, &rule.head))
}

/// Fingerprint of a partial chain, used by the enumerator to collapse
/// isomorphic DFS prefixes.
///
/// The most recently added atom stays distinguished: it is the pending
/// head, and chains differing only in which atom was added last close to
/// different candidates. Earlier atoms are an unordered multiset.
pub fn prefix_fingerprint(atoms: &[Atom]) -> Fingerprint {
    match atoms.split_last() {
        Some((tip, rest)) => Fingerprint(canonical_render(rest, std::slice::from_ref(tip))),
        None => Fingerprint(String::new()),
    }
}

/// Minimum rendering over admissible orderings of body and head atoms
fn canonical_render(body: &[Atom], head: &[Atom]) -> String {
    let mut best: Option<String> = None;
    let body_orders = orderings(body);
    let head_orders = orderings(head);
    for body_order in &body_orders {
        for head_order in &head_orders {
            let rendered = render(body, body_order, head, head_order);
            match &best {
                Some(current) if *current <= rendered => {}
                _ => best = Some(rendered),
            }
        }
    }
    best.unwrap_or_default()
}

/// Render one ordering with variables renumbered by first occurrence
fn render(body: &[Atom], body_order: &[usize], head: &[Atom], head_order: &[usize]) -> String {
    let mut numbering: HashMap<Var, usize> = HashMap::new();
    let mut next = 0usize;
    let mut out = String::new();

    let mut push_atom = |atom: &Atom, out: &mut String| {
        out.push_str(&atom.relation);
        out.push('(');
        for (i, term) in atom.terms.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            match term {
                Term::Anonymous => out.push('_'),
                Term::Var(v) => {
                    let idx = *numbering.entry(*v).or_insert_with(|| {
                        let idx = next;
                        next += 1;
                        idx
                    });
                    out.push_str(&idx.to_string());
                }
            }
        }
        out.push(')');
    };

    for (i, &idx) in body_order.iter().enumerate() {
        if i > 0 {
            out.push('&');
        }
        push_atom(&body[idx], &mut out);
    }
    out.push_str("=>");
    for (i, &idx) in head_order.iter().enumerate() {
        if i > 0 {
            out.push('&');
        }
        push_atom(&head[idx], &mut out);
    }
    out
}

/// All atom orderings consistent with the `(relation, arity)` sort:
/// runs of equal keys are permuted, cross-run order is fixed
fn orderings(atoms: &[Atom]) -> Vec<Vec<usize>> {
    let mut sorted: Vec<usize> = (0..atoms.len()).collect();
    sorted.sort_by(|&a, &b| {
        (atoms[a].relation.as_ref(), atoms[a].arity())
            .cmp(&(atoms[b].relation.as_ref(), atoms[b].arity()))
    });

    // Split into runs of identical (relation, arity).
    let mut runs: Vec<Vec<usize>> = Vec::new();
    for &idx in &sorted {
        let key = (atoms[idx].relation.as_ref(), atoms[idx].arity());
        let same_run = runs
            .last()
            .is_some_and(|run| (atoms[run[0]].relation.as_ref(), atoms[run[0]].arity()) == key);
        if same_run {
            runs.last_mut().unwrap().push(idx);
        } else {
            runs.push(vec![idx]);
        }
    }

    let mut result: Vec<Vec<usize>> = vec![Vec::new()];
    for run in runs {
        let perms = permutations(&run);
        let mut extended = Vec::with_capacity(result.len() * perms.len());
        for prefix in &result {
            for perm in &perms {
                let mut next = prefix.clone();
                next.extend_from_slice(perm);
                extended.push(next);
            }
        }
        result = extended;
    }
    result
}

/// All permutations of a small index slice
fn permutations(items: &[usize]) -> Vec<Vec<usize>> {
    if items.len() <= 1 {
        return vec![items.to_vec()];
    }
    let mut out = Vec::new();
    for (i, &first) in items.iter().enumerate() {
        let mut rest = items.to_vec();
        rest.remove(i);
        for mut tail in permutations(&rest) {
            tail.insert(0, first);
            out.push(tail);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tgd::types::{Atom, Rule, Term};

    fn rule(body: Vec<Atom>, head: Vec<Atom>) -> Rule {
        Rule::new(body, head)
    }

    #[test]
    fn test_fingerprint_invariant_under_renaming() {
        let r1 = rule(
            vec![Atom::new("r", vec![Term::var(0), Term::var(1)])],
            vec![Atom::new("s", vec![Term::var(1), Term::var(2)])],
        );
        let r2 = rule(
            vec![Atom::new("r", vec![Term::var(7), Term::var(3)])],
            vec![Atom::new("s", vec![Term::var(3), Term::var(9)])],
        );
        assert_eq!(fingerprint(&r1), fingerprint(&r2));
    }

    #[test]
    fn test_fingerprint_invariant_under_body_reorder() {
        let r1 = rule(
            vec![
                Atom::new("a", vec![Term::var(0)]),
                Atom::new("b", vec![Term::var(0), Term::var(1)]),
            ],
            vec![Atom::new("c", vec![Term::var(1)])],
        );
        let r2 = rule(
            vec![
                Atom::new("b", vec![Term::var(0), Term::var(1)]),
                Atom::new("a", vec![Term::var(0)]),
            ],
            vec![Atom::new("c", vec![Term::var(1)])],
        );
        assert_eq!(fingerprint(&r1), fingerprint(&r2));
    }

    #[test]
    fn test_fingerprint_same_relation_twice() {
        // Two body atoms over the same relation in both orders.
        let r1 = rule(
            vec![
                Atom::new("e", vec![Term::var(0), Term::var(1)]),
                Atom::new("e", vec![Term::var(1), Term::var(2)]),
            ],
            vec![Atom::new("e", vec![Term::var(0), Term::var(2)])],
        );
        let r2 = rule(
            vec![
                Atom::new("e", vec![Term::var(4), Term::var(2)]),
                Atom::new("e", vec![Term::var(2), Term::var(0)]),
            ],
            vec![Atom::new("e", vec![Term::var(2), Term::var(0)])],
        );
        // r2's first body atom corresponds to r1's second; their heads differ
        // in which endpoints they connect, so these are NOT isomorphic.
        assert_ne!(fingerprint(&r1), fingerprint(&r2));

        let r3 = rule(
            vec![
                Atom::new("e", vec![Term::var(8), Term::var(5)]),
                Atom::new("e", vec![Term::var(5), Term::var(3)]),
            ],
            vec![Atom::new("e", vec![Term::var(8), Term::var(3)])],
        );
        assert_eq!(fingerprint(&r1), fingerprint(&r3));
    }

    #[test]
    fn test_distinct_shapes_do_not_collide() {
        let r1 = rule(
            vec![Atom::new("r", vec![Term::var(0), Term::var(1)])],
            vec![Atom::new("s", vec![Term::var(0), Term::var(1)])],
        );
        let r2 = rule(
            vec![Atom::new("r", vec![Term::var(0), Term::var(0)])],
            vec![Atom::new("s", vec![Term::var(0), Term::var(1)])],
        );
        assert_ne!(fingerprint(&r1), fingerprint(&r2));
    }

    #[test]
    fn test_prefix_fingerprint_distinguishes_tip() {
        // The pending head differs, so these prefixes must not collapse.
        let a = Atom::new("r", vec![Term::var(0), Term::var(1)]);
        let b = Atom::new("s", vec![Term::var(1), Term::var(2)]);
        assert_ne!(
            prefix_fingerprint(&[a.clone(), b.clone()]),
            prefix_fingerprint(&[b, a])
        );
    }

    #[test]
    fn test_prefix_fingerprint_collapses_isomorphic_bodies() {
        let a = Atom::new("r", vec![Term::var(0), Term::var(1)]);
        let b = Atom::new("s", vec![Term::var(1), Term::var(2)]);
        let c = Atom::new("t", vec![Term::var(2)]);
        // Same unordered body, same tip.
        assert_eq!(
            prefix_fingerprint(&[a.clone(), b.clone(), c.clone()]),
            prefix_fingerprint(&[b.clone(), a.clone(), c.clone()])
        );
        // Renamed variables collapse too.
        let a2 = Atom::new("r", vec![Term::var(5), Term::var(6)]);
        let b2 = Atom::new("s", vec![Term::var(6), Term::var(9)]);
        let c2 = Atom::new("t", vec![Term::var(9)]);
        assert_eq!(
            prefix_fingerprint(&[a, b, c]),
            prefix_fingerprint(&[a2, b2, c2])
        );
    }
}
