//! Rule subsumption up to variable renaming
//!
//! `r1` subsumes `r2` when some variable renaming maps `r1`'s head onto
//! `r2`'s head exactly and `r1`'s body atoms into `r2`'s body (making
//! `r2`'s body a super-multiset). The subsumer constrains fewer witnesses,
//! so it is the more general statement and wins deduplication.

use std::collections::HashMap;

use super::types::{Atom, Rule, Term, Var};

/// Check whether `general` subsumes `specific`
pub fn subsumes(general: &Rule, specific: &Rule) -> bool {
    if general.body.len() > specific.body.len() || general.head.len() != specific.head.len() {
        return false;
    }
    let mut mapping: HashMap<Var, Var> = HashMap::new();
    let mut used_head = vec![false; specific.head.len()];
    match_atoms(
        &general.head,
        0,
        &specific.head,
        &mut used_head,
        false,
        &mut mapping,
        &mut |mapping| {
            let mut used_body = vec![false; specific.body.len()];
            match_atoms(
                &general.body,
                0,
                &specific.body,
                &mut used_body,
                true,
                mapping,
                &mut |_| true,
            )
        },
    )
}

/// Backtracking injective match of `general[from..]` into `specific`,
/// invoking `cont` once all atoms are placed
fn match_atoms(
    general: &[Atom],
    from: usize,
    specific: &[Atom],
    used: &mut [bool],
    anon_wild: bool,
    mapping: &mut HashMap<Var, Var>,
    cont: &mut dyn FnMut(&mut HashMap<Var, Var>) -> bool,
) -> bool {
    if from == general.len() {
        return cont(mapping);
    }
    for i in 0..specific.len() {
        if used[i] {
            continue;
        }
        if let Some(added) = atom_bindings(&general[from], &specific[i], anon_wild, mapping) {
            used[i] = true;
            for (g, s) in &added {
                mapping.insert(*g, *s);
            }
            if match_atoms(general, from + 1, specific, used, anon_wild, mapping, cont) {
                return true;
            }
            for (g, _) in &added {
                mapping.remove(g);
            }
            used[i] = false;
        }
    }
    false
}

/// Bindings required to map atom `g` onto atom `s`, or None if impossible
/// under the current mapping. With `anon_wild`, an anonymous term of `g`
/// matches any term of `s`; otherwise anonymity must agree.
fn atom_bindings(
    g: &Atom,
    s: &Atom,
    anon_wild: bool,
    mapping: &HashMap<Var, Var>,
) -> Option<Vec<(Var, Var)>> {
    if g.relation != s.relation || g.arity() != s.arity() {
        return None;
    }
    let mut added: Vec<(Var, Var)> = Vec::new();
    for (gt, st) in g.terms.iter().zip(&s.terms) {
        match (gt, st) {
            (Term::Anonymous, _) if anon_wild => {}
            (Term::Anonymous, Term::Anonymous) => {}
            (Term::Anonymous, Term::Var(_)) => return None,
            (Term::Var(_), Term::Anonymous) => return None,
            (Term::Var(gv), Term::Var(sv)) => {
                let bound = mapping
                    .get(gv)
                    .copied()
                    .or_else(|| added.iter().find(|(v, _)| v == gv).map(|(_, t)| *t));
                match bound {
                    Some(target) if target == *sv => {}
                    Some(_) => return None,
                    None => added.push((*gv, *sv)),
                }
            }
        }
    }
    Some(added)
}
