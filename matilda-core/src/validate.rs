//! Candidate validation: SQL compilation and support/confidence counting
//!
//! A candidate compiles to two aggregate queries:
//!
//! - **body support**: `SELECT COUNT(*)` over the DISTINCT projection of
//!   every body column under the body's equi-joins;
//! - **support**: the same projection additionally filtered by a
//!   correlated `EXISTS` for the head, with frontier variables joined to
//!   their body columns and existential positions unconstrained.
//!
//! `confidence = support / body_support`. When the body support is below
//! the floor the confidence query is skipped outright. Counts are memoized
//! in a bounded cache keyed by the compiled SQL text; the cache only saves
//! cost and never affects candidate ordering.

use std::collections::HashMap;
use std::sync::Arc;

use moka::sync::Cache;
use tracing::debug;

use crate::catalog::Catalog;
use crate::error::{CancelReason, MatildaError, QueryErrorKind, Result};
use crate::monitor::Monitor;
use crate::query::{quote_ident, QueryEngine};
use crate::tgd::{Rule, Var};

/// Tolerance for confidence comparisons
pub const CONFIDENCE_EPSILON: f64 = 1e-9;

/// Bounded cache capacity for memoized counts
const CACHE_CAPACITY: u64 = 10_000;

/// Consecutive query timeouts tolerated before escalating to cancel
const TIMEOUT_ESCALATION: u32 = 3;

/// Validation thresholds
#[derive(Debug, Clone, Copy)]
pub struct ValidatorConfig {
    /// Minimum support; 0 means no floor beyond support ≥ 1
    pub nb_occurrence: u64,
    /// Minimum confidence in [0, 1]
    pub confidence_threshold: f64,
}

/// Measured outcome for one candidate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    /// Whether the candidate clears both thresholds
    pub valid: bool,
    /// Body witnesses that also satisfy the head
    pub support: u64,
    /// Distinct body witnesses
    pub body_support: u64,
    /// `support / body_support`, 0 when the body is empty
    pub confidence: f64,
}

/// Evaluates candidates against the database
pub struct TgdValidator<'a, E: QueryEngine> {
    engine: &'a E,
    catalog: &'a Catalog,
    config: ValidatorConfig,
    monitor: Arc<Monitor>,
    cache: Cache<String, u64>,
    consecutive_timeouts: u32,
}

impl<'a, E: QueryEngine> TgdValidator<'a, E> {
    /// Create a validator over the given engine and catalog
    pub fn new(
        engine: &'a E,
        catalog: &'a Catalog,
        config: ValidatorConfig,
        monitor: Arc<Monitor>,
    ) -> Self {
        TgdValidator {
            engine,
            catalog,
            config,
            monitor,
            cache: Cache::new(CACHE_CAPACITY),
            consecutive_timeouts: 0,
        }
    }

    /// Measure support and confidence of a candidate
    pub fn validate(&mut self, rule: &Rule) -> Result<Verdict> {
        if let Some(reason) = self.monitor.cancel_reason() {
            return Err(MatildaError::Cancelled(reason));
        }

        let floor = self.config.nb_occurrence.max(1);
        let body_sql = compile_body(self.catalog, rule)?;
        let body_support = self.counted(&body_sql)?;
        if body_support < floor {
            // Support can only shrink under the head filter.
            return Ok(Verdict {
                valid: false,
                support: 0,
                body_support,
                confidence: 0.0,
            });
        }

        let both_sql = compile_body_and_head(self.catalog, rule)?;
        let support = self.counted(&both_sql)?;
        let confidence = support as f64 / body_support as f64;
        let valid = support >= floor
            && confidence + CONFIDENCE_EPSILON >= self.config.confidence_threshold;
        debug!(support, body_support, confidence, valid, rule = %rule, "validated");
        Ok(Verdict {
            valid,
            support,
            body_support,
            confidence,
        })
    }

    /// Memoized count with consecutive-timeout escalation
    fn counted(&mut self, sql: &str) -> Result<u64> {
        if let Some(n) = self.cache.get(sql) {
            return Ok(n);
        }
        match self.engine.count(sql, &[]) {
            Ok(n) => {
                self.consecutive_timeouts = 0;
                self.cache.insert(sql.to_string(), n);
                Ok(n)
            }
            Err(MatildaError::Query {
                kind: QueryErrorKind::Timeout,
                context,
            }) => {
                self.consecutive_timeouts += 1;
                if self.consecutive_timeouts >= TIMEOUT_ESCALATION {
                    self.monitor.cancel(CancelReason::QueryTimeouts);
                }
                Err(MatildaError::Query {
                    kind: QueryErrorKind::Timeout,
                    context,
                })
            }
            Err(other) => Err(other),
        }
    }
}

/// Per-atom table aliases and join predicates for a body
struct BodyPlan {
    from: Vec<String>,
    select: Vec<String>,
    predicates: Vec<String>,
    /// First body occurrence of each variable: `(alias index, column name)`
    occurrence: HashMap<Var, (usize, String)>,
}

fn plan_body(catalog: &Catalog, rule: &Rule) -> Result<BodyPlan> {
    let mut plan = BodyPlan {
        from: Vec::new(),
        select: Vec::new(),
        predicates: Vec::new(),
        occurrence: HashMap::new(),
    };
    for (i, atom) in rule.body.iter().enumerate() {
        let relation = catalog.relation(&atom.relation).ok_or_else(|| {
            MatildaError::Invariant(format!("unknown relation in candidate: {}", atom.relation))
        })?;
        if relation.arity() != atom.arity() {
            return Err(MatildaError::Invariant(format!(
                "arity mismatch for {}: atom has {}, relation has {}",
                atom.relation,
                atom.arity(),
                relation.arity()
            )));
        }
        plan.from
            .push(format!("{} AS t{}", quote_ident(&relation.name), i));
        for (j, column) in relation.columns.iter().enumerate() {
            plan.select
                .push(format!("t{}.{} AS c{}_{}", i, quote_ident(&column.name), i, j));
        }
        for (j, v) in atom.variable_positions() {
            let column = quote_ident(&relation.columns[j].name);
            match plan.occurrence.get(&v) {
                Some((first_alias, first_column)) => plan.predicates.push(format!(
                    "t{}.{} = t{}.{}",
                    i, column, first_alias, first_column
                )),
                None => {
                    plan.occurrence.insert(v, (i, column));
                }
            }
        }
    }
    Ok(plan)
}

/// Correlated `EXISTS` subquery for the head
fn plan_head(catalog: &Catalog, rule: &Rule, body: &BodyPlan) -> Result<String> {
    let mut from: Vec<String> = Vec::new();
    let mut predicates: Vec<String> = Vec::new();
    let mut head_occurrence: HashMap<Var, (usize, String)> = HashMap::new();
    for (k, atom) in rule.head.iter().enumerate() {
        let relation = catalog.relation(&atom.relation).ok_or_else(|| {
            MatildaError::Invariant(format!("unknown relation in candidate: {}", atom.relation))
        })?;
        from.push(format!("{} AS h{}", quote_ident(&relation.name), k));
        for (j, v) in atom.variable_positions() {
            let column = quote_ident(&relation.columns[j].name);
            if let Some((alias, body_column)) = body.occurrence.get(&v) {
                predicates.push(format!("h{}.{} = t{}.{}", k, column, alias, body_column));
            } else {
                // Existential: constrain only repeated occurrences within
                // the head itself.
                match head_occurrence.get(&v) {
                    Some((first_alias, first_column)) => predicates.push(format!(
                        "h{}.{} = h{}.{}",
                        k, column, first_alias, first_column
                    )),
                    None => {
                        head_occurrence.insert(v, (k, column));
                    }
                }
            }
        }
    }
    if predicates.is_empty() {
        Ok(format!("EXISTS (SELECT 1 FROM {})", from.join(", ")))
    } else {
        Ok(format!(
            "EXISTS (SELECT 1 FROM {} WHERE {})",
            from.join(", "),
            predicates.join(" AND ")
        ))
    }
}

/// SQL counting distinct body witnesses
pub fn compile_body(catalog: &Catalog, rule: &Rule) -> Result<String> {
    let plan = plan_body(catalog, rule)?;
    let mut inner = format!(
        "SELECT DISTINCT {} FROM {}",
        plan.select.join(", "),
        plan.from.join(", ")
    );
    if !plan.predicates.is_empty() {
        inner.push_str(" WHERE ");
        inner.push_str(&plan.predicates.join(" AND "));
    }
    Ok(format!("SELECT COUNT(*) FROM ({})", inner))
}

/// SQL counting distinct body witnesses that also satisfy the head
pub fn compile_body_and_head(catalog: &Catalog, rule: &Rule) -> Result<String> {
    let plan = plan_body(catalog, rule)?;
    let exists = plan_head(catalog, rule, &plan)?;
    let mut conditions = plan.predicates.clone();
    conditions.push(exists);
    Ok(format!(
        "SELECT COUNT(*) FROM (SELECT DISTINCT {} FROM {} WHERE {})",
        plan.select.join(", "),
        plan.from.join(", "),
        conditions.join(" AND ")
    ))
}
