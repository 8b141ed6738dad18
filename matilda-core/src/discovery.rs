//! Discovery orchestration
//!
//! Drives the full pipeline: catalog load → constraint graph → candidate
//! enumeration → validation → ranked sink. Control flow is single-threaded
//! and cooperative: the enumerator is pulled one candidate at a time, the
//! monitor is polled at every candidate boundary, and cancellation
//! finalizes cleanly with partial results.
//!
//! ```text
//! INIT → LOADING_CATALOG → BUILDING_GRAPH → ENUMERATING
//!         │                                  ├─► candidate ─► VALIDATING ─► ENUMERATING
//!         │                                  └─► empty ─► FINALIZING → DONE
//!         └── any state ──► CANCELLED ──► FINALIZING → DONE (partial)
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::config::Config;
use crate::enumerate::{CandidateEnumerator, EnumeratorLimits, SeedPolicy};
use crate::error::{CancelReason, MatildaError, QueryErrorKind, Result};
use crate::graph::ConstraintGraph;
use crate::monitor::Monitor;
use crate::prune::{AcceptedRule, PreFilter, RuleSink};
use crate::query::SqliteEngine;
use crate::validate::{TgdValidator, ValidatorConfig};

/// Phase of a discovery run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Run created, nothing loaded yet
    Init,
    /// Introspecting the schema
    LoadingCatalog,
    /// Building the constraint graph
    BuildingGraph,
    /// Walking the candidate space
    Enumerating,
    /// Measuring one candidate
    Validating,
    /// Monitor tripped; winding down
    Cancelled,
    /// Emitting results
    Finalizing,
    /// Terminal: run finished (fully or partially)
    Done,
    /// Terminal: unrecoverable failure
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Init => "INIT",
            RunState::LoadingCatalog => "LOADING_CATALOG",
            RunState::BuildingGraph => "BUILDING_GRAPH",
            RunState::Enumerating => "ENUMERATING",
            RunState::Validating => "VALIDATING",
            RunState::Cancelled => "CANCELLED",
            RunState::Finalizing => "FINALIZING",
            RunState::Done => "DONE",
            RunState::Failed => "FAILED",
        };
        write!(f, "{}", name)
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// The candidate space was exhausted
    Success,
    /// The monitor cancelled the run; results are partial
    Partial,
}

impl RunStatus {
    /// Status string used in artifacts
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Partial => "partial",
        }
    }
}

/// Counters collected over a run
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscoveryStats {
    /// Candidates produced by the enumerator
    pub enumerated: u64,
    /// Candidates that reached the validator
    pub validated: u64,
    /// Rules retained by the sink
    pub accepted: u64,
}

/// Final result of a discovery run
#[derive(Debug)]
pub struct DiscoveryOutcome {
    /// Accepted rules in rank order
    pub rules: Vec<AcceptedRule>,
    /// Success or partial
    pub status: RunStatus,
    /// What tripped the monitor, when partial
    pub trigger: Option<CancelReason>,
    /// Run counters
    pub stats: DiscoveryStats,
    /// Wall-clock duration of the run
    pub elapsed: Duration,
    /// Database display name
    pub database: String,
}

/// A configured discovery run
pub struct DiscoveryRun {
    config: Config,
}

impl DiscoveryRun {
    /// Validate the configuration and prepare a run
    pub fn new(config: Config) -> Result<DiscoveryRun> {
        config.validate()?;
        Ok(DiscoveryRun { config })
    }

    fn transition(state: &mut RunState, next: RunState) {
        debug!(from = %state, to = %next, "state transition");
        *state = next;
    }

    /// Execute discovery to completion (or clean cancellation)
    pub fn execute(&self) -> Result<DiscoveryOutcome> {
        let mut state = RunState::Init;
        let algorithm = &self.config.algorithm;
        let database = self.config.database.display_name()?;
        let db_path = self.config.database.resolve()?;

        let monitor = Arc::new(Monitor::new(
            self.config.monitor.timeout,
            self.config.monitor.memory_threshold,
        ));

        Self::transition(&mut state, RunState::LoadingCatalog);
        let conn = Connection::open_with_flags(
            &db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| {
            MatildaError::query(
                QueryErrorKind::Driver,
                format!("opening {}: {}", db_path.display(), e),
            )
        })?;
        let catalog = Catalog::load(&conn)?;
        info!(
            database = %database,
            relations = catalog.relations().len(),
            "catalog loaded"
        );

        Self::transition(&mut state, RunState::BuildingGraph);
        let graph = ConstraintGraph::build(&catalog);
        info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "constraint graph ready"
        );

        let engine = SqliteEngine::new(conn, Arc::clone(&monitor));
        let mut validator = TgdValidator::new(
            &engine,
            &catalog,
            ValidatorConfig {
                nb_occurrence: u64::from(algorithm.nb_occurrence),
                confidence_threshold: algorithm.confidence_threshold,
            },
            Arc::clone(&monitor),
        );
        let limits = EnumeratorLimits {
            max_table: algorithm.max_table as usize,
            max_vars: algorithm.max_vars as usize,
        };
        let mut prefilter = PreFilter::new(&catalog, limits.max_table, limits.max_vars);
        let mut sink = RuleSink::new(self.config.results.top_k as usize);
        let mut stats = DiscoveryStats::default();

        Self::transition(&mut state, RunState::Enumerating);
        let mut enumerator = CandidateEnumerator::new(
            &catalog,
            &graph,
            limits,
            SeedPolicy::AllRelations,
            Arc::clone(&monitor),
        );
        loop {
            if monitor.poll() {
                Self::transition(&mut state, RunState::Cancelled);
                break;
            }
            let Some(candidate) = enumerator.next() else {
                break;
            };
            stats.enumerated += 1;
            if !prefilter.admit(&candidate) {
                continue;
            }

            Self::transition(&mut state, RunState::Validating);
            stats.validated += 1;
            match validator.validate(&candidate) {
                Ok(verdict) if verdict.valid => {
                    if sink.accept(candidate, &verdict) {
                        stats.accepted += 1;
                    }
                }
                Ok(_) => {}
                Err(MatildaError::Query {
                    kind: QueryErrorKind::Timeout,
                    context,
                }) => {
                    // Candidate rejected; escalation to cancel, if due, is
                    // handled inside the validator.
                    debug!(context, "candidate dropped on query timeout");
                }
                Err(MatildaError::Cancelled(_)) => {
                    Self::transition(&mut state, RunState::Cancelled);
                    break;
                }
                Err(fatal) => {
                    Self::transition(&mut state, RunState::Failed);
                    return Err(fatal);
                }
            }
            Self::transition(&mut state, RunState::Enumerating);
        }

        Self::transition(&mut state, RunState::Finalizing);
        let trigger = monitor.cancel_reason();
        let status = if trigger.is_some() {
            RunStatus::Partial
        } else {
            RunStatus::Success
        };
        stats.accepted = sink.len() as u64;
        let outcome = DiscoveryOutcome {
            rules: sink.into_ranked(),
            status,
            trigger,
            stats,
            elapsed: monitor.elapsed(),
            database,
        };
        info!(
            rules = outcome.rules.len(),
            status = outcome.status.as_str(),
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "discovery finished"
        );
        Self::transition(&mut state, RunState::Done);
        Ok(outcome)
    }
}
