//! Query engine boundary
//!
//! The discovery core talks to the database through exactly three
//! operations: counting, distinct counting, and value sampling. All SQL is
//! read-only and parameterized; every dispatch first observes the monitor's
//! cancel flag, and a progress handler enforces a per-statement deadline so
//! a runaway join cannot outlive the watchdog.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rusqlite::{Connection, OpenFlags, ToSql};
use tracing::trace;

use crate::catalog::hash_value;
use crate::error::{MatildaError, QueryErrorKind, Result};
use crate::monitor::Monitor;

/// Progress-handler granularity in VM instructions
const PROGRESS_OPS: std::os::raw::c_int = 1000;

/// Default per-statement deadline
pub const DEFAULT_STATEMENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Double-quote an SQL identifier
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Read-only aggregate query interface
pub trait QueryEngine {
    /// Execute `SELECT COUNT(*) …` and return the count
    fn count(&self, sql: &str, params: &[&dyn ToSql]) -> Result<u64>;

    /// Count distinct tuples of `exprs` over a `FROM …` tail
    fn count_distinct(&self, exprs: &[String], from_sql: &str, params: &[&dyn ToSql])
        -> Result<u64>;

    /// Sample up to `n` distinct non-null values of a column as opaque hashes
    fn sample_values(&self, relation: &str, column: &str, n: usize) -> Result<Vec<u64>>;
}

/// SQLite-backed query engine
pub struct SqliteEngine {
    conn: Connection,
    monitor: Arc<Monitor>,
    statement_timeout: Duration,
}

impl SqliteEngine {
    /// Wrap an open connection
    pub fn new(conn: Connection, monitor: Arc<Monitor>) -> Self {
        SqliteEngine {
            conn,
            monitor,
            statement_timeout: DEFAULT_STATEMENT_TIMEOUT,
        }
    }

    /// Open a database file read-only
    pub fn open(path: &std::path::Path, monitor: Arc<Monitor>) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| {
            MatildaError::query(
                QueryErrorKind::Driver,
                format!("opening {}: {}", path.display(), e),
            )
        })?;
        Ok(Self::new(conn, monitor))
    }

    /// Override the per-statement deadline
    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = timeout;
        self
    }

    fn run_count(&self, sql: &str, params: &[&dyn ToSql]) -> Result<u64> {
        if let Some(reason) = self.monitor.cancel_reason() {
            return Err(MatildaError::Cancelled(reason));
        }
        trace!(sql, "dispatching count query");

        let deadline = Instant::now() + self.statement_timeout;
        let cancel = self.monitor.cancel_flag();
        self.conn.progress_handler(
            PROGRESS_OPS,
            Some(move || Instant::now() >= deadline || cancel.load(Ordering::Relaxed)),
        );
        let result = self.conn.query_row(sql, params, |row| row.get::<_, i64>(0));
        self.conn
            .progress_handler(PROGRESS_OPS, None::<fn() -> bool>);

        match result {
            Ok(n) => Ok(n.max(0) as u64),
            Err(e) => Err(map_sqlite_error(e, sql)),
        }
    }
}

impl QueryEngine for SqliteEngine {
    fn count(&self, sql: &str, params: &[&dyn ToSql]) -> Result<u64> {
        self.run_count(sql, params)
    }

    fn count_distinct(
        &self,
        exprs: &[String],
        from_sql: &str,
        params: &[&dyn ToSql],
    ) -> Result<u64> {
        let sql = format!(
            "SELECT COUNT(*) FROM (SELECT DISTINCT {} {})",
            exprs.join(", "),
            from_sql
        );
        self.run_count(&sql, params)
    }

    fn sample_values(&self, relation: &str, column: &str, n: usize) -> Result<Vec<u64>> {
        if let Some(reason) = self.monitor.cancel_reason() {
            return Err(MatildaError::Cancelled(reason));
        }
        let sql = format!(
            "SELECT DISTINCT {col} FROM {rel} WHERE {col} IS NOT NULL LIMIT {n}",
            col = quote_ident(column),
            rel = quote_ident(relation),
            n = n
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| map_sqlite_error(e, &sql))?;
        let mut rows = stmt.query([]).map_err(|e| map_sqlite_error(e, &sql))?;
        let mut hashes = Vec::new();
        while let Some(row) = rows.next().map_err(|e| map_sqlite_error(e, &sql))? {
            hashes.push(hash_value(
                row.get_ref(0).map_err(|e| map_sqlite_error(e, &sql))?,
            ));
        }
        Ok(hashes)
    }
}

/// Map a rusqlite failure onto the query error taxonomy
fn map_sqlite_error(e: rusqlite::Error, sql: &str) -> MatildaError {
    let kind = match &e {
        rusqlite::Error::SqliteFailure(inner, message) => {
            if inner.code == rusqlite::ErrorCode::OperationInterrupted {
                QueryErrorKind::Timeout
            } else if message.as_deref().is_some_and(|m| m.contains("no such")) {
                QueryErrorKind::Schema
            } else {
                QueryErrorKind::Driver
            }
        }
        _ => QueryErrorKind::Driver,
    };
    MatildaError::query(kind, format!("{} [{}]", e, truncate_sql(sql)))
}

/// Keep diagnostics readable when the compiled SQL is long
fn truncate_sql(sql: &str) -> String {
    const LIMIT: usize = 200;
    if sql.len() <= LIMIT {
        sql.to_string()
    } else {
        let mut short: String = sql.chars().take(LIMIT).collect();
        short.push('…');
        short
    }
}
