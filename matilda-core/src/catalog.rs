//! Read-only schema catalog with per-column sample statistics
//!
//! `Catalog::load` introspects every base table, records declared column
//! domains, and samples a bounded reservoir of value hashes per column.
//! The hashes drive cross-column overlap estimation in the constraint
//! graph; hashing uses fixed seeds so two runs over the same database
//! sample identical reservoirs.

use std::collections::HashSet;
use std::hash::{BuildHasher, Hash, Hasher};

use ahash::RandomState;
use rusqlite::types::ValueRef;
use rusqlite::Connection;

use crate::error::{MatildaError, Result};
use crate::query::quote_ident;

/// Bounded reservoir size for per-column value hashes
pub const SAMPLE_SIZE: usize = 1024;

/// Fixed seeds keep value hashing deterministic across runs.
const HASH_SEEDS: (u64, u64, u64, u64) = (
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
    0x082e_fa98_ec4e_6c89,
);

fn hash_state() -> RandomState {
    RandomState::with_seeds(HASH_SEEDS.0, HASH_SEEDS.1, HASH_SEEDS.2, HASH_SEEDS.3)
}

/// Hash one SQLite value into an opaque 64-bit fingerprint
pub fn hash_value(value: ValueRef<'_>) -> u64 {
    let mut hasher = hash_state().build_hasher();
    match value {
        ValueRef::Null => 0u8.hash(&mut hasher),
        ValueRef::Integer(i) => {
            1u8.hash(&mut hasher);
            i.hash(&mut hasher);
        }
        ValueRef::Real(r) => {
            2u8.hash(&mut hasher);
            r.to_bits().hash(&mut hasher);
        }
        ValueRef::Text(t) => {
            3u8.hash(&mut hasher);
            t.hash(&mut hasher);
        }
        ValueRef::Blob(b) => {
            4u8.hash(&mut hasher);
            b.hash(&mut hasher);
        }
    }
    hasher.finish()
}

/// Declared domain of a column, from SQLite type affinity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomainTag {
    /// Character data
    Text,
    /// Integer affinity
    Integer,
    /// Floating-point affinity
    Real,
    /// Binary data or untyped
    Blob,
}

impl DomainTag {
    /// Derive the tag from a declared column type, following SQLite's
    /// affinity rules
    pub fn from_declared(declared: &str) -> DomainTag {
        let upper = declared.to_ascii_uppercase();
        if upper.contains("INT") {
            DomainTag::Integer
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            DomainTag::Text
        } else if upper.contains("REAL")
            || upper.contains("FLOA")
            || upper.contains("DOUB")
            || upper.contains("NUMERIC")
        {
            DomainTag::Real
        } else if upper.contains("BLOB") || upper.is_empty() {
            DomainTag::Blob
        } else {
            DomainTag::Text
        }
    }
}

/// A column: name plus declared domain
#[derive(Debug, Clone)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Declared domain tag
    pub domain: DomainTag,
}

/// A base table: name plus ordered columns. Immutable after load.
#[derive(Debug, Clone)]
pub struct Relation {
    /// Table name
    pub name: String,
    /// Columns in declaration order
    pub columns: Vec<Column>,
}

impl Relation {
    /// Number of columns
    pub fn arity(&self) -> usize {
        self.columns.len()
    }
}

/// Sampled statistics for one column
#[derive(Debug, Clone)]
pub struct ColumnStats {
    /// Number of distinct non-null values
    pub distinct_count: u64,
    /// Bounded reservoir of value hashes
    pub sample: HashSet<u64, RandomState>,
}

impl ColumnStats {
    /// Estimated count of distinct values shared with another column
    pub fn overlap(&self, other: &ColumnStats) -> u64 {
        self.sample.intersection(&other.sample).count() as u64
    }
}

/// Sampled statistics for one relation
#[derive(Debug, Clone)]
pub struct RelationStats {
    /// Total row count
    pub row_count: u64,
    /// Per-column statistics, aligned with `Relation::columns`
    pub columns: Vec<ColumnStats>,
}

/// The loaded schema: relations in deterministic (name) order plus their
/// sampled statistics
#[derive(Debug)]
pub struct Catalog {
    relations: Vec<Relation>,
    stats: Vec<RelationStats>,
}

impl Catalog {
    /// Introspect all base tables of the connected database
    pub fn load(conn: &Connection) -> Result<Catalog> {
        let mut names: Vec<String> = Vec::new();
        {
            let mut stmt = conn
                .prepare(
                    "SELECT name FROM sqlite_master \
                     WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
                     ORDER BY name",
                )
                .map_err(|e| MatildaError::Schema(format!("listing tables: {}", e)))?;
            let mut rows = stmt
                .query([])
                .map_err(|e| MatildaError::Schema(format!("listing tables: {}", e)))?;
            while let Some(row) = rows
                .next()
                .map_err(|e| MatildaError::Schema(format!("listing tables: {}", e)))?
            {
                names.push(
                    row.get(0)
                        .map_err(|e| MatildaError::Schema(format!("listing tables: {}", e)))?,
                );
            }
        }
        if names.is_empty() {
            return Err(MatildaError::Schema(
                "database contains no base tables".to_string(),
            ));
        }

        let mut relations = Vec::with_capacity(names.len());
        let mut stats = Vec::with_capacity(names.len());
        for name in names {
            let relation = Self::introspect_relation(conn, &name)?;
            let relation_stats = Self::sample_relation(conn, &relation)?;
            relations.push(relation);
            stats.push(relation_stats);
        }
        Ok(Catalog { relations, stats })
    }

    fn introspect_relation(conn: &Connection, name: &str) -> Result<Relation> {
        let sql = format!("PRAGMA table_info({})", quote_ident(name));
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| MatildaError::Schema(format!("table {}: {}", name, e)))?;
        let mut rows = stmt
            .query([])
            .map_err(|e| MatildaError::Schema(format!("table {}: {}", name, e)))?;
        let mut columns = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| MatildaError::Schema(format!("table {}: {}", name, e)))?
        {
            let column_name: String = row
                .get(1)
                .map_err(|e| MatildaError::Schema(format!("table {}: {}", name, e)))?;
            let declared: String = row
                .get(2)
                .map_err(|e| MatildaError::Schema(format!("table {}: {}", name, e)))?;
            columns.push(Column {
                name: column_name,
                domain: DomainTag::from_declared(&declared),
            });
        }
        if columns.is_empty() {
            return Err(MatildaError::Schema(format!(
                "table {} has no columns",
                name
            )));
        }
        Ok(Relation {
            name: name.to_string(),
            columns,
        })
    }

    fn sample_relation(conn: &Connection, relation: &Relation) -> Result<RelationStats> {
        let table = quote_ident(&relation.name);
        let schema_err =
            |e: rusqlite::Error| MatildaError::Schema(format!("table {}: {}", relation.name, e));

        let row_count: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| {
                r.get(0)
            })
            .map_err(schema_err)?;

        let mut columns = Vec::with_capacity(relation.columns.len());
        for column in &relation.columns {
            let col = quote_ident(&column.name);
            let distinct_count: i64 = conn
                .query_row(
                    &format!("SELECT COUNT(DISTINCT {}) FROM {}", col, table),
                    [],
                    |r| r.get(0),
                )
                .map_err(schema_err)?;

            let mut sample = HashSet::with_hasher(hash_state());
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT DISTINCT {} FROM {} WHERE {} IS NOT NULL LIMIT {}",
                    col, table, col, SAMPLE_SIZE
                ))
                .map_err(schema_err)?;
            let mut rows = stmt.query([]).map_err(schema_err)?;
            while let Some(row) = rows.next().map_err(schema_err)? {
                sample.insert(hash_value(row.get_ref(0).map_err(schema_err)?));
            }

            columns.push(ColumnStats {
                distinct_count: distinct_count as u64,
                sample,
            });
        }
        Ok(RelationStats {
            row_count: row_count as u64,
            columns,
        })
    }

    /// Relations in deterministic (name) order
    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    /// Index of a relation by name
    pub fn relation_index(&self, name: &str) -> Option<usize> {
        self.relations
            .binary_search_by(|r| r.name.as_str().cmp(name))
            .ok()
    }

    /// Relation by name
    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relation_index(name).map(|i| &self.relations[i])
    }

    /// Sampled statistics of a relation by index
    pub fn stats(&self, index: usize) -> &RelationStats {
        &self.stats[index]
    }

    /// Sampled statistics of a relation by name
    pub fn stats_for(&self, name: &str) -> Option<&RelationStats> {
        self.relation_index(name).map(|i| &self.stats[i])
    }
}
