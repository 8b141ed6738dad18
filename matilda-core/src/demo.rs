//! Bundled demo databases
//!
//! Deterministic university-schema fixtures backing the `--demo` flag and
//! the end-to-end tests. The imperfect variant contains dangling
//! references (enrollments and advisor rows pointing at missing students)
//! so approximate TGDs with confidence below 1 become discoverable.

use std::path::Path;
use std::str::FromStr;

use rusqlite::{params, Connection};

use crate::error::{MatildaError, QueryErrorKind, Result};

/// Which demo variant to build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoKind {
    /// All references intact; every key rule is exact
    Perfect,
    /// 5 dangling enrollments and 3 dangling advisor rows
    Imperfect,
}

impl DemoKind {
    /// Database file stem for this variant
    pub fn database_name(&self) -> &'static str {
        match self {
            DemoKind::Perfect => "perfect_database",
            DemoKind::Imperfect => "imperfect_database",
        }
    }
}

impl FromStr for DemoKind {
    type Err = MatildaError;

    fn from_str(s: &str) -> Result<DemoKind> {
        match s {
            "perfect_database" => Ok(DemoKind::Perfect),
            "imperfect_database" => Ok(DemoKind::Imperfect),
            other => Err(MatildaError::Config(format!(
                "unknown demo database: {} (expected perfect_database or imperfect_database)",
                other
            ))),
        }
    }
}

/// Create a demo SQLite database at the given path, replacing any
/// existing file
pub fn create_demo_database(kind: DemoKind, path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    let conn = Connection::open(path).map_err(|e| {
        MatildaError::query(
            QueryErrorKind::Driver,
            format!("creating {}: {}", path.display(), e),
        )
    })?;
    populate(&conn, kind)
        .map_err(|e| MatildaError::query(QueryErrorKind::Driver, e.to_string()))?;
    Ok(())
}

fn populate(conn: &Connection, kind: DemoKind) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE department (dept_id INTEGER, name TEXT);
         CREATE TABLE student (student_id INTEGER, name TEXT, year INTEGER, dept_id INTEGER);
         CREATE TABLE course (course_id INTEGER, title TEXT, dept_id INTEGER);
         CREATE TABLE enrollment (enrollment_id INTEGER, student_id INTEGER, course_id INTEGER);
         CREATE TABLE advisor (advisor_id INTEGER, name TEXT, student_id INTEGER);",
    )?;

    for dept in 1..=5i64 {
        conn.execute(
            "INSERT INTO department VALUES (?1, ?2)",
            params![dept, format!("department_{}", dept)],
        )?;
    }
    for student in 1..=50i64 {
        conn.execute(
            "INSERT INTO student VALUES (?1, ?2, ?3, ?4)",
            params![
                student,
                format!("student_{}", student),
                1 + (student % 4),
                1 + (student % 5)
            ],
        )?;
    }
    for course in 1..=10i64 {
        conn.execute(
            "INSERT INTO course VALUES (?1, ?2, ?3)",
            params![course, format!("course_{}", course), 1 + (course % 5)],
        )?;
    }

    // 81 enrollments; in the imperfect variant the last 5 reference
    // students that do not exist.
    for enrollment in 1..=81i64 {
        let student = match kind {
            DemoKind::Imperfect if enrollment > 76 => 900 + enrollment,
            _ => 1 + ((enrollment - 1) % 50),
        };
        conn.execute(
            "INSERT INTO enrollment VALUES (?1, ?2, ?3)",
            params![enrollment, student, 1 + ((enrollment - 1) % 10)],
        )?;
    }

    // 48 advisor rows; in the imperfect variant the last 3 dangle.
    for advisor in 1..=48i64 {
        let student = match kind {
            DemoKind::Imperfect if advisor > 45 => 900 + advisor,
            _ => advisor,
        };
        conn.execute(
            "INSERT INTO advisor VALUES (?1, ?2, ?3)",
            params![advisor, format!("prof_{}", advisor), student],
        )?;
    }
    Ok(())
}
