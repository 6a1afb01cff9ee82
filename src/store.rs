//! Persistence for finished (or abandoned) runs: one CSV file of per-tick
//! results per run, plus a SQLite table of run summaries for history.

use crate::app_dirs::AppDirs;
use crate::clock::Clock;
use crate::config::TaskConfig;
use crate::engine::TaskEngine;
use crate::result::{ResultLog, TickResult};
use chrono::{DateTime, Local, TimeZone};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read/write results: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode results CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("session database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("no data directory available")]
    NoDataDir,
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// One CSV line: a result tagged with the subject it belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub subject: String,
    pub index: usize,
    pub number: u32,
    pub was_target: bool,
    pub was_correct: bool,
    pub was_forced: bool,
    pub elapsed_since_start_ms: u64,
    pub elapsed_since_number_shown_ms: u64,
}

impl ResultRow {
    pub fn new(subject: &str, r: &TickResult) -> Self {
        Self {
            subject: subject.to_string(),
            index: r.index,
            number: r.number,
            was_target: r.was_target,
            was_correct: r.was_correct,
            was_forced: r.was_forced,
            elapsed_since_start_ms: r.elapsed_since_start_ms,
            elapsed_since_number_shown_ms: r.elapsed_since_number_shown_ms,
        }
    }

    pub fn to_result(&self) -> TickResult {
        TickResult {
            index: self.index,
            number: self.number,
            was_correct: self.was_correct,
            was_target: self.was_target,
            was_forced: self.was_forced,
            elapsed_since_start_ms: self.elapsed_since_start_ms,
            elapsed_since_number_shown_ms: self.elapsed_since_number_shown_ms,
        }
    }
}

/// Writes each run to its own CSV file in a results directory
#[derive(Debug, Clone)]
pub struct CsvResultsWriter {
    dir: PathBuf,
}

impl CsvResultsWriter {
    pub fn new() -> Result<Self> {
        AppDirs::results_dir()
            .map(Self::with_dir)
            .ok_or(StoreError::NoDataDir)
    }

    pub fn with_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `results` to `<dir>/<subject>-<started_at>.csv`, never
    /// overwriting an earlier file
    pub fn write(
        &self,
        subject: &str,
        started_at: DateTime<Local>,
        results: &[TickResult],
    ) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;

        let stem = format!(
            "{}-{}",
            file_safe(subject),
            started_at.format("%Y%m%d-%H%M%S")
        );
        let mut path = self.dir.join(format!("{stem}.csv"));
        let mut suffix = 1;
        while path.exists() {
            path = self.dir.join(format!("{stem}-{suffix}.csv"));
            suffix += 1;
        }

        let mut writer = csv::Writer::from_path(&path)?;
        for r in results {
            writer.serialize(ResultRow::new(subject, r))?;
        }
        writer.flush()?;
        Ok(path)
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Vec<ResultRow>> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut rows = Vec::new();
        for row in reader.deserialize() {
            rows.push(row?);
        }
        Ok(rows)
    }
}

fn file_safe(subject: &str) -> String {
    let cleaned: String = subject
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "anonymous".to_string()
    } else {
        cleaned
    }
}

/// Summary of one run as kept in the session history
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub subject: String,
    pub started_at: DateTime<Local>,
    pub n: usize,
    pub sequence_length: usize,
    pub pacing: String,
    pub completed: bool,
    pub total: usize,
    pub correct: usize,
    pub hits: usize,
    pub false_alarms: usize,
    pub mean_latency_ms: Option<f64>,
    pub accuracy_pct: Option<f64>,
}

impl SessionRecord {
    pub fn from_run(
        subject: &str,
        started_at: DateTime<Local>,
        config: &TaskConfig,
        results: &ResultLog,
        completed: bool,
    ) -> Self {
        let stats = results.summary_stats();
        Self {
            subject: subject.to_string(),
            started_at,
            n: config.n,
            sequence_length: config.sequence_length,
            pacing: config.pacing.label().to_string(),
            completed,
            total: stats.total,
            correct: stats.correct,
            hits: stats.hits,
            false_alarms: stats.false_alarms,
            mean_latency_ms: stats.mean_latency_ms,
            accuracy_pct: stats.accuracy_pct,
        }
    }
}

/// SQLite-backed history of run summaries
#[derive(Debug)]
pub struct SessionDb {
    conn: Connection,
}

impl SessionDb {
    /// Open the database in the application state directory
    pub fn new() -> Result<Self> {
        let path = AppDirs::db_path().ok_or(StoreError::NoDataDir)?;
        Self::open(path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                subject TEXT NOT NULL,
                started_at_ms INTEGER NOT NULL,
                n INTEGER NOT NULL,
                sequence_length INTEGER NOT NULL,
                pacing TEXT NOT NULL,
                completed BOOLEAN NOT NULL,
                total INTEGER NOT NULL,
                correct INTEGER NOT NULL,
                hits INTEGER NOT NULL,
                false_alarms INTEGER NOT NULL,
                mean_latency_ms REAL,
                accuracy_pct REAL
            )
            "#,
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_sessions_subject ON sessions(subject, started_at_ms)",
            [],
        )?;
        Ok(Self { conn })
    }

    pub fn record_session(&self, record: &SessionRecord) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO sessions
            (subject, started_at_ms, n, sequence_length, pacing, completed,
             total, correct, hits, false_alarms, mean_latency_ms, accuracy_pct)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                record.subject,
                record.started_at.timestamp_millis(),
                record.n as i64,
                record.sequence_length as i64,
                record.pacing,
                record.completed,
                record.total as i64,
                record.correct as i64,
                record.hits as i64,
                record.false_alarms as i64,
                record.mean_latency_ms,
                record.accuracy_pct,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent runs for `subject`, newest first
    pub fn recent_sessions(&self, subject: &str, limit: usize) -> Result<Vec<SessionRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT subject, started_at_ms, n, sequence_length, pacing, completed,
                   total, correct, hits, false_alarms, mean_latency_ms, accuracy_pct
            FROM sessions
            WHERE subject = ?1
            ORDER BY started_at_ms DESC, id DESC
            LIMIT ?2
            "#,
        )?;

        let rows = stmt.query_map(params![subject, limit as i64], |row| {
            // Epoch milliseconds, so ordering is unaffected by UTC offset changes
            let started_ms: i64 = row.get(1)?;
            let started_at = Local
                .timestamp_millis_opt(started_ms)
                .single()
                .ok_or(rusqlite::Error::IntegralValueOutOfRange(1, started_ms))?;

            Ok(SessionRecord {
                subject: row.get(0)?,
                started_at,
                n: row.get::<_, i64>(2)? as usize,
                sequence_length: row.get::<_, i64>(3)? as usize,
                pacing: row.get(4)?,
                completed: row.get(5)?,
                total: row.get::<_, i64>(6)? as usize,
                correct: row.get::<_, i64>(7)? as usize,
                hits: row.get::<_, i64>(8)? as usize,
                false_alarms: row.get::<_, i64>(9)? as usize,
                mean_latency_ms: row.get(10)?,
                accuracy_pct: row.get(11)?,
            })
        })?;

        let mut sessions = Vec::new();
        for session in rows {
            sessions.push(session?);
        }
        Ok(sessions)
    }
}

/// Where finished runs go: a CSV per run and, when available, a history row
#[derive(Debug)]
pub struct Archive {
    pub writer: CsvResultsWriter,
    pub db: Option<SessionDb>,
}

impl Archive {
    /// Archive in the application state directory. A database that cannot be
    /// opened only disables history.
    pub fn open_default() -> Result<Self> {
        let writer = CsvResultsWriter::new()?;
        let db = SessionDb::new()
            .map_err(|e| tracing::warn!("session history disabled: {}", e))
            .ok();
        Ok(Self { writer, db })
    }

    pub fn save_run<C: Clock>(
        &self,
        subject: &str,
        started_at: DateTime<Local>,
        engine: &TaskEngine<C>,
    ) -> Result<PathBuf> {
        let path = self
            .writer
            .write(subject, started_at, engine.all_results())?;
        if let Some(db) = &self.db {
            let record = SessionRecord::from_run(
                subject,
                started_at,
                engine.config(),
                engine.results(),
                engine.is_completed(),
            );
            db.record_session(&record)?;
        }
        tracing::info!(
            subject,
            results = engine.results().len(),
            path = %path.display(),
            "saved run"
        );
        Ok(path)
    }

    pub fn recent_sessions(&self, subject: &str, limit: usize) -> Vec<SessionRecord> {
        self.db
            .as_ref()
            .and_then(|db| db.recent_sessions(subject, limit).ok())
            .unwrap_or_default()
    }
}
