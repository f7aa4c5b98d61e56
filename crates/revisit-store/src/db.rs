//! Turso-backed store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use revisit_core::{
    Checkpoint, CheckpointStore, Fingerprint, NeighborStats, RevisitError, StatsDelta,
    StatsStore, VisitLedger, VisitRecord,
};
use std::path::Path;
use tokio::sync::Mutex;
use tracing::{debug, info};
use turso::{params, Builder, Connection};

const KEY_FINGERPRINTS: &str = "fingerprints";
const KEY_LAST_SYNC: &str = "last_sync_at";

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("turso error: {0}")]
    Turso(#[from] turso::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl From<DbError> for RevisitError {
    fn from(e: DbError) -> Self {
        RevisitError::Store(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Database connection wrapper
///
/// The connection sits behind an async mutex so the store can be shared by
/// reference while scan commits still get an exclusive transaction.
pub struct Database {
    conn: Mutex<Connection>,
    path: String,
}

impl Database {
    /// Open (or create) the database at `path` in WAL mode
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let db = Builder::new_local(&path_str).build().await?;
        let conn = db.connect()?;

        // PRAGMA statements may return rows, so they go through query()
        let _ = conn.query("PRAGMA journal_mode=WAL", params![]).await?;
        let _ = conn.query("PRAGMA busy_timeout=5000", params![]).await?;

        debug!("Opened store at {}", path_str);
        Ok(Database {
            conn: Mutex::new(conn),
            path: path_str,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Create tables if missing; safe to call repeatedly
    pub async fn init_schema(&self) -> Result<()> {
        let statements = [
            r#"CREATE TABLE IF NOT EXISTS checkpoint (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )"#,
            r#"CREATE TABLE IF NOT EXISTS neighbor_stats (
                counterparty TEXT PRIMARY KEY,
                likes INTEGER NOT NULL DEFAULT 0,
                comments INTEGER NOT NULL DEFAULT 0,
                replies INTEGER NOT NULL DEFAULT 0
            )"#,
            r#"CREATE TABLE IF NOT EXISTS visit_ledger (
                counterparty TEXT PRIMARY KEY,
                last_engaged_at TEXT,
                count INTEGER NOT NULL DEFAULT 0
            )"#,
        ];

        let conn = self.conn.lock().await;
        for stmt in statements {
            conn.execute(stmt, params![]).await?;
        }
        Ok(())
    }

    /// Read the stored checkpoint; missing keys read as empty
    pub async fn read_checkpoint(&self) -> Result<Checkpoint> {
        let conn = self.conn.lock().await;
        let mut rows = conn
            .query("SELECT key, value FROM checkpoint", params![])
            .await?;

        let mut checkpoint = Checkpoint::default();
        while let Some(row) = rows.next().await? {
            let key: String = row.get(0)?;
            let value: String = row.get(1)?;
            match key.as_str() {
                KEY_FINGERPRINTS => {
                    let raw: Vec<String> = serde_json::from_str(&value)?;
                    checkpoint.fingerprints = raw.into_iter().map(Fingerprint).collect();
                }
                KEY_LAST_SYNC => {
                    checkpoint.last_sync_at = Some(parse_timestamp(&value)?);
                }
                _ => {}
            }
        }
        Ok(checkpoint)
    }

    /// Apply a scan delta and its checkpoint in one transaction
    pub async fn apply_scan(&self, delta: &StatsDelta, checkpoint: &Checkpoint) -> Result<()> {
        let fingerprints: Vec<&str> = checkpoint
            .fingerprints
            .iter()
            .map(Fingerprint::as_str)
            .collect();
        let fingerprints_json = serde_json::to_string(&fingerprints)?;

        let mut conn = self.conn.lock().await;
        let tx = conn.transaction().await?;

        for (counterparty, counts) in &delta.entries {
            tx.execute(
                r#"INSERT INTO neighbor_stats (counterparty, likes, comments, replies)
                   VALUES (?, ?, ?, ?)
                   ON CONFLICT(counterparty) DO UPDATE SET
                       likes = neighbor_stats.likes + excluded.likes,
                       comments = neighbor_stats.comments + excluded.comments,
                       replies = neighbor_stats.replies + excluded.replies"#,
                params![
                    counterparty.clone(),
                    counts.likes as i64,
                    counts.comments as i64,
                    counts.replies as i64
                ],
            )
            .await?;
        }

        tx.execute(
            r#"INSERT INTO checkpoint (key, value) VALUES (?, ?)
               ON CONFLICT(key) DO UPDATE SET value = excluded.value"#,
            params![KEY_FINGERPRINTS, fingerprints_json],
        )
        .await?;

        match checkpoint.last_sync_at {
            Some(at) => {
                tx.execute(
                    r#"INSERT INTO checkpoint (key, value) VALUES (?, ?)
                       ON CONFLICT(key) DO UPDATE SET value = excluded.value"#,
                    params![KEY_LAST_SYNC, at.to_rfc3339()],
                )
                .await?;
            }
            None => {
                tx.execute(
                    "DELETE FROM checkpoint WHERE key = ?",
                    params![KEY_LAST_SYNC],
                )
                .await?;
            }
        }

        tx.commit().await?;

        info!(
            "Committed scan: {} counterparties, {} events",
            delta.counterparties(),
            delta.total_events()
        );
        Ok(())
    }

    /// All neighbor stats ordered by counterparty
    pub async fn list_stats(&self) -> Result<Vec<NeighborStats>> {
        let conn = self.conn.lock().await;
        let mut rows = conn
            .query(
                "SELECT counterparty, likes, comments, replies FROM neighbor_stats ORDER BY counterparty ASC",
                params![],
            )
            .await?;

        let mut stats = Vec::new();
        while let Some(row) = rows.next().await? {
            let counterparty: String = row.get(0)?;
            let likes: i64 = row.get(1)?;
            let comments: i64 = row.get(2)?;
            let replies: i64 = row.get(3)?;
            stats.push(NeighborStats::new(
                counterparty,
                to_count(likes),
                to_count(comments),
                to_count(replies),
            ));
        }
        Ok(stats)
    }

    /// Drop all neighbor stats, leaving checkpoint and ledger intact
    pub async fn clear_stats(&self) -> Result<usize> {
        let conn = self.conn.lock().await;
        let mut rows = conn
            .query("SELECT COUNT(*) FROM neighbor_stats", params![])
            .await?;
        let count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        drop(rows);

        conn.execute("DELETE FROM neighbor_stats", params![]).await?;
        info!("Reset neighbor stats ({} counterparties)", count);
        Ok(count.max(0) as usize)
    }

    pub async fn get_visit(&self, counterparty: &str) -> Result<Option<VisitRecord>> {
        let conn = self.conn.lock().await;
        let mut rows = conn
            .query(
                "SELECT counterparty, last_engaged_at, count FROM visit_ledger WHERE counterparty = ?",
                params![counterparty],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(parse_visit_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Upsert a completed engagement
    pub async fn upsert_visit(&self, counterparty: &str, at: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            r#"INSERT INTO visit_ledger (counterparty, last_engaged_at, count)
               VALUES (?, ?, 1)
               ON CONFLICT(counterparty) DO UPDATE SET
                   last_engaged_at = excluded.last_engaged_at,
                   count = visit_ledger.count + 1"#,
            params![counterparty, at.to_rfc3339()],
        )
        .await?;
        Ok(())
    }

    /// Ledger ordered by most recent engagement first
    pub async fn list_visits(&self) -> Result<Vec<VisitRecord>> {
        let conn = self.conn.lock().await;
        let mut rows = conn
            .query(
                "SELECT counterparty, last_engaged_at, count FROM visit_ledger ORDER BY last_engaged_at DESC, counterparty ASC",
                params![],
            )
            .await?;

        let mut visits = Vec::new();
        while let Some(row) = rows.next().await? {
            visits.push(parse_visit_row(&row)?);
        }
        Ok(visits)
    }
}

fn parse_visit_row(row: &turso::Row) -> Result<VisitRecord> {
    let last_engaged_at: Option<String> = row.get(1)?;
    let count: i64 = row.get(2)?;
    Ok(VisitRecord {
        counterparty: row.get(0)?,
        last_engaged_at: last_engaged_at
            .as_deref()
            .map(parse_timestamp)
            .transpose()?,
        count: to_count(count),
    })
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::Corrupt(format!("failed to parse timestamp {:?}: {}", value, e)))
}

fn to_count(value: i64) -> u64 {
    value.max(0) as u64
}

#[async_trait]
impl CheckpointStore for Database {
    async fn load_checkpoint(&self) -> revisit_core::Result<Checkpoint> {
        Ok(self.read_checkpoint().await?)
    }
}

#[async_trait]
impl StatsStore for Database {
    async fn all_stats(&self) -> revisit_core::Result<Vec<NeighborStats>> {
        Ok(self.list_stats().await?)
    }

    async fn commit_scan(
        &self,
        delta: &StatsDelta,
        checkpoint: &Checkpoint,
    ) -> revisit_core::Result<()> {
        Ok(self.apply_scan(delta, checkpoint).await?)
    }

    async fn reset_stats(&self) -> revisit_core::Result<usize> {
        Ok(self.clear_stats().await?)
    }
}

#[async_trait]
impl VisitLedger for Database {
    async fn visit(&self, counterparty: &str) -> revisit_core::Result<Option<VisitRecord>> {
        Ok(self.get_visit(counterparty).await?)
    }

    async fn record_engagement(
        &self,
        counterparty: &str,
        at: DateTime<Utc>,
    ) -> revisit_core::Result<()> {
        Ok(self.upsert_visit(counterparty, at).await?)
    }

    async fn all_visits(&self) -> revisit_core::Result<Vec<VisitRecord>> {
        Ok(self.list_visits().await?)
    }
}
