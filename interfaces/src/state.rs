use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{Connection, Row};
use tracing::{error, info, warn};

use crate::defs::{LedgerEntry, LedgerStatus, NormalizedTitle};

/// Persistent record of every normalized title the pipeline tried to publish.
///
/// Each operation opens its own connection and closes it before returning, so
/// nothing is held between calls and several processes may share one file.
/// SQLite serializes the writers.
#[derive(Clone, Debug)]
pub struct DedupeLedger {
    path: PathBuf,
}

impl DedupeLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn get_db_connection(&self) -> Result<SqliteConnection, sqlx::Error> {
        let options = SqliteConnectOptions::new()
            .filename(&self.path)
            .create_if_missing(true);
        SqliteConnection::connect_with(&options).await
    }

    /// Creates the database file and the `blogs` table if they are missing.
    pub async fn initialize(&self) -> Result<(), sqlx::Error> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut conn = self.get_db_connection().await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS blogs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL UNIQUE,
                status TEXT NOT NULL
            )
            "#,
        )
        .execute(&mut conn)
        .await?;
        conn.close().await?;

        info!("Ledger initialized at {}", self.path.display());
        Ok(())
    }

    /// Read errors are logged and reported as "not present".
    pub async fn exists(&self, title: &NormalizedTitle) -> bool {
        match self.try_exists(title).await {
            Ok(found) => found,
            Err(e) => {
                error!("Error checking for blog entry '{}': {}", title, e);
                false
            }
        }
    }

    async fn try_exists(&self, title: &NormalizedTitle) -> Result<bool, sqlx::Error> {
        let mut conn = self.get_db_connection().await?;
        let row = sqlx::query("SELECT 1 FROM blogs WHERE title = ?1")
            .bind(title.as_str())
            .fetch_optional(&mut conn)
            .await?;
        conn.close().await?;
        Ok(row.is_some())
    }

    /// Appends an entry. Returns `false` when the title was already recorded,
    /// in which case nothing is written.
    pub async fn add(&self, title: &NormalizedTitle, status: LedgerStatus) -> Result<bool, sqlx::Error> {
        let mut conn = self.get_db_connection().await?;
        let result = sqlx::query(
            r#"
            INSERT INTO blogs (title, status)
            VALUES (?1, ?2)
            ON CONFLICT (title) DO NOTHING
            "#,
        )
        .bind(title.as_str())
        .bind(status.as_str())
        .execute(&mut conn)
        .await?;
        conn.close().await?;

        if result.rows_affected() == 0 {
            warn!("Blog entry with title '{}' already exists in ledger. Skipping addition.", title);
            return Ok(false);
        }

        info!("Added blog entry: {} with status {}", title, status);
        Ok(true)
    }

    /// The last `limit` titles, most recent first. Empty on read errors.
    pub async fn recent_topics(&self, limit: u32) -> Vec<NormalizedTitle> {
        let result = async {
            let mut conn = self.get_db_connection().await?;
            let rows = sqlx::query("SELECT title FROM blogs ORDER BY id DESC LIMIT ?1")
                .bind(i64::from(limit))
                .fetch_all(&mut conn)
                .await?;
            conn.close().await?;
            rows.iter()
                .map(|row| row.try_get::<String, _>("title").map(|t| NormalizedTitle::new(&t)))
                .collect::<Result<Vec<_>, sqlx::Error>>()
        }
        .await;

        result.unwrap_or_else(|e| {
            error!("Error retrieving recent topics: {}", e);
            Vec::new()
        })
    }

    /// Every recorded title. Empty on read errors.
    pub async fn all_titles(&self) -> BTreeSet<NormalizedTitle> {
        let result = async {
            let mut conn = self.get_db_connection().await?;
            let rows = sqlx::query("SELECT title FROM blogs")
                .fetch_all(&mut conn)
                .await?;
            conn.close().await?;
            rows.iter()
                .map(|row| row.try_get::<String, _>("title").map(|t| NormalizedTitle::new(&t)))
                .collect::<Result<BTreeSet<_>, sqlx::Error>>()
        }
        .await;

        result.unwrap_or_else(|e| {
            error!("Error retrieving all normalized titles: {}", e);
            BTreeSet::new()
        })
    }

    /// Full entries, most recent first.
    pub async fn entries(&self, limit: u32) -> Result<Vec<LedgerEntry>, sqlx::Error> {
        let mut conn = self.get_db_connection().await?;
        let rows = sqlx::query("SELECT id, title, status FROM blogs ORDER BY id DESC LIMIT ?1")
            .bind(i64::from(limit))
            .fetch_all(&mut conn)
            .await?;
        conn.close().await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let status: String = row.try_get("status")?;
            let status = status
                .parse::<LedgerStatus>()
                .map_err(|e| sqlx::Error::Decode(e.into()))?;
            entries.push(LedgerEntry {
                id: row.try_get("id")?,
                title: NormalizedTitle::new(&row.try_get::<String, _>("title")?),
                status,
            });
        }
        Ok(entries)
    }

    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        let mut conn = self.get_db_connection().await?;
        let row = sqlx::query("SELECT COUNT(*) AS count FROM blogs")
            .fetch_one(&mut conn)
            .await?;
        conn.close().await?;
        row.try_get("count")
    }
}
