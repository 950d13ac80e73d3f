//! # Response Cache
//!
//! SQLite key/value store for model responses, keyed by request
//! fingerprint. One entry per key; writers replace. Two identical requests
//! in flight at the same time may both reach the model.

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Default file for agents constructed without a cache handle
pub const AGENT_CACHE_FILE: &str = "agent_cache.db";

/// Default file shared by every agent of one crew
pub const CREW_CACHE_FILE: &str = "crew_cache.db";

const SCHEMA_VERSION: i32 = 1;

/// Shared handle onto a response cache. Cloning shares the connection.
#[derive(Clone)]
pub struct ResponseCache {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("path", &self.path)
            .finish()
    }
}

impl ResponseCache {
    /// Open or create a cache database at `path`
    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let conn = Connection::open(path.as_ref()).with_context(|| {
            format!("Failed to open response cache at {}", path.as_ref().display())
        })?;

        let cache = Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.as_ref().to_path_buf()),
        };
        cache.run_migrations()?;
        Ok(cache)
    }

    /// Process-local cache that disappears with the handle
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory cache")?;
        let cache = Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        };
        cache.run_migrations()?;
        Ok(cache)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY)",
            [],
        )?;

        let current_version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        if current_version < SCHEMA_VERSION {
            conn.execute(
                r#"
                CREATE TABLE IF NOT EXISTS responses (
                    fingerprint TEXT PRIMARY KEY,
                    response TEXT NOT NULL,
                    created_at TEXT NOT NULL
                )
                "#,
                [],
            )?;
            conn.execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                [SCHEMA_VERSION],
            )?;
        }

        Ok(())
    }

    pub fn get(&self, fingerprint: &str) -> Result<Option<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let response = conn
            .query_row(
                "SELECT response FROM responses WHERE fingerprint = ?1",
                params![fingerprint],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to read response cache")?;
        Ok(response)
    }

    pub fn put(&self, fingerprint: &str, response: &str) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        conn.execute(
            "INSERT OR REPLACE INTO responses (fingerprint, response, created_at) VALUES (?1, ?2, ?3)",
            params![fingerprint, response, Utc::now().to_rfc3339()],
        )
        .context("Failed to write response cache")?;
        Ok(())
    }

    pub fn len(&self) -> Result<usize> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM responses", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn clear(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        conn.execute("DELETE FROM responses", [])?;
        Ok(())
    }
}
