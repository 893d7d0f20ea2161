//! Shared dashboard state: one SQLite pool per discovered butler.
//!
//! Per-butler DB isolation precludes a cross-butler transaction; the
//! dashboard aggregates by fanning out a read-only query per butler and
//! merging the results in-process.

use std::collections::HashMap;
use std::sync::Arc;

use sqlx::SqlitePool;

use crate::adapters::sqlite::create_pool;
use crate::dashboard::error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub butlers: Arc<HashMap<String, SqlitePool>>,
}

impl AppState {
    /// Open a pool for every `*.db` file directly under `database_dir`;
    /// the file stem is taken as the butler's name.
    pub async fn discover(database_dir: &str) -> anyhow::Result<Self> {
        let mut butlers = HashMap::new();
        let mut entries = tokio::fs::read_dir(database_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(std::ffi::OsStr::to_str) != Some("db") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(std::ffi::OsStr::to_str) else { continue };
            let url = format!("sqlite://{}", path.display());
            let pool = create_pool(&url, None).await?;
            butlers.insert(name.to_string(), pool);
        }

        Ok(Self { butlers: Arc::new(butlers) })
    }

    pub fn pool(&self, name: &str) -> Result<SqlitePool, ApiError> {
        self.butlers.get(name).cloned().ok_or_else(|| ApiError::ButlerNotFound(name.to_string()))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.butlers.keys().cloned().collect();
        names.sort();
        names
    }
}
