pub mod import;
pub mod init;
pub mod plan;
pub mod replay;
pub mod validate;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use practica_core::config::load_config_from;
use practica_core::parser::load_bank;
use practica_core::session::{SessionConfig, SessionManager};
use practica_store::{MemoryStore, SqliteStore};

/// Where commands read the question bank from.
pub struct Source {
    /// Bank file or directory, loaded into memory instead of the database.
    pub bank: Option<PathBuf>,
    /// Database override; defaults to the configured path.
    pub database: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

impl Source {
    /// Build a session manager over the selected backend.
    pub fn open(&self) -> Result<SessionManager> {
        let config = load_config_from(self.config.as_deref())?;
        let session_config = SessionConfig::from(&config);

        if let Some(path) = &self.bank {
            let bank = load_bank(path)?;
            tracing::debug!("serving bank {} from memory", path.display());
            let store = Arc::new(MemoryStore::new(bank));
            return Ok(SessionManager::new(store.clone(), store, session_config));
        }

        let database = self.database.clone().unwrap_or(config.database);
        let store = Arc::new(open_existing(&database)?);
        Ok(SessionManager::new(store.clone(), store, session_config))
    }
}

fn open_existing(database: &Path) -> Result<SqliteStore> {
    if !database.exists() {
        anyhow::bail!(
            "database not found: {} (run `practica import --bank <path>` first, or pass --bank)",
            database.display()
        );
    }
    SqliteStore::open(database)
        .with_context(|| format!("failed to open database: {}", database.display()))
}
