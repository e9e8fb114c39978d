//! Pipeline configuration
//!
//! A single TOML file describes one allocation run: the two databases, the
//! identifier authority, the organism, and the file paths. Credentials and
//! connection strings can be overridden through the environment so the
//! config file can live in version control.

use idalloc_common::{AllocError, Result};
use idalloc_engine::osid::OsidConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct EventsConfig {
    /// Connection string of the curation database holding the event tables
    pub database_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Connection string of the session-service database
    pub database_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrganismConfig {
    /// Organism production name, as known to the identifier authority
    pub name: String,
    /// Production database name recorded with each session
    pub production_database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineMeta {
    /// Assigning-application name registered in the session store
    pub name: String,
    pub version: String,
    /// Commit message recorded with every session opened by this run
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilesConfig {
    pub input_gff: PathBuf,
    pub output_gff: PathBuf,
    /// Tab-separated gene history output
    pub history: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Curation database; absent for new-organism runs, which read the
    /// input annotation file instead
    pub events: Option<EventsConfig>,
    pub session: SessionConfig,
    pub osid: OsidConfig,
    pub organism: OrganismConfig,
    pub pipeline: PipelineMeta,
    pub files: FilesConfig,
    /// Abort on duplicate source ids instead of last-write-wins
    #[serde(default)]
    pub strict_index: bool,
}

impl PipelineConfig {
    /// Load the config file and apply environment overrides.
    ///
    /// Environment variables:
    /// - `IDALLOC_EVENTS_DATABASE_URL`
    /// - `IDALLOC_SESSION_DATABASE_URL`
    /// - `OSID_USER` / `OSID_PASS`
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AllocError::config(format!("cannot read config file '{}': {e}", path.display()))
        })?;
        let mut config: PipelineConfig = toml::from_str(&raw)
            .map_err(|e| AllocError::config(format!("invalid config '{}': {e}", path.display())))?;

        if let Ok(url) = std::env::var("IDALLOC_EVENTS_DATABASE_URL") {
            config.events = Some(EventsConfig { database_url: url });
        }
        if let Ok(url) = std::env::var("IDALLOC_SESSION_DATABASE_URL") {
            config.session.database_url = url;
        }
        if let Ok(user) = std::env::var("OSID_USER") {
            config.osid.user = user;
        }
        if let Ok(password) = std::env::var("OSID_PASS") {
            config.osid.password = password;
        }

        Ok(config)
    }
}
