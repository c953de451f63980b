// Migration configuration, resolved once at startup
use std::fmt;
use std::path::PathBuf;

use crate::error::MigrateError;

/// Domain used when the operator does not pick one
pub const DEFAULT_DOMAIN: &str = "core";

/// Audit document written into the working directory
pub const DEFAULT_LOG_FILE: &str = "migration_log.json";

/// Environment variable holding the target SQLite database
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";

// Legacy Neo4j connection, named as the pre-SQLite backend named them
pub const NEO4J_URI_VAR: &str = "NEO4J_URI";
pub const NEO4J_USER_VAR: &str = "dbuser";
pub const NEO4J_PASSWORD_VAR: &str = "dbpassword";

pub const DEFAULT_NEO4J_URI: &str = "bolt://localhost:7687";
pub const DEFAULT_NEO4J_USER: &str = "neo4j";
pub const DEFAULT_NEO4J_PASSWORD: &str = "password";

/// When set, the graph is read from this JSON export instead of Neo4j
pub const GRAPH_SNAPSHOT_VAR: &str = "GRAPH_SNAPSHOT";

const SQLITE_URL_PREFIXES: &[&str] = &["sqlite+aiosqlite:///", "sqlite:///", "sqlite://", "sqlite:"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Neo4jConfig {
    pub uri: String,
    pub user: String,
    /// `None` when the environment did not provide one
    pub password: Option<String>,
}

impl Neo4jConfig {
    pub fn password(&self) -> &str {
        self.password.as_deref().unwrap_or(DEFAULT_NEO4J_PASSWORD)
    }
}

impl Default for Neo4jConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_NEO4J_URI.to_string(),
            user: DEFAULT_NEO4J_USER.to_string(),
            password: None,
        }
    }
}

/// Where the legacy graph is read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphSourceConfig {
    Neo4j(Neo4jConfig),
    /// Path or `file://` URL of a JSON export
    Snapshot(String),
}

impl fmt::Display for GraphSourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GraphSourceConfig::Neo4j(neo4j) => write!(f, "{} (user: {})", neo4j.uri, neo4j.user),
            GraphSourceConfig::Snapshot(location) => write!(f, "snapshot {}", location),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationConfig {
    pub domain: String,
    pub database_url: String,
    pub graph_source: GraphSourceConfig,
    pub log_file: PathBuf,
}

impl MigrationConfig {
    pub fn new(
        domain: impl Into<String>,
        database_url: impl Into<String>,
        graph_source: GraphSourceConfig,
    ) -> Self {
        Self {
            domain: domain.into(),
            database_url: database_url.into(),
            graph_source,
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }

    pub fn with_log_file(mut self, log_file: impl Into<PathBuf>) -> Self {
        self.log_file = log_file.into();
        self
    }

    /// Build from the process environment
    pub fn from_env(domain: impl Into<String>) -> Result<Self, MigrateError> {
        Self::from_lookup(domain, |key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    ///
    /// `DATABASE_URL` is required. The Neo4j descriptors fall back to the
    /// legacy defaults unless `GRAPH_SNAPSHOT` selects an offline export.
    pub fn from_lookup<F>(domain: impl Into<String>, lookup: F) -> Result<Self, MigrateError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let database_url =
            non_empty(DATABASE_URL_VAR).ok_or(MigrateError::MissingConfig(DATABASE_URL_VAR))?;

        let graph_source = match non_empty(GRAPH_SNAPSHOT_VAR) {
            Some(location) => GraphSourceConfig::Snapshot(location),
            None => GraphSourceConfig::Neo4j(Neo4jConfig {
                uri: non_empty(NEO4J_URI_VAR).unwrap_or_else(|| DEFAULT_NEO4J_URI.to_string()),
                user: non_empty(NEO4J_USER_VAR).unwrap_or_else(|| DEFAULT_NEO4J_USER.to_string()),
                password: non_empty(NEO4J_PASSWORD_VAR),
            }),
        };

        Ok(Self::new(domain, database_url, graph_source))
    }

    /// Non-fatal problems the operator should see before confirming
    pub fn preflight_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if let GraphSourceConfig::Neo4j(neo4j) = &self.graph_source {
            if neo4j.password.is_none() {
                warnings.push(format!(
                    "{} not set in .env; using default '{}'.",
                    NEO4J_PASSWORD_VAR, DEFAULT_NEO4J_PASSWORD
                ));
            }
        }
        warnings
    }

    /// Filesystem path of the SQLite database, with any URL scheme removed
    pub fn database_path(&self) -> PathBuf {
        let url = self.database_url.as_str();
        let path = SQLITE_URL_PREFIXES
            .iter()
            .find_map(|prefix| url.strip_prefix(prefix))
            .unwrap_or(url);
        PathBuf::from(path)
    }
}
