pub mod config;
pub mod error;
pub mod graph;
pub mod logger;
pub mod neo4j;
pub mod orchestrator;
pub mod paths;
pub mod snapshot;
pub mod store;

pub use config::{
    GraphSourceConfig, MigrationConfig, Neo4jConfig, DEFAULT_DOMAIN, DEFAULT_LOG_FILE,
};
pub use error::{ItemFailure, MigrateError};
pub use graph::GraphSource;
pub use logger::{
    MigrationAudit, MigrationErrorEntry, MigrationLogEntry, MigrationLogger, MigrationSkipEntry,
    MigrationStats,
};
pub use neo4j::Neo4jGraph;
pub use orchestrator::{
    ItemOutcome, MigrationOrchestrator, MigrationPhase, MigrationReport, RunOutcome,
};
pub use snapshot::{GraphSnapshot, SnapshotGraph};
pub use store::{HierarchicalStore, SqliteStore, StoreError};
