use thiserror::Error;

/// Errors that abort a run before anything is written
#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("missing configuration: {0}")]
    MissingConfig(&'static str),

    #[error("graph source unavailable: {0:#}")]
    SourceUnavailable(anyhow::Error),

    #[error("target store unavailable: {0:#}")]
    TargetUnavailable(anyhow::Error),

    #[error("failed to initialize target schema: {0:#}")]
    SchemaInit(anyhow::Error),

    #[error("failed to read graph catalog: {0:#}")]
    CatalogRead(anyhow::Error),
}

/// Why a single entity, relationship or chapter was not migrated
#[derive(Debug, Error)]
pub enum ItemFailure {
    #[error("Entity not found or has no basic info")]
    EntityNotFound,

    #[error("Relationship not found")]
    RelationshipNotFound,

    #[error("Chapter relay entity not found")]
    RelayNotFound,

    #[error("source read failed: {0:#}")]
    SourceRead(anyhow::Error),

    #[error("write rejected: {0:#}")]
    WriteRejected(anyhow::Error),
}
