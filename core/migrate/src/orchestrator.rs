//! Two-phase migration from the legacy graph into the hierarchical store.
//!
//! Phase 1 creates every entity at the root of the domain. Phase 2 walks the
//! catalog again and, edge by edge, creates the relationship under its viewer
//! and the relationship's chapters under the relationship. Running the phases
//! in this order is what guarantees every parent path exists before its
//! children are written.

use nocturne_schemas::{
    CatalogEntry, Chapter, MemoryRecord, MigrationKind, NewRecord, RelationshipEdge,
};
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

use crate::config::MigrationConfig;
use crate::error::{ItemFailure, MigrateError};
use crate::graph::GraphSource;
use crate::logger::MigrationLogger;
use crate::paths;
use crate::store::HierarchicalStore;

/// Prefix of the metadata line that carries the relation label
pub const RELATION_HEADER_PREFIX: &str = "@relation: ";

/// Reason recorded for chapters whose relationship could not be created
pub const PARENT_NOT_MIGRATED: &str = "parent relationship was not migrated";

/// Steps of a run, in order. A run never moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationPhase {
    Start,
    Preflight,
    Confirm,
    InitTarget,
    ReadCatalog,
    Entities,
    Edges,
    Finalize,
    Done,
}

impl fmt::Display for MigrationPhase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let label = match self {
            MigrationPhase::Start => "start",
            MigrationPhase::Preflight => "preflight",
            MigrationPhase::Confirm => "confirm",
            MigrationPhase::InitTarget => "init target",
            MigrationPhase::ReadCatalog => "read catalog",
            MigrationPhase::Entities => "migrate entities",
            MigrationPhase::Edges => "migrate relationships & chapters",
            MigrationPhase::Finalize => "finalize",
            MigrationPhase::Done => "done",
        };
        write!(f, "{}", label)
    }
}

/// Result of migrating a single graph object
#[derive(Debug)]
pub enum ItemOutcome {
    Migrated(MemoryRecord),
    Skipped(String),
    Failed(ItemFailure),
}

impl ItemOutcome {
    pub fn is_migrated(&self) -> bool {
        matches!(self, ItemOutcome::Migrated(_))
    }
}

/// Everything a finished run leaves behind
#[derive(Debug)]
pub struct MigrationReport {
    pub logger: MigrationLogger,
    /// Where the audit document was written; `None` if persisting failed
    pub audit_path: Option<PathBuf>,
}

#[derive(Debug)]
pub enum RunOutcome {
    /// The operator declined; nothing was written
    Declined,
    Completed(MigrationReport),
}

pub struct MigrationOrchestrator<G, S> {
    config: MigrationConfig,
    source: G,
    store: S,
    logger: MigrationLogger,
    phase: MigrationPhase,
}

impl<G: GraphSource, S: HierarchicalStore> MigrationOrchestrator<G, S> {
    pub fn new(config: MigrationConfig, source: G, store: S) -> Self {
        Self {
            config,
            source,
            store,
            logger: MigrationLogger::new(),
            phase: MigrationPhase::Start,
        }
    }

    fn enter(&mut self, phase: MigrationPhase) {
        debug!("Migration phase: {} -> {}", self.phase, phase);
        self.phase = phase;
    }

    /// Run the whole migration.
    ///
    /// `confirm` receives the target domain and decides whether writing may
    /// begin. Errors are returned only for failures that happen before the
    /// first write; per-item failures end up in the report's logger.
    pub async fn run<F>(mut self, confirm: F) -> Result<RunOutcome, MigrateError>
    where
        F: FnOnce(&str) -> bool,
    {
        self.enter(MigrationPhase::Preflight);
        self.source
            .ping()
            .await
            .map_err(MigrateError::SourceUnavailable)?;
        if let Err(e) = self.store.ping().await {
            return Err(self.abort(MigrateError::TargetUnavailable(e)).await);
        }

        self.enter(MigrationPhase::Confirm);
        if !confirm(self.config.domain.as_str()) {
            info!("Aborted by user.");
            self.close_collaborators().await;
            return Ok(RunOutcome::Declined);
        }

        self.enter(MigrationPhase::InitTarget);
        if let Err(e) = self.store.init_schema().await {
            return Err(self.abort(MigrateError::SchemaInit(e)).await);
        }

        self.enter(MigrationPhase::ReadCatalog);
        let catalog = match self.source.get_catalog().await {
            Ok(catalog) => catalog,
            Err(e) => return Err(self.abort(MigrateError::CatalogRead(e)).await),
        };
        info!("Found {} entities in catalog", catalog.len());

        self.enter(MigrationPhase::Entities);
        info!("Migrating entities -> {}://...", self.config.domain);
        for entry in &catalog {
            let outcome = self.migrate_entity(&entry.entity_id).await;
            self.record(MigrationKind::Entity, &entry.entity_id, outcome);
        }

        self.enter(MigrationPhase::Edges);
        info!("Migrating relationships & chapters -> {}://...", self.config.domain);
        for entry in &catalog {
            self.migrate_edges(entry).await;
        }

        self.enter(MigrationPhase::Finalize);
        let report = self.finalize().await;

        self.enter(MigrationPhase::Done);
        Ok(RunOutcome::Completed(report))
    }

    /// Migrate one entity as a root-level record
    pub async fn migrate_entity(&mut self, entity_id: &str) -> ItemOutcome {
        if paths::is_relay_id(entity_id) {
            return ItemOutcome::Skipped("relay entity".to_string());
        }

        let entity = match self.source.get_entity_info(entity_id).await {
            Ok(Some(entity)) => entity,
            Ok(None) => return ItemOutcome::Failed(ItemFailure::EntityNotFound),
            Err(e) => return ItemOutcome::Failed(ItemFailure::SourceRead(e)),
        };

        self.write("", entity_id, entity.content).await
    }

    /// Migrate one relationship under its viewer entity.
    ///
    /// The path comes from the catalog pair; `edge` only supplies the body.
    pub async fn migrate_relationship(
        &mut self,
        viewer_id: &str,
        target_id: &str,
        edge: &RelationshipEdge,
    ) -> ItemOutcome {
        if edge.viewer_id != viewer_id || edge.target_id != target_id {
            warn!(
                "Edge data for {} names {} > {}; using the catalog pair",
                paths::relationship_source_id(viewer_id, target_id),
                edge.viewer_id,
                edge.target_id
            );
        }
        let content = relationship_content(&edge.relation, &edge.content);
        self.write(&paths::entity_path(viewer_id), target_id, content)
            .await
    }

    /// Migrate one chapter under its relationship
    pub async fn migrate_chapter(
        &mut self,
        viewer_id: &str,
        target_id: &str,
        chapter_name: &str,
    ) -> ItemOutcome {
        let relay_id = self
            .source
            .derive_relay_id(viewer_id, chapter_name, target_id);

        let chapter = match self.source.get_entity_info(&relay_id).await {
            Ok(Some(relay)) => Chapter {
                viewer_id: viewer_id.to_string(),
                target_id: target_id.to_string(),
                name: chapter_name.to_string(),
                content: relay.content,
            },
            Ok(None) => return ItemOutcome::Failed(ItemFailure::RelayNotFound),
            Err(e) => return ItemOutcome::Failed(ItemFailure::SourceRead(e)),
        };

        let parent_path = paths::relationship_path(&chapter.viewer_id, &chapter.target_id);
        self.write(&parent_path, &chapter.name, chapter.content).await
    }

    async fn migrate_edges(&mut self, entry: &CatalogEntry) {
        let viewer_id = entry.entity_id.as_str();

        for edge in &entry.edges {
            let target_id = edge.target_entity_id.as_str();
            let rel_source = paths::relationship_source_id(viewer_id, target_id);

            let structure = match self
                .source
                .get_relationship_structure(viewer_id, target_id)
                .await
            {
                Ok(structure) => structure,
                Err(e) => {
                    let outcome = ItemOutcome::Failed(ItemFailure::SourceRead(e));
                    self.record(MigrationKind::Relationship, &rel_source, outcome);
                    continue;
                }
            };

            let direct = match structure.direct {
                Some(direct) => direct,
                None => {
                    let outcome = ItemOutcome::Failed(ItemFailure::RelationshipNotFound);
                    self.record(MigrationKind::Relationship, &rel_source, outcome);
                    continue;
                }
            };

            let outcome = self.migrate_relationship(viewer_id, target_id, &direct).await;
            let parent_migrated = outcome.is_migrated();
            self.record(MigrationKind::Relationship, &rel_source, outcome);

            let chapter_names = structure
                .relays
                .into_iter()
                .flatten()
                .map(|relay| relay.name)
                .filter(|name| !name.is_empty());

            for chapter_name in chapter_names {
                let chap_source = paths::chapter_source_id(viewer_id, target_id, &chapter_name);
                let outcome = if parent_migrated {
                    self.migrate_chapter(viewer_id, target_id, &chapter_name).await
                } else {
                    ItemOutcome::Skipped(PARENT_NOT_MIGRATED.to_string())
                };
                self.record(MigrationKind::Chapter, &chap_source, outcome);
            }
        }
    }

    async fn write(&mut self, parent_path: &str, title: &str, content: String) -> ItemOutcome {
        let request = NewRecord {
            domain: self.config.domain.clone(),
            parent_path: parent_path.to_string(),
            title: title.to_string(),
            content,
            priority: 0,
            disclosure: None,
        };

        match self.store.create_record(request).await {
            Ok(record) => ItemOutcome::Migrated(record),
            Err(e) => ItemOutcome::Failed(ItemFailure::WriteRejected(e)),
        }
    }

    /// Route an item outcome to the audit log and the progress output
    fn record(&mut self, kind: MigrationKind, source_id: &str, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Migrated(record) => {
                info!(
                    "  [OK] {}: {} -> {}",
                    kind.label(),
                    source_id,
                    paths::display_uri(&record.domain, &record.path)
                );
                self.logger
                    .record_success(kind, source_id, &record.path, record.id);
            }
            ItemOutcome::Skipped(reason) => {
                info!("  [SKIP] {}: {} ({})", kind.label(), source_id, reason);
                // Relay entities are not migration units and stay out of the audit
                if kind == MigrationKind::Chapter {
                    self.logger.record_skip(kind, source_id, &reason);
                }
            }
            ItemOutcome::Failed(failure) => {
                let message = failure.to_string();
                error!("  [ERR] {}: {} - {}", kind.label(), source_id, message);
                self.logger.record_failure(kind, source_id, &message);
            }
        }
    }

    async fn finalize(&mut self) -> MigrationReport {
        let audit_path = match self.logger.persist(&self.config.log_file) {
            Ok(()) => Some(self.config.log_file.clone()),
            Err(e) => {
                error!("Failed to save migration log: {:#}", e);
                None
            }
        };

        self.close_collaborators().await;
        info!("Migration complete!");

        MigrationReport {
            logger: std::mem::take(&mut self.logger),
            audit_path,
        }
    }

    /// Release both collaborators before surfacing a fatal error
    async fn abort(&mut self, err: MigrateError) -> MigrateError {
        error!("Migration aborted during {}: {}", self.phase, err);
        self.close_collaborators().await;
        err
    }

    async fn close_collaborators(&mut self) {
        if let Err(e) = self.store.close().await {
            warn!("Failed to close target store: {:#}", e);
        }
        if let Err(e) = self.source.close().await {
            warn!("Failed to close graph source: {:#}", e);
        }
    }
}

/// Relationship body with the relation label preserved as a header line
pub fn relationship_content(relation: &str, content: &str) -> String {
    format!("{}{}\n\n{}", RELATION_HEADER_PREFIX, relation, content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relationship_content_header() {
        let content = relationship_content("KNOWS", "old friend");
        assert_eq!(content, "@relation: KNOWS\n\nold friend");
        assert!(content.starts_with(RELATION_HEADER_PREFIX));
    }

    #[test]
    fn test_relationship_content_with_empty_body() {
        assert_eq!(relationship_content("RELATIONSHIP", ""), "@relation: RELATIONSHIP\n\n");
    }

    #[test]
    fn test_phase_labels() {
        assert_eq!(MigrationPhase::Entities.to_string(), "migrate entities");
        assert_eq!(MigrationPhase::Done.to_string(), "done");
    }
}
