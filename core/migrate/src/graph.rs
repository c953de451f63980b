use anyhow::Result;
use async_trait::async_trait;
use nocturne_schemas::{CatalogEntry, GraphEntity, RelationshipStructure};

use crate::paths;

/// Read-only access to the legacy graph store
#[async_trait]
pub trait GraphSource: Send {
    /// Fails when the source cannot be reached
    async fn ping(&mut self) -> Result<()>;

    /// Every entity together with its outgoing edges
    async fn get_catalog(&mut self) -> Result<Vec<CatalogEntry>>;

    /// `None` when the entity does not exist or carries no basic info
    async fn get_entity_info(&mut self, entity_id: &str) -> Result<Option<GraphEntity>>;

    async fn get_relationship_structure(
        &mut self,
        viewer_id: &str,
        target_id: &str,
    ) -> Result<RelationshipStructure>;

    fn derive_relay_id(&self, viewer_id: &str, chapter_name: &str, target_id: &str) -> String {
        paths::relay_id(viewer_id, chapter_name, target_id)
    }

    async fn close(&mut self) -> Result<()>;
}
