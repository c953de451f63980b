use anyhow::{Context, Result};
use async_trait::async_trait;
use nocturne_schemas::{
    CatalogEdge, CatalogEntry, Chapter, GraphEntity, GraphRelay, RelationshipEdge,
    RelationshipStructure,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::graph::GraphSource;
use crate::paths;

/// JSON export of the legacy graph store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(default)]
    pub entities: Vec<GraphEntity>,
    #[serde(default)]
    pub relationships: Vec<RelationshipEdge>,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
}

/// [`GraphSource`] served from a [`GraphSnapshot`].
///
/// Chapters are stored the way the legacy graph stores them: as relay
/// entities listed in the catalog, keyed by their derived relay id.
pub struct SnapshotGraph {
    catalog: Vec<CatalogEntry>,
    entities: HashMap<String, GraphEntity>,
    relationships: HashMap<(String, String), RelationshipEdge>,
    relays: HashMap<(String, String), Vec<GraphRelay>>,
    closed: bool,
}

impl SnapshotGraph {
    /// Load a snapshot from a path or a `file://` URL
    pub async fn open(location: &str) -> Result<Self> {
        let path = snapshot_path(location);
        let raw = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read graph snapshot {}", path.display()))?;
        let snapshot: GraphSnapshot = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid graph snapshot {}", path.display()))?;

        let graph = Self::from_snapshot(snapshot)
            .with_context(|| format!("Invalid graph snapshot {}", path.display()))?;
        info!(
            "Loaded graph snapshot {} ({} catalog entries)",
            path.display(),
            graph.catalog.len()
        );
        Ok(graph)
    }

    /// Index a snapshot. Two chapters sharing a name on one edge would share
    /// a relay entity, so such a snapshot is rejected.
    pub fn from_snapshot(snapshot: GraphSnapshot) -> Result<Self> {
        let mut catalog: Vec<CatalogEntry> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut entities = HashMap::new();
        let mut relationships = HashMap::new();
        let mut relays: HashMap<(String, String), Vec<GraphRelay>> = HashMap::new();

        for entity in snapshot.entities {
            catalog_position(&mut catalog, &mut positions, &entity.id);
            entities.insert(entity.id.clone(), entity);
        }

        for edge in snapshot.relationships {
            add_edge(&mut catalog, &mut positions, &edge.viewer_id, &edge.target_id);
            relationships.insert((edge.viewer_id.clone(), edge.target_id.clone()), edge);
        }

        let mut relay_entities = Vec::new();
        for chapter in snapshot.chapters {
            add_edge(&mut catalog, &mut positions, &chapter.viewer_id, &chapter.target_id);

            let relay_id = paths::relay_id(&chapter.viewer_id, &chapter.name, &chapter.target_id);
            if relay_entities.iter().any(|e: &GraphEntity| e.id == relay_id) {
                anyhow::bail!(
                    "duplicate chapter '{}' on {}",
                    chapter.name,
                    paths::relationship_source_id(&chapter.viewer_id, &chapter.target_id)
                );
            }
            relays
                .entry((chapter.viewer_id.clone(), chapter.target_id.clone()))
                .or_default()
                .push(GraphRelay {
                    name: chapter.name.clone(),
                });
            relay_entities.push(GraphEntity {
                id: relay_id,
                content: chapter.content,
            });
        }

        for entity in relay_entities {
            catalog_position(&mut catalog, &mut positions, &entity.id);
            entities.insert(entity.id.clone(), entity);
        }

        Ok(Self {
            catalog,
            entities,
            relationships,
            relays,
            closed: false,
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            anyhow::bail!("graph snapshot is closed");
        }
        Ok(())
    }
}

fn snapshot_path(location: &str) -> PathBuf {
    let trimmed = location.strip_prefix("file://").unwrap_or(location);
    Path::new(trimmed).to_path_buf()
}

fn catalog_position(
    catalog: &mut Vec<CatalogEntry>,
    positions: &mut HashMap<String, usize>,
    entity_id: &str,
) -> usize {
    if let Some(&idx) = positions.get(entity_id) {
        return idx;
    }
    catalog.push(CatalogEntry {
        entity_id: entity_id.to_string(),
        edges: Vec::new(),
    });
    positions.insert(entity_id.to_string(), catalog.len() - 1);
    catalog.len() - 1
}

fn add_edge(
    catalog: &mut Vec<CatalogEntry>,
    positions: &mut HashMap<String, usize>,
    viewer_id: &str,
    target_id: &str,
) {
    let idx = catalog_position(catalog, positions, viewer_id);
    let edges = &mut catalog[idx].edges;
    if !edges.iter().any(|e| e.target_entity_id == target_id) {
        edges.push(CatalogEdge {
            target_entity_id: target_id.to_string(),
        });
    }
}

#[async_trait]
impl GraphSource for SnapshotGraph {
    async fn ping(&mut self) -> Result<()> {
        self.ensure_open()
    }

    async fn get_catalog(&mut self) -> Result<Vec<CatalogEntry>> {
        self.ensure_open()?;
        Ok(self.catalog.clone())
    }

    async fn get_entity_info(&mut self, entity_id: &str) -> Result<Option<GraphEntity>> {
        self.ensure_open()?;
        Ok(self.entities.get(entity_id).cloned())
    }

    async fn get_relationship_structure(
        &mut self,
        viewer_id: &str,
        target_id: &str,
    ) -> Result<RelationshipStructure> {
        self.ensure_open()?;
        let key = (viewer_id.to_string(), target_id.to_string());
        Ok(RelationshipStructure {
            direct: self.relationships.get(&key).cloned(),
            relays: self
                .relays
                .get(&key)
                .map(|relays| relays.iter().cloned().map(Some).collect())
                .unwrap_or_default(),
        })
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_snapshot() -> GraphSnapshot {
        serde_json::from_value(serde_json::json!({
            "entities": [
                { "id": "nocturne", "content": "The night keeper" },
                { "id": "salem", "content": "A black cat" }
            ],
            "relationships": [
                { "viewer_id": "nocturne", "target_id": "salem", "relation": "KNOWS", "content": "old friend" },
                { "viewer_id": "ghost", "target_id": "nocturne", "content": "haunts" }
            ],
            "chapters": [
                { "viewer_id": "nocturne", "target_id": "salem", "name": "first_meeting", "content": "rainy night" },
                { "viewer_id": "salem", "target_id": "nocturne", "name": "grudge", "content": "stolen fish" }
            ]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_catalog_derivation() {
        let mut graph = SnapshotGraph::from_snapshot(sample_snapshot()).unwrap();
        let catalog = graph.get_catalog().await.unwrap();

        let ids: Vec<&str> = catalog.iter().map(|c| c.entity_id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "nocturne",
                "salem",
                "ghost",
                "relay__nocturne__first_meeting__salem",
                "relay__salem__grudge__nocturne",
            ]
        );

        // Relationship and chapter on the same pair collapse to one edge
        assert_eq!(catalog[0].edges.len(), 1);
        assert_eq!(catalog[0].edges[0].target_entity_id, "salem");
        assert_eq!(catalog[1].edges[0].target_entity_id, "nocturne");
        assert!(catalog[3].edges.is_empty());
    }

    #[tokio::test]
    async fn test_relationship_structure() {
        let mut graph = SnapshotGraph::from_snapshot(sample_snapshot()).unwrap();

        let structure = graph
            .get_relationship_structure("nocturne", "salem")
            .await
            .unwrap();
        let direct = structure.direct.unwrap();
        assert_eq!(direct.relation, "KNOWS");
        assert_eq!(structure.relays, vec![Some(GraphRelay { name: "first_meeting".into() })]);

        let ghost = graph.get_relationship_structure("ghost", "nocturne").await.unwrap();
        assert_eq!(ghost.direct.unwrap().relation, "RELATIONSHIP");

        // Chapter without a direct relationship
        let orphan = graph.get_relationship_structure("salem", "nocturne").await.unwrap();
        assert!(orphan.direct.is_none());
        assert_eq!(orphan.relays.len(), 1);

        let none = graph.get_relationship_structure("salem", "ghost").await.unwrap();
        assert_eq!(none, RelationshipStructure::default());
    }

    #[tokio::test]
    async fn test_relay_content_is_reachable() {
        let mut graph = SnapshotGraph::from_snapshot(sample_snapshot()).unwrap();
        let relay_id = graph.derive_relay_id("nocturne", "first_meeting", "salem");

        let relay = graph.get_entity_info(&relay_id).await.unwrap().unwrap();
        assert_eq!(relay.content, "rainy night");
        assert!(graph.get_entity_info("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_open_from_file_url() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("graph.json");
        std::fs::write(&path, serde_json::to_string(&sample_snapshot()).unwrap()).unwrap();

        let url = format!("file://{}", path.display());
        let mut graph = SnapshotGraph::open(&url).await.unwrap();
        graph.ping().await.unwrap();
        assert_eq!(graph.get_catalog().await.unwrap().len(), 5);

        graph.close().await.unwrap();
        assert!(graph.ping().await.is_err());
    }

    #[test]
    fn test_duplicate_chapter_on_edge_is_rejected() {
        let mut snapshot = sample_snapshot();
        snapshot.chapters.push(Chapter {
            viewer_id: "nocturne".into(),
            target_id: "salem".into(),
            name: "first_meeting".into(),
            content: "a second telling".into(),
        });

        let err = SnapshotGraph::from_snapshot(snapshot).err().unwrap();
        assert_eq!(
            err.to_string(),
            "duplicate chapter 'first_meeting' on rel:nocturne>salem"
        );
    }

    #[test]
    fn test_same_chapter_name_on_other_edge_is_allowed() {
        let mut snapshot = sample_snapshot();
        snapshot.chapters.push(Chapter {
            viewer_id: "salem".into(),
            target_id: "nocturne".into(),
            name: "first_meeting".into(),
            content: "from the cat's side".into(),
        });

        assert!(SnapshotGraph::from_snapshot(snapshot).is_ok());
    }

    #[tokio::test]
    async fn test_open_missing_file_fails() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(SnapshotGraph::open(missing.to_str().unwrap()).await.is_err());
    }
}
