//! [`GraphSource`] over the legacy Neo4j backend.
//!
//! Graph layout the queries read:
//!
//! - `(:Entity {id, content})`
//! - `(viewer:Entity)-[:DIRECT_EDGE {relation, content}]->(target:Entity)`
//! - `(viewer)-[:RELAY_EDGE]->(relay:Entity {id, name, content})-[:RELAY_EDGE]->(target)`
//!
//! Rows become schema records here; Bolt values never leave this module.

use anyhow::{Context, Result};
use async_trait::async_trait;
use neo4rs::{Graph, Query, Row};
use nocturne_schemas::{
    CatalogEdge, CatalogEntry, GraphEntity, GraphRelay, RelationshipEdge, RelationshipStructure,
    DEFAULT_RELATION,
};
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::Neo4jConfig;
use crate::graph::GraphSource;

const PING_QUERY: &str = "RETURN 1 AS ok";

/// Every entity with the distinct targets of its direct and relay edges
const CATALOG_QUERY: &str = "MATCH (e:Entity) \
     OPTIONAL MATCH (e)-[:DIRECT_EDGE]->(d:Entity) \
     WITH e, collect(DISTINCT d.id) AS direct_targets \
     OPTIONAL MATCH (e)-[:RELAY_EDGE]->(:Entity)-[:RELAY_EDGE]->(r:Entity) \
     WITH e, direct_targets, collect(DISTINCT r.id) AS relay_targets \
     RETURN e.id AS entity_id, direct_targets + relay_targets AS targets \
     ORDER BY entity_id";

const ENTITY_QUERY: &str = "MATCH (e:Entity {id: $id}) \
     RETURN e.content AS content \
     LIMIT 1";

const DIRECT_EDGE_QUERY: &str = "MATCH (v:Entity {id: $viewer_id})-[d:DIRECT_EDGE]->(t:Entity {id: $target_id}) \
     RETURN d.relation AS relation, d.content AS content \
     LIMIT 1";

const RELAYS_QUERY: &str = "MATCH (v:Entity {id: $viewer_id})-[:RELAY_EDGE]->(relay:Entity)-[:RELAY_EDGE]->(t:Entity {id: $target_id}) \
     RETURN relay.name AS name \
     ORDER BY relay.id";

/// Neo4j-backed graph source. The connection is made by `ping`.
pub struct Neo4jGraph {
    config: Neo4jConfig,
    graph: Option<Graph>,
}

impl Neo4jGraph {
    pub fn new(config: Neo4jConfig) -> Self {
        Self {
            config,
            graph: None,
        }
    }

    fn graph(&self) -> Result<&Graph> {
        self.graph
            .as_ref()
            .context("Neo4j source is not connected; call ping first")
    }

    async fn rows(&self, query: Query) -> Result<Vec<Row>> {
        let mut stream = self.graph()?.execute(query).await?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await? {
            rows.push(row);
        }
        Ok(rows)
    }
}

fn column<'row, T: Deserialize<'row>>(row: &'row Row, key: &str) -> Result<T> {
    row.get::<T>(key)
        .with_context(|| format!("Unexpected value in column '{}'", key))
}

/// Catalog entry with duplicate and empty targets removed, first occurrence kept
fn catalog_entry(entity_id: String, targets: Vec<String>) -> CatalogEntry {
    let mut edges: Vec<CatalogEdge> = Vec::new();
    for target in targets {
        if target.is_empty() || edges.iter().any(|e| e.target_entity_id == target) {
            continue;
        }
        edges.push(CatalogEdge {
            target_entity_id: target,
        });
    }
    CatalogEntry { entity_id, edges }
}

fn relationship_edge(
    viewer_id: &str,
    target_id: &str,
    relation: Option<String>,
    content: Option<String>,
) -> RelationshipEdge {
    RelationshipEdge {
        viewer_id: viewer_id.to_string(),
        target_id: target_id.to_string(),
        relation: relation
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_RELATION.to_string()),
        content: content.unwrap_or_default(),
    }
}

fn relay(name: Option<String>) -> Option<GraphRelay> {
    name.map(|name| GraphRelay { name })
}

#[async_trait]
impl GraphSource for Neo4jGraph {
    async fn ping(&mut self) -> Result<()> {
        if self.graph.is_none() {
            let graph = Graph::new(&self.config.uri, &self.config.user, self.config.password())
                .with_context(|| format!("Failed to connect to Neo4j at {}", self.config.uri))?;
            self.graph = Some(graph);
        }

        let rows = self.rows(Query::new(PING_QUERY.to_string())).await;
        if let Err(e) = rows {
            self.graph = None;
            return Err(e.context(format!("Neo4j at {} did not answer", self.config.uri)));
        }

        info!("Connected to Neo4j at {}", self.config.uri);
        Ok(())
    }

    async fn get_catalog(&mut self) -> Result<Vec<CatalogEntry>> {
        let rows = self
            .rows(Query::new(CATALOG_QUERY.to_string()))
            .await
            .context("Failed to read Neo4j catalog")?;

        rows.iter()
            .map(|row| {
                let entity_id: String = column(row, "entity_id")?;
                let targets: Vec<String> = column(row, "targets")?;
                Ok(catalog_entry(entity_id, targets))
            })
            .collect()
    }

    async fn get_entity_info(&mut self, entity_id: &str) -> Result<Option<GraphEntity>> {
        let query = Query::new(ENTITY_QUERY.to_string()).param("id", entity_id.to_string());
        let rows = self
            .rows(query)
            .await
            .with_context(|| format!("Failed to read entity {}", entity_id))?;

        match rows.first() {
            Some(row) => {
                let content: Option<String> = column(row, "content")?;
                Ok(Some(GraphEntity {
                    id: entity_id.to_string(),
                    content: content.unwrap_or_default(),
                }))
            }
            None => Ok(None),
        }
    }

    async fn get_relationship_structure(
        &mut self,
        viewer_id: &str,
        target_id: &str,
    ) -> Result<RelationshipStructure> {
        let direct_query = Query::new(DIRECT_EDGE_QUERY.to_string())
            .param("viewer_id", viewer_id.to_string())
            .param("target_id", target_id.to_string());
        let direct = match self.rows(direct_query).await?.first() {
            Some(row) => Some(relationship_edge(
                viewer_id,
                target_id,
                column(row, "relation")?,
                column(row, "content")?,
            )),
            None => None,
        };

        let relays_query = Query::new(RELAYS_QUERY.to_string())
            .param("viewer_id", viewer_id.to_string())
            .param("target_id", target_id.to_string());
        let relays = self
            .rows(relays_query)
            .await?
            .iter()
            .map(|row| column::<Option<String>>(row, "name").map(relay))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            "Structure {} > {}: direct={}, relays={}",
            viewer_id,
            target_id,
            direct.is_some(),
            relays.len()
        );
        Ok(RelationshipStructure { direct, relays })
    }

    async fn close(&mut self) -> Result<()> {
        if self.graph.take().is_some() {
            debug!("Neo4j connection released");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_entry_dedupes_targets() {
        let entry = catalog_entry(
            "nocturne".to_string(),
            vec!["salem".into(), "".into(), "ghost".into(), "salem".into()],
        );
        let targets: Vec<&str> = entry
            .edges
            .iter()
            .map(|e| e.target_entity_id.as_str())
            .collect();
        assert_eq!(targets, vec!["salem", "ghost"]);
    }

    #[test]
    fn test_relationship_edge_fills_missing_properties() {
        let edge = relationship_edge("a", "b", None, None);
        assert_eq!(edge.relation, DEFAULT_RELATION);
        assert_eq!(edge.content, "");

        let edge = relationship_edge("a", "b", Some("KNOWS".into()), Some("old friend".into()));
        assert_eq!(edge.relation, "KNOWS");
        assert_eq!(edge.content, "old friend");
        assert_eq!((edge.viewer_id.as_str(), edge.target_id.as_str()), ("a", "b"));
    }

    #[test]
    fn test_unnamed_relay_is_kept_as_none() {
        assert_eq!(relay(None), None);
        assert_eq!(relay(Some("first".into())), Some(GraphRelay { name: "first".into() }));
    }

    #[tokio::test]
    async fn test_reads_before_ping_fail() {
        let mut graph = Neo4jGraph::new(Neo4jConfig::default());
        let err = graph.get_catalog().await.unwrap_err();
        assert!(format!("{:#}", err).contains("not connected"));
        assert!(graph.get_entity_info("nocturne").await.is_err());

        graph.close().await.unwrap();
    }
}
