use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ID Types
// ============================================================================

/// Store-assigned identifier of a record in the hierarchical store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Graph Source Schema (legacy store)
// ============================================================================

/// A node of the legacy graph.
///
/// Relay nodes share this shape; their `content` is the body of a chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEntity {
    pub id: String,
    #[serde(default)]
    pub content: String,
}

/// Directed, labeled edge between two entities
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipEdge {
    pub viewer_id: String,
    pub target_id: String,
    #[serde(default = "default_relation")]
    pub relation: String,
    #[serde(default)]
    pub content: String,
}

/// Relation label used when an edge does not carry one
pub const DEFAULT_RELATION: &str = "RELATIONSHIP";

fn default_relation() -> String {
    DEFAULT_RELATION.to_string()
}

/// Edge-attached sub-node carrying a chapter; only the name is needed to
/// derive the relay entity that stores its content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphRelay {
    #[serde(default)]
    pub name: String,
}

/// A named chapter on a relationship edge, with its content resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub viewer_id: String,
    pub target_id: String,
    pub name: String,
    #[serde(default)]
    pub content: String,
}

/// Everything the legacy store knows about one viewer→target pair
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipStructure {
    pub direct: Option<RelationshipEdge>,
    #[serde(default)]
    pub relays: Vec<Option<GraphRelay>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEdge {
    pub target_entity_id: String,
}

/// One entity of the catalog together with its outgoing edges
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub entity_id: String,
    #[serde(default)]
    pub edges: Vec<CatalogEdge>,
}

// ============================================================================
// Hierarchical Store Schema (target store)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Disclosure {
    #[serde(rename = "private")]
    Private,
    #[serde(rename = "public")]
    Public,
}

impl Disclosure {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disclosure::Private => "private",
            Disclosure::Public => "public",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "private" => Some(Disclosure::Private),
            "public" => Some(Disclosure::Public),
            _ => None,
        }
    }
}

/// Write request for a single record.
///
/// The store derives the record path from `parent_path` and `title`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecord {
    pub domain: String,
    pub parent_path: String,
    pub title: String,
    pub content: String,
    pub priority: i64,
    pub disclosure: Option<Disclosure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: RecordId,
    pub domain: String,
    pub path: String,
    pub parent_path: String,
    pub title: String,
    pub content: String,
    pub priority: i64,
    pub disclosure: Option<Disclosure>,
    pub created_at: String, // RFC3339
}

// ============================================================================
// Migration Schema
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MigrationKind {
    #[serde(rename = "entity")]
    Entity,
    #[serde(rename = "relationship")]
    Relationship,
    #[serde(rename = "chapter")]
    Chapter,
}

impl MigrationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationKind::Entity => "entity",
            MigrationKind::Relationship => "relationship",
            MigrationKind::Chapter => "chapter",
        }
    }

    /// Counter name used in migration stats
    pub fn plural(&self) -> &'static str {
        match self {
            MigrationKind::Entity => "entities",
            MigrationKind::Relationship => "relationships",
            MigrationKind::Chapter => "chapters",
        }
    }

    /// Label used on operator-facing progress lines
    pub fn label(&self) -> &'static str {
        match self {
            MigrationKind::Entity => "Entity",
            MigrationKind::Relationship => "Relationship",
            MigrationKind::Chapter => "Chapter",
        }
    }
}

impl fmt::Display for MigrationKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
