//! Mapping between legacy graph identifiers and hierarchical record paths.
//!
//! | Graph object            | Path                 |
//! |-------------------------|----------------------|
//! | entity `A`              | `A`                  |
//! | relationship `A → B`    | `A/B`                |
//! | chapter `n` on `A → B`  | `A/B/n`              |
//!
//! Everything here is pure; nothing touches either store.

/// Separator between path segments in the hierarchical store
pub const PATH_SEPARATOR: char = '/';

/// Prefix marking relay entities in the legacy graph
pub const RELAY_PREFIX: &str = "relay__";

const RELAY_SEPARATOR: &str = "__";

pub fn entity_path(entity_id: &str) -> String {
    entity_id.to_string()
}

pub fn relationship_path(viewer_id: &str, target_id: &str) -> String {
    join_path(&entity_path(viewer_id), target_id)
}

pub fn chapter_path(viewer_id: &str, target_id: &str, chapter_name: &str) -> String {
    join_path(&relationship_path(viewer_id, target_id), chapter_name)
}

/// Append a segment to a parent path; the empty parent is the domain root.
pub fn join_path(parent_path: &str, title: &str) -> String {
    if parent_path.is_empty() {
        title.to_string()
    } else {
        format!("{}{}{}", parent_path, PATH_SEPARATOR, title)
    }
}

/// Identifier of the relay entity holding a chapter's content.
///
/// Argument order follows the legacy graph client: viewer, chapter, target.
pub fn relay_id(viewer_id: &str, chapter_name: &str, target_id: &str) -> String {
    format!(
        "{}{}{}{}{}{}",
        RELAY_PREFIX, viewer_id, RELAY_SEPARATOR, chapter_name, RELAY_SEPARATOR, target_id
    )
}

pub fn is_relay_id(entity_id: &str) -> bool {
    entity_id.starts_with(RELAY_PREFIX)
}

/// Audit-log identifier of a relationship, e.g. `rel:A>B`
pub fn relationship_source_id(viewer_id: &str, target_id: &str) -> String {
    format!("rel:{}>{}", viewer_id, target_id)
}

/// Audit-log identifier of a chapter, e.g. `chap:A>B:first`
pub fn chapter_source_id(viewer_id: &str, target_id: &str, chapter_name: &str) -> String {
    format!("chap:{}>{}:{}", viewer_id, target_id, chapter_name)
}

/// Operator-facing address, e.g. `core://A/B`
pub fn display_uri(domain: &str, path: &str) -> String {
    format!("{}://{}", domain, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_follow_graph_structure() {
        assert_eq!(entity_path("nocturne"), "nocturne");
        assert_eq!(relationship_path("nocturne", "salem"), "nocturne/salem");
        assert_eq!(
            chapter_path("nocturne", "salem", "first_meeting"),
            "nocturne/salem/first_meeting"
        );
    }

    #[test]
    fn test_join_path_at_root() {
        assert_eq!(join_path("", "a"), "a");
        assert_eq!(join_path("a/b", "c"), chapter_path("a", "b", "c"));
    }

    #[test]
    fn test_relay_id_is_stable() {
        let first = relay_id("nocturne", "first_meeting", "salem");
        let second = relay_id("nocturne", "first_meeting", "salem");
        assert_eq!(first, second);
        assert_eq!(first, "relay__nocturne__first_meeting__salem");
        assert!(is_relay_id(&first));
        assert!(!is_relay_id("nocturne"));
    }

    #[test]
    fn test_source_ids_and_uri() {
        assert_eq!(relationship_source_id("a", "b"), "rel:a>b");
        assert_eq!(chapter_source_id("a", "b", "c"), "chap:a>b:c");
        assert_eq!(display_uri("core", "a/b"), "core://a/b");
    }
}
