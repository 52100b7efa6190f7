//! Filter model
//!
//! This module defines the Filter taxonomy node and the derived types the
//! resolver produces from it:
//! - `Filter` flat row as persisted
//! - `FilterNode` tree node with ordered children and an optional article count
//! - `FilterStats` aggregate counts over a forest
//! - Input types for creating and updating filters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Deepest level a filter may occupy (roots are level 0).
pub const MAX_FILTER_LEVEL: i32 = 2;

/// A node in the three-level filter taxonomy, as stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    /// Opaque identifier (UUID v4 in text form)
    pub id: String,
    /// Display name
    pub name: String,
    /// URL-safe slug, unique across the whole taxonomy
    pub slug: String,
    /// Parent filter ID; `None` for roots
    pub parent_id: Option<String>,
    /// Depth from the root: 0, 1 or 2
    pub level: i32,
    /// Position among siblings
    pub order_index: i32,
    /// Optional description
    pub description: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Filter {
    /// Create a new filter with a freshly generated ID.
    ///
    /// `level` must already be derived from the parent by the caller.
    pub fn new(
        name: String,
        slug: String,
        parent_id: Option<String>,
        level: i32,
        order_index: i32,
        description: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            slug,
            parent_id,
            level,
            order_index,
            description,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether another level of filters may hang below this one
    pub fn can_have_children(&self) -> bool {
        self.level < MAX_FILTER_LEVEL
    }
}

/// Filter with its ordered children, as assembled by the resolver.
///
/// `article_count` is `None` when counts were not requested and is then
/// left out of the JSON entirely; `children` is always present and empty
/// for leaves.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterNode {
    /// The filter itself
    #[serde(flatten)]
    pub filter: Filter,
    /// Child nodes sorted by `order_index`, then `name`
    pub children: Vec<FilterNode>,
    /// Published articles directly associated with this filter
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub article_count: Option<i64>,
}

impl FilterNode {
    /// Create a leaf node
    pub fn new(filter: Filter, article_count: Option<i64>) -> Self {
        Self {
            filter,
            children: Vec::new(),
            article_count,
        }
    }

    /// Number of nodes in this subtree, including self
    pub fn total_count(&self) -> usize {
        1 + self.children.iter().map(|c| c.total_count()).sum::<usize>()
    }

    /// Flatten the subtree depth-first, parents before children
    pub fn flatten(&self) -> Vec<&FilterNode> {
        let mut result = vec![self];
        for child in &self.children {
            result.extend(child.flatten());
        }
        result
    }

    /// Depth of the deepest descendant relative to this node (0 for a leaf)
    pub fn height(&self) -> i32 {
        self.children
            .iter()
            .map(|c| 1 + c.height())
            .max()
            .unwrap_or(0)
    }

    /// All descendant IDs (not including self)
    pub fn descendant_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        for child in &self.children {
            ids.push(child.filter.id.clone());
            ids.extend(child.descendant_ids());
        }
        ids
    }

    /// Find a node by ID within this subtree
    pub fn find(&self, id: &str) -> Option<&FilterNode> {
        if self.filter.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }
}

/// Aggregate counts over the filter forest
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterStats {
    /// Total number of filters
    pub total: usize,
    /// Filters at level 0
    pub level0_count: usize,
    /// Filters at level 1
    pub level1_count: usize,
    /// Filters at level 2
    pub level2_count: usize,
    /// Filters with at least one published article
    pub with_articles_count: usize,
}

/// Input for creating a new filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateFilterInput {
    /// Display name
    pub name: String,
    /// URL-safe slug
    pub slug: String,
    /// Parent filter ID
    #[serde(default, alias = "parentId")]
    pub parent_id: Option<String>,
    /// Position among siblings (defaults to 0)
    #[serde(default, alias = "orderIndex")]
    pub order_index: Option<i32>,
    /// Optional description
    #[serde(default)]
    pub description: Option<String>,
}

/// Input for updating a filter
///
/// Double `Option`s distinguish "leave unchanged" (`None`) from
/// "clear the value" (`Some(None)`).
#[derive(Debug, Clone, Default)]
pub struct UpdateFilterInput {
    /// New name (optional)
    pub name: Option<String>,
    /// New slug (optional)
    pub slug: Option<String>,
    /// New parent ID (optional)
    pub parent_id: Option<Option<String>>,
    /// New sibling position (optional)
    pub order_index: Option<i32>,
    /// New description (optional)
    pub description: Option<Option<String>>,
}

impl UpdateFilterInput {
    /// Check if any field is set
    pub fn has_changes(&self) -> bool {
        self.name.is_some()
            || self.slug.is_some()
            || self.parent_id.is_some()
            || self.order_index.is_some()
            || self.description.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(slug: &str, parent: Option<&Filter>) -> Filter {
        Filter::new(
            slug.to_uppercase(),
            slug.to_string(),
            parent.map(|p| p.id.clone()),
            parent.map(|p| p.level + 1).unwrap_or(0),
            0,
            None,
        )
    }

    #[test]
    fn test_filter_new_generates_uuid() {
        let a = filter("crypto", None);
        let b = filter("crypto", None);

        assert_ne!(a.id, b.id);
        assert!(uuid::Uuid::parse_str(&a.id).is_ok());
        assert!(a.parent_id.is_none());
        assert!(a.can_have_children());
    }

    #[test]
    fn test_level_two_cannot_have_children() {
        let root = filter("crypto", None);
        let mid = filter("defi", Some(&root));
        let leaf = filter("lending", Some(&mid));

        assert_eq!(leaf.level, 2);
        assert!(mid.can_have_children());
        assert!(!leaf.can_have_children());
    }

    #[test]
    fn test_node_helpers() {
        let root = filter("crypto", None);
        let mid = filter("defi", Some(&root));
        let leaf = filter("lending", Some(&mid));
        let other = filter("nft", Some(&root));

        let mut mid_node = FilterNode::new(mid.clone(), None);
        mid_node.children.push(FilterNode::new(leaf.clone(), None));
        let mut root_node = FilterNode::new(root.clone(), None);
        root_node.children.push(mid_node);
        root_node.children.push(FilterNode::new(other.clone(), None));

        assert_eq!(root_node.total_count(), 4);
        assert_eq!(root_node.height(), 2);
        assert_eq!(
            root_node.descendant_ids(),
            vec![mid.id.clone(), leaf.id.clone(), other.id.clone()]
        );
        let order: Vec<&str> = root_node
            .flatten()
            .iter()
            .map(|n| n.filter.slug.as_str())
            .collect();
        assert_eq!(order, vec!["crypto", "defi", "lending", "nft"]);
        assert_eq!(root_node.find(&leaf.id).map(|n| n.filter.slug.as_str()), Some("lending"));
        assert!(root_node.find("missing").is_none());
    }

    #[test]
    fn test_node_json_omits_count_when_not_requested() {
        let node = FilterNode::new(filter("crypto", None), None);
        let json = serde_json::to_value(&node).unwrap();

        assert!(json.get("articleCount").is_none());
        assert_eq!(json["children"], serde_json::json!([]));
        assert_eq!(json["slug"], "crypto");
        assert_eq!(json["orderIndex"], 0);
        assert!(json["parentId"].is_null());
    }

    #[test]
    fn test_node_json_includes_zero_count() {
        let node = FilterNode::new(filter("crypto", None), Some(0));
        let json = serde_json::to_value(&node).unwrap();

        assert_eq!(json["articleCount"], 0);
    }

    #[test]
    fn test_create_input_accepts_both_parent_spellings() {
        let snake: CreateFilterInput =
            serde_json::from_str(r#"{"name":"DeFi","slug":"defi","parent_id":"p1"}"#).unwrap();
        let camel: CreateFilterInput =
            serde_json::from_str(r#"{"name":"DeFi","slug":"defi","parentId":"p1"}"#).unwrap();

        assert_eq!(snake.parent_id.as_deref(), Some("p1"));
        assert_eq!(camel.parent_id.as_deref(), Some("p1"));
        assert_eq!(snake.order_index, None);
    }

    #[test]
    fn test_update_input_has_changes() {
        assert!(!UpdateFilterInput::default().has_changes());
        let input = UpdateFilterInput {
            parent_id: Some(None),
            ..Default::default()
        };
        assert!(input.has_changes());
    }
}
