//! Filter service
//!
//! Implements the taxonomy resolver and the filter lifecycle:
//! - Flat rows to an ordered forest (`build_hierarchy`)
//! - Slug or UUID to filter ID (`FilterService::resolve_identifier`)
//! - Aggregate statistics over the forest
//! - Create, update (with re-parenting), guarded delete
//!
//! Rows, slugs and the uncounted forest are cached; article counts never are.
//! Every mutation drops all `filter:*` keys.

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::{DeleteOutcome, FilterRepository, SlugTakenError};
use crate::models::{
    CreateFilterInput, Filter, FilterNode, FilterStats, UpdateFilterInput, MAX_FILTER_LEVEL,
};
use anyhow::Context;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Cache key prefixes
const CACHE_KEY_ROWS: &str = "filter:rows";
const CACHE_KEY_TREE: &str = "filter:tree";
const CACHE_KEY_BY_SLUG: &str = "filter:slug:";
const CACHE_PATTERN_ALL: &str = "filter:*";

static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[1-5][0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$",
    )
    .expect("UUID pattern is valid")
});

static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").expect("slug pattern is valid"));

/// Error types for filter service operations
#[derive(Debug, thiserror::Error)]
pub enum FilterServiceError {
    /// Invalid input
    #[error("{0}")]
    Validation(String),

    /// No filter matches the identifier
    #[error("Filter not found: {0}")]
    NotFound(String),

    /// Parent filter does not exist
    #[error("Parent filter not found: {0}")]
    ParentNotFound(String),

    /// Slug already taken by another filter
    #[error("Filter slug already exists: {0}")]
    DuplicateSlug(String),

    /// Filter is still in use and was left untouched
    #[error("{0}")]
    Conflict(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Whether `value` is a canonical hyphenated UUID (versions 1 to 5)
pub fn is_uuid(value: &str) -> bool {
    UUID_RE.is_match(value)
}

/// Canonical form of a filter ID: trimmed, and lowercased when it is a UUID
pub fn normalize_id(id: &str) -> String {
    let id = id.trim();
    if is_uuid(id) {
        id.to_ascii_lowercase()
    } else {
        id.to_string()
    }
}

/// Whether `value` is a lowercase, hyphen-separated slug
pub fn is_valid_slug(value: &str) -> bool {
    SLUG_RE.is_match(value)
}

/// Assemble flat filter rows into an ordered forest.
///
/// Siblings (and roots) are sorted by `order_index`, then `name`. A row whose
/// `parent_id` points at no row in the set is promoted to a root. With
/// `counts`, every node carries `Some(count)`, 0 when absent from the map.
///
/// Construction is top-down from the roots, so rows caught in a parent cycle
/// never reach the output.
pub fn build_hierarchy(
    rows: Vec<Filter>,
    counts: Option<&HashMap<String, i64>>,
) -> Vec<FilterNode> {
    let total = rows.len();
    let known: HashSet<String> = rows.iter().map(|f| f.id.clone()).collect();

    let mut roots = Vec::new();
    let mut children_map: HashMap<String, Vec<Filter>> = HashMap::new();

    for filter in rows {
        match filter.parent_id.as_deref() {
            None => roots.push(filter),
            Some(parent) if known.contains(parent) => {
                children_map
                    .entry(parent.to_string())
                    .or_default()
                    .push(filter);
            }
            Some(parent) => {
                tracing::warn!(
                    filter_id = %filter.id,
                    slug = %filter.slug,
                    parent_id = %parent,
                    "Filter references a missing parent; treating it as a root"
                );
                roots.push(filter);
            }
        }
    }

    let mut forest: Vec<FilterNode> = roots
        .into_iter()
        .map(|root| build_subtree(root, &mut children_map, counts))
        .collect();
    sort_siblings(&mut forest);

    let attached: usize = forest.iter().map(FilterNode::total_count).sum();
    if attached < total {
        tracing::warn!(
            skipped = total - attached,
            "Filters unreachable from any root were left out of the hierarchy"
        );
    }

    forest
}

fn build_subtree(
    filter: Filter,
    children_map: &mut HashMap<String, Vec<Filter>>,
    counts: Option<&HashMap<String, i64>>,
) -> FilterNode {
    let count = counts.map(|c| c.get(&filter.id).copied().unwrap_or(0));
    let mut node = FilterNode::new(filter, count);

    // Each child list is consumed once
    if let Some(children) = children_map.remove(&node.filter.id) {
        node.children = children
            .into_iter()
            .map(|child| build_subtree(child, children_map, counts))
            .collect();
        sort_siblings(&mut node.children);
    }

    node
}

fn sort_siblings(nodes: &mut [FilterNode]) {
    nodes.sort_by(|a, b| {
        a.filter
            .order_index
            .cmp(&b.filter.order_index)
            .then_with(|| a.filter.name.cmp(&b.filter.name))
    });
}

/// Aggregate level and usage counts over a forest
pub fn compute_stats(forest: &[FilterNode]) -> FilterStats {
    let mut stats = FilterStats::default();
    for node in forest.iter().flat_map(|root| root.flatten()) {
        stats.total += 1;
        match node.filter.level {
            0 => stats.level0_count += 1,
            1 => stats.level1_count += 1,
            _ => stats.level2_count += 1,
        }
        if node.article_count.unwrap_or(0) > 0 {
            stats.with_articles_count += 1;
        }
    }
    stats
}

/// `(id, level)` for every descendant of `node`, with `node` placed at `level`
fn relevel_descendants(node: &FilterNode, level: i32, out: &mut Vec<(String, i32)>) {
    for child in &node.children {
        out.push((child.filter.id.clone(), level + 1));
        relevel_descendants(child, level + 1, out);
    }
}

/// Filter service for the taxonomy
pub struct FilterService {
    repo: Arc<dyn FilterRepository>,
    cache: Arc<Cache>,
}

impl FilterService {
    /// Create a new filter service
    pub fn new(repo: Arc<dyn FilterRepository>, cache: Arc<Cache>) -> Self {
        Self { repo, cache }
    }

    /// The whole taxonomy as an ordered forest.
    ///
    /// With `include_counts` every node carries its direct published article
    /// count. Counts are queried on every call and never cached; articles
    /// gain and lose filters without going through this service.
    pub async fn hierarchy(
        &self,
        include_counts: bool,
    ) -> Result<Vec<FilterNode>, FilterServiceError> {
        if !include_counts {
            if let Some(forest) = self
                .cache
                .get::<Vec<FilterNode>>(CACHE_KEY_TREE)
                .await
                .ok()
                .flatten()
            {
                return Ok(forest);
            }

            let forest = build_hierarchy(self.rows().await?, None);
            let _ = self.cache.set(CACHE_KEY_TREE, &forest, self.cache.ttl()).await;
            return Ok(forest);
        }

        let rows = self.rows().await?;
        let counts = self
            .repo
            .count_articles_by_filter()
            .await
            .context("Failed to count articles per filter")?;

        Ok(build_hierarchy(rows, Some(&counts)))
    }

    /// Statistics over the counted hierarchy
    pub async fn stats(&self) -> Result<FilterStats, FilterServiceError> {
        let forest = self.hierarchy(true).await?;
        Ok(compute_stats(&forest))
    }

    /// Look a filter up by UUID or by slug
    pub async fn find(&self, identifier: &str) -> Result<Filter, FilterServiceError> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(FilterServiceError::NotFound(identifier.to_string()));
        }

        if is_uuid(identifier) {
            let id = normalize_id(identifier);
            return self
                .repo
                .get_by_id(&id)
                .await
                .context("Failed to get filter by ID")?
                .ok_or_else(|| FilterServiceError::NotFound(identifier.to_string()));
        }

        let key = format!("{}{}", CACHE_KEY_BY_SLUG, identifier);
        if let Some(filter) = self.cache.get::<Filter>(&key).await.ok().flatten() {
            return Ok(filter);
        }

        let filter = self
            .repo
            .get_by_slug(identifier)
            .await
            .context("Failed to get filter by slug")?
            .ok_or_else(|| FilterServiceError::NotFound(identifier.to_string()))?;

        let _ = self.cache.set(&key, &filter, self.cache.ttl()).await;
        Ok(filter)
    }

    /// Translate a slug or UUID into a filter ID
    pub async fn resolve_identifier(&self, identifier: &str) -> Result<String, FilterServiceError> {
        self.find(identifier).await.map(|filter| filter.id)
    }

    /// Published articles directly associated with a filter
    pub async fn count_articles(&self, id: &str) -> Result<i64, FilterServiceError> {
        let filter = self.find(id).await?;
        self.repo
            .count_articles(&filter.id)
            .await
            .context("Failed to count filter articles")
            .map_err(Into::into)
    }

    /// Create a new filter
    ///
    /// # Errors
    /// - `Validation` for a missing name or slug, a malformed slug, or a parent at the deepest level
    /// - `DuplicateSlug` if the slug is taken
    /// - `ParentNotFound` if the parent doesn't exist
    pub async fn create(&self, input: CreateFilterInput) -> Result<Filter, FilterServiceError> {
        let name = required(&input.name, "name")?;
        let slug = required(&input.slug, "slug")?;
        validate_slug(&slug)?;

        if self
            .repo
            .exists_by_slug(&slug, None)
            .await
            .context("Failed to check slug uniqueness")?
        {
            return Err(FilterServiceError::DuplicateSlug(slug));
        }

        let parent_id = input.parent_id.as_deref().map(str::trim).filter(|p| !p.is_empty());
        let (parent_id, level) = match parent_id {
            Some(parent_id) => {
                let parent = self.parent(parent_id).await?;
                if !parent.can_have_children() {
                    return Err(FilterServiceError::Validation(format!(
                        "Filter '{}' is at level {} and cannot have children",
                        parent.slug, parent.level
                    )));
                }
                (Some(parent.id), parent.level + 1)
            }
            None => (None, 0),
        };

        let filter = Filter::new(
            name,
            slug,
            parent_id,
            level,
            input.order_index.unwrap_or(0),
            normalize_description(input.description),
        );

        let created = self
            .repo
            .create(&filter)
            .await
            .map_err(|e| persist_error(e, "create", &filter))?;

        self.invalidate_cache().await;
        tracing::info!(id = %created.id, slug = %created.slug, level = created.level, "Filter created");

        Ok(created)
    }

    /// Update an existing filter
    ///
    /// A parent change moves the whole subtree: descendants are re-leveled in
    /// the same transaction.
    ///
    /// # Errors
    /// - `NotFound` if the filter doesn't exist
    /// - `Validation` for bad fields, cycles, or a subtree that would sink below level 2
    /// - `DuplicateSlug` if the new slug is taken
    /// - `ParentNotFound` if the new parent doesn't exist
    pub async fn update(
        &self,
        id: &str,
        input: UpdateFilterInput,
    ) -> Result<Filter, FilterServiceError> {
        let mut filter = self
            .repo
            .get_by_id(&normalize_id(id))
            .await
            .context("Failed to get filter")?
            .ok_or_else(|| FilterServiceError::NotFound(id.to_string()))?;

        if !input.has_changes() {
            return Ok(filter);
        }

        if let Some(ref name) = input.name {
            filter.name = required(name, "name")?;
        }

        if let Some(ref slug) = input.slug {
            let slug = required(slug, "slug")?;
            validate_slug(&slug)?;
            if slug != filter.slug
                && self
                    .repo
                    .exists_by_slug(&slug, Some(&filter.id))
                    .await
                    .context("Failed to check slug uniqueness")?
            {
                return Err(FilterServiceError::DuplicateSlug(slug));
            }
            filter.slug = slug;
        }

        let mut relevel = Vec::new();
        if let Some(parent_id) = input.parent_id {
            let parent_id = parent_id
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(normalize_id);

            if parent_id != filter.parent_id {
                let level = self.check_move(&filter, parent_id.as_deref(), &mut relevel).await?;
                filter.parent_id = parent_id;
                filter.level = level;
            }
        }

        if let Some(order_index) = input.order_index {
            filter.order_index = order_index;
        }

        if let Some(description) = input.description {
            filter.description = normalize_description(description);
        }

        filter.updated_at = Utc::now();

        let updated = self
            .repo
            .update(&filter, &relevel)
            .await
            .map_err(|e| persist_error(e, "update", &filter))?;

        self.invalidate_cache().await;
        tracing::info!(
            id = %updated.id,
            slug = %updated.slug,
            relevelled = relevel.len(),
            "Filter updated"
        );

        Ok(updated)
    }

    /// Delete a filter that no article and no child filter references
    ///
    /// # Errors
    /// - `NotFound` if the filter doesn't exist
    /// - `Conflict` if it is still referenced
    pub async fn delete(&self, id: &str) -> Result<(), FilterServiceError> {
        let filter = self
            .repo
            .get_by_id(&normalize_id(id))
            .await
            .context("Failed to get filter")?
            .ok_or_else(|| FilterServiceError::NotFound(id.to_string()))?;

        let outcome = self.repo.delete(&filter.id).await.map_err(|e| {
            tracing::error!(operation = "delete", id = %filter.id, error = %e, "Failed to delete filter");
            FilterServiceError::Internal(e)
        })?;

        match outcome {
            DeleteOutcome::Deleted => {
                self.invalidate_cache().await;
                tracing::info!(id = %filter.id, slug = %filter.slug, "Filter deleted");
                Ok(())
            }
            DeleteOutcome::NotFound => Err(FilterServiceError::NotFound(id.to_string())),
            DeleteOutcome::Referenced { articles, .. } if articles > 0 => {
                Err(FilterServiceError::Conflict(format!(
                    "Filter '{}' is still referenced by {} article(s)",
                    filter.slug, articles
                )))
            }
            DeleteOutcome::Referenced { children, .. } => Err(FilterServiceError::Conflict(format!(
                "Filter '{}' still has {} child filter(s)",
                filter.slug, children
            ))),
        }
    }

    // ========================================================================
    // Private helper methods
    // ========================================================================

    async fn parent(&self, parent_id: &str) -> Result<Filter, FilterServiceError> {
        self.repo
            .get_by_id(&normalize_id(parent_id))
            .await
            .context("Failed to get parent filter")?
            .ok_or_else(|| FilterServiceError::ParentNotFound(parent_id.to_string()))
    }

    /// Every filter row, read through the cache
    async fn rows(&self) -> Result<Vec<Filter>, FilterServiceError> {
        if let Some(rows) = self.cache.get::<Vec<Filter>>(CACHE_KEY_ROWS).await.ok().flatten() {
            return Ok(rows);
        }

        let rows = self.repo.list_all().await.context("Failed to list filters")?;
        let _ = self.cache.set(CACHE_KEY_ROWS, &rows, self.cache.ttl()).await;
        Ok(rows)
    }

    /// Validate moving `filter` below `new_parent`; returns its new level and
    /// fills `relevel` with the new levels of its descendants.
    async fn check_move(
        &self,
        filter: &Filter,
        new_parent: Option<&str>,
        relevel: &mut Vec<(String, i32)>,
    ) -> Result<i32, FilterServiceError> {
        let rows = self.repo.list_all().await.context("Failed to list filters")?;
        let forest = build_hierarchy(rows, None);
        let node = forest
            .iter()
            .find_map(|root| root.find(&filter.id))
            .ok_or_else(|| FilterServiceError::NotFound(filter.id.clone()))?;

        let level = match new_parent {
            None => 0,
            Some(parent_id) => {
                if parent_id == filter.id || node.descendant_ids().iter().any(|d| d == parent_id) {
                    return Err(FilterServiceError::Validation(format!(
                        "Filter '{}' cannot be moved below itself or one of its descendants",
                        filter.slug
                    )));
                }
                self.parent(parent_id).await?.level + 1
            }
        };

        if level + node.height() > MAX_FILTER_LEVEL {
            return Err(FilterServiceError::Validation(format!(
                "Moving filter '{}' would place filters below level {}",
                filter.slug, MAX_FILTER_LEVEL
            )));
        }

        relevel_descendants(node, level, relevel);
        Ok(level)
    }

    /// Invalidate all filter-related cache entries
    async fn invalidate_cache(&self) {
        let _ = self.cache.delete_pattern(CACHE_PATTERN_ALL).await;
    }
}

/// A lost slug race becomes `DuplicateSlug`; anything else is logged and internal
fn persist_error(err: anyhow::Error, operation: &str, filter: &Filter) -> FilterServiceError {
    if let Some(taken) = err.downcast_ref::<SlugTakenError>() {
        return FilterServiceError::DuplicateSlug(taken.0.clone());
    }
    tracing::error!(
        operation = operation,
        id = %filter.id,
        slug = %filter.slug,
        error = %err,
        "Failed to persist filter"
    );
    FilterServiceError::Internal(err)
}

/// Trimmed, non-empty required field
fn required(value: &str, field: &str) -> Result<String, FilterServiceError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(FilterServiceError::Validation(format!(
            "Filter {} is required",
            field
        )));
    }
    Ok(value.to_string())
}

fn validate_slug(slug: &str) -> Result<(), FilterServiceError> {
    if !is_valid_slug(slug) {
        return Err(FilterServiceError::Validation(format!(
            "Invalid slug '{}': use lowercase letters, digits and single hyphens",
            slug
        )));
    }
    Ok(())
}

fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}
