//! Filtered article queries
//!
//! Resolves a primary filter plus any number of additional filters and
//! returns the published articles carrying all of them.

use crate::config::FilterQueryConfig;
use crate::db::repositories::FilterRepository;
use crate::models::{Article, ListParams};
use crate::services::filter::{FilterService, FilterServiceError};
use anyhow::Context;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// A filtered article request
#[derive(Debug, Clone, Default)]
pub struct FilteredArticleQuery {
    /// Slug or UUID of the filter that must resolve
    pub primary: String,
    /// Further slugs or UUIDs; ones that don't resolve are ignored
    pub additional: Vec<String>,
    /// 1-based page, defaults to 1
    pub page: Option<u32>,
    /// Page size, defaults to the configured size
    pub page_size: Option<u32>,
}

/// One page of matching articles
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilteredArticlePage {
    pub articles: Vec<Article>,
    pub total_count: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

/// Pagination for a request, with defaults applied and the size clamped
pub fn list_params(config: &FilterQueryConfig, page: Option<u32>, page_size: Option<u32>) -> ListParams {
    let max = config.max_page_size.max(1);
    let size = page_size.unwrap_or(config.default_page_size).clamp(1, max);
    ListParams::new(page.unwrap_or(1), size)
}

/// Intersection query over the filter taxonomy
pub struct FilteredArticleService {
    filters: Arc<FilterService>,
    repo: Arc<dyn FilterRepository>,
    config: FilterQueryConfig,
}

impl FilteredArticleService {
    /// Create a new filtered article service
    pub fn new(
        filters: Arc<FilterService>,
        repo: Arc<dyn FilterRepository>,
        config: FilterQueryConfig,
    ) -> Self {
        Self {
            filters,
            repo,
            config,
        }
    }

    /// Published articles associated with the primary filter and every
    /// resolvable additional filter.
    ///
    /// # Errors
    /// - `Validation` if `primary` is blank
    /// - `NotFound` if `primary` doesn't resolve
    pub async fn query(
        &self,
        query: FilteredArticleQuery,
    ) -> Result<FilteredArticlePage, FilterServiceError> {
        let primary = query.primary.trim();
        if primary.is_empty() {
            return Err(FilterServiceError::Validation(
                "A primary filter is required".to_string(),
            ));
        }

        let primary_id = self.filters.resolve_identifier(primary).await?;

        let mut ids = vec![primary_id];
        ids.extend(self.resolve_additional(&query.additional).await);

        let mut seen = HashSet::new();
        ids.retain(|id| seen.insert(id.clone()));

        let params = list_params(&self.config, query.page, query.page_size);
        let result = self
            .repo
            .query_articles(&ids, &params)
            .await
            .context("Failed to query filtered articles")?;

        tracing::debug!(
            filters = ids.len(),
            total = result.total,
            page = result.page,
            "Filtered article query"
        );

        let total_pages = result.total_pages();
        Ok(FilteredArticlePage {
            total_count: result.total,
            page: result.page,
            page_size: result.per_page,
            total_pages,
            articles: result.items,
        })
    }

    /// Resolve additional identifiers concurrently, keeping the ones that exist
    async fn resolve_additional(&self, identifiers: &[String]) -> Vec<String> {
        let lookups = identifiers
            .iter()
            .map(|identifier| async move {
                (identifier, self.filters.resolve_identifier(identifier).await)
            });

        join_all(lookups)
            .await
            .into_iter()
            .filter_map(|(identifier, resolved)| match resolved {
                Ok(id) => Some(id),
                Err(FilterServiceError::NotFound(_)) => {
                    tracing::debug!(identifier = %identifier, "Ignoring unknown additional filter");
                    None
                }
                Err(e) => {
                    tracing::warn!(identifier = %identifier, error = %e, "Failed to resolve additional filter");
                    None
                }
            })
            .collect()
    }
}
