//! Filter repository
//!
//! Database operations for the filter taxonomy and the article/filter join.
//!
//! This module provides:
//! - `FilterRepository` trait defining the interface for taxonomy data access
//! - `SqlxFilterRepository` implementing the trait for SQLite and MySQL
//! - `DeleteOutcome` describing the result of a guarded delete

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Article, ArticleStatus, Filter, ListParams, PagedResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Result of [`FilterRepository::delete`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The filter was removed
    Deleted,
    /// No filter with that ID exists
    NotFound,
    /// The filter is still referenced and was left untouched
    Referenced {
        /// Articles associated with the filter
        articles: i64,
        /// Direct child filters
        children: i64,
    },
}

/// A write lost the race for a slug: the `UNIQUE(slug)` constraint refused it.
///
/// Returned inside the `anyhow::Error` of [`FilterRepository::create`] and
/// [`FilterRepository::update`]; callers recover it with `downcast_ref`.
#[derive(Debug, thiserror::Error)]
#[error("Filter slug already exists: {0}")]
pub struct SlugTakenError(pub String);

/// Filter repository trait
#[async_trait]
pub trait FilterRepository: Send + Sync {
    /// List every filter at every level, in no particular order
    async fn list_all(&self) -> Result<Vec<Filter>>;

    /// Get filter by ID
    async fn get_by_id(&self, id: &str) -> Result<Option<Filter>>;

    /// Get filter by slug
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Filter>>;

    /// Check if a slug is taken, optionally ignoring one filter (the one being updated)
    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<&str>) -> Result<bool>;

    /// Count published articles directly associated with a filter
    async fn count_articles(&self, id: &str) -> Result<i64>;

    /// Count published articles per filter in a single query.
    ///
    /// Filters without articles are absent from the map.
    async fn count_articles_by_filter(&self) -> Result<HashMap<String, i64>>;

    /// Insert a new filter
    async fn create(&self, filter: &Filter) -> Result<Filter>;

    /// Update a filter and, in the same transaction, rewrite the levels of
    /// the given descendants
    async fn update(&self, filter: &Filter, relevel: &[(String, i32)]) -> Result<Filter>;

    /// Delete a filter only if no article and no child filter references it.
    ///
    /// The reference check and the delete happen atomically.
    async fn delete(&self, id: &str) -> Result<DeleteOutcome>;

    /// Published articles associated with every one of `filter_ids`.
    ///
    /// Duplicate IDs are ignored. An empty slice applies no filter at all.
    /// Results are ordered by `published_at` descending with NULLs last.
    async fn query_articles(
        &self,
        filter_ids: &[String],
        params: &ListParams,
    ) -> Result<PagedResult<Article>>;
}

/// SQLx-based filter repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxFilterRepository {
    pool: DynDatabasePool,
}

impl SqlxFilterRepository {
    /// Create a new SQLx filter repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn FilterRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl FilterRepository for SqlxFilterRepository {
    async fn list_all(&self) -> Result<Vec<Filter>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_filters_sqlite(self.pool.sqlite()?).await,
            DatabaseDriver::Mysql => list_filters_mysql(self.pool.mysql()?).await,
        }
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Filter>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_filter_by_id_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_filter_by_id_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Filter>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_filter_by_slug_sqlite(self.pool.sqlite()?, slug).await,
            DatabaseDriver::Mysql => get_filter_by_slug_mysql(self.pool.mysql()?, slug).await,
        }
    }

    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<&str>) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                exists_by_slug_sqlite(self.pool.sqlite()?, slug, exclude_id).await
            }
            DatabaseDriver::Mysql => {
                exists_by_slug_mysql(self.pool.mysql()?, slug, exclude_id).await
            }
        }
    }

    async fn count_articles(&self, id: &str) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => count_articles_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => count_articles_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn count_articles_by_filter(&self) -> Result<HashMap<String, i64>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => count_articles_by_filter_sqlite(self.pool.sqlite()?).await,
            DatabaseDriver::Mysql => count_articles_by_filter_mysql(self.pool.mysql()?).await,
        }
    }

    async fn create(&self, filter: &Filter) -> Result<Filter> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_filter_sqlite(self.pool.sqlite()?, filter).await,
            DatabaseDriver::Mysql => create_filter_mysql(self.pool.mysql()?, filter).await,
        }
    }

    async fn update(&self, filter: &Filter, relevel: &[(String, i32)]) -> Result<Filter> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                update_filter_sqlite(self.pool.sqlite()?, filter, relevel).await
            }
            DatabaseDriver::Mysql => {
                update_filter_mysql(self.pool.mysql()?, filter, relevel).await
            }
        }
    }

    async fn delete(&self, id: &str) -> Result<DeleteOutcome> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_filter_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => delete_filter_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn query_articles(
        &self,
        filter_ids: &[String],
        params: &ListParams,
    ) -> Result<PagedResult<Article>> {
        let ids = distinct_ids(filter_ids);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                query_articles_sqlite(self.pool.sqlite()?, &ids, params).await
            }
            DatabaseDriver::Mysql => query_articles_mysql(self.pool.mysql()?, &ids, params).await,
        }
    }
}

// ============================================================================
// Shared SQL helpers
// ============================================================================

const FILTER_COLUMNS: &str =
    "id, name, slug, parent_id, level, order_index, description, created_at, updated_at";

const ARTICLE_COLUMNS: &str =
    "a.id, a.slug, a.title, a.summary, a.author_id, a.status, a.published_at, a.created_at, a.updated_at";

const ARTICLE_ORDER: &str = "a.published_at IS NULL, a.published_at DESC, a.id DESC";

/// Map a failed filter INSERT/UPDATE, keeping unique violations typed
fn write_error(err: sqlx::Error, filter: &Filter, action: &str) -> anyhow::Error {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            SlugTakenError(filter.slug.clone()).into()
        }
        _ => anyhow::Error::new(err).context(format!("Failed to {} filter {}", action, filter.slug)),
    }
}

/// Drop repeated IDs, keeping first-seen order
fn distinct_ids(ids: &[String]) -> Vec<&str> {
    let mut seen = HashSet::new();
    ids.iter()
        .map(String::as_str)
        .filter(|id| seen.insert(*id))
        .collect()
}

/// WHERE clause selecting published articles linked to all `n` filters.
///
/// Binds: the `n` filter IDs, then `n` itself.
fn intersection_clause(n: usize) -> String {
    if n == 0 {
        return "a.status = 'published'".to_string();
    }
    let placeholders = vec!["?"; n].join(", ");
    format!(
        "a.status = 'published' AND a.id IN (\
            SELECT af.article_id FROM article_filters af \
            WHERE af.filter_id IN ({placeholders}) \
            GROUP BY af.article_id \
            HAVING COUNT(DISTINCT af.filter_id) = ?)"
    )
}

fn article_page_sql(n: usize) -> String {
    format!(
        "SELECT {ARTICLE_COLUMNS} FROM articles a WHERE {} ORDER BY {ARTICLE_ORDER} LIMIT ? OFFSET ?",
        intersection_clause(n)
    )
}

fn article_count_sql(n: usize) -> String {
    format!(
        "SELECT COUNT(*) AS count FROM articles a WHERE {}",
        intersection_clause(n)
    )
}

fn parse_status(raw: &str) -> ArticleStatus {
    ArticleStatus::parse(raw).unwrap_or_default()
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn list_filters_sqlite(pool: &SqlitePool) -> Result<Vec<Filter>> {
    let rows = sqlx::query(&format!("SELECT {FILTER_COLUMNS} FROM filters"))
        .fetch_all(pool)
        .await
        .context("Failed to list filters")?;

    Ok(rows.iter().map(row_to_filter_sqlite).collect())
}

async fn get_filter_by_id_sqlite(pool: &SqlitePool, id: &str) -> Result<Option<Filter>> {
    let row = sqlx::query(&format!("SELECT {FILTER_COLUMNS} FROM filters WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to get filter by ID {}", id))?;

    Ok(row.as_ref().map(row_to_filter_sqlite))
}

async fn get_filter_by_slug_sqlite(pool: &SqlitePool, slug: &str) -> Result<Option<Filter>> {
    let row = sqlx::query(&format!("SELECT {FILTER_COLUMNS} FROM filters WHERE slug = ?"))
        .bind(slug)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to get filter by slug {}", slug))?;

    Ok(row.as_ref().map(row_to_filter_sqlite))
}

async fn exists_by_slug_sqlite(
    pool: &SqlitePool,
    slug: &str,
    exclude_id: Option<&str>,
) -> Result<bool> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS count FROM filters WHERE slug = ? AND (? IS NULL OR id <> ?)",
    )
    .bind(slug)
    .bind(exclude_id)
    .bind(exclude_id)
    .fetch_one(pool)
    .await
    .context("Failed to check filter slug existence")?;

    let count: i64 = row.get("count");
    Ok(count > 0)
}

async fn count_articles_sqlite(pool: &SqlitePool, id: &str) -> Result<i64> {
    let row = sqlx::query(
        r#"
        SELECT COUNT(*) AS count
        FROM article_filters af
        INNER JOIN articles a ON a.id = af.article_id
        WHERE af.filter_id = ? AND a.status = 'published'
        "#,
    )
    .bind(id)
    .fetch_one(pool)
    .await
    .with_context(|| format!("Failed to count articles for filter {}", id))?;

    Ok(row.get("count"))
}

async fn count_articles_by_filter_sqlite(pool: &SqlitePool) -> Result<HashMap<String, i64>> {
    let rows = sqlx::query(
        r#"
        SELECT af.filter_id, COUNT(*) AS count
        FROM article_filters af
        INNER JOIN articles a ON a.id = af.article_id
        WHERE a.status = 'published'
        GROUP BY af.filter_id
        "#,
    )
    .fetch_all(pool)
    .await
    .context("Failed to count articles per filter")?;

    Ok(rows
        .iter()
        .map(|row| (row.get("filter_id"), row.get("count")))
        .collect())
}

async fn create_filter_sqlite(pool: &SqlitePool, filter: &Filter) -> Result<Filter> {
    sqlx::query(
        r#"
        INSERT INTO filters (id, name, slug, parent_id, level, order_index, description, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&filter.id)
    .bind(&filter.name)
    .bind(&filter.slug)
    .bind(&filter.parent_id)
    .bind(filter.level)
    .bind(filter.order_index)
    .bind(&filter.description)
    .bind(filter.created_at)
    .bind(filter.updated_at)
    .execute(pool)
    .await
    .map_err(|e| write_error(e, filter, "create"))?;

    Ok(filter.clone())
}

async fn update_filter_sqlite(
    pool: &SqlitePool,
    filter: &Filter,
    relevel: &[(String, i32)],
) -> Result<Filter> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin filter update")?;

    sqlx::query(
        r#"
        UPDATE filters
        SET name = ?, slug = ?, parent_id = ?, level = ?, order_index = ?, description = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&filter.name)
    .bind(&filter.slug)
    .bind(&filter.parent_id)
    .bind(filter.level)
    .bind(filter.order_index)
    .bind(&filter.description)
    .bind(now)
    .bind(&filter.id)
    .execute(&mut *tx)
    .await
    .map_err(|e| write_error(e, filter, "update"))?;

    for (id, level) in relevel {
        sqlx::query("UPDATE filters SET level = ?, updated_at = ? WHERE id = ?")
            .bind(level)
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to relevel filter {}", id))?;
    }

    tx.commit().await.context("Failed to commit filter update")?;

    get_filter_by_id_sqlite(pool, &filter.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Filter not found after update"))
}

/// A single conditional DELETE, so no association can slip in between check and act.
async fn delete_filter_sqlite(pool: &SqlitePool, id: &str) -> Result<DeleteOutcome> {
    let result = sqlx::query(
        r#"
        DELETE FROM filters
        WHERE id = ?
          AND NOT EXISTS (SELECT 1 FROM article_filters WHERE filter_id = ?)
          AND NOT EXISTS (SELECT 1 FROM filters c WHERE c.parent_id = ?)
        "#,
    )
    .bind(id)
    .bind(id)
    .bind(id)
    .execute(pool)
    .await
    .with_context(|| format!("Failed to delete filter {}", id))?;

    if result.rows_affected() > 0 {
        return Ok(DeleteOutcome::Deleted);
    }

    let row = sqlx::query(
        r#"
        SELECT
            (SELECT COUNT(*) FROM filters WHERE id = ?) AS present,
            (SELECT COUNT(*) FROM article_filters WHERE filter_id = ?) AS articles,
            (SELECT COUNT(*) FROM filters WHERE parent_id = ?) AS children
        "#,
    )
    .bind(id)
    .bind(id)
    .bind(id)
    .fetch_one(pool)
    .await
    .with_context(|| format!("Failed to inspect references of filter {}", id))?;

    let present: i64 = row.get("present");
    if present == 0 {
        return Ok(DeleteOutcome::NotFound);
    }
    Ok(DeleteOutcome::Referenced {
        articles: row.get("articles"),
        children: row.get("children"),
    })
}

async fn query_articles_sqlite(
    pool: &SqlitePool,
    ids: &[&str],
    params: &ListParams,
) -> Result<PagedResult<Article>> {
    let n = ids.len();

    let count_sql = article_count_sql(n);
    let mut count_query = sqlx::query(&count_sql);
    for id in ids {
        count_query = count_query.bind(*id);
    }
    if n > 0 {
        count_query = count_query.bind(n as i64);
    }
    let total: i64 = count_query
        .fetch_one(pool)
        .await
        .context("Failed to count filtered articles")?
        .get("count");

    let page_sql = article_page_sql(n);
    let mut page_query = sqlx::query(&page_sql);
    for id in ids {
        page_query = page_query.bind(*id);
    }
    if n > 0 {
        page_query = page_query.bind(n as i64);
    }
    let rows = page_query
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to query filtered articles")?;

    let articles = rows.iter().map(row_to_article_sqlite).collect();
    Ok(PagedResult::new(articles, total, params))
}

fn row_to_filter_sqlite(row: &sqlx::sqlite::SqliteRow) -> Filter {
    Filter {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        parent_id: row.get("parent_id"),
        level: row.get("level"),
        order_index: row.get("order_index"),
        description: row.get("description"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub(crate) fn row_to_article_sqlite(row: &sqlx::sqlite::SqliteRow) -> Article {
    let status: String = row.get("status");
    Article {
        id: row.get("id"),
        slug: row.get("slug"),
        title: row.get("title"),
        summary: row.get("summary"),
        author_id: row.get("author_id"),
        status: parse_status(&status),
        published_at: row.get("published_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn list_filters_mysql(pool: &MySqlPool) -> Result<Vec<Filter>> {
    let rows = sqlx::query(&format!("SELECT {FILTER_COLUMNS} FROM filters"))
        .fetch_all(pool)
        .await
        .context("Failed to list filters")?;

    Ok(rows.iter().map(row_to_filter_mysql).collect())
}

async fn get_filter_by_id_mysql(pool: &MySqlPool, id: &str) -> Result<Option<Filter>> {
    let row = sqlx::query(&format!("SELECT {FILTER_COLUMNS} FROM filters WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to get filter by ID {}", id))?;

    Ok(row.as_ref().map(row_to_filter_mysql))
}

async fn get_filter_by_slug_mysql(pool: &MySqlPool, slug: &str) -> Result<Option<Filter>> {
    let row = sqlx::query(&format!("SELECT {FILTER_COLUMNS} FROM filters WHERE slug = ?"))
        .bind(slug)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to get filter by slug {}", slug))?;

    Ok(row.as_ref().map(row_to_filter_mysql))
}

async fn exists_by_slug_mysql(
    pool: &MySqlPool,
    slug: &str,
    exclude_id: Option<&str>,
) -> Result<bool> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS count FROM filters WHERE slug = ? AND (? IS NULL OR id <> ?)",
    )
    .bind(slug)
    .bind(exclude_id)
    .bind(exclude_id)
    .fetch_one(pool)
    .await
    .context("Failed to check filter slug existence")?;

    let count: i64 = row.get("count");
    Ok(count > 0)
}

async fn count_articles_mysql(pool: &MySqlPool, id: &str) -> Result<i64> {
    let row = sqlx::query(
        r#"
        SELECT COUNT(*) AS count
        FROM article_filters af
        INNER JOIN articles a ON a.id = af.article_id
        WHERE af.filter_id = ? AND a.status = 'published'
        "#,
    )
    .bind(id)
    .fetch_one(pool)
    .await
    .with_context(|| format!("Failed to count articles for filter {}", id))?;

    Ok(row.get("count"))
}

async fn count_articles_by_filter_mysql(pool: &MySqlPool) -> Result<HashMap<String, i64>> {
    let rows = sqlx::query(
        r#"
        SELECT af.filter_id, COUNT(*) AS count
        FROM article_filters af
        INNER JOIN articles a ON a.id = af.article_id
        WHERE a.status = 'published'
        GROUP BY af.filter_id
        "#,
    )
    .fetch_all(pool)
    .await
    .context("Failed to count articles per filter")?;

    Ok(rows
        .iter()
        .map(|row| (row.get("filter_id"), row.get("count")))
        .collect())
}

async fn create_filter_mysql(pool: &MySqlPool, filter: &Filter) -> Result<Filter> {
    sqlx::query(
        r#"
        INSERT INTO filters (id, name, slug, parent_id, level, order_index, description, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&filter.id)
    .bind(&filter.name)
    .bind(&filter.slug)
    .bind(&filter.parent_id)
    .bind(filter.level)
    .bind(filter.order_index)
    .bind(&filter.description)
    .bind(filter.created_at)
    .bind(filter.updated_at)
    .execute(pool)
    .await
    .map_err(|e| write_error(e, filter, "create"))?;

    Ok(filter.clone())
}

async fn update_filter_mysql(
    pool: &MySqlPool,
    filter: &Filter,
    relevel: &[(String, i32)],
) -> Result<Filter> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin filter update")?;

    sqlx::query(
        r#"
        UPDATE filters
        SET name = ?, slug = ?, parent_id = ?, level = ?, order_index = ?, description = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&filter.name)
    .bind(&filter.slug)
    .bind(&filter.parent_id)
    .bind(filter.level)
    .bind(filter.order_index)
    .bind(&filter.description)
    .bind(now)
    .bind(&filter.id)
    .execute(&mut *tx)
    .await
    .map_err(|e| write_error(e, filter, "update"))?;

    for (id, level) in relevel {
        sqlx::query("UPDATE filters SET level = ?, updated_at = ? WHERE id = ?")
            .bind(level)
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to relevel filter {}", id))?;
    }

    tx.commit().await.context("Failed to commit filter update")?;

    get_filter_by_id_mysql(pool, &filter.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Filter not found after update"))
}

/// MySQL cannot reference the target table in a DELETE subquery, so the row
/// is locked first; inserts into `article_filters` need a shared lock on the
/// same row for their FK check and wait until this transaction ends.
async fn delete_filter_mysql(pool: &MySqlPool, id: &str) -> Result<DeleteOutcome> {
    let mut tx = pool.begin().await.context("Failed to begin filter delete")?;

    let locked = sqlx::query("SELECT id FROM filters WHERE id = ? FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .with_context(|| format!("Failed to lock filter {}", id))?;
    if locked.is_none() {
        return Ok(DeleteOutcome::NotFound);
    }

    let row = sqlx::query(
        r#"
        SELECT
            (SELECT COUNT(*) FROM article_filters WHERE filter_id = ?) AS articles,
            (SELECT COUNT(*) FROM filters WHERE parent_id = ?) AS children
        "#,
    )
    .bind(id)
    .bind(id)
    .fetch_one(&mut *tx)
    .await
    .with_context(|| format!("Failed to inspect references of filter {}", id))?;

    let articles: i64 = row.get("articles");
    let children: i64 = row.get("children");
    if articles > 0 || children > 0 {
        return Ok(DeleteOutcome::Referenced { articles, children });
    }

    sqlx::query("DELETE FROM filters WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to delete filter {}", id))?;

    tx.commit().await.context("Failed to commit filter delete")?;
    Ok(DeleteOutcome::Deleted)
}

async fn query_articles_mysql(
    pool: &MySqlPool,
    ids: &[&str],
    params: &ListParams,
) -> Result<PagedResult<Article>> {
    let n = ids.len();

    let count_sql = article_count_sql(n);
    let mut count_query = sqlx::query(&count_sql);
    for id in ids {
        count_query = count_query.bind(*id);
    }
    if n > 0 {
        count_query = count_query.bind(n as i64);
    }
    let total: i64 = count_query
        .fetch_one(pool)
        .await
        .context("Failed to count filtered articles")?
        .get("count");

    let page_sql = article_page_sql(n);
    let mut page_query = sqlx::query(&page_sql);
    for id in ids {
        page_query = page_query.bind(*id);
    }
    if n > 0 {
        page_query = page_query.bind(n as i64);
    }
    let rows = page_query
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to query filtered articles")?;

    let articles = rows.iter().map(row_to_article_mysql).collect();
    Ok(PagedResult::new(articles, total, params))
}

fn row_to_filter_mysql(row: &sqlx::mysql::MySqlRow) -> Filter {
    Filter {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        parent_id: row.get("parent_id"),
        level: row.get("level"),
        order_index: row.get("order_index"),
        description: row.get("description"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub(crate) fn row_to_article_mysql(row: &sqlx::mysql::MySqlRow) -> Article {
    let status: String = row.get("status");
    Article {
        id: row.get("id"),
        slug: row.get("slug"),
        title: row.get("title"),
        summary: row.get("summary"),
        author_id: row.get("author_id"),
        status: parse_status(&status),
        published_at: row.get("published_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
