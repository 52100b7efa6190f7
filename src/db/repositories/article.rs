//! Article repository
//!
//! Database operations for articles and their filter associations.
//!
//! Associations are never edited one by one: `set_filters` replaces an
//! article's whole filter set inside a transaction, mirroring how an article
//! edit carries its complete selection.

use crate::config::DatabaseDriver;
use crate::db::repositories::filter::{row_to_article_mysql, row_to_article_sqlite};
use crate::db::DynDatabasePool;
use crate::models::{Article, ArticleStatus, CreateArticleInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, SqlitePool};
use std::sync::Arc;

/// Article repository trait
#[async_trait]
pub trait ArticleRepository: Send + Sync {
    /// Create a new article
    async fn create(&self, input: &CreateArticleInput) -> Result<Article>;

    /// Replace the article's filter associations with `filter_ids`
    async fn set_filters(&self, article_id: i64, filter_ids: &[String]) -> Result<()>;
}

/// SQLx-based article repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxArticleRepository {
    pool: DynDatabasePool,
}

impl SqlxArticleRepository {
    /// Create a new SQLx article repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ArticleRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ArticleRepository for SqlxArticleRepository {
    async fn create(&self, input: &CreateArticleInput) -> Result<Article> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_article_sqlite(self.pool.sqlite()?, input).await,
            DatabaseDriver::Mysql => create_article_mysql(self.pool.mysql()?, input).await,
        }
    }

    async fn set_filters(&self, article_id: i64, filter_ids: &[String]) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                set_filters_sqlite(self.pool.sqlite()?, article_id, filter_ids).await
            }
            DatabaseDriver::Mysql => {
                set_filters_mysql(self.pool.mysql()?, article_id, filter_ids).await
            }
        }
    }
}

/// Published articles without an explicit date are stamped now
fn effective_published_at(input: &CreateArticleInput) -> Option<chrono::DateTime<Utc>> {
    match (input.status, input.published_at) {
        (_, Some(at)) => Some(at),
        (ArticleStatus::Published, None) => Some(Utc::now()),
        _ => None,
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_article_sqlite(pool: &SqlitePool, input: &CreateArticleInput) -> Result<Article> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO articles (slug, title, summary, author_id, status, published_at, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.slug)
    .bind(&input.title)
    .bind(&input.summary)
    .bind(input.author_id)
    .bind(input.status.as_str())
    .bind(effective_published_at(input))
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .with_context(|| format!("Failed to create article {}", input.slug))?;

    get_article_by_id_sqlite(pool, result.last_insert_rowid())
        .await?
        .ok_or_else(|| anyhow::anyhow!("Article not found after insert"))
}

async fn get_article_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Article>> {
    let row = sqlx::query(
        r#"
        SELECT a.id, a.slug, a.title, a.summary, a.author_id, a.status, a.published_at, a.created_at, a.updated_at
        FROM articles a
        WHERE a.id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .with_context(|| format!("Failed to get article {}", id))?;

    Ok(row.as_ref().map(row_to_article_sqlite))
}

async fn set_filters_sqlite(pool: &SqlitePool, article_id: i64, filter_ids: &[String]) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin filter assignment")?;

    sqlx::query("DELETE FROM article_filters WHERE article_id = ?")
        .bind(article_id)
        .execute(&mut *tx)
        .await
        .context("Failed to clear article filters")?;

    for filter_id in filter_ids {
        sqlx::query("INSERT OR IGNORE INTO article_filters (article_id, filter_id) VALUES (?, ?)")
            .bind(article_id)
            .bind(filter_id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to attach filter {} to article {}", filter_id, article_id))?;
    }

    tx.commit().await.context("Failed to commit filter assignment")?;
    Ok(())
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_article_mysql(pool: &MySqlPool, input: &CreateArticleInput) -> Result<Article> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO articles (slug, title, summary, author_id, status, published_at, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.slug)
    .bind(&input.title)
    .bind(&input.summary)
    .bind(input.author_id)
    .bind(input.status.as_str())
    .bind(effective_published_at(input))
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .with_context(|| format!("Failed to create article {}", input.slug))?;

    get_article_by_id_mysql(pool, result.last_insert_id() as i64)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Article not found after insert"))
}

async fn get_article_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Article>> {
    let row = sqlx::query(
        r#"
        SELECT a.id, a.slug, a.title, a.summary, a.author_id, a.status, a.published_at, a.created_at, a.updated_at
        FROM articles a
        WHERE a.id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .with_context(|| format!("Failed to get article {}", id))?;

    Ok(row.as_ref().map(row_to_article_mysql))
}

async fn set_filters_mysql(pool: &MySqlPool, article_id: i64, filter_ids: &[String]) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin filter assignment")?;

    sqlx::query("DELETE FROM article_filters WHERE article_id = ?")
        .bind(article_id)
        .execute(&mut *tx)
        .await
        .context("Failed to clear article filters")?;

    for filter_id in filter_ids {
        sqlx::query("INSERT IGNORE INTO article_filters (article_id, filter_id) VALUES (?, ?)")
            .bind(article_id)
            .bind(filter_id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to attach filter {} to article {}", filter_id, article_id))?;
    }

    tx.commit().await.context("Failed to commit filter assignment")?;
    Ok(())
}
