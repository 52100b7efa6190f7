//! Filter API endpoints
//!
//! Handles HTTP requests for the filter taxonomy:
//! - GET /api/v1/filters - Forest, optionally with counts, or statistics
//! - GET /api/v1/filters/{id_or_slug}/articles - Intersection article listing
//! - POST /api/v1/filters - Create filter (admin)
//! - PUT /api/v1/filters - Update filter (admin)
//! - DELETE /api/v1/filters?id= - Delete filter (admin)

use axum::{
    extract::{Path, Query, RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::common::{double_option, parse_flag, query_pairs, query_value, query_values};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{CreateFilterInput, Filter, FilterNode, UpdateFilterInput};
use crate::services::{FilteredArticlePage, FilteredArticleQuery};

/// Query parameters for the forest endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFiltersQuery {
    #[serde(default)]
    pub include_counts: Option<String>,
    #[serde(default)]
    pub stats: Option<String>,
}

/// Response for the filter forest
#[derive(Debug, Serialize)]
pub struct FilterTreeResponse {
    pub filters: Vec<FilterNode>,
}

/// Request for creating a filter
#[derive(Debug, Deserialize)]
pub struct CreateFilterRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
    #[serde(default, alias = "parentId")]
    pub parent_id: Option<String>,
    #[serde(default, alias = "orderIndex")]
    pub order_index: Option<i32>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Request for updating a filter; absent fields are left unchanged
#[derive(Debug, Deserialize)]
pub struct UpdateFilterRequest {
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default, alias = "parentId", deserialize_with = "double_option")]
    pub parent_id: Option<Option<String>>,
    #[serde(default, alias = "orderIndex")]
    pub order_index: Option<i32>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
}

/// Query parameters for deleting a filter
#[derive(Debug, Deserialize)]
pub struct DeleteFilterQuery {
    pub id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// GET /api/v1/filters - Forest or statistics
async fn list_filters(
    State(state): State<AppState>,
    Query(query): Query<ListFiltersQuery>,
) -> Result<Response, ApiError> {
    if parse_flag(query.stats.as_deref()) {
        let stats = state.filter_service.stats().await?;
        return Ok(Json(stats).into_response());
    }

    let include_counts = parse_flag(query.include_counts.as_deref());
    let filters = state.filter_service.hierarchy(include_counts).await?;

    Ok(Json(FilterTreeResponse { filters }).into_response())
}

/// GET /api/v1/filters/{id_or_slug}/articles - Articles carrying every selected filter
///
/// `filters` may repeat to add more slugs or IDs; `page` and `limit` paginate.
async fn filter_articles(
    State(state): State<AppState>,
    Path(id_or_slug): Path<String>,
    RawQuery(raw): RawQuery,
) -> Result<Json<FilteredArticlePage>, ApiError> {
    let pairs = query_pairs(raw.as_deref());

    let query = FilteredArticleQuery {
        primary: id_or_slug,
        additional: query_values(&pairs, "filters"),
        page: parse_number(&pairs, "page")?,
        page_size: parse_number(&pairs, "limit")?,
    };

    let page = state.filtered_articles.query(query).await?;
    Ok(Json(page))
}

/// POST /api/v1/filters - Create filter
async fn create_filter(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateFilterRequest>,
) -> Result<(StatusCode, Json<Filter>), ApiError> {
    let (name, slug) = match (present(body.name), present(body.slug)) {
        (Some(name), Some(slug)) => (name, slug),
        (None, _) => return Err(ApiError::validation_error("Field 'name' is required")),
        (_, None) => return Err(ApiError::validation_error("Field 'slug' is required")),
    };

    let filter = state
        .filter_service
        .create(CreateFilterInput {
            name,
            slug,
            parent_id: body.parent_id,
            order_index: body.order_index,
            description: body.description,
        })
        .await?;

    tracing::debug!(user_id = user.0.id, filter_id = %filter.id, "Filter created via API");
    Ok((StatusCode::CREATED, Json(filter)))
}

/// PUT /api/v1/filters - Update filter named by `id` in the body
async fn update_filter(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Json(body): Json<UpdateFilterRequest>,
) -> Result<Json<Filter>, ApiError> {
    let id = present(body.id).ok_or_else(|| ApiError::validation_error("Field 'id' is required"))?;

    let filter = state
        .filter_service
        .update(
            &id,
            UpdateFilterInput {
                name: body.name,
                slug: body.slug,
                parent_id: body.parent_id,
                order_index: body.order_index,
                description: body.description,
            },
        )
        .await?;

    Ok(Json(filter))
}

/// DELETE /api/v1/filters?id= - Delete filter
async fn delete_filter(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(query): Query<DeleteFilterQuery>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let id = present(query.id)
        .ok_or_else(|| ApiError::validation_error("Query parameter 'id' is required"))?;

    state.filter_service.delete(&id).await?;

    Ok(Json(SuccessResponse { success: true }))
}

/// Trimmed value, `None` when missing or blank
fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Non-negative integer parameter. Oversized values saturate at `u32::MAX`
/// and are clamped later; anything non-numeric is rejected.
fn parse_number(pairs: &[(String, String)], key: &str) -> Result<Option<u32>, ApiError> {
    let raw = match query_value(pairs, key).map(str::trim).filter(|v| !v.is_empty()) {
        None => return Ok(None),
        Some(raw) => raw,
    };

    if !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ApiError::validation_error(format!("Invalid '{}': {}", key, raw)));
    }

    let value = raw
        .parse::<u64>()
        .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
        .unwrap_or(u32::MAX);
    Ok(Some(value))
}

/// Public filter routes
pub fn router() -> axum::Router<AppState> {
    use axum::routing::get;

    axum::Router::new()
        .route("/filters", get(list_filters))
        .route("/filters/{id_or_slug}/articles", get(filter_articles))
}

/// Filter mutation routes; callers add the auth layers
pub fn admin_router() -> axum::Router<AppState> {
    use axum::routing::post;

    axum::Router::new().route(
        "/filters",
        post(create_filter).put(update_filter).delete(delete_filter),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::build_router;
    use crate::cache::create_cache;
    use crate::config::{CacheConfig, FilterQueryConfig};
    use crate::db::repositories::test_support::Fixture;
    use crate::db::repositories::SqlxSessionRepository;
    use crate::models::{CreateUserInput, UserRole};
    use crate::services::{AuthService, FilterService, FilteredArticleService};
    use axum::http::{header, HeaderValue};
    use axum_test::TestServer;
    use serde_json::{json, Value};
    use std::sync::Arc;

    struct Harness {
        fx: Fixture,
        server: TestServer,
        admin_token: String,
        author_token: String,
    }

    impl Harness {
        async fn new() -> Self {
            let fx = Fixture::new().await;
            let filter_service = Arc::new(FilterService::new(
                fx.filters.clone(),
                create_cache(&CacheConfig::default()),
            ));
            let filtered_articles = Arc::new(FilteredArticleService::new(
                filter_service.clone(),
                fx.filters.clone(),
                FilterQueryConfig::default(),
            ));
            let auth_service = Arc::new(AuthService::new(
                SqlxSessionRepository::boxed(fx.pool.clone()),
                fx.users.clone(),
            ));

            let admin = fx
                .users
                .create(&CreateUserInput {
                    username: "admin".to_string(),
                    display_name: None,
                    role: UserRole::Admin,
                })
                .await
                .unwrap();
            let hour = chrono::Duration::hours(1);
            let admin_token = auth_service.create_session(admin.id, hour).await.unwrap().id;
            let author_token = auth_service.create_session(fx.author_id, hour).await.unwrap().id;

            let state = AppState {
                filter_service,
                filtered_articles,
                auth_service,
            };
            let app = build_router(state, "http://localhost:3000").unwrap();

            Self {
                fx,
                server: TestServer::new(app).unwrap(),
                admin_token,
                author_token,
            }
        }

        fn bearer(token: &str) -> HeaderValue {
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap()
        }
    }

    fn slugs(body: &Value) -> Vec<String> {
        let mut slugs: Vec<String> = body["articles"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["slug"].as_str().unwrap().to_string())
            .collect();
        slugs.sort();
        slugs
    }

    #[tokio::test]
    async fn test_get_forest_with_counts_and_stats() {
        let h = Harness::new().await;
        let root = h.fx.filter_ordered("crypto", "Crypto", None, 0).await;
        let b = h.fx.filter_ordered("b", "B", Some(&root), 1).await;
        h.fx.filter_ordered("a", "A", Some(&root), 1).await;
        h.fx.published("a1", 1, &[&b]).await;

        let plain: Value = h.server.get("/api/v1/filters").await.json();
        let roots = plain["filters"].as_array().unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0]["slug"], "crypto");
        assert_eq!(roots[0]["children"][0]["name"], "A");
        assert_eq!(roots[0]["children"][1]["name"], "B");
        assert!(roots[0].get("articleCount").is_none());

        let counted: Value = h.server.get("/api/v1/filters?includeCounts=true").await.json();
        assert_eq!(counted["filters"][0]["articleCount"], 0);
        assert_eq!(counted["filters"][0]["children"][1]["articleCount"], 1);

        let stats: Value = h.server.get("/api/v1/filters?stats=true").await.json();
        assert_eq!(stats["total"], 3);
        assert_eq!(stats["level1Count"], 2);
        assert_eq!(stats["withArticlesCount"], 1);
    }

    #[tokio::test]
    async fn test_filtered_articles_intersection() {
        let h = Harness::new().await;
        let f1 = h.fx.filter("f1", None).await;
        let f2 = h.fx.filter("f2", None).await;
        let f3 = h.fx.filter("f3", None).await;
        h.fx.published("a1", 1, &[&f1, &f2]).await;
        h.fx.published("a2", 2, &[&f1]).await;
        h.fx.published("a3", 3, &[&f1, &f2, &f3]).await;

        let two: Value = h.server.get("/api/v1/filters/f1/articles?filters=f2").await.json();
        let three: Value = h
            .server
            .get(&format!("/api/v1/filters/{}/articles?filters=f2&filters=f3", f1.id))
            .await
            .json();
        let stale: Value = h
            .server
            .get("/api/v1/filters/f1/articles?filters=nonexistent-slug")
            .await
            .json();

        assert_eq!(slugs(&two), vec!["a1", "a3"]);
        assert_eq!(slugs(&three), vec!["a3"]);
        assert_eq!(slugs(&stale), vec!["a1", "a2", "a3"]);
        assert_eq!(stale["totalCount"], 3);
    }

    #[tokio::test]
    async fn test_filtered_articles_pagination_and_errors() {
        let h = Harness::new().await;
        let defi = h.fx.filter("defi", None).await;
        for n in 0..25 {
            h.fx.published(&format!("a{:02}", n), n, &[&defi]).await;
        }

        let response = h.server.get("/api/v1/filters/defi/articles?page=3&limit=10").await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["totalCount"], 25);
        assert_eq!(body["totalPages"], 3);
        assert_eq!(body["pageSize"], 10);
        assert_eq!(body["articles"].as_array().unwrap().len(), 5);

        let missing = h.server.get("/api/v1/filters/nope/articles").await;
        missing.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(missing.json::<Value>()["error"]["code"], "NOT_FOUND");

        let bad_page = h.server.get("/api/v1/filters/defi/articles?page=abc").await;
        bad_page.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_oversized_limit_is_clamped() {
        let h = Harness::new().await;
        let defi = h.fx.filter("defi", None).await;
        h.fx.published("a1", 1, &[&defi]).await;
        let max = FilterQueryConfig::default().max_page_size;

        let response = h
            .server
            .get("/api/v1/filters/defi/articles?limit=99999999999")
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["pageSize"], max);

        let huge = h
            .server
            .get("/api/v1/filters/defi/articles?limit=99999999999999999999999")
            .await;
        huge.assert_status_ok();
        assert_eq!(huge.json::<Value>()["pageSize"], max);

        let negative = h.server.get("/api/v1/filters/defi/articles?limit=-5").await;
        negative.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_mutations_require_admin() {
        let h = Harness::new().await;
        let body = json!({ "name": "DeFi", "slug": "defi" });

        let anonymous = h.server.post("/api/v1/filters").json(&body).await;
        anonymous.assert_status(StatusCode::UNAUTHORIZED);

        let author = h
            .server
            .post("/api/v1/filters")
            .add_header(header::AUTHORIZATION, Harness::bearer(&h.author_token))
            .json(&body)
            .await;
        author.assert_status(StatusCode::FORBIDDEN);

        let expired = h
            .server
            .delete("/api/v1/filters?id=x")
            .add_header(header::AUTHORIZATION, Harness::bearer("not-a-session"))
            .await;
        expired.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_create_and_update_filter() {
        let h = Harness::new().await;
        let auth = Harness::bearer(&h.admin_token);

        let created = h
            .server
            .post("/api/v1/filters")
            .add_header(header::AUTHORIZATION, auth.clone())
            .json(&json!({ "name": "Crypto", "slug": "crypto" }))
            .await;
        created.assert_status(StatusCode::CREATED);
        let root: Value = created.json();
        assert_eq!(root["level"], 0);

        let child: Value = h
            .server
            .post("/api/v1/filters")
            .add_header(header::AUTHORIZATION, auth.clone())
            .json(&json!({ "name": "DeFi", "slug": "defi", "parent_id": root["id"] }))
            .await
            .json();
        assert_eq!(child["level"], 1);
        assert_eq!(child["parentId"], root["id"]);

        let missing_slug = h
            .server
            .post("/api/v1/filters")
            .add_header(header::AUTHORIZATION, auth.clone())
            .json(&json!({ "name": "NFT" }))
            .await;
        missing_slug.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(missing_slug.json::<Value>()["error"]["code"], "VALIDATION_ERROR");

        let duplicate = h
            .server
            .post("/api/v1/filters")
            .add_header(header::AUTHORIZATION, auth.clone())
            .json(&json!({ "name": "Again", "slug": "defi" }))
            .await;
        duplicate.assert_status(StatusCode::CONFLICT);

        let missing_id = h
            .server
            .put("/api/v1/filters")
            .add_header(header::AUTHORIZATION, auth.clone())
            .json(&json!({ "name": "Renamed" }))
            .await;
        missing_id.assert_status(StatusCode::BAD_REQUEST);

        let moved = h
            .server
            .put("/api/v1/filters")
            .add_header(header::AUTHORIZATION, auth)
            .json(&json!({ "id": child["id"], "name": "Decentralized Finance", "parentId": null }))
            .await;
        moved.assert_status_ok();
        let moved: Value = moved.json();
        assert_eq!(moved["name"], "Decentralized Finance");
        assert_eq!(moved["level"], 0);
        assert!(moved["parentId"].is_null());
    }

    #[tokio::test]
    async fn test_delete_filter() {
        let h = Harness::new().await;
        let auth = Harness::bearer(&h.admin_token);
        let defi = h.fx.filter("defi", None).await;
        let nft = h.fx.filter("nft", None).await;
        h.fx.published("a1", 1, &[&defi]).await;

        let missing_id = h
            .server
            .delete("/api/v1/filters")
            .add_header(header::AUTHORIZATION, auth.clone())
            .await;
        missing_id.assert_status(StatusCode::BAD_REQUEST);

        let conflict = h
            .server
            .delete(&format!("/api/v1/filters?id={}", defi.id))
            .add_header(header::AUTHORIZATION, auth.clone())
            .await;
        conflict.assert_status(StatusCode::CONFLICT);
        assert_eq!(
            conflict.json::<Value>()["error"]["message"],
            "Filter 'defi' is still referenced by 1 article(s)"
        );

        let deleted = h
            .server
            .delete(&format!("/api/v1/filters?id={}", nft.id))
            .add_header(header::AUTHORIZATION, auth)
            .await;
        deleted.assert_status_ok();
        assert_eq!(deleted.json::<Value>(), json!({ "success": true }));

        let forest: Value = h.server.get("/api/v1/filters").await.json();
        assert_eq!(forest["filters"].as_array().unwrap().len(), 1);
    }
}
