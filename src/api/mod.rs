//! API layer - HTTP handlers and routing
//!
//! All endpoints live under `/api/v1`:
//! - Filter taxonomy reads (public)
//! - Filtered article listing (public)
//! - Filter mutations (admin session required)

pub mod common;
pub mod filters;
pub mod middleware;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use middleware::{ApiError, AppState, AuthenticatedUser};

/// Build the main API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Admin routes (need admin role)
    let admin_routes = filters::admin_router()
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::require_auth,
        ));

    // Public routes
    filters::router().merge(admin_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Result<Router> {
    let origin = cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid CORS origin: {}", cors_origin))?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);

    Ok(Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::create_cache;
    use crate::config::{CacheConfig, FilterQueryConfig};
    use crate::db::repositories::test_support::Fixture;
    use crate::db::repositories::SqlxSessionRepository;
    use crate::services::{AuthService, FilterService, FilteredArticleService};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn state() -> AppState {
        let fx = Fixture::new().await;
        let filter_service = Arc::new(FilterService::new(
            fx.filters.clone(),
            create_cache(&CacheConfig::default()),
        ));
        AppState {
            filtered_articles: Arc::new(FilteredArticleService::new(
                filter_service.clone(),
                fx.filters.clone(),
                FilterQueryConfig::default(),
            )),
            filter_service,
            auth_service: Arc::new(AuthService::new(
                SqlxSessionRepository::boxed(fx.pool.clone()),
                fx.users.clone(),
            )),
        }
    }

    #[tokio::test]
    async fn test_cors_preflight_allows_configured_origin() {
        let app = build_router(state().await, "http://localhost:3000").unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/v1/filters")
                    .header(header::ORIGIN, "http://localhost:3000")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "DELETE")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:3000"
        );
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS],
            "true"
        );
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let app = build_router(state().await, "http://localhost:3000").unwrap();

        let response = app
            .oneshot(Request::builder().uri("/api/v1/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_cors_origin_is_rejected() {
        assert!(build_router(state().await, "bad\norigin").is_err());
    }
}
