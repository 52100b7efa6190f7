//! Services layer - Business logic
//!
//! Services are responsible for:
//! - Implementing business rules
//! - Coordinating between repositories and cache
//! - Handling validation and error cases

pub mod auth;
pub mod filter;
pub mod filtered_articles;

pub use auth::{AuthService, AuthServiceError};
pub use filter::{build_hierarchy, compute_stats, FilterService, FilterServiceError};
pub use filtered_articles::{FilteredArticlePage, FilteredArticleQuery, FilteredArticleService};
