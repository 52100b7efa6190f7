//! Data models
//!
//! This module contains the data structures used throughout Folio.
//! Models represent:
//! - Database entities (Filter, Article, User, Session)
//! - The resolver's tree and statistics types
//! - Pagination containers shared by repositories and services

mod article;
mod filter;
mod session;
mod user;

pub use article::{Article, ArticleStatus, CreateArticleInput, ListParams, PagedResult};
pub use filter::{
    CreateFilterInput, Filter, FilterNode, FilterStats, UpdateFilterInput, MAX_FILTER_LEVEL,
};
pub use session::Session;
pub use user::{CreateUserInput, User, UserRole};
