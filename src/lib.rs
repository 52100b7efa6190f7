//! Folio - publication CMS backend
//!
//! This library provides the filter taxonomy and filtered article retrieval
//! engine for the Folio content management system.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
