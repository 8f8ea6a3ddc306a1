//! # Domain Layer
//!
//! Core business logic and models. This layer is independent of external
//! frameworks and infrastructure — repository/service ports live in
//! `application::interfaces`, implementations in `connector::adapter`.

pub mod error;
pub mod hnsw;
pub mod ignore_rules;
pub mod models;
pub mod quantization;
pub mod query_classifier;
pub mod repo_map;
pub mod retrieval;
pub mod symbol_search;

pub use error::*;
pub use models::*;
