//! # Connector Layer
//!
//! External integrations implementing the ports declared in
//! `application::interfaces`: tree-sitter parsing, SQLite/LanceDB storage,
//! embedding/reranking backends, and Git plumbing.

pub mod adapter;

pub use adapter::*;
