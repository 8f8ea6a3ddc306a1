//! # Application Layer
//!
//! Use cases and orchestration logic coordinating domain and connector layers.
//! `interfaces` defines the ports (traits) that `connector::adapter`
//! implements; `use_cases` is the orchestration that depends on those ports.

pub mod interfaces;
pub mod use_cases;

pub use interfaces::*;
pub use use_cases::*;
