//! # hearken-std
//!
//! Standard implementations for the Hearken event dispatch framework.
//!
//! This crate provides:
//! - **Filters**: [`FnFilter`](filters::FnFilter), [`TextFilter`](filters::TextFilter)
//!   with its [`MatchType`](filters::MatchType)s, and text preprocessing
//! - **Listeners**: [`FnListener`](listeners::FnListener), a closure-backed listener builder
//! - **Interceptors**: Tracing and logging (`tracing` feature), timeouts (`timeout` feature)
//! - **Testing**: Test events, recording listeners and counting interceptors

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

// Re-export core traits
pub use hearken_core;

// Modules
pub mod filters;
pub mod interceptors;
pub mod listeners;
pub mod testing;
