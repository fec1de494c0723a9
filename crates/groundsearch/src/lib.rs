//! Public facade crate for `groundsearch`.
//!
//! This crate intentionally contains no IO or provider-specific logic.
//! It re-exports the backend-agnostic types/traits from `groundsearch-core`.

pub use groundsearch_core::*;
