//! `groundsearch-mcp` crate (library surface).
//!
//! The primary entrypoint for end users is the `groundsearch` binary (CLI + MCP stdio).
//! The agent surface lives here so it can be embedded and exercised without
//! spawning a process.

pub mod agent;

pub use groundsearch_core as core;
