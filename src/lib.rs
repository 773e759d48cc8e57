//! Quiver - a collection-based API test runner
//!
//! Walks a tree of folders and requests, executes each request through a
//! protocol plugin, applies auth and variable substitution, runs user
//! scripts before/after each request, and records pass/fail assertions.

pub mod cli;
pub mod commands;
pub mod common;
pub mod discovery;
pub mod model;
pub mod plugin;
pub mod runner;
pub mod script;

// Re-export commonly used types for tests
pub use common::{CancelToken, Error, Result};
pub use model::{Collection, CollectionItem, Response, TestResult};
pub use plugin::PluginRegistry;
pub use runner::{count_tests, RunState, Runner};
