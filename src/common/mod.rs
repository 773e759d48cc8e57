//! Shared infrastructure: errors, config, logging, paths, cancellation

pub mod cancel;
pub mod config;
pub mod error;
pub mod logging;
pub mod paths;

pub use cancel::CancelToken;
pub use config::Config;
pub use error::{Error, Result};
