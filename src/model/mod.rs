//! Collection data model
//!
//! A Collection is an ordered tree of folders and requests plus optional
//! collection-level scripts, a protocol identifier, and test-data rows.
//! It is owned by the caller and immutable during a run; variable scope
//! layers are created per iteration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Auth types that bypass plugin dispatch entirely
pub const AUTH_NONE: &str = "none";
pub const AUTH_INHERIT: &str = "inherit";

/// Root entity: the full test suite definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    /// Display name
    pub name: String,
    /// Protocol identifier served by a registered protocol plugin
    pub protocol: String,
    /// Ordered top-level items
    #[serde(default)]
    pub items: Vec<CollectionItem>,
    /// Collection-level pre-request script (outermost in every chain)
    #[serde(default)]
    pub pre_script: Option<Script>,
    /// Collection-level post-request script (outermost in every chain)
    #[serde(default)]
    pub post_script: Option<Script>,
    /// Test-data rows; each row overlays the variable scope for one iteration
    #[serde(default)]
    pub test_data: Vec<HashMap<String, String>>,
}

/// A node in the collection tree
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CollectionItem {
    Folder(Folder),
    Request(Request),
}

/// A folder groups child items and contributes its scripts to every
/// descendant request's chain. Folders nest arbitrarily deep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Folder {
    pub name: String,
    #[serde(default)]
    pub items: Vec<CollectionItem>,
    #[serde(default)]
    pub pre_script: Option<Script>,
    #[serde(default)]
    pub post_script: Option<Script>,
}

/// A leaf request with a protocol-specific payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub name: String,
    /// Protocol-specific payload, interpreted only by the protocol plugin
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub auth: Option<Auth>,
    #[serde(default)]
    pub pre_script: Option<Script>,
    #[serde(default)]
    pub post_script: Option<Script>,
    /// Scripts bound to named events emitted by the protocol plugin
    #[serde(default)]
    pub event_scripts: Vec<EventScript>,
}

/// A script bound to a named runtime event (e.g. a streamed message)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventScript {
    pub event: String,
    pub script: Script,
}

/// A user-authored script body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Script {
    pub source: String,
}

impl Script {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

/// Auth descriptor attached to a request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Auth {
    #[serde(rename = "type")]
    pub auth_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Auth {
    /// `'none'` and `'inherit'` bypass plugin dispatch entirely
    pub fn bypasses_dispatch(&self) -> bool {
        self.auth_type == AUTH_NONE || self.auth_type == AUTH_INHERIT
    }
}

/// One recorded assertion, produced only by `test()` calls in post-request
/// or plugin-event scripts. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestResult {
    pub fn passed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            skipped: false,
            error: None,
        }
    }

    pub fn failed(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            skipped: false,
            error: Some(error.into()),
        }
    }

    pub fn skipped(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            skipped: true,
            error: Some(reason.into()),
        }
    }
}

/// Response surfaced to callers by the dispatch pipeline
///
/// `status == 0` with `error` set denotes a transport-level or aborted
/// failure, distinct from a protocol-level non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    #[serde(default)]
    pub status_text: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Wall-clock duration in milliseconds, annotated by the dispatcher
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    /// Synthetic response for a dispatch short-circuited by cancellation
    pub fn aborted() -> Self {
        Self {
            status: 0,
            status_text: String::new(),
            body: String::new(),
            headers: HashMap::new(),
            duration_ms: 0,
            error: Some("Request aborted".to_string()),
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.status == 0 && self.error.as_deref() == Some("Request aborted")
    }
}
