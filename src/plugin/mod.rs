//! Plugin capability traits and dispatch types
//!
//! Three plugin kinds, each a closed capability interface: protocol plugins
//! execute requests, auth plugins mutate requests, value providers resolve
//! variables from external sources. Plugins are registered once at process
//! start and are read-only, stateless dispatch targets afterwards.

pub mod builtin;
pub mod dispatch;
pub mod registry;

pub use registry::PluginRegistry;

use async_trait::async_trait;
use std::sync::Mutex;

use crate::common::{CancelToken, Result};
use crate::model::{Auth, Request, Response};

/// Result of a plugin-side validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    pub fn invalid(errors: Vec<String>) -> Self {
        Self {
            valid: false,
            errors,
        }
    }
}

/// A named event a protocol plugin may emit during execution
#[derive(Debug, Clone)]
pub struct ProtocolEvent {
    pub name: String,
    /// Whether scripts bound to this event may contain `test()` assertions
    pub can_have_tests: bool,
}

/// Options threaded through the dispatch pipeline
#[derive(Debug, Clone, Default)]
pub struct DispatchOptions {
    /// Per-request timeout hint for protocol plugins, in seconds
    pub timeout_secs: Option<u64>,
}

/// Per-dispatch context shared with the protocol plugin
///
/// `current_request` is the auth-augmented view; downstream scripts observe
/// the request as mutated by the auth plugin, not the original.
#[derive(Debug)]
pub struct DispatchContext {
    pub cancel: CancelToken,
    pub current_request: Request,
}

impl DispatchContext {
    pub fn new(cancel: CancelToken, request: Request) -> Self {
        Self {
            cancel,
            current_request: request,
        }
    }
}

/// Collects events fired by a protocol plugin during one execution
///
/// The runner drains the sink after `execute` returns and runs bound event
/// scripts serially, in emission order.
#[derive(Debug, Default)]
pub struct EventSink {
    fired: Mutex<Vec<String>>,
}

impl EventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: impl Into<String>) {
        self.fired.lock().expect("event sink poisoned").push(event.into());
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.fired.lock().expect("event sink poisoned"))
    }
}

/// A protocol plugin executes requests for the protocol identifiers it serves
#[async_trait]
pub trait ProtocolPlugin: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> &str {
        "0.0.0"
    }

    /// Protocol identifiers this plugin serves (registry keys)
    fn protocols(&self) -> Vec<String>;

    /// Auth types valid under this protocol
    fn supported_auth_types(&self) -> Vec<String>;

    /// Named events this plugin may emit during execution
    fn events(&self) -> Vec<ProtocolEvent> {
        Vec::new()
    }

    fn validate(&self, request: &Request, options: &DispatchOptions) -> ValidationResult;

    /// Execute the request. Implementations observe `ctx.cancel` for their
    /// own I/O and report fired events through `events` as they happen.
    async fn execute(
        &self,
        request: &Request,
        ctx: &mut DispatchContext,
        options: &DispatchOptions,
        events: Option<&EventSink>,
    ) -> Result<Response>;
}

/// An auth plugin serves a set of auth type keys under specific protocols
pub trait AuthPlugin: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> &str {
        "0.0.0"
    }

    /// Auth type keys this plugin serves (registry keys)
    fn auth_types(&self) -> Vec<String>;

    /// Protocols this auth scheme is valid under
    fn protocols(&self) -> Vec<String>;

    fn validate(&self, auth: &Auth, options: &DispatchOptions) -> ValidationResult;

    /// Apply the auth scheme, returning the mutated request
    fn apply(&self, request: &Request, auth: &Auth, options: &DispatchOptions) -> Result<Request>;
}

/// A value provider resolves a variable from an external source
///
/// Returning `Ok(None)` means "key not found" and is not an error.
pub trait ValueProviderPlugin: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> &str {
        "0.0.0"
    }

    /// Provider key this plugin serves, e.g. `"vault:file"`
    fn provider(&self) -> String;

    fn get_value(&self, key: &str, config: Option<&serde_json::Value>) -> Result<Option<String>>;
}
