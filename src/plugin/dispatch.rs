//! Request dispatch pipeline
//!
//! Fixed-order pipeline: cancellation short-circuit, protocol lookup, auth
//! compatibility check, auth apply, protocol validate, protocol execute.
//! None of these steps is retried here; retries, if any, are a runner-level
//! policy.

use std::time::Instant;

use crate::common::{Error, Result};
use crate::model::{Request, Response};

use super::{DispatchContext, DispatchOptions, EventSink, PluginRegistry};

impl PluginRegistry {
    /// Execute a request through the registered protocol plugin
    ///
    /// The mutated (auth-augmented) request replaces `ctx.current_request`
    /// before execution so downstream scripts observe it.
    pub async fn execute(
        &self,
        protocol: &str,
        request: &Request,
        ctx: &mut DispatchContext,
        options: &DispatchOptions,
        events: Option<&EventSink>,
    ) -> Result<Response> {
        // Cancellation must be observable before any plugin code runs
        if ctx.cancel.is_cancelled() {
            tracing::debug!(target: "quiver::plugin", request = %request.name, "dispatch aborted before plugin code");
            return Ok(Response::aborted());
        }

        let plugin = self
            .protocol(protocol)
            .ok_or_else(|| Error::ProtocolNotFound(protocol.to_string()))?;

        let mut request = request.clone();

        if let Some(auth) = request.auth.clone().filter(|a| !a.bypasses_dispatch()) {
            let supported = plugin.supported_auth_types();
            if !supported.iter().any(|t| t == &auth.auth_type) {
                return Err(Error::auth_not_supported(
                    &auth.auth_type,
                    protocol,
                    &supported,
                ));
            }

            let auth_plugin = self
                .auth(&auth.auth_type)
                .ok_or_else(|| Error::AuthPluginNotFound(auth.auth_type.clone()))?;

            request = auth_plugin
                .apply(&request, &auth, options)
                .map_err(|e| Error::auth_apply_failed(&auth.auth_type, &e.to_string()))?;

            ctx.current_request = request.clone();
        }

        let validation = plugin.validate(&request, options);
        if !validation.valid {
            return Err(Error::Validation(validation.errors.join("; ")));
        }

        let started = Instant::now();
        let mut response = plugin.execute(&request, ctx, options, events).await?;
        response.duration_ms = started.elapsed().as_millis() as u64;

        tracing::debug!(
            target: "quiver::plugin",
            request = %request.name,
            status = response.status,
            duration_ms = response.duration_ms,
            "request executed"
        );

        Ok(response)
    }

    /// Resolve a variable through a value-provider plugin
    ///
    /// `Ok(None)` means the provider looked but found nothing; a missing or
    /// failing provider is a fatal configuration error.
    pub fn resolve_value_provider(
        &self,
        provider: &str,
        key: &str,
        config: Option<&serde_json::Value>,
    ) -> Result<Option<String>> {
        let plugin = self
            .value_provider(provider)
            .ok_or_else(|| Error::ProviderNotFound(provider.to_string()))?;

        plugin
            .get_value(key, config)
            .map_err(|e| Error::provider_failed(provider, &e.to_string()))
    }
}
