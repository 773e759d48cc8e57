//! Collection runner
//!
//! Walks the collection depth-first and, per request and test-data row,
//! runs the inherited pre-script chain, dispatches through the plugin
//! registry, runs the inherited post-script chain, then any plugin-event
//! scripts whose event fired. One request is in flight at a time; event
//! scripts are serialized so TestResult ordering stays deterministic.

pub mod predictor;
pub mod vars;
pub mod walk;

pub use predictor::count_tests;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::common::{CancelToken, Error, Result};
use crate::model::{Collection, Response, TestResult};
use crate::plugin::{DispatchContext, DispatchOptions, EventSink, PluginRegistry};
use crate::script::sandbox::ResultCallback;
use crate::script::{scan, ScriptKind, ScriptSandbox};

/// Run lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    /// Tree fully walked
    Completed,
    /// Cancellation observed before full completion
    Aborted,
    /// Unrecoverable configuration or script error (not a test failure)
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::Aborted => "aborted",
            RunState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Summary of one finished run
#[derive(Debug)]
pub struct RunReport {
    pub state: RunState,
    pub results: Vec<TestResult>,
    pub responses: Vec<Response>,
    pub requests_executed: usize,
    pub duration: Duration,
}

impl RunReport {
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.passed).count()
    }

    pub fn failed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| !r.passed && !r.skipped)
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.results.iter().filter(|r| r.skipped).count()
    }
}

/// One instance per run
pub struct Runner {
    registry: Arc<PluginRegistry>,
    options: DispatchOptions,
    cancel: CancelToken,
    state: RunState,
    on_result: Option<ResultCallback>,
}

impl Runner {
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self {
            registry,
            options: DispatchOptions::default(),
            cancel: CancelToken::new(),
            state: RunState::Idle,
            on_result: None,
        }
    }

    pub fn with_options(mut self, options: DispatchOptions) -> Self {
        self.options = options;
        self
    }

    /// Live progress callback, invoked synchronously per test result
    pub fn with_on_result(mut self, callback: ResultCallback) -> Self {
        self.on_result = Some(callback);
        self
    }

    /// The run's shared cancellation token
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Execute the collection once per test-data row (once if none)
    ///
    /// One instance per run: a second call on the same instance is rejected.
    pub async fn run(
        &mut self,
        collection: &Collection,
        globals: &HashMap<String, String>,
    ) -> Result<RunReport> {
        if self.state != RunState::Idle {
            return Err(Error::Internal(format!(
                "runner instance already used (state: {})",
                self.state
            )));
        }
        self.state = RunState::Running;
        let started = Instant::now();

        let mut sandbox = ScriptSandbox::new(self.cancel.clone());
        if let Some(callback) = &self.on_result {
            sandbox = sandbox.with_on_result(Arc::clone(callback));
        }

        let mut responses = Vec::new();
        let mut requests_executed = 0;

        let outcome = self
            .walk_and_execute(
                collection,
                globals,
                &sandbox,
                &mut responses,
                &mut requests_executed,
            )
            .await;

        match outcome {
            Ok(()) => {
                self.state = if self.cancel.is_cancelled() {
                    RunState::Aborted
                } else {
                    RunState::Completed
                };
                tracing::info!(
                    target: "quiver::runner",
                    state = %self.state,
                    requests = requests_executed,
                    tests = sandbox.results().len(),
                    "run finished"
                );
                Ok(RunReport {
                    state: self.state,
                    results: sandbox.results(),
                    responses,
                    requests_executed,
                    duration: started.elapsed(),
                })
            }
            Err(e) => {
                self.state = RunState::Failed;
                tracing::error!(target: "quiver::runner", error = %e, "run failed");
                Err(e)
            }
        }
    }

    async fn walk_and_execute(
        &self,
        collection: &Collection,
        globals: &HashMap<String, String>,
        sandbox: &ScriptSandbox,
        responses: &mut Vec<Response>,
        requests_executed: &mut usize,
    ) -> Result<()> {
        let plans = walk::request_plans(collection);

        let rows: Vec<HashMap<String, String>> = if collection.test_data.is_empty() {
            vec![HashMap::new()]
        } else {
            collection.test_data.clone()
        };

        // Event metadata drives which event scripts count as assertions,
        // both here (aborted replay) and in the predictor.
        let event_meta: HashMap<String, bool> = self
            .registry
            .protocol_events(&collection.protocol)
            .map(|events| {
                events
                    .into_iter()
                    .map(|e| (e.name, e.can_have_tests))
                    .collect()
            })
            .unwrap_or_default();

        for plan in &plans {
            for row in &rows {
                let mut iteration_vars = globals.clone();
                iteration_vars.extend(row.clone());

                // Once cancelled, no new dispatch begins; the post chain
                // still runs so every remaining test is recorded skipped,
                // keeping the result cardinality deterministic.
                let aborted = self.cancel.is_cancelled();

                let mut request = plan.request.clone();
                if !aborted {
                    for (kind, script) in &plan.pre_chain {
                        sandbox.run(*kind, script, &iteration_vars)?;
                    }
                    request.data = vars::substitute_payload(
                        &self.registry,
                        &request.data,
                        &iteration_vars,
                    )?;
                }

                let events = EventSink::new();
                let mut ctx = DispatchContext::new(self.cancel.clone(), request.clone());
                let response = self
                    .registry
                    .execute(
                        &collection.protocol,
                        &request,
                        &mut ctx,
                        &self.options,
                        Some(&events),
                    )
                    .await?;

                if !response.is_aborted() {
                    *requests_executed += 1;
                }

                let mut post_vars = iteration_vars.clone();
                post_vars.insert("response.status".into(), response.status.to_string());
                post_vars.insert("response.body".into(), response.body.clone());
                post_vars.insert(
                    "response.duration_ms".into(),
                    response.duration_ms.to_string(),
                );
                if let Some(error) = &response.error {
                    post_vars.insert("response.error".into(), error.clone());
                }

                for (kind, script) in &plan.post_chain {
                    sandbox.run(*kind, script, &post_vars)?;
                }

                let fired = events.take();
                for fired_event in &fired {
                    for event_script in plan
                        .request
                        .event_scripts
                        .iter()
                        .filter(|es| &es.event == fired_event)
                    {
                        let kind = ScriptKind::PluginEvent {
                            can_have_tests: event_meta
                                .get(&event_script.event)
                                .copied()
                                .unwrap_or(false),
                        };
                        sandbox.run(kind, &event_script.script, &post_vars)?;
                    }
                }

                // A cancelled run may leave declared events unfired, whether
                // the dispatch was short-circuited or the plugin stopped
                // mid-stream. Countable event scripts are topped up to the
                // statically declared count so every predicted test still
                // records a (skipped) result and the final cardinality
                // matches a determinate prediction. When the count is
                // indeterminate the prediction was -1 and no cardinality
                // constraint holds.
                if self.cancel.is_cancelled() {
                    let expected = plan
                        .request
                        .pre_script
                        .as_ref()
                        .and_then(|s| scan::expected_event_count(&s.source))
                        .unwrap_or(0) as usize;
                    for event_script in &plan.request.event_scripts {
                        if !event_meta.get(&event_script.event).copied().unwrap_or(false) {
                            continue;
                        }
                        let ran = fired.iter().filter(|f| **f == event_script.event).count();
                        for _ in ran..expected {
                            sandbox.run(
                                ScriptKind::PluginEvent {
                                    can_have_tests: true,
                                },
                                &event_script.script,
                                &post_vars,
                            )?;
                        }
                    }
                }

                responses.push(response);
            }
        }

        Ok(())
    }
}
