//! Script sandbox and assertion API
//!
//! Executes one user script body in an isolated rhai engine whose global
//! surface is exactly what we register: `test`, `skip`, `fail`,
//! `expect_events` and `getvar`. Assertion legality is enforced by the
//! script kind and an explicit inside-a-test flag, not lexical scoping.
//!
//! `skip`/`fail` abort the enclosing test body by raising a distinguished
//! `ControlSignal` value through the engine's runtime-error channel; the
//! `test` wrapper matches it structurally, so a user `throw` can never be
//! mistaken for a skip.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use rhai::{Dynamic, Engine, EvalAltResult, FnPtr, NativeCallContext, Position, Scope};

use crate::common::{CancelToken, Error, Result};
use crate::model::{Script, TestResult};

/// Declared kind of the script being executed
///
/// Only post-request and plugin-event scripts may contain `test()` calls:
/// assertions require response data, which only exists after a request
/// completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    Collection,
    Folder,
    PreRequest,
    PostRequest,
    /// Bound to a named plugin event; assertions are legal only when the
    /// protocol plugin marks the event as able to carry tests
    PluginEvent { can_have_tests: bool },
}

impl ScriptKind {
    pub fn allows_tests(self) -> bool {
        matches!(
            self,
            ScriptKind::PostRequest | ScriptKind::PluginEvent { can_have_tests: true }
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            ScriptKind::Collection => "collection",
            ScriptKind::Folder => "folder",
            ScriptKind::PreRequest => "pre-request",
            ScriptKind::PostRequest => "post-request",
            ScriptKind::PluginEvent { .. } => "plugin-event",
        }
    }
}

impl fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Control-flow signal raised by `skip`/`fail` inside a test body
#[derive(Debug, Clone)]
enum ControlSignal {
    Skip(String),
    Fail(String),
}

/// Callback invoked synchronously for every emitted TestResult
pub type ResultCallback = Arc<dyn Fn(&TestResult) + Send + Sync>;

/// Executes user scripts and collects TestResults for one run
pub struct ScriptSandbox {
    cancel: CancelToken,
    results: Arc<Mutex<Vec<TestResult>>>,
    on_result: Option<ResultCallback>,
}

impl ScriptSandbox {
    pub fn new(cancel: CancelToken) -> Self {
        Self {
            cancel,
            results: Arc::new(Mutex::new(Vec::new())),
            on_result: None,
        }
    }

    /// Set a live progress callback, invoked synchronously per test result
    pub fn with_on_result(mut self, callback: ResultCallback) -> Self {
        self.on_result = Some(callback);
        self
    }

    /// Snapshot of the ordered result list so far
    pub fn results(&self) -> Vec<TestResult> {
        self.results.lock().expect("results poisoned").clone()
    }

    /// Execute one script body
    ///
    /// A script evaluation error outside any `test()` call is fatal to the
    /// script and surfaces here; it produces no TestResult.
    pub fn run(
        &self,
        kind: ScriptKind,
        script: &Script,
        vars: &HashMap<String, String>,
    ) -> Result<()> {
        let engine = self.build_engine(kind, Arc::new(vars.clone()));
        let mut scope = Scope::new();

        engine
            .run_with_scope(&mut scope, &script.source)
            .map_err(|e| Error::script(kind.label(), &e.to_string()))
    }

    fn build_engine(&self, kind: ScriptKind, vars: Arc<HashMap<String, String>>) -> Engine {
        let mut engine = Engine::new();
        engine.set_max_call_levels(64);
        engine.set_max_operations(1_000_000);

        let in_test = Arc::new(AtomicBool::new(false));

        {
            let cancel = self.cancel.clone();
            let results = Arc::clone(&self.results);
            let on_result = self.on_result.clone();
            let in_test = Arc::clone(&in_test);

            engine.register_fn(
                "test",
                move |ctx: NativeCallContext,
                      name: &str,
                      callback: FnPtr|
                      -> std::result::Result<(), Box<EvalAltResult>> {
                    if !kind.allows_tests() {
                        let message = if let ScriptKind::PluginEvent { .. } = kind {
                            "test() is not allowed in a script bound to an event that \
                             cannot have tests"
                                .to_string()
                        } else {
                            format!("test() is not allowed in a {} script", kind.label())
                        };
                        return Err(message.into());
                    }

                    // Cancellation is checked at every test() entry; the
                    // body is never invoked once the run is aborted.
                    if cancel.is_cancelled() {
                        record(
                            &results,
                            &on_result,
                            TestResult::skipped(name, "Test skipped - execution aborted"),
                        );
                        return Ok(());
                    }

                    in_test.store(true, Ordering::SeqCst);
                    let outcome = callback.call_within_context::<Dynamic>(&ctx, ());
                    in_test.store(false, Ordering::SeqCst);

                    let result = match outcome {
                        Ok(_) => TestResult::passed(name),
                        Err(err) => match control_signal(&err) {
                            Some(ControlSignal::Skip(reason)) => TestResult::skipped(name, reason),
                            Some(ControlSignal::Fail(message)) => TestResult::failed(name, message),
                            None => TestResult::failed(name, err.to_string()),
                        },
                    };
                    record(&results, &on_result, result);
                    Ok(())
                },
            );
        }

        {
            let in_test = Arc::clone(&in_test);
            engine.register_fn(
                "skip",
                move |reason: &str| -> std::result::Result<(), Box<EvalAltResult>> {
                    if !in_test.load(Ordering::SeqCst) {
                        return Err("skip() called outside of a test()".into());
                    }
                    Err(Box::new(EvalAltResult::ErrorRuntime(
                        Dynamic::from(ControlSignal::Skip(reason.to_string())),
                        Position::NONE,
                    )))
                },
            );
        }

        {
            let in_test = Arc::clone(&in_test);
            engine.register_fn(
                "fail",
                move |message: &str| -> std::result::Result<(), Box<EvalAltResult>> {
                    if !in_test.load(Ordering::SeqCst) {
                        return Err("fail() called outside of a test()".into());
                    }
                    Err(Box::new(EvalAltResult::ErrorRuntime(
                        Dynamic::from(ControlSignal::Fail(message.to_string())),
                        Position::NONE,
                    )))
                },
            );
        }

        // Runtime no-op marker; the predictor consumes it statically
        engine.register_fn("expect_events", |_count: i64| {});

        engine.register_fn("getvar", move |name: &str| -> String {
            vars.get(name).cloned().unwrap_or_default()
        });

        engine
    }
}

/// Append to the ordered list and forward to the live callback, in that
/// order, synchronously relative to the test's resolution
fn record(
    results: &Arc<Mutex<Vec<TestResult>>>,
    on_result: &Option<ResultCallback>,
    result: TestResult,
) {
    results
        .lock()
        .expect("results poisoned")
        .push(result.clone());
    if let Some(callback) = on_result {
        callback(&result);
    }
}

/// Unwrap a ControlSignal from a (possibly nested) runtime error
fn control_signal(err: &EvalAltResult) -> Option<ControlSignal> {
    match err {
        EvalAltResult::ErrorRuntime(value, _) => value.clone().try_cast::<ControlSignal>(),
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => control_signal(inner),
        _ => None,
    }
}
