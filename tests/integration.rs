//! End-to-end runner tests against an in-process mock protocol stack

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use quiver::model::{Auth, CollectionItem, EventScript, Folder, Request, Script};
use quiver::plugin::{
    AuthPlugin, DispatchContext, DispatchOptions, EventSink, ProtocolEvent, ProtocolPlugin,
    ValidationResult,
};
use quiver::{
    count_tests, Collection, Error, PluginRegistry, Response, Result, RunState, Runner,
};

/// Echoes the (substituted, auth-augmented) payload back as the body.
///
/// `data.emit` controls how many `message` events fire; `data.emit_open`
/// fires the non-countable `open` event once; `data.cancel_after` cancels
/// the run token after this request finishes, simulating a Ctrl-C that
/// lands mid-run.
struct MockProtocol;

#[async_trait]
impl ProtocolPlugin for MockProtocol {
    fn name(&self) -> &str {
        "mock"
    }

    fn protocols(&self) -> Vec<String> {
        vec!["mock".into()]
    }

    fn supported_auth_types(&self) -> Vec<String> {
        vec!["bearer".into()]
    }

    fn events(&self) -> Vec<ProtocolEvent> {
        vec![
            ProtocolEvent {
                name: "message".into(),
                can_have_tests: true,
            },
            ProtocolEvent {
                name: "open".into(),
                can_have_tests: false,
            },
        ]
    }

    fn validate(&self, request: &Request, _options: &DispatchOptions) -> ValidationResult {
        if request.data.get("invalid").is_some() {
            ValidationResult::invalid(vec!["payload flagged invalid".into()])
        } else {
            ValidationResult::ok()
        }
    }

    async fn execute(
        &self,
        request: &Request,
        ctx: &mut DispatchContext,
        _options: &DispatchOptions,
        events: Option<&EventSink>,
    ) -> Result<Response> {
        if let Some(sink) = events {
            if request
                .data
                .get("emit_open")
                .and_then(|v| v.as_bool())
                .unwrap_or(false)
            {
                sink.emit("open");
            }
            let emit = request.data.get("emit").and_then(|v| v.as_u64()).unwrap_or(0);
            for _ in 0..emit {
                sink.emit("message");
            }
        }

        if request
            .data
            .get("cancel_after")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
        {
            ctx.cancel.cancel();
        }

        Ok(Response {
            status: 200,
            status_text: "OK".into(),
            body: serde_json::to_string(&request.data)?,
            headers: HashMap::new(),
            duration_ms: 0,
            error: None,
        })
    }
}

/// Copies the token into the payload; `auth.data.explode` forces a failure
struct MockBearerAuth;

impl AuthPlugin for MockBearerAuth {
    fn name(&self) -> &str {
        "mock-bearer"
    }

    fn auth_types(&self) -> Vec<String> {
        vec!["bearer".into()]
    }

    fn protocols(&self) -> Vec<String> {
        vec!["mock".into()]
    }

    fn validate(&self, _auth: &Auth, _options: &DispatchOptions) -> ValidationResult {
        ValidationResult::ok()
    }

    fn apply(&self, request: &Request, auth: &Auth, _options: &DispatchOptions) -> Result<Request> {
        if auth
            .data
            .get("explode")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
        {
            return Err(Error::Internal("token store unavailable".into()));
        }

        let token = auth
            .data
            .get("token")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let mut request = request.clone();
        if let serde_json::Value::Object(map) = &mut request.data {
            map.insert(
                "auth_header".into(),
                serde_json::Value::String(format!("Bearer {token}")),
            );
        }
        Ok(request)
    }
}

fn registry() -> Arc<PluginRegistry> {
    let mut registry = PluginRegistry::new();
    registry.register_protocol(Arc::new(MockProtocol));
    registry.register_auth(Arc::new(MockBearerAuth));
    Arc::new(registry)
}

fn request(name: &str, post: &str) -> CollectionItem {
    CollectionItem::Request(Request {
        name: name.into(),
        data: serde_json::json!({}),
        auth: None,
        pre_script: None,
        post_script: Some(Script::new(post)),
        event_scripts: Vec::new(),
    })
}

fn collection(items: Vec<CollectionItem>) -> Collection {
    Collection {
        name: "integration".into(),
        protocol: "mock".into(),
        items,
        pre_script: None,
        post_script: None,
        test_data: Vec::new(),
    }
}

#[tokio::test]
async fn prediction_matches_execution_with_stacked_scripts_and_rows() {
    let mut c = collection(vec![CollectionItem::Folder(Folder {
        name: "folder".into(),
        pre_script: None,
        post_script: Some(Script::new(r#"test("folder level", || {});"#)),
        items: vec![request("leaf", r#"test("request level", || {});"#)],
    })]);
    c.post_script = Some(Script::new(r#"test("collection level", || {});"#));
    c.test_data = vec![HashMap::new(), HashMap::new()];

    let registry = registry();
    let predicted = count_tests(&c, &registry);
    assert_eq!(predicted, 6);

    let order = Arc::new(Mutex::new(Vec::new()));
    let order_cb = Arc::clone(&order);
    let mut runner = Runner::new(Arc::clone(&registry)).with_on_result(Arc::new(move |r| {
        order_cb.lock().unwrap().push(r.name.clone());
    }));
    let report = runner.run(&c, &HashMap::new()).await.unwrap();

    assert_eq!(report.state, RunState::Completed);
    assert_eq!(report.results.len(), predicted as usize);
    assert_eq!(report.passed(), 6);
    assert_eq!(report.requests_executed, 2);

    // Post chain runs outermost-first, identically per row
    let order = order.lock().unwrap();
    assert_eq!(
        *order,
        vec![
            "collection level",
            "folder level",
            "request level",
            "collection level",
            "folder level",
            "request level",
        ]
    );
}

#[tokio::test]
async fn event_scripts_fire_and_match_the_declared_count() {
    let c = collection(vec![CollectionItem::Request(Request {
        name: "stream".into(),
        data: serde_json::json!({"emit": 2}),
        auth: None,
        pre_script: Some(Script::new("expect_events(2);")),
        post_script: Some(Script::new(r#"test("stream closed", || {});"#)),
        event_scripts: vec![EventScript {
            event: "message".into(),
            script: Script::new(r#"test("message ok", || {});"#),
        }],
    })]);

    let registry = registry();
    let predicted = count_tests(&c, &registry);
    assert_eq!(predicted, 3);

    let mut runner = Runner::new(registry);
    let report = runner.run(&c, &HashMap::new()).await.unwrap();
    assert_eq!(report.results.len(), 3);
    assert_eq!(report.passed(), 3);
}

#[tokio::test]
async fn assertion_in_non_countable_event_script_is_rejected() {
    let c = collection(vec![CollectionItem::Request(Request {
        name: "stream".into(),
        data: serde_json::json!({"emit_open": true}),
        auth: None,
        pre_script: None,
        post_script: Some(Script::new(r#"test("closed", || {});"#)),
        event_scripts: vec![EventScript {
            event: "open".into(),
            script: Script::new(r#"test("opened", || {});"#),
        }],
    })]);

    let registry = registry();
    // `open` never carries tests, so the post test is the whole prediction
    assert_eq!(count_tests(&c, &registry), 1);

    let mut runner = Runner::new(registry);
    let err = runner.run(&c, &HashMap::new()).await.unwrap_err();
    assert!(err.to_string().contains("cannot have tests"));
    assert_eq!(runner.state(), RunState::Failed);
}

#[tokio::test]
async fn non_countable_event_script_without_tests_matches_prediction() {
    let c = collection(vec![CollectionItem::Request(Request {
        name: "stream".into(),
        data: serde_json::json!({"emit_open": true}),
        auth: None,
        pre_script: None,
        post_script: Some(Script::new(r#"test("closed", || {});"#)),
        event_scripts: vec![EventScript {
            event: "open".into(),
            script: Script::new(r#"getvar("response.status");"#),
        }],
    })]);

    let registry = registry();
    let predicted = count_tests(&c, &registry);
    assert_eq!(predicted, 1);

    let mut runner = Runner::new(registry);
    let report = runner.run(&c, &HashMap::new()).await.unwrap();
    assert_eq!(report.state, RunState::Completed);
    assert_eq!(report.results.len(), predicted as usize);
    assert_eq!(report.passed(), 1);
}

#[tokio::test]
async fn undeclared_event_count_makes_prediction_indeterminate() {
    let c = collection(vec![CollectionItem::Request(Request {
        name: "stream".into(),
        data: serde_json::json!({"emit": 1}),
        auth: None,
        pre_script: None,
        post_script: None,
        event_scripts: vec![EventScript {
            event: "message".into(),
            script: Script::new(r#"test("message ok", || {});"#),
        }],
    })]);
    assert_eq!(count_tests(&c, &registry()), -1);
}

#[tokio::test]
async fn cancellation_before_the_run_skips_everything() {
    let c = collection(vec![
        request("first", r#"test("a", || {});"#),
        request("second", r#"test("b", || {});"#),
    ]);
    let registry = registry();
    let predicted = count_tests(&c, &registry);

    let mut runner = Runner::new(registry);
    runner.cancel_token().cancel();
    let report = runner.run(&c, &HashMap::new()).await.unwrap();

    assert_eq!(report.state, RunState::Aborted);
    assert_eq!(report.requests_executed, 0);
    assert_eq!(report.results.len(), predicted as usize);
    assert_eq!(report.skipped(), 2);
    assert!(report.responses.iter().all(|r| r.is_aborted()));
    assert_eq!(
        report.responses[0].error.as_deref(),
        Some("Request aborted")
    );
}

#[tokio::test]
async fn mid_run_cancellation_keeps_result_cardinality() {
    let c = collection(vec![
        CollectionItem::Request(Request {
            name: "trigger".into(),
            data: serde_json::json!({"cancel_after": true}),
            auth: None,
            pre_script: None,
            post_script: Some(Script::new(r#"test("first", || {});"#)),
            event_scripts: Vec::new(),
        }),
        request("second", r#"test("second", || {});"#),
    ]);
    let registry = registry();
    let predicted = count_tests(&c, &registry);
    assert_eq!(predicted, 2);

    let mut runner = Runner::new(registry);
    let report = runner.run(&c, &HashMap::new()).await.unwrap();

    assert_eq!(report.state, RunState::Aborted);
    // The first request finished before cancellation landed
    assert_eq!(report.requests_executed, 1);
    assert!(!report.responses[0].is_aborted());
    assert!(report.responses[1].is_aborted());
    // Every predicted test still produced a result, all skipped
    assert_eq!(report.results.len(), predicted as usize);
    assert_eq!(report.skipped(), 2);
}

#[tokio::test]
async fn mid_execute_cancellation_tops_up_declared_events() {
    // The plugin emits 2 of the 4 declared messages, then cancellation
    // lands before the response is processed.
    let c = collection(vec![CollectionItem::Request(Request {
        name: "stream".into(),
        data: serde_json::json!({"emit": 2, "cancel_after": true}),
        auth: None,
        pre_script: Some(Script::new("expect_events(4);")),
        post_script: Some(Script::new(r#"test("closed", || {});"#)),
        event_scripts: vec![EventScript {
            event: "message".into(),
            script: Script::new(r#"test("message ok", || {});"#),
        }],
    })]);

    let registry = registry();
    let predicted = count_tests(&c, &registry);
    assert_eq!(predicted, 5);

    let mut runner = Runner::new(registry);
    let report = runner.run(&c, &HashMap::new()).await.unwrap();

    assert_eq!(report.state, RunState::Aborted);
    assert_eq!(report.requests_executed, 1);
    // Every predicted test still produced a (skipped) result
    assert_eq!(report.results.len(), predicted as usize);
    assert_eq!(report.skipped(), 5);
}

#[tokio::test]
async fn runner_instance_cannot_be_reused() {
    let c = collection(vec![request("r", r#"test("x", || {});"#)]);
    let mut runner = Runner::new(registry());
    runner.run(&c, &HashMap::new()).await.unwrap();
    assert_eq!(runner.state(), RunState::Completed);

    let err = runner.run(&c, &HashMap::new()).await.unwrap_err();
    assert!(err.to_string().contains("already used"));
}

#[tokio::test]
async fn test_call_in_pre_request_script_is_fatal() {
    let c = collection(vec![CollectionItem::Request(Request {
        name: "early".into(),
        data: serde_json::json!({}),
        auth: None,
        pre_script: Some(Script::new(r#"test("too soon", || {});"#)),
        post_script: None,
        event_scripts: Vec::new(),
    })]);

    let mut runner = Runner::new(registry());
    let err = runner.run(&c, &HashMap::new()).await.unwrap_err();
    assert!(err.to_string().contains("pre-request"));
    assert_eq!(runner.state(), RunState::Failed);
}

#[tokio::test]
async fn context_errors_name_the_level_the_script_was_declared_at() {
    let folder_level = collection(vec![CollectionItem::Folder(Folder {
        name: "f".into(),
        pre_script: Some(Script::new(r#"test("too soon", || {});"#)),
        post_script: None,
        items: vec![request("r", r#"test("x", || {});"#)],
    })]);
    let mut runner = Runner::new(registry());
    let err = runner.run(&folder_level, &HashMap::new()).await.unwrap_err();
    assert!(err.to_string().contains("folder"));

    let mut collection_level = collection(vec![request("r", r#"test("x", || {});"#)]);
    collection_level.pre_script = Some(Script::new(r#"test("too soon", || {});"#));
    let mut runner = Runner::new(registry());
    let err = runner
        .run(&collection_level, &HashMap::new())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("collection"));
}

#[tokio::test]
async fn auth_failure_names_the_auth_type() {
    let c = collection(vec![CollectionItem::Request(Request {
        name: "secured".into(),
        data: serde_json::json!({}),
        auth: Some(Auth {
            auth_type: "bearer".into(),
            data: serde_json::json!({"explode": true}),
        }),
        pre_script: None,
        post_script: None,
        event_scripts: Vec::new(),
    })]);

    let mut runner = Runner::new(registry());
    let err = runner.run(&c, &HashMap::new()).await.unwrap_err();
    assert!(err.is_configuration());
    let msg = err.to_string();
    assert!(msg.contains("bearer"));
    assert!(msg.contains("token store unavailable"));
}

#[tokio::test]
async fn unsupported_auth_type_lists_the_supported_set() {
    let c = collection(vec![CollectionItem::Request(Request {
        name: "secured".into(),
        data: serde_json::json!({}),
        auth: Some(Auth {
            auth_type: "oauth2".into(),
            data: serde_json::Value::Null,
        }),
        pre_script: None,
        post_script: None,
        event_scripts: Vec::new(),
    })]);

    let mut runner = Runner::new(registry());
    let err = runner.run(&c, &HashMap::new()).await.unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("oauth2"));
    assert!(msg.contains("bearer"));
}

#[tokio::test]
async fn substitution_and_auth_mutation_reach_the_protocol_plugin() {
    let c = collection(vec![CollectionItem::Request(Request {
        name: "echo".into(),
        data: serde_json::json!({"url": "{{base}}/users"}),
        auth: Some(Auth {
            auth_type: "bearer".into(),
            data: serde_json::json!({"token": "secret"}),
        }),
        pre_script: None,
        post_script: Some(Script::new(
            r#"
            test("url substituted", || {
                if !getvar("response.body").contains("https://api.example/users") {
                    fail("placeholder not substituted");
                }
            });
            test("auth applied", || {
                if !getvar("response.body").contains("Bearer secret") {
                    fail("auth header missing");
                }
            });
            "#,
        )),
        event_scripts: Vec::new(),
    })]);

    let mut globals = HashMap::new();
    globals.insert("base".to_string(), "https://api.example".to_string());

    let mut runner = Runner::new(registry());
    let report = runner.run(&c, &globals).await.unwrap();
    assert_eq!(report.passed(), 2, "results: {:?}", report.results);
    assert_eq!(report.responses[0].status, 200);
}

#[tokio::test]
async fn validation_errors_are_joined_and_fatal() {
    let c = collection(vec![CollectionItem::Request(Request {
        name: "bad".into(),
        data: serde_json::json!({"invalid": true}),
        auth: None,
        pre_script: None,
        post_script: None,
        event_scripts: Vec::new(),
    })]);

    let mut runner = Runner::new(registry());
    let err = runner.run(&c, &HashMap::new()).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert!(err.to_string().contains("payload flagged invalid"));
}

#[tokio::test]
async fn missing_protocol_plugin_is_fatal() {
    let c = collection(vec![request("r", r#"test("x", || {});"#)]);
    let mut runner = Runner::new(Arc::new(PluginRegistry::new()));
    let err = runner.run(&c, &HashMap::new()).await.unwrap_err();
    assert!(matches!(err, Error::ProtocolNotFound(_)));
    assert!(err.to_string().contains("mock"));
}
