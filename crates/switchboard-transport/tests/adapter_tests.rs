//! Adapter tests — wire behavior driven through the mounted route tree.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use axum::body::{Body, Bytes};
    use axum::http::{Request, StatusCode};
    use futures_util::StreamExt;
    use serde_json::{Value, json};
    use switchboard_protocol::{ApiError, ErrorKind, RestModel, RouteOptions, VersionSpec};
    use switchboard_router::{
        ApiRouter, ManualResponse, RouterConfig, VersionRouter, from_fn, handler, streamer,
    };
    use switchboard_transport::{HttpRpcInterface, JsonRpcInterface, RestInterface};
    use tower::ServiceExt;

    fn full_version(version: u32) -> VersionRouter {
        VersionRouter::builder(version)
            .interface(HttpRpcInterface::new())
            .interface(JsonRpcInterface::new())
            .interface(RestInterface::new())
            .build()
    }

    fn api() -> ApiRouter {
        let mut api = ApiRouter::new();
        api.add_version(full_version(1)).unwrap();
        api
    }

    async fn send(
        app: &axum::Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Bytes) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&value).unwrap())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        (status, bytes)
    }

    async fn send_json(
        app: &axum::Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let (status, bytes) = send(app, method, uri, body).await;
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    // ─────────────────────────────────────────────────────────────────────
    // RPC-over-path
    // ─────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn rpc_round_trip() {
        let mut api = api();
        api.register(
            RouteOptions::new("demo.hello"),
            vec![handler(|_params| async move { Ok(json!({"foo": "bar"})) })],
        )
        .unwrap();
        let app = api.into_service();

        let (status, body) =
            send_json(&app, "POST", "/v1/rpc/demo/hello", Some(json!({"params": {}}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"result": {"foo": "bar"}}));
    }

    #[tokio::test]
    async fn rpc_params_reach_the_handler() {
        let mut api = api();
        api.register(
            RouteOptions::new("demo.echo"),
            vec![handler(|params| async move { Ok(Value::Object(params)) })],
        )
        .unwrap();
        let app = api.into_service();

        let (status, body) = send_json(
            &app,
            "POST",
            "/v1/rpc/demo/echo",
            Some(json!({"params": {"a": 1, "b": "two"}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"], json!({"a": 1, "b": "two"}));
    }

    #[tokio::test]
    async fn rpc_unknown_method_is_structured_not_found() {
        let app = api().into_service();
        let (status, body) = send_json(&app, "POST", "/v1/rpc/no/such", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["error"]["code"], "not_found");
    }

    #[tokio::test]
    async fn rpc_missing_method_segment_is_bad_request() {
        let app = api().into_service();
        let (status, body) = send_json(&app, "POST", "/v1/rpc", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["error"]["code"], "bad_request");
    }

    #[tokio::test]
    async fn rpc_malformed_body_is_bad_request() {
        let mut api = api();
        api.register(
            RouteOptions::new("demo.hello"),
            vec![handler(|_params| async move { Ok(json!(1)) })],
        )
        .unwrap();
        let app = api.into_service();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/rpc/demo/hello")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "bad_request");
    }

    #[tokio::test]
    async fn rpc_structured_error_passes_through_without_stack() {
        let mut api = api();
        api.register(
            RouteOptions::new("demo.fail"),
            vec![handler(|_params| async move {
                Err::<Value, _>(
                    ApiError::new(ErrorKind::Custom("not_modified".into()), "m")
                        .with_stack("secret stack"),
                )
            })],
        )
        .unwrap();
        let app = api.into_service();

        let (status, body) = send_json(&app, "POST", "/v1/rpc/demo/fail", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["error"]["code"], "not_modified");
        assert_eq!(body["error"]["message"], "m");
        assert!(body["error"].get("stack").is_none());
    }

    #[tokio::test]
    async fn rpc_error_stack_included_when_configured() {
        let mut api = ApiRouter::with_config(RouterConfig {
            include_error_stack: true,
            ..RouterConfig::default()
        });
        api.add_version(full_version(1)).unwrap();
        api.register(
            RouteOptions::new("demo.fail"),
            vec![handler(|_params| async move {
                Err::<Value, _>(ApiError::internal("boom").with_stack("trace here"))
            })],
        )
        .unwrap();
        let app = api.into_service();

        let (_, body) = send_json(&app, "POST", "/v1/rpc/demo/fail", None).await;
        assert_eq!(body["error"]["stack"], "trace here");
    }

    #[tokio::test]
    async fn norpc_methods_are_invisible_to_rpc_adapters() {
        let mut api = api();
        api.register(
            RouteOptions::new("notes.get")
                .norpc()
                .model(RestModel::keyed(["id"])),
            vec![handler(|params| async move { Ok(params["id"].clone()) })],
        )
        .unwrap();
        let app = api.into_service();

        let (_, body) = send_json(&app, "POST", "/v1/rpc/notes/get", None).await;
        assert_eq!(body["error"]["code"], "not_found");

        let (status, body) = send_json(&app, "GET", "/v1/rest/notes/42", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!("42"));
    }

    #[tokio::test]
    async fn manual_response_passes_through_verbatim() {
        let mut api = api();
        api.register(
            RouteOptions::new("demo.manual").manual(),
            vec![from_fn(|ctx| {
                Box::pin(async move {
                    ctx.set_manual(ManualResponse::json(201, &json!({"made": "by hand"})));
                    Ok(None)
                })
            })],
        )
        .unwrap();
        let app = api.into_service();

        let (status, body) = send_json(&app, "POST", "/v1/rpc/demo/manual", None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body, json!({"made": "by hand"}));
    }

    // ─────────────────────────────────────────────────────────────────────
    // JSON-RPC
    // ─────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn jsonrpc_round_trip_exact_shape() {
        let mut api = api();
        api.register(
            RouteOptions::new("demo.hello"),
            vec![handler(|_params| async move { Ok(json!({"foo": "bar"})) })],
        )
        .unwrap();
        let app = api.into_service();

        let (status, body) = send_json(
            &app,
            "POST",
            "/v1/jsonrpc",
            Some(json!({"id": "x", "method": "demo.hello", "params": {}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"id": "x", "result": {"foo": "bar"}, "error": null}));
    }

    #[tokio::test]
    async fn jsonrpc_missing_id_is_bad_request() {
        let app = api().into_service();
        let (_, body) = send_json(
            &app,
            "POST",
            "/v1/jsonrpc",
            Some(json!({"method": "demo.hello"})),
        )
        .await;
        assert_eq!(body["id"], Value::Null);
        assert_eq!(body["error"]["code"], "bad_request");
    }

    #[tokio::test]
    async fn jsonrpc_missing_method_echoes_id() {
        let app = api().into_service();
        let (_, body) = send_json(&app, "POST", "/v1/jsonrpc", Some(json!({"id": 7}))).await;
        assert_eq!(body["id"], json!(7));
        assert_eq!(body["error"]["code"], "bad_request");
    }

    #[tokio::test]
    async fn jsonrpc_unknown_method_is_not_found() {
        let app = api().into_service();
        let (_, body) = send_json(
            &app,
            "POST",
            "/v1/jsonrpc",
            Some(json!({"id": 1, "method": "no.such"})),
        )
        .await;
        assert_eq!(body["id"], json!(1));
        assert_eq!(body["error"]["code"], "not_found");
        assert_eq!(body["result"], Value::Null);
    }

    #[tokio::test]
    async fn jsonrpc_non_object_params_is_bad_request() {
        let mut api = api();
        api.register(
            RouteOptions::new("demo.hello"),
            vec![handler(|_params| async move { Ok(json!(1)) })],
        )
        .unwrap();
        let app = api.into_service();

        let (_, body) = send_json(
            &app,
            "POST",
            "/v1/jsonrpc",
            Some(json!({"id": 1, "method": "demo.hello", "params": [1, 2]})),
        )
        .await;
        assert_eq!(body["error"]["code"], "bad_request");
    }

    // ─────────────────────────────────────────────────────────────────────
    // Streaming and keep-alive
    // ─────────────────────────────────────────────────────────────────────

    fn three_item_stream() -> switchboard_router::ValueStream {
        futures_util::stream::iter(vec![
            Ok(json!("foo")),
            Ok(json!("bar")),
            Ok(json!({"foo": "bar"})),
        ])
        .boxed()
    }

    #[tokio::test]
    async fn streaming_emits_chunks_then_success_trailer() {
        let mut api = api();
        api.register(
            RouteOptions::new("job.watch").streaming(),
            vec![streamer(|_params| async move { Ok(three_item_stream()) })],
        )
        .unwrap();
        let app = api.into_service();

        let (status, bytes) = send(
            &app,
            "POST",
            "/v1/jsonrpc",
            Some(json!({"id": 1, "method": "job.watch"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let text = String::from_utf8(bytes.to_vec()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4, "body was: {text:?}");
        assert_eq!(lines[0], "\"foo\"");
        assert_eq!(lines[1], "\"bar\"");
        assert_eq!(lines[2], "{\"foo\":\"bar\"}");
        assert_eq!(lines[3], "{\"success\":true}");
    }

    #[tokio::test]
    async fn streaming_failure_ends_with_error_trailer() {
        let mut api = api();
        api.register(
            RouteOptions::new("job.watch").streaming(),
            vec![streamer(|_params| async move {
                Ok(futures_util::stream::iter(vec![
                    Ok(json!(1)),
                    Err(ApiError::internal("producer died")),
                ])
                .boxed())
            })],
        )
        .unwrap();
        let app = api.into_service();

        let (_, bytes) = send(
            &app,
            "POST",
            "/v1/jsonrpc",
            Some(json!({"id": 1, "method": "job.watch"})),
        )
        .await;
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        let last: Value = serde_json::from_str(text.lines().last().unwrap()).unwrap();
        assert_eq!(last["success"], false);
        assert_eq!(last["error"]["code"], "internal_error");
    }

    #[tokio::test]
    async fn streaming_error_before_stream_yields_single_error_payload() {
        let mut api = api();
        api.register(
            RouteOptions::new("job.watch").streaming(),
            vec![handler(|_params| async move {
                Err::<Value, _>(ApiError::bad_request("no job id"))
            })],
        )
        .unwrap();
        let app = api.into_service();

        let (_, body) = send_json(
            &app,
            "POST",
            "/v1/jsonrpc",
            Some(json!({"id": 9, "method": "job.watch"})),
        )
        .await;
        assert_eq!(body["id"], json!(9));
        assert_eq!(body["error"]["code"], "bad_request");
    }

    #[tokio::test]
    async fn keep_alive_fills_while_call_runs_and_payload_still_parses() {
        let mut api = api();
        api.register(
            RouteOptions::new("demo.slow").keep_alive_every(Duration::from_millis(25)),
            vec![handler(|_params| async move {
                tokio::time::sleep(Duration::from_millis(120)).await;
                Ok(json!("done"))
            })],
        )
        .unwrap();
        let app = api.into_service();

        let (status, bytes) = send(&app, "POST", "/v1/rpc/demo/slow", None).await;
        assert_eq!(status, StatusCode::OK);

        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.starts_with(' '), "expected filler, got {text:?}");
        let parsed: Value = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(parsed["result"], json!("done"));
    }

    // ─────────────────────────────────────────────────────────────────────
    // REST
    // ─────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn rest_get_binds_key_segments() {
        let mut api = api();
        api.register(
            RouteOptions::new("notes.get").model(RestModel::keyed(["id"])),
            vec![handler(|params| async move { Ok(json!({"id": params["id"]})) })],
        )
        .unwrap();
        let app = api.into_service();

        let (status, body) = send_json(&app, "GET", "/v1/rest/notes/42", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"id": "42"}));
    }

    #[tokio::test]
    async fn rest_error_maps_to_http_status() {
        let mut api = api();
        api.register(
            RouteOptions::new("notes.get").model(RestModel::keyed(["id"])),
            vec![handler(|_params| async move {
                Err::<Value, _>(ApiError::new(ErrorKind::NotFound, "no such note"))
            })],
        )
        .unwrap();
        let app = api.into_service();

        let (status, body) = send_json(&app, "GET", "/v1/rest/notes/42", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "not_found");
    }

    #[tokio::test]
    async fn rest_param_precedence_route_over_query_over_body() {
        let mut api = api();
        api.register(
            RouteOptions::new("notes.put").model(RestModel::keyed(["id"])),
            vec![handler(|params| async move { Ok(Value::Object(params)) })],
        )
        .unwrap();
        let app = api.into_service();

        let (_, body) = send_json(
            &app,
            "PUT",
            "/v1/rest/notes/route-id?id=query-id&tag=q",
            Some(json!({"id": "body-id", "text": "hello"})),
        )
        .await;
        assert_eq!(body["id"], json!("route-id"));
        assert_eq!(body["tag"], json!("q"));
        assert_eq!(body["text"], json!("hello"));
    }

    #[tokio::test]
    async fn rest_list_binds_basepath() {
        let mut api = api();
        api.register(
            RouteOptions::new("notes.list").model(RestModel::keyed(["id"])),
            vec![handler(|_params| async move { Ok(json!([])) })],
        )
        .unwrap();
        let app = api.into_service();

        let (status, body) = send_json(&app, "GET", "/v1/rest/notes", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn rest_no_result_is_no_content() {
        let mut api = api();
        api.register(
            RouteOptions::new("notes.delete").model(RestModel::keyed(["id"])),
            vec![from_fn(|_ctx| Box::pin(async move { Ok(None) }))],
        )
        .unwrap();
        let app = api.into_service();

        let (status, bytes) = send(&app, "DELETE", "/v1/rest/notes/42", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn rest_unmatched_route_is_structured_not_found() {
        let app = api().into_service();
        let (status, body) = send_json(&app, "GET", "/v1/rest/nothing/here", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "not_found");
    }

    // ─────────────────────────────────────────────────────────────────────
    // Version filtering and adapter middleware
    // ─────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn version_filtering_across_mounted_versions() {
        let mut api = ApiRouter::new();
        for v in 1..=5 {
            api.add_version(full_version(v)).unwrap();
        }
        api.register(
            RouteOptions::new("demo.hello").versions(VersionSpec::list(["1-2", "4-"])),
            vec![handler(|_params| async move { Ok(json!("hi")) })],
        )
        .unwrap();
        let app = api.into_service();

        for (version, reachable) in [(1, true), (2, true), (3, false), (4, true), (5, true)] {
            let (_, body) = send_json(
                &app,
                "POST",
                &format!("/v{version}/jsonrpc"),
                Some(json!({"id": 1, "method": "demo.hello"})),
            )
            .await;
            if reachable {
                assert_eq!(body["result"], json!("hi"), "v{version}");
            } else {
                assert_eq!(body["error"]["code"], "not_found", "v{version}");
            }
        }
    }

    #[tokio::test]
    async fn adapter_post_middleware_runs_even_on_call_error() {
        let post_hits = Arc::new(AtomicUsize::new(0));
        let hits = post_hits.clone();

        let mut api = api();
        api.register_post_middleware(
            None,
            from_fn(move |_ctx| {
                let hits = hits.clone();
                Box::pin(async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Ok(None)
                })
            }),
        )
        .unwrap();
        api.register(
            RouteOptions::new("demo.fail"),
            vec![handler(|_params| async move {
                Err::<Value, _>(ApiError::internal("boom"))
            })],
        )
        .unwrap();
        let app = api.into_service();

        let (_, body) = send_json(&app, "POST", "/v1/rpc/demo/fail", None).await;
        assert_eq!(body["error"]["code"], "internal_error");
        // One call through one adapter: the post chain ran exactly once.
        assert_eq!(post_hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn adapter_pre_middleware_can_fail_the_call() {
        let mut api = api();
        api.register_pre_middleware(
            None,
            from_fn(|_ctx| {
                Box::pin(async move {
                    Err(ApiError::new(ErrorKind::Unauthorized, "token required"))
                })
            }),
        )
        .unwrap();
        let called = Arc::new(AtomicUsize::new(0));
        let called_in_handler = called.clone();
        api.register(
            RouteOptions::new("demo.hello"),
            vec![from_fn(move |_ctx| {
                let called = called_in_handler.clone();
                Box::pin(async move {
                    called.fetch_add(1, Ordering::SeqCst);
                    Ok(Some(json!("never")))
                })
            })],
        )
        .unwrap();
        let app = api.into_service();

        let (_, body) = send_json(&app, "POST", "/v1/rpc/demo/hello", None).await;
        assert_eq!(body["error"]["code"], "unauthorized");
        // Pre-phase failure short-circuited the call chain.
        assert_eq!(called.load(Ordering::SeqCst), 0);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Introspection
    // ─────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn version_info_lists_registered_methods() {
        let mut api = api();
        api.register(
            RouteOptions::new("demo.hello"),
            vec![handler(|_params| async move { Ok(json!(1)) })],
        )
        .unwrap();
        let app = api.into_service();

        let (status, body) = send_json(&app, "GET", "/v1/info", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["version"], json!(1));
        assert_eq!(body["methods"][0]["method"], "demo.hello");
    }
}
