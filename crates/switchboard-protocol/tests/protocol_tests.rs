//! Protocol layer tests — version matching, error shapes, wire payloads.

#[cfg(test)]
mod tests {
    use serde_json::json;
    use switchboard_protocol::*;

    // ─────────────────────────────────────────────────────────────────────
    // Version matching
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn bare_number_exact_match() {
        let spec = VersionSpec::from(3u32);
        assert!(spec.matches(3).unwrap());
        assert!(!spec.matches(2).unwrap());
        assert!(!spec.matches(4).unwrap());
    }

    #[test]
    fn numeral_string_exact_match() {
        let spec = VersionSpec::from("7");
        assert!(spec.matches(7).unwrap());
        assert!(!spec.matches(6).unwrap());
    }

    #[test]
    fn inclusive_range() {
        let spec = VersionSpec::from("2-4");
        assert!(!spec.matches(1).unwrap());
        assert!(spec.matches(2).unwrap());
        assert!(spec.matches(3).unwrap());
        assert!(spec.matches(4).unwrap());
        assert!(!spec.matches(5).unwrap());
    }

    #[test]
    fn range_semantics_hold_for_sampled_versions() {
        for (lo, hi) in [(1u32, 1u32), (1, 5), (3, 9), (0, 2)] {
            let spec = VersionSpec::from(format!("{lo}-{hi}"));
            for v in 0..12u32 {
                assert_eq!(
                    spec.matches(v).unwrap(),
                    v >= lo && v <= hi,
                    "expr {lo}-{hi} version {v}"
                );
            }
        }
    }

    #[test]
    fn open_ended_lower_bound() {
        for expr in ["3-", "3+"] {
            let spec = VersionSpec::from(expr);
            assert!(!spec.matches(2).unwrap(), "{expr}");
            assert!(spec.matches(3).unwrap(), "{expr}");
            assert!(spec.matches(100).unwrap(), "{expr}");
        }
    }

    #[test]
    fn open_ended_upper_bound() {
        let spec = VersionSpec::from("-3");
        assert!(spec.matches(1).unwrap());
        assert!(spec.matches(3).unwrap());
        assert!(!spec.matches(4).unwrap());
    }

    #[test]
    fn comma_separated_or() {
        let spec = VersionSpec::from("1,3,5-6");
        assert!(spec.matches(1).unwrap());
        assert!(!spec.matches(2).unwrap());
        assert!(spec.matches(3).unwrap());
        assert!(!spec.matches(4).unwrap());
        assert!(spec.matches(5).unwrap());
        assert!(spec.matches(6).unwrap());
        assert!(!spec.matches(7).unwrap());
    }

    #[test]
    fn list_expression_or() {
        let spec = VersionSpec::list(["1-2", "4-"]);
        assert!(spec.matches(1).unwrap());
        assert!(spec.matches(2).unwrap());
        assert!(!spec.matches(3).unwrap());
        assert!(spec.matches(4).unwrap());
        assert!(spec.matches(5).unwrap());
    }

    #[test]
    fn reversed_range_matches_nothing() {
        let spec = VersionSpec::from("7-5");
        for v in 0..10u32 {
            assert!(!spec.matches(v).unwrap());
        }
    }

    #[test]
    fn malformed_expressions_fail() {
        for expr in ["1a", "5_7", "", "  ", "a-b", "1-2-3x", "1,,2", "one"] {
            let spec = VersionSpec::from(expr);
            assert!(
                matches!(spec.matches(1), Err(VersionSpecError::InvalidExpression(_))),
                "expected InvalidExpression for {expr:?}"
            );
        }
    }

    #[test]
    fn malformed_trailing_term_fails_even_after_match() {
        // "1" matches version 1, but the trailing garbage still errors.
        let spec = VersionSpec::from("1,bogus");
        assert!(spec.matches(1).is_err());
    }

    #[test]
    fn empty_list_matches_nothing() {
        let spec = VersionSpec::Many(vec![]);
        assert!(!spec.matches(1).unwrap());
    }

    #[test]
    fn non_expression_json_is_rejected_at_deserialization() {
        assert!(serde_json::from_value::<VersionSpec>(json!(true)).is_err());
        assert!(serde_json::from_value::<VersionSpec>(json!(null)).is_err());
        assert!(serde_json::from_value::<VersionSpec>(json!({"v": 1})).is_err());
    }

    #[test]
    fn spec_deserializes_from_json_forms() {
        let spec: VersionSpec = serde_json::from_value(json!(3)).unwrap();
        assert!(spec.matches(3).unwrap());

        let spec: VersionSpec = serde_json::from_value(json!("1-2")).unwrap();
        assert!(spec.matches(2).unwrap());

        let spec: VersionSpec = serde_json::from_value(json!(["1-2", 4])).unwrap();
        assert!(spec.matches(4).unwrap());
        assert!(!spec.matches(3).unwrap());
    }

    // ─────────────────────────────────────────────────────────────────────
    // Error kinds and wire shape
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn error_codes() {
        assert_eq!(ErrorKind::BadRequest.code(), "bad_request");
        assert_eq!(ErrorKind::NotFound.code(), "not_found");
        assert_eq!(ErrorKind::InternalError.code(), "internal_error");
        assert_eq!(ErrorKind::RequestError.code(), "request_error");
        assert_eq!(ErrorKind::ValidationError.code(), "validation_error");
        assert_eq!(ErrorKind::Custom("not_modified".into()).code(), "not_modified");
    }

    #[test]
    fn error_code_roundtrip() {
        assert_eq!(ErrorKind::from_code("bad_request"), ErrorKind::BadRequest);
        assert_eq!(ErrorKind::from_code("not_found"), ErrorKind::NotFound);
        assert_eq!(
            ErrorKind::from_code("something_else"),
            ErrorKind::Custom("something_else".into())
        );
    }

    #[test]
    fn http_status_table() {
        assert_eq!(ErrorKind::BadRequest.http_status(), 400);
        assert_eq!(ErrorKind::ValidationError.http_status(), 400);
        assert_eq!(ErrorKind::Unauthorized.http_status(), 401);
        assert_eq!(ErrorKind::Forbidden.http_status(), 403);
        assert_eq!(ErrorKind::NotFound.http_status(), 404);
        assert_eq!(ErrorKind::NotModified.http_status(), 304);
        assert_eq!(ErrorKind::Conflict.http_status(), 409);
        assert_eq!(ErrorKind::InternalError.http_status(), 500);
        assert_eq!(ErrorKind::Custom("whatever".into()).http_status(), 500);
    }

    #[test]
    fn error_constructors() {
        let e = ApiError::bad_request("missing id");
        assert_eq!(e.code, "bad_request");
        assert_eq!(e.message, "missing id");

        let e = ApiError::not_found("foo.bar");
        assert_eq!(e.code, "not_found");
        assert!(e.message.contains("foo.bar"));

        let e = ApiError::internal("boom");
        assert_eq!(e.code, "internal_error");
    }

    #[test]
    fn error_wire_strips_stack_by_default() {
        let e = ApiError::internal("boom").with_stack("at main.rs:1");
        let wire = e.to_wire(false);
        assert_eq!(wire["code"], "internal_error");
        assert!(wire.get("stack").is_none());

        let wire = e.to_wire(true);
        assert_eq!(wire["stack"], "at main.rs:1");
    }

    #[test]
    fn error_wire_strips_nested_cause_stack() {
        let cause = ApiError::bad_request("inner").with_stack("inner stack");
        let e = ApiError::internal("outer").with_cause(cause).with_stack("outer stack");
        let wire = e.to_wire(false);
        assert!(wire.get("stack").is_none());
        assert_eq!(wire["cause"]["code"], "bad_request");
        assert!(wire["cause"].get("stack").is_none());
    }

    #[test]
    fn validation_error_carries_violations() {
        let e = ApiError::validation(vec![
            FieldViolation::new("name", "required"),
            FieldViolation::new("age", "must be a number"),
        ]);
        assert_eq!(e.code, "validation_error");
        let wire = e.to_wire(false);
        assert_eq!(wire["data"]["violations"][0]["field"], "name");
        assert_eq!(wire["data"]["violations"][1]["message"], "must be a number");
    }

    #[test]
    fn error_serialization_omits_empty_fields() {
        let e = ApiError::not_found("x");
        let wire = e.to_wire(false);
        assert!(wire.get("data").is_none());
        assert!(wire.get("cause").is_none());
        assert!(wire.get("stack").is_none());
    }

    // ─────────────────────────────────────────────────────────────────────
    // Wire payloads
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn request_id_serialization() {
        let id = RequestId::Number(42);
        assert_eq!(serde_json::to_value(&id).unwrap(), json!(42));

        let id = RequestId::String("abc".into());
        assert_eq!(serde_json::to_value(&id).unwrap(), json!("abc"));
    }

    #[test]
    fn rpc_body_shapes() {
        let body = RpcResponseBody::result(json!({"foo": "bar"}));
        let wire = serde_json::to_value(&body).unwrap();
        assert_eq!(wire, json!({"result": {"foo": "bar"}}));

        let body = RpcResponseBody::error(json!({"code": "not_found", "message": "m"}));
        let wire = serde_json::to_value(&body).unwrap();
        assert!(wire.get("result").is_none());
        assert_eq!(wire["error"]["code"], "not_found");
    }

    #[test]
    fn jsonrpc_response_always_carries_both_keys() {
        let resp =
            JsonRpcResponse::result(Some(RequestId::String("x".into())), json!({"foo": "bar"}));
        let wire = serde_json::to_value(&resp).unwrap();
        assert_eq!(wire, json!({"id": "x", "result": {"foo": "bar"}, "error": null}));

        let resp = JsonRpcResponse::error(
            Some(RequestId::Number(1)),
            json!({"code": "not_found", "message": "m"}),
        );
        let wire = serde_json::to_value(&resp).unwrap();
        assert_eq!(wire["result"], json!(null));
        assert_eq!(wire["error"]["code"], "not_found");
    }

    #[test]
    fn jsonrpc_request_tolerates_missing_fields() {
        let req: JsonRpcRequest = serde_json::from_value(json!({"params": {"a": 1}})).unwrap();
        assert!(req.id.is_none());
        assert!(req.method.is_none());
        assert!(req.params.is_some());
    }

    #[test]
    fn stream_trailer_shapes() {
        let wire = serde_json::to_value(StreamTrailer::ok()).unwrap();
        assert_eq!(wire, json!({"success": true}));

        let wire =
            serde_json::to_value(StreamTrailer::failed(json!({"code": "internal_error"}))).unwrap();
        assert_eq!(wire["success"], false);
        assert_eq!(wire["error"]["code"], "internal_error");
    }

    // ─────────────────────────────────────────────────────────────────────
    // Route options
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn route_options_defaults() {
        let opts = RouteOptions::new("notes.get");
        assert_eq!(opts.method, "notes.get");
        assert!(opts.versions.is_none());
        assert!(!opts.streaming_response);
        assert!(!opts.keep_alive);
        assert!(!opts.norpc);
    }

    #[test]
    fn route_options_builder_chain() {
        let opts = RouteOptions::new("job.watch")
            .versions("2-")
            .streaming()
            .keep_alive_every(std::time::Duration::from_millis(250));
        assert!(opts.streaming_response);
        assert!(opts.keep_alive);
        assert_eq!(
            opts.keep_alive_interval,
            Some(std::time::Duration::from_millis(250))
        );
        assert!(opts.versions.unwrap().matches(3).unwrap());
    }

    #[test]
    fn route_options_summary() {
        let opts = RouteOptions::new("notes.get")
            .model(RestModel::keyed(["id"]))
            .norpc();
        let summary = opts.summary();
        assert_eq!(summary["method"], "notes.get");
        assert_eq!(summary["norpc"], true);
        assert_eq!(summary["schema"], false);
    }
}
