mod common;

use axum::http::{header, Method, Request, StatusCode};
use axum::body::Body;
use serde_json::{json, Value};

use portal_api::mock::DATA_SOURCE_HEADER;

use common::{TestApp, AUDIT_TRAIL, IMSI_RANGES, MCCMNC_MAPPINGS};

const GTP: &str = "GTP_PROXY";

fn range_003() -> Value {
    json!({
        "imsirange_name": "Range-003",
        "from_imsi": "405820000000001",
        "to_imsi": "405820000000999"
    })
}

#[tokio::test]
async fn imsi_range_create_update_delete() {
    let app = TestApp::new();
    let token = app.token("admin");

    // Create
    let res = app.post(IMSI_RANGES, &token, range_003()).await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(
        res.body,
        json!({
            "imsirange_name": "Range-003",
            "from_imsi": "405820000000001",
            "to_imsi": "405820000000999",
            "updated_by": "admin",
            "last_action": "I"
        })
    );
    assert!(res.headers.get(DATA_SOURCE_HEADER).is_none());

    let audit = app.audit_rows();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0]["action"], "Data Insert");
    assert_eq!(audit[0]["screen"], "GTP IMSI Range");
    assert_eq!(audit[0]["username"], "admin");
    assert_eq!(audit[0]["status"], "Success");

    // Update
    let res = app
        .put(
            IMSI_RANGES,
            &token,
            json!({ "_identifiers": { "imsirange_name": "Range-003" }, "to_imsi": "405820000000998" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["success"], true);
    assert_eq!(res.body["data"]["to_imsi"], "405820000000998");
    assert_eq!(res.body["data"]["last_action"], "U");

    let stored = app.pool(GTP).rows("gtp_imsi_ranges");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0]["to_imsi"], "405820000000998");
    assert_eq!(stored[0]["imsirange_name"], "Range-003");

    // Delete
    let res = app.delete(IMSI_RANGES, &token, json!({ "imsirange_name": "Range-003" })).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, json!({ "success": true }));

    let res = app.get(IMSI_RANGES, &token).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, json!([]));

    let actions: Vec<Value> = app.audit_rows().iter().map(|r| r["action"].clone()).collect();
    assert_eq!(actions, vec![json!("Data Insert"), json!("Data Update"), json!("Data Delete")]);
}

#[tokio::test]
async fn client_supplied_metadata_is_replaced() {
    let app = TestApp::new();
    let token = app.token("admin");

    let mut body = range_003();
    body["updated_by"] = json!("mallory");
    body["last_action"] = json!("D");

    let res = app.post(IMSI_RANGES, &token, body).await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["updated_by"], "admin");
    assert_eq!(res.body["last_action"], "I");

    let stored = app.pool(GTP).rows("gtp_imsi_ranges");
    assert_eq!(stored[0]["updated_by"], "admin");
}

#[tokio::test]
async fn invalid_payloads_never_reach_the_pool() {
    let app = TestApp::new();
    let token = app.token("admin");
    let pool = app.pool(GTP);

    let res = app.post(IMSI_RANGES, &token, json!({ "imsirange_name": "Range-004", "from_imsi": "1" })).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["code"], "VALIDATION_ERROR");
    assert!(res.body["field_errors"]["to_imsi"].is_string());

    let mut unknown = range_003();
    unknown["comment"] = json!("not a column");
    let res = app.post(IMSI_RANGES, &token, unknown).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app.put(IMSI_RANGES, &token, json!({ "to_imsi": "9" })).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app
        .put(IMSI_RANGES, &token, json!({ "_identifiers": { "from_imsi": "1" }, "to_imsi": "9" }))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app.delete(IMSI_RANGES, &token, json!({})).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    assert_eq!(pool.statement_count(), 0);
    assert!(app.audit_rows().is_empty());
}

#[tokio::test]
async fn malformed_json_is_rejected() {
    let app = TestApp::new();
    let token = app.token("admin");

    let request = Request::builder()
        .method(Method::POST)
        .uri(IMSI_RANGES)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"imsirange_name\": "))
        .unwrap();
    let res = app.send(request).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["code"], "INVALID_JSON");
    assert_eq!(app.pool(GTP).statement_count(), 0);
}

#[tokio::test]
async fn repeated_update_is_idempotent() {
    let app = TestApp::new();
    let token = app.token("admin");
    app.post(IMSI_RANGES, &token, range_003()).await;

    let update = json!({ "_identifiers": { "imsirange_name": "Range-003" }, "to_imsi": "405820000000500" });
    let first = app.put(IMSI_RANGES, &token, update.clone()).await;
    let after_first = app.pool(GTP).rows("gtp_imsi_ranges");
    let second = app.put(IMSI_RANGES, &token, update).await;
    let after_second = app.pool(GTP).rows("gtp_imsi_ranges");

    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(first.body, second.body);
    assert_eq!(after_first, after_second);
}

#[tokio::test]
async fn soft_delete_marks_row_and_hides_it_from_list() {
    let app = TestApp::new();
    let token = app.token("admin");

    let res = app
        .post(MCCMNC_MAPPINGS, &token, json!({ "network_name": "Vodafone UK", "mcc": "234", "mnc": "15" }))
        .await;
    assert_eq!(res.status, StatusCode::CREATED);

    let res = app.get(MCCMNC_MAPPINGS, &token).await;
    assert_eq!(res.body.as_array().unwrap().len(), 1);

    let res = app
        .delete(MCCMNC_MAPPINGS, &token, json!({ "_identifiers": { "mcc": "234", "mnc": "15" } }))
        .await;
    assert_eq!(res.status, StatusCode::OK);

    let stored = app.pool(GTP).rows("gtp_mccmnc_mappings");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0]["last_action"], "D");
    assert_eq!(stored[0]["updated_by"], "admin");

    let res = app.get(MCCMNC_MAPPINGS, &token).await;
    assert_eq!(res.body, json!([]));
}

#[tokio::test]
async fn composite_key_requires_every_identifier() {
    let app = TestApp::new();
    let token = app.token("admin");

    let res = app.delete(MCCMNC_MAPPINGS, &token, json!({ "_identifiers": { "mcc": "234" } })).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.pool(GTP).statement_count(), 0);
}

#[tokio::test]
async fn range_query_needs_a_range_field() {
    let app = TestApp::new();
    let token = app.token("admin");

    let res = app.get(&format!("{}?from=2026-10-01T00:00:00Z", IMSI_RANGES), &token).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app.get(&format!("{}?from=yesterday", AUDIT_TRAIL), &token).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn operations_without_permission_are_not_mounted() {
    let app = TestApp::new();
    let token = app.token("admin");

    let res = app.post(AUDIT_TRAIL, &token, json!({ "username": "x" })).await;
    assert_eq!(res.status, StatusCode::METHOD_NOT_ALLOWED);
    assert!(app.pool("CORE").rows("audit_logs").is_empty());
}

#[tokio::test]
async fn unconfigured_pool_serves_mock_rows_outside_production() {
    let app = TestApp::with_vars(&[]);
    let token = app.token("admin");

    let res = app.get(IMSI_RANGES, &token).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.headers[DATA_SOURCE_HEADER], "mock");
    let names: Vec<&str> = res.body.as_array().unwrap().iter().filter_map(|r| r["imsirange_name"].as_str()).collect();
    assert_eq!(names, vec!["Range-001", "Range-002"]);

    let res = app.post(IMSI_RANGES, &token, range_003()).await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.headers[DATA_SOURCE_HEADER], "mock");

    let res = app.delete(IMSI_RANGES, &token, json!({ "imsirange_name": "Range-001" })).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.headers[DATA_SOURCE_HEADER], "mock");

    let res = app.get(IMSI_RANGES, &token).await;
    let names: Vec<&str> = res.body.as_array().unwrap().iter().filter_map(|r| r["imsirange_name"].as_str()).collect();
    assert_eq!(names, vec!["Range-002", "Range-003"]);
    assert_eq!(app.connector.connect_count(), 0);
}

#[tokio::test]
async fn unconfigured_pool_fails_in_production() {
    let app = TestApp::with_vars(&[("APP_ENV", "production")]);
    let token = app.token("admin");

    for res in [
        app.get(IMSI_RANGES, &token).await,
        app.post(IMSI_RANGES, &token, range_003()).await,
    ] {
        assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.body["code"], "DATABASE_NOT_CONFIGURED");
        assert!(res.body.get("detail").is_none());
        assert!(res.headers.get(DATA_SOURCE_HEADER).is_none());
    }
}

#[tokio::test]
async fn execution_failure_is_distinct_from_configuration() {
    let app = TestApp::new();
    let token = app.token("admin");
    app.pool(GTP).set_failing(true);

    let res = app.get(IMSI_RANGES, &token).await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.body["code"], "DATABASE_ERROR");
}

const SESSION_RANGE_LOOKUP: &str = "/api/lookups/gtp-session-mgmt/imsirange_name";

#[tokio::test]
async fn lookup_lists_options_from_the_source_table() {
    let app = TestApp::new();
    let token = app.token("admin");

    let res = app.get(SESSION_RANGE_LOOKUP, &token).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, json!([]));

    app.post(IMSI_RANGES, &token, range_003()).await;
    let res = app.get(SESSION_RANGE_LOOKUP, &token).await;
    assert_eq!(res.body, json!([{ "value": "Range-003", "label": "Range-003" }]));
    assert!(res.headers.get(DATA_SOURCE_HEADER).is_none());
}

#[tokio::test]
async fn lookup_falls_back_to_mock_rows() {
    let app = TestApp::with_vars(&[]);
    let res = app.get(SESSION_RANGE_LOOKUP, &app.token("admin")).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.headers[DATA_SOURCE_HEADER], "mock");
    let values: Vec<&str> = res.body.as_array().unwrap().iter().filter_map(|o| o["value"].as_str()).collect();
    assert_eq!(values, vec!["Range-001", "Range-002"]);
}

#[tokio::test]
async fn lookup_requires_read_permission_and_a_declared_source() {
    let app = TestApp::new();

    let res = app.get(SESSION_RANGE_LOOKUP, &app.token("viewer")).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = app.get("/api/lookups/gtp-session-mgmt/apn", &app.token("admin")).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = app.get("/api/lookups/no-such-schema/apn", &app.token("admin")).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(app.pool(GTP).statement_count(), 0);
}
