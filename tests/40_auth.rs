mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::{json, Value};

use common::{TestApp, AUDIT_TRAIL, IMSI_RANGES, MCCMNC_MAPPINGS};

fn login_request(body: Value, forwarded_for: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/auth/login")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(ip) = forwarded_for {
        builder = builder.header("x-forwarded-for", ip);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn crud_without_session_is_rejected_before_any_work() {
    let app = TestApp::new();
    let body = json!({ "imsirange_name": "Range-003", "from_imsi": "1", "to_imsi": "2" });

    for method in [Method::GET, Method::POST, Method::PUT, Method::DELETE] {
        for token in [None, Some("not-a-token")] {
            let res = app.request(method.clone(), IMSI_RANGES, token, Some(body.clone())).await;
            assert_eq!(res.status, StatusCode::FORBIDDEN, "{} with token {:?}", method, token);
            assert_eq!(res.body["code"], "UNAUTHORIZED");
        }
    }

    assert_eq!(app.pool("GTP_PROXY").statement_count(), 0);
    assert!(app.audit_rows().is_empty());
}

#[tokio::test]
async fn token_from_another_secret_is_rejected() {
    let other = TestApp::with_vars(&[("SESSION_SECRET", "someone-else")]);
    let app = TestApp::new();

    let res = app.get(IMSI_RANGES, &other.token("admin")).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn missing_permission_is_forbidden() {
    let app = TestApp::new();
    let token = app.token("viewer");

    let res = app.get(IMSI_RANGES, &token).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.body["code"], "FORBIDDEN");

    let res = app.delete(MCCMNC_MAPPINGS, &token, json!({ "mcc": "404", "mnc": "10" })).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    assert_eq!(app.pool("GTP_PROXY").statement_count(), 0);
    assert!(app.audit_rows().is_empty());
}

#[tokio::test]
async fn login_issues_a_working_session() {
    let app = TestApp::new();

    let res = app.send(login_request(json!({ "username": "admin", "password": "admin" }), Some("10.1.2.3"))).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["success"], true);
    assert_eq!(res.body["data"]["user"]["username"], "admin");
    assert!(res.body["data"]["expires_in"].as_u64().unwrap() > 0);

    let token = res.body["data"]["token"].as_str().unwrap().to_string();
    let res = app.get("/api/auth/whoami", &token).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["username"], "admin");

    let audit = app.audit_rows();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0]["action"], "Login");
    assert_eq!(audit[0]["ip_address"], "10.1.2.3");
}

#[tokio::test]
async fn failed_login_is_audited() {
    let app = TestApp::new();

    let res = app.send(login_request(json!({ "username": "admin", "password": "wrong" }), None)).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["code"], "INVALID_CREDENTIALS");
    assert!(res.body["data"].is_null());

    let audit = app.audit_rows();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0]["action"], "Login Failed");
    assert_eq!(audit[0]["status"], "Fail");
    assert_eq!(audit[0]["username"], "admin");
}

#[tokio::test]
async fn login_requires_both_fields() {
    let app = TestApp::new();
    let res = app.send(login_request(json!({ "username": "admin" }), None)).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(app.audit_rows().is_empty());
}

#[tokio::test]
async fn keycloak_mode_disables_local_login() {
    let app = TestApp::with_vars(&[
        ("AUTH_MODE", "keycloak"),
        ("KEYCLOAK_ISSUER", "https://sso.example.com/realms/portal"),
        ("KEYCLOAK_ID", "portal"),
        ("KEYCLOAK_SECRET", "kc-secret"),
    ]);

    let res = app.send(login_request(json!({ "username": "admin", "password": "admin" }), None)).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.body["code"], "FORBIDDEN");
}

#[tokio::test]
async fn logout_is_audited() {
    let app = TestApp::new();
    let token = app.token("viewer");

    let res = app.request(Method::POST, "/api/auth/logout", Some(&token), None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, json!({ "success": true }));

    let audit = app.audit_rows();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0]["action"], "Logout");
    assert_eq!(audit[0]["username"], "viewer");
}

#[tokio::test]
async fn schemas_report_allowed_operations() {
    let app = TestApp::new();

    let res = app.get("/api/schemas", &app.token("admin")).await;
    assert_eq!(res.status, StatusCode::OK);
    let schemas = res.body["data"].as_array().unwrap();
    assert_eq!(schemas.len(), 4);

    let audit = schemas.iter().find(|s| s["slug"] == "audit-trail").unwrap();
    assert_eq!(audit["operations"], json!(["list"]));
    assert_eq!(audit["endpoint"], AUDIT_TRAIL);
    let imsi = schemas.iter().find(|s| s["slug"] == "gtp-imsi-range").unwrap();
    assert_eq!(imsi["operations"], json!(["list", "create", "update", "delete"]));
    assert!(imsi.get("mockRows").is_none());

    let res = app.get("/api/schemas", &app.token("viewer")).await;
    assert_eq!(res.body["data"], json!([]));

    let res = app.get("/api/schemas/gtp-imsi-range", &app.token("viewer")).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = app.get("/api/schemas/no-such-schema", &app.token("admin")).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn users_require_user_manage() {
    let app = TestApp::new();

    let res = app.get("/api/users", &app.token("admin")).await;
    assert_eq!(res.status, StatusCode::OK);
    let users = res.body.as_array().unwrap();
    assert_eq!(users.len(), 2);
    assert!(users.iter().all(|u| u.get("password_sha256").is_none()));

    let res = app.get("/api/users", &app.token("viewer")).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = app.post("/api/users", &app.token("viewer"), json!({"username": "noc", "email": "noc@example.com"})).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn added_users_are_listed() {
    let app = TestApp::new();
    let token = app.token("admin");

    let res = app
        .post("/api/users", &token, json!({"username": "noc", "email": "noc@example.com", "role": "operator", "password": "secret"}))
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["username"], "noc");
    assert_eq!(res.body["role"], "operator");
    assert!(res.body["id"].is_string());
    assert!(res.body.get("password").is_none());

    let res = app.get("/api/users", &token).await;
    let usernames: Vec<&str> = res.body.as_array().unwrap().iter().filter_map(|u| u["username"].as_str()).collect();
    assert_eq!(usernames, vec!["admin", "viewer", "noc"]);
}

#[tokio::test]
async fn adding_a_user_requires_username_and_email() {
    let app = TestApp::new();
    let token = app.token("admin");

    let res = app.post("/api/users", &token, json!({"username": "noc"})).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["code"], "VALIDATION_ERROR");
    assert_eq!(res.body["field_errors"]["email"], "required");

    let res = app.post("/api/users", &token, json!({"username": "admin", "email": "a@example.com"})).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["field_errors"]["username"], "already exists");

    assert_eq!(app.get("/api/users", &token).await.body.as_array().unwrap().len(), 2);
}
