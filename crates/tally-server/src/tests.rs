//! Server API tests

use super::*;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use tally_core::ai::MockSuggester;
use tally_core::db::Database;
use tower::ServiceExt;

const SECRET: &str = "test-jwt-secret";
const API_KEY: &str = "svc-key-0123456789";

const STATEMENT: &str = "Date,Description,Amount\n\
                         01/05/2024,WALMART SUPERCENTER,-50.00\n\
                         01/09/2024,NETFLIX.COM,-15.49\n\
                         01/12/2024,ZZ Quantum Widgets,-6.75\n\
                         01/31/2024,PAYROLL ACME INC,2000.00\n";

fn test_db() -> Database {
    let db = Database::in_memory().unwrap();
    db.seed_defaults().unwrap();
    db
}

fn setup_test_app() -> Router {
    let config = ServerConfig {
        require_auth: false,
        ..Default::default()
    };
    create_router(test_db(), None, config, None)
}

fn setup_auth_app() -> Router {
    let config = ServerConfig {
        require_auth: true,
        api_keys: vec![API_KEY.to_string()],
        jwt_secret: Some(SECRET.to_string()),
        ..Default::default()
    };
    create_router(test_db(), None, config, None)
}

fn make_token(sub: &str, secret: &str, aud: &str) -> String {
    let claims = Claims {
        sub: sub.to_string(),
        email: Some(format!("{}@example.com", sub)),
        aud: aud.to_string(),
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

async fn get_body_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body();
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn upload_request(bank_id: i64, filename: &str, content: &str) -> Request<Body> {
    let boundary = "----tallyboundary";
    let body = format!(
        "--{b}\r\n\
         Content-Disposition: form-data; name=\"bank_id\"\r\n\r\n\
         {bank_id}\r\n\
         --{b}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
         Content-Type: text/csv\r\n\r\n\
         {content}\r\n\
         --{b}--\r\n",
        b = boundary,
        bank_id = bank_id,
        filename = filename,
        content = content
    );
    Request::builder()
        .method("POST")
        .uri("/api/import")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn create_bank(app: &Router, name: &str) -> i64 {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/banks",
            serde_json::json!({ "name": name }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    get_body_json(response).await["id"].as_i64().unwrap()
}

// ========== Auth Tests ==========

#[tokio::test]
async fn test_no_auth_mode_is_local_dev_admin() {
    let app = setup_test_app();

    let response = app.oneshot(get("/api/me")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["id"], LOCAL_DEV_USER);
    assert_eq!(json["admin"], true);
    assert_eq!(json["default_currency"], "USD");
}

#[tokio::test]
async fn test_auth_required() {
    let app = setup_auth_app();

    let response = app.oneshot(get("/api/me")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = get_body_json(response).await;
    assert_eq!(json["error"], "Authentication required");
}

#[tokio::test]
async fn test_jwt_round_trip() {
    let app = setup_auth_app();
    let token = make_token("user-abc", SECRET, JWT_AUDIENCE);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/me")
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["id"], "user-abc");
    assert_eq!(json["email"], "user-abc@example.com");
    assert_eq!(json["admin"], false);
    assert_eq!(json["auth_method"], "jwt");
}

#[tokio::test]
async fn test_jwt_rejected_with_wrong_secret_or_audience() {
    let app = setup_auth_app();

    for token in [
        make_token("user-abc", "some-other-secret", JWT_AUDIENCE),
        make_token("user-abc", SECRET, "anon"),
    ] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/me")
                    .header("authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn test_api_key_acts_as_named_user() {
    let app = setup_auth_app();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/me")
                .header("authorization", format!("Bearer {}", API_KEY))
                .header(SERVICE_USER_HEADER, "user-xyz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["id"], "user-xyz");
    assert_eq!(json["admin"], true);

    // Without the header the service user is used
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/me")
                .header("authorization", format!("Bearer {}", API_KEY))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["id"], SERVICE_USER);
}

#[tokio::test]
async fn test_wrong_api_key_rejected() {
    let app = setup_auth_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/me")
                .header("authorization", "Bearer svc-key-9999999999")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_rule_changes_require_admin() {
    let app = setup_auth_app();
    let token = make_token("user-abc", SECRET, JWT_AUDIENCE);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/rules")
                .header("authorization", format!("Bearer {}", token))
                .header("content-type", "application/json")
                .body(Body::from(
                    serde_json::json!({ "category_id": 1, "pattern": "ACME" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[test]
fn test_validate_api_key() {
    let keys = vec!["abc".to_string(), "defgh".to_string()];
    assert!(validate_api_key("abc", &keys));
    assert!(validate_api_key("defgh", &keys));
    assert!(!validate_api_key("abd", &keys));
    assert!(!validate_api_key("", &keys));
    assert!(!validate_api_key("abc", &[]));
}

// ========== Resource Tests ==========

#[tokio::test]
async fn test_security_headers() {
    let app = setup_test_app();

    let response = app.oneshot(get("/api/currencies")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
    assert!(headers.get("content-security-policy").is_some());
}

#[tokio::test]
async fn test_bank_errors_map_to_status() {
    let app = setup_test_app();
    create_bank(&app, "Checking").await;

    // Duplicate name
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/banks",
            serde_json::json!({ "name": "checking" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Missing bank
    let response = app.clone().oneshot(get("/api/banks/999")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = get_body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("999"));

    // Unknown currency
    let response = app
        .oneshot(json_request(
            "POST",
            "/api/banks",
            serde_json::json!({ "name": "Savings", "currency": "ZZZ" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_import_list_and_report() {
    let app = setup_test_app();
    let bank_id = create_bank(&app, "Checking").await;

    let response = app
        .clone()
        .oneshot(upload_request(bank_id, "jan.csv", STATEMENT))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["import"]["imported"], 4);
    assert_eq!(json["import"]["categorized"], 3);
    assert_eq!(json["import"]["format"], "csv");
    let import_id = json["import"]["id"].as_i64().unwrap();

    // Uncategorized listing
    let response = app
        .clone()
        .oneshot(get("/api/transactions?uncategorized=true"))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["total"], 1);
    assert_eq!(
        json["transactions"][0]["description"],
        "ZZ Quantum Widgets"
    );

    // Pagination is clamped
    let response = app
        .clone()
        .oneshot(get("/api/transactions?limit=5000"))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["limit"], MAX_PAGE_LIMIT);
    assert_eq!(json["total"], 4);

    // Pivot report
    let response = app
        .clone()
        .oneshot(get("/api/reports/pivot?from=2024-01-01&to=2024-02-29"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["currency"], "USD");
    assert_eq!(json["months"], serde_json::json!(["2024-01", "2024-02"]));
    let rows = json["rows"].as_array().unwrap();
    assert_eq!(rows.last().unwrap()["category"], "Uncategorized");

    // Import details
    let response = app
        .clone()
        .oneshot(get(&format!("/api/imports/{}", import_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Bad date
    let response = app
        .oneshot(get("/api/reports/summary?from=01/01/2024"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_import_requires_known_bank() {
    let app = setup_test_app();

    let response = app
        .oneshot(upload_request(42, "jan.csv", STATEMENT))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unreadable_statement_is_bad_request() {
    let app = setup_test_app();
    let bank_id = create_bank(&app, "Checking").await;

    for (filename, content, prefix) in [
        ("jan.xlsx", "not a workbook", "Excel parsing error"),
        ("jan.pdf", "%PDF-1.4 not a real document", "PDF parsing error"),
    ] {
        let response = app
            .clone()
            .oneshot(upload_request(bank_id, filename, content))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", filename);
        let json = get_body_json(response).await;
        let message = json["error"].as_str().unwrap();
        assert!(message.starts_with(prefix), "{}: {}", filename, message);
    }

    // Nothing was recorded for the failed uploads
    let response = app.oneshot(get("/api/imports")).await.unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_manual_category_and_recategorize() {
    let app = setup_test_app();
    let bank_id = create_bank(&app, "Checking").await;
    app.clone()
        .oneshot(upload_request(bank_id, "jan.csv", STATEMENT))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(get("/api/transactions?search=quantum"))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    let tx_id = json["transactions"][0]["id"].as_i64().unwrap();

    let response = app.clone().oneshot(get("/api/categories")).await.unwrap();
    let categories = get_body_json(response).await;
    let shopping_id = categories
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["name"] == "Shopping")
        .unwrap()["id"]
        .as_i64()
        .unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/api/transactions/{}/category", tx_id),
            serde_json::json!({ "category_id": shopping_id, "remember": true }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["category_source"], "manual");

    // The remembered keyword shows up
    let response = app.clone().oneshot(get("/api/keywords")).await.unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json[0]["keyword"], "ZZ QUANTUM WIDGETS");

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/categorize",
            serde_json::json!({ "scope": "all" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["skipped_manual"], 1);
    assert_eq!(json["changed"], 0);

    // Unknown scope
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/categorize",
            serde_json::json!({ "scope": "everything" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Audit trail recorded the correction
    let response = app.oneshot(get("/api/audit")).await.unwrap();
    let json = get_body_json(response).await;
    assert!(json
        .as_array()
        .unwrap()
        .iter()
        .any(|e| e["action"] == "categorize"));
}

#[tokio::test]
async fn test_rules_test_endpoint() {
    let app = setup_test_app();

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/rules/test",
            serde_json::json!({ "description": "Uber Trip 1234" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["stage"], "rule");
    assert_eq!(json["normalized"], "UBER TRIP 1234");
}

#[tokio::test]
async fn test_suggest_requires_configuration() {
    let app = setup_test_app();

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/categorize/suggest",
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_suggest_with_mock_backend() {
    let config = ServerConfig {
        require_auth: false,
        ..Default::default()
    };
    let suggester: Arc<dyn CategorySuggester> =
        Arc::new(MockSuggester::new().with_rule("WIDGETS", "Shopping", 0.9));
    let app = create_router(test_db(), None, config, Some(suggester));

    let bank_id = create_bank(&app, "Checking").await;
    app.clone()
        .oneshot(upload_request(bank_id, "jan.csv", STATEMENT))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/categorize/suggest",
            serde_json::json!({ "apply": true }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["applied"], 1);
    assert_eq!(json["suggestions"][0]["category"], "Shopping");

    let response = app
        .oneshot(get("/api/transactions?uncategorized=true"))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["total"], 0);
}

#[tokio::test]
async fn test_user_category_lifecycle() {
    let app = setup_test_app();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/categories",
            serde_json::json!({ "name": "Pets", "kind": "expense" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    let id = json["id"].as_i64().unwrap();
    assert_eq!(json["user_id"], LOCAL_DEV_USER);

    let response = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/api/categories/{}", id),
            serde_json::json!({ "name": "Pet Care" }),
        ))
        .await
        .unwrap();
    assert_eq!(get_body_json(response).await["name"], "Pet Care");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/categories/{}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get(&format!("/api/categories/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
