//! Router-level tests. The pool connects lazily, so everything here except the
//! ignored flow test runs without Postgres or Redis.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::IntoResponse,
    Router,
};
use hmac::{Hmac, Mac};
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use sha2::Sha256;
use tower::ServiceExt;
use uuid::Uuid;

use studydocu_api::config::Config;
use studydocu_api::db::Database;
use studydocu_api::error::AppError;
use studydocu_api::middleware::{Claims, CurrentUser, TokenKind, UserRole};
use studydocu_api::models::DocumentMetadata;
use studydocu_api::parser;
use studydocu_api::services::DocumentService;
use studydocu_api::storage::MemoryObjectStore;
use studydocu_api::{build_router, AppState};

const BOUNDARY: &str = "studydocu-test-boundary";

fn test_state() -> AppState {
    let config = Config::load().expect("default config");
    let db = Database::connect_lazy(&config).expect("lazy pool");
    AppState {
        db,
        storage: Arc::new(MemoryObjectStore::new(config.storage.public_base_url.clone())),
        config,
    }
}

fn app() -> Router {
    build_router(test_state())
}

fn stripe_header(secret: &str, payload: &str) -> String {
    let timestamp = chrono::Utc::now().timestamp();
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{}.{}", timestamp, payload).as_bytes());
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

fn access_token(config: &Config, role: UserRole, exp_offset: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: Uuid::new_v4().to_string(),
        email: "carla@pucp.edu.pe".into(),
        role,
        kind: TokenKind::Access,
        iat: now as usize,
        exp: (now + exp_offset) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt.secret.as_bytes()),
    )
    .unwrap()
}

fn multipart_file(file_name: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_check_responds_ok() {
    let response = app()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"OK");
}

#[tokio::test]
async fn protected_page_redirects_anonymous_visitor_to_login() {
    let response = app()
        .oneshot(Request::get("/dashboard").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/login?redirect=%2Fdashboard"
    );
}

#[tokio::test]
async fn guest_pages_render_the_front_end_shell() {
    let response = app()
        .oneshot(Request::get("/login").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "no-store"
    );
}

#[tokio::test]
async fn service_worker_is_served_with_root_scope() {
    let response = app()
        .oneshot(Request::get("/sw.js").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "no-cache"
    );
    assert_eq!(
        response.headers().get("service-worker-allowed").unwrap(),
        "/"
    );
}

#[tokio::test]
async fn me_requires_a_token() {
    let response = app()
        .oneshot(Request::get("/api/v1/auth/me").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn malformed_token_is_rejected() {
    let response = app()
        .oneshot(
            Request::get("/api/v1/auth/me")
                .header(header::AUTHORIZATION, "Bearer not-a-jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_api_requires_a_session() {
    let response = app()
        .oneshot(
            Request::get("/api/v1/admin/dashboard")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_api_path_is_a_json_404() {
    let response = app()
        .oneshot(Request::get("/api/v1/nothing-here").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn gate_endpoint_reports_the_redirect() {
    let response = app()
        .oneshot(
            Request::get("/api/v1/gate?path=/admin/users")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["requirement"], "admin");
    assert_eq!(body["decision"], "redirect");
    assert_eq!(body["location"], "/login?redirect=%2Fadmin%2Fusers");
}

#[tokio::test]
async fn gate_endpoint_rejects_relative_paths() {
    let response = app()
        .oneshot(
            Request::get("/api/v1/gate?path=admin")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stripe_webhook_with_bad_signature_is_rejected() {
    let payload = json!({
        "id": "evt_1",
        "type": "checkout.session.completed",
        "data": { "object": { "id": "cs_1", "metadata": {} } }
    })
    .to_string();

    let response = app()
        .oneshot(
            Request::post("/api/v1/webhooks/stripe")
                .header(header::CONTENT_TYPE, "application/json")
                .header("stripe-signature", "t=1700000000,v1=deadbeef")
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stripe_webhook_without_signature_is_rejected() {
    let response = app()
        .oneshot(
            Request::post("/api/v1/webhooks/stripe")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn signed_events_we_do_not_handle_are_acknowledged() {
    let state = test_state();
    let secret = state.config.stripe.webhook_secret.clone();

    // balance objects carry no id
    let payload = json!({
        "id": "evt_balance",
        "type": "balance.available",
        "data": { "object": { "object": "balance", "available": [] } }
    })
    .to_string();

    let response = build_router(state)
        .oneshot(
            Request::post("/api/v1/webhooks/stripe")
                .header(header::CONTENT_TYPE, "application/json")
                .header("stripe-signature", stripe_header(&secret, &payload))
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "received": true }));
}

#[tokio::test]
async fn signed_garbage_is_still_acknowledged() {
    let state = test_state();
    let secret = state.config.stripe.webhook_secret.clone();
    let payload = "no es json";

    let response = build_router(state)
        .oneshot(
            Request::post("/api/v1/webhooks/stripe")
                .header("stripe-signature", stripe_header(&secret, payload))
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn expired_bearer_does_not_block_login() {
    let state = test_state();
    let stale = access_token(&state.config, UserRole::User, -3600);

    let response = build_router(state)
        .oneshot(
            Request::post("/api/v1/auth/login")
                .header(header::AUTHORIZATION, format!("Bearer {}", stale))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "email": "no-es-correo", "password": "" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    // reaches the handler's validation instead of the token check
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn oversized_upload_is_rejected_before_touching_storage() {
    let state = test_state();
    let storage = Arc::new(MemoryObjectStore::new("http://localhost/files"));
    let service = DocumentService::new(state.db.clone(), storage.clone());
    let uploader = CurrentUser {
        id: Uuid::new_v4(),
        email: "diego@uni.edu.pe".into(),
        role: UserRole::User,
    };
    let metadata = DocumentMetadata {
        title: "Separata de Física I".into(),
        subject: "Física".into(),
        ..Default::default()
    };

    let err = service
        .upload(&uploader, metadata, "separata.pdf", vec![b'a'; 2048], 1024)
        .await
        .unwrap_err();

    assert_eq!(err.into_response().status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(storage.len().await, 0);
}

#[tokio::test]
async fn parse_errors_map_to_client_statuses() {
    let empty = parser::parse_owned("vacio.pdf".into(), Vec::new()).await.unwrap_err();
    assert_eq!(empty.into_response().status(), StatusCode::BAD_REQUEST);

    let image = parser::parse_owned("foto.png".into(), b"\x89PNG\r\n\x1a\n\0\0".to_vec())
        .await
        .unwrap_err();
    assert!(matches!(image, AppError::UnsupportedMediaType(_)));
    assert_eq!(image.into_response().status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

async fn post_parse(file_name: &str, bytes: &[u8]) -> axum::response::Response {
    let state = test_state();
    let token = access_token(&state.config, UserRole::User, 3600);

    build_router(state)
        .oneshot(
            Request::post("/api/v1/documents/parse")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={}", BOUNDARY),
                )
                .body(Body::from(multipart_file(file_name, bytes)))
                .unwrap(),
        )
        .await
        .unwrap()
}

#[tokio::test]
#[ignore = "Requires Redis"]
async fn parse_endpoint_rejects_unsupported_files() {
    let response = post_parse("foto.png", b"\x89PNG\r\n\x1a\n\0\0").await;
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
#[ignore = "Requires Redis"]
async fn parse_endpoint_rejects_empty_files() {
    let response = post_parse("vacio.txt", b"").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires Redis"]
async fn parse_endpoint_reports_text_metadata() {
    let response = post_parse("resumen.txt", "Resumen de Derecho Civil".as_bytes()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["kind"], "text");
    assert_eq!(body["word_count"], 4);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn registered_user_sees_an_empty_dashboard() {
    let state = test_state();
    state.db.run_migrations().await.unwrap();
    let app = build_router(state);

    let email = format!("estudiante-{}@studydocu.test", uuid::Uuid::new_v4());
    let response = app
        .clone()
        .oneshot(
            Request::post("/api/v1/auth/register")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({
                        "email": email,
                        "password": "contraseña-segura",
                        "full_name": "Ana Quispe",
                        "university": "UNMSM",
                        "career": "Ingeniería de Sistemas"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    let token = body["access_token"].as_str().unwrap().to_string();

    let response = app
        .oneshot(
            Request::get("/api/v1/me/dashboard")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let dashboard = body_json(response).await;
    assert_eq!(dashboard["points"], 0);
    assert_eq!(dashboard["uploads"], 0);
}
