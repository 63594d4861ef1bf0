//! HTTP surface: token validation at the handler boundary, role-gated
//! admin routes, and the stable status codes of the error taxonomy.

mod common;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
};
use common::{TestApp, JWT_SECRET};
use serde_json::{json, Value};
use storefront_api::auth::issue_token;
use tower::ServiceExt;
use uuid::Uuid;

fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn requests_without_a_token_are_rejected() {
    let app = TestApp::new().await;

    let response = app
        .router()
        .oneshot(request(Method::GET, "/api/v1/cart", None, None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let payload = body_json(response).await;
    assert_eq!(payload["error"], "Unauthorized");
}

#[tokio::test]
async fn garbage_tokens_are_rejected() {
    let app = TestApp::new().await;

    let response = app
        .router()
        .oneshot(request(
            Method::GET,
            "/api/v1/cart",
            Some("not-a-real-token"),
            None,
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn authenticated_cart_fetch_returns_empty_view() {
    let app = TestApp::new().await;
    let token = issue_token(JWT_SECRET, Uuid::new_v4(), vec![], 3600).expect("token");

    let response = app
        .router()
        .oneshot(request(Method::GET, "/api/v1/cart", Some(&token), None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let payload = body_json(response).await;
    assert_eq!(payload["success"], true);
    assert_eq!(payload["data"]["total_items"], 0);
}

#[tokio::test]
async fn admin_routes_require_the_admin_role() {
    let app = TestApp::new().await;
    let customer = issue_token(JWT_SECRET, Uuid::new_v4(), vec![], 3600).expect("token");
    let admin = issue_token(
        JWT_SECRET,
        Uuid::new_v4(),
        vec!["admin".to_string()],
        3600,
    )
    .expect("token");

    let uri = format!("/api/v1/admin/orders/{}/status", Uuid::new_v4());
    let body = json!({ "status": "CONFIRMED" });

    let response = app
        .router()
        .oneshot(request(
            Method::PUT,
            &uri,
            Some(&customer),
            Some(body.clone()),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // An admin passes the gate and reaches the workflow, which reports
    // the missing order instead.
    let response = app
        .router()
        .oneshot(request(Method::PUT, &uri, Some(&admin), Some(body)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn checkout_error_statuses_are_distinct() {
    let app = TestApp::new().await;
    let user = Uuid::new_v4();
    let token = issue_token(JWT_SECRET, user, vec![], 3600).expect("token");

    // Empty cart surfaces as 422.
    let response = app
        .router()
        .oneshot(request(
            Method::POST,
            "/api/v1/orders",
            Some(&token),
            Some(json!({
                "receiver_name": "Alex Doe",
                "shipping_address": "12 Elm Street",
                "phone_number": "0123456789",
                "payment_method": "COD"
            })),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let payload = body_json(response).await;
    assert_eq!(payload["message"], "Cart is empty");
}

#[tokio::test]
async fn health_endpoint_reports_database_status() {
    let app = TestApp::new().await;

    let response = app
        .router()
        .oneshot(request(Method::GET, "/api/v1/health", None, None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let payload = body_json(response).await;
    assert_eq!(payload["data"]["checks"]["database"], "healthy");
}
