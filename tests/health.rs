mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use handcraft_store_api::create_app;
use tower::ServiceExt;

#[tokio::test]
async fn health_check_returns_ok() {
    let app = create_app(common::offline_state());

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let body = common::json_body(response).await;
    assert_eq!(body["message"], "Health check");
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["database"], "down");
}
