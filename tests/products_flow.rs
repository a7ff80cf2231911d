//! Product catalog writes through the full router against a real database.

mod common;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use handcraft_store_api::{
    create_app, entity::users::ActiveModel as UserActive, models::ROLE_ADMIN,
    services::auth_service, state::AppState,
};
use sea_orm::ActiveModelTrait;
use sea_orm::ActiveValue::NotSet;
use sea_orm::Set;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

async fn admin_token(state: &AppState) -> anyhow::Result<String> {
    let suffix = Uuid::new_v4().simple().to_string();
    let admin = UserActive {
        id: Set(Uuid::new_v4()),
        username: Set(format!("curator-{suffix}")),
        email: Set(format!("curator-{suffix}@example.com")),
        password_hash: Set(auth_service::hash_password("curator-password")?),
        role: Set(ROLE_ADMIN.into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(common::bearer(state, admin.id, ROLE_ADMIN))
}

fn multipart(method: &str, uri: &str, auth: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, auth)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", common::BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, common::json_body(response).await)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

fn strings(value: &Value) -> Vec<&str> {
    value
        .as_array()
        .expect("array")
        .iter()
        .filter_map(Value::as_str)
        .collect()
}

#[tokio::test]
async fn product_create_get_update_delete() -> anyhow::Result<()> {
    let Some(state) = common::database_state().await? else {
        return Ok(());
    };
    let admin = admin_token(&state).await?;
    let app = create_app(state);

    let sku = format!("SB-{}", Uuid::new_v4().simple());
    let body = common::multipart_body(
        &[
            ("id", sku.as_str()),
            ("name", "Full Moon Singing Bowl"),
            ("price", "149.50"),
            ("description", "Hand-hammered seven-metal bowl"),
            ("category", "Singing Bowls"),
            ("type", "singing-bowl"),
            ("brand", "Himalayan Handcraft"),
            ("careInstructions", r#"["Keep dry", "Use a soft cloth"]"#),
        ],
        &[
            ("images[]", "front.jpg", "image/jpeg", &b"front"[..]),
            ("images[]", "side.png", "image/png", &b"side"[..]),
        ],
    );
    let (status, created) = send(&app, multipart("POST", "/api/products", &admin, body)).await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    let product = &created["data"];
    assert_eq!(product["id"], sku.as_str());
    assert_eq!(product["price"], 149.5);
    assert_eq!(
        strings(&product["images"]),
        vec!["memory://products/front.jpg", "memory://products/side.png"]
    );
    assert!(!strings(&product["details"]).is_empty());
    assert_eq!(strings(&product["careInstructions"]), vec!["Keep dry", "Use a soft cloth"]);
    let storage_id = product["_id"].as_str().expect("_id").to_string();

    // Reads are stable and resolve either identity.
    let (status, first) = get(&app, &format!("/api/products/{storage_id}")).await;
    assert_eq!(status, StatusCode::OK);
    let (_, second) = get(&app, &format!("/api/products/{storage_id}")).await;
    assert_eq!(first, second);
    let (status, by_sku) = get(&app, &format!("/api/products/{sku}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(by_sku["data"], first["data"]);

    // Same human-readable id again
    let duplicate = common::multipart_body(
        &[
            ("id", sku.as_str()),
            ("name", "Copy"),
            ("price", "10"),
            ("description", "Copy"),
            ("category", "Singing Bowls"),
            ("type", "singing-bowl"),
            ("brand", "Copy"),
            ("existingImages", "memory://products/front.jpg"),
        ],
        &[],
    );
    let (status, _) = send(&app, multipart("POST", "/api/products", &admin, duplicate)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Update by human-readable id: keep one stored image, add one upload and
    // send a rating that does not parse.
    let patch = common::multipart_body(
        &[
            ("price", "159"),
            ("existingImages", r#"["memory://products/side.png"]"#),
            ("rating", "excellent"),
            ("inStock", "false"),
        ],
        &[("images", "top.webp", "image/webp", &b"top"[..])],
    );
    let (status, updated) = send(
        &app,
        multipart("PUT", &format!("/api/products/{sku}"), &admin, patch),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{updated}");
    let product = &updated["data"];
    assert_eq!(product["_id"], storage_id.as_str());
    assert_eq!(product["price"], 159.0);
    assert_eq!(product["inStock"], false);
    assert_eq!(product["rating"], first["data"]["rating"]);
    assert_eq!(product["name"], "Full Moon Singing Bowl");
    assert_eq!(
        strings(&product["images"]),
        vec!["memory://products/side.png", "memory://products/top.webp"]
    );

    // Out of stock products leave the shop listing.
    let (status, shop) = get(&app, "/api/products/shop?per_page=100").await;
    assert_eq!(status, StatusCode::OK);
    assert!(shop["data"]
        .as_array()
        .expect("products")
        .iter()
        .all(|p| p["_id"] != storage_id.as_str()));

    let (status, deleted) = send(
        &app,
        Request::delete(format!("/api/products/{storage_id}"))
            .header(header::AUTHORIZATION, &admin)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["data"]["id"], sku.as_str());

    let (status, missing) = get(&app, &format!("/api/products/{sku}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(missing["success"], false);

    Ok(())
}

#[tokio::test]
async fn product_create_needs_an_image() -> anyhow::Result<()> {
    let Some(state) = common::database_state().await? else {
        return Ok(());
    };
    let admin = admin_token(&state).await?;
    let app = create_app(state);

    let sku = format!("SB-{}", Uuid::new_v4().simple());
    let body = common::multipart_body(
        &[
            ("id", sku.as_str()),
            ("name", "Imageless Bowl"),
            ("price", "20"),
            ("description", "No pictures"),
            ("category", "Singing Bowls"),
            ("type", "singing-bowl"),
            ("brand", "Himalayan Handcraft"),
        ],
        &[],
    );
    let (status, body) = send(&app, multipart("POST", "/api/products", &admin, body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    Ok(())
}
