use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, post},
};

use crate::{
    dto::reviews::{CreateReviewRequest, RatingStats, ReviewList, ReviewResponse, UpdateReviewRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::review_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_review))
        .route("/product/{product_id}", get(product_reviews))
        .route("/user/{user_id}", get(user_reviews))
        .route("/stats/{product_id}", get(review_stats))
        .route(
            "/{id}",
            get(get_review).put(update_review).delete(delete_review),
        )
}

#[utoipa::path(
    post,
    path = "/api/reviews",
    request_body = CreateReviewRequest,
    responses(
        (status = 201, description = "Review created", body = ApiResponse<ReviewResponse>),
        (status = 400, description = "Invalid or duplicate review"),
        (status = 403, description = "Order belongs to someone else"),
    ),
    security(("bearer_auth" = [])),
    tag = "Reviews"
)]
pub async fn create_review(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<CreateReviewRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<ApiResponse<ReviewResponse>>)> {
    let Json(payload) = payload?;
    let resp = review_service::create_review(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/reviews/product/{product_id}",
    params(("product_id" = String, Path, description = "Storage id or product id")),
    responses((status = 200, description = "Reviews of a product", body = ApiResponse<ReviewList>)),
    tag = "Reviews"
)]
pub async fn product_reviews(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> AppResult<Json<ApiResponse<ReviewList>>> {
    Ok(Json(review_service::product_reviews(&state, &product_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/reviews/user/{user_id}",
    params(("user_id" = String, Path, description = "User id")),
    responses((status = 200, description = "Reviews by a user", body = ApiResponse<ReviewList>)),
    tag = "Reviews"
)]
pub async fn user_reviews(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<ApiResponse<ReviewList>>> {
    Ok(Json(review_service::user_reviews(&state, &user_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/reviews/stats/{product_id}",
    params(("product_id" = String, Path, description = "Storage id or product id")),
    responses((status = 200, description = "Rating statistics", body = ApiResponse<RatingStats>)),
    tag = "Reviews"
)]
pub async fn review_stats(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> AppResult<Json<ApiResponse<RatingStats>>> {
    Ok(Json(review_service::review_stats(&state, &product_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/reviews/{id}",
    params(("id" = String, Path, description = "Review id")),
    responses(
        (status = 200, description = "Review", body = ApiResponse<ReviewResponse>),
        (status = 404, description = "Review not found"),
    ),
    tag = "Reviews"
)]
pub async fn get_review(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<ReviewResponse>>> {
    Ok(Json(review_service::get_review(&state, &id).await?))
}

#[utoipa::path(
    put,
    path = "/api/reviews/{id}",
    params(("id" = String, Path, description = "Review id")),
    request_body = UpdateReviewRequest,
    responses(
        (status = 200, description = "Review updated", body = ApiResponse<ReviewResponse>),
        (status = 403, description = "Not your review"),
    ),
    security(("bearer_auth" = [])),
    tag = "Reviews"
)]
pub async fn update_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    payload: Result<Json<UpdateReviewRequest>, JsonRejection>,
) -> AppResult<Json<ApiResponse<ReviewResponse>>> {
    let Json(payload) = payload?;
    let resp = review_service::update_review(&state, &user, &id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/reviews/{id}",
    params(("id" = String, Path, description = "Review id")),
    responses(
        (status = 200, description = "Review deleted"),
        (status = 403, description = "Not your review"),
    ),
    security(("bearer_auth" = [])),
    tag = "Reviews"
)]
pub async fn delete_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = review_service::delete_review(&state, &user, &id).await?;
    Ok(Json(resp))
}
