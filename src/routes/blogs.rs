use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, Path, Query, State, multipart::MultipartRejection,
        rejection::QueryRejection,
    },
    http::StatusCode,
    routing::get,
};

use crate::{
    dto::blogs::{BLOG_BODY_LIMIT, BLOG_FILES, BlogList, BlogMultipartForm, BlogResponse},
    error::AppResult,
    form::read_form,
    middleware::auth::AuthUser,
    response::ApiResponse,
    routes::params::BlogQuery,
    services::blog_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_blogs).post(create_blog))
        .route("/{key}", get(get_blog).put(update_blog).delete(delete_blog))
        .layer(DefaultBodyLimit::max(BLOG_BODY_LIMIT))
}

#[utoipa::path(
    get,
    path = "/api/blogs",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("tag" = Option<String>, Query, description = "Only posts with this tag"),
    ),
    responses((status = 200, description = "Published posts", body = ApiResponse<BlogList>)),
    tag = "Blogs"
)]
pub async fn list_blogs(
    State(state): State<AppState>,
    query: Result<Query<BlogQuery>, QueryRejection>,
) -> AppResult<Json<ApiResponse<BlogList>>> {
    let Query(query) = query?;
    Ok(Json(blog_service::list_blogs(&state, query).await?))
}

#[utoipa::path(
    get,
    path = "/api/blogs/{key}",
    params(("key" = String, Path, description = "Blog id or slug")),
    responses(
        (status = 200, description = "Blog post", body = ApiResponse<BlogResponse>),
        (status = 404, description = "Blog not found"),
    ),
    tag = "Blogs"
)]
pub async fn get_blog(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> AppResult<Json<ApiResponse<BlogResponse>>> {
    Ok(Json(blog_service::get_blog(&state, &key).await?))
}

#[utoipa::path(
    post,
    path = "/api/blogs",
    request_body(content = BlogMultipartForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Blog created", body = ApiResponse<BlogResponse>),
        (status = 409, description = "Slug already exists"),
    ),
    security(("bearer_auth" = [])),
    tag = "Blogs"
)]
pub async fn create_blog(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<(StatusCode, Json<ApiResponse<BlogResponse>>)> {
    let form = read_form(multipart?, &BLOG_FILES).await?;
    let resp = blog_service::create_blog(&state, &user, form).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    put,
    path = "/api/blogs/{key}",
    params(("key" = String, Path, description = "Blog id or slug")),
    request_body(content = BlogMultipartForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Blog updated", body = ApiResponse<BlogResponse>),
        (status = 404, description = "Blog not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Blogs"
)]
pub async fn update_blog(
    State(state): State<AppState>,
    user: AuthUser,
    Path(key): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<ApiResponse<BlogResponse>>> {
    let form = read_form(multipart?, &BLOG_FILES).await?;
    Ok(Json(blog_service::update_blog(&state, &user, &key, form).await?))
}

#[utoipa::path(
    delete,
    path = "/api/blogs/{key}",
    params(("key" = String, Path, description = "Blog id or slug")),
    responses(
        (status = 200, description = "Blog deleted"),
        (status = 404, description = "Blog not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Blogs"
)]
pub async fn delete_blog(
    State(state): State<AppState>,
    user: AuthUser,
    Path(key): Path<String>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    Ok(Json(blog_service::delete_blog(&state, &user, &key).await?))
}
