use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgFunc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::blogs::{BlogFields, BlogList, BlogResponse},
    entity::blogs::{ActiveModel, Column, Entity as Blogs, Model as BlogModel},
    error::{AppError, AppResult},
    form::FormData,
    media::{discard_on_error, upload_all},
    middleware::auth::{AuthUser, ensure_admin},
    response::{ApiResponse, Meta},
    routes::params::BlogQuery,
    state::AppState,
};

const MEDIA_FOLDER: &str = "blogs";

async fn find_blog(state: &AppState, key: &str) -> AppResult<Option<BlogModel>> {
    let key = key.trim();
    if let Ok(id) = Uuid::parse_str(key) {
        if let Some(blog) = Blogs::find_by_id(id).one(&state.orm).await? {
            return Ok(Some(blog));
        }
    }
    Ok(Blogs::find().filter(Column::Slug.eq(key)).one(&state.orm).await?)
}

pub async fn list_blogs(state: &AppState, query: BlogQuery) -> AppResult<ApiResponse<BlogList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all().add(Column::Published.eq(true));
    if let Some(tag) = query.tag.as_ref().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        condition = condition.add(Expr::val(tag).eq(PgFunc::any(Expr::col(Column::Tags))));
    }

    let finder = Blogs::find()
        .filter(condition)
        .order_by_desc(Column::CreatedAt)
        .order_by_asc(Column::Id);
    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(BlogResponse::from)
        .collect();

    Ok(ApiResponse::success(
        "Blogs",
        BlogList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn get_blog(state: &AppState, key: &str) -> AppResult<ApiResponse<BlogResponse>> {
    let blog = find_blog(state, key).await?.ok_or(AppError::NotFound("Blog"))?;
    Ok(ApiResponse::success("Blog", blog.into(), None))
}

pub async fn create_blog(
    state: &AppState,
    user: &AuthUser,
    mut form: FormData,
) -> AppResult<ApiResponse<BlogResponse>> {
    ensure_admin(user)?;
    let image = form.take_files("image");
    let mut fields = BlogFields::from_create_form(&form)?;
    ensure_slug_available(state, &fields.slug).await?;
    let uploaded = upload_all(state.media.as_ref(), MEDIA_FOLDER, image).await?;
    if let Some(url) = uploaded.last() {
        fields.cover_image = Some(url.clone());
    }

    let mut active = ActiveModel {
        id: Set(Uuid::new_v4()),
        created_at: NotSet,
        updated_at: NotSet,
        ..Default::default()
    };
    write_fields(&mut active, fields);
    let inserted = active.insert(&state.orm).await;
    let blog = discard_on_error(state.media.as_ref(), &uploaded, inserted).await?;

    tracing::info!(blog_id = %blog.id, slug = %blog.slug, "blog created");
    audit::record(
        &state.pool,
        user.user_id,
        "blog_create",
        "blogs",
        serde_json::json!({ "blog_id": blog.id, "slug": blog.slug }),
    )
    .await;

    Ok(ApiResponse::success("Blog created", blog.into(), Some(Meta::empty())))
}

pub async fn update_blog(
    state: &AppState,
    user: &AuthUser,
    key: &str,
    mut form: FormData,
) -> AppResult<ApiResponse<BlogResponse>> {
    ensure_admin(user)?;
    let existing = find_blog(state, key).await?.ok_or(AppError::NotFound("Blog"))?;
    let image = form.take_files("image");
    let mut fields = BlogFields::from(&existing).patch(&form)?;
    if fields.slug != existing.slug {
        ensure_slug_available(state, &fields.slug).await?;
    }
    let uploaded = upload_all(state.media.as_ref(), MEDIA_FOLDER, image).await?;
    if let Some(url) = uploaded.last() {
        fields.cover_image = Some(url.clone());
    }

    let mut active: ActiveModel = existing.into();
    write_fields(&mut active, fields);
    active.updated_at = Set(Utc::now().into());
    let updated = active.update(&state.orm).await;
    let blog = discard_on_error(state.media.as_ref(), &uploaded, updated).await?;

    audit::record(
        &state.pool,
        user.user_id,
        "blog_update",
        "blogs",
        serde_json::json!({ "blog_id": blog.id }),
    )
    .await;

    Ok(ApiResponse::success("Updated", blog.into(), Some(Meta::empty())))
}

pub async fn delete_blog(
    state: &AppState,
    user: &AuthUser,
    key: &str,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let blog = find_blog(state, key).await?.ok_or(AppError::NotFound("Blog"))?;
    Blogs::delete_by_id(blog.id).exec(&state.orm).await?;

    audit::record(
        &state.pool,
        user.user_id,
        "blog_delete",
        "blogs",
        serde_json::json!({ "blog_id": blog.id, "slug": blog.slug }),
    )
    .await;

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({ "id": blog.id, "slug": blog.slug }),
        Some(Meta::empty()),
    ))
}

async fn ensure_slug_available(state: &AppState, slug: &str) -> AppResult<()> {
    let taken = Blogs::find()
        .filter(Column::Slug.eq(slug))
        .count(&state.orm)
        .await?
        > 0;
    if taken {
        return Err(AppError::Conflict(format!("Blog slug '{slug}' already exists")));
    }
    Ok(())
}

fn write_fields(active: &mut ActiveModel, fields: BlogFields) {
    active.title = Set(fields.title);
    active.slug = Set(fields.slug);
    active.excerpt = Set(fields.excerpt);
    active.content = Set(fields.content);
    active.author = Set(fields.author);
    active.tags = Set(fields.tags);
    active.cover_image = Set(fields.cover_image);
    active.published = Set(fields.published);
    active.seo_title = Set(fields.seo_title);
    active.seo_description = Set(fields.seo_description);
}
