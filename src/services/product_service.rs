use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::products::{ProductList, ProductResponse},
    entity::products::{ActiveModel, Column, Entity as Products, Model as ProductModel},
    error::{AppError, AppResult},
    form::FormData,
    media::{MediaUpload, discard_on_error, upload_all},
    middleware::auth::{AuthUser, ensure_admin},
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    services::product_intake::{ProductFields, ProductPatch},
    state::AppState,
};

const MEDIA_FOLDER: &str = "products";

/// Resolve a product by storage identity first, then by its human-readable id.
pub async fn find_product<C: ConnectionTrait>(db: &C, key: &str) -> AppResult<Option<ProductModel>> {
    let key = key.trim();
    if let Ok(id) = Uuid::parse_str(key) {
        if let Some(product) = Products::find_by_id(id).one(db).await? {
            return Ok(Some(product));
        }
    }
    Ok(Products::find().filter(Column::Sku.eq(key)).one(db).await?)
}

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
    in_stock_only: bool,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all();

    if in_stock_only {
        condition = condition.add(Column::InStock.eq(true));
    }

    if let Some(search) = query.q.as_ref().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::Name).ilike(pattern.clone()))
                .add(Expr::col(Column::Description).ilike(pattern)),
        );
    }

    if let Some(category) = query.category.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(Column::Category.eq(category.clone()));
    }

    if let Some(min_price) = query.min_price {
        condition = condition.add(Column::Price.gte(min_price));
    }

    if let Some(max_price) = query.max_price {
        condition = condition.add(Column::Price.lte(max_price));
    }

    let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let sort_col = match sort_by {
        ProductSortBy::CreatedAt => Column::CreatedAt,
        ProductSortBy::Price => Column::Price,
        ProductSortBy::Name => Column::Name,
    };

    let mut finder = Products::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };
    // Stable order for equal sort keys.
    finder = finder.order_by_asc(Column::Id);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(ProductResponse::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

pub async fn get_product(state: &AppState, key: &str) -> AppResult<ApiResponse<ProductResponse>> {
    let product = find_product(&state.orm, key)
        .await?
        .ok_or(AppError::NotFound("Product"))?;
    Ok(ApiResponse::success("Product", product.into(), None))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    mut form: FormData,
) -> AppResult<ApiResponse<ProductResponse>> {
    ensure_admin(user)?;
    let images = form.take_files("images");
    let video = form.take_files("video");

    let mut fields = ProductFields::from_create_form(&form, images.len())?;
    ensure_sku_available(state, &fields.sku).await?;

    let (image_urls, video_url) = upload_media(state, images, video).await?;
    let uploaded = uploaded_urls(&image_urls, &video_url);
    fields.attach_media(image_urls, video_url);

    let mut active = ActiveModel {
        id: Set(Uuid::new_v4()),
        created_at: NotSet,
        updated_at: NotSet,
        ..Default::default()
    };
    write_fields(&mut active, fields);
    let inserted = active.insert(&state.orm).await;
    let product = discard_on_error(state.media.as_ref(), &uploaded, inserted).await?;

    tracing::info!(product_id = %product.id, sku = %product.sku, "product created");
    audit::record(
        &state.pool,
        user.user_id,
        "product_create",
        "products",
        serde_json::json!({ "product_id": product.id, "sku": product.sku }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product created",
        product.into(),
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    key: &str,
    mut form: FormData,
) -> AppResult<ApiResponse<ProductResponse>> {
    ensure_admin(user)?;
    let existing = find_product(&state.orm, key)
        .await?
        .ok_or(AppError::NotFound("Product"))?;

    let images = form.take_files("images");
    let video = form.take_files("video");
    let patch = ProductPatch::from_form(&form, images.len())?;
    if let Some(sku) = patch.sku.as_deref() {
        if sku != existing.sku {
            ensure_sku_available(state, sku).await?;
        }
    }

    let (image_urls, video_url) = upload_media(state, images, video).await?;
    let uploaded = uploaded_urls(&image_urls, &video_url);
    let fields = patch.apply(ProductFields::from(&existing), image_urls, video_url);

    let mut active: ActiveModel = existing.into();
    write_fields(&mut active, fields);
    active.updated_at = Set(Utc::now().into());
    let updated = active.update(&state.orm).await;
    let product = discard_on_error(state.media.as_ref(), &uploaded, updated).await?;

    audit::record(
        &state.pool,
        user.user_id,
        "product_update",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Updated",
        product.into(),
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    key: &str,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let product = find_product(&state.orm, key)
        .await?
        .ok_or(AppError::NotFound("Product"))?;

    let result = Products::delete_by_id(product.id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Product"));
    }

    audit::record(
        &state.pool,
        user.user_id,
        "product_delete",
        "products",
        serde_json::json!({ "product_id": product.id, "sku": product.sku }),
    )
    .await;

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({ "_id": product.id, "id": product.sku }),
        Some(Meta::empty()),
    ))
}

async fn ensure_sku_available(state: &AppState, sku: &str) -> AppResult<()> {
    let taken = Products::find()
        .filter(Column::Sku.eq(sku))
        .count(&state.orm)
        .await?
        > 0;
    if taken {
        return Err(AppError::Conflict(format!("Product id '{sku}' already exists")));
    }
    Ok(())
}

/// Images and video go out as one concurrent batch; the video, if any, is last.
async fn upload_media(
    state: &AppState,
    images: Vec<MediaUpload>,
    video: Vec<MediaUpload>,
) -> AppResult<(Vec<String>, Option<String>)> {
    let image_count = images.len();
    let mut uploads = images;
    uploads.extend(video);

    let mut urls = upload_all(state.media.as_ref(), MEDIA_FOLDER, uploads).await?;
    let video_url = if urls.len() > image_count {
        urls.pop()
    } else {
        None
    };
    Ok((urls, video_url))
}

fn uploaded_urls(images: &[String], video: &Option<String>) -> Vec<String> {
    images.iter().chain(video).cloned().collect()
}

fn write_fields(active: &mut ActiveModel, fields: ProductFields) {
    active.sku = Set(fields.sku);
    active.name = Set(fields.name);
    active.price = Set(fields.price);
    active.size = Set(fields.size);
    active.tone = Set(fields.tone);
    active.product_type = Set(fields.product_type);
    active.category = Set(fields.category);
    active.brand = Set(fields.brand);
    active.images = Set(fields.images);
    active.video = Set(fields.video);
    active.audio = Set(fields.audio);
    active.description = Set(fields.description);
    active.details = Set(fields.details);
    active.care_instructions = Set(fields.care_instructions);
    active.in_stock = Set(fields.in_stock);
    active.rating = Set(fields.rating);
    active.review_count = Set(fields.review_count);
    active.seo_title = Set(fields.seo_title);
    active.seo_description = Set(fields.seo_description);
    active.seo_keywords = Set(fields.seo_keywords);
}
