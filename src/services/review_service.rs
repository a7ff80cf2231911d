use chrono::Utc;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::reviews::{CreateReviewRequest, RatingStats, ReviewList, ReviewResponse, UpdateReviewRequest},
    entity::{
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        orders::Entity as Orders,
        products::{Column as ProductCol, Entity as Products},
        reviews::{ActiveModel, Column, Entity as Reviews, Model as ReviewModel},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_owner},
    response::{ApiResponse, Meta},
    services::product_service::find_product,
    state::AppState,
};

fn parse_id(raw: &str, what: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::BadRequest(format!("Invalid {what} id '{raw}'")))
}

pub async fn create_review(
    state: &AppState,
    user: &AuthUser,
    payload: CreateReviewRequest,
) -> AppResult<ApiResponse<ReviewResponse>> {
    let draft = payload.validate()?;

    let product = find_product(&state.orm, &draft.product_ref)
        .await?
        .ok_or(AppError::NotFound("Product"))?;
    let order = Orders::find_by_id(draft.order_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Order"))?;
    ensure_owner(user, order.user_id)?;

    let purchased = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .filter(OrderItemCol::ProductId.eq(product.id))
        .count(&state.orm)
        .await?
        > 0;
    if !purchased {
        return Err(AppError::BadRequest(
            "This order does not contain the reviewed product".into(),
        ));
    }

    let duplicate = Reviews::find()
        .filter(Column::UserId.eq(user.user_id))
        .filter(Column::ProductId.eq(product.id))
        .filter(Column::OrderId.eq(order.id))
        .count(&state.orm)
        .await?
        > 0;
    if duplicate {
        return Err(AppError::DuplicateReview);
    }

    let reviewer = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("User"))?;

    let txn = state.orm.begin().await?;
    lock_product(&txn, product.id).await?;
    let review = ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        product_id: Set(product.id),
        order_id: Set(order.id),
        rating: Set(draft.rating),
        comment: Set(draft.comment),
        user_name: Set(reviewer.username),
        product_name: Set(product.name),
        product_image: Set(product.images.into_iter().next()),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await
    .map_err(|err| match AppError::from(err) {
        // Lost a race with a concurrent identical submission.
        e if e.is_unique_violation() => AppError::DuplicateReview,
        e => e,
    })?;
    refresh_product_rating(&txn, review.product_id).await?;
    txn.commit().await?;

    tracing::info!(review_id = %review.id, product_id = %review.product_id, "review created");
    audit::record(
        &state.pool,
        user.user_id,
        "review_create",
        "reviews",
        serde_json::json!({ "review_id": review.id, "product_id": review.product_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Review created",
        review.into(),
        Some(Meta::empty()),
    ))
}

pub async fn product_reviews(state: &AppState, product_key: &str) -> AppResult<ApiResponse<ReviewList>> {
    let product = find_product(&state.orm, product_key)
        .await?
        .ok_or(AppError::NotFound("Product"))?;
    let items = Reviews::find()
        .filter(Column::ProductId.eq(product.id))
        .order_by_desc(Column::CreatedAt)
        .all(&state.orm)
        .await?;
    Ok(review_list(items))
}

pub async fn user_reviews(state: &AppState, user_id: &str) -> AppResult<ApiResponse<ReviewList>> {
    let user_id = parse_id(user_id, "user")?;
    let items = Reviews::find()
        .filter(Column::UserId.eq(user_id))
        .order_by_desc(Column::CreatedAt)
        .all(&state.orm)
        .await?;
    Ok(review_list(items))
}

pub async fn get_review(state: &AppState, id: &str) -> AppResult<ApiResponse<ReviewResponse>> {
    let review = load_review(state, id).await?;
    Ok(ApiResponse::success("Review", review.into(), None))
}

pub async fn update_review(
    state: &AppState,
    user: &AuthUser,
    id: &str,
    payload: UpdateReviewRequest,
) -> AppResult<ApiResponse<ReviewResponse>> {
    let review = load_review(state, id).await?;
    ensure_owner(user, review.user_id)?;
    let (rating, comment) = payload.validate()?;

    let txn = state.orm.begin().await?;
    lock_product(&txn, review.product_id).await?;
    let mut active: ActiveModel = review.into();
    if let Some(rating) = rating {
        active.rating = Set(rating);
    }
    if let Some(comment) = comment {
        active.comment = Set(comment);
    }
    active.updated_at = Set(Utc::now().into());
    let review = active.update(&txn).await?;
    refresh_product_rating(&txn, review.product_id).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        user.user_id,
        "review_update",
        "reviews",
        serde_json::json!({ "review_id": review.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Review updated",
        review.into(),
        Some(Meta::empty()),
    ))
}

pub async fn delete_review(
    state: &AppState,
    user: &AuthUser,
    id: &str,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let review = load_review(state, id).await?;
    ensure_owner(user, review.user_id)?;

    let txn = state.orm.begin().await?;
    lock_product(&txn, review.product_id).await?;
    Reviews::delete_by_id(review.id).exec(&txn).await?;
    refresh_product_rating(&txn, review.product_id).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        user.user_id,
        "review_delete",
        "reviews",
        serde_json::json!({ "review_id": review.id, "product_id": review.product_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Review deleted",
        serde_json::json!({ "id": review.id }),
        Some(Meta::empty()),
    ))
}

pub async fn review_stats(state: &AppState, product_key: &str) -> AppResult<ApiResponse<RatingStats>> {
    let product = find_product(&state.orm, product_key)
        .await?
        .ok_or(AppError::NotFound("Product"))?;
    let stats = product_stats(&state.orm, product.id).await?;
    Ok(ApiResponse::success("Review stats", stats, None))
}

pub async fn product_stats<C: ConnectionTrait>(db: &C, product_id: Uuid) -> AppResult<RatingStats> {
    let ratings: Vec<i32> = Reviews::find()
        .select_only()
        .column(Column::Rating)
        .filter(Column::ProductId.eq(product_id))
        .into_tuple()
        .all(db)
        .await?;
    Ok(RatingStats::from_ratings(&ratings))
}

/// Copies the current review aggregate onto the product row. Callers hold
/// the product lock from `lock_product`.
async fn refresh_product_rating<C: ConnectionTrait>(db: &C, product_id: Uuid) -> AppResult<()> {
    let stats = product_stats(db, product_id).await?;
    let review_count = i32::try_from(stats.total_reviews).unwrap_or(i32::MAX);
    Products::update_many()
        .col_expr(ProductCol::Rating, Expr::value(stats.average_rating))
        .col_expr(ProductCol::ReviewCount, Expr::value(review_count))
        .filter(ProductCol::Id.eq(product_id))
        .exec(db)
        .await?;
    tracing::debug!(%product_id, rating = stats.average_rating, review_count, "product rating refreshed");
    Ok(())
}

/// Serializes review writes per product. Taken before the review row is
/// touched: the review's foreign key share lock would otherwise deadlock
/// against a later `FOR UPDATE`.
async fn lock_product<C: ConnectionTrait>(db: &C, product_id: Uuid) -> AppResult<()> {
    Products::find_by_id(product_id)
        .select_only()
        .column(ProductCol::Id)
        .lock(LockType::Update)
        .into_tuple::<Uuid>()
        .one(db)
        .await?;
    Ok(())
}

async fn load_review(state: &AppState, id: &str) -> AppResult<ReviewModel> {
    let id = parse_id(id, "review")?;
    Reviews::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Review"))
}

fn review_list(items: Vec<ReviewModel>) -> ApiResponse<ReviewList> {
    let total = items.len() as i64;
    let items = items.into_iter().map(ReviewResponse::from).collect();
    ApiResponse::success("Reviews", ReviewList { items }, Some(Meta::new(1, total, total)))
}
