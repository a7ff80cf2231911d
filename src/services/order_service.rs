use std::collections::HashMap;

use chrono::{Duration, Utc};
use sea_orm::sea_query::LockType;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{
        CreateOrderRequest, OrderList, OrderResponse, PayOrderRequest, UpdateOrderStatusRequest,
        order_response,
    },
    entity::{
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems, Model as OrderItemModel},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin, ensure_owner_or_admin},
    models::OrderStatus,
    response::{ApiResponse, Meta},
    routes::params::{MyOrdersQuery, OrderListQuery, Pagination, SortOrder},
    services::product_service::find_product,
    state::AppState,
};

pub const ESTIMATED_DELIVERY_DAYS: i64 = 7;

pub fn parse_order_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::BadRequest(format!("Invalid order id '{raw}'")))
}

pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<OrderResponse>> {
    let draft = payload.reconcile()?;
    let txn = state.orm.begin().await?;

    let mut resolved = Vec::with_capacity(draft.items.len());
    for item in draft.items {
        let product = find_product(&txn, &item.product_ref)
            .await?
            .ok_or_else(|| AppError::BadRequest(format!("Unknown product '{}'", item.product_ref)))?;
        if !product.in_stock {
            return Err(AppError::BadRequest(format!(
                "Product '{}' is out of stock",
                product.sku
            )));
        }
        resolved.push((product, item));
    }

    let now = Utc::now();
    let shipping_address = serde_json::to_value(&draft.shipping_address)
        .map_err(|e| AppError::Internal(e.into()))?;

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        shipping_address: Set(shipping_address),
        payment_method: Set(draft.payment_method.as_str().to_string()),
        subtotal: Set(draft.subtotal),
        tax: Set(draft.tax),
        delivery_charge: Set(draft.delivery_charge),
        total: Set(draft.total),
        status: Set(OrderStatus::Pending.as_str().to_string()),
        is_paid: Set(false),
        paid_at: Set(None),
        payment_result: Set(None),
        is_delivered: Set(false),
        delivered_at: Set(None),
        tracking_number: Set(None),
        estimated_delivery: Set((now + Duration::days(ESTIMATED_DELIVERY_DAYS)).into()),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut items = Vec::with_capacity(resolved.len());
    for (position, (product, item)) in resolved.into_iter().enumerate() {
        let image = item
            .image
            .or_else(|| product.images.first().cloned())
            .unwrap_or_default();
        let line = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(product.id),
            position: Set(position as i32),
            name: Set(item.name.unwrap_or(product.name)),
            image: Set(image),
            quantity: Set(item.quantity),
            price: Set(item.price),
            size: Set(item.size),
            tone: Set(item.tone),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        items.push(line);
    }

    txn.commit().await?;

    tracing::info!(order_id = %order.id, user_id = %user.user_id, total = order.total, "order created");
    audit::record(
        &state.pool,
        user.user_id,
        "order_create",
        "orders",
        serde_json::json!({ "order_id": order.id, "total": order.total }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order created",
        order_response(order, items)?,
        Some(Meta::empty()),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: &str,
) -> AppResult<ApiResponse<OrderResponse>> {
    let id = parse_order_id(id)?;
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Order"))?;
    ensure_owner_or_admin(user, order.user_id)?;

    let items = load_items(&state.orm, id).await?;
    Ok(ApiResponse::success(
        "OK",
        order_response(order, items)?,
        Some(Meta::empty()),
    ))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    let mut condition = Condition::all();
    if let Some(status) = query.status.as_ref().filter(|s| !s.trim().is_empty()) {
        let status: OrderStatus = status.parse()?;
        condition = condition.add(OrderCol::Status.eq(status.as_str()));
    }
    list_page(
        state,
        condition,
        query.pagination(),
        query.sort_order.unwrap_or(SortOrder::Desc),
        "Orders",
    )
    .await
}

/// Orders of the caller, or of `userId` when the caller is that user or an admin.
pub async fn my_orders(
    state: &AppState,
    user: &AuthUser,
    query: MyOrdersQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let owner = match query.user_id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Uuid::parse_str(raw)
            .map_err(|_| AppError::BadRequest(format!("Invalid user id '{raw}'")))?,
        None => user.user_id,
    };
    ensure_owner_or_admin(user, owner)?;

    list_page(
        state,
        Condition::all().add(OrderCol::UserId.eq(owner)),
        query.pagination(),
        SortOrder::Desc,
        "Ok",
    )
    .await
}

pub async fn orders_by_status(
    state: &AppState,
    user: &AuthUser,
    status: &str,
    pagination: Pagination,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    let status: OrderStatus = status.parse()?;
    list_page(
        state,
        Condition::all().add(OrderCol::Status.eq(status.as_str())),
        pagination,
        SortOrder::Desc,
        "Orders",
    )
    .await
}

pub async fn pay_order(
    state: &AppState,
    user: &AuthUser,
    id: &str,
    payload: PayOrderRequest,
) -> AppResult<ApiResponse<OrderResponse>> {
    let id = parse_order_id(id)?;
    let txn = state.orm.begin().await?;
    let order = lock_order(&txn, id).await?;
    ensure_owner_or_admin(user, order.user_id)?;

    if order.is_paid {
        return Err(AppError::Conflict("Order already paid".into()));
    }
    let next = current_status(&order)?.after_payment()?;

    let now = Utc::now();
    let payment_result = serde_json::to_value(payload.into_result(now))
        .map_err(|e| AppError::Internal(e.into()))?;

    let mut active: OrderActive = order.into();
    active.status = Set(next.as_str().to_string());
    active.is_paid = Set(true);
    active.paid_at = Set(Some(now.into()));
    active.payment_result = Set(Some(payment_result));
    active.updated_at = Set(now.into());

    let response = save_transition(state, txn, user, active, "order_paid").await?;
    Ok(ApiResponse::success("Payment recorded", response, Some(Meta::empty())))
}

pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: &str,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<OrderResponse>> {
    ensure_admin(user)?;
    let target: OrderStatus = payload.status.parse()?;
    let id = parse_order_id(id)?;

    let txn = state.orm.begin().await?;
    let order = lock_order(&txn, id).await?;
    let next = current_status(&order)?.transition_to(target)?;

    let now = Utc::now();
    let mut active: OrderActive = order.into();
    active.status = Set(next.as_str().to_string());
    active.updated_at = Set(now.into());
    match next {
        OrderStatus::Shipped => {
            let tracking = payload
                .tracking_number
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty());
            if tracking.is_some() {
                active.tracking_number = Set(tracking);
            }
        }
        OrderStatus::Delivered => {
            active.is_delivered = Set(true);
            active.delivered_at = Set(Some(now.into()));
        }
        _ => {}
    }

    let response = save_transition(state, txn, user, active, "order_status_update").await?;
    Ok(ApiResponse::success("Order status updated", response, Some(Meta::empty())))
}

pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    id: &str,
) -> AppResult<ApiResponse<OrderResponse>> {
    let id = parse_order_id(id)?;
    let txn = state.orm.begin().await?;
    let order = lock_order(&txn, id).await?;
    ensure_owner_or_admin(user, order.user_id)?;
    let next = current_status(&order)?.transition_to(OrderStatus::Cancelled)?;

    let mut active: OrderActive = order.into();
    active.status = Set(next.as_str().to_string());
    active.updated_at = Set(Utc::now().into());

    let response = save_transition(state, txn, user, active, "order_cancel").await?;
    Ok(ApiResponse::success("Order cancelled", response, Some(Meta::empty())))
}

fn current_status(order: &OrderModel) -> AppResult<OrderStatus> {
    order.status.parse().map_err(|_| {
        AppError::Internal(anyhow::anyhow!(
            "order {} has unknown status '{}'",
            order.id,
            order.status
        ))
    })
}

async fn lock_order(txn: &DatabaseTransaction, id: Uuid) -> AppResult<OrderModel> {
    Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or(AppError::NotFound("Order"))
}

async fn save_transition(
    state: &AppState,
    txn: DatabaseTransaction,
    user: &AuthUser,
    active: OrderActive,
    action: &str,
) -> AppResult<OrderResponse> {
    let order = active.update(&txn).await?;
    let items = load_items(&txn, order.id).await?;
    txn.commit().await?;

    tracing::info!(order_id = %order.id, status = %order.status, action, "order updated");
    audit::record(
        &state.pool,
        user.user_id,
        action,
        "orders",
        serde_json::json!({ "order_id": order.id, "status": order.status }),
    )
    .await;

    order_response(order, items)
}

async fn load_items<C: ConnectionTrait>(db: &C, order_id: Uuid) -> AppResult<Vec<OrderItemModel>> {
    Ok(OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .order_by_asc(OrderItemCol::Position)
        .all(db)
        .await?)
}

async fn list_page(
    state: &AppState,
    condition: Condition,
    pagination: Pagination,
    sort_order: SortOrder,
    message: &str,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = pagination.normalize();

    let mut finder = Orders::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let mut items_by_order: HashMap<Uuid, Vec<OrderItemModel>> = HashMap::new();
    if !ids.is_empty() {
        let items = OrderItems::find()
            .filter(OrderItemCol::OrderId.is_in(ids))
            .order_by_asc(OrderItemCol::Position)
            .all(&state.orm)
            .await?;
        for item in items {
            items_by_order.entry(item.order_id).or_default().push(item);
        }
    }

    let items = orders
        .into_iter()
        .map(|order| {
            let lines = items_by_order.remove(&order.id).unwrap_or_default();
            order_response(order, lines)
        })
        .collect::<AppResult<Vec<_>>>()?;

    Ok(ApiResponse::success(
        message,
        OrderList { items },
        Some(Meta::new(page, limit, total)),
    ))
}
