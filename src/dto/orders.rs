use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entity::{order_items::Model as OrderItemModel, orders::Model as OrderModel},
    error::{AppError, AppResult},
    models::{OrderStatus, PaymentMethod, PaymentResult, ShippingAddress},
};

/// Checkout payload. Two generations of clients exist, so most values have a
/// legacy alias; see [`CreateOrderRequest::reconcile`] for precedence.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub items: Option<Vec<LineItemInput>>,
    pub order_items: Option<Vec<LineItemInput>>,
    pub shipping_address: Option<ShippingAddressInput>,
    pub payment_method: Option<String>,
    pub subtotal: Option<f64>,
    pub items_price: Option<f64>,
    pub tax: Option<f64>,
    pub tax_price: Option<f64>,
    pub delivery_charge: Option<f64>,
    pub shipping_price: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LineItemInput {
    pub product: Option<String>,
    pub product_id: Option<String>,
    pub name: Option<String>,
    pub image: Option<String>,
    pub quantity: Option<i64>,
    pub qty: Option<i64>,
    pub price: Option<f64>,
    pub size: Option<String>,
    pub tone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddressInput {
    pub full_name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
}

/// A checkout after alias reconciliation and validation.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDraft {
    pub items: Vec<LineItemDraft>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub subtotal: f64,
    pub tax: f64,
    pub delivery_charge: f64,
    pub total: f64,
}

/// Name and image may be filled from the catalog once the product resolves.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItemDraft {
    pub product_ref: String,
    pub name: Option<String>,
    pub image: Option<String>,
    pub quantity: i32,
    pub price: f64,
    pub size: Option<String>,
    pub tone: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn money(field: &str, value: f64) -> AppResult<f64> {
    if !value.is_finite() || value < 0.0 {
        return Err(AppError::BadRequest(format!(
            "{field} must be a non-negative number"
        )));
    }
    Ok(round_cents(value))
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl CreateOrderRequest {
    /// Resolve aliases into one canonical draft.
    ///
    /// Precedence, first match wins:
    /// - items: `items` (when non-empty), then `orderItems`
    /// - subtotal: `subtotal`, `itemsPrice`, then the sum of line totals
    /// - tax: `tax`, `taxPrice`, then 0
    /// - delivery charge: `deliveryCharge`, `shippingPrice`, then 0
    ///
    /// The total is always derived and never read from the request.
    pub fn reconcile(self) -> AppResult<OrderDraft> {
        let raw_items = self
            .items
            .filter(|items| !items.is_empty())
            .or(self.order_items)
            .unwrap_or_default();
        if raw_items.is_empty() {
            return Err(AppError::BadRequest("Order must contain at least one item".into()));
        }

        let items = raw_items
            .into_iter()
            .enumerate()
            .map(|(index, item)| item.reconcile(index))
            .collect::<AppResult<Vec<_>>>()?;

        let shipping_address = self
            .shipping_address
            .unwrap_or_default()
            .into_address()?;

        let payment_method = non_blank(self.payment_method)
            .ok_or_else(|| AppError::MissingFields(vec!["paymentMethod".into()]))?
            .parse::<PaymentMethod>()?;

        let line_total: f64 = items
            .iter()
            .map(|item| item.price * f64::from(item.quantity))
            .sum();
        let subtotal = money("subtotal", self.subtotal.or(self.items_price).unwrap_or(line_total))?;
        let tax = money("tax", self.tax.or(self.tax_price).unwrap_or(0.0))?;
        let delivery_charge = money(
            "deliveryCharge",
            self.delivery_charge.or(self.shipping_price).unwrap_or(0.0),
        )?;

        Ok(OrderDraft {
            items,
            shipping_address,
            payment_method,
            subtotal,
            tax,
            delivery_charge,
            total: round_cents(subtotal + tax + delivery_charge),
        })
    }
}

impl LineItemInput {
    fn reconcile(self, index: usize) -> AppResult<LineItemDraft> {
        let product_ref = non_blank(self.product)
            .or(non_blank(self.product_id))
            .ok_or_else(|| AppError::MissingFields(vec![format!("items[{index}].product")]))?;

        let quantity = self.quantity.or(self.qty).unwrap_or(1);
        if !(1..=i64::from(i32::MAX)).contains(&quantity) {
            return Err(AppError::BadRequest(format!(
                "items[{index}].quantity must be at least 1"
            )));
        }

        let price = self
            .price
            .ok_or_else(|| AppError::MissingFields(vec![format!("items[{index}].price")]))?;
        let price = money(&format!("items[{index}].price"), price)?;

        Ok(LineItemDraft {
            product_ref,
            name: non_blank(self.name),
            image: non_blank(self.image),
            quantity: quantity as i32,
            price,
            size: non_blank(self.size),
            tone: non_blank(self.tone),
        })
    }
}

impl ShippingAddressInput {
    pub fn into_address(self) -> AppResult<ShippingAddress> {
        let fields = [
            ("shippingAddress.fullName", non_blank(self.full_name)),
            ("shippingAddress.address", non_blank(self.address)),
            ("shippingAddress.city", non_blank(self.city)),
            ("shippingAddress.postalCode", non_blank(self.postal_code)),
            ("shippingAddress.country", non_blank(self.country)),
            ("shippingAddress.phone", non_blank(self.phone)),
        ];
        let missing: Vec<String> = fields
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(AppError::MissingFields(missing));
        }

        let [full_name, address, city, postal_code, country, phone] =
            fields.map(|(_, value)| value.unwrap_or_default());
        Ok(ShippingAddress {
            full_name,
            address,
            city,
            postal_code,
            country,
            phone,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderStatusRequest {
    pub status: String,
    pub tracking_number: Option<String>,
}

/// Payment confirmation details. Missing values get defaults.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PayOrderRequest {
    pub id: Option<String>,
    pub status: Option<String>,
    pub update_time: Option<String>,
    pub email_address: Option<String>,
}

impl PayOrderRequest {
    pub fn into_result(self, now: DateTime<Utc>) -> PaymentResult {
        PaymentResult {
            id: non_blank(self.id).unwrap_or_else(|| format!("PAY-{}", Uuid::new_v4().simple())),
            status: non_blank(self.status).unwrap_or_else(|| "COMPLETED".to_string()),
            update_time: non_blank(self.update_time).unwrap_or_else(|| now.to_rfc3339()),
            email_address: non_blank(self.email_address),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemResponse {
    pub product_id: Uuid,
    pub name: String,
    pub image: String,
    pub quantity: i32,
    pub price: f64,
    pub size: Option<String>,
    pub tone: Option<String>,
}

/// The order contract the storefront consumes, independent of column names.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub items: Vec<OrderItemResponse>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub subtotal: f64,
    pub tax: f64,
    pub delivery_charge: f64,
    pub total: f64,
    pub status: OrderStatus,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_result: Option<PaymentResult>,
    pub is_delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,
    pub tracking_number: Option<String>,
    pub estimated_delivery: DateTime<Utc>,
    pub order_date: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct OrderList {
    #[schema(value_type = Vec<OrderResponse>)]
    pub items: Vec<OrderResponse>,
}

/// Map stored rows to the response contract. Every order-returning operation
/// goes through here.
pub fn order_response(order: OrderModel, mut items: Vec<OrderItemModel>) -> AppResult<OrderResponse> {
    items.sort_by_key(|item| item.position);

    let status = order
        .status
        .parse::<OrderStatus>()
        .map_err(|_| corrupt(order.id, "status"))?;
    let payment_method = order
        .payment_method
        .parse::<PaymentMethod>()
        .map_err(|_| corrupt(order.id, "payment_method"))?;
    let shipping_address: ShippingAddress = serde_json::from_value(order.shipping_address)
        .map_err(|_| corrupt(order.id, "shipping_address"))?;
    let payment_result = order
        .payment_result
        .map(serde_json::from_value::<PaymentResult>)
        .transpose()
        .map_err(|_| corrupt(order.id, "payment_result"))?;

    Ok(OrderResponse {
        id: order.id,
        user_id: order.user_id,
        items: items
            .into_iter()
            .map(|item| OrderItemResponse {
                product_id: item.product_id,
                name: item.name,
                image: item.image,
                quantity: item.quantity,
                price: item.price,
                size: item.size,
                tone: item.tone,
            })
            .collect(),
        shipping_address,
        payment_method,
        subtotal: order.subtotal,
        tax: order.tax,
        delivery_charge: order.delivery_charge,
        total: order.total,
        status,
        is_paid: order.is_paid,
        paid_at: order.paid_at.map(|dt| dt.with_timezone(&Utc)),
        payment_result,
        is_delivered: order.is_delivered,
        delivered_at: order.delivered_at.map(|dt| dt.with_timezone(&Utc)),
        tracking_number: order.tracking_number,
        estimated_delivery: order.estimated_delivery.with_timezone(&Utc),
        order_date: order.created_at.with_timezone(&Utc),
        updated_at: order.updated_at.with_timezone(&Utc),
    })
}

fn corrupt(order_id: Uuid, column: &str) -> AppError {
    AppError::Internal(anyhow::anyhow!("order {order_id} has an unreadable {column}"))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn request(body: serde_json::Value) -> CreateOrderRequest {
        serde_json::from_value(body).expect("valid request json")
    }

    fn address() -> serde_json::Value {
        json!({
            "fullName": "Asha Rai",
            "address": "12 Temple Road",
            "city": "Pokhara",
            "postalCode": "33700",
            "country": "Nepal",
            "phone": "+977 61 000000"
        })
    }

    #[test]
    fn legacy_field_names_are_accepted() {
        let draft = request(json!({
            "orderItems": [{ "productId": "bowl-7", "name": "Bowl", "image": "a.jpg", "qty": 2, "price": 40.0 }],
            "shippingAddress": address(),
            "paymentMethod": "card",
            "itemsPrice": 80.0,
            "taxPrice": 6.4,
            "shippingPrice": 5.0
        }))
        .reconcile()
        .unwrap();

        assert_eq!(draft.items.len(), 1);
        assert_eq!(draft.items[0].product_ref, "bowl-7");
        assert_eq!(draft.items[0].quantity, 2);
        assert_eq!(draft.subtotal, 80.0);
        assert_eq!(draft.tax, 6.4);
        assert_eq!(draft.delivery_charge, 5.0);
        assert_eq!(draft.total, 91.4);
    }

    #[test]
    fn canonical_names_win_over_aliases() {
        let draft = request(json!({
            "items": [{ "product": "bowl-9", "productId": "ignored", "quantity": 1, "qty": 7, "price": 10.0 }],
            "orderItems": [{ "product": "other", "price": 1.0 }],
            "shippingAddress": address(),
            "paymentMethod": "cod",
            "subtotal": 10.0,
            "itemsPrice": 99.0,
            "tax": 0.5,
            "taxPrice": 9.0
        }))
        .reconcile()
        .unwrap();

        assert_eq!(draft.items[0].product_ref, "bowl-9");
        assert_eq!(draft.items[0].quantity, 1);
        assert_eq!(draft.subtotal, 10.0);
        assert_eq!(draft.tax, 0.5);
        assert_eq!(draft.delivery_charge, 0.0);
        assert_eq!(draft.total, 10.5);
    }

    #[test]
    fn empty_items_fall_through_to_legacy_list() {
        let draft = request(json!({
            "items": [],
            "orderItems": [{ "product": "bowl-3", "price": 12.5, "quantity": 2 }],
            "shippingAddress": address(),
            "paymentMethod": "paypal"
        }))
        .reconcile()
        .unwrap();
        assert_eq!(draft.items[0].product_ref, "bowl-3");
        assert_eq!(draft.subtotal, 25.0);
    }

    #[test]
    fn order_without_items_is_rejected() {
        let err = request(json!({
            "items": [],
            "shippingAddress": address(),
            "paymentMethod": "card"
        }))
        .reconcile()
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn every_missing_address_field_is_reported() {
        let err = request(json!({
            "items": [{ "product": "bowl-3", "price": 12.5 }],
            "shippingAddress": { "fullName": "Asha Rai", "city": " " },
            "paymentMethod": "card"
        }))
        .reconcile()
        .unwrap_err();
        match err {
            AppError::MissingFields(fields) => assert_eq!(
                fields,
                [
                    "shippingAddress.address",
                    "shippingAddress.city",
                    "shippingAddress.postalCode",
                    "shippingAddress.country",
                    "shippingAddress.phone"
                ]
            ),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn invalid_quantities_and_prices_are_rejected() {
        for item in [
            json!({ "product": "bowl", "price": 1.0, "quantity": 0 }),
            json!({ "product": "bowl", "price": -1.0 }),
            json!({ "product": "bowl" }),
            json!({ "price": 1.0 }),
        ] {
            let result = request(json!({
                "items": [item],
                "shippingAddress": address(),
                "paymentMethod": "card"
            }))
            .reconcile();
            assert!(result.is_err(), "{item} should be rejected");
        }
    }

    #[test]
    fn unknown_payment_method_is_rejected() {
        let result = request(json!({
            "items": [{ "product": "bowl", "price": 1.0 }],
            "shippingAddress": address(),
            "paymentMethod": "barter"
        }))
        .reconcile();
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn payment_result_defaults() {
        let now = Utc::now();
        let result = PayOrderRequest {
            email_address: Some("payer@example.com".into()),
            ..Default::default()
        }
        .into_result(now);
        assert!(result.id.starts_with("PAY-"));
        assert_eq!(result.status, "COMPLETED");
        assert_eq!(result.update_time, now.to_rfc3339());
        assert_eq!(result.email_address.as_deref(), Some("payer@example.com"));
    }

    #[test]
    fn response_uses_client_field_names() {
        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let order = OrderModel {
            id: order_id,
            user_id: Uuid::new_v4(),
            shipping_address: address(),
            payment_method: "card".into(),
            subtotal: 80.0,
            tax: 0.0,
            delivery_charge: 5.0,
            total: 85.0,
            status: "pending".into(),
            is_paid: false,
            paid_at: None,
            payment_result: None,
            is_delivered: false,
            delivered_at: None,
            tracking_number: None,
            estimated_delivery: now.into(),
            created_at: now.into(),
            updated_at: now.into(),
        };
        let item = |position: i32, name: &str| OrderItemModel {
            id: Uuid::new_v4(),
            order_id,
            product_id: Uuid::new_v4(),
            position,
            name: name.into(),
            image: "a.jpg".into(),
            quantity: 1,
            price: 40.0,
            size: None,
            tone: Some("F".into()),
            created_at: now.into(),
        };

        let response = order_response(order, vec![item(1, "second"), item(0, "first")]).unwrap();
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["id"], order_id.to_string());
        assert_eq!(json["status"], "pending");
        assert_eq!(json["paymentMethod"], "card");
        assert_eq!(json["deliveryCharge"], 5.0);
        assert_eq!(json["shippingAddress"]["postalCode"], "33700");
        assert_eq!(json["items"][0]["name"], "first");
        assert_eq!(json["items"][1]["name"], "second");
        assert!(json.get("orderDate").is_some());
        assert!(json.get("createdAt").is_none());
    }
}
