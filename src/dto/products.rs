use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::products::Model as ProductModel;

/// Product as the storefront sees it. `_id` is the storage identity, `id` the
/// human-readable product id.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    #[serde(rename = "_id")]
    pub storage_id: Uuid,
    pub id: String,
    pub name: String,
    pub price: f64,
    pub size: Option<String>,
    pub tone: Option<String>,
    #[serde(rename = "type")]
    pub product_type: String,
    pub category: String,
    pub brand: String,
    pub images: Vec<String>,
    pub video: Option<String>,
    pub audio: Option<String>,
    pub description: String,
    pub details: Vec<String>,
    pub care_instructions: Vec<String>,
    pub in_stock: bool,
    pub rating: f64,
    pub review_count: i32,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
    pub seo_keywords: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProductModel> for ProductResponse {
    fn from(model: ProductModel) -> Self {
        Self {
            storage_id: model.id,
            id: model.sku,
            name: model.name,
            price: model.price,
            size: model.size,
            tone: model.tone,
            product_type: model.product_type,
            category: model.category,
            brand: model.brand,
            images: model.images,
            video: model.video,
            audio: model.audio,
            description: model.description,
            details: model.details,
            care_instructions: model.care_instructions,
            in_stock: model.in_stock,
            rating: model.rating,
            review_count: model.review_count,
            seo_title: model.seo_title,
            seo_description: model.seo_description,
            seo_keywords: model.seo_keywords,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(transparent)]
pub struct ProductList {
    #[schema(value_type = Vec<ProductResponse>)]
    pub items: Vec<ProductResponse>,
}

/// Multipart body accepted by product create and update. Every text field is
/// sent as a string; list fields may repeat or carry a JSON array.
#[allow(dead_code)]
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductMultipartForm {
    pub id: String,
    pub name: String,
    pub price: String,
    pub size: Option<String>,
    pub tone: Option<String>,
    #[serde(rename = "type")]
    pub product_type: String,
    pub category: String,
    pub brand: String,
    pub description: String,
    pub details: Option<Vec<String>>,
    pub care_instructions: Option<Vec<String>>,
    pub in_stock: Option<String>,
    pub rating: Option<String>,
    pub review_count: Option<String>,
    pub audio: Option<String>,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
    pub seo_keywords: Option<String>,
    pub existing_images: Option<Vec<String>>,
    #[schema(value_type = Vec<String>, format = Binary)]
    pub images: Vec<Vec<u8>>,
    #[schema(value_type = Option<String>, format = Binary)]
    pub video: Option<Vec<u8>>,
}
