use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entity::reviews::Model as ReviewModel,
    error::{AppError, AppResult},
};

pub const MAX_COMMENT_CHARS: usize = 1000;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateReviewRequest {
    pub product_id: Option<String>,
    pub order_id: Option<String>,
    pub rating: Option<i32>,
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateReviewRequest {
    pub rating: Option<i32>,
    pub comment: Option<String>,
}

/// Validated review body.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewDraft {
    pub product_ref: String,
    pub order_id: Uuid,
    pub rating: i32,
    pub comment: String,
}

impl CreateReviewRequest {
    pub fn validate(self) -> AppResult<ReviewDraft> {
        let product_ref = self.product_id.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        let order_id = self.order_id.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        let comment = self.comment.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        let mut missing = Vec::new();
        if product_ref.is_none() {
            missing.push("productId".to_string());
        }
        if order_id.is_none() {
            missing.push("orderId".to_string());
        }
        if self.rating.is_none() {
            missing.push("rating".to_string());
        }
        if comment.is_none() {
            missing.push("comment".to_string());
        }

        match (product_ref, order_id, self.rating, comment) {
            (Some(product_ref), Some(order_id), Some(rating), Some(comment)) => {
                let order_id = Uuid::parse_str(&order_id)
                    .map_err(|_| AppError::BadRequest(format!("Invalid order id '{order_id}'")))?;
                Ok(ReviewDraft {
                    product_ref,
                    order_id,
                    rating: check_rating(rating)?,
                    comment: check_comment(&comment)?,
                })
            }
            _ => Err(AppError::MissingFields(missing)),
        }
    }
}

impl UpdateReviewRequest {
    /// Returns the trimmed comment and rating to write; at least one must be present.
    pub fn validate(self) -> AppResult<(Option<i32>, Option<String>)> {
        let rating = self.rating.map(check_rating).transpose()?;
        let comment = self.comment.map(|c| check_comment(&c)).transpose()?;
        if rating.is_none() && comment.is_none() {
            return Err(AppError::BadRequest(
                "Nothing to update: provide rating or comment".into(),
            ));
        }
        Ok((rating, comment))
    }
}

fn check_rating(rating: i32) -> AppResult<i32> {
    if !(1..=5).contains(&rating) {
        return Err(AppError::BadRequest("Rating must be between 1 and 5".into()));
    }
    Ok(rating)
}

fn check_comment(comment: &str) -> AppResult<String> {
    let comment = comment.trim();
    if comment.is_empty() {
        return Err(AppError::BadRequest("Comment must not be empty".into()));
    }
    if comment.chars().count() > MAX_COMMENT_CHARS {
        return Err(AppError::BadRequest(format!(
            "Comment must be at most {MAX_COMMENT_CHARS} characters"
        )));
    }
    Ok(comment.to_string())
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub order_id: Uuid,
    pub rating: i32,
    pub comment: String,
    pub user_name: String,
    pub product_name: String,
    pub product_image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ReviewModel> for ReviewResponse {
    fn from(model: ReviewModel) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            product_id: model.product_id,
            order_id: model.order_id,
            rating: model.rating,
            comment: model.comment,
            user_name: model.user_name,
            product_name: model.product_name,
            product_image: model.product_image,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(transparent)]
pub struct ReviewList {
    #[schema(value_type = Vec<ReviewResponse>)]
    pub items: Vec<ReviewResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RatingStats {
    pub average_rating: f64,
    pub total_reviews: u64,
    #[schema(value_type = Object)]
    pub rating_breakdown: BTreeMap<u8, u64>,
}

impl RatingStats {
    /// Aggregates star ratings. Every star value 1 to 5 is present in the
    /// breakdown; out-of-range values are ignored.
    pub fn from_ratings(ratings: &[i32]) -> Self {
        let mut rating_breakdown: BTreeMap<u8, u64> = (1..=5).map(|star| (star, 0)).collect();
        let mut sum = 0i64;
        let mut total = 0u64;
        for &rating in ratings {
            if let Ok(star) = u8::try_from(rating) {
                if let Some(count) = rating_breakdown.get_mut(&star) {
                    *count += 1;
                    sum += i64::from(rating);
                    total += 1;
                }
            }
        }

        let average_rating = if total == 0 {
            0.0
        } else {
            (sum as f64 / total as f64 * 10.0).round() / 10.0
        };

        Self {
            average_rating,
            total_reviews: total,
            rating_breakdown,
        }
    }
}
