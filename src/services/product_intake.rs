//! Turns loosely typed multipart product submissions into validated fields.
//!
//! Every text field arrives as a string. Required fields are checked as a
//! group so one response can name all of them, numbers are coerced, list
//! fields are flattened and image bookkeeping is done before any upload
//! starts.

use std::str::FromStr;

use crate::{
    entity::products::Model as ProductModel,
    error::{AppError, AppResult},
    form::{FileRule, FormData, MIB},
};

pub const REQUIRED_PRODUCT_FIELDS: [&str; 7] =
    ["id", "name", "price", "description", "category", "type", "brand"];

/// Product decision: a listing never shows an empty details section.
pub const DEFAULT_DETAIL: &str = "Handcrafted by skilled artisans";
/// Product decision: a listing never shows an empty care section.
pub const DEFAULT_CARE_INSTRUCTION: &str = "Wipe clean with a soft, dry cloth";

pub const MAX_IMAGES: usize = 5;

/// Largest accepted product submission: every file at its cap plus room for text fields.
pub const PRODUCT_BODY_LIMIT: usize = MAX_IMAGES * 10 * MIB + 50 * MIB + MIB;

pub const PRODUCT_FILES: [FileRule; 2] = [
    FileRule {
        field: "images",
        mime_prefix: "image/",
        max_bytes: 10 * MIB,
        max_count: MAX_IMAGES,
    },
    FileRule {
        field: "video",
        mime_prefix: "video/",
        max_bytes: 50 * MIB,
        max_count: 1,
    },
];

/// Validated, storable product attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductFields {
    pub sku: String,
    pub name: String,
    pub price: f64,
    pub size: Option<String>,
    pub tone: Option<String>,
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
}

impl From<&ProductModel> for ProductFields {
    fn from(model: &ProductModel) -> Self {
        Self {
            sku: model.sku.clone(),
            name: model.name.clone(),
            price: model.price,
            size: model.size.clone(),
            tone: model.tone.clone(),
            product_type: model.product_type.clone(),
            category: model.category.clone(),
            brand: model.brand.clone(),
            images: model.images.clone(),
            video: model.video.clone(),
            audio: model.audio.clone(),
            description: model.description.clone(),
            details: model.details.clone(),
            care_instructions: model.care_instructions.clone(),
            in_stock: model.in_stock,
            rating: model.rating,
            review_count: model.review_count,
            seo_title: model.seo_title.clone(),
            seo_description: model.seo_description.clone(),
            seo_keywords: model.seo_keywords.clone(),
        }
    }
}

impl ProductFields {
    /// Validate a create submission. `new_images` is the number of image files
    /// attached; together with `existingImages` there must be at least one.
    pub fn from_create_form(form: &FormData, new_images: usize) -> AppResult<Self> {
        let missing = form.missing(&REQUIRED_PRODUCT_FIELDS);
        if !missing.is_empty() {
            return Err(AppError::MissingFields(missing));
        }

        let price = parse_price(required(form, "price")?)?;
        let images = normalize_list(form.values("existingImages"));
        check_image_count(images.len() + new_images)?;
        if images.len() + new_images == 0 {
            return Err(AppError::BadRequest("At least one product image is required".into()));
        }

        Ok(Self {
            sku: required(form, "id")?.to_string(),
            name: required(form, "name")?.to_string(),
            price,
            size: optional(form, "size"),
            tone: optional(form, "tone"),
            product_type: required(form, "type")?.to_string(),
            category: required(form, "category")?.to_string(),
            brand: required(form, "brand")?.to_string(),
            images,
            video: optional(form, "video"),
            audio: optional(form, "audio"),
            description: required(form, "description")?.to_string(),
            details: list_or_default(form.values("details"), DEFAULT_DETAIL),
            care_instructions: list_or_default(
                form.values("careInstructions"),
                DEFAULT_CARE_INSTRUCTION,
            ),
            in_stock: form.text("inStock").and_then(parse_flag).unwrap_or(true),
            rating: form.text("rating").and_then(parse_rating).unwrap_or(0.0),
            review_count: form.text("reviewCount").and_then(parse_count).unwrap_or(0),
            seo_title: optional(form, "seoTitle"),
            seo_description: optional(form, "seoDescription"),
            seo_keywords: optional(form, "seoKeywords"),
        })
    }

    /// Attach the URLs returned by the media store. Uploaded images follow the
    /// ones already referenced; an uploaded video replaces a video URL field.
    pub fn attach_media(&mut self, uploaded_images: Vec<String>, uploaded_video: Option<String>) {
        self.images.extend(uploaded_images);
        if uploaded_video.is_some() {
            self.video = uploaded_video;
        }
    }
}

/// A partial update. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductPatch {
    pub sku: Option<String>,
    pub name: Option<String>,
    pub price: Option<f64>,
    pub size: Option<String>,
    pub tone: Option<String>,
    pub product_type: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub existing_images: Option<Vec<String>>,
    pub video: Option<String>,
    pub audio: Option<String>,
    pub description: Option<String>,
    pub details: Option<Vec<String>>,
    pub care_instructions: Option<Vec<String>>,
    pub in_stock: Option<bool>,
    pub rating: Option<f64>,
    pub review_count: Option<i32>,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
    pub seo_keywords: Option<String>,
}

impl ProductPatch {
    pub fn from_form(form: &FormData, new_images: usize) -> AppResult<Self> {
        let price = form.text("price").map(parse_price).transpose()?;
        let existing_images = form
            .contains("existingImages")
            .then(|| normalize_list(form.values("existingImages")));
        check_image_count(existing_images.as_ref().map_or(0, Vec::len) + new_images)?;

        Ok(Self {
            sku: optional(form, "id"),
            name: optional(form, "name"),
            price,
            size: optional(form, "size"),
            tone: optional(form, "tone"),
            product_type: optional(form, "type"),
            category: optional(form, "category"),
            brand: optional(form, "brand"),
            existing_images,
            video: optional(form, "video"),
            audio: optional(form, "audio"),
            description: optional(form, "description"),
            details: form
                .contains("details")
                .then(|| list_or_default(form.values("details"), DEFAULT_DETAIL)),
            care_instructions: form.contains("careInstructions").then(|| {
                list_or_default(form.values("careInstructions"), DEFAULT_CARE_INSTRUCTION)
            }),
            in_stock: form.text("inStock").and_then(parse_flag),
            rating: form.text("rating").and_then(parse_rating),
            review_count: form.text("reviewCount").and_then(parse_count),
            seo_title: optional(form, "seoTitle"),
            seo_description: optional(form, "seoDescription"),
            seo_keywords: optional(form, "seoKeywords"),
        })
    }

    /// Merge onto the stored fields. Images become `existingImages` followed by
    /// the new uploads; when that is empty the stored images stay.
    pub fn apply(
        self,
        current: ProductFields,
        uploaded_images: Vec<String>,
        uploaded_video: Option<String>,
    ) -> ProductFields {
        let mut images = self.existing_images.unwrap_or_default();
        images.extend(uploaded_images);
        let images = if images.is_empty() {
            current.images
        } else {
            images
        };

        ProductFields {
            sku: self.sku.unwrap_or(current.sku),
            name: self.name.unwrap_or(current.name),
            price: self.price.unwrap_or(current.price),
            size: self.size.or(current.size),
            tone: self.tone.or(current.tone),
            product_type: self.product_type.unwrap_or(current.product_type),
            category: self.category.unwrap_or(current.category),
            brand: self.brand.unwrap_or(current.brand),
            images,
            video: uploaded_video.or(self.video).or(current.video),
            audio: self.audio.or(current.audio),
            description: self.description.unwrap_or(current.description),
            details: self.details.unwrap_or(current.details),
            care_instructions: self.care_instructions.unwrap_or(current.care_instructions),
            in_stock: self.in_stock.unwrap_or(current.in_stock),
            rating: self.rating.unwrap_or(current.rating),
            review_count: self.review_count.unwrap_or(current.review_count),
            seo_title: self.seo_title.or(current.seo_title),
            seo_description: self.seo_description.or(current.seo_description),
            seo_keywords: self.seo_keywords.or(current.seo_keywords),
        }
    }
}

fn required<'a>(form: &'a FormData, name: &str) -> AppResult<&'a str> {
    form.text(name)
        .ok_or_else(|| AppError::MissingFields(vec![name.to_string()]))
}

fn optional(form: &FormData, name: &str) -> Option<String> {
    form.text(name).map(str::to_owned)
}

fn check_image_count(count: usize) -> AppResult<()> {
    if count > MAX_IMAGES {
        return Err(AppError::BadRequest(format!(
            "A product can have at most {MAX_IMAGES} images"
        )));
    }
    Ok(())
}

/// Price must be a finite number greater than zero.
pub fn parse_price(raw: &str) -> AppResult<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|price| price.is_finite() && *price > 0.0)
        .ok_or_else(|| AppError::BadRequest(format!("Invalid price '{raw}': must be a positive number")))
}

fn parse_lenient<T: FromStr>(raw: &str) -> Option<T> {
    raw.trim().parse::<T>().ok()
}

fn parse_rating(raw: &str) -> Option<f64> {
    parse_lenient::<f64>(raw)
        .filter(|rating| rating.is_finite())
        .map(|rating| rating.clamp(0.0, 5.0))
}

fn parse_count(raw: &str) -> Option<i32> {
    parse_lenient::<i32>(raw).map(|count| count.max(0))
}

pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Flatten submitted values into trimmed, non-blank entries. A value holding a
/// JSON array of strings contributes each element.
pub fn normalize_list(values: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    for value in values {
        let value = value.trim();
        if value.starts_with('[') {
            if let Ok(items) = serde_json::from_str::<Vec<String>>(value) {
                out.extend(
                    items
                        .into_iter()
                        .map(|item| item.trim().to_string())
                        .filter(|item| !item.is_empty()),
                );
                continue;
            }
        }
        if !value.is_empty() {
            out.push(value.to_string());
        }
    }
    out
}

fn list_or_default(values: &[String], default: &str) -> Vec<String> {
    let list = normalize_list(values);
    if list.is_empty() {
        tracing::debug!(default, "empty list field, using product default");
        return vec![default.to_string()];
    }
    list
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_form() -> FormData {
        let mut form = FormData::default();
        for (name, value) in [
            ("id", "bowl-7-chakra"),
            ("name", "Seven Chakra Bowl"),
            ("price", "129.50"),
            ("description", "Hand hammered bronze"),
            ("category", "singing-bowls"),
            ("type", "bowl"),
            ("brand", "Himalaya Sound"),
        ] {
            form.push_text(name, value);
        }
        form
    }

    #[test]
    fn all_missing_fields_are_collected() {
        let mut form = FormData::default();
        form.push_text("name", "Bowl");
        form.push_text("brand", "  ");
        match ProductFields::from_create_form(&form, 1).unwrap_err() {
            AppError::MissingFields(fields) => assert_eq!(
                fields,
                ["id", "price", "description", "category", "type", "brand"]
            ),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn price_must_be_positive_and_finite() {
        assert_eq!(parse_price(" 42.5 ").unwrap(), 42.5);
        for bad in ["0", "-3", "abc", "NaN", "inf"] {
            assert!(parse_price(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn rating_and_review_count_fall_back_to_zero() {
        let mut form = complete_form();
        form.push_text("rating", "great");
        form.push_text("reviewCount", "many");
        let fields = ProductFields::from_create_form(&form, 1).unwrap();
        assert_eq!(fields.rating, 0.0);
        assert_eq!(fields.review_count, 0);

        let mut form = complete_form();
        form.push_text("rating", "7.5");
        let fields = ProductFields::from_create_form(&form, 1).unwrap();
        assert_eq!(fields.rating, 5.0);
    }

    #[test]
    fn create_requires_an_image() {
        let form = complete_form();
        assert!(matches!(
            ProductFields::from_create_form(&form, 0),
            Err(AppError::BadRequest(_))
        ));

        let mut form = complete_form();
        form.push_text("existingImages", "https://cdn.test/a.jpg");
        let fields = ProductFields::from_create_form(&form, 0).unwrap();
        assert_eq!(fields.images, ["https://cdn.test/a.jpg"]);
        assert!(ProductFields::from_create_form(&form, MAX_IMAGES).is_err());
    }

    #[test]
    fn lists_accept_single_repeated_and_json_values() {
        assert_eq!(
            normalize_list(&["  Hand hammered ".into()]),
            ["Hand hammered"]
        );
        assert_eq!(
            normalize_list(&["[\"Seven metals\", \" \", \"Tuned to F\"]".into(), "".into()]),
            ["Seven metals", "Tuned to F"]
        );
        assert_eq!(
            list_or_default(&["   ".into()], DEFAULT_DETAIL),
            [DEFAULT_DETAIL]
        );
    }

    #[test]
    fn create_fills_defaults_for_empty_lists() {
        let mut form = complete_form();
        form.push_text("details", "[]");
        let fields = ProductFields::from_create_form(&form, 1).unwrap();
        assert_eq!(fields.details, [DEFAULT_DETAIL]);
        assert_eq!(fields.care_instructions, [DEFAULT_CARE_INSTRUCTION]);
        assert!(fields.in_stock);
        assert_eq!(fields.price, 129.5);
    }

    #[test]
    fn uploaded_media_follows_existing_images() {
        let mut form = complete_form();
        form.push_text("existingImages", "https://cdn.test/old.jpg");
        form.push_text("video", "https://cdn.test/old.mp4");
        let mut fields = ProductFields::from_create_form(&form, 2).unwrap();
        fields.attach_media(
            vec!["https://cdn.test/1.jpg".into(), "https://cdn.test/2.jpg".into()],
            Some("https://cdn.test/new.mp4".into()),
        );
        assert_eq!(
            fields.images,
            ["https://cdn.test/old.jpg", "https://cdn.test/1.jpg", "https://cdn.test/2.jpg"]
        );
        assert_eq!(fields.video.as_deref(), Some("https://cdn.test/new.mp4"));
    }

    #[test]
    fn patch_keeps_unset_fields() {
        let current = ProductFields::from_create_form(
            &{
                let mut form = complete_form();
                form.push_text("existingImages", "https://cdn.test/a.jpg");
                form.push_text("rating", "4.5");
                form
            },
            0,
        )
        .unwrap();

        let mut form = FormData::default();
        form.push_text("name", "Seven Chakra Bowl (Large)");
        form.push_text("rating", "n/a");
        form.push_text("inStock", "false");
        let updated = ProductPatch::from_form(&form, 0)
            .unwrap()
            .apply(current.clone(), Vec::new(), None);

        assert_eq!(updated.name, "Seven Chakra Bowl (Large)");
        assert_eq!(updated.price, current.price);
        assert_eq!(updated.rating, 4.5);
        assert!(!updated.in_stock);
        assert_eq!(updated.images, current.images);
        assert_eq!(updated.details, current.details);
    }

    #[test]
    fn patch_combines_existing_and_uploaded_images() {
        let current = ProductFields {
            images: vec!["https://cdn.test/a.jpg".into(), "https://cdn.test/b.jpg".into()],
            ..ProductFields::from_create_form(&complete_form(), 1).unwrap()
        };

        let mut form = FormData::default();
        form.push_text("existingImages", "[\"https://cdn.test/b.jpg\"]");
        let updated = ProductPatch::from_form(&form, 1)
            .unwrap()
            .apply(current, vec!["https://cdn.test/c.jpg".into()], None);
        assert_eq!(updated.images, ["https://cdn.test/b.jpg", "https://cdn.test/c.jpg"]);
    }

    #[test]
    fn patch_rejects_bad_price_when_present() {
        let mut form = FormData::default();
        form.push_text("price", "free");
        assert!(ProductPatch::from_form(&form, 0).is_err());
    }
}
