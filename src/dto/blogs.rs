use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entity::blogs::Model as BlogModel,
    error::{AppError, AppResult},
    form::{FileRule, FormData, MIB},
    services::product_intake::{normalize_list, parse_flag},
    slug::slugify,
};

pub const REQUIRED_BLOG_FIELDS: [&str; 3] = ["title", "content", "author"];

pub const BLOG_BODY_LIMIT: usize = 11 * MIB;

pub const BLOG_FILES: [FileRule; 1] = [FileRule {
    field: "image",
    mime_prefix: "image/",
    max_bytes: 10 * MIB,
    max_count: 1,
}];

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BlogResponse {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub author: String,
    pub tags: Vec<String>,
    pub cover_image: Option<String>,
    pub published: bool,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<BlogModel> for BlogResponse {
    fn from(model: BlogModel) -> Self {
        Self {
            id: model.id,
            title: model.title,
            slug: model.slug,
            excerpt: model.excerpt,
            content: model.content,
            author: model.author,
            tags: model.tags,
            cover_image: model.cover_image,
            published: model.published,
            seo_title: model.seo_title,
            seo_description: model.seo_description,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(transparent)]
pub struct BlogList {
    #[schema(value_type = Vec<BlogResponse>)]
    pub items: Vec<BlogResponse>,
}

/// Multipart body for blog create and update.
#[allow(dead_code)]
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BlogMultipartForm {
    pub title: String,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    pub content: String,
    pub author: String,
    pub tags: Option<Vec<String>>,
    pub published: Option<String>,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
    #[schema(value_type = Option<String>, format = Binary)]
    pub image: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlogFields {
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub author: String,
    pub tags: Vec<String>,
    pub cover_image: Option<String>,
    pub published: bool,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
}

impl From<&BlogModel> for BlogFields {
    fn from(model: &BlogModel) -> Self {
        Self {
            title: model.title.clone(),
            slug: model.slug.clone(),
            excerpt: model.excerpt.clone(),
            content: model.content.clone(),
            author: model.author.clone(),
            tags: model.tags.clone(),
            cover_image: model.cover_image.clone(),
            published: model.published,
            seo_title: model.seo_title.clone(),
            seo_description: model.seo_description.clone(),
        }
    }
}

fn owned(form: &FormData, name: &str) -> Option<String> {
    form.text(name).map(str::to_string)
}

fn slug_from(raw: &str) -> AppResult<String> {
    let slug = slugify(raw);
    if slug.is_empty() {
        return Err(AppError::BadRequest(format!(
            "Cannot derive a slug from '{raw}'"
        )));
    }
    Ok(slug)
}

/// Titles with no ASCII letters or digits (Devanagari, for one) still get a
/// unique slug.
fn slug_from_title(title: &str) -> String {
    let slug = slugify(title);
    if slug.is_empty() {
        let id = Uuid::new_v4().simple().to_string();
        return format!("post-{}", &id[..12]);
    }
    slug
}

impl BlogFields {
    /// Posts are published unless the form says otherwise.
    pub fn from_create_form(form: &FormData) -> AppResult<Self> {
        let missing = form.missing(&REQUIRED_BLOG_FIELDS);
        if !missing.is_empty() {
            return Err(AppError::MissingFields(missing));
        }

        let title = owned(form, "title").unwrap_or_default();
        let slug = match form.text("slug") {
            Some(slug) => slug_from(slug)?,
            None => slug_from_title(&title),
        };

        Ok(Self {
            slug,
            excerpt: owned(form, "excerpt"),
            content: owned(form, "content").unwrap_or_default(),
            author: owned(form, "author").unwrap_or_default(),
            tags: normalize_list(form.values("tags")),
            cover_image: None,
            published: form.text("published").and_then(parse_flag).unwrap_or(true),
            seo_title: owned(form, "seoTitle"),
            seo_description: owned(form, "seoDescription"),
            title,
        })
    }

    /// Applies the fields present in an update form. An explicit `slug` wins;
    /// otherwise a changed title re-derives it.
    pub fn patch(mut self, form: &FormData) -> AppResult<Self> {
        if let Some(title) = owned(form, "title") {
            if title != self.title && form.text("slug").is_none() {
                self.slug = slug_from_title(&title);
            }
            self.title = title;
        }
        if let Some(slug) = form.text("slug") {
            self.slug = slug_from(slug)?;
        }
        if form.contains("excerpt") {
            self.excerpt = owned(form, "excerpt");
        }
        if let Some(content) = owned(form, "content") {
            self.content = content;
        }
        if let Some(author) = owned(form, "author") {
            self.author = author;
        }
        if form.contains("tags") {
            self.tags = normalize_list(form.values("tags"));
        }
        if let Some(published) = form.text("published").and_then(parse_flag) {
            self.published = published;
        }
        if form.contains("seoTitle") {
            self.seo_title = owned(form, "seoTitle");
        }
        if form.contains("seoDescription") {
            self.seo_description = owned(form, "seoDescription");
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> FormData {
        let mut form = FormData::default();
        for (name, value) in pairs {
            form.push_text(name, *value);
        }
        form
    }

    #[test]
    fn create_requires_title_content_and_author() {
        match BlogFields::from_create_form(&form(&[("title", "Bowls")])) {
            Err(AppError::MissingFields(fields)) => assert_eq!(fields, vec!["content", "author"]),
            other => panic!("expected missing fields, got {other:?}"),
        }
    }

    #[test]
    fn slug_comes_from_title_unless_given() {
        let base = [
            ("title", "Caring for Your Singing Bowl"),
            ("content", "Dust it."),
            ("author", "Mira"),
        ];
        let fields = BlogFields::from_create_form(&form(&base)).unwrap();
        assert_eq!(fields.slug, "caring-for-your-singing-bowl");
        assert!(fields.published);

        let mut explicit = base.to_vec();
        explicit.push(("slug", "Bowl Care"));
        explicit.push(("published", "false"));
        explicit.push(("tags", r#"["care", " bowls "]"#));
        let fields = BlogFields::from_create_form(&form(&explicit)).unwrap();
        assert_eq!(fields.slug, "bowl-care");
        assert!(!fields.published);
        assert_eq!(fields.tags, vec!["care", "bowls"]);
    }

    #[test]
    fn patch_keeps_untouched_fields() {
        let original = BlogFields::from_create_form(&form(&[
            ("title", "Sound Baths"),
            ("content", "Long read"),
            ("author", "Mira"),
            ("excerpt", "Short"),
            ("tags", "sound"),
        ]))
        .unwrap();

        let patched = original
            .clone()
            .patch(&form(&[("title", "Sound Baths at Home"), ("excerpt", "")]))
            .unwrap();
        assert_eq!(patched.slug, "sound-baths-at-home");
        assert_eq!(patched.excerpt, None);
        assert_eq!(patched.content, original.content);
        assert_eq!(patched.tags, original.tags);
    }

    #[test]
    fn unsluggable_explicit_slug_is_rejected() {
        let result = BlogFields::from_create_form(&form(&[
            ("title", "Bowls"),
            ("slug", "!!!"),
            ("content", "x"),
            ("author", "y"),
        ]));
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn non_latin_titles_get_a_generated_slug() {
        let base = [("title", "गायन कटोरा"), ("content", "x"), ("author", "y")];
        let first = BlogFields::from_create_form(&form(&base)).unwrap();
        let second = BlogFields::from_create_form(&form(&base)).unwrap();
        assert!(first.slug.starts_with("post-"), "{}", first.slug);
        assert_eq!(first.slug.len(), "post-".len() + 12);
        assert_ne!(first.slug, second.slug);

        let renamed = first.clone().patch(&form(&[("title", "सफाई")])).unwrap();
        assert!(renamed.slug.starts_with("post-"));
        assert_ne!(renamed.slug, first.slug);
    }
}
