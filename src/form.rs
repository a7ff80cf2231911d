use std::collections::HashMap;

use axum::extract::{Multipart, multipart::Field};

use crate::{
    error::{AppError, AppResult},
    media::MediaUpload,
};

pub const MIB: usize = 1024 * 1024;

/// Constraints for one file field of a multipart form.
#[derive(Debug, Clone, Copy)]
pub struct FileRule {
    pub field: &'static str,
    pub mime_prefix: &'static str,
    pub max_bytes: usize,
    pub max_count: usize,
}

/// Text fields and accepted files of a multipart submission.
///
/// Field names are stored without a trailing `[]`, so `images[]` and
/// `images` land in the same slot.
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, Vec<String>>,
    files: HashMap<&'static str, Vec<MediaUpload>>,
}

impl FormData {
    pub fn push_text(&mut self, name: &str, value: impl Into<String>) {
        self.fields
            .entry(normalize_name(name).to_string())
            .or_default()
            .push(value.into());
    }

    pub fn push_file(&mut self, rule: &FileRule, upload: MediaUpload) -> AppResult<()> {
        let slot = self.files.entry(rule.field).or_default();
        if slot.len() >= rule.max_count {
            return Err(AppError::BadRequest(format!(
                "Too many files for '{}': at most {} allowed",
                rule.field, rule.max_count
            )));
        }
        slot.push(upload);
        Ok(())
    }

    /// First value of a field, trimmed; blank values count as absent.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .and_then(|values| values.first())
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// Every value submitted under a field name, in submission order.
    pub fn values(&self, name: &str) -> &[String] {
        self.fields.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn take_files(&mut self, field: &str) -> Vec<MediaUpload> {
        self.files.remove(field).unwrap_or_default()
    }

    /// Names from `required` that are absent or blank, in the given order.
    pub fn missing(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|name| self.text(name).is_none())
            .map(|name| name.to_string())
            .collect()
    }
}

fn normalize_name(name: &str) -> &str {
    name.strip_suffix("[]").unwrap_or(name)
}

/// Read a whole multipart body, enforcing the file rules as bytes arrive.
pub async fn read_form(mut multipart: Multipart, rules: &[FileRule]) -> AppResult<FormData> {
    let mut form = FormData::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        let name = field.name().map(normalize_name).unwrap_or_default().to_string();
        if name.is_empty() {
            continue;
        }

        match field.file_name().map(str::to_owned) {
            Some(file_name) => {
                let rule = rules
                    .iter()
                    .find(|rule| rule.field == name)
                    .ok_or_else(|| AppError::BadRequest(format!("Unexpected file field '{name}'")))?;
                let upload = read_file(field, rule, file_name).await?;
                form.push_file(rule, upload)?;
            }
            None => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                form.push_text(&name, value);
            }
        }
    }

    Ok(form)
}

async fn read_file(mut field: Field<'_>, rule: &FileRule, file_name: String) -> AppResult<MediaUpload> {
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    if !content_type.starts_with(rule.mime_prefix) {
        return Err(AppError::BadRequest(format!(
            "'{file_name}' has type {content_type}, expected {}*",
            rule.mime_prefix
        )));
    }

    let mut buf = Vec::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if buf.len() + chunk.len() > rule.max_bytes {
            return Err(AppError::BadRequest(format!(
                "'{file_name}' exceeds the {} MiB limit for '{}'",
                rule.max_bytes / MIB,
                rule.field
            )));
        }
        buf.extend_from_slice(&chunk);
    }

    Ok(MediaUpload {
        file_name,
        content_type,
        bytes: buf.into(),
    })
}

#[cfg(test)]
mod tests {
    use axum::body::Bytes;

    use super::*;

    const IMAGES: FileRule = FileRule {
        field: "images",
        mime_prefix: "image/",
        max_bytes: MIB,
        max_count: 2,
    };

    fn image() -> MediaUpload {
        MediaUpload {
            file_name: "a.png".into(),
            content_type: "image/png".into(),
            bytes: Bytes::from_static(b"png"),
        }
    }

    #[test]
    fn bracketed_names_share_a_slot() {
        let mut form = FormData::default();
        form.push_text("details[]", "Hand hammered");
        form.push_text("details", "Seven metals");
        assert_eq!(form.values("details"), ["Hand hammered", "Seven metals"]);
    }

    #[test]
    fn blank_values_are_reported_missing_in_order() {
        let mut form = FormData::default();
        form.push_text("name", "Bowl");
        form.push_text("price", "   ");
        assert_eq!(form.missing(&["id", "name", "price"]), ["id", "price"]);
        assert!(form.contains("price"));
        assert_eq!(form.text("price"), None);
    }

    #[test]
    fn file_count_is_capped() {
        let mut form = FormData::default();
        form.push_file(&IMAGES, image()).unwrap();
        form.push_file(&IMAGES, image()).unwrap();
        assert!(matches!(
            form.push_file(&IMAGES, image()),
            Err(AppError::BadRequest(_))
        ));
        assert_eq!(form.take_files("images").len(), 2);
        assert!(form.take_files("images").is_empty());
    }
}
