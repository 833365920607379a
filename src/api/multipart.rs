// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-request multipart parsing for candidate images.

use std::collections::HashMap;

use axum::extract::Multipart;

use crate::error::ApiError;
use crate::storage::ImageUpload;

/// Name of the multipart part carrying the image.
pub const FILE_FIELD: &str = "file";

/// Text fields and the optional image of one multipart request.
#[derive(Debug, Default)]
pub struct ImageForm {
    fields: HashMap<String, String>,
    pub file: Option<ImageUpload>,
}

impl ImageForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = ImageForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if name == FILE_FIELD {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(e.body_text()))?;
                form.file = Some(ImageUpload {
                    file_name,
                    bytes: bytes.to_vec(),
                });
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(e.body_text()))?;
                form.fields.insert(name, value);
            }
        }
        Ok(form)
    }

    /// Trimmed, non-empty text field.
    pub fn text(&self, name: &'static str) -> Result<String, ApiError> {
        match self.fields.get(name).map(|v| v.trim()) {
            Some(value) if !value.is_empty() => Ok(value.to_string()),
            _ => Err(ApiError::bad_request(format!("{name} is required"))),
        }
    }

    pub fn number(&self, name: &'static str) -> Result<u64, ApiError> {
        self.text(name)?
            .parse()
            .map_err(|_| ApiError::bad_request(format!("{name} must be a number")))
    }

    pub fn require_file(&mut self) -> Result<ImageUpload, ApiError> {
        self.file
            .take()
            .ok_or_else(|| ApiError::bad_request("Please add an image first"))
    }

    #[cfg(test)]
    pub(crate) fn from_parts(fields: &[(&str, &str)], file: Option<ImageUpload>) -> Self {
        Self {
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            file,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_fields_are_trimmed_and_required() {
        let form = ImageForm::from_parts(&[("designation", "  Green "), ("blank", " ")], None);
        assert_eq!(form.text("designation").unwrap(), "Green");
        assert!(form.text("blank").is_err());
        assert!(form.text("missing").is_err());
    }

    #[test]
    fn numbers_and_files() {
        let mut form = ImageForm::from_parts(&[("candidate_id", "12"), ("bad", "x")], None);
        assert_eq!(form.number("candidate_id").unwrap(), 12);
        assert!(form.number("bad").is_err());
        let err = form.require_file().unwrap_err();
        assert_eq!(err.message, "Please add an image first");
    }
}
