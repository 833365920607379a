// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Candidate image storage under the public directory.
//!
//! Each request carries its own [`ImageUpload`]; nothing is buffered between
//! requests. Files are named `<unix_millis>-<sanitized original name>`.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

/// Largest accepted image.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Image is empty")]
    Empty,

    #[error("Image exceeds {MAX_IMAGE_BYTES} bytes")]
    TooLarge,

    #[error("Unsupported image type: {0}")]
    UnsupportedType(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// One uploaded file taken from a multipart request.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Reject empty, oversized or non-image uploads.
    pub fn validate(&self) -> Result<(), UploadError> {
        if self.bytes.is_empty() {
            return Err(UploadError::Empty);
        }
        if self.bytes.len() > MAX_IMAGE_BYTES {
            return Err(UploadError::TooLarge);
        }
        let extension = Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(UploadError::UnsupportedType(extension));
        }
        Ok(())
    }
}

/// Writes uploads into the directory served at `/public`.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Validate and persist an upload, returning the stored file name.
    pub async fn save(&self, upload: &ImageUpload) -> Result<String, UploadError> {
        upload.validate()?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let base = sanitize_file_name(&upload.file_name);
        let mut stamp = chrono::Utc::now().timestamp_millis();
        loop {
            let name = format!("{stamp}-{base}");
            let path = self.dir.join(&name);
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    file.write_all(&upload.bytes).await?;
                    file.flush().await?;
                    return Ok(name);
                }
                // Same name within the same millisecond
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => stamp += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Remove a stored file. Missing files are ignored.
    pub async fn remove(&self, name: &str) -> Result<(), UploadError> {
        match tokio::fs::remove_file(self.dir.join(sanitize_file_name(name))).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Strip directories and anything outside `[A-Za-z0-9._-]`.
fn sanitize_file_name(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(name: &str) -> ImageUpload {
        ImageUpload {
            file_name: name.to_string(),
            bytes: vec![0x89, b'P', b'N', b'G'],
        }
    }

    #[test]
    fn sanitize_strips_paths_and_odd_characters() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\photos\\me.png"), "me.png");
        assert_eq!(sanitize_file_name("my photo (1).png"), "my_photo__1_.png");
        assert_eq!(sanitize_file_name(".hidden.png"), "hidden.png");
        assert_eq!(sanitize_file_name("..."), "upload");
    }

    #[test]
    fn validation_rules() {
        assert!(png("a.PNG").validate().is_ok());
        assert!(matches!(png("a.exe").validate(), Err(UploadError::UnsupportedType(_))));
        let empty = ImageUpload {
            file_name: "a.png".into(),
            bytes: vec![],
        };
        assert!(matches!(empty.validate(), Err(UploadError::Empty)));
        let big = ImageUpload {
            file_name: "a.png".into(),
            bytes: vec![0; MAX_IMAGE_BYTES + 1],
        };
        assert!(matches!(big.validate(), Err(UploadError::TooLarge)));
    }

    #[tokio::test]
    async fn concurrent_names_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path().join("public"));

        let a = store.save(&png("photo.png")).await.unwrap();
        let b = store.save(&png("photo.png")).await.unwrap();
        assert_ne!(a, b);
        assert!(a.ends_with("-photo.png"));
        assert!(store.dir().join(&a).exists());

        store.remove(&a).await.unwrap();
        assert!(!store.dir().join(&a).exists());
        store.remove(&a).await.unwrap();
    }
}
