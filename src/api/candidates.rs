// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Candidate self-service profile.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;

use crate::{
    api::multipart::ImageForm,
    auth::CandidateOnly,
    error::ApiError,
    models::{respond, Envelope},
    state::AppState,
    storage::{CandidateProfile, CandidateRepository},
};

/// Store the calling candidate's party, bio and optional image.
///
/// Multipart fields: `designation`, `description`, optional `file`.
#[utoipa::path(
    post,
    path = "/v1/candidates/profile",
    tag = "Candidates",
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Profile created", body = CandidateProfile),
        (status = 400, description = "Missing field or bad image"),
        (status = 403, description = "Not a candidate or blocked"),
        (status = 409, description = "Profile already exists")
    )
)]
pub async fn create_profile(
    CandidateOnly(user): CandidateOnly,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Envelope<CandidateProfile>>), ApiError> {
    let form = ImageForm::read(multipart).await?;
    let profile = save_profile(&state, user.user_id, form).await?;
    Ok((
        StatusCode::CREATED,
        respond("Candidate description added successfully", profile),
    ))
}

pub(crate) async fn save_profile(
    state: &AppState,
    user_id: u64,
    form: ImageForm,
) -> Result<CandidateProfile, ApiError> {
    let designation = form.text("designation")?;
    let description = form.text("description")?;

    let candidates = CandidateRepository::new(&state.db);
    if candidates.profile(user_id)?.is_some() {
        return Err(ApiError::conflict("Candidate description already exist"));
    }

    let image = match &form.file {
        Some(upload) => Some(state.uploads.save(upload).await?),
        None => None,
    };

    let profile = CandidateProfile {
        user_id,
        designation,
        description,
        image: image.clone(),
        created_at: Utc::now(),
    };
    if let Err(e) = candidates.create_profile(&profile) {
        if let Some(name) = image {
            if let Err(remove) = state.uploads.remove(&name).await {
                tracing::warn!(error = %remove, file = %name, "Failed to remove orphaned upload");
            }
        }
        return Err(e.into());
    }

    tracing::info!(user_id, "Candidate profile created");
    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::state::test_support::{seed_account, test_context};
    use crate::storage::ImageUpload;

    fn form(with_file: bool) -> ImageForm {
        let file = with_file.then(|| ImageUpload {
            file_name: "me.png".to_string(),
            bytes: vec![1, 2, 3],
        });
        ImageForm::from_parts(&[("designation", "Green"), ("description", "Bio")], file)
    }

    #[tokio::test]
    async fn profile_is_saved_with_image() {
        let ctx = test_context();
        let cand = seed_account(&ctx.state, "cara", Role::Candidate, true);

        let profile = save_profile(&ctx.state, cand.id, form(true)).await.unwrap();
        let image = profile.image.clone().unwrap();
        assert!(image.ends_with("-me.png"));
        assert!(ctx.state.uploads.dir().join(&image).exists());

        let err = save_profile(&ctx.state, cand.id, form(false)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn image_is_optional_but_fields_are_not() {
        let ctx = test_context();
        let cand = seed_account(&ctx.state, "cara", Role::Candidate, true);

        let err = save_profile(&ctx.state, cand.id, ImageForm::from_parts(&[("designation", "Green")], None))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let profile = save_profile(&ctx.state, cand.id, form(false)).await.unwrap();
        assert!(profile.image.is_none());
    }
}
