use actix_web::{HttpResponse, web};

use crate::auth::middleware::AuthenticatedUser;
use crate::errors::AppResult;
use crate::validation::upload::{UploadInput, UploadPolicy};
use crate::validation;

/// POST /api/uploads/check: may the caller upload this file? Storage itself
/// is handled by the client against the bucket.
pub async fn check_upload(
    user: AuthenticatedUser,
    policy: web::Data<UploadPolicy>,
    body: web::Json<serde_json::Value>,
) -> AppResult<HttpResponse> {
    let meta = validation::validate::<UploadInput>(&body)?;
    meta.check(policy.get_ref())?;

    tracing::debug!(profile_id = %user.0.id, filename = %meta.filename, "Upload accepted");
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "valid": true,
        "filename": meta.filename,
        "content_type": meta.content_type,
        "size": meta.size,
    })))
}
