use actix_web::FromRequest;
use actix_web::{HttpRequest, dev::Payload, web};
use sea_orm::DatabaseConnection;
use std::future::Future;
use std::pin::Pin;

use crate::auth::authorization::Actor;
use crate::auth::jwt::TokenVerifier;
use crate::cache::{CacheData, tags};
use crate::db::profiles::find_or_create_from_auth;
use crate::errors::AppError;
use crate::models::profiles::{self, CreateProfileFromAuth};

/// The caller's profile, created on first sight from the token claims.
pub struct AuthenticatedUser(pub profiles::Model);

impl AuthenticatedUser {
    pub fn actor(&self) -> Actor {
        Actor::from(&self.0)
    }
}

pub fn bearer_token(req: &HttpRequest) -> Result<&str, AppError> {
    let header = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(AppError::unauthenticated)?;

    header.strip_prefix("Bearer ").ok_or_else(|| {
        AppError::Authentication("Authorization header must be: Bearer <token>".to_string())
    })
}

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let req = req.clone();

        Box::pin(async move {
            let token = bearer_token(&req)?;

            let verifier = req
                .app_data::<web::Data<TokenVerifier>>()
                .ok_or_else(|| AppError::Internal("Token verifier not configured".to_string()))?;

            let claims = verifier
                .verify(token)
                .await
                .map_err(|e| AppError::Authentication(format!("Invalid token: {e}")))?;

            let id = claims.user_id().map_err(AppError::Authentication)?;
            let email = claims
                .user_email()
                .ok_or_else(|| AppError::Authentication("No email in token claims".to_string()))?;

            let db = req
                .app_data::<web::Data<DatabaseConnection>>()
                .ok_or_else(|| AppError::Internal("Database not configured".to_string()))?;

            let (profile, created) = find_or_create_from_auth(
                db.get_ref(),
                CreateProfileFromAuth {
                    id,
                    email,
                    full_name: claims.display_name(),
                    avatar_url: claims.avatar_url(),
                    role: claims.requested_role(),
                },
            )
            .await?;

            if created {
                tracing::info!(profile_id = %profile.id, role = profile.role.as_str(), "Profile created");
                if let Some(cache) = req.app_data::<web::Data<CacheData>>() {
                    cache.invalidate_tags(&[tags::PROFILES, tags::STATS]);
                }
            }

            Ok(AuthenticatedUser(profile))
        })
    }
}
