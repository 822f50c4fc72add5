use actix_web::{HttpResponse, web};
use sea_orm::DatabaseConnection;
use serde::Deserialize;

use crate::auth::authorization::{self as authz, Actor, Permission};
use crate::auth::middleware::AuthenticatedUser;
use crate::cache::{CacheConfig, CacheData, keys, tags};
use crate::db::profiles as profile_db;
use crate::errors::{AppError, AppResult};
use crate::models::profiles::{self, PublicProfile, Role};
use crate::models::{Paginated, PaginationQuery};
use crate::validation::schemas::{AdminUserUpdate, ProfileInput};
use crate::validation::{self, parse_id};

#[derive(Debug, Deserialize)]
pub struct ProfileListQuery {
    pub role: Option<Role>,
    pub search: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

async fn existing(db: &DatabaseConnection, id: uuid::Uuid) -> AppResult<profiles::Model> {
    profile_db::get_profile_by_id(db, id)
        .await?
        .ok_or_else(|| AppError::not_found("Profile not found"))
}

/// A role change moves the per-role counts behind `/stats`.
pub fn affected_tags(before: &profiles::Model, after: &profiles::Model) -> Vec<&'static str> {
    if before.role == after.role {
        vec![tags::PROFILES]
    } else {
        vec![tags::PROFILES, tags::STATS]
    }
}

/// Apply a self-service update, refusing role changes unless the caller may
/// change roles.
async fn apply_profile_update(
    db: &DatabaseConnection,
    actor: &Actor,
    target: &profiles::Model,
    input: ProfileInput,
) -> AppResult<profiles::Model> {
    if input.role.is_some_and(|role| role != target.role) {
        authz::can_change_role(actor)?;
    }
    Ok(profile_db::update_profile(db, target.id, input).await?)
}

/// GET /api/profiles (admin): filter by role, search name or email.
pub async fn get_profiles(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    query: web::Query<ProfileListQuery>,
) -> AppResult<HttpResponse> {
    authz::require_role(
        &user.actor(),
        Permission::ViewAllUsers.allowed_roles(),
        "Admin access required",
    )?;

    let query = query.into_inner();
    let pagination = PaginationQuery {
        page: query.page,
        limit: query.limit,
    };
    let (page, limit) = (pagination.page(), pagination.limit());

    let (items, total) =
        profile_db::list_profiles(db.get_ref(), query.role, query.search.as_deref(), page, limit)
            .await?;

    Ok(HttpResponse::Ok().json(Paginated::new(items, page, limit, total)))
}

/// GET /api/profiles/me: the caller's full profile.
pub async fn me(user: AuthenticatedUser) -> AppResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(user.0))
}

/// PUT /api/profiles: update the caller's own profile.
pub async fn update_own_profile(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    cache: web::Data<CacheData>,
    body: web::Json<serde_json::Value>,
) -> AppResult<HttpResponse> {
    let input = validation::validate_partial::<ProfileInput>(&body)?;
    let actor = user.actor();
    let updated = apply_profile_update(db.get_ref(), &actor, &user.0, input).await?;

    cache.invalidate_tags(&affected_tags(&user.0, &updated));
    Ok(HttpResponse::Ok().json(updated))
}

/// GET /api/profiles/{id}: public view, without email or phone.
pub async fn get_profile(
    db: web::Data<DatabaseConnection>,
    cache: web::Data<CacheData>,
    cache_config: web::Data<CacheConfig>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let id = parse_id(&path, "profile")?;

    let db = db.get_ref();
    let profile = cache
        .memoize(&keys::profile(&id.to_string()), &cache_config.profile(), move || async move {
            existing(db, id).await.map(PublicProfile::from)
        })
        .await?;

    Ok(HttpResponse::Ok().json(profile))
}

/// PUT /api/profiles/{id}: self with the profile schema, or an admin with
/// the admin schema.
pub async fn update_profile(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    cache: web::Data<CacheData>,
    path: web::Path<String>,
    body: web::Json<serde_json::Value>,
) -> AppResult<HttpResponse> {
    let id = parse_id(&path, "profile")?;
    let actor = user.actor();
    let target = existing(db.get_ref(), id).await?;
    authz::can_edit_profile(&actor, id)?;

    let updated = if actor.is_admin() && actor.id != id {
        let input = validation::validate_partial::<AdminUserUpdate>(&body)?;
        if input.role.is_some() {
            authz::can_change_role(&actor)?;
        }
        profile_db::admin_update_profile(db.get_ref(), id, input).await?
    } else {
        let input = validation::validate_partial::<ProfileInput>(&body)?;
        apply_profile_update(db.get_ref(), &actor, &target, input).await?
    };

    cache.invalidate_tags(&affected_tags(&target, &updated));
    Ok(HttpResponse::Ok().json(updated))
}

/// DELETE /api/profiles/{id} (admin): deactivate someone else's account.
pub async fn deactivate_profile(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    cache: web::Data<CacheData>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let id = parse_id(&path, "profile")?;
    authz::check_deactivation(&user.actor(), id)?;

    existing(db.get_ref(), id).await?;
    profile_db::deactivate_profile(db.get_ref(), id).await?;

    cache.invalidate_tags(&[tags::PROFILES, tags::STATS]);
    tracing::info!(profile_id = %id, "Account deactivated");
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Account deactivated successfully",
    })))
}
