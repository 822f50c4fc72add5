use actix_web::{HttpResponse, web};
use sea_orm::DatabaseConnection;

use crate::auth::authorization::{self as authz, Actor, Permission};
use crate::auth::middleware::AuthenticatedUser;
use crate::cache::perf::PerfData;
use crate::cache::{CacheConfig, CacheData, keys, tags};
use crate::db::categories as category_db;
use crate::errors::{AppError, AppResult};
use crate::validation::schemas::CategoryInput;
use crate::validation::{self, parse_id};

fn require_admin(actor: &Actor) -> AppResult<()> {
    authz::require_role(
        actor,
        Permission::ManageCategories.allowed_roles(),
        "Admin access required",
    )
}

/// GET /api/categories: active categories by name (public, cached).
pub async fn get_categories(
    db: web::Data<DatabaseConnection>,
    cache: web::Data<CacheData>,
    cache_config: web::Data<CacheConfig>,
    perf: web::Data<PerfData>,
) -> AppResult<HttpResponse> {
    let db = db.get_ref();
    let perf = perf.get_ref();
    let categories = cache
        .memoize(&keys::categories(), &cache_config.categories(), move || async move {
            Ok::<_, AppError>(perf.time("categories.list", category_db::list_active(db)).await?)
        })
        .await?;

    Ok(HttpResponse::Ok().json(categories))
}

pub async fn get_category(
    db: web::Data<DatabaseConnection>,
    cache: web::Data<CacheData>,
    cache_config: web::Data<CacheConfig>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let id = parse_id(&path, "category")?;

    let db = db.get_ref();
    let category = cache
        .memoize(&keys::category(&id.to_string()), &cache_config.categories(), move || async move {
            category_db::get_category_by_id(db, id)
                .await?
                .ok_or_else(|| AppError::not_found("Category not found"))
        })
        .await?;

    Ok(HttpResponse::Ok().json(category))
}

/// POST /api/categories (admin).
pub async fn create_category(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    cache: web::Data<CacheData>,
    body: web::Json<serde_json::Value>,
) -> AppResult<HttpResponse> {
    require_admin(&user.actor())?;

    let input = validation::validate::<CategoryInput>(&body)?;
    let category = category_db::insert_category(db.get_ref(), input).await?;

    cache.invalidate_by_tag(tags::CATEGORIES);
    Ok(HttpResponse::Created().json(category))
}

/// PUT /api/categories/{id} (admin, partial).
pub async fn update_category(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    cache: web::Data<CacheData>,
    path: web::Path<String>,
    body: web::Json<serde_json::Value>,
) -> AppResult<HttpResponse> {
    require_admin(&user.actor())?;
    let id = parse_id(&path, "category")?;

    let input = validation::validate_partial::<CategoryInput>(&body)?;
    let category = category_db::update_category(db.get_ref(), id, input).await?;

    cache.invalidate_by_tag(tags::CATEGORIES);
    Ok(HttpResponse::Ok().json(category))
}

/// DELETE /api/categories/{id} (admin). Categories are deactivated, never
/// removed, so existing gigs keep their reference.
pub async fn delete_category(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    cache: web::Data<CacheData>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    require_admin(&user.actor())?;
    let id = parse_id(&path, "category")?;

    category_db::deactivate_category(db.get_ref(), id).await?;

    cache.invalidate_by_tag(tags::CATEGORIES);
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Category deactivated successfully",
    })))
}
