use actix_web::{HttpResponse, web};
use sea_orm::DatabaseConnection;

use crate::auth::authorization::{self as authz, Permission};
use crate::auth::middleware::AuthenticatedUser;
use crate::cache::perf::PerfData;
use crate::cache::{CacheConfig, CacheData, keys, tags};
use crate::db::gigs as gig_db;
use crate::errors::{AppError, AppResult};
use crate::lifecycle::Lifecycle;
use crate::models::gigs::GigStatus;
use crate::models::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, Paginated};
use crate::validation::schemas::{GigFilters, GigInput};
use crate::validation::{self, parse_id};

const MUTATION_TAGS: &[&str] = &[tags::GIGS, tags::STATS];

/// GET /api/gigs: published gigs, filtered and paginated (public, cached).
pub async fn get_gigs(
    db: web::Data<DatabaseConnection>,
    cache: web::Data<CacheData>,
    cache_config: web::Data<CacheConfig>,
    perf: web::Data<PerfData>,
    query: web::Query<GigFilters>,
) -> AppResult<HttpResponse> {
    let mut filters = query.into_inner();
    filters.limit = filters.limit.map(|l| l.min(MAX_PAGE_SIZE as u32));
    let filters = validation::check(filters)?;

    let page = u64::from(filters.page.unwrap_or(1));
    let limit = filters.limit.map(u64::from).unwrap_or(DEFAULT_PAGE_SIZE);
    let key = keys::gigs(filters.cache_pairs());

    let db = db.get_ref();
    let perf = perf.get_ref();
    let filters = &filters;
    let listing = cache
        .memoize(&key, &cache_config.gig_list(), move || async move {
            let (items, total) = perf
                .time("gigs.list", gig_db::list_published(db, filters, page, limit))
                .await?;
            Ok::<_, AppError>(Paginated::new(items, page, limit, total))
        })
        .await?;

    Ok(HttpResponse::Ok().json(listing))
}

/// POST /api/gigs: clients and admins publish work. Status defaults to draft.
pub async fn create_gig(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    cache: web::Data<CacheData>,
    body: web::Json<serde_json::Value>,
) -> AppResult<HttpResponse> {
    let actor = user.actor();
    authz::require_role(
        &actor,
        Permission::CreateGig.allowed_roles(),
        "Client access required",
    )?;

    let input = validation::validate::<GigInput>(&body)?;
    let gig = gig_db::insert_gig(db.get_ref(), input, actor.id).await?;

    cache.invalidate_tags(MUTATION_TAGS);
    tracing::info!(gig_id = %gig.id, client_id = %actor.id, "Gig created");
    Ok(HttpResponse::Created().json(gig))
}

/// GET /api/gigs/{id}: unpublished gigs are visible only to their owner and
/// admins. Other viewers of a published gig bump its view counter.
pub async fn get_gig(
    viewer: Option<AuthenticatedUser>,
    db: web::Data<DatabaseConnection>,
    cache: web::Data<CacheData>,
    cache_config: web::Data<CacheConfig>,
    perf: web::Data<PerfData>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let id = parse_id(&path, "gig")?;
    let viewer = viewer.map(|u| u.actor());

    let db = db.get_ref();
    let perf = perf.get_ref();
    let gig = cache
        .memoize(&keys::gig(&id.to_string()), &cache_config.gig(), move || async move {
            perf.time("gigs.get", gig_db::get_gig_by_id(db, id))
                .await?
                .ok_or_else(|| AppError::not_found("Gig not found"))
        })
        .await?;

    authz::gig_visible_to(viewer.as_ref(), &gig)?;

    let is_owner = viewer.as_ref().is_some_and(|v| authz::owns_gig(v, &gig));
    if gig.status == GigStatus::Published && !is_owner {
        if let Err(e) = gig_db::increment_views(db, id).await {
            tracing::warn!(gig_id = %id, "Failed to record gig view: {e}");
        }
    }

    Ok(HttpResponse::Ok().json(gig))
}

/// PUT /api/gigs/{id}: partial edit by the owner or an admin.
pub async fn update_gig(
    user: AuthenticatedUser,
    lifecycle: web::Data<Lifecycle>,
    cache: web::Data<CacheData>,
    path: web::Path<String>,
    body: web::Json<serde_json::Value>,
) -> AppResult<HttpResponse> {
    let id = parse_id(&path, "gig")?;
    let patch = validation::validate_partial::<GigInput>(&body)?;

    let gig = lifecycle.update_gig(&user.actor(), id, patch).await?;

    cache.invalidate_tags(MUTATION_TAGS);
    Ok(HttpResponse::Ok().json(gig))
}

/// DELETE /api/gigs/{id}: soft delete by cancelling.
pub async fn delete_gig(
    user: AuthenticatedUser,
    lifecycle: web::Data<Lifecycle>,
    cache: web::Data<CacheData>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let id = parse_id(&path, "gig")?;
    lifecycle.delete_gig(&user.actor(), id).await?;

    cache.invalidate_tags(MUTATION_TAGS);
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Gig cancelled successfully",
    })))
}

/// POST /api/gigs/{id}/complete: close out work in progress.
pub async fn complete_gig(
    user: AuthenticatedUser,
    lifecycle: web::Data<Lifecycle>,
    cache: web::Data<CacheData>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let id = parse_id(&path, "gig")?;
    let gig = lifecycle.complete_gig(&user.actor(), id).await?;

    cache.invalidate_tags(MUTATION_TAGS);
    Ok(HttpResponse::Ok().json(gig))
}
