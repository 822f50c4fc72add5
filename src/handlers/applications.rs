use actix_web::{HttpResponse, web};
use sea_orm::DatabaseConnection;
use serde::Deserialize;

use crate::auth::authorization as authz;
use crate::auth::middleware::AuthenticatedUser;
use crate::cache::perf::PerfData;
use crate::cache::{CacheConfig, CacheData, keys, tags};
use crate::db::applications::{self as application_db, ApplicationScope};
use crate::errors::{AppError, AppResult};
use crate::lifecycle::Lifecycle;
use crate::models::applications::ApplicationStatus;
use crate::models::profiles::Role;
use crate::models::{Paginated, PaginationQuery};
use crate::validation::schemas::{ApplicationInput, DecisionInput};
use crate::validation::{self, parse_id};

const MUTATION_TAGS: &[&str] = &[tags::APPLICATIONS, tags::GIGS, tags::STATS];

#[derive(Debug, Deserialize)]
pub struct ApplicationListQuery {
    pub gig_id: Option<String>,
    pub status: Option<ApplicationStatus>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl ApplicationListQuery {
    fn pagination(&self) -> PaginationQuery {
        PaginationQuery {
            page: self.page,
            limit: self.limit,
        }
    }
}

/// GET /api/applications: admins see everything, clients see bids on their
/// gigs, freelancers see their own.
pub async fn get_applications(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    cache: web::Data<CacheData>,
    cache_config: web::Data<CacheConfig>,
    perf: web::Data<PerfData>,
    query: web::Query<ApplicationListQuery>,
) -> AppResult<HttpResponse> {
    let actor = user.actor();
    let query = query.into_inner();
    let gig_id = query
        .gig_id
        .as_deref()
        .map(|raw| parse_id(raw, "gig"))
        .transpose()?;
    let page = query.pagination().page();
    let limit = query.pagination().limit();

    let scope = match actor.role {
        Role::Admin => ApplicationScope::All,
        Role::Client => ApplicationScope::ReceivedBy(actor.id),
        Role::Freelancer => ApplicationScope::SubmittedBy(actor.id),
    };

    let key = format!(
        "{}|gig:{}|status:{}|page:{page}|limit:{limit}",
        keys::applications(&actor.id.to_string(), actor.role.as_str()),
        gig_id.map(|id| id.to_string()).unwrap_or_default(),
        query.status.map(|s| s.as_str()).unwrap_or_default(),
    );

    let db = db.get_ref();
    let perf = perf.get_ref();
    let status = query.status;
    let listing = cache
        .memoize(&key, &cache_config.applications(), move || async move {
            let (items, total) = perf
                .time(
                    "applications.list",
                    application_db::list_applications(db, scope, gig_id, status, page, limit),
                )
                .await?;
            Ok::<_, AppError>(Paginated::new(items, page, limit, total))
        })
        .await?;

    Ok(HttpResponse::Ok().json(listing))
}

/// POST /api/applications: a freelancer bids on a published gig.
pub async fn create_application(
    user: AuthenticatedUser,
    lifecycle: web::Data<Lifecycle>,
    cache: web::Data<CacheData>,
    body: web::Json<serde_json::Value>,
) -> AppResult<HttpResponse> {
    let actor = user.actor();
    authz::require_role(
        &actor,
        authz::Permission::CreateApplication.allowed_roles(),
        "Freelancer access required",
    )?;

    let input = validation::validate::<ApplicationInput>(&body)?;
    let application = lifecycle.submit_application(&actor, input).await?;

    cache.invalidate_tags(MUTATION_TAGS);
    Ok(HttpResponse::Created().json(application))
}

/// GET /api/applications/{id}: applicant, gig owner or admin.
pub async fn get_application(
    user: AuthenticatedUser,
    lifecycle: web::Data<Lifecycle>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let id = parse_id(&path, "application")?;
    let (application, gig) = lifecycle.application_with_gig(id).await?;
    authz::can_view_application(&user.actor(), &application, &gig)?;

    Ok(HttpResponse::Ok().json(application))
}

/// PUT /api/applications/{id}: the gig owner accepts, rejects or comments.
pub async fn decide_application(
    user: AuthenticatedUser,
    lifecycle: web::Data<Lifecycle>,
    cache: web::Data<CacheData>,
    path: web::Path<String>,
    body: web::Json<serde_json::Value>,
) -> AppResult<HttpResponse> {
    let id = parse_id(&path, "application")?;
    let decision = validation::validate::<DecisionInput>(&body)?;

    let application = lifecycle
        .decide_application(&user.actor(), id, decision)
        .await?;

    cache.invalidate_tags(MUTATION_TAGS);
    Ok(HttpResponse::Ok().json(application))
}

/// DELETE /api/applications/{id}: the applicant withdraws.
pub async fn withdraw_application(
    user: AuthenticatedUser,
    lifecycle: web::Data<Lifecycle>,
    cache: web::Data<CacheData>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let id = parse_id(&path, "application")?;
    lifecycle.withdraw_application(&user.actor(), id).await?;

    cache.invalidate_tags(MUTATION_TAGS);
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Application withdrawn successfully",
    })))
}
