use actix_web::{HttpResponse, web};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::auth::authorization::{self as authz, Permission};
use crate::auth::middleware::AuthenticatedUser;
use crate::cache::perf::PerfData;
use crate::cache::{CacheConfig, CacheData, keys};
use crate::db::{applications as application_db, gigs as gig_db, profiles as profile_db};
use crate::errors::{AppError, AppResult};

#[derive(Debug, Serialize, Deserialize)]
pub struct MarketStats {
    pub gigs: BTreeMap<String, u64>,
    pub applications: BTreeMap<String, u64>,
    pub profiles: BTreeMap<String, u64>,
}

async fn load_stats(db: &DatabaseConnection) -> AppResult<MarketStats> {
    let gigs = gig_db::count_by_status(db)
        .await?
        .into_iter()
        .map(|(status, n)| (status.as_str().to_string(), n))
        .collect();
    let applications = application_db::count_by_status(db)
        .await?
        .into_iter()
        .map(|(status, n)| (status.as_str().to_string(), n))
        .collect();
    let profiles = profile_db::count_by_role(db)
        .await?
        .into_iter()
        .map(|(role, n)| (role.as_str().to_string(), n))
        .collect();

    Ok(MarketStats {
        gigs,
        applications,
        profiles,
    })
}

/// GET /api/stats: marketplace counts (admin, cached).
pub async fn get_stats(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    cache: web::Data<CacheData>,
    cache_config: web::Data<CacheConfig>,
    perf: web::Data<PerfData>,
) -> AppResult<HttpResponse> {
    authz::require_permission(&user.actor(), Permission::ViewAnalytics)?;

    let db = db.get_ref();
    let perf = perf.get_ref();
    let stats = cache
        .memoize(&keys::stats("overview"), &cache_config.stats(), move || async move {
            perf.time("stats.overview", load_stats(db)).await
        })
        .await?;

    Ok(HttpResponse::Ok().json(stats))
}

/// GET /api/stats/performance: recorded latencies and cache occupancy.
pub async fn get_performance(
    user: AuthenticatedUser,
    cache: web::Data<CacheData>,
    perf: web::Data<PerfData>,
) -> Result<HttpResponse, AppError> {
    authz::require_permission(&user.actor(), Permission::ViewAnalytics)?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "operations": perf.all_stats(),
        "cache": cache.stats(),
    })))
}
