//! HTTP surface: the rate-limit middleware and the real `/api` routes.
//!
//! The routes run against an in-memory lifecycle store and a sea-orm
//! `MockDatabase` that only answers the profile lookups of the auth
//! extractor, so no database or server is needed.
//!
//! Run with: `cargo test --test http_test`
use actix_web::http::StatusCode;
use actix_web::middleware::from_fn;
use actix_web::{App, HttpResponse, ResponseError, body, test, web};
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use gigboard_backend::auth::jwt::{Claims, TokenVerifier};
use gigboard_backend::cache::perf::PerfMonitor;
use gigboard_backend::cache::{CacheConfig, TaggedCache, keys, tags};
use gigboard_backend::clock;
use gigboard_backend::handlers;
use gigboard_backend::lifecycle::{Lifecycle, MemoryStore};
use gigboard_backend::models::Paginated;
use gigboard_backend::models::gigs::{self, BudgetType, DifficultyLevel, GigStatus, LocationType};
use gigboard_backend::models::profiles::{self, Role};
use gigboard_backend::rate_limit::{self, FixedWindowLimiter, RateLimitConfig, RateLimiter};
use gigboard_backend::validation::schemas::GigFilters;
use gigboard_backend::validation::upload::UploadPolicy;

const TEST_SECRET: &str = "test-secret-at-least-256-bits-long-for-hs256-xxxxxxx";

fn token_for(sub: &str, email: &str, secret: &str) -> String {
    let now = Utc::now().timestamp() as usize;
    let claims = Claims {
        sub: sub.to_string(),
        exp: now + 3600,
        iat: Some(now),
        iss: Some("https://example.supabase.co/auth/v1".to_string()),
        email: Some(email.to_string()),
        role: Some("authenticated".to_string()),
        user_metadata: None,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("Failed to encode test JWT")
}

fn bearer(profile: &profiles::Model) -> (&'static str, String) {
    (
        "Authorization",
        format!("Bearer {}", token_for(&profile.id.to_string(), &profile.email, TEST_SECRET)),
    )
}

fn profile(role: Role) -> profiles::Model {
    let now = Utc::now();
    profiles::Model {
        id: Uuid::new_v4(),
        email: format!("{}@example.com", role.as_str()),
        full_name: Some("Asha Rao".to_string()),
        avatar_url: None,
        role,
        bio: None,
        skills: Vec::new(),
        location: None,
        phone: None,
        website: None,
        hourly_rate: None,
        rating: None,
        total_earnings: None,
        created_at: now,
        updated_at: now,
    }
}

fn gig_for(client_id: Uuid) -> gigs::Model {
    let now = Utc::now();
    gigs::Model {
        id: Uuid::new_v4(),
        title: "Logo for a bakery".to_string(),
        description: "A clean logo for a neighbourhood bakery in Indore".to_string(),
        category_id: Uuid::new_v4(),
        client_id,
        budget_type: BudgetType::Fixed,
        budget_amount: 5_000.0,
        budget_min: None,
        budget_max: None,
        deadline: None,
        skills_required: vec!["Illustrator".to_string()],
        status: GigStatus::Draft,
        difficulty_level: DifficultyLevel::Intermediate,
        location_type: LocationType::Remote,
        location: None,
        views: 0,
        applications_count: 0,
        is_featured: false,
        created_at: now,
        updated_at: now,
    }
}

/// A connection answering one profile lookup per authenticated request.
fn db_knowing(profile: &profiles::Model, requests: usize) -> DatabaseConnection {
    let mut mock = MockDatabase::new(DatabaseBackend::Postgres);
    for _ in 0..requests {
        mock = mock.append_query_results([vec![profile.clone()]]);
    }
    mock.into_connection()
}

fn empty_db() -> DatabaseConnection {
    MockDatabase::new(DatabaseBackend::Postgres).into_connection()
}

struct Harness {
    db: web::Data<DatabaseConnection>,
    lifecycle: web::Data<Lifecycle>,
    cache: web::Data<Arc<TaggedCache>>,
    cache_config: web::Data<CacheConfig>,
    perf: web::Data<Arc<PerfMonitor>>,
    verifier: web::Data<TokenVerifier>,
    limiter: web::Data<Arc<RateLimiter>>,
    limits: web::Data<RateLimitConfig>,
    uploads: web::Data<UploadPolicy>,
}

impl Harness {
    fn new(db: DatabaseConnection) -> Self {
        Self::with_limits(db, RateLimitConfig::default())
    }

    fn with_limits(db: DatabaseConnection, limits: RateLimitConfig) -> Self {
        let clock = clock::system();
        Self {
            db: web::Data::new(db),
            lifecycle: web::Data::new(Lifecycle::new(Arc::new(MemoryStore::new()))),
            cache: web::Data::new(Arc::new(TaggedCache::new(clock.clone()))),
            cache_config: web::Data::new(CacheConfig::default()),
            perf: web::Data::new(Arc::new(PerfMonitor::new(clock.clone()))),
            verifier: web::Data::new(TokenVerifier::Secret(TEST_SECRET.to_string())),
            limiter: web::Data::new(Arc::new(RateLimiter::Memory(FixedWindowLimiter::new(clock)))),
            limits: web::Data::new(limits),
            uploads: web::Data::new(UploadPolicy::default()),
        }
    }

    fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(self.db.clone())
            .app_data(self.lifecycle.clone())
            .app_data(self.cache.clone())
            .app_data(self.cache_config.clone())
            .app_data(self.perf.clone())
            .app_data(self.verifier.clone())
            .app_data(self.limiter.clone())
            .app_data(self.limits.clone())
            .app_data(self.uploads.clone())
            .route("/ping", web::get().to(pong))
            .route("/ping", web::post().to(pong))
            .service(web::scope("/api").configure(handlers::init_routes));
    }
}

async fn pong() -> HttpResponse {
    HttpResponse::Ok().finish()
}

fn limits(read_max: u32, mutation_max: u32) -> RateLimitConfig {
    RateLimitConfig {
        read_max,
        mutation_max,
        ..Default::default()
    }
}

fn from_ip(req: test::TestRequest, ip: &str) -> test::TestRequest {
    req.peer_addr(format!("{ip}:40000").parse().unwrap())
}

async fn json_body(res: actix_web::dev::ServiceResponse) -> Value {
    let bytes = test::read_body(res).await;
    serde_json::from_slice(&bytes).unwrap()
}

// ── Rate limiting ──

#[actix_web::test]
async fn test_forged_tokens_do_not_open_new_windows() {
    let harness = Harness::with_limits(empty_db(), limits(2, 30));
    let app = test::init_service(
        App::new()
            .wrap(from_fn(rate_limit::enforce))
            .configure(|cfg| harness.configure(cfg)),
    )
    .await;

    let mut statuses = Vec::new();
    for _ in 0..5 {
        let forged = token_for(&Uuid::new_v4().to_string(), "mallory@example.com", "not-our-secret");
        let req = from_ip(test::TestRequest::get().uri("/ping"), "203.0.113.7")
            .insert_header(("Authorization", format!("Bearer {forged}")))
            .to_request();
        let status = match test::try_call_service(&app, req).await {
            Ok(res) => res.status(),
            Err(err) => err.as_response_error().status_code(),
        };
        statuses.push(status.as_u16());
    }

    assert_eq!(statuses, vec![200, 200, 429, 429, 429]);
}

#[actix_web::test]
async fn test_limit_hit_reports_rate_limit_error() {
    let harness = Harness::with_limits(empty_db(), limits(1, 30));
    let app = test::init_service(
        App::new()
            .wrap(from_fn(rate_limit::enforce))
            .configure(|cfg| harness.configure(cfg)),
    )
    .await;

    let first = from_ip(test::TestRequest::get().uri("/ping"), "198.51.100.1").to_request();
    assert_eq!(test::call_service(&app, first).await.status(), StatusCode::OK);

    let second = from_ip(test::TestRequest::get().uri("/ping"), "198.51.100.1").to_request();
    let err = test::try_call_service(&app, second).await.err().unwrap();
    let res = err.error_response();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    let bytes = body::to_bytes(res.into_body()).await.unwrap();
    let payload: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(payload["code"], "RATE_LIMIT_ERROR");

    let neighbour = from_ip(test::TestRequest::get().uri("/ping"), "198.51.100.2").to_request();
    assert_eq!(test::call_service(&app, neighbour).await.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_reads_and_writes_have_separate_budgets() {
    let harness = Harness::with_limits(empty_db(), limits(5, 1));
    let app = test::init_service(
        App::new()
            .wrap(from_fn(rate_limit::enforce))
            .configure(|cfg| harness.configure(cfg)),
    )
    .await;

    let write = from_ip(test::TestRequest::post().uri("/ping"), "192.0.2.10").to_request();
    assert_eq!(test::call_service(&app, write).await.status(), StatusCode::OK);

    let write = from_ip(test::TestRequest::post().uri("/ping"), "192.0.2.10").to_request();
    assert!(test::try_call_service(&app, write).await.is_err());

    let read = from_ip(test::TestRequest::get().uri("/ping"), "192.0.2.10").to_request();
    assert_eq!(test::call_service(&app, read).await.status(), StatusCode::OK);
}

#[std::prelude::v1::test]
fn test_forwarded_address_needs_a_trusted_proxy() {
    let req = test::TestRequest::default()
        .peer_addr("203.0.113.7:40000".parse().unwrap())
        .insert_header(("X-Forwarded-For", "198.51.100.9"))
        .to_srv_request();

    assert_eq!(rate_limit::identify(&req, false), "ip:203.0.113.7");
    assert_eq!(rate_limit::identify(&req, true), "ip:198.51.100.9");
}

// ── Route status contract ──

#[actix_web::test]
async fn test_malformed_gig_id_is_rejected_before_lookup() {
    let harness = Harness::new(empty_db());
    let app = test::init_service(App::new().configure(|cfg| harness.configure(cfg))).await;

    let req = test::TestRequest::get().uri("/api/gigs/not-a-uuid").to_request();
    let res = test::call_service(&app, req).await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = json_body(res).await;
    assert_eq!(body["code"], "BAD_REQUEST");
    assert_eq!(body["error"], "Invalid gig ID format");
}

#[actix_web::test]
async fn test_malformed_application_id_never_reaches_the_lifecycle() {
    let freelancer = profile(Role::Freelancer);
    let harness = Harness::new(db_knowing(&freelancer, 2));
    let app = test::init_service(App::new().configure(|cfg| harness.configure(cfg))).await;

    let decide = test::TestRequest::put()
        .uri("/api/applications/123")
        .insert_header(bearer(&freelancer))
        .set_json(json!({ "status": "accepted" }))
        .to_request();
    let res = test::call_service(&app, decide).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(res).await["error"], "Invalid application ID format");

    let withdraw = test::TestRequest::delete()
        .uri("/api/applications/0000-not-a-uuid")
        .insert_header(bearer(&freelancer))
        .to_request();
    let res = test::call_service(&app, withdraw).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_unknown_application_is_not_found() {
    let freelancer = profile(Role::Freelancer);
    let harness = Harness::new(db_knowing(&freelancer, 1));
    let app = test::init_service(App::new().configure(|cfg| harness.configure(cfg))).await;

    let req = test::TestRequest::delete()
        .uri(&format!("/api/applications/{}", Uuid::new_v4()))
        .insert_header(bearer(&freelancer))
        .to_request();
    let res = test::call_service(&app, req).await;

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(res).await["code"], "NOT_FOUND_ERROR");
}

#[actix_web::test]
async fn test_missing_token_is_unauthenticated() {
    let harness = Harness::new(empty_db());
    let app = test::init_service(App::new().configure(|cfg| harness.configure(cfg))).await;

    let req = test::TestRequest::post()
        .uri("/api/gigs")
        .set_json(json!({}))
        .to_request();
    let res = test::call_service(&app, req).await;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(res).await["code"], "AUTHENTICATION_ERROR");
}

#[actix_web::test]
async fn test_create_gig_returns_created_and_invalidates_listings() {
    let client = profile(Role::Client);
    let stored = gig_for(client.id);
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![client.clone()]])
        .append_query_results([vec![stored.clone()]])
        .into_connection();
    let harness = Harness::new(db);
    harness
        .cache
        .set("gigs:page:1", &json!({ "stale": true }), Duration::from_secs(60), &[tags::GIGS]);
    let app = test::init_service(App::new().configure(|cfg| harness.configure(cfg))).await;

    let req = test::TestRequest::post()
        .uri("/api/gigs")
        .insert_header(bearer(&client))
        .set_json(json!({
            "title": "Logo for a bakery",
            "description": "A clean logo for a neighbourhood bakery in Indore",
            "category_id": stored.category_id.to_string(),
            "budget_type": "fixed",
            "budget_amount": 5000,
            "skills_required": ["Illustrator"],
        }))
        .to_request();
    let res = test::call_service(&app, req).await;

    assert_eq!(res.status(), StatusCode::CREATED);
    assert_eq!(json_body(res).await["id"], stored.id.to_string());
    assert!(harness.cache.get::<Value>("gigs:page:1").is_none());
}

#[actix_web::test]
async fn test_freelancers_cannot_create_gigs() {
    let freelancer = profile(Role::Freelancer);
    let harness = Harness::new(db_knowing(&freelancer, 1));
    let app = test::init_service(App::new().configure(|cfg| harness.configure(cfg))).await;

    let req = test::TestRequest::post()
        .uri("/api/gigs")
        .insert_header(bearer(&freelancer))
        .set_json(json!({}))
        .to_request();
    let res = test::call_service(&app, req).await;

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn test_gig_listing_caps_limit_and_wraps_items() {
    let harness = Harness::new(empty_db());
    let capped = GigFilters {
        limit: Some(50),
        ..Default::default()
    };
    let listing = Paginated::new(vec![gig_for(Uuid::new_v4())], 1, 50, 51);
    harness.cache.set(
        &keys::gigs(capped.cache_pairs()),
        &listing,
        Duration::from_secs(60),
        &[tags::GIGS],
    );
    let app = test::init_service(App::new().configure(|cfg| harness.configure(cfg))).await;

    let req = test::TestRequest::get().uri("/api/gigs?limit=500").to_request();
    let res = test::call_service(&app, req).await;

    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res).await;
    assert_eq!(body["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["pagination"]["limit"], 50);
    assert_eq!(body["pagination"]["total"], 51);
    assert_eq!(body["pagination"]["totalPages"], 2);
}

#[actix_web::test]
async fn test_bad_filters_are_validation_errors() {
    let harness = Harness::new(empty_db());
    let app = test::init_service(App::new().configure(|cfg| harness.configure(cfg))).await;

    let req = test::TestRequest::get().uri("/api/gigs?category=bakery").to_request();
    let res = test::call_service(&app, req).await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = json_body(res).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(body["details"]["category"], "Invalid uuid");
}

#[actix_web::test]
async fn test_upload_check_route() {
    let freelancer = profile(Role::Freelancer);
    let harness = Harness::new(db_knowing(&freelancer, 2));
    let app = test::init_service(App::new().configure(|cfg| harness.configure(cfg))).await;

    let ok = test::TestRequest::post()
        .uri("/api/uploads/check")
        .insert_header(bearer(&freelancer))
        .set_json(json!({ "filename": "portfolio.pdf", "content_type": "application/pdf", "size": 4096 }))
        .to_request();
    let res = test::call_service(&app, ok).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await["valid"], true);

    let too_big = test::TestRequest::post()
        .uri("/api/uploads/check")
        .insert_header(bearer(&freelancer))
        .set_json(json!({ "filename": "reel.gif", "content_type": "image/gif", "size": 6 * 1024 * 1024 }))
        .to_request();
    let res = test::call_service(&app, too_big).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = json_body(res).await;
    assert_eq!(body["details"]["size"], "File size exceeds limit of 5MB");
}

// ── Stats invalidation ──

#[actix_web::test]
async fn test_first_sign_in_invalidates_stats() {
    let newcomer = profile(Role::Freelancer);
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<profiles::Model>::new()])
        .append_exec_results([MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }])
        .append_query_results([vec![newcomer.clone()]])
        .into_connection();
    let harness = Harness::new(db);
    harness
        .cache
        .set(&keys::stats("dashboard"), &json!({ "profiles": {} }), Duration::from_secs(60), &[tags::STATS]);
    let app = test::init_service(App::new().configure(|cfg| harness.configure(cfg))).await;

    let req = test::TestRequest::get()
        .uri("/api/profiles/me")
        .insert_header(bearer(&newcomer))
        .to_request();
    let res = test::call_service(&app, req).await;

    assert_eq!(res.status(), StatusCode::OK);
    assert!(harness.cache.get::<Value>(&keys::stats("dashboard")).is_none());
}

#[actix_web::test]
async fn test_concurrent_first_sign_in_reads_the_winning_row() {
    let newcomer = profile(Role::Freelancer);
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<profiles::Model>::new()])
        .append_exec_results([MockExecResult {
            last_insert_id: 0,
            rows_affected: 0,
        }])
        .append_query_results([vec![newcomer.clone()]])
        .into_connection();
    let harness = Harness::new(db);
    harness
        .cache
        .set(&keys::stats("dashboard"), &json!({ "profiles": {} }), Duration::from_secs(60), &[tags::STATS]);
    let app = test::init_service(App::new().configure(|cfg| harness.configure(cfg))).await;

    let req = test::TestRequest::get()
        .uri("/api/profiles/me")
        .insert_header(bearer(&newcomer))
        .to_request();
    let res = test::call_service(&app, req).await;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await["id"], newcomer.id.to_string());
    assert!(harness.cache.get::<Value>(&keys::stats("dashboard")).is_some());
}

#[actix_web::test]
async fn test_returning_user_keeps_stats_cached() {
    let member = profile(Role::Client);
    let harness = Harness::new(db_knowing(&member, 1));
    harness
        .cache
        .set(&keys::stats("dashboard"), &json!({ "profiles": {} }), Duration::from_secs(60), &[tags::STATS]);
    let app = test::init_service(App::new().configure(|cfg| harness.configure(cfg))).await;

    let req = test::TestRequest::get()
        .uri("/api/profiles/me")
        .insert_header(bearer(&member))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    assert!(harness.cache.get::<Value>(&keys::stats("dashboard")).is_some());
}

#[std::prelude::v1::test]
fn test_role_change_touches_stats() {
    let before = profile(Role::Freelancer);
    let renamed = profiles::Model {
        full_name: Some("Asha R.".to_string()),
        ..before.clone()
    };
    let promoted = profiles::Model {
        role: Role::Client,
        ..before.clone()
    };

    assert_eq!(handlers::profiles::affected_tags(&before, &renamed), vec![tags::PROFILES]);
    assert_eq!(
        handlers::profiles::affected_tags(&before, &promoted),
        vec![tags::PROFILES, tags::STATS]
    );
}
