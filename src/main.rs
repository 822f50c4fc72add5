use actix_cors::Cors;
use actix_web::middleware::{Logger, from_fn};
use actix_web::{App, HttpServer, web};
use dotenv::dotenv;
use gigboard_backend::auth::jwks::JwksCache;
use gigboard_backend::auth::jwt::TokenVerifier;
use gigboard_backend::cache::TaggedCache;
use gigboard_backend::cache::perf::PerfMonitor;
use gigboard_backend::clock;
use gigboard_backend::config::AppConfig;
use gigboard_backend::db::DbStore;
use gigboard_backend::lifecycle::Lifecycle;
use gigboard_backend::rate_limit::{self, FixedWindowLimiter, RateLimiter, RedisWindowLimiter};
use gigboard_backend::{create_pool, handlers};
use migration::{Migrator, MigratorTrait};
use std::io;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = AppConfig::from_env().map_err(|e| {
        tracing::error!("Invalid configuration: {e}");
        io::Error::other(e)
    })?;

    let db = create_pool(&config).await.map_err(io::Error::other)?;
    tracing::info!("Connected to database");

    if config.run_migrations {
        Migrator::up(&db, None).await.map_err(io::Error::other)?;
        tracing::info!("Migrations applied");
    }

    let clock = clock::system();
    let cache = Arc::new(TaggedCache::new(clock.clone()));
    let perf = Arc::new(PerfMonitor::new(clock.clone()));

    let limiter = match (&config.redis_url, config.rate_limit.use_redis) {
        (Some(url), true) => {
            let redis = RedisWindowLimiter::new(url).await.map_err(io::Error::other)?;
            tracing::info!("Rate limiting through Redis");
            RateLimiter::Redis(redis)
        }
        _ => RateLimiter::Memory(FixedWindowLimiter::new(clock.clone())),
    };
    let limiter = Arc::new(limiter);

    rate_limit::spawn_sweepers(
        cache.clone(),
        config.cache.sweep_interval,
        limiter.clone(),
        config.rate_limit.sweep_interval,
    );

    let verifier = match &config.jwt_secret {
        Some(secret) => TokenVerifier::Secret(secret.clone()),
        None => TokenVerifier::Jwks(Arc::new(JwksCache::new(
            &config.supabase_url,
            &config.supabase_anon_key,
        ))),
    };

    let lifecycle = web::Data::new(Lifecycle::new(Arc::new(DbStore::new(db.clone()))));
    let db_data = web::Data::new(db);
    let cache_data = web::Data::new(cache);
    let cache_config = web::Data::new(config.cache.clone());
    let perf_data = web::Data::new(perf);
    let verifier = web::Data::new(verifier);
    let limiter = web::Data::new(limiter);
    let limit_config = web::Data::new(config.rate_limit.clone());
    let upload_policy = web::Data::new(config.upload.clone());

    let bind_addr = config.bind_addr();
    tracing::info!("Server running at http://{bind_addr}");

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                actix_web::http::header::AUTHORIZATION,
                actix_web::http::header::CONTENT_TYPE,
                actix_web::http::header::ACCEPT,
            ])
            .max_age(3600);

        App::new()
            .wrap(from_fn(rate_limit::enforce))
            .wrap(cors)
            .wrap(Logger::default())
            .app_data(db_data.clone())
            .app_data(lifecycle.clone())
            .app_data(cache_data.clone())
            .app_data(cache_config.clone())
            .app_data(perf_data.clone())
            .app_data(verifier.clone())
            .app_data(limiter.clone())
            .app_data(limit_config.clone())
            .app_data(upload_policy.clone())
            .service(web::scope("/api").configure(handlers::init_routes))
    })
    .bind(&bind_addr)?
    .run()
    .await
}
