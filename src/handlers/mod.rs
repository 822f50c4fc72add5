pub mod applications;
pub mod categories;
pub mod gigs;
pub mod profiles;
pub mod stats;
pub mod uploads;

use actix_web::web;

use crate::errors::AppError;
use crate::validation;

/// Malformed JSON bodies are reported like any other validation failure.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        AppError::validation(validation::single("body", err.to_string())).into()
    })
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        AppError::validation(validation::single("query", err.to_string())).into()
    })
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config()).app_data(query_config());

    // ── Gigs (listing and published detail are public) ──
    cfg.service(
        web::scope("/gigs")
            .route("", web::get().to(gigs::get_gigs))
            .route("", web::post().to(gigs::create_gig))
            .route("/{id}", web::get().to(gigs::get_gig))
            .route("/{id}", web::put().to(gigs::update_gig))
            .route("/{id}", web::delete().to(gigs::delete_gig))
            .route("/{id}/complete", web::post().to(gigs::complete_gig)),
    );

    // ── Applications (all protected) ──
    cfg.service(
        web::scope("/applications")
            .route("", web::get().to(applications::get_applications))
            .route("", web::post().to(applications::create_application))
            .route("/{id}", web::get().to(applications::get_application))
            .route("/{id}", web::put().to(applications::decide_application))
            .route("/{id}", web::delete().to(applications::withdraw_application)),
    );

    // ── Categories (reads public, writes admin) ──
    cfg.service(
        web::scope("/categories")
            .route("", web::get().to(categories::get_categories))
            .route("", web::post().to(categories::create_category))
            .route("/{id}", web::get().to(categories::get_category))
            .route("/{id}", web::put().to(categories::update_category))
            .route("/{id}", web::delete().to(categories::delete_category)),
    );

    // ── Profiles ──
    cfg.service(
        web::scope("/profiles")
            .route("", web::get().to(profiles::get_profiles))
            .route("", web::put().to(profiles::update_own_profile))
            .route("/me", web::get().to(profiles::me))
            .route("/{id}", web::get().to(profiles::get_profile))
            .route("/{id}", web::put().to(profiles::update_profile))
            .route("/{id}", web::delete().to(profiles::deactivate_profile)),
    );

    // ── Uploads (validation only) ──
    cfg.service(web::scope("/uploads").route("/check", web::post().to(uploads::check_upload)));

    // ── Stats (admin) ──
    cfg.service(
        web::scope("/stats")
            .route("", web::get().to(stats::get_stats))
            .route("/performance", web::get().to(stats::get_performance)),
    );
}
