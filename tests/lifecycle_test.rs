//! Lifecycle engine tests against the in-memory store.
//!
//! Run with: `cargo test --test lifecycle_test`
use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use gigboard_backend::auth::Actor;
use gigboard_backend::errors::AppError;
use gigboard_backend::lifecycle::{Decision, Lifecycle, MemoryStore};
use gigboard_backend::models::applications::{self, ApplicationStatus};
use gigboard_backend::models::gigs::{self, BudgetType, DifficultyLevel, GigStatus, LocationType};
use gigboard_backend::models::profiles::Role;
use gigboard_backend::validation::schemas::{ApplicationDecision, CreateApplication, GigPatch};

struct Market {
    store: Arc<MemoryStore>,
    lifecycle: Lifecycle,
    client: Actor,
    admin: Actor,
}

impl Market {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let lifecycle = Lifecycle::new(store.clone());
        Self {
            store,
            lifecycle,
            client: Actor::new(Uuid::new_v4(), Role::Client),
            admin: Actor::new(Uuid::new_v4(), Role::Admin),
        }
    }

    fn gig(&self, status: GigStatus) -> Uuid {
        self.gig_owned_by(self.client.id, status)
    }

    fn gig_owned_by(&self, client_id: Uuid, status: GigStatus) -> Uuid {
        let now = Utc::now();
        let gig = gigs::Model {
            id: Uuid::new_v4(),
            title: "Wedding photographer".to_string(),
            description: "Full day coverage of a wedding in Pune".to_string(),
            category_id: Uuid::new_v4(),
            client_id,
            budget_type: BudgetType::Fixed,
            budget_amount: 25_000.0,
            budget_min: None,
            budget_max: None,
            deadline: None,
            skills_required: vec!["Photography".to_string()],
            status,
            difficulty_level: DifficultyLevel::Intermediate,
            location_type: LocationType::Onsite,
            location: Some("Pune".to_string()),
            views: 0,
            applications_count: 0,
            is_featured: false,
            created_at: now,
            updated_at: now,
        };
        let id = gig.id;
        self.store.insert_gig(gig);
        id
    }

    /// Seed an application directly, bypassing the submission checks.
    fn seed_application(&self, gig_id: Uuid, status: ApplicationStatus, age: i64) -> Uuid {
        let created = Utc::now() - Duration::minutes(age);
        let application = applications::Model {
            id: Uuid::new_v4(),
            gig_id,
            freelancer_id: Uuid::new_v4(),
            proposal: proposal(),
            proposed_rate: 20_000.0,
            estimated_duration: None,
            cover_letter: None,
            status,
            feedback: None,
            created_at: created,
            updated_at: created,
        };
        let id = application.id;
        self.store.insert_application(application);
        id
    }

    fn count(&self, gig_id: Uuid) -> i32 {
        self.store.gig(gig_id).unwrap().applications_count
    }

    fn status_of(&self, application_id: Uuid) -> ApplicationStatus {
        self.store.application(application_id).unwrap().status
    }
}

fn freelancer() -> Actor {
    Actor::new(Uuid::new_v4(), Role::Freelancer)
}

fn proposal() -> String {
    "I have shot over forty weddings and can deliver edited photos in a week.".to_string()
}

fn bid(gig_id: Uuid) -> CreateApplication {
    CreateApplication {
        gig_id,
        proposal: proposal(),
        proposed_rate: 18_000.0,
        estimated_duration: Some("1 week".to_string()),
        cover_letter: None,
    }
}

fn decision(decision: Decision, feedback: Option<&str>) -> ApplicationDecision {
    ApplicationDecision {
        decision,
        feedback: feedback.map(str::to_string),
    }
}

// ── submit ──

#[tokio::test]
async fn test_submit_creates_pending_application() {
    let market = Market::new();
    let gig_id = market.gig(GigStatus::Published);
    let applicant = freelancer();

    let application = market
        .lifecycle
        .submit_application(&applicant, bid(gig_id))
        .await
        .unwrap();

    assert_eq!(application.status, ApplicationStatus::Pending);
    assert_eq!(application.freelancer_id, applicant.id);
    assert_eq!(market.count(gig_id), 1);
}

#[tokio::test]
async fn test_second_active_application_conflicts() {
    let market = Market::new();
    let gig_id = market.gig(GigStatus::Published);
    let applicant = freelancer();

    market
        .lifecycle
        .submit_application(&applicant, bid(gig_id))
        .await
        .unwrap();
    let err = market
        .lifecycle
        .submit_application(&applicant, bid(gig_id))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(err.to_string(), "You have already applied to this gig");
    assert_eq!(market.count(gig_id), 1);
}

#[tokio::test]
async fn test_reapply_after_withdrawal_is_allowed() {
    let market = Market::new();
    let gig_id = market.gig(GigStatus::Published);
    let applicant = freelancer();

    let first = market
        .lifecycle
        .submit_application(&applicant, bid(gig_id))
        .await
        .unwrap();
    market
        .lifecycle
        .withdraw_application(&applicant, first.id)
        .await
        .unwrap();

    let second = market
        .lifecycle
        .submit_application(&applicant, bid(gig_id))
        .await
        .unwrap();

    assert_ne!(first.id, second.id);
    assert_eq!(market.count(gig_id), 1);
}

#[tokio::test]
async fn test_submit_to_unpublished_gig_is_invalid_state() {
    let market = Market::new();

    for status in [
        GigStatus::Draft,
        GigStatus::InProgress,
        GigStatus::Completed,
        GigStatus::Cancelled,
    ] {
        let gig_id = market.gig(status);
        let err = market
            .lifecycle
            .submit_application(&freelancer(), bid(gig_id))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)), "{status:?}");
    }
}

#[tokio::test]
async fn test_submit_to_missing_gig_is_not_found() {
    let market = Market::new();
    let err = market
        .lifecycle
        .submit_application(&freelancer(), bid(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_owner_cannot_apply_to_own_gig() {
    let market = Market::new();
    let gig_id = market.gig_owned_by(market.admin.id, GigStatus::Published);

    let err = market
        .lifecycle
        .submit_application(&market.admin, bid(gig_id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn test_clients_cannot_apply() {
    let market = Market::new();
    let gig_id = market.gig(GigStatus::Published);
    let other_client = Actor::new(Uuid::new_v4(), Role::Client);

    let err = market
        .lifecycle
        .submit_application(&other_client, bid(gig_id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Authorization(_)));
}

// ── decide ──

#[tokio::test]
async fn test_accept_rejects_pending_siblings_and_starts_gig() {
    let market = Market::new();
    let gig_id = market.gig(GigStatus::Published);
    let target = market.seed_application(gig_id, ApplicationStatus::Pending, 30);
    let pending = market.seed_application(gig_id, ApplicationStatus::Pending, 20);
    let withdrawn = market.seed_application(gig_id, ApplicationStatus::Withdrawn, 10);
    let rejected = market.seed_application(gig_id, ApplicationStatus::Rejected, 5);

    let accepted = market
        .lifecycle
        .decide_application(&market.client, target, decision(Decision::Accepted, Some("Great portfolio")))
        .await
        .unwrap();

    assert_eq!(accepted.status, ApplicationStatus::Accepted);
    assert_eq!(accepted.feedback.as_deref(), Some("Great portfolio"));
    assert_eq!(market.status_of(pending), ApplicationStatus::Rejected);
    assert_eq!(market.status_of(withdrawn), ApplicationStatus::Withdrawn);
    assert_eq!(market.status_of(rejected), ApplicationStatus::Rejected);
    assert_eq!(market.store.gig(gig_id).unwrap().status, GigStatus::InProgress);

    let accepted_count = market
        .store
        .applications_for(gig_id)
        .iter()
        .filter(|a| a.status == ApplicationStatus::Accepted)
        .count();
    assert_eq!(accepted_count, 1);
}

#[tokio::test]
async fn test_no_second_acceptance_once_gig_started() {
    let market = Market::new();
    let gig_id = market.gig(GigStatus::Published);
    let first = market.seed_application(gig_id, ApplicationStatus::Pending, 2);
    let second = market.seed_application(gig_id, ApplicationStatus::Pending, 1);

    market
        .lifecycle
        .decide_application(&market.client, first, decision(Decision::Accepted, None))
        .await
        .unwrap();
    let err = market
        .lifecycle
        .decide_application(&market.admin, second, decision(Decision::Accepted, None))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InvalidState(_)));
    assert_eq!(market.status_of(second), ApplicationStatus::Rejected);
}

#[tokio::test]
async fn test_reject_touches_only_target() {
    let market = Market::new();
    let gig_id = market.gig(GigStatus::Published);
    let target = market.seed_application(gig_id, ApplicationStatus::Pending, 2);
    let other = market.seed_application(gig_id, ApplicationStatus::Pending, 1);

    let rejected = market
        .lifecycle
        .decide_application(&market.client, target, decision(Decision::Rejected, None))
        .await
        .unwrap();

    assert_eq!(rejected.status, ApplicationStatus::Rejected);
    assert_eq!(market.status_of(other), ApplicationStatus::Pending);
    assert_eq!(market.store.gig(gig_id).unwrap().status, GigStatus::Published);
}

#[tokio::test]
async fn test_pending_decision_only_updates_feedback() {
    let market = Market::new();
    let gig_id = market.gig(GigStatus::Published);
    let target = market.seed_application(gig_id, ApplicationStatus::Pending, 1);

    let updated = market
        .lifecycle
        .decide_application(&market.client, target, decision(Decision::Pending, Some("Shortlisted")))
        .await
        .unwrap();

    assert_eq!(updated.status, ApplicationStatus::Pending);
    assert_eq!(updated.feedback.as_deref(), Some("Shortlisted"));
}

#[tokio::test]
async fn test_decided_application_cannot_be_decided_again() {
    let market = Market::new();
    let gig_id = market.gig(GigStatus::Published);
    let target = market.seed_application(gig_id, ApplicationStatus::Rejected, 1);

    let err = market
        .lifecycle
        .decide_application(&market.client, target, decision(Decision::Accepted, None))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InvalidState(_)));
    assert_eq!(err.to_string(), "Application is already rejected");
}

#[tokio::test]
async fn test_only_owner_or_admin_decides() {
    let market = Market::new();
    let gig_id = market.gig(GigStatus::Published);
    let applicant = freelancer();
    let application = market
        .lifecycle
        .submit_application(&applicant, bid(gig_id))
        .await
        .unwrap();

    let stranger = Actor::new(Uuid::new_v4(), Role::Client);
    for actor in [stranger, applicant] {
        let err = market
            .lifecycle
            .decide_application(&actor, application.id, decision(Decision::Accepted, None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));
    }

    let decided = market
        .lifecycle
        .decide_application(&market.admin, application.id, decision(Decision::Rejected, None))
        .await
        .unwrap();
    assert_eq!(decided.status, ApplicationStatus::Rejected);
}

#[tokio::test]
async fn test_decide_missing_application_is_not_found() {
    let market = Market::new();
    let err = market
        .lifecycle
        .decide_application(&market.admin, Uuid::new_v4(), decision(Decision::Accepted, None))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

// ── withdraw ──

#[tokio::test]
async fn test_withdraw_pending_decrements_count_by_one() {
    let market = Market::new();
    let gig_id = market.gig(GigStatus::Published);
    let applicant = freelancer();
    let application = market
        .lifecycle
        .submit_application(&applicant, bid(gig_id))
        .await
        .unwrap();
    market
        .lifecycle
        .submit_application(&freelancer(), bid(gig_id))
        .await
        .unwrap();
    assert_eq!(market.count(gig_id), 2);

    let withdrawn = market
        .lifecycle
        .withdraw_application(&applicant, application.id)
        .await
        .unwrap();

    assert_eq!(withdrawn.status, ApplicationStatus::Withdrawn);
    assert_eq!(market.count(gig_id), 1);
}

#[tokio::test]
async fn test_withdraw_rejected_is_allowed() {
    let market = Market::new();
    let gig_id = market.gig(GigStatus::Published);
    let applicant = freelancer();
    let application = market
        .lifecycle
        .submit_application(&applicant, bid(gig_id))
        .await
        .unwrap();
    market
        .lifecycle
        .decide_application(&market.client, application.id, decision(Decision::Rejected, None))
        .await
        .unwrap();

    market
        .lifecycle
        .withdraw_application(&applicant, application.id)
        .await
        .unwrap();

    assert_eq!(market.status_of(application.id), ApplicationStatus::Withdrawn);
    assert_eq!(market.count(gig_id), 0);
}

#[tokio::test]
async fn test_withdraw_accepted_always_fails() {
    let market = Market::new();
    let gig_id = market.gig(GigStatus::Published);
    let applicant = freelancer();
    let application = market
        .lifecycle
        .submit_application(&applicant, bid(gig_id))
        .await
        .unwrap();
    market
        .lifecycle
        .decide_application(&market.client, application.id, decision(Decision::Accepted, None))
        .await
        .unwrap();

    let err = market
        .lifecycle
        .withdraw_application(&applicant, application.id)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InvalidState(_)));
    assert_eq!(err.to_string(), "Cannot withdraw accepted application");
    assert_eq!(market.status_of(application.id), ApplicationStatus::Accepted);
    assert_eq!(market.count(gig_id), 1);
}

#[tokio::test]
async fn test_withdraw_twice_is_invalid_state() {
    let market = Market::new();
    let gig_id = market.gig(GigStatus::Published);
    let applicant = freelancer();
    let application = market
        .lifecycle
        .submit_application(&applicant, bid(gig_id))
        .await
        .unwrap();

    market
        .lifecycle
        .withdraw_application(&applicant, application.id)
        .await
        .unwrap();
    let err = market
        .lifecycle
        .withdraw_application(&applicant, application.id)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InvalidState(_)));
    assert_eq!(market.count(gig_id), 0);
}

#[tokio::test]
async fn test_only_applicant_withdraws() {
    let market = Market::new();
    let gig_id = market.gig(GigStatus::Published);
    let application = market
        .lifecycle
        .submit_application(&freelancer(), bid(gig_id))
        .await
        .unwrap();

    for actor in [market.admin, market.client, freelancer()] {
        let err = market
            .lifecycle
            .withdraw_application(&actor, application.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));
    }
    assert_eq!(market.status_of(application.id), ApplicationStatus::Pending);
}

// ── gigs ──

#[tokio::test]
async fn test_owner_cannot_delete_gig_in_progress() {
    let market = Market::new();
    let gig_id = market.gig(GigStatus::InProgress);

    let err = market
        .lifecycle
        .delete_gig(&market.client, gig_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
    assert_eq!(err.status().as_u16(), 400);

    let cancelled = market.lifecycle.delete_gig(&market.admin, gig_id).await.unwrap();
    assert_eq!(cancelled.status, GigStatus::Cancelled);
}

#[tokio::test]
async fn test_delete_is_a_soft_cancel() {
    let market = Market::new();
    let draft = market.gig(GigStatus::Draft);
    let published = market.gig(GigStatus::Published);

    for gig_id in [draft, published] {
        let cancelled = market.lifecycle.delete_gig(&market.client, gig_id).await.unwrap();
        assert_eq!(cancelled.status, GigStatus::Cancelled);
        assert!(market.store.gig(gig_id).is_some());
    }

    let err = market
        .lifecycle
        .delete_gig(&market.client, draft)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Gig is already cancelled");
}

#[tokio::test]
async fn test_stranger_cannot_delete_gig() {
    let market = Market::new();
    let gig_id = market.gig(GigStatus::Published);
    let stranger = Actor::new(Uuid::new_v4(), Role::Client);

    let err = market.lifecycle.delete_gig(&stranger, gig_id).await.unwrap_err();
    assert!(matches!(err, AppError::Authorization(_)));

    let err = market
        .lifecycle
        .delete_gig(&stranger, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_complete_only_from_in_progress() {
    let market = Market::new();
    let started = market.gig(GigStatus::InProgress);
    let published = market.gig(GigStatus::Published);

    let completed = market.lifecycle.complete_gig(&market.client, started).await.unwrap();
    assert_eq!(completed.status, GigStatus::Completed);

    let err = market
        .lifecycle
        .complete_gig(&market.client, published)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    let err = market
        .lifecycle
        .delete_gig(&market.admin, started)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Gig is already completed");
}

#[tokio::test]
async fn test_update_publishes_draft() {
    let market = Market::new();
    let gig_id = market.gig(GigStatus::Draft);

    let patch = GigPatch {
        title: Some("Pre-wedding shoot".to_string()),
        status: Some(GigStatus::Published),
        ..Default::default()
    };
    let updated = market
        .lifecycle
        .update_gig(&market.client, gig_id, patch)
        .await
        .unwrap();

    assert_eq!(updated.status, GigStatus::Published);
    assert_eq!(updated.title, "Pre-wedding shoot");
    assert_eq!(updated.budget_amount, 25_000.0);
}

#[tokio::test]
async fn test_update_cannot_unpublish() {
    let market = Market::new();
    let gig_id = market.gig(GigStatus::Published);

    let patch = GigPatch {
        status: Some(GigStatus::Draft),
        ..Default::default()
    };
    let err = market
        .lifecycle
        .update_gig(&market.client, gig_id, patch)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InvalidState(_)));
    assert_eq!(market.store.gig(gig_id).unwrap().status, GigStatus::Published);
}

#[tokio::test]
async fn test_closed_gigs_are_frozen() {
    let market = Market::new();
    let gig_id = market.gig(GigStatus::Completed);

    let patch = GigPatch {
        title: Some("Changed after the fact".to_string()),
        ..Default::default()
    };
    let err = market
        .lifecycle
        .update_gig(&market.admin, gig_id, patch)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InvalidState(_)));
    assert_eq!(err.to_string(), "Cannot edit a completed gig");
}

#[tokio::test]
async fn test_stranger_cannot_update_gig() {
    let market = Market::new();
    let gig_id = market.gig(GigStatus::Draft);
    let stranger = Actor::new(Uuid::new_v4(), Role::Client);

    let err = market
        .lifecycle
        .update_gig(&stranger, gig_id, GigPatch::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Authorization(_)));
}

#[tokio::test]
async fn test_hourly_bounds_checked_against_stored_gig() {
    let market = Market::new();
    let gig_id = market.gig(GigStatus::Published);
    let mut gig = market.store.gig(gig_id).unwrap();
    gig.budget_type = BudgetType::Hourly;
    gig.budget_min = Some(100.0);
    gig.budget_max = Some(200.0);
    market.store.insert_gig(gig);

    let patch = GigPatch {
        budget_min: Some(900.0),
        ..Default::default()
    };
    let err = market
        .lifecycle
        .update_gig(&market.client, gig_id, patch)
        .await
        .unwrap_err();

    match err {
        AppError::Validation { details, .. } => assert_eq!(
            details.get("budget_min").map(String::as_str),
            Some("Minimum budget must be less than maximum budget")
        ),
        other => panic!("expected validation error, got {other:?}"),
    }
    let stored = market.store.gig(gig_id).unwrap();
    assert_eq!(stored.budget_min, Some(100.0));
    assert_eq!(stored.budget_max, Some(200.0));

    let widened = GigPatch {
        budget_min: Some(150.0),
        ..Default::default()
    };
    let updated = market
        .lifecycle
        .update_gig(&market.client, gig_id, widened)
        .await
        .unwrap();
    assert_eq!(updated.budget_min, Some(150.0));
}
