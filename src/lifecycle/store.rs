use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::rules::{Decision, GigTransition};
use crate::auth::authorization::Actor;
use crate::errors::AppResult;
use crate::models::applications;
use crate::models::gigs::{self, GigStatus};
use crate::validation::schemas::{CreateApplication, GigPatch};

#[derive(Debug, Clone)]
pub struct SubmitCommand {
    pub actor: Actor,
    pub input: CreateApplication,
}

/// Decide on one application. For an acceptance the store also rejects the
/// pending siblings and starts the gig, all in one transaction.
#[derive(Debug, Clone)]
pub struct DecisionCommand {
    pub application_id: Uuid,
    pub decision: Decision,
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct GigCommand {
    pub gig_id: Uuid,
    pub actor: Actor,
    pub transition: GigTransition,
}

/// Persistence behind the lifecycle engine.
///
/// Every mutating method locks the gig it touches, re-checks the transition
/// against the locked rows and keeps `applications_count` equal to the
/// number of non-withdrawn applications.
#[async_trait]
pub trait MarketStore: Send + Sync {
    async fn find_gig(&self, id: Uuid) -> AppResult<Option<gigs::Model>>;

    async fn find_application(&self, id: Uuid) -> AppResult<Option<applications::Model>>;

    async fn has_active_application(&self, gig_id: Uuid, freelancer_id: Uuid) -> AppResult<bool>;

    async fn submit(&self, command: SubmitCommand) -> AppResult<applications::Model>;

    async fn apply_decision(&self, command: DecisionCommand) -> AppResult<applications::Model>;

    async fn withdraw(&self, application_id: Uuid) -> AppResult<applications::Model>;

    async fn transition_gig(&self, command: GigCommand) -> AppResult<gigs::Model>;

    async fn update_gig(&self, gig_id: Uuid, patch: GigPatch) -> AppResult<gigs::Model>;
}

/// Copy every field present in `patch` onto `gig`.
pub fn apply_patch(
    gig: &mut gigs::Model,
    patch: GigPatch,
    status: Option<GigStatus>,
    now: DateTime<Utc>,
) {
    let category_id = patch.category_uuid();

    if let Some(title) = patch.title {
        gig.title = title;
    }
    if let Some(description) = patch.description {
        gig.description = description;
    }
    if let Some(category_id) = category_id {
        gig.category_id = category_id;
    }
    if let Some(budget_type) = patch.budget_type {
        gig.budget_type = budget_type;
    }
    if let Some(amount) = patch.budget_amount {
        gig.budget_amount = amount;
    }
    if let Some(min) = patch.budget_min {
        gig.budget_min = Some(min);
    }
    if let Some(max) = patch.budget_max {
        gig.budget_max = Some(max);
    }
    if let Some(deadline) = patch.deadline {
        gig.deadline = Some(deadline);
    }
    if let Some(skills) = patch.skills_required {
        gig.skills_required = skills;
    }
    if let Some(level) = patch.difficulty_level {
        gig.difficulty_level = level;
    }
    if let Some(location_type) = patch.location_type {
        gig.location_type = location_type;
    }
    if let Some(location) = patch.location {
        gig.location = Some(location);
    }
    if let Some(status) = status {
        gig.status = status;
    }
    gig.updated_at = now;
}
