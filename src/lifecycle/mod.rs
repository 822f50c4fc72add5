//! The application lifecycle engine.
//!
//! Each operation follows the same order: load the rows (NotFound), check
//! the caller's capability (Forbidden), plan the transition (InvalidState or
//! Conflict), then hand a command to the [`MarketStore`], which repeats the
//! plan under its lock and commits atomically.

pub mod memory;
pub mod rules;
pub mod store;

use std::sync::Arc;
use uuid::Uuid;

pub use memory::MemoryStore;
pub use rules::{Decision, DecisionPlan, GigTransition};
pub use store::{DecisionCommand, GigCommand, MarketStore, SubmitCommand};

use crate::auth::authorization::{self as authz, Actor, Permission};
use crate::errors::{AppError, AppResult};
use crate::models::{applications, gigs};
use crate::validation::schemas::{ApplicationDecision, CreateApplication, GigPatch};

#[derive(Clone)]
pub struct Lifecycle {
    store: Arc<dyn MarketStore>,
}

impl Lifecycle {
    pub fn new(store: Arc<dyn MarketStore>) -> Self {
        Self { store }
    }

    async fn gig(&self, id: Uuid) -> AppResult<gigs::Model> {
        self.store
            .find_gig(id)
            .await?
            .ok_or_else(|| AppError::not_found("Gig not found"))
    }

    async fn application(&self, id: Uuid) -> AppResult<applications::Model> {
        self.store
            .find_application(id)
            .await?
            .ok_or_else(|| AppError::not_found("Application not found"))
    }

    /// Load an application together with its gig, for callers that need to
    /// check visibility.
    pub async fn application_with_gig(
        &self,
        id: Uuid,
    ) -> AppResult<(applications::Model, gigs::Model)> {
        let application = self.application(id).await?;
        let gig = self.gig(application.gig_id).await?;
        Ok((application, gig))
    }

    pub async fn submit_application(
        &self,
        actor: &Actor,
        input: CreateApplication,
    ) -> AppResult<applications::Model> {
        authz::require_role(
            actor,
            Permission::CreateApplication.allowed_roles(),
            "Freelancer access required",
        )?;

        let gig = self.gig(input.gig_id).await?;
        let already_applied = self
            .store
            .has_active_application(gig.id, actor.id)
            .await?;
        rules::plan_submission(actor, &gig, already_applied)?;

        let application = self
            .store
            .submit(SubmitCommand {
                actor: *actor,
                input,
            })
            .await?;

        tracing::info!(
            application_id = %application.id,
            gig_id = %application.gig_id,
            "Application submitted"
        );
        Ok(application)
    }

    pub async fn decide_application(
        &self,
        actor: &Actor,
        application_id: Uuid,
        decision: ApplicationDecision,
    ) -> AppResult<applications::Model> {
        let (application, gig) = self.application_with_gig(application_id).await?;
        authz::can_decide(actor, &gig)?;

        let ApplicationDecision { decision, feedback } = decision;
        rules::plan_decision(&gig, &application, decision, feedback.clone())?;

        let updated = self
            .store
            .apply_decision(DecisionCommand {
                application_id,
                decision,
                feedback,
            })
            .await?;

        tracing::info!(
            application_id = %updated.id,
            gig_id = %updated.gig_id,
            status = updated.status.as_str(),
            "Application decided"
        );
        Ok(updated)
    }

    pub async fn withdraw_application(
        &self,
        actor: &Actor,
        application_id: Uuid,
    ) -> AppResult<applications::Model> {
        let application = self.application(application_id).await?;
        authz::can_withdraw(actor, &application)?;
        rules::plan_withdrawal(&application)?;

        let withdrawn = self.store.withdraw(application_id).await?;
        tracing::info!(application_id = %withdrawn.id, "Application withdrawn");
        Ok(withdrawn)
    }

    /// Soft delete: the gig is cancelled, never removed.
    pub async fn delete_gig(&self, actor: &Actor, gig_id: Uuid) -> AppResult<gigs::Model> {
        self.transition(actor, gig_id, GigTransition::Cancel).await
    }

    pub async fn complete_gig(&self, actor: &Actor, gig_id: Uuid) -> AppResult<gigs::Model> {
        self.transition(actor, gig_id, GigTransition::Complete)
            .await
    }

    async fn transition(
        &self,
        actor: &Actor,
        gig_id: Uuid,
        transition: GigTransition,
    ) -> AppResult<gigs::Model> {
        let gig = self.gig(gig_id).await?;
        authz::can_edit_gig(actor, &gig)?;
        rules::plan_transition(actor, &gig, transition)?;

        let updated = self
            .store
            .transition_gig(GigCommand {
                gig_id,
                actor: *actor,
                transition,
            })
            .await?;

        tracing::info!(gig_id = %updated.id, status = updated.status.as_str(), "Gig status changed");
        Ok(updated)
    }

    pub async fn update_gig(
        &self,
        actor: &Actor,
        gig_id: Uuid,
        patch: GigPatch,
    ) -> AppResult<gigs::Model> {
        let gig = self.gig(gig_id).await?;
        authz::can_edit_gig(actor, &gig)?;
        rules::plan_update(&gig, &patch)?;

        self.store.update_gig(gig_id, patch).await
    }
}
