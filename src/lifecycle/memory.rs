use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

use super::rules::{plan_decision, plan_submission, plan_transition, plan_update, plan_withdrawal};
use super::store::{DecisionCommand, GigCommand, MarketStore, SubmitCommand, apply_patch};
use crate::errors::{AppError, AppResult};
use crate::models::applications::{self, ApplicationStatus};
use crate::models::gigs;
use crate::validation::schemas::GigPatch;

#[derive(Default)]
struct State {
    gigs: HashMap<Uuid, gigs::Model>,
    applications: HashMap<Uuid, applications::Model>,
}

impl State {
    fn gig(&self, id: Uuid) -> AppResult<&gigs::Model> {
        self.gigs
            .get(&id)
            .ok_or_else(|| AppError::not_found("Gig not found"))
    }

    fn application(&self, id: Uuid) -> AppResult<&applications::Model> {
        self.applications
            .get(&id)
            .ok_or_else(|| AppError::not_found("Application not found"))
    }

    fn has_active(&self, gig_id: Uuid, freelancer_id: Uuid) -> bool {
        self.applications.values().any(|a| {
            a.gig_id == gig_id && a.freelancer_id == freelancer_id && a.status.is_active()
        })
    }

    fn recount(&mut self, gig_id: Uuid) {
        let count = self
            .applications
            .values()
            .filter(|a| a.gig_id == gig_id && a.status.is_active())
            .count() as i32;
        if let Some(gig) = self.gigs.get_mut(&gig_id) {
            gig.applications_count = count;
        }
    }
}

/// A [`MarketStore`] held in process memory. One mutex stands in for the
/// database transaction, so every command is atomic.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_gig(&self, gig: gigs::Model) {
        self.state.lock().gigs.insert(gig.id, gig);
    }

    pub fn insert_application(&self, application: applications::Model) {
        let mut state = self.state.lock();
        let gig_id = application.gig_id;
        state.applications.insert(application.id, application);
        state.recount(gig_id);
    }

    pub fn gig(&self, id: Uuid) -> Option<gigs::Model> {
        self.state.lock().gigs.get(&id).cloned()
    }

    pub fn application(&self, id: Uuid) -> Option<applications::Model> {
        self.state.lock().applications.get(&id).cloned()
    }

    pub fn applications_for(&self, gig_id: Uuid) -> Vec<applications::Model> {
        let state = self.state.lock();
        let mut apps: Vec<_> = state
            .applications
            .values()
            .filter(|a| a.gig_id == gig_id)
            .cloned()
            .collect();
        apps.sort_by_key(|a| a.created_at);
        apps
    }
}

#[async_trait]
impl MarketStore for MemoryStore {
    async fn find_gig(&self, id: Uuid) -> AppResult<Option<gigs::Model>> {
        Ok(self.gig(id))
    }

    async fn find_application(&self, id: Uuid) -> AppResult<Option<applications::Model>> {
        Ok(self.application(id))
    }

    async fn has_active_application(&self, gig_id: Uuid, freelancer_id: Uuid) -> AppResult<bool> {
        Ok(self.state.lock().has_active(gig_id, freelancer_id))
    }

    async fn submit(&self, command: SubmitCommand) -> AppResult<applications::Model> {
        let mut state = self.state.lock();
        let SubmitCommand { actor, input } = command;

        let already_applied = state.has_active(input.gig_id, actor.id);
        plan_submission(&actor, state.gig(input.gig_id)?, already_applied)?;

        let now = Utc::now();
        let application = applications::Model {
            id: Uuid::new_v4(),
            gig_id: input.gig_id,
            freelancer_id: actor.id,
            proposal: input.proposal,
            proposed_rate: input.proposed_rate,
            estimated_duration: input.estimated_duration,
            cover_letter: input.cover_letter,
            status: ApplicationStatus::Pending,
            feedback: None,
            created_at: now,
            updated_at: now,
        };
        state
            .applications
            .insert(application.id, application.clone());
        state.recount(input.gig_id);
        Ok(application)
    }

    async fn apply_decision(&self, command: DecisionCommand) -> AppResult<applications::Model> {
        let mut state = self.state.lock();

        let application = state.application(command.application_id)?;
        let gig = state.gig(application.gig_id)?;
        let plan = plan_decision(gig, application, command.decision, command.feedback)?;
        let now = Utc::now();

        if plan.reject_pending_siblings {
            for sibling in state.applications.values_mut() {
                if sibling.gig_id == plan.gig_id
                    && sibling.id != plan.application_id
                    && sibling.status == ApplicationStatus::Pending
                {
                    sibling.status = ApplicationStatus::Rejected;
                    sibling.updated_at = now;
                }
            }
        }

        if let Some(status) = plan.gig_status {
            if let Some(gig) = state.gigs.get_mut(&plan.gig_id) {
                gig.status = status;
                gig.updated_at = now;
            }
        }

        let application = state
            .applications
            .get_mut(&plan.application_id)
            .ok_or_else(|| AppError::not_found("Application not found"))?;
        application.status = plan.status;
        if plan.feedback.is_some() {
            application.feedback = plan.feedback;
        }
        application.updated_at = now;
        Ok(application.clone())
    }

    async fn withdraw(&self, application_id: Uuid) -> AppResult<applications::Model> {
        let mut state = self.state.lock();
        plan_withdrawal(state.application(application_id)?)?;

        let application = state
            .applications
            .get_mut(&application_id)
            .ok_or_else(|| AppError::not_found("Application not found"))?;
        application.status = ApplicationStatus::Withdrawn;
        application.updated_at = Utc::now();
        let withdrawn = application.clone();

        state.recount(withdrawn.gig_id);
        Ok(withdrawn)
    }

    async fn transition_gig(&self, command: GigCommand) -> AppResult<gigs::Model> {
        let mut state = self.state.lock();
        let status = plan_transition(&command.actor, state.gig(command.gig_id)?, command.transition)?;

        let gig = state
            .gigs
            .get_mut(&command.gig_id)
            .ok_or_else(|| AppError::not_found("Gig not found"))?;
        gig.status = status;
        gig.updated_at = Utc::now();
        Ok(gig.clone())
    }

    async fn update_gig(&self, gig_id: Uuid, patch: GigPatch) -> AppResult<gigs::Model> {
        let mut state = self.state.lock();
        let status = plan_update(state.gig(gig_id)?, &patch)?;

        let gig = state
            .gigs
            .get_mut(&gig_id)
            .ok_or_else(|| AppError::not_found("Gig not found"))?;
        apply_patch(gig, patch, status, Utc::now());
        Ok(gig.clone())
    }
}
