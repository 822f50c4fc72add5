//! Status transitions for gigs and applications.
//!
//! These functions only decide; they never write. A store executes the
//! returned plan and re-runs the same check under its row lock.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::authorization::{Actor, owns_gig};
use crate::errors::{AppError, AppResult};
use crate::models::applications::{self, ApplicationStatus};
use crate::models::gigs::{self, BudgetType, GigStatus};
use crate::validation::schemas::GigPatch;
use crate::validation::single;

/// What a gig owner may do with a pending application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Keep it pending; only the feedback changes.
    Pending,
    Accepted,
    Rejected,
}

impl Decision {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Decision::Pending),
            "accepted" => Some(Decision::Accepted),
            "rejected" => Some(Decision::Rejected),
            _ => None,
        }
    }

    pub fn target_status(self) -> ApplicationStatus {
        match self {
            Decision::Pending => ApplicationStatus::Pending,
            Decision::Accepted => ApplicationStatus::Accepted,
            Decision::Rejected => ApplicationStatus::Rejected,
        }
    }
}

pub fn is_terminal(status: GigStatus) -> bool {
    match status {
        GigStatus::Completed | GigStatus::Cancelled => true,
        GigStatus::Draft | GigStatus::Published | GigStatus::InProgress => false,
    }
}

fn invalid(message: impl Into<String>) -> AppError {
    AppError::InvalidState(message.into())
}

// ── Applications ──

pub fn check_open_for_applications(gig: &gigs::Model) -> AppResult<()> {
    match gig.status {
        GigStatus::Published => Ok(()),
        GigStatus::Draft | GigStatus::InProgress | GigStatus::Completed | GigStatus::Cancelled => {
            Err(invalid("Gig is not available for applications"))
        }
    }
}

/// A freelancer may bid on a published gig that is not theirs, once.
pub fn plan_submission(actor: &Actor, gig: &gigs::Model, already_applied: bool) -> AppResult<()> {
    check_open_for_applications(gig)?;
    if owns_gig(actor, gig) {
        return Err(AppError::Conflict("Cannot apply to your own gig".to_string()));
    }
    if already_applied {
        return Err(AppError::Conflict(
            "You have already applied to this gig".to_string(),
        ));
    }
    Ok(())
}

/// Writes that follow from a decision. Accepting carries two side effects
/// that must commit together with the target update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionPlan {
    pub application_id: Uuid,
    pub gig_id: Uuid,
    pub status: ApplicationStatus,
    pub feedback: Option<String>,
    pub reject_pending_siblings: bool,
    pub gig_status: Option<GigStatus>,
}

pub fn plan_decision(
    gig: &gigs::Model,
    application: &applications::Model,
    decision: Decision,
    feedback: Option<String>,
) -> AppResult<DecisionPlan> {
    match gig.status {
        GigStatus::Published => {}
        GigStatus::Draft | GigStatus::InProgress | GigStatus::Completed | GigStatus::Cancelled => {
            return Err(invalid("Cannot update applications for unpublished gigs"));
        }
    }

    match application.status {
        ApplicationStatus::Pending => {}
        ApplicationStatus::Accepted | ApplicationStatus::Rejected | ApplicationStatus::Withdrawn => {
            return Err(invalid(format!(
                "Application is already {}",
                application.status.as_str()
            )));
        }
    }

    let (reject_pending_siblings, gig_status) = match decision {
        Decision::Accepted => (true, Some(GigStatus::InProgress)),
        Decision::Rejected | Decision::Pending => (false, None),
    };

    Ok(DecisionPlan {
        application_id: application.id,
        gig_id: gig.id,
        status: decision.target_status(),
        feedback,
        reject_pending_siblings,
        gig_status,
    })
}

pub fn plan_withdrawal(application: &applications::Model) -> AppResult<()> {
    match application.status {
        ApplicationStatus::Pending | ApplicationStatus::Rejected => Ok(()),
        ApplicationStatus::Accepted => Err(invalid("Cannot withdraw accepted application")),
        ApplicationStatus::Withdrawn => Err(invalid("Application is already withdrawn")),
    }
}

// ── Gigs ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GigTransition {
    Cancel,
    Complete,
}

/// Resolve the status a gig moves to, or why it cannot.
pub fn plan_transition(actor: &Actor, gig: &gigs::Model, transition: GigTransition) -> AppResult<GigStatus> {
    match transition {
        GigTransition::Cancel => plan_cancel(actor, gig),
        GigTransition::Complete => plan_completion(gig),
    }
}

pub fn plan_cancel(actor: &Actor, gig: &gigs::Model) -> AppResult<GigStatus> {
    match gig.status {
        GigStatus::Draft | GigStatus::Published => Ok(GigStatus::Cancelled),
        GigStatus::InProgress if actor.is_admin() => Ok(GigStatus::Cancelled),
        GigStatus::InProgress => Err(invalid("Cannot delete gig with active work in progress")),
        GigStatus::Completed | GigStatus::Cancelled => Err(invalid(format!(
            "Gig is already {}",
            gig.status.as_str()
        ))),
    }
}

pub fn plan_completion(gig: &gigs::Model) -> AppResult<GigStatus> {
    match gig.status {
        GigStatus::InProgress => Ok(GigStatus::Completed),
        GigStatus::Draft | GigStatus::Published | GigStatus::Completed | GigStatus::Cancelled => {
            Err(invalid("Only gigs in progress can be completed"))
        }
    }
}

/// Status change requested through a gig edit. `None` means unchanged.
pub fn plan_status_change(from: GigStatus, to: GigStatus) -> AppResult<Option<GigStatus>> {
    if from == to {
        return Ok(None);
    }
    match (from, to) {
        (GigStatus::Draft, GigStatus::Published) => Ok(Some(GigStatus::Published)),
        _ => Err(invalid(format!(
            "Cannot change gig status from {} to {}",
            from.as_str(),
            to.as_str()
        ))),
    }
}

/// Closed gigs are frozen. Returns the status the edit moves the gig to.
pub fn plan_update(gig: &gigs::Model, patch: &GigPatch) -> AppResult<Option<GigStatus>> {
    if is_terminal(gig.status) {
        return Err(invalid(format!(
            "Cannot edit a {} gig",
            gig.status.as_str()
        )));
    }
    check_budget_bounds(gig, patch)?;
    match patch.status {
        Some(to) => plan_status_change(gig.status, to),
        None => Ok(None),
    }
}

/// Hourly bounds must stay ordered once the patch is merged onto the gig.
fn check_budget_bounds(gig: &gigs::Model, patch: &GigPatch) -> AppResult<()> {
    let budget_type = patch.budget_type.unwrap_or(gig.budget_type);
    if budget_type != BudgetType::Hourly {
        return Ok(());
    }
    let min = patch.budget_min.or(gig.budget_min);
    let max = patch.budget_max.or(gig.budget_max);
    if let (Some(min), Some(max)) = (min, max) {
        if min >= max {
            return Err(AppError::validation(single(
                "budget_min",
                "Minimum budget must be less than maximum budget",
            )));
        }
    }
    Ok(())
}
