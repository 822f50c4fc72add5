//! Role permissions and ownership capabilities.
//!
//! Everything here is pure: callers load the rows, these functions decide.

use serde::Serialize;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::applications;
use crate::models::gigs::{self, GigStatus};
use crate::models::profiles::{self, Role};

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<&profiles::Model> for Actor {
    fn from(profile: &profiles::Model) -> Self {
        Self::new(profile.id, profile.role)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    CreateGig,
    ViewAllGigs,
    EditOwnGig,
    EditAnyGig,
    DeleteGig,
    CreateApplication,
    ViewAllApplications,
    ManageApplications,
    ViewAllUsers,
    EditUserRole,
    DeleteUser,
    ManageCategories,
    ViewAnalytics,
    SystemSettings,
}

impl Permission {
    pub const ALL: [Permission; 14] = [
        Permission::CreateGig,
        Permission::ViewAllGigs,
        Permission::EditOwnGig,
        Permission::EditAnyGig,
        Permission::DeleteGig,
        Permission::CreateApplication,
        Permission::ViewAllApplications,
        Permission::ManageApplications,
        Permission::ViewAllUsers,
        Permission::EditUserRole,
        Permission::DeleteUser,
        Permission::ManageCategories,
        Permission::ViewAnalytics,
        Permission::SystemSettings,
    ];

    pub fn allowed_roles(self) -> &'static [Role] {
        match self {
            Permission::CreateGig | Permission::EditOwnGig | Permission::ManageApplications => {
                &[Role::Client, Role::Admin]
            }
            Permission::CreateApplication => &[Role::Freelancer, Role::Admin],
            Permission::ViewAllGigs
            | Permission::EditAnyGig
            | Permission::DeleteGig
            | Permission::ViewAllApplications
            | Permission::ViewAllUsers
            | Permission::EditUserRole
            | Permission::DeleteUser
            | Permission::ManageCategories
            | Permission::ViewAnalytics
            | Permission::SystemSettings => &[Role::Admin],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Permission::CreateGig => "CREATE_GIG",
            Permission::ViewAllGigs => "VIEW_ALL_GIGS",
            Permission::EditOwnGig => "EDIT_OWN_GIG",
            Permission::EditAnyGig => "EDIT_ANY_GIG",
            Permission::DeleteGig => "DELETE_GIG",
            Permission::CreateApplication => "CREATE_APPLICATION",
            Permission::ViewAllApplications => "VIEW_ALL_APPLICATIONS",
            Permission::ManageApplications => "MANAGE_APPLICATIONS",
            Permission::ViewAllUsers => "VIEW_ALL_USERS",
            Permission::EditUserRole => "EDIT_USER_ROLE",
            Permission::DeleteUser => "DELETE_USER",
            Permission::ManageCategories => "MANAGE_CATEGORIES",
            Permission::ViewAnalytics => "VIEW_ANALYTICS",
            Permission::SystemSettings => "SYSTEM_SETTINGS",
        }
    }
}

pub fn has_permission(role: Role, permission: Permission) -> bool {
    permission.allowed_roles().contains(&role)
}

pub fn require_permission(actor: &Actor, permission: Permission) -> AppResult<()> {
    if has_permission(actor.role, permission) {
        Ok(())
    } else {
        Err(AppError::forbidden(format!(
            "Access denied. Missing permission: {}",
            permission.as_str()
        )))
    }
}

/// Require one of `roles`, reporting `message` otherwise.
pub fn require_role(actor: &Actor, roles: &[Role], message: &str) -> AppResult<()> {
    if roles.contains(&actor.role) {
        Ok(())
    } else {
        Err(AppError::forbidden(message))
    }
}

fn permission_denied() -> AppError {
    AppError::forbidden("Permission denied")
}

// ── Gigs ──

pub fn owns_gig(actor: &Actor, gig: &gigs::Model) -> bool {
    gig.client_id == actor.id
}

/// Owner or admin.
pub fn can_edit_gig(actor: &Actor, gig: &gigs::Model) -> AppResult<()> {
    if owns_gig(actor, gig) || actor.is_admin() {
        Ok(())
    } else {
        Err(permission_denied())
    }
}

/// Unpublished gigs exist only for their owner and admins; everyone else
/// gets the same answer as for a missing gig.
pub fn gig_visible_to(viewer: Option<&Actor>, gig: &gigs::Model) -> AppResult<()> {
    if gig.status == GigStatus::Published {
        return Ok(());
    }
    match viewer {
        Some(actor) if owns_gig(actor, gig) || actor.is_admin() => Ok(()),
        _ => Err(AppError::not_found("Gig not found")),
    }
}

// ── Applications ──

pub fn is_applicant(actor: &Actor, application: &applications::Model) -> bool {
    application.freelancer_id == actor.id
}

/// Applicant, gig owner or admin.
pub fn can_view_application(
    actor: &Actor,
    application: &applications::Model,
    gig: &gigs::Model,
) -> AppResult<()> {
    if is_applicant(actor, application) || owns_gig(actor, gig) || actor.is_admin() {
        Ok(())
    } else {
        Err(permission_denied())
    }
}

/// Gig owner or admin. The applicant cannot decide on their own bid.
pub fn can_decide(actor: &Actor, gig: &gigs::Model) -> AppResult<()> {
    if owns_gig(actor, gig) || actor.is_admin() {
        Ok(())
    } else {
        Err(permission_denied())
    }
}

/// Only the applicant. Admins do not withdraw on someone's behalf.
pub fn can_withdraw(actor: &Actor, application: &applications::Model) -> AppResult<()> {
    if is_applicant(actor, application) {
        Ok(())
    } else {
        Err(permission_denied())
    }
}

// ── Profiles ──

pub fn can_edit_profile(actor: &Actor, profile_id: Uuid) -> AppResult<()> {
    if actor.id == profile_id || actor.is_admin() {
        Ok(())
    } else {
        Err(permission_denied())
    }
}

pub fn can_change_role(actor: &Actor) -> AppResult<()> {
    if has_permission(actor.role, Permission::EditUserRole) {
        Ok(())
    } else {
        Err(AppError::forbidden("Cannot change user role"))
    }
}

pub fn check_deactivation(actor: &Actor, profile_id: Uuid) -> AppResult<()> {
    require_role(
        actor,
        Permission::DeleteUser.allowed_roles(),
        "Admin access required",
    )?;
    if actor.id == profile_id {
        return Err(AppError::BadRequest(
            "Cannot deactivate your own account".to_string(),
        ));
    }
    Ok(())
}
