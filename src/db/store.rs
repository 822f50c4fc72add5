use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::*;
use uuid::Uuid;

use super::{applications as application_db, gigs as gig_db};
use crate::errors::{AppError, AppResult};
use crate::lifecycle::rules;
use crate::lifecycle::store::{DecisionCommand, GigCommand, MarketStore, SubmitCommand, apply_patch};
use crate::models::applications::{self, ApplicationStatus};
use crate::models::gigs;
use crate::validation::schemas::GigPatch;

/// Postgres-backed [`MarketStore`]. Each command runs in one transaction
/// that starts by locking the gig row (`SELECT ... FOR UPDATE`); returning
/// early drops the transaction, which rolls it back.
#[derive(Clone)]
pub struct DbStore {
    db: DatabaseConnection,
}

impl DbStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

async fn locked_gig(txn: &DatabaseTransaction, id: Uuid) -> AppResult<gigs::Model> {
    gig_db::lock_gig(txn, id)
        .await?
        .ok_or_else(|| AppError::not_found("Gig not found"))
}

async fn locked_application(
    txn: &DatabaseTransaction,
    id: Uuid,
) -> AppResult<applications::Model> {
    application_db::lock_application(txn, id)
        .await?
        .ok_or_else(|| AppError::not_found("Application not found"))
}

/// Lock the application's gig first, then the application, so every
/// command takes locks in the same order.
async fn lock_for_application(
    txn: &DatabaseTransaction,
    application_id: Uuid,
) -> AppResult<(gigs::Model, applications::Model)> {
    let gig_id = application_db::get_application_by_id(txn, application_id)
        .await?
        .ok_or_else(|| AppError::not_found("Application not found"))?
        .gig_id;
    let gig = locked_gig(txn, gig_id).await?;
    let application = locked_application(txn, application_id).await?;
    Ok((gig, application))
}

#[async_trait]
impl MarketStore for DbStore {
    async fn find_gig(&self, id: Uuid) -> AppResult<Option<gigs::Model>> {
        Ok(gig_db::get_gig_by_id(&self.db, id).await?)
    }

    async fn find_application(&self, id: Uuid) -> AppResult<Option<applications::Model>> {
        Ok(application_db::get_application_by_id(&self.db, id).await?)
    }

    async fn has_active_application(&self, gig_id: Uuid, freelancer_id: Uuid) -> AppResult<bool> {
        Ok(application_db::has_active_application(&self.db, gig_id, freelancer_id).await?)
    }

    async fn submit(&self, command: SubmitCommand) -> AppResult<applications::Model> {
        let SubmitCommand { actor, input } = command;
        let txn = self.db.begin().await?;

        let gig = locked_gig(&txn, input.gig_id).await?;
        let already_applied =
            application_db::has_active_application(&txn, gig.id, actor.id).await?;
        rules::plan_submission(&actor, &gig, already_applied)?;

        let application = application_db::insert_application(&txn, actor.id, input).await?;
        let count = application_db::refresh_applications_count(&txn, gig.id).await?;

        txn.commit().await?;
        tracing::debug!(gig_id = %gig.id, count, "Applications count refreshed");
        Ok(application)
    }

    async fn apply_decision(&self, command: DecisionCommand) -> AppResult<applications::Model> {
        let txn = self.db.begin().await?;

        let (gig, application) = lock_for_application(&txn, command.application_id).await?;
        let plan = rules::plan_decision(&gig, &application, command.decision, command.feedback)?;

        if plan.reject_pending_siblings {
            let rejected =
                application_db::reject_pending_siblings(&txn, plan.gig_id, plan.application_id)
                    .await?;
            tracing::debug!(gig_id = %plan.gig_id, rejected, "Rejected pending siblings");
        }

        if let Some(status) = plan.gig_status {
            gigs::Entity::update_many()
                .col_expr(gigs::Column::Status, Expr::value(status.to_value()))
                .col_expr(gigs::Column::UpdatedAt, Expr::value(chrono::Utc::now()))
                .filter(gigs::Column::Id.eq(plan.gig_id))
                .exec(&txn)
                .await?;
        }

        let mut active: applications::ActiveModel = application.into();
        active.status = Set(plan.status);
        if let Some(feedback) = plan.feedback {
            active.feedback = Set(Some(feedback));
        }
        active.updated_at = Set(chrono::Utc::now());
        let updated = active.update(&txn).await?;

        txn.commit().await?;
        Ok(updated)
    }

    async fn withdraw(&self, application_id: Uuid) -> AppResult<applications::Model> {
        let txn = self.db.begin().await?;

        let (gig, application) = lock_for_application(&txn, application_id).await?;
        rules::plan_withdrawal(&application)?;

        let mut active: applications::ActiveModel = application.into();
        active.status = Set(ApplicationStatus::Withdrawn);
        active.updated_at = Set(chrono::Utc::now());
        let withdrawn = active.update(&txn).await?;

        application_db::refresh_applications_count(&txn, gig.id).await?;

        txn.commit().await?;
        Ok(withdrawn)
    }

    async fn transition_gig(&self, command: GigCommand) -> AppResult<gigs::Model> {
        let txn = self.db.begin().await?;

        let gig = locked_gig(&txn, command.gig_id).await?;
        let status = rules::plan_transition(&command.actor, &gig, command.transition)?;

        let mut active: gigs::ActiveModel = gig.into();
        active.status = Set(status);
        active.updated_at = Set(chrono::Utc::now());
        let updated = active.update(&txn).await?;

        txn.commit().await?;
        Ok(updated)
    }

    async fn update_gig(&self, gig_id: Uuid, patch: GigPatch) -> AppResult<gigs::Model> {
        let txn = self.db.begin().await?;

        let mut gig = locked_gig(&txn, gig_id).await?;
        let status = rules::plan_update(&gig, &patch)?;
        apply_patch(&mut gig, patch, status, chrono::Utc::now());

        let updated = gigs::ActiveModel::from(gig).reset_all().update(&txn).await?;

        txn.commit().await?;
        Ok(updated)
    }
}
