use sea_orm::*;
use uuid::Uuid;

use crate::models::applications::{self, ApplicationStatus};
use crate::models::gigs;
use crate::validation::schemas::CreateApplication;

/// Whose applications a listing may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationScope {
    All,
    /// Applications to gigs owned by this client.
    ReceivedBy(Uuid),
    /// Applications submitted by this freelancer.
    SubmittedBy(Uuid),
}

pub async fn insert_application<C: ConnectionTrait>(
    db: &C,
    freelancer_id: Uuid,
    input: CreateApplication,
) -> Result<applications::Model, DbErr> {
    let now = chrono::Utc::now();
    let new_application = applications::ActiveModel {
        id: Set(Uuid::new_v4()),
        gig_id: Set(input.gig_id),
        freelancer_id: Set(freelancer_id),
        proposal: Set(input.proposal),
        proposed_rate: Set(input.proposed_rate),
        estimated_duration: Set(input.estimated_duration),
        cover_letter: Set(input.cover_letter),
        status: Set(ApplicationStatus::Pending),
        feedback: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };

    new_application.insert(db).await
}

pub async fn get_application_by_id<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
) -> Result<Option<applications::Model>, DbErr> {
    applications::Entity::find_by_id(id).one(db).await
}

/// Re-read an application under a row lock.
pub async fn lock_application(
    txn: &DatabaseTransaction,
    id: Uuid,
) -> Result<Option<applications::Model>, DbErr> {
    applications::Entity::find_by_id(id)
        .lock_exclusive()
        .one(txn)
        .await
}

fn active_for_gig(gig_id: Uuid) -> Select<applications::Entity> {
    applications::Entity::find()
        .filter(applications::Column::GigId.eq(gig_id))
        .filter(applications::Column::Status.ne(ApplicationStatus::Withdrawn))
}

pub async fn has_active_application<C: ConnectionTrait>(
    db: &C,
    gig_id: Uuid,
    freelancer_id: Uuid,
) -> Result<bool, DbErr> {
    let count = active_for_gig(gig_id)
        .filter(applications::Column::FreelancerId.eq(freelancer_id))
        .count(db)
        .await?;
    Ok(count > 0)
}

/// Recompute `gigs.applications_count` from the applications themselves.
pub async fn refresh_applications_count<C: ConnectionTrait>(
    db: &C,
    gig_id: Uuid,
) -> Result<u64, DbErr> {
    let count = active_for_gig(gig_id).count(db).await?;

    gigs::Entity::update_many()
        .col_expr(
            gigs::Column::ApplicationsCount,
            sea_query::Expr::value(count as i32),
        )
        .col_expr(
            gigs::Column::UpdatedAt,
            sea_query::Expr::value(chrono::Utc::now()),
        )
        .filter(gigs::Column::Id.eq(gig_id))
        .exec(db)
        .await?;

    Ok(count)
}

/// Reject every other pending application on the gig. Returns how many
/// rows changed.
pub async fn reject_pending_siblings<C: ConnectionTrait>(
    db: &C,
    gig_id: Uuid,
    accepted_id: Uuid,
) -> Result<u64, DbErr> {
    let result = applications::Entity::update_many()
        .col_expr(
            applications::Column::Status,
            sea_query::Expr::value(ApplicationStatus::Rejected.to_value()),
        )
        .col_expr(
            applications::Column::UpdatedAt,
            sea_query::Expr::value(chrono::Utc::now()),
        )
        .filter(applications::Column::GigId.eq(gig_id))
        .filter(applications::Column::Id.ne(accepted_id))
        .filter(applications::Column::Status.eq(ApplicationStatus::Pending))
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}

pub async fn list_applications(
    db: &DatabaseConnection,
    scope: ApplicationScope,
    gig_id: Option<Uuid>,
    status: Option<ApplicationStatus>,
    page: u64,
    limit: u64,
) -> Result<(Vec<applications::Model>, u64), DbErr> {
    let mut query = applications::Entity::find();

    query = match scope {
        ApplicationScope::All => query,
        ApplicationScope::ReceivedBy(client_id) => query
            .inner_join(gigs::Entity)
            .filter(gigs::Column::ClientId.eq(client_id)),
        ApplicationScope::SubmittedBy(freelancer_id) => {
            query.filter(applications::Column::FreelancerId.eq(freelancer_id))
        }
    };

    if let Some(gig_id) = gig_id {
        query = query.filter(applications::Column::GigId.eq(gig_id));
    }
    if let Some(status) = status {
        query = query.filter(applications::Column::Status.eq(status));
    }

    let paginator = query
        .order_by_desc(applications::Column::CreatedAt)
        .paginate(db, limit);
    let total = paginator.num_items().await?;
    let items = paginator.fetch_page(page.saturating_sub(1)).await?;

    Ok((items, total))
}

/// Number of applications per status.
pub async fn count_by_status(
    db: &DatabaseConnection,
) -> Result<Vec<(ApplicationStatus, u64)>, DbErr> {
    let mut counts = Vec::new();
    for status in ApplicationStatus::iter() {
        let count = applications::Entity::find()
            .filter(applications::Column::Status.eq(status))
            .count(db)
            .await?;
        counts.push((status, count));
    }
    Ok(counts)
}
