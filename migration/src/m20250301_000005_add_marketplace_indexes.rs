use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum Gigs {
    Table,
    Status,
    ClientId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Applications {
    Table,
    GigId,
    FreelancerId,
}

/// One live application per (gig, freelancer). Withdrawn rows do not count,
/// so the index is partial and has to be written as raw SQL.
const ACTIVE_APPLICATION_UNIQUE: &str = "CREATE UNIQUE INDEX IF NOT EXISTS \
     idx_applications_active_gig_freelancer \
     ON applications (gig_id, freelancer_id) WHERE status <> 'withdrawn'";

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Public listing filters on status and sorts by created_at.
        manager
            .create_index(
                Index::create()
                    .name("idx_gigs_status_created_at")
                    .table(Gigs::Table)
                    .col(Gigs::Status)
                    .col(Gigs::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_gigs_client_id")
                    .table(Gigs::Table)
                    .col(Gigs::ClientId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_applications_gig_id")
                    .table(Applications::Table)
                    .col(Applications::GigId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_applications_freelancer_id")
                    .table(Applications::Table)
                    .col(Applications::FreelancerId)
                    .to_owned(),
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(ACTIVE_APPLICATION_UNIQUE)
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP INDEX IF EXISTS idx_applications_active_gig_freelancer")
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_applications_freelancer_id")
                    .table(Applications::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_applications_gig_id")
                    .table(Applications::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_gigs_client_id")
                    .table(Gigs::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_gigs_status_created_at")
                    .table(Gigs::Table)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}
