use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Identifiers for the `gigs` table and its columns.
#[derive(DeriveIden)]
enum Gigs {
    Table,
    Id,
    Title,
    Description,
    CategoryId,
    ClientId,
    BudgetType,
    BudgetAmount,
    BudgetMin,
    BudgetMax,
    Deadline,
    SkillsRequired,
    Status,
    DifficultyLevel,
    LocationType,
    Location,
    Views,
    ApplicationsCount,
    IsFeatured,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Categories {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Profiles {
    Table,
    Id,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Gigs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Gigs::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Gigs::Title).string().not_null())
                    .col(ColumnDef::new(Gigs::Description).text().not_null())
                    .col(ColumnDef::new(Gigs::CategoryId).uuid().not_null())
                    .col(ColumnDef::new(Gigs::ClientId).uuid().not_null())
                    .col(ColumnDef::new(Gigs::BudgetType).string().not_null())
                    .col(ColumnDef::new(Gigs::BudgetAmount).double().not_null())
                    .col(ColumnDef::new(Gigs::BudgetMin).double().null())
                    .col(ColumnDef::new(Gigs::BudgetMax).double().null())
                    .col(ColumnDef::new(Gigs::Deadline).timestamp_with_time_zone().null())
                    .col(
                        ColumnDef::new(Gigs::SkillsRequired)
                            .array(ColumnType::Text)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Gigs::Status)
                            .string()
                            .not_null()
                            .default("draft"),
                    )
                    .col(
                        ColumnDef::new(Gigs::DifficultyLevel)
                            .string()
                            .not_null()
                            .default("intermediate"),
                    )
                    .col(
                        ColumnDef::new(Gigs::LocationType)
                            .string()
                            .not_null()
                            .default("remote"),
                    )
                    .col(ColumnDef::new(Gigs::Location).string().null())
                    .col(ColumnDef::new(Gigs::Views).integer().not_null().default(0))
                    .col(
                        ColumnDef::new(Gigs::ApplicationsCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Gigs::IsFeatured)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Gigs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Gigs::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_gigs_category_id")
                            .from(Gigs::Table, Gigs::CategoryId)
                            .to(Categories::Table, Categories::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_gigs_client_id")
                            .from(Gigs::Table, Gigs::ClientId)
                            .to(Profiles::Table, Profiles::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Gigs::Table).to_owned())
            .await
    }
}
