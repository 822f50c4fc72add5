use sea_orm::sea_query::Expr;
use sea_orm::*;
use uuid::Uuid;

use crate::models::gigs::{self, GigSort, GigStatus, SortOrder};
use crate::validation::schemas::{CreateGig, GigFilters};

/// Insert a new gig owned by `client_id`.
pub async fn insert_gig(
    db: &DatabaseConnection,
    input: CreateGig,
    client_id: Uuid,
) -> Result<gigs::Model, DbErr> {
    let now = chrono::Utc::now();
    let new_gig = gigs::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set(input.title),
        description: Set(input.description),
        category_id: Set(input.category_id),
        client_id: Set(client_id),
        budget_type: Set(input.budget_type),
        budget_amount: Set(input.budget_amount),
        budget_min: Set(input.budget_min),
        budget_max: Set(input.budget_max),
        deadline: Set(input.deadline),
        skills_required: Set(input.skills_required),
        status: Set(input.status),
        difficulty_level: Set(input.difficulty_level),
        location_type: Set(input.location_type),
        location: Set(input.location),
        views: Set(0),
        applications_count: Set(0),
        is_featured: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
    };

    new_gig.insert(db).await
}

/// Fetch a single gig by ID.
pub async fn get_gig_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<gigs::Model>, DbErr> {
    gigs::Entity::find_by_id(id).one(db).await
}

/// Fetch a gig and hold a row lock on it until the transaction ends.
pub async fn lock_gig(txn: &DatabaseTransaction, id: Uuid) -> Result<Option<gigs::Model>, DbErr> {
    gigs::Entity::find_by_id(id).lock_exclusive().one(txn).await
}

/// Published gigs matching `filters`, newest first unless sorted otherwise.
/// Returns the page and the total number of matches.
pub async fn list_published(
    db: &DatabaseConnection,
    filters: &GigFilters,
    page: u64,
    limit: u64,
) -> Result<(Vec<gigs::Model>, u64), DbErr> {
    let mut query = gigs::Entity::find().filter(gigs::Column::Status.eq(GigStatus::Published));

    if let Some(category_id) = filters.category_uuid() {
        query = query.filter(gigs::Column::CategoryId.eq(category_id));
    }
    if let Some(location_type) = filters.location_type {
        query = query.filter(gigs::Column::LocationType.eq(location_type));
    }
    if let Some(level) = filters.difficulty_level {
        query = query.filter(gigs::Column::DifficultyLevel.eq(level));
    }
    if let Some(min) = filters.budget_min {
        query = query.filter(gigs::Column::BudgetAmount.gte(min));
    }
    if let Some(max) = filters.budget_max {
        query = query.filter(gigs::Column::BudgetAmount.lte(max));
    }

    let skills = filters.skill_list();
    if !skills.is_empty() {
        let mut any_skill = Condition::any();
        for skill in skills {
            any_skill = any_skill.add(Expr::cust_with_values("$1 = ANY(skills_required)", [skill]));
        }
        query = query.filter(any_skill);
    }

    if let Some(search) = filters.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search.to_lowercase());
        query = query.filter(Expr::cust_with_values(
            "(LOWER(title) LIKE $1 OR LOWER(description) LIKE $2)",
            [pattern.clone(), pattern],
        ));
    }

    let column = match filters.sort.unwrap_or_default() {
        GigSort::CreatedAt => gigs::Column::CreatedAt,
        GigSort::BudgetAmount => gigs::Column::BudgetAmount,
        GigSort::Deadline => gigs::Column::Deadline,
    };
    let order = match filters.order.unwrap_or_default() {
        SortOrder::Asc => Order::Asc,
        SortOrder::Desc => Order::Desc,
    };

    let paginator = query
        .order_by(column, order)
        .order_by_desc(gigs::Column::Id)
        .paginate(db, limit);
    let total = paginator.num_items().await?;
    let items = paginator.fetch_page(page.saturating_sub(1)).await?;

    Ok((items, total))
}

/// Bump the view counter in place.
pub async fn increment_views(db: &DatabaseConnection, id: Uuid) -> Result<(), DbErr> {
    gigs::Entity::update_many()
        .col_expr(gigs::Column::Views, Expr::cust("views + 1"))
        .filter(gigs::Column::Id.eq(id))
        .exec(db)
        .await?;
    Ok(())
}

/// Number of gigs per status.
pub async fn count_by_status(db: &DatabaseConnection) -> Result<Vec<(GigStatus, u64)>, DbErr> {
    let mut counts = Vec::new();
    for status in GigStatus::iter() {
        let count = gigs::Entity::find()
            .filter(gigs::Column::Status.eq(status))
            .count(db)
            .await?;
        counts.push((status, count));
    }
    Ok(counts)
}
