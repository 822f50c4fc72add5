use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::*;
use uuid::Uuid;

use crate::models::profiles::{self, CreateProfileFromAuth, DEACTIVATED_BIO, DEACTIVATED_NAME, Role};
use crate::validation::schemas::{AdminUserUpdate, ProfileInput};

/// Create a profile from Supabase Auth JWT claims (called by the auth extractor).
/// Returns the profile and whether this call inserted it. Concurrent first
/// requests race on the insert; the loser reads the winner's row.
pub async fn find_or_create_from_auth(
    db: &DatabaseConnection,
    input: CreateProfileFromAuth,
) -> Result<(profiles::Model, bool), DbErr> {
    if let Some(existing) = profiles::Entity::find_by_id(input.id).one(db).await? {
        return Ok((existing, false));
    }

    let id = input.id;
    let now = chrono::Utc::now();
    let new_profile = profiles::ActiveModel {
        id: Set(input.id),
        email: Set(input.email),
        full_name: Set(input.full_name),
        avatar_url: Set(input.avatar_url),
        role: Set(input.role),
        bio: Set(None),
        skills: Set(Vec::new()),
        location: Set(None),
        phone: Set(None),
        website: Set(None),
        hourly_rate: Set(None),
        rating: Set(None),
        total_earnings: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let inserted = profiles::Entity::insert(new_profile)
        .on_conflict(
            OnConflict::column(profiles::Column::Id)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    let profile = profiles::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("Profile {id} not found after insert")))?;
    Ok((profile, inserted > 0))
}

pub async fn get_profile_by_id(
    db: &DatabaseConnection,
    id: Uuid,
) -> Result<Option<profiles::Model>, DbErr> {
    profiles::Entity::find_by_id(id).one(db).await
}

/// Admin listing with optional role and name/email search.
pub async fn list_profiles(
    db: &DatabaseConnection,
    role: Option<Role>,
    search: Option<&str>,
    page: u64,
    limit: u64,
) -> Result<(Vec<profiles::Model>, u64), DbErr> {
    let mut query = profiles::Entity::find();

    if let Some(role) = role {
        query = query.filter(profiles::Column::Role.eq(role));
    }
    if let Some(search) = search.map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search.to_lowercase());
        query = query.filter(Expr::cust_with_values(
            "(LOWER(COALESCE(full_name, '')) LIKE $1 OR LOWER(email) LIKE $2)",
            [pattern.clone(), pattern],
        ));
    }

    let paginator = query
        .order_by_desc(profiles::Column::CreatedAt)
        .paginate(db, limit);
    let total = paginator.num_items().await?;
    let items = paginator.fetch_page(page.saturating_sub(1)).await?;

    Ok((items, total))
}

async fn load_active(db: &DatabaseConnection, id: Uuid) -> Result<profiles::ActiveModel, DbErr> {
    let profile = profiles::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(DbErr::RecordNotFound("Profile not found".to_string()))?;
    Ok(profile.into())
}

/// Apply a self-service update. Role changes are applied only when the
/// caller already passed the admin check.
pub async fn update_profile(
    db: &DatabaseConnection,
    id: Uuid,
    input: ProfileInput,
) -> Result<profiles::Model, DbErr> {
    let mut active = load_active(db, id).await?;

    if let Some(full_name) = input.full_name {
        active.full_name = Set(Some(full_name));
    }
    if let Some(bio) = input.bio {
        active.bio = Set(Some(bio));
    }
    if let Some(skills) = input.skills {
        active.skills = Set(skills);
    }
    if let Some(location) = input.location {
        active.location = Set(Some(location));
    }
    if let Some(phone) = input.phone {
        active.phone = Set(Some(phone));
    }
    if let Some(website) = input.website {
        active.website = Set(Some(website));
    }
    if let Some(rate) = input.hourly_rate {
        active.hourly_rate = Set(Some(rate));
    }
    if let Some(role) = input.role {
        active.role = Set(role);
    }
    active.updated_at = Set(chrono::Utc::now());

    active.update(db).await
}

pub async fn admin_update_profile(
    db: &DatabaseConnection,
    id: Uuid,
    input: AdminUserUpdate,
) -> Result<profiles::Model, DbErr> {
    let mut active = load_active(db, id).await?;

    if let Some(role) = input.role {
        active.role = Set(role);
    }
    if let Some(full_name) = input.full_name {
        active.full_name = Set(Some(full_name));
    }
    if let Some(bio) = input.bio {
        active.bio = Set(Some(bio));
    }
    active.updated_at = Set(chrono::Utc::now());

    active.update(db).await
}

/// Profiles are never removed; deactivation blanks the public fields.
pub async fn deactivate_profile(
    db: &DatabaseConnection,
    id: Uuid,
) -> Result<profiles::Model, DbErr> {
    let mut active = load_active(db, id).await?;
    active.full_name = Set(Some(DEACTIVATED_NAME.to_string()));
    active.bio = Set(Some(DEACTIVATED_BIO.to_string()));
    active.updated_at = Set(chrono::Utc::now());

    active.update(db).await
}

/// Number of profiles per role.
pub async fn count_by_role(db: &DatabaseConnection) -> Result<Vec<(Role, u64)>, DbErr> {
    let mut counts = Vec::new();
    for role in Role::iter() {
        let count = profiles::Entity::find()
            .filter(profiles::Column::Role.eq(role))
            .count(db)
            .await?;
        counts.push((role, count));
    }
    Ok(counts)
}
