use sea_orm::*;
use uuid::Uuid;

use crate::models::categories;
use crate::validation::schemas::{CategoryInput, CreateCategory};

/// Active categories, alphabetical.
pub async fn list_active(db: &DatabaseConnection) -> Result<Vec<categories::Model>, DbErr> {
    categories::Entity::find()
        .filter(categories::Column::IsActive.eq(true))
        .order_by_asc(categories::Column::Name)
        .all(db)
        .await
}

pub async fn get_category_by_id(
    db: &DatabaseConnection,
    id: Uuid,
) -> Result<Option<categories::Model>, DbErr> {
    categories::Entity::find_by_id(id).one(db).await
}

pub async fn insert_category(
    db: &DatabaseConnection,
    input: CreateCategory,
) -> Result<categories::Model, DbErr> {
    let now = chrono::Utc::now();
    let new_category = categories::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(input.name),
        description: Set(input.description),
        icon: Set(input.icon),
        slug: Set(input.slug),
        is_active: Set(input.is_active),
        created_at: Set(now),
        updated_at: Set(now),
    };

    new_category.insert(db).await
}

/// Apply a partial update.
pub async fn update_category(
    db: &DatabaseConnection,
    id: Uuid,
    input: CategoryInput,
) -> Result<categories::Model, DbErr> {
    let category = categories::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(DbErr::RecordNotFound("Category not found".to_string()))?;

    let mut active: categories::ActiveModel = category.into();

    if let Some(name) = input.name {
        active.name = Set(name);
    }
    if let Some(description) = input.description {
        active.description = Set(Some(description));
    }
    if let Some(slug) = input.slug {
        active.slug = Set(slug);
    }
    if let Some(icon) = input.icon {
        active.icon = Set(Some(icon));
    }
    if let Some(is_active) = input.is_active {
        active.is_active = Set(is_active);
    }
    active.updated_at = Set(chrono::Utc::now());

    active.update(db).await
}

/// Soft delete.
pub async fn deactivate_category(
    db: &DatabaseConnection,
    id: Uuid,
) -> Result<categories::Model, DbErr> {
    update_category(
        db,
        id,
        CategoryInput {
            is_active: Some(false),
            ..Default::default()
        },
    )
    .await
}
