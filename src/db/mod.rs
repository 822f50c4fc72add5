pub mod applications;
pub mod categories;
pub mod gigs;
pub mod profiles;
pub mod store;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

use crate::config::AppConfig;

pub use store::DbStore;

/// Create a SeaORM database connection pool from the loaded configuration.
pub async fn create_pool(config: &AppConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.database_url.clone());
    options
        .connect_timeout(config.db_connect_timeout)
        .acquire_timeout(config.db_connect_timeout)
        .sqlx_logging(false);

    Database::connect(options).await
}
