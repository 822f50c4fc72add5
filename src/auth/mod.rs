pub mod authorization;
pub mod jwks;
pub mod jwt;
pub mod middleware;

pub use authorization::{Actor, Permission};
pub use middleware::AuthenticatedUser;
