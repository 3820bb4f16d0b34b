pub mod connection;
pub mod migrations;
pub mod repositories;
pub mod store;

pub use connection::{connect_with_settings, DbPool};
pub use repositories::{
    InMemorySessionRepository, RepositoryError, SessionRepository, SqlSessionRepository,
};
pub use store::SessionMemoryStore;
