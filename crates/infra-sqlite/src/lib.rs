// Bulkgen Infrastructure - SQLite Adapter
// Implements: PersistencePort (generated artifacts)

mod artifact_store;
mod connection;
mod error;
mod migration;

pub use artifact_store::{SqliteArtifactStore, StoredArtifact};
pub use connection::create_pool;
pub use migration::run_migrations;
