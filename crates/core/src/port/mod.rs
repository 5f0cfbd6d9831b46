// Port Layer - Interfaces for external dependencies

pub mod error;
pub mod generation;
pub mod id_provider; // For deterministic testing
pub mod persistence;
pub mod progress;
pub mod time_provider;

// Re-exports
pub use error::PortError;
pub use generation::GenerationPort;
pub use id_provider::IdProvider;
pub use persistence::PersistencePort;
pub use progress::{CancelReason, ProgressEvent, ProgressReporter, ProgressSnapshot};
pub use time_provider::TimeProvider;
