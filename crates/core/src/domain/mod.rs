// Domain Layer - Pure business logic and entities

pub mod error;
pub mod group;
pub mod job;
pub mod run;

// Re-exports
pub use error::DomainError;
pub use group::{GroupKey, GroupMeta, GroupState, GroupStatus};
pub use job::{
    Artifact, ErrorKind, JobDescriptor, JobError, JobId, JobPayload, JobRecord, JobStatus,
    OrderKey,
};
pub use run::{RunPhase, RunStats};
