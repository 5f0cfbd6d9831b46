// Remote Persistence Port
// Durably stores a generated artifact

use super::PortError;
use crate::domain::{Artifact, JobDescriptor};
use async_trait::async_trait;

/// Persistence port
///
/// Implementations:
/// - SqliteArtifactStore (bulkgen-infra-sqlite)
///
/// Failures are `PortError::Transient` unless the adapter classifies them itself.
#[async_trait]
pub trait PersistencePort: Send + Sync {
    async fn persist(&self, descriptor: &JobDescriptor, artifact: &Artifact)
        -> Result<(), PortError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::JobId;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    /// In-memory store with scripted failures per job
    #[derive(Default)]
    pub struct MemoryStore {
        stored: Mutex<Vec<(JobId, Artifact)>>,
        failures: Mutex<HashMap<JobId, VecDeque<PortError>>>,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make the next persist call for `job_id` fail with `error`
        pub fn fail_next(&self, job_id: impl Into<String>, error: PortError) {
            self.failures
                .lock()
                .unwrap()
                .entry(job_id.into())
                .or_default()
                .push_back(error);
        }

        /// Stored job ids in persist order
        pub fn stored_ids(&self) -> Vec<JobId> {
            self.stored
                .lock()
                .unwrap()
                .iter()
                .map(|(id, _)| id.clone())
                .collect()
        }

        pub fn get(&self, job_id: &str) -> Option<Artifact> {
            self.stored
                .lock()
                .unwrap()
                .iter()
                .find(|(id, _)| id == job_id)
                .map(|(_, artifact)| artifact.clone())
        }
    }

    #[async_trait]
    impl PersistencePort for MemoryStore {
        async fn persist(
            &self,
            descriptor: &JobDescriptor,
            artifact: &Artifact,
        ) -> Result<(), PortError> {
            let failure = self
                .failures
                .lock()
                .unwrap()
                .get_mut(&descriptor.id)
                .and_then(|queue| queue.pop_front());
            if let Some(err) = failure {
                return Err(err);
            }

            self.stored
                .lock()
                .unwrap()
                .push((descriptor.id.clone(), artifact.clone()));
            Ok(())
        }
    }
}
