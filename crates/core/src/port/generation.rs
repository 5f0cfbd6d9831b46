// Remote Generation Port
// Produces lesson content for one job payload

use super::PortError;
use crate::domain::{Artifact, JobPayload};
use async_trait::async_trait;

/// Generation port
///
/// Implementations:
/// - HttpGenerationClient (bulkgen-infra-http): POSTs the payload to a generation endpoint
///
/// Adapters must map every raw failure into one of the three `PortError` classes.
#[async_trait]
pub trait GenerationPort: Send + Sync {
    /// Generate an artifact for the given payload
    ///
    /// # Errors
    /// - PortError::RateLimited if the service throttled the request
    /// - PortError::Fatal if the whole run must stop (billing, authorization)
    /// - PortError::Transient for anything else
    async fn generate(&self, payload: &JobPayload) -> Result<Artifact, PortError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};
    use tokio::sync::{Notify, Semaphore};

    /// Handle for a generation call held open by the test
    #[derive(Clone)]
    pub struct Hold {
        entered: Arc<Notify>,
        release: Arc<Semaphore>,
    }

    impl Hold {
        fn new() -> Self {
            Self {
                entered: Arc::new(Notify::new()),
                release: Arc::new(Semaphore::new(0)),
            }
        }

        /// Wait until the held call has reached the generator
        pub async fn entered(&self) {
            self.entered.notified().await;
        }

        /// Let the held call return
        pub fn release(&self) {
            self.release.add_permits(1);
        }
    }

    /// Scripted generator keyed by the payload's `topic` field
    ///
    /// Each call pops the next scripted outcome for its topic; once the script
    /// is exhausted the call succeeds with a default artifact.
    #[derive(Default)]
    pub struct ScriptedGenerator {
        scripts: Mutex<HashMap<String, VecDeque<Result<Artifact, PortError>>>>,
        holds: Mutex<HashMap<String, Hold>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn script(
            self,
            topic: impl Into<String>,
            outcomes: Vec<Result<Artifact, PortError>>,
        ) -> Self {
            self.scripts
                .lock()
                .unwrap()
                .insert(topic.into(), outcomes.into_iter().collect());
            self
        }

        /// Block the next call for `topic` until the returned hold is released
        pub fn hold(&self, topic: impl Into<String>) -> Hold {
            let hold = Hold::new();
            self.holds
                .lock()
                .unwrap()
                .insert(topic.into(), hold.clone());
            hold
        }

        /// Topics in call order
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn call_count(&self, topic: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|t| t.as_str() == topic)
                .count()
        }

        pub fn default_artifact(topic: &str) -> Artifact {
            Artifact::new(serde_json::json!({
                "topic": topic,
                "lesson": format!("Generated lesson for {}", topic),
            }))
        }
    }

    fn topic_of(payload: &JobPayload) -> String {
        payload
            .as_value()
            .get("topic")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| payload.as_value().to_string())
    }

    #[async_trait]
    impl GenerationPort for ScriptedGenerator {
        async fn generate(&self, payload: &JobPayload) -> Result<Artifact, PortError> {
            let topic = topic_of(payload);
            self.calls.lock().unwrap().push(topic.clone());

            let hold = self.holds.lock().unwrap().remove(&topic);
            if let Some(hold) = hold {
                hold.entered.notify_one();
                let _permit = hold.release.acquire().await;
            }

            let next = self
                .scripts
                .lock()
                .unwrap()
                .get_mut(&topic)
                .and_then(|script| script.pop_front());

            next.unwrap_or_else(|| Ok(Self::default_artifact(&topic)))
        }
    }
}
