// Application Layer - Use Cases and Business Logic

pub mod group_tracker;
pub mod orchestrator;
pub mod reporters;
pub mod retry;

// Re-exports
pub use group_tracker::GroupStatusTracker;
pub use orchestrator::{Orchestrator, OrchestratorConfig, PersistenceFailurePolicy, RunController};
pub use reporters::{ChannelReporter, NoopReporter, TracingReporter};
pub use retry::{RetryDecision, RetryPolicy};
