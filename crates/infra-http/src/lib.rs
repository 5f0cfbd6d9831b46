// Bulkgen Infrastructure - HTTP Adapters
// Implements: GenerationPort

pub mod generation_client;

pub use generation_client::{classify_status, HttpGenerationClient, HttpGenerationConfig};
