// HTTP generation client
// POSTs each job payload to the generation endpoint and classifies failures
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use bulkgen_core::domain::{Artifact, JobPayload};
use bulkgen_core::port::{GenerationPort, PortError};
use bulkgen_core::{AppError, Result};

const DEFAULT_TIMEOUT_SECS: u64 = 120;
/// Error bodies are truncated to this many characters in messages
const MAX_BODY_IN_MESSAGE: usize = 200;

fn default_endpoint() -> String {
    "http://localhost:8080/v1/generate".to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// `[generation]` configuration section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpGenerationConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Sent as a bearer token when present
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HttpGenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Map a non-success status to the port error taxonomy
///
/// 429 is rate limiting; 401, 402 and 403 mean no further request can
/// succeed; everything else only fails the job at hand.
pub fn classify_status(status: StatusCode, detail: &str) -> PortError {
    let message = if detail.is_empty() {
        format!("HTTP {}", status)
    } else {
        format!("HTTP {}: {}", status, detail)
    };
    match status {
        StatusCode::TOO_MANY_REQUESTS => PortError::RateLimited(message),
        StatusCode::UNAUTHORIZED | StatusCode::PAYMENT_REQUIRED | StatusCode::FORBIDDEN => {
            PortError::Fatal(message)
        }
        _ => PortError::Transient(message),
    }
}

fn classify_transport(err: &reqwest::Error) -> PortError {
    if err.is_timeout() {
        PortError::Transient(format!("generation request timed out: {}", err))
    } else if err.is_connect() {
        PortError::Transient(format!("could not reach generation endpoint: {}", err))
    } else {
        PortError::Transient(format!("generation request failed: {}", err))
    }
}

fn truncate(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX_BODY_IN_MESSAGE) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

/// Generation port over HTTP
///
/// The job payload is sent as the JSON request body; the JSON response body
/// becomes the artifact.
#[derive(Clone)]
pub struct HttpGenerationClient {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl HttpGenerationClient {
    /// Build a client from its configuration section
    ///
    /// # Errors
    /// - AppError::Config if the endpoint is not a valid URL or the client cannot be built
    pub fn new(config: &HttpGenerationConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint).map_err(|e| {
            AppError::Config(format!(
                "invalid generation endpoint '{}': {}",
                config.endpoint, e
            ))
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| AppError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl GenerationPort for HttpGenerationClient {
    async fn generate(&self, payload: &JobPayload) -> std::result::Result<Artifact, PortError> {
        let mut request = self
            .client
            .post(self.endpoint.clone())
            .json(payload.as_value());
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            let err = classify_transport(&e);
            warn!(endpoint = %self.endpoint, error = %err, "Generation request failed");
            err
        })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            // Best effort: the status alone is enough to classify
            let body = response.text().await.unwrap_or_default();
            let mut detail = truncate(&body);
            if let Some(after) = retry_after {
                if detail.is_empty() {
                    detail = format!("retry after {}", after);
                } else {
                    detail = format!("{} (retry after {})", detail, after);
                }
            }
            let err = classify_status(status, &detail);
            warn!(
                status = status.as_u16(),
                kind = %err.kind(),
                "Generation endpoint returned error status"
            );
            return Err(err);
        }

        let value = response.json::<serde_json::Value>().await.map_err(|e| {
            PortError::Transient(format!("failed to decode generation response: {}", e))
        })?;

        debug!(status = status.as_u16(), "Generation response received");
        Ok(Artifact::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bulkgen_core::domain::ErrorKind;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, api_key: Option<&str>) -> HttpGenerationClient {
        let config = HttpGenerationConfig {
            endpoint: format!("{}/v1/generate", server.uri()),
            api_key: api_key.map(str::to_string),
            timeout_secs: 5,
        };
        HttpGenerationClient::new(&config).expect("client should build")
    }

    fn payload() -> JobPayload {
        JobPayload::new(json!({"topic": "greetings", "level": "A1"}))
    }

    async fn respond_with(status: u16) -> PortError {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/generate"))
            .respond_with(ResponseTemplate::new(status).set_body_string("upstream says no"))
            .mount(&server)
            .await;

        client_for(&server, None)
            .generate(&payload())
            .await
            .expect_err("should fail")
    }

    #[tokio::test]
    async fn test_generate_returns_response_body_as_artifact() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/generate"))
            .and(header("authorization", "Bearer secret-key"))
            .and(body_json(json!({"topic": "greetings", "level": "A1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "title": "Greetings",
                "sections": ["hello", "goodbye"]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let artifact = client_for(&server, Some("secret-key"))
            .generate(&payload())
            .await
            .expect("generate succeeds");

        assert_eq!(artifact.as_value()["title"], "Greetings");
    }

    #[tokio::test]
    async fn test_429_is_rate_limited() {
        let err = respond_with(429).await;
        assert_eq!(err.kind(), ErrorKind::RateLimited);
        assert!(err.message().contains("429"));
    }

    #[tokio::test]
    async fn test_retry_after_is_kept_in_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "30"))
            .mount(&server)
            .await;

        let err = client_for(&server, None)
            .generate(&payload())
            .await
            .expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::RateLimited);
        assert!(err.message().contains("retry after 30"));
    }

    #[tokio::test]
    async fn test_billing_and_auth_errors_are_fatal() {
        for status in [401, 402, 403] {
            let err = respond_with(status).await;
            assert_eq!(err.kind(), ErrorKind::Fatal, "status {}", status);
        }
    }

    #[tokio::test]
    async fn test_server_errors_are_transient() {
        let err = respond_with(503).await;
        assert_eq!(err.kind(), ErrorKind::Transient);
        assert!(err.message().contains("upstream says no"));
    }

    #[tokio::test]
    async fn test_undecodable_body_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server, None)
            .generate(&payload())
            .await
            .expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::Transient);
        assert!(err.message().contains("decode"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transient() {
        let config = HttpGenerationConfig {
            // Port 9 (discard) is closed on test machines
            endpoint: "http://127.0.0.1:9/v1/generate".to_string(),
            api_key: None,
            timeout_secs: 2,
        };
        let client = HttpGenerationClient::new(&config).expect("client should build");

        let err = client.generate(&payload()).await.expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::Transient);
    }

    #[test]
    fn test_invalid_endpoint_is_config_error() {
        let config = HttpGenerationConfig {
            endpoint: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            HttpGenerationClient::new(&config),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_classify_status_table() {
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, "").kind(),
            ErrorKind::RateLimited
        );
        assert_eq!(
            classify_status(StatusCode::PAYMENT_REQUIRED, "quota").kind(),
            ErrorKind::Fatal
        );
        assert_eq!(
            classify_status(StatusCode::BAD_REQUEST, "").kind(),
            ErrorKind::Transient
        );
        assert_eq!(
            classify_status(StatusCode::NOT_FOUND, "").message(),
            "HTTP 404 Not Found"
        );
    }

    #[test]
    fn test_truncate_long_bodies() {
        let body = "x".repeat(500);
        let truncated = truncate(&body);
        assert_eq!(truncated.len(), MAX_BODY_IN_MESSAGE + 3);
        assert!(truncated.ends_with("..."));
    }
}
