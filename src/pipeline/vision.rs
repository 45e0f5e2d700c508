//! Vision API interaction: send one receipt image, get the raw envelope back.
//!
//! This stage does one POST and nothing else. It does not retry: a second
//! attempt costs another model call, and whether that is worth it is the
//! caller's decision. It does not unwrap the response either. The envelope
//! goes to [`crate::pipeline::normalize`] untouched, so everything that can
//! go wrong with model output is handled in one place.
//!
//! [`VisionClient`] is the seam the pipeline talks to; [`GeminiClient`] is
//! the HTTP implementation.

use crate::config::ExtractorConfig;
use crate::error::BillScanError;
use crate::pipeline::encode::{build_request, EncodedImage};
use crate::prompts::EXTRACTION_PROMPT;
use async_trait::async_trait;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Anything that can turn an encoded image into a model response envelope.
#[async_trait]
pub trait VisionClient: Send + Sync {
    /// Return the raw response body on success.
    async fn generate(&self, image: &EncodedImage) -> Result<String, BillScanError>;
}

/// Client for Gemini's `generateContent` REST method.
pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    prompt: String,
    timeout_secs: u64,
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("endpoint", &self.endpoint)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Build a client from validated configuration.
    pub fn new(config: &ExtractorConfig) -> Result<Self, BillScanError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| BillScanError::InvalidConfig(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            prompt: config
                .prompt
                .clone()
                .unwrap_or_else(|| EXTRACTION_PROMPT.to_string()),
            timeout_secs: config.api_timeout_secs,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Map a reqwest failure, keeping the URL (and its `key`) out of the message.
    fn transport_error(&self, e: reqwest::Error) -> BillScanError {
        if e.is_timeout() {
            BillScanError::UpstreamTimeout {
                secs: self.timeout_secs,
            }
        } else {
            BillScanError::Upstream {
                status: None,
                body: e.without_url().to_string(),
            }
        }
    }
}

#[async_trait]
impl VisionClient for GeminiClient {
    async fn generate(&self, image: &EncodedImage) -> Result<String, BillScanError> {
        let start = Instant::now();
        let body = build_request(&self.prompt, image);

        info!("Sending request to Gemini endpoint: {}", self.endpoint);
        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            error!(
                "Gemini API request failed with status code {}. Response: {}",
                status, text
            );
            return Err(BillScanError::Upstream {
                status: Some(status.as_u16()),
                body: text,
            });
        }

        info!(
            "Received successful response from Gemini in {}ms",
            start.elapsed().as_millis()
        );
        debug!("Gemini raw response: {}", text);
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(endpoint: &str) -> ExtractorConfig {
        ExtractorConfig::builder()
            .api_key("secret-key")
            .endpoint(endpoint)
            .api_timeout_secs(5)
            .build()
            .unwrap()
    }

    #[test]
    fn uses_default_prompt_unless_overridden() {
        let client = GeminiClient::new(&config("http://127.0.0.1:9/gen")).unwrap();
        assert_eq!(client.prompt, EXTRACTION_PROMPT);

        let mut custom = config("http://127.0.0.1:9/gen");
        custom.prompt = Some("only the total".into());
        let client = GeminiClient::new(&custom).unwrap();
        assert_eq!(client.prompt, "only the total");
    }

    #[test]
    fn debug_hides_key() {
        let client = GeminiClient::new(&config("http://127.0.0.1:9/gen")).unwrap();
        assert!(!format!("{client:?}").contains("secret-key"));
    }

    #[tokio::test]
    async fn connection_refused_is_upstream_without_status() {
        // Reserve a port, then free it so nothing is listening there.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = GeminiClient::new(&config(&format!("http://{addr}/gen"))).unwrap();
        let image = EncodedImage {
            mime_type: "image/png",
            data: "AAAA".into(),
        };
        match client.generate(&image).await {
            Err(BillScanError::Upstream { status: None, body }) => {
                assert!(!body.contains("secret-key"), "key leaked: {body}");
            }
            other => panic!("expected transport failure, got {other:?}"),
        }
    }
}
