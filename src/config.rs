//! Configuration for the bill-extraction pipeline.
//!
//! Everything the pipeline needs from its environment lives in
//! [`ExtractorConfig`], built once at startup via [`ExtractorConfigBuilder`]
//! or [`ExtractorConfig::from_env`]. Validation happens in `build()`, so a
//! missing API key or endpoint stops the process before the first upload
//! instead of failing every request.

use crate::error::BillScanError;
use std::fmt;

/// Environment variable holding the Gemini API key.
pub const ENV_API_KEY: &str = "GEMINI_API_KEY";
/// Environment variable holding the Gemini `generateContent` endpoint.
pub const ENV_ENDPOINT: &str = "GEMINI_API_ENDPOINT";
pub const ENV_API_TIMEOUT: &str = "BILLSCAN_API_TIMEOUT";
pub const ENV_STORE_TIMEOUT: &str = "BILLSCAN_STORE_TIMEOUT";
pub const ENV_CONCURRENCY: &str = "BILLSCAN_CONCURRENCY";

/// Settings for extracting and persisting bills.
///
/// # Example
/// ```rust
/// use billscan::ExtractorConfig;
///
/// let config = ExtractorConfig::builder()
///     .api_key("test-key")
///     .endpoint("https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent")
///     .api_timeout_secs(45)
///     .build()
///     .unwrap();
/// assert_eq!(config.concurrency, 4);
/// ```
#[derive(Clone)]
pub struct ExtractorConfig {
    /// Credential sent as the `key` query parameter.
    pub api_key: String,

    /// Full URL of the model's `generateContent` method.
    pub endpoint: String,

    /// Timeout for one vision API call in seconds. Default: 60.
    ///
    /// Vision models routinely take 5–20 s on a dense receipt.
    pub api_timeout_secs: u64,

    /// Timeout for one store operation in seconds. Default: 10.
    pub store_timeout_secs: u64,

    /// Uploads processed at once by batch ingestion. Default: 4.
    pub concurrency: usize,

    /// Custom extraction prompt. If None, uses [`crate::prompts::EXTRACTION_PROMPT`].
    pub prompt: Option<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: String::new(),
            api_timeout_secs: 60,
            store_timeout_secs: 10,
            concurrency: 4,
            prompt: None,
        }
    }
}

impl fmt::Debug for ExtractorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractorConfig")
            .field("api_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("store_timeout_secs", &self.store_timeout_secs)
            .field("concurrency", &self.concurrency)
            .field("prompt", &self.prompt.as_ref().map(|p| p.len()))
            .finish()
    }
}

impl ExtractorConfig {
    /// Create a new builder for `ExtractorConfig`.
    pub fn builder() -> ExtractorConfigBuilder {
        ExtractorConfigBuilder {
            config: Self::default(),
        }
    }

    /// Load the configuration from process environment variables.
    ///
    /// `GEMINI_API_KEY` and `GEMINI_API_ENDPOINT` are required; the
    /// `BILLSCAN_*` tuning variables are optional and fall back to defaults
    /// when absent or unparsable.
    pub fn from_env() -> Result<Self, BillScanError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, BillScanError> {
        let mut builder = Self::builder()
            .api_key(lookup(ENV_API_KEY).unwrap_or_default())
            .endpoint(lookup(ENV_ENDPOINT).unwrap_or_default());

        if let Some(secs) = lookup(ENV_API_TIMEOUT).and_then(|v| v.trim().parse().ok()) {
            builder = builder.api_timeout_secs(secs);
        }
        if let Some(secs) = lookup(ENV_STORE_TIMEOUT).and_then(|v| v.trim().parse().ok()) {
            builder = builder.store_timeout_secs(secs);
        }
        if let Some(n) = lookup(ENV_CONCURRENCY).and_then(|v| v.trim().parse().ok()) {
            builder = builder.concurrency(n);
        }

        builder.build()
    }
}

/// Builder for [`ExtractorConfig`].
#[derive(Debug)]
pub struct ExtractorConfigBuilder {
    config: ExtractorConfig,
}

impl ExtractorConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn store_timeout_secs(mut self, secs: u64) -> Self {
        self.config.store_timeout_secs = secs;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = Some(prompt.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(mut self) -> Result<ExtractorConfig, BillScanError> {
        self.config.api_key = self.config.api_key.trim().to_string();
        self.config.endpoint = self.config.endpoint.trim().to_string();
        let c = &self.config;

        if c.api_key.is_empty() || c.endpoint.is_empty() {
            return Err(BillScanError::InvalidConfig(format!(
                "Gemini API key or endpoint is missing.\nSet {ENV_API_KEY} and {ENV_ENDPOINT}."
            )));
        }
        if !c.endpoint.starts_with("http://") && !c.endpoint.starts_with("https://") {
            return Err(BillScanError::InvalidConfig(format!(
                "Endpoint must be an http(s) URL, got '{}'",
                c.endpoint
            )));
        }
        if c.api_timeout_secs == 0 || c.store_timeout_secs == 0 {
            return Err(BillScanError::InvalidConfig(
                "Timeouts must be at least 1 second".into(),
            ));
        }
        if c.prompt.as_deref().is_some_and(|p| p.trim().is_empty()) {
            return Err(BillScanError::InvalidConfig(
                "Custom prompt must not be blank".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const ENDPOINT: &str = "https://example.test/v1beta/models/gemini:generateContent";

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn missing_key_is_fatal() {
        let err = ExtractorConfig::builder()
            .endpoint(ENDPOINT)
            .build()
            .unwrap_err();
        assert!(matches!(err, BillScanError::InvalidConfig(_)));
    }

    #[test]
    fn blank_endpoint_is_fatal() {
        let err = ExtractorConfig::builder()
            .api_key("k")
            .endpoint("   ")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains(ENV_ENDPOINT));
    }

    #[test]
    fn endpoint_must_be_http() {
        let err = ExtractorConfig::builder()
            .api_key("k")
            .endpoint("ftp://nope")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("http(s)"));
    }

    #[test]
    fn zero_timeout_rejected() {
        assert!(ExtractorConfig::builder()
            .api_key("k")
            .endpoint(ENDPOINT)
            .api_timeout_secs(0)
            .build()
            .is_err());
    }

    #[test]
    fn concurrency_clamped_to_one() {
        let c = ExtractorConfig::builder()
            .api_key("k")
            .endpoint(ENDPOINT)
            .concurrency(0)
            .build()
            .unwrap();
        assert_eq!(c.concurrency, 1);
    }

    #[test]
    fn debug_redacts_key() {
        let c = ExtractorConfig::builder()
            .api_key("super-secret")
            .endpoint(ENDPOINT)
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("super-secret"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn from_lookup_reads_all_variables() {
        let c = ExtractorConfig::from_lookup(lookup(&[
            (ENV_API_KEY, " abc "),
            (ENV_ENDPOINT, ENDPOINT),
            (ENV_API_TIMEOUT, "30"),
            (ENV_STORE_TIMEOUT, "5"),
            (ENV_CONCURRENCY, "8"),
        ]))
        .unwrap();
        assert_eq!(c.api_key, "abc");
        assert_eq!(c.api_timeout_secs, 30);
        assert_eq!(c.store_timeout_secs, 5);
        assert_eq!(c.concurrency, 8);
    }

    #[test]
    fn from_lookup_ignores_bad_tuning_values() {
        let c = ExtractorConfig::from_lookup(lookup(&[
            (ENV_API_KEY, "abc"),
            (ENV_ENDPOINT, ENDPOINT),
            (ENV_API_TIMEOUT, "soon"),
        ]))
        .unwrap();
        assert_eq!(c.api_timeout_secs, 60);
    }

    #[test]
    fn from_lookup_without_key_fails() {
        let err = ExtractorConfig::from_lookup(lookup(&[(ENV_ENDPOINT, ENDPOINT)])).unwrap_err();
        assert!(matches!(err, BillScanError::InvalidConfig(_)));
    }
}
