use std::env;
use std::time::Duration;

use async_trait::async_trait;
use practice_core::session::CompletionRecord;
use reqwest::{Client, Url};
use serde::Serialize;

use crate::error::ReportError;
use crate::reporter::ProgressReporter;

const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Clone, Debug)]
pub struct HttpReporterConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

impl HttpReporterConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read `PRACTICE_API_BASE_URL`, the optional `PRACTICE_API_TOKEN` and
    /// `PRACTICE_API_TIMEOUT_SECS`.
    ///
    /// Returns `None` when no base URL is set.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("PRACTICE_API_BASE_URL").ok()?;
        if base_url.trim().is_empty() {
            return None;
        }
        let mut config = Self::new(base_url);
        config.token = env::var("PRACTICE_API_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());
        if let Some(secs) = env::var("PRACTICE_API_TIMEOUT_SECS")
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
        {
            config.timeout = Duration::from_secs(secs);
        }
        Some(config)
    }

    /// `{base}/packages/{package}/exercises/{exercise}/complete`, with each
    /// id percent-encoded as a single path segment.
    ///
    /// # Errors
    ///
    /// Returns `ReportError::InvalidUrl` if the base URL cannot carry a path.
    pub fn completion_url(&self, record: &CompletionRecord) -> Result<Url, ReportError> {
        let mut url =
            Url::parse(&self.base_url).map_err(|e| ReportError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| ReportError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend([
                "packages",
                record.package_id.as_str(),
                "exercises",
                record.exercise_id.as_str(),
                "complete",
            ]);
        Ok(url)
    }
}

/// Posts completions to the remote progress API.
#[derive(Clone)]
pub struct HttpProgressReporter {
    client: Client,
    config: Option<HttpReporterConfig>,
}

impl HttpProgressReporter {
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(HttpReporterConfig::from_env())
    }

    #[must_use]
    pub fn new(config: Option<HttpReporterConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }
}

#[async_trait]
impl ProgressReporter for HttpProgressReporter {
    async fn mark_complete(&self, record: &CompletionRecord) -> Result<(), ReportError> {
        let config = self.config.as_ref().ok_or(ReportError::Disabled)?;
        let url = config.completion_url(record)?;
        let payload = CompletePayload {
            score: record.result.score_percentage,
            time_spent: record.result.time_spent_seconds,
            completed_at: record.result.completed_at_rfc3339(),
        };

        let mut request = self
            .client
            .post(url)
            .timeout(config.timeout)
            .json(&payload);
        if let Some(token) = &config.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ReportError::Timeout(config.timeout)
            } else {
                ReportError::Http(e)
            }
        })?;

        if !response.status().is_success() {
            return Err(ReportError::HttpStatus(response.status()));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletePayload {
    score: u8,
    time_spent: u64,
    completed_at: String,
}
