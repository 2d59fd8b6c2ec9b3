//! Blocking HTTP layer shared by the provider clients.
//!
//! One GET per call and no retries here: retry policy belongs to the batch
//! orchestrator, which decides from the error class whether another attempt is
//! worthwhile. This layer only turns HTTP outcomes into [`FetchError`]s.

use crate::error::FetchError;
use crate::parse::ParseError;
use chrono::NaiveDate;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/108.0.0.0 Safari/537.36";

/// A downloaded response body plus the request it answers.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub url: String,
    /// Date sent to the provider, after any provider-side defaulting.
    pub requested_date: Option<NaiveDate>,
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Body as UTF-8 text with any byte-order mark removed.
    pub fn text(&self) -> Result<&str, ParseError> {
        std::str::from_utf8(&self.body)
            .map(|s| s.trim_start_matches('\u{feff}'))
            .map_err(|e| ParseError::UnexpectedShape(format!("body is not UTF-8: {e}")))
    }
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::blocking::Client,
}

impl HttpClient {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }

    /// GET `url` with query parameters, classifying non-success statuses.
    pub fn get(&self, url: &str, query: &[(&str, String)]) -> Result<Vec<u8>, FetchError> {
        debug!(url, ?query, "GET");
        let resp = self.client.get(url).query(query).send()?;
        let status = resp.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(0);
            return Err(FetchError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(resp.bytes()?.to_vec())
    }

    pub fn get_text(&self, url: &str, query: &[(&str, String)]) -> Result<String, FetchError> {
        let bytes = self.get(url, query)?;
        String::from_utf8(bytes)
            .map(|s| s.trim_start_matches('\u{feff}').to_string())
            .map_err(|e| ParseError::UnexpectedShape(format!("body is not UTF-8: {e}")).into())
    }
}
