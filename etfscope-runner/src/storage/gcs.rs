//! Google Cloud Storage backend over the JSON API.
//!
//! Only three calls are needed: list objects by prefix (paged), media upload,
//! and object metadata for existence checks. Credentials are an OAuth bearer
//! token read from the environment variable named in [`StorageSettings`];
//! without one, requests go out unauthenticated (public buckets, emulators).

use super::{StorageError, StorageSettings};
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct GcsClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectList {
    #[serde(default)]
    items: Vec<ObjectEntry>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectEntry {
    name: String,
}

impl GcsClient {
    pub fn new(settings: &StorageSettings) -> Result<Self, StorageError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        let token = std::env::var(&settings.gcs_token_env)
            .ok()
            .filter(|t| !t.trim().is_empty());
        Ok(Self {
            http,
            endpoint: settings.gcs_endpoint.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, StorageError> {
        let mut url = Url::parse(&self.endpoint)
            .map_err(|e| StorageError::InvalidDestination(format!("{}: {e}", self.endpoint)))?;
        url.path_segments_mut()
            .map_err(|_| {
                StorageError::InvalidDestination(format!("{} cannot take a path", self.endpoint))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(
        &self,
        req: reqwest::blocking::RequestBuilder,
    ) -> reqwest::blocking::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    fn check(resp: reqwest::blocking::Response) -> Result<reqwest::blocking::Response, StorageError> {
        let status = resp.status();
        if status.is_success() {
            Ok(resp)
        } else {
            Err(StorageError::GcsStatus {
                status: status.as_u16(),
                url: resp.url().to_string(),
            })
        }
    }

    /// `gs://` URIs of every object under `prefix` ending in `.{extension}`.
    pub fn list(
        &self,
        bucket: &str,
        prefix: &str,
        extension: &str,
    ) -> Result<Vec<String>, StorageError> {
        let url = self.url(&["storage", "v1", "b", bucket, "o"])?;
        let object_prefix = if prefix.is_empty() {
            String::new()
        } else {
            format!("{prefix}/")
        };
        let suffix = format!(".{extension}");

        let mut files = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut query = vec![("prefix", object_prefix.clone())];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }
            debug!(bucket, prefix = %object_prefix, page = ?page_token, "listing objects");
            let resp = self
                .authorize(self.http.get(url.clone()).query(&query))
                .send()?;
            let body = Self::check(resp)?.bytes()?;
            let page: ObjectList = serde_json::from_slice(&body)?;

            files.extend(
                page.items
                    .into_iter()
                    .filter(|o| o.name.ends_with(&suffix))
                    .map(|o| format!("gs://{bucket}/{}", o.name)),
            );
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        Ok(files)
    }

    pub fn upload(
        &self,
        bucket: &str,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let url = self.url(&["upload", "storage", "v1", "b", bucket, "o"])?;
        let resp = self
            .authorize(
                self.http
                    .post(url)
                    .query(&[("uploadType", "media"), ("name", name)])
                    .header(reqwest::header::CONTENT_TYPE, content_type)
                    .body(bytes),
            )
            .send()?;
        Self::check(resp)?;
        Ok(())
    }

    pub fn exists(&self, bucket: &str, name: &str) -> Result<bool, StorageError> {
        let url = self.url(&["storage", "v1", "b", bucket, "o", name])?;
        let resp = self.authorize(self.http.get(url)).send()?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if resp.status() == reqwest::StatusCode::FORBIDDEN && self.token.is_none() {
            warn!(bucket, "object metadata request forbidden; is the token variable set?");
        }
        Self::check(resp).map(|_| true)
    }
}
