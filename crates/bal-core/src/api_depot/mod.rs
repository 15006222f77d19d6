//! Api Depot client: habilitations and the revision lifecycle.

mod error;
mod retry;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub use error::{ApiError, ApiResult};
pub use retry::RetryPolicy;

use crate::models::{Habilitation, Revision, RevisionContext};
use crate::util::{is_http_url, normalize_text_option};

/// Connection settings for the depot
#[derive(Clone, PartialEq, Eq)]
pub struct ApiDepotConfig {
    pub url: String,
    pub client_secret: String,
    pub timeout: Duration,
    pub max_attempts: u32,
    pub retry_base: Duration,
}

impl fmt::Debug for ApiDepotConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ApiDepotConfig")
            .field("url", &self.url)
            .field("client_secret", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .field("max_attempts", &self.max_attempts)
            .field("retry_base", &self.retry_base)
            .finish()
    }
}

impl ApiDepotConfig {
    pub fn new(url: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client_secret: client_secret.into(),
            timeout: Duration::from_secs(30),
            max_attempts: 3,
            retry_base: Duration::from_millis(500),
        }
    }

    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: self.retry_base,
        }
    }
}

/// Habilitation endpoints of the depot
#[async_trait]
pub trait HabilitationApi: Send + Sync {
    async fn fetch_habilitation(&self, id: &str) -> ApiResult<Habilitation>;

    async fn create_habilitation(&self, commune: &str) -> ApiResult<Habilitation>;
}

/// Revision endpoints of the depot
#[async_trait]
pub trait RevisionApi: Send + Sync {
    /// The commune's current revision, `None` when it has never been published
    async fn get_current_revision(&self, commune: &str) -> ApiResult<Option<Revision>>;

    /// Current revisions of every commune published since `since`
    async fn get_current_revisions(&self, since: DateTime<Utc>) -> ApiResult<Vec<Revision>>;

    async fn create_revision(
        &self,
        commune: &str,
        context: &RevisionContext,
    ) -> ApiResult<Revision>;

    /// Trigger server-side validation
    async fn compute_revision(&self, revision_id: &str) -> ApiResult<Revision>;

    async fn upload_file(&self, revision_id: &str, bytes: &[u8]) -> ApiResult<()>;

    async fn publish_revision(
        &self,
        revision_id: &str,
        habilitation_id: &str,
    ) -> ApiResult<Revision>;
}

#[derive(Serialize)]
struct CreateRevisionBody<'a> {
    context: &'a RevisionContext,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PublishBody<'a> {
    habilitation_id: &'a str,
}

/// reqwest implementation of both depot traits
#[derive(Clone)]
pub struct ApiDepotClient {
    base_url: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl fmt::Debug for ApiDepotClient {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ApiDepotClient")
            .field("base_url", &self.base_url)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl ApiDepotClient {
    pub fn new(config: &ApiDepotConfig) -> ApiResult<Self> {
        let base_url = normalize_base_url(&config.url)?;
        let secret = normalize_text_option(Some(config.client_secret.clone())).ok_or_else(|| {
            ApiError::InvalidConfiguration("client secret must not be empty".to_string())
        })?;

        let mut authorization = HeaderValue::from_str(&format!("Token {secret}")).map_err(|_| {
            ApiError::InvalidConfiguration("client secret is not a valid header value".to_string())
        })?;
        authorization.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, authorization);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            base_url,
            client,
            retry: config.retry_policy(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send_json<T: DeserializeOwned>(
        request: RequestBuilder,
        resource: &str,
    ) -> ApiResult<T> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_response(status, &body, resource));
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|error| ApiError::InvalidPayload(format!("{resource}: {error}")))
    }

    async fn send_empty(request: RequestBuilder, resource: &str) -> ApiResult<()> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::from_response(status, &body, resource))
    }
}

#[async_trait]
impl HabilitationApi for ApiDepotClient {
    async fn fetch_habilitation(&self, id: &str) -> ApiResult<Habilitation> {
        let url = self.url(&format!("/habilitations/{id}"));
        let resource = format!("habilitation {id}");
        self.retry
            .run("fetch_habilitation", || {
                Self::send_json(self.client.get(&url), &resource)
            })
            .await
    }

    async fn create_habilitation(&self, commune: &str) -> ApiResult<Habilitation> {
        let url = self.url(&format!("/communes/{commune}/habilitations"));
        Self::send_json(self.client.post(url), &format!("commune {commune}")).await
    }
}

#[async_trait]
impl RevisionApi for ApiDepotClient {
    async fn get_current_revision(&self, commune: &str) -> ApiResult<Option<Revision>> {
        let url = self.url(&format!("/communes/{commune}/current-revision"));
        let resource = format!("current revision of {commune}");
        let result = self
            .retry
            .run("get_current_revision", || {
                Self::send_json::<Revision>(self.client.get(&url), &resource)
            })
            .await;

        match result {
            Ok(revision) => Ok(Some(revision)),
            Err(ApiError::NotFound(_)) => Ok(None),
            Err(error) => Err(error),
        }
    }

    async fn get_current_revisions(&self, since: DateTime<Utc>) -> ApiResult<Vec<Revision>> {
        let url = self.url("/current-revisions");
        let published_since = since.to_rfc3339_opts(SecondsFormat::Millis, true);
        self.retry
            .run("get_current_revisions", || {
                Self::send_json(
                    self.client
                        .get(&url)
                        .query(&[("publishedSince", published_since.as_str())]),
                    "current revisions",
                )
            })
            .await
    }

    async fn create_revision(
        &self,
        commune: &str,
        context: &RevisionContext,
    ) -> ApiResult<Revision> {
        let url = self.url(&format!("/communes/{commune}/revisions"));
        Self::send_json(
            self.client.post(url).json(&CreateRevisionBody { context }),
            &format!("commune {commune}"),
        )
        .await
    }

    async fn compute_revision(&self, revision_id: &str) -> ApiResult<Revision> {
        let url = self.url(&format!("/revisions/{revision_id}/compute"));
        let resource = format!("revision {revision_id}");
        self.retry
            .run("compute_revision", || {
                Self::send_json(self.client.post(&url), &resource)
            })
            .await
    }

    async fn upload_file(&self, revision_id: &str, bytes: &[u8]) -> ApiResult<()> {
        let url = self.url(&format!("/revisions/{revision_id}/files/bal"));
        let resource = format!("revision {revision_id}");
        self.retry
            .run("upload_file", || {
                Self::send_empty(
                    self.client
                        .put(&url)
                        .header(CONTENT_TYPE, "text/csv")
                        .body(bytes.to_vec()),
                    &resource,
                )
            })
            .await
    }

    async fn publish_revision(
        &self,
        revision_id: &str,
        habilitation_id: &str,
    ) -> ApiResult<Revision> {
        let url = self.url(&format!("/revisions/{revision_id}/publish"));
        Self::send_json(
            self.client
                .post(url)
                .json(&PublishBody { habilitation_id }),
            &format!("revision {revision_id}"),
        )
        .await
    }
}

fn normalize_base_url(raw: &str) -> ApiResult<String> {
    let url = normalize_text_option(Some(raw.to_string())).ok_or_else(|| {
        ApiError::InvalidConfiguration("Api Depot URL must not be empty".to_string())
    })?;
    if is_http_url(&url) {
        Ok(url.trim_end_matches('/').to_string())
    } else {
        Err(ApiError::InvalidConfiguration(
            "Api Depot URL must include http:// or https://".to_string(),
        ))
    }
}
