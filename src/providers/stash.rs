use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::core::{PullRequestInfo, PullRequestRef, ReviewError, RevisionRange};
use crate::providers::{ProviderConfig, PullRequestProvider};

/// Stash / Bitbucket Server REST client.
pub struct StashProvider {
    client: Client,
    base_url: String,
    token: String,
}

#[derive(Deserialize)]
struct StashPullRequest {
    title: String,
    #[serde(default)]
    description: Option<String>,
    links: StashLinks,
}

#[derive(Deserialize)]
struct StashLinks {
    #[serde(rename = "self")]
    self_links: Vec<StashLink>,
}

#[derive(Deserialize)]
struct StashLink {
    href: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StashDiff {
    from_hash: String,
    to_hash: String,
}

impl StashProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, ReviewError> {
        let token = config
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                ReviewError::Authentication("STASH_HTTP_ACCESS_TOKEN is not set".to_string())
            })?;
        let base_url = config
            .base_url
            .as_deref()
            .map(normalize_base_url)
            .ok_or_else(|| ReviewError::Configuration("Base URL is not set".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ReviewError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    /// Project key and repo slug are percent-encoded as single path segments.
    fn pull_request_url(&self, pr: &PullRequestRef, suffix: &[&str]) -> Result<Url, ReviewError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            ReviewError::Configuration(format!("invalid base URL {}: {e}", self.base_url))
        })?;
        let id = pr.id.to_string();
        url.path_segments_mut()
            .map_err(|_| {
                ReviewError::Configuration(format!("base URL {} cannot have a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(["rest", "api", "latest", "projects"])
            .push(&pr.project_key)
            .push("repos")
            .push(&pr.repo_slug)
            .push("pull-requests")
            .push(&id)
            .extend(suffix);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ReviewError> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url.clone())
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| ReviewError::BackendUnavailable(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    ReviewError::Authentication(body)
                }
                s if s.is_client_error() => ReviewError::NotFound(body),
                s => ReviewError::BackendUnavailable(format!("Stash API error ({s}): {body}")),
            });
        }

        response
            .json()
            .await
            .map_err(|e| ReviewError::MalformedResponse(format!("{url}: {e}")))
    }
}

#[async_trait]
impl PullRequestProvider for StashProvider {
    async fn fetch(
        &self,
        pr: &PullRequestRef,
    ) -> Result<(PullRequestInfo, RevisionRange), ReviewError> {
        let pull_request: StashPullRequest = self.get_json(self.pull_request_url(pr, &[])?).await?;
        let diff: StashDiff = self
            .get_json(self.pull_request_url(pr, &["diff"])?)
            .await?;

        let link = pull_request
            .links
            .self_links
            .into_iter()
            .next()
            .map(|l| l.href)
            .ok_or_else(|| {
                ReviewError::MalformedResponse("pull request has no self link".to_string())
            })?;

        let info = PullRequestInfo {
            title: pull_request.title,
            description: pull_request.description.unwrap_or_default(),
            link,
        };
        let range = RevisionRange {
            from: diff.from_hash,
            to: diff.to_hash,
        };

        Ok((info, range))
    }
}

/// Bare hosts (`stash.example.com`) are reached over plain http.
fn normalize_base_url(base_url: &str) -> String {
    let base_url = base_url.trim().trim_end_matches('/');
    if base_url.starts_with("http://") || base_url.starts_with("https://") {
        base_url.to_string()
    } else {
        format!("http://{base_url}")
    }
}
