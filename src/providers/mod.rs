pub mod stash;

pub use stash::StashProvider;

use async_trait::async_trait;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::core::{PullRequestInfo, PullRequestRef, ReviewError, RevisionRange};

/// Where the pull request lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    Stash,
    Bitbucket,
    Github,
    Manual,
}

#[async_trait]
pub trait PullRequestProvider: Send + Sync {
    /// PR metadata plus the revision range the local diff is computed over.
    async fn fetch(
        &self,
        pr: &PullRequestRef,
    ) -> Result<(PullRequestInfo, RevisionRange), ReviewError>;
}

#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    pub base_url: Option<String>,
    pub token: Option<String>,
    pub timeout_secs: u64,
}

pub fn create_provider(
    service: Service,
    config: &ProviderConfig,
) -> Result<Box<dyn PullRequestProvider>, ReviewError> {
    match service {
        // Bitbucket Server is the renamed Stash and shares its REST API.
        Service::Stash | Service::Bitbucket => Ok(Box::new(StashProvider::new(config.clone())?)),
        Service::Github => Err(ReviewError::UnsupportedBackend("GitHub".to_string())),
        Service::Manual => Err(ReviewError::UnsupportedBackend("Manual mode".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ProviderConfig {
        ProviderConfig {
            base_url: Some("stash.example.com".to_string()),
            token: Some("token".to_string()),
            timeout_secs: 30,
        }
    }

    #[test]
    fn github_and_manual_are_not_implemented() {
        for service in [Service::Github, Service::Manual] {
            let err = create_provider(service, &config()).err().unwrap();
            assert!(matches!(err, ReviewError::UnsupportedBackend(_)));
        }
    }

    #[test]
    fn stash_and_bitbucket_share_a_provider() {
        assert!(create_provider(Service::Stash, &config()).is_ok());
        assert!(create_provider(Service::Bitbucket, &config()).is_ok());
    }
}
