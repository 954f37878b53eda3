use serde::{Deserialize, Serialize};

/// Addresses a single pull request on a source-control backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRef {
    pub repo_slug: String,
    pub id: u64,
    pub project_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestInfo {
    pub title: String,
    /// Empty when the backend has no description for the PR.
    pub description: String,
    pub link: String,
}

/// Commits bounding a pull request: `from` is the commit the branch was cut
/// from, `to` is the last commit of the PR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionRange {
    pub from: String,
    pub to: String,
}
