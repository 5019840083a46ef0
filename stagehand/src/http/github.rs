//! Commit status reporting on GitHub pull requests

use async_trait::async_trait;
use platform_models::{CommitStatusRequest, PullRequest};
use secrecy::SecretString;
use tokio::sync::OnceCell;
use tracing::debug;
use url::Url;

use crate::deploy::report::StatusUpdate;
use crate::errors::DeployError;
use crate::http::client::{HttpClient, GITHUB_ACCEPT};

/// Status reporter trait for testability
#[async_trait]
pub trait StatusReporter: Send + Sync {
    /// Publish a status for the change request at `pr_url`
    async fn report_status(&self, pr_url: &str, update: &StatusUpdate) -> Result<(), DeployError>;
}

/// Pull request coordinates parsed from its URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRef {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

/// Parse `https://github.com/{owner}/{repo}/pull/{n}` or the API form
/// `https://api.github.com/repos/{owner}/{repo}/pulls/{n}`
pub fn parse_pr_url(pr_url: &str) -> Result<PullRequestRef, DeployError> {
    let invalid = || DeployError::ConfigError(format!("Not a pull request URL: {}", pr_url));

    let url = Url::parse(pr_url).map_err(|_| invalid())?;
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    let (owner, repo, number) = match segments.as_slice() {
        ["repos", owner, repo, "pulls", number] => (owner, repo, number),
        [owner, repo, "pull", number, ..] => (owner, repo, number),
        _ => return Err(invalid()),
    };

    Ok(PullRequestRef {
        owner: owner.to_string(),
        repo: repo.to_string(),
        number: number.parse().map_err(|_| invalid())?,
    })
}

/// Commit status reporter backed by the GitHub REST API
pub struct GithubReporter {
    http: HttpClient,
    context: String,
    target_url: Option<String>,
    head_sha: OnceCell<String>,
}

impl GithubReporter {
    pub fn new(
        api_url: &str,
        token: SecretString,
        context: String,
        target_url: Option<String>,
        commit_sha: Option<String>,
    ) -> Result<Self, DeployError> {
        let head_sha = match commit_sha {
            Some(sha) => OnceCell::new_with(Some(sha)),
            None => OnceCell::new(),
        };

        Ok(Self {
            http: HttpClient::with_token(api_url, GITHUB_ACCEPT, token)?,
            context,
            target_url,
            head_sha,
        })
    }

    /// Resolve the head commit once so every status lands on the same commit
    async fn head_sha(&self, pr: &PullRequestRef) -> Result<&str, DeployError> {
        let sha = self
            .head_sha
            .get_or_try_init(|| async {
                let path = format!("/repos/{}/{}/pulls/{}", pr.owner, pr.repo, pr.number);
                let pull: PullRequest = self.http.get(&path).await?;
                debug!("Resolved PR #{} head to {}", pull.number, pull.head.sha);
                Ok::<_, DeployError>(pull.head.sha)
            })
            .await?;
        Ok(sha.as_str())
    }
}

#[async_trait]
impl StatusReporter for GithubReporter {
    async fn report_status(&self, pr_url: &str, update: &StatusUpdate) -> Result<(), DeployError> {
        let pr = parse_pr_url(pr_url)?;
        let sha = self
            .head_sha(&pr)
            .await
            .map_err(|e| DeployError::ReportingFailure(format!("head commit lookup: {}", e)))?;

        let path = format!("/repos/{}/{}/statuses/{}", pr.owner, pr.repo, sha);
        let request = CommitStatusRequest {
            state: update.state,
            context: self.context.clone(),
            description: update.description.clone(),
            target_url: self.target_url.clone(),
        };

        self.http
            .post_discard(&path, &request)
            .await
            .map_err(|e| DeployError::ReportingFailure(e.to_string()))
    }
}
