use crate::error::{ForkSyncError, Result};
use crate::github::types::RepoRecord;
use octocrab::Octocrab;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

const PER_PAGE: u8 = 100;

/// The three hosting-API operations fork auditing needs, and nothing more.
pub trait RepositoryDirectory {
    /// Repositories owned by the authenticated identity.
    async fn list_repositories(&self) -> Result<Vec<RepoRecord>>;

    /// Full metadata for one repository, including its parent when it is a fork.
    async fn get_repository(&self, owner: &str, name: &str) -> Result<RepoRecord>;

    /// Commit SHA at the tip of `branch`.
    async fn branch_tip(&self, owner: &str, name: &str, branch: &str) -> Result<String>;
}

#[derive(Clone)]
pub struct GitHubClient {
    octo: Octocrab,
    timeout: Duration,
}

#[derive(Deserialize)]
struct BranchResponse {
    commit: BranchCommit,
}

#[derive(Deserialize)]
struct BranchCommit {
    sha: String,
}

impl GitHubClient {
    pub fn new(token: &str, timeout: Duration) -> Result<Self> {
        let octo = Octocrab::builder()
            .personal_token(token.to_string())
            .build()
            .map_err(|e| ForkSyncError::GitHub(e.to_string()))?;

        Ok(Self { octo, timeout })
    }

    #[cfg(test)]
    pub fn with_base_uri(token: &str, base_uri: &str, timeout: Duration) -> Result<Self> {
        let octo = Octocrab::builder()
            .personal_token(token.to_string())
            .base_uri(base_uri)
            .and_then(|b| b.build())
            .map_err(|e| ForkSyncError::GitHub(e.to_string()))?;

        Ok(Self { octo, timeout })
    }

    async fn bounded<T>(
        &self,
        operation: &str,
        call: impl Future<Output = octocrab::Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(|e| ForkSyncError::GitHub(format!("{operation}: {e}"))),
            Err(_) => Err(ForkSyncError::Timeout {
                operation: operation.to_string(),
                secs: self.timeout.as_secs(),
            }),
        }
    }
}

impl RepositoryDirectory for GitHubClient {
    async fn list_repositories(&self) -> Result<Vec<RepoRecord>> {
        let first = self
            .bounded(
                "list repositories",
                self.octo
                    .current()
                    .list_repos_for_authenticated_user()
                    .per_page(PER_PAGE)
                    .send(),
            )
            .await?;
        let repos = self
            .bounded("list repositories", self.octo.all_pages(first))
            .await?;

        debug!(count = repos.len(), "listed repositories");
        Ok(repos.iter().map(RepoRecord::from_octocrab).collect())
    }

    async fn get_repository(&self, owner: &str, name: &str) -> Result<RepoRecord> {
        let operation = format!("get repository {owner}/{name}");
        let repo = self
            .bounded(&operation, self.octo.repos(owner, name).get())
            .await?;
        Ok(RepoRecord::from_octocrab(&repo))
    }

    async fn branch_tip(&self, owner: &str, name: &str, branch: &str) -> Result<String> {
        let operation = format!("get branch {owner}/{name}@{branch}");
        let route = format!("/repos/{owner}/{name}/branches/{branch}");
        let found: BranchResponse = self
            .bounded(&operation, self.octo.get(route, None::<&()>))
            .await?;
        Ok(found.commit.sha)
    }
}
