use crate::error::{ForkSyncError, Result};
use crate::github::client::RepositoryDirectory;
use crate::github::types::{Fork, RepoRecord};
use itertools::Itertools;
use tracing::{debug, warn};

/// Name-based narrowing of the working set, applied before any metadata
/// lookup so filtered repositories cost no API calls.
#[derive(Debug, Clone, Default)]
pub struct ForkFilter {
    pub only: Vec<String>,
    pub exclude: Vec<String>,
}

impl ForkFilter {
    pub fn allows(&self, name: &str) -> bool {
        let included = self.only.is_empty() || self.only.iter().any(|n| n == name);
        included && !self.exclude.iter().any(|n| n == name)
    }

    /// `only` names with no matching fork, comma separated.
    pub fn unmatched(&self, repos: &[RepoRecord]) -> Option<String> {
        let missing = self
            .only
            .iter()
            .filter(|n| !repos.iter().any(|r| r.fork && &r.name == *n))
            .join(", ");
        (!missing.is_empty()).then_some(missing)
    }
}

/// A fork that could not be resolved and was left out of the run.
#[derive(Debug)]
pub struct DroppedFork {
    pub full_name: String,
    pub reason: ForkSyncError,
}

#[derive(Debug, Default)]
pub struct Classification {
    pub forks: Vec<Fork>,
    pub dropped: Vec<DroppedFork>,
}

/// Keeps the fork records, in listing order, and resolves each one's upstream
/// owner. A failed lookup drops that fork only.
pub async fn classify_forks<D: RepositoryDirectory>(
    directory: &D,
    repos: &[RepoRecord],
    filter: &ForkFilter,
) -> Classification {
    let mut classification = Classification::default();
    if let Some(names) = filter.unmatched(repos) {
        warn!(%names, "no fork matches these names");
    }

    for repo in repos.iter().filter(|r| r.fork) {
        if !filter.allows(&repo.name) {
            debug!(fork = %repo.full_name, "filtered out");
            continue;
        }

        match resolve_upstream(directory, repo).await {
            Ok(fork) => {
                debug!(fork = %fork.full_name, upstream = %fork.upstream_owner, "resolved upstream");
                classification.forks.push(fork);
            }
            Err(reason) => {
                warn!(fork = %repo.full_name, error = %reason, "could not resolve upstream, skipping");
                classification.dropped.push(DroppedFork {
                    full_name: repo.full_name.clone(),
                    reason,
                });
            }
        }
    }

    classification
}

async fn resolve_upstream<D: RepositoryDirectory>(directory: &D, repo: &RepoRecord) -> Result<Fork> {
    let full = directory.get_repository(&repo.owner, &repo.name).await?;
    full.parent_owner
        .and_then(|upstream| Fork::from_record(repo, upstream))
        .ok_or_else(|| ForkSyncError::MissingParent(repo.full_name.clone()))
}
