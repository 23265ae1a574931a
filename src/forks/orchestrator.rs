use crate::error::{ForkSyncError, Result};
use crate::forks::classify::{classify_forks, Classification, DroppedFork, ForkFilter};
use crate::forks::staleness::{check_staleness, Staleness};
use crate::forks::update::update_fork;
use crate::git::executor::{SyncOutcome, UpdateExecutor};
use crate::github::client::RepositoryDirectory;
use crate::github::types::Fork;
use crate::report;
use futures::stream::{self, StreamExt};
use std::fmt;
use std::pin::pin;
use tracing::{debug, info, warn};

/// What a staleness or update failure does to the rest of the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Record the failure and move on to the next fork.
    #[default]
    Continue,
    /// Stop at the first failure.
    FailFast,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub policy: FailurePolicy,
    pub dry_run: bool,
    pub check_concurrency: usize,
    pub filter: ForkFilter,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            policy: FailurePolicy::Continue,
            dry_run: false,
            check_concurrency: 1,
            filter: ForkFilter::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Staleness,
    Update,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureStage::Staleness => write!(f, "staleness check"),
            FailureStage::Update => write!(f, "update"),
        }
    }
}

#[derive(Debug)]
pub enum ForkOutcome {
    UpToDate,
    Updated(SyncOutcome),
    /// Stale, but the run was a dry run.
    WouldUpdate,
    Failed {
        stage: FailureStage,
        error: ForkSyncError,
    },
}

#[derive(Debug)]
pub struct ForkReport {
    pub fork: Fork,
    pub outcome: ForkOutcome,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub reports: Vec<ForkReport>,
    pub dropped: Vec<DroppedFork>,
}

impl RunSummary {
    pub fn failures(&self) -> impl Iterator<Item = &ForkReport> {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, ForkOutcome::Failed { .. }))
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    pub fn count(&self, pred: impl Fn(&ForkOutcome) -> bool) -> usize {
        self.reports.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// One audit-and-update pass over the authenticated account's forks.
///
/// Listing failure is fatal. Upstream resolution failures drop the fork.
/// Staleness and update failures follow `options.policy`.
pub async fn run<D, E>(directory: &D, executor: &E, options: &RunOptions) -> Result<RunSummary>
where
    D: RepositoryDirectory,
    E: UpdateExecutor + Clone,
{
    let repos = directory.list_repositories().await?;
    info!(count = repos.len(), "listed repositories");

    let Classification { forks, dropped } = classify_forks(directory, &repos, &options.filter).await;
    info!(forks = forks.len(), dropped = dropped.len(), "classified forks");

    let mut summary = RunSummary {
        reports: Vec::with_capacity(forks.len()),
        dropped,
    };

    // Checks may overlap; `buffered` still yields them in discovery order,
    // and updates below run one at a time.
    let mut checks = pin!(stream::iter(forks)
        .map(|fork| async move {
            let staleness = check_staleness(directory, &fork).await;
            (fork, staleness)
        })
        .buffered(options.check_concurrency.max(1)));

    while let Some((fork, staleness)) = checks.next().await {
        let outcome = match staleness {
            Ok(Staleness::UpToDate { tip }) => {
                debug!(fork = %fork.full_name, %tip, "up to date");
                ForkOutcome::UpToDate
            }
            Ok(Staleness::Stale {
                fork_tip,
                upstream_tip,
            }) => {
                info!(fork = %fork.full_name, %fork_tip, %upstream_tip, "fork is stale");
                report::announce_stale(&fork);
                if options.dry_run {
                    ForkOutcome::WouldUpdate
                } else {
                    match update_fork(executor, &fork).await {
                        Ok(synced) => {
                            info!(fork = %fork.full_name, outcome = %synced, "updated fork");
                            ForkOutcome::Updated(synced)
                        }
                        Err(error) => ForkOutcome::Failed {
                            stage: FailureStage::Update,
                            error,
                        },
                    }
                }
            }
            Err(error) => ForkOutcome::Failed {
                stage: FailureStage::Staleness,
                error,
            },
        };

        if let ForkOutcome::Failed { stage, error } = outcome {
            warn!(fork = %fork.full_name, %stage, %error, "fork failed");
            if options.policy == FailurePolicy::FailFast {
                return Err(ForkSyncError::Aborted {
                    fork: fork.full_name,
                    source: Box::new(error),
                });
            }
            summary.reports.push(ForkReport {
                fork,
                outcome: ForkOutcome::Failed { stage, error },
            });
            continue;
        }

        summary.reports.push(ForkReport { fork, outcome });
    }

    Ok(summary)
}
