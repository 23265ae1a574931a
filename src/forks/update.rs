use crate::error::{ForkSyncError, Result};
use crate::git::executor::{SyncOutcome, UpdateExecutor};
use crate::github::types::Fork;
use tracing::{debug, warn};

const SCRATCH_PREFIX: &str = "forksync-";

/// Runs one fork update in a fresh scratch directory on the blocking pool.
/// The directory is removed before this returns, whatever the outcome.
///
/// If the executor's time limit passes first, the update is abandoned and
/// reported as a timeout. The blocking thread removes its directory when it
/// eventually unwinds.
pub async fn update_fork<E>(executor: &E, fork: &Fork) -> Result<SyncOutcome>
where
    E: UpdateExecutor + Clone,
{
    let limit = executor.time_limit();
    let executor = executor.clone();
    let owned = fork.clone();
    let task = tokio::task::spawn_blocking(move || run_in_scratch(&executor, &owned));

    let joined = match limit {
        Some(limit) => match tokio::time::timeout(limit, task).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!(fork = %fork.full_name, secs = limit.as_secs(), "update stalled, abandoning it");
                return Err(ForkSyncError::Timeout {
                    operation: format!("update {}", fork.full_name),
                    secs: limit.as_secs(),
                });
            }
        },
        None => task.await,
    };
    joined.map_err(|e| ForkSyncError::TaskFailed(e.to_string()))?
}

fn run_in_scratch<E: UpdateExecutor>(executor: &E, fork: &Fork) -> Result<SyncOutcome> {
    let scratch = tempfile::Builder::new().prefix(SCRATCH_PREFIX).tempdir()?;
    debug!(fork = %fork.full_name, dir = %scratch.path().display(), "allocated scratch directory");

    let result = executor.update_fork(fork, scratch.path());

    let path = scratch.path().to_path_buf();
    if let Err(e) = scratch.close() {
        warn!(dir = %path.display(), error = %e, "could not remove scratch directory");
    }
    result
}
