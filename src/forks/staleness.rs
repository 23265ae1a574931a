use crate::error::Result;
use crate::github::client::RepositoryDirectory;
use crate::github::types::Fork;
use tracing::debug;

/// Result of comparing a fork's default-branch tip with its upstream's.
///
/// Plain SHA equality: a fork with commits of its own reads as `Stale` just
/// like one that is behind. Telling those apart is the executor's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staleness {
    UpToDate { tip: String },
    Stale { fork_tip: String, upstream_tip: String },
}

pub async fn check_staleness<D: RepositoryDirectory>(directory: &D, fork: &Fork) -> Result<Staleness> {
    let fork_tip = directory
        .branch_tip(&fork.owner, &fork.name, &fork.default_branch)
        .await?;
    let upstream_tip = directory
        .branch_tip(&fork.upstream_owner, &fork.name, &fork.default_branch)
        .await?;

    debug!(
        fork = %fork.full_name,
        upstream = %fork.upstream_full_name(),
        %fork_tip,
        %upstream_tip,
        "compared branch tips"
    );

    if fork_tip == upstream_tip {
        Ok(Staleness::UpToDate { tip: fork_tip })
    } else {
        Ok(Staleness::Stale {
            fork_tip,
            upstream_tip,
        })
    }
}
