use crate::error::{ForkSyncError, Result};
use crate::github::types::Fork;
use git2::{Cred, FetchOptions, Oid, PushOptions, RemoteCallbacks, Repository};
use std::cell::RefCell;
use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const ORIGIN: &str = "origin";
const UPSTREAM: &str = "upstream";
const TOKEN_USER: &str = "x-access-token";
const WATCHDOG_SLACK: Duration = Duration::from_secs(5);

/// Performs the version-control side of a fork update inside a scratch directory.
pub trait UpdateExecutor: Send + Sync + 'static {
    fn update_fork(&self, fork: &Fork, scratch: &Path) -> Result<SyncOutcome>;

    /// Wall-clock limit for one whole update, enforced by the caller. Covers
    /// stalls the executor cannot observe itself, such as a hung connect.
    fn time_limit(&self) -> Option<Duration> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Fork branch moved forward to the upstream tip and pushed.
    FastForwarded { from: String, to: String },
    /// Tips matched by the time the branches were fetched.
    AlreadyInSync,
    /// Fork already contains upstream plus commits of its own.
    ForkAhead,
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncOutcome::FastForwarded { from, to } => {
                write!(f, "fast-forwarded {}..{}", short(from), short(to))
            }
            SyncOutcome::AlreadyInSync => write!(f, "already in sync"),
            SyncOutcome::ForkAhead => write!(f, "fork is ahead of upstream"),
        }
    }
}

fn short(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}

/// git2-backed executor. Works in a bare repository: fetches the default
/// branch from the fork and its upstream, fast-forwards when possible and
/// pushes without force.
#[derive(Clone)]
pub struct GitExecutor {
    token: Option<String>,
    remote_base: String,
    timeout: Duration,
}

impl fmt::Debug for GitExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitExecutor")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("remote_base", &self.remote_base)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GitExecutor {
    pub fn new(token: Option<String>, remote_base: &str, timeout: Duration) -> Self {
        Self {
            token,
            remote_base: remote_base.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    fn remote_url(&self, owner: &str, name: &str) -> String {
        format!("{}/{owner}/{name}.git", self.remote_base)
    }

    fn callbacks<'a>(&self, deadline: Instant) -> RemoteCallbacks<'a> {
        let token = self.token.clone();
        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(move |_url, _username_from_url, allowed| match &token {
            Some(token) if allowed.is_user_pass_plaintext() => {
                Cred::userpass_plaintext(TOKEN_USER, token)
            }
            _ => Cred::default(),
        });
        // Returning false from a progress callback cancels the transfer.
        callbacks.transfer_progress(move |_| Instant::now() < deadline);
        callbacks.sideband_progress(move |_| Instant::now() < deadline);
        callbacks
    }

    fn transfer_error(&self, e: git2::Error, operation: String, deadline: Instant) -> ForkSyncError {
        if Instant::now() >= deadline {
            ForkSyncError::Timeout {
                operation,
                secs: self.timeout.as_secs(),
            }
        } else {
            ForkSyncError::Git(e)
        }
    }

    fn fetch_branch(
        &self,
        repo: &Repository,
        remote_name: &str,
        branch: &str,
        deadline: Instant,
    ) -> Result<Oid> {
        let mut remote = repo.find_remote(remote_name)?;
        let tracking = format!("refs/remotes/{remote_name}/{branch}");
        let refspec = format!("+refs/heads/{branch}:{tracking}");

        let mut fo = FetchOptions::new();
        fo.remote_callbacks(self.callbacks(deadline));
        remote
            .fetch(&[refspec.as_str()], Some(&mut fo), None)
            .map_err(|e| self.transfer_error(e, format!("fetch {remote_name}/{branch}"), deadline))?;

        Ok(repo.refname_to_id(&tracking)?)
    }

    fn push_branch(&self, repo: &Repository, branch: &str, deadline: Instant) -> Result<()> {
        let mut remote = repo.find_remote(ORIGIN)?;
        let refname = format!("refs/heads/{branch}");
        // No leading '+': the remote must accept this as a fast-forward.
        let refspec = format!("{refname}:{refname}");
        let rejection: RefCell<Option<String>> = RefCell::new(None);

        {
            let mut callbacks = self.callbacks(deadline);
            callbacks.push_update_reference(|_refname, status| {
                if let Some(msg) = status {
                    *rejection.borrow_mut() = Some(msg.to_string());
                }
                Ok(())
            });
            let mut po = PushOptions::new();
            po.remote_callbacks(callbacks);
            remote
                .push(&[refspec.as_str()], Some(&mut po))
                .map_err(|e| self.transfer_error(e, format!("push {ORIGIN}/{branch}"), deadline))?;
        }

        if let Some(message) = rejection.into_inner() {
            return Err(ForkSyncError::PushRejected { refname, message });
        }
        Ok(())
    }
}

impl UpdateExecutor for GitExecutor {
    fn time_limit(&self) -> Option<Duration> {
        // Slack so the in-transfer deadline normally fires first with a precise error.
        Some(self.timeout + WATCHDOG_SLACK)
    }

    fn update_fork(&self, fork: &Fork, scratch: &Path) -> Result<SyncOutcome> {
        validate_branch_name(&fork.default_branch)?;
        let deadline = Instant::now() + self.timeout;
        let branch = fork.default_branch.as_str();

        let repo = Repository::init_bare(scratch)?;
        repo.remote(ORIGIN, &self.remote_url(&fork.owner, &fork.name))?;
        repo.remote(UPSTREAM, &self.remote_url(&fork.upstream_owner, &fork.name))?;

        let fork_tip = self.fetch_branch(&repo, ORIGIN, branch, deadline)?;
        let upstream_tip = self.fetch_branch(&repo, UPSTREAM, branch, deadline)?;
        debug!(fork = %fork.full_name, %fork_tip, %upstream_tip, "fetched branch tips");

        if fork_tip == upstream_tip {
            return Ok(SyncOutcome::AlreadyInSync);
        }

        if repo.graph_descendant_of(upstream_tip, fork_tip)? {
            repo.reference(
                &format!("refs/heads/{branch}"),
                upstream_tip,
                true,
                "forksync: fast-forward to upstream",
            )?;
            self.push_branch(&repo, branch, deadline)?;
            info!(fork = %fork.full_name, branch, "pushed fast-forward");
            return Ok(SyncOutcome::FastForwarded {
                from: fork_tip.to_string(),
                to: upstream_tip.to_string(),
            });
        }

        if repo.graph_descendant_of(fork_tip, upstream_tip)? {
            return Ok(SyncOutcome::ForkAhead);
        }

        Err(ForkSyncError::Diverged {
            branch: branch.to_string(),
        })
    }
}

fn validate_branch_name(branch: &str) -> Result<()> {
    if branch.is_empty() || !git2::Reference::is_valid_name(&format!("refs/heads/{branch}")) {
        return Err(ForkSyncError::Git(git2::Error::from_str(&format!(
            "invalid branch name: {branch:?}"
        ))));
    }
    Ok(())
}
