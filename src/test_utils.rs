#![cfg(test)]

use crate::error::{ForkSyncError, Result};
use crate::git::executor::{SyncOutcome, UpdateExecutor};
use crate::github::client::RepositoryDirectory;
use crate::github::types::{Fork, RepoRecord};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn make_record(owner: &str, name: &str, fork: bool) -> RepoRecord {
    RepoRecord {
        name: name.to_string(),
        full_name: format!("{owner}/{name}"),
        owner: owner.to_string(),
        default_branch: "main".to_string(),
        fork,
        parent_owner: None,
    }
}

pub fn make_fork(owner: &str, name: &str, upstream_owner: &str) -> Fork {
    Fork::from_record(&make_record(owner, name, true), upstream_owner.to_string()).unwrap()
}

type TipKey = (String, String, String);

fn tip_key(owner: &str, name: &str, branch: &str) -> TipKey {
    (owner.to_string(), name.to_string(), branch.to_string())
}

#[derive(Default)]
struct DirectoryState {
    repos: Vec<RepoRecord>,
    parents: HashMap<String, String>,
    tips: HashMap<TipKey, String>,
    failing_lookups: HashSet<String>,
    failing_tips: HashSet<String>,
    fail_listing: bool,
    lookups: usize,
}

/// In-memory hosting directory. Clones share state, so a test can keep a
/// handle while the orchestrator and a syncing executor use theirs.
#[derive(Clone, Default)]
pub struct FakeDirectory {
    state: Arc<Mutex<DirectoryState>>,
}

impl FakeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repo(self, owner: &str, name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .repos
            .push(make_record(owner, name, false));
        self
    }

    pub fn with_fork(self, owner: &str, name: &str, parent_owner: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.repos.push(make_record(owner, name, true));
            state
                .parents
                .insert(format!("{owner}/{name}"), parent_owner.to_string());
        }
        self
    }

    /// A fork whose full metadata comes back without a parent.
    pub fn with_orphan_fork(self, owner: &str, name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .repos
            .push(make_record(owner, name, true));
        self
    }

    pub fn with_tip(self, owner: &str, name: &str, sha: &str) -> Self {
        self.set_tip(owner, name, sha);
        self
    }

    pub fn failing_lookup(self, owner: &str, name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_lookups
            .insert(format!("{owner}/{name}"));
        self
    }

    pub fn failing_tip(self, owner: &str, name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_tips
            .insert(format!("{owner}/{name}"));
        self
    }

    pub fn failing_listing(self) -> Self {
        self.state.lock().unwrap().fail_listing = true;
        self
    }

    pub fn set_tip(&self, owner: &str, name: &str, sha: &str) {
        self.state
            .lock()
            .unwrap()
            .tips
            .insert(tip_key(owner, name, "main"), sha.to_string());
    }

    pub fn tip(&self, owner: &str, name: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .tips
            .get(&tip_key(owner, name, "main"))
            .cloned()
    }

    pub fn lookups(&self) -> usize {
        self.state.lock().unwrap().lookups
    }
}

impl RepositoryDirectory for FakeDirectory {
    async fn list_repositories(&self) -> Result<Vec<RepoRecord>> {
        let state = self.state.lock().unwrap();
        if state.fail_listing {
            return Err(ForkSyncError::GitHub("401 Bad credentials".to_string()));
        }
        Ok(state.repos.clone())
    }

    async fn get_repository(&self, owner: &str, name: &str) -> Result<RepoRecord> {
        let mut state = self.state.lock().unwrap();
        state.lookups += 1;
        let full_name = format!("{owner}/{name}");
        if state.failing_lookups.contains(&full_name) {
            return Err(ForkSyncError::GitHub(format!("get repository {full_name}: 502")));
        }
        let mut record = state
            .repos
            .iter()
            .find(|r| r.full_name == full_name)
            .cloned()
            .ok_or_else(|| ForkSyncError::GitHub(format!("{full_name}: 404 Not Found")))?;
        record.parent_owner = state.parents.get(&full_name).cloned();
        Ok(record)
    }

    async fn branch_tip(&self, owner: &str, name: &str, branch: &str) -> Result<String> {
        let state = self.state.lock().unwrap();
        if state.failing_tips.contains(&format!("{owner}/{name}")) {
            return Err(ForkSyncError::GitHub(format!(
                "get branch {owner}/{name}@{branch}: 500"
            )));
        }
        state
            .tips
            .get(&tip_key(owner, name, branch))
            .cloned()
            .ok_or_else(|| ForkSyncError::GitHub(format!("{owner}/{name}@{branch}: 404")))
    }
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub fork: String,
    pub scratch: PathBuf,
    pub scratch_was_empty: bool,
}

/// Records every update and, when linked to a directory, copies the upstream
/// tip onto the fork the way a successful fast-forward would.
#[derive(Clone, Default)]
pub struct RecordingExecutor {
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    failing: Arc<HashSet<String>>,
    syncs: Option<FakeDirectory>,
    stall: Option<(Duration, Duration)>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn syncing(directory: &FakeDirectory) -> Self {
        Self {
            syncs: Some(directory.clone()),
            ..Self::default()
        }
    }

    pub fn failing_for(mut self, names: &[&str]) -> Self {
        self.failing = Arc::new(names.iter().map(|n| n.to_string()).collect());
        self
    }

    /// Blocks for `delay` inside every update and advertises `limit` as the
    /// time limit.
    pub fn stalling(mut self, delay: Duration, limit: Duration) -> Self {
        self.stall = Some((delay, limit));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl UpdateExecutor for RecordingExecutor {
    fn time_limit(&self) -> Option<Duration> {
        self.stall.map(|(_, limit)| limit)
    }

    fn update_fork(&self, fork: &Fork, scratch: &Path) -> Result<SyncOutcome> {
        let scratch_was_empty = std::fs::read_dir(scratch)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        self.calls.lock().unwrap().push(RecordedCall {
            fork: fork.name.clone(),
            scratch: scratch.to_path_buf(),
            scratch_was_empty,
        });

        // Leave something behind so cleanup has real work to do.
        std::fs::write(scratch.join("HEAD"), "ref: refs/heads/main\n")?;
        if let Some((delay, _)) = self.stall {
            std::thread::sleep(delay);
        }

        if self.failing.contains(&fork.name) {
            return Err(ForkSyncError::PushRejected {
                refname: format!("refs/heads/{}", fork.default_branch),
                message: "protected branch hook declined".to_string(),
            });
        }

        let Some(directory) = &self.syncs else {
            return Ok(SyncOutcome::AlreadyInSync);
        };
        let from = directory.tip(&fork.owner, &fork.name).unwrap_or_default();
        let to = directory
            .tip(&fork.upstream_owner, &fork.name)
            .unwrap_or_default();
        directory.set_tip(&fork.owner, &fork.name, &to);
        Ok(SyncOutcome::FastForwarded { from, to })
    }
}
