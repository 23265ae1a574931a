use octocrab::models::Repository;

/// The subset of a hosted repository that fork auditing looks at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepoRecord {
    pub name: String,
    pub full_name: String,
    pub owner: String,
    pub default_branch: String,
    pub fork: bool,
    /// Only present on full repository lookups, never on listings.
    pub parent_owner: Option<String>,
}

impl RepoRecord {
    pub fn from_octocrab(repo: &Repository) -> Self {
        let owner = repo
            .owner
            .as_ref()
            .map(|o| o.login.clone())
            .unwrap_or_default();
        let full_name = repo
            .full_name
            .clone()
            .unwrap_or_else(|| format!("{owner}/{}", repo.name));
        let parent_owner = repo
            .parent
            .as_ref()
            .and_then(|p| p.owner.as_ref())
            .map(|o| o.login.clone());

        Self {
            name: repo.name.clone(),
            full_name,
            owner,
            default_branch: repo
                .default_branch
                .clone()
                .unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
            fork: repo.fork.unwrap_or(false),
            parent_owner,
        }
    }
}

const DEFAULT_BRANCH: &str = "main";

/// A fork whose upstream has been resolved. Built once during classification
/// and read-only afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fork {
    pub name: String,
    pub full_name: String,
    pub owner: String,
    pub default_branch: String,
    pub upstream_owner: String,
}

impl Fork {
    /// Returns `None` for records that are not forks.
    pub fn from_record(record: &RepoRecord, upstream_owner: String) -> Option<Self> {
        if !record.fork {
            return None;
        }
        Some(Self {
            name: record.name.clone(),
            full_name: record.full_name.clone(),
            owner: record.owner.clone(),
            default_branch: record.default_branch.clone(),
            upstream_owner,
        })
    }

    // Upstream is assumed to carry the same repository name.
    pub fn upstream_full_name(&self) -> String {
        format!("{}/{}", self.upstream_owner, self.name)
    }
}
