use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForkSyncError {
    #[error("github error: {0}")]
    GitHub(String),

    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("no token: pass --token or set the GITHUB_TOKEN environment variable")]
    MissingToken,

    #[error("{0} is marked as a fork but has no parent repository")]
    MissingParent(String),

    #[error("branch '{branch}' has diverged from upstream; refusing to overwrite fork commits")]
    Diverged { branch: String },

    #[error("push of {refname} rejected: {message}")]
    PushRejected { refname: String, message: String },

    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },

    #[error("update task failed: {0}")]
    TaskFailed(String),

    #[error("aborted at {fork}: {source}")]
    Aborted {
        fork: String,
        #[source]
        source: Box<ForkSyncError>,
    },
}

pub type Result<T> = std::result::Result<T, ForkSyncError>;
