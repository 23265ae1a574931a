mod config;
mod error;
mod forks;
mod git;
mod github;
mod logging;
mod report;
#[cfg(test)]
mod test_utils;

use clap::{ArgAction, Parser};
use config::{CliOverrides, Config};
use error::Result;
use forks::classify::ForkFilter;
use forks::orchestrator::{self, FailurePolicy, RunOptions};
use git::executor::GitExecutor;
use github::client::GitHubClient;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "forksync",
    version,
    about = "Find your GitHub forks that lag behind upstream and fast-forward them"
)]
struct Cli {
    #[arg(long, help = "GitHub token (falls back to GITHUB_TOKEN)")]
    token: Option<String>,

    #[arg(long, help = "Path to a config file")]
    config: Option<PathBuf>,

    #[arg(long, help = "Report stale forks without updating them")]
    dry_run: bool,

    #[arg(long, help = "Stop at the first fork that fails")]
    fail_fast: bool,

    #[arg(long, value_name = "N", help = "Staleness checks to run at once")]
    check_concurrency: Option<usize>,

    #[arg(long = "only", value_name = "NAME", help = "Only process forks with this name")]
    only: Vec<String>,

    #[arg(long = "exclude", value_name = "NAME", help = "Skip forks with this name")]
    exclude: Vec<String>,

    #[arg(short, long, action = ArgAction::Count, help = "More log output on stderr")]
    verbose: u8,

    #[arg(short, long, help = "Skip the end-of-run summary")]
    quiet: bool,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            token: self.token.clone(),
            check_concurrency: self.check_concurrency,
            exclude: self.exclude.clone(),
            fail_fast: self.fail_fast,
            dry_run: self.dry_run,
        }
    }
}

/// How long exit waits on an update thread that was abandoned at its time limit.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    // Forks are processed one at a time; a single thread is all the runtime needs.
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("forksync: failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let code = match runtime.block_on(run(cli)) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("forksync: {e}");
            ExitCode::FAILURE
        }
    };
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    code
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = Config::load(cli.config.as_deref(), &cli.overrides())?;
    tracing::debug!(?config, "loaded config");
    let token = config.token()?;

    let client = GitHubClient::new(token, config.api_timeout())?;
    let executor = GitExecutor::new(
        Some(token.to_string()),
        &config.remote_base,
        config.git_timeout(),
    );
    let options = RunOptions {
        policy: if config.fail_fast {
            FailurePolicy::FailFast
        } else {
            FailurePolicy::Continue
        },
        dry_run: config.dry_run,
        check_concurrency: config.check_concurrency,
        filter: ForkFilter {
            only: cli.only,
            exclude: config.exclude.clone(),
        },
    };

    let summary = orchestrator::run(&client, &executor, &options).await?;
    if !cli.quiet {
        report::print_summary(&summary);
    }

    Ok(if summary.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
