use crate::forks::orchestrator::{ForkOutcome, RunSummary};
use crate::github::types::Fork;

pub fn stale_line(fork: &Fork) -> String {
    format!(
        "{} : {} commit does not match {} commit",
        fork.name, fork.owner, fork.upstream_owner
    )
}

/// Stdout carries these announcements and the summary counts. Skipped and
/// failed forks go to stderr.
pub fn announce_stale(fork: &Fork) {
    println!("{}", stale_line(fork));
}

pub fn print_summary(summary: &RunSummary) {
    for line in summary_lines(summary) {
        println!("{line}");
    }
    for line in problem_lines(summary) {
        eprintln!("{line}");
    }
}

fn summary_lines(summary: &RunSummary) -> Vec<String> {
    let up_to_date = summary.count(|o| matches!(o, ForkOutcome::UpToDate));
    let updated = summary.count(|o| matches!(o, ForkOutcome::Updated(_)));
    let would_update = summary.count(|o| matches!(o, ForkOutcome::WouldUpdate));
    let failed = summary.failures().count();

    let mut lines = vec![format!(
        "{} forks: {up_to_date} up to date, {updated} updated, {would_update} stale (dry run), {} skipped, {failed} failed",
        summary.reports.len() + summary.dropped.len(),
        summary.dropped.len(),
    )];

    for report in &summary.reports {
        if let ForkOutcome::Updated(synced) = &report.outcome {
            lines.push(format!("{}: {synced}", report.fork.full_name));
        }
    }

    lines
}

fn problem_lines(summary: &RunSummary) -> Vec<String> {
    let skipped = summary
        .dropped
        .iter()
        .map(|d| format!("{}: skipped: {}", d.full_name, d.reason));
    let failed = summary.reports.iter().filter_map(|r| match &r.outcome {
        ForkOutcome::Failed { stage, error } => {
            Some(format!("{}: {stage} failed: {error}", r.fork.full_name))
        }
        _ => None,
    });
    skipped.chain(failed).collect()
}
