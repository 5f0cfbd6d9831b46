// Console output: live progress lines and end-of-run tables

use bulkgen_core::application::TracingReporter;
use bulkgen_core::domain::{GroupState, GroupStatus, JobRecord, JobStatus, RunPhase, RunStats};
use bulkgen_core::port::{ProgressEvent, ProgressReporter, ProgressSnapshot};
use bulkgen_infra_sqlite::StoredArtifact;
use colored::{ColoredString, Colorize};
use tabled::{Table, Tabled};

const EXCERPT_LEN: usize = 60;

/// Prints one line per job transition and forwards everything to the log
pub struct ConsoleReporter;

impl ProgressReporter for ConsoleReporter {
    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        TracingReporter.on_progress(snapshot);

        let stats = &snapshot.stats;
        let done = stats.succeeded + stats.failed + stats.skipped;
        let progress = format!("[{}/{}]", done, stats.total).dimmed();
        match &snapshot.event {
            ProgressEvent::JobStarted {
                job_id, attempt, ..
            } if *attempt > 1 => {
                println!("{} {} {} (attempt {})", progress, "↻".yellow(), job_id, attempt)
            }
            ProgressEvent::JobRequeued {
                job_id, delay_ms, ..
            } => println!(
                "{} {} {} rate limited, retrying in {}s",
                progress,
                "…".yellow(),
                job_id,
                delay_ms / 1000
            ),
            ProgressEvent::JobSucceeded { job_id } => {
                println!("{} {} {}", progress, "✓".green(), job_id)
            }
            ProgressEvent::JobFailed {
                job_id,
                kind,
                message,
            } => println!(
                "{} {} {} {}: {}",
                progress,
                "✗".red(),
                job_id,
                kind.to_string().red(),
                message
            ),
            ProgressEvent::RunPaused => println!("{}", "Run paused".yellow().bold()),
            ProgressEvent::RunResumed => println!("{}", "Run resumed".cyan().bold()),
            _ => {}
        }
    }
}

fn paint_phase(phase: RunPhase) -> ColoredString {
    let text = phase.to_string().to_uppercase();
    match phase {
        RunPhase::Finished => text.green().bold(),
        RunPhase::Cancelled => text.red().bold(),
        RunPhase::Paused => text.yellow().bold(),
        RunPhase::Idle | RunPhase::Running => text.cyan().bold(),
    }
}

fn paint_group(state: GroupState) -> String {
    let text = state.to_string();
    match state {
        GroupState::Succeeded => text.green().to_string(),
        GroupState::Failed => text.red().to_string(),
        GroupState::Cancelled => text.yellow().to_string(),
        GroupState::Pending | GroupState::Running => text,
    }
}

#[derive(Tabled)]
struct GroupRow {
    group: String,
    title: String,
    status: String,
    succeeded: usize,
    failed: usize,
    skipped: usize,
    total: usize,
}

#[derive(Tabled)]
struct FailureRow {
    job_id: String,
    attempts: u32,
    kind: String,
    error: String,
}

#[derive(Tabled)]
struct ArtifactRow {
    job_id: String,
    group: String,
    order_key: i64,
    artifact: String,
}

#[derive(Tabled)]
pub struct GroupCountRow {
    pub group: String,
    pub title: String,
    pub jobs: usize,
}

fn excerpt(value: &serde_json::Value) -> String {
    let text = value.to_string();
    match text.char_indices().nth(EXCERPT_LEN) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text,
    }
}

pub fn print_run_summary(stats: &RunStats, groups: &[GroupStatus], records: &[JobRecord]) {
    println!();
    println!("{} {}", "Run".bold(), paint_phase(stats.phase));
    println!(
        "  {} {}   {} {}   {} {}   {} {}",
        "Succeeded:".bold(),
        stats.succeeded.to_string().green(),
        "Failed:".bold(),
        stats.failed.to_string().red(),
        "Skipped:".bold(),
        stats.skipped,
        "Total:".bold(),
        stats.total
    );
    if stats.phase == RunPhase::Cancelled {
        println!("  {} {}", "Never attempted:".bold(), stats.never_attempted);
    }

    if !groups.is_empty() {
        println!();
        let rows: Vec<GroupRow> = groups
            .iter()
            .map(|g| GroupRow {
                group: g.key.clone(),
                title: g.title.clone(),
                status: paint_group(g.status),
                succeeded: g.succeeded,
                failed: g.failed,
                skipped: g.skipped,
                total: g.total,
            })
            .collect();
        println!("{}", Table::new(rows));
    }

    let failures: Vec<FailureRow> = records
        .iter()
        .filter(|r| r.status == JobStatus::Failed)
        .map(|r| FailureRow {
            job_id: r.descriptor.id.clone(),
            attempts: r.attempt,
            kind: r
                .last_error
                .as_ref()
                .map(|e| e.kind.to_string())
                .unwrap_or_default(),
            error: r
                .last_error
                .as_ref()
                .map(|e| e.message.clone())
                .unwrap_or_default(),
        })
        .collect();
    if !failures.is_empty() {
        println!();
        println!("{}", "Failed jobs".red().bold());
        println!("{}", Table::new(failures));
    }
}

pub fn print_artifacts(artifacts: &[StoredArtifact]) {
    if artifacts.is_empty() {
        println!("{}", "No artifacts stored".yellow());
        return;
    }
    let rows: Vec<ArtifactRow> = artifacts
        .iter()
        .map(|a| ArtifactRow {
            job_id: a.job_id.clone(),
            group: a.group_key.clone(),
            order_key: a.order_key,
            artifact: excerpt(&a.artifact),
        })
        .collect();
    println!("{}", Table::new(rows));
}

pub fn print_group_counts(rows: Vec<GroupCountRow>) {
    println!("{}", Table::new(rows));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_excerpt_truncates_long_values() {
        let long = json!({"lesson": "x".repeat(200)});
        let short = excerpt(&long);
        assert_eq!(short.chars().count(), EXCERPT_LEN + 1);
        assert!(short.ends_with('…'));

        assert_eq!(excerpt(&json!({"a": 1})), r#"{"a":1}"#);
    }
}
