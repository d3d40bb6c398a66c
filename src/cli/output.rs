//! CLI output formatting

use crate::core::plan::{Phase, Plan};
use crate::core::state::{BuildReport, ExecutionResult, ExecutionStatus, StepOutcome};
use crate::execution::{ChangeKind, ExecutionEvent, Notification, NotificationLevel, ResourceChange};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static EYES: Emoji<'_, '_> = Emoji("👀 ", "* ");

/// Create a progress bar over `total` planned steps
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let bar_style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .map(|s| s.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    progress.set_style(bar_style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format an execution status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Pending => style("PENDING").dim().to_string(),
        ExecutionStatus::Running => style("RUNNING").yellow().to_string(),
        ExecutionStatus::Completed => style("COMPLETED").green().to_string(),
        ExecutionStatus::CompletedWithFailures => style("COMPLETED WITH FAILURES").yellow().to_string(),
        ExecutionStatus::Failed => style("FAILED").red().to_string(),
        ExecutionStatus::Cancelled => style("CANCELLED").yellow().to_string(),
    }
}

/// Format an execution event as a single line, if it is worth printing
pub fn format_execution_event(event: &ExecutionEvent) -> Option<String> {
    match event {
        ExecutionEvent::BuildStarted {
            name,
            mode,
            resources,
            steps,
            ..
        } => Some(format!(
            "{}Building {} ({}): {} resources, {} steps",
            ROCKET,
            style(name).bold(),
            mode,
            resources,
            steps
        )),
        ExecutionEvent::StepStarted { .. } | ExecutionEvent::StepCompleted { .. } => None,
        ExecutionEvent::StepFailed {
            resource,
            step,
            error,
            fatal,
        } => Some(format!(
            "{}{} {} {}{}",
            CROSS,
            style(resource).bold(),
            style(format!("[{}]", step)).dim(),
            style(error).red(),
            if *fatal { " (fatal)" } else { "" }
        )),
        ExecutionEvent::ResourceCancelled { resource } => {
            Some(format!("{}{} cancelled", WARN, style(resource).dim()))
        }
        ExecutionEvent::AssetEmitted { asset } => Some(format!(
            "  {} {} {}",
            style("emit").green(),
            asset.path,
            style(format_size(asset.size)).dim()
        )),
        ExecutionEvent::BuildCompleted { status, .. } => Some(format!("Build {}", format_status(*status))),
    }
}

/// Human-readable byte count
pub fn format_size(bytes: usize) -> String {
    const KIB: f64 = 1024.0;
    let bytes_f = bytes as f64;
    if bytes_f < KIB {
        format!("{} B", bytes)
    } else if bytes_f < KIB * KIB {
        format!("{:.1} KiB", bytes_f / KIB)
    } else {
        format!("{:.1} MiB", bytes_f / (KIB * KIB))
    }
}

fn format_result(result: &ExecutionResult) -> String {
    match &result.outcome {
        StepOutcome::Success { artifact } => format!(
            "  {}{} {} -> {}",
            CHECK,
            result.resource,
            style(format!("[{}]", result.step)).dim(),
            artifact.name
        ),
        StepOutcome::Failure { error } => format!(
            "  {}{} {} {}",
            CROSS,
            result.resource,
            style(format!("[{}]", result.step)).dim(),
            style(error).red()
        ),
        StepOutcome::Cancelled => format!(
            "  {}{} {} cancelled",
            WARN,
            result.resource,
            style(format!("[{}]", result.step)).dim()
        ),
    }
}

/// Format a finished build for display
pub fn format_report(report: &BuildReport, verbose: bool) -> String {
    let status_icon = match report.status {
        ExecutionStatus::Completed => CHECK,
        ExecutionStatus::Failed => CROSS,
        ExecutionStatus::Running => SPINNER,
        ExecutionStatus::CompletedWithFailures | ExecutionStatus::Cancelled => WARN,
        ExecutionStatus::Pending => INFO,
    };

    let mut lines = vec![format!(
        "{}{} {} in {} ms",
        status_icon,
        style(&report.name).bold(),
        format_status(report.status),
        report.duration_ms()
    )];

    let shown: Vec<&ExecutionResult> = if verbose {
        report.results.iter().collect()
    } else {
        report.results.iter().filter(|r| !r.is_success()).collect()
    };
    lines.extend(shown.into_iter().map(format_result));

    lines.push(format!(
        "{} succeeded, {} failed, {} cancelled, {} files emitted",
        style(report.success_count()).green(),
        style(report.failure_count()).red(),
        style(report.cancelled_count()).yellow(),
        report.emitted.len()
    ));
    lines.push(style(format!("Build ID: {}", report.build_id)).dim().to_string());

    lines.join("\n")
}

/// Format a plan: one line per chain
pub fn format_plan(plan: &Plan) -> String {
    if plan.is_empty() {
        return format!("{}No resources matched any rule", INFO);
    }

    plan.chains()
        .iter()
        .map(|chain| {
            let steps = chain.step_names().join(" -> ");
            match chain.phase {
                Phase::Transform => format!("{} {} {}", chain.resource.path, style("->").dim(), steps),
                Phase::Emit => format!(
                    "{} {} {} {}",
                    chain.resource.path,
                    style("->").dim(),
                    steps,
                    style("(plugin)").cyan()
                ),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format a batch of watched changes
pub fn format_changes(changes: &[ResourceChange]) -> String {
    changes
        .iter()
        .map(|change| {
            let kind = match change.kind {
                ChangeKind::Added => style("added").green(),
                ChangeKind::Modified => style("modified").yellow(),
                ChangeKind::Removed => style("removed").red(),
            };
            format!("{}{} {}", EYES, kind, change.path)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format a notification
pub fn format_notification(notification: &Notification) -> String {
    let (icon, title) = match notification.level {
        NotificationLevel::Success => (CHECK, style(&notification.title).green().bold()),
        NotificationLevel::Warning => (WARN, style(&notification.title).yellow().bold()),
        NotificationLevel::Error => (CROSS, style(&notification.title).red().bold()),
    };
    format!("{}{}: {}", icon, title, notification.message)
}
