//! Colored console output for scan results.

use crate::orchestrator::{ScanObserver, ScanState, SessionId};
use crate::report::{overview, Overview};
use crate::types::{
    Category, DisplayItem, ReconError, ScanReport, ScanResult, SecurityLevel, Status, Technology,
};
use colored::{ColoredString, Colorize};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;

const BAR_CELLS: usize = 10;
const PROGRESS_STEPS: u64 = 100;

/// Console output handler with colors and formatting.
pub struct ConsoleOutput {
    verbose: bool,
    json_mode: bool,
    quiet: bool,
    progress: Mutex<Option<ProgressBar>>,
}

impl ConsoleOutput {
    /// Create a new console output handler.
    pub fn new(verbose: bool, json_mode: bool, quiet: bool) -> Self {
        Self {
            verbose,
            json_mode,
            quiet,
            progress: Mutex::new(None),
        }
    }

    fn silent(&self) -> bool {
        self.json_mode || self.quiet
    }

    /// Print scan start message.
    pub fn print_scan_start(&self, target: &str) {
        if self.silent() {
            return;
        }

        println!(
            "{} Scanning: {}",
            "[*]".bright_blue(),
            target.bright_white()
        );
    }

    /// Print info message.
    pub fn print_info(&self, message: &str) {
        if self.silent() {
            return;
        }

        println!("{} {}", "[*]".bright_blue(), message);
    }

    /// Print a completed report: overview, then every category.
    pub fn print_report(&self, report: &ScanReport) {
        if self.silent() {
            return;
        }

        let summary = overview(&report.raw);
        self.print_overview(&report.target, &summary, report.assessment.level);

        for category in Category::ALL {
            println!();
            println!("{}", format!("=== {} ===", category.title()).bright_cyan());
            match report.normalized.items(category) {
                Some(items) => {
                    for item in items {
                        println!("  {}", format_item(item));
                    }
                }
                None => self.print_technologies(&report.normalized.technologies),
            }
        }

        if self.verbose && !report.assessment.factors.is_empty() {
            println!();
            println!("{}", "Score factors:".dimmed());
            for factor in &report.assessment.factors {
                println!("  + {}", factor.dimmed());
            }
        }

        println!();
        println!(
            "  {} {:.2}s",
            "Duration:".dimmed(),
            report.duration_secs
        );
    }

    fn print_overview(&self, target: &str, summary: &Overview, level: SecurityLevel) {
        println!();
        println!("{}", "=== Overview ===".bright_cyan());
        println!("  Target:      {}", target.bright_white().bold());
        println!("  Domain:      {}", summary.domain);
        println!("  IP:          {}", summary.ip);
        println!("  Security:    {}", colorize(level.as_str(), Some(level.status())));
        println!("  Scanned At:  {}", summary.scanned_at);
    }

    fn print_technologies(&self, technologies: &[Technology]) {
        if technologies.is_empty() {
            println!("  {}", "No technologies detected".dimmed());
            return;
        }

        for tech in technologies {
            println!(
                "  {} {}",
                "+".bright_cyan(),
                tech.name.bright_white().bold()
            );
            println!("    |-- Version:    {}", tech.version);
            println!(
                "    |-- Confidence: {} {}%",
                confidence_bar(tech.confidence),
                tech.confidence
            );
            println!("    +-- Source:     {}", tech.source.dimmed());
        }
    }

    /// Print a failed scan.
    pub fn print_error(&self, target: &str, error: &ReconError) {
        if self.json_mode {
            return;
        }

        println!(
            "{} {} {}",
            "[!]".red().bold(),
            target.bright_white(),
            error.user_message().red()
        );
        if self.verbose {
            println!("    {}", error.to_string().dimmed());
        }
    }

    /// Print a scan that was cancelled before finishing.
    pub fn print_cancelled(&self, target: &str) {
        if self.json_mode {
            return;
        }

        println!("{} {} {}", "[-]".yellow(), target, "cancelled".yellow());
    }

    /// Print the run summary.
    pub fn print_summary(&self, results: &[ScanResult]) {
        if self.json_mode {
            return;
        }

        let completed = results.iter().filter(|r| r.status == "completed").count();
        let failed = results.len() - completed;

        println!();
        println!("{}", "=== Scan Summary ===".bright_cyan());
        println!("  Targets:    {}", results.len());
        println!("  Completed:  {}", completed.to_string().green());

        if failed > 0 {
            println!("  Failed:     {}", failed.to_string().red().bold());
            for result in results.iter().filter(|r| r.status != "completed") {
                let reason = result.error.as_deref().unwrap_or(result.status.as_str());
                println!("    - {} {}", result.target, reason.dimmed());
            }
        }

        println!();
    }

    /// Create a progress bar.
    pub fn create_progress_bar(&self, total: u64, message: &str) -> Option<ProgressBar> {
        if self.silent() {
            return None;
        }

        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        let pb = ProgressBar::new(total);
        pb.set_style(style);
        pb.set_message(message.to_string());
        Some(pb)
    }

    fn with_progress(&self, update: impl FnOnce(&mut Option<ProgressBar>)) {
        if let Ok(mut progress) = self.progress.lock() {
            update(&mut progress);
        }
    }
}

impl ScanObserver for ConsoleOutput {
    fn on_transition(&self, _session: SessionId, _from: ScanState, to: ScanState) {
        match to {
            ScanState::Requesting => self.with_progress(|slot| {
                *slot = self.create_progress_bar(PROGRESS_STEPS, "requesting");
            }),
            ScanState::AwaitingJob | ScanState::Polling => self.with_progress(|slot| {
                if let Some(pb) = slot.as_ref() {
                    pb.set_message("waiting for job");
                }
            }),
            state if state.is_terminal() => self.with_progress(|slot| {
                if let Some(pb) = slot.take() {
                    pb.finish_and_clear();
                }
            }),
            _ => {}
        }
    }

    fn on_progress(&self, _session: SessionId, fraction: f64) {
        self.with_progress(|slot| {
            if let Some(pb) = slot.as_ref() {
                pb.set_position((fraction * PROGRESS_STEPS as f64).round() as u64);
            }
        });
    }
}

fn format_item(item: &DisplayItem) -> String {
    format!(
        "{:<24} {}",
        format!("{}:", item.label).dimmed(),
        colorize(&item.value, item.status)
    )
}

fn colorize(value: &str, status: Option<Status>) -> ColoredString {
    match status {
        Some(Status::Success) => value.green(),
        Some(Status::Warning) => value.yellow(),
        Some(Status::Error) => value.red(),
        None => value.normal(),
    }
}

/// Ten-cell bar for a 0-100 confidence.
fn confidence_bar(confidence: u8) -> String {
    let filled = (usize::from(confidence.min(100)) * BAR_CELLS + 50) / 100;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(BAR_CELLS - filled))
}

impl Default for ConsoleOutput {
    fn default() -> Self {
        Self::new(false, false, false)
    }
}
