//! superrecon - Client for a web reconnaissance scanning service.
//!
//! CLI entry point.

use clap::Parser;
use serde::Serialize;
use serde_json::json;
use std::fs;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use superrecon::notify::ConsoleOutput;
use superrecon::report::{assess, normalize, overview, parse_report};
use superrecon::types::ScanReport;
use superrecon::{
    Commands, Config, HttpTransport, NormalizeConfig, ReconError, ScanConfig, ScanOrchestrator,
    ScanOutcome, ScanResult, TargetUrl,
};
use tokio::io::AsyncReadExt;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    // Set up logging
    let filter = if config.verbose {
        EnvFilter::new("superrecon=debug,info")
    } else {
        EnvFilter::new("superrecon=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let outcome = match config.command.clone() {
        Commands::Scan(scan_config) => run_scan(scan_config, &config).await,
        Commands::Normalize(normalize_config) => run_normalize(normalize_config, &config).await,
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => code,
    }
}

async fn run_scan(scan_config: ScanConfig, global_config: &Config) -> Result<(), ExitCode> {
    // Load targets
    let targets = match scan_config.load_targets() {
        Ok(t) => t,
        Err(e) => {
            error!("Failed to load targets: {}", e);
            return Err(ExitCode::FAILURE);
        }
    };

    if targets.is_empty() {
        error!("No targets specified. Use positional arguments or -f <file>.");
        return Err(ExitCode::FAILURE);
    }

    let transport = match HttpTransport::new(&scan_config.http_config(), scan_config.protocol) {
        Ok(t) => t,
        Err(e) => {
            error!("Failed to create transport: {}", e);
            return Err(ExitCode::FAILURE);
        }
    };

    let console = Arc::new(ConsoleOutput::new(
        global_config.verbose,
        scan_config.json,
        scan_config.quiet,
    ));
    let orchestrator = ScanOrchestrator::new(transport, scan_config.orchestrator_config())
        .with_observer(console.clone());

    // Ctrl-C cancels the scan in flight and stops the run.
    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let orchestrator = orchestrator.clone();
        let interrupted = interrupted.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nInterrupted, cancelling scan...");
                interrupted.store(true, Ordering::SeqCst);
                orchestrator.cancel();
            }
        });
    }

    if !scan_config.json && !scan_config.quiet {
        print_banner();
    }
    console.print_info(&format!(
        "Service: {} ({:?} protocol)",
        scan_config.endpoint, scan_config.protocol
    ));

    let mut results: Vec<ScanResult> = Vec::with_capacity(targets.len());
    for input in &targets {
        if interrupted.load(Ordering::SeqCst) {
            break;
        }

        let target = match TargetUrl::parse(input) {
            Ok(target) => target,
            Err(e) => {
                let error = ReconError::from(e);
                warn!("Skipping {:?}: {}", input, error);
                console.print_error(input, &error);
                results.push(ScanOutcome::Failed(error).into_result(input));
                continue;
            }
        };

        console.print_scan_start(target.as_str());
        let outcome = orchestrator.scan(target.clone()).await;
        match &outcome {
            ScanOutcome::Completed(report) => console.print_report(report),
            ScanOutcome::Failed(error) => console.print_error(target.as_str(), error),
            ScanOutcome::TimedOut(job) => console.print_error(
                target.as_str(),
                &ReconError::PollTimeout {
                    job_id: job.id.clone(),
                    attempts: job.attempts,
                },
            ),
            ScanOutcome::Cancelled => console.print_cancelled(target.as_str()),
        }
        results.push(outcome.into_result(target.as_str()));
    }

    // Output results
    let json = match to_pretty_json(&results) {
        Ok(j) => j,
        Err(e) => {
            error!("Failed to serialize results: {}", e);
            return Err(ExitCode::FAILURE);
        }
    };
    if scan_config.json && scan_config.output.is_none() {
        println!("{}", json);
    }
    if let Some(ref output_path) = scan_config.output {
        if let Err(e) = fs::write(output_path, &json) {
            error!("Failed to write output file: {}", e);
            return Err(ExitCode::FAILURE);
        }
        info!("Results written to: {:?}", output_path);
    }

    if results.len() > 1 {
        console.print_summary(&results);
    }

    if interrupted.load(Ordering::SeqCst) {
        return Err(ExitCode::from(EXIT_INTERRUPTED));
    }
    if results.iter().any(|r| r.status != "completed") {
        return Err(ExitCode::FAILURE);
    }

    Ok(())
}

async fn run_normalize(normalize_config: NormalizeConfig, global_config: &Config) -> Result<(), ExitCode> {
    let content = if normalize_config.reads_stdin() {
        let mut buffer = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buffer)
            .await
            .map(|_| buffer)
    } else {
        fs::read_to_string(&normalize_config.input)
    };

    let content = match content {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to read report: {}", e);
            return Err(ExitCode::FAILURE);
        }
    };

    let raw = match parse_report(&content) {
        Ok(v) => v,
        Err(e) => {
            error!("Failed to parse report: {}", e);
            return Err(ExitCode::FAILURE);
        }
    };

    let normalized = normalize(Some(&raw));
    let assessment = assess(Some(&raw));

    if normalize_config.json {
        let output = json!({
            "normalized": normalized,
            "assessment": assessment,
        });
        match to_pretty_json(&output) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!("Failed to serialize report: {}", e);
                return Err(ExitCode::FAILURE);
            }
        }
        return Ok(());
    }

    let report = ScanReport {
        target: overview(&raw).domain,
        raw,
        normalized,
        assessment,
        job: None,
        duration_secs: 0.0,
    };
    ConsoleOutput::new(global_config.verbose, false, false).print_report(&report);

    Ok(())
}

fn to_pretty_json<T: Serialize>(value: &T) -> superrecon::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn print_banner() {
    println!();
    println!("\x1b[36m╔══════════════════════════════════════════════════════════════╗\x1b[0m");
    println!("\x1b[36m║                    SUPERRECON v0.1.0                         ║\x1b[0m");
    println!("\x1b[36m║           Web Reconnaissance Client                          ║\x1b[0m");
    println!("\x1b[36m╚══════════════════════════════════════════════════════════════╝\x1b[0m");
    println!();
}
