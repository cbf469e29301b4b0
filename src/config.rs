//! Configuration handling for the client.

use crate::orchestrator::OrchestratorConfig;
use crate::transport::ServiceProtocol;
use crate::types::{HttpConfig, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8000";

/// Client for a web reconnaissance scanning service.
#[derive(Parser, Debug, Clone)]
#[command(name = "superrecon")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Scan targets through the reconnaissance service
    Scan(ScanConfig),
    /// Render a saved raw report without contacting the service
    Normalize(NormalizeConfig),
}

/// Configuration for the scan command.
#[derive(Parser, Debug, Clone)]
pub struct ScanConfig {
    /// Target URL(s) or hostnames to scan
    #[arg(required_unless_present = "file")]
    pub targets: Vec<String>,

    /// File containing targets to scan (one per line)
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Base URL of the scanning service
    #[arg(long, env = "SUPERRECON_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Service API variant
    #[arg(long, value_enum, default_value_t = ServiceProtocol::Recon)]
    pub protocol: ServiceProtocol,

    /// Wall-clock timeout for the initial request, in seconds
    #[arg(long, default_value = "120")]
    pub timeout: u64,

    /// Delay before the first job status check, in milliseconds
    #[arg(long, default_value = "2000")]
    pub initial_delay_ms: u64,

    /// Delay between job status checks, in milliseconds
    #[arg(long, default_value = "3000")]
    pub poll_interval_ms: u64,

    /// Status checks before a job is reported as timed out
    #[arg(long, default_value = "40")]
    pub max_attempts: u32,

    /// Rate limit (requests per second)
    #[arg(long, default_value = "5")]
    pub rate_limit: u32,

    /// Custom User-Agent string
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,

    /// Write JSON results to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Quiet mode: only show failed targets and summaries
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Do not retry with the alternate request verb after a network failure
    #[arg(long)]
    pub no_fallback: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            file: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            protocol: ServiceProtocol::Recon,
            timeout: 120,
            initial_delay_ms: 2000,
            poll_interval_ms: 3000,
            max_attempts: 40,
            rate_limit: 5,
            user_agent: None,
            json: false,
            output: None,
            quiet: false,
            no_fallback: false,
        }
    }
}

impl ScanConfig {
    /// Get HTTP configuration from scan config.
    pub fn http_config(&self) -> HttpConfig {
        let defaults = HttpConfig::default();
        HttpConfig {
            endpoint: self.endpoint.clone(),
            timeout_secs: self.timeout,
            rate_limit: self.rate_limit,
            user_agent: self.user_agent.clone().unwrap_or(defaults.user_agent),
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            request_timeout: Duration::from_secs(self.timeout),
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            max_attempts: self.max_attempts,
            verb_fallback: !self.no_fallback,
            ..OrchestratorConfig::default()
        }
    }

    /// Targets from the command line followed by those in `--file`.
    ///
    /// Entries are returned as typed; validation happens per target so one
    /// bad line does not abort the whole run.
    pub fn load_targets(&self) -> Result<Vec<String>> {
        let mut targets: Vec<String> = self
            .targets
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        if let Some(ref file_path) = self.file {
            let content = std::fs::read_to_string(file_path)?;
            for line in content.lines() {
                let trimmed = line.trim();
                if !trimmed.is_empty() && !trimmed.starts_with('#') {
                    targets.push(trimmed.to_string());
                }
            }
        }

        Ok(targets)
    }
}

/// Configuration for the normalize command.
#[derive(Parser, Debug, Clone)]
pub struct NormalizeConfig {
    /// Raw report JSON file, or `-` for stdin
    pub input: PathBuf,

    /// Print the normalized model as JSON
    #[arg(long)]
    pub json: bool,
}

impl NormalizeConfig {
    pub fn reads_stdin(&self) -> bool {
        self.input.as_os_str() == "-"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_scan_defaults_match_cli() {
        let parsed = Config::try_parse_from(["superrecon", "scan", "example.com"]).unwrap();
        let Commands::Scan(scan) = parsed.command else {
            panic!("expected scan command");
        };
        let defaults = ScanConfig::default();

        assert_eq!(scan.targets, vec!["example.com"]);
        assert_eq!(scan.protocol, defaults.protocol);
        assert_eq!(scan.timeout, defaults.timeout);
        assert_eq!(scan.initial_delay_ms, defaults.initial_delay_ms);
        assert_eq!(scan.poll_interval_ms, defaults.poll_interval_ms);
        assert_eq!(scan.max_attempts, defaults.max_attempts);
        assert_eq!(scan.rate_limit, defaults.rate_limit);
        assert!(!scan.no_fallback);
    }

    #[test]
    fn test_scan_flags() {
        let parsed = Config::try_parse_from([
            "superrecon",
            "-v",
            "scan",
            "--protocol",
            "job",
            "--endpoint",
            "http://scanner:9000",
            "--max-attempts",
            "3",
            "--no-fallback",
            "--json",
            "a.com",
            "b.com",
        ])
        .unwrap();
        assert!(parsed.verbose);
        let Commands::Scan(scan) = parsed.command else {
            panic!("expected scan command");
        };
        assert_eq!(scan.protocol, ServiceProtocol::Job);
        assert_eq!(scan.endpoint, "http://scanner:9000");
        assert_eq!(scan.targets.len(), 2);
        assert!(scan.json);

        let orchestrator = scan.orchestrator_config();
        assert_eq!(orchestrator.max_attempts, 3);
        assert!(!orchestrator.verb_fallback);
    }

    #[test]
    fn test_scan_requires_target_or_file() {
        assert!(Config::try_parse_from(["superrecon", "scan"]).is_err());
        assert!(Config::try_parse_from(["superrecon", "scan", "-f", "targets.txt"]).is_ok());
    }

    #[test]
    fn test_component_configs() {
        let config = ScanConfig {
            timeout: 30,
            initial_delay_ms: 250,
            poll_interval_ms: 1500,
            user_agent: Some("probe/1.0".to_string()),
            ..ScanConfig::default()
        };

        let http = config.http_config();
        assert_eq!(http.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(http.timeout_secs, 30);
        assert_eq!(http.user_agent, "probe/1.0");

        let orchestrator = config.orchestrator_config();
        assert_eq!(orchestrator.request_timeout, Duration::from_secs(30));
        assert_eq!(orchestrator.initial_delay, Duration::from_millis(250));
        assert_eq!(orchestrator.poll_interval, Duration::from_millis(1500));
        assert_eq!(orchestrator.max_backoff, Duration::from_secs(30));
        assert!(orchestrator.verb_fallback);
    }

    #[test]
    fn test_load_targets_from_file() {
        let path = std::env::temp_dir().join(format!("superrecon-targets-{}.txt", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "# staging hosts\nexample.org\n\n  https://example.net  ").unwrap();

        let config = ScanConfig {
            targets: vec![" example.com ".to_string(), "  ".to_string()],
            file: Some(path.clone()),
            ..ScanConfig::default()
        };
        let targets = config.load_targets().unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(targets, vec!["example.com", "example.org", "https://example.net"]);
    }

    #[test]
    fn test_load_targets_missing_file() {
        let config = ScanConfig {
            file: Some(PathBuf::from("/nonexistent/superrecon/targets.txt")),
            ..ScanConfig::default()
        };
        assert!(config.load_targets().is_err());
    }

    #[test]
    fn test_normalize_stdin() {
        let parsed = Config::try_parse_from(["superrecon", "normalize", "-", "--json"]).unwrap();
        let Commands::Normalize(normalize) = parsed.command else {
            panic!("expected normalize command");
        };
        assert!(normalize.reads_stdin());
        assert!(normalize.json);
    }
}
