//! superrecon - Client for a web reconnaissance scanning service.
//!
//! This library drives scans of a target URL against a remote service by:
//! - Validating and normalizing the operator's target input
//! - Submitting the scan and polling asynchronous jobs until they finish
//! - Mapping heterogeneous raw reports onto seven fixed display categories
//! - Deriving a deterministic security score from the raw report
//!
//! # Example
//!
//! ```no_run
//! use superrecon::orchestrator::{OrchestratorConfig, ScanOrchestrator};
//! use superrecon::target::TargetUrl;
//! use superrecon::transport::{HttpTransport, ServiceProtocol};
//! use superrecon::types::HttpConfig;
//!
//! #[tokio::main]
//! async fn main() {
//!     let transport = HttpTransport::new(&HttpConfig::default(), ServiceProtocol::Recon).unwrap();
//!     let orchestrator = ScanOrchestrator::new(transport, OrchestratorConfig::default());
//!     let target = TargetUrl::parse("example.com").unwrap();
//!     let result = orchestrator.scan(target).await.into_result("example.com");
//!     println!("{}: {}", result.target, result.status);
//! }
//! ```

pub mod config;
pub mod notify;
pub mod orchestrator;
pub mod report;
pub mod target;
pub mod transport;
pub mod types;

pub use config::{Commands, Config, NormalizeConfig, ScanConfig};
pub use orchestrator::{
    OrchestratorConfig, ScanObserver, ScanOrchestrator, ScanOutcome, ScanSession, ScanState,
    SessionId,
};
pub use target::{TargetError, TargetUrl};
pub use transport::{HttpTransport, ScanTransport, ServiceProtocol};
pub use types::{
    Category, ErrorKind, NormalizedReport, ReconError, Result, ScanReport, ScanResult,
    SecurityAssessment, SecurityLevel,
};
