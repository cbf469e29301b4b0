//! Network exchange with the scanning service.
//!
//! This module handles:
//! - The `ScanTransport` seam the orchestrator drives
//! - Classifying HTTP replies into payloads or errors
//! - Interpreting payloads as final reports, job tickets or poll statuses

pub mod http;
pub mod response;

pub use http::HttpTransport;
pub use response::{InitialReply, Payload, PollReply};

use crate::target::TargetUrl;
use crate::types::Result;
use clap::ValueEnum;
use futures::future::BoxFuture;
use std::fmt;

/// Request verb for the initial scan request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verb::Get => f.write_str("GET"),
            Verb::Post => f.write_str("POST"),
        }
    }
}

/// Which service API variant to speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ServiceProtocol {
    /// `GET /recon?url=`, falling back to `POST /recon`.
    #[default]
    Recon,
    /// `POST /scan` returning a job id, polled via `GET /results/{id}`.
    Job,
}

impl ServiceProtocol {
    pub fn primary(self) -> Verb {
        match self {
            ServiceProtocol::Recon => Verb::Get,
            ServiceProtocol::Job => Verb::Post,
        }
    }

    pub fn alternate(self) -> Verb {
        match self.primary() {
            Verb::Get => Verb::Post,
            Verb::Post => Verb::Get,
        }
    }
}

/// Performs the network calls for a scan.
///
/// Implementations report transport-level failures as
/// [`ReconError::Network`](crate::types::ReconError::Network) and non-2xx
/// replies as [`ReconError::Service`](crate::types::ReconError::Service); the
/// orchestrator only retries the former.
pub trait ScanTransport: Send + Sync {
    /// Protocol variant, used to pick the primary and alternate verbs.
    fn protocol(&self) -> ServiceProtocol {
        ServiceProtocol::Recon
    }

    /// Submit the target using the given verb.
    fn request<'a>(&'a self, target: &'a TargetUrl, verb: Verb) -> BoxFuture<'a, Result<Payload>>;

    /// Fetch the current status of a job.
    fn poll<'a>(&'a self, job_id: &'a str) -> BoxFuture<'a, Result<Payload>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_verbs() {
        assert_eq!(ServiceProtocol::Recon.primary(), Verb::Get);
        assert_eq!(ServiceProtocol::Recon.alternate(), Verb::Post);
        assert_eq!(ServiceProtocol::Job.primary(), Verb::Post);
        assert_eq!(ServiceProtocol::Job.alternate(), Verb::Get);
    }
}
