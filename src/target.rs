//! Target validation: turns operator input into an absolute URL.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::LazyLock;
use thiserror::Error;
use url::{Host, Url};

static SCHEME_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*://").expect("scheme pattern is valid")
});

/// Why a target string was rejected.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetError {
    #[error("target is empty")]
    Empty,
    #[error("target is not a well-formed absolute URL")]
    InvalidFormat,
}

/// A validated absolute URL to scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetUrl {
    raw: String,
    parsed: Url,
}

impl TargetUrl {
    /// Trim, add `https://` to bare hosts, and validate.
    ///
    /// Any scheme is accepted as long as the URL has a host. Domain hosts must
    /// look like `label.label`; IP literals are accepted as-is.
    pub fn parse(input: &str) -> Result<Self, TargetError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(TargetError::Empty);
        }

        let candidate = if SCHEME_PREFIX.is_match(trimmed) {
            trimmed.to_string()
        } else {
            format!("https://{}", trimmed)
        };

        let parsed = Url::parse(&candidate).map_err(|_| TargetError::InvalidFormat)?;
        match parsed.host() {
            Some(Host::Domain(domain)) if is_host_like(domain) => {}
            Some(Host::Ipv4(_)) if is_dotted_quad(&candidate) => {}
            Some(Host::Ipv6(_)) => {}
            _ => return Err(TargetError::InvalidFormat),
        }

        Ok(Self {
            raw: candidate,
            parsed,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn url(&self) -> &Url {
        &self.parsed
    }

    pub fn host(&self) -> Option<&str> {
        self.parsed.host_str()
    }
}

impl fmt::Display for TargetUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for TargetUrl {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

/// Whether the host as written is a full `a.b.c.d` address.
///
/// URL parsing also reads `12345` or `0x7f` as IPv4 hosts; those are rejected.
fn is_dotted_quad(candidate: &str) -> bool {
    let authority = candidate
        .split_once("://")
        .map_or(candidate, |(_, rest)| rest);
    let authority = authority
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    let host = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    let host = host.split_once(':').map_or(host, |(host, _)| host);
    host.parse::<Ipv4Addr>().is_ok()
}

/// Dot-separated labels of letters, digits, `-` and `_`.
fn is_host_like(domain: &str) -> bool {
    let domain = domain.strip_suffix('.').unwrap_or(domain);
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && label
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        })
}
