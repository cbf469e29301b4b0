//! Security scoring of raw reports.

use crate::report::fields;
use crate::types::{SecurityAssessment, SecurityLevel};
use serde_json::Value;

const TLS_POINTS: u8 = 30;
const WAF_POINTS: u8 = 20;
const HEADER_POINTS: u8 = 5;
const HEADER_CAP: u8 = 25;
const HTTPS_POINTS: u8 = 10;
const MODERN_SERVER_POINTS: u8 = 10;

const HIGH_THRESHOLD: u8 = 75;
const MEDIUM_THRESHOLD: u8 = 45;

/// Server banners treated as legacy (lowercase substrings).
const LEGACY_SERVERS: &[&str] = &["apache/2.2", "nginx/1.0"];

/// Score a report. `None` yields the `Unknown` sentinel.
pub fn assess(report: Option<&Value>) -> SecurityAssessment {
    let Some(report) = report else {
        return SecurityAssessment {
            score: 0,
            level: SecurityLevel::Unknown,
            factors: Vec::new(),
        };
    };

    let mut score: u8 = 0;
    let mut factors = Vec::new();

    if tls_valid(report) {
        score += TLS_POINTS;
        factors.push("Valid SSL/TLS".to_string());
    }

    if waf_detected(report) {
        score += WAF_POINTS;
        factors.push("WAF detected".to_string());
    }

    let headers = security_header_count(report);
    if headers > 0 {
        let points = headers
            .saturating_mul(HEADER_POINTS as usize)
            .min(HEADER_CAP as usize) as u8;
        score += points;
        factors.push(format!("{} security headers", headers));
    }

    if https_enforced(report) {
        score += HTTPS_POINTS;
        factors.push("HTTPS enforced".to_string());
    }

    if modern_server(report) {
        score += MODERN_SERVER_POINTS;
        factors.push("Modern server".to_string());
    }

    SecurityAssessment {
        score: score.min(100),
        level: level_for(score),
        factors,
    }
}

/// Map a score onto its qualitative level.
pub fn level_for(score: u8) -> SecurityLevel {
    if score >= HIGH_THRESHOLD {
        SecurityLevel::High
    } else if score >= MEDIUM_THRESHOLD {
        SecurityLevel::Medium
    } else {
        SecurityLevel::Low
    }
}

pub fn tls_valid(report: &Value) -> bool {
    fields::flag(report, fields::TLS_VALID)
}

pub fn waf_detected(report: &Value) -> bool {
    fields::flag(report, fields::WAF_DETECTED)
}

pub fn security_header_count(report: &Value) -> usize {
    fields::count(fields::lookup(report, fields::SECURITY_HEADERS))
}

pub fn https_enforced(report: &Value) -> bool {
    fields::lookup(report, fields::TARGET_URL)
        .and_then(Value::as_str)
        .and_then(|url| url.get(..8))
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("https://"))
}

pub fn modern_server(report: &Value) -> bool {
    let Some(banner) = fields::header(report, "server").and_then(fields::display) else {
        return false;
    };
    let banner = banner.to_ascii_lowercase();
    !LEGACY_SERVERS.iter().any(|legacy| banner.contains(legacy))
}
