//! Alias tables for report fields and helpers to probe them.
//!
//! Each logical field lists the key paths it has been observed under, in
//! priority order. Lookups take the first path holding a usable value and
//! never merge two partial sources.

use serde_json::Value;

pub const TARGET_URL: &[&str] = &["url", "scanned_url"];
pub const TITLE: &[&str] = &["title"];
pub const SCAN_ID: &[&str] = &["scan_id"];
pub const SCANNED_AT: &[&str] = &["scanned_at"];
pub const NOTES: &[&str] = &["notes"];

pub const TLS_VALID: &[&str] = &["ssl_info.valid"];
pub const CERT_ISSUER: &[&str] = &["ssl_info.issuer.O", "ssl_info.issuer.CN"];
pub const CERT_NOT_AFTER: &[&str] = &["ssl_info.not_after"];
pub const WAF_DETECTED: &[&str] = &["waf.detected", "waf_info.detected"];
pub const WAF_PROVIDER: &[&str] = &["waf.provider", "waf_info.provider"];
pub const SECURITY_HEADERS: &[&str] = &["security_headers"];

pub const DNS_A: &[&str] = &["dns_records.A"];
pub const NETWORK_START: &[&str] = &["ip_info.network.start_address"];
pub const ASN: &[&str] = &["ip_info.asn"];
pub const ASN_DESCRIPTION: &[&str] = &["ip_info.asn_description"];
pub const ASN_CIDR: &[&str] = &["ip_info.asn_cidr"];
pub const IP_INFO_SOURCE: &[&str] = &["ip_info.source"];

pub const TECHNOLOGIES: &[&str] = &["technologies"];
pub const CMS_DETECTIONS: &[&str] = &["cms_info"];
pub const TECH_NAME: &[&str] = &["name", "tech", "title"];
pub const TECH_VERSION: &[&str] = &["version", "version_string", "raw_version"];
pub const TECH_SOURCE: &[&str] = &["source", "provenance"];
pub const TECH_CONFIDENCE: &[&str] = &["confidence"];

pub const LINKS: &[&str] = &["links_and_resources"];

pub const HEADERS: &[&str] = &["headers"];
pub const CDN_PROVIDER: &[&str] = &["cdn.provider", "cdn_info.provider"];
pub const ROBOTS_EXISTS: &[&str] = &["robots_info.exists"];
pub const ROBOTS_EVIDENCE_PATH: &[&str] = &["robots_info.raw_evidence.path"];

pub const RAW_EVIDENCE: &[&str] = &["raw_evidence"];
pub const EVIDENCE_PATH: &[&str] = &["path"];
pub const EVIDENCE_HASH: &[&str] = &["sha256", "hash"];
pub const EVIDENCE_TIMESTAMP: &[&str] = &["timestamp"];

/// Resolve a dotted path. Empty segments are not allowed.
pub fn at_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(value, |current, segment| current.as_object()?.get(segment))
}

/// A value counts as present unless it is missing, null or an empty string.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// First present value among the aliases, along with the alias that matched.
pub fn first<'a>(
    value: &'a Value,
    aliases: &'static [&'static str],
) -> Option<(&'static str, &'a Value)> {
    aliases.iter().find_map(|alias| {
        at_path(value, alias)
            .filter(|v| is_present(v))
            .map(|v| (*alias, v))
    })
}

/// First present value among the aliases, without reporting which matched.
pub fn lookup<'a>(value: &'a Value, aliases: &[&str]) -> Option<&'a Value> {
    aliases
        .iter()
        .find_map(|alias| at_path(value, alias).filter(|v| is_present(v)))
}

/// Boolean flag; only a JSON `true` counts.
pub fn flag(value: &Value, aliases: &[&str]) -> bool {
    lookup(value, aliases).and_then(Value::as_bool).unwrap_or(false)
}

/// Render a scalar for display. Strings are used verbatim; arrays are joined.
pub fn display(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(display).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(", "))
            }
        }
        Value::Object(_) => Some(value.to_string()),
    }
}

/// Display text of the first present alias.
pub fn text(value: &Value, aliases: &[&str]) -> Option<String> {
    lookup(value, aliases).and_then(display)
}

/// Number of entries in a list (or keys in a map); zero when absent.
pub fn count(value: Option<&Value>) -> usize {
    match value {
        Some(Value::Array(items)) => items.len(),
        Some(Value::Object(map)) => map.len(),
        _ => 0,
    }
}

/// Case-insensitive lookup of a response header.
pub fn header<'a>(report: &'a Value, name: &str) -> Option<&'a Value> {
    let headers = lookup(report, HEADERS)?.as_object()?;
    headers
        .get(name)
        .or_else(|| {
            headers
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
        .filter(|v| is_present(v))
}
