//! Maps a loosely-typed raw report onto the fixed display categories.

use crate::report::fields;
use crate::report::scorer;
use crate::types::{DisplayItem, NormalizedReport, Result, SecurityAssessment, Status, Technology};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use tracing::debug;

/// Shown wherever the report has no data for a field.
pub const PLACEHOLDER: &str = "-";
pub const NOT_DETECTED: &str = "Not Detected";
pub const UNKNOWN: &str = "Unknown";
pub const NO_EVIDENCE: &str = "No raw-evidence file paths available in response";

/// Content counters: (label, key inside the links section).
const CONTENT_COUNTERS: &[(&str, &str)] = &[
    ("JS Links", "js_links"),
    ("CSS Links", "css_links"),
    ("Internal Links", "internal_links"),
    ("External Links", "external_links"),
    ("Image Links", "image_links"),
    ("Form Links", "form_links"),
    ("API Links", "api_links"),
    ("Meta Tags", "meta_tags"),
];

/// Parse a saved raw report.
pub fn parse_report(text: &str) -> Result<Value> {
    Ok(serde_json::from_str(text)?)
}

/// Normalize a report. Never fails; an absent report yields placeholders.
pub fn normalize(report: Option<&Value>) -> NormalizedReport {
    let empty = Value::Null;
    let data = report.unwrap_or(&empty);
    let assessment = scorer::assess(report);

    NormalizedReport {
        general: general(data),
        security: security(data, &assessment),
        domain: domain(data),
        technologies: technologies(data),
        content: content(data),
        infrastructure: infrastructure(data),
        evidence: evidence(data),
    }
}

/// Key figures for a compact summary line.
#[derive(Debug, Clone, PartialEq)]
pub struct Overview {
    pub domain: String,
    pub ip: String,
    pub scanned_at: String,
}

pub fn overview(report: &Value) -> Overview {
    let ip = fields::lookup(report, fields::DNS_A)
        .and_then(|records| records.as_array()?.first())
        .and_then(fields::display)
        .or_else(|| fields::text(report, fields::NETWORK_START));

    Overview {
        domain: or_placeholder(fields::text(report, fields::TARGET_URL)),
        ip: or_placeholder(ip),
        scanned_at: or_placeholder(scanned_at(report)),
    }
}

fn or_placeholder(value: Option<String>) -> String {
    value.unwrap_or_else(|| PLACEHOLDER.to_string())
}

fn item(label: &str, value: Option<String>) -> DisplayItem {
    DisplayItem::new(label, or_placeholder(value))
}

fn general(data: &Value) -> Vec<DisplayItem> {
    let mut items = vec![
        item("Target URL", fields::text(data, fields::TARGET_URL)),
        item("Title", fields::text(data, fields::TITLE)),
        item("Scan ID", fields::text(data, fields::SCAN_ID)),
        item("Scanned At", scanned_at(data)),
    ];
    if let Some(notes) = fields::text(data, fields::NOTES) {
        items.push(DisplayItem::new("Notes", notes));
    }
    items
}

fn security(data: &Value, assessment: &SecurityAssessment) -> Vec<DisplayItem> {
    let tls_valid = scorer::tls_valid(data);
    let waf_detected = scorer::waf_detected(data);
    let header_count = scorer::security_header_count(data);

    let waf_value = if waf_detected {
        fields::text(data, fields::WAF_PROVIDER).unwrap_or_else(|| "Detected".to_string())
    } else {
        NOT_DETECTED.to_string()
    };

    vec![
        DisplayItem::new("SSL/TLS", if tls_valid { "Valid" } else { "Missing/Invalid" })
            .with_status(if tls_valid { Status::Success } else { Status::Error }),
        item("Issuer", fields::text(data, fields::CERT_ISSUER)),
        item("Not After", fields::text(data, fields::CERT_NOT_AFTER)),
        DisplayItem::new("WAF", waf_value).with_status(if waf_detected {
            Status::Success
        } else {
            Status::Warning
        }),
        DisplayItem::new("Security Headers Count", header_count.to_string()).with_status(
            if header_count > 0 {
                Status::Success
            } else {
                Status::Warning
            },
        ),
        DisplayItem::new(
            "Security Score",
            format!("{}/100 ({})", assessment.score, assessment.level),
        )
        .with_status(assessment.level.status()),
    ]
}

fn domain(data: &Value) -> Vec<DisplayItem> {
    let hostname = fields::text(data, fields::TARGET_URL).map(|raw| {
        url::Url::parse(&raw)
            .ok()
            .and_then(|parsed| parsed.host_str().map(str::to_string))
            .unwrap_or(raw)
    });

    vec![
        item("Hostname", hostname),
        item("DNS A", fields::text(data, fields::DNS_A)),
        item("ASN", fields::text(data, fields::ASN)),
        item("ASN Description", fields::text(data, fields::ASN_DESCRIPTION)),
        item("ASN CIDR", fields::text(data, fields::ASN_CIDR)),
        item("IP WHOIS Source", fields::text(data, fields::IP_INFO_SOURCE)),
    ]
}

fn technologies(data: &Value) -> Vec<Technology> {
    let entries = fields::lookup(data, fields::TECHNOLOGIES)
        .and_then(Value::as_array)
        .or_else(|| fields::lookup(data, fields::CMS_DETECTIONS).and_then(Value::as_array));

    entries
        .map(|entries| entries.iter().map(technology).collect())
        .unwrap_or_default()
}

fn technology(entry: &Value) -> Technology {
    // A bare string entry is just a name.
    let name = match entry {
        Value::String(name) if !name.is_empty() => Some(name.clone()),
        _ => fields::text(entry, fields::TECH_NAME),
    };

    Technology {
        name: name.unwrap_or_else(|| UNKNOWN.to_string()),
        version: fields::text(entry, fields::TECH_VERSION).unwrap_or_else(|| UNKNOWN.to_string()),
        confidence: coerce_confidence(fields::lookup(entry, fields::TECH_CONFIDENCE)),
        source: fields::text(entry, fields::TECH_SOURCE).unwrap_or_else(|| UNKNOWN.to_string()),
        raw: entry.clone(),
    }
}

/// Round numeric (or numeric-string) confidence into [0, 100]; anything else is 0.
///
/// Values are taken on the 0-100 scale. Some reports use 0-1 fractions with
/// nothing to tell them apart, so fractional inputs are logged, not rescaled.
pub fn coerce_confidence(value: Option<&Value>) -> u8 {
    let number = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match number {
        Some(n) if n.is_finite() => {
            if n > 0.0 && n < 1.0 {
                debug!("Confidence {} may be a 0-1 fraction; keeping 0-100 scale", n);
            }
            n.round().clamp(0.0, 100.0) as u8
        }
        _ => 0,
    }
}

fn content(data: &Value) -> Vec<DisplayItem> {
    let links = fields::lookup(data, fields::LINKS);
    CONTENT_COUNTERS
        .iter()
        .map(|(label, key)| {
            let count = fields::count(links.and_then(|l| l.get(*key)));
            DisplayItem::new(*label, count.to_string())
        })
        .collect()
}

fn infrastructure(data: &Value) -> Vec<DisplayItem> {
    let header = |name: &str| fields::header(data, name).and_then(fields::display);

    let cms = fields::lookup(data, fields::CMS_DETECTIONS)
        .and_then(|list| list.as_array()?.first())
        .and_then(|first| fields::text(first, fields::TECH_NAME));

    let robots = if fields::flag(data, fields::ROBOTS_EXISTS) {
        "Present"
    } else {
        "Not Found"
    };

    vec![
        item("Server", header("server")),
        item("Content-Type", header("content-type")),
        item(
            "Content-Length",
            header("content-length").map(|len| format!("{} bytes", len)),
        ),
        item("Last-Modified", header("last-modified")),
        item("ETag", header("etag")),
        DisplayItem::new(
            "CDN Provider",
            fields::text(data, fields::CDN_PROVIDER).unwrap_or_else(|| NOT_DETECTED.to_string()),
        ),
        DisplayItem::new("CMS", cms.unwrap_or_else(|| NOT_DETECTED.to_string())),
        DisplayItem::new("Robots.txt", robots),
    ]
}

fn evidence(data: &Value) -> Vec<DisplayItem> {
    let mut items = Vec::new();

    if let Some(entries) = fields::lookup(data, fields::RAW_EVIDENCE).and_then(Value::as_object) {
        for (key, artifact) in entries {
            if !artifact.is_object() {
                continue;
            }
            for aliases in [
                fields::EVIDENCE_PATH,
                fields::EVIDENCE_HASH,
                fields::EVIDENCE_TIMESTAMP,
            ] {
                if let Some((attribute, value)) = fields::first(artifact, aliases) {
                    if let Some(text) = fields::display(value) {
                        items.push(DisplayItem::new(format!("{}.{}", key, attribute), text));
                    }
                }
            }
        }
    }

    if let Some(path) = fields::text(data, fields::ROBOTS_EVIDENCE_PATH) {
        items.push(DisplayItem::new("robots.raw_path", path));
    }

    if items.is_empty() {
        items.push(DisplayItem::new("Raw Evidence", NO_EVIDENCE));
    }
    items
}

fn scanned_at(data: &Value) -> Option<String> {
    let value = fields::lookup(data, fields::SCANNED_AT)?;
    match value {
        Value::Number(n) => n.as_f64().and_then(from_epoch).map(format_local),
        Value::String(s) => Some(
            parse_timestamp(s)
                .map(format_local)
                .unwrap_or_else(|| s.clone()),
        ),
        _ => None,
    }
}

/// Epoch values above 1e11 are taken as milliseconds.
fn from_epoch(raw: f64) -> Option<DateTime<Utc>> {
    let millis = if raw.abs() > 1e11 { raw } else { raw * 1000.0 };
    Utc.timestamp_millis_opt(millis as i64).single()
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    // Timestamps without an offset are UTC.
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

/// Local time with a fixed `YYYY-MM-DD HH:MM:SS` layout, whatever the locale.
fn format_local(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Category;
    use serde_json::json;

    fn value_of(report: &NormalizedReport, category: Category, label: &str) -> String {
        report
            .find(category, label)
            .unwrap_or_else(|| panic!("missing {}.{}", category.key(), label))
            .value
            .clone()
    }

    fn sample_report() -> Value {
        json!({
            "url": "https://shop.example.com/landing",
            "title": "Example Shop",
            "scan_id": "scan-42",
            "scanned_at": "2025-03-01T12:00:00Z",
            "ssl_info": {
                "valid": true,
                "issuer": {"CN": "R11", "O": "Let's Encrypt"},
                "not_after": "2025-06-01T00:00:00"
            },
            "waf_info": {"detected": true, "provider": "Cloudflare"},
            "security_headers": {"x-frame-options": "DENY", "x-content-type-options": "nosniff"},
            "dns_records": {"A": ["104.16.1.1", "104.16.2.2"]},
            "ip_info": {
                "asn": 13335,
                "asn_description": "CLOUDFLARENET",
                "asn_cidr": "104.16.0.0/13",
                "source": "rdap"
            },
            "headers": {
                "Server": "cloudflare",
                "content-type": "text/html; charset=utf-8",
                "content-length": "5120",
                "etag": "\"abc\""
            },
            "cdn_info": {"provider": "Cloudflare"},
            "cms_info": [{"name": "WordPress", "version": "6.4", "confidence": 0.9}],
            "technologies": [
                {"name": "nginx", "version": "1.25", "confidence": "87.6", "source": "header"},
                {"tech": "React", "confidence": null, "provenance": ["script", "dom"]},
                {"title": "jQuery", "raw_version": "3.7.1", "confidence": 150}
            ],
            "links_and_resources": {
                "js_links": ["/a.js", "/b.js"],
                "css_links": ["/s.css"],
                "meta_tags": [{}, {}, {}]
            },
            "robots_info": {"exists": true, "raw_evidence": {"path": "/evidence/robots.txt"}},
            "raw_evidence": {
                "homepage": {"path": "/evidence/home.html", "sha256": "deadbeef", "timestamp": "2025-03-01T12:00:01Z"},
                "tls": {"path": "/evidence/cert.pem"},
                "note": "not an artifact"
            }
        })
    }

    #[test]
    fn test_absent_report_has_every_category() {
        for report in [normalize(None), normalize(Some(&json!({})))] {
            assert!(!report.general.is_empty());
            assert!(!report.security.is_empty());
            assert!(!report.domain.is_empty());
            assert!(report.technologies.is_empty());
            assert_eq!(report.content.len(), CONTENT_COUNTERS.len());
            assert!(!report.infrastructure.is_empty());
            assert_eq!(report.evidence, vec![DisplayItem::new("Raw Evidence", NO_EVIDENCE)]);
            assert_eq!(value_of(&report, Category::General, "Target URL"), PLACEHOLDER);
        }
    }

    #[test]
    fn test_absent_report_scores_unknown() {
        let report = normalize(None);
        assert_eq!(value_of(&report, Category::Security, "Security Score"), "0/100 (Unknown)");
    }

    #[test]
    fn test_general_and_domain() {
        let report = normalize(Some(&sample_report()));
        assert_eq!(
            value_of(&report, Category::General, "Target URL"),
            "https://shop.example.com/landing"
        );
        assert_eq!(value_of(&report, Category::General, "Scan ID"), "scan-42");
        assert_ne!(value_of(&report, Category::General, "Scanned At"), PLACEHOLDER);
        assert!(report.find(Category::General, "Notes").is_none());

        assert_eq!(value_of(&report, Category::Domain, "Hostname"), "shop.example.com");
        assert_eq!(value_of(&report, Category::Domain, "DNS A"), "104.16.1.1, 104.16.2.2");
        assert_eq!(value_of(&report, Category::Domain, "ASN"), "13335");
        assert_eq!(value_of(&report, Category::Domain, "IP WHOIS Source"), "rdap");
    }

    #[test]
    fn test_unparseable_url_kept_verbatim() {
        let report = normalize(Some(&json!({"scanned_url": "not a url"})));
        assert_eq!(value_of(&report, Category::Domain, "Hostname"), "not a url");
    }

    #[test]
    fn test_security_items_follow_scorer() {
        let report = normalize(Some(&sample_report()));
        let tls = report.find(Category::Security, "SSL/TLS").unwrap();
        assert_eq!(tls.value, "Valid");
        assert_eq!(tls.status, Some(Status::Success));

        assert_eq!(value_of(&report, Category::Security, "Issuer"), "Let's Encrypt");

        let waf = report.find(Category::Security, "WAF").unwrap();
        assert_eq!(waf.value, "Cloudflare");
        assert_eq!(waf.status, Some(Status::Success));

        assert_eq!(value_of(&report, Category::Security, "Security Headers Count"), "2");
        // 30 + 20 + 10 + 10 + 10
        assert_eq!(value_of(&report, Category::Security, "Security Score"), "80/100 (High)");
    }

    #[test]
    fn test_missing_security_data() {
        let report = normalize(Some(&json!({"url": "http://example.com"})));
        let tls = report.find(Category::Security, "SSL/TLS").unwrap();
        assert_eq!(tls.value, "Missing/Invalid");
        assert_eq!(tls.status, Some(Status::Error));
        let waf = report.find(Category::Security, "WAF").unwrap();
        assert_eq!(waf.value, NOT_DETECTED);
        assert_eq!(waf.status, Some(Status::Warning));
    }

    #[test]
    fn test_technologies_prefer_explicit_list() {
        let report = normalize(Some(&sample_report()));
        let names: Vec<&str> = report.technologies.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["nginx", "React", "jQuery"]);

        let nginx = &report.technologies[0];
        assert_eq!(nginx.confidence, 88);
        assert_eq!(nginx.source, "header");
        assert_eq!(nginx.raw["confidence"], "87.6");

        let react = &report.technologies[1];
        assert_eq!(react.confidence, 0);
        assert_eq!(react.version, UNKNOWN);
        assert_eq!(react.source, "script, dom");

        let jquery = &report.technologies[2];
        assert_eq!(jquery.confidence, 100);
        assert_eq!(jquery.version, "3.7.1");
    }

    #[test]
    fn test_technologies_fall_back_to_cms() {
        let report = normalize(Some(&json!({
            "cms_info": [{"name": "Drupal", "version_string": "10", "confidence": 74.4}]
        })));
        assert_eq!(report.technologies.len(), 1);
        assert_eq!(report.technologies[0].name, "Drupal");
        assert_eq!(report.technologies[0].version, "10");
        assert_eq!(report.technologies[0].confidence, 74);
        assert_eq!(report.technologies[0].source, UNKNOWN);
    }

    #[test]
    fn test_confidence_coercion() {
        assert_eq!(coerce_confidence(Some(&json!("87.6"))), 88);
        assert_eq!(coerce_confidence(Some(&json!(null))), 0);
        assert_eq!(coerce_confidence(None), 0);
        assert_eq!(coerce_confidence(Some(&json!(150))), 100);
        assert_eq!(coerce_confidence(Some(&json!(-3))), 0);
        assert_eq!(coerce_confidence(Some(&json!("high"))), 0);
        assert_eq!(coerce_confidence(Some(&json!(true))), 0);
        assert_eq!(coerce_confidence(Some(&json!(0.9))), 1);
    }

    #[test]
    fn test_content_counts() {
        let report = normalize(Some(&sample_report()));
        assert_eq!(value_of(&report, Category::Content, "JS Links"), "2");
        assert_eq!(value_of(&report, Category::Content, "CSS Links"), "1");
        assert_eq!(value_of(&report, Category::Content, "Meta Tags"), "3");
        assert_eq!(value_of(&report, Category::Content, "API Links"), "0");
    }

    #[test]
    fn test_infrastructure() {
        let report = normalize(Some(&sample_report()));
        assert_eq!(value_of(&report, Category::Infrastructure, "Server"), "cloudflare");
        assert_eq!(value_of(&report, Category::Infrastructure, "Content-Length"), "5120 bytes");
        assert_eq!(value_of(&report, Category::Infrastructure, "Last-Modified"), PLACEHOLDER);
        assert_eq!(value_of(&report, Category::Infrastructure, "CDN Provider"), "Cloudflare");
        assert_eq!(value_of(&report, Category::Infrastructure, "CMS"), "WordPress");
        assert_eq!(value_of(&report, Category::Infrastructure, "Robots.txt"), "Present");

        let bare = normalize(Some(&json!({})));
        assert_eq!(value_of(&bare, Category::Infrastructure, "CMS"), NOT_DETECTED);
        assert_eq!(value_of(&bare, Category::Infrastructure, "Robots.txt"), "Not Found");
    }

    #[test]
    fn test_evidence_items() {
        let report = normalize(Some(&sample_report()));
        let labels: Vec<&str> = report.evidence.iter().map(|i| i.label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "homepage.path",
                "homepage.sha256",
                "homepage.timestamp",
                "tls.path",
                "robots.raw_path"
            ]
        );
        assert_eq!(report.evidence[4].value, "/evidence/robots.txt");
    }

    #[test]
    fn test_scanned_at_formats() {
        assert!(scanned_at(&json!({"scanned_at": 1_700_000_000})).is_some());
        assert!(scanned_at(&json!({"scanned_at": 1_700_000_000_000u64})).is_some());
        assert_eq!(
            scanned_at(&json!({"scanned_at": "last tuesday"})).as_deref(),
            Some("last tuesday")
        );
        let expected = format_local(Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap());
        assert_eq!(
            scanned_at(&json!({"scanned_at": "2025-03-01T12:00:00"})),
            Some(expected)
        );
    }

    #[test]
    fn test_format_local_layout() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let rendered = format_local(at);
        assert_eq!(rendered, at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string());
        assert_eq!(rendered.len(), 19);
        assert!(rendered.starts_with("2025-03-0"));
    }

    #[test]
    fn test_parse_report() {
        let raw = parse_report(r#"{"url": "https://example.com"}"#).unwrap();
        assert_eq!(raw["url"], "https://example.com");

        let err = parse_report("{not json").unwrap_err();
        assert!(matches!(err, crate::types::ReconError::Json(_)));
        assert_eq!(err.kind(), crate::types::ErrorKind::UnparseableResponse);
    }

    #[test]
    fn test_overview() {
        let summary = overview(&sample_report());
        assert_eq!(summary.domain, "https://shop.example.com/landing");
        assert_eq!(summary.ip, "104.16.1.1");

        let summary = overview(&json!({"ip_info": {"network": {"start_address": "10.0.0.0"}}}));
        assert_eq!(summary.ip, "10.0.0.0");
        assert_eq!(summary.domain, PLACEHOLDER);
    }
}
