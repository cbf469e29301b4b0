//! Reply classification and interpretation.

use crate::report::fields;
use crate::types::{ReconError, Result};
use serde_json::Value;
use tracing::trace;

/// Body of a successful reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    /// Non-JSON body, kept verbatim.
    Text(String),
}

const JOB_ID: &[&str] = &["job_id", "jobId"];
const RESULT_WRAPPERS: &[&str] = &["data", "result"];
const ERROR_MESSAGE: &[&str] = &["error", "message", "detail"];

/// Keys whose presence marks a payload as an actual report.
const REPORT_MARKERS: &[&str] = &[
    "url",
    "scanned_url",
    "scan_id",
    "title",
    "headers",
    "ssl_info",
    "security_headers",
    "dns_records",
    "ip_info",
    "technologies",
    "cms_info",
    "links_and_resources",
    "raw_evidence",
];

const PROCESSING: &[&str] = &["processing", "pending", "queued", "running", "in_progress"];
const COMPLETED: &[&str] = &["completed", "complete", "done", "success", "finished"];
const FAILED: &[&str] = &["failed", "error", "cancelled"];

/// Turn a raw HTTP reply into a payload or an error.
pub fn classify(status: u16, content_type: Option<&str>, body: String) -> Result<Payload> {
    if !(200..300).contains(&status) {
        return Err(ReconError::service(status, &body));
    }

    let is_json = content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("application/json"));
    if is_json {
        return serde_json::from_str(&body)
            .map(Payload::Json)
            .map_err(|e| ReconError::Unparseable(e.to_string()));
    }

    match serde_json::from_str::<Value>(&body) {
        Ok(value) => Ok(Payload::Json(value)),
        Err(_) => {
            trace!("Reply is not JSON ({} bytes), keeping text", body.len());
            Ok(Payload::Text(body))
        }
    }
}

/// Interpretation of the reply to the initial request.
#[derive(Debug, Clone, PartialEq)]
pub enum InitialReply {
    Final(Value),
    Job(String),
    Failed(String),
}

/// Interpretation of a job status reply.
#[derive(Debug, Clone, PartialEq)]
pub enum PollReply {
    Processing,
    Completed(Value),
    Failed(String),
}

pub fn initial_reply(payload: Value) -> InitialReply {
    let status = poll_status(&payload);
    match status {
        Some(StatusClass::Failed) => return InitialReply::Failed(error_message(&payload)),
        Some(StatusClass::Completed) => return InitialReply::Final(extract_result(payload)),
        _ => {}
    }

    // A job still running wins over report keys echoed in the ticket.
    match job_id(&payload) {
        Some(id) if status.is_some() || !has_result(&payload) => InitialReply::Job(id),
        _ => InitialReply::Final(extract_result(payload)),
    }
}

pub fn poll_reply(payload: Value) -> PollReply {
    match poll_status(&payload) {
        Some(StatusClass::Processing) => PollReply::Processing,
        Some(StatusClass::Completed) => PollReply::Completed(extract_result(payload)),
        Some(StatusClass::Failed) => PollReply::Failed(error_message(&payload)),
        Some(StatusClass::Unknown) => PollReply::Processing,
        None if has_result(&payload) => PollReply::Completed(extract_result(payload)),
        None => PollReply::Processing,
    }
}

/// Job identifier as a string, whether sent as text or number.
pub fn job_id(payload: &Value) -> Option<String> {
    match fields::lookup(payload, JOB_ID)? {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusClass {
    Processing,
    Completed,
    Failed,
    Unknown,
}

fn poll_status(payload: &Value) -> Option<StatusClass> {
    let status = payload.get("status")?.as_str()?.trim().to_ascii_lowercase();
    let class = if PROCESSING.contains(&status.as_str()) {
        StatusClass::Processing
    } else if COMPLETED.contains(&status.as_str()) {
        StatusClass::Completed
    } else if FAILED.contains(&status.as_str()) {
        StatusClass::Failed
    } else {
        StatusClass::Unknown
    };
    Some(class)
}

fn has_result(payload: &Value) -> bool {
    RESULT_WRAPPERS
        .iter()
        .any(|key| payload.get(key).is_some_and(Value::is_object))
        || looks_like_report(payload)
}

fn looks_like_report(payload: &Value) -> bool {
    payload
        .as_object()
        .is_some_and(|map| REPORT_MARKERS.iter().any(|key| map.contains_key(*key)))
}

/// Unwrap `data`/`result` wrappers; otherwise the payload is the report.
fn extract_result(mut payload: Value) -> Value {
    for key in RESULT_WRAPPERS {
        if payload.get(key).is_some_and(Value::is_object) {
            if let Some(map) = payload.as_object_mut() {
                if let Some(inner) = map.remove(*key) {
                    return inner;
                }
            }
        }
    }
    payload
}

fn error_message(payload: &Value) -> String {
    fields::text(payload, ERROR_MESSAGE).unwrap_or_else(|| "scan job failed".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_classify_json_content_type() {
        let payload = classify(200, Some("application/json; charset=utf-8"), r#"{"a":1}"#.into()).unwrap();
        assert_eq!(payload, Payload::Json(json!({"a": 1})));

        let err = classify(200, Some("application/json"), "{broken".into()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnparseableResponse);
    }

    #[test]
    fn test_classify_text_fallback() {
        let payload = classify(200, Some("text/plain"), r#"{"url":"x"}"#.into()).unwrap();
        assert_eq!(payload, Payload::Json(json!({"url": "x"})));

        let payload = classify(200, None, "<html>hi</html>".into()).unwrap();
        assert_eq!(payload, Payload::Text("<html>hi</html>".into()));
    }

    #[test]
    fn test_classify_status() {
        match classify(404, Some("text/html"), "nope".into()) {
            Err(ReconError::Service { status, body }) => {
                assert_eq!(status, 404);
                assert_eq!(body, "nope");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(classify(503, None, String::new()).is_err());
    }

    #[test]
    fn test_initial_reply_job_ticket() {
        assert_eq!(initial_reply(json!({"job_id": "abc"})), InitialReply::Job("abc".into()));
        assert_eq!(
            initial_reply(json!({"jobId": 17, "status": "queued"})),
            InitialReply::Job("17".into())
        );
    }

    #[test]
    fn test_initial_reply_ticket_echoing_url() {
        let ticket = json!({"job_id": "abc", "status": "processing", "url": "https://example.com"});
        assert_eq!(initial_reply(ticket), InitialReply::Job("abc".into()));

        let ticket = json!({"jobId": 9, "status": "warming up", "title": "Example"});
        assert_eq!(initial_reply(ticket), InitialReply::Job("9".into()));

        // Without a status, report keys still mark a finished report.
        let report = json!({"job_id": "abc", "url": "https://example.com"});
        assert_eq!(initial_reply(report.clone()), InitialReply::Final(report));
    }

    #[test]
    fn test_initial_reply_final() {
        let report = json!({"url": "https://example.com", "headers": {}});
        assert_eq!(initial_reply(report.clone()), InitialReply::Final(report.clone()));

        let wrapped = json!({"job_id": "abc", "status": "completed", "data": report.clone()});
        assert_eq!(initial_reply(wrapped), InitialReply::Final(report));
    }

    #[test]
    fn test_initial_reply_failed() {
        assert_eq!(
            initial_reply(json!({"status": "failed", "error": "dns lookup failed"})),
            InitialReply::Failed("dns lookup failed".into())
        );
    }

    #[test]
    fn test_poll_reply() {
        assert_eq!(poll_reply(json!({"status": "processing"})), PollReply::Processing);
        assert_eq!(poll_reply(json!({"status": "warming up"})), PollReply::Processing);
        assert_eq!(
            poll_reply(json!({"status": "completed", "data": {"url": "u"}})),
            PollReply::Completed(json!({"url": "u"}))
        );
        assert_eq!(
            poll_reply(json!({"status": "failed"})),
            PollReply::Failed("scan job failed".into())
        );
    }

    #[test]
    fn test_poll_reply_bare_payload() {
        let bare = json!({"url": "https://example.com", "title": "Example"});
        assert_eq!(poll_reply(bare.clone()), PollReply::Completed(bare));
        assert_eq!(poll_reply(json!({})), PollReply::Processing);
    }
}
