//! Response helpers: HTTP dates and error bodies.
//!
//! # Design Decisions
//! - Error bodies are negotiated by request mode: JSON for AJAX, plain text
//!   for CLI, HTML otherwise
//! - Traces only appear when the caller passes one (debug enabled)

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::routing::template::Mode;

const HTTP_DATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Format unix seconds as an HTTP date (`Thu, 01 Jan 1970 00:00:00 GMT`).
pub fn http_date(ts: i64) -> String {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .unwrap_or_default()
        .format(HTTP_DATE)
        .to_string()
}

/// Parse an HTTP date (or any RFC 2822 date) into unix seconds.
pub fn parse_http_date(value: &str) -> Option<i64> {
    DateTime::parse_from_rfc2822(value.trim())
        .map(|d| d.timestamp())
        .ok()
}

/// A rendered error response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorBody {
    pub content_type: Option<&'static str>,
    pub body: String,
}

/// Render the default error body for `mode`.
pub fn error_body(mode: Mode, code: u16, reason: &str, text: &str, trace: Option<&str>, encoding: &str) -> ErrorBody {
    match mode {
        Mode::Ajax => {
            let mut value = json!({ "status": reason, "text": text });
            if let Some(trace) = trace {
                value["trace"] = json!(trace);
            }
            ErrorBody {
                content_type: Some("application/json"),
                body: value.to_string(),
            }
        }
        Mode::Cli => ErrorBody {
            content_type: None,
            body: format!(
                "Status : {}\nText   : {}\n{}\n",
                reason,
                text,
                trace.unwrap_or_default()
            ),
        },
        Mode::Sync | Mode::All => {
            let trace = trace
                .map(|t| format!("<pre>{}</pre>", escape_html(t)))
                .unwrap_or_default();
            ErrorBody {
                content_type: Some("text/html"),
                body: format!(
                    "<!DOCTYPE html><html><head><meta charset=\"{encoding}\">\
                     <meta name=\"viewport\" content=\"width=device-width, initial-scale=1, shrink-to-fit=no\">\
                     <title>{code} {reason}</title></head>\
                     <body><h1>{reason}</h1><p>{text}</p>{trace}</body></html>",
                    encoding = encoding,
                    code = code,
                    reason = reason,
                    text = escape_html(text),
                    trace = trace,
                ),
            }
        }
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_date_round_trip() {
        assert_eq!(http_date(0), "Thu, 01 Jan 1970 00:00:00 GMT");
        let ts = 1_700_000_000;
        assert_eq!(parse_http_date(&http_date(ts)), Some(ts));
        assert!(parse_http_date("yesterday").is_none());
    }

    #[test]
    fn test_ajax_error_body() {
        let out = error_body(Mode::Ajax, 404, "Not Found", "HTTP 404 (GET /y)", None, "UTF-8");
        assert_eq!(out.content_type, Some("application/json"));
        let value: serde_json::Value = serde_json::from_str(&out.body).unwrap();
        assert_eq!(value["status"], "Not Found");
        assert_eq!(value["text"], "HTTP 404 (GET /y)");
        assert!(value.get("trace").is_none());
    }

    #[test]
    fn test_cli_error_body() {
        let out = error_body(Mode::Cli, 500, "Internal Server Error", "boom", None, "UTF-8");
        assert_eq!(out.content_type, None);
        assert_eq!(out.body, "Status : Internal Server Error\nText   : boom\n\n");
    }

    #[test]
    fn test_html_error_body_escapes() {
        let out = error_body(Mode::Sync, 405, "Method Not Allowed", "<x>", Some("frame"), "UTF-8");
        assert_eq!(out.content_type, Some("text/html"));
        assert!(out.body.contains("<title>405 Method Not Allowed</title>"));
        assert!(out.body.contains("<p>&lt;x&gt;</p>"));
        assert!(out.body.contains("<pre>frame</pre>"));
        assert!(out.body.contains("charset=\"UTF-8\""));
    }
}
