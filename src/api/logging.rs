use serde_json::Value;
use std::fs::OpenOptions;
use std::io::{IsTerminal, Write};

use crate::util::parse_bool_str;

const DEFAULT_LOG_PATH: &str = "/tmp/crmstream-debug.log";
const DEBUG_ENV: &str = "CRMSTREAM_DEBUG";
const LOG_PATH_ENV: &str = "CRMSTREAM_LOG_PATH";

pub fn debug_enabled() -> bool {
    std::env::var(DEBUG_ENV)
        .ok()
        .and_then(|v| parse_bool_str(&v))
        .unwrap_or(false)
}

pub fn emit_debug_payload(request_url: &str, payload: &Value) {
    if !debug_enabled() {
        return;
    }
    let formatted_payload = serde_json::to_string_pretty(payload)
        .unwrap_or_else(|_| "<payload serialization error>".to_string());
    let message = format!(
        "CRMSTREAM DEBUG payload_request url={request_url}\npayload:\n{formatted_payload}\n"
    );
    emit_log_message(&message);
}

/// Records a line that was dropped because it did not parse.
pub fn emit_malformed_record(
    event_type: Option<&str>,
    line: &str,
    parse_error: &serde_json::Error,
) {
    if !debug_enabled() {
        return;
    }
    let message = format!(
        "CRMSTREAM WARN ndjson_record_dropped error={parse_error}\nevent_type={}\nline:\n{line}\n",
        event_type.unwrap_or("<none>")
    );
    emit_log_message(&message);
}

pub fn emit_stream_summary(request_url: &str, summary: &str) {
    if !debug_enabled() {
        return;
    }
    emit_log_message(&format!(
        "CRMSTREAM DEBUG stream_finished url={request_url} {summary}\n"
    ));
}

fn emit_log_message(message: &str) {
    if let Some(path) = resolve_log_path() {
        if append_log_file(&path, message).is_ok() {
            return;
        }
    }

    eprintln!("{message}");
}

fn resolve_log_path() -> Option<String> {
    std::env::var(LOG_PATH_ENV)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| {
            if std::io::stderr().is_terminal() {
                Some(DEFAULT_LOG_PATH.to_string())
            } else {
                None
            }
        })
}

fn append_log_file(path: &str, message: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(message.as_bytes())
}
