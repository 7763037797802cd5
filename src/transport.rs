// src/transport.rs

use crate::config::UploadConfig;
use crate::error::{ExtractError, GENERIC_UPLOAD_ERROR};
use crate::upload::UploadedFile;
use futures::Stream;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{error, info, warn};

/// Progress observer: receives percentages in [0, 100], strictly
/// increasing per attempt.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// One per-file failure reported by the backend alongside a partial
/// success.
#[derive(Debug, Clone, Deserialize)]
pub struct FileError {
    pub filename: String,
    #[serde(rename = "errorMessage")]
    pub error_message: String,
}

/// Decoded upload response: the raw payload for the normalizer plus any
/// per-file errors the server reported.
#[derive(Debug)]
pub struct UploadResponse {
    pub payload: Value,
    pub file_errors: Vec<FileError>,
}

impl UploadResponse {
    pub fn from_payload(payload: Value) -> Self {
        let file_errors = payload
            .get("errors")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
        UploadResponse {
            payload,
            file_errors,
        }
    }

    /// Per-file errors rendered for display: `"a.pdf: msg; b.pdf: msg"`.
    pub fn error_summary(&self) -> Option<String> {
        if self.file_errors.is_empty() {
            return None;
        }
        Some(
            self.file_errors
                .iter()
                .map(|e| format!("{}: {}", e.filename, e.error_message))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// Bytes-transferred accounting shared across all parts of one request.
/// Reports only when the integer percentage advances, so the observer
/// sees a monotone sequence capped at 100.
struct ProgressCounter {
    total: u64,
    sent: AtomicU64,
    last_pct: AtomicU64,
    on_progress: ProgressFn,
}

impl ProgressCounter {
    fn new(total: u64, on_progress: ProgressFn) -> Arc<Self> {
        Arc::new(ProgressCounter {
            total,
            sent: AtomicU64::new(0),
            last_pct: AtomicU64::new(0),
            on_progress,
        })
    }

    fn add(&self, bytes: u64) {
        let sent = self.sent.fetch_add(bytes, Ordering::Relaxed) + bytes;
        let pct = (sent * 100 / self.total.max(1)).min(100);
        let prev = self.last_pct.fetch_max(pct, Ordering::Relaxed);
        if pct > prev {
            (self.on_progress)(pct as u8);
        }
    }
}

/// Chunked body stream that ticks the shared counter as the transport
/// pulls bytes, so progress tracks what actually left the client.
fn part_stream(
    data: Vec<u8>,
    counter: Arc<ProgressCounter>,
) -> impl Stream<Item = Result<Vec<u8>, std::io::Error>> {
    const CHUNK: usize = 64 * 1024;
    let chunks: Vec<Vec<u8>> = data.chunks(CHUNK).map(|c| c.to_vec()).collect();
    futures::stream::iter(chunks.into_iter().map(move |chunk| {
        counter.add(chunk.len() as u64);
        Ok(chunk)
    }))
}

/// Upload a validated batch as one multipart POST to
/// `<base_url>/api/upload/files`, one `files` part per file.
///
/// Exactly one request per call; a failure is terminal for the attempt
/// and surfaced as `Transport` with the server's `message` field when the
/// body carries one, the generic fallback otherwise.
pub async fn upload_files(
    client: &Client,
    config: &UploadConfig,
    files: &[UploadedFile],
    on_progress: ProgressFn,
) -> Result<UploadResponse, ExtractError> {
    let url = format!("{}/api/upload/files", config.base_url.trim_end_matches('/'));
    let total: u64 = files.iter().map(|f| f.size_bytes).sum();
    let counter = ProgressCounter::new(total, on_progress);

    let mut form = Form::new();
    for file in files {
        let body = Body::wrap_stream(part_stream(file.data.clone(), counter.clone()));
        let part = Part::stream_with_length(body, file.size_bytes)
            .file_name(file.name.clone())
            .mime_str(&file.mime_type)
            .map_err(|e| ExtractError::Transport {
                message: e.to_string(),
            })?;
        form = form.part("files", part);
    }

    info!(url = %url, files = files.len(), bytes = total, "Uploading batch");

    let response = client.post(&url).multipart(form).send().await.map_err(|e| {
        error!(error = %e, "Upload request failed");
        ExtractError::Transport {
            message: GENERIC_UPLOAD_ERROR.to_string(),
        }
    })?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| GENERIC_UPLOAD_ERROR.to_string());
        error!(status = %status, message = %message, "Server rejected upload");
        return Err(ExtractError::Transport { message });
    }

    let payload: Value = response.json().await.map_err(|e| {
        error!(error = %e, "Response body was not JSON");
        ExtractError::Transport {
            message: GENERIC_UPLOAD_ERROR.to_string(),
        }
    })?;

    let decoded = UploadResponse::from_payload(payload);
    if let Some(summary) = decoded.error_summary() {
        warn!(errors = %summary, "Server reported per-file errors");
    }
    Ok(decoded)
}
