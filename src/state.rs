// src/state.rs
//
// The upstream dashboards kept this state in a global Redux store (or
// scattered useState hooks). Here it is one owned object: callers hold a
// `Dashboard`, drive it with `upload`, and observe changes through
// explicit subscriptions instead of ambient dispatch.

use crate::aggregate::{SummaryStats, aggregate};
use crate::config::UploadConfig;
use crate::error::ExtractError;
use crate::normalize::{RecordSet, normalize};
use crate::transport::{UploadResponse, upload_files};
use crate::upload::{UploadedFile, validate_files};
use reqwest::Client;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{Instrument, info, info_span, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Uploading,
    Extracting,
}

/// Everything the view layer renders. One upload attempt mutates this
/// through a fixed sequence of phases; a successful attempt replaces
/// `records`/`stats` wholesale, a failed one leaves them untouched.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub phase: Phase,
    pub progress: u8,
    pub error: Option<String>,
    pub success: Option<String>,
    /// Per-file extraction failures reported alongside a partial success;
    /// shown without blocking the extracted portion.
    pub warnings: Option<String>,
    pub records: RecordSet,
    pub stats: SummaryStats,
}

type Subscriber = Box<dyn Fn(&AppState) + Send + Sync>;

struct Inner {
    state: Mutex<AppState>,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl Inner {
    /// Apply a mutation, then notify subscribers with a snapshot taken
    /// outside the state lock so a subscriber may read state freely.
    fn update(&self, apply: impl FnOnce(&mut AppState)) {
        let snapshot = {
            let mut state = self.state.lock().unwrap();
            apply(&mut state);
            state.clone()
        };
        for subscriber in self.subscribers.lock().unwrap().iter() {
            subscriber(&snapshot);
        }
    }
}

pub struct Dashboard {
    client: Client,
    config: UploadConfig,
    inner: Arc<Inner>,
}

impl Dashboard {
    pub fn new(config: UploadConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Dashboard {
            client,
            config,
            inner: Arc::new(Inner {
                state: Mutex::new(AppState::default()),
                subscribers: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Register a change observer. Called with a state snapshot after
    /// every mutation, in subscription order.
    pub fn subscribe(&self, subscriber: impl Fn(&AppState) + Send + Sync + 'static) {
        self.inner
            .subscribers
            .lock()
            .unwrap()
            .push(Box::new(subscriber));
    }

    pub fn state(&self) -> AppState {
        self.inner.state.lock().unwrap().clone()
    }

    /// Run one upload attempt end to end: gate, transport, normalize,
    /// aggregate, commit. Exactly one attempt may be in flight; a call
    /// while busy is refused without touching state.
    pub async fn upload(&self, files: Vec<UploadedFile>) -> Result<(), ExtractError> {
        {
            let state = self.inner.state.lock().unwrap();
            if state.phase != Phase::Idle {
                return Err(ExtractError::UploadInProgress);
            }
        }

        if let Err(e) = validate_files(&files, &self.config.allowed_types) {
            warn!(error = %e, "Batch rejected by upload gate");
            self.fail(&e);
            return Err(e);
        }

        self.inner.update(|state| {
            state.phase = Phase::Uploading;
            state.progress = 0;
            state.error = None;
            state.success = None;
            state.warnings = None;
        });

        let progress_inner = self.inner.clone();
        let result = upload_files(
            &self.client,
            &self.config,
            &files,
            Arc::new(move |pct| {
                progress_inner.update(|state| state.progress = pct);
            }),
        )
        .instrument(info_span!("upload_attempt", files = files.len()))
        .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                self.fail(&e);
                return Err(e);
            }
        };

        self.inner.update(|state| state.phase = Phase::Extracting);
        self.commit(&response, files.len())
    }

    /// Normalize and commit a decoded response. Failure leaves the
    /// previously committed records in place; nothing partial is ever
    /// visible.
    fn commit(&self, response: &UploadResponse, submitted: usize) -> Result<(), ExtractError> {
        let records = match normalize(&response.payload) {
            Ok(records) => records,
            Err(e) => {
                self.fail(&e);
                return Err(e);
            }
        };

        let stats = aggregate(&records);
        let processed = if records.processed_file_names.is_empty() {
            submitted
        } else {
            records.processed_file_names.len()
        };
        let warnings = response.error_summary();

        info!(
            invoices = records.invoices.len(),
            products = records.products.len(),
            customers = records.customers.len(),
            total_revenue = stats.total_revenue,
            processed,
            "Extraction committed"
        );

        self.inner.update(|state| {
            state.phase = Phase::Idle;
            state.progress = 100;
            state.records = records;
            state.stats = stats;
            state.success = Some(format!("Successfully processed {processed} file(s)"));
            state.error = None;
            state.warnings = warnings;
        });
        Ok(())
    }

    /// Surface a failure: error message set, stale success cleared,
    /// phase back to idle. Committed records are not touched.
    fn fail(&self, error: &ExtractError) {
        let message = error.to_string();
        self.inner.update(|state| {
            state.phase = Phase::Idle;
            state.error = Some(message.clone());
            state.success = None;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn dashboard() -> Dashboard {
        let config: crate::config::Config = toml::from_str(
            r#"
            [upload]
            base_url = "http://localhost:5000"
            "#,
        )
        .unwrap();
        Dashboard::new(config.upload).unwrap()
    }

    fn good_response() -> UploadResponse {
        UploadResponse::from_payload(json!({
            "success": true,
            "filesProcessed": 1,
            "data": [{
                "filename": "a.pdf",
                "extractedData": { "invoices": [{"id": "INV1", "amount": 100}] }
            }]
        }))
    }

    #[test]
    fn test_commit_replaces_records_and_sets_success() {
        let d = dashboard();
        d.commit(&good_response(), 1).unwrap();

        let state = d.state();
        assert_eq!(state.records.invoices.len(), 1);
        assert_eq!(state.stats.total_revenue, 100.0);
        assert_eq!(state.success.as_deref(), Some("Successfully processed 1 file(s)"));
        assert!(state.error.is_none());
        assert_eq!(state.phase, Phase::Idle);
    }

    #[test]
    fn test_malformed_payload_commits_nothing() {
        let d = dashboard();
        d.commit(&good_response(), 1).unwrap();

        let bad = UploadResponse::from_payload(json!({"success": true, "data": []}));
        let err = d.commit(&bad, 1).unwrap_err();
        assert!(matches!(err, ExtractError::Normalization { .. }));

        let state = d.state();
        // Prior attempt's records survive; messages flip to the failure.
        assert_eq!(state.records.invoices.len(), 1);
        assert!(state.error.is_some());
        assert!(state.success.is_none());
    }

    #[test]
    fn test_partial_errors_surface_as_warnings() {
        let d = dashboard();
        let response = UploadResponse::from_payload(json!({
            "success": true,
            "filesProcessed": 1,
            "data": [{
                "filename": "a.pdf",
                "extractedData": { "invoices": [{"id": "INV1", "amount": 100}] }
            }],
            "errors": [{ "filename": "b.pdf", "errorMessage": "unreadable scan" }]
        }));
        d.commit(&response, 2).unwrap();

        let state = d.state();
        assert!(state.success.is_some());
        assert_eq!(state.warnings.as_deref(), Some("b.pdf: unreadable scan"));
        assert_eq!(state.records.invoices.len(), 1);
    }

    #[test]
    fn test_subscribers_see_every_change() {
        let d = dashboard();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        d.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        d.commit(&good_response(), 1).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_selection_never_hits_network() {
        // base_url points at nothing routable; validation must fail first.
        let d = dashboard();
        let err = d.upload(Vec::new()).await.unwrap_err();
        assert!(matches!(err, ExtractError::NoFilesSelected));
        assert_eq!(d.state().error.as_deref(), Some("Please select files to upload"));
    }

    #[tokio::test]
    async fn test_bad_mime_never_hits_network() {
        let d = dashboard();
        let files = vec![UploadedFile::new("virus.exe", "application/x-msdownload", vec![0u8; 8])];
        let err = d.upload(files).await.unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedFiles { .. }));
    }

    #[tokio::test]
    async fn test_second_attempt_refused_while_busy() {
        let d = dashboard();
        d.inner.state.lock().unwrap().phase = Phase::Uploading;

        let files = vec![UploadedFile::new("a.pdf", "application/pdf", vec![0u8; 8])];
        let err = d.upload(files).await.unwrap_err();
        assert!(matches!(err, ExtractError::UploadInProgress));
        // Refusal leaves the in-flight attempt's state alone.
        assert!(d.state().error.is_none());
    }
}
