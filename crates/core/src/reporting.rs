//! Best-effort remote error reporting.
//!
//! Errors are shipped to the collector as fire-and-forget POSTs; a failed
//! report is logged at debug level and dropped. Reporting never blocks
//! dispatch and never raises further errors.

use std::time::Duration;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::{ErrorSink, TelemetryError};
use crate::settings::TelemetrySettings;

const REPORT_TIMEOUT: Duration = Duration::from_secs(10);

/// Ships telemetry errors and plain messages to the remote collector.
pub struct RemoteReporter {
    client: reqwest::Client,
    base_url: String,
    client_name: String,
    client_abbreviation: String,
    disabled: bool,
    /// Piwik visitor id, attached to reports once the bridge resolves it.
    piwik_id: RwLock<Option<String>>,
}

impl RemoteReporter {
    pub fn new(base_url: &str, settings: &TelemetrySettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client_name: settings.client_name.clone(),
            client_abbreviation: settings.client_abbreviation.clone(),
            disabled: settings.disable_error_reporting,
            piwik_id: RwLock::new(None),
        }
    }

    pub fn set_piwik_id(&self, id: &str) {
        *self.piwik_id.write() = Some(id.to_string());
    }

    fn error_payload(&self, err: &TelemetryError) -> serde_json::Value {
        let mut payload = serde_json::json!({
            "client_name": self.client_name,
            "client_abbreviation": self.client_abbreviation,
            "message": err.message,
            "line_number": err.line,
            "location": err.file,
            "data": err.data,
        });
        if let Some(id) = self.piwik_id.read().as_deref() {
            payload["piwik_id"] = serde_json::json!(id);
        }
        payload
    }

    fn post(&self, path: &str, payload: serde_json::Value) {
        let request = self
            .client
            .post(format!("{}{path}", self.base_url))
            .timeout(REPORT_TIMEOUT)
            .json(&payload);
        tokio::spawn(async move {
            if let Err(e) = request.send().await {
                debug!(error = %e, "error report dropped");
            }
        });
    }

    /// Ship an error to the collector, unless reporting is disabled.
    pub fn report(&self, err: &TelemetryError) {
        if self.disabled {
            return;
        }
        self.post("/log/error", self.error_payload(err));
    }

    /// Ship a plain diagnostic message to the collector.
    pub fn send_message(&self, message: &str) {
        if self.disabled {
            return;
        }
        let payload = serde_json::json!({
            "client_name": self.client_name,
            "client_abbreviation": self.client_abbreviation,
            "message": message,
        });
        self.post("/log/message", payload);
    }
}

impl ErrorSink for RemoteReporter {
    fn handle(&self, error: &TelemetryError) {
        self.report(error);
    }
}
