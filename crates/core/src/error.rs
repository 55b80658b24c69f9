use std::panic::Location;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::settings::TelemetrySettings;

pub type TagResult<T> = Result<T, TelemetryError>;

/// Failure taxonomy. Every error the engine produces falls into one of
/// these classes, and none of them is allowed to escape past the
/// configuration/platform boundary it occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed or missing configuration field, raised at setup time.
    Configuration,
    /// A vendor global was undefined at dispatch time (immediately, or
    /// after bounded polling ran out).
    DependencyUnavailable,
    /// Unexpected failure during data shaping or dispatch.
    Runtime,
}

/// Structured telemetry error: message, arbitrary context data, and the
/// call site that raised it.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TelemetryError {
    pub kind: ErrorKind,
    pub message: String,
    pub data: serde_json::Value,
    pub file: &'static str,
    pub line: u32,
}

impl TelemetryError {
    #[track_caller]
    pub fn new(kind: ErrorKind, message: impl Into<String>, data: serde_json::Value) -> Self {
        let location = Location::caller();
        Self {
            kind,
            message: message.into(),
            data,
            file: location.file(),
            line: location.line(),
        }
    }

    #[track_caller]
    pub fn configuration(message: impl Into<String>, data: serde_json::Value) -> Self {
        Self::new(ErrorKind::Configuration, message, data)
    }

    #[track_caller]
    pub fn dependency_unavailable(message: impl Into<String>, data: serde_json::Value) -> Self {
        Self::new(ErrorKind::DependencyUnavailable, message, data)
    }

    #[track_caller]
    pub fn runtime(message: impl Into<String>, data: serde_json::Value) -> Self {
        Self::new(ErrorKind::Runtime, message, data)
    }
}

/// Consumes telemetry errors. Implementations log locally, capture for
/// tests, or ship to the remote collector.
pub trait ErrorSink: Send + Sync {
    fn handle(&self, error: &TelemetryError);
}

/// Logs errors as structured tracing events, annotated with the client
/// identity from the settings.
pub struct ConsoleSink {
    client_name: String,
    client_abbreviation: String,
}

impl ConsoleSink {
    pub fn new(settings: &TelemetrySettings) -> Self {
        Self {
            client_name: settings.client_name.clone(),
            client_abbreviation: settings.client_abbreviation.clone(),
        }
    }
}

impl ErrorSink for ConsoleSink {
    fn handle(&self, err: &TelemetryError) {
        error!(
            client_name = %self.client_name,
            client_abbreviation = %self.client_abbreviation,
            kind = ?err.kind,
            message = %err.message,
            file = err.file,
            line = err.line,
            data = %err.data,
            "telemetry error"
        );
    }
}

/// In-memory sink that captures errors for testing.
#[derive(Default)]
pub struct CaptureSink {
    errors: Mutex<Vec<TelemetryError>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn errors(&self) -> Vec<TelemetryError> {
        self.errors.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.errors.lock().len()
    }

    pub fn count_kind(&self, kind: ErrorKind) -> usize {
        self.errors.lock().iter().filter(|e| e.kind == kind).count()
    }

    pub fn clear(&self) {
        self.errors.lock().clear();
    }
}

impl ErrorSink for CaptureSink {
    fn handle(&self, error: &TelemetryError) {
        self.errors.lock().push(error.clone());
    }
}

/// Hands each error to every inner sink in order.
pub struct FanoutSink {
    sinks: Vec<Arc<dyn ErrorSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn ErrorSink>>) -> Self {
        Self { sinks }
    }
}

impl ErrorSink for FanoutSink {
    fn handle(&self, error: &TelemetryError) {
        for sink in &self.sinks {
            sink.handle(error);
        }
    }
}

/// Convenience: console sink for the given settings.
pub fn console_sink(settings: &TelemetrySettings) -> Arc<dyn ErrorSink> {
    Arc::new(ConsoleSink::new(settings))
}

/// Convenience: capture sink for tests.
pub fn capture_sink() -> Arc<CaptureSink> {
    Arc::new(CaptureSink::new())
}
