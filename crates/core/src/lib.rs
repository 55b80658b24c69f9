//! Core types and host-page abstractions for the tagwire telemetry engine.
//!
//! # Modules
//!
//! - [`error`] — structured telemetry errors and error sinks
//! - [`settings`] — the root settings value supplied by the hosting site
//! - [`types`] — trigger/platform/event configuration and payload types
//! - [`page`] — the host page abstraction (DOM, URL, cookies, event stream)
//! - [`data_layer`] — the shared append-only event log with subscribers
//! - [`vendor`] — third-party vendor globals behind trait seams
//! - [`reporting`] — best-effort remote error reporting

pub mod data_layer;
pub mod error;
pub mod page;
pub mod reporting;
pub mod settings;
pub mod types;
pub mod vendor;

pub use data_layer::{DataLayer, DataLayerEvent};
pub use error::{
    capture_sink, console_sink, CaptureSink, ConsoleSink, ErrorKind, ErrorSink, FanoutSink,
    TagResult, TelemetryError,
};
pub use page::{DataSources, ElementId, Page, PageEvent, SimulatedPage, StaticDataSources};
pub use reporting::RemoteReporter;
pub use settings::TelemetrySettings;
pub use vendor::{
    FakeVendors, IdentityProvider, RecordingHandle, RecordingIdentity, VendorHandle, VendorRuntime,
};
