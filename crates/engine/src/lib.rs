//! The tag engine: wires triggers, dedup, dispatch, identification, and
//! the ancillary monitors into one installable unit.
//!
//! [`TelemetryTag`] is the entry point: hand it settings plus the host
//! abstractions and call [`TelemetryTag::install`] inside a tokio runtime.
//! The returned [`InstalledTag`] owns every detector and background task
//! and tears them down on [`InstalledTag::shutdown`].

pub mod dedup;
pub mod dimensions;
pub mod dispatcher;
pub mod identification;
pub mod piwik_bridge;
pub mod product_search;
pub mod tag;
pub mod validator;

pub use dispatcher::{
    generate_transaction_id, DispatchOutcome, EventDispatcher, CUSTOM_EVENT_DATA_LAYER_EVENT,
    TRANSACTION_DATA_LAYER_EVENT,
};
pub use tag::{InstalledTag, TelemetryTag};
