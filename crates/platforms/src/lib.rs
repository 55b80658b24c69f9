//! Destination platform adapters.
//!
//! Each vendor tag the engine can report to implements [`PlatformAdapter`].
//! Adapters are synchronous from the dispatcher's point of view: a vendor
//! that loads late (facebook, google_ads custom, linkedin) spawns its own
//! bounded polling task and reports a late failure through the context's
//! error sink instead of returning it.
//!
//! Adapter failures are isolated per platform: the dispatcher fires every
//! adapter in a configuration and reports each error independently.

pub mod adapters;
mod options;
mod retry;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;

use tagwire_core::types::{CustomEvent, EcommerceData, PlatformSpec};
use tagwire_core::{ErrorSink, Page, TagResult, TelemetryError, TelemetrySettings, VendorRuntime};

/// Everything an adapter needs at dispatch time.
#[derive(Clone)]
pub struct DispatchContext {
    pub settings: Arc<TelemetrySettings>,
    pub page: Arc<dyn Page>,
    pub vendors: Arc<dyn VendorRuntime>,
    pub errors: Arc<dyn ErrorSink>,
}

/// One destination platform. `fire_custom` defaults to a configuration
/// error for vendors that only take transaction events.
pub trait PlatformAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    fn fire_ecommerce(
        &self,
        ctx: &DispatchContext,
        data: &EcommerceData,
        spec: &PlatformSpec,
    ) -> TagResult<()>;

    fn fire_custom(
        &self,
        _ctx: &DispatchContext,
        _event: &CustomEvent,
        _spec: &PlatformSpec,
    ) -> TagResult<()> {
        Err(TelemetryError::configuration(
            format!("{} does not support custom events", self.name()),
            json!({ "platform": self.name() }),
        ))
    }
}

/// Name-keyed adapter table. Configurations reference platforms by name;
/// an unknown name is a configuration error at dispatch time.
#[derive(Default)]
pub struct PlatformRegistry {
    adapters: HashMap<String, Arc<dyn PlatformAdapter>>,
}

impl PlatformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in adapter.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for adapter in adapters::builtin() {
            registry.register(adapter);
        }
        registry
    }

    pub fn register(&mut self, adapter: Arc<dyn PlatformAdapter>) {
        self.adapters.insert(adapter.name().to_string(), adapter);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn PlatformAdapter>> {
        self.adapters.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.adapters.keys().map(|n| n.as_str()).collect()
    }
}

pub use retry::{VENDOR_POLL, VENDOR_POLL_LIMIT};
