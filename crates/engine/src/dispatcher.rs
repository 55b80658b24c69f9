//! Event dispatch: pull the payload, dedup, fan out to platforms.
//!
//! A failing platform never blocks its siblings: each adapter error is
//! reported to the error sink and dispatch moves on.

use std::sync::Arc;

use serde_json::json;
use tracing::info;

use tagwire_core::types::{CustomEvent, EcommerceData, EventConfiguration};
use tagwire_core::{DataLayer, DataLayerEvent, DataSources, TagResult, TelemetryError};
use tagwire_platforms::{DispatchContext, PlatformRegistry};

use crate::dedup::DedupStore;

/// Data-layer event written for every dispatched transaction.
pub const TRANSACTION_DATA_LAYER_EVENT: &str = "mw_ecommerce_transaction";

/// Data-layer event written for every dispatched custom event.
pub const CUSTOM_EVENT_DATA_LAYER_EVENT: &str = "mw_custom_event_telemetry";

/// What a dispatch attempt did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Fired { transaction_id: String },
    /// The page reported no payload for this configuration.
    NoData,
    /// The transaction fingerprint was seen within the dedup window.
    Duplicate,
}

/// Millisecond wall-clock timestamp in base 36, the fallback transaction
/// id when the page supplies none.
pub fn generate_transaction_id() -> String {
    base36(chrono::Utc::now().timestamp_millis().max(0) as u64)
}

fn base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".into();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).expect("base36 digits are ascii")
}

pub struct EventDispatcher {
    ctx: DispatchContext,
    registry: Arc<PlatformRegistry>,
    sources: Arc<dyn DataSources>,
    data_layer: Arc<DataLayer>,
    dedup: DedupStore,
}

impl EventDispatcher {
    pub fn new(
        ctx: DispatchContext,
        registry: Arc<PlatformRegistry>,
        sources: Arc<dyn DataSources>,
        data_layer: Arc<DataLayer>,
    ) -> Self {
        let dedup = DedupStore::new(ctx.page.clone());
        Self {
            ctx,
            registry,
            sources,
            data_layer,
            dedup,
        }
    }

    /// Dispatch a transaction configuration, reporting any failure to the
    /// error sink. Called from trigger callbacks, which have nowhere to
    /// propagate an error to.
    pub fn dispatch_ecommerce(&self, config: &EventConfiguration) {
        match self.try_dispatch_ecommerce(config) {
            Ok(DispatchOutcome::Fired { transaction_id }) => {
                info!(
                    configuration = config.label(),
                    transaction_id = %transaction_id,
                    "transaction dispatched"
                );
            }
            Ok(_) => {}
            Err(err) => self.ctx.errors.handle(&err),
        }
    }

    pub fn try_dispatch_ecommerce(
        &self,
        config: &EventConfiguration,
    ) -> TagResult<DispatchOutcome> {
        let configuration_name = config.configuration_name.as_deref().unwrap_or_default();
        let Some(data) = self.sources.ecommerce_data(configuration_name) else {
            return Ok(DispatchOutcome::NoData);
        };

        if !data.total_transaction_amount.is_finite() || data.items.is_empty() {
            return Err(TelemetryError::runtime(
                "Invalid ecommerce_data",
                json!({ "configuration": config.label() }),
            ));
        }

        if self.dedup.is_duplicate(&data) {
            return Ok(DispatchOutcome::Duplicate);
        }

        if config.platforms.is_empty() {
            return Err(TelemetryError::configuration(
                "Invalid ecommerce_configuration.platforms",
                json!({ "configuration": config.label() }),
            ));
        }

        let data = EcommerceData {
            transaction_id: data
                .transaction_id
                .clone()
                .or_else(|| Some(generate_transaction_id())),
            ..data
        };

        self.data_layer.push(DataLayerEvent::with_data(
            TRANSACTION_DATA_LAYER_EVENT,
            json!({ "data": data })
                .as_object()
                .cloned()
                .unwrap_or_default(),
        ));

        for platform in &config.platforms {
            let result = match self.registry.get(&platform.name) {
                Some(adapter) => adapter.fire_ecommerce(&self.ctx, &data, platform),
                None => Err(TelemetryError::configuration(
                    format!("Invalid platform: {}", platform.name),
                    json!({ "configuration": config.label() }),
                )),
            };
            if let Err(err) = result {
                self.ctx.errors.handle(&err);
            }
        }

        self.dedup.record_seen(&data);
        Ok(DispatchOutcome::Fired {
            transaction_id: data.transaction_id.unwrap_or_default(),
        })
    }

    /// Dispatch a custom-event configuration; per-platform failures are
    /// reported and skipped.
    pub fn dispatch_custom(&self, config: &EventConfiguration) {
        let event = CustomEvent {
            event_name: config.event_name.clone().unwrap_or_default(),
            metadata: config.metadata.clone(),
        };

        self.data_layer.push(DataLayerEvent::with_data(
            CUSTOM_EVENT_DATA_LAYER_EVENT,
            json!({ "event_name": event.event_name, "metadata": event.metadata })
                .as_object()
                .cloned()
                .unwrap_or_default(),
        ));

        for platform in &config.platforms {
            let result = match self.registry.get(&platform.name) {
                Some(adapter) => adapter.fire_custom(&self.ctx, &event, platform),
                None => Err(TelemetryError::configuration(
                    format!("Invalid platform: {}", platform.name),
                    json!({ "configuration": config.label() }),
                )),
            };
            if let Err(err) = result {
                self.ctx.errors.handle(&err);
            }
        }
    }
}
