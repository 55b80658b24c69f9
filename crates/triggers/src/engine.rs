use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::debug;

use tagwire_core::types::TriggerSpec;
use tagwire_core::{DataLayer, Page, TagResult, TelemetryError};

use crate::detectors::{self, DetectorCtx};
use crate::handle::DetectorHandle;

/// Fired by a detector each time its trigger condition is met.
pub type TriggerCallback = Arc<dyn Fn() + Send + Sync>;

const KNOWN_KINDS: &[&str] = &[
    "element_exists",
    "element_contains_text",
    "dataLayer_event",
    "dataLayer_event_interval",
    "parameter_equals",
    "url_contains_all",
    "url_exact_match",
    "pathname_exact_match",
    "element_mousedown",
    "element_trigger_event",
    "element_trigger_event_v2",
    "javascript_message_contains_text",
    "page_view",
];

/// Validates trigger specs and spawns the matching detectors against one
/// page and one data layer.
pub struct TriggerEngine {
    page: Arc<dyn Page>,
    data_layer: Arc<DataLayer>,
}

impl TriggerEngine {
    pub fn new(page: Arc<dyn Page>, data_layer: Arc<DataLayer>) -> Self {
        Self { page, data_layer }
    }

    pub fn data_layer(&self) -> &Arc<DataLayer> {
        &self.data_layer
    }

    /// Validate the spec and install its detector. Returns an inert handle
    /// when a URL gate keeps the trigger off this page; gates are evaluated
    /// against the URL at resolution time, before any install delay.
    pub fn resolve(
        &self,
        spec: &TriggerSpec,
        callback: TriggerCallback,
    ) -> TagResult<DetectorHandle> {
        if spec.trigger_type.is_empty() {
            return Err(TelemetryError::configuration("Missing trigger.type", json!({})));
        }
        if !KNOWN_KINDS.contains(&spec.trigger_type.as_str()) {
            return Err(TelemetryError::configuration(
                "Invalid trigger.type",
                json!({ "type": spec.trigger_type }),
            ));
        }

        let delay = match spec.timeout {
            None => None,
            Some(ms) if ms.is_finite() && ms >= 0.0 => Some(Duration::from_millis(ms as u64)),
            Some(ms) => {
                return Err(TelemetryError::configuration(
                    "Invalid trigger.timeout",
                    json!({ "timeout": ms.to_string() }),
                ))
            }
        };

        if let Some(urls) = &spec.urls {
            if urls.is_empty() {
                return Err(TelemetryError::configuration(
                    "Invalid trigger.urls",
                    json!({ "urls": [] }),
                ));
            }
            if !urls.iter().any(|u| self.page.url_contains(u)) {
                return Ok(DetectorHandle::inert(self.data_layer.clone()));
            }
        }
        if let Some(excludes) = &spec.exclude_urls {
            if excludes.is_empty() {
                return Err(TelemetryError::configuration(
                    "Invalid trigger.exclude_urls",
                    json!({ "exclude_urls": [] }),
                ));
            }
            if excludes.iter().any(|u| self.page.url_contains(u)) {
                return Ok(DetectorHandle::inert(self.data_layer.clone()));
            }
        }

        let ctx = DetectorCtx {
            page: self.page.clone(),
            data_layer: self.data_layer.clone(),
            callback,
            delay,
        };

        let handle = match spec.trigger_type.as_str() {
            "element_exists" => {
                detectors::element_exists(ctx, require(&spec.selector, "selector")?)
            }
            "element_contains_text" => detectors::element_contains_text(
                ctx,
                require(&spec.selector, "selector")?,
                require(&spec.text, "text")?,
            ),
            "dataLayer_event" => {
                detectors::data_layer_event(ctx, require(&spec.event_name, "event_name")?)
            }
            "dataLayer_event_interval" => {
                detectors::data_layer_event_interval(ctx, require(&spec.event_name, "event_name")?)
            }
            "parameter_equals" => detectors::parameter_equals(
                ctx,
                require(&spec.parameter_key, "parameter_key")?,
                require(&spec.parameter_value, "parameter_value")?,
            ),
            "url_contains_all" => {
                let strings = spec.strings.clone().ok_or_else(|| {
                    TelemetryError::configuration(
                        "Missing trigger field: strings",
                        json!({ "field": "strings" }),
                    )
                })?;
                if strings.is_empty() {
                    return Err(TelemetryError::configuration(
                        "Invalid trigger.strings",
                        json!({ "strings": [] }),
                    ));
                }
                detectors::url_contains_all(ctx, strings)
            }
            "url_exact_match" => detectors::url_exact_match(ctx, require(&spec.url, "url")?),
            "pathname_exact_match" => {
                detectors::pathname_exact_match(ctx, require(&spec.pathname, "pathname")?)
            }
            "element_mousedown" => {
                detectors::element_mousedown(ctx, require(&spec.selector, "selector")?)
            }
            "element_trigger_event" => detectors::element_trigger_event(
                ctx,
                require(&spec.selector, "selector")?,
                require(&spec.trigger_event, "trigger_event")?,
            ),
            "element_trigger_event_v2" => detectors::element_trigger_event_v2(
                ctx,
                require(&spec.selector, "selector")?,
                require(&spec.trigger_event, "trigger_event")?,
            ),
            "javascript_message_contains_text" => {
                detectors::javascript_message_contains_text(ctx, require(&spec.text, "text")?)
            }
            "page_view" => detectors::page_view(ctx),
            // KNOWN_KINDS membership was checked above.
            _ => unreachable!(),
        };

        debug!(kind = %spec.trigger_type, delay_ms = spec.timeout, "detector installed");
        Ok(handle)
    }
}

fn require(field: &Option<String>, name: &str) -> TagResult<String> {
    field
        .clone()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            TelemetryError::configuration(
                format!("Missing trigger field: {name}"),
                json!({ "field": name }),
            )
        })
}
