//! Configuration and payload types for the tag engine.
//!
//! These are the declarative values a hosting site supplies: trigger
//! descriptions, destination platform entries, and the event configurations
//! that bundle them, plus the normalized payloads that flow to adapters.

use serde::{Deserialize, Serialize};

/// A declarative trigger description. `trigger_type` selects one of the
/// registered detector kinds; which of the optional fields are required
/// depends on the kind and is validated at resolution time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerSpec {
    #[serde(rename = "type")]
    pub trigger_type: String,
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub event_name: Option<String>,
    #[serde(default)]
    pub parameter_key: Option<String>,
    #[serde(default)]
    pub parameter_value: Option<String>,
    #[serde(default)]
    pub strings: Option<Vec<String>>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub pathname: Option<String>,
    #[serde(default)]
    pub trigger_event: Option<String>,
    /// Delay in milliseconds before the detector is installed.
    #[serde(default)]
    pub timeout: Option<f64>,
    /// OR-matched substrings against the current URL; the trigger is inert
    /// unless at least one matches.
    #[serde(default)]
    pub urls: Option<Vec<String>>,
    /// The trigger is inert if any of these substrings matches the URL.
    #[serde(default)]
    pub exclude_urls: Option<Vec<String>>,
}

/// A destination platform entry inside an event configuration. `options`
/// carries vendor-specific parameters; each adapter deserializes its own
/// typed options record from it at dispatch time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformSpec {
    pub name: String,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub options: serde_json::Map<String, serde_json::Value>,
    /// Legacy top-level form used by older custom-event configurations.
    #[serde(default)]
    pub illumin_pg: Option<f64>,
}

/// A named bundle of triggers and destination platforms describing one
/// reportable event. Triggers are OR-combined; platforms all fire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventConfiguration {
    #[serde(default)]
    pub configuration_name: Option<String>,
    /// Custom-event configurations carry the event name to report.
    #[serde(default)]
    pub event_name: Option<String>,
    #[serde(default)]
    pub triggers: Vec<TriggerSpec>,
    #[serde(default)]
    pub platforms: Vec<PlatformSpec>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl EventConfiguration {
    /// Label used in error context; configurations are not required to be
    /// named, so fall back to the custom-event name.
    pub fn label(&self) -> &str {
        self.configuration_name
            .as_deref()
            .or(self.event_name.as_deref())
            .unwrap_or("(unnamed)")
    }
}

/// One purchasable line item inside an ecommerce transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EcommerceItem {
    pub sku: String,
    pub name: String,
    pub category: String,
    pub price: f64,
    pub quantity: f64,
}

/// Normalized transaction data produced by the hosting page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EcommerceData {
    #[serde(default)]
    pub transaction_id: Option<String>,
    pub total_transaction_amount: f64,
    #[serde(default)]
    pub items: Vec<EcommerceItem>,
}

/// Normalized custom-event payload handed to adapters.
#[derive(Debug, Clone)]
pub struct CustomEvent {
    pub event_name: String,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// A custom identification configuration: resolved through the trigger
/// engine, pulling a trait map from the host's data getter when fired.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomIdentification {
    #[serde(default)]
    pub configuration_name: Option<String>,
    #[serde(default)]
    pub triggers: Vec<TriggerSpec>,
}

/// Field-capture identification settings: selector groups per trait type,
/// an optional install delay, and URL exclusions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentificationSettings {
    /// Legacy selector group, treated as email selectors.
    #[serde(default)]
    pub selectors: Option<Vec<String>>,
    #[serde(default)]
    pub email_selectors: Option<Vec<String>>,
    #[serde(default)]
    pub phone_selectors: Option<Vec<String>>,
    #[serde(default)]
    pub city_selectors: Option<Vec<String>>,
    #[serde(default)]
    pub state_selectors: Option<Vec<String>>,
    #[serde(default)]
    pub zip_selectors: Option<Vec<String>>,
    #[serde(default)]
    pub custom_configurations: Option<Vec<CustomIdentification>>,
    #[serde(default)]
    pub exclude_urls: Option<Vec<String>>,
    /// Delay in milliseconds before the blur listener is installed.
    #[serde(default)]
    pub timeout: Option<f64>,
}

/// Product-search capture: read a query parameter on matching pages and
/// report it as a search event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductSearchSpec {
    pub url_parameter: String,
    #[serde(default)]
    pub urls: Option<Vec<String>>,
}
