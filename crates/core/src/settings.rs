use serde::Deserialize;

use crate::types::{EventConfiguration, IdentificationSettings, ProductSearchSpec};

/// Root telemetry settings supplied by the hosting site. Loaded once at
/// startup and handed to the engine; the engine owns no global state
/// beyond what this value carries.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub client_name: String,
    #[serde(default)]
    pub client_abbreviation: String,
    #[serde(default)]
    pub disable_error_reporting: bool,
    /// Disables the ecommerce and custom-event groups entirely.
    #[serde(default)]
    pub events_disabled: bool,
    /// The host page already runs its own Matomo instance; piwik-bound
    /// calls go to the alternate `_ppas` queue instead of `_paq`.
    #[serde(default)]
    pub matomo_conflict: bool,

    #[serde(default)]
    pub ecommerce_configurations: Vec<EventConfiguration>,
    #[serde(default)]
    pub custom_event_configurations: Vec<EventConfiguration>,
    #[serde(default)]
    pub identification_configuration: Option<IdentificationSettings>,
    #[serde(default)]
    pub product_search_configurations: Vec<ProductSearchSpec>,

    // Per-vendor account identifiers.
    #[serde(default)]
    pub adform_pixel_id: Option<String>,
    #[serde(default)]
    pub illumin_pixel_id: Option<String>,
    #[serde(default)]
    pub taboola_pixel_id: Option<String>,
    #[serde(default)]
    pub mntn_pixel_id: Option<String>,
    #[serde(default)]
    pub tradedesk_advertiser_id: Option<String>,
    #[serde(default)]
    pub tradedesk_upixel_id: Option<String>,
}

impl TelemetrySettings {
    /// Load settings from a JSON file plus `TAGWIRE__`-prefixed environment
    /// variables (environment wins).
    pub fn load(path: &str) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::new(path, config::FileFormat::Json))
            .add_source(
                config::Environment::with_prefix("TAGWIRE")
                    .separator("__")
                    .try_parsing(true),
            );
        builder.build()?.try_deserialize()
    }

    /// Parse settings from an in-memory JSON value (the form a hosting
    /// page would embed directly).
    pub fn from_json(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}
