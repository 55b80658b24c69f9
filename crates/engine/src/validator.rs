//! Install-time validation of event configurations.
//!
//! Failures here disable the offending configuration only; the rest of the
//! tag installs normally.

use serde_json::json;

use tagwire_core::types::EventConfiguration;
use tagwire_core::{TagResult, TelemetryError};

pub fn validate_ecommerce(config: &EventConfiguration) -> TagResult<()> {
    if config.triggers.is_empty() {
        return Err(TelemetryError::configuration(
            "Invalid ecommerce_configuration.triggers",
            json!({ "configuration": config.label() }),
        ));
    }
    Ok(())
}

pub fn validate_custom(config: &EventConfiguration) -> TagResult<()> {
    let event_name = config.event_name.as_deref().unwrap_or_default();
    if event_name.is_empty() {
        return Err(TelemetryError::configuration(
            "Invalid custom_event_configuration.event_name",
            json!({ "configuration": config.label() }),
        ));
    }
    if config.triggers.is_empty() {
        return Err(TelemetryError::configuration(
            "Invalid custom_event_configuration.triggers",
            json!({ "configuration": config.label() }),
        ));
    }
    if config.platforms.is_empty() {
        return Err(TelemetryError::configuration(
            "Invalid custom_event_configuration.platforms",
            json!({ "configuration": config.label() }),
        ));
    }

    for platform in &config.platforms {
        if platform.name.is_empty() {
            return Err(TelemetryError::configuration(
                "Invalid custom_event_configuration.platforms.name",
                json!({ "configuration": config.label() }),
            ));
        }
        if platform.event_type.as_deref().unwrap_or_default().is_empty() {
            return Err(TelemetryError::configuration(
                "Invalid custom_event_configuration.platforms.event_type",
                json!({ "configuration": config.label(), "platform": platform.name }),
            ));
        }
        if platform.name == "illumin"
            && platform.illumin_pg.is_none()
            && !platform.options.contains_key("illumin_pg")
        {
            return Err(TelemetryError::configuration(
                "Invalid custom_event_configuration.platforms.illumin_pg",
                json!({ "configuration": config.label() }),
            ));
        }
    }
    Ok(())
}
