use serde::de::DeserializeOwned;
use serde_json::json;

use tagwire_core::types::PlatformSpec;
use tagwire_core::{TagResult, TelemetryError};

/// Deserialize an adapter's typed options record from the spec's loose
/// options map. Unknown keys are ignored; a type mismatch is a
/// configuration error.
pub(crate) fn parse<T: DeserializeOwned + Default>(spec: &PlatformSpec) -> TagResult<T> {
    if spec.options.is_empty() {
        return Ok(T::default());
    }
    serde_json::from_value(serde_json::Value::Object(spec.options.clone())).map_err(|e| {
        TelemetryError::configuration(
            format!("Invalid options for platform {}: {e}", spec.name),
            json!({ "platform": spec.name, "options": spec.options }),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize)]
    struct Sample {
        #[serde(default)]
        ids: Vec<String>,
        #[serde(default)]
        enabled: bool,
    }

    #[test]
    fn test_parse_typed_options() {
        let spec: PlatformSpec = serde_json::from_value(serde_json::json!({
            "name": "sample",
            "options": {"ids": ["a", "b"], "enabled": true, "extra_key": 1}
        }))
        .unwrap();
        let parsed: Sample = parse(&spec).unwrap();
        assert_eq!(parsed.ids, vec!["a", "b"]);
        assert!(parsed.enabled);
    }

    #[test]
    fn test_type_mismatch_is_configuration_error() {
        let spec: PlatformSpec = serde_json::from_value(serde_json::json!({
            "name": "sample",
            "options": {"ids": "not-an-array"}
        }))
        .unwrap();
        let err = parse::<Sample>(&spec).unwrap_err();
        assert_eq!(err.kind, tagwire_core::ErrorKind::Configuration);
    }
}
