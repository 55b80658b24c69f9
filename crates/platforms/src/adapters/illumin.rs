use serde::Deserialize;
use serde_json::json;

use tagwire_core::types::{CustomEvent, EcommerceData, PlatformSpec};
use tagwire_core::{TagResult, TelemetryError};

use crate::adapters::{event_type_or, require_handle, require_setting};
use crate::{options, DispatchContext, PlatformAdapter};

#[derive(Debug, Default, Deserialize)]
struct IlluminOptions {
    #[serde(default)]
    illumin_pg: Option<f64>,
}

/// Illumin (AcuityAds). The `aap` global is invoked with a single payload
/// object; `pg` identifies the page group for the conversion.
pub struct Illumin;

impl Illumin {
    fn page_group(spec: &PlatformSpec) -> TagResult<f64> {
        let opts: IlluminOptions = options::parse(spec)?;
        // Older configurations carry the page group at the top level.
        opts.illumin_pg.or(spec.illumin_pg).ok_or_else(|| {
            TelemetryError::configuration(
                "Invalid options.illumin_pg",
                json!({ "options": spec.options }),
            )
        })
    }
}

impl PlatformAdapter for Illumin {
    fn name(&self) -> &'static str {
        "illumin"
    }

    fn fire_ecommerce(
        &self,
        ctx: &DispatchContext,
        data: &EcommerceData,
        spec: &PlatformSpec,
    ) -> TagResult<()> {
        let aap = require_handle(ctx, "aap")?;
        let pixel_key = require_setting(&ctx.settings.illumin_pixel_id, "illumin_pixel_id")?;
        let pg = Self::page_group(spec)?;

        aap.call(
            "call",
            json!([{
                "pixelKey": pixel_key,
                "pg": pg,
                "prodid": event_type_or(spec, "donation"),
                "ordid": data.transaction_id,
                "crev": data.total_transaction_amount,
                "delay": 500,
            }]),
        );
        Ok(())
    }

    fn fire_custom(
        &self,
        ctx: &DispatchContext,
        _event: &CustomEvent,
        spec: &PlatformSpec,
    ) -> TagResult<()> {
        let aap = require_handle(ctx, "aap")?;
        let pixel_key = require_setting(&ctx.settings.illumin_pixel_id, "illumin_pixel_id")?;
        let pg = Self::page_group(spec)?;

        aap.call("call", json!([{ "pixelKey": pixel_key, "pg": pg }]));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tagwire_core::{capture_sink, ErrorKind, FakeVendors, SimulatedPage, TelemetrySettings};

    fn context(vendors: Arc<FakeVendors>) -> DispatchContext {
        let settings = TelemetrySettings::from_json(serde_json::json!({
            "illumin_pixel_id": "pk-42"
        }))
        .unwrap();
        DispatchContext {
            settings: Arc::new(settings),
            page: Arc::new(SimulatedPage::new("https://example.org/")),
            vendors,
            errors: capture_sink(),
        }
    }

    fn donation() -> EcommerceData {
        serde_json::from_value(serde_json::json!({
            "transaction_id": "k3x9",
            "total_transaction_amount": 25.0,
            "items": [{"sku": "d-25", "name": "Donation", "category": "donation",
                       "price": 25.0, "quantity": 1.0}]
        }))
        .unwrap()
    }

    #[test]
    fn test_conversion_payload() {
        let vendors = Arc::new(FakeVendors::new());
        let aap = vendors.define("aap");
        let ctx = context(vendors);

        let spec: PlatformSpec = serde_json::from_value(serde_json::json!({
            "name": "illumin", "options": {"illumin_pg": 7.0}
        }))
        .unwrap();
        Illumin.fire_ecommerce(&ctx, &donation(), &spec).unwrap();

        let calls = aap.calls_to("call");
        assert_eq!(calls[0][0]["pixelKey"], "pk-42");
        assert_eq!(calls[0][0]["pg"], 7.0);
        assert_eq!(calls[0][0]["crev"], 25.0);
    }

    #[test]
    fn test_legacy_top_level_page_group() {
        let vendors = Arc::new(FakeVendors::new());
        let aap = vendors.define("aap");
        let ctx = context(vendors);

        let spec: PlatformSpec = serde_json::from_value(serde_json::json!({
            "name": "illumin", "event_type": "petition", "illumin_pg": 3.0
        }))
        .unwrap();
        let event = CustomEvent {
            event_name: "petition_signed".into(),
            metadata: Default::default(),
        };
        Illumin.fire_custom(&ctx, &event, &spec).unwrap();
        assert_eq!(aap.calls_to("call")[0][0]["pg"], 3.0);
    }

    #[test]
    fn test_missing_page_group_is_configuration_error() {
        let vendors = Arc::new(FakeVendors::new());
        vendors.define("aap");
        let ctx = context(vendors);

        let err = Illumin
            .fire_ecommerce(&ctx, &donation(), &PlatformSpec::default())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
    }
}
