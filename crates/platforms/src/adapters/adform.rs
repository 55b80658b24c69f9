use serde_json::json;

use tagwire_core::types::{CustomEvent, EcommerceData, PlatformSpec};
use tagwire_core::TagResult;

use crate::adapters::{event_type_or, require_setting};
use crate::{DispatchContext, PlatformAdapter};

const TRACKPOINT_SCRIPT: &str = "https://a2.adform.net/serving/scripts/trackpoint/async/";

/// Adform trackpoint. Events are pushed onto the `_adftrack` queue and the
/// async trackpoint script is (re)injected to drain it.
pub struct Adform;

impl Adform {
    fn push_order(
        ctx: &DispatchContext,
        pixel_id: &str,
        event_type: &str,
        order: serde_json::Value,
    ) {
        let queue = ctx.vendors.ensure_queue("_adftrack");
        queue.call(
            "push",
            json!([{
                "pm": pixel_id,
                "divider": "%7C",
                "pagename": format!("MW-{event_type}"),
                "order": order,
            }]),
        );
    }
}

impl PlatformAdapter for Adform {
    fn name(&self) -> &'static str {
        "adform"
    }

    fn fire_ecommerce(
        &self,
        ctx: &DispatchContext,
        data: &EcommerceData,
        spec: &PlatformSpec,
    ) -> TagResult<()> {
        let pixel_id = require_setting(&ctx.settings.adform_pixel_id, "adform_pixel_id")?;
        let order = json!({
            "orderid": data.transaction_id,
            "sales": data.total_transaction_amount,
            "currency": "USD",
            "itms": data.items.iter().map(|item| json!({
                "productname": item.name,
                "categoryname": item.category,
                "productsales": item.price,
                "productcount": item.quantity,
            })).collect::<Vec<_>>(),
        });

        Self::push_order(ctx, &pixel_id, event_type_or(spec, "Donation"), order.clone());

        if data
            .items
            .iter()
            .any(|item| item.category.eq_ignore_ascii_case("sustainer"))
        {
            Self::push_order(ctx, &pixel_id, "Sustainer", order);
        }

        ctx.page.inject_script(TRACKPOINT_SCRIPT);
        Ok(())
    }

    fn fire_custom(
        &self,
        ctx: &DispatchContext,
        event: &CustomEvent,
        spec: &PlatformSpec,
    ) -> TagResult<()> {
        let pixel_id = require_setting(&ctx.settings.adform_pixel_id, "adform_pixel_id")?;
        let order = json!({
            "sv1": event.event_name,
            "sv8": event.event_name,
            "sv97": event.event_name,
        });
        Self::push_order(
            ctx,
            &pixel_id,
            event_type_or(spec, &event.event_name),
            order,
        );
        ctx.page.inject_script(TRACKPOINT_SCRIPT);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tagwire_core::{capture_sink, ErrorKind, FakeVendors, SimulatedPage, TelemetrySettings};

    fn context(pixel_id: Option<&str>) -> (DispatchContext, Arc<FakeVendors>, Arc<SimulatedPage>) {
        let mut settings = TelemetrySettings::default();
        settings.adform_pixel_id = pixel_id.map(|s| s.to_string());
        let vendors = Arc::new(FakeVendors::new());
        let page = Arc::new(SimulatedPage::new("https://example.org/"));
        let ctx = DispatchContext {
            settings: Arc::new(settings),
            page: page.clone(),
            vendors: vendors.clone(),
            errors: capture_sink(),
        };
        (ctx, vendors, page)
    }

    fn sustainer_order() -> EcommerceData {
        serde_json::from_value(serde_json::json!({
            "transaction_id": "k3x9",
            "total_transaction_amount": 15.0,
            "items": [{"sku": "s-15", "name": "Monthly", "category": "Sustainer",
                       "price": 15.0, "quantity": 1.0}]
        }))
        .unwrap()
    }

    #[test]
    fn test_sustainer_category_pushes_second_event() {
        let (ctx, vendors, page) = context(Some("987654"));
        Adform
            .fire_ecommerce(&ctx, &sustainer_order(), &PlatformSpec::default())
            .unwrap();

        let pushes = vendors.recorder("_adftrack").calls_to("push");
        assert_eq!(pushes.len(), 2);
        assert_eq!(pushes[0][0]["pm"], "987654");
        assert_eq!(pushes[0][0]["pagename"], "MW-Donation");
        assert_eq!(pushes[0][0]["order"]["itms"][0]["productname"], "Monthly");
        assert_eq!(pushes[1][0]["pagename"], "MW-Sustainer");
        assert_eq!(page.scripts(), vec![TRACKPOINT_SCRIPT]);
    }

    #[test]
    fn test_missing_pixel_id_is_configuration_error() {
        let (ctx, _, _) = context(None);
        let err = Adform
            .fire_ecommerce(&ctx, &sustainer_order(), &PlatformSpec::default())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
    }

    #[test]
    fn test_custom_event_uses_sv_fields() {
        let (ctx, vendors, _) = context(Some("987654"));
        let event = CustomEvent {
            event_name: "petition_signed".into(),
            metadata: Default::default(),
        };
        let spec: PlatformSpec =
            serde_json::from_value(serde_json::json!({"name": "adform", "event_type": "Petition"}))
                .unwrap();
        Adform.fire_custom(&ctx, &event, &spec).unwrap();

        let pushes = vendors.recorder("_adftrack").calls_to("push");
        assert_eq!(pushes[0][0]["pagename"], "MW-Petition");
        assert_eq!(pushes[0][0]["order"]["sv1"], "petition_signed");
        assert_eq!(pushes[0][0]["order"]["sv97"], "petition_signed");
    }
}
