use serde::Deserialize;
use serde_json::json;

use tagwire_core::types::{CustomEvent, EcommerceData, PlatformSpec};
use tagwire_core::TagResult;

use crate::retry::call_when_defined;
use crate::{options, DispatchContext, PlatformAdapter};

#[derive(Debug, Default, Deserialize)]
struct FacebookOptions {
    #[serde(default)]
    sustainer_only: bool,
    #[serde(default)]
    facebook_pixel_ids: Vec<String>,
    #[serde(default)]
    facebook_track_custom: bool,
}

/// Meta pixel. The fbq script routinely loads after the transaction page,
/// so both event paths poll for it instead of failing immediately.
pub struct Facebook;

impl PlatformAdapter for Facebook {
    fn name(&self) -> &'static str {
        "facebook"
    }

    fn fire_ecommerce(
        &self,
        ctx: &DispatchContext,
        data: &EcommerceData,
        spec: &PlatformSpec,
    ) -> TagResult<()> {
        let opts: FacebookOptions = options::parse(spec)?;
        let event_type = spec.event_type.clone().unwrap_or_else(|| "Purchase".into());
        let data = data.clone();

        call_when_defined(
            ctx.vendors.clone(),
            ctx.errors.clone(),
            "fbq",
            json!({ "event_type": event_type, "transaction_id": data.transaction_id }),
            move |fbq| {
                let content_ids: Vec<&str> = data.items.iter().map(|i| i.sku.as_str()).collect();
                let content_name = data
                    .items
                    .iter()
                    .map(|i| i.name.as_str())
                    .collect::<Vec<_>>()
                    .join(",");
                let payload = json!({
                    "value": data.total_transaction_amount,
                    "currency": "USD",
                    "content_ids": content_ids,
                    "content_name": content_name,
                });

                if !opts.sustainer_only {
                    if opts.facebook_pixel_ids.is_empty() {
                        fbq.call("track", json!([event_type, payload]));
                    } else {
                        for pixel_id in &opts.facebook_pixel_ids {
                            fbq.call("trackSingle", json!([pixel_id, event_type, payload]));
                        }
                    }
                }

                for item in &data.items {
                    if item.category == "sustainer" {
                        fbq.call(
                            "trackCustom",
                            json!([
                                "SustainerDonation",
                                {
                                    "value": item.price,
                                    "currency": "USD",
                                    "content_ids": item.sku,
                                    "content_name": item.name,
                                }
                            ]),
                        );
                    }
                }
            },
        );
        Ok(())
    }

    fn fire_custom(
        &self,
        ctx: &DispatchContext,
        event: &CustomEvent,
        spec: &PlatformSpec,
    ) -> TagResult<()> {
        let opts: FacebookOptions = options::parse(spec)?;
        let event_type = spec
            .event_type
            .clone()
            .unwrap_or_else(|| event.event_name.clone());
        let event = event.clone();

        call_when_defined(
            ctx.vendors.clone(),
            ctx.errors.clone(),
            "fbq",
            json!({ "event_type": event_type, "event_name": event.event_name }),
            move |fbq| {
                let mut payload = event.metadata.clone();
                payload.insert("content_name".into(), json!(event.event_name));
                let method = if opts.facebook_track_custom {
                    "trackCustom"
                } else {
                    "track"
                };
                fbq.call(method, json!([event_type, payload]));
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tagwire_core::{capture_sink, CaptureSink, FakeVendors, SimulatedPage, TelemetrySettings};

    fn context(vendors: Arc<FakeVendors>) -> (DispatchContext, Arc<CaptureSink>) {
        let errors = capture_sink();
        let ctx = DispatchContext {
            settings: Arc::new(TelemetrySettings::default()),
            page: Arc::new(SimulatedPage::new("https://example.org/")),
            vendors,
            errors: errors.clone(),
        };
        (ctx, errors)
    }

    fn sustainer_order() -> EcommerceData {
        serde_json::from_value(serde_json::json!({
            "transaction_id": "k3x9",
            "total_transaction_amount": 40.0,
            "items": [
                {"sku": "d-25", "name": "Donation", "category": "donation",
                 "price": 25.0, "quantity": 1.0},
                {"sku": "s-15", "name": "Monthly", "category": "sustainer",
                 "price": 15.0, "quantity": 1.0}
            ]
        }))
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_tracks_purchase_and_sustainer_donation() {
        let vendors = Arc::new(FakeVendors::new());
        let fbq = vendors.define("fbq");
        let (ctx, errors) = context(vendors);

        Facebook
            .fire_ecommerce(&ctx, &sustainer_order(), &PlatformSpec::default())
            .unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;

        let tracks = fbq.calls_to("track");
        assert_eq!(tracks[0][0], "Purchase");
        assert_eq!(tracks[0][1]["value"], 40.0);
        assert_eq!(tracks[0][1]["content_ids"][1], "s-15");
        assert_eq!(tracks[0][1]["content_name"], "Donation,Monthly");

        let customs = fbq.calls_to("trackCustom");
        assert_eq!(customs[0][0], "SustainerDonation");
        assert_eq!(customs[0][1]["value"], 15.0);
        assert_eq!(errors.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pixel_ids_use_track_single() {
        let vendors = Arc::new(FakeVendors::new());
        let fbq = vendors.define("fbq");
        let (ctx, _) = context(vendors);

        let spec: PlatformSpec = serde_json::from_value(serde_json::json!({
            "name": "facebook",
            "options": {"facebook_pixel_ids": ["111", "222"]}
        }))
        .unwrap();
        Facebook
            .fire_ecommerce(&ctx, &sustainer_order(), &spec)
            .unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;

        let singles = fbq.calls_to("trackSingle");
        assert_eq!(singles.len(), 2);
        assert_eq!(singles[0][0], "111");
        assert_eq!(singles[1][0], "222");
        assert!(fbq.calls_to("track").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sustainer_only_skips_purchase() {
        let vendors = Arc::new(FakeVendors::new());
        let fbq = vendors.define("fbq");
        let (ctx, _) = context(vendors);

        let spec: PlatformSpec = serde_json::from_value(serde_json::json!({
            "name": "facebook", "options": {"sustainer_only": true}
        }))
        .unwrap();
        Facebook
            .fire_ecommerce(&ctx, &sustainer_order(), &spec)
            .unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert!(fbq.calls_to("track").is_empty());
        assert_eq!(fbq.calls_to("trackCustom").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_script_fires_after_polling() {
        let vendors = Arc::new(FakeVendors::new());
        let (ctx, errors) = context(vendors.clone());

        Facebook
            .fire_ecommerce(&ctx, &sustainer_order(), &PlatformSpec::default())
            .unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;

        let fbq = vendors.define("fbq");
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(fbq.calls_to("track").len(), 1);
        assert_eq!(errors.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_script_reports_late_failure() {
        let vendors = Arc::new(FakeVendors::new());
        let (ctx, errors) = context(vendors);

        Facebook
            .fire_ecommerce(&ctx, &sustainer_order(), &PlatformSpec::default())
            .unwrap();
        tokio::time::sleep(Duration::from_secs(31)).await;

        assert_eq!(errors.count(), 1);
        assert!(errors.errors()[0].message.contains("fbq is still undefined"));
    }
}
