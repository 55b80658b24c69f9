use serde::Deserialize;
use serde_json::json;

use tagwire_core::types::{CustomEvent, EcommerceData, PlatformSpec};
use tagwire_core::{TagResult, TelemetryError};

use crate::adapters::require_handle;
use crate::retry::{call_when_defined, enhanced_user_data, wait_for_user_traits};
use crate::{options, DispatchContext, PlatformAdapter};

#[derive(Debug, Default, Deserialize)]
struct GoogleAdsOptions {
    #[serde(default)]
    google_ads_send_to_ids: Vec<String>,
    #[serde(default)]
    use_google_ads_enhanced_user_data: bool,
}

/// Google Ads conversions via gtag. Transactions require the tag to be
/// loaded; custom events poll for it. Enhanced conversions wait for the
/// identity object to expose user traits before firing.
pub struct GoogleAds;

impl GoogleAds {
    fn send_to_ids(spec: &PlatformSpec) -> TagResult<(Vec<String>, bool)> {
        let opts: GoogleAdsOptions = options::parse(spec)?;
        if opts.google_ads_send_to_ids.is_empty() {
            return Err(TelemetryError::configuration(
                "Invalid options.google_ads_send_to_ids",
                json!({ "options": spec.options }),
            ));
        }
        Ok((
            opts.google_ads_send_to_ids,
            opts.use_google_ads_enhanced_user_data,
        ))
    }
}

impl PlatformAdapter for GoogleAds {
    fn name(&self) -> &'static str {
        "google_ads"
    }

    fn fire_ecommerce(
        &self,
        ctx: &DispatchContext,
        data: &EcommerceData,
        spec: &PlatformSpec,
    ) -> TagResult<()> {
        let gtag = require_handle(ctx, "gtag")?;
        let (send_to_ids, enhanced) = Self::send_to_ids(spec)?;
        let event_type = spec
            .event_type
            .clone()
            .unwrap_or_else(|| "conversion".into());

        for send_to in send_to_ids {
            let mut payload = json!({
                "send_to": send_to,
                "value": data.total_transaction_amount,
                "currency": "USD",
                "transaction_id": data.transaction_id,
            });

            if enhanced {
                let gtag = gtag.clone();
                let vendors = ctx.vendors.clone();
                let event_type = event_type.clone();
                tokio::spawn(async move {
                    if let Some(traits) = wait_for_user_traits(&vendors).await {
                        payload["user_data"] = enhanced_user_data(&traits);
                    }
                    gtag.call("event", json!([event_type, payload]));
                });
            } else {
                gtag.call("event", json!([event_type, payload]));
            }
        }
        Ok(())
    }

    fn fire_custom(
        &self,
        ctx: &DispatchContext,
        event: &CustomEvent,
        spec: &PlatformSpec,
    ) -> TagResult<()> {
        let (send_to_ids, enhanced) = Self::send_to_ids(spec)?;
        let event_type = spec
            .event_type
            .clone()
            .unwrap_or_else(|| event.event_name.clone());
        let vendors = ctx.vendors.clone();

        call_when_defined(
            ctx.vendors.clone(),
            ctx.errors.clone(),
            "gtag",
            json!({ "event_type": event_type, "event_name": event.event_name }),
            move |gtag| {
                for send_to in send_to_ids {
                    if enhanced {
                        let gtag = gtag.clone();
                        let vendors = vendors.clone();
                        let event_type = event_type.clone();
                        tokio::spawn(async move {
                            let mut payload = json!({ "send_to": send_to });
                            if let Some(traits) = wait_for_user_traits(&vendors).await {
                                payload["user_data"] = enhanced_user_data(&traits);
                            }
                            gtag.call("event", json!([event_type, payload]));
                        });
                    } else {
                        gtag.call("event", json!([event_type, { "send_to": send_to }]));
                    }
                }
            },
        );
        Ok(())
    }
}
