use serde::Deserialize;
use serde_json::json;

use tagwire_core::types::{CustomEvent, EcommerceData, PlatformSpec};
use tagwire_core::{TagResult, TelemetryError};

use crate::adapters::require_handle;
use crate::retry::identity_traits;
use crate::{options, DispatchContext, PlatformAdapter};

#[derive(Debug, Default, Deserialize)]
struct TwitterOptions {
    #[serde(default)]
    twitter_event_ids: Vec<String>,
    #[serde(default)]
    twitter_sustainer_event_ids: Vec<String>,
}

/// X/Twitter pixel. Conversions carry the identified email and phone
/// alongside the transaction, so the identity object must be loaded.
pub struct Twitter;

impl Twitter {
    fn parse_ids(spec: &PlatformSpec) -> TagResult<TwitterOptions> {
        let opts: TwitterOptions = options::parse(spec)?;
        if opts.twitter_event_ids.is_empty() {
            return Err(TelemetryError::configuration(
                "Invalid options.twitter_event_ids",
                json!({ "options": spec.options }),
            ));
        }
        Ok(opts)
    }

    fn contact(
        ctx: &DispatchContext,
    ) -> TagResult<(serde_json::Value, serde_json::Value)> {
        let (_, traits) = identity_traits(&ctx.vendors).ok_or_else(|| {
            TelemetryError::dependency_unavailable("rudderanalytics is not defined", json!({}))
        })?;
        let email = traits.get("email").cloned().unwrap_or(serde_json::Value::Null);
        let phone = traits.get("phone").cloned().unwrap_or(serde_json::Value::Null);
        Ok((email, phone))
    }
}

impl PlatformAdapter for Twitter {
    fn name(&self) -> &'static str {
        "twitter"
    }

    fn fire_ecommerce(
        &self,
        ctx: &DispatchContext,
        data: &EcommerceData,
        spec: &PlatformSpec,
    ) -> TagResult<()> {
        let twq = require_handle(ctx, "twq")?;
        let opts = Self::parse_ids(spec)?;
        let (email, phone) = Self::contact(ctx)?;
        let transaction_id = data.transaction_id.as_deref().unwrap_or("");

        for event_id in &opts.twitter_event_ids {
            twq.call(
                "event",
                json!([
                    event_id,
                    {
                        "value": data.total_transaction_amount,
                        "currency": "USD",
                        "conversion_id": transaction_id,
                        "email_address": email,
                        "phone_number": phone,
                    }
                ]),
            );
        }

        for item in &data.items {
            if item.category != "sustainer" {
                continue;
            }
            for event_id in &opts.twitter_sustainer_event_ids {
                twq.call(
                    "event",
                    json!([
                        event_id,
                        {
                            "value": item.price,
                            "currency": "USD",
                            "conversion_id": format!("{transaction_id}-{}", item.sku),
                            "email_address": email,
                            "phone_number": phone,
                        }
                    ]),
                );
            }
        }
        Ok(())
    }

    fn fire_custom(
        &self,
        ctx: &DispatchContext,
        _event: &CustomEvent,
        spec: &PlatformSpec,
    ) -> TagResult<()> {
        let twq = require_handle(ctx, "twq")?;
        let opts = Self::parse_ids(spec)?;
        let (email, phone) = Self::contact(ctx)?;

        for event_id in &opts.twitter_event_ids {
            twq.call(
                "event",
                json!([event_id, { "email_address": email, "phone_number": phone }]),
            );
        }
        Ok(())
    }
}
