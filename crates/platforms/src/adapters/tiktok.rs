use serde_json::json;

use tagwire_core::types::{CustomEvent, EcommerceData, PlatformSpec};
use tagwire_core::TagResult;

use crate::adapters::{event_type_or, require_handle};
use crate::{DispatchContext, PlatformAdapter};

pub struct TikTok;

impl PlatformAdapter for TikTok {
    fn name(&self) -> &'static str {
        "tiktok"
    }

    fn fire_ecommerce(
        &self,
        ctx: &DispatchContext,
        data: &EcommerceData,
        spec: &PlatformSpec,
    ) -> TagResult<()> {
        let ttq = require_handle(ctx, "ttq")?;
        ttq.call(
            "track",
            json!([
                event_type_or(spec, "CompletePayment"),
                {
                    "content_name": "donation",
                    "value": data.total_transaction_amount,
                    "currency": "USD",
                }
            ]),
        );
        Ok(())
    }

    fn fire_custom(
        &self,
        ctx: &DispatchContext,
        event: &CustomEvent,
        spec: &PlatformSpec,
    ) -> TagResult<()> {
        let ttq = require_handle(ctx, "ttq")?;
        let mut payload = event.metadata.clone();
        payload.insert("content_name".into(), json!(event.event_name));
        ttq.call(
            "track",
            json!([event_type_or(spec, &event.event_name), payload]),
        );
        Ok(())
    }
}
