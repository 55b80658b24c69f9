use serde_json::json;

use tagwire_core::types::{CustomEvent, EcommerceData, PlatformSpec};
use tagwire_core::TagResult;

use crate::adapters::{event_type_or, require_handle};
use crate::{DispatchContext, PlatformAdapter};

pub struct Reddit;

impl PlatformAdapter for Reddit {
    fn name(&self) -> &'static str {
        "reddit"
    }

    fn fire_ecommerce(
        &self,
        ctx: &DispatchContext,
        data: &EcommerceData,
        spec: &PlatformSpec,
    ) -> TagResult<()> {
        let rdt = require_handle(ctx, "rdt")?;
        rdt.call(
            "track",
            json!([
                event_type_or(spec, "Purchase"),
                {
                    "itemCount": data.items.len(),
                    "value": data.total_transaction_amount,
                    "currency": "USD",
                    "conversionId": data.transaction_id,
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
        let rdt = require_handle(ctx, "rdt")?;
        rdt.call("track", json!([event_type_or(spec, &event.event_name)]));
        Ok(())
    }
}
