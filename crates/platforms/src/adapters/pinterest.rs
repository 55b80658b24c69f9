use serde_json::json;

use tagwire_core::types::{CustomEvent, EcommerceData, PlatformSpec};
use tagwire_core::TagResult;

use crate::adapters::{event_type_or, require_handle};
use crate::{DispatchContext, PlatformAdapter};

pub struct Pinterest;

impl PlatformAdapter for Pinterest {
    fn name(&self) -> &'static str {
        "pinterest"
    }

    fn fire_ecommerce(
        &self,
        ctx: &DispatchContext,
        data: &EcommerceData,
        spec: &PlatformSpec,
    ) -> TagResult<()> {
        let pintrk = require_handle(ctx, "pintrk")?;
        pintrk.call(
            "track",
            json!([
                event_type_or(spec, "checkout"),
                {
                    "value": data.total_transaction_amount,
                    "currency": "USD",
                    "line_items": data.items.iter().map(|item| json!({
                        "value": item.price,
                        "product_name": item.name,
                    })).collect::<Vec<_>>(),
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
        let pintrk = require_handle(ctx, "pintrk")?;
        pintrk.call("track", json!([event_type_or(spec, &event.event_name)]));
        Ok(())
    }
}
