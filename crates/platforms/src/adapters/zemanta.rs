use serde_json::json;

use tagwire_core::types::{CustomEvent, EcommerceData, PlatformSpec};
use tagwire_core::TagResult;

use crate::adapters::{event_type_or, require_handle};
use crate::{DispatchContext, PlatformAdapter};

pub struct Zemanta;

impl PlatformAdapter for Zemanta {
    fn name(&self) -> &'static str {
        "zemanta"
    }

    fn fire_ecommerce(
        &self,
        ctx: &DispatchContext,
        data: &EcommerceData,
        spec: &PlatformSpec,
    ) -> TagResult<()> {
        let api = require_handle(ctx, "zemApi")?;
        api.call(
            "track",
            json!([
                event_type_or(spec, "PURCHASE"),
                { "value": data.total_transaction_amount, "currency": "USD" }
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
        let api = require_handle(ctx, "zemApi")?;
        api.call("track", json!([event_type_or(spec, &event.event_name)]));
        Ok(())
    }
}
