use serde_json::json;

use tagwire_core::types::{CustomEvent, EcommerceData, PlatformSpec};
use tagwire_core::TagResult;

use crate::adapters::{event_type_or, require_handle, require_setting};
use crate::{DispatchContext, PlatformAdapter};

pub struct Taboola;

impl PlatformAdapter for Taboola {
    fn name(&self) -> &'static str {
        "taboola"
    }

    fn fire_ecommerce(
        &self,
        ctx: &DispatchContext,
        data: &EcommerceData,
        spec: &PlatformSpec,
    ) -> TagResult<()> {
        let pixel_id = require_setting(&ctx.settings.taboola_pixel_id, "taboola_pixel_id")?;
        let queue = require_handle(ctx, "_tfa")?;
        queue.call(
            "push",
            json!([{
                "notify": "event",
                "name": event_type_or(spec, "Purchase"),
                "id": pixel_id,
                "revenue": data.total_transaction_amount,
            }]),
        );
        Ok(())
    }

    fn fire_custom(
        &self,
        ctx: &DispatchContext,
        event: &CustomEvent,
        spec: &PlatformSpec,
    ) -> TagResult<()> {
        let pixel_id = require_setting(&ctx.settings.taboola_pixel_id, "taboola_pixel_id")?;
        let queue = require_handle(ctx, "_tfa")?;
        queue.call(
            "push",
            json!([{
                "notify": "event",
                "name": event_type_or(spec, &event.event_name),
                "id": pixel_id,
            }]),
        );
        Ok(())
    }
}
