use serde_json::json;

use tagwire_core::types::{EcommerceData, PlatformSpec};
use tagwire_core::TagResult;

use crate::adapters::event_type_or;
use crate::{DispatchContext, PlatformAdapter};

/// Microsoft UET. The queue buffers until the tag drains it, so pushes
/// never fail.
pub struct Bing;

impl PlatformAdapter for Bing {
    fn name(&self) -> &'static str {
        "bing"
    }

    fn fire_ecommerce(
        &self,
        ctx: &DispatchContext,
        data: &EcommerceData,
        spec: &PlatformSpec,
    ) -> TagResult<()> {
        let queue = ctx.vendors.ensure_queue("uetq");
        queue.call(
            "push",
            json!([
                "event",
                event_type_or(spec, "donation"),
                {
                    "event_category": "donation submit",
                    "event_label": "donation : submit",
                    "event_value": data.total_transaction_amount,
                    "revenue_value": data.total_transaction_amount,
                    "currency": "USD",
                }
            ]),
        );
        Ok(())
    }
}
