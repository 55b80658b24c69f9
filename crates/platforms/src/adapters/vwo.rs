use serde_json::json;

use tagwire_core::types::{EcommerceData, PlatformSpec};
use tagwire_core::TagResult;

use crate::adapters::event_type_or;
use crate::{DispatchContext, PlatformAdapter};

pub struct Vwo;

impl PlatformAdapter for Vwo {
    fn name(&self) -> &'static str {
        "vwo"
    }

    fn fire_ecommerce(
        &self,
        ctx: &DispatchContext,
        data: &EcommerceData,
        spec: &PlatformSpec,
    ) -> TagResult<()> {
        let queue = ctx.vendors.ensure_queue("VWO");
        queue.call(
            "push",
            json!([[
                "event",
                event_type_or(spec, "purchase"),
                {
                    "revenue": data.total_transaction_amount,
                    "checkout": true,
                }
            ]]),
        );
        Ok(())
    }
}
