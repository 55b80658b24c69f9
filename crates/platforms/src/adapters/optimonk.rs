use serde_json::json;

use tagwire_core::types::{EcommerceData, PlatformSpec};
use tagwire_core::TagResult;

use crate::adapters::event_type_or;
use crate::{DispatchContext, PlatformAdapter};

/// OptiMonk on-site popups. Unlike the other vendors, a missing `omEvents`
/// global is not an error: the popup script is optional per page.
pub struct Optimonk;

impl PlatformAdapter for Optimonk {
    fn name(&self) -> &'static str {
        "optimonk"
    }

    fn fire_ecommerce(
        &self,
        ctx: &DispatchContext,
        _data: &EcommerceData,
        spec: &PlatformSpec,
    ) -> TagResult<()> {
        let Some(queue) = ctx.vendors.handle("omEvents") else {
            return Ok(());
        };
        queue.call("push", json!([[event_type_or(spec, "Donation")]]));
        Ok(())
    }
}
