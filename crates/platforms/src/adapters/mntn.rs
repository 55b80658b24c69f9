use tagwire_core::types::{EcommerceData, PlatformSpec};
use tagwire_core::TagResult;

use crate::adapters::require_setting;
use crate::{DispatchContext, PlatformAdapter};

/// MNTN (Mountain) CTV conversions. The vendor exposes no queue or global;
/// conversions are reported by injecting its spx script with the order
/// encoded in the query string.
pub struct Mntn;

impl PlatformAdapter for Mntn {
    fn name(&self) -> &'static str {
        "mntn"
    }

    fn fire_ecommerce(
        &self,
        ctx: &DispatchContext,
        data: &EcommerceData,
        _spec: &PlatformSpec,
    ) -> TagResult<()> {
        let pixel_id = require_setting(&ctx.settings.mntn_pixel_id, "mntn_pixel_id")?;

        let page_url: String = url::form_urlencoded::byte_serialize(
            ctx.page.url().chars().take(512).collect::<String>().as_bytes(),
        )
        .collect();
        let cache_buster = uuid::Uuid::new_v4().simple().to_string();
        let order_id = data.transaction_id.as_deref().unwrap_or("");

        ctx.page.inject_script(&format!(
            "https://dx.mountain.com/spx?conv=1&shaid={pixel_id}&tdr=&plh={page_url}&cb={cache_buster}\
             &shoid={order_id}&shoamt={amount}&shocur=&shopid=&shoq=&shoup=&shpil=",
            amount = data.total_transaction_amount,
        ));
        Ok(())
    }
}
