use serde::Deserialize;
use serde_json::json;

use tagwire_core::types::{CustomEvent, EcommerceData, PlatformSpec};
use tagwire_core::TagResult;

use crate::adapters::{event_type_or, require_handle};
use crate::{options, DispatchContext, PlatformAdapter};

#[derive(Debug, Default, Deserialize)]
struct PiwikOptions {
    #[serde(default)]
    matomo_conflict: bool,
}

/// Piwik PRO / Matomo. Pushes to `_paq`, or to the alternate `_ppas` queue
/// when the hosting page runs its own Matomo instance.
pub struct Piwik;

impl Piwik {
    fn queue_name(ctx: &DispatchContext, spec: &PlatformSpec) -> TagResult<&'static str> {
        let opts: PiwikOptions = options::parse(spec)?;
        if opts.matomo_conflict || ctx.settings.matomo_conflict {
            Ok("_ppas")
        } else {
            Ok("_paq")
        }
    }
}

impl PlatformAdapter for Piwik {
    fn name(&self) -> &'static str {
        "piwik"
    }

    fn fire_ecommerce(
        &self,
        ctx: &DispatchContext,
        data: &EcommerceData,
        spec: &PlatformSpec,
    ) -> TagResult<()> {
        let queue = require_handle(ctx, Self::queue_name(ctx, spec)?)?;

        for item in &data.items {
            queue.call(
                "push",
                json!([[
                    "addEcommerceItem",
                    item.sku,
                    item.name,
                    item.category,
                    item.price,
                    item.quantity
                ]]),
            );
        }
        queue.call(
            "push",
            json!([[
                event_type_or(spec, "trackEcommerceOrder"),
                data.transaction_id,
                data.total_transaction_amount
            ]]),
        );
        Ok(())
    }

    fn fire_custom(
        &self,
        ctx: &DispatchContext,
        event: &CustomEvent,
        spec: &PlatformSpec,
    ) -> TagResult<()> {
        let queue = require_handle(ctx, Self::queue_name(ctx, spec)?)?;
        let event_type = event_type_or(spec, &event.event_name);
        queue.call(
            "push",
            json!([[
                "trackEvent",
                "mw_cv",
                format!("mw_cv : {event_type}"),
                format!("mw_cv : {event_type} : {}", event.event_name),
                0
            ]]),
        );
        Ok(())
    }
}
