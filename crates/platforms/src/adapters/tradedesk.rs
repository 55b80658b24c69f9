use serde::Deserialize;
use serde_json::json;

use tagwire_core::types::{CustomEvent, EcommerceData, PlatformSpec};
use tagwire_core::{TagResult, TelemetryError};

use crate::adapters::{event_type_or, require_setting};
use crate::{options, DispatchContext, PlatformAdapter};

#[derive(Debug, Default, Deserialize)]
struct TradeDeskOptions {
    #[serde(default)]
    tradedesk_tracking_tag_ids: Vec<String>,
    #[serde(default)]
    tradedesk_sustainer_tracking_tag_ids: Vec<String>,
}

/// The Trade Desk. Pixel-only vendor: conversions are 1x1 image requests
/// against insight.adsrvr.org, one per tracking tag.
pub struct TradeDesk;

impl TradeDesk {
    fn parse_tags(spec: &PlatformSpec) -> TagResult<TradeDeskOptions> {
        let opts: TradeDeskOptions = options::parse(spec)?;
        if opts.tradedesk_tracking_tag_ids.is_empty() {
            return Err(TelemetryError::configuration(
                "Invalid options.tradedesk_tracking_tag_ids",
                json!({ "options": spec.options }),
            ));
        }
        Ok(opts)
    }
}

impl PlatformAdapter for TradeDesk {
    fn name(&self) -> &'static str {
        "tradedesk"
    }

    fn fire_ecommerce(
        &self,
        ctx: &DispatchContext,
        data: &EcommerceData,
        spec: &PlatformSpec,
    ) -> TagResult<()> {
        let advertiser_id =
            require_setting(&ctx.settings.tradedesk_advertiser_id, "tradedesk_advertiser_id")?;
        let opts = Self::parse_tags(spec)?;
        let event_type = event_type_or(spec, "donation");
        let order_id = data.transaction_id.as_deref().unwrap_or("");

        for tag_id in &opts.tradedesk_tracking_tag_ids {
            ctx.page.append_pixel(&format!(
                "https://insight.adsrvr.org/track/pxl/?adv={advertiser_id}&ct={tag_id}&fmt=3\
                 &orderid={order_id}&td1={event_type}&v={amount}&vf=USD",
                amount = data.total_transaction_amount,
            ));
        }

        for item in &data.items {
            if item.category != "sustainer" {
                continue;
            }
            for tag_id in &opts.tradedesk_sustainer_tracking_tag_ids {
                ctx.page.append_pixel(&format!(
                    "https://insight.adsrvr.org/track/pxl/?adv={advertiser_id}&ct={tag_id}&fmt=3\
                     &orderid={order_id}&td1=sustainer&v={price}&vf=USD",
                    price = item.price,
                ));
            }
        }
        Ok(())
    }

    fn fire_custom(
        &self,
        ctx: &DispatchContext,
        event: &CustomEvent,
        spec: &PlatformSpec,
    ) -> TagResult<()> {
        let advertiser_id =
            require_setting(&ctx.settings.tradedesk_advertiser_id, "tradedesk_advertiser_id")?;
        let opts = Self::parse_tags(spec)?;
        let event_type = event_type_or(spec, &event.event_name);

        for tag_id in &opts.tradedesk_tracking_tag_ids {
            ctx.page.append_pixel(&format!(
                "https://insight.adsrvr.org/track/pxl/?adv={advertiser_id}&ct={tag_id}&fmt=3\
                 &td1={event_type}&td2={event_name}",
                event_name = event.event_name,
            ));
        }
        Ok(())
    }
}
