use serde::Deserialize;
use serde_json::json;

use tagwire_core::types::{EcommerceData, PlatformSpec};
use tagwire_core::{TagResult, TelemetryError};

use crate::adapters::{event_type_or, require_handle};
use crate::{options, DispatchContext, PlatformAdapter};

#[derive(Debug, Default, Deserialize)]
struct StackAdaptOptions {
    #[serde(default)]
    conversion_id: Option<String>,
}

pub struct StackAdapt;

impl PlatformAdapter for StackAdapt {
    fn name(&self) -> &'static str {
        "stackadapt"
    }

    fn fire_ecommerce(
        &self,
        ctx: &DispatchContext,
        data: &EcommerceData,
        spec: &PlatformSpec,
    ) -> TagResult<()> {
        let saq = require_handle(ctx, "saq")?;
        let opts: StackAdaptOptions = options::parse(spec)?;
        let conversion_id = opts.conversion_id.ok_or_else(|| {
            TelemetryError::configuration(
                "Invalid options.conversion_id",
                json!({ "options": spec.options }),
            )
        })?;

        let transaction_type = data.items.first().map(|i| i.category.as_str()).unwrap_or("");
        saq.call(
            event_type_or(spec, "conv"),
            json!([
                conversion_id,
                {
                    "revenue": data.total_transaction_amount,
                    "order id": data.transaction_id,
                    "transaction type": transaction_type,
                }
            ]),
        );
        Ok(())
    }
}
