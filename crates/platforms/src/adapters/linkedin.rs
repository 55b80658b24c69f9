use serde::Deserialize;
use serde_json::json;

use tagwire_core::types::{CustomEvent, EcommerceData, PlatformSpec};
use tagwire_core::{TagResult, TelemetryError};

use crate::retry::call_when_defined;
use crate::{options, DispatchContext, PlatformAdapter};

#[derive(Debug, Default, Deserialize)]
struct LinkedInOptions {
    #[serde(default)]
    linkedin_conversion_id: Option<serde_json::Value>,
}

/// LinkedIn insight tag. The lintrk global loads late; both event paths
/// poll for it. Only the conversion id is reported.
pub struct LinkedIn;

impl LinkedIn {
    fn conversion_id(spec: &PlatformSpec) -> TagResult<serde_json::Value> {
        let opts: LinkedInOptions = options::parse(spec)?;
        opts.linkedin_conversion_id.ok_or_else(|| {
            TelemetryError::configuration(
                "options.linkedin_conversion_id is undefined",
                json!({ "options": spec.options }),
            )
        })
    }

    fn track(&self, ctx: &DispatchContext, spec: &PlatformSpec) -> TagResult<()> {
        let conversion_id = Self::conversion_id(spec)?;
        call_when_defined(
            ctx.vendors.clone(),
            ctx.errors.clone(),
            "lintrk",
            json!({ "conversion_id": conversion_id }),
            move |lintrk| {
                lintrk.call("track", json!([{ "conversion_id": conversion_id }]));
            },
        );
        Ok(())
    }
}

impl PlatformAdapter for LinkedIn {
    fn name(&self) -> &'static str {
        "linkedin"
    }

    fn fire_ecommerce(
        &self,
        ctx: &DispatchContext,
        _data: &EcommerceData,
        spec: &PlatformSpec,
    ) -> TagResult<()> {
        self.track(ctx, spec)
    }

    fn fire_custom(
        &self,
        ctx: &DispatchContext,
        _event: &CustomEvent,
        spec: &PlatformSpec,
    ) -> TagResult<()> {
        self.track(ctx, spec)
    }
}
