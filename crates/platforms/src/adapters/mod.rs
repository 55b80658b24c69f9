//! Built-in vendor adapters.

mod adform;
mod bing;
mod facebook;
mod google_ads;
mod illumin;
mod linkedin;
mod mntn;
mod optimonk;
mod pinterest;
mod piwik;
mod reddit;
mod rudderstack;
mod stackadapt;
mod taboola;
mod tiktok;
mod tradedesk;
mod twitter;
mod vwo;
mod zemanta;

use std::sync::Arc;

use serde_json::json;

use tagwire_core::{TagResult, TelemetryError, VendorHandle};

use crate::{DispatchContext, PlatformAdapter};

pub use adform::Adform;
pub use bing::Bing;
pub use facebook::Facebook;
pub use google_ads::GoogleAds;
pub use illumin::Illumin;
pub use linkedin::LinkedIn;
pub use mntn::Mntn;
pub use optimonk::Optimonk;
pub use pinterest::Pinterest;
pub use piwik::Piwik;
pub use reddit::Reddit;
pub use rudderstack::Rudderstack;
pub use stackadapt::StackAdapt;
pub use taboola::Taboola;
pub use tiktok::TikTok;
pub use tradedesk::TradeDesk;
pub use twitter::Twitter;
pub use vwo::Vwo;
pub use zemanta::Zemanta;

/// Every adapter shipped with the engine.
pub fn builtin() -> Vec<Arc<dyn PlatformAdapter>> {
    vec![
        Arc::new(Rudderstack),
        Arc::new(Piwik),
        Arc::new(Facebook),
        Arc::new(Adform),
        Arc::new(Zemanta),
        Arc::new(GoogleAds),
        Arc::new(TikTok),
        Arc::new(Mntn),
        Arc::new(Taboola),
        Arc::new(Pinterest),
        Arc::new(Illumin),
        Arc::new(StackAdapt),
        Arc::new(Bing),
        Arc::new(TradeDesk),
        Arc::new(LinkedIn),
        Arc::new(Twitter),
        Arc::new(Vwo),
        Arc::new(Reddit),
        Arc::new(Optimonk),
    ]
}

/// Look up a callable vendor global, failing the dispatch if its script
/// has not loaded.
fn require_handle(ctx: &DispatchContext, global: &str) -> TagResult<Arc<dyn VendorHandle>> {
    ctx.vendors.handle(global).ok_or_else(|| {
        TelemetryError::dependency_unavailable(
            format!("{global} is undefined"),
            json!({ "global": global }),
        )
    })
}

/// Pull a required account id out of the settings.
fn require_setting(value: &Option<String>, name: &str) -> TagResult<String> {
    value.clone().ok_or_else(|| {
        TelemetryError::configuration(
            format!("{name} is undefined"),
            json!({ "setting": name }),
        )
    })
}

fn event_type_or<'a>(spec: &'a tagwire_core::types::PlatformSpec, default: &'a str) -> &'a str {
    spec.event_type.as_deref().unwrap_or(default)
}
