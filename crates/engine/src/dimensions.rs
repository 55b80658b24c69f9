//! Piwik custom dimensions: forward campaign query parameters and the
//! analytics anonymous id as visit-scoped dimensions, then ping.
//!
//! The analytics SDK loads asynchronously, so we poll briefly for the
//! anonymous id; if it never appears the dimensions fire without it.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use tagwire_core::{Page, VendorRuntime};

pub const DIMENSIONS_POLL: Duration = Duration::from_millis(50);
pub const DIMENSIONS_POLL_LIMIT: Duration = Duration::from_secs(10);

/// Push the custom dimensions present on this page view and a ping.
pub fn set_custom_dimensions(
    page: &dyn Page,
    vendors: &dyn VendorRuntime,
    matomo_conflict: bool,
) {
    let anonymous_id = vendors
        .identity()
        .and_then(|identity| identity.anonymous_id());

    let dimensions = [
        (1, page.query_param("mwsc")),
        (2, page.query_param("mwm_id")),
        (3, anonymous_id),
        (5, page.query_param("refcd")),
        (6, page.query_param("seid")),
    ];

    let queue_name = if matomo_conflict { "_ppas" } else { "_paq" };
    let queue = vendors.ensure_queue(queue_name);
    for (slot, value) in dimensions {
        match value {
            Some(value) if !value.is_empty() => {
                queue.call("push", json!([["setCustomDimension", slot, value]]));
            }
            _ => {}
        }
    }
    queue.call("push", json!([["ping"]]));
}

/// Wait for the analytics anonymous id (it lands slot 3), then push the
/// dimensions. Fires without it once the poll limit runs out.
pub fn spawn(
    page: Arc<dyn Page>,
    vendors: Arc<dyn VendorRuntime>,
    matomo_conflict: bool,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut waited = Duration::ZERO;
        loop {
            let ready = vendors
                .identity()
                .and_then(|identity| identity.anonymous_id())
                .is_some();
            if ready || waited >= DIMENSIONS_POLL_LIMIT {
                set_custom_dimensions(page.as_ref(), vendors.as_ref(), matomo_conflict);
                return;
            }
            sleep(DIMENSIONS_POLL).await;
            waited += DIMENSIONS_POLL;
        }
    })
}
