//! Bridge the piwik visitor id into the analytics identity.
//!
//! The `_pk_id.<site>.<hash>` cookie is written by the piwik script some
//! time after page load; its value's first dot-separated portion is the
//! visitor id. Once both the cookie and the analytics SDK are present the
//! id is attached as a `piwik_id` trait. Gives up after ten seconds.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use tagwire_core::{Page, RemoteReporter, VendorRuntime};

pub const PIWIK_ID_POLL: Duration = Duration::from_millis(100);
pub const PIWIK_ID_POLL_LIMIT: Duration = Duration::from_secs(10);

const PIWIK_COOKIE_PREFIX: &str = "_pk_id.";

/// Visitor id from the piwik cookie, if the cookie exists.
pub fn piwik_visitor_id(page: &dyn Page) -> Option<String> {
    let (_, value) = page.find_cookie_by_prefix(PIWIK_COOKIE_PREFIX)?;
    let id = value.split('.').next().unwrap_or_default();
    (!id.is_empty()).then(|| id.to_string())
}

/// Poll for the piwik cookie and the analytics identity, then attach the
/// visitor id as a trait. The reporter, when present, also tags its
/// error payloads with the id.
pub fn spawn(
    page: Arc<dyn Page>,
    vendors: Arc<dyn VendorRuntime>,
    reporter: Option<Arc<RemoteReporter>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut waited = Duration::ZERO;
        while waited < PIWIK_ID_POLL_LIMIT {
            sleep(PIWIK_ID_POLL).await;
            waited += PIWIK_ID_POLL;

            let Some(visitor_id) = piwik_visitor_id(page.as_ref()) else {
                continue;
            };
            let Some(identity) = vendors.identity() else {
                continue;
            };

            let mut traits = serde_json::Map::new();
            traits.insert("piwik_id".into(), json!(visitor_id));
            identity.identify(None, traits);
            if let Some(reporter) = reporter {
                reporter.set_piwik_id(&visitor_id);
            }
            return;
        }
    })
}
