//! Bounded polling for late-loading vendor scripts.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};

use tagwire_core::{ErrorSink, IdentityProvider, TelemetryError, VendorHandle, VendorRuntime};

/// How often a missing vendor global is re-checked.
pub const VENDOR_POLL: Duration = Duration::from_millis(250);
/// How long a missing vendor global is polled before giving up.
pub const VENDOR_POLL_LIMIT: Duration = Duration::from_secs(30);

const TRAITS_POLL: Duration = Duration::from_millis(500);
const TRAITS_POLL_LIMIT: Duration = Duration::from_secs(10);

/// Run `action` once the vendor global appears, polling every 250ms for up
/// to 30 seconds. A global that never appears is reported to the error sink
/// as a dependency failure; the dispatch itself has already returned.
pub(crate) fn call_when_defined(
    vendors: Arc<dyn VendorRuntime>,
    errors: Arc<dyn ErrorSink>,
    global: &str,
    context: serde_json::Value,
    action: impl FnOnce(Arc<dyn VendorHandle>) + Send + 'static,
) {
    let global = global.to_string();
    tokio::spawn(async move {
        let deadline = Instant::now() + VENDOR_POLL_LIMIT;
        loop {
            if let Some(handle) = vendors.handle(&global) {
                action(handle);
                return;
            }
            if Instant::now() >= deadline {
                errors.handle(&TelemetryError::dependency_unavailable(
                    format!("{global} is still undefined after 30 seconds"),
                    context,
                ));
                return;
            }
            sleep(VENDOR_POLL).await;
        }
    });
}

/// Wait for the identity object to expose user traits, polling every 500ms
/// for up to 10 seconds.
pub(crate) async fn wait_for_user_traits(
    vendors: &Arc<dyn VendorRuntime>,
) -> Option<serde_json::Map<String, serde_json::Value>> {
    let deadline = Instant::now() + TRAITS_POLL_LIMIT;
    loop {
        if let Some(identity) = vendors.identity() {
            if let Some(traits) = identity.traits() {
                return Some(traits);
            }
        }
        if Instant::now() >= deadline {
            return None;
        }
        sleep(TRAITS_POLL).await;
    }
}

/// Shape identity traits into the enhanced conversion record Google Ads
/// expects: e164 phone, `address.state` renamed to `region`,
/// `address.postalCode` to `postal_code`.
pub(crate) fn enhanced_user_data(
    traits: &serde_json::Map<String, serde_json::Value>,
) -> serde_json::Value {
    let mut data = serde_json::Map::new();
    if let Some(email) = traits.get("email").and_then(|v| v.as_str()) {
        data.insert("email".into(), serde_json::json!(email.trim()));
    }
    if let Some(phone) = traits.get("phone").and_then(|v| v.as_str()) {
        data.insert("phone_number".into(), serde_json::json!(format!("+1{phone}")));
    }
    if let Some(zip) = traits.get("zip") {
        data.insert("zip".into(), zip.clone());
    }
    if let Some(address) = traits.get("address").and_then(|v| v.as_object()) {
        let mut out = serde_json::Map::new();
        if let Some(city) = address.get("city") {
            out.insert("city".into(), city.clone());
        }
        if let Some(state) = address.get("state") {
            out.insert("region".into(), state.clone());
        }
        if let Some(postal) = address.get("postalCode") {
            out.insert("postal_code".into(), postal.clone());
        }
        if !out.is_empty() {
            data.insert("address".into(), serde_json::Value::Object(out));
        }
    }
    serde_json::Value::Object(data)
}

/// `(identity, traits-or-empty)` for adapters that read user traits at
/// dispatch time.
pub(crate) fn identity_traits(
    vendors: &Arc<dyn VendorRuntime>,
) -> Option<(Arc<dyn IdentityProvider>, serde_json::Map<String, serde_json::Value>)> {
    let identity = vendors.identity()?;
    let traits = identity.traits().unwrap_or_default();
    Some((identity, traits))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enhanced_user_data_shaping() {
        let traits = serde_json::json!({
            "email": " a@b.org ",
            "phone": "5551234567",
            "address": {"city": "tulsa", "state": "ok", "postalCode": "74101"}
        });
        let data = enhanced_user_data(traits.as_object().unwrap());
        assert_eq!(data["email"], "a@b.org");
        assert_eq!(data["phone_number"], "+15551234567");
        assert_eq!(data["address"]["city"], "tulsa");
        assert_eq!(data["address"]["region"], "ok");
        assert_eq!(data["address"]["postal_code"], "74101");
        assert!(data.get("zip").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_when_defined_waits_for_global() {
        use tagwire_core::{capture_sink, FakeVendors};

        let vendors = Arc::new(FakeVendors::new());
        let errors = capture_sink();
        call_when_defined(
            vendors.clone(),
            errors.clone(),
            "fbq",
            serde_json::json!({}),
            |handle| handle.call("track", serde_json::json!(["Purchase"])),
        );

        tokio::time::sleep(Duration::from_secs(2)).await;
        let recorder = vendors.define("fbq");
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(recorder.call_count(), 1);
        assert_eq!(errors.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_when_defined_reports_after_limit() {
        use tagwire_core::{capture_sink, ErrorKind, FakeVendors};

        let vendors = Arc::new(FakeVendors::new());
        let errors = capture_sink();
        call_when_defined(
            vendors.clone(),
            errors.clone(),
            "lintrk",
            serde_json::json!({}),
            |_| {},
        );

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(errors.count_kind(ErrorKind::DependencyUnavailable), 1);
        assert!(errors.errors()[0]
            .message
            .contains("lintrk is still undefined after 30 seconds"));
    }
}
