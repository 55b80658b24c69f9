//! End-to-end tag flows against the simulated page: install from a full
//! settings document, fire triggers, and assert on what reaches vendors.

use std::sync::Arc;
use std::time::Duration;

use tagwire_core::page::SimElement;
use tagwire_core::{
    capture_sink, CaptureSink, ErrorKind, FakeVendors, IdentityProvider, Page, RecordingIdentity,
    SimulatedPage, StaticDataSources, TelemetrySettings,
};
use tagwire_engine::TelemetryTag;

struct Harness {
    page: Arc<SimulatedPage>,
    vendors: Arc<FakeVendors>,
    sources: Arc<StaticDataSources>,
    errors: Arc<CaptureSink>,
}

impl Harness {
    fn new(url: &str) -> Self {
        Self {
            page: Arc::new(SimulatedPage::new(url)),
            vendors: Arc::new(FakeVendors::new()),
            sources: Arc::new(StaticDataSources::new()),
            errors: capture_sink(),
        }
    }

    fn tag(&self, settings: serde_json::Value) -> TelemetryTag {
        TelemetryTag::new(
            TelemetrySettings::from_json(settings).unwrap(),
            self.page.clone(),
            self.vendors.clone(),
            self.sources.clone(),
        )
        .with_error_sink(self.errors.clone())
    }
}

fn donation_data() -> tagwire_core::types::EcommerceData {
    serde_json::from_value(serde_json::json!({
        "total_transaction_amount": 25.0,
        "items": [{
            "sku": "donation-25", "name": "One-time Donation",
            "category": "donation", "price": 25.0, "quantity": 1.0
        }]
    }))
    .unwrap()
}

#[tokio::test(start_paused = true)]
async fn donation_fires_once_and_dedups_repeats() {
    let h = Harness::new("https://example.org/donate");
    let identity = h.vendors.define_identity(RecordingIdentity::new());
    h.sources.set_ecommerce("donation_complete", donation_data());

    let tag = h.tag(serde_json::json!({
        "client_name": "Example Org",
        "client_abbreviation": "EO",
        "ecommerce_configurations": [{
            "configuration_name": "donation_complete",
            "triggers": [{
                "type": "element_exists",
                "selector": ".donation-confirmation"
            }],
            "platforms": [{"name": "rudderstack", "event_type": "Donation"}]
        }]
    }));
    let data_layer = tag.data_layer();
    let installed = tag.install().unwrap();

    // Nothing fires until the confirmation element renders.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(identity.tracked().is_empty());

    h.page
        .add_element(SimElement::matching(&[".donation-confirmation"]));
    tokio::time::sleep(Duration::from_millis(150)).await;

    let tracked = identity.tracked();
    assert_eq!(tracked.len(), 1);
    let (event, properties) = tracked[0].clone();
    assert_eq!(event, "Donation");
    assert_eq!(properties["revenue"], 25.0);
    assert_eq!(properties["currency"], "USD");
    assert_eq!(properties["products"][0]["sku"], "donation-25");
    let order_id = properties["order_id"].as_str().unwrap();
    assert!(!order_id.is_empty());

    // The transaction is mirrored into the data layer.
    let entries = data_layer.entries();
    let transaction = entries
        .iter()
        .find(|e| e.event == "mw_ecommerce_transaction")
        .expect("transaction data layer entry");
    assert_eq!(transaction.data["data"]["transaction_id"], order_id);

    // A second install on the same page sees the dedup cookie and skips.
    let second = h
        .tag(serde_json::json!({
            "ecommerce_configurations": [{
                "configuration_name": "donation_complete",
                "triggers": [{"type": "page_view"}],
                "platforms": [{"name": "rudderstack", "event_type": "Donation"}]
            }]
        }))
        .install()
        .unwrap();
    assert_eq!(identity.tracked().len(), 1);
    assert_eq!(h.errors.count(), 0);

    second.shutdown();
    installed.shutdown();
}

#[tokio::test(start_paused = true)]
async fn custom_event_fans_out_and_isolates_failures() {
    let h = Harness::new("https://example.org/petition?signed=true");
    let queue = h.vendors.define("_paq");
    // fbq never loads; facebook should fail after its polling window
    // without affecting piwik.

    let installed = h
        .tag(serde_json::json!({
            "custom_event_configurations": [{
                "event_name": "petition_signed",
                "triggers": [{
                    "type": "parameter_equals",
                    "parameter_key": "signed",
                    "parameter_value": "true"
                }],
                "platforms": [
                    {"name": "piwik", "event_type": "conversion"},
                    {"name": "facebook", "event_type": "Petition"}
                ]
            }]
        }))
        .install()
        .unwrap();

    tokio::time::sleep(Duration::from_secs(31)).await;

    let pushes = queue.calls_to("push");
    assert!(pushes
        .iter()
        .any(|p| p[0][3] == "mw_cv : conversion : petition_signed"));
    assert_eq!(h.errors.count_kind(ErrorKind::DependencyUnavailable), 1);
    assert!(h.errors.errors()[0]
        .message
        .contains("still undefined after 30 seconds"));

    installed.shutdown();
}

#[tokio::test(start_paused = true)]
async fn identification_and_piwik_bridge_share_the_identity() {
    let h = Harness::new("https://example.org/donate");
    let identity = h.vendors.define_identity(RecordingIdentity::new());
    h.page.set_cookie(
        "_pk_id.site1-a.9f2c",
        "pkvisitor.1700000000",
        Duration::from_secs(3600),
    );

    let installed = h
        .tag(serde_json::json!({
            "identification_configuration": {
                "email_selectors": ["input[name=email]"]
            }
        }))
        .install()
        .unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    let field = h
        .page
        .add_element(SimElement::matching(&["input[name=email]"]).with_value("Donor@Example.org"));
    h.page.blur(field);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let traits = identity.traits().unwrap();
    assert_eq!(traits["email"], "Donor@Example.org");
    assert_eq!(traits["piwik_id"], "pkvisitor");
    assert_eq!(identity.user_id().as_deref(), Some("Donor@Example.org"));

    installed.shutdown();
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_polling_detectors() {
    let h = Harness::new("https://example.org/donate");
    let identity = h.vendors.define_identity(RecordingIdentity::new());
    h.sources.set_ecommerce("donation_complete", donation_data());

    let installed = h
        .tag(serde_json::json!({
            "ecommerce_configurations": [{
                "configuration_name": "donation_complete",
                "triggers": [{"type": "element_exists", "selector": ".late"}],
                "platforms": [{"name": "rudderstack"}]
            }]
        }))
        .install()
        .unwrap();

    installed.shutdown();
    h.page.add_element(SimElement::matching(&[".late"]));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(identity.tracked().is_empty());
}
