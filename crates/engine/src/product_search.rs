//! Product-search capture: report a search query carried in the page URL
//! as a "Products Searched" analytics event.

use serde_json::json;

use tagwire_core::types::ProductSearchSpec;
use tagwire_core::{Page, TagResult, TelemetryError, VendorRuntime};

/// Fire one product-search configuration against the current page. Pages
/// outside the configured URL list, and pages without the parameter, are
/// skipped silently.
pub fn fire(
    spec: &ProductSearchSpec,
    page: &dyn Page,
    vendors: &dyn VendorRuntime,
) -> TagResult<()> {
    if spec.url_parameter.is_empty() {
        return Err(TelemetryError::configuration(
            "Invalid product_search_configuration.url_parameter",
            json!({ "configuration": spec }),
        ));
    }

    if let Some(urls) = &spec.urls {
        if urls.is_empty() || urls.iter().any(|u| u.is_empty()) {
            return Err(TelemetryError::configuration(
                "Invalid product_search_configuration.urls",
                json!({ "configuration": spec }),
            ));
        }
        if !urls.iter().any(|u| page.url_contains(u)) {
            return Ok(());
        }
    }

    let Some(query) = page.query_param(&spec.url_parameter) else {
        return Ok(());
    };
    if query.is_empty() {
        return Ok(());
    }

    let Some(identity) = vendors.identity() else {
        return Err(TelemetryError::dependency_unavailable(
            "rudderanalytics is not defined",
            json!({ "configuration": spec }),
        ));
    };

    let mut properties = serde_json::Map::new();
    properties.insert("query".into(), json!(query));
    identity.track("Products Searched", properties);
    Ok(())
}
