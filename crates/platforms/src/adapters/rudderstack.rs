use serde_json::json;

use tagwire_core::types::{CustomEvent, EcommerceData, PlatformSpec};
use tagwire_core::{TagResult, TelemetryError};

use crate::{DispatchContext, PlatformAdapter};

/// Primary analytics destination. Transactions and custom events go
/// through the identity object's `track` call.
pub struct Rudderstack;

impl PlatformAdapter for Rudderstack {
    fn name(&self) -> &'static str {
        "rudderstack"
    }

    fn fire_ecommerce(
        &self,
        ctx: &DispatchContext,
        data: &EcommerceData,
        spec: &PlatformSpec,
    ) -> TagResult<()> {
        let identity = ctx.vendors.identity().ok_or_else(|| {
            TelemetryError::dependency_unavailable(
                "rudderanalytics is not defined",
                json!({ "transaction_id": data.transaction_id }),
            )
        })?;

        let event_type = spec.event_type.as_deref().unwrap_or("Order Completed");
        let properties = json!({
            "order_id": data.transaction_id,
            "currency": "USD",
            "revenue": data.total_transaction_amount,
            "products": data.items,
        });
        identity.track(
            event_type,
            properties.as_object().cloned().unwrap_or_default(),
        );
        Ok(())
    }

    fn fire_custom(
        &self,
        ctx: &DispatchContext,
        event: &CustomEvent,
        spec: &PlatformSpec,
    ) -> TagResult<()> {
        let identity = ctx.vendors.identity().ok_or_else(|| {
            TelemetryError::dependency_unavailable(
                "rudderanalytics is not defined",
                json!({ "event_name": event.event_name }),
            )
        })?;

        let event_type = spec.event_type.as_deref().unwrap_or(&event.event_name);
        let mut properties = event.metadata.clone();
        properties.insert("event_name".into(), json!(event.event_name));
        identity.track(event_type, properties);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DispatchContext;
    use std::sync::Arc;
    use tagwire_core::{
        capture_sink, ErrorKind, FakeVendors, RecordingIdentity, SimulatedPage, TelemetrySettings,
    };

    fn context(vendors: Arc<FakeVendors>) -> DispatchContext {
        DispatchContext {
            settings: Arc::new(TelemetrySettings::default()),
            page: Arc::new(SimulatedPage::new("https://example.org/")),
            vendors,
            errors: capture_sink(),
        }
    }

    fn donation() -> EcommerceData {
        serde_json::from_value(serde_json::json!({
            "transaction_id": "k3x9",
            "total_transaction_amount": 25.0,
            "items": [{"sku": "d-25", "name": "Donation", "category": "donation",
                       "price": 25.0, "quantity": 1.0}]
        }))
        .unwrap()
    }

    #[test]
    fn test_transaction_payload() {
        let vendors = Arc::new(FakeVendors::new());
        let identity = vendors.define_identity(RecordingIdentity::new());
        let ctx = context(vendors);

        Rudderstack
            .fire_ecommerce(&ctx, &donation(), &PlatformSpec::default())
            .unwrap();

        let (event, properties) = identity.tracked()[0].clone();
        assert_eq!(event, "Order Completed");
        assert_eq!(properties["order_id"], "k3x9");
        assert_eq!(properties["revenue"], 25.0);
        assert_eq!(properties["products"][0]["sku"], "d-25");
    }

    #[test]
    fn test_missing_identity_is_dependency_error() {
        let ctx = context(Arc::new(FakeVendors::new()));
        let err = Rudderstack
            .fire_ecommerce(&ctx, &donation(), &PlatformSpec::default())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::DependencyUnavailable);
    }

    #[test]
    fn test_custom_event_carries_name_in_metadata() {
        let vendors = Arc::new(FakeVendors::new());
        let identity = vendors.define_identity(RecordingIdentity::new());
        let ctx = context(vendors);

        let event = CustomEvent {
            event_name: "newsletter_signup".into(),
            metadata: serde_json::json!({"placement": "footer"})
                .as_object()
                .cloned()
                .unwrap(),
        };
        let spec: PlatformSpec = serde_json::from_value(serde_json::json!({
            "name": "rudderstack", "event_type": "Signup"
        }))
        .unwrap();
        Rudderstack.fire_custom(&ctx, &event, &spec).unwrap();

        let (event_type, properties) = identity.tracked()[0].clone();
        assert_eq!(event_type, "Signup");
        assert_eq!(properties["event_name"], "newsletter_signup");
        assert_eq!(properties["placement"], "footer");
    }
}
