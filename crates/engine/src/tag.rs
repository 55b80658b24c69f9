//! Tag assembly: resolve every configured trigger, start the background
//! monitors, and hand back one value that owns all of it.
//!
//! A bad configuration never takes down the rest of the tag: validation
//! and resolution failures are reported to the error sink and the
//! offending configuration is skipped.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use tagwire_core::{
    console_sink, DataLayer, DataSources, ErrorSink, Page, RemoteReporter, TagResult,
    TelemetrySettings, VendorRuntime,
};
use tagwire_platforms::{DispatchContext, PlatformRegistry};
use tagwire_triggers::{DetectorHandle, TriggerEngine};

use crate::dispatcher::EventDispatcher;
use crate::identification::IdentificationMonitor;
use crate::{dimensions, piwik_bridge, product_search, validator};

/// Everything an installed tag keeps running: trigger detectors plus the
/// dimension and piwik-bridge background tasks.
pub struct InstalledTag {
    handles: Vec<DetectorHandle>,
    tasks: Vec<JoinHandle<()>>,
}

impl InstalledTag {
    pub fn detector_count(&self) -> usize {
        self.handles.len()
    }

    /// Cancel every detector and background task.
    pub fn shutdown(self) {
        for handle in self.handles {
            handle.cancel();
        }
        for task in self.tasks {
            task.abort();
        }
    }
}

/// The tag: settings plus the host abstractions it runs against.
pub struct TelemetryTag {
    settings: Arc<TelemetrySettings>,
    page: Arc<dyn Page>,
    vendors: Arc<dyn VendorRuntime>,
    sources: Arc<dyn DataSources>,
    data_layer: Arc<DataLayer>,
    registry: Arc<PlatformRegistry>,
    errors: Arc<dyn ErrorSink>,
    reporter: Option<Arc<RemoteReporter>>,
}

impl TelemetryTag {
    pub fn new(
        settings: TelemetrySettings,
        page: Arc<dyn Page>,
        vendors: Arc<dyn VendorRuntime>,
        sources: Arc<dyn DataSources>,
    ) -> Self {
        let errors = console_sink(&settings);
        Self {
            settings: Arc::new(settings),
            page,
            vendors,
            sources,
            data_layer: Arc::new(DataLayer::new()),
            registry: Arc::new(PlatformRegistry::with_defaults()),
            errors,
            reporter: None,
        }
    }

    pub fn with_error_sink(mut self, errors: Arc<dyn ErrorSink>) -> Self {
        self.errors = errors;
        self
    }

    pub fn with_registry(mut self, registry: PlatformRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    /// Attach the remote collector; the piwik bridge tags its payloads
    /// with the visitor id once known.
    pub fn with_reporter(mut self, reporter: Arc<RemoteReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn data_layer(&self) -> Arc<DataLayer> {
        self.data_layer.clone()
    }

    /// Install the tag: resolve triggers, fire the page-load captures, and
    /// start the background monitors. Must run inside a tokio runtime.
    pub fn install(self) -> TagResult<InstalledTag> {
        let ctx = DispatchContext {
            settings: self.settings.clone(),
            page: self.page.clone(),
            vendors: self.vendors.clone(),
            errors: self.errors.clone(),
        };
        let engine = TriggerEngine::new(self.page.clone(), self.data_layer.clone());
        let dispatcher = Arc::new(EventDispatcher::new(
            ctx,
            self.registry.clone(),
            self.sources.clone(),
            self.data_layer.clone(),
        ));

        let mut handles = Vec::new();
        let mut tasks = Vec::new();

        if self.settings.events_disabled {
            debug!("event configurations disabled by settings");
        } else {
            for config in &self.settings.ecommerce_configurations {
                if let Err(err) = validator::validate_ecommerce(config) {
                    self.errors.handle(&err);
                    continue;
                }
                for trigger in &config.triggers {
                    let dispatcher = dispatcher.clone();
                    let config = config.clone();
                    let callback: Arc<dyn Fn() + Send + Sync> =
                        Arc::new(move || dispatcher.dispatch_ecommerce(&config));
                    match engine.resolve(trigger, callback) {
                        Ok(handle) => handles.push(handle),
                        Err(err) => self.errors.handle(&err),
                    }
                }
            }

            for config in &self.settings.custom_event_configurations {
                if let Err(err) = validator::validate_custom(config) {
                    self.errors.handle(&err);
                    continue;
                }
                for trigger in &config.triggers {
                    let dispatcher = dispatcher.clone();
                    let config = config.clone();
                    let callback: Arc<dyn Fn() + Send + Sync> =
                        Arc::new(move || dispatcher.dispatch_custom(&config));
                    match engine.resolve(trigger, callback) {
                        Ok(handle) => handles.push(handle),
                        Err(err) => self.errors.handle(&err),
                    }
                }
            }
        }

        if let Some(identification) = &self.settings.identification_configuration {
            let monitor = Arc::new(IdentificationMonitor::new(
                self.page.clone(),
                self.vendors.clone(),
                self.errors.clone(),
                self.settings.matomo_conflict,
            ));
            let installed = monitor.install(identification, self.sources.clone(), &engine);
            if let Some(listener) = installed.listener {
                tasks.push(listener);
            }
            handles.extend(installed.detectors);
        }

        for spec in &self.settings.product_search_configurations {
            if let Err(err) = product_search::fire(spec, self.page.as_ref(), self.vendors.as_ref())
            {
                self.errors.handle(&err);
            }
        }

        tasks.push(dimensions::spawn(
            self.page.clone(),
            self.vendors.clone(),
            self.settings.matomo_conflict,
        ));
        tasks.push(piwik_bridge::spawn(
            self.page.clone(),
            self.vendors.clone(),
            self.reporter.clone(),
        ));

        info!(
            client = %self.settings.client_abbreviation,
            detectors = handles.len(),
            "telemetry tag installed"
        );
        Ok(InstalledTag { handles, tasks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tagwire_core::{
        capture_sink, CaptureSink, ErrorKind, FakeVendors, RecordingIdentity, SimulatedPage,
        StaticDataSources,
    };

    struct Fixture {
        page: Arc<SimulatedPage>,
        vendors: Arc<FakeVendors>,
        sources: Arc<StaticDataSources>,
        errors: Arc<CaptureSink>,
    }

    impl Fixture {
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

    #[tokio::test(start_paused = true)]
    async fn test_page_view_configuration_dispatches_on_install() {
        let f = Fixture::new("https://example.org/thanks");
        let identity = f.vendors.define_identity(RecordingIdentity::new());
        f.sources.set_ecommerce(
            "donation",
            serde_json::from_value(serde_json::json!({
                "total_transaction_amount": 25.0,
                "items": [{"sku": "d-25", "name": "Donation", "category": "donation",
                           "price": 25.0, "quantity": 1.0}]
            }))
            .unwrap(),
        );

        let installed = f
            .tag(serde_json::json!({
                "client_name": "Example Org",
                "client_abbreviation": "EO",
                "ecommerce_configurations": [{
                    "configuration_name": "donation",
                    "triggers": [{"type": "page_view"}],
                    "platforms": [{"name": "rudderstack", "event_type": "Donation"}]
                }]
            }))
            .install()
            .unwrap();

        assert_eq!(installed.detector_count(), 1);
        assert_eq!(identity.tracked()[0].0, "Donation");
        assert_eq!(f.errors.count(), 0);
        installed.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_disabled_skips_configurations() {
        let f = Fixture::new("https://example.org/thanks");
        f.vendors.define_identity(RecordingIdentity::new());
        f.sources.set_ecommerce(
            "donation",
            serde_json::from_value(serde_json::json!({
                "total_transaction_amount": 25.0,
                "items": [{"sku": "d-25", "name": "Donation", "category": "donation",
                           "price": 25.0, "quantity": 1.0}]
            }))
            .unwrap(),
        );

        let installed = f
            .tag(serde_json::json!({
                "events_disabled": true,
                "ecommerce_configurations": [{
                    "configuration_name": "donation",
                    "triggers": [{"type": "page_view"}],
                    "platforms": [{"name": "rudderstack"}]
                }]
            }))
            .install()
            .unwrap();

        assert_eq!(installed.detector_count(), 0);
        installed.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_configuration_is_reported_and_skipped() {
        let f = Fixture::new("https://example.org/");
        let installed = f
            .tag(serde_json::json!({
                "ecommerce_configurations": [
                    {"configuration_name": "no_triggers",
                     "platforms": [{"name": "rudderstack"}]},
                    {"configuration_name": "bad_trigger",
                     "triggers": [{"type": "nonexistent_kind"}],
                     "platforms": [{"name": "rudderstack"}]}
                ],
                "custom_event_configurations": [
                    {"triggers": [{"type": "page_view"}],
                     "platforms": [{"name": "piwik", "event_type": "conversion"}]}
                ]
            }))
            .install()
            .unwrap();

        assert_eq!(installed.detector_count(), 0);
        assert_eq!(f.errors.count_kind(ErrorKind::Configuration), 3);
        installed.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_install_starts_background_monitors() {
        let f = Fixture::new("https://example.org/?mwsc=7");
        f.vendors
            .define_identity(RecordingIdentity::with_anonymous_id("anon-1"));
        let queue = f.vendors.recorder("_paq");

        let installed = f.tag(serde_json::json!({})).install().unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let pushes = queue.calls_to("push");
        assert!(pushes.contains(&serde_json::json!([["setCustomDimension", 1, "7"]])));
        assert!(pushes.contains(&serde_json::json!([["ping"]])));
        installed.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_product_search_fires_at_install() {
        let f = Fixture::new("https://example.org/shop?q=soap");
        let identity = f.vendors.define_identity(RecordingIdentity::new());

        let installed = f
            .tag(serde_json::json!({
                "product_search_configurations": [{"url_parameter": "q"}]
            }))
            .install()
            .unwrap();

        assert_eq!(identity.tracked()[0].0, "Products Searched");
        installed.shutdown();
    }
}
