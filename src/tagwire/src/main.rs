//! Tagwire — marketing telemetry tag engine.
//!
//! Demo driver: installs a tag from a settings document against a
//! simulated page, lets the detectors run, and reports what fired.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use tagwire_core::types::EcommerceData;
use tagwire_core::{
    FakeVendors, RecordingIdentity, RemoteReporter, SimulatedPage, StaticDataSources,
    TelemetrySettings,
};
use tagwire_engine::TelemetryTag;

#[derive(Parser, Debug)]
#[command(name = "tagwire")]
#[command(about = "Marketing telemetry tag engine")]
#[command(version)]
struct Cli {
    /// Path to the telemetry settings JSON document
    #[arg(long, env = "TAGWIRE__SETTINGS_PATH", default_value = "settings.json")]
    settings: String,

    /// URL of the simulated page the tag runs against
    #[arg(long, default_value = "https://example.org/")]
    url: String,

    /// Optional JSON file mapping configuration names to ecommerce payloads
    #[arg(long)]
    ecommerce: Option<String>,

    /// Base URL of the remote error collector (disables remote reporting
    /// when absent)
    #[arg(long, env = "TAGWIRE__REPORT_URL")]
    report_url: Option<String>,

    /// How long to let detectors and monitors run, in seconds
    #[arg(long, default_value_t = 5)]
    run_for: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tagwire=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    let settings = TelemetrySettings::load(&cli.settings)
        .with_context(|| format!("loading settings from {}", cli.settings))?;
    info!(
        client = %settings.client_abbreviation,
        ecommerce = settings.ecommerce_configurations.len(),
        custom = settings.custom_event_configurations.len(),
        "settings loaded"
    );

    let page = Arc::new(SimulatedPage::new(&cli.url));
    let vendors = Arc::new(FakeVendors::new());
    vendors.define_identity(RecordingIdentity::new());
    let sources = Arc::new(StaticDataSources::new());

    if let Some(path) = &cli.ecommerce {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading ecommerce payloads from {path}"))?;
        let payloads: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&raw).context("parsing ecommerce payloads")?;
        for (name, value) in payloads {
            let data: EcommerceData = serde_json::from_value(value)
                .with_context(|| format!("parsing ecommerce payload {name}"))?;
            sources.set_ecommerce(&name, data);
        }
    }

    let mut tag = TelemetryTag::new(settings.clone(), page.clone(), vendors, sources);
    if let Some(report_url) = &cli.report_url {
        tag = tag.with_reporter(Arc::new(RemoteReporter::new(report_url, &settings)));
    }

    let data_layer = tag.data_layer();
    let installed = tag.install()?;
    info!(detectors = installed.detector_count(), "tag installed");

    tokio::time::sleep(Duration::from_secs(cli.run_for)).await;

    for entry in data_layer.entries() {
        info!(event = %entry.event, data = %serde_json::Value::Object(entry.data.clone()), "data layer entry");
    }
    for pixel in page.pixels() {
        info!(src = %pixel, "tracking pixel appended");
    }
    for script in page.scripts() {
        info!(src = %script, "script injected");
    }

    installed.shutdown();
    info!("tag shut down");
    Ok(())
}
