//! User identification: capture form-field values on blur and merge them
//! into the analytics identity as traits.
//!
//! Field values are sanitized per trait type before leaving the page.
//! Email captures additionally emit a piwik `emcap` event and bind the
//! email as the user id. Custom identification configurations resolve
//! through the trigger engine and pull a full trait map from the host's
//! identification getter.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use tagwire_core::types::IdentificationSettings;
use tagwire_core::{
    DataSources, ErrorSink, IdentityProvider, Page, TelemetryError, VendorRuntime,
};
use tagwire_triggers::{DetectorHandle, TriggerEngine};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Email,
    Phone,
    City,
    State,
    Zip,
}

/// Strip everything outside the email-safe charset.
pub fn sanitize_email(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '-' | '_'))
        .collect()
}

/// Digits only.
pub fn sanitize_phone(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Alphanumerics and spaces, lowercased. Used for city and state names.
pub fn sanitize_place(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
        .collect::<String>()
        .to_lowercase()
}

/// Digits and dashes, covering ZIP+4.
pub fn sanitize_zip(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '-')
        .collect()
}

fn sanitize(field_type: FieldType, value: &str) -> String {
    match field_type {
        FieldType::Email => sanitize_email(value),
        FieldType::Phone => sanitize_phone(value),
        FieldType::City | FieldType::State => sanitize_place(value),
        FieldType::Zip => sanitize_zip(value),
    }
}

/// Background pieces of an installed identification configuration.
pub struct IdentificationHandles {
    pub listener: Option<JoinHandle<()>>,
    pub detectors: Vec<DetectorHandle>,
}

pub struct IdentificationMonitor {
    page: Arc<dyn Page>,
    vendors: Arc<dyn VendorRuntime>,
    errors: Arc<dyn ErrorSink>,
    matomo_conflict: bool,
}

impl IdentificationMonitor {
    pub fn new(
        page: Arc<dyn Page>,
        vendors: Arc<dyn VendorRuntime>,
        errors: Arc<dyn ErrorSink>,
        matomo_conflict: bool,
    ) -> Self {
        Self {
            page,
            vendors,
            errors,
            matomo_conflict,
        }
    }

    /// Install the blur listener and any custom identification triggers.
    pub fn install(
        self: &Arc<Self>,
        settings: &IdentificationSettings,
        sources: Arc<dyn DataSources>,
        triggers: &TriggerEngine,
    ) -> IdentificationHandles {
        let mut handles = IdentificationHandles {
            listener: None,
            detectors: Vec::new(),
        };

        if let Some(excludes) = &settings.exclude_urls {
            if excludes.iter().any(|u| self.page.url_contains(u)) {
                return handles;
            }
        }

        let delay = match settings.timeout {
            None => None,
            Some(ms) if ms.is_finite() && ms >= 0.0 => {
                Some(std::time::Duration::from_millis(ms as u64))
            }
            Some(ms) => {
                self.errors.handle(&TelemetryError::configuration(
                    "Invalid identification_configuration.timeout",
                    json!({ "timeout": ms.to_string() }),
                ));
                return handles;
            }
        };

        handles.listener = Some(self.spawn_blur_listener(settings, delay));

        for custom in settings.custom_configurations.as_deref().unwrap_or_default() {
            let name = custom.configuration_name.clone().unwrap_or_default();
            if name.is_empty() || custom.triggers.is_empty() {
                self.errors.handle(&TelemetryError::configuration(
                    "Invalid identification_configuration.custom_configuration",
                    json!({ "configuration_name": name }),
                ));
                continue;
            }

            for trigger in &custom.triggers {
                let monitor = self.clone();
                let sources = sources.clone();
                let name = name.clone();
                let callback: Arc<dyn Fn() + Send + Sync> = Arc::new(move || {
                    monitor.fire_custom_identification(&name, sources.as_ref());
                });
                match triggers.resolve(trigger, callback) {
                    Ok(handle) => handles.detectors.push(handle),
                    Err(err) => self.errors.handle(&err),
                }
            }
        }

        handles
    }

    fn spawn_blur_listener(
        self: &Arc<Self>,
        settings: &IdentificationSettings,
        delay: Option<std::time::Duration>,
    ) -> JoinHandle<()> {
        // Group order decides which trait a field maps to when selectors
        // overlap; the legacy top-level group is treated as email.
        let mut groups: Vec<(FieldType, Vec<String>)> = Vec::new();
        let mut push = |field_type, selectors: &Option<Vec<String>>| {
            if let Some(selectors) = selectors {
                if !selectors.is_empty() {
                    groups.push((field_type, selectors.clone()));
                }
            }
        };
        push(FieldType::Email, &settings.selectors);
        push(FieldType::Email, &settings.email_selectors);
        push(FieldType::Phone, &settings.phone_selectors);
        push(FieldType::City, &settings.city_selectors);
        push(FieldType::State, &settings.state_selectors);
        push(FieldType::Zip, &settings.zip_selectors);

        let monitor = self.clone();
        tokio::spawn(async move {
            if let Some(delay) = delay {
                sleep(delay).await;
            }
            let mut events = monitor.page.events();
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => return,
                };
                if event.event_type != "blur" {
                    continue;
                }
                let (Some(target), Some(value)) = (event.target, event.value) else {
                    continue;
                };
                let matched = groups.iter().find(|(_, selectors)| {
                    selectors.iter().any(|s| monitor.page.matches(target, s))
                });
                if let Some((field_type, _)) = matched {
                    monitor.fire_identification(*field_type, &value);
                }
            }
        })
    }

    /// Merge one captured field into the identity's traits.
    pub fn fire_identification(&self, field_type: FieldType, raw_value: &str) {
        if raw_value.is_empty() {
            return;
        }
        let value = sanitize(field_type, raw_value);

        let Some(identity) = self.vendors.identity() else {
            self.errors.handle(&TelemetryError::dependency_unavailable(
                "rudderanalytics is not defined",
                json!({ "field_type": format!("{field_type:?}") }),
            ));
            return;
        };

        let mut traits = identity.traits().unwrap_or_default();
        let mut user_id = None;

        match field_type {
            FieldType::Email => {
                traits.insert("email".into(), json!(value));
                user_id = Some(value.clone());
                self.push_email_capture(&value);
            }
            FieldType::Phone => {
                traits.insert("phone".into(), json!(value));
            }
            FieldType::City | FieldType::State | FieldType::Zip => {
                let mut address = traits
                    .get("address")
                    .and_then(|v| v.as_object())
                    .cloned()
                    .unwrap_or_default();
                let key = match field_type {
                    FieldType::City => "city",
                    FieldType::State => "state",
                    _ => "postalCode",
                };
                address.insert(key.into(), json!(value));
                traits.insert("address".into(), serde_json::Value::Object(address));
            }
        }

        identity.identify(user_id.as_deref(), traits);
    }

    /// Pull a trait map from the host's identification getter and merge it.
    pub fn fire_custom_identification(&self, configuration_name: &str, sources: &dyn DataSources) {
        let Some(data) = sources.identification_data(configuration_name) else {
            return;
        };
        let Some(identity) = self.vendors.identity() else {
            self.errors.handle(&TelemetryError::dependency_unavailable(
                "rudderanalytics is not defined",
                json!({ "configuration_name": configuration_name }),
            ));
            return;
        };

        let mut traits = identity.traits().unwrap_or_default();
        let mut email = String::new();
        for (key, value) in data {
            if key == "email" {
                email = value.as_str().unwrap_or_default().to_string();
                self.push_email_capture(&email);
            }
            traits.insert(key, value);
        }

        let user_id = (!email.is_empty()).then_some(email);
        identity.identify(user_id.as_deref(), traits);
    }

    fn push_email_capture(&self, email: &str) {
        let queue_name = if self.matomo_conflict { "_ppas" } else { "_paq" };
        // The piwik queue may legitimately be absent; email capture there
        // is best-effort.
        if let Some(queue) = self.vendors.handle(queue_name) {
            queue.call(
                "push",
                json!([[
                    "trackEvent",
                    "mw",
                    "mw : emcap",
                    format!("mw : emcap : {email}"),
                    0,
                    { "dimension4": email }
                ]]),
            );
        }
    }
}
