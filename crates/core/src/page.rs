//! The host page abstraction.
//!
//! The engine never touches a real DOM; it observes the page through the
//! [`Page`] trait: URL state, selector queries, a cookie jar, pixel/script
//! insertion points, and a broadcast stream of DOM-level events (mousedown,
//! blur, window messages, arbitrary element events). [`SimulatedPage`] is
//! the in-memory implementation used by tests and the demo binary; a real
//! deployment binds these calls to an actual browser page.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio::time::Instant;
use url::Url;

use crate::types::EcommerceData;

/// Opaque handle for a DOM element carried by page events.
pub type ElementId = u64;

/// A DOM-level event observed on the page.
#[derive(Debug, Clone)]
pub struct PageEvent {
    /// Event type: "mousedown", "blur", "message", or any element event.
    pub event_type: String,
    pub target: Option<ElementId>,
    /// Field value for blur events, payload text for window messages.
    pub value: Option<String>,
}

/// Read/write access to the hosting page.
pub trait Page: Send + Sync {
    fn url(&self) -> String;
    fn pathname(&self) -> String;
    fn query_param(&self, key: &str) -> Option<String>;

    fn selector_exists(&self, selector: &str) -> bool;
    /// Text content of every element matching the selector.
    fn selector_texts(&self, selector: &str) -> Vec<String>;
    /// Whether the element itself matches the selector.
    fn matches(&self, element: ElementId, selector: &str) -> bool;
    /// Closest ancestor (or the element itself) matching the selector.
    fn closest(&self, element: ElementId, selector: &str) -> Option<ElementId>;

    fn cookie(&self, name: &str) -> Option<String>;
    fn set_cookie(&self, name: &str, value: &str, max_age: Duration);
    /// First cookie whose name starts with the prefix, as (name, value).
    fn find_cookie_by_prefix(&self, prefix: &str) -> Option<(String, String)>;

    /// Insert a 1x1 tracking image with the given source.
    fn append_pixel(&self, src: &str);
    /// Insert an async script tag with the given source.
    fn inject_script(&self, src: &str);

    /// Subscribe to the page's DOM event stream.
    fn events(&self) -> broadcast::Receiver<PageEvent>;

    fn url_contains(&self, fragment: &str) -> bool {
        self.url().contains(fragment)
    }
}

/// Host collaborators that produce normalized payloads on demand.
pub trait DataSources: Send + Sync {
    /// The page's ecommerce data getter. `None` means "nothing to report";
    /// the dispatch is skipped silently.
    fn ecommerce_data(&self, configuration_name: &str) -> Option<EcommerceData>;
    /// The page's identification data getter: a flat trait map.
    fn identification_data(
        &self,
        configuration_name: &str,
    ) -> Option<serde_json::Map<String, serde_json::Value>>;
}

/// Map-backed [`DataSources`] for tests and the demo binary.
#[derive(Default)]
pub struct StaticDataSources {
    ecommerce: DashMap<String, EcommerceData>,
    identification: DashMap<String, serde_json::Map<String, serde_json::Value>>,
}

impl StaticDataSources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ecommerce(&self, configuration_name: &str, data: EcommerceData) {
        self.ecommerce.insert(configuration_name.to_string(), data);
    }

    pub fn set_identification(
        &self,
        configuration_name: &str,
        traits: serde_json::Map<String, serde_json::Value>,
    ) {
        self.identification
            .insert(configuration_name.to_string(), traits);
    }
}

impl DataSources for StaticDataSources {
    fn ecommerce_data(&self, configuration_name: &str) -> Option<EcommerceData> {
        self.ecommerce.get(configuration_name).map(|d| d.clone())
    }

    fn identification_data(
        &self,
        configuration_name: &str,
    ) -> Option<serde_json::Map<String, serde_json::Value>> {
        self.identification
            .get(configuration_name)
            .map(|d| d.clone())
    }
}

/// A simulated element: the selectors it matches, the selectors any of its
/// ancestors match (for event delegation), its text content, and its field
/// value.
#[derive(Debug, Clone, Default)]
pub struct SimElement {
    pub selectors: HashSet<String>,
    pub ancestor_selectors: HashSet<String>,
    pub text: String,
    pub value: String,
}

impl SimElement {
    pub fn matching(selectors: &[&str]) -> Self {
        Self {
            selectors: selectors.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn with_value(mut self, value: &str) -> Self {
        self.value = value.to_string();
        self
    }

    pub fn under(mut self, ancestor_selectors: &[&str]) -> Self {
        self.ancestor_selectors = ancestor_selectors.iter().map(|s| s.to_string()).collect();
        self
    }
}

struct CookieRecord {
    value: String,
    expires_at: Instant,
}

/// In-memory page for tests and the demo binary. Cookie expiry runs on
/// tokio's clock, so paused-time tests can cross the dedup window without
/// waiting.
pub struct SimulatedPage {
    url: RwLock<Url>,
    elements: DashMap<ElementId, SimElement>,
    next_element: AtomicU64,
    cookies: DashMap<String, CookieRecord>,
    pixels: Mutex<Vec<String>>,
    scripts: Mutex<Vec<String>>,
    events: broadcast::Sender<PageEvent>,
}

impl SimulatedPage {
    pub fn new(url: &str) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            url: RwLock::new(Url::parse(url).expect("valid simulated page url")),
            elements: DashMap::new(),
            next_element: AtomicU64::new(1),
            cookies: DashMap::new(),
            pixels: Mutex::new(Vec::new()),
            scripts: Mutex::new(Vec::new()),
            events,
        }
    }

    pub fn navigate(&self, url: &str) {
        *self.url.write() = Url::parse(url).expect("valid simulated page url");
    }

    pub fn add_element(&self, element: SimElement) -> ElementId {
        let id = self.next_element.fetch_add(1, Ordering::Relaxed);
        self.elements.insert(id, element);
        id
    }

    pub fn remove_element(&self, id: ElementId) {
        self.elements.remove(&id);
    }

    /// Dispatch a DOM event into the page's event stream.
    pub fn dispatch(&self, event_type: &str, target: Option<ElementId>, value: Option<String>) {
        // No receivers is fine; nobody is listening yet.
        let _ = self.events.send(PageEvent {
            event_type: event_type.to_string(),
            target,
            value,
        });
    }

    /// Dispatch a blur event carrying the element's current field value.
    pub fn blur(&self, target: ElementId) {
        let value = self.elements.get(&target).map(|e| e.value.clone());
        self.dispatch("blur", Some(target), value);
    }

    /// Dispatch a window "message" event with a text payload.
    pub fn post_message(&self, payload: &str) {
        self.dispatch("message", None, Some(payload.to_string()));
    }

    /// Tracking pixels appended so far (by source URL).
    pub fn pixels(&self) -> Vec<String> {
        self.pixels.lock().clone()
    }

    /// Script tags injected so far (by source URL).
    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().clone()
    }
}

impl Page for SimulatedPage {
    fn url(&self) -> String {
        self.url.read().to_string()
    }

    fn pathname(&self) -> String {
        self.url.read().path().to_string()
    }

    fn query_param(&self, key: &str) -> Option<String> {
        self.url
            .read()
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    fn selector_exists(&self, selector: &str) -> bool {
        self.elements
            .iter()
            .any(|e| e.value().selectors.contains(selector))
    }

    fn selector_texts(&self, selector: &str) -> Vec<String> {
        self.elements
            .iter()
            .filter(|e| e.value().selectors.contains(selector))
            .map(|e| e.value().text.clone())
            .collect()
    }

    fn matches(&self, element: ElementId, selector: &str) -> bool {
        self.elements
            .get(&element)
            .map(|e| e.selectors.contains(selector))
            .unwrap_or(false)
    }

    fn closest(&self, element: ElementId, selector: &str) -> Option<ElementId> {
        let entry = self.elements.get(&element)?;
        if entry.selectors.contains(selector) || entry.ancestor_selectors.contains(selector) {
            Some(element)
        } else {
            None
        }
    }

    fn cookie(&self, name: &str) -> Option<String> {
        let record = self.cookies.get(name)?;
        if record.expires_at <= Instant::now() {
            drop(record);
            self.cookies.remove(name);
            return None;
        }
        Some(record.value.clone())
    }

    fn set_cookie(&self, name: &str, value: &str, max_age: Duration) {
        self.cookies.insert(
            name.to_string(),
            CookieRecord {
                value: value.to_string(),
                expires_at: Instant::now() + max_age,
            },
        );
    }

    fn find_cookie_by_prefix(&self, prefix: &str) -> Option<(String, String)> {
        self.cookies.iter().find_map(|entry| {
            if entry.key().starts_with(prefix) && entry.value().expires_at > Instant::now() {
                Some((entry.key().clone(), entry.value().value.clone()))
            } else {
                None
            }
        })
    }

    fn append_pixel(&self, src: &str) {
        self.pixels.lock().push(src.to_string());
    }

    fn inject_script(&self, src: &str) {
        self.scripts.lock().push(src.to_string());
    }

    fn events(&self) -> broadcast::Receiver<PageEvent> {
        self.events.subscribe()
    }
}
