//! Vendor globals behind trait seams.
//!
//! Every third-party tag the engine talks to is reached through
//! [`VendorRuntime`]: callable globals (fbq, gtag, lintrk, ...) come back as
//! [`VendorHandle`]s, queue-style globals (_paq, _tfa, uetq, ...) are
//! materialized on demand the way `window.x = window.x || []` would be, and
//! the analytics identity object is exposed as [`IdentityProvider`].
//! [`FakeVendors`] records every call for tests.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};

/// A callable or pushable vendor global. `method` is the function name for
/// callable vendors ("track", "event", ...) and "push" for queue vendors;
/// `args` is the positional argument list as a JSON array.
pub trait VendorHandle: Send + Sync {
    fn call(&self, method: &str, args: serde_json::Value);
}

/// The page's analytics identity object.
pub trait IdentityProvider: Send + Sync {
    fn anonymous_id(&self) -> Option<String>;
    fn user_id(&self) -> Option<String>;
    fn traits(&self) -> Option<serde_json::Map<String, serde_json::Value>>;
    /// Merge traits into the current identity, optionally binding a user id.
    fn identify(&self, user_id: Option<&str>, traits: serde_json::Map<String, serde_json::Value>);
    fn track(&self, event: &str, properties: serde_json::Map<String, serde_json::Value>);
}

/// Access to the vendor globals present on the page.
pub trait VendorRuntime: Send + Sync {
    /// Look up a callable global. `None` means the vendor script has not
    /// (yet) loaded; callers decide whether to poll or fail.
    fn handle(&self, name: &str) -> Option<Arc<dyn VendorHandle>>;
    /// Get or create a queue-style global. Queues always exist because
    /// pushes buffer until the vendor script drains them.
    fn ensure_queue(&self, name: &str) -> Arc<dyn VendorHandle>;
    /// The analytics identity object, if its script has loaded.
    fn identity(&self) -> Option<Arc<dyn IdentityProvider>>;
}

/// Records every call made to one vendor global.
#[derive(Default)]
pub struct RecordingHandle {
    calls: Mutex<Vec<(String, serde_json::Value)>>,
}

impl RecordingHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<(String, serde_json::Value)> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Arguments of calls made with the given method.
    pub fn calls_to(&self, method: &str) -> Vec<serde_json::Value> {
        self.calls
            .lock()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, args)| args.clone())
            .collect()
    }
}

impl VendorHandle for RecordingHandle {
    fn call(&self, method: &str, args: serde_json::Value) {
        self.calls.lock().push((method.to_string(), args));
    }
}

/// Recording identity object for tests. `identify` merges trait maps the
/// way analytics SDKs do: later values win per key.
#[derive(Default)]
pub struct RecordingIdentity {
    anonymous_id: RwLock<Option<String>>,
    user_id: RwLock<Option<String>>,
    traits: RwLock<serde_json::Map<String, serde_json::Value>>,
    tracked: Mutex<Vec<(String, serde_json::Map<String, serde_json::Value>)>>,
}

impl RecordingIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_anonymous_id(anonymous_id: &str) -> Self {
        let identity = Self::default();
        *identity.anonymous_id.write() = Some(anonymous_id.to_string());
        identity
    }

    pub fn tracked(&self) -> Vec<(String, serde_json::Map<String, serde_json::Value>)> {
        self.tracked.lock().clone()
    }
}

impl IdentityProvider for RecordingIdentity {
    fn anonymous_id(&self) -> Option<String> {
        self.anonymous_id.read().clone()
    }

    fn user_id(&self) -> Option<String> {
        self.user_id.read().clone()
    }

    fn traits(&self) -> Option<serde_json::Map<String, serde_json::Value>> {
        let traits = self.traits.read();
        if traits.is_empty() {
            None
        } else {
            Some(traits.clone())
        }
    }

    fn identify(&self, user_id: Option<&str>, traits: serde_json::Map<String, serde_json::Value>) {
        if let Some(id) = user_id {
            *self.user_id.write() = Some(id.to_string());
        }
        let mut current = self.traits.write();
        for (key, value) in traits {
            current.insert(key, value);
        }
    }

    fn track(&self, event: &str, properties: serde_json::Map<String, serde_json::Value>) {
        self.tracked.lock().push((event.to_string(), properties));
    }
}

/// In-memory vendor runtime for tests and the demo binary. Callable
/// globals are absent until [`FakeVendors::define`] is called, which lets
/// tests exercise the polling/failure paths; queues materialize on first
/// touch.
#[derive(Default)]
pub struct FakeVendors {
    handles: DashMap<String, Arc<RecordingHandle>>,
    defined: DashMap<String, ()>,
    identity: RwLock<Option<Arc<RecordingIdentity>>>,
}

impl FakeVendors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a callable global as loaded and return its recorder.
    pub fn define(&self, name: &str) -> Arc<RecordingHandle> {
        self.defined.insert(name.to_string(), ());
        self.recorder(name)
    }

    /// Attach a recording identity object and return it.
    pub fn define_identity(&self, identity: RecordingIdentity) -> Arc<RecordingIdentity> {
        let identity = Arc::new(identity);
        *self.identity.write() = Some(identity.clone());
        identity
    }

    /// The recorder for a global, created on demand. Useful for asserting
    /// on queue pushes without marking the callable form as loaded.
    pub fn recorder(&self, name: &str) -> Arc<RecordingHandle> {
        self.handles
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(RecordingHandle::new()))
            .clone()
    }
}

impl VendorRuntime for FakeVendors {
    fn handle(&self, name: &str) -> Option<Arc<dyn VendorHandle>> {
        if self.defined.contains_key(name) {
            Some(self.recorder(name) as Arc<dyn VendorHandle>)
        } else {
            None
        }
    }

    fn ensure_queue(&self, name: &str) -> Arc<dyn VendorHandle> {
        self.recorder(name) as Arc<dyn VendorHandle>
    }

    fn identity(&self) -> Option<Arc<dyn IdentityProvider>> {
        self.identity
            .read()
            .clone()
            .map(|i| i as Arc<dyn IdentityProvider>)
    }
}
