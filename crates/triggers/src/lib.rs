//! Trigger resolution: turn declarative [`TriggerSpec`] values into live
//! detectors watching the page and the data layer.
//!
//! [`TriggerEngine::resolve`] validates a spec, applies its URL gates and
//! install delay, and spawns the matching detector. The returned
//! [`DetectorHandle`] cancels the detector when dropped via
//! [`DetectorHandle::cancel`]; dropping the handle without cancelling lets
//! the detector run for the life of the page, which is the default for
//! installed configurations.
//!
//! [`TriggerSpec`]: tagwire_core::types::TriggerSpec

mod detectors;
mod engine;
mod handle;

pub use engine::{TriggerCallback, TriggerEngine};
pub use handle::DetectorHandle;
