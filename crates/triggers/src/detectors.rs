//! Detector implementations, one per trigger kind.
//!
//! Polling detectors sleep first and check after, so a condition already
//! true at install time is observed one period later. Event-stream and
//! data-layer detectors register their listeners after the install delay
//! has elapsed; events arriving during the delay are not replayed.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::sleep;

use tagwire_core::{DataLayer, Page};

use crate::engine::TriggerCallback;
use crate::handle::DetectorHandle;

/// Element presence and text checks.
pub(crate) const ELEMENT_POLL: Duration = Duration::from_millis(100);
/// Data-layer backlog scans.
pub(crate) const DATA_LAYER_POLL: Duration = Duration::from_millis(250);
/// URL and query-parameter checks.
pub(crate) const URL_POLL: Duration = Duration::from_millis(500);

/// Everything a detector needs: the page, the data layer, the callback to
/// fire, and the optional install delay already validated by the engine.
pub(crate) struct DetectorCtx {
    pub page: Arc<dyn Page>,
    pub data_layer: Arc<DataLayer>,
    pub callback: TriggerCallback,
    pub delay: Option<Duration>,
}

impl DetectorCtx {
    /// One-shot poll: fire once when `check` first passes, then stop.
    fn poll_once(
        self,
        period: Duration,
        check: impl Fn(&dyn Page) -> bool + Send + 'static,
    ) -> DetectorHandle {
        let data_layer = self.data_layer.clone();
        let task = tokio::spawn(async move {
            if let Some(delay) = self.delay {
                sleep(delay).await;
            }
            loop {
                sleep(period).await;
                if check(self.page.as_ref()) {
                    (self.callback)();
                    return;
                }
            }
        });
        DetectorHandle::with_task(task, data_layer)
    }

    /// Persistent event-stream listener; the subscription is taken after
    /// the install delay.
    fn listen(
        self,
        matches: impl Fn(&dyn Page, &tagwire_core::PageEvent) -> bool + Send + 'static,
    ) -> DetectorHandle {
        let data_layer = self.data_layer.clone();
        let task = tokio::spawn(async move {
            if let Some(delay) = self.delay {
                sleep(delay).await;
            }
            let mut events = self.page.events();
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if matches(self.page.as_ref(), &event) {
                            (self.callback)();
                        }
                    }
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => return,
                }
            }
        });
        DetectorHandle::with_task(task, data_layer)
    }
}

/// Fire once when an element matching the selector appears.
pub(crate) fn element_exists(ctx: DetectorCtx, selector: String) -> DetectorHandle {
    ctx.poll_once(ELEMENT_POLL, move |page| page.selector_exists(&selector))
}

/// Fire once when any element matching the selector contains the text.
pub(crate) fn element_contains_text(
    ctx: DetectorCtx,
    selector: String,
    text: String,
) -> DetectorHandle {
    ctx.poll_once(ELEMENT_POLL, move |page| {
        page.selector_texts(&selector).iter().any(|t| t.contains(&text))
    })
}

/// Fire on every future data-layer entry with the given event name.
pub(crate) fn data_layer_event(ctx: DetectorCtx, event_name: String) -> DetectorHandle {
    let data_layer = ctx.data_layer.clone();
    let subscriptions = Arc::new(Mutex::new(Vec::new()));
    let task_subs = subscriptions.clone();
    let task = tokio::spawn(async move {
        if let Some(delay) = ctx.delay {
            sleep(delay).await;
        }
        let callback = ctx.callback.clone();
        let id = ctx
            .data_layer
            .subscribe_event(&event_name, move |_| callback());
        task_subs.lock().push(id);
    });
    DetectorHandle::with_subscriptions(task, subscriptions, data_layer)
}

/// Scan the data-layer backlog every 250ms and fire for each entry with the
/// given event name that this detector has not seen yet. Entries pushed
/// before install are part of the first scan.
pub(crate) fn data_layer_event_interval(ctx: DetectorCtx, event_name: String) -> DetectorHandle {
    let data_layer = ctx.data_layer.clone();
    let task = tokio::spawn(async move {
        if let Some(delay) = ctx.delay {
            sleep(delay).await;
        }
        let mut seen = 0usize;
        loop {
            sleep(DATA_LAYER_POLL).await;
            let entries = ctx.data_layer.entries();
            for entry in &entries[seen..] {
                if entry.event == event_name {
                    (ctx.callback)();
                }
            }
            seen = entries.len();
        }
    });
    DetectorHandle::with_task(task, data_layer)
}

/// Fire once when the query parameter equals the expected value.
pub(crate) fn parameter_equals(ctx: DetectorCtx, key: String, value: String) -> DetectorHandle {
    ctx.poll_once(URL_POLL, move |page| {
        page.query_param(&key).as_deref() == Some(value.as_str())
    })
}

/// Fire once when every one of the strings appears in the current URL.
pub(crate) fn url_contains_all(ctx: DetectorCtx, strings: Vec<String>) -> DetectorHandle {
    ctx.poll_once(URL_POLL, move |page| {
        strings.iter().all(|s| page.url_contains(s))
    })
}

/// Single immediate check of the full URL.
pub(crate) fn url_exact_match(ctx: DetectorCtx, url: String) -> DetectorHandle {
    one_shot_check(ctx, move |page| page.url() == url)
}

/// Single immediate check of the pathname.
pub(crate) fn pathname_exact_match(ctx: DetectorCtx, pathname: String) -> DetectorHandle {
    one_shot_check(ctx, move |page| page.pathname() == pathname)
}

/// Fire on every mousedown whose target matches the selector.
pub(crate) fn element_mousedown(ctx: DetectorCtx, selector: String) -> DetectorHandle {
    ctx.listen(move |page, event| {
        event.event_type == "mousedown"
            && event.target.is_some_and(|t| page.matches(t, &selector))
    })
}

/// Fire on every event of the given type whose target matches the selector.
pub(crate) fn element_trigger_event(
    ctx: DetectorCtx,
    selector: String,
    trigger_event: String,
) -> DetectorHandle {
    ctx.listen(move |page, event| {
        event.event_type == trigger_event
            && event.target.is_some_and(|t| page.matches(t, &selector))
    })
}

/// Delegated variant: the target or any of its ancestors may match.
pub(crate) fn element_trigger_event_v2(
    ctx: DetectorCtx,
    selector: String,
    trigger_event: String,
) -> DetectorHandle {
    ctx.listen(move |page, event| {
        event.event_type == trigger_event
            && event
                .target
                .is_some_and(|t| page.closest(t, &selector).is_some())
    })
}

/// Fire on every window message whose payload contains the text.
pub(crate) fn javascript_message_contains_text(ctx: DetectorCtx, text: String) -> DetectorHandle {
    ctx.listen(move |_, event| {
        event.event_type == "message"
            && event.value.as_deref().is_some_and(|v| v.contains(&text))
    })
}

/// Fire immediately (or after the install delay).
pub(crate) fn page_view(ctx: DetectorCtx) -> DetectorHandle {
    match ctx.delay {
        None => {
            (ctx.callback)();
            DetectorHandle::inert(ctx.data_layer)
        }
        Some(delay) => {
            let data_layer = ctx.data_layer.clone();
            let task = tokio::spawn(async move {
                sleep(delay).await;
                (ctx.callback)();
            });
            DetectorHandle::with_task(task, data_layer)
        }
    }
}

/// Evaluate a condition exactly once, immediately or after the delay.
fn one_shot_check(
    ctx: DetectorCtx,
    check: impl Fn(&dyn Page) -> bool + Send + 'static,
) -> DetectorHandle {
    match ctx.delay {
        None => {
            if check(ctx.page.as_ref()) {
                (ctx.callback)();
            }
            DetectorHandle::inert(ctx.data_layer)
        }
        Some(delay) => {
            let data_layer = ctx.data_layer.clone();
            let task = tokio::spawn(async move {
                sleep(delay).await;
                if check(ctx.page.as_ref()) {
                    (ctx.callback)();
                }
            });
            DetectorHandle::with_task(task, data_layer)
        }
    }
}
