//! Transaction dedup against the `mw_transaction` cookie.
//!
//! The fingerprint concatenates every item's identifying fields; a
//! transaction is a duplicate when the live cookie value contains that
//! fingerprint as a substring. Recording overwrites the cookie, so only
//! the most recent transaction is remembered, for five minutes.

use std::sync::Arc;
use std::time::Duration;

use tagwire_core::types::EcommerceData;
use tagwire_core::Page;

pub const TRANSACTION_COOKIE: &str = "mw_transaction";
pub const TRANSACTION_COOKIE_TTL: Duration = Duration::from_secs(5 * 60);

/// Item-level fingerprint of a transaction. Intentionally excludes the
/// transaction id: retried submissions get fresh ids but identical items.
pub fn fingerprint(data: &EcommerceData) -> String {
    data.items
        .iter()
        .map(|item| {
            format!(
                "{}{}{}{}{}",
                item.name, item.price, item.sku, item.category, item.quantity
            )
        })
        .collect()
}

pub struct DedupStore {
    page: Arc<dyn Page>,
}

impl DedupStore {
    pub fn new(page: Arc<dyn Page>) -> Self {
        Self { page }
    }

    pub fn is_duplicate(&self, data: &EcommerceData) -> bool {
        match self.page.cookie(TRANSACTION_COOKIE) {
            Some(value) => value.contains(&fingerprint(data)),
            None => false,
        }
    }

    pub fn record_seen(&self, data: &EcommerceData) {
        self.page
            .set_cookie(TRANSACTION_COOKIE, &fingerprint(data), TRANSACTION_COOKIE_TTL);
    }
}
