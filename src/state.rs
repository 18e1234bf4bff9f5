use std::sync::Arc;

use crate::{clock::Clock, db::Store, notify::Notifier};

/// Shared handles passed to every request. Nothing here holds slot state;
/// the store is the single source of truth.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub clock: Arc<dyn Clock>,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    pub fn new(store: Store, clock: Arc<dyn Clock>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            clock,
            notifier,
        }
    }
}
