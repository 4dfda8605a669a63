//! "Preferences updated" signalling
//!
//! Writers commit preferences first and then publish one
//! [`PreferencesUpdated`] naming every namespace they touched. Subscribers
//! (the DSP engine bridge, the daemon's logger) reload only those modules.

use crate::prefs::Namespace;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tokio::sync::broadcast;
use tracing::debug;

/// Default channel capacity
const DEFAULT_CAPACITY: usize = 64;

/// Batch of namespaces whose preferences changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferencesUpdated {
    /// Changed namespaces, sorted and without duplicates
    pub namespaces: Vec<Namespace>,
}

impl PreferencesUpdated {
    pub fn new(namespaces: impl IntoIterator<Item = Namespace>) -> Self {
        let set: BTreeSet<Namespace> = namespaces.into_iter().collect();
        Self {
            namespaces: set.into_iter().collect(),
        }
    }

    pub fn contains(&self, namespace: Namespace) -> bool {
        self.namespaces.contains(&namespace)
    }
}

/// Broadcast channel for [`PreferencesUpdated`]
#[derive(Debug, Clone)]
pub struct PreferencesBus {
    tx: broadcast::Sender<PreferencesUpdated>,
}

impl PreferencesBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PreferencesUpdated> {
        self.tx.subscribe()
    }

    /// Publish one aggregated update
    ///
    /// Returns the number of subscribers that received it. An empty
    /// namespace set is not published.
    pub fn publish(&self, namespaces: impl IntoIterator<Item = Namespace>) -> usize {
        let event = PreferencesUpdated::new(namespaces);
        if event.namespaces.is_empty() {
            return 0;
        }

        debug!("Preferences updated: {:?}", event.namespaces);
        // No subscribers is fine: nothing needs reloading yet.
        self.tx.send(event).unwrap_or(0)
    }
}

impl Default for PreferencesBus {
    fn default() -> Self {
        Self::new()
    }
}
