//! Destination registry: the authority on which destinations exist at any instant.

use crate::destination::DestinationConfig;
use crate::observability::events;
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

const COMPONENT: &str = "destination_registry";

/// One transition produced by applying a new destination set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DestinationChange {
    Added {
        name: String,
        config: Arc<DestinationConfig>,
    },
    Removed {
        name: String,
    },
}

impl DestinationChange {
    pub fn name(&self) -> &str {
        match self {
            DestinationChange::Added { name, .. } | DestinationChange::Removed { name } => name,
        }
    }
}

/// Immutable view of the registry at one version.
#[derive(Debug, Default)]
pub struct RegistrySnapshot {
    version: u64,
    destinations: HashMap<String, Arc<DestinationConfig>>,
}

impl RegistrySnapshot {
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn get(&self, name: &str) -> Option<&Arc<DestinationConfig>> {
        self.destinations.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.destinations.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.destinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }

    /// Destination names in sorted order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.destinations.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Versioned name -> configuration map.
///
/// Only the owning notifier calls [`DestinationRegistry::apply`]. Readers load a snapshot
/// and never observe a half-applied update.
pub(crate) struct DestinationRegistry {
    snapshot: ArcSwap<RegistrySnapshot>,
}

impl DestinationRegistry {
    pub(crate) fn new() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(RegistrySnapshot::default()),
        }
    }

    pub(crate) fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.snapshot.load_full()
    }

    /// Replaces the registry content with `next` and returns the transitions.
    ///
    /// Removals come first (sorted by name), then additions. A changed configuration shows
    /// up as a removal followed by an addition of the same name. Later duplicates of one
    /// name in `next` win.
    pub(crate) fn apply(&self, next: Vec<DestinationConfig>) -> Vec<DestinationChange> {
        let current = self.snapshot.load_full();

        let mut next_destinations: HashMap<String, Arc<DestinationConfig>> = HashMap::new();
        for config in next {
            next_destinations.insert(config.name.clone(), Arc::new(config));
        }

        let mut removed: Vec<String> = current
            .destinations
            .iter()
            .filter(|(name, config)| match next_destinations.get(*name) {
                Some(next_config) => next_config != *config,
                None => true,
            })
            .map(|(name, _)| name.clone())
            .collect();
        removed.sort();

        let mut added: Vec<(String, Arc<DestinationConfig>)> = next_destinations
            .iter()
            .filter(|(name, config)| match current.destinations.get(*name) {
                Some(current_config) => current_config != *config,
                None => true,
            })
            .map(|(name, config)| (name.clone(), config.clone()))
            .collect();
        added.sort_by(|a, b| a.0.cmp(&b.0));

        if removed.is_empty() && added.is_empty() {
            return Vec::new();
        }

        let version = current.version + 1;
        self.snapshot.store(Arc::new(RegistrySnapshot {
            version,
            destinations: next_destinations,
        }));

        debug!(
            event = events::REGISTRY_SNAPSHOT_APPLIED,
            component = COMPONENT,
            version,
            added = added.len(),
            removed = removed.len(),
            "applied destination snapshot"
        );

        removed
            .into_iter()
            .map(|name| DestinationChange::Removed { name })
            .chain(
                added
                    .into_iter()
                    .map(|(name, config)| DestinationChange::Added { name, config }),
            )
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{DestinationChange, DestinationRegistry};
    use crate::destination::DestinationConfig;

    fn names(changes: &[DestinationChange]) -> Vec<String> {
        changes
            .iter()
            .map(|change| match change {
                DestinationChange::Added { name, .. } => format!("+{name}"),
                DestinationChange::Removed { name } => format!("-{name}"),
            })
            .collect()
    }

    #[test]
    fn apply_reports_additions_and_removals() {
        let registry = DestinationRegistry::new();

        let changes = registry.apply(vec![
            DestinationConfig::new("orders"),
            DestinationConfig::new("billing"),
        ]);
        assert_eq!(names(&changes), vec!["+billing", "+orders"]);
        assert_eq!(registry.snapshot().version(), 1);

        let changes = registry.apply(vec![
            DestinationConfig::new("orders"),
            DestinationConfig::new("audit"),
        ]);
        assert_eq!(names(&changes), vec!["-billing", "+audit"]);
        assert_eq!(registry.snapshot().names(), vec!["audit", "orders"]);
    }

    #[test]
    fn apply_replaces_changed_configuration_wholesale() {
        let registry = DestinationRegistry::new();
        registry.apply(vec![DestinationConfig::new("orders").with_prefetch_count(1)]);

        let changes = registry.apply(vec![DestinationConfig::new("orders").with_prefetch_count(5)]);

        assert_eq!(names(&changes), vec!["-orders", "+orders"]);
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.get("orders").unwrap().prefetch_count, Some(5));
    }

    #[test]
    fn apply_without_changes_keeps_version() {
        let registry = DestinationRegistry::new();
        registry.apply(vec![DestinationConfig::new("orders")]);

        let changes = registry.apply(vec![DestinationConfig::new("orders")]);

        assert!(changes.is_empty());
        assert_eq!(registry.snapshot().version(), 1);
    }
}
