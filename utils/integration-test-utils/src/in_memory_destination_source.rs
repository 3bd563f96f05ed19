/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

use async_trait::async_trait;
use mq_streamer::{DestinationConfig, DestinationSource, StreamerError};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Destination source whose contents tests edit directly.
#[derive(Default)]
pub struct InMemoryDestinationSource {
    destinations: Mutex<BTreeMap<String, DestinationConfig>>,
    unavailable: AtomicBool,
    fetches: AtomicUsize,
}

impl InMemoryDestinationSource {
    pub fn with_names(names: &[&str]) -> Self {
        let source = Self::default();
        for name in names {
            source.add(DestinationConfig::new(name));
        }
        source
    }

    /// Adds `destination`, replacing any entry with the same name.
    pub fn add(&self, destination: DestinationConfig) {
        self.entries().insert(destination.name.clone(), destination);
    }

    pub fn remove(&self, name: &str) {
        self.entries().remove(name);
    }

    /// Replaces the whole set.
    pub fn set(&self, destinations: Vec<DestinationConfig>) {
        let mut entries = self.entries();
        entries.clear();
        for destination in destinations {
            entries.insert(destination.name.clone(), destination);
        }
    }

    /// While unavailable every fetch fails.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, DestinationConfig>> {
        self.destinations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl DestinationSource for InMemoryDestinationSource {
    async fn fetch_destinations(&self) -> Result<Vec<DestinationConfig>, StreamerError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StreamerError::source_unavailable(
                "in-memory source marked unavailable",
            ));
        }
        Ok(self.entries().values().cloned().collect())
    }
}
