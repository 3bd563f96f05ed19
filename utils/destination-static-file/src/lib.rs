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

//! [`DestinationSource`] reading destinations from a JSON file.
//!
//! The file maps destination names to their settings:
//!
//! ```json
//! {
//!   "orders": {
//!     "connection": { "uri": "amqp://broker-a:5672" },
//!     "prefetch_count": 25,
//!     "requeue_on_fail": true
//!   }
//! }
//! ```
//!
//! The file is re-read on every observation, so editing it adds, removes or replaces
//! destinations on the next notifier poll. Entries that do not parse are logged and
//! skipped; an unreadable file fails the observation.

use async_trait::async_trait;
use mq_streamer::{DestinationConfig, DestinationSource, StreamerError};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct DestinationEntry {
    #[serde(default)]
    connection: BTreeMap<String, String>,
    #[serde(default)]
    prefetch_count: Option<u16>,
    #[serde(default)]
    requeue_on_fail: Option<bool>,
}

pub struct DestinationStaticFile {
    static_file: PathBuf,
}

impl DestinationStaticFile {
    pub fn new(static_file: impl Into<PathBuf>) -> Self {
        Self {
            static_file: static_file.into(),
        }
    }

    fn read_destinations(&self) -> Result<Vec<DestinationConfig>, StreamerError> {
        let data = fs::read_to_string(&self.static_file).map_err(|e| {
            StreamerError::source_unavailable(format!(
                "Unable to read destination file {}: {e}",
                self.static_file.display()
            ))
        })?;

        let parsed: Value = serde_json::from_str(&data).map_err(|e| {
            StreamerError::source_unavailable(format!("Unable to parse JSON: {e}"))
        })?;
        let Some(entries) = parsed.as_object() else {
            return Err(StreamerError::source_unavailable(
                "destination file must contain a JSON object keyed by destination name",
            ));
        };

        let mut destinations = Vec::with_capacity(entries.len());
        for (name, value) in entries {
            match DestinationEntry::deserialize(value) {
                Ok(entry) => {
                    debug!(destination = name.as_str(), "read destination entry");
                    destinations.push(DestinationConfig {
                        name: name.clone(),
                        connection: entry.connection,
                        prefetch_count: entry.prefetch_count,
                        requeue_on_fail: entry.requeue_on_fail,
                    });
                }
                Err(err) => {
                    warn!(
                        destination = name.as_str(),
                        err = %err,
                        "skipping destination entry that does not parse"
                    );
                }
            }
        }
        Ok(destinations)
    }
}

#[async_trait]
impl DestinationSource for DestinationStaticFile {
    async fn fetch_destinations(&self) -> Result<Vec<DestinationConfig>, StreamerError> {
        self.read_destinations()
    }
}
