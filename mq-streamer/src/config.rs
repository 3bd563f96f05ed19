/********************************************************************************
 * Copyright (c) 2025 Contributors to the Eclipse Foundation
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

use crate::destination::DeliveryOptions;
use crate::error::StreamerError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const DEFAULT_QUEUE_CAPACITY: usize = 1024;
const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;
const DEFAULT_IDLE_BACKOFF_MS: u64 = 10;
const DEFAULT_ERROR_BACKOFF_MS: u64 = 500;

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct StreamerConfig {
    pub ingress: IngressConfig,
    pub delivery: DeliveryOptions,
    pub notifier: NotifierConfig,
    pub consumer: ConsumerConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct IngressConfig {
    pub queue_capacity: usize,
    pub output_stream: Option<String>,
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            output_stream: None,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct NotifierConfig {
    pub poll_interval_ms: u64,
}

impl NotifierConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

/// Receive-loop pacing.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct ConsumerConfig {
    /// Pause after a receive returned nothing.
    pub idle_backoff_ms: u64,
    /// Pause after a receive failed.
    pub error_backoff_ms: u64,
}

impl ConsumerConfig {
    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            idle_backoff_ms: DEFAULT_IDLE_BACKOFF_MS,
            error_backoff_ms: DEFAULT_ERROR_BACKOFF_MS,
        }
    }
}

impl StreamerConfig {
    pub fn from_json5_str(contents: &str) -> Result<Self, StreamerError> {
        let config: StreamerConfig = json5::from_str(contents)
            .map_err(|e| StreamerError::config(format!("Unable to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, StreamerError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            StreamerError::config(format!(
                "Unable to read config file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json5_str(&contents)
    }

    pub fn validate(&self) -> Result<(), StreamerError> {
        if self.ingress.queue_capacity == 0 {
            return Err(StreamerError::config("ingress.queue_capacity must be > 0"));
        }
        if self.notifier.poll_interval_ms == 0 {
            return Err(StreamerError::config(
                "notifier.poll_interval_ms must be > 0",
            ));
        }
        Ok(())
    }
}
