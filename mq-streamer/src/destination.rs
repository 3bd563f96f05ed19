/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
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

use crate::error::StreamerError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

const PREFETCH_COUNT_KEY: &str = "prefetchCount";
// Historic spelling still found in deployed property files.
const PREFETCH_COUNT_LEGACY_KEY: &str = "prefectCount";
const REQUEUE_KEY: &str = "reQueue";
const ACK_MODE_KEY: &str = "ackMode";
const ACK_MODE_MANUAL: &str = "manual";

///
/// [`DestinationConfig`] describes one named queue/topic bound to a broker connection.
///
/// Configurations are immutable once built. A change to a destination is delivered as a
/// whole new configuration replacing the old one.
///
/// # Examples
///
/// ```
/// use mq_streamer::DestinationConfig;
///
/// let orders = DestinationConfig::new("orders")
///     .with_connection("uri", "amqp://broker-a:5672")
///     .with_prefetch_count(25);
///
/// assert_eq!(orders.name, "orders");
/// assert_eq!(orders.connection.get("uri").map(String::as_str), Some("amqp://broker-a:5672"));
/// ```
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DestinationConfig {
    pub name: String,
    #[serde(default)]
    pub connection: BTreeMap<String, String>,
    #[serde(default)]
    pub prefetch_count: Option<u16>,
    #[serde(default)]
    pub requeue_on_fail: Option<bool>,
}

impl DestinationConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            connection: BTreeMap::new(),
            prefetch_count: None,
            requeue_on_fail: None,
        }
    }

    pub fn with_connection(mut self, key: &str, value: &str) -> Self {
        self.connection.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_prefetch_count(mut self, prefetch_count: u16) -> Self {
        self.prefetch_count = Some(prefetch_count);
        self
    }

    pub fn with_requeue_on_fail(mut self, requeue_on_fail: bool) -> Self {
        self.requeue_on_fail = Some(requeue_on_fail);
        self
    }
}

/// Who acknowledges a delivery: the broker client at receive time, or the pipeline.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AckMode {
    #[default]
    Auto,
    Manual,
}

impl AckMode {
    pub fn is_manual(&self) -> bool {
        matches!(self, AckMode::Manual)
    }
}

/// Effective delivery settings handed to the broker client when a consumer opens.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct DeliveryOptions {
    pub prefetch_count: u16,
    pub requeue_on_fail: bool,
    pub ack_mode: AckMode,
}

impl DeliveryOptions {
    /// Parses the flat property map used by older deployments.
    ///
    /// Missing keys keep their defaults; `ackMode` selects manual acknowledgment only for the
    /// exact value `manual`.
    pub fn from_properties(properties: &HashMap<String, String>) -> Result<Self, StreamerError> {
        let mut options = DeliveryOptions::default();

        let prefetch = properties
            .get(PREFETCH_COUNT_KEY)
            .or_else(|| properties.get(PREFETCH_COUNT_LEGACY_KEY));
        if let Some(prefetch) = prefetch {
            options.prefetch_count = prefetch.trim().parse().map_err(|e| {
                StreamerError::config(format!("invalid prefetch count '{prefetch}': {e}"))
            })?;
        }

        if let Some(requeue) = properties.get(REQUEUE_KEY) {
            options.requeue_on_fail = requeue.trim().parse().map_err(|e| {
                StreamerError::config(format!("invalid reQueue flag '{requeue}': {e}"))
            })?;
        }

        if let Some(ack_mode) = properties.get(ACK_MODE_KEY) {
            if ack_mode == ACK_MODE_MANUAL {
                options.ack_mode = AckMode::Manual;
            }
        }

        Ok(options)
    }

    /// Applies the per-destination hints on top of the stage-wide defaults.
    pub fn for_destination(&self, destination: &DestinationConfig) -> Self {
        Self {
            prefetch_count: destination.prefetch_count.unwrap_or(self.prefetch_count),
            requeue_on_fail: destination.requeue_on_fail.unwrap_or(self.requeue_on_fail),
            ack_mode: self.ack_mode,
        }
    }
}
