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

//! Error taxonomy shared by stages, consumers, producers and collaborators.
//!
//! None of these errors is fatal to the process. The worst outcome is one
//! destination staying unavailable until it is re-added.

use thiserror::Error;

/// Failures reported by broker client collaborators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// The connection or channel could not be established.
    #[error("connection failed: {0}")]
    Connection(String),

    /// A broker operation (receive, ack, nack, dead-letter, send) failed.
    #[error("broker operation failed: {0}")]
    Operation(String),

    /// The channel is closed and will not produce or accept anything else.
    #[error("broker channel closed")]
    Closed,
}

/// Failures converting between broker payloads and pipeline records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    /// The builder produced no record (or an empty one).
    #[error("conversion produced an empty record")]
    Empty,

    /// The payload or record could not be converted.
    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// Failures picking an outgoing destination.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
    #[error("selector returned no destination")]
    NoDestination,

    #[error("no registered handle for destination '{0}'")]
    UnknownDestination(String),
}

/// Errors surfaced by the streamer core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamerError {
    /// Opening the broker channel for one destination failed.
    #[error("failed to provision destination '{destination}': {source}")]
    Provisioning {
        destination: String,
        #[source]
        source: BrokerError,
    },

    /// A message or record could not be converted.
    #[error("conversion failed for delivery '{delivery_id}' on '{destination}': {source}")]
    Conversion {
        destination: String,
        delivery_id: String,
        #[source]
        source: ConversionError,
    },

    #[error("routing failed: {0}")]
    Routing(#[from] RoutingError),

    /// An ack or fail arrived after its destination was torn down.
    #[error("destination '{destination}' for delivery '{delivery_id}' no longer exists")]
    AckRouting {
        destination: String,
        delivery_id: String,
    },

    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("configuration error: {0}")]
    Config(String),

    /// The destination source could not be read.
    #[error("destination source error: {0}")]
    Source(String),

    /// A worker thread or runtime could not be created.
    #[error("runtime error: {0}")]
    Runtime(String),

    #[error("consumer for destination '{0}' is closed")]
    ConsumerClosed(String),

    #[error("producer for destination '{0}' is closed")]
    ProducerClosed(String),

    #[error("stage is closed")]
    StageClosed,
}

impl StreamerError {
    pub fn config(message: impl Into<String>) -> Self {
        StreamerError::Config(message.into())
    }

    pub fn source_unavailable(message: impl Into<String>) -> Self {
        StreamerError::Source(message.into())
    }

    /// Stable short label used as the `reason` field in structured logs.
    pub fn reason(&self) -> &'static str {
        match self {
            StreamerError::Provisioning { .. } => "provisioning",
            StreamerError::Conversion { .. } => "conversion",
            StreamerError::Routing(_) => "routing",
            StreamerError::AckRouting { .. } => "ack_routing",
            StreamerError::Broker(_) => "broker",
            StreamerError::Config(_) => "config",
            StreamerError::Source(_) => "source",
            StreamerError::Runtime(_) => "runtime",
            StreamerError::ConsumerClosed(_) => "consumer_closed",
            StreamerError::ProducerClosed(_) => "producer_closed",
            StreamerError::StageClosed => "stage_closed",
        }
    }
}
