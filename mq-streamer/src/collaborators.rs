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

//! Seams to the outside world: broker clients, codecs, selectors and the host pipeline.
//!
//! The streamer owns lifecycle, queuing and ack routing. Everything broker or schema
//! specific is reached through these traits.

use crate::destination::{DeliveryOptions, DestinationConfig};
use crate::envelope::{DeliveryId, MessageEnvelope, OutboundMessage, Record};
use crate::error::{BrokerError, ConversionError, StreamerError};
use async_trait::async_trait;
use std::sync::Arc;

/// Factory for broker channels of one broker technology.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Opens a receive channel bound to `destination`.
    async fn open_receiver(
        &self,
        destination: &DestinationConfig,
        options: &DeliveryOptions,
    ) -> Result<Arc<dyn BrokerReceiver>, BrokerError>;

    /// Opens a send channel bound to `destination`.
    async fn open_sender(
        &self,
        destination: &DestinationConfig,
    ) -> Result<Arc<dyn BrokerSender>, BrokerError>;
}

/// An open receive channel.
///
/// `receive` must resolve to a message, an empty result, or an error in bounded time.
/// It is cancelled (dropped) when the owning consumer closes.
#[async_trait]
pub trait BrokerReceiver: Send + Sync {
    async fn receive(&self) -> Result<Option<MessageEnvelope>, BrokerError>;

    async fn ack(&self, delivery_id: &DeliveryId) -> Result<(), BrokerError>;

    async fn nack(&self, delivery_id: &DeliveryId, requeue: bool) -> Result<(), BrokerError>;

    async fn dead_letter(&self, delivery_id: &DeliveryId) -> Result<(), BrokerError>;

    async fn close(&self) -> Result<(), BrokerError>;
}

/// An open send channel.
#[async_trait]
pub trait BrokerSender: Send + Sync {
    async fn send(&self, message: OutboundMessage) -> Result<(), BrokerError>;

    async fn close(&self) -> Result<(), BrokerError>;
}

/// The open send channel of one destination, handed to [`MessageBuilder::serialize`].
///
/// Only exists while the producer is open; builders that need broker-native message
/// construction reach the channel through [`ProducerSession::sender`].
#[derive(Clone)]
pub struct ProducerSession {
    destination: Arc<DestinationConfig>,
    sender: Arc<dyn BrokerSender>,
}

impl ProducerSession {
    pub fn new(destination: Arc<DestinationConfig>, sender: Arc<dyn BrokerSender>) -> Self {
        Self {
            destination,
            sender,
        }
    }

    pub fn destination(&self) -> &DestinationConfig {
        &self.destination
    }

    pub fn sender(&self) -> &Arc<dyn BrokerSender> {
        &self.sender
    }
}

impl std::fmt::Debug for ProducerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProducerSession")
            .field("destination", &self.destination.name)
            .finish_non_exhaustive()
    }
}

/// Converts between broker payloads and pipeline records.
pub trait MessageBuilder: Send + Sync {
    fn serialize(
        &self,
        record: &Record,
        session: &ProducerSession,
    ) -> Result<OutboundMessage, ConversionError>;

    /// `Ok(None)` means the payload carried no record.
    fn deserialize(&self, envelope: &MessageEnvelope) -> Result<Option<Record>, ConversionError>;
}

/// Picks the outgoing destination for a record.
pub trait DestinationSelector: Send + Sync {
    fn select(&self, record: &Record) -> Option<String>;
}

/// Receives records emitted by the ingress stage.
pub trait RecordCollector: Send + Sync {
    fn emit(&self, stream: Option<&str>, record: Record, tracking_id: &str);

    /// Surfaces a processing error to the host pipeline.
    fn report_error(&self, error: &StreamerError);
}

/// External configuration source observed by the change notifier.
#[async_trait]
pub trait DestinationSource: Send + Sync {
    /// Returns the complete current set of destinations.
    async fn fetch_destinations(&self) -> Result<Vec<DestinationConfig>, StreamerError>;
}
