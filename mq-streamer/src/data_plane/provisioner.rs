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

//! Listeners that keep the consumer and producer tables in step with the registry.

use crate::collaborators::BrokerClient;
use crate::config::ConsumerConfig;
use crate::control_plane::destination_table::DestinationTable;
use crate::control_plane::notifier::DestinationChangeListener;
use crate::data_plane::consumer::DestinationConsumer;
use crate::data_plane::handoff_queue::HandoffQueue;
use crate::data_plane::producer::DestinationProducer;
use crate::destination::{DeliveryOptions, DestinationConfig};
use crate::observability::events;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn, Span};

/// Opens a consumer per added destination and closes it on removal.
///
/// A destination whose channel cannot be opened is logged and skipped; the others are
/// unaffected.
pub(crate) struct ConsumerProvisioner {
    client: Arc<dyn BrokerClient>,
    queue: Arc<HandoffQueue>,
    defaults: DeliveryOptions,
    pacing: ConsumerConfig,
    consumers: Arc<DestinationTable<DestinationConsumer>>,
    span: Span,
}

impl ConsumerProvisioner {
    pub(crate) fn new(
        client: Arc<dyn BrokerClient>,
        queue: Arc<HandoffQueue>,
        defaults: DeliveryOptions,
        pacing: ConsumerConfig,
        consumers: Arc<DestinationTable<DestinationConsumer>>,
        span: Span,
    ) -> Self {
        Self {
            client,
            queue,
            defaults,
            pacing,
            consumers,
            span,
        }
    }
}

#[async_trait]
impl DestinationChangeListener for ConsumerProvisioner {
    async fn add_destination(&self, name: &str, config: Arc<DestinationConfig>) {
        if let Some(previous) = self.consumers.remove(name).await {
            info!(
                parent: &self.span,
                event = events::CONSUMER_REPLACED,
                component = "consumer_provisioner",
                destination = name,
                "closing previous consumer before re-adding destination"
            );
            previous.close().await;
        }

        let options = self.defaults.for_destination(&config);
        let consumer = Arc::new(DestinationConsumer::new(
            config,
            options,
            self.client.clone(),
            self.queue.clone(),
            self.pacing,
            self.span.clone(),
        ));

        match consumer.open_connection().await {
            Ok(()) => {
                self.consumers.insert(name, consumer).await;
            }
            Err(err) => {
                warn!(
                    parent: &self.span,
                    event = events::CONSUMER_OPEN_FAILED,
                    component = "consumer_provisioner",
                    destination = name,
                    reason = err.reason(),
                    err = %err,
                    "unable to open consumer; skipping destination"
                );
            }
        }
    }

    async fn remove_destination(&self, name: &str) {
        if let Some(consumer) = self.consumers.remove(name).await {
            consumer.close().await;
        }
    }
}

/// Opens a producer per added destination and closes it on removal.
pub(crate) struct ProducerProvisioner {
    client: Arc<dyn BrokerClient>,
    producers: Arc<DestinationTable<DestinationProducer>>,
    span: Span,
}

impl ProducerProvisioner {
    pub(crate) fn new(
        client: Arc<dyn BrokerClient>,
        producers: Arc<DestinationTable<DestinationProducer>>,
        span: Span,
    ) -> Self {
        Self {
            client,
            producers,
            span,
        }
    }
}

#[async_trait]
impl DestinationChangeListener for ProducerProvisioner {
    async fn add_destination(&self, name: &str, config: Arc<DestinationConfig>) {
        if let Some(previous) = self.producers.remove(name).await {
            info!(
                parent: &self.span,
                event = events::PRODUCER_REPLACED,
                component = "producer_provisioner",
                destination = name,
                "closing previous producer before re-adding destination"
            );
            previous.close().await;
        }

        let producer = Arc::new(DestinationProducer::new(
            config,
            self.client.clone(),
            self.span.clone(),
        ));

        match producer.open().await {
            Ok(()) => {
                self.producers.insert(name, producer).await;
            }
            Err(err) => {
                warn!(
                    parent: &self.span,
                    event = events::PRODUCER_OPEN_FAILED,
                    component = "producer_provisioner",
                    destination = name,
                    reason = err.reason(),
                    err = %err,
                    "unable to open producer; skipping destination"
                );
            }
        }
    }

    async fn remove_destination(&self, name: &str) {
        if let Some(producer) = self.producers.remove(name).await {
            producer.close().await;
        }
    }
}
