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

//! Ingress stage: consumes every live destination into one record stream and routes
//! acknowledgments back to the originating consumers.

use crate::collaborators::{BrokerClient, MessageBuilder, RecordCollector};
use crate::config::StreamerConfig;
use crate::control_plane::destination_table::DestinationTable;
use crate::control_plane::notifier::DestinationNotifier;
use crate::control_plane::partition::PartitionAssignment;
use crate::data_plane::consumer::DestinationConsumer;
use crate::data_plane::handoff_queue::HandoffQueue;
use crate::data_plane::provisioner::ConsumerProvisioner;
use crate::envelope::{DeliveryId, MessageEnvelope, Record};
use crate::error::{ConversionError, StreamerError};
use crate::observability::{events, fields};
use crate::tracking::in_flight::{live_handle, AckOutcome, InFlightResolution, InFlightTable};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument, Span};

const COMPONENT: &str = "ingress_stage";

#[derive(Clone, Copy)]
enum Settlement {
    Ack,
    Fail,
}

/// Source side of the streamer.
///
/// [`IngressStage::open`] subscribes a consumer provisioner to the notifier and starts it,
/// so every destination visible to this task gets a receive loop feeding one bounded
/// hand-off queue. The host drains that queue through [`IngressStage::next_batch`] when it
/// schedules the stage itself, or [`IngressStage::run_output_loop`] when the stage owns a
/// task. Both convert messages, emit records to the [`RecordCollector`], and in manual-ack
/// mode remember where each record came from so [`IngressStage::ack`] and
/// [`IngressStage::fail`] reach the right broker channel.
pub struct IngressStage {
    name: String,
    config: StreamerConfig,
    client: Arc<dyn BrokerClient>,
    notifier: Arc<dyn DestinationNotifier>,
    builder: Arc<dyn MessageBuilder>,
    collector: Arc<dyn RecordCollector>,
    queue: Arc<HandoffQueue>,
    consumers: Arc<DestinationTable<DestinationConsumer>>,
    in_flight: InFlightTable,
    opened: AtomicBool,
    closed: AtomicBool,
    span: Span,
}

impl IngressStage {
    pub fn new(
        name: &str,
        config: StreamerConfig,
        client: Arc<dyn BrokerClient>,
        notifier: Arc<dyn DestinationNotifier>,
        builder: Arc<dyn MessageBuilder>,
        collector: Arc<dyn RecordCollector>,
    ) -> Result<Self, StreamerError> {
        config.validate()?;

        Ok(Self {
            name: name.to_string(),
            queue: Arc::new(HandoffQueue::new(config.ingress.queue_capacity)),
            config,
            client,
            notifier,
            builder,
            collector,
            consumers: Arc::new(DestinationTable::new()),
            in_flight: InFlightTable::new(),
            opened: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            span: info_span!("ingress_stage", stage = name),
        })
    }

    /// Replaces the span all stage work, receive loops included, is recorded under.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Starts consuming. Destinations present at start-up are provisioned before this
    /// returns.
    pub async fn open(&self, partition: Option<PartitionAssignment>) -> Result<(), StreamerError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StreamerError::StageClosed);
        }
        if self.opened.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if let Some(partition) = partition {
            self.notifier.assign_partition(partition)?;
        }

        let provisioner = Arc::new(ConsumerProvisioner::new(
            self.client.clone(),
            self.queue.clone(),
            self.config.delivery,
            self.config.consumer,
            self.consumers.clone(),
            self.span.clone(),
        ));
        self.notifier
            .register_listener(provisioner)
            .instrument(self.span.clone())
            .await;
        self.notifier.start().instrument(self.span.clone()).await?;

        let destinations = self.consumers.len().await;
        info!(
            parent: &self.span,
            event = events::STAGE_OPEN,
            component = COMPONENT,
            queue_capacity = self.queue.capacity(),
            ack_mode = ?self.config.delivery.ack_mode,
            destinations,
            "ingress stage open"
        );
        Ok(())
    }

    /// Processes queued messages until the queue is empty, without waiting for more.
    ///
    /// Returns how many messages were processed.
    pub async fn next_batch(&self) -> Result<usize, StreamerError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StreamerError::StageClosed);
        }

        let mut processed = 0;
        while let Some(message) = self.queue.poll().await {
            self.process(message).instrument(self.span.clone()).await;
            processed += 1;
        }
        Ok(processed)
    }

    /// Processes messages as they arrive until the stage is closed.
    ///
    /// Returns how many messages were processed.
    pub async fn run_output_loop(&self) -> usize {
        let mut processed = 0;
        while let Some(message) = self.queue.take().await {
            self.process(message).instrument(self.span.clone()).await;
            processed += 1;
        }
        debug!(
            parent: &self.span,
            event = events::HANDOFF_QUEUE_CLOSED,
            component = COMPONENT,
            processed,
            "output loop stopped"
        );
        processed
    }

    async fn process(&self, message: MessageEnvelope) {
        let converted = match self.builder.deserialize(&message) {
            Ok(Some(record)) if !record.is_empty() => Ok(record),
            Ok(_) => Err(ConversionError::Empty),
            Err(err) => Err(err),
        };

        match converted {
            Ok(record) => self.emit(message, record).await,
            Err(source) => self.reject(message, source).await,
        }
    }

    async fn emit(&self, message: MessageEnvelope, record: Record) {
        if self.config.delivery.ack_mode.is_manual() {
            self.in_flight
                .track(
                    message.delivery_id.clone(),
                    &message.origin_destination,
                    message.origin_generation,
                )
                .await;
        }

        self.collector.emit(
            self.config.ingress.output_stream.as_deref(),
            record,
            message.delivery_id.as_str(),
        );

        debug!(
            event = events::RECORD_EMITTED,
            component = COMPONENT,
            destination = message.origin_destination.as_str(),
            delivery_id = message.delivery_id.as_str(),
            "record emitted"
        );
    }

    /// Reports a message that did not convert and dead-letters it at its origin.
    async fn reject(&self, message: MessageEnvelope, source: ConversionError) {
        let error = StreamerError::Conversion {
            destination: message.origin_destination.clone(),
            delivery_id: message.delivery_id.to_string(),
            source,
        };
        warn!(
            event = events::CONVERSION_FAILED,
            component = COMPONENT,
            destination = message.origin_destination.as_str(),
            delivery_id = message.delivery_id.as_str(),
            err = %error,
            "message did not convert; dead-lettering"
        );
        self.collector.report_error(&error);

        let consumer = live_handle(
            &self.consumers,
            &message.origin_destination,
            message.origin_generation,
        )
        .await;
        let Some(consumer) = consumer else {
            warn!(
                event = events::DEAD_LETTER_FAILED,
                component = COMPONENT,
                destination = message.origin_destination.as_str(),
                delivery_id = message.delivery_id.as_str(),
                reason = fields::REASON_DESTINATION_GONE,
                "origin consumer removed or replaced; dead-letter dropped"
            );
            return;
        };

        match consumer.dead_letter(&message.delivery_id).await {
            Ok(()) => debug!(
                event = events::DEAD_LETTER_OK,
                component = COMPONENT,
                destination = message.origin_destination.as_str(),
                delivery_id = message.delivery_id.as_str(),
                "message dead-lettered"
            ),
            Err(err) => warn!(
                event = events::DEAD_LETTER_FAILED,
                component = COMPONENT,
                destination = message.origin_destination.as_str(),
                delivery_id = message.delivery_id.as_str(),
                reason = err.reason(),
                err = %err,
                "dead-letter failed"
            ),
        }
    }

    /// Acknowledges the delivery behind `tracking_id` at its originating broker.
    pub async fn ack(&self, tracking_id: &str) -> AckOutcome {
        self.settle(tracking_id, Settlement::Ack)
            .instrument(self.span.clone())
            .await
    }

    /// Fails the delivery behind `tracking_id`; the broker requeues or drops it depending
    /// on the destination's requeue setting.
    pub async fn fail(&self, tracking_id: &str) -> AckOutcome {
        self.settle(tracking_id, Settlement::Fail)
            .instrument(self.span.clone())
            .await
    }

    async fn settle(&self, tracking_id: &str, settlement: Settlement) -> AckOutcome {
        if !self.config.delivery.ack_mode.is_manual() {
            return AckOutcome::AutoAck;
        }

        let delivery_id = DeliveryId::from(tracking_id);
        let (destination, consumer) =
            match self.in_flight.resolve(&delivery_id, &self.consumers).await {
                InFlightResolution::Untracked => {
                    debug!(
                        event = events::ACK_UNTRACKED,
                        component = COMPONENT,
                        delivery_id = tracking_id,
                        "delivery not in flight"
                    );
                    return AckOutcome::Untracked;
                }
                InFlightResolution::DestinationGone { destination } => {
                    return self.drop_settlement(destination, tracking_id);
                }
                InFlightResolution::Live {
                    destination,
                    handle,
                } => (destination, handle),
            };

        let (result, ok_event, failed_event) = match settlement {
            Settlement::Ack => (
                consumer.ack_message(&delivery_id).await,
                events::ACK_OK,
                events::ACK_FAILED,
            ),
            Settlement::Fail => (
                consumer.fail_message(&delivery_id).await,
                events::FAIL_OK,
                events::FAIL_FAILED,
            ),
        };

        match result {
            Ok(()) => {
                debug!(
                    event = ok_event,
                    component = COMPONENT,
                    destination = destination.as_str(),
                    delivery_id = tracking_id,
                    "settlement routed"
                );
                AckOutcome::Routed { destination }
            }
            // Removed between lookup and call.
            Err(StreamerError::ConsumerClosed(_)) => {
                self.drop_settlement(destination, tracking_id)
            }
            Err(error) => {
                warn!(
                    event = failed_event,
                    component = COMPONENT,
                    destination = destination.as_str(),
                    delivery_id = tracking_id,
                    reason = error.reason(),
                    err = %error,
                    "broker rejected settlement"
                );
                AckOutcome::BrokerRejected { destination, error }
            }
        }
    }

    fn drop_settlement(&self, destination: String, tracking_id: &str) -> AckOutcome {
        let error = StreamerError::AckRouting {
            destination: destination.clone(),
            delivery_id: tracking_id.to_string(),
        };
        warn!(
            event = events::ACK_ROUTING_DROPPED,
            component = COMPONENT,
            destination = destination.as_str(),
            delivery_id = tracking_id,
            reason = error.reason(),
            err = %error,
            "destination gone; settlement dropped"
        );
        AckOutcome::DestinationGone { destination }
    }

    /// Names of destinations with a live consumer, sorted.
    pub async fn destinations(&self) -> Vec<String> {
        self.consumers.names().await
    }

    pub async fn in_flight_count(&self) -> usize {
        self.in_flight.len().await
    }

    pub async fn is_in_flight(&self, tracking_id: &str) -> bool {
        self.in_flight.contains(&DeliveryId::from(tracking_id)).await
    }

    /// Messages waiting in the hand-off queue.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Stops the notifier, releases the output loop and closes every consumer.
    ///
    /// A notifier shared with an [`crate::EgressStage`] stops for both.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.notifier.stop().instrument(self.span.clone()).await;
        self.queue.close();
        for (_, consumer) in self.consumers.drain().await {
            consumer.close().await;
        }

        let in_flight = self.in_flight.len().await;
        info!(
            parent: &self.span,
            event = events::STAGE_CLOSE,
            component = COMPONENT,
            in_flight,
            "ingress stage closed"
        );
    }
}
