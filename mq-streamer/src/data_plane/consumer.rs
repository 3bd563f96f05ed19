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

//! Per-destination consumer: one broker receive channel feeding the hand-off queue.

use crate::collaborators::{BrokerClient, BrokerReceiver};
use crate::config::ConsumerConfig;
use crate::data_plane::handoff_queue::HandoffQueue;
use crate::destination::{DeliveryOptions, DestinationConfig};
use crate::envelope::DeliveryId;
use crate::error::{BrokerError, StreamerError};
use crate::observability::{
    events,
    fields::{self, WorkerContext},
};
use crate::runtime::worker_runtime::{spawn_worker_loop, wait_for_shutdown, WorkerLoopHandle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn, Instrument, Span};

const RECEIVE_THREAD_NAME_PREFIX: &str = "mq-recv-";
const COMPONENT: &str = "consumer";

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ConsumerState {
    Created,
    Open,
    Running,
    Closed,
}

struct ConsumerInner {
    state: ConsumerState,
    receiver: Option<Arc<dyn BrokerReceiver>>,
    worker: Option<WorkerLoopHandle>,
}

/// Owns the receive channel and receive loop of one destination.
///
/// Every consumer gets a process-unique generation. Messages carry the generation of
/// the consumer that received them, so a replacement consumer under the same name never
/// settles deliveries that belong to the channel it replaced.
pub(crate) struct DestinationConsumer {
    config: Arc<DestinationConfig>,
    generation: u64,
    options: DeliveryOptions,
    client: Arc<dyn BrokerClient>,
    queue: Arc<HandoffQueue>,
    pacing: ConsumerConfig,
    inner: Mutex<ConsumerInner>,
    shutdown_tx: watch::Sender<bool>,
    span: Span,
}

impl DestinationConsumer {
    pub(crate) fn new(
        config: Arc<DestinationConfig>,
        options: DeliveryOptions,
        client: Arc<dyn BrokerClient>,
        queue: Arc<HandoffQueue>,
        pacing: ConsumerConfig,
        span: Span,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            config,
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
            options,
            client,
            queue,
            pacing,
            inner: Mutex::new(ConsumerInner {
                state: ConsumerState::Created,
                receiver: None,
                worker: None,
            }),
            shutdown_tx,
            span,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.config.name
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn options(&self) -> &DeliveryOptions {
        &self.options
    }

    pub(crate) fn state(&self) -> ConsumerState {
        self.with_inner(|inner| inner.state)
    }

    fn with_inner<R>(&self, f: impl FnOnce(&mut ConsumerInner) -> R) -> R {
        match self.inner.lock() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    /// Opens the broker channel and starts the receive loop on its own thread.
    pub(crate) async fn open_connection(&self) -> Result<(), StreamerError> {
        match self.state() {
            ConsumerState::Created => {}
            ConsumerState::Closed => {
                return Err(StreamerError::ConsumerClosed(self.name().to_string()))
            }
            ConsumerState::Open | ConsumerState::Running => return Ok(()),
        }

        let receiver = self
            .client
            .open_receiver(&self.config, &self.options)
            .await
            .map_err(|source| StreamerError::Provisioning {
                destination: self.name().to_string(),
                source,
            })?;
        self.with_inner(|inner| {
            inner.state = ConsumerState::Open;
            inner.receiver = Some(receiver.clone());
        });

        let name = self.name().to_string();
        let generation = self.generation;
        let queue = self.queue.clone();
        let pacing = self.pacing;
        let shutdown_rx = self.shutdown_tx.subscribe();
        let loop_receiver = receiver.clone();
        let span = self.span.clone();
        let spawned = spawn_worker_loop(RECEIVE_THREAD_NAME_PREFIX, move |worker_id| {
            receive_loop(
                worker_id,
                name,
                generation,
                loop_receiver,
                queue,
                pacing,
                shutdown_rx,
            )
            .instrument(span)
        });

        let worker = match spawned {
            Ok(worker) => worker,
            Err(err) => {
                self.with_inner(|inner| {
                    inner.state = ConsumerState::Closed;
                    inner.receiver = None;
                });
                let _ = receiver.close().await;
                return Err(err);
            }
        };

        info!(
            parent: &self.span,
            event = events::CONSUMER_OPEN_OK,
            component = COMPONENT,
            destination = self.name(),
            generation = self.generation,
            worker_id = worker.worker_id(),
            worker_thread = worker.worker_thread(),
            prefetch_count = self.options.prefetch_count,
            "consumer receiving"
        );
        self.with_inner(|inner| {
            inner.state = ConsumerState::Running;
            inner.worker = Some(worker);
        });
        Ok(())
    }

    fn live_receiver(&self) -> Result<Arc<dyn BrokerReceiver>, StreamerError> {
        self.with_inner(|inner| match (inner.state, inner.receiver.as_ref()) {
            (ConsumerState::Closed, _) | (_, None) => {
                Err(StreamerError::ConsumerClosed(self.config.name.clone()))
            }
            (_, Some(receiver)) => Ok(receiver.clone()),
        })
    }

    pub(crate) async fn ack_message(&self, delivery_id: &DeliveryId) -> Result<(), StreamerError> {
        let receiver = self.live_receiver()?;
        receiver.ack(delivery_id).await.map_err(StreamerError::from)
    }

    /// Negative-acknowledges a delivery, requeueing it when the destination asks for it.
    pub(crate) async fn fail_message(&self, delivery_id: &DeliveryId) -> Result<(), StreamerError> {
        let receiver = self.live_receiver()?;
        receiver
            .nack(delivery_id, self.options.requeue_on_fail)
            .await
            .map_err(StreamerError::from)
    }

    pub(crate) async fn dead_letter(&self, delivery_id: &DeliveryId) -> Result<(), StreamerError> {
        let receiver = self.live_receiver()?;
        receiver
            .dead_letter(delivery_id)
            .await
            .map_err(StreamerError::from)
    }

    /// Stops the receive loop, waits for its thread and closes the broker channel.
    pub(crate) async fn close(&self) {
        let (receiver, worker) = self.with_inner(|inner| {
            if inner.state == ConsumerState::Closed {
                return (None, None);
            }
            inner.state = ConsumerState::Closed;
            (inner.receiver.take(), inner.worker.take())
        });
        self.shutdown_tx.send_replace(true);

        if let Some(worker) = worker {
            worker.join().await;
        }

        if let Some(receiver) = receiver {
            if let Err(err) = receiver.close().await {
                warn!(
                    parent: &self.span,
                    event = events::CONSUMER_CLOSE_FAILED,
                    component = COMPONENT,
                    destination = self.name(),
                    err = %err,
                    "unable to close broker receive channel"
                );
            }
            info!(
                parent: &self.span,
                event = events::CONSUMER_CLOSE,
                component = COMPONENT,
                destination = self.name(),
                "consumer closed"
            );
        }
    }
}

async fn pause(shutdown_rx: &watch::Receiver<bool>, backoff: Duration) -> bool {
    tokio::select! {
        _ = wait_for_shutdown(shutdown_rx.clone()) => false,
        _ = tokio::time::sleep(backoff) => true,
    }
}

/// Moves messages from `receiver` into `queue` until shutdown, queue close or broker close.
async fn receive_loop(
    worker_id: String,
    destination: String,
    generation: u64,
    receiver: Arc<dyn BrokerReceiver>,
    queue: Arc<HandoffQueue>,
    pacing: ConsumerConfig,
    shutdown_rx: watch::Receiver<bool>,
) {
    let worker_context = WorkerContext::with_current_thread(worker_id);

    let reason = loop {
        let received = tokio::select! {
            _ = wait_for_shutdown(shutdown_rx.clone()) => break fields::REASON_SHUTDOWN,
            received = receiver.receive() => received,
        };

        match received {
            Ok(Some(mut message)) => {
                message.origin_destination = destination.clone();
                message.origin_generation = generation;
                debug!(
                    event = events::RECEIVE_OK,
                    component = COMPONENT,
                    worker_id = worker_context.worker_id.as_str(),
                    destination = destination.as_str(),
                    delivery_id = message.delivery_id.as_str(),
                    "received message"
                );

                let put = tokio::select! {
                    _ = wait_for_shutdown(shutdown_rx.clone()) => break fields::REASON_SHUTDOWN,
                    put = queue.put(message) => put,
                };
                if put.is_err() {
                    debug!(
                        event = events::HANDOFF_QUEUE_CLOSED,
                        component = COMPONENT,
                        worker_id = worker_context.worker_id.as_str(),
                        destination = destination.as_str(),
                        "hand-off queue closed"
                    );
                    break fields::REASON_QUEUE_CLOSED;
                }
            }
            Ok(None) => {
                if !pause(&shutdown_rx, pacing.idle_backoff()).await {
                    break fields::REASON_SHUTDOWN;
                }
            }
            Err(BrokerError::Closed) => break fields::REASON_BROKER_CLOSED,
            Err(err) => {
                warn!(
                    event = events::RECEIVE_FAILED,
                    component = COMPONENT,
                    worker_id = worker_context.worker_id.as_str(),
                    destination = destination.as_str(),
                    err = %err,
                    "receive failed; backing off"
                );
                if !pause(&shutdown_rx, pacing.error_backoff()).await {
                    break fields::REASON_SHUTDOWN;
                }
            }
        }
    };

    info!(
        event = events::RECEIVE_LOOP_EXIT,
        component = COMPONENT,
        worker_id = worker_context.worker_id.as_str(),
        worker_thread = worker_context.worker_thread.as_str(),
        destination = destination.as_str(),
        reason,
        "receive loop stopped"
    );
}
