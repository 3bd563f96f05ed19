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

//! A broker living in process memory.
//!
//! Each destination owns one durable queue. Published messages wait in it until a
//! receiver takes them; taken messages stay unacknowledged until they are acked,
//! nacked or dead-lettered. A nack with requeue puts the message back at the front.

use async_trait::async_trait;
use mq_streamer::{
    BrokerClient, BrokerError, BrokerReceiver, BrokerSender, DeliveryId, DeliveryOptions,
    DestinationConfig, MessageEnvelope, OutboundMessage,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::debug;

const RECEIVE_WAIT: Duration = Duration::from_millis(20);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
struct DestinationQueue {
    pending: Mutex<VecDeque<MessageEnvelope>>,
    unacked: Mutex<HashMap<String, MessageEnvelope>>,
    acked: Mutex<Vec<String>>,
    nacked: Mutex<Vec<(String, bool)>>,
    dead_lettered: Mutex<Vec<String>>,
    sent: Mutex<Vec<OutboundMessage>>,
    arrivals: Notify,
    receivers_opened: AtomicUsize,
    receivers_closed: AtomicUsize,
    senders_opened: AtomicUsize,
    senders_closed: AtomicUsize,
    last_options: Mutex<Option<DeliveryOptions>>,
}

impl DestinationQueue {
    fn push(&self, envelope: MessageEnvelope) {
        lock(&self.pending).push_back(envelope);
        self.arrivals.notify_one();
    }

    fn pop(&self) -> Option<MessageEnvelope> {
        let next = lock(&self.pending).pop_front()?;
        lock(&self.unacked).insert(next.delivery_id.as_str().to_string(), next.clone());
        Some(next)
    }

    fn settle(&self, delivery_id: &DeliveryId) -> Result<MessageEnvelope, BrokerError> {
        lock(&self.unacked)
            .remove(delivery_id.as_str())
            .ok_or_else(|| {
                BrokerError::Operation(format!("unknown delivery '{}'", delivery_id.as_str()))
            })
    }
}

/// [`BrokerClient`] over in-memory destination queues.
#[derive(Default)]
pub struct InMemoryBroker {
    queues: Mutex<HashMap<String, Arc<DestinationQueue>>>,
    refused: Mutex<HashSet<String>>,
}

impl InMemoryBroker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn queue(&self, destination: &str) -> Arc<DestinationQueue> {
        lock(&self.queues)
            .entry(destination.to_string())
            .or_default()
            .clone()
    }

    /// Makes every later open for `destination` fail with a connection error.
    pub fn refuse(&self, destination: &str) {
        lock(&self.refused).insert(destination.to_string());
    }

    pub fn accept(&self, destination: &str) {
        lock(&self.refused).remove(destination);
    }

    fn is_refused(&self, destination: &str) -> bool {
        lock(&self.refused).contains(destination)
    }

    /// Enqueues a message on `destination`.
    pub fn publish(&self, destination: &str, delivery_id: &str, payload: &[u8]) {
        self.queue(destination)
            .push(MessageEnvelope::new(delivery_id, payload.to_vec()));
    }

    /// Messages waiting on `destination` that no receiver has taken yet.
    pub fn pending(&self, destination: &str) -> usize {
        lock(&self.queue(destination).pending).len()
    }

    /// Delivery ids taken by a receiver and not yet settled, sorted.
    pub fn unacked(&self, destination: &str) -> Vec<String> {
        let mut ids: Vec<String> = lock(&self.queue(destination).unacked)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    pub fn acked(&self, destination: &str) -> Vec<String> {
        lock(&self.queue(destination).acked).clone()
    }

    /// `(delivery id, requeue)` for every nack, in order.
    pub fn nacked(&self, destination: &str) -> Vec<(String, bool)> {
        lock(&self.queue(destination).nacked).clone()
    }

    pub fn dead_lettered(&self, destination: &str) -> Vec<String> {
        lock(&self.queue(destination).dead_lettered).clone()
    }

    pub fn sent(&self, destination: &str) -> Vec<OutboundMessage> {
        lock(&self.queue(destination).sent).clone()
    }

    /// Receivers opened on `destination` and not closed yet.
    pub fn open_receivers(&self, destination: &str) -> usize {
        let queue = self.queue(destination);
        queue.receivers_opened.load(Ordering::SeqCst)
            - queue.receivers_closed.load(Ordering::SeqCst)
    }

    pub fn receivers_opened(&self, destination: &str) -> usize {
        self.queue(destination)
            .receivers_opened
            .load(Ordering::SeqCst)
    }

    pub fn open_senders(&self, destination: &str) -> usize {
        let queue = self.queue(destination);
        queue.senders_opened.load(Ordering::SeqCst) - queue.senders_closed.load(Ordering::SeqCst)
    }

    /// Delivery options the most recent receiver on `destination` was opened with.
    pub fn receiver_options(&self, destination: &str) -> Option<DeliveryOptions> {
        *lock(&self.queue(destination).last_options)
    }
}

#[async_trait]
impl BrokerClient for InMemoryBroker {
    async fn open_receiver(
        &self,
        destination: &DestinationConfig,
        options: &DeliveryOptions,
    ) -> Result<Arc<dyn BrokerReceiver>, BrokerError> {
        if self.is_refused(&destination.name) {
            return Err(BrokerError::Connection(format!(
                "{} refused the connection",
                destination.name
            )));
        }
        let queue = self.queue(&destination.name);
        queue.receivers_opened.fetch_add(1, Ordering::SeqCst);
        *lock(&queue.last_options) = Some(*options);
        debug!(destination = destination.name.as_str(), "opened in-memory receiver");

        Ok(Arc::new(InMemoryReceiver {
            queue,
            closed: AtomicBool::new(false),
        }))
    }

    async fn open_sender(
        &self,
        destination: &DestinationConfig,
    ) -> Result<Arc<dyn BrokerSender>, BrokerError> {
        if self.is_refused(&destination.name) {
            return Err(BrokerError::Connection(format!(
                "{} refused the connection",
                destination.name
            )));
        }
        let queue = self.queue(&destination.name);
        queue.senders_opened.fetch_add(1, Ordering::SeqCst);
        debug!(destination = destination.name.as_str(), "opened in-memory sender");

        Ok(Arc::new(InMemorySender {
            queue,
            closed: AtomicBool::new(false),
        }))
    }
}

struct InMemoryReceiver {
    queue: Arc<DestinationQueue>,
    closed: AtomicBool,
}

impl InMemoryReceiver {
    fn ensure_open(&self) -> Result<(), BrokerError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BrokerError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl BrokerReceiver for InMemoryReceiver {
    async fn receive(&self) -> Result<Option<MessageEnvelope>, BrokerError> {
        self.ensure_open()?;
        if let Some(next) = self.queue.pop() {
            return Ok(Some(next));
        }
        let _ = tokio::time::timeout(RECEIVE_WAIT, self.queue.arrivals.notified()).await;
        self.ensure_open()?;
        Ok(self.queue.pop())
    }

    async fn ack(&self, delivery_id: &DeliveryId) -> Result<(), BrokerError> {
        self.ensure_open()?;
        self.queue.settle(delivery_id)?;
        lock(&self.queue.acked).push(delivery_id.as_str().to_string());
        Ok(())
    }

    async fn nack(&self, delivery_id: &DeliveryId, requeue: bool) -> Result<(), BrokerError> {
        self.ensure_open()?;
        let envelope = self.queue.settle(delivery_id)?;
        lock(&self.queue.nacked).push((delivery_id.as_str().to_string(), requeue));
        if requeue {
            lock(&self.queue.pending).push_front(envelope);
            self.queue.arrivals.notify_one();
        }
        Ok(())
    }

    async fn dead_letter(&self, delivery_id: &DeliveryId) -> Result<(), BrokerError> {
        self.ensure_open()?;
        self.queue.settle(delivery_id)?;
        lock(&self.queue.dead_lettered).push(delivery_id.as_str().to_string());
        Ok(())
    }

    async fn close(&self) -> Result<(), BrokerError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.queue.receivers_closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

struct InMemorySender {
    queue: Arc<DestinationQueue>,
    closed: AtomicBool,
}

#[async_trait]
impl BrokerSender for InMemorySender {
    async fn send(&self, message: OutboundMessage) -> Result<(), BrokerError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BrokerError::Closed);
        }
        lock(&self.queue.sent).push(message);
        Ok(())
    }

    async fn close(&self) -> Result<(), BrokerError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.queue.senders_closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
