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

//! Destination change notification: observes a [`DestinationSource`] and turns the
//! differences between observations into listener callbacks.

use crate::collaborators::DestinationSource;
use crate::config::NotifierConfig;
use crate::control_plane::destination_registry::{
    DestinationChange, DestinationRegistry, RegistrySnapshot,
};
use crate::control_plane::partition::PartitionAssignment;
use crate::destination::DestinationConfig;
use crate::error::StreamerError;
use crate::observability::{events, fields::WorkerContext};
use crate::runtime::worker_runtime::{spawn_worker_loop, wait_for_shutdown, WorkerLoopHandle};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tracing::{debug, info, info_span, warn, Instrument, Span};

const NOTIFIER_THREAD_NAME_PREFIX: &str = "mq-notify-";
const COMPONENT: &str = "notifier";

/// Observer of destination additions and removals.
///
/// Implementations are invoked sequentially for many destinations during start-up, and
/// never concurrently by one notifier.
#[async_trait]
pub trait DestinationChangeListener: Send + Sync {
    async fn add_destination(&self, name: &str, config: Arc<DestinationConfig>);

    async fn remove_destination(&self, name: &str);
}

/// Contract of a destination change notifier.
#[async_trait]
pub trait DestinationNotifier: Send + Sync {
    /// Subscribes a listener. A listener registered after `start` first receives an
    /// addition for every destination already present.
    async fn register_listener(&self, listener: Arc<dyn DestinationChangeListener>);

    /// Restricts the notifier to the destinations owned by one task. Must precede `start`;
    /// repeating the current assignment afterwards is accepted.
    fn assign_partition(&self, assignment: PartitionAssignment) -> Result<(), StreamerError>;

    /// Performs the first observation, delivering its additions before returning, then
    /// keeps observing in the background.
    async fn start(&self) -> Result<(), StreamerError>;

    /// Halts observation. No callback is made after this returns.
    async fn stop(&self);
}

struct NotifierShared {
    source: Arc<dyn DestinationSource>,
    registry: DestinationRegistry,
    listeners: Mutex<Vec<Arc<dyn DestinationChangeListener>>>,
    partition: Mutex<Option<PartitionAssignment>>,
    // Serializes observation cycles and listener replays.
    dispatch_lock: AsyncMutex<()>,
    stopped: AtomicBool,
}

impl NotifierShared {
    fn listeners(&self) -> Vec<Arc<dyn DestinationChangeListener>> {
        match self.listeners.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn partition(&self) -> Option<PartitionAssignment> {
        match self.partition.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    async fn refresh(&self) -> Result<Vec<DestinationChange>, StreamerError> {
        let _dispatch = self.dispatch_lock.lock().await;
        if self.stopped.load(Ordering::SeqCst) {
            return Ok(Vec::new());
        }

        let fetched = match self.source.fetch_destinations().await {
            Ok(fetched) => fetched,
            Err(err) => {
                warn!(
                    event = events::NOTIFIER_FETCH_FAILED,
                    component = COMPONENT,
                    reason = err.reason(),
                    err = %err,
                    "unable to observe destination source; keeping current destinations"
                );
                return Err(err);
            }
        };

        let visible = match self.partition() {
            Some(assignment) => fetched
                .into_iter()
                .filter(|config| assignment.owns(&config.name))
                .collect(),
            None => fetched,
        };

        let changes = self.registry.apply(visible);
        let version = self.registry.snapshot().version();
        let listeners = self.listeners();

        for change in &changes {
            match change {
                DestinationChange::Added { name, config } => {
                    info!(
                        event = events::DESTINATION_ADDED,
                        component = COMPONENT,
                        destination = name.as_str(),
                        version,
                        "destination added"
                    );
                    for listener in &listeners {
                        listener.add_destination(name, config.clone()).await;
                    }
                }
                DestinationChange::Removed { name } => {
                    info!(
                        event = events::DESTINATION_REMOVED,
                        component = COMPONENT,
                        destination = name.as_str(),
                        version,
                        "destination removed"
                    );
                    for listener in &listeners {
                        listener.remove_destination(name).await;
                    }
                }
            }
        }

        Ok(changes)
    }
}

/// [`DestinationNotifier`] that polls a [`DestinationSource`] on a dedicated thread.
pub struct PollingDestinationNotifier {
    shared: Arc<NotifierShared>,
    poll_interval: Duration,
    started: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    worker: Mutex<Option<WorkerLoopHandle>>,
    span: Span,
}

impl PollingDestinationNotifier {
    pub fn new(source: Arc<dyn DestinationSource>, poll_interval: Duration) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            shared: Arc::new(NotifierShared {
                source,
                registry: DestinationRegistry::new(),
                listeners: Mutex::new(Vec::new()),
                partition: Mutex::new(None),
                dispatch_lock: AsyncMutex::new(()),
                stopped: AtomicBool::new(false),
            }),
            poll_interval,
            started: AtomicBool::new(false),
            shutdown_tx,
            worker: Mutex::new(None),
            span: info_span!("destination_notifier"),
        }
    }

    pub fn from_config(source: Arc<dyn DestinationSource>, config: &NotifierConfig) -> Self {
        Self::new(source, config.poll_interval())
    }

    /// Replaces the span every observation cycle is recorded under.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Runs one observation cycle now and returns the applied changes.
    pub async fn refresh(&self) -> Result<Vec<DestinationChange>, StreamerError> {
        self.shared.refresh().instrument(self.span.clone()).await
    }

    /// Current registry content.
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.shared.registry.snapshot()
    }

    fn take_worker(&self) -> Option<WorkerLoopHandle> {
        match self.worker.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    fn store_worker(&self, handle: WorkerLoopHandle) {
        match self.worker.lock() {
            Ok(mut guard) => *guard = Some(handle),
            Err(poisoned) => *poisoned.into_inner() = Some(handle),
        }
    }

    async fn poll_loop(
        worker_id: String,
        shared: Arc<NotifierShared>,
        poll_interval: Duration,
        shutdown_rx: watch::Receiver<bool>,
    ) {
        let worker_context = WorkerContext::with_current_thread(worker_id);
        debug!(
            event = events::NOTIFIER_START,
            component = COMPONENT,
            worker_id = worker_context.worker_id.as_str(),
            worker_thread = worker_context.worker_thread.as_str(),
            poll_interval_ms = poll_interval.as_millis() as u64,
            "notifier poll loop running"
        );

        loop {
            tokio::select! {
                _ = wait_for_shutdown(shutdown_rx.clone()) => break,
                _ = tokio::time::sleep(poll_interval) => {}
            }
            // Failures are logged by the cycle itself; the next tick retries.
            let _ = shared.refresh().await;
        }
    }
}

#[async_trait]
impl DestinationNotifier for PollingDestinationNotifier {
    async fn register_listener(&self, listener: Arc<dyn DestinationChangeListener>) {
        let _dispatch = self.shared.dispatch_lock.lock().await;

        if self.started.load(Ordering::SeqCst) && !self.shared.stopped.load(Ordering::SeqCst) {
            let snapshot = self.shared.registry.snapshot();
            for name in snapshot.names() {
                if let Some(config) = snapshot.get(&name) {
                    listener.add_destination(&name, config.clone()).await;
                }
            }
        }

        match self.shared.listeners.lock() {
            Ok(mut guard) => guard.push(listener),
            Err(poisoned) => poisoned.into_inner().push(listener),
        }
    }

    fn assign_partition(&self, assignment: PartitionAssignment) -> Result<(), StreamerError> {
        if self.started.load(Ordering::SeqCst) {
            if self.shared.partition() == Some(assignment) {
                return Ok(());
            }
            return Err(StreamerError::config(
                "partition must be assigned before the notifier starts",
            ));
        }

        match self.shared.partition.lock() {
            Ok(mut guard) => *guard = Some(assignment),
            Err(poisoned) => *poisoned.into_inner() = Some(assignment),
        }

        info!(
            parent: &self.span,
            event = events::NOTIFIER_PARTITION_ASSIGNED,
            component = COMPONENT,
            task_index = assignment.task_index(),
            total_tasks = assignment.total_tasks(),
            "partition assigned"
        );
        Ok(())
    }

    async fn start(&self) -> Result<(), StreamerError> {
        if self.shared.stopped.load(Ordering::SeqCst) {
            return Ok(());
        }
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(());
        }

        info!(
            parent: &self.span,
            event = events::NOTIFIER_START,
            component = COMPONENT,
            "starting destination notifier"
        );

        // An unreadable source at start-up leaves the registry empty; polling retries.
        let _ = self.refresh().await;

        let shared = self.shared.clone();
        let poll_interval = self.poll_interval;
        let shutdown_rx = self.shutdown_tx.subscribe();
        let span = self.span.clone();
        let handle = spawn_worker_loop(NOTIFIER_THREAD_NAME_PREFIX, move |worker_id| {
            Self::poll_loop(worker_id, shared, poll_interval, shutdown_rx).instrument(span)
        })?;
        self.store_worker(handle);
        Ok(())
    }

    async fn stop(&self) {
        if self.shared.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shutdown_tx.send_replace(true);

        // Waits out an observation cycle already in progress.
        drop(self.shared.dispatch_lock.lock().await);

        if let Some(worker) = self.take_worker() {
            worker.join().await;
        }

        info!(
            parent: &self.span,
            event = events::NOTIFIER_STOP,
            component = COMPONENT,
            "destination notifier stopped"
        );
    }
}
