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

//! Runtime helper for spawning dedicated worker loops.

use crate::error::StreamerError;
use crate::observability::events;
use std::future::Future;
use std::sync::Mutex;
use std::thread;
use tokio::runtime::Builder;
use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

pub(crate) const DEFAULT_WORKER_THREAD_NAME: &str = "mq-worker";
const WORKER_THREAD_NAME_MAX_LEN: usize = 15;
const COMPONENT: &str = "worker_runtime";

/// Handle to a spawned worker thread.
pub(crate) struct WorkerLoopHandle {
    worker_id: String,
    worker_thread: String,
    join_handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl WorkerLoopHandle {
    /// Returns the unique worker identifier for correlation logs.
    pub(crate) fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Returns the worker thread label for diagnostics.
    pub(crate) fn worker_thread(&self) -> &str {
        &self.worker_thread
    }

    /// Waits for the worker thread to exit. Later calls return immediately.
    ///
    /// The loop must already have been signalled to stop. Joining from the worker thread
    /// itself is skipped.
    pub(crate) async fn join(&self) {
        let join_handle = match self.join_handle.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(join_handle) = join_handle else {
            return;
        };

        if join_handle.thread().id() == thread::current().id() {
            return;
        }

        let joined = tokio::task::spawn_blocking(move || join_handle.join()).await;
        match joined {
            Ok(Ok(())) => {
                debug!(
                    event = events::RUNTIME_JOIN_OK,
                    component = COMPONENT,
                    worker_id = self.worker_id.as_str(),
                    worker_thread = self.worker_thread.as_str(),
                    "worker thread joined"
                );
            }
            Ok(Err(_)) => {
                warn!(
                    event = events::RUNTIME_JOIN_FAILED,
                    component = COMPONENT,
                    worker_id = self.worker_id.as_str(),
                    worker_thread = self.worker_thread.as_str(),
                    reason = "worker_panicked",
                    "worker thread panicked"
                );
            }
            Err(err) => {
                warn!(
                    event = events::RUNTIME_JOIN_FAILED,
                    component = COMPONENT,
                    worker_id = self.worker_id.as_str(),
                    worker_thread = self.worker_thread.as_str(),
                    err = %err,
                    "unable to join worker thread"
                );
            }
        }
    }
}

/// Builds a Linux-safe thread name from a prefix and the hex digits of a worker id.
pub(crate) fn build_worker_thread_name(prefix: &str, worker_id: &str) -> String {
    let Some(suffix_len) = WORKER_THREAD_NAME_MAX_LEN.checked_sub(prefix.len()) else {
        return DEFAULT_WORKER_THREAD_NAME.to_string();
    };
    let suffix: String = worker_id
        .chars()
        .filter(|ch| ch.is_ascii_hexdigit())
        .take(suffix_len)
        .collect();

    if suffix_len > 0 && suffix.len() == suffix_len {
        format!("{prefix}{suffix}")
    } else {
        DEFAULT_WORKER_THREAD_NAME.to_string()
    }
}

/// Spawns `run_loop` on a dedicated thread driving its own current-thread runtime.
///
/// The closure receives the generated worker id.
pub(crate) fn spawn_worker_loop<F, Fut>(
    thread_name_prefix: &str,
    run_loop: F,
) -> Result<WorkerLoopHandle, StreamerError>
where
    F: FnOnce(String) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + 'static,
{
    let worker_id = Uuid::new_v4().hyphenated().to_string();
    let worker_thread = build_worker_thread_name(thread_name_prefix, &worker_id);

    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| {
            warn!(
                event = events::RUNTIME_SPAWN_FAILED,
                component = COMPONENT,
                worker_id = worker_id.as_str(),
                err = %e,
                "unable to build worker runtime"
            );
            StreamerError::Runtime(format!("unable to build worker runtime: {e}"))
        })?;

    let worker_id_for_loop = worker_id.clone();
    let join_handle = thread::Builder::new()
        .name(worker_thread.clone())
        .spawn(move || {
            runtime.block_on(run_loop(worker_id_for_loop));
        })
        .map_err(|e| {
            warn!(
                event = events::RUNTIME_SPAWN_FAILED,
                component = COMPONENT,
                worker_id = worker_id.as_str(),
                worker_thread = worker_thread.as_str(),
                err = %e,
                "unable to spawn worker thread"
            );
            StreamerError::Runtime(format!("unable to spawn worker thread: {e}"))
        })?;

    debug!(
        event = events::RUNTIME_SPAWN_OK,
        component = COMPONENT,
        worker_id = worker_id.as_str(),
        worker_thread = worker_thread.as_str(),
        "spawned worker thread"
    );

    Ok(WorkerLoopHandle {
        worker_id,
        worker_thread,
        join_handle: Mutex::new(Some(join_handle)),
    })
}

/// Resolves once `signal` carries `true` or its sender is gone.
pub(crate) async fn wait_for_shutdown(mut signal: watch::Receiver<bool>) {
    loop {
        if *signal.borrow_and_update() {
            return;
        }
        if signal.changed().await.is_err() {
            return;
        }
    }
}
