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

//! Canonical structured field keys and value-format helpers.

pub const EVENT: &str = "event";
pub const COMPONENT: &str = "component";
pub const WORKER_ID: &str = "worker_id";
pub const WORKER_THREAD: &str = "worker_thread";
pub const DESTINATION: &str = "destination";
pub const DELIVERY_ID: &str = "delivery_id";
pub const REASON: &str = "reason";
pub const ERR: &str = "err";

pub const NONE: &str = "none";
pub const REASON_SHUTDOWN: &str = "shutdown";
pub const REASON_QUEUE_CLOSED: &str = "queue_closed";
pub const REASON_BROKER_CLOSED: &str = "broker_closed";
pub const REASON_DESTINATION_GONE: &str = "destination_gone";
pub const DEFAULT_WORKER_THREAD: &str = "unknown-thread";

/// Identity of the worker thread an event was emitted from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WorkerContext {
    pub worker_id: String,
    pub worker_thread: String,
}

impl WorkerContext {
    pub fn with_current_thread(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            worker_thread: std::thread::current()
                .name()
                .unwrap_or(DEFAULT_WORKER_THREAD)
                .to_string(),
        }
    }
}
