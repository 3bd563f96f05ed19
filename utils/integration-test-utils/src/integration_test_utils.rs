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

use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

const EVENTUALLY_TIMEOUT: Duration = Duration::from_secs(5);
const EVENTUALLY_STEP: Duration = Duration::from_millis(5);

/// Installs a test-friendly `tracing` subscriber once per process. `RUST_LOG` overrides
/// the default `info` filter.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Polls `condition` until it holds, panicking after a few seconds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + EVENTUALLY_TIMEOUT;
    while !condition() {
        if Instant::now() > deadline {
            panic!("condition not met within {EVENTUALLY_TIMEOUT:?}");
        }
        tokio::time::sleep(EVENTUALLY_STEP).await;
    }
}

/// Asserts numeric tracking ids arrived in strictly increasing order.
pub fn check_tracking_ids_in_order(tracking_ids: &[String]) {
    let parsed: Vec<u64> = tracking_ids
        .iter()
        .map(|id| {
            id.parse()
                .unwrap_or_else(|_| panic!("tracking id '{id}' is not numeric"))
        })
        .collect();

    for pair in parsed.windows(2) {
        if pair[0] >= pair[1] {
            panic!(
                "tracking ids out of order: {} arrived before {} in {tracking_ids:?}",
                pair[0], pair[1]
            );
        }
    }
}
