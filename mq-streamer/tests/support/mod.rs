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

use integration_test_utils::{
    InMemoryBroker, InMemoryDestinationSource, JsonMessageBuilder, RecordingCollector,
};
use mq_streamer::{IngressStage, PollingDestinationNotifier, StreamerConfig};
use std::sync::Arc;
use std::time::Duration;

#[allow(dead_code)]
pub(crate) const FAST_POLL: Duration = Duration::from_millis(20);
pub(crate) const NO_POLL: Duration = Duration::from_secs(3600);

pub(crate) fn manual_config(queue_capacity: usize) -> StreamerConfig {
    StreamerConfig::from_json5_str(&format!(
        r#"{{
            ingress: {{ queue_capacity: {queue_capacity}, output_stream: "records" }},
            delivery: {{ ack_mode: "manual", prefetch_count: 10 }},
            consumer: {{ idle_backoff_ms: 2, error_backoff_ms: 20 }},
        }}"#
    ))
    .expect("test config should parse")
}

#[allow(dead_code)]
pub(crate) fn auto_config() -> StreamerConfig {
    let mut config = manual_config(64);
    config.delivery.ack_mode = Default::default();
    config
}

#[allow(dead_code)]
pub(crate) struct IngressHarness {
    pub(crate) broker: Arc<InMemoryBroker>,
    pub(crate) source: Arc<InMemoryDestinationSource>,
    pub(crate) notifier: Arc<PollingDestinationNotifier>,
    pub(crate) collector: Arc<RecordingCollector>,
    pub(crate) stage: IngressStage,
}

pub(crate) fn make_ingress(
    name: &str,
    config: StreamerConfig,
    destinations: &[&str],
    poll_interval: Duration,
) -> IngressHarness {
    let broker = InMemoryBroker::new();
    let source = Arc::new(InMemoryDestinationSource::with_names(destinations));
    let notifier = Arc::new(PollingDestinationNotifier::new(
        source.clone(),
        poll_interval,
    ));
    let collector = Arc::new(RecordingCollector::default());
    let stage = IngressStage::new(
        name,
        config,
        broker.clone(),
        notifier.clone(),
        Arc::new(JsonMessageBuilder),
        collector.clone(),
    )
    .expect("ingress stage creation should succeed");

    IngressHarness {
        broker,
        source,
        notifier,
        collector,
        stage,
    }
}

/// Drains the stage until `expected` records were emitted.
#[allow(dead_code)]
pub(crate) async fn drain_until(harness: &IngressHarness, expected: usize) {
    let collector = harness.collector.clone();
    for _ in 0..2_000 {
        harness
            .stage
            .next_batch()
            .await
            .expect("stage should be open while draining");
        if collector.emitted_count() + collector.errors().len() >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!(
        "expected {expected} processed messages, saw {} emitted and {} errors",
        collector.emitted_count(),
        collector.errors().len()
    );
}
