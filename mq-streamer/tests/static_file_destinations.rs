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

use destination_static_file::DestinationStaticFile;
use integration_test_utils::{InMemoryBroker, JsonMessageBuilder, RecordingCollector};
use mq_streamer::{IngressStage, PollingDestinationNotifier, StreamerConfig};
use std::sync::Arc;

const DESTINATION_CONFIG: &str = "../utils/destination-static-file/static-configs/destinations.json";

#[tokio::test(flavor = "multi_thread")]
async fn bundled_destination_file_provisions_consumers() {
    integration_test_utils::init_logging();

    let config = StreamerConfig::from_json5_str(
        r#"{ delivery: { ack_mode: "manual", prefetch_count: 1 }, notifier: { poll_interval_ms: 60000 } }"#,
    )
    .unwrap();
    let broker = InMemoryBroker::new();
    let notifier = Arc::new(PollingDestinationNotifier::from_config(
        Arc::new(DestinationStaticFile::new(DESTINATION_CONFIG)),
        &config.notifier,
    ));
    let stage = IngressStage::new(
        "static-file-ingress",
        config,
        broker.clone(),
        notifier,
        Arc::new(JsonMessageBuilder),
        Arc::new(RecordingCollector::default()),
    )
    .unwrap();

    stage.open(None).await.unwrap();

    assert_eq!(stage.destinations().await, vec!["audit", "billing", "orders"]);
    // Per-destination hints override the stage-wide defaults.
    let orders = broker.receiver_options("orders").unwrap();
    assert_eq!(orders.prefetch_count, 25);
    assert!(orders.requeue_on_fail);
    assert_eq!(broker.receiver_options("audit").unwrap().prefetch_count, 100);
    assert_eq!(broker.receiver_options("billing").unwrap().prefetch_count, 1);

    stage.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn editing_the_file_changes_the_consumer_set() {
    integration_test_utils::init_logging();

    let path = std::env::temp_dir().join(format!(
        "mq-streamer-static-file-{}.json",
        std::process::id()
    ));
    std::fs::write(&path, r#"{ "orders": {} }"#).unwrap();

    let broker = InMemoryBroker::new();
    let notifier = Arc::new(PollingDestinationNotifier::new(
        Arc::new(DestinationStaticFile::new(&path)),
        std::time::Duration::from_secs(3600),
    ));
    let stage = IngressStage::new(
        "editable-ingress",
        StreamerConfig::default(),
        broker.clone(),
        notifier.clone(),
        Arc::new(JsonMessageBuilder),
        Arc::new(RecordingCollector::default()),
    )
    .unwrap();
    stage.open(None).await.unwrap();
    assert_eq!(stage.destinations().await, vec!["orders"]);

    std::fs::write(&path, r#"{ "billing": { "prefetch_count": 3 } }"#).unwrap();
    notifier.refresh().await.unwrap();
    assert_eq!(stage.destinations().await, vec!["billing"]);
    assert_eq!(broker.open_receivers("orders"), 0);
    assert_eq!(broker.receiver_options("billing").unwrap().prefetch_count, 3);

    // A broken file is an observation failure; the current set stays.
    std::fs::write(&path, "not json").unwrap();
    assert!(notifier.refresh().await.is_err());
    assert_eq!(stage.destinations().await, vec!["billing"]);

    stage.close().await;
    std::fs::remove_file(path).ok();
}
