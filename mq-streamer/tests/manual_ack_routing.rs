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

mod support;

use integration_test_utils::check_tracking_ids_in_order;
use mq_streamer::{AckMode, AckOutcome, DestinationConfig};
use serde_json::json;

#[tokio::test(flavor = "multi_thread")]
async fn acks_and_fails_reach_the_originating_destination() {
    integration_test_utils::init_logging();

    let harness = support::make_ingress(
        "orders-ingress",
        support::manual_config(64),
        &["orders"],
        support::NO_POLL,
    );
    harness
        .source
        .add(DestinationConfig::new("billing").with_requeue_on_fail(true));

    harness.broker.publish("orders", "1", br#"["m1", "orders"]"#);
    harness.broker.publish("orders", "2", br#"["m2", "orders"]"#);
    harness.broker.publish("orders", "3", br#"["m3", "orders"]"#);
    harness.broker.publish("billing", "b1", br#"["i1", "billing"]"#);

    harness.stage.open(None).await.unwrap();
    assert_eq!(harness.stage.destinations().await, vec!["billing", "orders"]);

    let orders_options = harness.broker.receiver_options("orders").unwrap();
    assert_eq!(orders_options.ack_mode, AckMode::Manual);
    assert_eq!(orders_options.prefetch_count, 10);
    assert!(!orders_options.requeue_on_fail);
    assert!(harness.broker.receiver_options("billing").unwrap().requeue_on_fail);

    support::drain_until(&harness, 4).await;

    let emitted = harness.collector.emitted();
    assert!(emitted
        .iter()
        .all(|record| record.stream.as_deref() == Some("records")));
    let orders_ids: Vec<String> = emitted
        .iter()
        .filter(|record| record.record.fields[1] == json!("orders"))
        .map(|record| record.tracking_id.clone())
        .collect();
    assert_eq!(orders_ids, vec!["1", "2", "3"]);
    check_tracking_ids_in_order(&orders_ids);
    assert_eq!(harness.stage.in_flight_count().await, 4);

    assert_eq!(
        harness.stage.ack("1").await,
        AckOutcome::Routed {
            destination: "orders".to_string()
        }
    );
    assert!(harness.stage.fail("2").await.is_routed());
    assert!(harness.stage.ack("3").await.is_routed());

    assert_eq!(harness.broker.acked("orders"), vec!["1", "3"]);
    assert_eq!(
        harness.broker.nacked("orders"),
        vec![("2".to_string(), false)]
    );
    assert!(harness.broker.acked("billing").is_empty());

    // Settled once; a second settlement has nothing to route.
    assert_eq!(harness.stage.ack("2").await, AckOutcome::Untracked);
    assert_eq!(harness.stage.ack("never-seen").await, AckOutcome::Untracked);

    harness.stage.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_deliveries_with_requeue_come_back() {
    integration_test_utils::init_logging();

    let harness = support::make_ingress(
        "requeue-ingress",
        support::manual_config(64),
        &[],
        support::NO_POLL,
    );
    harness
        .source
        .add(DestinationConfig::new("billing").with_requeue_on_fail(true));
    harness.broker.publish("billing", "41", br#"["invoice", "billing"]"#);

    harness.stage.open(None).await.unwrap();
    support::drain_until(&harness, 1).await;

    assert!(harness.stage.fail("41").await.is_routed());
    assert_eq!(
        harness.broker.nacked("billing"),
        vec![("41".to_string(), true)]
    );

    support::drain_until(&harness, 2).await;
    assert_eq!(harness.collector.tracking_ids(), vec!["41", "41"]);
    assert!(harness.stage.is_in_flight("41").await);

    assert!(harness.stage.ack("41").await.is_routed());
    assert_eq!(harness.broker.acked("billing"), vec!["41"]);

    harness.stage.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn unconvertible_messages_are_dead_lettered() {
    integration_test_utils::init_logging();

    let harness = support::make_ingress(
        "conversion-ingress",
        support::manual_config(64),
        &["orders"],
        support::NO_POLL,
    );
    harness.broker.publish("orders", "1", b"{not json");
    harness.broker.publish("orders", "2", b"");
    harness.broker.publish("orders", "3", b"[]");
    harness.broker.publish("orders", "4", br#"["ok", "orders"]"#);

    harness.stage.open(None).await.unwrap();
    support::drain_until(&harness, 4).await;

    assert_eq!(harness.collector.tracking_ids(), vec!["4"]);
    let reasons: Vec<&str> = harness
        .collector
        .errors()
        .iter()
        .map(|error| error.reason())
        .collect();
    assert_eq!(reasons, vec!["conversion", "conversion", "conversion"]);

    assert_eq!(harness.broker.dead_lettered("orders"), vec!["1", "2", "3"]);
    assert!(!harness.stage.is_in_flight("1").await);
    assert_eq!(harness.stage.in_flight_count().await, 1);
    assert_eq!(harness.broker.unacked("orders"), vec!["4"]);

    harness.stage.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn acks_for_removed_destinations_are_dropped() {
    integration_test_utils::init_logging();

    let harness = support::make_ingress(
        "removal-ingress",
        support::manual_config(64),
        &["orders", "billing"],
        support::NO_POLL,
    );
    harness.broker.publish("billing", "7", br#"["invoice", "billing"]"#);

    harness.stage.open(None).await.unwrap();
    support::drain_until(&harness, 1).await;
    assert!(harness.stage.is_in_flight("7").await);

    harness.source.remove("billing");
    let changes = harness.notifier.refresh().await.unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(harness.stage.destinations().await, vec!["orders"]);
    assert_eq!(harness.broker.open_receivers("billing"), 0);

    assert_eq!(
        harness.stage.ack("7").await,
        AckOutcome::DestinationGone {
            destination: "billing".to_string()
        }
    );
    assert!(harness.broker.acked("billing").is_empty());
    assert_eq!(harness.broker.unacked("billing"), vec!["7"]);
    assert_eq!(harness.stage.in_flight_count().await, 0);

    harness.stage.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn auto_ack_mode_tracks_nothing() {
    integration_test_utils::init_logging();

    let harness = support::make_ingress(
        "auto-ingress",
        support::auto_config(),
        &["orders"],
        support::NO_POLL,
    );
    harness.broker.publish("orders", "1", br#"["m1", "orders"]"#);

    harness.stage.open(None).await.unwrap();
    assert_eq!(
        harness.broker.receiver_options("orders").unwrap().ack_mode,
        AckMode::Auto
    );
    support::drain_until(&harness, 1).await;

    assert_eq!(harness.stage.in_flight_count().await, 0);
    assert_eq!(harness.stage.ack("1").await, AckOutcome::AutoAck);
    assert_eq!(harness.stage.fail("1").await, AckOutcome::AutoAck);
    assert!(harness.broker.acked("orders").is_empty());
    assert!(harness.broker.nacked("orders").is_empty());

    harness.stage.close().await;
}
