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

//! Egress stage: routes pipeline records to per-destination producers.

use crate::collaborators::{BrokerClient, DestinationSelector, MessageBuilder, RecordCollector};
use crate::control_plane::destination_table::DestinationTable;
use crate::control_plane::notifier::DestinationNotifier;
use crate::control_plane::partition::PartitionAssignment;
use crate::data_plane::producer::DestinationProducer;
use crate::data_plane::provisioner::ProducerProvisioner;
use crate::envelope::Record;
use crate::error::{RoutingError, StreamerError};
use crate::observability::{events, fields};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument, Span};

const COMPONENT: &str = "egress_stage";

/// What happened to one record handed to [`EgressStage::execute`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EgressOutcome {
    Sent { destination: String },
    Dropped { reason: StreamerError },
}

impl EgressOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, EgressOutcome::Sent { .. })
    }
}

/// Sink side of the streamer.
pub struct EgressStage {
    name: String,
    client: Arc<dyn BrokerClient>,
    notifier: Arc<dyn DestinationNotifier>,
    builder: Arc<dyn MessageBuilder>,
    selector: Arc<dyn DestinationSelector>,
    collector: Arc<dyn RecordCollector>,
    producers: Arc<DestinationTable<DestinationProducer>>,
    opened: AtomicBool,
    closed: AtomicBool,
    span: Span,
}

impl EgressStage {
    pub fn new(
        name: &str,
        client: Arc<dyn BrokerClient>,
        notifier: Arc<dyn DestinationNotifier>,
        builder: Arc<dyn MessageBuilder>,
        selector: Arc<dyn DestinationSelector>,
        collector: Arc<dyn RecordCollector>,
    ) -> Self {
        Self {
            name: name.to_string(),
            client,
            notifier,
            builder,
            selector,
            collector,
            producers: Arc::new(DestinationTable::new()),
            opened: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            span: info_span!("egress_stage", stage = name),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Subscribes a producer provisioner and starts the notifier.
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

        let provisioner = Arc::new(ProducerProvisioner::new(
            self.client.clone(),
            self.producers.clone(),
            self.span.clone(),
        ));
        self.notifier
            .register_listener(provisioner)
            .instrument(self.span.clone())
            .await;
        self.notifier.start().instrument(self.span.clone()).await?;

        let destinations = self.producers.len().await;
        info!(
            parent: &self.span,
            event = events::STAGE_OPEN,
            component = COMPONENT,
            destinations,
            "egress stage open"
        );
        Ok(())
    }

    /// Selects a destination for `record`, serializes it for that destination's producer
    /// session and sends it. Failures drop the record and are logged, never returned.
    pub async fn execute(&self, record: &Record) -> EgressOutcome {
        self.route(record).instrument(self.span.clone()).await
    }

    async fn route(&self, record: &Record) -> EgressOutcome {
        let Some(destination) = self.selector.select(record) else {
            return self.unrouted(RoutingError::NoDestination, fields::NONE);
        };
        let Some(producer) = self.producers.get(&destination).await else {
            return self.unrouted(
                RoutingError::UnknownDestination(destination.clone()),
                &destination,
            );
        };

        // Closed between lookup and use.
        let session = match producer.session() {
            Ok(session) => session,
            Err(reason) => {
                warn!(
                    event = events::EGRESS_SEND_FAILED,
                    component = COMPONENT,
                    destination = destination.as_str(),
                    reason = reason.reason(),
                    err = %reason,
                    "producer closed; dropping record"
                );
                self.collector.report_error(&reason);
                return EgressOutcome::Dropped { reason };
            }
        };

        let message = match self.builder.serialize(record, &session) {
            Ok(message) => message,
            Err(source) => {
                let reason = StreamerError::Conversion {
                    destination: destination.clone(),
                    delivery_id: fields::NONE.to_string(),
                    source,
                };
                warn!(
                    event = events::EGRESS_CONVERSION_FAILED,
                    component = COMPONENT,
                    destination = destination.as_str(),
                    err = %reason,
                    "record did not serialize; dropping"
                );
                self.collector.report_error(&reason);
                return EgressOutcome::Dropped { reason };
            }
        };

        match producer.send(message).await {
            Ok(()) => {
                debug!(
                    event = events::EGRESS_SEND_OK,
                    component = COMPONENT,
                    destination = destination.as_str(),
                    "record sent"
                );
                EgressOutcome::Sent { destination }
            }
            Err(reason) => {
                warn!(
                    event = events::EGRESS_SEND_FAILED,
                    component = COMPONENT,
                    destination = destination.as_str(),
                    reason = reason.reason(),
                    err = %reason,
                    "send failed; dropping record"
                );
                self.collector.report_error(&reason);
                EgressOutcome::Dropped { reason }
            }
        }
    }

    fn unrouted(&self, error: RoutingError, destination: &str) -> EgressOutcome {
        warn!(
            event = events::EGRESS_UNROUTED,
            component = COMPONENT,
            destination,
            err = %error,
            "record has no producer; dropping"
        );
        EgressOutcome::Dropped {
            reason: error.into(),
        }
    }

    /// Names of destinations with an open producer, sorted.
    pub async fn destinations(&self) -> Vec<String> {
        self.producers.names().await
    }

    /// Stops the notifier and closes every producer.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.notifier.stop().instrument(self.span.clone()).await;
        for (_, producer) in self.producers.drain().await {
            producer.close().await;
        }

        info!(
            parent: &self.span,
            event = events::STAGE_CLOSE,
            component = COMPONENT,
            "egress stage closed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::{EgressOutcome, EgressStage};
    use crate::collaborators::DestinationSource;
    use crate::control_plane::notifier::PollingDestinationNotifier;
    use crate::destination::DestinationConfig;
    use crate::envelope::Record;
    use crate::error::{RoutingError, StreamerError};
    use crate::test_support::{RecordingCollector, ScriptedBroker, SecondFieldSelector, TextBuilder};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;

    struct TwoDestinations;

    #[async_trait]
    impl DestinationSource for TwoDestinations {
        async fn fetch_destinations(&self) -> Result<Vec<DestinationConfig>, StreamerError> {
            Ok(vec![
                DestinationConfig::new("audit"),
                DestinationConfig::new("billing"),
            ])
        }
    }

    fn stage(broker: &Arc<ScriptedBroker>, collector: &Arc<RecordingCollector>) -> EgressStage {
        EgressStage::new(
            "test",
            broker.clone(),
            Arc::new(PollingDestinationNotifier::new(
                Arc::new(TwoDestinations),
                Duration::from_secs(3600),
            )),
            Arc::new(TextBuilder),
            Arc::new(SecondFieldSelector),
            collector.clone(),
        )
    }

    #[tokio::test]
    async fn records_reach_the_selected_producer() {
        let broker = Arc::new(ScriptedBroker::default());
        let collector = Arc::new(RecordingCollector::default());
        let stage = stage(&broker, &collector);
        stage.open(None).await.unwrap();
        assert_eq!(stage.destinations().await, vec!["audit", "billing"]);

        let outcome = stage
            .execute(&Record::new(vec![json!("entry"), json!("audit")]))
            .await;

        assert_eq!(
            outcome,
            EgressOutcome::Sent {
                destination: "audit".to_string()
            }
        );
        let sent = broker.sender("audit").sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].payload, b"entry".to_vec());
        assert_eq!(sent[0].properties.get("destination").unwrap(), "audit");
        assert!(broker.sender("billing").sent.lock().unwrap().is_empty());
        stage.close().await;
    }

    #[tokio::test]
    async fn unrouted_and_unknown_records_are_dropped() {
        let broker = Arc::new(ScriptedBroker::default());
        let collector = Arc::new(RecordingCollector::default());
        let stage = stage(&broker, &collector);
        stage.open(None).await.unwrap();

        let unrouted = stage.execute(&Record::new(vec![json!("entry")])).await;
        let unknown = stage
            .execute(&Record::new(vec![json!("entry"), json!("orders")]))
            .await;

        assert_eq!(
            unrouted,
            EgressOutcome::Dropped {
                reason: RoutingError::NoDestination.into()
            }
        );
        assert_eq!(
            unknown,
            EgressOutcome::Dropped {
                reason: RoutingError::UnknownDestination("orders".to_string()).into()
            }
        );
        stage.close().await;
    }

    #[tokio::test]
    async fn serialization_failure_is_reported_and_dropped() {
        let broker = Arc::new(ScriptedBroker::default());
        let collector = Arc::new(RecordingCollector::default());
        let stage = stage(&broker, &collector);
        stage.open(None).await.unwrap();

        let outcome = stage
            .execute(&Record::new(vec![json!(42), json!("audit")]))
            .await;

        assert!(!outcome.is_sent());
        assert_eq!(collector.errors(), vec!["conversion"]);
        assert!(broker.sender("audit").sent.lock().unwrap().is_empty());
        stage.close().await;
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let broker = Arc::new(ScriptedBroker::default());
        let collector = Arc::new(RecordingCollector::default());
        let stage = stage(&broker, &collector);
        stage.open(None).await.unwrap();

        stage.close().await;
        stage.close().await;

        assert!(stage.destinations().await.is_empty());
        assert_eq!(broker.sender("audit").closes.load(Ordering::SeqCst), 1);
        assert!(stage.open(None).await.is_err());
    }
}
