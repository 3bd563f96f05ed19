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

//! # mq-streamer
//!
//! `mq-streamer` connects a stream-processing pipeline to a changing set of named
//! message-queue destinations.
//!
//! Typical usage is API-first and centered on [`IngressStage`] and [`EgressStage`]. Broker
//! technologies, codecs and the host pipeline plug in through the traits in
//! [`BrokerClient`], [`MessageBuilder`], [`DestinationSelector`], [`RecordCollector`] and
//! [`DestinationSource`]. Internal modules are organized by domain layer:
//!
//! - control plane: destination registry, change notifier, partitioning;
//! - data plane: per-destination consumers and producers, the bounded hand-off queue;
//! - tracking: in-flight deliveries and acknowledgment routing.
//!
//! ## Ingress
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use std::time::Duration;
//! use async_trait::async_trait;
//! use mq_streamer::{
//!     AckMode, BrokerClient, BrokerError, BrokerReceiver, BrokerSender, ConversionError,
//!     DeliveryId, DeliveryOptions, DestinationConfig, DestinationSource, IngressStage,
//!     MessageBuilder, MessageEnvelope, OutboundMessage, PollingDestinationNotifier,
//!     ProducerSession, Record, RecordCollector, StreamerConfig, StreamerError,
//! };
//!
//! # struct OneShotReceiver(Mutex<Option<MessageEnvelope>>);
//! #
//! # #[async_trait]
//! # impl BrokerReceiver for OneShotReceiver {
//! #     async fn receive(&self) -> Result<Option<MessageEnvelope>, BrokerError> {
//! #         let next = self.0.lock().unwrap().take();
//! #         if next.is_none() {
//! #             tokio::time::sleep(Duration::from_millis(5)).await;
//! #         }
//! #         Ok(next)
//! #     }
//! #     async fn ack(&self, _id: &DeliveryId) -> Result<(), BrokerError> { Ok(()) }
//! #     async fn nack(&self, _id: &DeliveryId, _requeue: bool) -> Result<(), BrokerError> { Ok(()) }
//! #     async fn dead_letter(&self, _id: &DeliveryId) -> Result<(), BrokerError> { Ok(()) }
//! #     async fn close(&self) -> Result<(), BrokerError> { Ok(()) }
//! # }
//! #
//! # struct DemoBroker;
//! #
//! # #[async_trait]
//! # impl BrokerClient for DemoBroker {
//! #     async fn open_receiver(
//! #         &self,
//! #         _destination: &DestinationConfig,
//! #         _options: &DeliveryOptions,
//! #     ) -> Result<Arc<dyn BrokerReceiver>, BrokerError> {
//! #         Ok(Arc::new(OneShotReceiver(Mutex::new(Some(MessageEnvelope::new(
//! #             "7",
//! #             b"hello".to_vec(),
//! #         ))))))
//! #     }
//! #     async fn open_sender(
//! #         &self,
//! #         _destination: &DestinationConfig,
//! #     ) -> Result<Arc<dyn BrokerSender>, BrokerError> {
//! #         Err(BrokerError::Connection("ingress only".to_string()))
//! #     }
//! # }
//! #
//! # struct Text;
//! #
//! # impl MessageBuilder for Text {
//! #     fn serialize(&self, _r: &Record, _s: &ProducerSession) -> Result<OutboundMessage, ConversionError> {
//! #         Err(ConversionError::Malformed("ingress only".to_string()))
//! #     }
//! #     fn deserialize(&self, envelope: &MessageEnvelope) -> Result<Option<Record>, ConversionError> {
//! #         let text = String::from_utf8_lossy(&envelope.payload).to_string();
//! #         Ok(Some(Record::new(vec![text.into()])))
//! #     }
//! # }
//! #
//! # #[derive(Default)]
//! # struct Collected(Mutex<Vec<String>>);
//! #
//! # impl RecordCollector for Collected {
//! #     fn emit(&self, _stream: Option<&str>, _record: Record, tracking_id: &str) {
//! #         self.0.lock().unwrap().push(tracking_id.to_string());
//! #     }
//! #     fn report_error(&self, _error: &StreamerError) {}
//! # }
//! #
//! # struct Orders;
//! #
//! # #[async_trait]
//! # impl DestinationSource for Orders {
//! #     async fn fetch_destinations(&self) -> Result<Vec<DestinationConfig>, StreamerError> {
//! #         Ok(vec![DestinationConfig::new("orders")])
//! #     }
//! # }
//! #
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let config = StreamerConfig::from_json5_str(
//!     r#"{ ingress: { queue_capacity: 16 }, delivery: { ack_mode: "manual" } }"#,
//! )
//! .unwrap();
//! assert_eq!(config.delivery.ack_mode, AckMode::Manual);
//!
//! let notifier = Arc::new(PollingDestinationNotifier::new(
//!     Arc::new(Orders),
//!     Duration::from_secs(5),
//! ));
//! let collector = Arc::new(Collected::default());
//! let stage = IngressStage::new(
//!     "quick-start",
//!     config,
//!     Arc::new(DemoBroker),
//!     notifier,
//!     Arc::new(Text),
//!     collector.clone(),
//! )
//! .unwrap();
//!
//! stage.open(None).await.unwrap();
//! assert_eq!(stage.destinations().await, vec!["orders"]);
//!
//! while collector.0.lock().unwrap().is_empty() {
//!     stage.next_batch().await.unwrap();
//!     tokio::time::sleep(Duration::from_millis(5)).await;
//! }
//! assert!(stage.ack("7").await.is_routed());
//!
//! stage.close().await;
//! # });
//! ```

mod collaborators;
mod config;
mod control_plane;
mod data_plane;
mod destination;
mod egress_stage;
mod envelope;
mod error;
mod ingress_stage;
pub mod observability;
mod runtime;
mod tracking;

#[cfg(test)]
mod test_support;

pub use collaborators::{
    BrokerClient, BrokerReceiver, BrokerSender, DestinationSelector, DestinationSource,
    MessageBuilder, ProducerSession, RecordCollector,
};
pub use config::{ConsumerConfig, IngressConfig, NotifierConfig, StreamerConfig};
pub use control_plane::destination_registry::{DestinationChange, RegistrySnapshot};
pub use control_plane::notifier::{
    DestinationChangeListener, DestinationNotifier, PollingDestinationNotifier,
};
pub use control_plane::partition::PartitionAssignment;
pub use destination::{AckMode, DeliveryOptions, DestinationConfig};
pub use egress_stage::{EgressOutcome, EgressStage};
pub use envelope::{DeliveryId, MessageEnvelope, OutboundMessage, Record};
pub use error::{BrokerError, ConversionError, RoutingError, StreamerError};
pub use ingress_stage::IngressStage;
pub use tracking::in_flight::AckOutcome;
