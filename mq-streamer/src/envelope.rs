/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
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

//! Message shapes crossing the broker and pipeline boundaries.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Broker-scoped token identifying one received message instance.
///
/// It travels through the pipeline as a string tracking id and is parsed back into the
/// broker's native type (for example a numeric delivery tag) when acked or failed.
#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct DeliveryId(String);

impl DeliveryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses the id into a broker-native representation.
    pub fn parse<T: FromStr>(&self) -> Result<T, T::Err> {
        self.0.parse()
    }
}

impl Display for DeliveryId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeliveryId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<u64> for DeliveryId {
    fn from(id: u64) -> Self {
        Self::new(id.to_string())
    }
}

/// One message received from a destination, as handed to the output loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageEnvelope {
    pub payload: Vec<u8>,
    pub delivery_id: DeliveryId,
    pub origin_destination: String,
    /// Consumer generation that received the message; stamped by the receive loop.
    pub(crate) origin_generation: u64,
    /// Broker specific data needed to ack, fail or dead-letter later.
    pub metadata: BTreeMap<String, String>,
}

impl MessageEnvelope {
    pub fn new(delivery_id: impl Into<DeliveryId>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            delivery_id: delivery_id.into(),
            origin_destination: String::new(),
            origin_generation: 0,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_origin(mut self, destination: &str) -> Self {
        self.origin_destination = destination.to_string();
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }
}

/// A record in the pipeline's shape: an ordered list of field values.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    pub fields: Vec<Value>,
}

impl Record {
    pub fn new(fields: Vec<Value>) -> Self {
        Self { fields }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<Vec<Value>> for Record {
    fn from(fields: Vec<Value>) -> Self {
        Self::new(fields)
    }
}

/// A broker-ready message built for one producer session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OutboundMessage {
    pub payload: Vec<u8>,
    pub properties: BTreeMap<String, String>,
}

impl OutboundMessage {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: &str, value: &str) -> Self {
        self.properties.insert(key.to_string(), value.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{DeliveryId, MessageEnvelope};

    #[test]
    fn delivery_id_parses_back_to_native_tag() {
        let id = DeliveryId::from(42u64);

        assert_eq!(id.as_str(), "42");
        assert_eq!(id.parse::<u64>(), Ok(42));
        assert!(DeliveryId::from("m1").parse::<u64>().is_err());
    }

    #[test]
    fn envelope_builder_sets_origin_and_metadata() {
        let envelope = MessageEnvelope::new("m1", b"payload".to_vec())
            .with_origin("orders")
            .with_metadata("routing_key", "eu");

        assert_eq!(envelope.origin_destination, "orders");
        assert_eq!(envelope.metadata.get("routing_key").unwrap(), "eu");
    }
}
