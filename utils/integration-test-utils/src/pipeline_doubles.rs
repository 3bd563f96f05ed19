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

//! Stand-ins for the host pipeline: a JSON codec, a field based selector and a
//! collector that remembers everything it is given.

use mq_streamer::{
    ConversionError, DestinationSelector, MessageBuilder, MessageEnvelope, OutboundMessage,
    ProducerSession, Record, RecordCollector, StreamerError,
};
use serde_json::Value;
use std::sync::{Mutex, MutexGuard};

/// Payloads are JSON arrays of fields. A bare JSON value becomes a one-field record and
/// an empty payload carries no record.
#[derive(Default)]
pub struct JsonMessageBuilder;

impl MessageBuilder for JsonMessageBuilder {
    fn serialize(
        &self,
        record: &Record,
        session: &ProducerSession,
    ) -> Result<OutboundMessage, ConversionError> {
        let payload = serde_json::to_vec(&record.fields)
            .map_err(|e| ConversionError::Malformed(e.to_string()))?;
        Ok(OutboundMessage::new(payload).with_property("destination", &session.destination().name))
    }

    fn deserialize(&self, envelope: &MessageEnvelope) -> Result<Option<Record>, ConversionError> {
        if envelope.payload.is_empty() {
            return Ok(None);
        }
        let value: Value = serde_json::from_slice(&envelope.payload)
            .map_err(|e| ConversionError::Malformed(e.to_string()))?;
        let fields = match value {
            Value::Array(fields) => fields,
            other => vec![other],
        };
        Ok(Some(Record::new(fields)))
    }
}

/// Routes a record to the destination named by its string field at `index`.
pub struct FieldSelector {
    index: usize,
}

impl FieldSelector {
    pub fn new(index: usize) -> Self {
        Self { index }
    }
}

impl DestinationSelector for FieldSelector {
    fn select(&self, record: &Record) -> Option<String> {
        record
            .fields
            .get(self.index)
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EmittedRecord {
    pub stream: Option<String>,
    pub record: Record,
    pub tracking_id: String,
}

#[derive(Default)]
pub struct RecordingCollector {
    emitted: Mutex<Vec<EmittedRecord>>,
    errors: Mutex<Vec<StreamerError>>,
}

impl RecordingCollector {
    fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn emitted(&self) -> Vec<EmittedRecord> {
        Self::lock(&self.emitted).clone()
    }

    pub fn emitted_count(&self) -> usize {
        Self::lock(&self.emitted).len()
    }

    pub fn tracking_ids(&self) -> Vec<String> {
        Self::lock(&self.emitted)
            .iter()
            .map(|emitted| emitted.tracking_id.clone())
            .collect()
    }

    pub fn errors(&self) -> Vec<StreamerError> {
        Self::lock(&self.errors).clone()
    }
}

impl RecordCollector for RecordingCollector {
    fn emit(&self, stream: Option<&str>, record: Record, tracking_id: &str) {
        Self::lock(&self.emitted).push(EmittedRecord {
            stream: stream.map(str::to_string),
            record,
            tracking_id: tracking_id.to_string(),
        });
    }

    fn report_error(&self, error: &StreamerError) {
        Self::lock(&self.errors).push(error.clone());
    }
}
