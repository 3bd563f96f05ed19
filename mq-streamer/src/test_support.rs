//! Scripted collaborators shared by the unit tests of this crate.

use crate::collaborators::{
    BrokerClient, BrokerReceiver, BrokerSender, DestinationSelector, MessageBuilder,
    ProducerSession, RecordCollector,
};
use crate::destination::{DeliveryOptions, DestinationConfig};
use crate::envelope::{DeliveryId, MessageEnvelope, OutboundMessage, Record};
use crate::error::{BrokerError, ConversionError, StreamerError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex as AsyncMutex};

type Delivery = Result<Option<MessageEnvelope>, BrokerError>;

/// Receiver fed through a channel; `receive` waits until something is scripted.
pub(crate) struct ScriptedReceiver {
    inbox: AsyncMutex<mpsc::UnboundedReceiver<Delivery>>,
    pub(crate) options: DeliveryOptions,
    pub(crate) acks: Mutex<Vec<String>>,
    pub(crate) nacks: Mutex<Vec<(String, bool)>>,
    pub(crate) dead_letters: Mutex<Vec<String>>,
    pub(crate) closes: AtomicUsize,
}

impl ScriptedReceiver {
    pub(crate) fn acks(&self) -> Vec<String> {
        self.acks.lock().unwrap().clone()
    }

    pub(crate) fn nacks(&self) -> Vec<(String, bool)> {
        self.nacks.lock().unwrap().clone()
    }

    pub(crate) fn dead_letters(&self) -> Vec<String> {
        self.dead_letters.lock().unwrap().clone()
    }

    pub(crate) fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrokerReceiver for ScriptedReceiver {
    async fn receive(&self) -> Result<Option<MessageEnvelope>, BrokerError> {
        match self.inbox.lock().await.recv().await {
            Some(delivery) => delivery,
            None => Err(BrokerError::Closed),
        }
    }

    async fn ack(&self, delivery_id: &DeliveryId) -> Result<(), BrokerError> {
        self.acks.lock().unwrap().push(delivery_id.to_string());
        Ok(())
    }

    async fn nack(&self, delivery_id: &DeliveryId, requeue: bool) -> Result<(), BrokerError> {
        self.nacks
            .lock()
            .unwrap()
            .push((delivery_id.to_string(), requeue));
        Ok(())
    }

    async fn dead_letter(&self, delivery_id: &DeliveryId) -> Result<(), BrokerError> {
        self.dead_letters
            .lock()
            .unwrap()
            .push(delivery_id.to_string());
        Ok(())
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct RecordingSender {
    pub(crate) sent: Mutex<Vec<OutboundMessage>>,
    pub(crate) closes: AtomicUsize,
}

#[async_trait]
impl BrokerSender for RecordingSender {
    async fn send(&self, message: OutboundMessage) -> Result<(), BrokerError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Broker whose channels are created on demand and kept for inspection.
#[derive(Default)]
pub(crate) struct ScriptedBroker {
    feeds: Mutex<HashMap<String, mpsc::UnboundedSender<Delivery>>>,
    receivers: Mutex<HashMap<String, Vec<Arc<ScriptedReceiver>>>>,
    senders: Mutex<HashMap<String, Arc<RecordingSender>>>,
    unreachable: Mutex<HashSet<String>>,
}

impl ScriptedBroker {
    pub(crate) fn refuse(&self, destination: &str) {
        self.unreachable
            .lock()
            .unwrap()
            .insert(destination.to_string());
    }

    /// Queues a delivery on the newest receiver of `destination`.
    pub(crate) fn deliver(&self, destination: &str, id: &str, payload: &str) {
        self.script(
            destination,
            Ok(Some(MessageEnvelope::new(id, payload.as_bytes().to_vec()))),
        );
    }

    pub(crate) fn script(&self, destination: &str, delivery: Delivery) {
        let feeds = self.feeds.lock().unwrap();
        let feed = feeds.get(destination).expect("destination has no receiver");
        feed.send(delivery).expect("receiver dropped");
    }

    pub(crate) fn receiver(&self, destination: &str) -> Arc<ScriptedReceiver> {
        self.receivers.lock().unwrap()[destination]
            .last()
            .cloned()
            .expect("destination has no receiver")
    }

    pub(crate) fn receiver_count(&self, destination: &str) -> usize {
        self.receivers
            .lock()
            .unwrap()
            .get(destination)
            .map_or(0, Vec::len)
    }

    pub(crate) fn sender(&self, destination: &str) -> Arc<RecordingSender> {
        self.senders.lock().unwrap()[destination].clone()
    }

    fn check_reachable(&self, destination: &str) -> Result<(), BrokerError> {
        if self.unreachable.lock().unwrap().contains(destination) {
            return Err(BrokerError::Connection(format!("{destination} refused")));
        }
        Ok(())
    }
}

#[async_trait]
impl BrokerClient for ScriptedBroker {
    async fn open_receiver(
        &self,
        destination: &DestinationConfig,
        options: &DeliveryOptions,
    ) -> Result<Arc<dyn BrokerReceiver>, BrokerError> {
        self.check_reachable(&destination.name)?;
        let (feed, inbox) = mpsc::unbounded_channel();
        let receiver = Arc::new(ScriptedReceiver {
            inbox: AsyncMutex::new(inbox),
            options: *options,
            acks: Mutex::default(),
            nacks: Mutex::default(),
            dead_letters: Mutex::default(),
            closes: AtomicUsize::new(0),
        });
        self.feeds
            .lock()
            .unwrap()
            .insert(destination.name.clone(), feed);
        self.receivers
            .lock()
            .unwrap()
            .entry(destination.name.clone())
            .or_default()
            .push(receiver.clone());
        Ok(receiver)
    }

    async fn open_sender(
        &self,
        destination: &DestinationConfig,
    ) -> Result<Arc<dyn BrokerSender>, BrokerError> {
        self.check_reachable(&destination.name)?;
        let sender = Arc::new(RecordingSender::default());
        self.senders
            .lock()
            .unwrap()
            .insert(destination.name.clone(), sender.clone());
        Ok(sender)
    }
}

/// Payload text becomes a one-field record. `""` converts to nothing and `"bad"` fails.
pub(crate) struct TextBuilder;

impl MessageBuilder for TextBuilder {
    fn serialize(
        &self,
        record: &Record,
        session: &ProducerSession,
    ) -> Result<OutboundMessage, ConversionError> {
        let text = record
            .fields
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| ConversionError::Malformed("expected a text field".to_string()))?;
        Ok(OutboundMessage::new(text.as_bytes().to_vec())
            .with_property("destination", &session.destination().name))
    }

    fn deserialize(&self, envelope: &MessageEnvelope) -> Result<Option<Record>, ConversionError> {
        let text = String::from_utf8_lossy(&envelope.payload).to_string();
        match text.as_str() {
            "" => Ok(None),
            "bad" => Err(ConversionError::Malformed("bad payload".to_string())),
            _ => Ok(Some(Record::new(vec![Value::String(text)]))),
        }
    }
}

/// Routes a record to the destination named by its second field.
pub(crate) struct SecondFieldSelector;

impl DestinationSelector for SecondFieldSelector {
    fn select(&self, record: &Record) -> Option<String> {
        record.fields.get(1).and_then(Value::as_str).map(str::to_string)
    }
}

#[derive(Default)]
pub(crate) struct RecordingCollector {
    pub(crate) emitted: Mutex<Vec<(Option<String>, Record, String)>>,
    pub(crate) errors: Mutex<Vec<&'static str>>,
}

impl RecordingCollector {
    pub(crate) fn tracking_ids(&self) -> Vec<String> {
        self.emitted
            .lock()
            .unwrap()
            .iter()
            .map(|(_, _, id)| id.clone())
            .collect()
    }

    pub(crate) fn errors(&self) -> Vec<&'static str> {
        self.errors.lock().unwrap().clone()
    }
}

impl RecordCollector for RecordingCollector {
    fn emit(&self, stream: Option<&str>, record: Record, tracking_id: &str) {
        self.emitted.lock().unwrap().push((
            stream.map(str::to_string),
            record,
            tracking_id.to_string(),
        ));
    }

    fn report_error(&self, error: &StreamerError) {
        self.errors.lock().unwrap().push(error.reason());
    }
}

/// Polls `condition` until it holds or two seconds pass.
pub(crate) async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
