//! Per-destination producer: one broker send channel.

use crate::collaborators::{BrokerClient, ProducerSession};
use crate::destination::DestinationConfig;
use crate::envelope::OutboundMessage;
use crate::error::StreamerError;
use crate::observability::events;
use std::sync::{Arc, Mutex};
use tracing::{info, warn, Span};

const COMPONENT: &str = "producer";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ProducerState {
    Created,
    Open,
    Closed,
}

struct ProducerInner {
    state: ProducerState,
    session: Option<ProducerSession>,
}

pub(crate) struct DestinationProducer {
    config: Arc<DestinationConfig>,
    client: Arc<dyn BrokerClient>,
    inner: Mutex<ProducerInner>,
    span: Span,
}

impl DestinationProducer {
    pub(crate) fn new(
        config: Arc<DestinationConfig>,
        client: Arc<dyn BrokerClient>,
        span: Span,
    ) -> Self {
        Self {
            config,
            client,
            inner: Mutex::new(ProducerInner {
                state: ProducerState::Created,
                session: None,
            }),
            span,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.config.name
    }

    /// The open session records are serialized against.
    pub(crate) fn session(&self) -> Result<ProducerSession, StreamerError> {
        self.with_inner(|inner| match inner.state {
            ProducerState::Open => inner.session.clone(),
            _ => None,
        })
        .ok_or_else(|| StreamerError::ProducerClosed(self.name().to_string()))
    }

    pub(crate) fn state(&self) -> ProducerState {
        self.with_inner(|inner| inner.state)
    }

    fn with_inner<R>(&self, f: impl FnOnce(&mut ProducerInner) -> R) -> R {
        match self.inner.lock() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    pub(crate) async fn open(&self) -> Result<(), StreamerError> {
        match self.state() {
            ProducerState::Created => {}
            ProducerState::Open => return Ok(()),
            ProducerState::Closed => {
                return Err(StreamerError::ProducerClosed(self.name().to_string()))
            }
        }

        let sender = self
            .client
            .open_sender(&self.config)
            .await
            .map_err(|source| StreamerError::Provisioning {
                destination: self.name().to_string(),
                source,
            })?;
        self.with_inner(|inner| {
            inner.state = ProducerState::Open;
            inner.session = Some(ProducerSession::new(self.config.clone(), sender));
        });

        info!(
            parent: &self.span,
            event = events::PRODUCER_OPEN_OK,
            component = COMPONENT,
            destination = self.name(),
            "producer open"
        );
        Ok(())
    }

    pub(crate) async fn send(&self, message: OutboundMessage) -> Result<(), StreamerError> {
        let session = self.session()?;
        session
            .sender()
            .send(message)
            .await
            .map_err(StreamerError::from)
    }

    pub(crate) async fn close(&self) {
        let session = self.with_inner(|inner| {
            if inner.state == ProducerState::Closed {
                return None;
            }
            inner.state = ProducerState::Closed;
            inner.session.take()
        });
        let Some(session) = session else {
            return;
        };

        if let Err(err) = session.sender().close().await {
            warn!(
                parent: &self.span,
                event = events::PRODUCER_CLOSE_FAILED,
                component = COMPONENT,
                destination = self.name(),
                err = %err,
                "unable to close broker send channel"
            );
            return;
        }
        info!(
            parent: &self.span,
            event = events::PRODUCER_CLOSE,
            component = COMPONENT,
            destination = self.name(),
            "producer closed"
        );
    }
}
