//! Control-plane layer.
//!
//! Owns which destinations exist: the versioned destination registry, the change notifier
//! that diffs observations of the destination source into add/remove callbacks, the
//! partition filter, and the name-keyed tables holding per-destination handles.
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use async_trait::async_trait;
//! use mq_streamer::{
//!     DestinationConfig, DestinationNotifier, DestinationSource, PollingDestinationNotifier,
//!     StreamerError,
//! };
//!
//! struct FixedSource;
//!
//! #[async_trait]
//! impl DestinationSource for FixedSource {
//!     async fn fetch_destinations(&self) -> Result<Vec<DestinationConfig>, StreamerError> {
//!         Ok(vec![DestinationConfig::new("orders")])
//!     }
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let notifier = PollingDestinationNotifier::new(Arc::new(FixedSource), Duration::from_secs(5));
//! notifier.start().await.unwrap();
//! assert!(notifier.snapshot().contains("orders"));
//!
//! // Stopping twice is the same as stopping once.
//! notifier.stop().await;
//! notifier.stop().await;
//! # });
//! ```

pub(crate) mod destination_registry;
pub(crate) mod destination_table;
pub(crate) mod notifier;
pub(crate) mod partition;
