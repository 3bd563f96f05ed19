//! Runtime integration layer.
//!
//! Isolates worker-thread creation so threading behavior stays localized: every receive
//! loop and the notifier polling loop run on a dedicated named OS thread that drives its
//! own current-thread tokio runtime.

pub(crate) mod worker_runtime;
