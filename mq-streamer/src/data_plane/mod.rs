//! Data-plane layer.
//!
//! Owns the per-destination consumers and producers, the bounded hand-off queue joining
//! every receive loop to the single output loop, and the provisioners that open and close
//! consumers and producers as destinations come and go.

pub(crate) mod consumer;
pub(crate) mod handoff_queue;
pub(crate) mod producer;
pub(crate) mod provisioner;
