//! Canonical structured-log vocabulary.
//!
//! Every event emitted by the crate carries an `event` name from [`events`] and a
//! `component` label, so logs can be filtered without matching on message text.

pub mod events;
pub mod fields;
