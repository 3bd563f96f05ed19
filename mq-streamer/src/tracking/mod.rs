//! Ack routing layer.
//!
//! Tracks emitted deliveries by originating destination so manual acknowledgments and
//! failures reach the consumer that received them, and defines the outcomes of doing so.

pub(crate) mod in_flight;
