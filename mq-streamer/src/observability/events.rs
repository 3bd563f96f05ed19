//! Canonical structured event names used across `mq-streamer`.

// Notifier and registry events.
pub const NOTIFIER_START: &str = "notifier_start";
pub const NOTIFIER_STOP: &str = "notifier_stop";
pub const NOTIFIER_FETCH_FAILED: &str = "notifier_fetch_failed";
pub const NOTIFIER_PARTITION_ASSIGNED: &str = "notifier_partition_assigned";
pub const DESTINATION_ADDED: &str = "destination_added";
pub const DESTINATION_REMOVED: &str = "destination_removed";
pub const REGISTRY_SNAPSHOT_APPLIED: &str = "registry_snapshot_applied";

// Consumer lifecycle and receive loop events.
pub const CONSUMER_OPEN_OK: &str = "consumer_open_ok";
pub const CONSUMER_OPEN_FAILED: &str = "consumer_open_failed";
pub const CONSUMER_REPLACED: &str = "consumer_replaced";
pub const CONSUMER_CLOSE: &str = "consumer_close";
pub const CONSUMER_CLOSE_FAILED: &str = "consumer_close_failed";
pub const RECEIVE_OK: &str = "receive_ok";
pub const RECEIVE_FAILED: &str = "receive_failed";
pub const RECEIVE_LOOP_EXIT: &str = "receive_loop_exit";
pub const HANDOFF_QUEUE_CLOSED: &str = "handoff_queue_closed";

// Stage lifecycle events.
pub const STAGE_OPEN: &str = "stage_open";
pub const STAGE_CLOSE: &str = "stage_close";

// Output loop and ack routing events.
pub const RECORD_EMITTED: &str = "record_emitted";
pub const CONVERSION_FAILED: &str = "conversion_failed";
pub const DEAD_LETTER_OK: &str = "dead_letter_ok";
pub const DEAD_LETTER_FAILED: &str = "dead_letter_failed";
pub const ACK_OK: &str = "ack_ok";
pub const ACK_FAILED: &str = "ack_failed";
pub const FAIL_OK: &str = "fail_ok";
pub const FAIL_FAILED: &str = "fail_failed";
pub const ACK_UNTRACKED: &str = "ack_untracked";
pub const ACK_ROUTING_DROPPED: &str = "ack_routing_dropped";
pub const IN_FLIGHT_ID_COLLISION: &str = "in_flight_id_collision";

// Producer and egress events.
pub const PRODUCER_OPEN_OK: &str = "producer_open_ok";
pub const PRODUCER_OPEN_FAILED: &str = "producer_open_failed";
pub const PRODUCER_CLOSE: &str = "producer_close";
pub const PRODUCER_CLOSE_FAILED: &str = "producer_close_failed";
pub const PRODUCER_REPLACED: &str = "producer_replaced";
pub const EGRESS_UNROUTED: &str = "egress_unrouted";
pub const EGRESS_CONVERSION_FAILED: &str = "egress_conversion_failed";
pub const EGRESS_SEND_OK: &str = "egress_send_ok";
pub const EGRESS_SEND_FAILED: &str = "egress_send_failed";

// Runtime events.
pub const RUNTIME_SPAWN_OK: &str = "runtime_spawn_ok";
pub const RUNTIME_SPAWN_FAILED: &str = "runtime_spawn_failed";
pub const RUNTIME_JOIN_OK: &str = "runtime_join_ok";
pub const RUNTIME_JOIN_FAILED: &str = "runtime_join_failed";
