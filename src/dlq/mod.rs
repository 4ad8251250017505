//! Dead-letter routing support.
//!
//! Actual dead-lettering happens at the broker level: each consumer queue is
//! declared with an `x-dead-letter-exchange` argument pointing at
//! `ticketing.dlx`, so a bare `nack(requeue=false)` on a `Delivery` (see
//! [`crate::bus`]) is enough to route a message there. This module supplies
//! the naming convention and the typed reason the consumer runtime logs
//! before nacking, so operators can tell *why* a message landed in the DLQ
//! without inspecting broker headers.

/// DLQ topic prefix. Full topic/queue name: `{prefix}.{queue}`.
pub const DLQ_TOPIC_PREFIX: &str = "ticketing.dlq";

/// Build the dead-letter queue name for a given consumer queue.
pub fn dlq_queue_name(consumer_queue: &str) -> String {
    format!("{DLQ_TOPIC_PREFIX}.{consumer_queue}")
}

/// Why a message was routed to the DLQ instead of being processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadLetterReason {
    /// The envelope did not deserialize into a valid `EventEnvelope`.
    MalformedEnvelope,
    /// The domain handler rejected the event as permanently invalid.
    BusinessPermanentFailure,
    /// The handler failed transiently more than the configured retry cap.
    RetriesExhausted,
}

impl std::fmt::Display for DeadLetterReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DeadLetterReason::MalformedEnvelope => "malformed_envelope",
            DeadLetterReason::BusinessPermanentFailure => "business_permanent_failure",
            DeadLetterReason::RetriesExhausted => "retries_exhausted",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dlq_queue_name_follows_naming_convention() {
        assert_eq!(dlq_queue_name("inventory-consumer"), "ticketing.dlq.inventory-consumer");
    }
}
