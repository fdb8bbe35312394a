//! Control-thread event delivery for `engine.subscribe_events` (spec.md
//! §6/§7): the realtime tick never calls back into host code directly, it
//! pushes onto a lock-free ring and a control-thread consumer drains it.
//!
//! Grounded on `sp_core::spsc::SpscRingBuffer`: the realtime thread is the
//! ring's single producer, `Engine::subscribe_events` its single consumer.

use sp_core::spsc::{Consumer, Producer, SpscRingBuffer};

pub const DEFAULT_EVENT_RING_CAPACITY: usize = 256;

/// The event set spec.md §6 names, delivered to `engine.subscribe_events`.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    HardwareFault(String),
    SampleRateChanged(u32),
    FileSourceEndOfFile(String),
    FileSinkOverrun(String, u64),
    HardwareSinkUnderrun(u64),
    FilterStall(String),
    /// A file source/sink worker didn't exit within its join deadline during
    /// `shutdown` and was detached rather than blocked on.
    FileWorkerLeaked(String),
}

pub type EventProducer = Producer<EngineEvent>;
pub type EventConsumer = Consumer<EngineEvent>;

pub fn event_ring(capacity: usize) -> (EventProducer, EventConsumer) {
    SpscRingBuffer::new(capacity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_drain_in_fifo_order() {
        let (mut producer, mut consumer) = event_ring(4);
        producer.try_push(EngineEvent::FilterStall("eq".into())).unwrap();
        producer.try_push(EngineEvent::HardwareSinkUnderrun(3)).unwrap();

        assert_eq!(consumer.try_pop(), Some(EngineEvent::FilterStall("eq".into())));
        assert_eq!(consumer.try_pop(), Some(EngineEvent::HardwareSinkUnderrun(3)));
        assert_eq!(consumer.try_pop(), None);
    }

    #[test]
    fn a_full_ring_rejects_further_pushes_without_blocking() {
        let (mut producer, _consumer) = event_ring(1);
        producer.try_push(EngineEvent::SampleRateChanged(48_000)).unwrap();
        assert!(producer.try_push(EngineEvent::SampleRateChanged(44_100)).is_err());
    }
}
