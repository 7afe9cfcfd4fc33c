use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Custom epoch: 2025-01-01T00:00:00Z in milliseconds since Unix epoch.
const STREAM_EPOCH_MS: u64 = 1_735_689_600_000;

const SHARD_BITS: u64 = 8;
const COUNTER_BITS: u64 = 14;
const COUNTER_MASK: u64 = (1 << COUNTER_BITS) - 1;

struct State {
    last_ms: u64,
    counter: u64,
}

/// Time-ordered sequence numbers for records appended to a stream shard.
///
/// Layout (MSB → LSB):
/// - Bits 63–22: Timestamp (42 bits): ms since the stream epoch
/// - Bits 21–14: Shard ID (8 bits)
/// - Bits 13–0:  Counter (14 bits): per-ms counter
///
/// If the wall clock steps backwards the generator keeps issuing numbers
/// from the last observed millisecond, so output is strictly increasing.
pub struct SequenceGenerator {
    shard_id: u64,
    state: Mutex<State>,
}

impl SequenceGenerator {
    pub fn new(shard_id: u8) -> Self {
        Self {
            shard_id: shard_id as u64,
            state: Mutex::new(State {
                last_ms: 0,
                counter: 0,
            }),
        }
    }

    pub fn next(&self) -> u64 {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        let now_ms = current_ms().max(state.last_ms);

        if now_ms == state.last_ms {
            state.counter = (state.counter + 1) & COUNTER_MASK;
            if state.counter == 0 {
                // Counter exhausted; borrow the next millisecond.
                state.last_ms += 1;
            }
        } else {
            state.counter = 0;
            state.last_ms = now_ms;
        }

        let ts = state.last_ms.saturating_sub(STREAM_EPOCH_MS);
        (ts << (SHARD_BITS + COUNTER_BITS)) | (self.shard_id << COUNTER_BITS) | state.counter
    }
}

fn current_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(STREAM_EPOCH_MS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn sequence_timestamp_ms(seq: u64) -> u64 {
        (seq >> (SHARD_BITS + COUNTER_BITS)) + STREAM_EPOCH_MS
    }

    fn sequence_shard(seq: u64) -> u8 {
        ((seq >> COUNTER_BITS) & ((1 << SHARD_BITS) - 1)) as u8
    }

    #[test]
    fn sequence_numbers_are_unique() {
        let gen = SequenceGenerator::new(0);
        let mut seen = HashSet::new();
        for _ in 0..50_000 {
            let seq = gen.next();
            assert!(seen.insert(seq), "duplicate sequence number: {seq}");
        }
    }

    #[test]
    fn sequence_numbers_strictly_increase() {
        let gen = SequenceGenerator::new(3);
        let mut prev = 0u64;
        for _ in 0..1_000 {
            let seq = gen.next();
            assert!(seq > prev, "not monotonic: {prev} >= {seq}");
            prev = seq;
        }
    }

    #[test]
    fn timestamp_is_recoverable() {
        let gen = SequenceGenerator::new(0);
        let before = current_ms();
        let seq = gen.next();
        let after = current_ms();

        let extracted = sequence_timestamp_ms(seq);
        assert!(extracted >= before && extracted <= after);
    }

    #[test]
    fn shard_is_recoverable() {
        let gen = SequenceGenerator::new(42);
        assert_eq!(sequence_shard(gen.next()), 42);
    }
}
