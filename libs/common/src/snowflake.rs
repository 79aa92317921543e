use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

/// Custom epoch: 2025-01-01T00:00:00Z in milliseconds since Unix epoch.
const RELAY_EPOCH_MS: u64 = 1_735_689_600_000;

const WORKER_BITS: u64 = 10;
const SEQUENCE_BITS: u64 = 12;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1; // 4095

/// Largest accepted worker id.
pub const MAX_WORKER_ID: u16 = (1 << WORKER_BITS) - 1;

struct State {
    last_ms: u64,
    sequence: u64,
}

/// Snowflake-style 64-bit id generator used for connection identifiers.
///
/// Layout (MSB → LSB):
/// - Bits 63–22: Timestamp (42 bits) — ms since relay epoch
/// - Bits 21–12: Worker ID (10 bits)
/// - Bits 11–0:  Sequence (12 bits)
///
/// Ids are strictly increasing for the lifetime of a generator. The timestamp
/// component is a logical clock: it never goes backwards even if the wall
/// clock does, and it borrows the next millisecond when a sequence is
/// exhausted instead of spinning.
pub struct SnowflakeGenerator {
    worker_id: u64,
    state: Mutex<State>,
}

impl SnowflakeGenerator {
    /// Worker ids above [`MAX_WORKER_ID`] are masked into range.
    pub fn new(worker_id: u16) -> Self {
        Self {
            worker_id: u64::from(worker_id & MAX_WORKER_ID),
            state: Mutex::new(State {
                last_ms: 0,
                sequence: 0,
            }),
        }
    }

    pub fn generate(&self) -> u64 {
        let mut state = self.state.lock();
        let now_ms = current_ms().max(RELAY_EPOCH_MS);

        if now_ms > state.last_ms {
            state.last_ms = now_ms;
            state.sequence = 0;
        } else {
            state.sequence = (state.sequence + 1) & SEQUENCE_MASK;
            if state.sequence == 0 {
                state.last_ms += 1;
            }
        }

        let ts = state.last_ms - RELAY_EPOCH_MS;
        (ts << (WORKER_BITS + SEQUENCE_BITS)) | (self.worker_id << SEQUENCE_BITS) | state.sequence
    }
}

fn current_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Extract the creation timestamp (ms since Unix epoch) from a snowflake id.
pub fn snowflake_timestamp_ms(id: u64) -> u64 {
    (id >> (WORKER_BITS + SEQUENCE_BITS)) + RELAY_EPOCH_MS
}

/// Extract the worker id bits from a snowflake id.
pub fn snowflake_worker_id(id: u64) -> u16 {
    ((id >> SEQUENCE_BITS) & u64::from(MAX_WORKER_ID)) as u16
}
