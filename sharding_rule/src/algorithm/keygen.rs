//! Key generation for INSERTs that omit their generated key column.

use std::{
    fmt::Debug,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use parking_lot::Mutex;
use sql_statement::Value;
use uuid::Uuid;

use super::{Props, Result, invalid, prop_i64};

const WORKER_ID: &str = "worker-id";
const MAX_VIBRATION_OFFSET: &str = "max-vibration-offset";

/// Produces the value of a generated key column, one call per row.
pub trait KeyGenerateAlgorithm: Debug + Send + Sync {
    fn generate_key(&self) -> Value;
}

/// Builds a key generator from its configured properties.
pub type KeyGeneratorFactory = fn(&Props) -> Result<Arc<dyn KeyGenerateAlgorithm>>;

/// Milliseconds since the Unix epoch.
pub type Clock = fn() -> i64;

fn system_clock() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}

/// `SNOWFLAKE`: 64 bit keys ordered by creation time.
///
/// From the most significant bit: a zero sign bit, 41 bits of milliseconds
/// since 2016-11-01T00:00:00Z, 10 bits of worker id and a 12 bit sequence
/// within the millisecond. The sequence of a new millisecond starts at an
/// offset cycling through `0..=max-vibration-offset`, so low traffic keys do
/// not all land on the same shard of a modulo algorithm.
///
/// Keys never decrease: a clock that moves backwards keeps using the last
/// millisecond, and an exhausted sequence borrows the next one.
#[derive(Debug)]
pub struct SnowflakeKeyGenerateAlgorithm {
    worker_id: i64,
    max_vibration_offset: i64,
    clock: Clock,
    state: Mutex<SnowflakeState>,
}

#[derive(Debug)]
struct SnowflakeState {
    /// Milliseconds since [`SnowflakeKeyGenerateAlgorithm::EPOCH`].
    last_millis: i64,
    sequence: i64,
    sequence_offset: i64,
}

impl SnowflakeKeyGenerateAlgorithm {
    pub const TYPE: &'static str = "SNOWFLAKE";

    /// 2016-11-01T00:00:00Z in milliseconds since the Unix epoch.
    pub const EPOCH: i64 = 1_477_929_600_000;

    const SEQUENCE_BITS: u32 = 12;
    const WORKER_ID_BITS: u32 = 10;
    const SEQUENCE_MASK: i64 = (1 << Self::SEQUENCE_BITS) - 1;
    const MAX_WORKER_ID: i64 = (1 << Self::WORKER_ID_BITS) - 1;

    pub fn new(worker_id: i64, max_vibration_offset: i64, clock: Clock) -> Result<Self> {
        if !(0..=Self::MAX_WORKER_ID).contains(&worker_id) {
            return Err(invalid(
                WORKER_ID,
                format!("expected 0 to {}", Self::MAX_WORKER_ID),
            ));
        }
        if !(0..=Self::SEQUENCE_MASK).contains(&max_vibration_offset) {
            return Err(invalid(
                MAX_VIBRATION_OFFSET,
                format!("expected 0 to {}", Self::SEQUENCE_MASK),
            ));
        }
        Ok(Self {
            worker_id,
            max_vibration_offset,
            clock,
            state: Mutex::new(SnowflakeState {
                last_millis: -1,
                sequence: 0,
                sequence_offset: 0,
            }),
        })
    }

    pub fn create(props: &Props) -> Result<Arc<dyn KeyGenerateAlgorithm>> {
        let worker_id = if props.contains_key(WORKER_ID) {
            prop_i64(props, WORKER_ID)?
        } else {
            0
        };
        let max_vibration_offset = if props.contains_key(MAX_VIBRATION_OFFSET) {
            prop_i64(props, MAX_VIBRATION_OFFSET)?
        } else {
            1
        };
        Ok(Arc::new(Self::new(
            worker_id,
            max_vibration_offset,
            system_clock,
        )?))
    }
}

impl KeyGenerateAlgorithm for SnowflakeKeyGenerateAlgorithm {
    fn generate_key(&self) -> Value {
        let mut state = self.state.lock();
        let mut millis = ((self.clock)() - Self::EPOCH).max(state.last_millis);
        if millis == state.last_millis {
            state.sequence = (state.sequence + 1) & Self::SEQUENCE_MASK;
            if state.sequence == 0 {
                millis += 1;
            }
        } else {
            state.sequence_offset = if state.sequence_offset >= self.max_vibration_offset {
                0
            } else {
                state.sequence_offset + 1
            };
            state.sequence = state.sequence_offset;
        }
        state.last_millis = millis;

        Value::Integer(
            (millis << (Self::WORKER_ID_BITS + Self::SEQUENCE_BITS))
                | (self.worker_id << Self::SEQUENCE_BITS)
                | state.sequence,
        )
    }
}

/// `UUID`: random version 4 UUIDs as 32 lower case hex digits.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidKeyGenerateAlgorithm;

impl UuidKeyGenerateAlgorithm {
    pub const TYPE: &'static str = "UUID";

    pub fn create(_props: &Props) -> Result<Arc<dyn KeyGenerateAlgorithm>> {
        Ok(Arc::new(Self))
    }
}

impl KeyGenerateAlgorithm for UuidKeyGenerateAlgorithm {
    fn generate_key(&self) -> Value {
        Value::Text(Uuid::new_v4().simple().to_string())
    }
}
