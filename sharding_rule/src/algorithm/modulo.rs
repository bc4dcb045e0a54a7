use std::sync::Arc;

use super::{
    AlgorithmError, PreciseShardingValue, Props, RangeShardingValue, Result, ShardingAlgorithm,
    StandardShardingAlgorithm, prop_i64, require_integer, target_with_suffix, trailing_number,
};

const SHARDING_COUNT: &str = "sharding-count";

fn sharding_count(props: &Props) -> Result<i64> {
    let count = prop_i64(props, SHARDING_COUNT)?;
    if count <= 0 {
        return Err(AlgorithmError::InvalidProperty {
            property: SHARDING_COUNT.to_owned(),
            reason: format!("must be positive, got {count}"),
        });
    }
    Ok(count)
}

/// `MOD`: the integer value modulo `sharding-count`, matched against the
/// numeric suffix of the targets.
#[derive(Debug, Clone, Copy)]
pub struct ModShardingAlgorithm {
    sharding_count: i64,
}

impl ModShardingAlgorithm {
    pub const TYPE: &'static str = "MOD";

    pub fn new(sharding_count: i64) -> Self {
        Self { sharding_count }
    }

    pub fn create(props: &Props) -> Result<ShardingAlgorithm> {
        Ok(ShardingAlgorithm::Standard(Arc::new(Self::new(
            sharding_count(props)?,
        ))))
    }
}

impl StandardShardingAlgorithm for ModShardingAlgorithm {
    fn do_sharding(
        &self,
        available_targets: &[String],
        value: &PreciseShardingValue<'_>,
    ) -> Result<Option<String>> {
        let v = require_integer(value.value)?;
        Ok(target_with_suffix(
            available_targets,
            v.rem_euclid(self.sharding_count),
        ))
    }

    fn do_range_sharding(
        &self,
        available_targets: &[String],
        value: &RangeShardingValue<'_>,
    ) -> Result<Vec<String>> {
        let (Some(lower), Some(upper)) = value.range.integer_bounds() else {
            return Ok(available_targets.to_vec());
        };
        if lower > upper {
            return Ok(vec![]);
        }
        // a span covering every remainder hits every target
        if upper.saturating_sub(lower) >= self.sharding_count - 1 {
            return Ok(available_targets.to_vec());
        }

        let remainders: Vec<i64> = (lower..=upper)
            .map(|v| v.rem_euclid(self.sharding_count))
            .collect();
        Ok(available_targets
            .iter()
            .filter(|target| trailing_number(target).is_some_and(|n| remainders.contains(&n)))
            .cloned()
            .collect())
    }
}

/// `HASH_MOD`: CRC32 of the value's text form modulo `sharding-count`.
#[derive(Debug, Clone, Copy)]
pub struct HashModShardingAlgorithm {
    sharding_count: i64,
}

impl HashModShardingAlgorithm {
    pub const TYPE: &'static str = "HASH_MOD";

    pub fn new(sharding_count: i64) -> Self {
        Self { sharding_count }
    }

    pub fn create(props: &Props) -> Result<ShardingAlgorithm> {
        Ok(ShardingAlgorithm::Standard(Arc::new(Self::new(
            sharding_count(props)?,
        ))))
    }
}

impl StandardShardingAlgorithm for HashModShardingAlgorithm {
    fn do_sharding(
        &self,
        available_targets: &[String],
        value: &PreciseShardingValue<'_>,
    ) -> Result<Option<String>> {
        let hash = crc32fast::hash(value.value.to_string().as_bytes());
        Ok(target_with_suffix(
            available_targets,
            i64::from(hash) % self.sharding_count,
        ))
    }

    fn do_range_sharding(
        &self,
        available_targets: &[String],
        _value: &RangeShardingValue<'_>,
    ) -> Result<Vec<String>> {
        // hashing destroys ordering
        Ok(available_targets.to_vec())
    }
}
