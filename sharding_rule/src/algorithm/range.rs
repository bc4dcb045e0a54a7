use std::sync::Arc;

use super::{
    AlgorithmError, PreciseShardingValue, Props, RangeShardingValue, Result, ShardingAlgorithm,
    StandardShardingAlgorithm, prop_i64, prop_i64_list, require_integer, target_with_suffix,
    trailing_number,
};

/// Partitions the integer line at ascending boundaries.
///
/// With boundaries `b0 < b1 < .. < bn`, partition 0 holds values below `b0`,
/// partition `k` holds `[b(k-1), bk)` and partition `n + 1` holds values from
/// `bn` up. Partition `k` maps to the target with numeric suffix `k`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeShardingAlgorithm {
    boundaries: Vec<i64>,
}

impl RangeShardingAlgorithm {
    /// `BOUNDARY_RANGE` with explicit `sharding-ranges`.
    pub const BOUNDARY_TYPE: &'static str = "BOUNDARY_RANGE";

    /// `VOLUME_RANGE` with `range-lower`, `range-upper` and `sharding-volume`.
    pub const VOLUME_TYPE: &'static str = "VOLUME_RANGE";

    pub fn with_boundaries(boundaries: Vec<i64>) -> Result<Self> {
        if boundaries.is_empty() || boundaries.windows(2).any(|w| w[0] >= w[1]) {
            return Err(AlgorithmError::InvalidProperty {
                property: "sharding-ranges".to_owned(),
                reason: "expected a non empty strictly ascending list".to_owned(),
            });
        }
        Ok(Self { boundaries })
    }

    pub fn with_volume(lower: i64, upper: i64, volume: i64) -> Result<Self> {
        if volume <= 0 || lower >= upper {
            return Err(AlgorithmError::InvalidProperty {
                property: "sharding-volume".to_owned(),
                reason: format!(
                    "expected range-lower < range-upper and a positive volume, \
                     got {lower}, {upper} and {volume}"
                ),
            });
        }
        let mut boundaries: Vec<i64> = std::iter::successors(Some(lower), |b| b.checked_add(volume))
            .take_while(|b| *b < upper)
            .collect();
        boundaries.push(upper);
        Ok(Self { boundaries })
    }

    pub fn create_boundary(props: &Props) -> Result<ShardingAlgorithm> {
        let boundaries = prop_i64_list(props, "sharding-ranges")?;
        Ok(ShardingAlgorithm::Standard(Arc::new(Self::with_boundaries(
            boundaries,
        )?)))
    }

    pub fn create_volume(props: &Props) -> Result<ShardingAlgorithm> {
        let lower = prop_i64(props, "range-lower")?;
        let upper = prop_i64(props, "range-upper")?;
        let volume = prop_i64(props, "sharding-volume")?;
        Ok(ShardingAlgorithm::Standard(Arc::new(Self::with_volume(
            lower, upper, volume,
        )?)))
    }

    fn partition(&self, v: i64) -> usize {
        self.boundaries.partition_point(|b| *b <= v)
    }

    /// The largest partition index.
    fn last_partition(&self) -> usize {
        self.boundaries.len()
    }
}

impl StandardShardingAlgorithm for RangeShardingAlgorithm {
    fn do_sharding(
        &self,
        available_targets: &[String],
        value: &PreciseShardingValue<'_>,
    ) -> Result<Option<String>> {
        let v = require_integer(value.value)?;
        Ok(target_with_suffix(available_targets, self.partition(v) as i64))
    }

    fn do_range_sharding(
        &self,
        available_targets: &[String],
        value: &RangeShardingValue<'_>,
    ) -> Result<Vec<String>> {
        let (lower, upper) = value.range.integer_bounds();
        let first = lower.map_or(0, |v| self.partition(v));
        let last = upper.map_or(self.last_partition(), |v| self.partition(v));
        if first > last {
            return Ok(vec![]);
        }

        Ok(available_targets
            .iter()
            .filter(|target| {
                trailing_number(target)
                    .and_then(|n| usize::try_from(n).ok())
                    .is_some_and(|n| (first..=last).contains(&n))
            })
            .cloned()
            .collect())
    }
}
