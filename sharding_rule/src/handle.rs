use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::{Result, ShardingRule, ShardingRuleConfig, algorithm::AlgorithmRegistry};

/// The current [`ShardingRule`] of a logical database.
///
/// Readers take a snapshot and keep it for as long as they need a stable
/// view; publishing replaces the pointer and never touches a rule a reader
/// may still hold.
#[derive(Debug)]
pub struct ShardingRuleHandle {
    current: RwLock<Arc<ShardingRule>>,
}

impl ShardingRuleHandle {
    pub fn new(rule: ShardingRule) -> Self {
        Self {
            current: RwLock::new(Arc::new(rule)),
        }
    }

    pub fn snapshot(&self) -> Arc<ShardingRule> {
        Arc::clone(&self.current.read())
    }

    /// Swaps in `rule`, returning the snapshot it replaces.
    pub fn publish(&self, rule: ShardingRule) -> Arc<ShardingRule> {
        let rule = Arc::new(rule);
        let tables = rule.table_rules().count();
        let data_sources = rule.data_source_names().len();
        let previous = std::mem::replace(&mut *self.current.write(), rule);
        info!(
            sharding_tables = tables,
            data_sources, "published sharding rule"
        );
        previous
    }

    /// Validates `config` and publishes it; an invalid config leaves the
    /// current rule in place.
    pub fn try_publish(
        &self,
        config: &ShardingRuleConfig,
        registry: &AlgorithmRegistry,
    ) -> Result<Arc<ShardingRule>> {
        let rule = ShardingRule::try_new(config, registry)?;
        Ok(self.publish(rule))
    }
}
