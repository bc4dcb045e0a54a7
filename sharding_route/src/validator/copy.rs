use sharding_rule::ShardingRule;
use sql_statement::CopyStatement;

use crate::{Error, Result};

pub(super) fn pre_validate(rule: &ShardingRule, copy: &CopyStatement) -> Result<()> {
    if rule.is_sharding_table(&copy.table.name) {
        return Err(Error::UnsupportedCopyOnShardingTable {
            table: copy.table.name.clone(),
        });
    }
    Ok(())
}
