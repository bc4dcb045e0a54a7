use sharding_rule::ShardingRule;
use sql_statement::{StatementContext, UpdateStatement};
use tracing::debug;

use crate::{
    Error, HintContext, Result, RouteContext, condition::extract_assignment_conditions,
    engine::Router,
};

/// Rejects an UPDATE that would move rows to another shard, or whose `LIMIT`
/// would apply once per unit.
pub(super) fn post_validate(
    rule: &ShardingRule,
    ctx: &StatementContext,
    hint: Option<&HintContext>,
    update: &UpdateStatement,
    route: &RouteContext,
) -> Result<()> {
    if let Some(conditions) = extract_assignment_conditions(rule, ctx)? {
        let updated = Router::new(rule, ctx, hint).route_conditions(&conditions)?;
        if !updated.same_units(route) {
            let table = update
                .tables
                .iter()
                .map(|t| t.name.as_str())
                .find(|t| rule.is_sharding_table(t))
                .unwrap_or_default()
                .to_owned();
            debug!(
                table = table.as_str(),
                routed = route.len(),
                updated = updated.len(),
                "update moves rows to another shard"
            );
            return Err(Error::UnsupportedUpdatingShardingValue { table });
        }
    }

    if update.limit.is_some() && route.len() > 1 {
        return Err(Error::MultipleDataNodesWithLimit {
            statement: "UPDATE",
            units: route.len(),
        });
    }
    Ok(())
}
