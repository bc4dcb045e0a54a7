use sharding_rule::ShardingRule;
use sql_statement::{InsertStatement, StatementContext};
use tracing::debug;

use super::check_multiple_sharding_tables;
use crate::{
    Error, HintContext, Result, RouteContext, condition::extract_assignment_conditions,
    engine::Router,
};

pub(super) fn pre_validate(
    rule: &ShardingRule,
    ctx: &StatementContext,
    insert: &InsertStatement,
) -> Result<()> {
    if insert.select.is_some() {
        // An empty column list inserts every column, the key column included.
        let missing_key = rule
            .find_generate_key_column(&insert.table.name)
            .filter(|column| !insert.columns.is_empty() && insert.column_index(column).is_none());
        if let Some(column) = missing_key {
            return Err(Error::MissingGenerateKeyColumnWithInsertSelect {
                table: insert.table.name.clone(),
                column: column.to_owned(),
            });
        }

        let tables = ctx.table_names();
        if tables.len() > 1
            && tables.iter().any(|t| rule.is_sharding_table(t))
            && !rule.is_all_binding_tables(&tables)
        {
            return Err(Error::InsertSelectTableViolation {
                table: insert.table.name.clone(),
            });
        }
    }
    check_multiple_sharding_tables(rule, ctx)
}

pub(super) fn post_validate(
    rule: &ShardingRule,
    ctx: &StatementContext,
    hint: Option<&HintContext>,
    insert: &InsertStatement,
    route: &RouteContext,
) -> Result<()> {
    if let Some(conditions) = extract_assignment_conditions(rule, ctx)? {
        let upserted = Router::new(rule, ctx, hint).route_conditions(&conditions)?;
        if !upserted.same_units(route) {
            debug!(
                table = insert.table.name.as_str(),
                inserted = route.len(),
                upserted = upserted.len(),
                "upsert moves rows to another shard"
            );
            return Err(Error::UnsupportedUpdatingShardingValue {
                table: insert.table.name.clone(),
            });
        }
    }

    if !route.is_single_routing()
        && !rule.is_broadcast_table(&insert.table.name)
        && route.original_data_nodes().iter().any(|nodes| nodes.len() > 1)
    {
        return Err(Error::DuplicateInsertDataRecord {
            table: insert.table.name.clone(),
        });
    }
    Ok(())
}
