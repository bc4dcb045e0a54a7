//! Checks that run around routing.
//!
//! [`pre_validate`] rejects statement shapes that can never be routed
//! safely, before any routing work is done. [`post_validate`] rejects
//! statements whose routed shape cannot be honored: a row that would move
//! to another shard, a `LIMIT` spread over several units, a single row
//! written to several nodes.
//!
//! Both dispatch on the statement kind; `SELECT` passes through untouched.

use sharding_rule::ShardingRule;
use sql_statement::{Statement, StatementContext};

use crate::{Error, HintContext, Result, RouteContext};

mod copy;
mod delete;
mod insert;
mod update;

pub fn pre_validate(rule: &ShardingRule, ctx: &StatementContext) -> Result<()> {
    match &ctx.statement {
        Statement::Select(_) => Ok(()),
        Statement::Insert(insert) => insert::pre_validate(rule, ctx, insert),
        Statement::Update(_) | Statement::Delete(_) => check_multiple_sharding_tables(rule, ctx),
        Statement::Copy(copy) => copy::pre_validate(rule, copy),
    }
}

/// Validates `route`, the route of `ctx` under `hint`.
pub fn post_validate(
    rule: &ShardingRule,
    ctx: &StatementContext,
    hint: Option<&HintContext>,
    route: &RouteContext,
) -> Result<()> {
    match &ctx.statement {
        Statement::Select(_) | Statement::Copy(_) => Ok(()),
        Statement::Insert(insert) => insert::post_validate(rule, ctx, hint, insert, route),
        Statement::Update(update) => update::post_validate(rule, ctx, hint, update, route),
        Statement::Delete(delete) => delete::post_validate(delete, route),
    }
}

/// A data changing statement may touch sharding tables only if every table
/// it touches is one, and they are a single table or one binding group.
fn check_multiple_sharding_tables(rule: &ShardingRule, ctx: &StatementContext) -> Result<()> {
    let tables = ctx.table_names();
    let sharding = tables
        .iter()
        .filter(|table| rule.is_sharding_table(table))
        .count();

    let valid = sharding == 0
        || (sharding == tables.len() && (sharding == 1 || rule.is_all_binding_tables(&tables)));
    if valid {
        Ok(())
    } else {
        Err(Error::DmlWithMultipleShardingTables {
            statement: ctx.statement.kind(),
            tables,
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use sql_statement::{DeleteStatement, TableRef};

    use super::*;
    use crate::test_util::{order_rule, select};

    fn delete(tables: &[&str]) -> StatementContext {
        StatementContext::new(Statement::Delete(DeleteStatement {
            tables: tables.iter().map(|t| TableRef::new(*t)).collect(),
            where_clause: None,
            limit: None,
        }))
    }

    #[test]
    fn single_sharding_table_or_binding_group() {
        let rule = order_rule();

        pre_validate(&rule, &delete(&["t_order"])).unwrap();
        pre_validate(&rule, &delete(&["t_order", "T_ORDER_ITEM"])).unwrap();
        pre_validate(&rule, &delete(&["t_config"])).unwrap();
        pre_validate(&rule, &delete(&["t_user"])).unwrap();
    }

    #[test]
    fn unbound_sharding_tables() {
        let rule = order_rule();

        assert_matches!(
            pre_validate(&rule, &delete(&["t_order", "t_account"])),
            Err(Error::DmlWithMultipleShardingTables { statement: "DELETE", tables })
                if tables == ["t_order", "t_account"]
        );
        assert_matches!(
            pre_validate(&rule, &delete(&["t_order", "t_user"])),
            Err(Error::DmlWithMultipleShardingTables { .. })
        );
    }

    #[test]
    fn select_is_never_rejected() {
        let rule = order_rule();
        let ctx = select(
            vec![TableRef::new("t_order"), TableRef::new("t_account")],
            None,
        );
        pre_validate(&rule, &ctx).unwrap();
    }
}
