//! Shared rule and statement fixtures.

use serde_json::json;
use sharding_rule::{
    AlgorithmConfig, ShardingRule, ShardingRuleConfig, StrategyConfig, TableRuleConfig,
    algorithm::AlgorithmRegistry,
};
use sql_statement::{Expr, SelectStatement, Statement, StatementContext, TableRef};

use crate::RouteContext;

/// Two data sources with two actual tables each.
///
/// * `t_order` and `t_order_item` are a binding group, sharded by `user_id`
///   over data sources and by `order_id` over tables.
/// * `t_account` is sharded by `user_id` and `account_id`, unbound.
/// * `t_log` is routed by hint values only.
/// * `t_config` is broadcast, `t_user` lives on `ds_1` and `t_address` on
///   `ds_0`.
pub(crate) fn order_rule() -> ShardingRule {
    let config = ShardingRuleConfig::new(["ds_0", "ds_1"])
        .with_table(
            TableRuleConfig::new("t_order", "ds_${0..1}.t_order_${0..1}")
                .with_database_strategy(StrategyConfig::standard("user_id", "mod_2"))
                .with_table_strategy(StrategyConfig::standard("order_id", "mod_2"))
                .with_key_generate_column("order_id"),
        )
        .with_table(
            TableRuleConfig::new("t_order_item", "ds_${0..1}.t_order_item_${0..1}")
                .with_database_strategy(StrategyConfig::standard("user_id", "mod_2"))
                .with_table_strategy(StrategyConfig::standard("order_id", "mod_2")),
        )
        .with_table(
            TableRuleConfig::new("t_account", "ds_${0..1}.t_account_${0..1}")
                .with_database_strategy(StrategyConfig::standard("user_id", "mod_2"))
                .with_table_strategy(StrategyConfig::standard("account_id", "mod_2")),
        )
        .with_table(
            TableRuleConfig::new("t_log", "ds_${0..1}.t_log_${0..1}")
                .with_database_strategy(StrategyConfig::hint("ds_hint"))
                .with_table_strategy(StrategyConfig::hint("t_log_hint")),
        )
        .with_binding_group("t_order, t_order_item")
        .with_broadcast_table("t_config")
        .with_single_table("t_user", "ds_1")
        .with_single_table("t_address", "ds_0")
        .with_algorithm(
            "mod_2",
            AlgorithmConfig::new("MOD", [("sharding-count", json!(2))]),
        )
        .with_algorithm(
            "ds_hint",
            AlgorithmConfig::new(
                "HINT_INLINE",
                [("algorithm-expression", json!("ds_${value % 2}"))],
            ),
        )
        .with_algorithm(
            "t_log_hint",
            AlgorithmConfig::new(
                "HINT_INLINE",
                [("algorithm-expression", json!("t_log_${value % 2}"))],
            ),
        );
    ShardingRule::try_new(&config, &AlgorithmRegistry::default()).unwrap()
}

pub(crate) fn select(tables: Vec<TableRef>, where_clause: Option<Expr>) -> StatementContext {
    StatementContext::new(Statement::Select(SelectStatement {
        tables,
        where_clause,
        ..Default::default()
    }))
}

/// `column = value` on an unqualified column.
pub(crate) fn col_eq(column: &str, value: i64) -> Expr {
    Expr::column(column).eq(Expr::literal(value))
}

/// Every unit rendered as one line, in route order.
pub(crate) fn units(route: &RouteContext) -> Vec<String> {
    route.units().map(ToString::to_string).collect()
}
