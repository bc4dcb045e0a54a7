use serde_json::json;
use sharding_route::RouteContext;
use sharding_rule::{ShardingRule, ShardingRuleConfig, algorithm::AlgorithmRegistry};

/// `t_order` and `t_order_item` bound and sharded by `user_id` over two data
/// sources and by `order_id` over two tables each; `t_config` is broadcast.
pub(crate) fn order_rule() -> ShardingRule {
    load(json!({
        "data_sources": ["ds_0", "ds_1"],
        "tables": [
            {
                "logic_table": "t_order",
                "actual_data_nodes": "ds_${0..1}.t_order_${0..1}",
                "database_strategy": {"standard": {"sharding_column": "user_id", "algorithm_name": "db_inline"}},
                "table_strategy": {"standard": {"sharding_column": "order_id", "algorithm_name": "t_order_inline"}},
                "key_generate_strategy": {"column": "order_id"}
            },
            {
                "logic_table": "t_order_item",
                "actual_data_nodes": "ds_${0..1}.t_order_item_${0..1}",
                "database_strategy": {"standard": {"sharding_column": "user_id", "algorithm_name": "db_inline"}},
                "table_strategy": {"standard": {"sharding_column": "order_id", "algorithm_name": "item_mod"}}
            }
        ],
        "binding_tables": ["t_order, t_order_item"],
        "broadcast_tables": ["t_config"],
        "sharding_algorithms": {
            "db_inline": {
                "type": "INLINE",
                "props": {
                    "algorithm-expression": "ds_${user_id % 2}",
                    "allow-range-query-with-inline-sharding": true
                }
            },
            "t_order_inline": {
                "type": "INLINE",
                "props": {
                    "algorithm-expression": "t_order_${order_id % 2}",
                    "allow-range-query-with-inline-sharding": true
                }
            },
            "item_mod": {"type": "MOD", "props": {"sharding-count": 2}}
        }
    }))
}

/// `t_order` and `t_order_item` bound and both sharded by `order_id`, over
/// data sources and over tables.
pub(crate) fn order_id_rule() -> ShardingRule {
    load(json!({
        "data_sources": ["ds_0", "ds_1"],
        "tables": [
            {
                "logic_table": "t_order",
                "actual_data_nodes": "ds_${0..1}.t_order_${0..1}",
                "key_generate_strategy": {"column": "order_id"}
            },
            {
                "logic_table": "t_order_item",
                "actual_data_nodes": "ds_${0..1}.t_order_item_${0..1}"
            }
        ],
        "binding_tables": ["t_order, t_order_item"],
        "default_database_strategy": {"standard": {"algorithm_name": "mod_2"}},
        "default_table_strategy": {"standard": {"algorithm_name": "mod_2"}},
        "default_sharding_column": "order_id",
        "sharding_algorithms": {
            "mod_2": {"type": "MOD", "props": {"sharding-count": 2}}
        }
    }))
}

fn load(config: serde_json::Value) -> ShardingRule {
    let config: ShardingRuleConfig = serde_json::from_value(config).unwrap();
    ShardingRule::try_new(&config, &AlgorithmRegistry::default()).unwrap()
}

/// Every unit rendered as one line, in route order.
pub(crate) fn units(route: &RouteContext) -> Vec<String> {
    route.units().map(ToString::to_string).collect()
}
