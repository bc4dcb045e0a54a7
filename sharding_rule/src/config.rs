//! Serializable sharding rule configuration.
//!
//! ```json
//! {
//!   "data_sources": ["ds_0", "ds_1"],
//!   "tables": [{
//!     "logic_table": "t_order",
//!     "actual_data_nodes": "ds_${0..1}.t_order_${0..1}",
//!     "database_strategy": {"standard": {"sharding_column": "user_id", "algorithm_name": "db_mod"}},
//!     "table_strategy": {"standard": {"sharding_column": "order_id", "algorithm_name": "t_mod"}}
//!   }],
//!   "sharding_algorithms": {
//!     "db_mod": {"type": "MOD", "props": {"sharding-count": 2}},
//!     "t_mod": {"type": "INLINE", "props": {"algorithm-expression": "t_order_${order_id % 2}"}}
//!   }
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::algorithm::Props;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShardingRuleConfig {
    /// Logical data source names, in routing order.
    pub data_sources: Vec<String>,
    pub tables: Vec<TableRuleConfig>,
    /// Binding groups, each a comma separated list of logic tables.
    pub binding_tables: Vec<String>,
    pub broadcast_tables: Vec<String>,
    /// Unsharded tables pinned to one data source.
    pub single_tables: BTreeMap<String, String>,
    /// Where tables that are not configured at all live.
    pub default_data_source: Option<String>,
    pub default_database_strategy: Option<StrategyConfig>,
    pub default_table_strategy: Option<StrategyConfig>,
    /// Column used by standard strategies that do not name one.
    pub default_sharding_column: Option<String>,
    pub default_key_generate_strategy: Option<KeyGenerateStrategyConfig>,
    pub sharding_algorithms: BTreeMap<String, AlgorithmConfig>,
    /// Key generators referenced by name from key generate strategies.
    pub key_generators: BTreeMap<String, AlgorithmConfig>,
}

impl ShardingRuleConfig {
    pub fn new(data_sources: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            data_sources: data_sources.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_table(mut self, table: TableRuleConfig) -> Self {
        self.tables.push(table);
        self
    }

    pub fn with_algorithm(mut self, name: impl Into<String>, algorithm: AlgorithmConfig) -> Self {
        self.sharding_algorithms.insert(name.into(), algorithm);
        self
    }

    pub fn with_key_generator(
        mut self,
        name: impl Into<String>,
        generator: AlgorithmConfig,
    ) -> Self {
        self.key_generators.insert(name.into(), generator);
        self
    }

    pub fn with_binding_group(mut self, group: impl Into<String>) -> Self {
        self.binding_tables.push(group.into());
        self
    }

    pub fn with_broadcast_table(mut self, table: impl Into<String>) -> Self {
        self.broadcast_tables.push(table.into());
        self
    }

    pub fn with_single_table(
        mut self,
        table: impl Into<String>,
        data_source: impl Into<String>,
    ) -> Self {
        self.single_tables.insert(table.into(), data_source.into());
        self
    }

    pub fn with_default_database_strategy(mut self, strategy: StrategyConfig) -> Self {
        self.default_database_strategy = Some(strategy);
        self
    }

    pub fn with_default_table_strategy(mut self, strategy: StrategyConfig) -> Self {
        self.default_table_strategy = Some(strategy);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableRuleConfig {
    pub logic_table: String,
    /// Inline expression; absent means the logic table on every data source.
    #[serde(default)]
    pub actual_data_nodes: Option<String>,
    #[serde(default)]
    pub database_strategy: Option<StrategyConfig>,
    #[serde(default)]
    pub table_strategy: Option<StrategyConfig>,
    #[serde(default)]
    pub key_generate_strategy: Option<KeyGenerateStrategyConfig>,
}

impl TableRuleConfig {
    pub fn new(logic_table: impl Into<String>, actual_data_nodes: impl Into<String>) -> Self {
        Self {
            logic_table: logic_table.into(),
            actual_data_nodes: Some(actual_data_nodes.into()),
            database_strategy: None,
            table_strategy: None,
            key_generate_strategy: None,
        }
    }

    pub fn with_database_strategy(mut self, strategy: StrategyConfig) -> Self {
        self.database_strategy = Some(strategy);
        self
    }

    pub fn with_table_strategy(mut self, strategy: StrategyConfig) -> Self {
        self.table_strategy = Some(strategy);
        self
    }

    /// Generates `column` with the default `SNOWFLAKE` generator.
    pub fn with_key_generate_column(mut self, column: impl Into<String>) -> Self {
        self.key_generate_strategy = Some(KeyGenerateStrategyConfig {
            column: column.into(),
            key_generator_name: None,
        });
        self
    }

    pub fn with_key_generate_strategy(
        mut self,
        column: impl Into<String>,
        key_generator_name: impl Into<String>,
    ) -> Self {
        self.key_generate_strategy = Some(KeyGenerateStrategyConfig {
            column: column.into(),
            key_generator_name: Some(key_generator_name.into()),
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyConfig {
    Standard {
        #[serde(default)]
        sharding_column: Option<String>,
        algorithm_name: String,
    },
    Complex {
        sharding_columns: Vec<String>,
        algorithm_name: String,
    },
    Hint {
        algorithm_name: String,
    },
    None,
}

impl StrategyConfig {
    pub fn standard(column: impl Into<String>, algorithm_name: impl Into<String>) -> Self {
        Self::Standard {
            sharding_column: Some(column.into()),
            algorithm_name: algorithm_name.into(),
        }
    }

    pub fn complex(
        columns: impl IntoIterator<Item = impl Into<String>>,
        algorithm_name: impl Into<String>,
    ) -> Self {
        Self::Complex {
            sharding_columns: columns.into_iter().map(Into::into).collect(),
            algorithm_name: algorithm_name.into(),
        }
    }

    pub fn hint(algorithm_name: impl Into<String>) -> Self {
        Self::Hint {
            algorithm_name: algorithm_name.into(),
        }
    }
}

/// The column whose value is generated when an INSERT omits it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyGenerateStrategyConfig {
    pub column: String,
    /// Entry of `key_generators`; absent means a `SNOWFLAKE` generator.
    #[serde(default)]
    pub key_generator_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlgorithmConfig {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub props: Props,
}

impl AlgorithmConfig {
    pub fn new(
        type_name: impl Into<String>,
        props: impl IntoIterator<Item = (&'static str, serde_json::Value)>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            props: props
                .into_iter()
                .map(|(k, v)| (k.to_owned(), v))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn parse_json() {
        let config: ShardingRuleConfig = serde_json::from_value(json!({
            "data_sources": ["ds_0", "ds_1"],
            "tables": [{
                "logic_table": "t_order",
                "actual_data_nodes": "ds_${0..1}.t_order_${0..1}",
                "database_strategy": {"standard": {"sharding_column": "user_id", "algorithm_name": "db_mod"}},
                "table_strategy": "none",
                "key_generate_strategy": {"column": "order_id", "key_generator_name": "uuid"}
            }],
            "binding_tables": ["t_order, t_order_item"],
            "broadcast_tables": ["t_config"],
            "sharding_algorithms": {
                "db_mod": {"type": "MOD", "props": {"sharding-count": 2}}
            },
            "key_generators": {
                "uuid": {"type": "UUID"}
            }
        }))
        .unwrap();

        let expected = ShardingRuleConfig::new(["ds_0", "ds_1"])
            .with_table(
                TableRuleConfig::new("t_order", "ds_${0..1}.t_order_${0..1}")
                    .with_database_strategy(StrategyConfig::standard("user_id", "db_mod"))
                    .with_table_strategy(StrategyConfig::None)
                    .with_key_generate_strategy("order_id", "uuid"),
            )
            .with_binding_group("t_order, t_order_item")
            .with_broadcast_table("t_config")
            .with_algorithm(
                "db_mod",
                AlgorithmConfig::new("MOD", [("sharding-count", json!(2))]),
            )
            .with_key_generator("uuid", AlgorithmConfig::new("UUID", []));
        assert_eq!(config, expected);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = serde_json::from_value::<ShardingRuleConfig>(json!({
            "data_sources": ["ds_0"],
            "tabels": []
        }))
        .unwrap_err();

        assert!(err.to_string().contains("tabels"), "{err}");
    }
}
