use std::{fmt, str::FromStr, sync::Arc};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sql_statement::Value;

use crate::{Error, Result, ShardingStrategy, algorithm::KeyGenerateAlgorithm};

/// A physical table on a data source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DataNode {
    pub data_source: String,
    pub table: String,
}

impl DataNode {
    pub fn new(data_source: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            data_source: data_source.into(),
            table: table.into(),
        }
    }
}

impl FromStr for DataNode {
    type Err = Error;

    /// Parses `data_source.table`, splitting on the first `.`.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().split_once('.') {
            Some((ds, table)) if !ds.is_empty() && !table.is_empty() => {
                Ok(Self::new(ds.trim(), table.trim()))
            }
            _ => Err(Error::InvalidDataNode {
                node: s.to_owned(),
            }),
        }
    }
}

impl fmt::Display for DataNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.data_source, self.table)
    }
}

/// Everything known about one sharded logic table.
#[derive(Debug, Clone)]
pub struct TableRule {
    logic_table: String,
    actual_data_nodes: Vec<DataNode>,
    /// Actual tables per data source, both in configured order.
    actual_tables: IndexMap<String, Vec<String>>,
    database_strategy: ShardingStrategy,
    table_strategy: ShardingStrategy,
    /// The generated key column and its generator.
    generate_key: Option<(String, Arc<dyn KeyGenerateAlgorithm>)>,
}

impl TableRule {
    pub(crate) fn new(
        logic_table: String,
        actual_data_nodes: Vec<DataNode>,
        database_strategy: ShardingStrategy,
        table_strategy: ShardingStrategy,
        generate_key: Option<(String, Arc<dyn KeyGenerateAlgorithm>)>,
    ) -> Self {
        let mut actual_tables: IndexMap<String, Vec<String>> = IndexMap::new();
        for node in &actual_data_nodes {
            actual_tables
                .entry(node.data_source.clone())
                .or_default()
                .push(node.table.clone());
        }

        Self {
            logic_table,
            actual_data_nodes,
            actual_tables,
            database_strategy,
            table_strategy,
            generate_key,
        }
    }

    pub fn logic_table(&self) -> &str {
        &self.logic_table
    }

    pub fn actual_data_nodes(&self) -> &[DataNode] {
        &self.actual_data_nodes
    }

    /// The data sources holding this table, in configured order.
    pub fn data_source_names(&self) -> Vec<String> {
        self.actual_tables.keys().cloned().collect()
    }

    /// Actual tables on `data_source`, in configured order.
    pub fn actual_tables(&self, data_source: &str) -> &[String] {
        self.actual_tables
            .get(data_source)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Number of actual tables per data source, in configured order.
    pub(crate) fn shape(&self) -> Vec<(&str, usize)> {
        self.actual_tables
            .iter()
            .map(|(ds, tables)| (ds.as_str(), tables.len()))
            .collect()
    }

    /// Position of `table` among the actual tables of `data_source`.
    ///
    /// Bound tables select the same slots, which is how a route for one
    /// table is carried over to the others.
    pub fn slot_of(&self, data_source: &str, table: &str) -> Option<usize> {
        self.actual_tables(data_source)
            .iter()
            .position(|t| t.eq_ignore_ascii_case(table))
    }

    pub fn table_at(&self, data_source: &str, slot: usize) -> Option<&str> {
        self.actual_tables(data_source).get(slot).map(String::as_str)
    }

    pub fn database_strategy(&self) -> &ShardingStrategy {
        &self.database_strategy
    }

    pub fn table_strategy(&self) -> &ShardingStrategy {
        &self.table_strategy
    }

    pub fn generate_key_column(&self) -> Option<&str> {
        self.generate_key.as_ref().map(|(column, _)| column.as_str())
    }

    /// A new value for the generated key column, `None` without one.
    pub fn generate_key(&self) -> Option<Value> {
        self.generate_key
            .as_ref()
            .map(|(_, generator)| generator.generate_key())
    }

    /// Sharding columns of both strategies, database first, deduplicated.
    pub fn sharding_columns(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = vec![];
        for column in self
            .database_strategy
            .sharding_columns()
            .iter()
            .chain(self.table_strategy.sharding_columns())
        {
            if !columns.iter().any(|c| c.eq_ignore_ascii_case(column)) {
                columns.push(column);
            }
        }
        columns
    }

    pub fn is_sharding_column(&self, column: &str) -> bool {
        self.sharding_columns()
            .iter()
            .any(|c| c.eq_ignore_ascii_case(column))
    }
}
