//! The sharding rule model.
//!
//! A [`ShardingRule`] is built once from a [`ShardingRuleConfig`], validated
//! as a whole, and then only ever read. Every lookup the router needs is
//! precomputed at load time and is case-insensitive on identifiers.
//!
//! Rule changes never mutate a published rule: a new rule is built and
//! swapped in through a [`ShardingRuleHandle`], so a statement routes against
//! one consistent snapshot from start to finish.

use algorithm::{AlgorithmError, AlgorithmKind};
use thiserror::Error;

pub mod algorithm;
pub mod config;
mod handle;
pub mod inline;
mod rule;
mod strategy;
mod table;

pub use config::*;
pub use handle::*;
pub use rule::*;
pub use strategy::*;
pub use table::*;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no data sources configured")]
    NoDataSources,

    #[error("data source {name:?} configured more than once")]
    DuplicateDataSource { name: String },

    #[error("table {table:?} configured more than once")]
    DuplicateTable { table: String },

    #[error("invalid data node {node:?}, expected <data_source>.<table>")]
    InvalidDataNode { node: String },

    #[error("table {table:?} references unknown data source {data_source:?}")]
    UnknownDataSource { table: String, data_source: String },

    #[error("table {table:?} has no actual data nodes")]
    EmptyDataNodes { table: String },

    #[error("invalid inline expression {expression:?}: {source}")]
    InvalidInlineExpression {
        expression: String,
        source: inline::Error,
    },

    #[error("table {table:?} references unknown sharding algorithm {name:?}")]
    UnknownAlgorithm { table: String, name: String },

    #[error("table {table:?} references unknown key generator {name:?}")]
    UnknownKeyGenerator { table: String, name: String },

    #[error("sharding algorithm {name:?} has unknown type {type_name:?}")]
    UnknownAlgorithmType { name: String, type_name: String },

    #[error("invalid sharding algorithm {name:?}: {source}")]
    InvalidAlgorithm {
        name: String,
        source: AlgorithmError,
    },

    #[error(
        "table {table:?} uses {algorithm} algorithm {name:?} for a {strategy} sharding strategy"
    )]
    AlgorithmKindMismatch {
        table: String,
        name: String,
        strategy: AlgorithmKind,
        algorithm: AlgorithmKind,
    },

    #[error("standard sharding strategy of table {table:?} has no sharding column")]
    MissingShardingColumn { table: String },

    #[error("binding table {table:?} is not a sharding table")]
    BindingTableNotSharded { table: String },

    #[error("table {table:?} belongs to more than one binding group")]
    DuplicateBindingTable { table: String },

    #[error(
        "binding tables {first:?} and {second:?} do not have the same actual data node layout"
    )]
    InconsistentBindingTables { first: String, second: String },

    #[error("broadcast table {table:?} is also configured as a sharding table")]
    BroadcastTableIsSharded { table: String },

    #[error("single table {table:?} is also configured as a sharding or broadcast table")]
    SingleTableConflict { table: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
