//! The sharding route engine.
//!
//! Given a bound statement and a [`ShardingRule`] snapshot, the engine
//! computes every physical `(data source, table)` target the statement must
//! run against:
//!
//! ```text
//!      StatementContext ──┐        ┌── HintContext
//!                         ▼        ▼
//!                  ┌────────────────────┐
//!                  │    pre_validate    │
//!                  └────────────────────┘
//!                            │
//!                            ▼
//!                  ┌────────────────────┐
//!                  │      EXTRACT       │  condition::extract_conditions
//!                  └────────────────────┘
//!                            │  ShardingConditions
//!                            ▼
//!                  ┌────────────────────┐
//!                  │ DISPATCH_PER_TABLE │  dispatch::route_strategy
//!                  └────────────────────┘
//!                            │  data nodes per table
//!                            ▼
//!                  ┌────────────────────┐
//!                  │       MERGE        │  binding slots, cartesian product,
//!                  └────────────────────┘  broadcast and single tables
//!                            │  RouteContext
//!                            ▼
//!                  ┌────────────────────┐
//!                  │   post_validate    │
//!                  └────────────────────┘
//! ```
//!
//! Routing is a pure function of its inputs. It never performs I/O, so every
//! error is final and is surfaced to the caller as is.
//!
//! [`ShardingRule`]: sharding_rule::ShardingRule

use sharding_rule::algorithm::AlgorithmError;
use thiserror::Error;

pub mod condition;
mod context;
pub mod dispatch;
mod engine;
mod generated_key;
mod hint;
mod props;
#[cfg(test)]
mod test_util;
pub mod validator;

pub use context::*;
pub use engine::*;
pub use generated_key::*;
pub use hint::*;
pub use props::*;

#[derive(Debug, Error)]
pub enum Error {
    #[error("table {table:?} is neither a sharding, broadcast nor single table")]
    UnknownTable { table: String },

    #[error("no value bound for parameter {index}")]
    MissingParameter { index: usize },

    #[error("row {row} of INSERT into {table:?} has {actual} values for {expected} columns")]
    InsertValueCountMismatch {
        table: String,
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("sharding column {column:?} of {table:?} cannot be NULL in an INSERT")]
    NullInsertShardingValue { table: String, column: String },

    #[error("no target of table {table:?} matches sharding value {value}")]
    NoRouteTarget { table: String, value: String },

    #[error("sharding algorithm of table {table:?} returned unknown target {target:?}")]
    UnavailableTarget { table: String, target: String },

    #[error("sharding algorithm of table {table:?} failed: {source}")]
    Algorithm {
        table: String,
        source: AlgorithmError,
    },

    #[error("binding tables {first:?} and {second:?} select different actual tables")]
    BindingInconsistency { first: String, second: String },

    #[error("tables {} are routed to disjoint data sources", .tables.join(", "))]
    CrossDataSource { tables: Vec<String> },

    #[error("hinted data source {name:?} is not configured")]
    UnknownDataSource { name: String },

    #[error("database sharding hint must route to exactly one data source, got {count}")]
    HintDatabaseRouteNotSingle { count: usize },

    #[error("a hint context is already active in this scope")]
    HintAlreadyActive,

    #[error("{statement} on multiple sharding tables {} is not supported", .tables.join(", "))]
    DmlWithMultipleShardingTables {
        statement: &'static str,
        tables: Vec<String>,
    },

    #[error(
        "INSERT ... SELECT into {table:?} must list its generated key column {column:?}"
    )]
    MissingGenerateKeyColumnWithInsertSelect { table: String, column: String },

    #[error(
        "INSERT ... SELECT into sharding table {table:?} requires the same or binding source tables"
    )]
    InsertSelectTableViolation { table: String },

    #[error("changing the sharding value of table {table:?} is not supported")]
    UnsupportedUpdatingShardingValue { table: String },

    #[error("INSERT into {table:?} routes a single row to more than one data node")]
    DuplicateInsertDataRecord { table: String },

    #[error("{statement} with LIMIT routed to {units} data nodes is not supported")]
    MultipleDataNodesWithLimit {
        statement: &'static str,
        units: usize,
    },

    #[error("COPY into sharding table {table:?} is not supported")]
    UnsupportedCopyOnShardingTable { table: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
