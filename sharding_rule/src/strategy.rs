use std::{fmt, sync::Arc};

use crate::algorithm::{
    ComplexKeysShardingAlgorithm, HintShardingAlgorithm, StandardShardingAlgorithm,
};

/// A resolved sharding strategy for one level (database or table) of a
/// table rule.
#[derive(Debug, Clone)]
pub enum ShardingStrategy {
    /// Every available target.
    None,
    Standard {
        column: String,
        algorithm: Arc<dyn StandardShardingAlgorithm>,
    },
    Complex {
        columns: Vec<String>,
        algorithm: Arc<dyn ComplexKeysShardingAlgorithm>,
    },
    /// Driven by hint values only; predicates are ignored.
    Hint {
        algorithm: Arc<dyn HintShardingAlgorithm>,
    },
}

impl ShardingStrategy {
    pub fn sharding_columns(&self) -> &[String] {
        match self {
            Self::Standard { column, .. } => std::slice::from_ref(column),
            Self::Complex { columns, .. } => columns,
            Self::None | Self::Hint { .. } => &[],
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl fmt::Display for ShardingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Standard { column, .. } => write!(f, "standard({column})"),
            Self::Complex { columns, .. } => write!(f, "complex({})", columns.join(", ")),
            Self::Hint { .. } => write!(f, "hint"),
        }
    }
}
