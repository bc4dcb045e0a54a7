use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use sharding_rule::{ShardingRule, ShardingRuleConfig, algorithm::AlgorithmRegistry};
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error("cannot read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid sharding rule: {0}")]
    Rule(#[from] sharding_rule::Error),
}

#[derive(Debug, Parser)]
pub(crate) struct RuleConfig {
    /// Path of the JSON sharding rule configuration
    #[clap(short = 'r', long = "rules", env = "SHARDROUTE_RULES")]
    pub(crate) rules: PathBuf,
}

impl RuleConfig {
    /// Reads, parses and validates the rule file.
    pub(crate) fn load(&self) -> Result<ShardingRule, Error> {
        let config: ShardingRuleConfig = read_json(&self.rules)?;
        debug!(
            path = %self.rules.display(),
            data_sources = config.data_sources.len(),
            tables = config.tables.len(),
            "parsed sharding rule configuration"
        );
        let rule = ShardingRule::try_new(&config, &AlgorithmRegistry::default())?;
        info!(path = %self.rules.display(), "loaded sharding rule");
        Ok(rule)
    }
}

pub(crate) fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, Error> {
    let text = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| Error::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum Format {
    Pretty,
    Json,
}
