use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;
use sharding_route::{HintContext, RouteProps, ShardingRouteEngine};
use sql_statement::{Statement, StatementContext, Value};

use super::common::{self, Format, RuleConfig};

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error(transparent)]
    Load(#[from] common::Error),

    #[error(transparent)]
    Route(#[from] sharding_route::Error),

    #[error("cannot serialize route: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub(crate) type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Parser)]
pub(crate) struct Config {
    #[clap(flatten)]
    rule_config: RuleConfig,

    /// Path of the JSON file holding the bound statement
    ///
    /// The file holds an object with the `statement`, its positional
    /// `parameters` and optionally the raw `sql` text, whose comments are
    /// scanned for sharding hints.
    #[clap(short = 's', long = "statement")]
    statement: PathBuf,

    /// The format in which to print the route
    #[clap(value_enum, long = "format", default_value = "pretty")]
    output_format: Format,

    /// Force routing to this data source, as a hint would
    #[clap(long = "data-source")]
    data_source: Option<String>,

    /// Log every routed unit at info level
    #[clap(long = "sql-show", env = "SHARDROUTE_SQL_SHOW")]
    sql_show: bool,

    /// Leave parameters out of the `--sql-show` log lines
    #[clap(long = "sql-simple")]
    sql_simple: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StatementFile {
    statement: Statement,
    #[serde(default)]
    parameters: Vec<Value>,
    #[serde(default)]
    sql: Option<String>,
}

impl StatementFile {
    fn into_context(self) -> StatementContext {
        let ctx = StatementContext::new(self.statement).with_parameters(self.parameters);
        match self.sql {
            Some(sql) => ctx.with_sql(&sql),
            None => ctx,
        }
    }
}

pub(crate) fn command(config: Config) -> Result<()> {
    let rule = config.rule_config.load()?;
    let ctx = common::read_json::<StatementFile>(&config.statement)?.into_context();

    let hint = config.data_source.map(|name| {
        let mut hint = HintContext::default();
        hint.set_data_source_name(name);
        hint
    });

    let props = RouteProps::default()
        .with_sql_show(config.sql_show)
        .with_sql_simple(config.sql_simple);
    let route = ShardingRouteEngine::new(props).route(&rule, &ctx, hint.as_ref())?;

    match config.output_format {
        Format::Pretty => print!("{route}"),
        Format::Json => println!("{}", serde_json::to_string_pretty(&route)?),
    }
    Ok(())
}
