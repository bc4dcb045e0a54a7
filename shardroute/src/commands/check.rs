use clap::Parser;

use super::common::{Error, RuleConfig};

pub(crate) type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Parser)]
pub(crate) struct Config {
    #[clap(flatten)]
    rule_config: RuleConfig,
}

pub(crate) fn command(config: Config) -> Result<()> {
    let rule = config.rule_config.load()?;

    println!(
        "{:?} is valid: {} data sources, {} sharding tables, {} binding groups, {} broadcast tables",
        config.rule_config.rules,
        rule.data_source_names().len(),
        rule.table_rules().count(),
        rule.binding_groups().len(),
        rule.broadcast_table_count(),
    );
    Ok(())
}
