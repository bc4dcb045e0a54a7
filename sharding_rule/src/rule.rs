use std::{collections::BTreeMap, sync::Arc};

use hashbrown::{HashMap, HashSet};
use indexmap::IndexMap;
use tracing::debug;

use sql_statement::Value;

use crate::{
    DataNode, Error, KeyGenerateStrategyConfig, Result, ShardingRuleConfig, ShardingStrategy,
    StrategyConfig, TableRule,
    algorithm::{
        AlgorithmKind, AlgorithmRegistry, KeyGenerateAlgorithm, Props, ShardingAlgorithm,
        SnowflakeKeyGenerateAlgorithm,
    },
    inline,
};

/// Label used in errors for strategies that come from the rule defaults.
const DEFAULTS: &str = "<default>";

/// An immutable, validated set of sharding rules for one logical database.
#[derive(Debug)]
pub struct ShardingRule {
    data_source_names: Vec<String>,
    /// Keyed by lower case logic table name.
    table_rules: IndexMap<String, TableRule>,
    binding_groups: Vec<Vec<String>>,
    /// Lower case logic table name to index into `binding_groups`.
    binding_index: HashMap<String, usize>,
    broadcast_tables: HashSet<String>,
    single_tables: HashMap<String, String>,
    /// Data nodes of broadcast and single tables.
    plain_data_nodes: HashMap<String, Vec<DataNode>>,
    default_data_source: Option<String>,
    default_database_strategy: ShardingStrategy,
}

impl ShardingRule {
    /// Validates `config` and resolves every algorithm through `registry`.
    pub fn try_new(config: &ShardingRuleConfig, registry: &AlgorithmRegistry) -> Result<Self> {
        if config.data_sources.is_empty() {
            return Err(Error::NoDataSources);
        }
        let mut data_source_names: Vec<String> = vec![];
        for name in &config.data_sources {
            if data_source_names.contains(name) {
                return Err(Error::DuplicateDataSource { name: name.clone() });
            }
            data_source_names.push(name.clone());
        }

        let algorithms = create_algorithms(config, registry)?;
        let mut key_generators = KeyGenerators {
            named: create_key_generators(config, registry)?,
            default: None,
        };
        let builder = StrategyBuilder {
            algorithms: &algorithms,
            default_column: config.default_sharding_column.as_deref(),
        };

        let mut table_rules = IndexMap::new();
        for table in &config.tables {
            let key = table.logic_table.to_ascii_lowercase();
            if table_rules.contains_key(&key) {
                return Err(Error::DuplicateTable {
                    table: table.logic_table.clone(),
                });
            }

            let nodes = match &table.actual_data_nodes {
                Some(expression) => parse_data_nodes(&table.logic_table, expression)?,
                None => data_source_names
                    .iter()
                    .map(|ds| DataNode::new(ds.clone(), table.logic_table.clone()))
                    .collect(),
            };
            if let Some(node) = nodes
                .iter()
                .find(|node| !data_source_names.contains(&node.data_source))
            {
                return Err(Error::UnknownDataSource {
                    table: table.logic_table.clone(),
                    data_source: node.data_source.clone(),
                });
            }

            let database_strategy = table
                .database_strategy
                .as_ref()
                .or(config.default_database_strategy.as_ref());
            let table_strategy = table
                .table_strategy
                .as_ref()
                .or(config.default_table_strategy.as_ref());
            let generate_key = match table
                .key_generate_strategy
                .as_ref()
                .or(config.default_key_generate_strategy.as_ref())
            {
                Some(strategy) => Some((
                    strategy.column.clone(),
                    key_generators.resolve(&table.logic_table, strategy)?,
                )),
                None => None,
            };

            let rule = TableRule::new(
                table.logic_table.clone(),
                nodes,
                builder.build(&table.logic_table, database_strategy)?,
                builder.build(&table.logic_table, table_strategy)?,
                generate_key,
            );
            debug!(
                table = %table.logic_table,
                nodes = rule.actual_data_nodes().len(),
                database_strategy = %rule.database_strategy(),
                table_strategy = %rule.table_strategy(),
                generate_key_column = rule.generate_key_column(),
                "loaded table rule"
            );
            table_rules.insert(key, rule);
        }

        let mut broadcast_tables = HashSet::new();
        let mut plain_data_nodes = HashMap::new();
        for table in &config.broadcast_tables {
            let key = table.to_ascii_lowercase();
            if table_rules.contains_key(&key) {
                return Err(Error::BroadcastTableIsSharded {
                    table: table.clone(),
                });
            }
            let nodes = data_source_names
                .iter()
                .map(|ds| DataNode::new(ds.clone(), table.clone()))
                .collect();
            plain_data_nodes.insert(key.clone(), nodes);
            broadcast_tables.insert(key);
        }

        let mut single_tables = HashMap::new();
        for (table, data_source) in &config.single_tables {
            let key = table.to_ascii_lowercase();
            if table_rules.contains_key(&key) || broadcast_tables.contains(&key) {
                return Err(Error::SingleTableConflict {
                    table: table.clone(),
                });
            }
            if !data_source_names.contains(data_source) {
                return Err(Error::UnknownDataSource {
                    table: table.clone(),
                    data_source: data_source.clone(),
                });
            }
            plain_data_nodes.insert(
                key.clone(),
                vec![DataNode::new(data_source.clone(), table.clone())],
            );
            single_tables.insert(key, data_source.clone());
        }

        if let Some(data_source) = &config.default_data_source {
            if !data_source_names.contains(data_source) {
                return Err(Error::UnknownDataSource {
                    table: DEFAULTS.to_owned(),
                    data_source: data_source.clone(),
                });
            }
        }

        let (binding_groups, binding_index) = binding_groups(config, &table_rules)?;
        let default_database_strategy =
            builder.build(DEFAULTS, config.default_database_strategy.as_ref())?;

        Ok(Self {
            data_source_names,
            table_rules,
            binding_groups,
            binding_index,
            broadcast_tables,
            single_tables,
            plain_data_nodes,
            default_data_source: config.default_data_source.clone(),
            default_database_strategy,
        })
    }

    /// Configured data sources, in configured order.
    pub fn data_source_names(&self) -> &[String] {
        &self.data_source_names
    }

    /// The configured spelling of a data source name.
    pub fn find_data_source(&self, name: &str) -> Option<&str> {
        self.data_source_names
            .iter()
            .find(|ds| ds.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }

    pub fn find_table_rule(&self, logic_table: &str) -> Option<&TableRule> {
        self.table_rules.get(&logic_table.to_ascii_lowercase())
    }

    pub fn table_rules(&self) -> impl Iterator<Item = &TableRule> {
        self.table_rules.values()
    }

    pub fn is_sharding_table(&self, logic_table: &str) -> bool {
        self.table_rules
            .contains_key(&logic_table.to_ascii_lowercase())
    }

    pub fn is_broadcast_table(&self, logic_table: &str) -> bool {
        self.broadcast_tables
            .contains(&logic_table.to_ascii_lowercase())
    }

    pub fn broadcast_table_count(&self) -> usize {
        self.broadcast_tables.len()
    }

    /// The data source of a configured single table.
    pub fn single_table_data_source(&self, logic_table: &str) -> Option<&str> {
        self.single_tables
            .get(&logic_table.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Where tables that have no rule at all are routed.
    pub fn default_data_source(&self) -> Option<&str> {
        self.default_data_source.as_deref()
    }

    pub fn default_database_strategy(&self) -> &ShardingStrategy {
        &self.default_database_strategy
    }

    pub fn binding_groups(&self) -> &[Vec<String>] {
        &self.binding_groups
    }

    /// Index of the binding group `logic_table` belongs to.
    pub fn binding_group_index(&self, logic_table: &str) -> Option<usize> {
        self.binding_index
            .get(&logic_table.to_ascii_lowercase())
            .copied()
    }

    /// Whether both tables belong to the same binding group.
    pub fn is_binding_table(&self, first: &str, second: &str) -> bool {
        matches!(
            (self.binding_group_index(first), self.binding_group_index(second)),
            (Some(a), Some(b)) if a == b
        )
    }

    /// Whether every table is a sharding table of one single binding group.
    pub fn is_all_binding_tables<S: AsRef<str>>(&self, logic_tables: &[S]) -> bool {
        let Some((first, rest)) = logic_tables.split_first() else {
            return false;
        };
        let Some(group) = self.binding_group_index(first.as_ref()) else {
            return false;
        };
        rest.iter()
            .all(|t| self.binding_group_index(t.as_ref()) == Some(group))
    }

    /// Physical locations of a sharding, broadcast or single table.
    ///
    /// Empty for tables the rule knows nothing about.
    pub fn actual_data_nodes(&self, logic_table: &str) -> &[DataNode] {
        let key = logic_table.to_ascii_lowercase();
        match self.table_rules.get(&key) {
            Some(rule) => rule.actual_data_nodes(),
            None => self
                .plain_data_nodes
                .get(&key)
                .map(Vec::as_slice)
                .unwrap_or_default(),
        }
    }

    pub fn find_generate_key_column(&self, logic_table: &str) -> Option<&str> {
        self.find_table_rule(logic_table)
            .and_then(TableRule::generate_key_column)
    }

    /// A new value for the generated key column of `logic_table`.
    pub fn generate_key(&self, logic_table: &str) -> Option<Value> {
        self.find_table_rule(logic_table)
            .and_then(TableRule::generate_key)
    }

    pub fn is_generate_key_column(&self, column: &str, logic_table: &str) -> bool {
        self.find_generate_key_column(logic_table)
            .is_some_and(|c| c.eq_ignore_ascii_case(column))
    }

    pub fn is_sharding_column(&self, column: &str, logic_table: &str) -> bool {
        self.find_table_rule(logic_table)
            .is_some_and(|rule| rule.is_sharding_column(column))
    }
}

fn create_algorithms(
    config: &ShardingRuleConfig,
    registry: &AlgorithmRegistry,
) -> Result<BTreeMap<String, ShardingAlgorithm>> {
    config
        .sharding_algorithms
        .iter()
        .map(|(name, algorithm)| {
            let factory =
                registry
                    .get(&algorithm.type_name)
                    .ok_or_else(|| Error::UnknownAlgorithmType {
                        name: name.clone(),
                        type_name: algorithm.type_name.clone(),
                    })?;
            let created = factory(&algorithm.props).map_err(|source| Error::InvalidAlgorithm {
                name: name.clone(),
                source,
            })?;
            Ok((name.clone(), created))
        })
        .collect()
}

fn create_key_generators(
    config: &ShardingRuleConfig,
    registry: &AlgorithmRegistry,
) -> Result<BTreeMap<String, Arc<dyn KeyGenerateAlgorithm>>> {
    config
        .key_generators
        .iter()
        .map(|(name, generator)| {
            let factory = registry
                .get_key_generator(&generator.type_name)
                .ok_or_else(|| Error::UnknownAlgorithmType {
                    name: name.clone(),
                    type_name: generator.type_name.clone(),
                })?;
            let created = factory(&generator.props).map_err(|source| Error::InvalidAlgorithm {
                name: name.clone(),
                source,
            })?;
            Ok((name.clone(), created))
        })
        .collect()
}

/// Key generators by name, plus the `SNOWFLAKE` generator shared by every
/// strategy that names none.
struct KeyGenerators {
    named: BTreeMap<String, Arc<dyn KeyGenerateAlgorithm>>,
    default: Option<Arc<dyn KeyGenerateAlgorithm>>,
}

impl KeyGenerators {
    fn resolve(
        &mut self,
        table: &str,
        strategy: &KeyGenerateStrategyConfig,
    ) -> Result<Arc<dyn KeyGenerateAlgorithm>> {
        let Some(name) = &strategy.key_generator_name else {
            if let Some(generator) = &self.default {
                return Ok(Arc::clone(generator));
            }
            let generator = SnowflakeKeyGenerateAlgorithm::create(&Props::new()).map_err(
                |source| Error::InvalidAlgorithm {
                    name: SnowflakeKeyGenerateAlgorithm::TYPE.to_owned(),
                    source,
                },
            )?;
            self.default = Some(Arc::clone(&generator));
            return Ok(generator);
        };
        self.named
            .get(name)
            .map(Arc::clone)
            .ok_or_else(|| Error::UnknownKeyGenerator {
                table: table.to_owned(),
                name: name.clone(),
            })
    }
}

fn parse_data_nodes(logic_table: &str, expression: &str) -> Result<Vec<DataNode>> {
    let expanded =
        inline::expand(expression).map_err(|source| Error::InvalidInlineExpression {
            expression: expression.to_owned(),
            source,
        })?;

    let mut nodes: Vec<DataNode> = vec![];
    for entry in expanded {
        let node: DataNode = entry.parse()?;
        if !nodes.contains(&node) {
            nodes.push(node);
        }
    }
    if nodes.is_empty() {
        return Err(Error::EmptyDataNodes {
            table: logic_table.to_owned(),
        });
    }
    Ok(nodes)
}

struct StrategyBuilder<'a> {
    algorithms: &'a BTreeMap<String, ShardingAlgorithm>,
    default_column: Option<&'a str>,
}

impl StrategyBuilder<'_> {
    fn build(&self, table: &str, config: Option<&StrategyConfig>) -> Result<ShardingStrategy> {
        let Some(config) = config else {
            return Ok(ShardingStrategy::None);
        };

        match config {
            StrategyConfig::None => Ok(ShardingStrategy::None),
            StrategyConfig::Standard {
                sharding_column,
                algorithm_name,
            } => {
                let column = sharding_column
                    .clone()
                    .or_else(|| self.default_column.map(str::to_owned))
                    .ok_or_else(|| Error::MissingShardingColumn {
                        table: table.to_owned(),
                    })?;
                match self.algorithm(table, algorithm_name)? {
                    ShardingAlgorithm::Standard(algorithm) => Ok(ShardingStrategy::Standard {
                        column,
                        algorithm: Arc::clone(algorithm),
                    }),
                    other => Err(mismatch(table, algorithm_name, AlgorithmKind::Standard, other)),
                }
            }
            StrategyConfig::Complex {
                sharding_columns,
                algorithm_name,
            } => {
                if sharding_columns.is_empty() {
                    return Err(Error::MissingShardingColumn {
                        table: table.to_owned(),
                    });
                }
                match self.algorithm(table, algorithm_name)? {
                    ShardingAlgorithm::Complex(algorithm) => Ok(ShardingStrategy::Complex {
                        columns: sharding_columns.clone(),
                        algorithm: Arc::clone(algorithm),
                    }),
                    other => Err(mismatch(table, algorithm_name, AlgorithmKind::Complex, other)),
                }
            }
            StrategyConfig::Hint { algorithm_name } => {
                match self.algorithm(table, algorithm_name)? {
                    ShardingAlgorithm::Hint(algorithm) => Ok(ShardingStrategy::Hint {
                        algorithm: Arc::clone(algorithm),
                    }),
                    other => Err(mismatch(table, algorithm_name, AlgorithmKind::Hint, other)),
                }
            }
        }
    }

    fn algorithm(&self, table: &str, name: &str) -> Result<&ShardingAlgorithm> {
        self.algorithms
            .get(name)
            .ok_or_else(|| Error::UnknownAlgorithm {
                table: table.to_owned(),
                name: name.to_owned(),
            })
    }
}

fn mismatch(
    table: &str,
    name: &str,
    strategy: AlgorithmKind,
    algorithm: &ShardingAlgorithm,
) -> Error {
    Error::AlgorithmKindMismatch {
        table: table.to_owned(),
        name: name.to_owned(),
        strategy,
        algorithm: algorithm.kind(),
    }
}

type BindingGroups = (Vec<Vec<String>>, HashMap<String, usize>);

fn binding_groups(
    config: &ShardingRuleConfig,
    table_rules: &IndexMap<String, TableRule>,
) -> Result<BindingGroups> {
    let mut groups = vec![];
    let mut index = HashMap::new();

    for group in &config.binding_tables {
        let members: Vec<String> = group
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_owned)
            .collect();
        if members.is_empty() {
            continue;
        }

        let mut first: Option<&TableRule> = None;
        for member in &members {
            let key = member.to_ascii_lowercase();
            let rule = table_rules
                .get(&key)
                .ok_or_else(|| Error::BindingTableNotSharded {
                    table: member.clone(),
                })?;
            if index.insert(key, groups.len()).is_some() {
                return Err(Error::DuplicateBindingTable {
                    table: member.clone(),
                });
            }

            match first {
                None => first = Some(rule),
                Some(first) if first.shape() != rule.shape() => {
                    return Err(Error::InconsistentBindingTables {
                        first: first.logic_table().to_owned(),
                        second: rule.logic_table().to_owned(),
                    });
                }
                Some(_) => {}
            }
        }
        groups.push(members);
    }

    Ok((groups, index))
}
