use indexmap::IndexMap;
use itertools::Itertools;
use sharding_rule::{DataNode, ShardingRule, ShardingStrategy, TableRule};
use sql_statement::{Statement, StatementContext, Value};
use tracing::{debug, info, trace};

use crate::{
    Error, HintContext, Result, RouteContext, RouteMapper, RouteProps, RouteUnit,
    condition::{ShardingCondition, ShardingConditions, extract_conditions},
    dispatch::route_strategy,
    generated_key::fill_generated_key,
    hint::Hints,
    validator,
};

/// Candidate units per data source, each entry the table mappers of one
/// unit.
type Alternatives = IndexMap<String, Vec<Vec<RouteMapper>>>;

/// Routes statements against a [`ShardingRule`] snapshot.
///
/// The engine holds no state besides its [`RouteProps`]; one instance can
/// route any number of statements concurrently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShardingRouteEngine {
    props: RouteProps,
}

impl ShardingRouteEngine {
    pub fn new(props: RouteProps) -> Self {
        Self { props }
    }

    pub fn props(&self) -> RouteProps {
        self.props
    }

    /// Computes every unit `ctx` must run on.
    ///
    /// `hint` is the active [`HintContext`] of the caller's scope, if any.
    /// Its values take precedence over the hints embedded in the SQL text.
    ///
    /// An INSERT that omits its generated key column is routed with freshly
    /// generated keys, returned in [`RouteContext::generated_key`].
    pub fn route(
        &self,
        rule: &ShardingRule,
        ctx: &StatementContext,
        hint: Option<&HintContext>,
    ) -> Result<RouteContext> {
        let generated = fill_generated_key(rule, ctx);
        let ctx = generated.as_ref().map_or(ctx, |(filled, _)| filled);

        validator::pre_validate(rule, ctx)?;

        let router = Router::new(rule, ctx, hint);
        let mut route = router.route()?;

        if router.is_hint_forced() {
            debug!(
                statement = ctx.statement.kind(),
                "hint forced route, skipping post validation"
            );
        } else {
            validator::post_validate(rule, ctx, hint, &route)?;
        }

        if self.props.sql_show {
            self.show(ctx, &route);
        }
        if let Some((_, key)) = generated {
            route.set_generated_key(key);
        }
        Ok(route)
    }

    fn show(&self, ctx: &StatementContext, route: &RouteContext) {
        let statement = ctx.statement.kind();
        for unit in route.units() {
            if self.props.sql_simple {
                info!(statement, %unit, "route unit");
            } else {
                info!(statement, %unit, parameters = ?ctx.parameters, "route unit");
            }
        }
    }
}

/// The route of one sharding table.
#[derive(Debug)]
struct TableRoute<'r> {
    rule: &'r TableRule,
    /// Union of `per_condition`, in configured order.
    nodes: Vec<DataNode>,
    per_condition: Vec<Vec<DataNode>>,
    /// Whether extracted or hinted values narrowed the route.
    constrained: bool,
}

impl TableRoute<'_> {
    fn logic_table(&self) -> &str {
        self.rule.logic_table()
    }

    /// `(data source, slot)` of every routed node.
    fn slots(&self) -> Vec<(String, usize)> {
        self.nodes
            .iter()
            .filter_map(|node| {
                self.rule
                    .slot_of(&node.data_source, &node.table)
                    .map(|slot| (node.data_source.clone(), slot))
            })
            .collect()
    }
}

/// Routes one statement with the hints it was issued under.
#[derive(Debug)]
pub(crate) struct Router<'a> {
    rule: &'a ShardingRule,
    ctx: &'a StatementContext,
    hints: Hints<'a>,
}

impl<'a> Router<'a> {
    pub(crate) fn new(
        rule: &'a ShardingRule,
        ctx: &'a StatementContext,
        hint: Option<&'a HintContext>,
    ) -> Self {
        Self {
            rule,
            ctx,
            hints: Hints::new(hint, &ctx.hints),
        }
    }

    /// Whether a hint decides the data source regardless of the statement.
    pub(crate) fn is_hint_forced(&self) -> bool {
        self.hints.data_source_name().is_some() || self.hints.database_only_values().is_some()
    }

    pub(crate) fn route(&self) -> Result<RouteContext> {
        let mut route = if let Some(name) = self.hints.data_source_name() {
            self.route_to_data_source(name)?
        } else if let Some(values) = self.hints.database_only_values() {
            self.route_database_only(values)?
        } else {
            let conditions = extract_conditions(self.rule, self.ctx)?;
            self.route_conditions(&conditions)?
        };
        route.set_write_route_only(self.hints.is_write_route_only());
        Ok(route)
    }

    fn route_to_data_source(&self, name: &str) -> Result<RouteContext> {
        let data_source =
            self.rule
                .find_data_source(name)
                .ok_or_else(|| Error::UnknownDataSource {
                    name: name.to_owned(),
                })?;
        debug!(data_source, "routing to hinted data source");
        Ok(self.unrewritten(data_source))
    }

    fn route_database_only(&self, values: &[Value]) -> Result<RouteContext> {
        let data_sources = self.rule.data_source_names();
        let targets: Vec<String> = match self.rule.default_database_strategy() {
            ShardingStrategy::None => data_sources
                .iter()
                .filter(|ds| values.iter().any(|v| ds.eq_ignore_ascii_case(&v.to_string())))
                .cloned()
                .collect(),
            strategy => {
                let table = self.ctx.table_names().into_iter().next().unwrap_or_default();
                route_strategy(strategy, &table, None, values, data_sources)?.targets
            }
        };

        match targets.as_slice() {
            [data_source] => {
                debug!(data_source, "routing by database sharding hint");
                Ok(self.unrewritten(data_source))
            }
            _ => Err(Error::HintDatabaseRouteNotSingle {
                count: targets.len(),
            }),
        }
    }

    /// One unit on `data_source` with every table left as is.
    fn unrewritten(&self, data_source: &str) -> RouteContext {
        let mappers = self
            .ctx
            .table_names()
            .into_iter()
            .map(RouteMapper::unchanged)
            .collect();
        let mut route = RouteContext::new();
        route.push(RouteUnit::new(data_source, mappers));
        route
    }

    /// Routes the statement's tables with `conditions` and merges the result
    /// into units.
    pub(crate) fn route_conditions(&self, conditions: &ShardingConditions) -> Result<RouteContext> {
        let table_names = self.ctx.table_names();

        let mut sharding = vec![];
        let mut broadcast = vec![];
        let mut pinned = vec![];
        for name in &table_names {
            if let Some(table_rule) = self.rule.find_table_rule(name) {
                sharding.push(table_rule);
            } else if self.rule.is_broadcast_table(name) {
                broadcast.push(RouteMapper::unchanged(name.as_str()));
            } else if let Some(data_source) = self
                .rule
                .single_table_data_source(name)
                .or(self.rule.default_data_source())
            {
                pinned.push((name.as_str(), data_source));
            } else {
                return Err(Error::UnknownTable {
                    table: name.clone(),
                });
            }
        }

        let mut original_data_nodes = vec![];
        let mut routes = Vec::with_capacity(sharding.len());
        for table_rule in sharding {
            let routed = self.route_table(table_rule, conditions)?;
            if self.is_insert_target(table_rule.logic_table()) {
                original_data_nodes = routed.per_condition.clone();
            }
            routes.push(routed);
        }

        let has_sharding = !routes.is_empty();
        let mut alternatives = if has_sharding {
            merge(self.rule, routes)?
        } else {
            Alternatives::new()
        };

        if let Some(data_source) = pinned_data_source(&pinned)? {
            if has_sharding {
                alternatives.retain(|ds, _| ds.eq_ignore_ascii_case(data_source));
                if alternatives.is_empty() {
                    return Err(Error::CrossDataSource {
                        tables: table_names.clone(),
                    });
                }
            } else {
                alternatives.insert(data_source.to_owned(), vec![vec![]]);
            }
            let mappers = pinned
                .iter()
                .map(|(table, _)| RouteMapper::unchanged(*table))
                .collect_vec();
            extend_all(&mut alternatives, &mappers);
        }

        if alternatives.is_empty() {
            // Only broadcast tables, or no table at all.
            let data_sources = self.rule.data_source_names();
            let count = if broadcast.is_empty() {
                1
            } else {
                data_sources.len()
            };
            for data_source in data_sources.iter().take(count) {
                alternatives.insert(data_source.clone(), vec![vec![]]);
            }
        }
        extend_all(&mut alternatives, &broadcast);

        let mut route = RouteContext::new();
        for (data_source, candidates) in alternatives {
            for mut mappers in candidates {
                mappers.sort_by_key(|m| table_position(&table_names, &m.logic_name));
                let unit = RouteUnit::new(data_source.as_str(), mappers);
                trace!(%unit, "route unit");
                route.push(unit);
            }
        }
        route.set_original_data_nodes(original_data_nodes);

        debug!(
            statement = self.ctx.statement.kind(),
            units = route.len(),
            "routed statement"
        );
        Ok(route)
    }

    /// Routes one sharding table, database strategy first, then the table
    /// strategy on every selected data source. Each condition is routed on
    /// its own.
    fn route_table<'r>(
        &self,
        table_rule: &'r TableRule,
        conditions: &ShardingConditions,
    ) -> Result<TableRoute<'r>> {
        let logic_table = table_rule.logic_table();
        let database_values = self.hints.database_values(logic_table);
        let table_values = self.hints.table_values(logic_table);
        let data_sources = table_rule.data_source_names();

        let inputs: Vec<Option<&ShardingCondition>> = if conditions.is_empty() {
            vec![None]
        } else {
            conditions.conditions().iter().map(Some).collect()
        };

        let mut constrained = false;
        let mut per_condition = Vec::with_capacity(inputs.len());
        for condition in inputs {
            let databases = route_strategy(
                table_rule.database_strategy(),
                logic_table,
                condition,
                &database_values,
                &data_sources,
            )?;
            constrained |= databases.constrained;

            let mut nodes = vec![];
            for data_source in &databases.targets {
                let tables = route_strategy(
                    table_rule.table_strategy(),
                    logic_table,
                    condition,
                    &table_values,
                    table_rule.actual_tables(data_source),
                )?;
                constrained |= tables.constrained;
                nodes.extend(
                    tables
                        .targets
                        .into_iter()
                        .map(|table| DataNode::new(data_source.as_str(), table)),
                );
            }
            per_condition.push(nodes);
        }

        let nodes = table_rule
            .actual_data_nodes()
            .iter()
            .filter(|node| per_condition.iter().any(|nodes| nodes.contains(node)))
            .cloned()
            .collect_vec();
        debug!(
            table = logic_table,
            nodes = nodes.len(),
            constrained,
            "routed sharding table"
        );

        Ok(TableRoute {
            rule: table_rule,
            nodes,
            per_condition,
            constrained,
        })
    }

    fn is_insert_target(&self, logic_table: &str) -> bool {
        matches!(
            &self.ctx.statement,
            Statement::Insert(insert)
                if insert.select.is_none() && insert.table.name.eq_ignore_ascii_case(logic_table)
        )
    }
}

/// Merges the routes of all sharding tables.
///
/// Tables of one binding group move in lockstep and form one group; every
/// other table is a group of its own. Groups are combined per data source by
/// cartesian product, on the data sources all of them selected.
fn merge(rule: &ShardingRule, routes: Vec<TableRoute<'_>>) -> Result<Alternatives> {
    let mut groups: Vec<(Option<usize>, Vec<TableRoute<'_>>)> = vec![];
    for route in routes {
        let binding = rule.binding_group_index(route.logic_table());
        match groups
            .iter()
            .position(|(group, _)| binding.is_some() && *group == binding)
        {
            Some(idx) => groups[idx].1.push(route),
            None => groups.push((binding, vec![route])),
        }
    }

    let mut tables = vec![];
    let mut merged: Option<Alternatives> = None;
    for (_, members) in groups {
        tables.extend(members.iter().map(|m| m.logic_table().to_owned()));
        let alternatives = merge_binding(&members)?;
        merged = Some(match merged {
            None => alternatives,
            Some(acc) => combine(acc, &alternatives),
        });
    }

    match merged {
        Some(alternatives) if !alternatives.is_empty() => Ok(alternatives),
        _ => Err(Error::CrossDataSource { tables }),
    }
}

/// Lines up the members of one binding group by slot.
///
/// The first member that was narrowed by a value is the reference; every
/// other narrowed member must have selected the same slots. The rest follow
/// the reference.
fn merge_binding(members: &[TableRoute<'_>]) -> Result<Alternatives> {
    let mut alternatives = Alternatives::new();
    let Some(reference) = members
        .iter()
        .find(|m| m.constrained)
        .or_else(|| members.first())
    else {
        return Ok(alternatives);
    };

    let inconsistent = |member: &TableRoute<'_>| Error::BindingInconsistency {
        first: reference.logic_table().to_owned(),
        second: member.logic_table().to_owned(),
    };

    let slots = reference.slots();
    for member in members.iter().filter(|m| m.constrained) {
        let other = member.slots();
        if other.len() != slots.len() || !other.iter().all(|s| slots.contains(s)) {
            return Err(inconsistent(member));
        }
    }

    for (data_source, slot) in &slots {
        let mappers = members
            .iter()
            .map(|member| {
                member
                    .rule
                    .table_at(data_source, *slot)
                    .map(|table| RouteMapper::new(member.logic_table(), table))
                    .ok_or_else(|| inconsistent(member))
            })
            .collect::<Result<Vec<_>>>()?;
        alternatives
            .entry(data_source.clone())
            .or_default()
            .push(mappers);
    }

    if members.len() > 1 {
        debug!(
            tables = ?members.iter().map(TableRoute::logic_table).collect_vec(),
            reference = reference.logic_table(),
            units = slots.len(),
            "merged binding tables"
        );
    }
    Ok(alternatives)
}

/// Cartesian product of two groups on every data source both selected.
fn combine(left: Alternatives, right: &Alternatives) -> Alternatives {
    left.into_iter()
        .filter_map(|(data_source, candidates)| {
            let others = right.get(&data_source)?;
            let product: Vec<Vec<RouteMapper>> = candidates
                .iter()
                .cartesian_product(others)
                .map(|(a, b)| a.iter().chain(b).cloned().collect())
                .collect();
            Some((data_source, product))
        })
        .collect()
}

/// The one data source all single tables live on.
fn pinned_data_source<'a>(pinned: &[(&str, &'a str)]) -> Result<Option<&'a str>> {
    let mut found: Option<&'a str> = None;
    for (_, data_source) in pinned {
        match found {
            None => found = Some(*data_source),
            Some(current) if current.eq_ignore_ascii_case(data_source) => {}
            Some(_) => {
                return Err(Error::CrossDataSource {
                    tables: pinned.iter().map(|(t, _)| (*t).to_owned()).collect(),
                });
            }
        }
    }
    Ok(found)
}

fn extend_all(alternatives: &mut Alternatives, mappers: &[RouteMapper]) {
    if mappers.is_empty() {
        return;
    }
    for candidate in alternatives.values_mut().flatten() {
        candidate.extend_from_slice(mappers);
    }
}

fn table_position(table_names: &[String], logic_table: &str) -> usize {
    table_names
        .iter()
        .position(|n| n.eq_ignore_ascii_case(logic_table))
        .unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use sql_statement::{
        Expr, InsertStatement, SelectStatement, SqlHints, StatementContext, TableRef,
    };

    use super::*;
    use crate::test_util::{col_eq, order_rule, select, units};

    fn route(ctx: &StatementContext) -> Result<RouteContext> {
        ShardingRouteEngine::default().route(&order_rule(), ctx, None)
    }

    fn join(tables: Vec<TableRef>, on: Expr, where_clause: Expr) -> StatementContext {
        StatementContext::new(Statement::Select(SelectStatement {
            tables,
            where_clause: Some(where_clause),
            join_conditions: vec![on],
            limit: None,
        }))
    }

    #[test]
    fn both_sharding_values_route_to_one_unit() {
        let ctx = select(
            vec![TableRef::new("t_order")],
            Some(Expr::and([col_eq("order_id", 5), col_eq("user_id", 1)])),
        );
        let route = route(&ctx).unwrap();

        assert_eq!(units(&route), vec!["ds_1: t_order -> t_order_1"]);
        assert!(route.is_single_routing());
    }

    #[test]
    fn table_value_only_routes_every_data_source() {
        let ctx = select(vec![TableRef::new("t_order")], Some(col_eq("order_id", 5)));

        assert_eq!(
            units(&route(&ctx).unwrap()),
            vec!["ds_0: t_order -> t_order_1", "ds_1: t_order -> t_order_1"]
        );
    }

    #[test]
    fn no_condition_routes_every_node_in_configured_order() {
        let ctx = select(vec![TableRef::new("t_order")], None);

        assert_eq!(
            units(&route(&ctx).unwrap()),
            vec![
                "ds_0: t_order -> t_order_0",
                "ds_0: t_order -> t_order_1",
                "ds_1: t_order -> t_order_0",
                "ds_1: t_order -> t_order_1",
            ]
        );
    }

    #[test]
    fn binding_tables_follow_the_constrained_member() {
        let ctx = join(
            vec![
                TableRef::aliased("t_order", "o"),
                TableRef::aliased("t_order_item", "i"),
            ],
            Expr::qualified_column("o", "order_id").eq(Expr::qualified_column("i", "order_id")),
            Expr::and([
                Expr::qualified_column("o", "order_id").eq(Expr::literal(5)),
                Expr::qualified_column("o", "user_id").eq(Expr::literal(1)),
            ]),
        );

        assert_eq!(
            units(&route(&ctx).unwrap()),
            vec!["ds_1: t_order -> t_order_1, t_order_item -> t_order_item_1"]
        );
    }

    #[test]
    fn binding_tables_without_condition_stay_in_lockstep() {
        let ctx = select(
            vec![TableRef::new("t_order_item"), TableRef::new("t_order")],
            None,
        );

        assert_eq!(
            units(&route(&ctx).unwrap()),
            vec![
                "ds_0: t_order_item -> t_order_item_0, t_order -> t_order_0",
                "ds_0: t_order_item -> t_order_item_1, t_order -> t_order_1",
                "ds_1: t_order_item -> t_order_item_0, t_order -> t_order_0",
                "ds_1: t_order_item -> t_order_item_1, t_order -> t_order_1",
            ]
        );
    }

    #[test]
    fn binding_tables_with_different_slots_fail() {
        let ctx = join(
            vec![
                TableRef::aliased("t_order", "o"),
                TableRef::aliased("t_order_item", "i"),
            ],
            Expr::qualified_column("o", "order_id").eq(Expr::qualified_column("i", "order_id")),
            Expr::and([
                Expr::qualified_column("o", "order_id").eq(Expr::literal(5)),
                Expr::qualified_column("i", "order_id").eq(Expr::literal(4)),
            ]),
        );

        assert_matches!(
            route(&ctx),
            Err(Error::BindingInconsistency { first, second })
                if first == "t_order" && second == "t_order_item"
        );
    }

    #[test]
    fn unbound_tables_are_combined_per_data_source() {
        let ctx = select(
            vec![
                TableRef::aliased("t_order", "o"),
                TableRef::aliased("t_account", "a"),
            ],
            Some(Expr::and([
                Expr::qualified_column("o", "user_id").eq(Expr::literal(1)),
                Expr::qualified_column("o", "order_id").eq(Expr::literal(2)),
                Expr::qualified_column("a", "user_id").eq(Expr::literal(1)),
            ])),
        );

        assert_eq!(
            units(&route(&ctx).unwrap()),
            vec![
                "ds_1: t_order -> t_order_0, t_account -> t_account_0",
                "ds_1: t_order -> t_order_0, t_account -> t_account_1",
            ]
        );
    }

    #[test]
    fn unbound_tables_on_disjoint_data_sources_fail() {
        let ctx = select(
            vec![
                TableRef::aliased("t_order", "o"),
                TableRef::aliased("t_account", "a"),
            ],
            Some(Expr::and([
                Expr::qualified_column("o", "user_id").eq(Expr::literal(1)),
                Expr::qualified_column("a", "user_id").eq(Expr::literal(0)),
            ])),
        );

        assert_matches!(route(&ctx), Err(Error::CrossDataSource { tables }) => {
            assert_eq!(tables, vec!["t_order", "t_account"]);
        });
    }

    #[test]
    fn broadcast_only_statement_routes_every_data_source() {
        let ctx = select(vec![TableRef::new("t_config")], None);

        assert_eq!(
            units(&route(&ctx).unwrap()),
            vec!["ds_0: t_config -> t_config", "ds_1: t_config -> t_config"]
        );
    }

    #[test]
    fn broadcast_table_joins_every_sharded_unit() {
        let ctx = select(
            vec![TableRef::new("t_config"), TableRef::new("t_order")],
            Some(Expr::and([col_eq("user_id", 0), col_eq("order_id", 3)])),
        );

        assert_eq!(
            units(&route(&ctx).unwrap()),
            vec!["ds_0: t_config -> t_config, t_order -> t_order_1"]
        );
    }

    #[test]
    fn single_table_pins_the_data_source() {
        let ctx = select(vec![TableRef::new("t_user")], None);
        assert_eq!(units(&route(&ctx).unwrap()), vec!["ds_1: t_user -> t_user"]);

        let ctx = select(
            vec![TableRef::new("t_order"), TableRef::new("t_user")],
            Some(col_eq("order_id", 0)),
        );
        assert_eq!(
            units(&route(&ctx).unwrap()),
            vec!["ds_1: t_order -> t_order_0, t_user -> t_user"]
        );
    }

    #[test]
    fn single_tables_on_different_data_sources_fail() {
        let ctx = select(
            vec![TableRef::new("t_user"), TableRef::new("t_address")],
            None,
        );
        assert_matches!(route(&ctx), Err(Error::CrossDataSource { .. }));

        let ctx = select(
            vec![TableRef::new("t_order"), TableRef::new("t_address")],
            Some(col_eq("user_id", 1)),
        );
        assert_matches!(route(&ctx), Err(Error::CrossDataSource { .. }));
    }

    #[test]
    fn unknown_table() {
        let ctx = select(vec![TableRef::new("t_missing")], None);
        assert_matches!(route(&ctx), Err(Error::UnknownTable { table }) if table == "t_missing");
    }

    #[test]
    fn statement_without_tables_routes_to_first_data_source() {
        let ctx = select(vec![], None);
        assert_eq!(units(&route(&ctx).unwrap()), vec!["ds_0: -"]);
    }

    #[test]
    fn hinted_data_source_routes_unrewritten() {
        let ctx = select(
            vec![TableRef::new("t_order"), TableRef::new("t_config")],
            Some(col_eq("user_id", 0)),
        )
        .with_sql("/* SHARDINGSPHERE_HINT: DATA_SOURCE_NAME=ds_1 */ SELECT ...");

        assert_eq!(
            units(&route(&ctx).unwrap()),
            vec!["ds_1: t_order -> t_order, t_config -> t_config"]
        );

        let mut ctx = ctx;
        ctx.hints = SqlHints::parse("/* SHARDINGSPHERE_HINT: DATA_SOURCE_NAME=ds_9 */");
        assert_matches!(
            route(&ctx),
            Err(Error::UnknownDataSource { name }) if name == "ds_9"
        );
    }

    #[test]
    fn database_only_hint_matches_data_source_names() {
        let rule = order_rule();
        let engine = ShardingRouteEngine::default();
        let ctx = select(vec![TableRef::new("t_order")], None);

        let mut hint = HintContext::default();
        hint.set_database_sharding_value("ds_0");
        let route = engine.route(&rule, &ctx, Some(&hint)).unwrap();
        assert_eq!(units(&route), vec!["ds_0: t_order -> t_order"]);

        hint.set_database_sharding_value(7);
        assert_matches!(
            engine.route(&rule, &ctx, Some(&hint)),
            Err(Error::HintDatabaseRouteNotSingle { count: 0 })
        );
    }

    #[test]
    fn hint_strategies_use_hint_values() {
        let rule = order_rule();
        let engine = ShardingRouteEngine::default();
        let ctx = select(vec![TableRef::new("t_log")], None);

        assert_eq!(engine.route(&rule, &ctx, None).unwrap().len(), 4);

        let mut hint = HintContext::default();
        hint.add_database_sharding_value("t_log", 3);
        hint.add_table_sharding_value("T_LOG", 2);
        let route = engine.route(&rule, &ctx, Some(&hint)).unwrap();
        assert_eq!(units(&route), vec!["ds_1: t_log -> t_log_0"]);

        let ctx = ctx.with_sql("/* SHARDINGSPHERE_HINT: t_log.SHARDING_TABLE_VALUE=1 */");
        let route = engine.route(&rule, &ctx, None).unwrap();
        assert_eq!(
            units(&route),
            vec!["ds_0: t_log -> t_log_1", "ds_1: t_log -> t_log_1"]
        );
    }

    #[test]
    fn write_route_only_is_carried() {
        let ctx = select(vec![TableRef::new("t_config")], None)
            .with_sql("/* SHARDINGSPHERE_HINT: WRITE_ROUTE_ONLY=true */");
        assert!(route(&ctx).unwrap().is_write_route_only());

        let ctx = select(vec![TableRef::new("t_config")], None);
        assert!(!route(&ctx).unwrap().is_write_route_only());
    }

    #[test]
    fn multi_row_insert_keeps_nodes_per_row() {
        let insert = InsertStatement::new("t_order", vec!["order_id".into(), "user_id".into()])
            .with_row(vec![Expr::literal(1), Expr::literal(1)])
            .with_row(vec![Expr::param(0), Expr::literal(1)]);
        let ctx = StatementContext::new(Statement::Insert(insert)).with_parameters(vec![Value::from(2)]);

        let route = route(&ctx).unwrap();
        assert_eq!(
            units(&route),
            vec!["ds_1: t_order -> t_order_0", "ds_1: t_order -> t_order_1"]
        );
        assert_eq!(
            route.original_data_nodes(),
            [
                vec![DataNode::new("ds_1", "t_order_1")],
                vec![DataNode::new("ds_1", "t_order_0")],
            ]
        );
    }

    #[test]
    fn unbound_algorithm_value_is_an_error() {
        let ctx = select(
            vec![TableRef::new("t_order")],
            Some(Expr::column("order_id").eq(Expr::literal("abc"))),
        );
        assert_matches!(route(&ctx), Err(Error::Algorithm { table, .. }) if table == "t_order");
    }

    #[test]
    fn numeric_text_values_compare_numerically() {
        let ctx = select(
            vec![TableRef::new("t_order")],
            Some(Expr::and([
                Expr::column("order_id").in_list(vec![Expr::literal("8"), Expr::literal(3)]),
                Expr::column("order_id").lt(Expr::literal("10")),
                col_eq("user_id", 0),
            ])),
        );

        assert_eq!(
            units(&route(&ctx).unwrap()),
            vec!["ds_0: t_order -> t_order_0", "ds_0: t_order -> t_order_1"]
        );
    }

    #[test_log::test]
    fn sql_show_does_not_change_the_route() {
        let ctx = select(vec![TableRef::new("t_order")], Some(col_eq("order_id", 5)));
        let rule = order_rule();

        let plain = ShardingRouteEngine::default().route(&rule, &ctx, None).unwrap();
        let shown = ShardingRouteEngine::new(RouteProps::default().with_sql_show(true))
            .route(&rule, &ctx, None)
            .unwrap();
        assert_eq!(units(&plain), units(&shown));
    }
}
