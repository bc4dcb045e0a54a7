use std::fmt;

use indexmap::IndexSet;
use serde::Serialize;
use sharding_rule::DataNode;

use crate::GeneratedKey;

/// A logic name and the actual name it is rewritten to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RouteMapper {
    pub logic_name: String,
    pub actual_name: String,
}

impl RouteMapper {
    pub fn new(logic_name: impl Into<String>, actual_name: impl Into<String>) -> Self {
        Self {
            logic_name: logic_name.into(),
            actual_name: actual_name.into(),
        }
    }

    /// A name that is not rewritten.
    pub fn unchanged(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            logic_name: name.clone(),
            actual_name: name,
        }
    }
}

/// One physical execution target: a data source and the actual tables the
/// statement touches on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RouteUnit {
    pub data_source_mapper: RouteMapper,
    pub table_mappers: Vec<RouteMapper>,
}

impl RouteUnit {
    pub fn new(data_source: impl Into<String>, table_mappers: Vec<RouteMapper>) -> Self {
        Self {
            data_source_mapper: RouteMapper::unchanged(data_source),
            table_mappers,
        }
    }

    pub fn data_source(&self) -> &str {
        &self.data_source_mapper.actual_name
    }

    pub fn find_actual_table(&self, logic_table: &str) -> Option<&str> {
        self.table_mappers
            .iter()
            .find(|m| m.logic_name.eq_ignore_ascii_case(logic_table))
            .map(|m| m.actual_name.as_str())
    }

    pub fn data_nodes(&self) -> impl Iterator<Item = DataNode> + '_ {
        self.table_mappers
            .iter()
            .map(|m| DataNode::new(self.data_source(), m.actual_name.as_str()))
    }
}

impl fmt::Display for RouteUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.data_source())?;
        if self.table_mappers.is_empty() {
            return write!(f, " -");
        }
        for (idx, mapper) in self.table_mappers.iter().enumerate() {
            let sep = if idx == 0 { " " } else { ", " };
            write!(f, "{sep}{} -> {}", mapper.logic_name, mapper.actual_name)?;
        }
        Ok(())
    }
}

/// Where one statement runs: an ordered, duplicate free set of
/// [`RouteUnit`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RouteContext {
    units: IndexSet<RouteUnit>,
    /// Data nodes of the INSERT target, one entry per VALUES row.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    original_data_nodes: Vec<Vec<DataNode>>,
    write_route_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    generated_key: Option<GeneratedKey>,
}

impl RouteContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `unit` unless an equal unit is present; returns whether it was
    /// added.
    pub fn push(&mut self, unit: RouteUnit) -> bool {
        self.units.insert(unit)
    }

    pub fn units(&self) -> impl Iterator<Item = &RouteUnit> {
        self.units.iter()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Exactly one unit touching exactly one table.
    pub fn is_single_routing(&self) -> bool {
        self.units.len() == 1 && self.units.iter().all(|u| u.table_mappers.len() == 1)
    }

    /// Distinct data sources, in unit order.
    pub fn data_source_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = vec![];
        for unit in &self.units {
            if !names.contains(&unit.data_source()) {
                names.push(unit.data_source());
            }
        }
        names
    }

    pub fn original_data_nodes(&self) -> &[Vec<DataNode>] {
        &self.original_data_nodes
    }

    pub(crate) fn set_original_data_nodes(&mut self, nodes: Vec<Vec<DataNode>>) {
        self.original_data_nodes = nodes;
    }

    pub fn is_write_route_only(&self) -> bool {
        self.write_route_only
    }

    pub(crate) fn set_write_route_only(&mut self, write_route_only: bool) {
        self.write_route_only = write_route_only;
    }

    /// Keys generated for an INSERT that omitted its generated key column.
    pub fn generated_key(&self) -> Option<&GeneratedKey> {
        self.generated_key.as_ref()
    }

    pub(crate) fn set_generated_key(&mut self, key: GeneratedKey) {
        self.generated_key = Some(key);
    }

    /// Whether both contexts hold the same units, regardless of order.
    pub fn same_units(&self, other: &Self) -> bool {
        self.units.len() == other.units.len() && self.units.iter().all(|u| other.units.contains(u))
    }
}

impl fmt::Display for RouteContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for unit in &self.units {
            writeln!(f, "{unit}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(ds: &str, tables: &[(&str, &str)]) -> RouteUnit {
        RouteUnit::new(
            ds,
            tables
                .iter()
                .map(|(logic, actual)| RouteMapper::new(*logic, *actual))
                .collect(),
        )
    }

    #[test]
    fn units_are_deduplicated_in_insertion_order() {
        let mut ctx = RouteContext::new();
        assert!(ctx.push(unit("ds_1", &[("t_order", "t_order_1")])));
        assert!(ctx.push(unit("ds_0", &[("t_order", "t_order_0")])));
        assert!(!ctx.push(unit("ds_1", &[("t_order", "t_order_1")])));

        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx.data_source_names(), vec!["ds_1", "ds_0"]);
        assert_eq!(ctx.to_string(), "ds_1: t_order -> t_order_1\nds_0: t_order -> t_order_0\n");
    }

    #[test]
    fn single_routing() {
        let mut ctx = RouteContext::new();
        assert!(!ctx.is_single_routing());

        ctx.push(unit("ds_0", &[("t_order", "t_order_0")]));
        assert!(ctx.is_single_routing());

        let mut joined = RouteContext::new();
        joined.push(unit(
            "ds_0",
            &[("t_order", "t_order_0"), ("t_order_item", "t_order_item_0")],
        ));
        assert!(!joined.is_single_routing());
    }

    #[test]
    fn same_units_ignores_order() {
        let a = unit("ds_0", &[("t_order", "t_order_0")]);
        let b = unit("ds_1", &[("t_order", "t_order_0")]);

        let mut first = RouteContext::new();
        first.push(a.clone());
        first.push(b.clone());
        let mut second = RouteContext::new();
        second.push(b);
        assert!(!first.same_units(&second));

        second.push(a);
        assert!(first.same_units(&second));
    }

    #[test]
    fn serializes_units() {
        let mut ctx = RouteContext::new();
        ctx.push(unit("ds_0", &[("t_order", "t_order_0")]));

        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "units": [{
                    "data_source_mapper": {"logic_name": "ds_0", "actual_name": "ds_0"},
                    "table_mappers": [{"logic_name": "t_order", "actual_name": "t_order_0"}],
                }],
                "write_route_only": false,
            })
        );
    }
}
