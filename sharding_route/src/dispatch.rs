//! Routing strategy dispatch.
//!
//! [`route_strategy`] maps the values extracted for one table onto the
//! targets (data sources or actual tables) a strategy may choose from. It is
//! a pure function: the same values and targets always give the same
//! targets, in the order they are available in.

use std::{collections::BTreeMap, ops::Bound};

use sharding_rule::{
    ShardingStrategy,
    algorithm::{
        AlgorithmError, ComplexKeysShardingValue, HintShardingValue, PreciseShardingValue,
        RangeShardingValue, StandardShardingAlgorithm, ValueRange,
    },
};
use sql_statement::Value;
use tracing::trace;

use crate::{
    Error, Result,
    condition::{ConditionValue, ShardingCondition},
};

/// Targets selected by one strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTargets {
    pub targets: Vec<String>,
    /// Whether extracted or hinted values narrowed the selection. An
    /// unconstrained selection is every available target.
    pub constrained: bool,
}

impl RouteTargets {
    fn all(available_targets: &[String]) -> Self {
        Self {
            targets: available_targets.to_vec(),
            constrained: false,
        }
    }
}

/// Routes `logic_table` through `strategy`.
///
/// * `none` selects every target.
/// * `standard` routes the extracted value of its column, falling back to
///   `hint_values` when nothing was extracted.
/// * `complex` needs a value for every one of its columns, otherwise it
///   selects every target.
/// * `hint` routes `hint_values` only.
///
/// A value that maps to no available target is an error.
pub fn route_strategy(
    strategy: &ShardingStrategy,
    logic_table: &str,
    condition: Option<&ShardingCondition>,
    hint_values: &[Value],
    available_targets: &[String],
) -> Result<RouteTargets> {
    let algorithm_error = |source: AlgorithmError| Error::Algorithm {
        table: logic_table.to_owned(),
        source,
    };

    let selected = match strategy {
        ShardingStrategy::None => return Ok(RouteTargets::all(available_targets)),
        ShardingStrategy::Standard { column, algorithm } => {
            let extracted = condition
                .and_then(|c| c.find(logic_table, column))
                .map(|v| &v.value);
            match extracted {
                Some(ConditionValue::List(values)) => {
                    precise(algorithm.as_ref(), logic_table, column, values, available_targets)?
                }
                Some(ConditionValue::Range(range)) => {
                    let targets = algorithm
                        .do_range_sharding(
                            available_targets,
                            &RangeShardingValue {
                                logic_table,
                                column,
                                range,
                            },
                        )
                        .map_err(algorithm_error)?;
                    if targets.is_empty() {
                        return Err(Error::NoRouteTarget {
                            table: logic_table.to_owned(),
                            value: describe_range(range),
                        });
                    }
                    targets
                }
                None if !hint_values.is_empty() => precise(
                    algorithm.as_ref(),
                    logic_table,
                    column,
                    hint_values,
                    available_targets,
                )?,
                None => return Ok(RouteTargets::all(available_targets)),
            }
        }
        ShardingStrategy::Complex { columns, algorithm } => {
            let mut values = BTreeMap::new();
            let mut ranges = BTreeMap::new();
            for column in columns {
                let key = column.to_ascii_lowercase();
                match condition
                    .and_then(|c| c.find(logic_table, column))
                    .map(|v| &v.value)
                {
                    Some(ConditionValue::List(list)) => {
                        values.insert(key, list.clone());
                    }
                    Some(ConditionValue::Range(range)) => {
                        ranges.insert(key, range.clone());
                    }
                    None => return Ok(RouteTargets::all(available_targets)),
                }
            }
            let targets = algorithm
                .do_sharding(
                    available_targets,
                    &ComplexKeysShardingValue {
                        logic_table,
                        values: &values,
                        ranges: &ranges,
                    },
                )
                .map_err(algorithm_error)?;
            if targets.is_empty() {
                return Err(Error::NoRouteTarget {
                    table: logic_table.to_owned(),
                    value: columns.join(", "),
                });
            }
            targets
        }
        ShardingStrategy::Hint { algorithm } => {
            if hint_values.is_empty() {
                return Ok(RouteTargets::all(available_targets));
            }
            let targets = algorithm
                .do_sharding(
                    available_targets,
                    &HintShardingValue {
                        logic_table,
                        values: hint_values,
                    },
                )
                .map_err(algorithm_error)?;
            if targets.is_empty() {
                return Err(Error::NoRouteTarget {
                    table: logic_table.to_owned(),
                    value: join_values(hint_values),
                });
            }
            targets
        }
    };

    let targets = retain_available(logic_table, &selected, available_targets)?;
    trace!(table = logic_table, %strategy, ?targets, "routed strategy");
    Ok(RouteTargets {
        targets,
        constrained: true,
    })
}

fn precise(
    algorithm: &dyn StandardShardingAlgorithm,
    logic_table: &str,
    column: &str,
    values: &[Value],
    available_targets: &[String],
) -> Result<Vec<String>> {
    let mut targets = Vec::with_capacity(values.len());
    for value in values {
        let target = algorithm
            .do_sharding(
                available_targets,
                &PreciseShardingValue {
                    logic_table,
                    column,
                    value,
                },
            )
            .map_err(|source| Error::Algorithm {
                table: logic_table.to_owned(),
                source,
            })?
            .ok_or_else(|| Error::NoRouteTarget {
                table: logic_table.to_owned(),
                value: value.to_string(),
            })?;
        targets.push(target);
    }
    Ok(targets)
}

/// Orders `selected` the way the targets are available, matching names
/// case-insensitively.
fn retain_available(
    logic_table: &str,
    selected: &[String],
    available_targets: &[String],
) -> Result<Vec<String>> {
    if let Some(unknown) = selected
        .iter()
        .find(|s| !available_targets.iter().any(|a| a.eq_ignore_ascii_case(s)))
    {
        return Err(Error::UnavailableTarget {
            table: logic_table.to_owned(),
            target: unknown.clone(),
        });
    }
    Ok(available_targets
        .iter()
        .filter(|a| selected.iter().any(|s| s.eq_ignore_ascii_case(a)))
        .cloned()
        .collect())
}

fn join_values(values: &[Value]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_range(range: &ValueRange) -> String {
    let lower = match &range.lower {
        Bound::Included(v) => format!("[{v}"),
        Bound::Excluded(v) => format!("({v}"),
        Bound::Unbounded => "(-inf".to_owned(),
    };
    let upper = match &range.upper {
        Bound::Included(v) => format!("{v}]"),
        Bound::Excluded(v) => format!("{v})"),
        Bound::Unbounded => "+inf)".to_owned(),
    };
    format!("{lower}, {upper}")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;
    use proptest::prelude::*;
    use sharding_rule::{
        algorithm::{
            ComplexInlineShardingAlgorithm, HintInlineShardingAlgorithm, ModShardingAlgorithm,
        },
        inline::InlineExpression,
    };

    use super::*;
    use crate::condition::ShardingConditionValue;

    fn targets(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn mod_strategy(column: &str, count: i64) -> ShardingStrategy {
        ShardingStrategy::Standard {
            column: column.to_owned(),
            algorithm: Arc::new(ModShardingAlgorithm::new(count)),
        }
    }

    fn condition(column: &str, value: ConditionValue) -> ShardingCondition {
        ShardingCondition {
            values: vec![ShardingConditionValue {
                table: "t_order".to_owned(),
                column: column.to_owned(),
                value,
                parameter_indices: vec![],
            }],
        }
    }

    fn list(values: &[i64]) -> ConditionValue {
        ConditionValue::List(values.iter().copied().map(Value::from).collect())
    }

    #[test]
    fn none_selects_everything() {
        let available = targets(&["ds_0", "ds_1"]);
        let routed = route_strategy(
            &ShardingStrategy::None,
            "t_order",
            Some(&condition("order_id", list(&[1]))),
            &[],
            &available,
        )
        .unwrap();
        assert_eq!(routed, RouteTargets::all(&available));
    }

    #[test]
    fn standard_list_in_available_order() {
        let available = targets(&["t_order_0", "t_order_1", "t_order_2", "t_order_3"]);
        let routed = route_strategy(
            &mod_strategy("order_id", 4),
            "t_order",
            Some(&condition("order_id", list(&[7, 2, 6]))),
            &[],
            &available,
        )
        .unwrap();
        assert_eq!(routed.targets, targets(&["t_order_2", "t_order_3"]));
        assert!(routed.constrained);
    }

    #[test]
    fn standard_range() {
        let available = targets(&["t_order_0", "t_order_1", "t_order_2", "t_order_3"]);
        let range = ValueRange::closed(Value::from(5), Value::from(6));
        let routed = route_strategy(
            &mod_strategy("order_id", 4),
            "t_order",
            Some(&condition("order_id", ConditionValue::Range(range))),
            &[],
            &available,
        )
        .unwrap();
        assert_eq!(routed.targets, targets(&["t_order_1", "t_order_2"]));
    }

    #[test]
    fn standard_falls_back_to_hint_values() {
        let available = targets(&["ds_0", "ds_1"]);
        let strategy = mod_strategy("user_id", 2);

        let routed =
            route_strategy(&strategy, "t_order", None, &[Value::from(3)], &available).unwrap();
        assert_eq!(routed.targets, targets(&["ds_1"]));

        let routed = route_strategy(
            &strategy,
            "t_order",
            Some(&condition("user_id", list(&[4]))),
            &[Value::from(3)],
            &available,
        )
        .unwrap();
        assert_eq!(routed.targets, targets(&["ds_0"]));

        let routed = route_strategy(&strategy, "t_order", None, &[], &available).unwrap();
        assert!(!routed.constrained);
        assert_eq!(routed.targets, available);
    }

    #[test]
    fn unmatched_value_is_an_error() {
        let available = targets(&["t_order_0", "t_order_1"]);
        let result = route_strategy(
            &mod_strategy("order_id", 4),
            "t_order",
            Some(&condition("order_id", list(&[3]))),
            &[],
            &available,
        );
        assert_matches!(result, Err(Error::NoRouteTarget { value, .. }) if value == "3");

        let result = route_strategy(
            &mod_strategy("order_id", 4),
            "t_order",
            Some(&condition("order_id", ConditionValue::List(vec![Value::from("x")]))),
            &[],
            &available,
        );
        assert_matches!(result, Err(Error::Algorithm { .. }));
    }

    #[test]
    fn complex_needs_every_column() {
        let strategy = ShardingStrategy::Complex {
            columns: vec!["user_id".to_owned(), "order_id".to_owned()],
            algorithm: Arc::new(ComplexInlineShardingAlgorithm::new(
                InlineExpression::parse("t_order_${(user_id + order_id) % 2}").unwrap(),
                false,
            )),
        };
        let available = targets(&["t_order_0", "t_order_1"]);

        let mut both = condition("user_id", list(&[1]));
        both.values.extend(condition("order_id", list(&[2])).values);
        let routed = route_strategy(&strategy, "t_order", Some(&both), &[], &available).unwrap();
        assert_eq!(routed.targets, targets(&["t_order_1"]));

        let partial = condition("user_id", list(&[1]));
        let routed =
            route_strategy(&strategy, "t_order", Some(&partial), &[], &available).unwrap();
        assert!(!routed.constrained);
        assert_eq!(routed.targets, available);
    }

    #[test]
    fn hint_ignores_extracted_values() {
        let strategy = ShardingStrategy::Hint {
            algorithm: Arc::new(HintInlineShardingAlgorithm::new(
                InlineExpression::parse("ds_${value % 2}").unwrap(),
            )),
        };
        let available = targets(&["ds_0", "ds_1"]);
        let extracted = condition("user_id", list(&[1]));

        let routed =
            route_strategy(&strategy, "t_order", Some(&extracted), &[], &available).unwrap();
        assert!(!routed.constrained);

        let routed = route_strategy(
            &strategy,
            "t_order",
            Some(&extracted),
            &[Value::from(4)],
            &available,
        )
        .unwrap();
        assert_eq!(routed.targets, targets(&["ds_0"]));
    }

    #[test]
    fn describes_ranges() {
        assert_eq!(describe_range(&ValueRange::all()), "(-inf, +inf)");
        assert_eq!(
            describe_range(&ValueRange::new(
                Bound::Excluded(Value::from(1)),
                Bound::Included(Value::from(4))
            )),
            "(1, 4]"
        );
    }

    proptest! {
        #[test]
        fn routing_is_deterministic(
            values in proptest::collection::vec(-1_000i64..1_000, 1..8),
            count in 1i64..8,
        ) {
            let available: Vec<String> = (0..count).map(|i| format!("t_order_{i}")).collect();
            let strategy = mod_strategy("order_id", count);
            let condition = condition("order_id", list(&values));

            let first = route_strategy(&strategy, "t_order", Some(&condition), &[], &available).unwrap();
            let second = route_strategy(&strategy, "t_order", Some(&condition), &[], &available).unwrap();

            prop_assert_eq!(&first, &second);
            prop_assert!(first.targets.iter().all(|t| available.contains(t)));
            let distinct: std::collections::BTreeSet<_> =
                values.iter().map(|v| v.rem_euclid(count)).collect();
            prop_assert_eq!(first.targets.len(), distinct.len());
        }
    }
}
