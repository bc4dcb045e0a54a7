use std::sync::Arc;

use sql_statement::Value;

use super::{
    AlgorithmError, ComplexKeysShardingAlgorithm, ComplexKeysShardingValue,
    HintShardingAlgorithm, HintShardingValue, PreciseShardingValue, Props, RangeShardingValue,
    Result, ShardingAlgorithm, StandardShardingAlgorithm, prop_bool, prop_string,
};
use crate::inline::InlineExpression;

const ALGORITHM_EXPRESSION: &str = "algorithm-expression";
const ALLOW_RANGE_QUERY: &str = "allow-range-query-with-inline-sharding";

/// Returns the available target matching `name`, spelled as configured.
fn resolve_target(available_targets: &[String], name: &str) -> String {
    available_targets
        .iter()
        .find(|t| t.eq_ignore_ascii_case(name))
        .cloned()
        .unwrap_or_else(|| name.to_owned())
}

fn parse_expression(props: &Props) -> Result<InlineExpression> {
    Ok(InlineExpression::parse(&prop_string(props, ALGORITHM_EXPRESSION)?)?)
}

/// `INLINE`: renders `algorithm-expression` with the sharding column bound
/// to the value.
#[derive(Debug, Clone)]
pub struct InlineShardingAlgorithm {
    expression: InlineExpression,
    allow_range_query: bool,
}

impl InlineShardingAlgorithm {
    pub const TYPE: &'static str = "INLINE";

    pub fn new(expression: InlineExpression, allow_range_query: bool) -> Self {
        Self {
            expression,
            allow_range_query,
        }
    }

    pub fn create(props: &Props) -> Result<ShardingAlgorithm> {
        Ok(ShardingAlgorithm::Standard(Arc::new(Self::new(
            parse_expression(props)?,
            prop_bool(props, ALLOW_RANGE_QUERY)?,
        ))))
    }
}

impl StandardShardingAlgorithm for InlineShardingAlgorithm {
    fn do_sharding(
        &self,
        available_targets: &[String],
        value: &PreciseShardingValue<'_>,
    ) -> Result<Option<String>> {
        let name = self.expression.evaluate_with(value.column, value.value)?;
        Ok(Some(resolve_target(available_targets, &name)))
    }

    fn do_range_sharding(
        &self,
        available_targets: &[String],
        _value: &RangeShardingValue<'_>,
    ) -> Result<Vec<String>> {
        if !self.allow_range_query {
            return Err(AlgorithmError::RangeNotAllowed {
                algorithm: Self::TYPE,
            });
        }
        Ok(available_targets.to_vec())
    }
}

/// `COMPLEX_INLINE`: renders `algorithm-expression` for every combination of
/// the sharding column values.
#[derive(Debug, Clone)]
pub struct ComplexInlineShardingAlgorithm {
    expression: InlineExpression,
    allow_range_query: bool,
}

impl ComplexInlineShardingAlgorithm {
    pub const TYPE: &'static str = "COMPLEX_INLINE";

    pub fn new(expression: InlineExpression, allow_range_query: bool) -> Self {
        Self {
            expression,
            allow_range_query,
        }
    }

    pub fn create(props: &Props) -> Result<ShardingAlgorithm> {
        Ok(ShardingAlgorithm::Complex(Arc::new(Self::new(
            parse_expression(props)?,
            prop_bool(props, ALLOW_RANGE_QUERY)?,
        ))))
    }
}

impl ComplexKeysShardingAlgorithm for ComplexInlineShardingAlgorithm {
    fn do_sharding(
        &self,
        available_targets: &[String],
        value: &ComplexKeysShardingValue<'_>,
    ) -> Result<Vec<String>> {
        if !value.ranges.is_empty() {
            if !self.allow_range_query {
                return Err(AlgorithmError::RangeNotAllowed {
                    algorithm: Self::TYPE,
                });
            }
            return Ok(available_targets.to_vec());
        }

        // every combination of one value per column
        let mut combinations: Vec<Vec<(&str, &Value)>> = vec![vec![]];
        for (column, values) in value.values {
            combinations = combinations
                .iter()
                .flat_map(|prefix| {
                    values.iter().map(move |v| {
                        let mut next = prefix.clone();
                        next.push((column.as_str(), v));
                        next
                    })
                })
                .collect();
        }

        let mut targets: Vec<String> = vec![];
        for bindings in combinations {
            let name = self.expression.evaluate(|ident| {
                bindings
                    .iter()
                    .find(|(column, _)| column.eq_ignore_ascii_case(ident))
                    .map(|(_, v)| (*v).clone())
            })?;
            let target = resolve_target(available_targets, &name);
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
        Ok(targets)
    }
}

/// `HINT_INLINE`: renders `algorithm-expression` (default `${value}`) for
/// each hint value.
#[derive(Debug, Clone)]
pub struct HintInlineShardingAlgorithm {
    expression: InlineExpression,
}

impl HintInlineShardingAlgorithm {
    pub const TYPE: &'static str = "HINT_INLINE";

    const DEFAULT_EXPRESSION: &'static str = "${value}";

    pub fn new(expression: InlineExpression) -> Self {
        Self { expression }
    }

    pub fn create(props: &Props) -> Result<ShardingAlgorithm> {
        let expression = if props.contains_key(ALGORITHM_EXPRESSION) {
            parse_expression(props)?
        } else {
            InlineExpression::parse(Self::DEFAULT_EXPRESSION)?
        };
        Ok(ShardingAlgorithm::Hint(Arc::new(Self::new(expression))))
    }
}

impl HintShardingAlgorithm for HintInlineShardingAlgorithm {
    fn do_sharding(
        &self,
        available_targets: &[String],
        value: &HintShardingValue<'_>,
    ) -> Result<Vec<String>> {
        let mut targets: Vec<String> = vec![];
        for v in value.values {
            let name = self.expression.evaluate_with("value", v)?;
            let target = resolve_target(available_targets, &name);
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
        Ok(targets)
    }
}
