//! Sharding value extraction.
//!
//! Walks the predicates of a bound statement and collects, per sharding
//! column of every touched sharding table, the values the statement
//! constrains that column to. Anything that cannot be proven is left out: a
//! missing column means "any value", so extraction can only ever widen a
//! route, never narrow it incorrectly.
//!
//! * `AND` intersects the constraints of its operands. A provably empty
//!   intersection is dropped like any other unprovable constraint.
//! * `OR` keeps a column only when every operand constrains it, as the union
//!   of the operands' constraints.
//! * `NOT`, `<>`, negated `IN`/`BETWEEN`, function calls and comparisons
//!   between columns constrain nothing.

use std::cmp::Ordering;

use indexmap::IndexMap;
use sharding_rule::{ShardingRule, TableRule, algorithm::ValueRange};
use sql_statement::{
    Assignment, BinaryOperator, ColumnRef, Expr, InsertStatement, Statement, StatementContext,
    TableRef, Value,
};
use tracing::debug;

use crate::{Error, Result};

/// The values a sharding column is constrained to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionValue {
    /// One of these values, from `=` and `IN`.
    List(Vec<Value>),
    Range(ValueRange),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardingOperator {
    Equal,
    In,
    Range,
}

/// The constraint on one sharding column of one logic table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardingConditionValue {
    /// Logic table, as configured.
    pub table: String,
    /// Sharding column, as configured.
    pub column: String,
    pub value: ConditionValue,
    /// Bound parameters the value was taken from.
    pub parameter_indices: Vec<usize>,
}

impl ShardingConditionValue {
    pub fn operator(&self) -> ShardingOperator {
        match &self.value {
            ConditionValue::List(values) if values.len() == 1 => ShardingOperator::Equal,
            ConditionValue::List(_) => ShardingOperator::In,
            ConditionValue::Range(_) => ShardingOperator::Range,
        }
    }
}

/// The constraints of one statement, or of one row of a multi-row INSERT.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardingCondition {
    pub values: Vec<ShardingConditionValue>,
}

impl ShardingCondition {
    pub fn find(&self, logic_table: &str, column: &str) -> Option<&ShardingConditionValue> {
        self.values.iter().find(|v| {
            v.table.eq_ignore_ascii_case(logic_table) && v.column.eq_ignore_ascii_case(column)
        })
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Replaces the constraint on the same column, or adds it.
    fn set(&mut self, value: ShardingConditionValue) {
        match self
            .values
            .iter()
            .position(|v| v.table == value.table && v.column == value.column)
        {
            Some(idx) => self.values[idx] = value,
            None => self.values.push(value),
        }
    }
}

/// Every [`ShardingCondition`] extracted from one statement.
///
/// An empty set means the statement constrains no sharding column at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardingConditions {
    conditions: Vec<ShardingCondition>,
}

impl ShardingConditions {
    pub fn new(conditions: Vec<ShardingCondition>) -> Self {
        Self { conditions }
    }

    pub fn conditions(&self) -> &[ShardingCondition] {
        &self.conditions
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Whether any condition constrains `column` of `logic_table`.
    pub fn constrains(&self, logic_table: &str, column: &str) -> bool {
        self.conditions
            .iter()
            .any(|c| c.find(logic_table, column).is_some())
    }
}

/// Extracts the conditions a statement is routed with.
///
/// INSERT yields one condition per VALUES row; INSERT ... SELECT is routed
/// by the WHERE clause of its source query.
pub fn extract_conditions(
    rule: &ShardingRule,
    ctx: &StatementContext,
) -> Result<ShardingConditions> {
    let conditions = match &ctx.statement {
        Statement::Insert(insert) if insert.select.is_none() => {
            insert_conditions(rule, insert, &ctx.parameters)?
        }
        Statement::Copy(_) => ShardingConditions::default(),
        statement => {
            let resolver = ColumnResolver::new(rule, scope_of(statement));
            where_conditions(&resolver, statement.where_clause(), &ctx.parameters)?
        }
    };
    debug!(
        statement = ctx.statement.kind(),
        conditions = conditions.len(),
        "extracted sharding conditions"
    );
    Ok(conditions)
}

/// The conditions the rows of a statement end up with after it ran.
///
/// These are the statement's own conditions with every sharding column that
/// an UPDATE `SET` or an upsert `ON DUPLICATE KEY UPDATE` assigns a literal
/// or parameter to overridden by that value. `None` when the statement
/// assigns no sharding column.
pub fn extract_assignment_conditions(
    rule: &ShardingRule,
    ctx: &StatementContext,
) -> Result<Option<ShardingConditions>> {
    let (tables, assignments): (Vec<&TableRef>, &[Assignment]) = match &ctx.statement {
        Statement::Update(update) => (update.tables.iter().collect(), &update.assignments),
        Statement::Insert(insert) if insert.select.is_none() => {
            (vec![&insert.table], &insert.on_duplicate_key_update)
        }
        _ => return Ok(None),
    };

    let resolver = ColumnResolver::new(rule, tables);
    let mut overrides = vec![];
    for assignment in assignments {
        let targets = resolver.assigned(&assignment.column);
        if targets.is_empty() {
            continue;
        }
        let Some((value, parameter)) = bound_value(&assignment.value, &ctx.parameters)? else {
            continue;
        };
        for (table, column) in targets {
            overrides.push(ShardingConditionValue {
                table,
                column,
                value: ConditionValue::List(vec![value.clone()]),
                parameter_indices: parameter.into_iter().collect(),
            });
        }
    }
    if overrides.is_empty() {
        return Ok(None);
    }

    let mut conditions = extract_conditions(rule, ctx)?.conditions;
    if conditions.is_empty() {
        conditions.push(ShardingCondition::default());
    }
    for condition in &mut conditions {
        for value in &overrides {
            condition.set(value.clone());
        }
    }
    Ok(Some(ShardingConditions::new(conditions)))
}

/// Tables whose columns the WHERE clause of `statement` can reference.
fn scope_of(statement: &Statement) -> Vec<&TableRef> {
    match statement {
        Statement::Insert(insert) => insert
            .select
            .iter()
            .flat_map(|select| select.tables.iter())
            .collect(),
        _ => statement.table_refs(),
    }
}

fn insert_conditions(
    rule: &ShardingRule,
    insert: &InsertStatement,
    parameters: &[Value],
) -> Result<ShardingConditions> {
    let Some(table_rule) = rule.find_table_rule(&insert.table.name) else {
        return Ok(ShardingConditions::default());
    };

    let mut conditions = Vec::with_capacity(insert.values.len());
    for (row_idx, row) in insert.values.iter().enumerate() {
        if !insert.columns.is_empty() && row.len() != insert.columns.len() {
            return Err(Error::InsertValueCountMismatch {
                table: insert.table.name.clone(),
                row: row_idx,
                expected: insert.columns.len(),
                actual: row.len(),
            });
        }

        let mut condition = ShardingCondition::default();
        for column in table_rule.sharding_columns() {
            let Some(expr) = insert.column_index(column).and_then(|idx| row.get(idx)) else {
                continue;
            };
            let Some((value, parameter)) = bound_value(expr, parameters)? else {
                continue;
            };
            if value.is_null() {
                return Err(Error::NullInsertShardingValue {
                    table: table_rule.logic_table().to_owned(),
                    column: column.to_owned(),
                });
            }
            condition.values.push(ShardingConditionValue {
                table: table_rule.logic_table().to_owned(),
                column: column.to_owned(),
                value: ConditionValue::List(vec![value]),
                parameter_indices: parameter.into_iter().collect(),
            });
        }
        conditions.push(condition);
    }
    Ok(ShardingConditions::new(conditions))
}

fn where_conditions(
    resolver: &ColumnResolver<'_>,
    where_clause: Option<&Expr>,
    parameters: &[Value],
) -> Result<ShardingConditions> {
    let Some(expr) = where_clause else {
        return Ok(ShardingConditions::default());
    };
    let extractor = Extractor {
        resolver,
        parameters,
    };
    let constraints = extractor.extract(expr)?;
    if constraints.is_empty() {
        return Ok(ShardingConditions::default());
    }

    let values = constraints
        .into_iter()
        .map(|((table, column), c)| ShardingConditionValue {
            table,
            column,
            value: c.value,
            parameter_indices: c.parameter_indices,
        })
        .collect();
    Ok(ShardingConditions::new(vec![ShardingCondition { values }]))
}

/// Resolves a literal or parameter. `None` for any other expression.
fn bound_value(expr: &Expr, parameters: &[Value]) -> Result<Option<(Value, Option<usize>)>> {
    match expr {
        Expr::Literal(v) => Ok(Some((v.clone(), None))),
        Expr::Parameter(index) => match parameters.get(*index) {
            Some(v) => Ok(Some((v.clone(), Some(*index)))),
            None => Err(Error::MissingParameter { index: *index }),
        },
        _ => Ok(None),
    }
}

/// Maps column references to the sharding column of a sharding table in
/// scope.
#[derive(Debug)]
pub(crate) struct ColumnResolver<'a> {
    rule: &'a ShardingRule,
    tables: Vec<&'a TableRef>,
}

impl<'a> ColumnResolver<'a> {
    pub(crate) fn new(rule: &'a ShardingRule, tables: Vec<&'a TableRef>) -> Self {
        Self { rule, tables }
    }

    /// The configured `(logic table, column)` of a sharding column.
    ///
    /// A column is attributed only when that is unambiguous: a qualified
    /// column to the table its owner names, an unqualified one to the single
    /// sharding table in scope that shards on it. Tables referenced more than
    /// once (self joins) are never attributed, as each reference reads
    /// different rows.
    pub(crate) fn resolve(&self, column: &ColumnRef) -> Option<(String, String)> {
        let mut found: Option<(String, String)> = None;
        for (table_rule, sharding_column) in self.candidates(column) {
            if found.is_some() || self.references(table_rule) > 1 {
                return None;
            }
            found = Some((
                table_rule.logic_table().to_owned(),
                sharding_column.to_owned(),
            ));
        }
        found
    }

    /// Every `(logic table, column)` an assigned column may write to.
    ///
    /// Unlike [`Self::resolve`] an ambiguous column is attributed to each
    /// sharding table in scope that shards on it.
    pub(crate) fn assigned(&self, column: &ColumnRef) -> Vec<(String, String)> {
        let mut found: Vec<(String, String)> = vec![];
        for (table_rule, sharding_column) in self.candidates(column) {
            let key = (
                table_rule.logic_table().to_owned(),
                sharding_column.to_owned(),
            );
            if !found.contains(&key) {
                found.push(key);
            }
        }
        found
    }

    /// The sharding tables `column` may belong to, with their matching
    /// sharding column.
    fn candidates<'c>(
        &'c self,
        column: &'c ColumnRef,
    ) -> impl Iterator<Item = (&'a TableRule, &'a str)> + 'c {
        self.tables
            .iter()
            .filter(move |t| match &column.owner {
                Some(owner) => t.is_referenced_by(owner),
                None => true,
            })
            .filter_map(move |table| {
                let table_rule = self.rule.find_table_rule(&table.name)?;
                let sharding_column = table_rule
                    .sharding_columns()
                    .into_iter()
                    .find(|c| c.eq_ignore_ascii_case(&column.name))?;
                Some((table_rule, sharding_column))
            })
    }

    fn references(&self, table_rule: &TableRule) -> usize {
        self.tables
            .iter()
            .filter(|t| t.name.eq_ignore_ascii_case(table_rule.logic_table()))
            .count()
    }
}

#[derive(Debug, Clone)]
struct Constraint {
    value: ConditionValue,
    parameter_indices: Vec<usize>,
}

impl Constraint {
    fn new(value: ConditionValue, parameter_indices: Vec<usize>) -> Self {
        Self {
            value,
            parameter_indices,
        }
    }

    /// Both constraints at once; `None` when no value can satisfy both.
    fn intersect(&self, other: &Self) -> Option<Self> {
        let value = match (&self.value, &other.value) {
            (ConditionValue::List(a), ConditionValue::List(b)) => {
                // `'8'` and `8` are equal but may route differently, keep both
                let mut values: Vec<Value> = vec![];
                for (list, others) in [(a, b), (b, a)] {
                    for v in list {
                        if others.iter().any(|w| may_equal(v, w)) && !values.contains(v) {
                            values.push(v.clone());
                        }
                    }
                }
                (!values.is_empty()).then_some(ConditionValue::List(values))?
            }
            (ConditionValue::List(list), ConditionValue::Range(range))
            | (ConditionValue::Range(range), ConditionValue::List(list)) => {
                let values: Vec<Value> = list
                    .iter()
                    .filter(|v| range.contains(v))
                    .cloned()
                    .collect();
                (!values.is_empty()).then_some(ConditionValue::List(values))?
            }
            (ConditionValue::Range(a), ConditionValue::Range(b)) => {
                ConditionValue::Range(a.intersect(b)?)
            }
        };
        Some(Self::new(value, merge_indices(self, other)))
    }

    /// Either constraint; `None` when the union cannot be bounded.
    fn union(&self, other: &Self) -> Option<Self> {
        let value = match (&self.value, &other.value) {
            (ConditionValue::List(a), ConditionValue::List(b)) => {
                let mut values = a.clone();
                for v in b {
                    if !values.contains(v) {
                        values.push(v.clone());
                    }
                }
                ConditionValue::List(values)
            }
            (ConditionValue::List(list), ConditionValue::Range(range))
            | (ConditionValue::Range(range), ConditionValue::List(list)) => {
                ConditionValue::Range(range.hull(&list_hull(list)?))
            }
            (ConditionValue::Range(a), ConditionValue::Range(b)) => {
                ConditionValue::Range(a.hull(b))
            }
        };
        if value == ConditionValue::Range(ValueRange::all()) {
            return None;
        }
        Some(Self::new(value, merge_indices(self, other)))
    }
}

fn merge_indices(a: &Constraint, b: &Constraint) -> Vec<usize> {
    let mut indices = a.parameter_indices.clone();
    for idx in &b.parameter_indices {
        if !indices.contains(idx) {
            indices.push(*idx);
        }
    }
    indices
}

/// Whether two values may compare equal. Incomparable values might.
fn may_equal(a: &Value, b: &Value) -> bool {
    !matches!(a.compare(b), Some(Ordering::Less | Ordering::Greater))
}

/// The closed range from the smallest to the largest value of `list`.
fn list_hull(list: &[Value]) -> Option<ValueRange> {
    let (first, rest) = list.split_first()?;
    let (mut min, mut max) = (first, first);
    for v in rest {
        match v.compare(min)? {
            Ordering::Less => min = v,
            _ => {
                if v.compare(max)? == Ordering::Greater {
                    max = v;
                }
            }
        }
    }
    Some(ValueRange::closed(min.clone(), max.clone()))
}

type Constraints = IndexMap<(String, String), Constraint>;

struct Extractor<'a> {
    resolver: &'a ColumnResolver<'a>,
    parameters: &'a [Value],
}

impl Extractor<'_> {
    fn extract(&self, expr: &Expr) -> Result<Constraints> {
        match expr {
            Expr::And(operands) => self.extract_and(operands),
            Expr::Or(operands) => self.extract_or(operands),
            Expr::Binary { left, op, right } => {
                let (column, op, value) = match (left.as_column(), right.as_column()) {
                    (Some(column), None) => (column, *op, &**right),
                    (None, Some(column)) => (column, op.flip(), &**left),
                    _ => return Ok(Constraints::new()),
                };
                self.comparison(column, op, value)
            }
            Expr::InList {
                expr,
                list,
                negated: false,
            } => {
                let Some(column) = expr.as_column() else {
                    return Ok(Constraints::new());
                };
                let mut values = Vec::with_capacity(list.len());
                let mut indices = vec![];
                for item in list {
                    let Some((value, parameter)) = bound_value(item, self.parameters)? else {
                        return Ok(Constraints::new());
                    };
                    if value.is_null() {
                        continue;
                    }
                    if !values.contains(&value) {
                        values.push(value);
                    }
                    indices.extend(parameter);
                }
                if values.is_empty() {
                    return Ok(Constraints::new());
                }
                Ok(self.constraint(column, ConditionValue::List(values), indices))
            }
            Expr::Between {
                expr,
                low,
                high,
                negated: false,
            } => {
                let Some(column) = expr.as_column() else {
                    return Ok(Constraints::new());
                };
                let (Some((low, low_idx)), Some((high, high_idx))) = (
                    bound_value(low, self.parameters)?,
                    bound_value(high, self.parameters)?,
                ) else {
                    return Ok(Constraints::new());
                };
                if low.is_null() || high.is_null() {
                    return Ok(Constraints::new());
                }
                let range = ValueRange::closed(low, high);
                if range.is_empty() {
                    return Ok(Constraints::new());
                }
                let indices = low_idx.into_iter().chain(high_idx).collect();
                Ok(self.constraint(column, ConditionValue::Range(range), indices))
            }
            _ => Ok(Constraints::new()),
        }
    }

    fn extract_and(&self, operands: &[Expr]) -> Result<Constraints> {
        let mut merged = Constraints::new();
        let mut contradicted: Vec<(String, String)> = vec![];
        for operand in operands {
            for (key, constraint) in self.extract(operand)? {
                if contradicted.contains(&key) {
                    continue;
                }
                match merged.get_mut(&key) {
                    Some(existing) => {
                        if let Some(both) = existing.intersect(&constraint) {
                            *existing = both;
                            continue;
                        }
                    }
                    None => {
                        merged.insert(key, constraint);
                        continue;
                    }
                }
                debug!(table = %key.0, column = %key.1, "contradicting sharding predicates");
                merged.shift_remove(&key);
                contradicted.push(key);
            }
        }
        Ok(merged)
    }

    fn extract_or(&self, operands: &[Expr]) -> Result<Constraints> {
        let mut extracted = Vec::with_capacity(operands.len());
        for operand in operands {
            extracted.push(self.extract(operand)?);
        }

        let mut extracted = extracted.into_iter();
        let Some(mut union) = extracted.next() else {
            return Ok(Constraints::new());
        };
        for other in extracted {
            union = union
                .into_iter()
                .filter_map(|(key, constraint)| {
                    let widened = constraint.union(other.get(&key)?)?;
                    Some((key, widened))
                })
                .collect();
        }
        Ok(union)
    }

    fn comparison(
        &self,
        column: &ColumnRef,
        op: BinaryOperator,
        value: &Expr,
    ) -> Result<Constraints> {
        let Some((value, parameter)) = bound_value(value, self.parameters)? else {
            return Ok(Constraints::new());
        };
        if value.is_null() {
            return Ok(Constraints::new());
        }
        let value = match op {
            BinaryOperator::Eq => ConditionValue::List(vec![value]),
            BinaryOperator::Lt => ConditionValue::Range(ValueRange::less_than(value)),
            BinaryOperator::LtEq => ConditionValue::Range(ValueRange::at_most(value)),
            BinaryOperator::Gt => ConditionValue::Range(ValueRange::greater_than(value)),
            BinaryOperator::GtEq => ConditionValue::Range(ValueRange::at_least(value)),
            BinaryOperator::NotEq => return Ok(Constraints::new()),
        };
        Ok(self.constraint(column, value, parameter.into_iter().collect()))
    }

    fn constraint(
        &self,
        column: &ColumnRef,
        value: ConditionValue,
        parameter_indices: Vec<usize>,
    ) -> Constraints {
        let mut constraints = Constraints::new();
        if let Some(key) = self.resolver.resolve(column) {
            constraints.insert(key, Constraint::new(value, parameter_indices));
        }
        constraints
    }
}
