use serde::Serialize;
use sharding_rule::ShardingRule;
use sql_statement::{Expr, Statement, StatementContext, Value};
use tracing::debug;

/// Values generated for the key column of an INSERT that omits it, one per
/// VALUES row in row order.
///
/// The statement is routed as if it listed the column with these values, so
/// the caller must insert exactly these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedKey {
    pub column: String,
    pub values: Vec<Value>,
}

/// `ctx` with the generated key column appended to an INSERT that omits it.
///
/// `None` for any other statement, for INSERT ... SELECT and for an INSERT
/// without a column list, which provides every column.
pub(crate) fn fill_generated_key(
    rule: &ShardingRule,
    ctx: &StatementContext,
) -> Option<(StatementContext, GeneratedKey)> {
    let Statement::Insert(insert) = &ctx.statement else {
        return None;
    };
    if insert.select.is_some() || insert.columns.is_empty() {
        return None;
    }
    let column = rule.find_generate_key_column(&insert.table.name)?;
    if insert.column_index(column).is_some() {
        return None;
    }

    let mut filled = insert.clone();
    filled.columns.push(column.to_owned());
    let mut values = Vec::with_capacity(filled.values.len());
    for row in &mut filled.values {
        let value = rule.generate_key(&insert.table.name)?;
        row.push(Expr::literal(value.clone()));
        values.push(value);
    }
    debug!(
        table = insert.table.name.as_str(),
        column,
        rows = values.len(),
        "generated keys"
    );

    let filled = StatementContext {
        statement: Statement::Insert(filled),
        parameters: ctx.parameters.clone(),
        hints: ctx.hints.clone(),
    };
    let key = GeneratedKey {
        column: column.to_owned(),
        values,
    };
    Some((filled, key))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use sql_statement::{InsertStatement, SelectStatement, TableRef};

    use super::*;
    use crate::{
        Error, ShardingRouteEngine,
        test_util::{col_eq, order_rule, units},
    };

    fn insert(table: &str, columns: &[&str], rows: &[&[i64]]) -> StatementContext {
        let mut insert =
            InsertStatement::new(table, columns.iter().map(|c| (*c).to_owned()).collect());
        for row in rows {
            insert = insert.with_row(row.iter().copied().map(Expr::literal).collect());
        }
        StatementContext::new(Statement::Insert(insert))
    }

    #[test]
    fn appends_one_value_per_row() {
        let rule = order_rule();
        let ctx = insert("t_order", &["user_id"], &[&[1], &[2]]);

        let (filled, key) = fill_generated_key(&rule, &ctx).unwrap();
        assert_eq!(key.column, "order_id");
        assert_eq!(key.values.len(), 2);
        assert_ne!(key.values[0], key.values[1]);

        let Statement::Insert(filled) = &filled.statement else {
            panic!("not an insert: {filled:?}");
        };
        assert_eq!(filled.columns, vec!["user_id", "order_id"]);
        assert_eq!(filled.values[1][1], Expr::literal(key.values[1].clone()));
    }

    #[test]
    fn nothing_to_generate() {
        let rule = order_rule();

        // key column given, no column list, no key column configured
        for ctx in [
            insert("t_order", &["ORDER_ID", "user_id"], &[&[1, 1]]),
            insert("t_order", &[], &[&[1, 1]]),
            insert("t_order_item", &["user_id"], &[&[1]]),
            insert("t_config", &["id"], &[&[1]]),
        ] {
            assert_eq!(fill_generated_key(&rule, &ctx), None);
        }
    }

    #[test]
    fn rows_route_by_their_generated_key() {
        let ctx = insert("t_order", &["user_id"], &[&[1], &[0]]);

        let route = ShardingRouteEngine::default()
            .route(&order_rule(), &ctx, None)
            .unwrap();
        let key = route.generated_key().unwrap();
        assert_eq!(key.column, "order_id");

        let table = |idx: usize| key.values[idx].as_i64().unwrap() % 2;
        let mut expected = vec![
            format!("ds_0: t_order -> t_order_{}", table(1)),
            format!("ds_1: t_order -> t_order_{}", table(0)),
        ];
        let mut routed = units(&route);
        expected.sort();
        routed.sort();
        assert_eq!(routed, expected);
        assert!(route.original_data_nodes().iter().all(|nodes| nodes.len() == 1));
    }

    #[test]
    fn insert_select_generates_nothing() {
        let insert = InsertStatement::new("t_order", vec!["user_id".to_owned()]).with_select(
            SelectStatement {
                tables: vec![TableRef::new("t_order")],
                where_clause: Some(col_eq("user_id", 1)),
                ..Default::default()
            },
        );
        let ctx = StatementContext::new(Statement::Insert(insert));

        assert_eq!(fill_generated_key(&order_rule(), &ctx), None);
        assert_matches!(
            ShardingRouteEngine::default().route(&order_rule(), &ctx, None),
            Err(Error::MissingGenerateKeyColumnWithInsertSelect { column, .. })
                if column == "order_id"
        );
    }
}
