//! Routing hints embedded in SQL comments.
//!
//! ```text
//! /* SHARDINGSPHERE_HINT: t_order.SHARDING_TABLE_VALUE=3, WRITE_ROUTE_ONLY=true */
//! SELECT * FROM t_order
//! ```

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::Value;

/// Comment prefixes that introduce a hint, compared case-insensitively.
const HINT_MARKERS: [&str; 2] = ["SHARDINGSPHERE_HINT:", "SHARDINGSPHERE HINT:"];

const DATA_SOURCE_NAME_KEY: &str = "DATA_SOURCE_NAME";
const WRITE_ROUTE_ONLY_KEY: &str = "WRITE_ROUTE_ONLY";
const DATABASE_VALUE_KEY: &str = "SHARDING_DATABASE_VALUE";
const TABLE_VALUE_KEY: &str = "SHARDING_TABLE_VALUE";

/// A sharding value supplied by a hint, optionally scoped to one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HintValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    pub value: Value,
}

impl HintValue {
    fn applies_to(&self, table: &str) -> bool {
        self.table
            .as_deref()
            .is_none_or(|t| t.eq_ignore_ascii_case(table))
    }
}

/// Hints collected from every hint comment of one SQL string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlHints {
    /// Route the whole statement to this data source.
    pub data_source_name: Option<String>,
    pub write_route_only: bool,
    pub database_values: Vec<HintValue>,
    pub table_values: Vec<HintValue>,
}

impl SqlHints {
    /// Scans `sql` for hint comments.
    ///
    /// A hint runs from its marker to the end of the comment, or to the end of
    /// the string for an unterminated comment. Unknown keys and malformed
    /// tokens are skipped.
    pub fn parse(sql: &str) -> Self {
        let mut hints = Self::default();

        let mut rest = sql;
        while let Some(start) = rest.find("/*") {
            let comment = &rest[start + 2..];
            let (body, remaining) = match comment.find("*/") {
                Some(end) => (&comment[..end], &comment[end + 2..]),
                None => (comment, ""),
            };
            rest = remaining;

            if let Some(tokens) = strip_marker(body) {
                for token in tokens.split(',') {
                    hints.apply(token);
                }
            }
        }

        hints
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Database sharding values that apply to `table`.
    pub fn database_values_for(&self, table: &str) -> Vec<Value> {
        values_for(&self.database_values, table)
    }

    /// Table sharding values that apply to `table`.
    pub fn table_values_for(&self, table: &str) -> Vec<Value> {
        values_for(&self.table_values, table)
    }

    fn apply(&mut self, token: &str) {
        let token = token.trim();
        if token.is_empty() {
            return;
        }
        let Some((key, value)) = token.split_once('=') else {
            warn!(token, "ignoring malformed sql hint");
            return;
        };
        let key = key.trim();
        let value = unquote(value.trim());

        if key.eq_ignore_ascii_case(DATA_SOURCE_NAME_KEY) {
            self.data_source_name = Some(value.to_owned());
        } else if key.eq_ignore_ascii_case(WRITE_ROUTE_ONLY_KEY) {
            match value.to_ascii_lowercase().parse() {
                Ok(flag) => self.write_route_only = flag,
                Err(_) => warn!(token, "ignoring non boolean sql hint"),
            }
        } else if let Some(table) = scoped_key(key, DATABASE_VALUE_KEY) {
            self.database_values.push(HintValue {
                table,
                value: parse_value(value),
            });
        } else if let Some(table) = scoped_key(key, TABLE_VALUE_KEY) {
            self.table_values.push(HintValue {
                table,
                value: parse_value(value),
            });
        }
    }
}

fn values_for(values: &[HintValue], table: &str) -> Vec<Value> {
    values
        .iter()
        .filter(|v| v.applies_to(table))
        .map(|v| v.value.clone())
        .collect()
}

fn strip_marker(body: &str) -> Option<&str> {
    let body = body.trim_start();
    HINT_MARKERS.iter().find_map(|marker| {
        body.get(..marker.len())
            .filter(|prefix| prefix.eq_ignore_ascii_case(marker))
            .map(|_| &body[marker.len()..])
    })
}

/// Matches `KEY` or `table.KEY`, returning the table qualifier.
fn scoped_key(key: &str, name: &str) -> Option<Option<String>> {
    if key.eq_ignore_ascii_case(name) {
        return Some(None);
    }
    let (table, suffix) = key.rsplit_once('.')?;
    (suffix.eq_ignore_ascii_case(name) && !table.is_empty()).then(|| Some(table.to_owned()))
}

fn unquote(value: &str) -> &str {
    for quote in ['\'', '"'] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

fn parse_value(value: &str) -> Value {
    value
        .parse::<i64>()
        .map(Value::Integer)
        .unwrap_or_else(|_| Value::Text(value.to_owned()))
}
