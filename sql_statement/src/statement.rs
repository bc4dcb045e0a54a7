use serde::{Deserialize, Serialize};

use crate::{ColumnRef, Expr, SqlHints, Value};

/// A table referenced by a statement, optionally aliased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl TableRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
        }
    }

    pub fn aliased(name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: Some(alias.into()),
        }
    }

    /// Whether a column qualifier refers to this table, by alias or by name.
    pub fn is_referenced_by(&self, owner: &str) -> bool {
        self.alias
            .as_deref()
            .is_some_and(|alias| alias.eq_ignore_ascii_case(owner))
            || self.name.eq_ignore_ascii_case(owner)
    }
}

/// `column = value` in a SET list or an `ON DUPLICATE KEY UPDATE` clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub column: ColumnRef,
    pub value: Expr,
}

impl Assignment {
    pub fn new(column: impl Into<String>, value: Expr) -> Self {
        Self {
            column: ColumnRef::new(column),
            value,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectStatement {
    pub tables: Vec<TableRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<Expr>,
    /// `ON` conditions of every join, in join order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub join_conditions: Vec<Expr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertStatement {
    pub table: TableRef,
    /// Explicit column list; empty when the statement omits it.
    #[serde(default)]
    pub columns: Vec<String>,
    /// One entry per VALUES row.
    #[serde(default)]
    pub values: Vec<Vec<Expr>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<Box<SelectStatement>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_duplicate_key_update: Vec<Assignment>,
}

impl InsertStatement {
    pub fn new(table: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            table: TableRef::new(table),
            columns,
            values: vec![],
            select: None,
            on_duplicate_key_update: vec![],
        }
    }

    pub fn with_row(mut self, row: Vec<Expr>) -> Self {
        self.values.push(row);
        self
    }

    pub fn with_select(mut self, select: SelectStatement) -> Self {
        self.select = Some(Box::new(select));
        self
    }

    pub fn with_upsert(mut self, assignments: Vec<Assignment>) -> Self {
        self.on_duplicate_key_update = assignments;
        self
    }

    /// Position of `column` in the explicit column list.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateStatement {
    pub tables: Vec<TableRef>,
    pub assignments: Vec<Assignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<Expr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteStatement {
    pub tables: Vec<TableRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<Expr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<Expr>,
}

/// `COPY table FROM ...` and other bulk load statements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyStatement {
    pub table: TableRef,
}

/// A bound statement, one variant per statement kind the router handles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Statement {
    Select(SelectStatement),
    Insert(InsertStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
    Copy(CopyStatement),
}

impl Statement {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Select(_) => "SELECT",
            Self::Insert(_) => "INSERT",
            Self::Update(_) => "UPDATE",
            Self::Delete(_) => "DELETE",
            Self::Copy(_) => "COPY",
        }
    }

    /// Every table reference in the statement, in order of appearance.
    ///
    /// For `INSERT ... SELECT` the target comes first, followed by the
    /// tables of the source query.
    pub fn table_refs(&self) -> Vec<&TableRef> {
        match self {
            Self::Select(s) => s.tables.iter().collect(),
            Self::Insert(s) => std::iter::once(&s.table)
                .chain(s.select.iter().flat_map(|select| select.tables.iter()))
                .collect(),
            Self::Update(s) => s.tables.iter().collect(),
            Self::Delete(s) => s.tables.iter().collect(),
            Self::Copy(s) => vec![&s.table],
        }
    }

    /// The predicate that constrains which rows the statement touches.
    pub fn where_clause(&self) -> Option<&Expr> {
        match self {
            Self::Select(s) => s.where_clause.as_ref(),
            Self::Insert(s) => s.select.as_ref().and_then(|s| s.where_clause.as_ref()),
            Self::Update(s) => s.where_clause.as_ref(),
            Self::Delete(s) => s.where_clause.as_ref(),
            Self::Copy(_) => None,
        }
    }

    /// Join `ON` conditions, including those of an INSERT's source query.
    pub fn join_conditions(&self) -> &[Expr] {
        match self {
            Self::Select(s) => &s.join_conditions,
            Self::Insert(s) => s
                .select
                .as_ref()
                .map(|s| s.join_conditions.as_slice())
                .unwrap_or_default(),
            Self::Update(_) | Self::Delete(_) | Self::Copy(_) => &[],
        }
    }

    pub fn limit(&self) -> Option<&Expr> {
        match self {
            Self::Select(s) => s.limit.as_ref(),
            Self::Update(s) => s.limit.as_ref(),
            Self::Delete(s) => s.limit.as_ref(),
            Self::Insert(_) | Self::Copy(_) => None,
        }
    }

    /// Whether the statement changes data.
    pub fn is_dml(&self) -> bool {
        !matches!(self, Self::Select(_))
    }
}

/// A statement together with everything bound to it for one execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementContext {
    pub statement: Statement,
    #[serde(default)]
    pub parameters: Vec<Value>,
    #[serde(default)]
    pub hints: SqlHints,
}

impl StatementContext {
    pub fn new(statement: Statement) -> Self {
        Self {
            statement,
            parameters: vec![],
            hints: SqlHints::default(),
        }
    }

    pub fn with_parameters(mut self, parameters: Vec<Value>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Attaches the hints found in the comments of the raw SQL text.
    pub fn with_sql(mut self, sql: &str) -> Self {
        self.hints = SqlHints::parse(sql);
        self
    }

    /// The logical table names the statement touches, in order of first
    /// appearance and without case-insensitive duplicates.
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = vec![];
        for table in self.statement.table_refs() {
            if !names.iter().any(|n| n.eq_ignore_ascii_case(&table.name)) {
                names.push(table.name.clone());
            }
        }
        names
    }
}
