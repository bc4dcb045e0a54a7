//! Caller supplied routing hints.
//!
//! A [`HintContext`] lives inside a [`HintScope`], one scope per unit of
//! work (a connection, a session). [`HintScope::begin`] hands out a
//! [`HintGuard`] that clears the context when it goes out of scope, on every
//! exit path:
//!
//! ```
//! # use sharding_route::HintScope;
//! let mut scope = HintScope::new();
//! {
//!     let mut hint = scope.begin().unwrap();
//!     hint.add_table_sharding_value("t_order", 3);
//!     // route statements with `Some(&*hint)`
//! }
//! assert!(!scope.is_active());
//! ```

use std::ops::{Deref, DerefMut};

use indexmap::IndexMap;
use sql_statement::{SqlHints, Value};

use crate::{Error, Result};

/// Key of the values set by [`HintContext::set_database_sharding_value`].
const DATABASE_ONLY: &str = "";

/// Manually supplied sharding values and routing flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HintContext {
    /// Keyed by lower case logic table name.
    database_values: IndexMap<String, Vec<Value>>,
    table_values: IndexMap<String, Vec<Value>>,
    database_sharding_only: bool,
    write_route_only: bool,
    data_source_name: Option<String>,
}

impl HintContext {
    /// Routes every following statement to the single data source `value`
    /// maps to, ignoring all table level values.
    pub fn set_database_sharding_value(&mut self, value: impl Into<Value>) {
        self.database_values.clear();
        self.table_values.clear();
        self.database_values
            .insert(DATABASE_ONLY.to_owned(), vec![value.into()]);
        self.database_sharding_only = true;
    }

    pub fn add_database_sharding_value(&mut self, logic_table: &str, value: impl Into<Value>) {
        self.leave_database_only_mode();
        self.database_values
            .entry(logic_table.to_ascii_lowercase())
            .or_default()
            .push(value.into());
    }

    pub fn add_table_sharding_value(&mut self, logic_table: &str, value: impl Into<Value>) {
        self.leave_database_only_mode();
        self.table_values
            .entry(logic_table.to_ascii_lowercase())
            .or_default()
            .push(value.into());
    }

    /// Sends the statements of this scope to the write (primary) route.
    pub fn set_write_route_only(&mut self) {
        self.write_route_only = true;
    }

    /// Routes every following statement, unrewritten, to `name`.
    pub fn set_data_source_name(&mut self, name: impl Into<String>) {
        self.data_source_name = Some(name.into());
    }

    pub fn is_database_sharding_only(&self) -> bool {
        self.database_sharding_only
    }

    pub fn is_write_route_only(&self) -> bool {
        self.write_route_only
    }

    pub fn data_source_name(&self) -> Option<&str> {
        self.data_source_name.as_deref()
    }

    /// Values set in database only mode.
    pub fn database_only_values(&self) -> &[Value] {
        if !self.database_sharding_only {
            return &[];
        }
        values(&self.database_values, DATABASE_ONLY)
    }

    pub fn database_sharding_values(&self, logic_table: &str) -> &[Value] {
        values(&self.database_values, &logic_table.to_ascii_lowercase())
    }

    pub fn table_sharding_values(&self, logic_table: &str) -> &[Value] {
        values(&self.table_values, &logic_table.to_ascii_lowercase())
    }

    fn leave_database_only_mode(&mut self) {
        if self.database_sharding_only {
            self.database_values.shift_remove(DATABASE_ONLY);
            self.database_sharding_only = false;
        }
    }
}

fn values<'a>(map: &'a IndexMap<String, Vec<Value>>, key: &str) -> &'a [Value] {
    map.get(key).map(Vec::as_slice).unwrap_or_default()
}

/// Owner of at most one active [`HintContext`].
#[derive(Debug, Default)]
#[allow(missing_copy_implementations)]
pub struct HintScope {
    active: bool,
}

impl HintScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enters a fresh hint context.
    ///
    /// Fails if a context is still active, which only happens when a guard
    /// was leaked instead of dropped.
    pub fn begin(&mut self) -> Result<HintGuard<'_>> {
        if self.active {
            return Err(Error::HintAlreadyActive);
        }
        self.active = true;
        Ok(HintGuard {
            scope: self,
            context: HintContext::default(),
        })
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// The active [`HintContext`] of a [`HintScope`]; dropping it ends the
/// scope.
#[derive(Debug)]
pub struct HintGuard<'a> {
    scope: &'a mut HintScope,
    context: HintContext,
}

impl HintGuard<'_> {
    /// Ends the scope. Equivalent to dropping the guard.
    pub fn end(self) {}
}

impl Deref for HintGuard<'_> {
    type Target = HintContext;

    fn deref(&self) -> &HintContext {
        &self.context
    }
}

impl DerefMut for HintGuard<'_> {
    fn deref_mut(&mut self) -> &mut HintContext {
        &mut self.context
    }
}

impl Drop for HintGuard<'_> {
    fn drop(&mut self) {
        self.scope.active = false;
    }
}

/// The hints one statement routes with: the scoped context first, then the
/// hints found in the statement's SQL comments.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Hints<'a> {
    scoped: Option<&'a HintContext>,
    sql: &'a SqlHints,
}

impl<'a> Hints<'a> {
    pub(crate) fn new(scoped: Option<&'a HintContext>, sql: &'a SqlHints) -> Self {
        Self { scoped, sql }
    }

    pub(crate) fn data_source_name(&self) -> Option<&'a str> {
        self.scoped
            .and_then(HintContext::data_source_name)
            .or(self.sql.data_source_name.as_deref())
    }

    pub(crate) fn is_write_route_only(&self) -> bool {
        self.scoped.is_some_and(HintContext::is_write_route_only) || self.sql.write_route_only
    }

    /// Values of database only mode, if it is on.
    pub(crate) fn database_only_values(&self) -> Option<&'a [Value]> {
        self.scoped
            .filter(|hint| hint.is_database_sharding_only())
            .map(HintContext::database_only_values)
    }

    pub(crate) fn database_values(&self, logic_table: &str) -> Vec<Value> {
        match self.scoped.map(|h| h.database_sharding_values(logic_table)) {
            Some(values) if !values.is_empty() => values.to_vec(),
            _ => self.sql.database_values_for(logic_table),
        }
    }

    pub(crate) fn table_values(&self, logic_table: &str) -> Vec<Value> {
        match self.scoped.map(|h| h.table_sharding_values(logic_table)) {
            Some(values) if !values.is_empty() => values.to_vec(),
            _ => self.sql.table_values_for(logic_table),
        }
    }
}
