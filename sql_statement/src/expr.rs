use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Value;

/// A column reference as bound by the binder.
///
/// `owner` is the qualifier written in the statement, which is either a
/// table name or a table alias.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub name: String,
}

impl ColumnRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            owner: None,
            name: name.into(),
        }
    }

    pub fn qualified(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: Some(owner.into()),
            name: name.into(),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.owner {
            Some(owner) => write!(f, "{owner}.{}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOperator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl BinaryOperator {
    /// The operator to use once the operands are swapped, so that
    /// `5 < id` can be read as `id > 5`.
    pub fn flip(self) -> Self {
        match self {
            Self::Eq => Self::Eq,
            Self::NotEq => Self::NotEq,
            Self::Lt => Self::Gt,
            Self::LtEq => Self::GtEq,
            Self::Gt => Self::Lt,
            Self::GtEq => Self::LtEq,
        }
    }
}

/// A bound expression tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Column(ColumnRef),
    Literal(Value),
    /// Zero based index into the statement's bound parameters.
    Parameter(usize),
    Binary {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        #[serde(default)]
        negated: bool,
    },
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        #[serde(default)]
        negated: bool,
    },
    /// Any call or construct the router does not interpret.
    Function { name: String, args: Vec<Expr> },
}

impl Expr {
    pub fn column(name: impl Into<String>) -> Self {
        Self::Column(ColumnRef::new(name))
    }

    pub fn qualified_column(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Column(ColumnRef::qualified(owner, name))
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    pub fn param(index: usize) -> Self {
        Self::Parameter(index)
    }

    pub fn binary(self, op: BinaryOperator, right: Self) -> Self {
        Self::Binary {
            left: Box::new(self),
            op,
            right: Box::new(right),
        }
    }

    pub fn eq(self, right: Self) -> Self {
        self.binary(BinaryOperator::Eq, right)
    }

    pub fn not_eq(self, right: Self) -> Self {
        self.binary(BinaryOperator::NotEq, right)
    }

    pub fn lt(self, right: Self) -> Self {
        self.binary(BinaryOperator::Lt, right)
    }

    pub fn lt_eq(self, right: Self) -> Self {
        self.binary(BinaryOperator::LtEq, right)
    }

    pub fn gt(self, right: Self) -> Self {
        self.binary(BinaryOperator::Gt, right)
    }

    pub fn gt_eq(self, right: Self) -> Self {
        self.binary(BinaryOperator::GtEq, right)
    }

    pub fn in_list(self, list: Vec<Self>) -> Self {
        Self::InList {
            expr: Box::new(self),
            list,
            negated: false,
        }
    }

    pub fn between(self, low: Self, high: Self) -> Self {
        Self::Between {
            expr: Box::new(self),
            low: Box::new(low),
            high: Box::new(high),
            negated: false,
        }
    }

    pub fn and(exprs: impl IntoIterator<Item = Self>) -> Self {
        Self::And(exprs.into_iter().collect())
    }

    pub fn or(exprs: impl IntoIterator<Item = Self>) -> Self {
        Self::Or(exprs.into_iter().collect())
    }

    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    pub fn as_column(&self) -> Option<&ColumnRef> {
        match self {
            Self::Column(c) => Some(c),
            _ => None,
        }
    }

    /// Resolves a literal or a bound parameter to its value.
    ///
    /// Returns `None` for any other expression and for a parameter index
    /// that has no bound value.
    pub fn resolve(&self, parameters: &[Value]) -> Option<Value> {
        match self {
            Self::Literal(v) => Some(v.clone()),
            Self::Parameter(idx) => parameters.get(*idx).cloned(),
            _ => None,
        }
    }

    /// The parameter index if this expression is a parameter marker.
    pub fn parameter_index(&self) -> Option<usize> {
        match self {
            Self::Parameter(idx) => Some(*idx),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_literal_and_parameter() {
        let params = vec![Value::from(3), Value::from("x")];

        assert_eq!(Expr::literal(9).resolve(&params), Some(Value::from(9)));
        assert_eq!(Expr::param(1).resolve(&params), Some(Value::from("x")));
        assert_eq!(Expr::param(2).resolve(&params), None);
        assert_eq!(Expr::column("id").resolve(&params), None);
    }

    #[test]
    fn flip_is_an_involution() {
        for op in [
            BinaryOperator::Eq,
            BinaryOperator::NotEq,
            BinaryOperator::Lt,
            BinaryOperator::LtEq,
            BinaryOperator::Gt,
            BinaryOperator::GtEq,
        ] {
            assert_eq!(op.flip().flip(), op);
        }
        assert_eq!(BinaryOperator::Lt.flip(), BinaryOperator::Gt);
    }

    #[test]
    fn json_shape() {
        let expr: Expr = serde_json::from_str(
            r#"{"binary": {"left": {"column": {"owner": "o", "name": "order_id"}}, "op": "eq", "right": {"parameter": 0}}}"#,
        )
        .unwrap();

        assert_eq!(expr, Expr::qualified_column("o", "order_id").eq(Expr::param(0)));
    }
}
