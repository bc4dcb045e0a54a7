//! Pluggable sharding algorithms.
//!
//! A strategy delegates the value to target mapping to an algorithm. The
//! algorithm is created once, when the rule is loaded, through the
//! [`AlgorithmRegistry`] keyed by the configured algorithm type.

use std::{
    cmp::Ordering,
    collections::BTreeMap,
    fmt::{self, Debug},
    ops::Bound,
    sync::Arc,
};

use sql_statement::Value;
use thiserror::Error;

use crate::inline;

mod inline_expr;
mod keygen;
mod modulo;
mod range;
mod registry;

pub use inline_expr::*;
pub use keygen::*;
pub use modulo::*;
pub use range::*;
pub use registry::*;

/// Free-form algorithm properties from the rule configuration.
pub type Props = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Error)]
pub enum AlgorithmError {
    #[error("missing property {property:?}")]
    MissingProperty { property: String },

    #[error("invalid property {property:?}: {reason}")]
    InvalidProperty { property: String, reason: String },

    #[error("range queries are not allowed for {algorithm} sharding")]
    RangeNotAllowed { algorithm: &'static str },

    #[error("sharding value {value} is not an integer")]
    NotAnInteger { value: Value },

    #[error(transparent)]
    Inline(#[from] inline::Error),
}

pub type Result<T, E = AlgorithmError> = std::result::Result<T, E>;

/// One equality value for a single sharding column.
#[derive(Debug, Clone, Copy)]
pub struct PreciseShardingValue<'a> {
    pub logic_table: &'a str,
    pub column: &'a str,
    pub value: &'a Value,
}

/// A range constraint for a single sharding column.
#[derive(Debug, Clone, Copy)]
pub struct RangeShardingValue<'a> {
    pub logic_table: &'a str,
    pub column: &'a str,
    pub range: &'a ValueRange,
}

/// The values of every sharding column of a complex strategy.
///
/// Column keys are lower case. A column appears in exactly one of the maps.
#[derive(Debug, Clone, Copy)]
pub struct ComplexKeysShardingValue<'a> {
    pub logic_table: &'a str,
    pub values: &'a BTreeMap<String, Vec<Value>>,
    pub ranges: &'a BTreeMap<String, ValueRange>,
}

/// Values supplied through hints rather than predicates.
#[derive(Debug, Clone, Copy)]
pub struct HintShardingValue<'a> {
    pub logic_table: &'a str,
    pub values: &'a [Value],
}

/// Single column sharding.
pub trait StandardShardingAlgorithm: Debug + Send + Sync {
    /// Maps one value to a target.
    ///
    /// `None` means the value maps to none of `available_targets`.
    fn do_sharding(
        &self,
        available_targets: &[String],
        value: &PreciseShardingValue<'_>,
    ) -> Result<Option<String>>;

    /// Every target whose values may intersect the range.
    fn do_range_sharding(
        &self,
        available_targets: &[String],
        value: &RangeShardingValue<'_>,
    ) -> Result<Vec<String>>;
}

/// Multi column sharding; the algorithm sees every column at once.
pub trait ComplexKeysShardingAlgorithm: Debug + Send + Sync {
    fn do_sharding(
        &self,
        available_targets: &[String],
        value: &ComplexKeysShardingValue<'_>,
    ) -> Result<Vec<String>>;
}

/// Sharding driven only by hint values.
pub trait HintShardingAlgorithm: Debug + Send + Sync {
    fn do_sharding(
        &self,
        available_targets: &[String],
        value: &HintShardingValue<'_>,
    ) -> Result<Vec<String>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmKind {
    Standard,
    Complex,
    Hint,
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::Complex => write!(f, "complex"),
            Self::Hint => write!(f, "hint"),
        }
    }
}

/// An instantiated algorithm, tagged by the strategy kind it serves.
#[derive(Debug, Clone)]
pub enum ShardingAlgorithm {
    Standard(Arc<dyn StandardShardingAlgorithm>),
    Complex(Arc<dyn ComplexKeysShardingAlgorithm>),
    Hint(Arc<dyn HintShardingAlgorithm>),
}

impl ShardingAlgorithm {
    pub fn kind(&self) -> AlgorithmKind {
        match self {
            Self::Standard(_) => AlgorithmKind::Standard,
            Self::Complex(_) => AlgorithmKind::Complex,
            Self::Hint(_) => AlgorithmKind::Hint,
        }
    }
}

/// A possibly unbounded interval of values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueRange {
    pub lower: Bound<Value>,
    pub upper: Bound<Value>,
}

impl ValueRange {
    pub fn all() -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: Bound::Unbounded,
        }
    }

    pub fn new(lower: Bound<Value>, upper: Bound<Value>) -> Self {
        Self { lower, upper }
    }

    pub fn closed(low: Value, high: Value) -> Self {
        Self::new(Bound::Included(low), Bound::Included(high))
    }

    pub fn at_least(v: Value) -> Self {
        Self::new(Bound::Included(v), Bound::Unbounded)
    }

    pub fn greater_than(v: Value) -> Self {
        Self::new(Bound::Excluded(v), Bound::Unbounded)
    }

    pub fn at_most(v: Value) -> Self {
        Self::new(Bound::Unbounded, Bound::Included(v))
    }

    pub fn less_than(v: Value) -> Self {
        Self::new(Bound::Unbounded, Bound::Excluded(v))
    }

    /// Whether `v` may lie in the range. Incomparable bounds count as a
    /// match.
    pub fn contains(&self, v: &Value) -> bool {
        let above_lower = match &self.lower {
            Bound::Unbounded => true,
            Bound::Included(l) => v.compare(l).is_none_or(Ordering::is_ge),
            Bound::Excluded(l) => v.compare(l).is_none_or(Ordering::is_gt),
        };
        let below_upper = match &self.upper {
            Bound::Unbounded => true,
            Bound::Included(u) => v.compare(u).is_none_or(Ordering::is_le),
            Bound::Excluded(u) => v.compare(u).is_none_or(Ordering::is_lt),
        };
        above_lower && below_upper
    }

    /// Whether the range provably holds no value.
    pub fn is_empty(&self) -> bool {
        match (&self.lower, &self.upper) {
            (Bound::Included(l), Bound::Included(u)) => l.compare(u) == Some(Ordering::Greater),
            (Bound::Included(l) | Bound::Excluded(l), Bound::Included(u) | Bound::Excluded(u)) => {
                l.compare(u).is_some_and(Ordering::is_ge)
            }
            _ => false,
        }
    }

    /// The intersection of two ranges, `None` when provably empty.
    ///
    /// When two bounds cannot be compared the receiver's bound is kept,
    /// which can only widen the result.
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let lower = tighter(&self.lower, &other.lower, Ordering::Greater);
        let upper = tighter(&self.upper, &other.upper, Ordering::Less);
        let range = Self::new(lower, upper);
        (!range.is_empty()).then_some(range)
    }

    /// The smallest range covering both ranges.
    pub fn hull(&self, other: &Self) -> Self {
        Self::new(
            looser(&self.lower, &other.lower, Ordering::Less),
            looser(&self.upper, &other.upper, Ordering::Greater),
        )
    }

    /// Inclusive integer bounds, `None` standing for unbounded.
    ///
    /// Bounds that are not integers are treated as unbounded.
    pub fn integer_bounds(&self) -> (Option<i64>, Option<i64>) {
        let lower = match &self.lower {
            Bound::Included(v) => v.as_i64(),
            Bound::Excluded(v) => v.as_i64().and_then(|v| v.checked_add(1)),
            Bound::Unbounded => None,
        };
        let upper = match &self.upper {
            Bound::Included(v) => v.as_i64(),
            Bound::Excluded(v) => v.as_i64().and_then(|v| v.checked_sub(1)),
            Bound::Unbounded => None,
        };
        (lower, upper)
    }
}

fn bound_value(b: &Bound<Value>) -> Option<&Value> {
    match b {
        Bound::Included(v) | Bound::Excluded(v) => Some(v),
        Bound::Unbounded => None,
    }
}

/// Picks the more restrictive of two bounds of the same side. `towards` is
/// the ordering a more restrictive value has against the other one.
fn tighter(a: &Bound<Value>, b: &Bound<Value>, towards: Ordering) -> Bound<Value> {
    let (Some(va), Some(vb)) = (bound_value(a), bound_value(b)) else {
        return if matches!(a, Bound::Unbounded) {
            b.clone()
        } else {
            a.clone()
        };
    };
    match va.compare(vb) {
        Some(Ordering::Equal) => {
            if matches!(a, Bound::Excluded(_)) {
                a.clone()
            } else {
                b.clone()
            }
        }
        Some(ord) if ord == towards => a.clone(),
        Some(_) => b.clone(),
        None => a.clone(),
    }
}

/// Picks the less restrictive of two bounds of the same side.
fn looser(a: &Bound<Value>, b: &Bound<Value>, towards: Ordering) -> Bound<Value> {
    let (Some(va), Some(vb)) = (bound_value(a), bound_value(b)) else {
        return Bound::Unbounded;
    };
    match va.compare(vb) {
        Some(Ordering::Equal) => {
            if matches!(a, Bound::Included(_)) {
                a.clone()
            } else {
                b.clone()
            }
        }
        Some(ord) if ord == towards => a.clone(),
        Some(_) => b.clone(),
        None => Bound::Unbounded,
    }
}

/// Finds the available target whose trailing number equals `index`.
///
/// `t_order_1` and `t_order_01` both match index 1, `t_order_11` does not.
pub(crate) fn target_with_suffix(available_targets: &[String], index: i64) -> Option<String> {
    available_targets
        .iter()
        .find(|target| trailing_number(target) == Some(index))
        .cloned()
}

pub(crate) fn trailing_number(target: &str) -> Option<i64> {
    let digits = target.len() - target.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    target[target.len() - digits..].parse().ok()
}

pub(crate) fn require_integer(value: &Value) -> Result<i64> {
    value
        .as_i64()
        .ok_or_else(|| AlgorithmError::NotAnInteger {
            value: value.clone(),
        })
}

pub(crate) fn prop<'a>(props: &'a Props, property: &str) -> Result<&'a serde_json::Value> {
    props
        .get(property)
        .ok_or_else(|| AlgorithmError::MissingProperty {
            property: property.to_owned(),
        })
}

fn invalid(property: &str, reason: impl Into<String>) -> AlgorithmError {
    AlgorithmError::InvalidProperty {
        property: property.to_owned(),
        reason: reason.into(),
    }
}

/// Integer property, accepted as a JSON number or numeric string.
pub(crate) fn prop_i64(props: &Props, property: &str) -> Result<i64> {
    let value = match prop(props, property)? {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    value.ok_or_else(|| invalid(property, "expected an integer"))
}

pub(crate) fn prop_string(props: &Props, property: &str) -> Result<String> {
    match prop(props, property)? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Ok(s.trim().to_owned()),
        _ => Err(invalid(property, "expected a non empty string")),
    }
}

/// Boolean property, absent meaning `false`.
pub(crate) fn prop_bool(props: &Props, property: &str) -> Result<bool> {
    match props.get(property) {
        None => Ok(false),
        Some(serde_json::Value::Bool(b)) => Ok(*b),
        Some(serde_json::Value::String(s)) => s
            .trim()
            .to_ascii_lowercase()
            .parse()
            .map_err(|_| invalid(property, "expected true or false")),
        Some(_) => Err(invalid(property, "expected true or false")),
    }
}

/// Integer list property, either a JSON array or a comma separated string.
pub(crate) fn prop_i64_list(props: &Props, property: &str) -> Result<Vec<i64>> {
    let items: Vec<String> = match prop(props, property)? {
        serde_json::Value::Array(items) => items
            .iter()
            .map(|item| match item {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        serde_json::Value::String(s) => s.split(',').map(str::to_owned).collect(),
        _ => return Err(invalid(property, "expected a list of integers")),
    };
    items
        .iter()
        .map(|item| {
            item.trim()
                .parse()
                .map_err(|_| invalid(property, format!("{item:?} is not an integer")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(v: i64) -> Value {
        Value::Integer(v)
    }

    #[test]
    fn intersect_narrows_and_detects_empty() {
        let r = ValueRange::at_least(int(3))
            .intersect(&ValueRange::less_than(int(10)))
            .unwrap();
        assert_eq!(r, ValueRange::new(Bound::Included(int(3)), Bound::Excluded(int(10))));

        assert!(ValueRange::greater_than(int(5))
            .intersect(&ValueRange::at_most(int(5)))
            .is_none());
        assert!(ValueRange::closed(int(5), int(5))
            .intersect(&ValueRange::all())
            .is_some());
    }

    #[test]
    fn intersect_prefers_exclusive_on_equal_bounds() {
        let r = ValueRange::at_least(int(3))
            .intersect(&ValueRange::greater_than(int(3)))
            .unwrap();
        assert_eq!(r.lower, Bound::Excluded(int(3)));
    }

    #[test]
    fn hull_widens() {
        let r = ValueRange::closed(int(1), int(3)).hull(&ValueRange::closed(int(7), int(9)));
        assert_eq!(r, ValueRange::closed(int(1), int(9)));

        let r = ValueRange::closed(int(1), int(3)).hull(&ValueRange::at_least(int(2)));
        assert_eq!(r, ValueRange::at_least(int(1)));
    }

    #[test]
    fn contains_is_conservative_for_incomparable_values() {
        let r = ValueRange::closed(int(1), int(3));
        assert!(r.contains(&int(2)));
        assert!(!r.contains(&int(4)));
        assert!(r.contains(&Value::from("abc")));
    }

    #[test]
    fn integer_bounds_are_inclusive() {
        let r = ValueRange::new(Bound::Excluded(int(1)), Bound::Excluded(int(5)));
        assert_eq!(r.integer_bounds(), (Some(2), Some(4)));
        assert_eq!(ValueRange::at_most(Value::from("x")).integer_bounds(), (None, None));
    }

    #[test]
    fn suffix_matching() {
        let targets = vec![
            "t_order_1".to_owned(),
            "t_order_11".to_owned(),
            "t_order_02".to_owned(),
        ];
        assert_eq!(target_with_suffix(&targets, 11).as_deref(), Some("t_order_11"));
        assert_eq!(target_with_suffix(&targets, 2).as_deref(), Some("t_order_02"));
        assert_eq!(target_with_suffix(&targets, 3), None);
    }

    #[test]
    fn props_accept_numbers_and_strings() {
        let props: Props = [
            ("a".to_owned(), serde_json::json!(4)),
            ("b".to_owned(), serde_json::json!(" 4 ")),
            ("c".to_owned(), serde_json::json!("1, 5,9")),
            ("d".to_owned(), serde_json::json!([1, "5"])),
            ("e".to_owned(), serde_json::json!("TRUE")),
        ]
        .into();

        assert_eq!(prop_i64(&props, "a").unwrap(), 4);
        assert_eq!(prop_i64(&props, "b").unwrap(), 4);
        assert_eq!(prop_i64_list(&props, "c").unwrap(), vec![1, 5, 9]);
        assert_eq!(prop_i64_list(&props, "d").unwrap(), vec![1, 5]);
        assert!(prop_bool(&props, "e").unwrap());
        assert!(!prop_bool(&props, "missing").unwrap());
        assert!(matches!(
            prop_i64(&props, "missing"),
            Err(AlgorithmError::MissingProperty { .. })
        ));
        assert!(matches!(
            prop_i64(&props, "c"),
            Err(AlgorithmError::InvalidProperty { .. })
        ));
    }
}
