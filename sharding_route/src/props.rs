use serde::{Deserialize, Serialize};

/// Properties that change how routing is reported, never where a statement
/// is routed to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteProps {
    /// Log every route unit at `info`.
    pub sql_show: bool,
    /// Leave the bound parameters out of the `sql_show` log line.
    pub sql_simple: bool,
}

impl RouteProps {
    pub fn with_sql_show(mut self, sql_show: bool) -> Self {
        self.sql_show = sql_show;
        self
    }

    pub fn with_sql_simple(mut self, sql_simple: bool) -> Self {
        self.sql_simple = sql_simple;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_default_to_off() {
        let props: RouteProps = serde_json::from_str(r#"{"sql_show": true}"#).unwrap();
        assert_eq!(
            props,
            RouteProps {
                sql_show: true,
                sql_simple: false
            }
        );
    }
}
