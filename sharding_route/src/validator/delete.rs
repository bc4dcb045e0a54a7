use sql_statement::DeleteStatement;

use crate::{Error, Result, RouteContext};

pub(super) fn post_validate(delete: &DeleteStatement, route: &RouteContext) -> Result<()> {
    if delete.limit.is_some() && route.len() > 1 {
        return Err(Error::MultipleDataNodesWithLimit {
            statement: "DELETE",
            units: route.len(),
        });
    }
    Ok(())
}
