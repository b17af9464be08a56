use super::error::FilterError;
use super::types::{OrderBy, SortDirection};
use crate::database::statement::Ident;

pub struct FilterOrder;

impl FilterOrder {
    /// Parses `"timestamp desc, username"` into order terms.
    pub fn parse(order: &str) -> Result<Vec<OrderBy>, FilterError> {
        let mut out = Vec::new();
        for part in order.split(',') {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                continue;
            }
            let mut it = trimmed.split_whitespace();
            let Some(col) = it.next() else { continue };
            let sort = match it.next() {
                None => SortDirection::Asc,
                Some(dir) if dir.eq_ignore_ascii_case("asc") => SortDirection::Asc,
                Some(dir) if dir.eq_ignore_ascii_case("desc") => SortDirection::Desc,
                Some(dir) => return Err(FilterError::InvalidOrder(format!("unknown direction '{}'", dir))),
            };
            if it.next().is_some() {
                return Err(FilterError::InvalidOrder(format!("unexpected tokens in '{}'", trimmed)));
            }
            let column = Ident::new(col).map_err(|_| FilterError::InvalidColumn(col.to_string()))?;
            out.push(OrderBy { column, sort });
        }
        Ok(out)
    }
}
