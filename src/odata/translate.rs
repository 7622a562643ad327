//! Query options to SQL.
//!
//! [`translate`] validates [`QueryOptions`] against a capability set and an
//! entity schema and produces a [`ComposedQuery`]. The composed query is still
//! lazy: a store turns it into SeaQuery statements (or evaluates it in memory)
//! only when the request materializes it.

use super::capabilities::QueryCapabilities;
use super::error::ValidationError;
use super::filter::{
    parse_filter, parse_order_by, CompareOp, Direction, FilterExpr, Literal, OrderByItem,
    StringFunction,
};
use super::options::QueryOptions;
use crate::entity::EntitySchema;
use sea_query::{Expr, ExprTrait, Order, Query, SelectStatement};

/// A validated query, ready to run against a store.
#[derive(Debug, Clone)]
pub struct ComposedQuery {
    pub schema: &'static EntitySchema,
    pub filter: Option<FilterExpr>,
    pub order_by: Vec<OrderByItem>,
    pub expand: Vec<&'static str>,
    pub top: Option<u64>,
    pub skip: Option<u64>,
    /// Whether the caller asked for `@odata.count`.
    pub count: bool,
}

impl ComposedQuery {
    /// The whole entity set, key order.
    pub fn unfiltered(schema: &'static EntitySchema) -> Self {
        Self {
            schema,
            filter: None,
            order_by: Vec::new(),
            expand: Vec::new(),
            top: None,
            skip: None,
            count: false,
        }
    }

    /// `SELECT <columns> FROM <table> [WHERE] ORDER BY ... [LIMIT] [OFFSET]`
    ///
    /// The key is always appended as the last sort column so pages are stable.
    pub fn select_statement(&self) -> SelectStatement {
        let mut query = Query::select();
        query.columns(self.schema.columns()).from(self.schema.table);

        if let Some(filter) = &self.filter {
            query.and_where(filter_to_expr(filter));
        }

        for item in &self.order_by {
            query.order_by(item.property.column, order(item.direction));
        }
        let key = self.schema.key_property();
        if !self.order_by.iter().any(|i| i.property.name == key.name) {
            query.order_by(key.column, Order::Asc);
        }

        if let Some(top) = self.top {
            query.limit(top);
        }
        if let Some(skip) = self.skip {
            query.offset(skip);
        }

        query.to_owned()
    }

    /// `SELECT COUNT(*)` over the filtered set, ignoring ordering and paging.
    pub fn count_statement(&self) -> SelectStatement {
        let mut query = Query::select();
        query.expr(Expr::cust("COUNT(*)")).from(self.schema.table);
        if let Some(filter) = &self.filter {
            query.and_where(filter_to_expr(filter));
        }
        query.to_owned()
    }
}

fn order(direction: Direction) -> Order {
    match direction {
        Direction::Asc => Order::Asc,
        Direction::Desc => Order::Desc,
    }
}

fn literal_to_expr(value: &Literal) -> Expr {
    match value {
        // range already checked by the parser
        Literal::Int(i) => Expr::val((*i).clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32),
        Literal::Str(s) => Expr::val(s.clone()),
        Literal::Null => Expr::cust("NULL"),
    }
}

/// Escape `%`, `_` and `\` so the argument matches literally under `LIKE`.
pub(crate) fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn filter_to_expr(filter: &FilterExpr) -> Expr {
    match filter {
        FilterExpr::Compare { property, op, value } => {
            let column = Expr::col(property.column);
            let value = literal_to_expr(value);
            match op {
                CompareOp::Eq => column.eq(value),
                CompareOp::Ne => column.ne(value),
                CompareOp::Gt => column.gt(value),
                CompareOp::Ge => column.gte(value),
                CompareOp::Lt => column.lt(value),
                CompareOp::Le => column.lte(value),
            }
        }
        FilterExpr::IsNull { property, negated } => {
            let column = Expr::col(property.column);
            if *negated {
                column.is_not_null()
            } else {
                column.is_null()
            }
        }
        FilterExpr::Function {
            function,
            property,
            argument,
        } => {
            let escaped = escape_like(argument);
            let pattern = match function {
                StringFunction::Contains => format!("%{escaped}%"),
                StringFunction::StartsWith => format!("{escaped}%"),
                StringFunction::EndsWith => format!("%{escaped}"),
            };
            Expr::col(property.column).like(pattern)
        }
        FilterExpr::Not(inner) => filter_to_expr(inner).not(),
        FilterExpr::And(left, right) => filter_to_expr(left).and(filter_to_expr(right)),
        FilterExpr::Or(left, right) => filter_to_expr(left).or(filter_to_expr(right)),
    }
}

/// Paging values end up as PostgreSQL `BIGINT` parameters, so anything above
/// `i64::MAX` is a client error rather than a bind failure.
fn parse_non_negative(option: &'static str, value: &str) -> Result<u64, ValidationError> {
    let invalid = |reason: &str| ValidationError::InvalidValue {
        option,
        value: value.to_string(),
        reason: reason.to_string(),
    };
    let parsed = value
        .trim()
        .parse::<u64>()
        .map_err(|_| invalid("must be a non-negative integer"))?;
    if i64::try_from(parsed).is_err() {
        return Err(invalid("must not exceed 9223372036854775807"));
    }
    Ok(parsed)
}

fn parse_expand(
    value: &str,
    schema: &'static EntitySchema,
) -> Result<Vec<&'static str>, ValidationError> {
    let mut expand = Vec::new();
    for item in value.split(',') {
        let name = item.trim();
        if name.is_empty() {
            return Err(ValidationError::InvalidValue {
                option: "$expand",
                value: value.to_string(),
                reason: "empty navigation property".to_string(),
            });
        }
        match schema.navigation.iter().find(|n| **n == name) {
            Some(nav) => expand.push(*nav),
            None if schema.property(name).is_some() => {
                return Err(ValidationError::NotNavigation {
                    property: name.to_string(),
                })
            }
            None => {
                return Err(ValidationError::UnknownProperty {
                    option: "$expand",
                    property: name.to_string(),
                })
            }
        }
    }
    Ok(expand)
}

/// Validate `options` against `capabilities` and compose the query.
///
/// # Errors
///
/// `NotAllowed` when an option is outside the capability set; otherwise any
/// parse or type error found in the option values.
pub fn translate(
    options: &QueryOptions,
    capabilities: &QueryCapabilities,
    schema: &'static EntitySchema,
) -> Result<ComposedQuery, ValidationError> {
    let mut query = ComposedQuery::unfiltered(schema);

    if options.select.is_some() {
        if !capabilities.select {
            return Err(ValidationError::NotAllowed { option: "$select" });
        }
        // projection is not implemented; only reachable with a permissive capability set
        return Err(ValidationError::Unsupported {
            option: "$select".to_string(),
        });
    }

    if let Some(filter) = &options.filter {
        if !capabilities.filter {
            return Err(ValidationError::NotAllowed { option: "$filter" });
        }
        query.filter = Some(parse_filter(filter, schema)?);
    }

    if let Some(order_by) = &options.order_by {
        if !capabilities.order_by {
            return Err(ValidationError::NotAllowed { option: "$orderby" });
        }
        query.order_by = parse_order_by(order_by, schema)?;
    }

    if let Some(expand) = &options.expand {
        if !capabilities.expand {
            return Err(ValidationError::NotAllowed { option: "$expand" });
        }
        query.expand = parse_expand(expand, schema)?;
    }

    if let Some(count) = &options.count {
        if !capabilities.count {
            return Err(ValidationError::NotAllowed { option: "$count" });
        }
        query.count = match count.trim().to_ascii_lowercase().as_str() {
            "true" => true,
            "false" => false,
            _ => {
                return Err(ValidationError::InvalidValue {
                    option: "$count",
                    value: count.clone(),
                    reason: "must be 'true' or 'false'".to_string(),
                })
            }
        };
    }

    if let Some(top) = &options.top {
        if !capabilities.top {
            return Err(ValidationError::NotAllowed { option: "$top" });
        }
        let top = parse_non_negative("$top", top)?;
        if let Some(max) = capabilities.max_top {
            if top > max {
                return Err(ValidationError::InvalidValue {
                    option: "$top",
                    value: top.to_string(),
                    reason: format!("the limit of {max} has been exceeded"),
                });
            }
        }
        query.top = Some(top);
    }

    if let Some(skip) = &options.skip {
        if !capabilities.skip {
            return Err(ValidationError::NotAllowed { option: "$skip" });
        }
        query.skip = Some(parse_non_negative("$skip", skip)?);
    }

    Ok(query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::CATEGORY_SCHEMA;
    use crate::odata::capabilities::CATEGORY_CAPABILITIES;
    use sea_query::PostgresQueryBuilder;

    fn compose(query: &str) -> Result<ComposedQuery, ValidationError> {
        let options = QueryOptions::parse(query)?;
        translate(&options, &CATEGORY_CAPABILITIES, &CATEGORY_SCHEMA)
    }

    #[test]
    fn test_select_is_rejected() {
        assert_eq!(
            compose("$select=name").unwrap_err(),
            ValidationError::NotAllowed { option: "$select" }
        );
    }

    #[test]
    fn test_unfiltered_select_orders_by_key() {
        let (sql, values) = compose("").unwrap().select_statement().build(PostgresQueryBuilder);
        assert!(sql.starts_with(r#"SELECT "id", "name" FROM "category""#), "{sql}");
        assert!(sql.contains(r#"ORDER BY "id" ASC"#), "{sql}");
        assert!(!sql.contains("WHERE"));
        assert!(!sql.contains("LIMIT"));
        assert!(values.0.is_empty());
    }

    #[test]
    fn test_filter_top_skip_become_where_limit_offset() {
        let query = compose("$filter=contains(name,'a')&$top=5&$skip=10").unwrap();
        let (sql, values) = query.select_statement().build(PostgresQueryBuilder);
        assert!(sql.contains(r#"WHERE "name" LIKE $1"#), "{sql}");
        assert!(sql.contains("LIMIT $2"), "{sql}");
        assert!(sql.contains("OFFSET $3"), "{sql}");
        assert_eq!(values.0.len(), 3);
        assert_eq!(values.0[0], sea_query::Value::from("%a%"));
    }

    #[test]
    fn test_order_by_appends_key_tiebreaker() {
        let (sql, _) = compose("$orderby=name desc")
            .unwrap()
            .select_statement()
            .build(PostgresQueryBuilder);
        assert!(sql.contains(r#"ORDER BY "name" DESC, "id" ASC"#), "{sql}");

        let (sql, _) = compose("$orderby=id desc")
            .unwrap()
            .select_statement()
            .build(PostgresQueryBuilder);
        assert!(sql.ends_with(r#"ORDER BY "id" DESC"#), "{sql}");
    }

    #[test]
    fn test_count_statement_ignores_paging() {
        let query = compose("$filter=id gt 3&$count=true&$top=1").unwrap();
        let (sql, values) = query.count_statement().build(PostgresQueryBuilder);
        assert!(sql.starts_with("SELECT COUNT(*)"), "{sql}");
        assert!(sql.contains(r#""id" > $1"#), "{sql}");
        assert!(!sql.contains("LIMIT"));
        assert!(!sql.contains("ORDER BY"));
        assert_eq!(values.0, vec![sea_query::Value::Int(Some(3))]);
    }

    #[test]
    fn test_null_comparison_uses_is_null() {
        let (sql, values) = compose("$filter=name eq null")
            .unwrap()
            .select_statement()
            .build(PostgresQueryBuilder);
        assert!(sql.contains(r#""name" IS NULL"#), "{sql}");
        assert!(values.0.is_empty());
    }

    #[test]
    fn test_like_argument_is_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }

    #[test]
    fn test_top_is_unbounded() {
        let query = compose("$top=1000000").unwrap();
        assert_eq!(query.top, Some(1_000_000));
    }

    #[test]
    fn test_top_respects_max_when_configured() {
        let caps = QueryCapabilities {
            max_top: Some(10),
            ..CATEGORY_CAPABILITIES
        };
        let options = QueryOptions::parse("$top=11").unwrap();
        assert!(matches!(
            translate(&options, &caps, &CATEGORY_SCHEMA),
            Err(ValidationError::InvalidValue { option: "$top", .. })
        ));
    }

    #[test]
    fn test_invalid_paging_values() {
        for query in ["$top=-1", "$top=abc", "$skip=1.5", "$top="] {
            assert!(
                matches!(compose(query), Err(ValidationError::InvalidValue { .. })),
                "should reject {query}"
            );
        }
    }

    #[test]
    fn test_paging_values_must_fit_bigint() {
        let query = compose("$top=9223372036854775807&$skip=9223372036854775807").unwrap();
        assert_eq!(query.top, Some(i64::MAX as u64));
        assert_eq!(query.skip, Some(i64::MAX as u64));

        for query in [
            "$top=9223372036854775808",
            "$top=18446744073709551615",
            "$skip=18446744073709551615",
            "$skip=18446744073709551616",
        ] {
            assert!(
                matches!(compose(query), Err(ValidationError::InvalidValue { .. })),
                "should reject {query}"
            );
        }
    }

    #[test]
    fn test_count_values() {
        assert!(compose("$count=true").unwrap().count);
        assert!(compose("$count=True").unwrap().count);
        assert!(matches!(compose("$count=yes"), Err(ValidationError::InvalidValue { .. })));
    }

    #[test]
    fn test_expand_has_no_navigation_properties() {
        assert_eq!(
            compose("$expand=name").unwrap_err(),
            ValidationError::NotNavigation {
                property: "name".into()
            }
        );
        assert!(matches!(
            compose("$expand=products"),
            Err(ValidationError::UnknownProperty { option: "$expand", .. })
        ));
        assert!(matches!(compose("$expand="), Err(ValidationError::InvalidValue { .. })));
    }

    #[test]
    fn test_disallowed_options_follow_capabilities() {
        let caps = QueryCapabilities {
            filter: false,
            ..CATEGORY_CAPABILITIES
        };
        let options = QueryOptions::parse("$filter=id eq 1").unwrap();
        assert_eq!(
            translate(&options, &caps, &CATEGORY_SCHEMA).unwrap_err(),
            ValidationError::NotAllowed { option: "$filter" }
        );
    }
}
