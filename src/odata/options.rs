//! Raw query options as they arrive in the query string.

use super::error::ValidationError;
use url::form_urlencoded;

/// System query options this service knows how to validate.
///
/// Values are kept verbatim (after URL decoding); they are parsed and checked
/// against the capability set by [`translate`](super::translate::translate).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pub filter: Option<String>,
    pub order_by: Option<String>,
    pub select: Option<String>,
    pub expand: Option<String>,
    pub count: Option<String>,
    pub top: Option<String>,
    pub skip: Option<String>,
}

impl QueryOptions {
    /// Parse an `application/x-www-form-urlencoded` query string.
    ///
    /// Option names match case-insensitively; parameters without a `$` prefix
    /// are custom options and are ignored.
    ///
    /// # Errors
    ///
    /// `Duplicate` for a repeated option, `Unsupported` for any other
    /// `$`-prefixed name.
    pub fn parse(query: &str) -> Result<Self, ValidationError> {
        let mut options = QueryOptions::default();

        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            let key = key.trim();
            if !key.starts_with('$') {
                continue;
            }
            let name = key.to_ascii_lowercase();
            let slot = match name.as_str() {
                "$filter" => &mut options.filter,
                "$orderby" => &mut options.order_by,
                "$select" => &mut options.select,
                "$expand" => &mut options.expand,
                "$count" => &mut options.count,
                "$top" => &mut options.top,
                "$skip" => &mut options.skip,
                // $search, $apply, $format, ... and anything unknown
                _ => return Err(ValidationError::Unsupported { option: key.to_string() }),
            };
            if slot.is_some() {
                return Err(ValidationError::Duplicate { option: name });
            }
            *slot = Some(value.into_owned());
        }

        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_decodes_values() {
        let options =
            QueryOptions::parse("$filter=contains(name,%27a%27)&$orderby=name+desc&$top=5").unwrap();
        assert_eq!(options.filter.as_deref(), Some("contains(name,'a')"));
        assert_eq!(options.order_by.as_deref(), Some("name desc"));
        assert_eq!(options.top.as_deref(), Some("5"));
        assert!(options.skip.is_none());
    }

    #[test]
    fn test_option_names_are_case_insensitive() {
        let options = QueryOptions::parse("$TOP=2&$Skip=1").unwrap();
        assert_eq!(options.top.as_deref(), Some("2"));
        assert_eq!(options.skip.as_deref(), Some("1"));
    }

    #[test]
    fn test_percent_encoded_dollar() {
        let options = QueryOptions::parse("%24count=true").unwrap();
        assert_eq!(options.count.as_deref(), Some("true"));
    }

    #[test]
    fn test_custom_options_are_ignored() {
        let options = QueryOptions::parse("api-version=2&debug").unwrap();
        assert_eq!(options, QueryOptions::default());
    }

    #[test]
    fn test_empty_query() {
        assert_eq!(QueryOptions::parse("").unwrap(), QueryOptions::default());
    }

    #[test]
    fn test_duplicate_option_rejected() {
        let err = QueryOptions::parse("$top=1&$top=2").unwrap_err();
        assert_eq!(err, ValidationError::Duplicate { option: "$top".into() });
    }

    #[test]
    fn test_unknown_and_unsupported_options_rejected() {
        assert!(matches!(
            QueryOptions::parse("$search=books"),
            Err(ValidationError::Unsupported { .. })
        ));
        assert!(matches!(
            QueryOptions::parse("$bogus=1"),
            Err(ValidationError::Unsupported { option }) if option == "$bogus"
        ));
    }

    #[test]
    fn test_select_is_captured_not_rejected_here() {
        let options = QueryOptions::parse("$select=name").unwrap();
        assert_eq!(options.select.as_deref(), Some("name"));
    }
}
