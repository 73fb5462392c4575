//! Filter-expression sanitizing.

use super::ValidationError;

const BLACKLIST: [char; 5] = ['<', '>', '\'', '"', ';'];

/// Rule for a free-form filter expression.
pub struct FilterRule {
    max_len: usize,
    strip_blacklist: bool,
}

/// Entity search filters: balanced parentheses, blacklisted characters removed.
pub static SEARCH_FILTER: FilterRule = FilterRule {
    max_len: 4_000,
    strip_blacklist: true,
};

/// Filters forwarded verbatim (relation search, match refinements): balanced parentheses only.
pub static BALANCED_FILTER: FilterRule = FilterRule {
    max_len: 4_000,
    strip_blacklist: false,
};

impl FilterRule {
    /// Check parentheses, then sanitize. Blank input yields an empty string.
    pub fn apply(&self, field: &'static str, raw: &str) -> Result<String, ValidationError> {
        let value = raw.trim();
        if value.is_empty() {
            return Ok(String::new());
        }
        if value.chars().count() > self.max_len {
            return Err(ValidationError::new(
                field,
                format!("must be at most {} characters", self.max_len),
            ));
        }
        let opening = value.matches('(').count();
        let closing = value.matches(')').count();
        if opening != closing {
            return Err(ValidationError::new(
                field,
                "Unbalanced parentheses in filter expression",
            ));
        }
        if self.strip_blacklist {
            Ok(sanitize(value))
        } else {
            Ok(value.to_string())
        }
    }
}

/// Remove `< > ' " ;` from free text.
pub fn sanitize(value: &str) -> String {
    value.chars().filter(|c| !BLACKLIST.contains(c)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbalanced_parentheses_fail() {
        for filter in ["(a", "a)", "((a)", "equals(type,'x'))"] {
            assert!(SEARCH_FILTER.apply("filter", filter).is_err(), "{filter}");
            assert!(BALANCED_FILTER.apply("filter", filter).is_err(), "{filter}");
        }
    }

    #[test]
    fn balanced_filters_only_lose_blacklisted_characters() {
        let clean = "equals(attributes.FirstName,John) and exists(attributes.Email)";
        assert_eq!(SEARCH_FILTER.apply("filter", clean).unwrap(), clean);
        assert_eq!(
            SEARCH_FILTER
                .apply("filter", "equals(attributes.LastName, 'Smith');<b>")
                .unwrap(),
            "equals(attributes.LastName, Smith)b"
        );
    }

    #[test]
    fn relation_filters_keep_quotes() {
        let filter = "equals(type,'configuration/relationTypes/HasAddress')";
        assert_eq!(BALANCED_FILTER.apply("filter", filter).unwrap(), filter);
    }

    #[test]
    fn blank_filter_is_empty() {
        assert_eq!(SEARCH_FILTER.apply("filter", "   ").unwrap(), "");
    }
}
