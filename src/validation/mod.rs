//! Validator combinators shared by every tool request.
//!
//! Each operation declares its fields against the rules in this module; a request either
//! validates completely or the first failing field is reported as a [`ValidationError`].

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

mod filters;

pub use filters::{BALANCED_FILTER, FilterRule, SEARCH_FILTER, sanitize};

/// Deepest position reachable through offset pagination.
pub const MAX_PAGINATION_WINDOW: u32 = 10_000;

/// A field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Name of the offending argument.
    pub field: Cow<'static, str>,
    /// Why the value was rejected.
    pub message: String,
}

impl ValidationError {
    /// Build an error for `field`.
    pub fn new(field: impl Into<Cow<'static, str>>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

static ALNUM_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("identifier pattern"));
static TENANT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("tenant pattern"));
static TASK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,50}$").expect("task pattern"));
static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("email pattern")
});

/// Identifier rule: an optional URI prefix callers may include plus the allowed character set.
pub struct IdRule {
    kind: &'static str,
    prefix: Option<&'static str>,
    pattern: &'static Lazy<Regex>,
}

/// Entity identifiers, accepted bare or as `entities/<id>`.
pub static ENTITY_ID: IdRule = IdRule {
    kind: "entity",
    prefix: Some("entities/"),
    pattern: &ALNUM_ID,
};

/// Relation identifiers, accepted bare or as `relations/<id>`.
pub static RELATION_ID: IdRule = IdRule {
    kind: "relation",
    prefix: Some("relations/"),
    pattern: &ALNUM_ID,
};

/// Change request identifiers, accepted bare or as `changeRequests/<id>`.
pub static CHANGE_REQUEST_ID: IdRule = IdRule {
    kind: "change request",
    prefix: Some("changeRequests/"),
    pattern: &ALNUM_ID,
};

/// Tenant identifiers.
pub static TENANT_ID: IdRule = IdRule {
    kind: "tenant",
    prefix: None,
    pattern: &TENANT,
};

/// Workflow task identifiers.
pub static TASK_ID: IdRule = IdRule {
    kind: "task",
    prefix: None,
    pattern: &TASK,
};

impl IdRule {
    /// Business-configuration type names, accepted bare or as `<prefix><name>`.
    pub const fn configuration_type(kind: &'static str, prefix: &'static str) -> Self {
        Self {
            kind,
            prefix: Some(prefix),
            pattern: &ALNUM_ID,
        }
    }

    /// Strip the known prefix, trim, and check the remainder against the pattern.
    pub fn apply(&self, field: &'static str, raw: &str) -> Result<String, ValidationError> {
        let trimmed = raw.trim();
        let bare = self
            .prefix
            .and_then(|prefix| trimmed.strip_prefix(prefix))
            .unwrap_or(trimmed);
        if bare.is_empty() {
            return Err(ValidationError::new(field, "must not be empty"));
        }
        if !self.pattern.is_match(bare) {
            return Err(ValidationError::new(
                field,
                format!("'{bare}' is not a valid {} identifier", self.kind),
            ));
        }
        Ok(bare.to_string())
    }

    /// Validate and render the identifier with its prefix, e.g. `entities/<id>`.
    pub fn apply_uri(&self, field: &'static str, raw: &str) -> Result<String, ValidationError> {
        let bare = self.apply(field, raw)?;
        Ok(match self.prefix {
            Some(prefix) => format!("{prefix}{bare}"),
            None => bare,
        })
    }
}

/// Inclusive integer bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    min: i64,
    max: i64,
}

impl Range {
    /// Bounds `min..=max`.
    pub const fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    /// Lower bound only.
    pub const fn at_least(min: i64) -> Self {
        Self { min, max: i64::MAX }
    }

    /// Reject values outside the range.
    pub fn check(&self, field: &'static str, value: i64) -> Result<i64, ValidationError> {
        if value < self.min {
            return Err(ValidationError::new(
                field,
                format!("must be greater than or equal to {}", self.min),
            ));
        }
        if value > self.max {
            return Err(ValidationError::new(
                field,
                format!("must be less than or equal to {}", self.max),
            ));
        }
        Ok(value)
    }

    /// Pull a value into the range instead of rejecting it.
    pub fn clamp(&self, value: i64) -> i64 {
        value.clamp(self.min, self.max)
    }
}

/// Offset/size pair that passed the pagination checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Zero-based start position.
    pub offset: u32,
    /// Page size.
    pub max: u32,
}

/// Check offset and page size individually, then reject windows deeper than
/// [`MAX_PAGINATION_WINDOW`].
pub fn page(
    offset: i64,
    (max_field, max): (&'static str, i64),
    max_range: Range,
) -> Result<Page, ValidationError> {
    let offset = Range::new(0, MAX_PAGINATION_WINDOW as i64).check("offset", offset)?;
    let max = max_range.check(max_field, max)?;
    if offset + max > MAX_PAGINATION_WINDOW as i64 {
        return Err(ValidationError::new(
            "offset",
            format!("the sum of offset and {max_field} must not exceed {MAX_PAGINATION_WINDOW}"),
        ));
    }
    Ok(Page {
        offset: offset as u32,
        max: max as u32,
    })
}

/// Closed set of allowed literals.
pub struct OneOf {
    allowed: &'static [&'static str],
    lowercase: bool,
}

impl OneOf {
    /// Match exactly.
    pub const fn exact(allowed: &'static [&'static str]) -> Self {
        Self {
            allowed,
            lowercase: false,
        }
    }

    /// Lowercase the input before matching.
    pub const fn lowercase(allowed: &'static [&'static str]) -> Self {
        Self {
            allowed,
            lowercase: true,
        }
    }

    /// Return the normalized literal or fail.
    pub fn apply(&self, field: &'static str, raw: &str) -> Result<String, ValidationError> {
        let value = if self.lowercase {
            raw.trim().to_lowercase()
        } else {
            raw.trim().to_string()
        };
        if self.allowed.contains(&value.as_str()) {
            Ok(value)
        } else {
            Err(ValidationError::new(
                field,
                format!("must be one of: {}", self.allowed.join(", ")),
            ))
        }
    }

    /// Like [`OneOf::apply`] but treats a missing or blank value as `default`.
    pub fn apply_or(
        &self,
        field: &'static str,
        raw: Option<&str>,
        default: &'static str,
    ) -> Result<String, ValidationError> {
        match raw.map(str::trim).filter(|value| !value.is_empty()) {
            Some(value) => self.apply(field, value),
            None => Ok(default.to_string()),
        }
    }
}

/// Sort order.
pub static ORDER: OneOf = OneOf::lowercase(&["asc", "desc"]);
/// Relation activeness.
pub static ACTIVENESS: OneOf = OneOf::lowercase(&["active", "all", "not_active"]);
/// Entity search activeness, which also accepts `expired`.
pub static ENTITY_ACTIVENESS: OneOf =
    OneOf::lowercase(&["active", "all", "not_active", "expired"]);
/// Workflow task validity state.
pub static TASK_STATE: OneOf = OneOf::lowercase(&["valid", "invalid", "all"]);
/// Workflow task priority class.
pub static PRIORITY_CLASS: OneOf = OneOf::exact(&["Urgent", "High", "Medium", "Low"]);
/// Workflow task sort field.
pub static TASK_ORDER_BY: OneOf = OneOf::exact(&["createTime", "assignee", "dueDate", "priority"]);

/// Trim and require a non-empty string.
pub fn non_empty(field: &'static str, raw: &str) -> Result<String, ValidationError> {
    let value = raw.trim();
    if value.is_empty() {
        Err(ValidationError::new(field, "must not be empty"))
    } else {
        Ok(value.to_string())
    }
}

/// Trim and bound the length of a string, allowing it to be empty.
pub fn bounded(field: &'static str, raw: &str, max_len: usize) -> Result<String, ValidationError> {
    let value = raw.trim();
    if value.chars().count() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {max_len} characters"),
        ));
    }
    Ok(value.to_string())
}

/// Require exactly `expected` elements.
pub fn exact_len<T>(field: &'static str, items: &[T], expected: usize) -> Result<(), ValidationError> {
    if items.len() == expected {
        Ok(())
    } else {
        Err(ValidationError::new(
            field,
            format!("must contain exactly {expected} items, got {}", items.len()),
        ))
    }
}

/// Require at least `min` elements.
pub fn min_len<T>(field: &'static str, items: &[T], min: usize) -> Result<(), ValidationError> {
    if items.len() >= min {
        Ok(())
    } else {
        Err(ValidationError::new(
            field,
            format!("must contain at least {min} item(s)"),
        ))
    }
}

/// Validated timestamp bounds in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    /// Exclusive or inclusive lower bound, depending on the operation.
    pub lower: Option<i64>,
    /// Upper bound; strictly greater than `lower` when both are set.
    pub upper: Option<i64>,
}

/// Check a pair of timestamp bounds: each must be positive (or non-negative when
/// `allow_zero`) and the upper must exceed the lower when both are given.
pub fn time_window(
    (lower_field, lower): (&'static str, Option<i64>),
    (upper_field, upper): (&'static str, Option<i64>),
    allow_zero: bool,
) -> Result<TimeWindow, ValidationError> {
    let floor = if allow_zero { 0 } else { 1 };
    for (field, value) in [(lower_field, lower), (upper_field, upper)] {
        if let Some(value) = value {
            Range::at_least(floor).check(field, value)?;
        }
    }
    if let (Some(lower), Some(upper)) = (lower, upper) {
        if upper <= lower {
            return Err(ValidationError::new(
                upper_field,
                format!("must be greater than {lower_field}"),
            ));
        }
    }
    Ok(TimeWindow { lower, upper })
}

/// Which side of a mutually exclusive pair of parameter groups was supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusive {
    /// Only the first group.
    First,
    /// Only the second group.
    Second,
}

/// Require exactly one of two parameter groups to be present.
pub fn exactly_one_group(
    (first_name, first_present): (&'static str, bool),
    (second_name, second_present): (&'static str, bool),
) -> Result<Exclusive, ValidationError> {
    match (first_present, second_present) {
        (true, false) => Ok(Exclusive::First),
        (false, true) => Ok(Exclusive::Second),
        (true, true) => Err(ValidationError::new(
            first_name,
            format!("cannot be combined with {second_name}"),
        )),
        (false, false) => Err(ValidationError::new(
            first_name,
            format!("either {first_name} or {second_name} must be provided"),
        )),
    }
}

/// Trim and require a plausible e-mail address.
pub fn email(field: &'static str, raw: &str) -> Result<String, ValidationError> {
    let value = raw.trim();
    if EMAIL.is_match(value) {
        Ok(value.to_string())
    } else {
        Err(ValidationError::new(field, "must be a valid email address"))
    }
}

/// Collapse an optional string into `None` when blank, trimming otherwise.
pub fn optional_text(raw: Option<String>) -> Option<String> {
    raw.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
