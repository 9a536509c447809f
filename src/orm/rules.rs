//! Built-in field rules: email, length bounds, numeric bounds and patterns.

use regex::Regex;
use serde_json::Value;
use std::fmt;

#[derive(Clone)]
enum Check {
    Email,
    MinLength(usize),
    MaxLength(usize),
    Min(f64),
    Max(f64),
    Pattern(Regex),
}

/// A rule attached to a field with [`SchemaField::rule`](super::SchemaField::rule).
///
/// Rules only look at values they apply to: length bounds at strings and
/// arrays, numeric bounds at numbers, email and patterns at strings.
#[derive(Clone)]
pub struct Rule {
    check: Check,
    message: Option<String>,
}

impl Rule {
    fn of(check: Check) -> Self {
        Self { check, message: None }
    }

    pub fn email() -> Self {
        Self::of(Check::Email)
    }

    pub fn min_length(min: usize) -> Self {
        Self::of(Check::MinLength(min))
    }

    pub fn max_length(max: usize) -> Self {
        Self::of(Check::MaxLength(max))
    }

    pub fn min(min: f64) -> Self {
        Self::of(Check::Min(min))
    }

    pub fn max(max: f64) -> Self {
        Self::of(Check::Max(max))
    }

    pub fn pattern(pattern: Regex) -> Self {
        Self::of(Check::Pattern(pattern))
    }

    /// Replaces the default violation message.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn name(&self) -> &'static str {
        match self.check {
            Check::Email => "email",
            Check::MinLength(_) => "minLength",
            Check::MaxLength(_) => "maxLength",
            Check::Min(_) => "min",
            Check::Max(_) => "max",
            Check::Pattern(_) => "pattern",
        }
    }

    /// `None` when `value` passes, otherwise the violation message.
    pub(crate) fn check(&self, value: &Value) -> Option<String> {
        let passes = match &self.check {
            Check::Email => value.as_str().is_none_or(is_email),
            Check::MinLength(min) => length(value).is_none_or(|len| len >= *min),
            Check::MaxLength(max) => length(value).is_none_or(|len| len <= *max),
            Check::Min(min) => value.as_f64().is_none_or(|n| n >= *min),
            Check::Max(max) => value.as_f64().is_none_or(|n| n <= *max),
            Check::Pattern(pattern) => value.as_str().is_none_or(|s| pattern.is_match(s)),
        };
        if passes {
            return None;
        }
        Some(self.message.clone().unwrap_or_else(|| self.default_message()))
    }

    fn default_message(&self) -> String {
        match &self.check {
            Check::Email => "must be a valid email address".to_string(),
            Check::MinLength(min) => format!("must be at least {min} characters long"),
            Check::MaxLength(max) => format!("must be at most {max} characters long"),
            Check::Min(min) => format!("must be greater than or equal to {min}"),
            Check::Max(max) => format!("must be less than or equal to {max}"),
            Check::Pattern(pattern) => format!("must match `{}`", pattern.as_str()),
        }
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name())
            .field("message", &self.message)
            .finish()
    }
}

fn length(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    }
}

/// `local@domain.tld`: one `@`, no whitespace, and a dot inside the domain.
fn is_email(s: &str) -> bool {
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn emails_need_a_dotted_domain() {
        assert!(is_email("ada@math.org"));
        assert!(is_email("a.b@c.d.e"));
        assert!(!is_email("ada@math"));
        assert!(!is_email("ada@.org"));
        assert!(!is_email("ada@org."));
        assert!(!is_email("@math.org"));
        assert!(!is_email("ada lovelace@math.org"));
        assert!(!is_email("a@b@c.org"));
    }

    #[test]
    fn bounds_apply_to_matching_kinds_only() {
        assert!(Rule::min_length(3).check(&json!("ab")).is_some());
        assert!(Rule::min_length(3).check(&json!("abc")).is_none());
        assert!(Rule::max_length(1).check(&json!([1, 2])).is_some());
        assert!(Rule::min_length(3).check(&json!(1)).is_none());
        assert!(Rule::min(18.0).check(&json!(17)).is_some());
        assert!(Rule::max(1.5).check(&json!(1.5)).is_none());
        assert!(Rule::max(1.5).check(&json!("9")).is_none());
    }

    #[test]
    fn lengths_count_characters() {
        assert!(Rule::max_length(4).check(&json!("ñañá")).is_none());
    }

    #[test]
    fn messages_default_or_override() {
        let slug = Regex::new("^[a-z-]+$").unwrap();
        assert_eq!(
            Rule::pattern(slug.clone()).check(&json!("Not A Slug")).as_deref(),
            Some("must match `^[a-z-]+$`")
        );
        assert_eq!(
            Rule::pattern(slug).message("lowercase words only").check(&json!("X")).as_deref(),
            Some("lowercase words only")
        );
        assert_eq!(
            Rule::min(0.0).check(&json!(-1)).as_deref(),
            Some("must be greater than or equal to 0")
        );
    }
}
