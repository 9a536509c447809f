//! Declarative field types, validation and transforms for models.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use futures::future::{self, BoxFuture, FutureExt};
use super::rules::Rule;
use serde_json::{Map, Number, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

/// A JSON object: record data, conditions, rows.
pub type Row = Map<String, Value>;

/// Declared type per column, used to bind values with a matching SQL type.
pub type ColumnTypes = HashMap<String, FieldType>;

/// Every violation message, per field.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

type Validator = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<bool, String>> + Send + Sync>;
type Transformer = Arc<dyn Fn(&Value) -> Value + Send + Sync>;
type Factory = Arc<dyn Fn() -> Value + Send + Sync>;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display, strum_macros::EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    Object,
    Array,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("field `{field}` is required")]
    Required { field: String },

    #[error("field `{field}` must be of type {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: FieldType,
        found: &'static str,
    },

    #[error("validation failed for field `{field}`")]
    ValidationFailed { field: String },

    #[error("validation of field `{field}` was rejected: {reason}")]
    ValidationRejected { field: String, reason: String },

    #[error("field `{field}` {message}")]
    RuleViolation {
        field: String,
        rule: &'static str,
        message: String,
    },
}

impl SchemaError {
    pub fn field(&self) -> &str {
        match self {
            Self::Required { field }
            | Self::TypeMismatch { field, .. }
            | Self::ValidationFailed { field }
            | Self::ValidationRejected { field, .. }
            | Self::RuleViolation { field, .. } => field,
        }
    }
}

/// Value injected for a field missing from the input.
#[derive(Clone)]
pub enum FieldDefault {
    Value(Value),
    Factory(Factory),
}

impl FieldDefault {
    fn produce(&self) -> Value {
        match self {
            Self::Value(value) => value.clone(),
            Self::Factory(factory) => factory(),
        }
    }
}

impl fmt::Debug for FieldDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => write!(f, "Value({value})"),
            Self::Factory(_) => f.write_str("Factory"),
        }
    }
}

/// One declared field.
///
/// ```rust,ignore
/// SchemaField::new("email", FieldType::String)
///     .required()
///     .email()
///     .rule(Rule::max_length(120).message("is too long"))
///     .transform(|v| json!(v.as_str().unwrap_or_default().to_lowercase()))
/// ```
#[derive(Clone)]
pub struct SchemaField {
    name: String,
    kind: FieldType,
    required: bool,
    unique: bool,
    default: Option<FieldDefault>,
    reference: Option<String>,
    rules: Vec<Rule>,
    validator: Option<Validator>,
    transformer: Option<Transformer>,
}

impl SchemaField {
    pub fn new(name: impl Into<String>, kind: FieldType) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            unique: false,
            default: None,
            reference: None,
            rules: Vec::new(),
            validator: None,
            transformer: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(FieldDefault::Value(value.into()));
        self
    }

    pub fn default_with<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = Some(FieldDefault::Factory(Arc::new(factory)));
        self
    }

    /// Name of the model this field refers to.
    pub fn reference(mut self, model: impl Into<String>) -> Self {
        self.reference = Some(model.into());
        self
    }

    /// Adds a built-in rule. Rules run in the order they were added.
    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn email(self) -> Self {
        self.rule(Rule::email())
    }

    pub fn min_length(self, min: usize) -> Self {
        self.rule(Rule::min_length(min))
    }

    pub fn max_length(self, max: usize) -> Self {
        self.rule(Rule::max_length(max))
    }

    pub fn min(self, min: f64) -> Self {
        self.rule(Rule::min(min))
    }

    pub fn max(self, max: f64) -> Self {
        self.rule(Rule::max(max))
    }

    pub fn pattern(self, pattern: regex::Regex) -> Self {
        self.rule(Rule::pattern(pattern))
    }

    pub fn validate<F>(mut self, check: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(move |value: Value| future::ready(Ok::<_, String>(check(&value))).boxed()));
        self
    }

    /// An async validator; `Err(reason)` rejects the value with a reason.
    pub fn validate_async<F, Fut>(mut self, check: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, String>> + Send + 'static,
    {
        self.validator = Some(Arc::new(move |value: Value| check(value).boxed()));
        self
    }

    pub fn transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.transformer = Some(Arc::new(transform));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FieldType {
        self.kind
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn default_value(&self) -> Option<&FieldDefault> {
        self.default.as_ref()
    }

    pub fn referenced_model(&self) -> Option<&str> {
        self.reference.as_deref()
    }
}

impl SchemaField {
    /// Missing and null values only fail `required`. A type mismatch skips
    /// the remaining checks.
    async fn violations(&self, data: &Row, first_only: bool) -> Vec<SchemaError> {
        let Some(value) = data.get(&self.name).filter(|v| !v.is_null()) else {
            if self.required {
                return vec![SchemaError::Required {
                    field: self.name.clone(),
                }];
            }
            return Vec::new();
        };

        if !matches_type(value, self.kind) {
            return vec![SchemaError::TypeMismatch {
                field: self.name.clone(),
                expected: self.kind,
                found: json_type(value),
            }];
        }

        let mut errors = Vec::new();
        for rule in &self.rules {
            if let Some(message) = rule.check(value) {
                errors.push(SchemaError::RuleViolation {
                    field: self.name.clone(),
                    rule: rule.name(),
                    message,
                });
                if first_only {
                    return errors;
                }
            }
        }

        if let Some(validator) = &self.validator {
            match validator(value.clone()).await {
                Ok(true) => {}
                Ok(false) => errors.push(SchemaError::ValidationFailed {
                    field: self.name.clone(),
                }),
                Err(reason) => errors.push(SchemaError::ValidationRejected {
                    field: self.name.clone(),
                    reason,
                }),
            }
        }
        errors
    }
}

impl fmt::Debug for SchemaField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaField")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("required", &self.required)
            .field("unique", &self.unique)
            .field("default", &self.default)
            .field("reference", &self.reference)
            .field("rules", &self.rules)
            .field("validator", &self.validator.is_some())
            .field("transformer", &self.transformer.is_some())
            .finish()
    }
}

/// Ordered set of declared fields.
#[derive(Clone, Debug, Default)]
pub struct Schema {
    fields: Vec<SchemaField>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `field`, replacing a previous declaration with the same name.
    pub fn field(mut self, field: SchemaField) -> Self {
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
        self
    }

    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn column_types(&self) -> ColumnTypes {
        self.fields.iter().map(|f| (f.name.clone(), f.kind)).collect()
    }

    /// Checks presence, type, built-in rules and the custom validator of
    /// every declared field, in declaration order, stopping at the first
    /// failure.
    pub async fn validate(&self, data: &Row) -> Result<(), SchemaError> {
        for field in &self.fields {
            if let Some(error) = field.violations(data, true).await.into_iter().next() {
                return Err(error);
            }
        }
        Ok(())
    }

    /// Like [`validate`](Self::validate) but collects every violation. An
    /// empty map means the data is valid.
    pub async fn errors(&self, data: &Row) -> FieldErrors {
        let mut errors = FieldErrors::new();
        for field in &self.fields {
            let messages: Vec<String> = field
                .violations(data, false)
                .await
                .iter()
                .map(ToString::to_string)
                .collect();
            if !messages.is_empty() {
                errors.insert(field.name.clone(), messages);
            }
        }
        errors
    }

    /// Declared fields only: present values are transformed (custom transform
    /// or type coercion), absent ones get their default. Nulls are kept as is.
    pub fn transform(&self, data: &Row) -> Row {
        let mut transformed = Row::new();
        for field in &self.fields {
            match data.get(&field.name) {
                Some(Value::Null) => {
                    transformed.insert(field.name.clone(), Value::Null);
                }
                Some(value) => {
                    let value = match &field.transformer {
                        Some(transform) => transform(value),
                        None => coerce_value(value, field.kind),
                    };
                    transformed.insert(field.name.clone(), value);
                }
                None => {
                    if let Some(default) = &field.default {
                        transformed.insert(field.name.clone(), default.produce());
                    }
                }
            }
        }
        transformed
    }

    /// Type coercion of stored rows: declared fields are normalized to their
    /// type (JSON text back to objects and arrays, integers back to
    /// booleans); other columns are kept.
    pub fn coerce(&self, mut data: Row) -> Row {
        for field in &self.fields {
            let Some(value) = data.get_mut(&field.name) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let coerced = match (field.kind, &*value) {
                (FieldType::Object | FieldType::Array, Value::String(text)) => {
                    serde_json::from_str(text).unwrap_or_else(|_| value.clone())
                }
                (kind, _) => coerce_value(value, kind),
            };
            *value = coerced;
        }
        data
    }
}

fn matches_type(value: &Value, kind: FieldType) -> bool {
    match kind {
        FieldType::String => value.is_string(),
        FieldType::Number => value.is_number(),
        FieldType::Boolean => value.is_boolean(),
        FieldType::Date => value.as_str().and_then(parse_date).is_some(),
        FieldType::Object => value.is_object(),
        FieldType::Array => value.is_array(),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Default coercion toward `kind`. Values that cannot be converted to a
/// number or date become `null`.
pub(crate) fn coerce_value(value: &Value, kind: FieldType) -> Value {
    match kind {
        FieldType::String => match value {
            Value::String(_) => value.clone(),
            Value::Bool(b) => Value::String(b.to_string()),
            Value::Number(n) => Value::String(n.to_string()),
            other => Value::String(other.to_string()),
        },
        FieldType::Number => match value {
            Value::Number(_) => value.clone(),
            Value::Bool(b) => Value::from(u8::from(*b)),
            Value::String(s) => s.trim().parse::<f64>().map(number).unwrap_or(Value::Null),
            _ => Value::Null,
        },
        FieldType::Boolean => Value::Bool(match value {
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
            Value::String(s) => !(s.is_empty() || s.eq_ignore_ascii_case("false") || s == "0"),
            Value::Null => false,
            Value::Array(_) | Value::Object(_) => true,
        }),
        FieldType::Date => {
            let parsed = match value {
                Value::String(s) => parse_date(s),
                Value::Number(n) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
                _ => None,
            };
            parsed.map(|d| Value::String(format_date(d))).unwrap_or(Value::Null)
        }
        FieldType::Object | FieldType::Array => value.clone(),
    }
}

/// Integral values stay integers so coercion is stable.
fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

pub(crate) fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(s) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

pub(crate) fn format_date(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    fn users() -> Schema {
        Schema::new()
            .field(SchemaField::new("name", FieldType::String).required())
            .field(SchemaField::new("age", FieldType::Number))
            .field(SchemaField::new("active", FieldType::Boolean).default(true))
            .field(SchemaField::new("born", FieldType::Date))
            .field(SchemaField::new("tags", FieldType::Array).default_with(|| json!([])))
    }

    #[tokio::test]
    async fn missing_required_fields_fail() {
        let err = users().validate(&row(json!({ "age": 3 }))).await.unwrap_err();
        assert_eq!(err, SchemaError::Required { field: "name".into() });

        let err = users().validate(&row(json!({ "name": null }))).await.unwrap_err();
        assert!(matches!(err, SchemaError::Required { .. }));

        users().validate(&row(json!({ "name": "ada" }))).await.unwrap();
    }

    #[tokio::test]
    async fn type_mismatches_name_the_field() {
        let err = users()
            .validate(&row(json!({ "name": "ada", "age": "three" })))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::TypeMismatch {
                field: "age".into(),
                expected: FieldType::Number,
                found: "string",
            }
        );
        assert!(err.to_string().contains("age"));

        let err = users()
            .validate(&row(json!({ "name": "ada", "born": "yesterday" })))
            .await
            .unwrap_err();
        assert!(matches!(err, SchemaError::TypeMismatch { expected: FieldType::Date, .. }));
    }

    #[tokio::test]
    async fn custom_validators_run_sync_and_async() {
        let schema = Schema::new()
            .field(SchemaField::new("email", FieldType::String).validate(|v| v.as_str().is_some_and(|s| s.contains('@'))))
            .field(SchemaField::new("code", FieldType::String).validate_async(|v| async move {
                match v.as_str() {
                    Some("taken") => Err("code already in use".to_string()),
                    _ => Ok(true),
                }
            }));

        let err = schema.validate(&row(json!({ "email": "nope" }))).await.unwrap_err();
        assert_eq!(err, SchemaError::ValidationFailed { field: "email".into() });

        let err = schema
            .validate(&row(json!({ "email": "a@b", "code": "taken" })))
            .await
            .unwrap_err();
        assert!(matches!(err, SchemaError::ValidationRejected { ref reason, .. } if reason == "code already in use"));

        schema.validate(&row(json!({ "email": "a@b", "code": "free" }))).await.unwrap();
    }

    fn accounts() -> Schema {
        Schema::new()
            .field(
                SchemaField::new("email", FieldType::String)
                    .required()
                    .email()
                    .max_length(12),
            )
            .field(
                SchemaField::new("handle", FieldType::String)
                    .min_length(3)
                    .pattern(regex::Regex::new("^[a-z]+$").unwrap()),
            )
            .field(
                SchemaField::new("age", FieldType::Number)
                    .rule(Rule::min(18.0).message("must be an adult"))
                    .max(130.0),
            )
    }

    #[tokio::test]
    async fn built_in_rules_stop_validation_at_the_first_violation() {
        let err = accounts()
            .validate(&row(json!({ "email": "not-an-email" })))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::RuleViolation {
                field: "email".into(),
                rule: "email",
                message: "must be a valid email address".into(),
            }
        );
        assert_eq!(err.to_string(), "field `email` must be a valid email address");

        let err = accounts()
            .validate(&row(json!({ "email": "ada@math.org", "age": 12 })))
            .await
            .unwrap_err();
        assert!(matches!(err, SchemaError::RuleViolation { ref message, .. } if message == "must be an adult"));

        accounts()
            .validate(&row(json!({ "email": "ada@math.org", "handle": "ada", "age": 36 })))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn errors_collect_every_violation_per_field() {
        let errors = accounts()
            .errors(&row(json!({
                "age": 200,
                "email": "lovelace@@math",
                "handle": "A1",
            })))
            .await;
        assert_eq!(
            errors["email"],
            vec![
                "field `email` must be a valid email address".to_string(),
                "field `email` must be at most 12 characters long".to_string(),
            ]
        );
        assert_eq!(errors["handle"].len(), 2);
        assert_eq!(errors["age"], vec!["field `age` must be less than or equal to 130".to_string()]);

        let errors = accounts().errors(&row(json!({ "handle": null, "age": "old" }))).await;
        assert_eq!(errors.keys().collect::<Vec<_>>(), ["age", "email"]);
        assert!(errors["email"][0].contains("required"));

        assert!(
            accounts()
                .errors(&row(json!({ "email": "ada@math.org" })))
                .await
                .is_empty()
        );
    }

    #[test]
    fn transform_whitelists_coerces_and_defaults() {
        let out = users().transform(&row(json!({
            "name": 42,
            "age": "7",
            "born": "2024-01-02",
            "extra": "dropped",
        })));
        assert_eq!(
            Value::Object(out),
            json!({
                "name": "42",
                "age": 7,
                "active": true,
                "born": "2024-01-02T00:00:00.000Z",
                "tags": [],
            })
        );
    }

    #[test]
    fn nulls_pass_through_transform() {
        let out = users().transform(&row(json!({ "name": null, "age": null })));
        assert_eq!(out["name"], Value::Null);
        assert_eq!(out["age"], Value::Null);
    }

    #[test]
    fn custom_transforms_replace_coercion() {
        let schema = Schema::new().field(
            SchemaField::new("email", FieldType::String)
                .transform(|v| json!(v.as_str().unwrap_or_default().to_lowercase())),
        );
        assert_eq!(schema.transform(&row(json!({ "email": "ADA@X.IO" })))["email"], "ada@x.io");
    }

    #[test]
    fn transform_is_idempotent_for_typed_input() {
        let input = row(json!({
            "name": "ada",
            "age": 36.5,
            "active": false,
            "born": "1815-12-10T08:30:00+01:00",
            "tags": ["math"],
        }));
        let once = users().transform(&input);
        let twice = users().transform(&once);
        assert_eq!(once, twice);
        assert_eq!(once["born"], "1815-12-10T07:30:00.000Z");
    }

    #[test]
    fn unparseable_values_become_null() {
        assert_eq!(coerce_value(&json!("abc"), FieldType::Number), Value::Null);
        assert_eq!(coerce_value(&json!("never"), FieldType::Date), Value::Null);
        assert_eq!(coerce_value(&json!("false"), FieldType::Boolean), json!(false));
        assert_eq!(coerce_value(&json!(1), FieldType::Boolean), json!(true));
    }

    #[test]
    fn coerce_restores_stored_representations() {
        let schema = users().field(SchemaField::new("meta", FieldType::Object));
        let stored = row(json!({
            "id": 1,
            "name": "ada",
            "active": 0,
            "tags": "[\"a\"]",
            "meta": "{\"k\":1}",
            "createdAt": "2024-01-01T00:00:00.000Z",
        }));
        let out = schema.coerce(stored);
        assert_eq!(out["active"], json!(false));
        assert_eq!(out["tags"], json!(["a"]));
        assert_eq!(out["meta"], json!({ "k": 1 }));
        assert_eq!(out["id"], json!(1));
        assert!(out.contains_key("createdAt"));
    }
}
