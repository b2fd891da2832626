//! Declarative argument schemas and the validator that applies them.
//!
//! A schema is an ordered list of `(name, ArgSpec)` pairs. Validation walks
//! it in declaration order and either produces a fresh [`Args`] map holding
//! only the fields that survived, or stops at the first problem with a
//! `400` [`ApiError::Validation`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::error::ApiError;
use crate::method::Method;
use crate::sanitize;

// ── Param ─────────────────────────────────────────────────────────────────────

/// A raw or sanitized argument value.
///
/// Serializes untagged: a string, or an array of strings.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Param {
    One(String),
    Many(Vec<String>),
}

impl Param {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Param::One(s) => Some(s),
            Param::Many(_) => None,
        }
    }
}

impl From<&str> for Param {
    fn from(s: &str) -> Self { Param::One(s.to_owned()) }
}

impl From<String> for Param {
    fn from(s: String) -> Self { Param::One(s) }
}

impl From<Vec<String>> for Param {
    fn from(v: Vec<String>) -> Self { Param::Many(v) }
}

/// Raw request parameters, keyed by name.
pub type Params = BTreeMap<String, Param>;

// ── Sanitizer ─────────────────────────────────────────────────────────────────

type SanitizeFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// How a field's value is cleaned. Exactly one applies per field.
#[derive(Clone, Default)]
pub enum Sanitizer {
    /// Pass the value through untouched.
    Disabled,
    /// [`sanitize::text_field`].
    #[default]
    Text,
    /// A caller-supplied function.
    Custom(SanitizeFn),
    /// An HTML filter that expects slashed input and returns slashed output.
    /// Runs as `strip_slashes(f(add_slashes(value)))`.
    RichContent(SanitizeFn),
}

impl Sanitizer {
    pub fn custom(f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Sanitizer::Custom(Arc::new(f))
    }

    /// [`sanitize::email`].
    pub fn email() -> Self {
        Sanitizer::custom(sanitize::email)
    }

    /// [`sanitize::filter_post_kses`] in the rich-content bracket.
    pub fn html() -> Self {
        Sanitizer::RichContent(Arc::new(sanitize::filter_post_kses))
    }

    fn apply(&self, value: &str) -> String {
        match self {
            Sanitizer::Disabled => value.to_owned(),
            Sanitizer::Text => sanitize::text_field(value),
            Sanitizer::Custom(f) => f(value),
            Sanitizer::RichContent(f) => {
                sanitize::strip_slashes(&f(&sanitize::add_slashes(value)))
            }
        }
    }
}

impl fmt::Debug for Sanitizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Sanitizer::Disabled => "Disabled",
            Sanitizer::Text => "Text",
            Sanitizer::Custom(_) => "Custom(..)",
            Sanitizer::RichContent(_) => "RichContent(..)",
        })
    }
}

// ── ArgSpec ───────────────────────────────────────────────────────────────────

/// Validation rule for one field.
///
/// ```rust
/// use hapi::{ArgSpec, Method, Sanitizer};
///
/// let status = ArgSpec::new(&[Method::Post])
///     .options(&["draft", "publish"])
///     .default_value("draft");
/// let tags = ArgSpec::new(&[Method::Get, Method::Post]).multiple();
/// let content = ArgSpec::new(&[Method::Post]).sanitizer(Sanitizer::html());
/// ```
#[derive(Clone, Debug)]
pub struct ArgSpec {
    methods: Vec<Method>,
    required: bool,
    default: Option<Param>,
    options: Option<Vec<String>>,
    multiple: bool,
    sanitizer: Sanitizer,
}

impl ArgSpec {
    pub fn new(methods: &[Method]) -> Self {
        Self {
            methods: methods.to_vec(),
            required: false,
            default: None,
            options: None,
            multiple: false,
            sanitizer: Sanitizer::default(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Param>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn options(mut self, options: &[&str]) -> Self {
        self.options = Some(options.iter().map(|s| (*s).to_owned()).collect());
        self
    }

    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    pub fn sanitizer(mut self, sanitizer: Sanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }
}

/// Ordered field rules. Keys are unique; [`Schema::arg`] replaces in place.
#[derive(Clone, Debug, Default)]
pub struct Schema(Vec<(String, ArgSpec)>);

impl Schema {
    pub fn arg(mut self, name: &str, spec: ArgSpec) -> Self {
        match self.0.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => slot.1 = spec,
            None => self.0.push((name.to_owned(), spec)),
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ── Args ──────────────────────────────────────────────────────────────────────

/// Sanitized arguments handed to an endpoint handler.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct Args(BTreeMap<String, Param>);

impl Args {
    pub fn get(&self, key: &str) -> Option<&Param> {
        self.0.get(key)
    }

    /// The field as a single string, if present and single-valued.
    pub fn str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Param::as_str)
    }

    /// The field as a single string, or `""`.
    pub fn str_or_empty(&self, key: &str) -> &str {
        self.str(key).unwrap_or_default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ── Validation ────────────────────────────────────────────────────────────────

/// Validates `raw` against `schema` for a request made with `method`.
pub fn validate(schema: &Schema, method: Method, raw: &Params) -> Result<Args, ApiError> {
    let mut safe = BTreeMap::new();

    for (key, spec) in &schema.0 {
        if !spec.methods.contains(&method) {
            continue;
        }

        let Some(value) = raw.get(key) else {
            if spec.required {
                return Err(ApiError::validation(format!("'{key}' is a required argument.")));
            }
            if let Some(default) = &spec.default {
                safe.insert(key.clone(), default.clone());
            }
            continue;
        };

        if let Some(options) = &spec.options {
            let member = value.as_str().is_some_and(|v| options.iter().any(|o| o == v));
            if !member {
                return Err(ApiError::validation(format!(
                    "'{key}' must be one of {}",
                    options.join(", "),
                )));
            }
        }

        let clean = if spec.options.is_none() && spec.multiple {
            let values: Vec<&str> = match value {
                Param::One(s) if s.contains(',') => s.split(',').collect(),
                Param::One(s) => vec![s.as_str()],
                Param::Many(v) => v.iter().map(String::as_str).collect(),
            };
            Param::Many(values.into_iter().map(|v| spec.sanitizer.apply(v)).collect())
        } else {
            let Param::One(s) = value else {
                return Err(ApiError::validation(format!("'{key}' must be a single value.")));
            };
            Param::One(spec.sanitizer.apply(s))
        };
        safe.insert(key.clone(), clean);
    }

    Ok(Args(safe))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, Param)]) -> Params {
        pairs.iter().map(|(k, v)| ((*k).to_owned(), v.clone())).collect()
    }

    fn many(items: &[&str]) -> Param {
        Param::Many(items.iter().map(|s| (*s).to_owned()).collect())
    }

    fn message(err: ApiError) -> String {
        match err {
            ApiError::Validation(m) => m,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn optional_field_absent_is_omitted() {
        let schema = Schema::default().arg("title", ArgSpec::new(&[Method::Post]));
        let args = validate(&schema, Method::Post, &Params::new()).unwrap();
        assert!(args.is_empty());
    }

    #[test]
    fn required_field_absent_names_the_field() {
        let schema = Schema::default().arg("email", ArgSpec::new(&[Method::Post]).required());
        let err = validate(&schema, Method::Post, &Params::new()).unwrap_err();
        assert_eq!(err.status().code(), 400);
        assert_eq!(message(err), "'email' is a required argument.");
    }

    #[test]
    fn fields_for_other_methods_are_skipped() {
        let schema = Schema::default().arg("email", ArgSpec::new(&[Method::Post]).required());
        let raw = params(&[("email", "a@b.com".into())]);
        assert!(validate(&schema, Method::Get, &raw).unwrap().is_empty());
    }

    #[test]
    fn default_fills_absent_field() {
        let schema = Schema::default()
            .arg("status", ArgSpec::new(&[Method::Get]).default_value("publish"));
        let args = validate(&schema, Method::Get, &Params::new()).unwrap();
        assert_eq!(args.str("status"), Some("publish"));
    }

    #[test]
    fn options_reject_non_members() {
        let schema = Schema::default()
            .arg("status", ArgSpec::new(&[Method::Post]).options(&["draft", "publish"]));

        let err = validate(&schema, Method::Post, &params(&[("status", "archived".into())])).unwrap_err();
        assert_eq!(message(err), "'status' must be one of draft, publish");

        let args = validate(&schema, Method::Post, &params(&[("status", "draft".into())])).unwrap();
        assert_eq!(args.str("status"), Some("draft"));
    }

    #[test]
    fn multiple_splits_comma_strings() {
        let schema = Schema::default().arg("tags", ArgSpec::new(&[Method::Get]).multiple());
        let args = validate(&schema, Method::Get, &params(&[("tags", "a,b,c".into())])).unwrap();
        assert_eq!(args.get("tags"), Some(&many(&["a", "b", "c"])));
    }

    #[test]
    fn multiple_sanitizes_sequences_element_wise() {
        let schema = Schema::default().arg("tags", ArgSpec::new(&[Method::Get]).multiple());
        let raw = params(&[("tags", many(&[" a ", "<i>b</i>"]))]);
        let args = validate(&schema, Method::Get, &raw).unwrap();
        assert_eq!(args.get("tags"), Some(&many(&["a", "b"])));
    }

    #[test]
    fn multiple_wraps_scalars() {
        let schema = Schema::default().arg("tags", ArgSpec::new(&[Method::Get]).multiple());
        let args = validate(&schema, Method::Get, &params(&[("tags", "solo".into())])).unwrap();
        assert_eq!(args.get("tags"), Some(&many(&["solo"])));
    }

    #[test]
    fn sequence_for_single_field_is_rejected() {
        let schema = Schema::default().arg("title", ArgSpec::new(&[Method::Post]));
        let err = validate(&schema, Method::Post, &params(&[("title", many(&["a", "b"]))])).unwrap_err();
        assert_eq!(message(err), "'title' must be a single value.");
    }

    #[test]
    fn disabled_sanitizer_passes_through() {
        let schema = Schema::default()
            .arg("password", ArgSpec::new(&[Method::Post]).sanitizer(Sanitizer::Disabled));
        let raw = params(&[("password", "  <p@ss%20> ".into())]);
        let args = validate(&schema, Method::Post, &raw).unwrap();
        assert_eq!(args.str("password"), Some("  <p@ss%20> "));
    }

    #[test]
    fn custom_sanitizer_is_used() {
        let schema = Schema::default()
            .arg("code", ArgSpec::new(&[Method::Post]).sanitizer(Sanitizer::custom(|s| s.to_uppercase())));
        let args = validate(&schema, Method::Post, &params(&[("code", "abc".into())])).unwrap();
        assert_eq!(args.str("code"), Some("ABC"));
    }

    #[test]
    fn rich_content_is_bracketed_by_slashes() {
        let seen = Arc::new(parking_lot::Mutex::new(String::new()));
        let recorder = Arc::clone(&seen);
        let spec = ArgSpec::new(&[Method::Post]).sanitizer(Sanitizer::RichContent(Arc::new(move |s: &str| {
            *recorder.lock() = s.to_owned();
            s.to_owned()
        })));
        let schema = Schema::default().arg("content", spec);

        let args = validate(&schema, Method::Post, &params(&[("content", r#"say "hi""#.into())])).unwrap();
        assert_eq!(seen.lock().as_str(), r#"say \"hi\""#);
        assert_eq!(args.str("content"), Some(r#"say "hi""#));
    }

    #[test]
    fn input_is_left_untouched() {
        let schema = Schema::default().arg("title", ArgSpec::new(&[Method::Post]));
        let raw = params(&[("title", " <b>x</b> ".into()), ("extra", "y".into())]);
        let before = raw.clone();
        let args = validate(&schema, Method::Post, &raw).unwrap();
        assert_eq!(raw, before);
        assert_eq!(args.len(), 1);
        assert!(!args.contains("extra"));
    }
}
