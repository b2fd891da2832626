//! Incoming HTTP request type.
//!
//! The server hands the dispatcher a fully-read request: headers, the query
//! string parsed into [`Params`], and the body parsed into [`Params`] as
//! either `application/x-www-form-urlencoded` or JSON.
//!
//! Form keys ending in `[]` collect into a [`Param::Many`]; a plain key given
//! twice keeps the last value.

use serde_json::Value;
use url::form_urlencoded;

use crate::args::{Param, Params};
use crate::method::Method;

/// An incoming HTTP request.
#[derive(Clone, Debug)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) query: Params,
    pub(crate) body: Params,
}

impl Request {
    /// A request with no headers, query or body. Chain the setters below to
    /// fill it in.
    ///
    /// ```rust
    /// use hapi::{Method, Request};
    ///
    /// let req = Request::new(Method::Post, "/api/json/user")
    ///     .header("content-type", "application/x-www-form-urlencoded")
    ///     .body_bytes(b"email=a%40b.com&password=x");
    /// assert_eq!(req.body_param("email").and_then(|p| p.as_str()), Some("a@b.com"));
    /// ```
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_owned(),
            headers: Vec::new(),
            query: Params::new(),
            body: Params::new(),
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    /// Parses `query` (without the leading `?`) into the query params.
    pub fn query_string(mut self, query: &str) -> Self {
        self.query = parse_form(query.as_bytes());
        self
    }

    /// Parses `body` according to the `content-type` header set so far.
    /// JSON objects are read when the type is `application/json`; anything
    /// else is read as a urlencoded form.
    pub fn body_bytes(mut self, body: &[u8]) -> Self {
        let is_json = self
            .header_value("content-type")
            .is_some_and(|ct| ct.trim_start().starts_with("application/json"));
        self.body = if is_json { parse_json(body) } else { parse_form(body) };
        self
    }

    pub fn method(&self) -> Method { self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn query(&self) -> &Params { &self.query }
    pub fn body(&self) -> &Params { &self.body }

    /// Case-insensitive header lookup.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn query_param(&self, key: &str) -> Option<&Param> {
        self.query.get(key)
    }

    pub fn body_param(&self, key: &str) -> Option<&Param> {
        self.body.get(key)
    }

    /// Looks in the body first, then the query string.
    pub fn input(&self, key: &str) -> Option<&Param> {
        self.body_param(key).or_else(|| self.query_param(key))
    }
}

fn parse_form(bytes: &[u8]) -> Params {
    let mut params = Params::new();
    for (key, value) in form_urlencoded::parse(bytes) {
        match key.strip_suffix("[]") {
            Some(base) => match params.entry(base.to_owned()).or_insert_with(|| Param::Many(Vec::new())) {
                Param::Many(items) => items.push(value.into_owned()),
                slot => *slot = Param::Many(vec![value.into_owned()]),
            },
            None => {
                params.insert(key.into_owned(), Param::One(value.into_owned()));
            }
        }
    }
    params
}

fn parse_json(bytes: &[u8]) -> Params {
    let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(bytes) else {
        return Params::new();
    };
    map.into_iter()
        .filter_map(|(key, value)| {
            let param = match value {
                Value::Array(items) => Param::Many(items.into_iter().filter_map(scalar).collect()),
                other => Param::One(scalar(other)?),
            };
            Some((key, param))
        })
        .collect()
}

fn scalar(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(if b { "1".to_owned() } else { String::new() }),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
