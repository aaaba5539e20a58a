use std::collections::BTreeMap;

use reqwest::header::HeaderMap;
use reqwest::Method;

use crate::errors::{KvsError, Result};

/// Per-call overrides applied on top of the defaults and the routed action.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Merged over the default `Content-Type` / `Accept` headers, case-insensitively.
    pub headers: BTreeMap<String, String>,
    /// Replaces the routed method. Decides whether params ride the query or the body.
    pub method: Option<Method>,
    /// Replaces the routed path. May carry its own query string.
    pub path: Option<String>,
    /// Return the unclassified [`RawResponse`] instead of the parsed body.
    pub raw: bool,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn raw(mut self, raw: bool) -> Self {
        self.raw = raw;
        self
    }
}

/// A fully signed request, ready to send.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub method: Method,
    /// Endpoint plus path and query.
    pub url: String,
    /// Path and query as signed.
    pub path: String,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl SignedRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The decoded query parameters, in wire order.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let query = self.path.split_once('?').map(|(_, q)| q).unwrap_or("");
        url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect()
    }
}

/// The transport response as received, with no status or `ErrNum` checks applied.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    /// Canonical reason phrase, e.g. `"Not Found"`.
    pub status_text: String,
    pub headers: HeaderMap,
    pub body: String,
}

impl RawResponse {
    /// Parse the body as JSON.
    pub fn json(&self) -> Result<serde_json::Value> {
        serde_json::from_str(&self.body).map_err(|e| KvsError::Decode {
            message: e.to_string(),
        })
    }
}

/// What [`Client::request`](crate::Client::request) hands back.
#[derive(Debug, Clone)]
pub enum Reply {
    /// The parsed response body of a successful call.
    Data(serde_json::Value),
    /// Returned when [`RequestOptions::raw`] was set.
    Raw(RawResponse),
}

impl Reply {
    pub fn into_data(self) -> Option<serde_json::Value> {
        match self {
            Reply::Data(v) => Some(v),
            Reply::Raw(_) => None,
        }
    }

    pub fn into_raw(self) -> Option<RawResponse> {
        match self {
            Reply::Raw(r) => Some(r),
            Reply::Data(_) => None,
        }
    }
}

/// Render one JSON value the way it appears in a query string.
///
/// Arrays expand to one entry per element; objects flatten to an empty value.
pub(crate) fn query_values(value: &serde_json::Value) -> Vec<String> {
    use serde_json::Value;

    match value {
        Value::String(s) => vec![s.clone()],
        Value::Number(n) => vec![n.to_string()],
        Value::Bool(b) => vec![b.to_string()],
        Value::Null | Value::Object(_) => vec![String::new()],
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => String::new(),
            })
            .collect(),
    }
}

/// Short name of a JSON value's type, for error messages.
pub(crate) fn json_type_name(value: &serde_json::Value) -> &'static str {
    use serde_json::Value;

    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_values_render_scalars() {
        assert_eq!(query_values(&json!("bar")), vec!["bar"]);
        assert_eq!(query_values(&json!(42)), vec!["42"]);
        assert_eq!(query_values(&json!(true)), vec!["true"]);
        assert_eq!(query_values(&json!(null)), vec![""]);
    }

    #[test]
    fn query_values_expand_arrays_and_drop_objects() {
        assert_eq!(query_values(&json!(["a", 1, {"x": 1}])), vec!["a", "1", ""]);
        assert_eq!(query_values(&json!({"nested": true})), vec![""]);
        assert!(query_values(&json!([])).is_empty());
    }

    #[test]
    fn reply_accessors() {
        let data = Reply::Data(json!({"ErrNum": 0}));
        assert!(data.clone().into_raw().is_none());
        assert_eq!(data.into_data(), Some(json!({"ErrNum": 0})));
    }

    #[test]
    fn raw_response_json_reports_decode_errors() {
        let raw = RawResponse {
            status: 502,
            status_text: "Bad Gateway".into(),
            headers: HeaderMap::new(),
            body: "<html>".into(),
        };
        assert!(matches!(raw.json(), Err(KvsError::Decode { .. })));
    }
}
