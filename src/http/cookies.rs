//! Cookie header decoding (stage 9).
//!
//! Values are percent-decoded when they decode to valid UTF-8 and kept raw
//! otherwise. Values prefixed with `j:` are exposed as parsed JSON. The first
//! occurrence of a name wins.

use std::collections::BTreeMap;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, Request};
use percent_encoding::percent_decode_str;
use serde_json::Value;

use crate::pipeline::{Exchange, Flow, Stage};

/// Decoded request cookies, stored as a request extension.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cookies {
    values: BTreeMap<String, Value>,
}

impl Cookies {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut cookies = Self::default();
        for value in headers.get_all(header::COOKIE) {
            if let Ok(value) = value.to_str() {
                cookies.extend_from_header(value);
            }
        }
        cookies
    }

    pub fn parse(header: &str) -> Self {
        let mut cookies = Self::default();
        cookies.extend_from_header(header);
        cookies
    }

    fn extend_from_header(&mut self, header: &str) {
        for pair in header.split(';') {
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() || self.values.contains_key(name) {
                continue;
            }
            self.values.insert(name.to_string(), decode_value(value.trim()));
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// The cookie as text; `None` for missing or JSON cookies.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(Value::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn decode_value(raw: &str) -> Value {
    let unquoted = raw
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(raw);
    let text = match percent_decode_str(unquoted).decode_utf8() {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => unquoted.to_string(),
    };

    if let Some(json) = text.strip_prefix("j:") {
        if let Ok(value) = serde_json::from_str(json) {
            return value;
        }
    }
    Value::String(text)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CookieParser;

#[async_trait]
impl Stage for CookieParser {
    fn name(&self) -> &'static str {
        "cookies"
    }

    async fn on_request(&self, mut request: Request<Body>, _exchange: &mut Exchange) -> Flow {
        let cookies = Cookies::from_headers(request.headers());
        request.extensions_mut().insert(cookies);
        Flow::Continue(request)
    }
}
