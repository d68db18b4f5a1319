//! Removal of query-operator keys from request input (stage 8).
//!
//! A key is an operator key when it starts with `$` or contains `.`. Body
//! objects are cleaned recursively, through arrays too. Query keys are also
//! checked per bracket segment, so `price[$gt]=5` is dropped.
//!
//! Headers and path parameters are left alone.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::uri::PathAndQuery;
use axum::http::{header, HeaderValue, Request, Uri};
use serde_json::Value;
use url::form_urlencoded;

use crate::error::AppError;
use crate::http::body::JsonBody;
use crate::pipeline::{Exchange, Flow, Stage};

fn is_operator_key(key: &str) -> bool {
    key.starts_with('$') || key.contains('.')
}

fn is_operator_query_key(key: &str) -> bool {
    is_operator_key(key)
        || key
            .split('[')
            .skip(1)
            .any(|segment| segment.trim_end_matches(']').starts_with('$'))
}

/// Remove operator keys from `value` in place. Returns how many were removed.
pub fn sanitize_value(value: &mut Value) -> usize {
    match value {
        Value::Object(map) => {
            let before = map.len();
            map.retain(|key, _| !is_operator_key(key));
            let mut removed = before - map.len();
            for nested in map.values_mut() {
                removed += sanitize_value(nested);
            }
            removed
        }
        Value::Array(items) => items.iter_mut().map(sanitize_value).sum(),
        _ => 0,
    }
}

/// Drop query pairs with operator keys. The query is rebuilt only when
/// something was removed.
pub fn sanitize_query(query: &str) -> (Option<String>, usize) {
    let pairs: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();
    let kept: Vec<&(String, String)> = pairs
        .iter()
        .filter(|(key, _)| !is_operator_query_key(key))
        .collect();

    let removed = pairs.len() - kept.len();
    if removed == 0 {
        return (None, 0);
    }

    let rebuilt = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(kept.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .finish();
    (Some(rebuilt), removed)
}

fn with_query(uri: &Uri, query: &str) -> Result<Uri, AppError> {
    let path_and_query = if query.is_empty() {
        uri.path().to_string()
    } else {
        format!("{}?{}", uri.path(), query)
    };
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(
        path_and_query
            .parse::<PathAndQuery>()
            .map_err(AppError::internal)?,
    );
    Uri::from_parts(parts).map_err(AppError::internal)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Sanitizer;

impl Sanitizer {
    fn clean(&self, request: &mut Request<Body>) -> Result<usize, AppError> {
        let mut removed = 0;

        if let Some(query) = request.uri().query() {
            let (rebuilt, count) = sanitize_query(query);
            if let Some(rebuilt) = rebuilt {
                let uri = with_query(request.uri(), &rebuilt)?;
                *request.uri_mut() = uri;
            }
            removed += count;
        }

        let cleaned = match request.extensions_mut().get_mut::<JsonBody>() {
            Some(JsonBody(value)) => match sanitize_value(value) {
                0 => None,
                count => {
                    removed += count;
                    Some(serde_json::to_vec(value).map_err(AppError::internal)?)
                }
            },
            None => None,
        };

        if let Some(bytes) = cleaned {
            request
                .headers_mut()
                .insert(header::CONTENT_LENGTH, HeaderValue::from(bytes.len()));
            *request.body_mut() = Body::from(bytes);
        }

        Ok(removed)
    }
}

#[async_trait]
impl Stage for Sanitizer {
    fn name(&self) -> &'static str {
        "sanitizer"
    }

    async fn on_request(&self, mut request: Request<Body>, _exchange: &mut Exchange) -> Flow {
        match self.clean(&mut request) {
            Ok(0) => Flow::Continue(request),
            Ok(removed) => {
                tracing::warn!(
                    path = %request.uri().path(),
                    removed,
                    "Removed operator keys from request input"
                );
                Flow::Continue(request)
            }
            Err(e) => Flow::Fail(e),
        }
    }
}
