use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::Form;
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use super::ApiError;
use crate::auth::Credentials;

/// Session token header
pub const TOKEN_HEADER: &str = "token";

/// Tenant header
pub const COMPANY_HEADER: &str = "id-company";

/// Marker header sent on every request
pub const REQUESTED_WITH_HEADER: &str = "x-requested-with";
const REQUESTED_WITH_VALUE: &str = "XMLHttpRequest";

/// Characters escaped inside a single path segment
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Join path segments into `/a/b/c`, escaping each one
pub fn path_of(segments: &[&str]) -> String {
    segments
        .iter()
        .map(|s| format!("/{}", utf8_percent_encode(s, PATH_SEGMENT)))
        .collect()
}

pub enum RequestBody {
    Empty,
    Json(Value),
    Multipart(Form),
}

impl RequestBody {
    /// Serialize a payload; payloads that serialize to `null` send no body
    pub fn json<B: Serialize + ?Sized>(body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to encode body: {}", e)))?;
        Ok(match value {
            Value::Null => RequestBody::Empty,
            value => RequestBody::Json(value),
        })
    }

    pub fn is_multipart(&self) -> bool {
        matches!(self, RequestBody::Multipart(_))
    }
}

/// Everything needed to issue one request, minus the session credentials
/// which are attached at dispatch time.
pub struct RequestDescriptor {
    pub method: Method,
    pub path: String,
    pub params: Vec<(String, String)>,
    pub body: RequestBody,
    /// Extra `Authorization: Bearer` credential for this call only
    pub bearer: Option<String>,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: Vec::new(),
            body: RequestBody::Empty,
            bearer: None,
        }
    }

    pub fn params<P: Serialize + ?Sized>(mut self, params: &P) -> Result<Self, ApiError> {
        self.params = query_pairs(params)?;
        Ok(self)
    }

    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    pub fn bearer(mut self, token: Option<String>) -> Self {
        self.bearer = token;
        self
    }

    /// Build the header set for this request from the current credentials.
    ///
    /// `token` and `id-company` are omitted entirely when absent. Multipart
    /// bodies get no JSON content type; the transport writes the
    /// `multipart/form-data` type with its boundary.
    pub fn headers(&self, credentials: &Credentials) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        if !self.body.is_multipart() {
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
        }
        headers.insert(
            HeaderName::from_static(REQUESTED_WITH_HEADER),
            HeaderValue::from_static(REQUESTED_WITH_VALUE),
        );
        if let Some(ref token) = credentials.token {
            headers.insert(HeaderName::from_static(TOKEN_HEADER), header_value(token)?);
        }
        if let Some(ref company_id) = credentials.company_id {
            headers.insert(
                HeaderName::from_static(COMPANY_HEADER),
                header_value(company_id)?,
            );
        }
        if let Some(ref bearer) = self.bearer {
            headers.insert(
                header::AUTHORIZATION,
                header_value(&format!("Bearer {}", bearer))?,
            );
        }
        Ok(headers)
    }
}

fn header_value(value: &str) -> Result<HeaderValue, ApiError> {
    let mut value = HeaderValue::from_str(value)
        .map_err(|e| ApiError::InvalidRequest(format!("Invalid header value: {}", e)))?;
    value.set_sensitive(true);
    Ok(value)
}

/// Flatten a serializable map or struct into query pairs. `null` fields are
/// skipped so optional cursors can be left as `None`.
fn query_pairs<P: Serialize + ?Sized>(params: &P) -> Result<Vec<(String, String)>, ApiError> {
    let value = serde_json::to_value(params)
        .map_err(|e| ApiError::InvalidRequest(format!("Failed to encode query: {}", e)))?;
    let map = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Object(map) => map,
        other => {
            return Err(ApiError::InvalidRequest(format!(
                "Query parameters must be a map, got {}",
                other
            )))
        }
    };

    let mut pairs = Vec::with_capacity(map.len());
    for (key, value) in map {
        let value = match value {
            Value::Null => continue,
            Value::String(s) => s,
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            nested => {
                return Err(ApiError::InvalidRequest(format!(
                    "Query parameter {} is not a scalar: {}",
                    key, nested
                )))
            }
        };
        pairs.push((key, value));
    }
    Ok(pairs)
}
