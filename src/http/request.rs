//! Request descriptions and the fingerprint used for deduplication.

use std::fmt;
use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use url::Url;

use crate::error::HttpError;

/// HTTP methods used by the IRIS API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Post => "post",
            Self::Put => "put",
            Self::Delete => "delete",
        }
    }

    /// Only GET is retried automatically.
    pub fn is_retry_safe(self) -> bool {
        matches!(self, Self::Get)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_ascii_uppercase())
    }
}

/// One part of a multipart form.
#[derive(Debug, Clone, PartialEq)]
pub enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        mime: Option<String>,
        bytes: Arc<[u8]>,
    },
}

/// A multipart form that can be rebuilt for every attempt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultipartBody {
    parts: Vec<FormPart>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(FormPart::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn file(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
        mime: Option<&str>,
    ) -> Self {
        self.parts.push(FormPart::File {
            name: name.into(),
            file_name: file_name.into(),
            mime: mime.map(str::to_string),
            bytes: bytes.into(),
        });
        self
    }

    pub fn parts(&self) -> &[FormPart] {
        &self.parts
    }

    /// Canonical form for fingerprinting. File contents are represented by their digest.
    fn canonical(&self) -> Value {
        self.parts
            .iter()
            .map(|part| match part {
                FormPart::Text { name, value } => json!({ "text": [name, value] }),
                FormPart::File {
                    name,
                    file_name,
                    bytes,
                    ..
                } => {
                    let digest = URL_SAFE_NO_PAD.encode(Sha256::digest(bytes));
                    json!({ "file": [name, file_name, digest] })
                }
            })
            .collect()
    }
}

/// Request payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Multipart(MultipartBody),
}

impl RequestBody {
    fn canonical(&self) -> Value {
        match self {
            Self::Empty => Value::Null,
            // serde_json's map is ordered by key, so this is stable across insertion order
            Self::Json(value) => value.clone(),
            Self::Multipart(form) => form.canonical(),
        }
    }
}

/// Per-call overrides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Bypass deduplication and always issue a new call.
    pub force: bool,
    /// Override the client's retry count for this call.
    pub retry: Option<u32>,
}

impl RequestOptions {
    pub fn forced() -> Self {
        Self {
            force: true,
            retry: None,
        }
    }

    pub fn with_retry(retry: u32) -> Self {
        Self {
            force: false,
            retry: Some(retry),
        }
    }
}

/// A request relative to the client's base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn multipart(mut self, form: MultipartBody) -> Self {
        self.body = RequestBody::Multipart(form);
        self
    }

    /// Canonical key identifying this request: `[method, path, params, body]` as JSON.
    ///
    /// Params are sorted so that the order they were added in does not matter.
    /// Every component is JSON-encoded, so no key or value can be mistaken for a separator.
    pub fn fingerprint(&self) -> String {
        let mut params: Vec<&(String, String)> = self.query.iter().collect();
        params.sort();

        json!([self.method.as_str(), self.path, params, self.body.canonical()]).to_string()
    }
}

/// Join `path` onto `base` and append `query`.
///
/// The base URL's own path is kept, so `http://host/iris` + `/api/x` gives `http://host/iris/api/x`.
pub fn resolve_url(base: &Url, path: &str, query: &[(String, String)]) -> Result<Url, HttpError> {
    let joined = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    let mut url =
        Url::parse(&joined).map_err(|e| HttpError::InvalidRequest(format!("{}: {}", joined, e)))?;

    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in query {
            pairs.append_pair(key, value);
        }
    }

    Ok(url)
}
