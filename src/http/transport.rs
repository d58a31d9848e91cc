//! Wire transport used by the HTTP client.
//!
//! The client's policy logic (auth header, dedup, retry, refresh) sits above this
//! trait; [`ReqwestTransport`] puts requests on the network. The refresh coordinator
//! talks to the transport directly so its own call never re-enters the 401 path.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use url::Url;

use super::request::{FormPart, Method, MultipartBody, RequestBody};
use crate::error::HttpError;
use crate::store::SecureString;

/// A fully resolved request.
#[derive(Debug, Clone)]
pub struct WireRequest {
    pub method: Method,
    pub url: Url,
    pub bearer: Option<SecureString>,
    pub body: RequestBody,
}

/// Raw response: status plus undecoded body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl WireResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Sends a request and returns whatever the server answered.
///
/// Implementations only fail with [`HttpError::Network`] (no response) or
/// [`HttpError::InvalidRequest`]; status codes are reported in [`WireResponse`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: WireRequest) -> Result<WireResponse, HttpError>;
}

/// Transport over a `reqwest::Client`.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a transport with the given timeouts and default headers.
    pub fn new(
        timeout: Duration,
        connect_timeout: Duration,
        headers: &HashMap<String, String>,
    ) -> Result<Self, HttpError> {
        let mut default_headers = HeaderMap::new();
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| HttpError::InvalidRequest(format!("header {}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| HttpError::InvalidRequest(format!("header {}: {}", name, e)))?;
            default_headers.insert(name, value);
        }

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .default_headers(default_headers)
            .build()
            .map_err(|e| HttpError::InvalidRequest(e.to_string()))?;

        Ok(Self { client })
    }

    fn to_reqwest_method(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }

    fn build_form(body: &MultipartBody) -> Result<Form, HttpError> {
        let mut form = Form::new();
        for part in body.parts() {
            form = match part {
                FormPart::Text { name, value } => form.text(name.clone(), value.clone()),
                FormPart::File {
                    name,
                    file_name,
                    mime,
                    bytes,
                } => {
                    let mut file = Part::bytes(bytes.to_vec()).file_name(file_name.clone());
                    if let Some(mime) = mime {
                        file = file
                            .mime_str(mime)
                            .map_err(|e| HttpError::InvalidRequest(e.to_string()))?;
                    }
                    form.part(name.clone(), file)
                }
            };
        }
        Ok(form)
    }

    fn map_error(error: reqwest::Error) -> HttpError {
        if error.is_timeout() {
            HttpError::Network("request timed out".to_string())
        } else if error.is_connect() {
            HttpError::Network(format!("connection failed: {}", error))
        } else if error.is_builder() {
            HttpError::InvalidRequest(error.to_string())
        } else {
            HttpError::Network(error.to_string())
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: WireRequest) -> Result<WireResponse, HttpError> {
        let mut builder = self
            .client
            .request(Self::to_reqwest_method(request.method), request.url);

        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token.as_str());
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart(form) => builder.multipart(Self::build_form(form)?),
        };

        let response = builder.send().await.map_err(Self::map_error)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(Self::map_error)?;

        Ok(WireResponse {
            status,
            body: body.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_default_header() {
        let mut headers = HashMap::new();
        headers.insert("bad header".to_string(), "x".to_string());
        let result = ReqwestTransport::new(Duration::from_secs(1), Duration::from_secs(1), &headers);
        assert!(matches!(result, Err(HttpError::InvalidRequest(_))));
    }

    #[test]
    fn test_multipart_form_builds() {
        let body = MultipartBody::new()
            .file("file", "a.csv", b"x,y\n".to_vec(), Some("text/csv"))
            .text("extractLocale", "ja_JP");
        assert!(ReqwestTransport::build_form(&body).is_ok());

        let bad = MultipartBody::new().file("file", "a.csv", b"x".to_vec(), Some("not a mime"));
        assert!(ReqwestTransport::build_form(&bad).is_err());
    }

    #[test]
    fn test_wire_response_helpers() {
        let ok = WireResponse {
            status: 204,
            body: Vec::new(),
        };
        assert!(ok.is_success());

        let err = WireResponse {
            status: 500,
            body: b"boom".to_vec(),
        };
        assert!(!err.is_success());
        assert_eq!(err.text(), "boom");
    }
}
