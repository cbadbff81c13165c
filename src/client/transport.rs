//! HTTP transport seam
//!
//! Every request the CLI makes goes through [`Transport`], so clients can be
//! exercised against the in-process [`crate::mock::MockService`] in tests and
//! against a blocking `reqwest` client in production.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;
use std::time::Duration;

use crate::cancel::{CancelToken, Interrupted};

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One file part of a multipart form, read from disk when sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub path: PathBuf,
    pub size: u64,
}

/// Multipart form with text fields followed by file parts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm {
    pub fields: Vec<(String, String)>,
    pub files: Vec<FilePart>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn file(
        mut self,
        field: impl Into<String>,
        file_name: impl Into<String>,
        path: impl Into<PathBuf>,
        size: u64,
    ) -> Self {
        self.files.push(FilePart {
            field: field.into(),
            file_name: file_name.into(),
            path: path.into(),
            size,
        });
        self
    }
}

/// Request body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RequestBody {
    #[default]
    Empty,
    /// Serialized JSON, sent as `application/json`
    Json(Vec<u8>),
    /// Raw bytes with an explicit content type
    Bytes { content_type: String, data: Vec<u8> },
    Multipart(MultipartForm),
}

impl RequestBody {
    pub fn json<T: serde::Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(RequestBody::Json(serde_json::to_vec(value)?))
    }

    /// Bytes that take part in request signing
    pub fn signable_bytes(&self) -> &[u8] {
        match self {
            RequestBody::Json(data) | RequestBody::Bytes { data, .. } => data,
            RequestBody::Empty | RequestBody::Multipart(_) => &[],
        }
    }
}

/// Outgoing HTTP request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
    pub timeout: Option<Duration>,
    /// Reject response bodies larger than this many bytes
    pub max_response_bytes: Option<u64>,
    /// Checked between reads of the response body
    pub cancel: Option<CancelToken>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: RequestBody::Empty,
            timeout: None,
            max_response_bytes: None,
            cancel: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn max_response_bytes(mut self, limit: u64) -> Self {
        self.max_response_bytes = Some(limit);
        self
    }

    pub fn cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Case-insensitive header lookup
    pub fn header_value(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// Response as seen by clients
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as lossy UTF-8, for error messages
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out")]
    Timeout,

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("response body exceeds {limit} bytes")]
    BodyTooLarge { limit: u64 },

    #[error(transparent)]
    Interrupted(#[from] Interrupted),
}

/// Transport trait for HTTP communication
pub trait Transport: Send + Sync {
    /// Send a request and return the full response, whatever its status
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Production transport backed by a blocking `reqwest` client
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| TransportError::Http(e.to_string()))?;
        Ok(Self { client })
    }

    fn build_multipart(form: MultipartForm) -> Result<reqwest::blocking::multipart::Form, TransportError> {
        let mut out = reqwest::blocking::multipart::Form::new();
        for (name, value) in form.fields {
            out = out.text(name, value);
        }
        for part in form.files {
            let file = File::open(&part.path)?;
            let body = reqwest::blocking::multipart::Part::reader_with_length(file, part.size)
                .file_name(part.file_name)
                .mime_str("application/octet-stream")
                .map_err(|e| TransportError::Http(e.to_string()))?;
            out = out.part(part.field, body);
        }
        Ok(out)
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Http(err.to_string())
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        if let Some(token) = &request.cancel {
            token.check()?;
        }

        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };
        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(data) => builder.header("Content-Type", "application/json").body(data),
            RequestBody::Bytes { content_type, data } => {
                builder.header("Content-Type", content_type).body(data)
            }
            RequestBody::Multipart(form) => builder.multipart(Self::build_multipart(form)?),
        };

        let mut response = builder.send().map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();

        if let (Some(limit), Some(len)) = (request.max_response_bytes, response.content_length()) {
            if len > limit {
                return Err(TransportError::BodyTooLarge { limit });
            }
        }

        let body = read_body(&mut response, request.max_response_bytes, request.cancel.as_ref())?;
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Read a body in blocks, enforcing the size cap and cancellation
fn read_body<R: Read>(
    reader: &mut R,
    limit: Option<u64>,
    cancel: Option<&CancelToken>,
) -> Result<Vec<u8>, TransportError> {
    let mut body = Vec::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        if let Some(token) = cancel {
            token.check()?;
        }
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(TransportError::Io(e)),
        };
        if let Some(limit) = limit {
            if body.len() as u64 + n as u64 > limit {
                return Err(TransportError::BodyTooLarge { limit });
            }
        }
        body.extend_from_slice(&buf[..n]);
    }
    Ok(body)
}
