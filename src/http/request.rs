use bytes::BytesMut;
use thiserror::Error;

/// HTTP request methods.
///
/// Any token the parser accepts that is not one of the common verbs is kept
/// verbatim in `Extension`, so the original token is always available through
/// [`Method::as_str`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    /// GET - Retrieve a resource
    GET,
    /// POST - Create or submit data
    POST,
    /// PUT - Replace a resource
    PUT,
    /// DELETE - Delete a resource
    DELETE,
    /// HEAD - Like GET but without the response body
    HEAD,
    /// OPTIONS - Describe communication options
    OPTIONS,
    /// PATCH - Partial modification of a resource
    PATCH,
    /// Any other method token
    Extension(String),
}

impl Method {
    /// Maps a method token to a `Method`. Matching is case-sensitive.
    ///
    /// # Example
    ///
    /// ```
    /// # use courier::http::request::Method;
    /// assert_eq!(Method::from_token("GET"), Method::GET);
    /// assert_eq!(Method::from_token("get"), Method::Extension("get".into()));
    /// ```
    pub fn from_token(s: &str) -> Self {
        match s {
            "GET" => Method::GET,
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            "DELETE" => Method::DELETE,
            "HEAD" => Method::HEAD,
            "OPTIONS" => Method::OPTIONS,
            "PATCH" => Method::PATCH,
            other => Method::Extension(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::HEAD => "HEAD",
            Method::OPTIONS => "OPTIONS",
            Method::PATCH => "PATCH",
            Method::Extension(token) => token,
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single header line. Name case is kept as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// Reasons a request cannot be framed. Each one is answered with a 400.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("malformed request header")]
    MalformedHeader,

    #[error("missing content-length header")]
    MissingContentLength,

    #[error("invalid content-length header: {value:?}")]
    InvalidContentLength { value: String },
}

/// A request as it is assembled by a connection.
///
/// The header part is filled in by the parser, `source`/`source_port` by the
/// connection, and `body` grows as body bytes arrive.
#[derive(Debug, Clone)]
pub struct Request {
    /// The HTTP method (GET, POST, etc.)
    pub method: Method,
    /// The request target (e.g., "/index.html")
    pub path: String,
    /// HTTP minor version, `1` for HTTP/1.1
    pub version: u8,
    /// Headers in the order they were received, duplicates included
    pub headers: Vec<Header>,
    /// Peer address
    pub source: String,
    /// Peer port
    pub source_port: u16,
    /// Request body. No upper bound is enforced.
    pub body: BytesMut,
}

impl Default for Request {
    fn default() -> Self {
        Self {
            method: Method::GET,
            path: String::new(),
            version: 1,
            headers: Vec::new(),
            source: String::new(),
            source_port: 0,
            body: BytesMut::new(),
        }
    }
}

impl Request {
    /// Returns the value of the first header whose name matches `name`,
    /// compared ASCII case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// Whether the method is treated as carrying a body.
    ///
    /// Only the first character of the method token is inspected: anything
    /// starting with `P` (POST, PUT, PATCH, PROPFIND, ...) needs a
    /// `Content-Length`, everything else is read without a body.
    pub fn expects_body(&self) -> bool {
        self.method.as_str().as_bytes().first() == Some(&b'P')
    }

    /// Parses the `Content-Length` header.
    ///
    /// The whole value must be a non-negative decimal integer. Signs,
    /// whitespace and trailing garbage are all rejected.
    pub fn content_length(&self) -> Result<usize, ProtocolError> {
        let value = self
            .header("Content-Length")
            .ok_or(ProtocolError::MissingContentLength)?;

        let invalid = || ProtocolError::InvalidContentLength {
            value: value.to_string(),
        };

        if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        value.parse::<usize>().map_err(|_| invalid())
    }
}

/// Builder for constructing Request objects.
#[derive(Debug, Default)]
pub struct RequestBuilder {
    method: Option<Method>,
    path: Option<String>,
    version: Option<u8>,
    headers: Vec<Header>,
    body: BytesMut,
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn version(mut self, version: u8) -> Self {
        self.version = Some(version);
        self
    }

    /// Appends a header; earlier headers with the same name are kept.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(Header {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn body(mut self, body: impl AsRef<[u8]>) -> Self {
        self.body = BytesMut::from(body.as_ref());
        self
    }

    pub fn build(self) -> Result<Request, &'static str> {
        Ok(Request {
            method: self.method.ok_or("method missing")?,
            path: self.path.ok_or("path missing")?,
            version: self.version.unwrap_or(1),
            headers: self.headers,
            body: self.body,
            ..Request::default()
        })
    }
}
