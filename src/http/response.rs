//! HTTP/1.1 response builder.
//!
//! Provides a fluent builder API for constructing HTTP responses and
//! serializing them to a byte buffer for transmission over TCP. The builder
//! methods consume `self`, so decorating a response never touches the value a
//! caller still holds.

use bytes::{BufMut, BytesMut};

use super::{Headers, StatusCode};

/// An HTTP/1.1 response, ready to be serialized and sent.
///
/// # Examples
///
/// ```
/// use revalidate::http::{Response, StatusCode};
///
/// let response = Response::new(StatusCode::Ok)
///     .header("ETag", r#""v1""#)
///     .body(r#"{"status":"ok"}"#);
///
/// assert_eq!(response.headers().get("etag"), Some(r#""v1""#));
/// let bytes = response.into_bytes();
/// let text = std::str::from_utf8(&bytes).unwrap();
/// assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
/// assert!(text.contains("Content-Length: 15\r\n"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Vec<u8>,
    keep_alive: bool,
}

impl Response {
    /// Creates a new response with the given status and an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Vec::new(),
            keep_alive: true,
        }
    }

    /// Appends a response header. Multiple calls with the same name are additive.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Replaces the status code.
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Appends a header in-place. Intended for middleware pipelines that receive
    /// a `Response` from downstream and need to decorate it without consuming it.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name, value);
    }

    /// Sets a header in-place, replacing any entries with the same name.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.set(name, value);
    }

    /// Sets the response body from a string.
    ///
    /// The `Content-Length` header is written automatically by [`into_bytes`](Self::into_bytes).
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into().into_bytes();
        self
    }

    /// Sets the response body from raw bytes.
    #[must_use]
    pub fn body_bytes(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Controls whether the `Connection: keep-alive` or `Connection: close` header is written.
    #[must_use]
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Returns the status code of this response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the response headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the response body bytes.
    pub fn payload(&self) -> &[u8] {
        &self.body
    }

    /// Serializes the response into a `BytesMut` buffer using HTTP/1.1 wire format.
    ///
    /// Automatically adds:
    /// - `Content-Type: text/plain; charset=utf-8` if the body is non-empty and no
    ///   `Content-Type` header was set.
    /// - `Content-Length: <n>`, except on `304 Not Modified`.
    /// - `Connection: keep-alive` or `Connection: close`.
    ///
    /// A `304` never carries a body, so its body and representation headers
    /// (`Content-Type`, `Content-Length`) are dropped.
    pub fn into_bytes(mut self) -> BytesMut {
        let not_modified = self.status == StatusCode::NotModified;
        if not_modified {
            self.body.clear();
            self.headers.remove("content-type");
            self.headers.remove("content-length");
        }

        let content_length = self.body.len();

        if !self.body.is_empty() && !self.headers.contains("content-type") {
            self.headers
                .insert("Content-Type", "text/plain; charset=utf-8");
        }

        let connection = if self.keep_alive {
            "keep-alive"
        } else {
            "close"
        };
        self.headers.insert("Connection", connection);

        let estimated_size = 128 + self.headers.len() * 64 + content_length;
        let mut buf = BytesMut::with_capacity(estimated_size);

        // Status line
        buf.put(
            format!(
                "HTTP/1.1 {} {}\r\n",
                self.status.as_u16(),
                self.status.canonical_reason()
            )
            .as_bytes(),
        );

        // Headers
        for (name, value) in self.headers.iter() {
            buf.put(format!("{name}: {value}\r\n").as_bytes());
        }

        if !not_modified {
            buf.put(format!("Content-Length: {content_length}\r\n").as_bytes());
        }

        // Header/body separator
        buf.put(&b"\r\n"[..]);

        // Body
        if !self.body.is_empty() {
            buf.put(self.body.as_slice());
        }

        buf
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::Ok)
    }
}

/// Builds the bodiless responses the conditional middleware short-circuits with.
///
/// Swap the implementation to attach a body, a `Content-Type`, or diagnostic
/// headers to `304 Not Modified` and `412 Precondition Failed` replies.
pub trait ResponseFactory: Send + Sync {
    /// Returns a fresh response with the given status.
    fn make(&self, status: StatusCode) -> Response;
}

/// The default [`ResponseFactory`]: an empty response with only the status set.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyResponseFactory;

impl ResponseFactory for EmptyResponseFactory {
    fn make(&self, status: StatusCode) -> Response {
        Response::new(status)
    }
}

impl<F> ResponseFactory for F
where
    F: Fn(StatusCode) -> Response + Send + Sync,
{
    fn make(&self, status: StatusCode) -> Response {
        (self)(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_string(bytes: BytesMut) -> String {
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn simple_ok_response() {
        let r = Response::new(StatusCode::Ok).body("Hello");
        let s = to_string(r.into_bytes());
        assert!(s.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(s.contains("Content-Length: 5\r\n"));
        assert!(s.ends_with("\r\n\r\nHello"));
    }

    #[test]
    fn validator_headers_serialized() {
        let r = Response::new(StatusCode::Ok)
            .header("ETag", "\"abc123\"")
            .header("Last-Modified", "Wed, 01 Jan 2020 00:00:00 GMT")
            .body("ok");
        let s = to_string(r.into_bytes());
        assert!(s.contains("ETag: \"abc123\"\r\n"));
        assert!(s.contains("Last-Modified: Wed, 01 Jan 2020 00:00:00 GMT\r\n"));
    }

    #[test]
    fn no_body_no_content_type() {
        let r = Response::new(StatusCode::NoContent);
        let s = to_string(r.into_bytes());
        assert!(!s.contains("Content-Type"));
        assert!(s.contains("Content-Length: 0\r\n"));
    }

    #[test]
    fn not_modified_has_no_length_or_body() {
        let r = Response::new(StatusCode::NotModified)
            .header("Content-Type", "application/json")
            .header("ETag", "\"v1\"")
            .body("should be dropped");
        let s = to_string(r.into_bytes());
        assert!(s.starts_with("HTTP/1.1 304 Not Modified\r\n"));
        assert!(s.contains("ETag: \"v1\"\r\n"));
        assert!(!s.contains("Content-Length"));
        assert!(!s.contains("Content-Type"));
        assert!(s.ends_with("\r\n\r\n"));
    }

    #[test]
    fn set_header_overwrites() {
        let mut r = Response::new(StatusCode::Ok).header("Cache-Control", "no-cache");
        r.set_header("cache-control", "max-age=60");
        let values: Vec<_> = r.headers().get_all("Cache-Control").collect();
        assert_eq!(values, vec!["max-age=60"]);
    }

    #[test]
    fn builders_leave_original_untouched() {
        let original = Response::new(StatusCode::Ok);
        let derived = original.clone().with_status(StatusCode::PreconditionFailed);
        assert_eq!(original.status(), StatusCode::Ok);
        assert_eq!(derived.status(), StatusCode::PreconditionFailed);
    }

    #[test]
    fn connection_close() {
        let r = Response::new(StatusCode::Ok).keep_alive(false);
        let s = to_string(r.into_bytes());
        assert!(s.contains("Connection: close\r\n"));
    }

    #[test]
    fn empty_factory_and_closure_factory() {
        let empty = EmptyResponseFactory.make(StatusCode::NotModified);
        assert_eq!(empty.status(), StatusCode::NotModified);
        assert!(empty.headers().is_empty());

        let custom = |status: StatusCode| Response::new(status).header("X-Reason", "precondition");
        let made = custom.make(StatusCode::PreconditionFailed);
        assert_eq!(made.headers().get("x-reason"), Some("precondition"));
    }
}
