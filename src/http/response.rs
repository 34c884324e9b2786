//! HTTP/1.1 response builder and serializer.

use crate::{
    http::types::{Header, StatusCode},
    limits::RespLimits,
    BodyWriter, WriteBuffer,
};
use std::{borrow::Cow, rc::Rc, sync::Arc};

/// HTTP response handed to a [`Handler`](crate::Handler) for filling in.
///
/// A fresh response starts as `200 OK` with two headers already present,
/// `Server: <server_name>` and `Connection: close`, and an empty body. Handlers
/// change the status, add headers and append to the body in any order; the
/// server serializes the result once the handler returns.
///
/// # Examples
/// ```
/// use edge_web::{Request, Response, StatusCode};
///
/// fn handle(_req: &Request, resp: &mut Response) {
///     resp.status(StatusCode::Created)
///         .header("Content-Type", "text/html")
///         .body("<h1>Hello World</h1>");
/// }
/// ```
///
/// # Framing
/// A `Content-Length` header is added during serialization when the body is not
/// empty and the handler did not set one itself. Every connection serves exactly
/// one request, so `Connection: close` stays in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: StatusCode,
    headers: Vec<Header>,
    body: Vec<u8>,
}

impl Response {
    #[inline]
    pub(crate) fn new(limits: &RespLimits) -> Self {
        Self {
            status: StatusCode::Ok,
            headers: vec![
                Header::new("Server", limits.server_name.as_str()),
                Header::new("Connection", "close"),
            ],
            body: Vec::new(),
        }
    }

    /// A response whose body is the status line text, e.g. `404 Not Found`.
    #[inline]
    pub(crate) fn plain(limits: &RespLimits, status: StatusCode) -> Self {
        let mut resp = Self::new(limits);
        resp.status(status).header("Content-Type", "text/plain").body_with(|w| {
            w.write(status.as_u16());
            w.write(' ');
            w.write(status.reason());
        });
        resp
    }
}

// Builder
impl Response {
    /// Sets the status code. The last call wins.
    ///
    /// # Examples
    /// ```
    /// # use edge_web::{Request, Response};
    /// # fn handle(_req: &Request, resp: &mut Response) {
    /// use edge_web::StatusCode;
    ///
    /// resp.status(StatusCode::NotFound)
    ///     .body(r#"{"status": "not found", "code": 404}"#);
    /// # }
    /// ```
    #[inline]
    pub fn status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }

    /// Appends a header, keeping any earlier header with the same name.
    ///
    /// ```
    /// # use edge_web::{Request, Response};
    /// # fn handle(_req: &Request, resp: &mut Response) {
    /// resp.header("Content-Type", "text/plain")  // &str, &str
    ///     .header("X-Custom-Id", 128)            // &str, i32
    ///     .header("X-Cache-Enabled", true);      // &str, bool
    /// # }
    /// ```
    #[inline]
    pub fn header<N: WriteBuffer, V: WriteBuffer>(&mut self, name: N, value: V) -> &mut Self {
        self.headers.push(Header::new(to_string(name), to_string(value)));
        self
    }

    /// Sets a header, replacing every header with the same name
    /// (compared case-insensitively).
    ///
    /// ```
    /// # use edge_web::{Request, Response};
    /// # fn handle(_req: &Request, resp: &mut Response) {
    /// resp.set_header("Server", "my-app/1.0");
    /// # }
    /// ```
    #[inline]
    pub fn set_header<N: WriteBuffer, V: WriteBuffer>(&mut self, name: N, value: V) -> &mut Self {
        let name = to_string(name);
        self.headers.retain(|h| !h.name.eq_ignore_ascii_case(&name));
        self.headers.push(Header::new(name, to_string(value)));
        self
    }

    /// Appends data to the body.
    #[inline]
    pub fn body<T: WriteBuffer>(&mut self, data: T) -> &mut Self {
        data.write_to(&mut self.body);
        self
    }

    /// Appends to the body through a writer.
    ///
    /// # Examples
    /// Using [`write!`]:
    /// ```
    /// # use edge_web::{Request, Response};
    /// # fn handle(_req: &Request, resp: &mut Response) {
    /// use std::io::Write;
    ///
    /// resp.header("Content-Type", "application/json")
    ///     .body_with(|writer| {
    ///         let _ = write!(writer, r#"{{"status": "ok", "id": {}}}"#, 42);
    ///     });
    /// # }
    /// ```
    /// Using [`WriteBuffer`]:
    /// ```
    /// # use edge_web::{Request, Response};
    /// # fn handle(_req: &Request, resp: &mut Response) {
    /// resp.body_with(|writer| {
    ///     writer.write(b"lib: ");
    ///     writer.write("edge_web");
    ///     writer.write(b", ready: ");
    ///     writer.write(true);
    /// });
    /// # }
    /// ```
    #[inline]
    pub fn body_with<F: FnOnce(&mut BodyWriter)>(&mut self, f: F) -> &mut Self {
        f(&mut BodyWriter(&mut self.body));
        self
    }
}

// Accessors
impl Response {
    #[inline(always)]
    pub const fn status_code(&self) -> StatusCode {
        self.status
    }

    /// First header with this name, compared case-insensitively.
    #[inline]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    #[inline(always)]
    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    #[inline(always)]
    pub fn body_bytes(&self) -> &[u8] {
        &self.body
    }
}

// Serialization
impl Response {
    /// Writes the wire form: status line, headers, the synthesized
    /// `Content-Length` if needed, the blank line and the body.
    pub(crate) fn serialize(&self, limits: &RespLimits) -> Vec<u8> {
        let mut out = Vec::with_capacity(limits.default_capacity);

        out.extend_from_slice(self.status.status_line());
        for h in &self.headers {
            write_header(&mut out, h.name.as_bytes(), h.value.as_bytes());
        }

        if !self.body.is_empty() && self.get_header("content-length").is_none() {
            let (arr, start) = number_to_bytes(self.body.len() as u128);
            write_header(&mut out, b"Content-Length", &arr[start..]);
        }

        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }
}

#[inline(always)]
fn write_header(out: &mut Vec<u8>, name: &[u8], value: &[u8]) {
    out.extend_from_slice(name);
    out.extend_from_slice(b": ");
    out.extend_from_slice(value);
    out.extend_from_slice(b"\r\n");
}

#[inline]
fn to_string<T: WriteBuffer>(value: T) -> String {
    let mut buffer = Vec::new();
    value.write_to(&mut buffer);

    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

#[inline]
const fn number_to_bytes(mut n: u128) -> ([u8; 39], usize) {
    let mut buffer = [b'0'; 39];
    let mut i = 39;

    if n == 0 {
        return (buffer, 38);
    }

    while n > 0 {
        i -= 1;
        buffer[i] = b'0' + (n % 10) as u8;
        n /= 10;
    }

    (buffer, i)
}

pub mod write {
    use super::*;

    /// Writer over the response body, passed to [`Response::body_with`].
    ///
    /// Accepts any [`WriteBuffer`] value and also implements [`std::io::Write`].
    #[derive(Debug)]
    pub struct BodyWriter<'a>(pub(crate) &'a mut Vec<u8>);

    impl BodyWriter<'_> {
        /// Appends a value to the body.
        #[inline]
        pub fn write<T: WriteBuffer>(&mut self, value: T) {
            value.write_to(self.0);
        }
    }

    impl std::io::Write for BodyWriter<'_> {
        #[inline]
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }

        #[inline]
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Values that can be written into response headers and bodies.
    ///
    /// Implemented for strings, byte slices, booleans, chars and integers.
    /// Floats are left out so their formatting stays the caller's decision.
    ///
    /// # Example
    /// ```
    /// use edge_web::WriteBuffer;
    ///
    /// struct UserId(u64);
    ///
    /// impl WriteBuffer for UserId {
    ///     fn write_to(&self, buffer: &mut Vec<u8>) {
    ///         buffer.extend_from_slice(b"user-");
    ///         self.0.write_to(buffer);
    ///     }
    /// }
    /// ```
    pub trait WriteBuffer {
        /// Appends the value's representation to the buffer.
        fn write_to(&self, buffer: &mut Vec<u8>);
    }

    macro_rules! impl_write_buffer {
        (bytes, $conn:expr => $($t:ty),*) => {
            $(impl WriteBuffer for $t {
                #[inline] fn write_to(&self, buffer: &mut Vec<u8>) {
                    let closure = $conn;
                    closure(self, buffer);
                }
            })*
        };
        (number($type:ty), $conn:expr => $($t:ty),*) => {
            $(impl WriteBuffer for $t {
                #[inline] fn write_to(&self, buffer: &mut Vec<u8>) {
                    $conn(*self as $type, buffer);
                }
            })*
        };
    }

    impl<T: WriteBuffer + ?Sized> WriteBuffer for &T {
        #[inline]
        fn write_to(&self, buffer: &mut Vec<u8>) {
            T::write_to(*self, buffer);
        }
    }

    impl_write_buffer! {
        bytes, |value: &str, buffer: &mut Vec<u8>| {
            buffer.extend_from_slice(value.as_bytes());
        } => str, String, Box<str>, Cow<'_, str>, Arc<str>, Rc<str>
    }
    impl_write_buffer! {
        bytes, |value: &[u8], buffer: &mut Vec<u8>| {
            buffer.extend_from_slice(value);
        } => [u8], Vec<u8>, Box<[u8]>, Cow<'_, [u8]>, Arc<[u8]>, Rc<[u8]>
    }
    impl<const N: usize> WriteBuffer for [u8; N] {
        #[inline]
        fn write_to(&self, buffer: &mut Vec<u8>) {
            buffer.extend_from_slice(self);
        }
    }
    impl_write_buffer! {
        number(u128), write_unsigned => u8, u16, u32, u64, u128, usize
    }
    impl_write_buffer! {
        number(i128), write_signed => i8, i16, i32, i64, i128, isize
    }
    impl WriteBuffer for bool {
        #[inline]
        fn write_to(&self, buffer: &mut Vec<u8>) {
            buffer.extend_from_slice(match self {
                true => b"true",
                false => b"false",
            });
        }
    }
    impl WriteBuffer for char {
        #[inline]
        fn write_to(&self, buffer: &mut Vec<u8>) {
            let mut buf = [0u8; 4];
            buffer.extend_from_slice(self.encode_utf8(&mut buf).as_bytes());
        }
    }

    #[inline(always)]
    fn write_unsigned(value: u128, buffer: &mut Vec<u8>) {
        let (arr, start) = number_to_bytes(value);
        buffer.extend_from_slice(&arr[start..]);
    }

    #[inline(always)]
    fn write_signed(value: i128, buffer: &mut Vec<u8>) {
        if value < 0 {
            buffer.push(b'-');
        }

        let (arr, start) = number_to_bytes(value.unsigned_abs());
        buffer.extend_from_slice(&arr[start..]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(resp: &Response) -> String {
        String::from_utf8(resp.serialize(&RespLimits::default())).unwrap()
    }

    #[test]
    fn defaults() {
        let resp = Response::new(&RespLimits::default());

        assert_eq!(resp.status_code(), StatusCode::Ok);
        assert_eq!(
            text(&resp),
            "HTTP/1.1 200 OK\r\nServer: edge_web\r\nConnection: close\r\n\r\n"
        );
    }

    #[test]
    fn framing() {
        let mut resp = Response::new(&RespLimits::default());
        resp.body("ok");

        let out = text(&resp);
        let (head, body) = out.split_once("\r\n\r\n").unwrap();

        assert!(head.contains("\r\nContent-Length: 2"));
        assert!(head.contains("\r\nConnection: close"));
        assert!(head.contains("\r\nServer: "));
        assert_eq!(body, "ok");
    }

    #[test]
    fn header_values() {
        #[rustfmt::skip]
        let cases: [(&str, fn(&mut Response)); 6] = [
            ("name: value",  |r| { r.header("name", "value"); }),
            ("name: ",       |r| { r.header("name", ""); }),
            ("name: 123",    |r| { r.header("name", 123); }),
            ("name: -123",   |r| { r.header("name", -123); }),
            ("name: false",  |r| { r.header("name", false); }),
            ("name: #!+",    |r| { r.header("name", vec![35u8, 33, 43]); }),
        ];

        for (line, apply) in cases {
            let mut resp = Response::new(&RespLimits::default());
            apply(&mut resp);

            assert!(text(&resp).contains(&format!("\r\n{line}\r\n")), "{line}");
        }
    }

    #[test]
    fn append_and_replace() {
        let mut resp = Response::new(&RespLimits::default());
        resp.header("X-Tag", "a").header("x-tag", "b");
        assert_eq!(resp.headers().len(), 4);

        resp.set_header("X-TAG", "c").set_header("server", "custom");
        assert_eq!(resp.headers().len(), 4);
        assert_eq!(resp.get_header("x-tag"), Some("c"));
        assert_eq!(resp.get_header("Server"), Some("custom"));
    }

    #[test]
    fn status_last_wins() {
        let mut resp = Response::new(&RespLimits::default());
        resp.status(StatusCode::NotFound).status(StatusCode::Accepted);

        assert!(text(&resp).starts_with("HTTP/1.1 202 Accepted\r\n"));
    }

    #[test]
    fn explicit_length_kept() {
        let mut resp = Response::new(&RespLimits::default());
        resp.header("content-length", 5).body("hello");

        assert_eq!(text(&resp).matches("ontent-length").count(), 1);
    }

    #[test]
    fn body_appends() {
        use std::io::Write;

        let mut resp = Response::new(&RespLimits::default());
        resp.body("a").body(b"b").body('c').body(42u8);
        resp.body_with(|w| {
            w.write(-1);
            write!(w, "{}", "!").unwrap();
        });

        assert_eq!(resp.body_bytes(), b"abc42-1!");
        assert!(text(&resp).contains("Content-Length: 8\r\n"));
    }

    #[test]
    fn body_grows_past_capacity() {
        let limits = RespLimits {
            default_capacity: 8,
            ..RespLimits::default()
        };
        let mut resp = Response::new(&limits);
        let payload = "x".repeat(10_000);
        resp.body(&payload);

        let out = resp.serialize(&limits);
        assert!(out.ends_with(payload.as_bytes()));
    }

    #[test]
    fn plain_bodies() {
        #[rustfmt::skip]
        let cases = [
            (StatusCode::NotFound,            "404 Not Found"),
            (StatusCode::Forbidden,           "403 Forbidden"),
            (StatusCode::ServiceUnavailable,  "503 Service Unavailable"),
            (StatusCode::InternalServerError, "500 Internal Server Error"),
        ];

        for (status, body) in cases {
            let resp = Response::plain(&RespLimits::default(), status);

            assert_eq!(resp.status_code(), status);
            assert_eq!(resp.body_bytes(), body.as_bytes());
        }
    }

    #[test]
    fn numbers() {
        #[rustfmt::skip]
        let cases = [
            (0u128,     "0"),
            (7,         "7"),
            (1024,      "1024"),
            (u64::MAX as u128, "18446744073709551615"),
        ];

        for (n, expected) in cases {
            let (arr, start) = number_to_bytes(n);
            assert_eq!(&arr[start..], expected.as_bytes());
        }
    }
}
