use crate::{
    errors::ErrorKind,
    http::types::{self, Header},
    limits::ReqLimits,
    query::Query,
    Method, Version,
};
use memchr::{memchr, memmem};
use std::{
    io::{self, Read},
    net::SocketAddr,
};

/// A parsed HTTP/1.1 request.
///
/// # Input data requirements
///
/// - `SP`: ASCII space (0x20)
/// - `CRLF`: exactly `"\r\n"`, bare `CR` or `LF` line endings are rejected.
///
/// ## First line
/// ```text
/// [METHOD] SP [TARGET] SP "HTTP/1." ("0" | "1") CRLF
/// ```
/// Unrecognised methods parse as [`Method::Unknown`]. The target is split at
/// the first `?` into the path and the query string; the query string is decoded
/// into parameters (see [`Query`]). The path is kept verbatim.
///
/// ## Header
/// ```text
/// [NAME] ":" *SP [VALUE] CRLF
/// ```
/// The name ends at the first `:` and must not be empty. Leading spaces of the
/// value are dropped. Lookups are case-insensitive and the last occurrence wins.
///
/// ## Body
///
/// With a valid `Content-Length` the body is exactly that many bytes, and the
/// request stays incomplete until they have all arrived. Without it, every byte
/// after the blank line is the body. `Transfer-Encoding: chunked` is not decoded.
///
/// The whole head (request line and headers) must be valid UTF-8.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    method: Method,
    target: String,
    path: String,
    query: Option<String>,
    version: Version,

    headers: Vec<Header>,
    body: Vec<u8>,

    pub(crate) params: Vec<(String, String)>,
    query_params: Vec<(String, String)>,

    pub(crate) peer_addr: Option<SocketAddr>,
}

// Public API
impl Request {
    #[inline(always)]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// The raw request target, path and query string included.
    #[inline(always)]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The target up to (not including) the first `?`.
    #[inline(always)]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The undecoded query string without the leading `?`, if the target had one.
    #[inline(always)]
    pub fn query_string(&self) -> Option<&str> {
        self.query.as_deref()
    }

    #[inline(always)]
    pub const fn version(&self) -> Version {
        self.version
    }

    /// Returns a header value with case-insensitive name matching.
    /// When the name repeats, the last value wins.
    #[inline]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// All headers in arrival order.
    #[inline(always)]
    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    #[inline(always)]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Value bound to a `:name` segment of the matched route pattern.
    #[inline]
    pub fn param(&self, name: &str) -> Option<&str> {
        lookup(&self.params, name)
    }

    #[inline(always)]
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Decoded query parameter; the last occurrence wins.
    #[inline]
    pub fn query(&self, name: &str) -> Option<&str> {
        lookup(&self.query_params, name)
    }

    #[inline(always)]
    pub fn query_params(&self) -> &[(String, String)] {
        &self.query_params
    }

    /// Address of the client, when the request came from a socket.
    #[inline(always)]
    pub const fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }
}

#[cfg(test)]
impl Request {
    pub(crate) fn test_get(target: &str) -> Self {
        Self::test_request(Method::Get, target)
    }

    pub(crate) fn test_request(method: Method, target: &str) -> Self {
        let limits = ReqLimits::default();
        let head = format!("{} {target} HTTP/1.1\r\nHost: x\r\n\r\n", method.as_str());
        let parser = Parser::from(&limits, head);

        match parser.parse(&limits) {
            Ok(Parsed::Complete(request)) => request,
            other => panic!("{target:?}: {other:?}"),
        }
    }
}

#[inline]
fn lookup<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .rev()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

//

/// Outcome of parsing the bytes buffered so far.
#[derive(Debug, PartialEq)]
pub(crate) enum Parsed {
    /// More bytes are needed.
    Partial,
    Complete(Request),
}

/// Outcome of draining a readable source into the parser buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Fill {
    pub(crate) read: usize,
    /// The peer closed its side (a zero-byte read).
    pub(crate) eof: bool,
}

/// Fixed-size receive buffer plus the request parser that runs over it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Parser {
    len: usize,
    buffer: Box<[u8]>,
    /// More bytes were pending once the buffer was full.
    overflow: bool,
}

impl Parser {
    #[inline(always)]
    pub(crate) fn new(limits: &ReqLimits) -> Self {
        let buffer = vec![0; limits.max_request_size].into_boxed_slice();

        Parser {
            len: 0,
            buffer,
            overflow: false,
        }
    }

    #[cfg(test)]
    pub(crate) fn from<V: AsRef<[u8]>>(limits: &ReqLimits, value: V) -> Self {
        let mut parser = Parser::new(limits);

        let value = value.as_ref();
        parser.buffer[..value.len()].copy_from_slice(value);
        parser.len = value.len();
        parser
    }

    #[inline(always)]
    pub(crate) fn filled(&self) -> &[u8] {
        &self.buffer[..self.len]
    }

    #[inline(always)]
    pub(crate) fn is_full(&self) -> bool {
        self.len == self.buffer.len()
    }

    /// Drops the first `n` buffered bytes.
    #[inline]
    pub(crate) fn consume(&mut self, n: usize) {
        let n = n.min(self.len);
        self.buffer.copy_within(n..self.len, 0);
        self.len -= n;
    }
}

// Work with Buffer
impl Parser {
    /// Reads until the source would block, the buffer is full, or the peer closes.
    ///
    /// Draining matters for edge-triggered readiness: no new event arrives for
    /// bytes that were already pending. A full buffer gets one more single-byte
    /// read so a request that fits exactly is told apart from an oversized one.
    pub(crate) fn fill<R: Read>(&mut self, src: &mut R) -> io::Result<Fill> {
        let mut read = 0;

        loop {
            if self.is_full() {
                return self.check_overflow(src, read);
            }

            match src.read(&mut self.buffer[self.len..]) {
                Ok(0) => return Ok(Fill { read, eof: true }),
                Ok(n) => {
                    self.len += n;
                    read += n;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(Fill { read, eof: false })
    }

    fn check_overflow<R: Read>(&mut self, src: &mut R, read: usize) -> io::Result<Fill> {
        if self.overflow {
            return Ok(Fill { read, eof: false });
        }

        let mut spare = [0u8; 1];
        let eof = loop {
            match src.read(&mut spare) {
                Ok(0) => break true,
                Ok(_) => {
                    self.overflow = true;
                    break false;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break false,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        };

        Ok(Fill { read, eof })
    }
}

// Parse request
impl Parser {
    pub(crate) fn parse(&self, limits: &ReqLimits) -> Result<Parsed, ErrorKind> {
        if self.overflow {
            return Err(ErrorKind::RequestTooLarge);
        }
        let data = self.filled();

        let Some(head_end) = memmem::find(data, b"\r\n\r\n") else {
            return match self.is_full() {
                true => Err(ErrorKind::RequestTooLarge),
                false => Ok(Parsed::Partial),
            };
        };

        let head = simdutf8::basic::from_utf8(&data[..head_end])
            .map_err(|_| ErrorKind::InvalidEncoding)?;
        let mut lines = head.split("\r\n");

        let (method, target, version) = parse_first_line(lines.next().unwrap_or_default())?;

        let mut headers = Vec::new();
        for line in lines {
            if headers.len() >= limits.header_count {
                return Err(ErrorKind::TooManyHeaders);
            }

            headers.push(parse_header(line)?);
        }

        let body_start = head_end + 4;
        let content_length = headers
            .iter()
            .rev()
            .find(|h| h.name.eq_ignore_ascii_case("content-length"))
            .map(|h| {
                types::slice_to_usize(h.value.trim_end().as_bytes())
                    .ok_or(ErrorKind::InvalidContentLength)
            })
            .transpose()?;

        let body = match content_length {
            Some(len) => {
                let body_end = body_start
                    .checked_add(len)
                    .filter(|end| *end <= self.buffer.len())
                    .ok_or(ErrorKind::BodyTooLarge)?;

                if data.len() < body_end {
                    return Ok(Parsed::Partial);
                }
                &data[body_start..body_end]
            }
            None => &data[body_start..],
        };

        let (path, query) = match memchr(b'?', target.as_bytes()) {
            Some(pos) => (&target[..pos], Some(&target[pos + 1..])),
            None => (target, None),
        };

        let mut query_params: Vec<(String, String)> = Vec::new();
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            Query::parse_into(&mut query_params, query.as_bytes(), limits.query_parts)?;
        }

        Ok(Parsed::Complete(Request {
            method,
            target: target.to_owned(),
            path: path.to_owned(),
            query: query.map(str::to_owned),
            version,

            headers,
            body: body.to_vec(),

            params: Vec::new(),
            query_params,

            peer_addr: None,
        }))
    }
}

#[inline]
fn parse_first_line(line: &str) -> Result<(Method, &str, Version), ErrorKind> {
    let mut parts = line.split(' ');

    let method = parts
        .next()
        .filter(|m| !m.is_empty() && m.bytes().all(|b| b.is_ascii_graphic()))
        .ok_or(ErrorKind::InvalidMethod)?;

    let target = parts
        .next()
        .filter(|t| !t.is_empty() && !t.bytes().any(|b| b.is_ascii_control()))
        .ok_or(ErrorKind::InvalidUrl)?;

    let version = parts
        .next()
        .and_then(|v| Version::from_bytes(v.as_bytes()))
        .ok_or(ErrorKind::InvalidVersion)?;

    if parts.next().is_some() {
        return Err(ErrorKind::InvalidVersion);
    }

    Ok((Method::from_bytes(method.as_bytes()), target, version))
}

#[inline]
fn parse_header(line: &str) -> Result<Header, ErrorKind> {
    let colon = memchr(b':', line.as_bytes()).ok_or(ErrorKind::InvalidHeader)?;
    let name = &line[..colon];

    if name.is_empty() || name.bytes().any(|b| b.is_ascii_whitespace() || b.is_ascii_control()) {
        return Err(ErrorKind::InvalidHeader);
    }

    let value = line[colon + 1..].trim_start_matches(' ');
    if value.bytes().any(|b| b == b'\r' || b == b'\n') {
        return Err(ErrorKind::InvalidHeader);
    }

    Ok(Header::new(name, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(value: &str) -> Result<Parsed, ErrorKind> {
        Parser::from(&ReqLimits::default(), value).parse(&ReqLimits::default())
    }

    fn complete(value: &str) -> Request {
        match parse(value) {
            Ok(Parsed::Complete(request)) => request,
            other => panic!("expected a complete request, got {other:?}"),
        }
    }

    #[test]
    fn parse_method() {
        #[rustfmt::skip]
        let cases = [
            ("GET",     Ok(Method::Get)),
            ("PUT",     Ok(Method::Put)),
            ("POST",    Ok(Method::Post)),
            ("HEAD",    Ok(Method::Head)),
            ("PATCH",   Ok(Method::Patch)),
            ("DELETE",  Ok(Method::Delete)),
            ("OPTIONS", Ok(Method::Options)),
            ("BREW",    Ok(Method::Unknown)),

            ("",        Err(ErrorKind::InvalidMethod)),
        ];

        for (method, expected) in cases {
            let result = parse(&format!("{method} /url HTTP/1.1\r\n\r\n"));

            match expected {
                Ok(method) => assert!(
                    matches!(result, Ok(Parsed::Complete(ref r)) if r.method() == method)
                ),
                Err(e) => assert_eq!(result, Err(e)),
            }
        }
    }

    #[test]
    fn parse_target() {
        #[rustfmt::skip]
        let cases = [
            ("/",                         "/",              None),
            ("/api/users/123",            "/api/users/123", None),
            ("/api/users/",               "/api/users/",    None),
            ("/search?",                  "/search",        Some("")),
            ("/search?q=a+b&page=2",      "/search",        Some("q=a+b&page=2")),
            ("/a?b?c",                    "/a",             Some("b?c")),
            ("*",                         "*",              None),
        ];

        for (target, path, query) in cases {
            let request = complete(&format!("GET {target} HTTP/1.1\r\n\r\n"));

            assert_eq!(request.target(), target);
            assert_eq!(request.path(), path);
            assert_eq!(request.query_string(), query);
        }
    }

    #[test]
    fn query_decoding() {
        let request = complete("GET /s?q=hello+world&e=%40x&q2 HTTP/1.1\r\nHost: x\r\n\r\n");

        assert_eq!(request.query("q"), Some("hello world"));
        assert_eq!(request.query("e"), Some("@x"));
        assert_eq!(request.query("q2"), Some(""));
        assert_eq!(request.query("missing"), None);
    }

    #[test]
    fn parse_version() {
        #[rustfmt::skip]
        let cases = [
            ("GET / HTTP/1.1\r\n\r\n",    Ok(Version::Http11)),
            ("GET / HTTP/1.0\r\n\r\n",    Ok(Version::Http10)),

            ("GET / HTTP/2.0\r\n\r\n",    Err(ErrorKind::InvalidVersion)),
            ("GET / http/1.1\r\n\r\n",    Err(ErrorKind::InvalidVersion)),
            ("GET /\r\n\r\n",             Err(ErrorKind::InvalidVersion)),
            ("GET / HTTP/1.1 \r\n\r\n",   Err(ErrorKind::InvalidVersion)),
            ("GET  / HTTP/1.1\r\n\r\n",   Err(ErrorKind::InvalidUrl)),
        ];

        for (value, expected) in cases {
            match expected {
                Ok(version) => assert_eq!(complete(value).version(), version),
                Err(e) => assert_eq!(parse(value), Err(e), "{value:?}"),
            }
        }
    }

    #[test]
    fn parse_header() {
        #[rustfmt::skip]
        let cases = [
            ("HEADER: value",     Some(("header", "value"))),
            ("Header:value",      Some(("HEADER", "value"))),
            ("header:   value  ", Some(("Header", "value  "))),
            ("header: ",          Some(("header", ""))),
            ("X-Time: 12:30",     Some(("x-time", "12:30"))),

            (": value",           None),
            ("No-Colon value",    None),
            ("Bad Name: value",   None),
            ("Split: a\nb",       None),
        ];

        for (header, expected) in cases {
            let result = parse(&format!("GET / HTTP/1.1\r\n{header}\r\n\r\n"));

            match expected {
                Some((name, value)) => match result {
                    Ok(Parsed::Complete(request)) => {
                        assert_eq!(request.header(name), Some(value), "{header:?}")
                    }
                    other => panic!("{header:?}: {other:?}"),
                },
                None => assert_eq!(result, Err(ErrorKind::InvalidHeader), "{header:?}"),
            }
        }
    }

    #[test]
    fn header_last_wins() {
        let request = complete("GET / HTTP/1.1\r\nMulti: one\r\nmulti: two\r\n\r\n");

        assert_eq!(request.header("MULTI"), Some("two"));
        assert_eq!(request.headers().len(), 2);
    }

    #[test]
    fn too_many_headers() {
        let limits = ReqLimits {
            header_count: 2,
            ..ReqLimits::default()
        };
        let parser = Parser::from(&limits, "GET / HTTP/1.1\r\na: 1\r\nb: 2\r\nc: 3\r\n\r\n");

        assert_eq!(parser.parse(&limits), Err(ErrorKind::TooManyHeaders));
    }

    #[test]
    fn incomplete_head() {
        #[rustfmt::skip]
        let cases = [
            "",
            "GET",
            "GET / HTTP/1.1\r\n",
            "GET / HTTP/1.1\r\nHost: x\r\n",
            "GET / HTTP/1.1\r\nHost: x\r\n\r",
        ];

        for value in cases {
            assert_eq!(parse(value), Ok(Parsed::Partial), "{value:?}");
        }
    }

    #[test]
    fn body_without_length() {
        let request = complete("POST /echo HTTP/1.1\r\nHost: x\r\n\r\nraw body");

        assert_eq!(request.body(), b"raw body");
    }

    #[test]
    fn body_with_length() {
        #[rustfmt::skip]
        let cases = [
            ("content-length: 6\r\n\r\n123456",   Ok(Some("123456"))),
            ("Content-Length: 0\r\n\r\n",         Ok(Some(""))),
            ("Content-Length: 3\r\n\r\n12345",    Ok(Some("123"))),
            ("Content-Length: 10\r\n\r\n12345",   Ok(None)),

            ("Content-Length: 12a\r\n\r\n",       Err(ErrorKind::InvalidContentLength)),
            ("Content-Length: \r\n\r\n",          Err(ErrorKind::InvalidContentLength)),
            ("Content-Length: 99999999\r\n\r\n",  Err(ErrorKind::BodyTooLarge)),
            (
                "Content-Length: 999999999999999999999999\r\n\r\n",
                Err(ErrorKind::InvalidContentLength)
            ),
        ];

        for (rest, expected) in cases {
            let result = parse(&format!("POST / HTTP/1.1\r\n{rest}"));

            match expected {
                Ok(Some(body)) => match result {
                    Ok(Parsed::Complete(request)) => assert_eq!(request.body(), body.as_bytes()),
                    other => panic!("{rest:?}: {other:?}"),
                },
                Ok(None) => assert_eq!(result, Ok(Parsed::Partial), "{rest:?}"),
                Err(e) => assert_eq!(result, Err(e), "{rest:?}"),
            }
        }
    }

    #[test]
    fn oversized() {
        let limits = ReqLimits {
            max_request_size: 32,
            ..ReqLimits::default()
        };
        let parser = Parser::from(&limits, format!("GET /{}", "a".repeat(27)));

        assert!(parser.is_full());
        assert_eq!(parser.parse(&limits), Err(ErrorKind::RequestTooLarge));
    }

    #[test]
    fn non_utf8_head() {
        let parser = Parser::from(&ReqLimits::default(), b"GET /\xff HTTP/1.1\r\n\r\n");

        assert_eq!(
            parser.parse(&ReqLimits::default()),
            Err(ErrorKind::InvalidEncoding)
        );
    }

    struct Chunks(Vec<io::Result<Vec<u8>>>);

    impl Read for Chunks {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.0.is_empty() {
                return Err(io::ErrorKind::WouldBlock.into());
            }

            match self.0.remove(0) {
                Ok(mut chunk) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    if n < chunk.len() {
                        self.0.insert(0, Ok(chunk.split_off(n)));
                    }
                    Ok(n)
                }
                Err(e) => Err(e),
            }
        }
    }

    #[test]
    fn fill_drains_until_would_block() {
        let mut parser = Parser::new(&ReqLimits::default());
        let mut src = Chunks(vec![
            Ok(b"GET / HT".to_vec()),
            Err(io::ErrorKind::Interrupted.into()),
            Ok(b"TP/1.1\r\n\r\n".to_vec()),
        ]);

        let fill = parser.fill(&mut src).unwrap();

        assert_eq!(fill, Fill { read: 18, eof: false });
        assert!(matches!(parser.parse(&ReqLimits::default()), Ok(Parsed::Complete(_))));
    }

    #[test]
    fn fill_reports_eof_and_errors() {
        let mut parser = Parser::new(&ReqLimits::default());
        let mut src = Chunks(vec![Ok(b"GET".to_vec()), Ok(Vec::new())]);
        assert_eq!(parser.fill(&mut src).unwrap(), Fill { read: 3, eof: true });

        let mut src = Chunks(vec![Err(io::ErrorKind::ConnectionReset.into())]);
        assert_eq!(
            parser.fill(&mut src).unwrap_err().kind(),
            io::ErrorKind::ConnectionReset
        );
    }

    #[test]
    fn fill_stops_when_full() {
        let limits = ReqLimits {
            max_request_size: 8,
            ..ReqLimits::default()
        };
        let mut parser = Parser::new(&limits);
        let mut src = Chunks(vec![Ok(b"0123456789".to_vec())]);

        assert_eq!(parser.fill(&mut src).unwrap(), Fill { read: 8, eof: false });
        assert!(parser.is_full());
        assert!(parser.overflow);
    }

    #[test]
    fn full_buffer_without_length() {
        let limits = ReqLimits {
            max_request_size: 24,
            ..ReqLimits::default()
        };
        let exact = "POST /a HTTP/1.1\r\n\r\nbody";
        assert_eq!(exact.len(), 24);

        #[rustfmt::skip]
        let cases = [
            (vec![exact],            Fill { read: 24, eof: false }, true),
            (vec![exact, ""],        Fill { read: 24, eof: true },  true),
            (vec![exact, "more"],    Fill { read: 24, eof: false }, false),
            (vec![&exact[..20], "body and then some"], Fill { read: 24, eof: false }, false),
        ];

        for (chunks, fill, complete) in cases {
            let mut parser = Parser::new(&limits);
            let mut src = Chunks(chunks.iter().map(|c| Ok(c.as_bytes().to_vec())).collect());

            assert_eq!(parser.fill(&mut src).unwrap(), fill, "{chunks:?}");

            match complete {
                true => assert!(
                    matches!(parser.parse(&limits), Ok(Parsed::Complete(ref r)) if r.body() == b"body"),
                    "{chunks:?}"
                ),
                false => assert_eq!(parser.parse(&limits), Err(ErrorKind::RequestTooLarge), "{chunks:?}"),
            }
        }
    }

    #[test]
    fn consume_prefix() {
        let mut parser = Parser::from(&ReqLimits::default(), "PRI rest");
        parser.consume(4);

        assert_eq!(parser.filled(), b"rest");
    }
}
