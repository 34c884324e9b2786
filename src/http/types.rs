//! Core HTTP protocol types and utilities

use std::fmt;

#[inline(always)]
pub(crate) fn slice_to_usize(bytes: &[u8]) -> Option<usize> {
    if bytes.is_empty() {
        return None;
    }

    let mut result: usize = 0;

    for &byte in bytes {
        if !byte.is_ascii_digit() {
            return None;
        }

        result = result
            .checked_mul(10)?
            .checked_add((byte - b'0') as usize)?;
    }

    Some(result)
}

// METHOD

/// Request method.
///
/// Verbs outside the supported set parse as [`Method::Unknown`] instead of
/// failing the request.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    Unknown,
}

impl Method {
    #[inline]
    pub(crate) fn from_bytes(src: &[u8]) -> Self {
        match src {
            b"GET" => Method::Get,
            b"POST" => Method::Post,
            b"PUT" => Method::Put,
            b"DELETE" => Method::Delete,
            b"PATCH" => Method::Patch,
            b"HEAD" => Method::Head,
            b"OPTIONS" => Method::Options,
            _ => Method::Unknown,
        }
    }

    /// Canonical upper-case token, `UNKNOWN` for the sentinel.
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// VERSION

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Version {
    Http10,
    Http11,
}

impl Version {
    #[inline(always)]
    pub(crate) const fn from_bytes(src: &[u8]) -> Option<Self> {
        match src {
            b"HTTP/1.1" => Some(Self::Http11),
            b"HTTP/1.0" => Some(Self::Http10),
            _ => None,
        }
    }
}

// STATUS_CODE

macro_rules! set_status_codes {
    ($(
        $(#[$docs:meta])*
        $name:ident = ($num:expr, $str:expr);
    )+) => {
        /// Response status codes surfaced by the server and available to handlers.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum StatusCode { $(
            #[doc = concat!(stringify!($num), " ", $str)]
            $(#[$docs])*
            $name = $num,
        )+ }

        impl StatusCode {
            /// Returns the status line (e.g., `b"HTTP/1.1 200 OK\r\n"`).
            #[inline]
            pub(crate) const fn status_line(&self) -> &'static [u8] {
                match self { $(
                    StatusCode::$name => {
                        concat!("HTTP/1.1 ", $num, " ", $str, "\r\n").as_bytes()
                    },
                )+ }
            }

            /// Returns the reason phrase (e.g., `"Not Found"`).
            #[inline]
            pub const fn reason(&self) -> &'static str {
                match self { $(
                    StatusCode::$name => $str,
                )+ }
            }
        }
    }
}

set_status_codes! {
    Ok = (200, "OK");
    Created = (201, "Created");
    Accepted = (202, "Accepted");
    NoContent = (204, "No Content");

    MovedPermanently = (301, "Moved Permanently");
    Found = (302, "Found");
    NotModified = (304, "Not Modified");

    BadRequest = (400, "Bad Request");
    Unauthorized = (401, "Unauthorized");
    Forbidden = (403, "Forbidden");
    NotFound = (404, "Not Found");
    MethodNotAllowed = (405, "Method Not Allowed");
    PayloadTooLarge = (413, "Payload Too Large");

    InternalServerError = (500, "Internal Server Error");
    NotImplemented = (501, "Not Implemented");
    ServiceUnavailable = (503, "Service Unavailable");
}

impl StatusCode {
    #[inline(always)]
    pub const fn as_u16(&self) -> u16 {
        *self as u16
    }
}

// HEADER

/// One header line; names keep the casing they arrived (or were set) with.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Header {
    pub(crate) name: String,
    pub(crate) value: String,
}

impl Header {
    #[inline(always)]
    pub fn new<N: Into<String>, V: Into<String>>(name: N, value: V) -> Self {
        Header {
            name: name.into(),
            value: value.into(),
        }
    }

    #[inline(always)]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline(always)]
    pub fn value(&self) -> &str {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn methods() {
        #[rustfmt::skip]
        let cases = [
            ("GET",     Method::Get),
            ("POST",    Method::Post),
            ("PUT",     Method::Put),
            ("DELETE",  Method::Delete),
            ("PATCH",   Method::Patch),
            ("HEAD",    Method::Head),
            ("OPTIONS", Method::Options),
            ("get",     Method::Unknown),
            ("BREW",    Method::Unknown),
            ("CONNECT", Method::Unknown),
        ];

        for (token, expected) in cases {
            assert_eq!(Method::from_bytes(token.as_bytes()), expected);
        }

        assert_eq!(Method::Delete.to_string(), "DELETE");
    }

    #[test]
    fn status_lines() {
        #[rustfmt::skip]
        let cases = [
            (StatusCode::Ok,                  "HTTP/1.1 200 OK\r\n"),
            (StatusCode::NotFound,            "HTTP/1.1 404 Not Found\r\n"),
            (StatusCode::Forbidden,           "HTTP/1.1 403 Forbidden\r\n"),
            (StatusCode::InternalServerError, "HTTP/1.1 500 Internal Server Error\r\n"),
        ];

        for (status, line) in cases {
            assert_eq!(status.status_line(), line.as_bytes());
        }

        assert_eq!(StatusCode::ServiceUnavailable.as_u16(), 503);
        assert_eq!(StatusCode::MethodNotAllowed.reason(), "Method Not Allowed");
    }

    #[test]
    fn numbers() {
        assert_eq!(slice_to_usize(b"0"), Some(0));
        assert_eq!(slice_to_usize(b"1234"), Some(1234));
        assert_eq!(slice_to_usize(b""), None);
        assert_eq!(slice_to_usize(b"12a"), None);
        assert_eq!(slice_to_usize(b"-1"), None);
        assert_eq!(slice_to_usize(b"999999999999999999999999"), None);
    }
}
