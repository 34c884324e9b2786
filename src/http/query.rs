//! URL query string parser with form-style decoding.

use memchr::memchr;
use std::{borrow::Cow, collections::HashMap, error, fmt};

/// URL query string parser.
///
/// Splits `key=value` pairs on `&` and decodes both halves the way HTML forms
/// encode them (`application/x-www-form-urlencoded`): `%XX` escapes become the
/// byte they name and `+` becomes a space. Escapes that are not two hex digits are
/// kept verbatim; bytes that do not form valid UTF-8 after decoding are replaced
/// with `U+FFFD`.
///
/// # Examples
/// ```rust
/// use edge_web::query::Query;
/// use std::collections::HashMap;
///
/// // Parse into Vec (preserves order)
/// let params: Vec<(String, String)> = Query::parse(b"q=hello+world&e=%40x", 10).unwrap();
/// assert_eq!(params[0], ("q".to_string(), "hello world".to_string()));
/// assert_eq!(params[1], ("e".to_string(), "@x".to_string()));
///
/// // Parse into HashMap (deduplicates, last wins)
/// let params: HashMap<String, String> = Query::parse(b"a=1&a=2", 10).unwrap();
/// assert_eq!(params["a"], "2");
/// ```
pub struct Query;

impl Query {
    /// Parses a URL query string into a new collection.
    ///
    /// The leading `?` is optional, so `?a=1` and `a=1` are equivalent.
    #[inline(always)]
    pub fn parse<C: QueryCollector>(query: &[u8], limit: usize) -> Result<C, Error> {
        let mut result = C::with_capacity(limit);
        Self::parse_into(&mut result, query, limit)?;
        Ok(result)
    }

    /// Parses a URL query string into an existing collection, appending to it.
    ///
    /// # Examples
    /// ```
    /// use edge_web::query::Query;
    ///
    /// let mut collector: Vec<(String, String)> = Vec::new();
    ///
    /// Query::parse_into(&mut collector, b"a=1&b=2", 10).unwrap();
    /// Query::parse_into(&mut collector, b"c=3", 10).unwrap();
    /// assert_eq!(collector.len(), 3);
    ///
    /// let result = Query::parse_into(&mut Vec::new(), b"a=1&b=2&c=3", 2);
    /// assert!(result.is_err());
    /// ```
    #[inline]
    pub fn parse_into<C: QueryCollector>(
        result: &mut C,
        query: &[u8],
        limit: usize,
    ) -> Result<(), Error> {
        let data = match query.first().ok_or(Error::Empty)? {
            b'?' => &query[1..],
            _ => query,
        };

        let mut start = 0;
        while start < data.len() {
            // Find next '&' or end of string
            let end = memchr(b'&', &data[start..])
                .map(|pos| start + pos)
                .unwrap_or(data.len());

            // `a=1&&b=2` carries an empty pair, skip it
            if start == end {
                start = end + 1;
                continue;
            }

            if result.length() >= limit {
                return Err(Error::OverLimit(limit));
            }

            let split_index = memchr(b'=', &data[start..end])
                .map(|pos| start + pos)
                .unwrap_or(end);

            let key = &data[start..split_index];
            let value = match split_index < end {
                true => &data[split_index + 1..end],
                false => b"",
            };

            result.add_param(decode(key).into_owned(), decode(value).into_owned());
            start = end + 1;
        }

        Ok(())
    }
}

/// Decodes one form-encoded component (`%XX` escapes and `+` as space).
///
/// Borrows the input when nothing needs decoding.
///
/// ```
/// use edge_web::query::decode;
///
/// assert_eq!(decode(b"hello+world"), "hello world");
/// assert_eq!(decode(b"%40x"), "@x");
/// assert_eq!(decode(b"100%"), "100%");
/// ```
pub fn decode(src: &[u8]) -> Cow<'_, str> {
    if !src.iter().any(|b| matches!(b, b'%' | b'+')) {
        return String::from_utf8_lossy(src);
    }

    let mut out = Vec::with_capacity(src.len());
    let mut i = 0;
    while i < src.len() {
        match src[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => match (src.get(i + 1).and_then(hex), src.get(i + 2).and_then(hex)) {
                (Some(hi), Some(lo)) => {
                    out.push(hi << 4 | lo);
                    i += 3;
                }
                _ => {
                    out.push(b'%');
                    i += 1;
                }
            },
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }

    Cow::Owned(String::from_utf8_lossy(&out).into_owned())
}

#[inline(always)]
fn hex(byte: &u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// A trait for types that can collect decoded query parameters.
///
/// # Examples
/// ```rust
/// use edge_web::query::QueryCollector;
///
/// struct KeysOnly(Vec<String>);
///
/// impl QueryCollector for KeysOnly {
///     fn add_param(&mut self, key: String, _: String) {
///         self.0.push(key);
///     }
///
///     fn length(&self) -> usize {
///         self.0.len()
///     }
///
///     fn with_capacity(capacity: usize) -> Self {
///         KeysOnly(Vec::with_capacity(capacity))
///     }
/// }
/// ```
pub trait QueryCollector
where
    Self: Sized,
{
    /// Adds a decoded parameter to the collection.
    fn add_param(&mut self, key: String, value: String);

    /// Returns the current number of parameters in the collection.
    // `length` rather than `len`, so clippy doesn't ask for `is_empty`
    fn length(&self) -> usize;

    /// Creates a new collection with the specified capacity.
    fn with_capacity(capacity: usize) -> Self;
}

// Preserves parameter order
impl QueryCollector for Vec<(String, String)> {
    #[inline(always)]
    fn add_param(&mut self, key: String, value: String) {
        self.push((key, value));
    }

    #[inline(always)]
    fn length(&self) -> usize {
        self.len()
    }

    #[inline(always)]
    fn with_capacity(capacity: usize) -> Self {
        Vec::with_capacity(capacity)
    }
}

// Deduplicates parameters (last wins)
impl QueryCollector for HashMap<String, String> {
    #[inline(always)]
    fn add_param(&mut self, key: String, value: String) {
        self.insert(key, value);
    }

    #[inline(always)]
    fn length(&self) -> usize {
        self.len()
    }

    #[inline(always)]
    fn with_capacity(capacity: usize) -> Self {
        HashMap::with_capacity(capacity)
    }
}

/// Error types that can occur during query parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The number of parameters exceeded the specified limit.
    OverLimit(usize),

    /// The query string is empty.
    Empty,
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::OverLimit(limit) => {
                write!(f, "Query parameter limit exceeded: limit={}", limit)
            }
            Error::Empty => {
                write!(f, "Query string is empty")
            }
        }
    }
}
