//! Literal-only header block codec.
//!
//! Each header is written as
//! ```text
//! name-length | name | value-length | value
//! ```
//! with both lengths in the HPACK prefix-integer encoding (7-bit prefix, RFC 7541
//! section 5.1). There is no static or dynamic table and no Huffman coding, so
//! this is not HPACK and a conforming peer will not understand it.

use super::error::H2Error;
use crate::Header;

const PREFIX_BITS: u8 = 7;

/// Appends the encoded headers to `buf`.
pub fn encode(headers: &[Header], buf: &mut Vec<u8>) {
    for h in headers {
        encode_string(buf, h.name.as_bytes());
        encode_string(buf, h.value.as_bytes());
    }
}

/// Decodes a whole header block.
///
/// Names and values must be UTF-8.
pub fn decode(mut block: &[u8]) -> Result<Vec<Header>, H2Error> {
    let mut headers = Vec::new();

    while !block.is_empty() {
        let (name, rest) = decode_string(block)?;
        let (value, rest) = decode_string(rest)?;

        headers.push(Header::new(name, value));
        block = rest;
    }

    Ok(headers)
}

#[inline]
fn encode_string(buf: &mut Vec<u8>, value: &[u8]) {
    encode_int(buf, value.len() as u64);
    buf.extend_from_slice(value);
}

fn decode_string(buf: &[u8]) -> Result<(&str, &[u8]), H2Error> {
    let (len, used) = decode_int(buf)?;
    let rest = &buf[used..];

    let len = usize::try_from(len).map_err(|_| H2Error::Compression)?;
    if rest.len() < len {
        return Err(H2Error::Truncated);
    }

    let text = simdutf8::basic::from_utf8(&rest[..len]).map_err(|_| H2Error::Compression)?;
    Ok((text, &rest[len..]))
}

/// Prefix integer with the high bit of the first octet left clear.
pub(crate) fn encode_int(buf: &mut Vec<u8>, value: u64) {
    let max = (1u64 << PREFIX_BITS) - 1;

    if value < max {
        buf.push(value as u8);
        return;
    }

    buf.push(max as u8);
    let mut rest = value - max;
    while rest >= 0x80 {
        buf.push(0x80 | (rest & 0x7f) as u8);
        rest >>= 7;
    }
    buf.push(rest as u8);
}

/// Returns the value and the number of octets it used.
pub(crate) fn decode_int(buf: &[u8]) -> Result<(u64, usize), H2Error> {
    let max = (1u64 << PREFIX_BITS) - 1;
    let first = *buf.first().ok_or(H2Error::Truncated)?;

    let value = u64::from(first) & max;
    if value < max {
        return Ok((value, 1));
    }

    let mut value = max;
    let mut shift = 0u32;
    for (i, &b) in buf[1..].iter().enumerate() {
        if shift > 56 {
            return Err(H2Error::Compression);
        }

        value += u64::from(b & 0x7f) << shift;
        shift += 7;

        if b & 0x80 == 0 {
            return Ok((value, i + 2));
        }
    }

    Err(H2Error::Truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers() {
        #[rustfmt::skip]
        let cases: [(u64, &[u8]); 6] = [
            (0,      &[0x00]),
            (10,     &[0x0a]),
            (126,    &[0x7e]),
            (127,    &[0x7f, 0x00]),
            (1337,   &[0x7f, 0xba, 0x09]),
            (16384,  &[0x7f, 0x81, 0x7f]),
        ];

        for (value, wire) in cases {
            let mut buf = Vec::new();
            encode_int(&mut buf, value);

            assert_eq!(buf, wire, "{value}");
            assert_eq!(decode_int(wire), Ok((value, wire.len())));
        }
    }

    #[test]
    fn integer_errors() {
        assert_eq!(decode_int(&[]), Err(H2Error::Truncated));
        assert_eq!(decode_int(&[0x7f, 0x80]), Err(H2Error::Truncated));
        assert_eq!(decode_int(&[0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01]),
            Err(H2Error::Compression));
    }

    #[test]
    fn block() {
        let headers = vec![
            Header::new(":status", "200"),
            Header::new("server", "edge_web"),
            Header::new("x-empty", ""),
        ];

        let mut buf = Vec::new();
        encode(&headers, &mut buf);

        assert_eq!(&buf[..8], b"\x07:status");
        assert_eq!(&buf[8..12], b"\x03200");
        assert_eq!(decode(&buf), Ok(headers));
    }

    #[test]
    fn block_errors() {
        #[rustfmt::skip]
        let cases: [(&[u8], H2Error); 3] = [
            (b"\x05abc",            H2Error::Truncated),
            (b"\x01a",              H2Error::Truncated),
            (b"\x01a\x02\xff\xfe",  H2Error::Compression),
        ];

        for (block, expected) in cases {
            assert_eq!(decode(block), Err(expected), "{block:?}");
        }
    }
}
