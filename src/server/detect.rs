use crate::h2::PREFACE;

/// What the first bytes of a connection say about its protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Detection {
    /// The full 24-byte preface is present.
    Http2,
    /// At least one byte differs from the preface.
    Http1,
    /// Everything so far matches the preface, but it is not complete yet.
    NeedMore,
}

/// Compares the buffered prefix of a connection against the HTTP/2 preface.
///
/// Nothing is consumed; on `Http1` the same bytes go to the HTTP/1.1 parser.
#[inline]
pub(crate) fn classify(buffered: &[u8]) -> Detection {
    let n = buffered.len().min(PREFACE.len());

    if buffered[..n] != PREFACE[..n] {
        return Detection::Http1;
    }

    match n == PREFACE.len() {
        true => Detection::Http2,
        false => Detection::NeedMore,
    }
}
