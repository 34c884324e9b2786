//! Frame header codec and the control-frame senders.
//!
//! ```text
//! +-----------------------------------------------+
//! |                 Length (24)                   |
//! +---------------+---------------+---------------+
//! |   Type (8)    |   Flags (8)   |
//! +-+-------------+---------------+-------------------------------+
//! |R|                 Stream Identifier (31)                      |
//! +-+-------------------------------------------------------------+
//! ```

use super::{
    error::{ErrorCode, H2Error},
    literal,
    settings::Settings,
};
use crate::Header;

pub const FRAME_HEADER_LEN: usize = 9;

/// Largest value the 24-bit length field can carry.
pub const MAX_PAYLOAD_LEN: u32 = (1 << 24) - 1;

const STREAM_ID_MASK: u32 = 0x7fff_ffff;

pub const FLAG_ACK: u8 = 0x1;
pub const FLAG_END_STREAM: u8 = 0x1;
pub const FLAG_END_HEADERS: u8 = 0x4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Data,
    Headers,
    Priority,
    RstStream,
    Settings,
    PushPromise,
    Ping,
    GoAway,
    WindowUpdate,
    Continuation,
    /// Types outside RFC 9113; receivers ignore them.
    Unknown(u8),
}

impl FrameType {
    #[inline]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            0x0 => FrameType::Data,
            0x1 => FrameType::Headers,
            0x2 => FrameType::Priority,
            0x3 => FrameType::RstStream,
            0x4 => FrameType::Settings,
            0x5 => FrameType::PushPromise,
            0x6 => FrameType::Ping,
            0x7 => FrameType::GoAway,
            0x8 => FrameType::WindowUpdate,
            0x9 => FrameType::Continuation,
            other => FrameType::Unknown(other),
        }
    }

    #[inline]
    pub const fn as_u8(self) -> u8 {
        match self {
            FrameType::Data => 0x0,
            FrameType::Headers => 0x1,
            FrameType::Priority => 0x2,
            FrameType::RstStream => 0x3,
            FrameType::Settings => 0x4,
            FrameType::PushPromise => 0x5,
            FrameType::Ping => 0x6,
            FrameType::GoAway => 0x7,
            FrameType::WindowUpdate => 0x8,
            FrameType::Continuation => 0x9,
            FrameType::Unknown(other) => other,
        }
    }
}

/// The fixed 9-byte prefix of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub length: u32,
    pub frame_type: FrameType,
    pub flags: u8,
    /// Always 31 bits; the reserved bit is dropped on both encode and decode.
    pub stream_id: u32,
}

impl FrameHeader {
    #[inline]
    pub const fn new(frame_type: FrameType, flags: u8, stream_id: u32, length: u32) -> Self {
        FrameHeader {
            length,
            frame_type,
            flags,
            stream_id: stream_id & STREAM_ID_MASK,
        }
    }

    pub fn encode(&self, buf: &mut Vec<u8>) -> Result<(), H2Error> {
        if self.length > MAX_PAYLOAD_LEN {
            return Err(H2Error::FrameSize);
        }

        buf.extend_from_slice(&self.length.to_be_bytes()[1..]);
        buf.push(self.frame_type.as_u8());
        buf.push(self.flags);
        buf.extend_from_slice(&(self.stream_id & STREAM_ID_MASK).to_be_bytes());
        Ok(())
    }

    pub fn decode(buf: &[u8]) -> Result<Self, H2Error> {
        let Some(raw) = buf.get(..FRAME_HEADER_LEN) else {
            return Err(H2Error::Truncated);
        };

        Ok(FrameHeader {
            length: u32::from_be_bytes([0, raw[0], raw[1], raw[2]]),
            frame_type: FrameType::from_u8(raw[3]),
            flags: raw[4],
            stream_id: u32::from_be_bytes([raw[5], raw[6], raw[7], raw[8]]) & STREAM_ID_MASK,
        })
    }
}

#[inline]
fn frame(buf: &mut Vec<u8>, header: FrameHeader, payload: &[u8]) -> Result<(), H2Error> {
    header.encode(buf)?;
    buf.extend_from_slice(payload);
    Ok(())
}

/// `SETTINGS` on stream 0 carrying every parameter of `settings`.
pub fn settings(buf: &mut Vec<u8>, settings: &Settings) -> Result<(), H2Error> {
    let mut payload = Vec::with_capacity(settings.encoded_len());
    settings.encode(&mut payload);

    let header = FrameHeader::new(FrameType::Settings, 0, 0, payload.len() as u32);
    frame(buf, header, &payload)
}

/// Empty `SETTINGS` with the ACK flag.
pub fn settings_ack(buf: &mut Vec<u8>) -> Result<(), H2Error> {
    frame(buf, FrameHeader::new(FrameType::Settings, FLAG_ACK, 0, 0), &[])
}

/// `GOAWAY` on stream 0 with no debug data.
pub fn goaway(buf: &mut Vec<u8>, last_stream_id: u32, code: ErrorCode) -> Result<(), H2Error> {
    let mut payload = [0u8; 8];
    payload[..4].copy_from_slice(&(last_stream_id & STREAM_ID_MASK).to_be_bytes());
    payload[4..].copy_from_slice(&code.as_u32().to_be_bytes());

    frame(buf, FrameHeader::new(FrameType::GoAway, 0, 0, 8), &payload)
}

/// `WINDOW_UPDATE`; the increment must be in `1..=2^31-1`.
pub fn window_update(buf: &mut Vec<u8>, stream_id: u32, increment: u32) -> Result<(), H2Error> {
    if increment == 0 || increment > STREAM_ID_MASK {
        return Err(H2Error::FrameSize);
    }

    let header = FrameHeader::new(FrameType::WindowUpdate, 0, stream_id, 4);
    frame(buf, header, &increment.to_be_bytes())
}

/// `HEADERS` with `END_HEADERS` set and a literal-encoded block.
pub fn headers(
    buf: &mut Vec<u8>,
    stream_id: u32,
    headers: &[Header],
    end_stream: bool,
) -> Result<(), H2Error> {
    let mut block = Vec::new();
    literal::encode(headers, &mut block);

    let flags = FLAG_END_HEADERS | if end_stream { FLAG_END_STREAM } else { 0 };
    let length = u32::try_from(block.len()).map_err(|_| H2Error::FrameSize)?;

    frame(buf, FrameHeader::new(FrameType::Headers, flags, stream_id, length), &block)
}
