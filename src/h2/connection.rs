use super::{
    error::{ErrorCode, H2Error},
    frame::{self, FrameHeader, FrameType, FLAG_ACK, FRAME_HEADER_LEN},
    settings::Settings,
};

/// HTTP/2 state attached to a connection once the preface has been seen.
///
/// Only the handshake exists: client frames that are already buffered are
/// read so the peer's `SETTINGS` are known, then the server announces its own
/// settings and says goodbye with `NO_ERROR`. No stream is ever opened, so
/// `next_stream_id` stays at the first server-initiated id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct H2Connection {
    local: Settings,
    remote: Settings,
    remote_settings_seen: bool,

    next_stream_id: u32,
    last_stream_id: u32,
}

impl Default for H2Connection {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl H2Connection {
    #[inline]
    pub fn new(local: Settings) -> Self {
        H2Connection {
            local,
            remote: Settings::initial(),
            remote_settings_seen: false,

            next_stream_id: 2,
            last_stream_id: 0,
        }
    }

    #[inline(always)]
    pub fn local_settings(&self) -> &Settings {
        &self.local
    }

    /// The peer's settings; protocol initial values until its `SETTINGS` frame is read.
    #[inline(always)]
    pub fn remote_settings(&self) -> &Settings {
        &self.remote
    }

    /// Whether a non-ACK `SETTINGS` frame from the peer has been applied.
    #[inline(always)]
    pub fn remote_settings_seen(&self) -> bool {
        self.remote_settings_seen
    }

    /// Id the server would give its next pushed stream (even, starting at 2).
    #[inline(always)]
    pub fn next_stream_id(&self) -> u32 {
        self.next_stream_id
    }

    /// Highest client stream id processed; always `0` here.
    #[inline(always)]
    pub fn last_stream_id(&self) -> u32 {
        self.last_stream_id
    }

    /// Reads the complete frames at the front of `buf` (the bytes after the
    /// preface) and returns how many bytes they span.
    ///
    /// A `SETTINGS` frame on stream 0 without ACK is applied to the remote
    /// settings. Every other frame type is skipped; a trailing partial frame
    /// is left unread.
    pub fn receive(&mut self, buf: &[u8]) -> Result<usize, H2Error> {
        let mut offset = 0;

        while let Ok(header) = FrameHeader::decode(&buf[offset..]) {
            let start = offset + FRAME_HEADER_LEN;
            let end = start + header.length as usize;
            if end > buf.len() {
                break;
            }

            if header.frame_type == FrameType::Settings {
                self.apply_settings(header, &buf[start..end])?;
            }
            offset = end;
        }

        Ok(offset)
    }

    fn apply_settings(&mut self, header: FrameHeader, payload: &[u8]) -> Result<(), H2Error> {
        if header.flags & FLAG_ACK != 0 {
            return match payload.is_empty() {
                true => Ok(()),
                false => Err(H2Error::FrameSize),
            };
        }
        if header.stream_id != 0 {
            return Ok(());
        }

        self.remote = self.remote.decode(payload)?;
        self.remote_settings_seen = true;
        Ok(())
    }

    /// Writes the server half of the handshake: `SETTINGS`, then `GOAWAY(NO_ERROR)`.
    pub fn handshake(&self, out: &mut Vec<u8>) -> Result<(), H2Error> {
        frame::settings(out, &self.local)?;
        frame::goaway(out, self.last_stream_id, ErrorCode::NoError)
    }
}
