//! `SETTINGS` parameters (RFC 9113, section 6.5.2).

use super::error::H2Error;

const HEADER_TABLE_SIZE: u16 = 0x1;
const ENABLE_PUSH: u16 = 0x2;
const MAX_CONCURRENT_STREAMS: u16 = 0x3;
const INITIAL_WINDOW_SIZE: u16 = 0x4;
const MAX_FRAME_SIZE: u16 = 0x5;
const MAX_HEADER_LIST_SIZE: u16 = 0x6;

/// Size of one encoded `(identifier, value)` pair.
pub const SETTING_LEN: usize = 6;

/// The six protocol-defined settings.
///
/// [`Default`] holds the values this server advertises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub header_table_size: u32,
    pub enable_push: bool,
    pub max_concurrent_streams: u32,
    pub initial_window_size: u32,
    pub max_frame_size: u32,
    pub max_header_list_size: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            header_table_size: 4096,
            enable_push: true,
            max_concurrent_streams: 100,
            initial_window_size: 65535,
            max_frame_size: 16384,
            max_header_list_size: 8192,
        }
    }
}

impl Settings {
    /// Protocol initial values, assumed for a peer until its `SETTINGS` arrive.
    ///
    /// Limits the protocol leaves unbounded are `u32::MAX`.
    pub const fn initial() -> Self {
        Self {
            header_table_size: 4096,
            enable_push: true,
            max_concurrent_streams: u32::MAX,
            initial_window_size: 65535,
            max_frame_size: 16384,
            max_header_list_size: u32::MAX,
        }
    }

    /// Appends all six pairs in identifier order.
    pub fn encode(&self, buf: &mut Vec<u8>) {
        #[rustfmt::skip]
        let pairs = [
            (HEADER_TABLE_SIZE,      self.header_table_size),
            (ENABLE_PUSH,            self.enable_push as u32),
            (MAX_CONCURRENT_STREAMS, self.max_concurrent_streams),
            (INITIAL_WINDOW_SIZE,    self.initial_window_size),
            (MAX_FRAME_SIZE,         self.max_frame_size),
            (MAX_HEADER_LIST_SIZE,   self.max_header_list_size),
        ];

        for (id, value) in pairs {
            buf.extend_from_slice(&id.to_be_bytes());
            buf.extend_from_slice(&value.to_be_bytes());
        }
    }

    #[inline]
    pub fn encoded_len(&self) -> usize {
        6 * SETTING_LEN
    }

    /// Applies a `SETTINGS` payload on top of `self`.
    ///
    /// Identifiers this server does not know are skipped.
    pub fn decode(mut self, payload: &[u8]) -> Result<Self, H2Error> {
        if payload.len() % SETTING_LEN != 0 {
            return Err(H2Error::FrameSize);
        }

        for pair in payload.chunks_exact(SETTING_LEN) {
            let id = u16::from_be_bytes([pair[0], pair[1]]);
            let value = u32::from_be_bytes([pair[2], pair[3], pair[4], pair[5]]);

            match id {
                HEADER_TABLE_SIZE => self.header_table_size = value,
                ENABLE_PUSH => self.enable_push = value != 0,
                MAX_CONCURRENT_STREAMS => self.max_concurrent_streams = value,
                INITIAL_WINDOW_SIZE => self.initial_window_size = value,
                MAX_FRAME_SIZE => self.max_frame_size = value,
                MAX_HEADER_LIST_SIZE => self.max_header_list_size = value,
                _ => {}
            }
        }

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_defaults_on_wire() {
        let mut buf = Vec::new();
        Settings::default().encode(&mut buf);

        #[rustfmt::skip]
        let expected: [u8; 36] = [
            0, 1,  0, 0, 0x10, 0x00,   // header table 4096
            0, 2,  0, 0, 0,    1,      // push on
            0, 3,  0, 0, 0,    100,    // 100 streams
            0, 4,  0, 0, 0xff, 0xff,   // window 65535
            0, 5,  0, 0, 0x40, 0x00,   // frame 16384
            0, 6,  0, 0, 0x20, 0x00,   // header list 8192
        ];

        assert_eq!(buf, expected);
        assert_eq!(buf.len(), Settings::default().encoded_len());
    }

    #[test]
    fn decode_partial() {
        let payload = [0, 2, 0, 0, 0, 0, 0, 5, 0, 0, 0x80, 0x00, 0, 9, 0, 0, 0, 1];
        let settings = Settings::default().decode(&payload).unwrap();

        assert!(!settings.enable_push);
        assert_eq!(settings.max_frame_size, 32768);
        assert_eq!(settings.header_table_size, 4096);
    }

    #[test]
    fn decode_bad_length() {
        assert_eq!(
            Settings::default().decode(&[0, 1, 0, 0, 0]),
            Err(H2Error::FrameSize)
        );
    }
}
