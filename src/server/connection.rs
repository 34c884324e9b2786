use crate::{
    h2::{H2Connection, PREFACE},
    http::request::{Parsed, Parser},
    server::{
        detect::{self, Detection},
        server_impl::Service,
    },
};
use mio::net::TcpStream;
use std::{
    io::{self, Read, Write},
    net::SocketAddr,
    time::{Duration, Instant},
};
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Protocol {
    Undetected,
    Http1,
    Http2,
}

/// What the reactor should do with a connection after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// Wait for more bytes.
    Continue,
    /// A reply is queued; write it out, then close.
    Flush,
    Close,
}

/// One accepted client socket and everything known about it.
///
/// A connection serves at most one request. Once its reply is fully written
/// the reactor drops it.
#[derive(Debug)]
pub(crate) struct Connection<S = TcpStream> {
    stream: S,
    peer: SocketAddr,

    parser: Parser,
    protocol: Protocol,
    h2: Option<H2Connection>,

    outgoing: Vec<u8>,
    written: usize,

    last_active: Instant,
}

impl<S: Read + Write> Connection<S> {
    pub(crate) fn new(stream: S, peer: SocketAddr, service: &Service, now: Instant) -> Self {
        Connection {
            stream,
            peer,

            parser: Parser::new(&service.req_limits),
            protocol: Protocol::Undetected,
            h2: None,

            outgoing: Vec::new(),
            written: 0,

            last_active: now,
        }
    }

    #[inline(always)]
    pub(crate) fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    #[inline(always)]
    pub(crate) fn peer(&self) -> SocketAddr {
        self.peer
    }

    #[inline(always)]
    pub(crate) fn protocol(&self) -> Protocol {
        self.protocol
    }

    #[inline(always)]
    pub(crate) fn h2(&self) -> Option<&H2Connection> {
        self.h2.as_ref()
    }

    #[inline]
    pub(crate) fn is_idle(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_active) > timeout
    }

    /// Drains the socket and advances the connection as far as the buffered
    /// bytes allow.
    pub(crate) fn on_readable(&mut self, service: &Service, now: Instant) -> Step {
        if !self.outgoing.is_empty() {
            return Step::Flush;
        }

        let fill = match self.parser.fill(&mut self.stream) {
            Ok(fill) => fill,
            Err(e) => {
                warn!(peer = %self.peer, error = %e, "read failed");
                return Step::Close;
            }
        };

        if fill.read > 0 {
            self.last_active = now;
            trace!(peer = %self.peer, bytes = fill.read, "read");
        }

        if self.protocol == Protocol::Undetected {
            match detect::classify(self.parser.filled()) {
                Detection::NeedMore => {
                    return match fill.eof {
                        true => Step::Close,
                        false => Step::Continue,
                    }
                }
                Detection::Http2 => return self.start_h2(),
                Detection::Http1 => self.protocol = Protocol::Http1,
            }
        }

        match self.parser.parse(&service.req_limits) {
            Ok(Parsed::Complete(mut request)) => {
                request.peer_addr = Some(self.peer);
                debug!(
                    peer = %self.peer,
                    method = %request.method(),
                    uri = request.target(),
                    "request"
                );

                let response = service.respond(request);
                self.outgoing = response.serialize(&service.resp_limits);
                Step::Flush
            }
            Ok(Parsed::Partial) if fill.eof => {
                debug!(peer = %self.peer, "peer closed mid-request");
                Step::Close
            }
            Ok(Parsed::Partial) => Step::Continue,
            Err(kind) => {
                debug!(peer = %self.peer, error = %kind, "rejected request");
                Step::Close
            }
        }
    }

    fn start_h2(&mut self) -> Step {
        self.parser.consume(PREFACE.len());
        self.protocol = Protocol::Http2;

        let mut h2 = H2Connection::default();
        match h2.receive(self.parser.filled()) {
            Ok(n) => self.parser.consume(n),
            Err(e) => debug!(peer = %self.peer, error = %e, "unreadable client frame"),
        }
        if h2.remote_settings_seen() {
            let remote = h2.remote_settings();
            debug!(
                peer = %self.peer,
                initial_window_size = remote.initial_window_size,
                max_frame_size = remote.max_frame_size,
                max_concurrent_streams = remote.max_concurrent_streams,
                "client settings"
            );
        }

        if let Err(e) = h2.handshake(&mut self.outgoing) {
            warn!(peer = %self.peer, error = %e, "h2 handshake encoding failed");
            return Step::Close;
        }

        debug!(peer = %self.peer, "h2 preface, replying with SETTINGS");
        self.h2 = Some(h2);
        Step::Flush
    }

    /// Writes as much of the queued reply as the socket takes.
    ///
    /// Progress counts as activity for the idle reaper. `Ok(true)` once
    /// everything is written.
    pub(crate) fn flush(&mut self, now: Instant) -> io::Result<bool> {
        while self.written < self.outgoing.len() {
            match self.stream.write(&self.outgoing[self.written..]) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => {
                    self.written += n;
                    self.last_active = now;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(true)
    }
}
