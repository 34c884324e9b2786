use crate::{
    errors::Error,
    http::response::Response,
    limits::ServerLimits,
    server::{
        connection::{Connection, Step},
        server_impl::Service,
    },
    StatusCode,
};
use crossbeam::channel::{self, Receiver, Sender};
use mio::{
    event::Event,
    net::{TcpListener, TcpStream},
    Events, Interest, Poll, Token, Waker,
};
use slab::Slab;
use socket2::{Domain, Protocol, Socket, Type};
use std::{
    io::{self, Write},
    net::SocketAddr,
    sync::Arc,
    time::Instant,
};
use tracing::{debug, error, info, trace, warn};

const LISTENER: Token = Token(0);
const WAKER: Token = Token(1);
const TOKEN_BASE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Control {
    Stop,
}

/// Remote control for a running [`Server`](crate::Server).
///
/// Cheap to clone and safe to move to other threads; this is how a signal
/// handler or supervisor thread ends [`Server::run`](crate::Server::run).
///
/// ```no_run
/// use edge_web::Server;
///
/// let mut server = Server::new("127.0.0.1", 8080);
/// server.start().unwrap();
///
/// let handle = server.handle().unwrap();
/// std::thread::spawn(move || {
///     std::thread::sleep(std::time::Duration::from_secs(5));
///     handle.stop();
/// });
///
/// server.run().unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ServerHandle {
    tx: Sender<Control>,
    waker: Arc<Waker>,
}

impl ServerHandle {
    /// Asks the reactor to close every connection and return from `run`.
    ///
    /// Does nothing once the reactor is gone.
    pub fn stop(&self) {
        if self.tx.send(Control::Stop).is_err() {
            return;
        }

        if let Err(e) = self.waker.wake() {
            warn!(error = %e, "failed to wake the reactor");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// The single-threaded readiness loop: one listener, a slab of connections.
#[derive(Debug)]
pub(crate) struct Reactor {
    poll: Poll,
    listener: TcpListener,
    local_addr: SocketAddr,

    connections: Slab<Connection>,
    limits: ServerLimits,

    tx: Sender<Control>,
    rx: Receiver<Control>,
    waker: Arc<Waker>,
}

impl Reactor {
    pub(crate) fn bind(addr: SocketAddr, limits: ServerLimits) -> Result<Self, Error> {
        let bind_err = |source| Error::Bind { addr, source };

        let mut listener = listen(addr, limits.backlog).map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;

        let poll = Poll::new().map_err(Error::Poll)?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKER)?);
        let (tx, rx) = channel::unbounded();

        info!(addr = %local_addr, "listening");

        Ok(Reactor {
            poll,
            listener,
            local_addr,

            connections: Slab::with_capacity(limits.max_connections.min(1024)),
            limits,

            tx,
            rx,
            waker,
        })
    }

    #[inline(always)]
    pub(crate) fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    #[inline]
    pub(crate) fn handle(&self) -> ServerHandle {
        ServerHandle {
            tx: self.tx.clone(),
            waker: Arc::clone(&self.waker),
        }
    }

    #[inline(always)]
    pub(crate) fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Runs until stopped or until the readiness wait fails for a reason
    /// other than a signal.
    pub(crate) fn run(&mut self, service: &Service) -> Result<(), Error> {
        let mut events = Events::with_capacity(self.limits.events_capacity);

        loop {
            match self.turn(&mut events, service) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => {
                    info!(addr = %self.local_addr, "stop requested");
                    self.shutdown();
                    return Ok(());
                }
                Err(e) => {
                    error!(error = %e, "readiness wait failed, shutting down");
                    self.shutdown();
                    return Err(Error::Poll(e));
                }
            }
        }
    }

    /// One wait, its events, then the idle sweep.
    fn turn(&mut self, events: &mut Events, service: &Service) -> io::Result<Flow> {
        match self.poll.poll(events, Some(self.limits.poll_interval)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(Flow::Continue),
            Err(e) => return Err(e),
        }

        let now = Instant::now();
        for event in events.iter() {
            match event.token() {
                LISTENER => self.accept(service, now),
                WAKER => {
                    if self.control() == Flow::Stop {
                        return Ok(Flow::Stop);
                    }
                }
                token => self.ready(token, event, service, now),
            }
        }

        self.reap_idle(Instant::now());
        Ok(Flow::Continue)
    }

    fn control(&self) -> Flow {
        match self.rx.try_iter().any(|msg| msg == Control::Stop) {
            true => Flow::Stop,
            false => Flow::Continue,
        }
    }

    fn accept(&mut self, service: &Service, now: Instant) {
        loop {
            let (mut stream, peer) = match self.listener.accept() {
                Ok(pair) => pair,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    return;
                }
            };

            if self.connections.len() >= self.limits.max_connections {
                warn!(%peer, limit = self.limits.max_connections, "connection limit reached");
                reject(&mut stream, service);
                continue;
            }

            if let Err(e) = stream.set_nodelay(true) {
                trace!(%peer, error = %e, "TCP_NODELAY not set");
            }

            let entry = self.connections.vacant_entry();
            let token = Token(TOKEN_BASE + entry.key());

            if let Err(e) = self
                .poll
                .registry()
                .register(&mut stream, token, Interest::READABLE)
            {
                warn!(%peer, error = %e, "failed to register connection");
                continue;
            }

            debug!(%peer, token = token.0, "accepted");
            entry.insert(Connection::new(stream, peer, service, now));
        }
    }

    fn ready(&mut self, token: Token, event: &Event, service: &Service, now: Instant) {
        let Some(key) = token.0.checked_sub(TOKEN_BASE) else {
            return;
        };
        let Some(conn) = self.connections.get_mut(key) else {
            return;
        };

        let step = match event.is_readable() || event.is_read_closed() {
            true => conn.on_readable(service, now),
            false => Step::Flush,
        };

        match step {
            Step::Continue => {}
            Step::Close => self.close(key, "closed"),
            Step::Flush => match conn.flush(now) {
                Ok(true) => self.close(key, "replied"),
                Ok(false) => {
                    let registered = self.poll.registry().reregister(
                        conn.stream_mut(),
                        token,
                        Interest::WRITABLE,
                    );
                    if let Err(e) = registered {
                        warn!(peer = %conn.peer(), error = %e, "failed to wait for writability");
                        self.close(key, "reregister failed");
                    }
                }
                Err(e) => {
                    warn!(peer = %conn.peer(), error = %e, "write failed");
                    self.close(key, "write error");
                }
            },
        }
    }

    fn close(&mut self, key: usize, reason: &'static str) {
        let Some(mut conn) = self.connections.try_remove(key) else {
            return;
        };

        if let Err(e) = self.poll.registry().deregister(conn.stream_mut()) {
            trace!(peer = %conn.peer(), error = %e, "deregister failed");
        }

        match conn.h2() {
            Some(h2) => debug!(
                peer = %conn.peer(),
                last_stream_id = h2.last_stream_id(),
                reason,
                "h2 connection closed"
            ),
            None => debug!(peer = %conn.peer(), protocol = ?conn.protocol(), reason, "connection closed"),
        }
    }

    /// Closes every connection inactive for longer than the idle timeout,
    /// measured against `now`. Returns how many were closed.
    pub(crate) fn reap_idle(&mut self, now: Instant) -> usize {
        let timeout = self.limits.idle_timeout;
        let idle: Vec<usize> = self
            .connections
            .iter()
            .filter(|(_, conn)| conn.is_idle(now, timeout))
            .map(|(key, _)| key)
            .collect();

        for &key in &idle {
            self.close(key, "idle");
        }

        if !idle.is_empty() {
            debug!(count = idle.len(), "reaped idle connections");
        }
        idle.len()
    }

    /// Closes every connection and stops listening.
    pub(crate) fn shutdown(&mut self) {
        let keys: Vec<usize> = self.connections.iter().map(|(key, _)| key).collect();
        for key in keys {
            self.close(key, "shutdown");
        }

        if let Err(e) = self.poll.registry().deregister(&mut self.listener) {
            trace!(error = %e, "listener deregister failed");
        }
    }
}

/// Best-effort `503`; the socket is dropped right after.
fn reject(stream: &mut TcpStream, service: &Service) {
    let body = Response::plain(&service.resp_limits, StatusCode::ServiceUnavailable)
        .serialize(&service.resp_limits);

    if let Err(e) = stream.write_all(&body) {
        trace!(error = %e, "503 not delivered");
    }
}

fn listen(addr: SocketAddr, backlog: i32) -> io::Result<TcpListener> {
    let domain = match addr {
        SocketAddr::V4(_) => Domain::IPV4,
        SocketAddr::V6(_) => Domain::IPV6,
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;
    socket.set_nonblocking(true)?;

    Ok(TcpListener::from_std(socket.into()))
}
