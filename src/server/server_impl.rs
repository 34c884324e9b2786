use crate::{
    errors::Error,
    http::{request::Request, response::Response},
    limits::{ReqLimits, RespLimits, ServerLimits, StaticLimits},
    routing::{
        router::{Handler, Router},
        static_files::StaticFiles,
    },
    server::reactor::{Reactor, ServerHandle},
    Method, StatusCode,
};
use std::{
    net::{SocketAddr, ToSocketAddrs},
    panic::{self, AssertUnwindSafe},
    path::Path,
};
use tracing::{debug, error, info};

/// Everything needed to turn a parsed request into a response.
///
/// Built while the server is configured, read-only while it runs.
#[derive(Debug, Default)]
pub(crate) struct Service {
    pub(crate) router: Router,
    pub(crate) statics: Option<StaticFiles>,

    pub(crate) req_limits: ReqLimits,
    pub(crate) resp_limits: RespLimits,
}

impl Service {
    /// Route first, then the static mapping (`GET` and `HEAD` only), then `404`.
    pub(crate) fn respond(&self, mut req: Request) -> Response {
        if let Some(route) = self.router.find(req.method(), req.path()) {
            req.params = route.pattern().extract(req.path());

            let mut resp = Response::new(&self.resp_limits);
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                route.handler().handle(&req, &mut resp)
            }));

            if outcome.is_err() {
                error!(
                    method = %req.method(),
                    pattern = route.pattern().as_str(),
                    "handler panicked"
                );
                return Response::plain(&self.resp_limits, StatusCode::InternalServerError);
            }
            return resp;
        }

        let readable = matches!(req.method(), Method::Get | Method::Head);
        if let Some(statics) = self.statics.as_ref().filter(|_| readable) {
            let mut resp = Response::new(&self.resp_limits);
            if statics.serve(req.path(), &mut resp) {
                return resp;
            }
        }

        debug!(method = %req.method(), path = req.path(), "no route");
        Response::plain(&self.resp_limits, StatusCode::NotFound)
    }
}

/// Embeddable HTTP/1.1 server with an HTTP/2 preface handshake.
///
/// Configure routes and the static mapping, [`start`](Server::start) to bind,
/// then [`run`](Server::run) the reactor on the current thread. Each connection
/// carries a single request and is closed after the reply.
///
/// # Examples
///
/// ```no_run
/// use edge_web::{Request, Response, Server, StatusCode};
///
/// let mut server = Server::new("127.0.0.1", 8080);
///
/// server
///     .get("/api/users/:id", |req: &Request, resp: &mut Response| {
///         let id = req.param("id").unwrap_or_default();
///         let format = req.query("format").unwrap_or("text");
///
///         resp.status(StatusCode::Ok)
///             .header("Content-Type", "text/plain")
///             .body(format!("user {id} as {format}"));
///     })
///     .add_static_path("/", "./public")
///     .unwrap();
///
/// server.start().unwrap();
/// server.run().unwrap();
/// ```
#[derive(Debug)]
pub struct Server {
    host: String,
    port: u16,

    server_limits: ServerLimits,
    static_limits: StaticLimits,

    service: Service,
    reactor: Option<Reactor>,
}

impl Server {
    /// A server for `host:port` with default limits. Nothing is bound yet.
    ///
    /// Port `0` asks the OS for a free port; see [`local_addr`](Server::local_addr).
    #[inline]
    pub fn new<H: Into<String>>(host: H, port: u16) -> Self {
        Self::builder(host, port).build()
    }

    /// Starts configuring a server with custom limits.
    ///
    /// ```
    /// use edge_web::{Server, limits::{ReqLimits, RespLimits}};
    ///
    /// let server = Server::builder("0.0.0.0", 8080)
    ///     .request_limits(ReqLimits {
    ///         max_request_size: 64 * 1024,
    ///         ..ReqLimits::default()
    ///     })
    ///     .response_limits(RespLimits {
    ///         server_name: "my-service".into(),
    ///         ..RespLimits::default()
    ///     })
    ///     .build();
    /// ```
    #[inline]
    pub fn builder<H: Into<String>>(host: H, port: u16) -> ServerBuilder {
        ServerBuilder {
            host: host.into(),
            port,

            server_limits: None,
            request_limits: None,
            response_limits: None,
            static_limits: None,
        }
    }
}

// Registration
impl Server {
    /// Registers `handler` for `method` and a path pattern.
    ///
    /// Patterns are literal segments and `:name` parameters, e.g.
    /// `/api/users/:id`. Routes are tried in registration order and the first
    /// match wins, so register specific literals before overlapping parameters.
    pub fn add_route<H: Handler>(&mut self, method: Method, pattern: &str, handler: H) -> &mut Self {
        self.service.router.add(method, pattern, handler);
        self
    }

    #[inline]
    pub fn get<H: Handler>(&mut self, pattern: &str, handler: H) -> &mut Self {
        self.add_route(Method::Get, pattern, handler)
    }

    #[inline]
    pub fn post<H: Handler>(&mut self, pattern: &str, handler: H) -> &mut Self {
        self.add_route(Method::Post, pattern, handler)
    }

    #[inline]
    pub fn put<H: Handler>(&mut self, pattern: &str, handler: H) -> &mut Self {
        self.add_route(Method::Put, pattern, handler)
    }

    #[inline]
    pub fn delete<H: Handler>(&mut self, pattern: &str, handler: H) -> &mut Self {
        self.add_route(Method::Delete, pattern, handler)
    }

    #[inline]
    pub fn patch<H: Handler>(&mut self, pattern: &str, handler: H) -> &mut Self {
        self.add_route(Method::Patch, pattern, handler)
    }

    /// Serves files under `directory` for request paths starting with `prefix`.
    ///
    /// Only one mapping exists; calling this again replaces it. Fails when the
    /// directory cannot be listed.
    pub fn add_static_path<P: AsRef<Path>>(
        &mut self,
        prefix: &str,
        directory: P,
    ) -> Result<&mut Self, Error> {
        let statics = StaticFiles::new(prefix, directory.as_ref(), &self.static_limits)?;
        info!(prefix, directory = %directory.as_ref().display(), "static files mapped");

        self.service.statics = Some(statics);
        Ok(self)
    }

    /// File served for directory paths (`index.html` by default).
    pub fn set_default_file(&mut self, name: &str) -> &mut Self {
        self.static_limits.default_file = name.to_owned();
        if let Some(statics) = &mut self.service.statics {
            statics.set_default_file(name);
        }
        self
    }
}

// Lifecycle
impl Server {
    /// Resolves the address, binds the listener and registers it with the reactor.
    pub fn start(&mut self) -> Result<(), Error> {
        if self.reactor.is_some() {
            return Err(Error::AlreadyStarted);
        }

        let addr = self.resolve()?;
        let reactor = Reactor::bind(addr, self.server_limits.clone())?;

        debug!(routes = self.service.router.len(), "server started");
        self.reactor = Some(reactor);
        Ok(())
    }

    fn resolve(&self) -> Result<SocketAddr, Error> {
        let display = format!("{}:{}", self.host, self.port);

        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or(Error::Resolve(display))
    }

    /// The bound address once started.
    #[inline]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.reactor.as_ref().map(Reactor::local_addr)
    }

    /// A handle that can stop [`run`](Server::run) from another thread.
    pub fn handle(&self) -> Result<ServerHandle, Error> {
        self.reactor
            .as_ref()
            .map(Reactor::handle)
            .ok_or(Error::NotStarted)
    }

    /// Runs the reactor on this thread until stopped.
    ///
    /// Handlers execute inline, so a slow handler delays every other
    /// connection. When this returns the listener is closed and the server
    /// must be started again before another `run`.
    pub fn run(&mut self) -> Result<(), Error> {
        let reactor = self.reactor.as_mut().ok_or(Error::NotStarted)?;
        let result = reactor.run(&self.service);

        self.reactor = None;
        result
    }

    /// Closes every connection and the listener. Safe to call at any time.
    pub fn stop(&mut self) {
        if let Some(mut reactor) = self.reactor.take() {
            reactor.shutdown();
            info!(addr = %reactor.local_addr(), "server stopped");
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Builder for a [`Server`] with custom limits.
#[derive(Debug)]
pub struct ServerBuilder {
    host: String,
    port: u16,

    server_limits: Option<ServerLimits>,
    request_limits: Option<ReqLimits>,
    response_limits: Option<RespLimits>,
    static_limits: Option<StaticLimits>,
}

impl ServerBuilder {
    #[inline]
    pub fn server_limits(mut self, limits: ServerLimits) -> Self {
        self.server_limits = Some(limits);
        self
    }

    #[inline]
    pub fn request_limits(mut self, limits: ReqLimits) -> Self {
        self.request_limits = Some(limits);
        self
    }

    #[inline]
    pub fn response_limits(mut self, limits: RespLimits) -> Self {
        self.response_limits = Some(limits);
        self
    }

    #[inline]
    pub fn static_limits(mut self, limits: StaticLimits) -> Self {
        self.static_limits = Some(limits);
        self
    }

    pub fn build(self) -> Server {
        Server {
            host: self.host,
            port: self.port,

            server_limits: self.server_limits.unwrap_or_default(),
            static_limits: self.static_limits.unwrap_or_default(),

            service: Service {
                router: Router::default(),
                statics: None,
                req_limits: self.request_limits.unwrap_or_default(),
                resp_limits: self.response_limits.unwrap_or_default(),
            },
            reactor: None,
        }
    }
}
