//! edge_web - embeddable single-threaded HTTP server core
//!
//! One event loop on one thread owns the listener and every connection.
//! Handlers run inline, so the crate fits small services, device front-ends
//! and test harnesses rather than high-concurrency workloads.
//!
//! # Protocol Support
//!
//! - **HTTP/1.1**: one request per connection, `Content-Length` bodies, `Connection: close` replies
//! - **HTTP/2**: preface detection and a [`SETTINGS` handshake](h2::H2Connection), then `GOAWAY`
//!
//! # Features
//!
//! - **mio reactor** - edge-triggered readiness, idle reaping, cross-thread [stop](ServerHandle::stop)
//! - **Router** - literal segments and `:name` parameters, first registered match wins
//! - **Static files** - one prefix mapped to a directory, traversal and symlink escapes refused
//! - **Bounded buffers** - request size, header count and query parts set through [`limits`]
//!
//! # Examples
//!
//! Quick start:
//! ```no_run
//! use edge_web::{Request, Response, Server, StatusCode};
//!
//! fn main() {
//!     let mut server = Server::new("127.0.0.1", 8080);
//!
//!     server.get("/", |_: &Request, resp: &mut Response| {
//!         resp.status(StatusCode::Ok).body("Hello World!");
//!     });
//!
//!     server.start().unwrap();
//!     server.run().unwrap();
//! }
//! ```
//! Parameters, query strings and a static directory:
//! ```no_run
//! use edge_web::{Request, Response, Server, StatusCode};
//!
//! fn main() {
//!     let mut server = Server::new("0.0.0.0", 8080);
//!
//!     server
//!         .get("/api/users/:id", |req: &Request, resp: &mut Response| {
//!             match req.param("id").and_then(|id| id.parse::<u64>().ok()) {
//!                 Some(id) => resp
//!                     .header("Content-Type", "application/json")
//!                     .body_with(|w| {
//!                         w.write("{\"id\":");
//!                         w.write(id);
//!                         w.write('}');
//!                     }),
//!                 None => resp.status(StatusCode::BadRequest).body("bad id"),
//!             };
//!         })
//!         .add_static_path("/", "./public")
//!         .unwrap();
//!
//!     server.start().unwrap();
//!     server.run().unwrap();
//! }
//! ```
//! Stopping from another thread:
//! ```no_run
//! use edge_web::Server;
//! use std::{thread, time::Duration};
//!
//! let mut server = Server::new("127.0.0.1", 0);
//! server.start().unwrap();
//!
//! let handle = server.handle().unwrap();
//! thread::spawn(move || {
//!     thread::sleep(Duration::from_secs(5));
//!     handle.stop();
//! });
//!
//! server.run().unwrap();
//! ```

pub(crate) mod http {
    pub mod query;
    pub(crate) mod request;
    pub(crate) mod response;
    pub(crate) mod types;
}
pub(crate) mod routing {
    pub(crate) mod router;
    pub(crate) mod static_files;
}
/// HTTP/2 framing pieces used by the connection handshake.
///
/// A connection whose first bytes equal [`PREFACE`] is switched to HTTP/2: the
/// server writes its `SETTINGS` frame followed by `GOAWAY(NO_ERROR)` and
/// closes. No streams are served.
pub mod h2 {
    pub mod connection;
    pub mod error;
    pub mod frame;
    pub mod literal;
    pub mod settings;

    pub use connection::H2Connection;
    pub use error::{ErrorCode, H2Error};
    pub use settings::Settings;

    /// Client connection preface (RFC 9113, section 3.4).
    pub const PREFACE: &[u8; 24] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";
}
pub(crate) mod server {
    pub(crate) mod connection;
    pub(crate) mod detect;
    pub(crate) mod reactor;
    pub(crate) mod server_impl;
}
pub(crate) mod errors;
pub mod limits;

pub use crate::{
    errors::Error,
    http::{
        query,
        request::Request,
        response::{
            write::{BodyWriter, WriteBuffer},
            Response,
        },
        types::{Header, Method, StatusCode, Version},
    },
    routing::router::Handler,
    server::{
        reactor::ServerHandle,
        server_impl::{Server, ServerBuilder},
    },
};
