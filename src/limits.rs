//! Server configuration limits and timeouts
//!
//! # Security-First Defaults
//!
//! Default limits are intentionally conservative to prevent:
//! - Resource exhaustion attacks
//! - Memory overflows
//! - Slowloris attacks (idle connections are reaped)
//! - Header flooding
//!
//! # Memory Consumption
//!
//! Each active connection owns one fixed request buffer of
//! [`ReqLimits::max_request_size`] bytes plus the serialized response while it
//! is being written. Nothing else grows per connection.
//!
//! # Examples
//!
//! ```no_run
//! use edge_web::{Server, limits::{ReqLimits, ServerLimits}};
//! use std::time::Duration;
//!
//! let mut server = Server::builder("127.0.0.1", 8080)
//!     .server_limits(ServerLimits {
//!         max_connections: 5000,
//!         idle_timeout: Duration::from_secs(15),
//!         ..ServerLimits::default()
//!     })
//!     .request_limits(ReqLimits {
//!         max_request_size: 64 * 1024, // Larger JSON payloads
//!         ..ReqLimits::default()
//!     })
//!     .build();
//!
//! server.start().unwrap();
//! server.run().unwrap();
//! ```

use std::time::Duration;

/// Controls the reactor: admission, readiness polling and idle reaping.
///
/// # Connection management
/// ```text
///   [--------------]
///   [ Accept loop  ]  (drained until the accept call would block)
///   [--------------]
///          ||
///          \/
/// /-------------------\   No   [----------------------]
/// | Below max_conns?  | =====> [ Best-effort 503, close ]
/// \-------------------/        [----------------------]
///          || Yes
///          \/
///   [-----------------------]
///   [ Register for READABLE ]
///   [-----------------------]
/// ```
#[derive(Debug, Clone)]
pub struct ServerLimits {
    /// Maximum number of simultaneously open client connections (default: `1024`).
    pub max_connections: usize,

    /// Length of the kernel accept queue passed to `listen(2)` (default: `1024`).
    pub backlog: i32,

    /// Capacity of the readiness event buffer per wait call (default: `1024`).
    pub events_capacity: usize,

    /// Connections without any activity for longer than this are closed
    /// without a response (default: `60 seconds`).
    pub idle_timeout: Duration,

    /// Upper bound of a single readiness wait (default: `1 second`).
    ///
    /// The idle reaper runs once per loop iteration, so this also bounds how late
    /// an idle connection can be noticed.
    pub poll_interval: Duration,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ServerLimits {
    fn default() -> Self {
        Self {
            max_connections: 1024,
            backlog: 1024,
            events_capacity: 1024,
            idle_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(1),

            _priv: (),
        }
    }
}

/// Request-level limits.
///
/// # Memory allocation strategy
///
/// Every connection allocates exactly `max_request_size` bytes up front. A request
/// (head and body together) that does not fit is dropped and the connection is
/// closed without a response. This is the only backpressure mechanism.
#[derive(Debug, Clone)]
pub struct ReqLimits {
    /// Size of the per-connection receive buffer (default: `16 KiB`).
    pub max_request_size: usize,

    /// Maximum number of header lines (default: `64`).
    pub header_count: usize,

    /// Maximum number of query parameters (default: `32`).
    pub query_parts: usize,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ReqLimits {
    fn default() -> Self {
        Self {
            max_request_size: 16 * 1024,
            header_count: 64,
            query_parts: 32,

            _priv: (),
        }
    }
}

/// Response serialization settings.
#[derive(Debug, Clone)]
pub struct RespLimits {
    /// Initial capacity of the serialization buffer (default: `1024`).
    ///
    /// The buffer doubles when a response does not fit.
    pub default_capacity: usize,

    /// Value of the `Server` header added to every response (default: `edge_web`).
    pub server_name: String,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for RespLimits {
    fn default() -> Self {
        Self {
            default_capacity: 1024,
            server_name: String::from("edge_web"),

            _priv: (),
        }
    }
}

/// Static file serving settings.
#[derive(Debug, Clone)]
pub struct StaticLimits {
    /// Files larger than this are answered with `500` (default: `10 MiB`).
    pub max_file_size: u64,

    /// File served for directory paths (default: `index.html`).
    pub default_file: String,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for StaticLimits {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024,
            default_file: String::from("index.html"),

            _priv: (),
        }
    }
}
