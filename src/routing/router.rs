//! Ordered route table with `:name` path parameters.

use crate::{Method, Request, Response};

/// Request handler.
///
/// Handlers run synchronously on the reactor thread, so a slow handler delays
/// every other connection. Any state the handler needs is captured by the
/// implementing type (or the closure).
///
/// # Examples
/// ```
/// use edge_web::{Handler, Request, Response, StatusCode};
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// struct Counter(AtomicUsize);
///
/// impl Handler for Counter {
///     fn handle(&self, _req: &Request, resp: &mut Response) {
///         let n = self.0.fetch_add(1, Ordering::Relaxed) + 1;
///         resp.status(StatusCode::Ok).body(n);
///     }
/// }
/// ```
///
/// Closures implement the trait directly:
/// ```
/// use edge_web::{Handler, Request, Response};
///
/// fn assert_handler<H: Handler>(_: H) {}
///
/// assert_handler(|req: &Request, resp: &mut Response| {
///     resp.body(req.path());
/// });
/// ```
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, req: &Request, resp: &mut Response);
}

impl<F> Handler for F
where
    F: Fn(&Request, &mut Response) + Send + Sync + 'static,
{
    #[inline]
    fn handle(&self, req: &Request, resp: &mut Response) {
        self(req, resp)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A path template such as `/api/users/:id`.
///
/// One leading slash is ignored on both the pattern and the path, then both
/// are compared segment by segment. A `:name` segment matches any single
/// segment; anything else must be equal byte for byte. Both sides must run out
/// at the same time, so there is no prefix matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    pub(crate) fn new(pattern: &str) -> Self {
        let segments = split(pattern)
            .map(|s| match s.strip_prefix(':') {
                Some(name) => Segment::Param(name.to_owned()),
                None => Segment::Literal(s.to_owned()),
            })
            .collect();

        RoutePattern {
            raw: pattern.to_owned(),
            segments,
        }
    }

    #[inline]
    pub(crate) fn as_str(&self) -> &str {
        &self.raw
    }

    pub(crate) fn matches(&self, path: &str) -> bool {
        let mut parts = split(path);

        for segment in &self.segments {
            match (segment, parts.next()) {
                (_, None) => return false,
                (Segment::Literal(lit), Some(part)) if lit != part => return false,
                _ => {}
            }
        }

        parts.next().is_none()
    }

    /// Binds every `:name` segment to the matching path segment.
    ///
    /// Only meaningful for a path that [`matches`](Self::matches).
    pub(crate) fn extract(&self, path: &str) -> Vec<(String, String)> {
        self.segments
            .iter()
            .zip(split(path))
            .filter_map(|(segment, part)| match segment {
                Segment::Param(name) => Some((name.clone(), part.to_owned())),
                Segment::Literal(_) => None,
            })
            .collect()
    }
}

#[inline]
fn split(path: &str) -> std::str::Split<'_, char> {
    path.strip_prefix('/').unwrap_or(path).split('/')
}

pub(crate) struct Route {
    method: Method,
    pattern: RoutePattern,
    handler: Box<dyn Handler>,
}

impl Route {
    #[inline(always)]
    pub(crate) fn handler(&self) -> &dyn Handler {
        self.handler.as_ref()
    }

    #[inline(always)]
    pub(crate) fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern.raw)
            .finish_non_exhaustive()
    }
}

/// Routes in registration order. Overlapping patterns resolve to the one
/// registered first, never to the most specific one.
#[derive(Debug, Default)]
pub(crate) struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub(crate) fn add<H: Handler>(&mut self, method: Method, pattern: &str, handler: H) {
        self.routes.push(Route {
            method,
            pattern: RoutePattern::new(pattern),
            handler: Box::new(handler),
        });
    }

    pub(crate) fn find(&self, method: Method, path: &str) -> Option<&Route> {
        self.routes
            .iter()
            .filter(|route| route.method == method)
            .find(|route| route.pattern.matches(path))
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.routes.len()
    }
}
