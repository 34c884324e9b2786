//! Static file resolver: one URL prefix mapped onto one directory.

use crate::{errors::Error, limits::StaticLimits, Response, StatusCode};
use std::{
    fs::{self, File},
    io::{self, Read},
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub(crate) struct StaticFiles {
    prefix: String,
    root: PathBuf,
    default_file: String,
    max_file_size: u64,
}

impl StaticFiles {
    /// Maps `prefix` onto `directory`, which must exist and be listable.
    pub(crate) fn new<P: AsRef<Path>>(
        prefix: &str,
        directory: P,
        limits: &StaticLimits,
    ) -> Result<Self, Error> {
        let directory = directory.as_ref();
        let unreadable = |source| Error::StaticDirectory {
            path: directory.to_path_buf(),
            source,
        };

        fs::read_dir(directory).map_err(unreadable)?;
        let root = fs::canonicalize(directory).map_err(unreadable)?;

        Ok(StaticFiles {
            prefix: prefix.to_owned(),
            root,
            default_file: limits.default_file.clone(),
            max_file_size: limits.max_file_size,
        })
    }

    #[inline]
    pub(crate) fn set_default_file(&mut self, name: &str) {
        self.default_file = name.to_owned();
    }

    /// Answers `path` from the mapped directory.
    ///
    /// Returns `false` without touching `resp` when the path is outside the prefix.
    pub(crate) fn serve(&self, path: &str, resp: &mut Response) -> bool {
        let Some(rest) = path.strip_prefix(self.prefix.as_str()) else {
            return false;
        };

        let mut relative = rest.trim_start_matches('/').to_owned();
        if relative.is_empty() || relative.ends_with('/') {
            relative.push_str(&self.default_file);
        }

        let candidate = self.root.join(&relative);
        if candidate.to_string_lossy().contains("..") {
            warn!(path, "static path traversal refused");
            forbid(resp);
            return true;
        }

        match self.load(&candidate) {
            Ok(bytes) => {
                resp.status(StatusCode::Ok)
                    .set_header("Content-Type", content_type(&candidate))
                    .body(bytes);
            }
            Err(Denied::NotFound) => {
                debug!(path, "static file not found");
                resp.status(StatusCode::NotFound).body("404 Not Found");
            }
            Err(Denied::Outside) => {
                warn!(path, "static path escapes the root");
                forbid(resp);
            }
            Err(Denied::Failed(e)) => {
                warn!(path, error = %e, "static file unreadable");
                resp.status(StatusCode::InternalServerError)
                    .body("500 Internal Server Error");
            }
        }

        true
    }

    fn load(&self, candidate: &Path) -> Result<Vec<u8>, Denied> {
        let real = fs::canonicalize(candidate).map_err(Denied::from)?;
        if !real.starts_with(&self.root) {
            return Err(Denied::Outside);
        }

        let mut file = File::open(&real).map_err(Denied::from)?;
        let meta = file.metadata().map_err(Denied::Failed)?;

        if !meta.is_file() {
            return Err(Denied::NotFound);
        }
        if meta.len() > self.max_file_size {
            return Err(Denied::Failed(io::Error::new(
                io::ErrorKind::Other,
                format!("{} bytes exceeds the {} byte limit", meta.len(), self.max_file_size),
            )));
        }

        let mut bytes = Vec::with_capacity(meta.len() as usize);
        file.read_to_end(&mut bytes).map_err(Denied::Failed)?;

        if bytes.len() as u64 != meta.len() {
            return Err(Denied::Failed(io::ErrorKind::UnexpectedEof.into()));
        }
        Ok(bytes)
    }
}

#[derive(Debug)]
enum Denied {
    NotFound,
    Outside,
    Failed(io::Error),
}

impl From<io::Error> for Denied {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => Denied::NotFound,
            _ => Denied::Failed(e),
        }
    }
}

#[inline]
fn forbid(resp: &mut Response) {
    resp.status(StatusCode::Forbidden).body("403 Forbidden");
}

pub(crate) fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    match ext.as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "txt" => "text/plain",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::RespLimits;
    use tempfile::TempDir;

    fn site() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "<h1>home</h1>").unwrap();
        fs::write(dir.path().join("app.JS"), "let a;").unwrap();
        fs::create_dir(dir.path().join("docs")).unwrap();
        fs::write(dir.path().join("docs").join("start.htm"), "docs").unwrap();
        fs::write(dir.path().join("docs").join("index.html"), "docs index").unwrap();
        dir
    }

    fn get(files: &StaticFiles, path: &str) -> Option<Response> {
        let mut resp = Response::new(&RespLimits::default());
        files.serve(path, &mut resp).then_some(resp)
    }

    #[test]
    fn mime_table() {
        #[rustfmt::skip]
        let cases = [
            ("a.html",  "text/html"),
            ("a.HTM",   "text/html"),
            ("a.css",   "text/css"),
            ("a.js",    "application/javascript"),
            ("a.json",  "application/json"),
            ("a.xml",   "application/xml"),
            ("a.txt",   "text/plain"),
            ("a.png",   "image/png"),
            ("a.jpg",   "image/jpeg"),
            ("a.jpeg",  "image/jpeg"),
            ("a.gif",   "image/gif"),
            ("a.svg",   "image/svg+xml"),
            ("a.ico",   "image/x-icon"),
            ("a.woff",  "font/woff"),
            ("a.woff2", "font/woff2"),
            ("a.ttf",   "font/ttf"),
            ("a.wasm",  "application/octet-stream"),
            ("Makefile","application/octet-stream"),
        ];

        for (name, mime) in cases {
            assert_eq!(content_type(Path::new(name)), mime, "{name}");
        }
    }

    #[test]
    fn serves_files() {
        let dir = site();
        let files = StaticFiles::new("/", dir.path(), &StaticLimits::default()).unwrap();

        #[rustfmt::skip]
        let cases = [
            ("/",               StatusCode::Ok,        "<h1>home</h1>",  Some("text/html")),
            ("/index.html",     StatusCode::Ok,        "<h1>home</h1>",  Some("text/html")),
            ("/app.JS",         StatusCode::Ok,        "let a;",         Some("application/javascript")),
            ("/docs/",          StatusCode::Ok,        "docs index",     Some("text/html")),
            ("/docs/start.htm", StatusCode::Ok,        "docs",           Some("text/html")),
            ("/missing.txt",    StatusCode::NotFound,  "404 Not Found",  None),
            ("/docs",           StatusCode::NotFound,  "404 Not Found",  None),
        ];

        for (path, status, body, mime) in cases {
            let resp = get(&files, path).unwrap();

            assert_eq!(resp.status_code(), status, "{path}");
            assert_eq!(resp.body_bytes(), body.as_bytes(), "{path}");
            assert_eq!(resp.get_header("content-type"), mime, "{path}");
        }
    }

    #[test]
    fn traversal_refused() {
        let dir = site();
        let files = StaticFiles::new("/", dir.path(), &StaticLimits::default()).unwrap();

        for path in ["/../../etc/passwd", "/docs/../index.html", "/..", "/a..b"] {
            let resp = get(&files, path).unwrap();

            assert_eq!(resp.status_code(), StatusCode::Forbidden, "{path}");
            assert_eq!(resp.body_bytes(), b"403 Forbidden");
        }
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escape_refused() {
        let dir = site();
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("secret.txt"), "secret").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

        let files = StaticFiles::new("/", dir.path(), &StaticLimits::default()).unwrap();
        let resp = get(&files, "/link/secret.txt").unwrap();

        assert_eq!(resp.status_code(), StatusCode::Forbidden);
    }

    #[test]
    fn prefix_and_default_file() {
        let dir = site();
        let mut files = StaticFiles::new("/static", dir.path(), &StaticLimits::default()).unwrap();

        assert!(get(&files, "/api/users").is_none());
        assert_eq!(get(&files, "/static").unwrap().body_bytes(), b"<h1>home</h1>");

        files.set_default_file("start.htm");
        assert_eq!(get(&files, "/static/docs/").unwrap().body_bytes(), b"docs");
    }

    #[test]
    fn oversized_file() {
        let dir = site();
        let limits = StaticLimits {
            max_file_size: 4,
            ..StaticLimits::default()
        };
        let files = StaticFiles::new("/", dir.path(), &limits).unwrap();
        let resp = get(&files, "/index.html").unwrap();

        assert_eq!(resp.status_code(), StatusCode::InternalServerError);
    }

    #[test]
    fn unreadable_directory() {
        let dir = site();
        let missing = dir.path().join("nope");

        let err = StaticFiles::new("/", &missing, &StaticLimits::default()).unwrap_err();
        assert!(matches!(err, Error::StaticDirectory { ref path, .. } if *path == missing));

        let file = dir.path().join("index.html");
        assert!(StaticFiles::new("/", file, &StaticLimits::default()).is_err());
    }
}
