use edge_web::{Request, Response, Server, StatusCode};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let mut server = Server::new("127.0.0.1", 8080);

    server.get("/", |_: &Request, resp: &mut Response| {
        resp.status(StatusCode::Ok)
            .header("Content-Type", "text/plain")
            .body("Hello, world!");
    });

    server.start().expect("bind 127.0.0.1:8080");
    server.run().expect("event loop");
}
