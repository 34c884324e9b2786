use edge_web::{limits::StaticLimits, Request, Response, Server, StatusCode};
use std::{env, time::SystemTime};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let root = env::args().nth(1).unwrap_or_else(|| "./public".to_owned());

    let mut server = Server::builder("0.0.0.0", 8080)
        .static_limits(StaticLimits {
            max_file_size: 1024 * 1024,
            ..StaticLimits::default()
        })
        .build();

    server.get("/api/time", |_: &Request, resp: &mut Response| {
        match SystemTime::now().duration_since(SystemTime::UNIX_EPOCH) {
            Ok(now) => resp
                .header("Content-Type", "application/json")
                .body_with(|w| {
                    w.write("{\"unix\": ");
                    w.write(now.as_secs());
                    w.write('}');
                }),
            Err(_) => resp.status(StatusCode::InternalServerError),
        };
    });

    if let Err(e) = server.add_static_path("/", &root) {
        eprintln!("{e}");
        return;
    }

    server.start().expect("bind 0.0.0.0:8080");
    server.run().expect("event loop");
}
