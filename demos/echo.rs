use edge_web::{Request, Response, Server, StatusCode};
use tracing_subscriber::EnvFilter;

/// Mirrors the request back as JSON-ish text.
fn echo(req: &Request, resp: &mut Response) {
    resp.status(StatusCode::Ok)
        .header("Content-Type", "application/json")
        .body_with(|w| {
            w.write(format!("{{\"method\": {:?}, \"path\": {:?}", req.method().as_str(), req.path()));

            w.write(", \"params\": {");
            for (i, (name, value)) in req.params().iter().enumerate() {
                if i > 0 {
                    w.write(", ");
                }
                w.write(format!("{name:?}: {value:?}"));
            }

            w.write("}, \"query\": {");
            for (i, (name, value)) in req.query_params().iter().enumerate() {
                if i > 0 {
                    w.write(", ");
                }
                w.write(format!("{name:?}: {value:?}"));
            }
            w.write('}');

            if !req.body().is_empty() {
                w.write(format!(", \"body\": {:?}", String::from_utf8_lossy(req.body())));
            }
            w.write('}');
        });
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "debug".into()))
        .init();

    let mut server = Server::new("127.0.0.1", 8080);

    server
        .get("/echo", echo)
        .get("/echo/:first", echo)
        .get("/echo/:first/:second", echo)
        .post("/echo", echo);

    server.start().expect("bind 127.0.0.1:8080");
    server.run().expect("event loop");
}
