// File: src/main.rs
// Purpose: Binary entry point wiring the dispatcher into an axum listener

use std::process;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::response::Response;
use axum::Router;
use tracing::{error, info};

use vellum_server::{Config, VellumServer};

#[derive(Clone)]
struct AppState {
    server: Arc<VellumServer>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::load_default().unwrap_or_else(|err| {
        eprintln!("Failed to load vellum.toml, using defaults: {err:#}");
        Config::default()
    });

    let addr = format!("{}:{}", config.server.host, config.server.port);

    let server = match VellumServer::new(".", config) {
        Ok(server) => Arc::new(server),
        Err(err) => {
            error!("{err:#}");
            process::exit(1);
        }
    };
    info!(build_id = server.build_id(), "server initialized");

    let state = AppState { server };
    let app = Router::new().fallback(dispatch).with_state(state);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("Failed to bind {addr}: {err}");
            process::exit(1);
        }
    };
    info!("listening on http://{addr}");

    if let Err(err) = axum::serve(listener, app).await {
        error!("Server error: {err}");
        process::exit(1);
    }
}

async fn dispatch(State(state): State<AppState>, req: Request<Body>) -> Response {
    state.server.handle(req).await
}
