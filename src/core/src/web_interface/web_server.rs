use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use log::{error, info};
use rust_embed::RustEmbed;
use serde::Serialize;
use warp::filters::path::Tail;
use warp::{http::StatusCode, reply, Filter, Rejection, Reply};

use crate::error_handling::types::WebError;
use crate::storage::storage_trait::Storage;
use crate::web_interface::routes;
use crate::web_interface::types::{ApiError, ApiFailure};

/// Dashboard assets compiled into the binary.
#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/static/"]
struct Assets;

fn serve_asset(path: &str) -> reply::Response {
    match Assets::get(path) {
        Some(file) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            reply::with_header(file.data.into_owned(), "Content-Type", mime.to_string())
                .into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Run `handler` on the blocking pool and turn its outcome into a JSON reply.
async fn respond<T, F>(storage: Arc<dyn Storage>, handler: F) -> Result<reply::Response, Rejection>
where
    T: Serialize + Send + 'static,
    F: FnOnce(&dyn Storage) -> Result<T, ApiFailure> + Send + 'static,
{
    let outcome = tokio::task::spawn_blocking(move || handler(storage.as_ref())).await;
    let res = match outcome {
        Ok(Ok(body)) => reply::with_status(reply::json(&body), StatusCode::OK).into_response(),
        Ok(Err(failure)) => {
            error!("Request failed: {}", failure.message);
            reply::with_status(
                reply::json(&ApiError {
                    message: failure.message,
                }),
                failure.status,
            )
            .into_response()
        }
        Err(e) => {
            error!("Request handler panicked: {}", e);
            reply::with_status(
                reply::json(&ApiError {
                    message: "Internal error".to_string(),
                }),
                StatusCode::INTERNAL_SERVER_ERROR,
            )
            .into_response()
        }
    };
    Ok(res)
}

fn with_storage(
    storage: Arc<dyn Storage>,
) -> impl Filter<Extract = (Arc<dyn Storage>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || storage.clone())
}

/// Web server for the read-only HTTP API and dashboard
pub struct WebServer {
    storage: Arc<dyn Storage>,
}

impl WebServer {
    /// Create a new WebServer instance
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn routes(&self) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
        // GET / -> dashboard
        let dashboard = warp::path::end()
            .and(warp::get())
            .map(|| serve_asset("index.html"));

        // GET /static/<file> -> embedded assets
        let assets = warp::path("static")
            .and(warp::path::tail())
            .and(warp::get())
            .map(|tail: Tail| serve_asset(tail.as_str()));

        // GET /api/records?host=..&time=..&restrict=..&sort=..
        let records = warp::path!("api" / "records")
            .and(warp::get())
            .and(warp::query::<HashMap<String, String>>())
            .and(with_storage(self.storage.clone()))
            .and_then(
                |params: HashMap<String, String>, storage: Arc<dyn Storage>| async move {
                    respond(storage, move |s| routes::records(s, &params)).await
                },
            );

        // GET /api/hosts
        let hosts = warp::path!("api" / "hosts")
            .and(warp::get())
            .and(with_storage(self.storage.clone()))
            .and_then(|storage: Arc<dyn Storage>| async move {
                respond(storage, routes::hosts).await
            });

        // GET /api/programs
        let programs = warp::path!("api" / "programs")
            .and(warp::get())
            .and(with_storage(self.storage.clone()))
            .and_then(|storage: Arc<dyn Storage>| async move {
                respond(storage, routes::programs).await
            });

        // GET /api/concurrency?host=..
        let concurrency = warp::path!("api" / "concurrency")
            .and(warp::get())
            .and(warp::query::<HashMap<String, String>>())
            .and(with_storage(self.storage.clone()))
            .and_then(
                |params: HashMap<String, String>, storage: Arc<dyn Storage>| async move {
                    respond(storage, move |s| {
                        routes::concurrency(s, params.get("host").map(String::as_str))
                    })
                    .await
                },
            );

        // GET /api/popularity
        let popularity = warp::path!("api" / "popularity")
            .and(warp::get())
            .and(with_storage(self.storage.clone()))
            .and_then(|storage: Arc<dyn Storage>| async move {
                respond(storage, routes::popularity).await
            });

        dashboard
            .or(assets)
            .or(records)
            .or(hosts)
            .or(programs)
            .or(concurrency)
            .or(popularity)
    }

    /// Serve until the process is stopped.
    pub async fn start(&self, addr: SocketAddr) -> Result<(), WebError> {
        if addr.port() == 0 {
            return Err(WebError::BindFailed("port 0 is not allowed".into()));
        }
        info!("Web interface listening on http://{}", addr);
        warp::serve(self.routes()).run(addr).await;
        Ok(())
    }
}
