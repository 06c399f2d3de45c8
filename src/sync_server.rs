//! Simulated remote quote server using Axum.
//!
//! Serves the remote side of the sync protocol for local testing and demos:
//! - GET /quotes - current quote collection
//! - POST /quotes - upload modified quotes
//! - GET /status - health check
//!
//! Posted quotes replace stored ones when their version is not older.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::error::{QuoteError, QuoteResult};
use crate::models::Quote;
use crate::remote::upsert_quotes;

/// Shared server state
#[derive(Clone)]
struct AppState {
    quotes: Arc<Mutex<Vec<Quote>>>,
}

#[derive(Debug, Serialize)]
struct PostResponse {
    success: bool,
    accepted: usize,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    status: String,
    quotes: usize,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

async fn get_quotes(State(state): State<AppState>) -> impl IntoResponse {
    match state.quotes.lock() {
        Ok(quotes) => {
            tracing::debug!("GET /quotes ({} quotes)", quotes.len());
            Json(quotes.clone()).into_response()
        }
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "quote store unavailable".to_string(),
            }),
        )
            .into_response(),
    }
}

async fn post_quotes(
    State(state): State<AppState>,
    Json(posted): Json<Vec<Quote>>,
) -> impl IntoResponse {
    tracing::debug!("POST /quotes ({} quotes)", posted.len());

    match state.quotes.lock() {
        Ok(mut quotes) => {
            let accepted = upsert_quotes(&mut quotes, &posted);
            Json(PostResponse {
                success: true,
                accepted,
            })
            .into_response()
        }
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "quote store unavailable".to_string(),
            }),
        )
            .into_response(),
    }
}

async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let quotes = state.quotes.lock().map(|q| q.len()).unwrap_or(0);
    Json(StatusResponse {
        status: "ok".to_string(),
        quotes,
    })
}

/// Create the router over a shared quote collection
pub fn create_router(quotes: Arc<Mutex<Vec<Quote>>>) -> Router {
    let state = AppState { quotes };

    Router::new()
        .route("/quotes", get(get_quotes).post(post_quotes))
        .route("/status", get(status))
        .with_state(state)
}

/// A running server
pub struct ServerHandle {
    addr: SocketAddr,
    quotes: Arc<Mutex<Vec<Quote>>>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// The bound address (useful when started on port 0)
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Shared handle to the served collection
    pub fn quotes(&self) -> Arc<Mutex<Vec<Quote>>> {
        self.quotes.clone()
    }

    /// Shut down gracefully and wait for the server task
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = (&mut self.task).await;
    }
}

/// Start the server on `addr`, serving `initial` quotes
pub async fn start_server(addr: SocketAddr, initial: Vec<Quote>) -> QuoteResult<ServerHandle> {
    let quotes = Arc::new(Mutex::new(initial));
    let router = create_router(quotes.clone());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| QuoteError::transport(e.to_string()))?;
    let addr = listener.local_addr()?;

    let (tx, rx) = oneshot::channel::<()>();

    tracing::info!("Starting quote server on {}", addr);

    let task = tokio::spawn(async move {
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async {
                rx.await.ok();
            })
            .await;
        if let Err(e) = result {
            tracing::error!("Quote server failed: {}", e);
        }
    });

    Ok(ServerHandle {
        addr,
        quotes,
        shutdown: Some(tx),
        task,
    })
}

/// Start the server on loopback at the configured `server_port`
pub async fn start_server_from_config(
    config: &Config,
    initial: Vec<Quote>,
) -> QuoteResult<ServerHandle> {
    start_server(SocketAddr::from(([127, 0, 0, 1], config.server_port())), initial).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::RecordingObserver;
    use crate::persistence::{Persistence, SqlitePersistence};
    use crate::remote::{HttpRemote, RemoteSource};
    use crate::sync_client::SyncClient;
    use std::time::Duration;

    async fn start_test_server(initial: Vec<Quote>) -> ServerHandle {
        start_server(SocketAddr::from(([127, 0, 0, 1], 0)), initial)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_http_remote_fetch_and_post() {
        let server = start_test_server(vec![Quote::remote("1", "A", "Work", 2)]).await;
        let remote = HttpRemote::new(server.base_url(), Duration::from_secs(5)).unwrap();

        let quotes = remote.fetch_remote().await.unwrap();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].version, 2);

        let result = remote
            .post_local(&[Quote::remote("1", "Stale", "Work", 1), Quote::new("New", "Life", "")])
            .await;
        assert!(result.success);

        let served = server.quotes().lock().unwrap().clone();
        assert_eq!(served.len(), 2);
        assert_eq!(served[0].text, "A");

        server.stop().await;
    }

    #[tokio::test]
    async fn test_full_cycle_over_http() {
        let server = start_test_server(vec![
            Quote::remote("1", "B", "Work", 2),
            Quote::remote("3", "New from server", "Life", 1),
        ])
        .await;

        let db = SqlitePersistence::new_in_memory().unwrap();
        db.save(&[Quote::remote("1", "A", "Work", 1)]).unwrap();
        let remote = HttpRemote::new(server.base_url(), Duration::from_secs(5)).unwrap();
        let client = SyncClient::open(
            Box::new(db),
            Arc::new(remote),
            Arc::new(RecordingObserver::new()),
        )
        .unwrap();

        let local = client.add_quote("From the client", "Wisdom", "").unwrap();
        let outcome = client.sync_now().await;
        let result = outcome.result().unwrap();

        assert!(result.success);
        assert_eq!(result.pushed, 1);
        assert_eq!(result.stats.updated, 1);
        assert_eq!(result.stats.added, 1);
        assert_eq!(client.get_quote("1").unwrap().text, "B");
        assert!(!client.get_quote(&local.id).unwrap().dirty);
        assert!(server
            .quotes()
            .lock()
            .unwrap()
            .iter()
            .any(|q| q.id == local.id));

        server.stop().await;
    }

    #[tokio::test]
    async fn test_start_from_config_uses_server_port() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let temp_dir = tempfile::TempDir::new().unwrap();
        let mut config = Config::new(Some(temp_dir.path().to_path_buf())).unwrap();
        config.set_server_port(port).unwrap();

        let server = start_server_from_config(&config, vec![Quote::remote("1", "A", "Work", 1)])
            .await
            .unwrap();
        assert_eq!(server.addr().port(), port);

        config
            .set_remote_url(Some(server.base_url().as_str()))
            .unwrap();
        let remote = HttpRemote::from_config(&config).unwrap();
        assert_eq!(remote.fetch_remote().await.unwrap().len(), 1);

        server.stop().await;
    }

    #[tokio::test]
    async fn test_stopped_server_is_transport_error() {
        let server = start_test_server(Vec::new()).await;
        let url = server.base_url();
        server.stop().await;

        let remote = HttpRemote::new(url, Duration::from_secs(1)).unwrap();
        assert!(remote.fetch_remote().await.unwrap_err().is_transport());
    }
}
