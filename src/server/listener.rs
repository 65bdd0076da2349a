//! TCP Listener
//!
//! Accept loop spawning one task per client connection.

use std::future::Future;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::error::ConnectionError;
use crate::server::{Connection, ServerState};

/// Backoff after a failed accept (e.g. out of file descriptors)
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Accepts connections until `shutdown` resolves.
///
/// Each connection runs in its own task and keeps running after the accept
/// loop stops; tasks end when their client disconnects or the runtime is
/// dropped.
pub async fn serve<F>(listener: TcpListener, state: ServerState, shutdown: F)
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(err) => {
                        warn!("Failed to accept connection: {}", err);
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                        continue;
                    }
                };

                if let Err(err) = stream.set_nodelay(true) {
                    debug!("Could not set TCP_NODELAY for {}: {}", peer, err);
                }

                let id = state.connections.next_id();
                debug!(conn = %id, %peer, "Accepted connection");

                let connection = Connection::new(id, stream, state.clone());
                tokio::spawn(async move {
                    match connection.run().await {
                        Ok(()) => debug!(conn = %id, %peer, "Connection closed"),
                        Err(ConnectionError::Truncated) => {
                            debug!(conn = %id, %peer, "Connection closed mid-message")
                        }
                        Err(err) => warn!(conn = %id, %peer, "Connection failed: {}", err),
                    }
                });
            }
            _ = &mut shutdown => {
                info!("Listener stopped accepting connections");
                return;
            }
        }
    }
}
