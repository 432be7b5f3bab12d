//! Serving the event feed.

use std::net::SocketAddr;
use std::sync::Arc;

use tailswan_runtime::EventBroadcaster;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::routes::create_router;
use crate::state::app_state;

/// Bind `addr` for the event feed.
pub async fn bind(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Event feed listening");
    Ok(listener)
}

/// Serve the event feed on `listener` until `shutdown` is cancelled.
///
/// Open SSE streams end when the broadcaster is stopped; stop it before
/// cancelling `shutdown` so the graceful drain completes.
pub async fn start_server(
    listener: TcpListener,
    broadcaster: Arc<EventBroadcaster>,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let router = create_router(app_state(broadcaster));
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    info!("Event feed stopped");
    Ok(())
}
