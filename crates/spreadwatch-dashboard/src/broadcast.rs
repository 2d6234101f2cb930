//! WebSocket broadcast functionality.
//!
//! The broadcaster forwards every published session snapshot to all
//! connected WebSocket clients.

use spreadwatch_session::SessionSnapshot;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::types::DashboardMessage;

/// Run the broadcaster task until shutdown or until the session stops
/// publishing.
pub async fn run_broadcaster(
    mut snapshots: watch::Receiver<SessionSnapshot>,
    tx: broadcast::Sender<String>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            changed = snapshots.changed() => {
                if changed.is_err() {
                    debug!("Session stopped publishing");
                    break;
                }
            }
        }

        let msg = DashboardMessage::Update(snapshots.borrow_and_update().clone());
        match serde_json::to_string(&msg) {
            Ok(json) => match tx.send(json) {
                Ok(n) => trace!(receivers = n, "Broadcast update sent"),
                // No receivers - this is normal when no clients connected
                Err(_) => trace!("No WebSocket receivers connected"),
            },
            Err(e) => debug!(error = %e, "Failed to serialize dashboard update"),
        }
    }
}
