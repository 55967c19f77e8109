//! Fault & shutdown coordination.

use crate::NodeError;
use pubsub_shadow_overlay::Overlay;
use pubsub_shadow_tracer::{ShutdownListener, ShutdownRequest};
use std::{future::Future, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How a coordinated run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// The node loop returned on its own.
    Completed,
    /// The tracer requested shutdown. Connections are closed and the grace period has
    /// elapsed.
    Shutdown(ShutdownRequest),
}

/// Races the node loop against the shutdown signal.
pub struct Coordinator<'a, O: ?Sized> {
    overlay: &'a O,
    listener: ShutdownListener,
    cancel: CancellationToken,
    grace_period: Duration,
}

impl<'a, O: Overlay + ?Sized> Coordinator<'a, O> {
    /// `cancel` must be the token every blocking call of the node loop observes.
    pub fn new(
        overlay: &'a O,
        listener: ShutdownListener,
        cancel: CancellationToken,
        grace_period: Duration,
    ) -> Self {
        Self {
            overlay,
            listener,
            cancel,
            grace_period,
        }
    }

    /// Drives `node` until it finishes or a shutdown is requested.
    ///
    /// On shutdown: cancel outstanding operations, close the overlay, then stay alive for
    /// the grace period. There is no resumption.
    pub async fn run<F>(mut self, node: F) -> Result<Exit, NodeError>
    where
        F: Future<Output = Result<(), NodeError>>,
    {
        let request = tokio::select! {
            res = node => {
                return match res {
                    Ok(()) => Ok(Exit::Completed),
                    Err(e) if e.is_cancelled() => Ok(Exit::Completed),
                    Err(e) => Err(e),
                };
            }
            Some(request) = self.listener.recv() => request,
        };

        info!(trigger = %request.trigger, "Shutdown requested");
        self.cancel.cancel();

        if let Err(e) = self.overlay.close().await {
            warn!(error = %e, "Failed to close overlay");
        }
        info!(grace_period = ?self.grace_period, "Overlay closed, waiting before exit");
        tokio::time::sleep(self.grace_period).await;

        Ok(Exit::Shutdown(request))
    }
}
