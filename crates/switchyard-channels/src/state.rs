//! Shared lifecycle bookkeeping for channel implementations.

use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::traits::ChannelStatus;

/// Status plus stop signal for one channel.
///
/// A channel calls [`begin`](ChannelState::begin) at the top of `start`,
/// selects on the returned token in its event loop, and calls
/// [`finish`](ChannelState::finish) before returning. `stop` only needs
/// [`request_stop`](ChannelState::request_stop).
pub struct ChannelState {
    status: RwLock<ChannelStatus>,
    cancel: Mutex<CancellationToken>,
}

impl ChannelState {
    pub fn new() -> Self {
        Self {
            status: RwLock::new(ChannelStatus::Stopped),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// Mark the channel as starting and return a fresh stop token for
    /// this run.
    pub async fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.cancel.lock().await = token.clone();
        self.set(ChannelStatus::Starting).await;
        token
    }

    /// Signal the current run to stop. No-op when nothing is running.
    pub async fn request_stop(&self) {
        self.cancel.lock().await.cancel();
        let mut status = self.status.write().await;
        if matches!(*status, ChannelStatus::Starting | ChannelStatus::Running) {
            *status = ChannelStatus::Stopping;
        }
    }

    /// Mark the run as over.
    pub async fn finish(&self) {
        self.set(ChannelStatus::Stopped).await;
    }

    pub async fn set(&self, status: ChannelStatus) {
        *self.status.write().await = status;
    }

    /// Current status. Reports `Stopped` while a writer holds the lock.
    pub fn status(&self) -> ChannelStatus {
        self.status
            .try_read()
            .map(|s| s.clone())
            .unwrap_or(ChannelStatus::Stopped)
    }

    pub fn is_running(&self) -> bool {
        self.status() == ChannelStatus::Running
    }
}

impl Default for ChannelState {
    fn default() -> Self {
        Self::new()
    }
}
