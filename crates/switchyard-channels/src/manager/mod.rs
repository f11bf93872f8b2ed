//! Channel lifecycle and outbound routing.
//!
//! [`ChannelManager`] owns every enabled channel. It starts them in
//! isolated tasks, routes messages from the bus's outbound queue to the
//! channel named in each message, and stops everything on shutdown.
//!
//! Failures stay local: a channel that cannot be built is left out, a
//! channel whose `start` fails or panics does not affect the others, and
//! a failed `send` only loses that one message.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

use switchyard_core::bus::{MessageBus, Received};
use switchyard_types::config::{Config, GatewayConfig};
use switchyard_types::event::OutboundMessage;

use crate::host::BusHost;
use crate::registry::ChannelRegistry;
use crate::traits::{Channel, ChannelHost};


/// Tuning for the dispatch loop and shutdown.
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    /// How long one outbound poll waits before re-checking cancellation.
    pub poll_interval: Duration,
    /// Upper bound on each channel's `stop()`, and on how long channel
    /// tasks get to return afterwards. `None` waits indefinitely.
    pub stop_timeout: Option<Duration>,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self::from(&GatewayConfig::default())
    }
}

impl From<&GatewayConfig> for ManagerOptions {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            poll_interval: config.dispatch_poll_interval(),
            stop_timeout: config.stop_timeout(),
        }
    }
}

/// One row of [`ChannelManager::get_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChannelStatusEntry {
    /// Always `true`: only enabled channels are registered.
    pub enabled: bool,
    /// The channel's own report of a live connection.
    pub running: bool,
}

/// Handles of one `start_all` run.
struct Run {
    dispatch_cancel: CancellationToken,
    dispatch: JoinHandle<()>,
    /// Cancelled once the dispatch task and every channel task are done.
    settled: CancellationToken,
    /// Cancelling drops channel tasks whose `start` ignored `stop`.
    abandon: CancellationToken,
}

/// Owns the enabled channels and routes outbound traffic to them.
pub struct ChannelManager {
    bus: Arc<MessageBus>,
    host: Arc<dyn ChannelHost>,
    channels: BTreeMap<String, Arc<dyn Channel>>,
    options: ManagerOptions,
    span: Span,
    run: Mutex<Option<Run>>,
}

impl ChannelManager {
    /// An empty manager publishing inbound traffic onto `bus`.
    pub fn new(bus: Arc<MessageBus>) -> Self {
        let host: Arc<dyn ChannelHost> = Arc::new(BusHost::new(bus.clone()));
        Self {
            bus,
            host,
            channels: BTreeMap::new(),
            options: ManagerOptions::default(),
            span: info_span!("channel_manager"),
            run: Mutex::new(None),
        }
    }

    /// Build every enabled channel in `config`.
    ///
    /// A channel whose factory fails (integration unavailable, bad
    /// section) is logged and skipped; it never aborts the others.
    pub fn from_config(config: &Config, registry: &ChannelRegistry, bus: Arc<MessageBus>) -> Self {
        let mut manager = Self::new(bus).with_options(ManagerOptions::from(&config.gateway));
        let span = manager.span.clone();
        let _entered = span.enter();

        for (name, section) in config.channels.enabled() {
            match registry.build(name, &section.to_value()) {
                Ok(channel) => {
                    info!(channel = %name, "channel enabled");
                    manager.register(name, channel);
                }
                Err(e) if e.is_construction_failure() => {
                    warn!(channel = %name, error = %e, "channel not available, skipping");
                }
                Err(e) => {
                    error!(channel = %name, error = %e, "failed to build channel, skipping");
                }
            }
        }

        if manager.channels.is_empty() {
            warn!("no channels enabled");
        }
        manager
    }

    pub fn with_options(mut self, options: ManagerOptions) -> Self {
        self.options = options;
        self
    }

    /// Deliver inbound traffic through `host` instead of the bus.
    pub fn with_host(mut self, host: Arc<dyn ChannelHost>) -> Self {
        self.host = host;
        self
    }

    /// Attach all manager logging to `span`.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Register `channel` under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, channel: Arc<dyn Channel>) {
        let name = name.into();
        if self.channels.insert(name.clone(), channel).is_some() {
            debug!(parent: &self.span, channel = %name, "replaced registered channel");
        }
    }

    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }

    /// Start every channel and the outbound dispatcher.
    ///
    /// Returns once the dispatcher and every channel task have finished,
    /// which normally means after [`stop_all`](Self::stop_all). With no
    /// channels registered it logs a warning and returns immediately.
    pub async fn start_all(&self) {
        async {
            if self.channels.is_empty() {
                warn!("no channels enabled, nothing to start");
                return;
            }

            let (settled, tasks) = {
                let mut run = self.run.lock().await;
                if run.is_some() {
                    warn!("channels already started");
                    return;
                }

                let settled = CancellationToken::new();
                let guard = Arc::new(settled.clone().drop_guard());
                let dispatch_cancel = CancellationToken::new();
                let abandon = CancellationToken::new();

                info!("starting outbound dispatcher");
                let dispatch = tokio::spawn(
                    dispatch_outbound(
                        self.bus.clone(),
                        Arc::new(self.channels.clone()),
                        self.options.poll_interval,
                        dispatch_cancel.clone(),
                        guard.clone(),
                    )
                    .instrument(self.span.clone()),
                );

                let mut tasks = Vec::with_capacity(self.channels.len());
                for (name, channel) in &self.channels {
                    info!(channel = %name, "starting channel");
                    let handle = tokio::spawn(
                        run_channel(
                            name.clone(),
                            channel.clone(),
                            self.host.clone(),
                            abandon.clone(),
                            guard.clone(),
                        )
                        .instrument(self.span.clone()),
                    );
                    tasks.push((name.clone(), handle));
                }
                drop(guard);

                *run = Some(Run {
                    dispatch_cancel,
                    dispatch,
                    settled: settled.clone(),
                    abandon,
                });
                (settled, tasks)
            };

            for (name, handle) in tasks {
                if let Err(e) = handle.await {
                    error!(channel = %name, error = %e, "channel task panicked");
                }
            }
            if !settled.is_cancelled() {
                info!("all channel tasks have returned; dispatcher runs until stop_all");
            }
            settled.cancelled().await;
            info!("all channels stopped");
        }
        .instrument(self.span.clone())
        .await
    }

    /// Stop the dispatcher, then every channel, one at a time.
    ///
    /// Errors and timeouts from individual channels are logged and do
    /// not prevent the remaining channels from being stopped. Safe to
    /// call without a prior [`start_all`](Self::start_all).
    pub async fn stop_all(&self) {
        async {
            info!("stopping all channels");

            let run = self.run.lock().await.take();
            let mut abandon = None;
            let mut settled = None;
            if let Some(run) = run {
                run.dispatch_cancel.cancel();
                match run.dispatch.await {
                    Ok(()) => {}
                    Err(e) if e.is_cancelled() => {}
                    Err(e) => error!(error = %e, "outbound dispatcher panicked"),
                }
                abandon = Some(run.abandon);
                settled = Some(run.settled);
            }

            for (name, channel) in &self.channels {
                info!(channel = %name, "stopping channel");
                let outcome = match self.options.stop_timeout {
                    Some(limit) => tokio::time::timeout(limit, channel.stop()).await,
                    None => Ok(channel.stop().await),
                };
                match outcome {
                    Ok(Ok(())) => info!(channel = %name, "stopped channel"),
                    Ok(Err(e)) => error!(channel = %name, error = %e, "error stopping channel"),
                    Err(_) => warn!(channel = %name, "timed out stopping channel"),
                }
            }

            if let (Some(abandon), Some(settled)) = (abandon, settled) {
                let returned = match self.options.stop_timeout {
                    Some(grace) => tokio::time::timeout(grace, settled.cancelled())
                        .await
                        .is_ok(),
                    None => {
                        settled.cancelled().await;
                        true
                    }
                };
                if !returned {
                    warn!("abandoning channel tasks that did not return after stop");
                    abandon.cancel();
                    settled.cancelled().await;
                }
            }
            info!("shutdown complete");
        }
        .instrument(self.span.clone())
        .await
    }

    /// The channel registered as `name`.
    pub fn get_channel(&self, name: &str) -> Option<Arc<dyn Channel>> {
        self.channels.get(name).cloned()
    }

    /// `{enabled, running}` for every registered channel, by name.
    pub fn get_status(&self) -> BTreeMap<String, ChannelStatusEntry> {
        self.channels
            .iter()
            .map(|(name, channel)| {
                (
                    name.clone(),
                    ChannelStatusEntry {
                        enabled: true,
                        running: channel.is_running(),
                    },
                )
            })
            .collect()
    }

    /// Names of the registered channels, sorted.
    pub fn enabled_channels(&self) -> Vec<String> {
        self.channels.keys().cloned().collect()
    }
}

/// Run one channel until its `start` returns or the run is abandoned.
async fn run_channel(
    name: String,
    channel: Arc<dyn Channel>,
    host: Arc<dyn ChannelHost>,
    abandon: CancellationToken,
    _settled: Arc<DropGuard>,
) {
    tokio::select! {
        result = channel.start(host) => match result {
            Ok(()) => info!(channel = %name, "channel returned"),
            Err(e) => error!(channel = %name, error = %e, "failed to start channel"),
        },
        _ = abandon.cancelled() => {
            warn!(channel = %name, "channel task abandoned");
        }
    }
}

/// Move messages from the outbound queue to their channels until
/// cancelled or the queue closes.
async fn dispatch_outbound(
    bus: Arc<MessageBus>,
    channels: Arc<BTreeMap<String, Arc<dyn Channel>>>,
    poll_interval: Duration,
    cancel: CancellationToken,
    _settled: Arc<DropGuard>,
) {
    info!("outbound dispatcher started");

    loop {
        let received = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            received = bus.consume_outbound_timeout(poll_interval) => received,
        };

        match received {
            Received::Message(msg) => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = route_outbound(&channels, msg) => {}
                }
            }
            Received::TimedOut => continue,
            Received::Closed => {
                info!("outbound queue closed");
                break;
            }
        }
    }

    info!("outbound dispatcher stopped");
}

/// Hand `msg` to the channel it names. Unknown channels and send
/// failures are logged; the message is dropped either way.
async fn route_outbound(channels: &BTreeMap<String, Arc<dyn Channel>>, msg: OutboundMessage) {
    let Some(channel) = channels.get(&msg.channel) else {
        warn!(
            channel = %msg.channel,
            chat_id = %msg.chat_id,
            "unknown channel, dropping outbound message"
        );
        return;
    };

    match AssertUnwindSafe(channel.send(&msg)).catch_unwind().await {
        Ok(Ok(id)) => {
            debug!(channel = %msg.channel, chat_id = %msg.chat_id, message_id = %id, "sent");
        }
        Ok(Err(e)) => {
            error!(
                channel = %msg.channel,
                chat_id = %msg.chat_id,
                error = %e,
                "error sending outbound message"
            );
        }
        Err(_) => {
            error!(channel = %msg.channel, "channel panicked while sending");
        }
    }
}
