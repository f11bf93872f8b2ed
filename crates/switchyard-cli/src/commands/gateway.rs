//! `yard gateway` -- start channels and the outbound dispatch loop.
//!
//! # Lifecycle
//!
//! ```text
//! 1. Load config, build the bus and the channel manager
//! 2. Start all channels plus the dispatch loop
//! 3. Optionally run the echo responder in place of a processing core
//! 4. Wait for Ctrl+C, then stop_all and wait for every task to return
//! ```
//!
//! # Example
//!
//! ```text
//! yard gateway
//! yard gateway --config /path/to/config.json --echo
//! ```

use std::future::Future;
use std::sync::Arc;

use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use switchyard_channels::{ChannelManager, ChannelRegistry, ManagerOptions};
use switchyard_core::bus::MessageBus;

use super::load_config;

/// Arguments for the `yard gateway` subcommand.
#[derive(Args)]
pub struct GatewayArgs {
    /// Config file path (overrides auto-discovery).
    #[arg(short, long)]
    pub config: Option<String>,

    /// Answer every inbound message with its own content.
    #[arg(long)]
    pub echo: bool,
}

/// Run the gateway command.
pub async fn run(args: GatewayArgs) -> anyhow::Result<()> {
    info!("starting yard gateway");

    let config = load_config(args.config.as_deref()).await?;
    let bus = Arc::new(MessageBus::from_config(&config.bus));
    let registry = ChannelRegistry::with_builtin();
    let manager = Arc::new(
        ChannelManager::from_config(&config, &registry, bus)
            .with_options(ManagerOptions::from(&config.gateway)),
    );

    if manager.enabled_channels().is_empty() {
        anyhow::bail!(
            "no channels are enabled in config. \
             Enable at least one channel (e.g., telegram, discord, whatsapp) \
             and provide credentials."
        );
    }

    serve(manager, args.echo, tokio::signal::ctrl_c()).await;
    Ok(())
}

/// Run the manager (and the echo responder when `echo` is set) until
/// `shutdown` resolves, then stop everything.
///
/// A failed `shutdown` future is logged and still leads to a full stop.
async fn serve(
    manager: Arc<ChannelManager>,
    echo: bool,
    shutdown: impl Future<Output = std::io::Result<()>>,
) {
    let cancel = CancellationToken::new();
    let echo_handle = echo.then(|| tokio::spawn(echo_loop(manager.bus().clone(), cancel.clone())));

    let runner = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.start_all().await })
    };

    info!(
        channels = ?manager.enabled_channels(),
        "gateway running -- press Ctrl+C to stop"
    );

    match shutdown.await {
        Ok(()) => info!("received shutdown signal"),
        Err(e) => error!(error = %e, "failed to listen for shutdown signal, stopping"),
    }

    manager.stop_all().await;
    cancel.cancel();

    if let Err(e) = runner.await {
        error!(error = %e, "channel runner task failed");
    }
    if let Some(handle) = echo_handle {
        let _ = handle.await;
    }

    let status = manager.get_status();
    info!(
        status = %serde_json::to_string(&status).unwrap_or_default(),
        "gateway shutdown complete"
    );
}

/// Stand-in processing core: replies to each inbound message with its
/// own content.
async fn echo_loop(bus: Arc<MessageBus>, cancel: CancellationToken) {
    info!("echo responder started");
    loop {
        let inbound = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            msg = bus.consume_inbound() => match msg {
                Some(msg) => msg,
                None => break,
            },
        };

        debug!(
            channel = %inbound.channel,
            chat_id = %inbound.chat_id,
            "echoing inbound message"
        );
        let reply = inbound.reply(inbound.content.clone());
        if let Err(e) = bus.publish_outbound(reply).await {
            error!(error = %e, "failed to publish echo reply");
        }
    }
    info!("echo responder stopped");
}
