//! zstack-mtd - host-side driver daemon for a TI Z-Stack coprocessor
//!
//! Usage:
//!   zstack-mtd <CONFIG>
//!
//! Example:
//!   zstack-mtd /etc/zstack-mtd.toml

use std::env;
use std::sync::Arc;

use anyhow::{Context, Result};

use zstack_mt::mt::types::{Eui64, Nwk};
use zstack_mt::{Config, ControllerHandler, Device, SerialConnector};

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <CONFIG>", args[0]);
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  CONFIG    Path to configuration file (TOML)");
        eprintln!();
        eprintln!("Environment:");
        eprintln!("  RUST_LOG  Log level (trace, debug, info, warn, error)");
        std::process::exit(1);
    }

    let config_path = &args[1];

    let config = Config::load(config_path)
        .with_context(|| format!("failed to load config from {}", config_path))?;

    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    log::info!("zstack-mtd v{}", env!("CARGO_PKG_VERSION"));
    log::info!("loaded configuration from {}", config_path);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?
        .block_on(run(config))
}

async fn run(config: Config) -> Result<()> {
    let handler = Arc::new(LoggingHandler);
    let controller = zstack_mt::Controller::new(
        SerialConnector,
        config.znp.device,
        config.znp.endpoints,
        handler,
    );

    log::info!("starting coprocessor session");
    controller
        .startup(true)
        .await
        .context("coprocessor startup failed")?;

    let network = controller.network().await;
    log::info!(
        "network up: nwk={:?} channel={:?} pan_id={:?}",
        network.own_nwk,
        network.channel,
        network.pan_id
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to wait for ctrl-c")?;
    log::info!("shutting down");
    controller.shutdown().await;
    Ok(())
}

/// A `ControllerHandler` that only logs: this binary has no upper-layer
/// Zigbee application of its own, so it can't resolve `get_device` lookups
/// or do anything useful with join/leave/message callbacks beyond reporting
/// them. A real deployment links this crate as a library and supplies its
/// own handler backed by a device table.
struct LoggingHandler;

impl ControllerHandler for LoggingHandler {
    fn handle_join(&self, nwk: Nwk, ieee: Eui64, parent_nwk: Nwk) {
        log::info!("device joined: nwk={nwk:?} ieee={ieee} parent={parent_nwk:?}");
    }

    fn handle_leave(&self, nwk: Nwk, ieee: Eui64) {
        log::info!("device left: nwk={nwk:?} ieee={ieee}");
    }

    fn handle_message(
        &self,
        sender: Option<Device>,
        profile: u16,
        cluster: u16,
        src_ep: u8,
        dst_ep: u8,
        message: Vec<u8>,
    ) {
        log::debug!(
            "message from {sender:?}: profile=0x{profile:04x} cluster=0x{cluster:04x} \
             src_ep={src_ep} dst_ep={dst_ep} len={}",
            message.len()
        );
    }

    fn handle_relays(&self, dst_addr: Nwk, relays: Vec<Nwk>) {
        log::debug!("source route to {dst_addr:?}: {relays:?}");
    }

    fn get_device(&self, _nwk: Nwk) -> Option<Device> {
        None
    }

    fn get_device_by_ieee(&self, _ieee: Eui64) -> Option<Device> {
        None
    }

    fn connection_lost(&self, reason: Option<String>) {
        match reason {
            Some(reason) => log::warn!("coprocessor connection lost: {reason}"),
            None => log::info!("coprocessor connection closed"),
        }
    }
}
