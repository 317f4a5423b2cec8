//! How the controller turns a configured device path into an open
//! [`Transport`], and the probing/auto-detect logic built on top of it.
//!
//! The controller is generic over [`Connect`] rather than directly over a
//! `Transport` type: `startup` may need to open a *fresh* transport (initial
//! connect, reconnect, or auto-detect probing), and a bare `Transport` value
//! has nothing that can do that. `SerialConnector` is the only production
//! implementation; tests supply an in-memory one backed by
//! `tokio::io::duplex`.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::mt::command::Matcher;
use crate::mt::commands::sys::{PingReq, PingRsp};
use crate::mux::Mux;
use crate::transport::{open_serial, Transport, TransportError};

/// How long [`probe`] waits for a `SYS.Ping` reply before giving up on a
/// candidate port.
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(500);

type BoxFuture<'a, O> = Pin<Box<dyn Future<Output = O> + Send + 'a>>;

/// Opens a transport to a named device path. Implemented once for the real
/// serial backend; tests implement it against an in-memory duplex stream so
/// `controller::startup`, reconnect, and probing are all testable without a
/// real port.
pub trait Connect: Send + Sync + 'static {
    type Transport: Transport;

    fn connect(
        &self,
        path: &str,
        baud: u32,
        skip_bootloader: bool,
    ) -> BoxFuture<'_, Result<Self::Transport, TransportError>>;

    /// Enumerate candidate device paths for auto-detect. The default serial
    /// backend lists actual serial ports; a test connector can return a
    /// fixed list of fake names.
    fn enumerate(&self) -> Result<Vec<String>, TransportError> {
        Ok(Vec::new())
    }
}

/// The production [`Connect`] implementation: opens a real `tokio-serial`
/// port.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialConnector;

impl Connect for SerialConnector {
    type Transport = tokio_serial::SerialStream;

    fn connect(
        &self,
        path: &str,
        baud: u32,
        skip_bootloader: bool,
    ) -> BoxFuture<'_, Result<Self::Transport, TransportError>> {
        let path = path.to_string();
        Box::pin(async move { open_serial(&path, baud, skip_bootloader).await })
    }

    fn enumerate(&self) -> Result<Vec<String>, TransportError> {
        let ports = tokio_serial::available_ports().map_err(|source| TransportError::Open {
            path: "(enumerate)".to_string(),
            source,
        })?;
        Ok(ports.into_iter().map(|p| p.port_name).collect())
    }
}

/// Attempt a connect + `SYS.Ping` SREQ with a short timeout; `true` iff the
/// ping completes successfully. The probe transport is discarded afterward
/// regardless of outcome — this never leaves a lingering session behind.
pub async fn probe<C: Connect>(connector: &C, path: &str, baud: u32) -> bool {
    let transport = match connector.connect(path, baud, false).await {
        Ok(t) => t,
        Err(_) => return false,
    };
    let mux = Mux::spawn(transport);
    mux.request::<PingReq, PingRsp>(PingReq {}, PROBE_TIMEOUT)
        .await
        .is_ok()
}

/// Build a one-shot matcher-based probe for use from within an already-open
/// session (unused by `probe` itself, but documents the pattern the startup
/// flow reuses for awaiting `PingRsp` without a predicate).
pub fn any_ping_rsp() -> Matcher<PingRsp> {
    Matcher::any()
}

/// Iterate over enumerated serial ports and return the first that answers a
/// `SYS.Ping` probe. Does not write the winning path back into the live
/// config — the caller (`Controller::startup`) does that once it knows the
/// probe succeeded against the config it will go on to use.
pub async fn auto_detect<C: Connect>(connector: &C, baud: u32) -> Option<String> {
    let ports = connector.enumerate().ok()?;
    for path in ports {
        if probe(connector, &path, baud).await {
            return Some(path);
        }
    }
    None
}
