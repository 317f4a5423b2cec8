//! The controller: the session state machine sitting on top of [`Mux`] that
//! turns raw MT frames into the operations a caller actually wants —
//! startup, network reconfiguration, data delivery, permit-join, device
//! removal — and projects unsolicited AREQs onto [`ControllerHandler`].
//!
//! A `Controller` owns no transport of its own; it asks its [`Connect`] for
//! one whenever it needs a session (first connect, reconnect after loss, or
//! a one-off probe) and re-derives everything session-scoped (the `Mux`, the
//! registered callbacks) each time one opens.

mod callbacks;
pub mod connect;
mod data;
mod error;
mod network;
mod nv;
mod startup;

pub use connect::{Connect, SerialConnector};
pub use error::ControllerError;
pub use network::UpdateNetworkParams;

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex as AsyncMutex, RwLock};
use tokio::task::JoinHandle;

use crate::config::{DeviceConfig, EndpointConfig};
use crate::device::{ControllerHandler, Device};
use crate::mt::types::{Channels, Eui64, ExtendedPanId, Nwk, PanId, Status};
use crate::mux::{ListenerHandle, Mux};
use crate::transport::Transport;

/// Network parameters learned from the coprocessor during startup and kept
/// current across `update_network` calls.
#[derive(Debug, Clone, Default)]
pub struct NetworkState {
    pub own_nwk: Option<Nwk>,
    pub own_ieee: Option<Eui64>,
    pub channel: Option<u8>,
    pub channels: Option<Channels>,
    pub pan_id: Option<PanId>,
    pub extended_pan_id: Option<ExtendedPanId>,
}

struct Session<T: Transport> {
    mux: Arc<Mux<T>>,
    #[allow(dead_code)] // kept so the persistent callbacks outlive the session, not unregistered early
    callback_handles: Vec<ListenerHandle>,
}

struct Inner<C: Connect> {
    connector: C,
    handler: Arc<dyn ControllerHandler>,
    device: RwLock<DeviceConfig>,
    endpoints: Vec<EndpointConfig>,
    session: RwLock<Option<Session<C::Transport>>>,
    network: RwLock<NetworkState>,
    reconnect_task: AsyncMutex<Option<JoinHandle<()>>>,
    shutting_down: AtomicBool,
    next_tsn: AtomicU8,
}

/// Handle to a running (or not-yet-started) coprocessor session. Cheap to
/// clone — every clone shares the same session state.
pub struct Controller<C: Connect> {
    inner: Arc<Inner<C>>,
}

impl<C: Connect> Clone for Controller<C> {
    fn clone(&self) -> Self {
        Controller {
            inner: self.inner.clone(),
        }
    }
}

impl<C: Connect> Controller<C> {
    pub fn new(
        connector: C,
        device: DeviceConfig,
        endpoints: Vec<EndpointConfig>,
        handler: Arc<dyn ControllerHandler>,
    ) -> Self {
        Controller {
            inner: Arc::new(Inner {
                connector,
                handler,
                device: RwLock::new(device),
                endpoints,
                session: RwLock::new(None),
                network: RwLock::new(NetworkState::default()),
                reconnect_task: AsyncMutex::new(None),
                shutting_down: AtomicBool::new(false),
                next_tsn: AtomicU8::new(1),
            }),
        }
    }

    /// The network parameters learned at the last successful startup or
    /// `update_network`.
    pub async fn network(&self) -> NetworkState {
        self.inner.network.read().await.clone()
    }

    /// Bring the coprocessor up: reset, read its configuration, reconcile
    /// endpoints, and start BDB commissioning. If the coprocessor reports it
    /// was never configured and `auto_form` is set, forms a fresh
    /// coordinator network first and re-enters startup.
    pub async fn startup(&self, auto_form: bool) -> Result<(), ControllerError> {
        startup::run(self, auto_form).await
    }

    /// Form a fresh coordinator network on an already-open session, without
    /// running the rest of startup.
    pub async fn form_network(&self) -> Result<(), ControllerError> {
        let mux = self.ensure_session().await?;
        let timeout = self.inner.device.read().await.sreq_timeout();
        startup::form_network(&mux, timeout).await
    }

    /// Reconfigure the coprocessor's network parameters.
    pub async fn update_network(
        &self,
        params: UpdateNetworkParams,
    ) -> Result<(), ControllerError> {
        network::update_network(self, params).await
    }

    /// Send application data to `device`, or intercept it as a ZDO
    /// management command when both endpoints are zero.
    #[allow(clippy::too_many_arguments)]
    pub async fn request(
        &self,
        device: Device,
        profile: u16,
        cluster: u16,
        src_ep: u8,
        dst_ep: u8,
        sequence: u8,
        data: Vec<u8>,
        use_ieee: bool,
    ) -> Result<(Status, String), ControllerError> {
        data::request(
            self, device, profile, cluster, src_ep, dst_ep, sequence, data, use_ieee,
        )
        .await
    }

    /// Open the network to joins for `time_s` seconds, optionally targeted
    /// at a single already-known `node`.
    pub async fn permit(&self, time_s: u8, node: Option<Device>) -> Result<(), ControllerError> {
        data::permit(self, time_s, node).await
    }

    /// Force a device off the network.
    pub async fn remove(&self, ieee: Eui64) -> Result<(), ControllerError> {
        data::remove(self, ieee).await
    }

    /// `SYS.Ping`-probe a candidate device path without disturbing any
    /// currently-open session.
    pub async fn probe(&self, path: &str) -> bool {
        let baud = self.inner.device.read().await.baud;
        connect::probe(&self.inner.connector, path, baud).await
    }

    /// Close the current session, if any, and cancel any in-progress
    /// reconnect attempt. `ControllerHandler::connection_lost(None)` fires
    /// for a session that was actually open, mirroring a clean close.
    pub async fn shutdown(&self) {
        self.inner.shutting_down.store(true, Ordering::SeqCst);
        if let Some(handle) = self.inner.reconnect_task.lock().await.take() {
            handle.abort();
        }
        if self.inner.session.write().await.take().is_some() {
            self.inner.handler.connection_lost(None);
        }
    }

    async fn session(&self) -> Result<Arc<Mux<C::Transport>>, ControllerError> {
        self.inner
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.mux.clone())
            .ok_or(ControllerError::NotConnected)
    }

    async fn ensure_session(&self) -> Result<Arc<Mux<C::Transport>>, ControllerError> {
        if let Some(session) = self.inner.session.read().await.as_ref() {
            return Ok(session.mux.clone());
        }
        self.open_new_session().await
    }

    async fn open_new_session(&self) -> Result<Arc<Mux<C::Transport>>, ControllerError> {
        let (path, baud, skip_bootloader) = {
            let cfg = self.inner.device.read().await;
            (cfg.path.clone(), cfg.baud, cfg.skip_bootloader)
        };

        let resolved_path = if path == "auto" {
            let found = connect::auto_detect(&self.inner.connector, baud)
                .await
                .ok_or(ControllerError::NoPortFound)?;
            self.inner.device.write().await.path = found.clone();
            found
        } else {
            path
        };

        let transport = self
            .inner
            .connector
            .connect(&resolved_path, baud, skip_bootloader)
            .await?;
        let mux = Arc::new(Mux::spawn(transport));
        let callback_handles = callbacks::register(&mux, self.inner.handler.clone());

        *self.inner.session.write().await = Some(Session {
            mux: mux.clone(),
            callback_handles,
        });

        let watcher = self.clone();
        let mux_for_watch = mux.clone();
        tokio::task::spawn(async move {
            let mut closed = mux_for_watch.on_closed();
            let _ = closed.changed().await;
            watcher.handle_connection_lost().await;
        });

        Ok(mux)
    }

    async fn handle_connection_lost(&self) {
        if self.inner.shutting_down.load(Ordering::SeqCst) {
            return;
        }
        *self.inner.session.write().await = None;
        self.inner
            .handler
            .connection_lost(Some("coprocessor transport closed".to_string()));

        let controller = self.clone();
        let handle = tokio::task::spawn(async move {
            loop {
                let delay = controller
                    .inner
                    .device
                    .read()
                    .await
                    .auto_reconnect_retry_delay();
                tokio::time::sleep(delay).await;
                if controller.inner.shutting_down.load(Ordering::SeqCst) {
                    return;
                }
                if controller.startup(false).await.is_ok() {
                    return;
                }
            }
        });
        *self.inner.reconnect_task.lock().await = Some(handle);
    }
}
