//! The startup sequence: bring an opened transport up to a running network
//! session, forming a fresh network first if the coprocessor reports it was
//! never configured and the caller allows it.

use std::collections::HashSet;
use std::time::Duration;

use crate::config::EndpointConfig;
use crate::mt::command::Matcher;
use crate::mt::commands::af::{DeleteReq, DeleteRsp, RegisterReq, RegisterRsp};
use crate::mt::commands::app_config::{BdbStartCommissioningReq, BdbStartCommissioningRsp};
use crate::mt::commands::sys::{
    PingReq, PingRsp, ResetInd, ResetReq, SetTxPowerReq, SetTxPowerRsp, VersionReq, VersionRsp,
};
use crate::mt::commands::util::{GetDeviceInfoReq, GetDeviceInfoRsp};
use crate::mt::commands::zdo::{
    ActiveEpReq, ActiveEpReqRsp, ActiveEpRsp, StartupFromAppReq, StartupFromAppRsp,
    StateChangeInd,
};
use crate::mt::types::{BdbCommissioningMode, DeviceState, Nwk, ResetType, Status, Wire};
use crate::mux::Mux;
use crate::nvram::{self, HAS_CONFIGURED_SENTINEL};
use crate::nvram::{
    LogicalType, NvId, StartupOption, CONCENTRATOR_DISCOVERY, CONCENTRATOR_ENABLE,
    CONCENTRATOR_RADIUS, NWK_CHILD_AGE_ENABLE, SRC_RTG_EXPIRY_SECONDS,
};
use crate::transport::Transport;

use super::connect::Connect;
use super::error::ControllerError;
use super::nv;
use super::{Controller, NetworkState};

pub(super) async fn run<C: Connect>(
    controller: &Controller<C>,
    auto_form: bool,
) -> Result<(), ControllerError> {
    // Recursing through an `async fn` would produce an infinitely-sized
    // future; box the continuation so `form_network`'s "try again" loop
    // compiles.
    Box::pin(run_inner(controller, auto_form)).await
}

async fn run_inner<C: Connect>(
    controller: &Controller<C>,
    auto_form: bool,
) -> Result<(), ControllerError> {
    let mux = controller.ensure_session().await?;
    let sreq_timeout = controller.inner.device.read().await.sreq_timeout();
    let zdo_timeout = controller.inner.device.read().await.zdo_request_timeout();

    let _ind: ResetInd = mux
        .send_and_wait(
            ResetReq {
                reset_type: ResetType::Soft,
            },
            Matcher::any(),
            sreq_timeout,
        )
        .await?;

    let _ping: PingRsp = mux.request(PingReq {}, sreq_timeout).await?;
    let _version: VersionRsp = mux.request(VersionReq {}, sreq_timeout).await?;

    let configured = nv::read(&mux, NvId::HasConfiguredZStack3, sreq_timeout).await?;
    let is_configured = configured.0.first().copied() == Some(HAS_CONFIGURED_SENTINEL);
    if !is_configured {
        if !auto_form {
            return Err(ControllerError::NotConfigured);
        }
        form_network(&mux, sreq_timeout).await?;
        return Box::pin(run_inner(controller, auto_form)).await;
    }

    let nib_bytes = nv::read(&mux, NvId::Nib, sreq_timeout).await?;
    let nib = crate::nvram::Nib::from_bytes(nib_bytes.0)?;
    let channel = nib.channel();
    let channels = nib.channel_list();
    let pan_id = nib.pan_id();
    let extended_pan_id = nib.extended_pan_id();

    nv::write(
        &mux,
        NvId::ConcentratorEnable,
        vec![CONCENTRATOR_ENABLE],
        sreq_timeout,
    )
    .await?;
    nv::write(
        &mux,
        NvId::ConcentratorDiscovery,
        vec![CONCENTRATOR_DISCOVERY],
        sreq_timeout,
    )
    .await?;
    nv::write(
        &mux,
        NvId::ConcentratorRc,
        vec![CONCENTRATOR_RADIUS],
        sreq_timeout,
    )
    .await?;
    nv::write(
        &mux,
        NvId::SrcRtgExpiryTime,
        vec![SRC_RTG_EXPIRY_SECONDS],
        sreq_timeout,
    )
    .await?;
    nv::write(
        &mux,
        NvId::NwkChildAgeEnable,
        vec![NWK_CHILD_AGE_ENABLE],
        sreq_timeout,
    )
    .await?;

    if let Some(tx_power) = controller.inner.device.read().await.tx_power {
        let rsp: SetTxPowerRsp = mux.request(SetTxPowerReq { tx_power }, sreq_timeout).await?;
        log::debug!("tx power acked at {}", rsp.tx_power);
    }

    let info: GetDeviceInfoRsp = mux.request(GetDeviceInfoReq {}, sreq_timeout).await?;
    if info.status != Status::Success {
        return Err(ControllerError::StatusFailure {
            operation: "UTIL.GetDeviceInfo",
            status: info.status,
        });
    }

    let (_rsp, _state): (StartupFromAppRsp, StateChangeInd) = mux
        .request_callback_rsp(
            StartupFromAppReq { start_delay: 100 },
            sreq_timeout,
            Matcher::field_eq(DeviceState::StartedAsCoordinator, |i: &StateChangeInd| {
                i.state
            }),
            zdo_timeout,
        )
        .await?;

    reconcile_endpoints(&mux, &controller.inner.endpoints, sreq_timeout).await?;

    let _: (BdbStartCommissioningRsp, crate::mt::commands::app_config::BdbCommissioningNotification) =
        mux.request_callback_rsp(
            BdbStartCommissioningReq {
                mode: BdbCommissioningMode(BdbCommissioningMode::NwkFormation),
            },
            sreq_timeout,
            Matcher::any(),
            zdo_timeout,
        )
        .await?;

    *controller.inner.network.write().await = NetworkState {
        own_nwk: Some(info.short_addr),
        own_ieee: Some(info.ieee_addr),
        channel: Some(channel),
        channels: Some(channels),
        pan_id: Some(pan_id),
        extended_pan_id: Some(extended_pan_id),
    };

    Ok(())
}

async fn reconcile_endpoints<T: Transport>(
    mux: &Mux<T>,
    wanted: &[EndpointConfig],
    timeout: Duration,
) -> Result<(), ControllerError> {
    let (_rsp, active): (ActiveEpReqRsp, ActiveEpRsp) = mux
        .request_callback_rsp(
            ActiveEpReq {
                dst_addr: Nwk(0x0000),
                nwk_addr_of_interest: Nwk(0x0000),
            },
            timeout,
            Matcher::field_eq(Nwk(0x0000), |r: &ActiveEpRsp| r.nwk_addr),
            timeout,
        )
        .await?;

    let active_eps = active.active_ep_list.0;
    for ep in wanted {
        if !active_eps.contains(&ep.endpoint) {
            let rsp: RegisterRsp = mux
                .request(
                    RegisterReq {
                        endpoint: ep.endpoint,
                        app_profile_id: ep.profile_id,
                        app_device_id: ep.device_id,
                        add_dev_ver: ep.device_version,
                        latency_req: 0,
                        app_in_cluster_list: ep.input_clusters.clone().into(),
                        app_out_cluster_list: ep.output_clusters.clone().into(),
                    },
                    timeout,
                )
                .await?;
            if rsp.status != Status::Success {
                return Err(ControllerError::StatusFailure {
                    operation: "AF.Register",
                    status: rsp.status,
                });
            }
        }
    }

    let wanted_eps: HashSet<u8> = wanted.iter().map(|ep| ep.endpoint).collect();
    for ep in active_eps {
        if ep != 0 && !wanted_eps.contains(&ep) {
            let rsp: DeleteRsp = mux.request(DeleteReq { endpoint: ep }, timeout).await?;
            if rsp.status != Status::Success {
                return Err(ControllerError::StatusFailure {
                    operation: "AF.Delete",
                    status: rsp.status,
                });
            }
        }
    }

    Ok(())
}

/// Form a fresh coordinator network from scratch: clear the coprocessor's
/// saved state, mark it configured, and run BDB network formation followed
/// by steering. The caller re-enters `run` afterward to pick up where a
/// normally-configured coprocessor would have started.
pub(super) async fn form_network<T: Transport>(
    mux: &Mux<T>,
    timeout: Duration,
) -> Result<(), ControllerError> {
    nv::write(
        mux,
        NvId::StartupOption,
        nvram::encode(&StartupOption(StartupOption::ClearConfig | StartupOption::ClearState)),
        timeout,
    )
    .await?;
    nv::write(
        mux,
        NvId::LogicalType,
        nvram::encode(&LogicalType::Coordinator),
        timeout,
    )
    .await?;
    nv::write(
        mux,
        NvId::HasConfiguredZStack3,
        vec![HAS_CONFIGURED_SENTINEL],
        timeout,
    )
    .await?;
    nv::write(mux, NvId::ZdoDirectCb, nvram::encode(&true), timeout).await?;

    let (_rsp, _state): (BdbStartCommissioningRsp, StateChangeInd) = mux
        .request_callback_rsp(
            BdbStartCommissioningReq {
                mode: BdbCommissioningMode(BdbCommissioningMode::NwkFormation),
            },
            timeout,
            Matcher::field_eq(DeviceState::StartedAsCoordinator, |i: &StateChangeInd| {
                i.state
            }),
            timeout,
        )
        .await?;

    let _rsp2: BdbStartCommissioningRsp = mux
        .request(
            BdbStartCommissioningReq {
                mode: BdbCommissioningMode(BdbCommissioningMode::NwkSteering),
            },
            timeout,
        )
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Arc;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use crate::config::{DeviceConfig, EndpointConfig};
    use crate::controller::connect::Connect;
    use crate::controller::Controller;
    use crate::device::{ControllerHandler, Device};
    use crate::mt::command::{Decodable, Sendable};
    use crate::mt::commands::app_config::BdbCommissioningNotification;
    use crate::mt::commands::sys::BootloaderBuildType;
    use crate::mt::header::CommandHeader;
    use crate::mt::types::{
        BdbCommissioningStatus, Channels, Eui64, LvList, PanId, ShortBytes, StartupFromAppStatus,
        ZdoStatus,
    };
    use crate::mt::frame::{DecodeEvent, Decoder, GeneralFrame};
    use crate::nvram;
    use crate::transport::TransportError;

    use super::*;

    type BoxFuture<'a, O> = Pin<Box<dyn Future<Output = O> + Send + 'a>>;

    struct NoopHandler;
    impl ControllerHandler for NoopHandler {
        fn handle_join(&self, _: Nwk, _: Eui64, _: Nwk) {}
        fn handle_leave(&self, _: Nwk, _: Eui64) {}
        fn handle_message(
            &self,
            _: Option<Device>,
            _: u16,
            _: u16,
            _: u8,
            _: u8,
            _: Vec<u8>,
        ) {
        }
        fn handle_relays(&self, _: Nwk, _: Vec<Nwk>) {}
        fn get_device(&self, _: Nwk) -> Option<Device> {
            None
        }
        fn get_device_by_ieee(&self, _: Eui64) -> Option<Device> {
            None
        }
        fn connection_lost(&self, _: Option<String>) {}
    }

    /// `Connect` whose transport is wired to [`run_fake_coprocessor`], one
    /// fresh pair per `connect()` call.
    struct OneShot;

    impl Connect for OneShot {
        type Transport = tokio::io::DuplexStream;

        fn connect(
            &self,
            _path: &str,
            _baud: u32,
            _skip_bootloader: bool,
        ) -> BoxFuture<'_, Result<Self::Transport, TransportError>> {
            Box::pin(async move {
                let (client, server) = tokio::io::duplex(8192);
                tokio::task::spawn(run_fake_coprocessor(server));
                Ok(client)
            })
        }
    }

    async fn send(io: &mut tokio::io::DuplexStream, header: CommandHeader, payload: Vec<u8>) {
        let frame = GeneralFrame::new(header, payload);
        let _ = io.write_all(&frame.to_bytes().unwrap()).await;
    }

    /// Answers exactly the startup sequence this driver's catalog issues
    /// against a coprocessor that reports a pre-configured, previously-formed
    /// network with no endpoints registered yet — scenario 2 from the
    /// end-to-end test matrix (startup, pre-configured).
    async fn run_fake_coprocessor(mut io: tokio::io::DuplexStream) {
        let mut decoder = Decoder::new();
        let mut byte = [0u8; 1];
        loop {
            if io.read(&mut byte).await.unwrap_or(0) == 0 {
                return;
            }
            let frame = match decoder.push(byte[0]) {
                DecodeEvent::Frame(f) => f,
                _ => continue,
            };

            if frame.header == ResetReq::header() {
                let mut payload = Vec::new();
                crate::mt::types::ResetReason::PowerUp.write(&mut payload);
                0u8.write(&mut payload);
                0u8.write(&mut payload);
                2u8.write(&mut payload);
                7u8.write(&mut payload);
                1u8.write(&mut payload);
                send(&mut io, ResetInd::header(), payload).await;
            } else if frame.header == PingReq::header() {
                let mut payload = Vec::new();
                0x0659u16.write(&mut payload);
                send(&mut io, PingRsp::header(), payload).await;
            } else if frame.header == VersionReq::header() {
                let mut payload = Vec::new();
                2u8.write(&mut payload);
                1u8.write(&mut payload);
                2u8.write(&mut payload);
                7u8.write(&mut payload);
                1u8.write(&mut payload);
                0x0001_0203u32.write(&mut payload);
                BootloaderBuildType::NonBootloaderBuild.write(&mut payload);
                0u32.write(&mut payload);
                send(&mut io, VersionRsp::header(), payload).await;
            } else if frame.header == crate::mt::commands::sys::OsalNvReadReq::header() {
                let (req, _) =
                    crate::mt::commands::sys::OsalNvReadReq::read(&frame.payload).unwrap();
                let value = if req.id == nvram::NvId::HasConfiguredZStack3.id() {
                    vec![nvram::HAS_CONFIGURED_SENTINEL]
                } else if req.id == nvram::NvId::Nib.id() {
                    nvram::sample_nib_bytes()
                } else {
                    Vec::new()
                };
                let mut payload = Vec::new();
                Status::Success.write(&mut payload);
                ShortBytes(value).write(&mut payload);
                send(
                    &mut io,
                    crate::mt::commands::sys::OsalNvReadRsp::header(),
                    payload,
                )
                .await;
            } else if frame.header == crate::mt::commands::sys::OsalNvWriteReq::header() {
                let mut payload = Vec::new();
                Status::Success.write(&mut payload);
                send(
                    &mut io,
                    crate::mt::commands::sys::OsalNvWriteRsp::header(),
                    payload,
                )
                .await;
            } else if frame.header == GetDeviceInfoReq::header() {
                let mut payload = Vec::new();
                Status::Success.write(&mut payload);
                Eui64([0x22; 8]).write(&mut payload);
                Nwk(0x0000).write(&mut payload);
                0u8.write(&mut payload);
                DeviceState::StartedAsCoordinator.write(&mut payload);
                let assoc: LvList<Nwk> = Vec::new().into();
                assoc.write(&mut payload);
                send(&mut io, GetDeviceInfoRsp::header(), payload).await;
            } else if frame.header == StartupFromAppReq::header() {
                let mut payload = Vec::new();
                StartupFromAppStatus::RestoredNetworkState.write(&mut payload);
                send(&mut io, StartupFromAppRsp::header(), payload).await;

                let mut ind_payload = Vec::new();
                DeviceState::StartedAsCoordinator.write(&mut ind_payload);
                send(&mut io, StateChangeInd::header(), ind_payload).await;
            } else if frame.header == ActiveEpReq::header() {
                let mut payload = Vec::new();
                Status::Success.write(&mut payload);
                send(&mut io, ActiveEpReqRsp::header(), payload).await;

                let mut ind_payload = Vec::new();
                ZdoStatus::Success.write(&mut ind_payload);
                Nwk(0x0000).write(&mut ind_payload);
                let eps: LvList<u8> = Vec::new().into();
                eps.write(&mut ind_payload);
                send(&mut io, ActiveEpRsp::header(), ind_payload).await;
            } else if frame.header == RegisterReq::header() {
                let mut payload = Vec::new();
                Status::Success.write(&mut payload);
                send(&mut io, RegisterRsp::header(), payload).await;
            } else if frame.header == BdbStartCommissioningReq::header() {
                let mut payload = Vec::new();
                Status::Success.write(&mut payload);
                send(&mut io, BdbStartCommissioningRsp::header(), payload).await;

                let mut ind_payload = Vec::new();
                BdbCommissioningStatus::Success.write(&mut ind_payload);
                BdbCommissioningMode(BdbCommissioningMode::NwkFormation).write(&mut ind_payload);
                BdbCommissioningMode(0).write(&mut ind_payload);
                send(
                    &mut io,
                    BdbCommissioningNotification::header(),
                    ind_payload,
                )
                .await;
            }
        }
    }

    fn device_config() -> DeviceConfig {
        DeviceConfig {
            path: "/dev/ttyFAKE".to_string(),
            baud: 115_200,
            skip_bootloader: false,
            sreq_timeout_ms: 1_000,
            auto_reconnect_retry_delay_ms: 10,
            zdo_request_timeout_ms: 1_000,
            tx_power: None,
        }
    }

    #[tokio::test]
    async fn startup_pre_configured_reconciles_missing_endpoint_and_reports_network_state() {
        let endpoints = vec![EndpointConfig {
            endpoint: 1,
            profile_id: 260,
            device_id: 0x0100,
            device_version: 0,
            input_clusters: vec![0, 3, 4, 5, 6],
            output_clusters: vec![25],
        }];
        let controller = Controller::new(OneShot, device_config(), endpoints, Arc::new(NoopHandler));

        controller.startup(false).await.unwrap();

        let network = controller.network().await;
        assert_eq!(network.channel, Some(25));
        assert_eq!(network.channels, Some(Channels::from_channel_list(&[15, 20, 25])));
        assert_eq!(network.pan_id, Some(PanId(0xff00)));
        assert_eq!(
            network.extended_pan_id,
            Some(Eui64([0x00, 0x12, 0x4b, 0x00, 0x1c, 0xaa, 0xac, 0x5c]))
        );
        assert_eq!(network.own_nwk, Some(Nwk(0x0000)));
        assert_eq!(network.own_ieee, Some(Eui64([0x22; 8])));
    }
}
