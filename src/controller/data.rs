//! Application data delivery: `request`, `permit`, and `remove`.
//!
//! `request` takes one of two paths depending on endpoint: `src_ep == 0 &&
//! dst_ep == 0` means the caller is issuing a ZDO management command rather
//! than an application-layer one, and the controller maps it onto the small
//! set of typed ZDO SREQ/AREQ pairs the catalog knows about rather than a
//! generic `AF.DataRequestExt`. Every other endpoint pair goes through
//! `AF.DataRequestExt` and its `AF.DataConfirm` correlation by
//! `(endpoint, tsn)`.

use std::sync::atomic::Ordering;

use crate::device::Device;
use crate::mt::command::Matcher;
use crate::mt::commands::af::{DataConfirm, DataRequestExtReq, DataRequestExtRsp};
use crate::mt::commands::zdo::{
    ActiveEpReq, ActiveEpReqRsp, ActiveEpRsp, MgmtLeaveReq, MgmtLeaveReqRsp, MgmtLeaveRsp,
    MgmtPermitJoinReq, MgmtPermitJoinReqRsp, MgmtPermitJoinRsp,
};
use crate::mt::types::{AddrModeAddress, Eui64, Nwk, ShortBytes, Status, ZdoStatus};
use crate::mux::Mux;
use crate::transport::Transport;

use super::connect::Connect;
use super::error::ControllerError;
use super::Controller;

/// `AF.DataRequestExt`'s default source-route search radius.
const DEFAULT_RADIUS: u8 = 30;

const ZDO_CLUSTER_ACTIVE_EP: u16 = 0x0005;
const ZDO_CLUSTER_MGMT_LEAVE: u16 = 0x0034;
const ZDO_CLUSTER_MGMT_PERMIT_JOIN: u16 = 0x0036;

fn zdo_status_to_status(status: ZdoStatus) -> Status {
    if status == ZdoStatus::Success {
        Status::Success
    } else {
        Status::Failure
    }
}

pub(super) async fn request<C: Connect>(
    controller: &Controller<C>,
    device: Device,
    _profile: u16,
    cluster: u16,
    src_ep: u8,
    dst_ep: u8,
    sequence: u8,
    data: Vec<u8>,
    use_ieee: bool,
) -> Result<(Status, String), ControllerError> {
    let mux = controller.session().await?;
    let timeout = controller.inner.device.read().await.sreq_timeout();
    let zdo_timeout = controller.inner.device.read().await.zdo_request_timeout();

    if src_ep == 0 && dst_ep == 0 {
        return zdo_request(&mux, device, cluster, zdo_timeout).await;
    }

    let dst_addr = if use_ieee {
        AddrModeAddress::Ieee(device.ieee)
    } else {
        AddrModeAddress::Nwk(device.nwk)
    };

    let req = DataRequestExtReq {
        dst_addr,
        dst_endpoint: dst_ep,
        dst_pan_id: 0,
        src_endpoint: src_ep,
        cluster_id: cluster,
        tsn: sequence,
        options: 0,
        radius: DEFAULT_RADIUS,
        data: ShortBytes(data),
    };
    let confirm_matcher: Matcher<DataConfirm> = Matcher::field_eq(dst_ep, |c: &DataConfirm| c.endpoint)
        .and(Matcher::field_eq(sequence, |c: &DataConfirm| c.tsn));

    let (rsp, confirm): (DataRequestExtRsp, DataConfirm) = mux
        .request_callback_rsp(req, timeout, confirm_matcher, timeout)
        .await?;
    if rsp.status != Status::Success {
        return Err(ControllerError::StatusFailure {
            operation: "AF.DataRequestExt",
            status: rsp.status,
        });
    }
    if confirm.status != Status::Success {
        return Err(ControllerError::DeliveryError(confirm.status));
    }
    Ok((confirm.status, String::new()))
}

async fn zdo_request<T: Transport>(
    mux: &Mux<T>,
    device: Device,
    cluster: u16,
    timeout: std::time::Duration,
) -> Result<(Status, String), ControllerError> {
    match cluster {
        ZDO_CLUSTER_ACTIVE_EP => {
            let (_rsp, callback): (ActiveEpReqRsp, ActiveEpRsp) = mux
                .request_callback_rsp(
                    ActiveEpReq {
                        dst_addr: device.nwk,
                        nwk_addr_of_interest: device.nwk,
                    },
                    timeout,
                    Matcher::field_eq(device.nwk, |r: &ActiveEpRsp| r.nwk_addr),
                    timeout,
                )
                .await?;
            Ok((zdo_status_to_status(callback.status), String::new()))
        }
        ZDO_CLUSTER_MGMT_LEAVE => {
            let (_rsp, callback): (MgmtLeaveReqRsp, MgmtLeaveRsp) = mux
                .request_callback_rsp(
                    MgmtLeaveReq {
                        dst_addr: device.nwk,
                        device_address: device.ieee,
                        remove_children_rejoin: 0,
                    },
                    timeout,
                    Matcher::field_eq(device.nwk, |r: &MgmtLeaveRsp| r.src_addr),
                    timeout,
                )
                .await?;
            Ok((zdo_status_to_status(callback.status), String::new()))
        }
        ZDO_CLUSTER_MGMT_PERMIT_JOIN => {
            let (_rsp, callback): (MgmtPermitJoinReqRsp, MgmtPermitJoinRsp) = mux
                .request_callback_rsp(
                    MgmtPermitJoinReq {
                        addr_mode: 0x02, // AddrMode::Nwk
                        dst_addr: device.nwk,
                        duration: 0,
                        tc_significance: 1,
                    },
                    timeout,
                    Matcher::field_eq(device.nwk, |r: &MgmtPermitJoinRsp| r.src_addr),
                    timeout,
                )
                .await?;
            Ok((zdo_status_to_status(callback.status), String::new()))
        }
        other => Err(ControllerError::ValidationError(format!(
            "ZDO cluster 0x{other:04x} has no MT command mapping in this driver's catalog"
        ))),
    }
}

pub(super) async fn permit<C: Connect>(
    controller: &Controller<C>,
    time_s: u8,
    node: Option<Device>,
) -> Result<(), ControllerError> {
    let mux = controller.session().await?;
    let timeout = controller.inner.device.read().await.sreq_timeout();
    let zdo_timeout = controller.inner.device.read().await.zdo_request_timeout();
    let tsn = controller.inner.next_tsn.fetch_add(1, Ordering::Relaxed);

    let broadcast_req = DataRequestExtReq {
        dst_addr: AddrModeAddress::Broadcast(0xfffc),
        dst_endpoint: 0,
        dst_pan_id: 0,
        src_endpoint: 0,
        cluster_id: ZDO_CLUSTER_MGMT_PERMIT_JOIN,
        tsn,
        options: 0,
        radius: DEFAULT_RADIUS,
        data: ShortBytes(vec![time_s, 0x01]),
    };
    let confirm_matcher: Matcher<DataConfirm> =
        Matcher::field_eq(0u8, |c: &DataConfirm| c.endpoint).and(Matcher::field_eq(tsn, |c: &DataConfirm| c.tsn));
    let (rsp, confirm): (DataRequestExtRsp, DataConfirm) = mux
        .request_callback_rsp(broadcast_req, timeout, confirm_matcher, timeout)
        .await?;
    if rsp.status != Status::Success || confirm.status != Status::Success {
        return Err(ControllerError::StatusFailure {
            operation: "AF.DataRequestExt(permit-join broadcast)",
            status: rsp.status,
        });
    }

    let dst_addr = node.map(|d| d.nwk).unwrap_or(Nwk(0x0000));
    let (_rsp2, notif): (MgmtPermitJoinReqRsp, MgmtPermitJoinRsp) = mux
        .request_callback_rsp(
            MgmtPermitJoinReq {
                addr_mode: 0x0f,
                dst_addr,
                duration: time_s,
                tc_significance: 1,
            },
            timeout,
            Matcher::any(),
            zdo_timeout,
        )
        .await?;
    if notif.status != ZdoStatus::Success {
        return Err(ControllerError::StatusFailure {
            operation: "ZDO.MgmtPermitJoinReq",
            status: zdo_status_to_status(notif.status),
        });
    }
    Ok(())
}

/// Regardless of whether the direct leave attempt (or the coordinator-
/// initiated fallback) succeeds, the upper layer is expected to evict the
/// device from its own table once this returns — so this never propagates a
/// leave failure as an error, only session-level failures (no transport
/// open) do.
pub(super) async fn remove<C: Connect>(
    controller: &Controller<C>,
    ieee: Eui64,
) -> Result<(), ControllerError> {
    let mux = controller.session().await?;
    let timeout = controller.inner.device.read().await.zdo_request_timeout();
    let device = controller
        .inner
        .handler
        .get_device_by_ieee(ieee)
        .ok_or_else(|| ControllerError::NoSuchDevice(ieee.to_string()))?;

    let direct = mux
        .request_callback_rsp::<MgmtLeaveReq, MgmtLeaveReqRsp, MgmtLeaveRsp>(
            MgmtLeaveReq {
                dst_addr: device.nwk,
                device_address: ieee,
                remove_children_rejoin: 0,
            },
            timeout,
            Matcher::field_eq(device.nwk, |r: &MgmtLeaveRsp| r.src_addr),
            timeout,
        )
        .await;

    let succeeded = matches!(&direct, Ok((rsp, _)) if rsp.status == Status::Success);
    if !succeeded {
        let _ = mux
            .request_callback_rsp::<MgmtLeaveReq, MgmtLeaveReqRsp, MgmtLeaveRsp>(
                MgmtLeaveReq {
                    dst_addr: Nwk(0x0000),
                    device_address: ieee,
                    remove_children_rejoin: 0,
                },
                timeout,
                Matcher::field_eq(Nwk(0x0000), |r: &MgmtLeaveRsp| r.src_addr),
                timeout,
            )
            .await;
    }

    Ok(())
}
