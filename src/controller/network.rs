//! `update_network`: reconfigure the coprocessor's network parameters.
//!
//! Two behaviors observed across the original driver's revisions disagree on
//! whether a channel/PAN change should rewrite the NIB directly or rely on
//! the coprocessor's own channel-change machinery; this one follows the
//! NIB-rewriting revision (see `DESIGN.md`). Validation — `channel` must be a
//! member of `channels` — applies unconditionally, even when `reset` is
//! false and the call is otherwise a no-op, so a caller's mistake is caught
//! immediately rather than silently ignored.

use crate::mt::command::Matcher;
use crate::mt::commands::sys::{ResetInd, ResetReq};
use crate::mt::commands::util::{
    SetChannelsReq, SetChannelsRsp, SetPanIdReq, SetPanIdRsp, SetPreConfigKeyReq,
    SetPreConfigKeyRsp,
};
use crate::mt::commands::app_config::{BdbSetChannelReq, BdbSetChannelRsp};
use crate::mt::types::{Channels, ExtendedPanId, KeyData, PanId, ResetType, Status};
use crate::nvram::{self, Nib, NvId};

use super::connect::Connect;
use super::error::ControllerError;
use super::nv;
use super::Controller;

/// Parameters for [`Controller::update_network`]. Every field is optional:
/// only the ones present are touched, except `reset`, which gates whether
/// anything is written at all.
#[derive(Debug, Clone, Default)]
pub struct UpdateNetworkParams {
    pub channel: Option<u8>,
    pub channels: Option<Channels>,
    pub pan_id: Option<PanId>,
    pub extended_pan_id: Option<ExtendedPanId>,
    pub network_key: Option<KeyData>,
    pub reset: bool,
}

pub(super) async fn update_network<C: Connect>(
    controller: &Controller<C>,
    params: UpdateNetworkParams,
) -> Result<(), ControllerError> {
    match (params.channel, params.channels) {
        (Some(channel), Some(channels)) if !channels.contains(channel) => {
            return Err(ControllerError::ValidationError(format!(
                "channel {channel} is not a member of the requested channel mask"
            )));
        }
        (Some(_), None) => {
            return Err(ControllerError::ValidationError(
                "channel given without channels to validate it against".to_string(),
            ));
        }
        _ => {}
    }

    if !params.reset {
        if params.channel.is_some()
            || params.pan_id.is_some()
            || params.extended_pan_id.is_some()
            || params.network_key.is_some()
        {
            log::warn!(
                "update_network called with reset=false: parameters were validated but not applied"
            );
        }
        return Ok(());
    }

    let mux = controller.session().await?;
    let timeout = controller.inner.device.read().await.sreq_timeout();

    if let Some(channels) = params.channels {
        let rsp: SetChannelsRsp = mux.request(SetChannelsReq { channels }, timeout).await?;
        check_status(rsp.status, "UTIL.SetChannels")?;

        let rsp: BdbSetChannelRsp = mux
            .request(
                BdbSetChannelReq {
                    is_primary: true,
                    channel: channels,
                },
                timeout,
            )
            .await?;
        check_status(rsp.status, "AppConfig.BDBSetChannel(primary)")?;

        let rsp: BdbSetChannelRsp = mux
            .request(
                BdbSetChannelReq {
                    is_primary: false,
                    channel: Channels::NO_CHANNELS,
                },
                timeout,
            )
            .await?;
        check_status(rsp.status, "AppConfig.BDBSetChannel(secondary)")?;
    }

    if let Some(pan_id) = params.pan_id {
        let rsp: SetPanIdRsp = mux.request(SetPanIdReq { pan_id }, timeout).await?;
        check_status(rsp.status, "UTIL.SetPanId")?;
    }

    if let Some(extended_pan_id) = params.extended_pan_id {
        nv::write(
            &mux,
            NvId::ExtendedPanId,
            nvram::encode(&extended_pan_id),
            timeout,
        )
        .await?;
    }

    if let Some(network_key) = params.network_key {
        let rsp: SetPreConfigKeyRsp = mux
            .request(SetPreConfigKeyReq { key: network_key }, timeout)
            .await?;
        check_status(rsp.status, "UTIL.SetPreConfigKey")?;
        nv::write(&mux, NvId::PreCfgKeysEnable, nvram::encode(&true), timeout).await?;
    }

    let nib_bytes = nv::read(&mux, NvId::Nib, timeout).await?;
    let mut nib = Nib::from_bytes(nib_bytes.0)?;
    if let (Some(channel), Some(channels)) = (params.channel, params.channels) {
        nib.set_channel_fields(channel, channels);
    }
    nv::write(&mux, NvId::Nib, nib.into_bytes(), timeout).await?;

    let _ind: ResetInd = mux
        .send_and_wait(
            ResetReq {
                reset_type: ResetType::Soft,
            },
            Matcher::any(),
            timeout,
        )
        .await?;

    {
        let mut state = controller.inner.network.write().await;
        if let Some(channel) = params.channel {
            state.channel = Some(channel);
        }
        if let Some(channels) = params.channels {
            state.channels = Some(channels);
        }
        if let Some(pan_id) = params.pan_id {
            state.pan_id = Some(pan_id);
        }
        if let Some(extended_pan_id) = params.extended_pan_id {
            state.extended_pan_id = Some(extended_pan_id);
        }
    }

    Ok(())
}

fn check_status(status: Status, operation: &'static str) -> Result<(), ControllerError> {
    if status != Status::Success {
        return Err(ControllerError::StatusFailure { operation, status });
    }
    Ok(())
}
