//! Persistent AREQ projections onto [`ControllerHandler`].
//!
//! Registered once per session, right after the transport opens, and left in
//! place for the session's lifetime. None of these ever unregister
//! themselves the way a `wait_for` one-shot does — they live until the
//! `Mux` itself is dropped.

use std::sync::Arc;

use crate::device::{ControllerHandler, Device};
use crate::mt::command::Matcher;
use crate::mt::commands::af::IncomingMsg;
use crate::mt::commands::zdo::{EndDeviceAnnceInd, LeaveInd, SrcRtgInd, TcDevInd};
use crate::mux::{ListenerHandle, Mux};
use crate::transport::Transport;

/// The Home Automation profile id: `AF.IncomingMsg` doesn't carry a profile
/// field of its own (the coprocessor implies it from the receiving
/// endpoint's own registration), so the driver reports the one profile its
/// endpoints are ever registered under.
pub const HA_PROFILE_ID: u16 = 0x0104;

pub(super) fn register<T: Transport>(
    mux: &Mux<T>,
    handler: Arc<dyn ControllerHandler>,
) -> Vec<ListenerHandle> {
    let mut handles = Vec::with_capacity(5);

    let h = handler.clone();
    handles.push(mux.callback_for_response::<SrcRtgInd>(Matcher::any(), move |ind| {
        h.handle_relays(ind.dst_addr, ind.relay_list.0.clone());
    }));

    let h = handler.clone();
    handles.push(mux.callback_for_response::<EndDeviceAnnceInd>(
        Matcher::any(),
        move |ind| {
            h.handle_join(ind.nwk_addr, ind.ieee_addr, ind.src_addr);
        },
    ));

    let h = handler.clone();
    handles.push(mux.callback_for_response::<TcDevInd>(Matcher::any(), move |ind| {
        h.handle_join(ind.src_nwk, ind.src_ieee, ind.parent_nwk);
    }));

    let h = handler.clone();
    handles.push(mux.callback_for_response::<LeaveInd>(Matcher::any(), move |ind| {
        h.handle_leave(ind.src_addr, ind.ext_addr);
    }));

    handles.push(mux.callback_for_response::<IncomingMsg>(Matcher::any(), move |msg| {
        let sender: Option<Device> = handler.get_device(msg.src_addr);
        handler.handle_message(
            sender,
            HA_PROFILE_ID,
            msg.cluster_id,
            msg.src_endpoint,
            msg.dst_endpoint,
            msg.data.0.clone(),
        );
    }));

    handles
}
