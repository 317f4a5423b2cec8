//! Caller-facing value types and hook trait.
//!
//! The upper-layer Zigbee application/ZDO library this driver serves is
//! treated purely as the thing on the other side of [`ControllerHandler`].
//! `Device` is the opaque pass-through handle the controller exchanges with
//! that caller; this crate never builds a device database of its own.

use crate::mt::types::{Eui64, Nwk};

/// An opaque handle to a device the upper layer already knows about. The
/// controller only ever reads `nwk`/`ieee` off a `Device` it was handed or
/// looked up through [`ControllerHandler::get_device`] /
/// [`ControllerHandler::get_device_by_ieee`] — it keeps no device table of
/// its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Device {
    pub nwk: Nwk,
    pub ieee: Eui64,
}

/// Hooks the upper layer implements to receive controller callbacks and
/// answer controller lookups.
///
/// Every method here is synchronous: the controller calls these inline from
/// its single-threaded dispatch loop while handling an AREQ, so no listener
/// list needs locks and blocking I/O is forbidden on the event thread. An
/// upper layer that needs to do asynchronous work in response should hand it
/// off to its own task rather than blocking here.
pub trait ControllerHandler: Send + Sync {
    /// A device announced or joined the network (`ZDO.TCDevInd`).
    fn handle_join(&self, nwk: Nwk, ieee: Eui64, parent_nwk: Nwk);

    /// A device left the network (`ZDO.LeaveInd`).
    fn handle_leave(&self, nwk: Nwk, ieee: Eui64);

    /// An application message arrived for a known device (`AF.IncomingMsg`).
    /// `sender` is `None` when `get_device` could not resolve the source NWK
    /// address — the message is still reported, just without a resolved
    /// sender.
    fn handle_message(
        &self,
        sender: Option<Device>,
        profile: u16,
        cluster: u16,
        src_ep: u8,
        dst_ep: u8,
        message: Vec<u8>,
    );

    /// Source-route relay list for a device changed (`ZDO.SrcRtgInd`).
    fn handle_relays(&self, dst_addr: Nwk, relays: Vec<Nwk>);

    /// Look up a device by its current NWK address.
    fn get_device(&self, nwk: Nwk) -> Option<Device>;

    /// Look up a device by its IEEE address, used by `remove(ieee)` to
    /// recover the NWK address `ZDO.MgmtLeaveReq` needs.
    fn get_device_by_ieee(&self, ieee: Eui64) -> Option<Device>;

    /// The transport was lost. `reason` is `None` on a clean `shutdown()`
    /// close and `Some(..)` on an unexpected I/O error, mirroring the
    /// Python original's `connection_lost(exc)` hook where `exc` is
    /// `None` on intentional close.
    fn connection_lost(&self, reason: Option<String>);
}
