//! `UTIL` subsystem: device info and network parameter configuration.

use crate::mt::command::{mt_payload, mt_sreq};
use crate::mt::header::Subsystem;
use crate::mt::types::{Channels, DeviceState, Eui64, LvList, Nwk, PanId, Status};

mt_payload! {
    pub struct GetDeviceInfoReq {}
}
mt_payload! {
    pub struct GetDeviceInfoRsp {
        pub status: Status,
        pub ieee_addr: Eui64,
        pub short_addr: Nwk,
        pub device_type: u8,
        pub device_state: DeviceState,
        pub assoc_devices_list: LvList<Nwk>,
    }
}
mt_sreq!(
    Subsystem::Util,
    0x00,
    GetDeviceInfoReq,
    GetDeviceInfoRsp
);

mt_payload! {
    pub struct SetChannelsReq {
        pub channels: Channels,
    }
}
mt_payload! {
    pub struct SetChannelsRsp {
        pub status: Status,
    }
}
mt_sreq!(Subsystem::Util, 0x10, SetChannelsReq, SetChannelsRsp);

mt_payload! {
    pub struct SetPanIdReq {
        pub pan_id: PanId,
    }
}
mt_payload! {
    pub struct SetPanIdRsp {
        pub status: Status,
    }
}
mt_sreq!(Subsystem::Util, 0x02, SetPanIdReq, SetPanIdRsp);

mt_payload! {
    pub struct SetPreConfigKeyReq {
        pub key: crate::mt::types::KeyData,
    }
}
mt_payload! {
    pub struct SetPreConfigKeyRsp {
        pub status: Status,
    }
}
mt_sreq!(
    Subsystem::Util,
    0x05,
    SetPreConfigKeyReq,
    SetPreConfigKeyRsp
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mt::command::Sendable;

    #[test]
    fn set_channels_req_serializes_channel_mask() {
        let req = SetChannelsReq {
            channels: Channels::from_channel_list(&[15, 20, 25]),
        };
        let frame = req.to_frame();
        assert_eq!(frame.payload.len(), 4);
        assert_eq!(frame.header, SetChannelsReq::header());
    }
}
