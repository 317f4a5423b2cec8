//! `APPConfig` subsystem: Base Device Behavior commissioning control.

use crate::mt::command::{mt_areq, mt_payload, mt_sreq};
use crate::mt::header::Subsystem;
use crate::mt::types::{BdbCommissioningMode, BdbCommissioningStatus, Status};

mt_payload! {
    pub struct BdbStartCommissioningReq {
        pub mode: BdbCommissioningMode,
    }
}
mt_payload! {
    pub struct BdbStartCommissioningRsp {
        pub status: Status,
    }
}
mt_sreq!(
    Subsystem::AppConfig,
    0x05,
    BdbStartCommissioningReq,
    BdbStartCommissioningRsp
);

mt_payload! {
    pub struct BdbSetChannelReq {
        pub is_primary: bool,
        pub channel: crate::mt::types::Channels,
    }
}
mt_payload! {
    pub struct BdbSetChannelRsp {
        pub status: Status,
    }
}
mt_sreq!(
    Subsystem::AppConfig,
    0x08,
    BdbSetChannelReq,
    BdbSetChannelRsp
);

mt_payload! {
    pub struct BdbCommissioningNotification {
        pub status: BdbCommissioningStatus,
        pub mode: BdbCommissioningMode,
        pub remaining_modes: BdbCommissioningMode,
    }
}
mt_areq!(Subsystem::AppConfig, 0x80, BdbCommissioningNotification);
