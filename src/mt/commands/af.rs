//! `AF` subsystem: endpoint registration and application data transfer.

use crate::mt::command::{mt_areq, mt_payload, mt_sreq};
use crate::mt::header::Subsystem;
use crate::mt::types::{AddrModeAddress, LvList, Nwk, ShortBytes, Status};

mt_payload! {
    pub struct RegisterReq {
        pub endpoint: u8,
        pub app_profile_id: u16,
        pub app_device_id: u16,
        pub add_dev_ver: u8,
        pub latency_req: u8,
        pub app_in_cluster_list: LvList<u16>,
        pub app_out_cluster_list: LvList<u16>,
    }
}
mt_payload! {
    pub struct RegisterRsp {
        pub status: Status,
    }
}
mt_sreq!(Subsystem::Af, 0x00, RegisterReq, RegisterRsp);

mt_payload! {
    pub struct DeleteReq {
        pub endpoint: u8,
    }
}
mt_payload! {
    pub struct DeleteRsp {
        pub status: Status,
    }
}
mt_sreq!(Subsystem::Af, 0x03, DeleteReq, DeleteRsp);

mt_payload! {
    pub struct DataRequestExtReq {
        pub dst_addr: AddrModeAddress,
        pub dst_endpoint: u8,
        pub dst_pan_id: u16,
        pub src_endpoint: u8,
        pub cluster_id: u16,
        pub tsn: u8,
        pub options: u8,
        pub radius: u8,
        pub data: ShortBytes,
    }
}
mt_payload! {
    pub struct DataRequestExtRsp {
        pub status: Status,
    }
}
mt_sreq!(
    Subsystem::Af,
    0x02,
    DataRequestExtReq,
    DataRequestExtRsp
);

mt_payload! {
    pub struct DataConfirm {
        pub status: Status,
        pub endpoint: u8,
        pub tsn: u8,
    }
}
mt_areq!(Subsystem::Af, 0x80, DataConfirm);

mt_payload! {
    pub struct IncomingMsg {
        pub group_id: u16,
        pub cluster_id: u16,
        pub src_addr: Nwk,
        pub src_endpoint: u8,
        pub dst_endpoint: u8,
        pub was_broadcast: bool,
        pub link_quality: u8,
        pub security_use: bool,
        pub time_stamp: u32,
        pub tsn: u8,
        pub data: ShortBytes,
    }
}
mt_areq!(Subsystem::Af, 0x81, IncomingMsg);
