//! `ZDO` subsystem: network formation, device discovery and management.

use crate::mt::command::{mt_areq, mt_payload, mt_sreq};
use crate::mt::header::Subsystem;
use crate::mt::types::{mt_enum, Channels, Eui64, LvList, Nwk, PanId, Status, ZdoStatus};

mt_enum!(StartupFromAppStatus: u8 {
    RestoredNetworkState = 0x00,
    NewNetworkState = 0x01,
    NotStarted = 0x02,
});

mt_payload! {
    pub struct StartupFromAppReq {
        pub start_delay: u16,
    }
}
mt_payload! {
    pub struct StartupFromAppRsp {
        pub status: StartupFromAppStatus,
    }
}
mt_sreq!(
    Subsystem::Zdo,
    0x40,
    StartupFromAppReq,
    StartupFromAppRsp
);

mt_payload! {
    pub struct StateChangeInd {
        pub state: crate::mt::types::DeviceState,
    }
}
mt_areq!(Subsystem::Zdo, 0xc0, StateChangeInd);

mt_payload! {
    pub struct ActiveEpReq {
        pub dst_addr: Nwk,
        pub nwk_addr_of_interest: Nwk,
    }
}
mt_payload! {
    pub struct ActiveEpReqRsp {
        pub status: Status,
    }
}
mt_sreq!(Subsystem::Zdo, 0x05, ActiveEpReq, ActiveEpReqRsp);

mt_payload! {
    pub struct ActiveEpRsp {
        pub status: ZdoStatus,
        pub nwk_addr: Nwk,
        pub active_ep_list: LvList<u8>,
    }
}
mt_areq!(Subsystem::Zdo, 0x85, ActiveEpRsp);

mt_payload! {
    pub struct MgmtPermitJoinReq {
        pub addr_mode: u8,
        pub dst_addr: Nwk,
        pub duration: u8,
        pub tc_significance: u8,
    }
}
mt_payload! {
    pub struct MgmtPermitJoinReqRsp {
        pub status: Status,
    }
}
mt_sreq!(
    Subsystem::Zdo,
    0x36,
    MgmtPermitJoinReq,
    MgmtPermitJoinReqRsp
);

mt_payload! {
    pub struct MgmtPermitJoinRsp {
        pub src_addr: Nwk,
        pub status: ZdoStatus,
    }
}
mt_areq!(Subsystem::Zdo, 0xb6, MgmtPermitJoinRsp);

mt_payload! {
    pub struct MgmtLeaveReq {
        pub dst_addr: Nwk,
        pub device_address: Eui64,
        pub remove_children_rejoin: u8,
    }
}
mt_payload! {
    pub struct MgmtLeaveReqRsp {
        pub status: Status,
    }
}
mt_sreq!(Subsystem::Zdo, 0x34, MgmtLeaveReq, MgmtLeaveReqRsp);

mt_payload! {
    pub struct MgmtLeaveRsp {
        pub src_addr: Nwk,
        pub status: ZdoStatus,
    }
}
mt_areq!(Subsystem::Zdo, 0xb4, MgmtLeaveRsp);

mt_payload! {
    pub struct EndDeviceAnnceInd {
        pub src_addr: Nwk,
        pub nwk_addr: Nwk,
        pub ieee_addr: Eui64,
        pub capabilities: u8,
    }
}
mt_areq!(Subsystem::Zdo, 0xc1, EndDeviceAnnceInd);

mt_payload! {
    pub struct TcDevInd {
        pub src_nwk: Nwk,
        pub src_ieee: Eui64,
        pub parent_nwk: Nwk,
    }
}
mt_areq!(Subsystem::Zdo, 0xca, TcDevInd);

mt_payload! {
    pub struct LeaveInd {
        pub src_addr: Nwk,
        pub ext_addr: Eui64,
        pub request: bool,
        pub remove: bool,
        pub rejoin: bool,
    }
}
mt_areq!(Subsystem::Zdo, 0xc9, LeaveInd);

mt_payload! {
    pub struct SrcRtgInd {
        pub dst_addr: Nwk,
        pub relay_list: LvList<Nwk>,
    }
}
mt_areq!(Subsystem::Zdo, 0xc4, SrcRtgInd);

mt_payload! {
    pub struct MgmtNwkUpdateReq {
        pub dst_addr: Nwk,
        pub dst_addr_mode: u8,
        pub channel_mask: Channels,
        pub scan_duration: u8,
        pub scan_count: u8,
        pub nwk_manager_addr: Nwk,
    }
}
mt_payload! {
    pub struct MgmtNwkUpdateReqRsp {
        pub status: Status,
    }
}
mt_sreq!(
    Subsystem::Zdo,
    0x37,
    MgmtNwkUpdateReq,
    MgmtNwkUpdateReqRsp
);

mt_payload! {
    pub struct GetEpidReq {}
}
mt_payload! {
    pub struct GetEpidRsp {
        pub ieee_addr: Eui64,
    }
}
mt_sreq!(Subsystem::Zdo, 0x3e, GetEpidReq, GetEpidRsp);

mt_payload! {
    pub struct NwkAddrOfInterestReq {
        pub pan_id: PanId,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mt::command::{Decodable, Sendable};
    use crate::mt::types::Wire;

    #[test]
    fn active_ep_rsp_endpoints_decode_in_wire_order() {
        let mut buf = Vec::new();
        ZdoStatus::Success.write(&mut buf);
        Nwk(0x1234).write(&mut buf);
        let eps: LvList<u8> = vec![100u8, 13, 12, 11, 8, 1].into();
        eps.write(&mut buf);

        let frame = crate::mt::frame::GeneralFrame::new(ActiveEpRsp::header(), buf);
        let rsp = ActiveEpRsp::from_frame(&frame).unwrap();
        assert_eq!(rsp.active_ep_list.0, vec![100, 13, 12, 11, 8, 1]);
        assert_eq!(rsp.nwk_addr, Nwk(0x1234));
    }

    #[test]
    fn active_ep_req_uses_dst_equal_to_nwk_addr_of_interest() {
        let req = ActiveEpReq {
            dst_addr: Nwk(0x0000),
            nwk_addr_of_interest: Nwk(0x0000),
        };
        let frame = req.to_frame();
        assert_eq!(frame.header, ActiveEpReq::header());
    }

    #[test]
    fn mgmt_permit_join_rsp_matches_on_src_addr() {
        use crate::mt::command::Matcher;

        let ind = MgmtPermitJoinRsp {
            src_addr: Nwk(0x0000),
            status: ZdoStatus::Success,
        };
        let m: Matcher<MgmtPermitJoinRsp> = Matcher::field_eq(Nwk(0x0000), |i| i.src_addr);
        assert!(m.matches(&ind));
    }
}
