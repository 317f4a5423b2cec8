//! `SYS` subsystem: reset, ping, version, tx power, NVRAM access.

use crate::mt::command::{mt_areq, mt_areq_out, mt_payload, mt_sreq};
use crate::mt::header::Subsystem;
use crate::mt::types::{mt_enum, ResetReason, ResetType, ShortBytes, Status, Wire};

mt_enum!(BootloaderBuildType: u8 {
    NonBootloaderBuild = 0x00,
    BootloaderBuild = 0x01,
});

mt_payload! {
    /// `SYS.ResetReq` — fire-and-forget; the coprocessor answers with the
    /// separate `SYS.ResetInd` AREQ, never an SRSP.
    pub struct ResetReq {
        pub reset_type: ResetType,
    }
}
mt_areq_out!(Subsystem::Sys, 0x00, ResetReq);

mt_payload! {
    pub struct ResetInd {
        pub reason: ResetReason,
        pub transport_rev: u8,
        pub product_id: u8,
        pub major_rel: u8,
        pub minor_rel: u8,
        pub maint_rel: u8,
    }
}
mt_areq!(Subsystem::Sys, 0x80, ResetInd);

mt_payload! {
    pub struct PingReq {}
}
mt_payload! {
    pub struct PingRsp {
        pub capabilities: crate::mt::types::MtCapabilities,
    }
}
mt_sreq!(Subsystem::Sys, 0x01, PingReq, PingRsp);

mt_payload! {
    pub struct VersionReq {}
}
mt_payload! {
    pub struct VersionRsp {
        pub transport_rev: u8,
        pub product_id: u8,
        pub major_rel: u8,
        pub minor_rel: u8,
        pub maint_rel: u8,
        pub code_revision: u32,
        pub bootloader_build_type: BootloaderBuildType,
        pub bootloader_revision: u32,
    }
}
mt_sreq!(Subsystem::Sys, 0x02, VersionReq, VersionRsp);

mt_payload! {
    pub struct SetTxPowerReq {
        pub tx_power: u8,
    }
}
mt_payload! {
    pub struct SetTxPowerRsp {
        pub tx_power: u8,
    }
}
mt_sreq!(Subsystem::Sys, 0x25, SetTxPowerReq, SetTxPowerRsp);

mt_payload! {
    pub struct OsalNvReadReq {
        pub id: u16,
        pub offset: u8,
    }
}
mt_payload! {
    pub struct OsalNvReadRsp {
        pub status: Status,
        pub value: ShortBytes,
    }
}
mt_sreq!(Subsystem::Sys, 0x08, OsalNvReadReq, OsalNvReadRsp);

mt_payload! {
    pub struct OsalNvWriteReq {
        pub id: u16,
        pub offset: u8,
        pub value: ShortBytes,
    }
}
mt_payload! {
    pub struct OsalNvWriteRsp {
        pub status: Status,
    }
}
mt_sreq!(Subsystem::Sys, 0x09, OsalNvWriteReq, OsalNvWriteRsp);
