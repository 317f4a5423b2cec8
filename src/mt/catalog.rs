//! Static `CommandHeader -> name` registry.
//!
//! Used only for diagnostics: logging an unrecognized inbound frame as a hex
//! dump tagged with whatever readable name we do have for its header, rather
//! than silently dropping it. Decoding a known command's payload never goes
//! through this table; each `Decodable` impl already knows its own header.

use super::header::CommandHeader;

macro_rules! catalog_entries {
    ($(($header:expr, $name:expr)),* $(,)?) => {
        pub fn command_name(header: CommandHeader) -> Option<&'static str> {
            match header.0 {
                $($header => Some($name),)*
                _ => None,
            }
        }
    };
}

catalog_entries! {
    (0x0041, "SYS.ResetReq"),
    (0x8041, "SYS.ResetInd"),
    (0x0121, "SYS.Ping"),
    (0x0161, "SYS.Ping.SRSP"),
    (0x0221, "SYS.Version"),
    (0x0261, "SYS.Version.SRSP"),
    (0x2521, "SYS.SetTxPower"),
    (0x2561, "SYS.SetTxPower.SRSP"),
    (0x0821, "SYS.OsalNvRead"),
    (0x0861, "SYS.OsalNvRead.SRSP"),
    (0x0921, "SYS.OsalNvWrite"),
    (0x0961, "SYS.OsalNvWrite.SRSP"),

    (0x0024, "AF.Register"),
    (0x0064, "AF.Register.SRSP"),
    (0x0324, "AF.Delete"),
    (0x0364, "AF.Delete.SRSP"),
    (0x0224, "AF.DataRequestExt"),
    (0x0264, "AF.DataRequestExt.SRSP"),
    (0x8044, "AF.DataConfirm"),
    (0x8144, "AF.IncomingMsg"),

    (0x4025, "ZDO.StartupFromApp"),
    (0x4065, "ZDO.StartupFromApp.SRSP"),
    (0xc045, "ZDO.StateChangeInd"),
    (0x0525, "ZDO.ActiveEpReq"),
    (0x0565, "ZDO.ActiveEpReq.SRSP"),
    (0x8545, "ZDO.ActiveEpRsp"),
    (0x3625, "ZDO.MgmtPermitJoinReq"),
    (0x3665, "ZDO.MgmtPermitJoinReq.SRSP"),
    (0xb645, "ZDO.MgmtPermitJoinRsp"),
    (0x3425, "ZDO.MgmtLeaveReq"),
    (0x3465, "ZDO.MgmtLeaveReq.SRSP"),
    (0xb445, "ZDO.MgmtLeaveRsp"),
    (0xc145, "ZDO.EndDeviceAnnceInd"),
    (0xca45, "ZDO.TCDevInd"),
    (0xc945, "ZDO.LeaveInd"),
    (0xc445, "ZDO.SrcRtgInd"),
    (0x3725, "ZDO.MgmtNwkUpdateReq"),
    (0x3765, "ZDO.MgmtNwkUpdateReq.SRSP"),
    (0x3e25, "ZDO.GetEpid"),
    (0x3e65, "ZDO.GetEpid.SRSP"),

    (0x0027, "UTIL.GetDeviceInfo"),
    (0x0067, "UTIL.GetDeviceInfo.SRSP"),
    (0x1027, "UTIL.SetChannels"),
    (0x1067, "UTIL.SetChannels.SRSP"),
    (0x0227, "UTIL.SetPanId"),
    (0x0267, "UTIL.SetPanId.SRSP"),
    (0x0527, "UTIL.SetPreConfigKey"),
    (0x0567, "UTIL.SetPreConfigKey.SRSP"),

    (0x052f, "APPCFG.BdbStartCommissioning"),
    (0x056f, "APPCFG.BdbStartCommissioning.SRSP"),
    (0x082f, "APPCFG.BdbSetChannel"),
    (0x086f, "APPCFG.BdbSetChannel.SRSP"),
    (0x804f, "APPCFG.BdbCommissioningNotification"),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mt::command::Sendable;
    use crate::mt::commands::sys::PingReq;

    #[test]
    fn known_header_resolves_to_its_command_name() {
        assert_eq!(command_name(PingReq::header()), Some("SYS.Ping"));
    }

    #[test]
    fn unknown_header_resolves_to_none() {
        assert_eq!(command_name(CommandHeader(0xffff)), None);
    }
}
