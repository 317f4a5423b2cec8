//! `SYS.OSALNVRead`/`SYS.OSALNVWrite` helpers shared by `startup` and
//! `network`: every NVRAM access the controller makes goes through one of
//! these two functions so the status-check is written once.

use std::time::Duration;

use crate::mt::commands::sys::{OsalNvReadReq, OsalNvReadRsp, OsalNvWriteReq, OsalNvWriteRsp};
use crate::mt::types::{ShortBytes, Status};
use crate::mux::Mux;
use crate::nvram::NvId;
use crate::transport::Transport;

use super::error::ControllerError;

pub(super) async fn read<T: Transport>(
    mux: &Mux<T>,
    id: NvId,
    timeout: Duration,
) -> Result<ShortBytes, ControllerError> {
    let rsp: OsalNvReadRsp = mux
        .request(
            OsalNvReadReq {
                id: id.id(),
                offset: 0,
            },
            timeout,
        )
        .await?;
    if rsp.status != Status::Success {
        return Err(ControllerError::StatusFailure {
            operation: "SYS.OSALNVRead",
            status: rsp.status,
        });
    }
    Ok(rsp.value)
}

pub(super) async fn write<T: Transport>(
    mux: &Mux<T>,
    id: NvId,
    value: Vec<u8>,
    timeout: Duration,
) -> Result<(), ControllerError> {
    let rsp: OsalNvWriteRsp = mux
        .request(
            OsalNvWriteReq {
                id: id.id(),
                offset: 0,
                value: ShortBytes(value),
            },
            timeout,
        )
        .await?;
    if rsp.status != Status::Success {
        return Err(ControllerError::StatusFailure {
            operation: "SYS.OSALNVWrite",
            status: rsp.status,
        });
    }
    Ok(())
}
