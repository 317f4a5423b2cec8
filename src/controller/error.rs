//! Errors the controller-facing operations can raise.

use thiserror::Error;

use crate::mt::types::{Status, TypeError};
use crate::mux::MuxError;
use crate::nvram::NibError;
use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Mux(#[from] MuxError),

    #[error(transparent)]
    Nib(#[from] NibError),

    #[error(transparent)]
    Type(#[from] TypeError),

    /// An operation was attempted with no coprocessor session open.
    #[error("no coprocessor session is open")]
    NotConnected,

    /// A startup/configuration SREQ's `Status` field came back non-Success.
    /// Distinct from [`ControllerError::Mux`]'s `Timeout`/`TransportClosed`:
    /// the frame decoded fine, it just reported failure.
    #[error("{operation} failed with status {status:?}")]
    StatusFailure { operation: &'static str, status: Status },

    /// `AF.DataConfirm.Status != Success`.
    #[error("delivery failed with status {0:?}")]
    DeliveryError(Status),

    /// Startup aborted: coprocessor lacks `HAS_CONFIGURED_ZSTACK3` and the
    /// caller asked for `auto_form=false`.
    #[error("coprocessor is not configured and auto_form is disabled")]
    NotConfigured,

    /// Construction-time validation failure, e.g. `channel` not a member of
    /// `channels` in `update_network`.
    #[error("{0}")]
    ValidationError(String),

    /// The upper layer's `get_device`/`get_device_by_ieee` hook returned
    /// nothing for the address this operation needed.
    #[error("no such device: {0}")]
    NoSuchDevice(String),

    /// No serial port probed successfully during auto-detect.
    #[error("no serial port responded to a SYS.Ping probe")]
    NoPortFound,
}
