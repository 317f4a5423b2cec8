//! The serial transport: a byte-oriented duplex stream between this driver
//! and the coprocessor's UART, plus the one-time bootloader-skip dance some
//! boards need on connect.

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_serial::{SerialPortBuilderExt, SerialStream};

/// A byte-oriented duplex stream the MT codec runs over. Implemented for
/// every `AsyncRead + AsyncWrite` type, so the in-memory loopback used by
/// tests (`tokio::io::duplex`) and [`SerialStream`] are interchangeable.
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin + 'static {}
impl<T: AsyncRead + AsyncWrite + Send + Unpin + 'static> Transport for T {}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to open serial device {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: tokio_serial::Error,
    },

    #[error("failed to write bootloader skip byte: {0}")]
    BootloaderSkip(#[source] std::io::Error),
}

/// The coprocessor boot ROM on some CC253x-family radios drops into a
/// bootloader menu on power-up and waits briefly for a run-mode byte before
/// falling through to the application image. Writing `FORCE_RUN` immediately
/// after opening the port, when `skip_bootloader` is set, answers that menu
/// instead of waiting out its timeout.
pub const BOOTLOADER_FORCE_RUN: u8 = 0xEF;

/// Open `path` at `baud` and, if `skip_bootloader` is set, write the
/// bootloader force-run byte before returning the stream for normal MT
/// framing use.
pub async fn open_serial(
    path: &str,
    baud: u32,
    skip_bootloader: bool,
) -> Result<SerialStream, TransportError> {
    let mut port =
        tokio_serial::new(path, baud)
            .open_native_async()
            .map_err(|source| TransportError::Open {
                path: path.to_string(),
                source,
            })?;

    if skip_bootloader {
        port.write_all(&[BOOTLOADER_FORCE_RUN])
            .await
            .map_err(TransportError::BootloaderSkip)?;
    }

    Ok(port)
}
