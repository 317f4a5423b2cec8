//! Crate-wide error enum composing each layer's own error type.
//!
//! Every module that can fail owns a `thiserror`-derived enum scoped to its
//! own concerns, and this type exists only to let a caller that doesn't care
//! which layer failed use a single `?`-friendly type.

use thiserror::Error;

use crate::config::ConfigError;
use crate::controller::ControllerError;
use crate::mt::command::CommandError;
use crate::mt::frame::FrameError;
use crate::mux::MuxError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Mux(#[from] MuxError),

    #[error(transparent)]
    Controller(#[from] ControllerError),
}
