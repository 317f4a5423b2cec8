//! Host-side driver for a TI Z-Stack Zigbee coprocessor speaking the MT
//! (Monitor/Test) protocol over a serial UART.
//!
//! [`mt`] is the wire protocol layer (framing, parameter types, the command
//! catalog); [`mux`] multiplexes SREQ/SRSP/AREQ traffic over one transport;
//! [`controller`] is the session state machine built on top of it that
//! exposes the operations an upper-layer Zigbee application actually calls.

pub mod config;
pub mod controller;
pub mod device;
pub mod error;
pub mod mt;
pub mod mux;
pub mod nvram;
pub mod transport;

pub use config::Config;
pub use controller::{Connect, Controller, ControllerError, SerialConnector, UpdateNetworkParams};
pub use device::{ControllerHandler, Device};
pub use error::Error;
