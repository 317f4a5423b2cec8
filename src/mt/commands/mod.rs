//! Concrete command definitions, one module per MT subsystem.
//!
//! `sys`, `af`, `zdo`, `util` and `app_config` are populated with the commands
//! the controller actually issues or listens for; the remaining subsystems
//! are declared as empty stubs so the catalog's subsystem list stays
//! complete even though this driver never addresses them.

pub mod af;
pub mod app;
pub mod app_config;
pub mod debug;
pub mod mac;
pub mod sapi;
pub mod sys;
pub mod ubl;
pub mod util;
pub mod zdo;
pub mod zgp;
