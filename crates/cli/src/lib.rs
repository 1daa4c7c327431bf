//! Edge2Chrome command line tools.
//!
//! Shared by the `e2c` operator CLI and the `e2c-host` native-messaging
//! launcher that the browser spawns.

pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod host;
pub mod html;
pub mod logging;
pub mod output;
