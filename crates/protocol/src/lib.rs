//! Wire types shared by the Edge2Chrome host, CLI and extension.
//!
//! Nothing in this crate performs I/O or depends on an async runtime, so the
//! wasm background worker and the native crates use the same definitions.

pub mod exchange;
pub mod manifest;
pub mod messages;
pub mod settings;

pub use exchange::{Exchange, ExchangeState, FailureReason, Outcome, RedirectEnvelope, RedirectResult, Resolution};
pub use manifest::{HostManifest, extension_origin};
pub use messages::{DEFAULT_LAUNCH_ARGS, ExtensionRequest, HOST_NAME, LAUNCHABLE_SCHEMES, LaunchReply, LaunchRequest, SOURCE_TAG, now_millis};
pub use settings::Settings;
