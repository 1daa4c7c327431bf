//! Native-messaging runtime for Edge2Chrome.
//!
//! - [`transport`]: length-prefixed JSON framing over stdio pipes
//! - [`session`]: one-shot sessions to the launcher host process
//! - [`browser`]: locating and starting the external browser

pub mod browser;
pub mod error;
pub mod session;
pub mod transport;

pub use browser::{BrowserLocator, launch_browser};
pub use error::{Error, Result};
pub use session::{Connector, ProcessConnector, ProcessSession, Session, SessionEvent};
pub use transport::{MAX_MESSAGE_LEN, PipeTransport, TransportReceiver, TransportSender, read_message, write_frame};
