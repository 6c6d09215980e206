//! Host side driver for an addressable LED strip behind a serial microcontroller.
//!
//! A [`Session`] owns the serial port and a local pixel buffer. Callers set colors, then
//! [`Session::flush`] sends only what changed, either as acknowledged text commands or,
//! after [`Session::set_mode`], as an unacknowledged fast stream.

pub mod discovery;
pub mod error;
pub mod pixel_buffer;
pub mod session;
pub mod transport;

#[cfg(test)]
mod testing;

pub use common::color::{Channel, Color};
pub use common::comm_messages::{Framing, MAX_PIXELS, ProtocolTable};
pub use discovery::{CandidateSource, DiscoveryConfig};
pub use error::{ConfigError, Error, Result, TransportError};
pub use pixel_buffer::{IndexedPixel, PixelBuffer};
pub use session::{BannerPolicy, Mode, Session, SessionConfig, SessionState};
pub use transport::{Connector, SerialConnector, SerialLink, Transport};
