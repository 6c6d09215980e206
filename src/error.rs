use common::comm_messages::EncodeError;
use thiserror::Error;

use crate::session::BannerPolicy;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to open {port}: {reason}")]
    Open { port: String, reason: String },
    #[error("serial I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("no reply within {0:?}")]
    Timeout(std::time::Duration),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("strip length was never set, call configure() before start()")]
    MissingLength,
    #[error("no serial port configured, set one or start with auto-detection")]
    MissingPort,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    /// The device answered, but not with the "received" token.
    #[error("device rejected {command}: {reply:?}")]
    Rejected { command: &'static str, reply: String },
    #[error("opening banner check failed under {policy:?} (device said READY: {ready})")]
    Banner { policy: BannerPolicy, ready: bool },
    #[error("session is not running, start() it first")]
    NotRunning,
    #[error("no device answered the ready challenge")]
    DeviceNotFound,
    #[error("could not encode command: {0}")]
    Encode(#[from] EncodeError),
}

impl Error {
    /// Rejections leave the transport open and the call can be retried as is. Everything
    /// else needs a fresh `start()`.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Rejected { .. })
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
