use std::time::Duration;

use common::color::Color;
use common::comm_messages::{DownlinkMsg, Framing, MAX_PIXELS, ProtocolTable, UplinkMsg};
use log::{debug, info, warn};

use crate::discovery::{self, DiscoveryConfig};
use crate::error::{ConfigError, Error, Result, TransportError};
use crate::pixel_buffer::PixelBuffer;
use crate::transport::{Connector, Transport};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    SlowAck,
    Fast,
}

impl Mode {
    pub const fn framing(self) -> Framing {
        match self {
            Mode::SlowAck => Framing::Ack,
            Mode::Fast => Framing::Fast,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    Configured,
    Running(Mode),
}

/// What to make of the line a device may print right after the port is opened.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BannerPolicy {
    /// Abort if the device says READY, carry on after a quiet open.
    #[default]
    RejectReady,
    /// Abort unless the device says READY.
    RequireReady,
    /// Don't read a banner at all.
    Ignore,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub port: Option<String>,
    pub strip_length: Option<usize>,
    /// Color the whole strip shows after the handshake. Off when unset.
    pub initial_color: Option<Color>,
    /// Upper bound on every read from the device.
    pub read_timeout: Duration,
    pub banner_policy: BannerPolicy,
    pub discovery: DiscoveryConfig,
    pub protocol: ProtocolTable,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            port: None,
            strip_length: None,
            initial_color: None,
            read_timeout: Duration::from_secs(3),
            banner_policy: BannerPolicy::default(),
            discovery: DiscoveryConfig::default(),
            protocol: ProtocolTable::STANDARD,
        }
    }
}

/// One device on one serial port.
///
/// Pixels are written into a local buffer with [`Session::set_pixel`] and only reach the
/// strip on [`Session::flush`], which sends the pixels that changed since the last
/// successful flush followed by a show command.
pub struct Session<C: Connector> {
    connector: C,
    config: SessionConfig,
    port: Option<C::Port>,
    pixels: PixelBuffer,
    state: SessionState,
}

impl<C: Connector> Session<C> {
    pub fn new(connector: C, mut config: SessionConfig) -> Self {
        config.strip_length = config.strip_length.map(|length| length.min(MAX_PIXELS));
        let state = if config.strip_length.is_some() {
            SessionState::Configured
        } else {
            SessionState::NotStarted
        };
        Self {
            connector,
            pixels: PixelBuffer::new(config.strip_length.unwrap_or(0)),
            config,
            port: None,
            state,
        }
    }

    /// Stores the connection settings used by the next [`Session::start`]. Lengths beyond
    /// what the device can address are cut down to [`MAX_PIXELS`].
    pub fn configure(&mut self, port: Option<&str>, strip_length: usize, initial_color: Option<Color>) {
        if let Some(port) = port {
            self.set_port(port);
        }
        self.set_strip_length(strip_length);
        if let Some(color) = initial_color {
            self.set_initial_color(color);
        }
    }

    pub fn set_port(&mut self, port: &str) {
        self.config.port = Some(port.to_string());
    }

    pub fn set_strip_length(&mut self, strip_length: usize) {
        self.config.strip_length = Some(strip_length.min(MAX_PIXELS));
        if !self.is_running() {
            self.state = SessionState::Configured;
        }
    }

    pub fn set_initial_color(&mut self, color: Color) {
        self.config.initial_color = Some(color);
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn mode(&self) -> Option<Mode> {
        match self.state {
            SessionState::Running(mode) => Some(mode),
            _ => None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.mode().is_some()
    }

    pub fn strip_length(&self) -> Option<usize> {
        self.config.strip_length
    }

    /// Opens the port and runs the handshake: banner check, INIT, UPDATE. With
    /// `auto_detect` the port is found by probing candidates instead of taken from the
    /// configuration, and the banner was already consumed by the probe.
    ///
    /// On failure the port is closed again and the session is back to not started.
    pub fn start(&mut self, auto_detect: bool) -> Result<()> {
        if self.port.is_some() {
            self.stop();
        }

        let length = self.config.strip_length.ok_or(ConfigError::MissingLength)?;
        let color = self.config.initial_color.unwrap_or(Color::BLACK);

        let (name, banner_policy) = if auto_detect {
            let name = discovery::find_port(&self.connector, &self.config.discovery, &self.config.protocol)
                .ok_or(Error::DeviceNotFound)?;
            (name, BannerPolicy::Ignore)
        } else {
            let name = self.config.port.clone().ok_or(ConfigError::MissingPort)?;
            (name, self.config.banner_policy)
        };

        let mut port = match self.connector.open(&name, self.config.read_timeout) {
            Ok(port) => port,
            Err(e) => {
                warn!("Could not open {}: {}", name, e);
                self.state = SessionState::NotStarted;
                return Err(e.into());
            }
        };
        if let Err(e) = handshake(&mut port, &self.config, banner_policy, length, color) {
            warn!("Handshake with {} failed: {}", name, e);
            drop(port);
            self.state = SessionState::NotStarted;
            return Err(e);
        }

        self.pixels = PixelBuffer::new(length);
        self.pixels.reset_baseline(color);
        self.port = Some(port);
        self.state = SessionState::Running(Mode::SlowAck);
        info!("Session running on {} with {} pixels", name, length);
        Ok(())
    }

    /// Switches between ACK and fast framing. The recorded mode only changes once the
    /// device acknowledged the switch.
    pub fn set_mode(&mut self, fast: bool) -> Result<()> {
        let current = self.mode().ok_or(Error::NotRunning)?;
        let wanted = if fast { Mode::Fast } else { Mode::SlowAck };
        if current == wanted {
            return Ok(());
        }

        let msg = if fast { UplinkMsg::EnterFast } else { UplinkMsg::ExitFast };
        self.send(&msg, current.framing())?;
        self.state = SessionState::Running(wanted);
        info!("Switched to {:?} mode", wanted);
        Ok(())
    }

    pub fn set_pixel(&mut self, index: usize, color: Color) {
        self.pixels.set(index, color);
    }

    pub fn set_all(&mut self, color: Color) {
        self.pixels.set_all(color);
    }

    pub fn pixel(&self, index: usize) -> Option<Color> {
        self.pixels.get(index)
    }

    pub fn pixels(&self) -> &PixelBuffer {
        &self.pixels
    }

    /// Sends every changed pixel and then shows them.
    ///
    /// If a command fails part way, the pixels already sent stay on the device but none of
    /// them are marked as sent here, so the next flush sends them all again.
    pub fn flush(&mut self) -> Result<()> {
        let framing = self.mode().ok_or(Error::NotRunning)?.framing();
        let changed = self.pixels.diff();

        for (sent, pixel) in changed.iter().enumerate() {
            let msg = UplinkMsg::SetOne { index: pixel.index, color: pixel.color };
            if let Err(e) = self.send(&msg, framing) {
                warn!("Flush stopped after {} of {} pixels: {}", sent, changed.len(), e);
                return Err(e);
            }
        }
        self.send(&UplinkMsg::Update, framing)?;

        self.pixels.commit(&changed);
        debug!("Flushed {} pixels", changed.len());
        Ok(())
    }

    pub fn stop(&mut self) {
        if self.port.take().is_some() {
            info!("Session stopped");
        }
        self.state = if self.config.strip_length.is_some() {
            SessionState::Configured
        } else {
            SessionState::NotStarted
        };
    }

    fn send(&mut self, msg: &UplinkMsg, framing: Framing) -> Result<()> {
        let port = self.port.as_mut().ok_or(Error::NotRunning)?;
        let result = send_command(port, &self.config.protocol, msg, framing, self.config.read_timeout);
        if let Err(Error::Transport(e)) = &result {
            warn!("Closing port after transport failure: {}", e);
            self.port = None;
            self.state = SessionState::NotStarted;
        }
        result
    }
}

/// Writes one command and, where the framing calls for it, waits for COMMAND_RECEIVED.
pub fn send_command<T: Transport>(
    port: &mut T,
    protocol: &ProtocolTable,
    msg: &UplinkMsg,
    framing: Framing,
    timeout: Duration,
) -> Result<()> {
    let line = protocol.encode(msg, framing)?;
    debug!("-> {}", line.trim_end());
    port.write_all(line.as_bytes())?;

    if !msg.expects_reply(framing) {
        return Ok(());
    }

    let reply = port.read_line()?.ok_or(TransportError::Timeout(timeout))?;
    let text = String::from_utf8_lossy(&reply);
    debug!("<- {}", text.trim_end());
    match protocol.decode(&reply) {
        DownlinkMsg::Received => Ok(()),
        _ => {
            warn!("{} was not acknowledged", msg.name());
            Err(Error::Rejected { command: msg.name(), reply: text.trim_end().to_string() })
        }
    }
}

fn handshake<T: Transport>(
    port: &mut T,
    config: &SessionConfig,
    banner_policy: BannerPolicy,
    length: usize,
    color: Color,
) -> Result<()> {
    let protocol = &config.protocol;
    check_banner(port, banner_policy, protocol)?;
    send_command(port, protocol, &UplinkMsg::Init { length, color }, Framing::Ack, config.read_timeout)?;
    send_command(port, protocol, &UplinkMsg::Update, Framing::Ack, config.read_timeout)
}

fn check_banner<T: Transport>(port: &mut T, policy: BannerPolicy, protocol: &ProtocolTable) -> Result<()> {
    if policy == BannerPolicy::Ignore {
        return Ok(());
    }

    let banner = port.read_line()?;
    let ready = banner.as_deref().is_some_and(|line| protocol.decode(line) == DownlinkMsg::Ready);
    match (policy, ready) {
        (BannerPolicy::RejectReady, true) | (BannerPolicy::RequireReady, false) => {
            Err(Error::Banner { policy, ready })
        }
        _ => Ok(()),
    }
}
