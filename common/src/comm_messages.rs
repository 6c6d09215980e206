use core::fmt::{self, Write};
use heapless::String;
use crate::color::Color;

// Commands are short text lines. With ACK framing the device answers every line with either
// COMMAND_RECEIVED or COMMAND_INVALID. With fast framing pixel lines are streamed unanswered
// and latched by a single refresh token.

pub const BAUD_RATE: u32 = 115_200;
/// Number of pixels the firmware can address, regardless of the strip actually attached.
pub const MAX_PIXELS: usize = 255;
pub const MAX_COMMAND_LEN: usize = 48;
/// Longest reply line the host will wait for before giving up on a newline.
pub const MAX_REPLY_LEN: usize = 64;

pub type CommandLine = String<MAX_COMMAND_LEN>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Framing {
    /// Text commands, each one acknowledged by the device.
    Ack,
    /// Positional pixel lines with no reply, latched by a refresh token.
    Fast,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UplinkMsg {
    Init { length: usize, color: Color },
    SetOne { index: usize, color: Color },
    Update,
    EnterFast,
    ExitFast,
}

impl UplinkMsg {
    pub const fn name(&self) -> &'static str {
        match self {
            UplinkMsg::Init { .. } => "INIT",
            UplinkMsg::SetOne { .. } => "SET_ONE",
            UplinkMsg::Update => "UPDATE",
            UplinkMsg::EnterFast => "ENTER_FAST",
            UplinkMsg::ExitFast => "EXIT_FAST",
        }
    }

    /// Whether the device answers this message when sent with `framing`.
    pub const fn expects_reply(&self, framing: Framing) -> bool {
        match self {
            UplinkMsg::SetOne { .. } | UplinkMsg::Update => matches!(framing, Framing::Ack),
            UplinkMsg::Init { .. } | UplinkMsg::EnterFast | UplinkMsg::ExitFast => true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DownlinkMsg {
    Ready,
    Received,
    Invalid,
    Unknown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncodeError {
    /// The message has no rendering in the requested framing.
    Unsupported { command: &'static str, framing: Framing },
    /// The rendered line did not fit in a command buffer.
    Overflow,
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::Unsupported { command, framing } => {
                write!(f, "{command} cannot be sent with {framing:?} framing")
            }
            EncodeError::Overflow => write!(f, "command longer than {MAX_COMMAND_LEN} bytes"),
        }
    }
}

impl core::error::Error for EncodeError {}

impl From<fmt::Error> for EncodeError {
    fn from(_: fmt::Error) -> Self {
        EncodeError::Overflow
    }
}

// heapless reports a full buffer as `Err(())`
impl From<()> for EncodeError {
    fn from((): ()) -> Self {
        EncodeError::Overflow
    }
}

/// A named command and the hex width of each of its fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub field_widths: &'static [usize],
}

/// Every command name, field width and fixed token the device understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProtocolTable {
    pub init: CommandSpec,
    pub set_one: CommandSpec,
    pub update: CommandSpec,
    /// Width of the index in a fast pixel line.
    pub fast_index_width: usize,
    /// Width of the color in a fast pixel line.
    pub fast_color_width: usize,
    pub enter_fast: &'static str,
    pub exit_fast: &'static str,
    pub fast_refresh: &'static str,
    pub ready: &'static str,
    pub received: &'static str,
    pub invalid: &'static str,
}

impl ProtocolTable {
    pub const STANDARD: ProtocolTable = ProtocolTable {
        init: CommandSpec { name: "INIT", field_widths: &[2, 6] },
        set_one: CommandSpec { name: "SET_ONE", field_widths: &[2, 6] },
        update: CommandSpec { name: "UPDATE", field_widths: &[] },
        fast_index_width: 2,
        fast_color_width: 6,
        enter_fast: "{ENTER_FAST}\n",
        // The device is parsing positional lines while fast, so this one is not braced
        exit_fast: "EXIT\n",
        fast_refresh: "U\n",
        ready: "READY\n",
        received: "COMMAND_RECEIVED\n",
        invalid: "COMMAND_INVALID\n",
    };

    /// Renders `msg` as the exact bytes to put on the wire.
    pub fn encode(&self, msg: &UplinkMsg, framing: Framing) -> Result<CommandLine, EncodeError> {
        let mut line = CommandLine::new();
        match (*msg, framing) {
            (UplinkMsg::Init { length, color }, Framing::Ack) => {
                write_ack(&mut line, &self.init, &[length as u32, color.packed()])?;
            }
            (UplinkMsg::SetOne { index, color }, Framing::Ack) => {
                write_ack(&mut line, &self.set_one, &[index as u32, color.packed()])?;
            }
            (UplinkMsg::SetOne { index, color }, Framing::Fast) => {
                write_hex(&mut line, index as u32, self.fast_index_width)?;
                line.push(':')?;
                write_hex(&mut line, color.packed(), self.fast_color_width)?;
                line.push('\n')?;
            }
            (UplinkMsg::Update, Framing::Ack) => write_ack(&mut line, &self.update, &[])?,
            (UplinkMsg::Update, Framing::Fast) => line.push_str(self.fast_refresh)?,
            (UplinkMsg::EnterFast, _) => line.push_str(self.enter_fast)?,
            (UplinkMsg::ExitFast, _) => line.push_str(self.exit_fast)?,
            (UplinkMsg::Init { .. }, Framing::Fast) => {
                return Err(EncodeError::Unsupported { command: msg.name(), framing });
            }
        }
        Ok(line)
    }

    /// Classifies one reply line. A trailing `\r` before the newline is tolerated.
    pub fn decode(&self, line: &[u8]) -> DownlinkMsg {
        let line = trim_line(line);
        if line == trim_line(self.received.as_bytes()) {
            DownlinkMsg::Received
        } else if line == trim_line(self.invalid.as_bytes()) {
            DownlinkMsg::Invalid
        } else if line == trim_line(self.ready.as_bytes()) {
            DownlinkMsg::Ready
        } else {
            DownlinkMsg::Unknown
        }
    }
}

impl Default for ProtocolTable {
    fn default() -> Self {
        Self::STANDARD
    }
}

fn trim_line(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

// {NAME:F1,F2}\n or {NAME}\n
fn write_ack<const N: usize>(
    out: &mut String<N>,
    spec: &CommandSpec,
    fields: &[u32],
) -> Result<(), EncodeError> {
    write!(out, "{{{}", spec.name)?;
    for (i, (&value, &width)) in fields.iter().zip(spec.field_widths).enumerate() {
        out.push(if i == 0 { ':' } else { ',' })?;
        write_hex(out, value, width)?;
    }
    out.push_str("}\n")?;
    Ok(())
}

/// Writes `value` as exactly `width` uppercase hex digits, dropping any higher digits.
pub fn write_hex<const N: usize>(
    out: &mut String<N>,
    value: u32,
    width: usize,
) -> Result<(), EncodeError> {
    if width == 0 {
        return Ok(());
    }
    let bits = width.saturating_mul(4);
    let masked = if bits >= 32 { value } else { value & ((1u32 << bits) - 1) };
    write!(out, "{masked:0width$X}")?;
    Ok(())
}
