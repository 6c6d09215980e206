use std::time::Duration;

use anyhow::{Context, bail};
use lightlink::{CandidateSource, Color, SerialConnector, Session, SessionConfig};
use log::info;

// Opens a strip, paints it one color and closes it again.
//
//   lightlink --port /dev/ttyUSB0 --length 21 --fill 202040
//   lightlink --auto --enumerate --length 21 --fill FF0000 --fast

fn parse_color(s: &str) -> Result<Color, std::num::ParseIntError> {
    u32::from_str_radix(s.trim_start_matches("0x"), 16).map(Color::new)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let mut pargs = pico_args::Arguments::from_env();

    let auto = pargs.contains(["-a", "--auto"]);
    let enumerate = pargs.contains("--enumerate");
    let fast = pargs.contains(["-f", "--fast"]);
    let port: Option<String> = pargs.opt_value_from_str(["-p", "--port"])?;
    let length: usize = pargs.value_from_str(["-l", "--length"]).context("--length is required")?;
    let initial: Option<Color> = pargs.opt_value_from_fn(["-c", "--color"], parse_color)?;
    let fill: Option<Color> = pargs.opt_value_from_fn("--fill", parse_color)?;
    let timeout_s: f64 = pargs.opt_value_from_str(["-t", "--timeout"])?.unwrap_or(3.0);
    let read_timeout = Duration::try_from_secs_f64(timeout_s).context("invalid --timeout")?;

    if !auto && port.is_none() {
        bail!("either --port or --auto must be given");
    }

    let mut config = SessionConfig {
        read_timeout,
        ..SessionConfig::default()
    };
    if enumerate {
        config.discovery.candidates = CandidateSource::Enumerated;
    }

    let mut session = Session::new(SerialConnector, config);
    session.configure(port.as_deref(), length, initial);
    session.start(auto).context("failed to start session")?;
    session.set_mode(fast).context("failed to switch mode")?;

    if let Some(color) = fill {
        session.set_all(color);
        session.flush().context("failed to flush pixels")?;
        info!("Filled {} pixels with {:06X}", length, color.packed());
    }

    session.stop();
    Ok(())
}
