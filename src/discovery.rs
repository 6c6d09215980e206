use std::time::Duration;

use common::comm_messages::{DownlinkMsg, ProtocolTable};
use log::{debug, info};

use crate::transport::{Connector, Transport};

/// Where discovery gets the port names it tries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CandidateSource {
    /// `{prefix}{first}` up to and including `{prefix}{last}`.
    Numbered { prefix: String, first: u32, last: u32 },
    /// Whatever the operating system lists, sorted by name.
    Enumerated,
}

impl Default for CandidateSource {
    fn default() -> Self {
        CandidateSource::Numbered { prefix: String::from("COM"), first: 1, last: 255 }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscoveryConfig {
    pub candidates: CandidateSource,
    pub probe_timeout: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self { candidates: CandidateSource::default(), probe_timeout: Duration::from_secs(3) }
    }
}

impl DiscoveryConfig {
    pub fn candidate_names<C: Connector>(&self, connector: &C) -> Vec<String> {
        match &self.candidates {
            CandidateSource::Numbered { prefix, first, last } => {
                (*first..=*last).map(|n| format!("{prefix}{n}")).collect()
            }
            CandidateSource::Enumerated => connector.available(),
        }
    }
}

/// Opens each candidate in turn and returns the first one that announces itself with the
/// ready banner. Every probed port is closed again before moving on or returning.
pub fn find_port<C: Connector>(
    connector: &C,
    config: &DiscoveryConfig,
    protocol: &ProtocolTable,
) -> Option<String> {
    for name in config.candidate_names(connector) {
        let mut port = match connector.open(&name, config.probe_timeout) {
            Ok(port) => port,
            Err(e) => {
                debug!("Skipping {}: {}", name, e);
                continue;
            }
        };

        let answered = match port.read_line() {
            Ok(Some(line)) => protocol.decode(&line) == DownlinkMsg::Ready,
            Ok(None) => false,
            Err(e) => {
                debug!("Read from {} failed: {}", name, e);
                false
            }
        };
        drop(port);

        if answered {
            info!("Found device on {}", name);
            return Some(name);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockConnector, MockDevice};

    fn numbered(last: u32) -> DiscoveryConfig {
        DiscoveryConfig {
            candidates: CandidateSource::Numbered { prefix: String::from("COM"), first: 1, last },
            probe_timeout: Duration::from_millis(10),
        }
    }

    #[test]
    fn default_candidates_are_com1_to_com255() {
        let names = DiscoveryConfig::default().candidate_names(&MockConnector::new());
        assert_eq!(names.len(), 255);
        assert_eq!(names[0], "COM1");
        assert_eq!(names[254], "COM255");
    }

    #[test]
    fn third_candidate_answers() {
        let connector = MockConnector::new();
        let quiet = MockDevice::new();
        let chatty = MockDevice::new().reply("HELLO\n");
        let device = MockDevice::new().reply("READY\n");
        connector.attach("COM1", &quiet);
        connector.attach("COM2", &chatty);
        connector.attach("COM3", &device);

        let found = find_port(&connector, &numbered(10), &ProtocolTable::STANDARD);
        assert_eq!(found.as_deref(), Some("COM3"));

        for dev in [&quiet, &chatty, &device] {
            assert_eq!(dev.opens(), 1);
            assert!(!dev.is_open());
        }
        assert_eq!(connector.open_attempts(), vec!["COM1", "COM2", "COM3"]);
    }

    #[test]
    fn unopenable_candidates_are_skipped() {
        let connector = MockConnector::new();
        let device = MockDevice::new().reply("READY\r\n");
        connector.attach("COM4", &device);

        let found = find_port(&connector, &numbered(10), &ProtocolTable::STANDARD);
        assert_eq!(found.as_deref(), Some("COM4"));
        assert!(!device.is_open());
    }

    #[test]
    fn candidates_failing_to_read_are_skipped() {
        let connector = MockConnector::new();
        let broken = MockDevice::new().reply("READY\n").failing_reads();
        let device = MockDevice::new().reply("READY\n");
        connector.attach("COM1", &broken);
        connector.attach("COM2", &device);

        let found = find_port(&connector, &numbered(10), &ProtocolTable::STANDARD);
        assert_eq!(found.as_deref(), Some("COM2"));
        assert_eq!(broken.opens(), 1);
        assert!(!broken.is_open());
    }

    #[test]
    fn nothing_found_after_exhausting_candidates() {
        let connector = MockConnector::new();
        let quiet = MockDevice::new();
        connector.attach("COM2", &quiet);

        assert_eq!(find_port(&connector, &numbered(5), &ProtocolTable::STANDARD), None);
        assert_eq!(connector.open_attempts().len(), 5);
        assert!(!quiet.is_open());
    }

    #[test]
    fn enumerated_candidates_come_from_the_connector() {
        let connector = MockConnector::new();
        let device = MockDevice::new().reply("READY\n");
        connector.attach("/dev/ttyUSB0", &MockDevice::new());
        connector.attach("/dev/ttyACM0", &device);

        let config = DiscoveryConfig {
            candidates: CandidateSource::Enumerated,
            probe_timeout: Duration::from_millis(10),
        };
        let found = find_port(&connector, &config, &ProtocolTable::STANDARD);
        assert_eq!(found.as_deref(), Some("/dev/ttyACM0"));
    }
}
